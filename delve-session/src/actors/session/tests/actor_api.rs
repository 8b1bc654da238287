use std::sync::Arc;

use ractor::call;

use delve_types::{SessionOutcome, StatusLabel};

use crate::actors::session::{SessionError, SessionMsg};
use crate::gateway::testing::ScriptedGateway;

use super::support::spawn_session;

#[tokio::test]
async fn fresh_session_is_pending() {
    let (session, _handle) = spawn_session(Arc::new(ScriptedGateway::proceeding())).await;

    let snapshot = call!(session, |reply| SessionMsg::GetStatus { reply }).unwrap();
    assert_eq!(snapshot.label, StatusLabel::Pending);
    assert!(snapshot.original_query.is_none());
    assert!(snapshot.questions.is_empty());
    assert_eq!(snapshot.next_question_index, 0);

    session.stop(None);
}

#[tokio::test]
async fn end_signal_is_idempotent() {
    let (session, _handle) = spawn_session(Arc::new(ScriptedGateway::proceeding())).await;

    for _ in 0..3 {
        ractor::cast!(session, SessionMsg::End).unwrap();
        let snapshot = call!(session, |reply| SessionMsg::GetStatus { reply }).unwrap();
        assert_eq!(snapshot.label, StatusLabel::Ended);
    }

    session.stop(None);
}

#[tokio::test]
async fn answer_without_questions_is_a_protocol_violation() {
    let (session, _handle) = spawn_session(Arc::new(ScriptedGateway::proceeding())).await;

    let result = call!(session, |reply| SessionMsg::Answer {
        index: 0,
        text: "tabs".to_string(),
        reply,
    })
    .unwrap();
    assert!(matches!(result, Err(SessionError::ProtocolViolation(_))));

    session.stop(None);
}

#[tokio::test]
async fn wait_outcome_resolves_when_ended() {
    let (session, _handle) = spawn_session(Arc::new(ScriptedGateway::proceeding())).await;

    let waiter = {
        let session = session.clone();
        tokio::spawn(
            async move { call!(session, |reply| SessionMsg::WaitOutcome { reply }).unwrap() },
        )
    };

    ractor::cast!(session, SessionMsg::End).unwrap();
    let outcome = waiter.await.unwrap();
    assert_eq!(outcome, SessionOutcome::ended());

    // Waiters registered after the terminal transition resolve immediately.
    let outcome = call!(session, |reply| SessionMsg::WaitOutcome { reply }).unwrap();
    assert_eq!(outcome, SessionOutcome::ended());

    session.stop(None);
}
