//! Environment-driven configuration.

/// Tunables for the session engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on concurrently running search calls per pipeline run.
    /// The planner controls how many searches exist; this caps how many are
    /// in flight against the search collaborator at once.
    pub max_concurrent_searches: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            max_concurrent_searches: env_parse("DELVE_MAX_CONCURRENT_SEARCHES", 8_usize)?
                .clamp(1, 64),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 8,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_search_cap() {
        assert_eq!(Config::default().max_concurrent_searches, 8);
    }

    #[test]
    fn test_env_parse_falls_back_to_default() {
        let parsed: usize = env_parse("DELVE_TEST_UNSET_VARIABLE", 3_usize).unwrap();
        assert_eq!(parsed, 3);
    }
}
