use std::time::Duration;

/// Runtime configuration, loaded from the environment (a `.env` file is
/// honored). Every knob has a default so `jobq` works out of the box with a
/// SQLite file next to the deployment.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Maximum number of concurrently running jobs.
    pub concurrency: usize,
    /// Shell used to launch job commands.
    pub shell: String,
    pub poll_interval: Duration,
    pub idle_interval: Duration,
    /// Routine retention sweep fires roughly once per this many runner
    /// iterations.
    pub sweep_one_in: u32,
    /// Routine sweep window (DONE jobs only).
    pub retention_days: i64,
    /// Aggressive sweep window (`jobq cleanup`, also FAILED/STALLED).
    pub aggressive_retention_days: i64,
    /// Run the routine sweep before the bookkeeping commands (add, remove,
    /// clear, list).
    pub auto_cleanup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env_or_fallback("JOBQ_DATABASE_URL", "DATABASE_URL")
            .unwrap_or_else(|| "sqlite://jobq.db".to_string());

        let concurrency = env_parsed("JOBQ_CONCURRENCY").unwrap_or(1);
        if concurrency == 0 {
            anyhow::bail!("JOBQ_CONCURRENCY must be a positive integer");
        }

        let shell = std::env::var("JOBQ_SHELL").unwrap_or_else(|_| "/bin/sh".to_string());

        let poll_interval =
            Duration::from_millis(env_parsed("JOBQ_POLL_INTERVAL_MS").unwrap_or(1_000));
        let idle_interval =
            Duration::from_millis(env_parsed("JOBQ_IDLE_INTERVAL_MS").unwrap_or(10_000));

        let sweep_one_in = env_parsed("JOBQ_SWEEP_ONE_IN").unwrap_or(1_000);
        let retention_days = env_parsed("JOBQ_RETENTION_DAYS").unwrap_or(7);
        let aggressive_retention_days =
            env_parsed("JOBQ_AGGRESSIVE_RETENTION_DAYS").unwrap_or(3);

        let auto_cleanup = env_bool("JOBQ_AUTO_CLEANUP").unwrap_or(true);

        Ok(Self {
            database_url,
            concurrency,
            shell,
            poll_interval,
            idle_interval,
            sweep_one_in,
            retention_days,
            aggressive_retention_days,
            auto_cleanup,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // Process-wide environment: keep these serialized.

    const KEYS: &[&str] = &[
        "JOBQ_DATABASE_URL",
        "DATABASE_URL",
        "JOBQ_CONCURRENCY",
        "JOBQ_SHELL",
        "JOBQ_POLL_INTERVAL_MS",
        "JOBQ_IDLE_INTERVAL_MS",
        "JOBQ_SWEEP_ONE_IN",
        "JOBQ_RETENTION_DAYS",
        "JOBQ_AGGRESSIVE_RETENTION_DAYS",
        "JOBQ_AUTO_CLEANUP",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_with_an_empty_environment() {
        clear_env();
        let cfg = Config::from_env().unwrap();

        assert_eq!(cfg.database_url, "sqlite://jobq.db");
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.shell, "/bin/sh");
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.idle_interval, Duration::from_secs(10));
        assert_eq!(cfg.retention_days, 7);
        assert_eq!(cfg.aggressive_retention_days, 3);
        assert!(cfg.auto_cleanup);
    }

    #[test]
    #[serial]
    fn the_prefixed_url_wins_over_the_generic_one() {
        clear_env();
        std::env::set_var("DATABASE_URL", "sqlite://generic.db");
        std::env::set_var("JOBQ_DATABASE_URL", "sqlite://specific.db");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.database_url, "sqlite://specific.db");
        clear_env();
    }

    #[test]
    #[serial]
    fn zero_concurrency_is_rejected() {
        clear_env();
        std::env::set_var("JOBQ_CONCURRENCY", "0");

        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn auto_cleanup_can_be_switched_off() {
        clear_env();
        std::env::set_var("JOBQ_AUTO_CLEANUP", "false");

        let cfg = Config::from_env().unwrap();
        assert!(!cfg.auto_cleanup);
        clear_env();
    }
}
