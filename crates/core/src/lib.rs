pub mod domain;
pub mod llm;
pub mod pipeline;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_PHASE_TIMEOUT_SECS: u64 = 120;
    // IDX trades on WIB (UTC+7); history ranges are resolved in that day.
    const DEFAULT_HISTORY_UTC_OFFSET_HOURS: i32 = 7;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub phase_timeout_secs: u64,
        pub history_utc_offset_hours: i32,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let phase_timeout_secs = match std::env::var("PIPELINE_PHASE_TIMEOUT_SECS") {
                Ok(s) => s
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid PIPELINE_PHASE_TIMEOUT_SECS: {s}"))?,
                Err(_) => DEFAULT_PHASE_TIMEOUT_SECS,
            };
            anyhow::ensure!(
                phase_timeout_secs >= 1,
                "PIPELINE_PHASE_TIMEOUT_SECS must be >= 1"
            );

            let history_utc_offset_hours = match std::env::var("HISTORY_UTC_OFFSET_HOURS") {
                Ok(s) => s
                    .trim()
                    .parse::<i32>()
                    .with_context(|| format!("invalid HISTORY_UTC_OFFSET_HOURS: {s}"))?,
                Err(_) => DEFAULT_HISTORY_UTC_OFFSET_HOURS,
            };
            anyhow::ensure!(
                (-12..=14).contains(&history_utc_offset_hours),
                "HISTORY_UTC_OFFSET_HOURS must be within -12..=14 (got {history_utc_offset_hours})"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                phase_timeout_secs,
                history_utc_offset_hours,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn phase_timeout(&self) -> Duration {
            Duration::from_secs(self.phase_timeout_secs)
        }
    }
}
