use std::time::Duration;

use anyhow::{Context, Result};

use super::{Config, MonitorConfig, load};
use crate::script::TestCase;
use crate::telemetry::{EnvMetadata, InsightsClient};
use crate::timer::TimerConfig;

/// CLI flags that participate in the merge (flattened into `run`).
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunOverrides {
    /// Insert key for remote telemetry (overrides config)
    #[arg(long)]
    pub insights_key: Option<String>,

    /// Connect to a remote Chrome instead of launching a local one.
    /// Value is `http://host:port` (e.g. `http://localhost:9222`).
    #[arg(long)]
    pub chrome_url: Option<String>,

    /// Whole-run timeout budget in ms (0 disables)
    #[arg(long)]
    pub script_timeout_ms: Option<u64>,

    /// Report per-step durations
    #[arg(long)]
    pub step_logging: bool,
}

/// Fully resolved config after CLI > env > file > defaults merge.
pub struct ResolvedRunConfig {
    pub monitor: MonitorConfig,
    pub cases: Vec<TestCase>,
    pub chrome_url: Option<String>,
    pub insights_key: String,
    pub collector_url: Option<String>,
    /// Fixed event metadata, captured once here — nothing downstream reads
    /// the process environment.
    pub env: EnvMetadata,
}

impl ResolvedRunConfig {
    pub fn new(cli: RunOverrides) -> Result<Self> {
        // 1. File layer
        let file_config = load().context("Run `synthmon init` first")?;

        // 2. Env layer
        let env_key = std::env::var("SYNTHMON_INSIGHTS_KEY").ok();
        let env_chrome = std::env::var("SYNTHMON_CHROME_URL").ok();
        let env_meta = EnvMetadata::capture();

        Ok(Self::merge(file_config, cli, env_key, env_chrome, env_meta))
    }

    /// CLI > env > file (highest priority first).
    fn merge(
        file: Config,
        cli: RunOverrides,
        env_key: Option<String>,
        env_chrome: Option<String>,
        mut env_meta: EnvMetadata,
    ) -> Self {
        // The configured account wins over the ambient ACCOUNT_ID.
        if !file.telemetry.account_id.is_empty() {
            env_meta.account_id = file.telemetry.account_id.clone();
        }

        let insights_key = cli
            .insights_key
            .or(env_key)
            .unwrap_or(file.telemetry.insights_key);

        let chrome_url = cli.chrome_url.or(env_chrome).or(file.chrome.chrome_url);

        let mut monitor = file.monitor;
        if let Some(t) = cli.script_timeout_ms {
            monitor.script_timeout_ms = t;
        }
        if cli.step_logging {
            monitor.step_logging = true;
        }

        Self {
            monitor,
            cases: file.cases,
            chrome_url,
            insights_key,
            collector_url: file.telemetry.collector_url,
            env: env_meta,
        }
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor.element_timeout_ms)
    }

    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            script_timeout: Duration::from_millis(self.monitor.script_timeout_ms),
            step_logging: self.monitor.step_logging,
        }
    }

    pub fn insights_client(&self) -> InsightsClient {
        InsightsClient::new(
            &self.insights_key,
            self.collector_url.as_deref(),
            self.env.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> Config {
        toml::from_str(
            r#"
[monitor]
script_timeout_ms = 60000
step_logging = false

[telemetry]
insights_key = "file-key"
account_id = "999"

[chrome]
chrome_url = "http://file:9222"

[[case]]
name = "Homepage"

[[case.step]]
type = "navigate"
url = "https://example.com/"
"#,
        )
        .unwrap()
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let cli = RunOverrides {
            insights_key: Some("cli-key".into()),
            chrome_url: None,
            script_timeout_ms: Some(5000),
            step_logging: true,
        };
        let resolved = ResolvedRunConfig::merge(
            file_config(),
            cli,
            Some("env-key".into()),
            Some("http://env:9222".into()),
            EnvMetadata::default(),
        );
        assert_eq!(resolved.insights_key, "cli-key");
        assert_eq!(resolved.chrome_url.as_deref(), Some("http://env:9222"));
        assert_eq!(resolved.monitor.script_timeout_ms, 5000);
        assert!(resolved.monitor.step_logging);
    }

    #[test]
    fn file_values_survive_without_overrides() {
        let resolved = ResolvedRunConfig::merge(
            file_config(),
            RunOverrides::default(),
            None,
            None,
            EnvMetadata::default(),
        );
        assert_eq!(resolved.insights_key, "file-key");
        assert_eq!(resolved.chrome_url.as_deref(), Some("http://file:9222"));
        assert_eq!(resolved.monitor.script_timeout_ms, 60000);
        assert!(!resolved.monitor.step_logging);
    }

    #[test]
    fn configured_account_overrides_ambient_one() {
        let env_meta = EnvMetadata {
            account_id: "111".into(),
            ..EnvMetadata::default()
        };
        let resolved = ResolvedRunConfig::merge(
            file_config(),
            RunOverrides::default(),
            None,
            None,
            env_meta,
        );
        assert_eq!(resolved.env.account_id, "999");
    }
}
