pub mod resolve;
pub mod template;

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::script::{Step, TestCase};

pub use self::resolve::{ResolvedRunConfig, RunOverrides};
pub use self::template::{config_file_exists, write_gitignore, write_template};

pub(crate) const CONFIG_DIR: &str = ".synthmon";
const CONFIG_FILE: &str = "config.toml";

fn default_script_timeout_ms() -> u64 {
    180_000
}

fn default_element_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Whole-run budget in ms. 0 disables the check.
    #[serde(default = "default_script_timeout_ms")]
    pub script_timeout_ms: u64,
    /// Budget for every wait-and-find operation, in ms.
    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,
    /// Report per-step durations (remote when a key is set, local otherwise).
    #[serde(default)]
    pub step_logging: bool,
    /// "default" or absent leaves the browser's own user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            script_timeout_ms: default_script_timeout_ms(),
            element_timeout_ms: default_element_timeout_ms(),
            step_logging: false,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Insert key for the collector. Empty disables remote reporting.
    #[serde(default)]
    pub insights_key: String,
    /// Account the collector endpoint is built from. Falls back to the
    /// ACCOUNT_ID environment variable when empty.
    #[serde(default)]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChromeConfig {
    /// Connect to a remote Chrome instead of launching a local one.
    /// Value is `http://host:port` (e.g. `http://localhost:9222`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub chrome: ChromeConfig,
    #[serde(default, rename = "case")]
    pub cases: Vec<TestCase>,
}

impl Config {
    /// Validate semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.cases.is_empty() {
            bail!(
                "No test cases configured. Add a case section, e.g.:\n\n  \
                 [[case]]\n  \
                 name = \"Homepage loads\"\n\n  \
                 [[case.step]]\n  \
                 type = \"navigate\"\n  \
                 url = \"https://example.com/\""
            );
        }

        for case in &self.cases {
            if case.name.is_empty() {
                bail!("A [[case]] section is missing its name");
            }
            if case.steps.is_empty() {
                bail!("Test case '{}' has no steps", case.name);
            }
            for (i, step) in case.steps.iter().enumerate() {
                let line = i + 1;
                match step {
                    Step::Navigate { url } if url.is_empty() => {
                        bail!("Test case '{}', step {line}: empty URL", case.name);
                    }
                    Step::SetWindowSize { width, height } if *width == 0 || *height == 0 => {
                        bail!(
                            "Test case '{}', step {line}: invalid window size ({width}x{height}). \
                             Both width and height must be > 0",
                            case.name,
                        );
                    }
                    Step::Click { selector } | Step::WaitFor { selector }
                        if selector.is_empty() =>
                    {
                        bail!("Test case '{}', step {line}: empty selector", case.name);
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

pub fn load() -> Result<Config> {
    let path = Path::new(CONFIG_DIR).join(CONFIG_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(extra: &str) -> String {
        format!(
            r#"
{extra}

[[case]]
name = "Homepage"

[[case.step]]
type = "navigate"
url = "https://example.com/"
"#
        )
    }

    #[test]
    fn defaults_fill_in_missing_sections() {
        let config: Config = toml::from_str(&minimal_config("")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.monitor.script_timeout_ms, 180_000);
        assert_eq!(config.monitor.element_timeout_ms, 30_000);
        assert!(!config.monitor.step_logging);
        assert!(config.telemetry.insights_key.is_empty());
        assert!(config.chrome.chrome_url.is_none());
    }

    #[test]
    fn no_cases_is_rejected() {
        let config: Config = toml::from_str("[monitor]\nstep_logging = true\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("No test cases"));
    }

    #[test]
    fn empty_steps_are_rejected() {
        let config: Config = toml::from_str("[[case]]\nname = \"Empty\"\nstep = []\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("has no steps"));
    }

    #[test]
    fn zero_window_size_is_rejected() {
        let toml = r#"
[[case]]
name = "Bad size"

[[case.step]]
type = "set-window-size"
width = 0
height = 875
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid window size"));
    }

    #[test]
    fn empty_selector_is_rejected() {
        let toml = r#"
[[case]]
name = "Bad click"

[[case.step]]
type = "click"
selector = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("empty selector"));
    }
}
