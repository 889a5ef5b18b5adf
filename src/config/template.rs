use std::path::Path;

use anyhow::{Context, Result};

use super::{CONFIG_DIR, CONFIG_FILE};

/// Hand-crafted config template with commented-out keys.
/// Used by `synthmon init` instead of `toml::to_string_pretty()` so that
/// users can see the available knobs without uncommenting section headers.
const CONFIG_TEMPLATE: &str = r#"# ─────────────────────────────────────────────────────────
# Monitor — all fields optional.
# ─────────────────────────────────────────────────────────
[monitor]
# script_timeout_ms = 180000        # whole-run budget (0 disables)
# element_timeout_ms = 30000        # wait-and-find budget per element
# step_logging = false              # report per-step durations
# user_agent = "default"            # "default" keeps the browser UA

# ─────────────────────────────────────────────────────────
# Telemetry — empty insights_key disables remote reporting.
# ─────────────────────────────────────────────────────────
[telemetry]
# insights_key = ""
# account_id = ""                   # falls back to $ACCOUNT_ID
# collector_url = "https://insights-collector.newrelic.com"

[chrome]
# chrome_url = "http://localhost:9222"  # remote Chrome (e.g. Docker)

[[case]]
name = "Homepage loads"

  [[case.step]]
  type = "navigate"
  url = "{url}"

  [[case.step]]
  type = "set-window-size"
  width = 1440
  height = 875

  [[case.step]]
  type = "sleep"
  ms = 2000

  # [[case.step]]
  # type = "switch-frame"
  # index = 0

  # [[case.step]]
  # type = "click"
  # selector = ".st-bw"
"#;

pub fn config_file_exists() -> bool {
    Path::new(CONFIG_DIR).join(CONFIG_FILE).exists()
}

pub fn write_gitignore(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_DIR).join(".gitignore");
    if !force && path.exists() {
        return Ok(());
    }
    std::fs::write(&path, "failures/\n")
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the hand-crafted config template (with commented-out sections).
pub fn write_template(url: &str) -> Result<()> {
    let dir = Path::new(CONFIG_DIR);
    std::fs::create_dir_all(dir).context("Failed to create .synthmon directory")?;
    let path = dir.join(CONFIG_FILE);
    let content = CONFIG_TEMPLATE.replace("{url}", url);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_and_validates() {
        let content = CONFIG_TEMPLATE.replace("{url}", "https://example.com/");
        let config: super::super::Config = toml::from_str(&content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cases.len(), 1);
        assert_eq!(config.cases[0].steps.len(), 3);
    }
}
