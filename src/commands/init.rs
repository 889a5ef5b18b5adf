use anyhow::{Result, bail};

use crate::config;

/// `synthmon init` — create .synthmon/config.toml.
pub fn init(url: &str, force: bool) -> Result<()> {
    if !force && config::config_file_exists() {
        bail!(".synthmon/config.toml already exists (use --force to overwrite)");
    }

    config::write_template(url)?;
    config::write_gitignore(force)?;

    let verb = if force { "Regenerated" } else { "Created" };
    println!("{verb} .synthmon/config.toml");
    println!("  sample case opens {url}");
    Ok(())
}
