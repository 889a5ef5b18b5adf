use anyhow::Result;

use crate::config;

/// `synthmon check` — validate the config and print the monitor plan.
pub fn check() -> Result<()> {
    let loaded = config::load()?;

    println!("Config OK: {} test case(s)", loaded.cases.len());
    for case in &loaded.cases {
        println!();
        println!("  {}", case.name);
        for (i, step) in case.steps.iter().enumerate() {
            println!("    {:>2}. {}", i + 1, step.label());
        }
    }
    Ok(())
}
