use anyhow::Result;
use tracing::debug;

use crate::config::ResolvedRunConfig;
use crate::report::terminal;
use crate::runner;
use crate::script::TestCase;

/// `synthmon run` — execute the monitor, report, exit 0/1.
pub async fn run(
    config: ResolvedRunConfig,
    filter: Option<&str>,
    timings: bool,
    insights: bool,
) -> Result<i32> {
    let cases: Vec<TestCase> = match filter {
        Some(pattern) => config
            .cases
            .iter()
            .filter(|c| c.matches_filter(pattern))
            .cloned()
            .collect(),
        None => config.cases.clone(),
    };
    if cases.is_empty() {
        println!("No test cases match filter");
        return Ok(0);
    }

    terminal::print_plan(&cases);

    debug!(cases = cases.len(), "starting monitor run");
    let outcome = runner::run(&config, &cases).await?;

    println!();
    for case in &outcome.cases {
        terminal::print_case_line(&case.name, &case.status, case.duration);
    }

    if timings {
        terminal::print_step_table(&outcome.steps);
    }
    if insights {
        terminal::print_store(&outcome.store);
    }

    let passed = outcome
        .cases
        .iter()
        .filter(|c| matches!(c.status, runner::CaseStatus::Passed))
        .count();
    let failed = outcome.cases.len() - passed;
    terminal::print_summary(cases.len(), passed, failed, outcome.elapsed);

    // Cases skipped by an aborted run count as not passed.
    if outcome.all_passed() && outcome.cases.len() == cases.len() {
        Ok(0)
    } else {
        Ok(1)
    }
}
