use std::time::Duration;

use crate::runner::CaseStatus;
use crate::script::TestCase;
use crate::telemetry::InsightsStore;
use crate::timer::StepRecord;

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

/// `Step N: LABEL STARTED at Xms. testCase=NAME`
pub fn print_step_started(step: u64, label: &str, offset: Duration, test_case: &str) {
    println!(
        "Step {step}: {label} STARTED at {}ms. testCase={test_case}",
        offset.as_millis()
    );
}

/// `Step N: LABEL FINISHED. It took Xms to complete.` — the test case name is
/// appended for mid-case finishes and omitted when closing out a case.
pub fn print_step_finished(step: u64, label: &str, duration: Duration, test_case: Option<&str>) {
    let suffix = match test_case {
        Some(name) => format!(" testCase={name}"),
        None => String::new(),
    };
    println!(
        "Step {step}: {label} FINISHED. It took {}ms to complete.{suffix}",
        duration.as_millis()
    );
}

pub fn print_step_error(step: u64, label: &str) {
    println!("Error in Step {step}: {label}");
}

/// Print the monitor plan before the run starts.
pub fn print_plan(cases: &[TestCase]) {
    let steps: usize = cases.iter().map(|c| c.steps.len()).sum();
    println!("Running {} test case(s), {steps} step(s)", cases.len());
    println!();
}

/// Print a single test case result line.
pub fn print_case_line(name: &str, status: &CaseStatus, elapsed: Duration) {
    let time_suffix = format!("  \x1b[2m{}\x1b[0m", format_duration(elapsed));
    match status {
        CaseStatus::Passed => {
            println!("  \x1b[32mPASS\x1b[0m  {name}{time_suffix}");
        }
        CaseStatus::Failed { step, message } => {
            println!("  \x1b[31mFAIL\x1b[0m  {name}  (step {step}: {message}){time_suffix}");
        }
    }
}

/// Print the final summary.
pub fn print_summary(total: usize, passed: usize, failed: usize, elapsed: Duration) {
    println!();
    println!(
        "Test cases:  {total} total, \x1b[32m{passed} passed\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
    );
    println!("Time:        {}", format_duration(elapsed));
    if failed > 0 {
        println!();
        println!("{failed} test case(s) failed. See .synthmon/failures/ for screenshots.");
    }
}

/// Per-step timing table, in run order. Right-aligned duration column.
pub fn print_step_table(steps: &[StepRecord]) {
    if steps.is_empty() {
        return;
    }

    let label_width = steps
        .iter()
        .map(|s| s.label.len())
        .max()
        .unwrap_or(8)
        .clamp(8, 60);

    println!();
    println!("\x1b[1mStep timings:\x1b[0m");
    println!();
    println!(
        "  {:>4}  {:<width$}  {:>8}  Test case",
        "Step",
        "Label",
        "Duration",
        width = label_width
    );
    let sep_len = 4 + 2 + label_width + 2 + 8 + 2 + 9;
    print!("  ");
    for _ in 0..sep_len {
        print!("\u{2500}");
    }
    println!();
    for s in steps {
        println!(
            "  {:>4}  {:<width$}  {:>6}ms  {}",
            s.step,
            truncate_label(&s.label, label_width),
            s.duration.as_millis(),
            s.test_case,
            width = label_width
        );
    }
}

/// Dump the local observability store (`--insights`).
pub fn print_store(store: &InsightsStore) {
    if store.is_empty() {
        return;
    }
    println!();
    println!("\x1b[1mRecorded insights:\x1b[0m");
    for (key, value) in store.iter() {
        println!("  {key} = {value}");
    }
}

/// Truncate a label to `max` chars, keeping the head (the action verb).
fn truncate_label(label: &str, max: usize) -> String {
    let len = label.chars().count();
    if len <= max {
        label.to_string()
    } else {
        let truncated: String = label.chars().take(max - 1).collect();
        format!("{truncated}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_format_in_ms_then_seconds() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn long_labels_are_truncated_with_ellipsis() {
        let label = "a".repeat(80);
        let out = truncate_label(&label, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with('\u{2026}'));
    }
}
