use std::time::{Duration, Instant};

use thiserror::Error;

use crate::report::terminal;
use crate::telemetry::{InsightsClient, InsightsEvent, InsightsStore};

/// Default script budget, matching the hosted-monitor default.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_millis(180_000);

/// Raised from `end`/`end_test_case` when the run exceeds its budget.
/// Never swallowed by the timer — it unwinds through the caller.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error(
        "script timed out: {elapsed_ms}ms is longer than the script timeout threshold of {threshold_ms}ms"
    )]
    ScriptTimeout { elapsed_ms: u64, threshold_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Whole-run budget. Zero disables the check.
    pub script_timeout: Duration,
    /// Report per-step durations (remotely when the client is enabled,
    /// otherwise into the local store).
    pub step_logging: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            step_logging: false,
        }
    }
}

/// A finished step, kept for the `--timings` report.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: u64,
    pub label: String,
    pub test_case: String,
    pub duration: Duration,
}

/// Step timer/reporter.
///
/// Tracks the in-flight step, timestamps step boundaries against the run
/// start, prints step lines, and routes per-step durations to the telemetry
/// client or the local store. Steps move pending → started → finished in
/// strict order; `log` finishes the previous step before starting the next.
pub struct StepTimer {
    run_start: Instant,
    /// Offset from run start at the most recent step start.
    step_start: Duration,
    label: String,
    /// Next number `log_step` will assign.
    next_step: u64,
    /// Step number at the most recent start.
    last_step: u64,
    /// A step has started and not yet finished.
    in_flight: bool,
    config: TimerConfig,
    insights: InsightsClient,
    store: InsightsStore,
    finished: Vec<StepRecord>,
}

impl StepTimer {
    pub fn new(config: TimerConfig, insights: InsightsClient) -> Self {
        Self {
            run_start: Instant::now(),
            step_start: Duration::ZERO,
            label: String::new(),
            next_step: 0,
            last_step: 0,
            in_flight: false,
            config,
            insights,
            store: InsightsStore::default(),
            finished: Vec::new(),
        }
    }

    /// Elapsed time since the timer was constructed.
    pub fn elapsed(&self) -> Duration {
        self.run_start.elapsed()
    }

    /// Next step number `log_step` would assign.
    pub fn get_step(&self) -> u64 {
        self.next_step
    }

    pub fn current_step(&self) -> u64 {
        self.last_step
    }

    pub fn current_label(&self) -> &str {
        &self.label
    }

    pub fn store(&self) -> &InsightsStore {
        &self.store
    }

    pub fn finished_steps(&self) -> &[StepRecord] {
        &self.finished
    }

    /// Start the next auto-numbered step (numbering begins at 0).
    pub fn log_step(&mut self, label: &str) -> Result<(), TimerError> {
        let step = self.next_step;
        self.next_step += 1;
        self.log(step, label, "")
    }

    /// Start step `step`. If a prior step is still in flight and `step` is a
    /// new (greater) number, the prior step is finished first — which runs
    /// the full `end` path, timeout check included.
    pub fn log(&mut self, step: u64, label: &str, test_case: &str) -> Result<(), TimerError> {
        if self.in_flight && step > self.last_step {
            self.end(test_case)?;
        }
        self.step_start = self.run_start.elapsed();
        terminal::print_step_started(step, label, self.step_start, test_case);
        self.label = label.to_string();
        self.last_step = step;
        self.in_flight = true;
        Ok(())
    }

    /// Finish the current step. Returns its duration, or `ScriptTimeout`
    /// when the run budget is exhausted.
    pub fn end(&mut self, test_case: &str) -> Result<Duration, TimerError> {
        let elapsed = self.run_start.elapsed();
        let duration = elapsed.saturating_sub(self.step_start);
        terminal::print_step_finished(self.last_step, &self.label, duration, Some(test_case));
        self.report_step_duration(duration, test_case);
        self.finish(duration, test_case);
        self.check_timeout(elapsed)?;
        Ok(duration)
    }

    /// Finish the current step and close out the test case: status is stored
    /// as "Pass" unconditionally (last write wins — even after `error`), and
    /// a `SyntheticsTests` Pass event goes out when verbose+remote.
    pub fn end_test_case(&mut self, test_case: &str) -> Result<Duration, TimerError> {
        let elapsed = self.run_start.elapsed();
        let duration = elapsed.saturating_sub(self.step_start);
        terminal::print_step_finished(self.last_step, &self.label, duration, None);
        self.report_step_duration(duration, test_case);
        self.store.set("testCase", test_case);
        self.store.set("testCaseStatus", "Pass");
        if self.config.step_logging && self.insights.enabled() {
            self.insights
                .post_detached(InsightsEvent::test_result(test_case, true));
        }
        self.finish(duration, test_case);
        self.check_timeout(elapsed)?;
        Ok(duration)
    }

    /// Record a step failure for observability. Does not halt anything —
    /// re-raising the underlying error is the caller's responsibility.
    pub fn error(&mut self, message: &str, source_line: Option<u32>, test_case: &str) {
        terminal::print_step_error(self.last_step, &self.label);
        self.store.set("errorStep", self.last_step.to_string());
        self.store.set("errorMsg", message);
        if let Some(line) = source_line {
            self.store.set("errorLineNumber", line);
        }
        self.store.set("testCase", test_case);
        self.store.set("testCaseStatus", "Fail");
        if self.config.step_logging && self.insights.enabled() {
            self.insights
                .post_detached(InsightsEvent::test_result(test_case, false));
        }
    }

    /// Escape hatch: submit an arbitrary event through the client
    /// (fire-and-forget, metadata merged first, custom fields override).
    pub fn post_insights(&self, event: InsightsEvent) {
        self.insights.post_detached(event);
    }

    fn report_step_duration(&mut self, duration: Duration, test_case: &str) {
        if self.config.step_logging && self.insights.enabled() {
            self.insights.post_detached(
                InsightsEvent::step(self.last_step, &self.label, duration)
                    .with_custom("testCase", test_case),
            );
        } else if self.config.step_logging {
            self.store.set(
                format!("Step {}: {}", self.last_step, self.label),
                duration.as_millis() as u64,
            );
        }
    }

    fn finish(&mut self, duration: Duration, test_case: &str) {
        self.in_flight = false;
        self.finished.push(StepRecord {
            step: self.last_step,
            label: self.label.clone(),
            test_case: test_case.to_string(),
            duration,
        });
    }

    fn check_timeout(&self, elapsed: Duration) -> Result<(), TimerError> {
        if self.config.script_timeout > Duration::ZERO && elapsed > self.config.script_timeout {
            return Err(TimerError::ScriptTimeout {
                elapsed_ms: elapsed.as_millis() as u64,
                threshold_ms: self.config.script_timeout.as_millis() as u64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timer(timeout_ms: u64, step_logging: bool) -> StepTimer {
        StepTimer::new(
            TimerConfig {
                script_timeout: Duration::from_millis(timeout_ms),
                step_logging,
            },
            InsightsClient::disabled(),
        )
    }

    #[test]
    fn log_step_numbers_increase_from_zero() {
        let mut t = timer(0, false);
        assert_eq!(t.get_step(), 0);
        t.log_step("A").unwrap();
        assert_eq!(t.current_step(), 0);
        assert_eq!(t.get_step(), 1);
        t.log_step("B").unwrap();
        assert_eq!(t.current_step(), 1);
        assert_eq!(t.get_step(), 2);
    }

    #[test]
    fn log_finishes_the_prior_unfinished_step() {
        let mut t = timer(0, true);
        t.log(1, "first", "case").unwrap();
        t.log(2, "second", "case").unwrap();
        // Exactly one implicit finish for step 1, none yet for step 2.
        assert_eq!(t.finished_steps().len(), 1);
        assert_eq!(t.finished_steps()[0].step, 1);
        assert!(t.store().get("Step 1: first").is_some());
        assert!(t.store().get("Step 2: second").is_none());
    }

    #[test]
    fn no_implicit_finish_after_explicit_end() {
        let mut t = timer(0, false);
        t.log(1, "first", "case").unwrap();
        t.end("case").unwrap();
        t.log(2, "second", "case").unwrap();
        assert_eq!(t.finished_steps().len(), 1);
    }

    #[test]
    fn end_duration_tracks_step_start_offset() {
        let mut t = timer(0, false);
        t.log_step("A").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let d = t.end("case").unwrap();
        assert!(d >= Duration::from_millis(30));
        assert!(d < Duration::from_secs(5));
    }

    #[test]
    fn timeout_raises_with_elapsed_at_least_threshold() {
        let mut t = timer(50, false);
        t.log_step("slow").unwrap();
        std::thread::sleep(Duration::from_millis(80));
        match t.end("case") {
            Err(TimerError::ScriptTimeout {
                elapsed_ms,
                threshold_ms,
            }) => {
                assert!(elapsed_ms >= threshold_ms);
                assert_eq!(threshold_ms, 50);
            }
            other => panic!("expected ScriptTimeout, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_never_fails() {
        let mut t = timer(0, false);
        t.log_step("slow").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        t.end("case").unwrap();
    }

    #[test]
    fn implicit_finish_can_raise_timeout() {
        let mut t = timer(20, false);
        t.log(1, "first", "case").unwrap();
        std::thread::sleep(Duration::from_millis(40));
        assert!(t.log(2, "second", "case").is_err());
    }

    #[test]
    fn end_test_case_marks_pass_even_after_error() {
        let mut t = timer(0, false);
        t.log_step("A").unwrap();
        t.error("element not found", Some(3), "case1");
        assert_eq!(t.store().get("testCaseStatus"), Some(&json!("Fail")));
        t.end_test_case("case1").unwrap();
        assert_eq!(t.store().get("testCaseStatus"), Some(&json!("Pass")));
        assert_eq!(t.store().get("testCase"), Some(&json!("case1")));
    }

    #[test]
    fn error_records_step_and_message() {
        let mut t = timer(0, false);
        t.log(5, "Click css(.st-bw)", "case1").unwrap();
        t.error("no element matching .st-bw", Some(5), "case1");
        assert_eq!(t.store().get("errorStep"), Some(&json!("5")));
        assert_eq!(
            t.store().get("errorMsg"),
            Some(&json!("no element matching .st-bw"))
        );
        assert_eq!(t.store().get("errorLineNumber"), Some(&json!(5)));
    }

    // The worked example from the design discussion: a 100ms budget survives
    // a 50ms step and fails once total elapsed passes the threshold.
    #[test]
    fn budget_scenario() {
        let mut t = timer(100, false);
        t.log_step("A").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let d = t.end("case1").unwrap();
        assert!(d >= Duration::from_millis(50));
        t.log_step("B").unwrap();
        std::thread::sleep(Duration::from_millis(80));
        assert!(matches!(
            t.end("case1"),
            Err(TimerError::ScriptTimeout { .. })
        ));
    }
}
