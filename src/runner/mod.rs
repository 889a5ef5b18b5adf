use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::ResolvedRunConfig;
use crate::driver::{Browser, MonitorSession};
use crate::script::{Step, TestCase};
use crate::store;
use crate::telemetry::InsightsStore;
use crate::timer::{StepRecord, StepTimer};

#[derive(Debug)]
pub enum CaseStatus {
    Passed,
    Failed { step: u64, message: String },
}

#[derive(Debug)]
pub struct CaseResult {
    pub name: String,
    pub status: CaseStatus,
    pub duration: Duration,
}

/// Everything the reporting layer needs after a run.
pub struct RunOutcome {
    pub cases: Vec<CaseResult>,
    pub steps: Vec<StepRecord>,
    pub store: InsightsStore,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn all_passed(&self) -> bool {
        self.cases
            .iter()
            .all(|c| matches!(c.status, CaseStatus::Passed))
    }
}

/// Execute the monitor: one fresh tab per test case, steps strictly
/// sequential. The first failing case aborts the run — the failure is
/// recorded (and re-raised internally), never swallowed.
pub async fn run(config: &ResolvedRunConfig, cases: &[TestCase]) -> Result<RunOutcome> {
    store::clear_failures();
    let browser = Browser::launch(config.chrome_url.as_deref()).await?;
    let mut timer = StepTimer::new(config.timer_config(), config.insights_client());

    // Step numbers are assigned 1..N monotonically across the whole run
    // (scripted monitors conventionally number explicit steps from 1).
    let mut step_no: u64 = timer.get_step() + 1;
    let mut results = Vec::new();

    for case in cases {
        let case_start = timer.elapsed();
        match run_case(&browser, &mut timer, case, config, &mut step_no).await {
            Ok(()) => results.push(CaseResult {
                name: case.name.clone(),
                status: CaseStatus::Passed,
                duration: timer.elapsed() - case_start,
            }),
            Err(e) => {
                results.push(CaseResult {
                    name: case.name.clone(),
                    status: CaseStatus::Failed {
                        step: timer.current_step(),
                        message: format!("{e:#}"),
                    },
                    duration: timer.elapsed() - case_start,
                });
                break;
            }
        }
    }

    Ok(RunOutcome {
        cases: results,
        steps: timer.finished_steps().to_vec(),
        store: timer.store().clone(),
        elapsed: timer.elapsed(),
    })
}

async fn run_case(
    browser: &Browser,
    timer: &mut StepTimer,
    case: &TestCase,
    config: &ResolvedRunConfig,
    step_no: &mut u64,
) -> Result<()> {
    let mut session = browser
        .new_session(
            config.element_timeout(),
            config.monitor.user_agent.as_deref(),
        )
        .await?;
    debug!(case = %case.name, target_id = session.target_id(), "session ready");

    for (i, step) in case.steps.iter().enumerate() {
        // May raise ScriptTimeout via the implicit finish of the prior step.
        timer.log(*step_no, &step.label(), &case.name)?;
        *step_no += 1;

        if let Err(e) = execute_step(&mut session, step).await {
            // Record for observability, then re-raise: swallowing here would
            // silently mask the failure.
            timer.error(&format!("{e:#}"), Some((i + 1) as u32), &case.name);
            save_failure_screenshot(&mut session, case).await;
            let _ = browser.close_session(session).await;
            return Err(e);
        }
    }

    let finished = timer.end_test_case(&case.name);
    if let Err(e) = browser.close_session(session).await {
        warn!(error = %format!("{e:#}"), "failed to close tab");
    }
    finished?;
    Ok(())
}

async fn execute_step(session: &mut MonitorSession, step: &Step) -> Result<()> {
    match step {
        Step::Navigate { url } => session.navigate(url).await,
        Step::SetWindowSize { width, height } => session.set_window_size(*width, *height).await,
        Step::Sleep { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(())
        }
        Step::SwitchFrame { index } => session.switch_frame(*index).await,
        Step::WaitFor { selector } => session.wait_for_element(selector).await,
        Step::Click { selector } => session.click(selector).await,
    }
}

/// Best-effort failure artifact; never turns a step failure into an IO error.
async fn save_failure_screenshot(session: &mut MonitorSession, case: &TestCase) {
    match session.screenshot().await {
        Ok(png) => match store::write_failure_screenshot(&case.slug(), &png) {
            Ok(path) => info!(path = %path.display(), "failure screenshot saved"),
            Err(e) => warn!(error = %format!("{e:#}"), "failed to write failure screenshot"),
        },
        Err(e) => warn!(error = %format!("{e:#}"), "failed to capture failure screenshot"),
    }
}
