use serde::{Deserialize, Serialize};

/// One browser action inside a test case.
///
/// Steps deserialize from `[[case.step]]` tables; the `type` key selects the
/// variant. Selectors are passed to the page verbatim (CSS only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Step {
    /// Open a URL and wait for the load event.
    Navigate { url: String },
    /// Resize the emulated browser window.
    SetWindowSize { width: u32, height: u32 },
    /// Fixed-duration wait.
    Sleep { ms: u64 },
    /// Scope subsequent element lookups to the Nth iframe of the current
    /// document (0-based). Reset by the next `navigate`.
    SwitchFrame { index: usize },
    /// Wait until a selector matches, bounded by the element timeout.
    WaitFor { selector: String },
    /// Wait for a selector, then click the element's center.
    Click { selector: String },
}

impl Step {
    /// Human-readable label used in step lines and telemetry messages.
    pub fn label(&self) -> String {
        match self {
            Step::Navigate { url } => format!("Open URL {url}"),
            Step::SetWindowSize { width, height } => {
                format!("Set window size {width}x{height}")
            }
            Step::Sleep { ms } => format!("Wait {ms}ms"),
            Step::SwitchFrame { index } => format!("Switch to frame {index}"),
            Step::WaitFor { selector } => format!("Wait for css({selector})"),
            Step::Click { selector } => format!("Click css({selector})"),
        }
    }
}

/// A named group of steps whose aggregate pass/fail status is reported once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(rename = "step")]
    pub steps: Vec<Step>,
}

impl TestCase {
    /// Case-insensitive substring match against the case name.
    pub fn matches_filter(&self, pattern: &str) -> bool {
        self.name.to_lowercase().contains(&pattern.to_lowercase())
    }

    /// Case name as a filesystem-safe slug (failure artifacts).
    pub fn slug(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_deserialize_by_type_tag() {
        let toml = r#"
            name = "Sample Size for Proportions"

            [[step]]
            type = "navigate"
            url = "https://abtester.app/"

            [[step]]
            type = "set-window-size"
            width = 1440
            height = 875

            [[step]]
            type = "sleep"
            ms = 20000

            [[step]]
            type = "switch-frame"
            index = 0

            [[step]]
            type = "click"
            selector = ".st-bw"
        "#;
        let case: TestCase = toml::from_str(toml).unwrap();
        assert_eq!(case.steps.len(), 5);
        assert!(matches!(case.steps[0], Step::Navigate { .. }));
        assert!(matches!(
            case.steps[1],
            Step::SetWindowSize {
                width: 1440,
                height: 875
            }
        ));
        assert!(matches!(case.steps[3], Step::SwitchFrame { index: 0 }));
    }

    #[test]
    fn labels_describe_the_action() {
        assert_eq!(
            Step::Navigate {
                url: "https://abtester.app/".into()
            }
            .label(),
            "Open URL https://abtester.app/"
        );
        assert_eq!(
            Step::SetWindowSize {
                width: 1440,
                height: 875
            }
            .label(),
            "Set window size 1440x875"
        );
        assert_eq!(Step::Sleep { ms: 20000 }.label(), "Wait 20000ms");
        assert_eq!(Step::SwitchFrame { index: 0 }.label(), "Switch to frame 0");
        assert_eq!(
            Step::Click {
                selector: "#bui-8__anchor .css-8ojfln".into()
            }
            .label(),
            "Click css(#bui-8__anchor .css-8ojfln)"
        );
    }

    #[test]
    fn filter_is_case_insensitive() {
        let case = TestCase {
            name: "Sample Size for Proportions".into(),
            steps: Vec::new(),
        };
        assert!(case.matches_filter("proportions"));
        assert!(case.matches_filter("Sample Size"));
        assert!(!case.matches_filter("significance"));
    }

    #[test]
    fn slug_is_filesystem_safe() {
        let case = TestCase {
            name: "Sample Size for Proportions".into(),
            steps: Vec::new(),
        };
        assert_eq!(case.slug(), "Sample_Size_for_Proportions");
    }
}
