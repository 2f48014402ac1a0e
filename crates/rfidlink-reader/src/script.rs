//! Vendor configuration scripts.
//!
//! A script is an ordered list of commands. Each command is exchanged like
//! `send_command` and then followed by a pause that gives the reader time to
//! apply the setting before the next one.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One command of a configuration script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Command text including its line terminator.
    pub command: String,

    /// Pause after the reply, before the next command, in milliseconds.
    pub settle_ms: u64,
}

impl ScriptStep {
    pub fn new(command: impl Into<String>, settle: Duration) -> Self {
        Self {
            command: command.into(),
            settle_ms: u64::try_from(settle.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Command text without the line terminator, for logs and reports.
    pub fn label(&self) -> &str {
        self.command.trim_end()
    }
}

/// Ordered configuration commands sent by `configure_reader`.
///
/// The default is the DB02 UHF setup: full power, US region, continuous
/// inventory.
///
/// # Examples
///
/// ```
/// use rfidlink_reader::ConfigScript;
/// use std::time::Duration;
///
/// let script = ConfigScript::new()
///     .step("SET_POWER:20\r\n", Duration::from_millis(50))
///     .step("SET_REGION:EU\r\n", Duration::from_millis(50));
/// assert_eq!(script.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigScript {
    steps: Vec<ScriptStep>,
}

/// Pause between DB02 configuration commands.
pub const DB02_STEP_SETTLE: Duration = Duration::from_millis(50);

impl ConfigScript {
    /// Create an empty script.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// DB02 UHF reader setup.
    pub fn db02_uhf() -> Self {
        Self::new()
            .step("SET_POWER:30\r\n", DB02_STEP_SETTLE)
            .step("SET_REGION:US\r\n", DB02_STEP_SETTLE)
            .step("SET_MODE:CONTINUOUS\r\n", DB02_STEP_SETTLE)
    }

    /// Append a command.
    pub fn step(mut self, command: impl Into<String>, settle: Duration) -> Self {
        self.steps.push(ScriptStep::new(command, settle));
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for ConfigScript {
    fn default() -> Self {
        Self::db02_uhf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script_is_db02() {
        let script = ConfigScript::default();
        let labels: Vec<&str> = script.steps().iter().map(ScriptStep::label).collect();

        assert_eq!(
            labels,
            vec!["SET_POWER:30", "SET_REGION:US", "SET_MODE:CONTINUOUS"]
        );
        assert!(script.steps().iter().all(|s| s.command.ends_with("\r\n")));
        assert!(script.steps().iter().all(|s| s.settle() == DB02_STEP_SETTLE));
    }

    #[test]
    fn test_empty_script() {
        let script = ConfigScript::new();
        assert!(script.is_empty());
        assert_eq!(script.len(), 0);
    }

    #[test]
    fn test_oversized_pause_saturates() {
        let step = ScriptStep::new("SET_POWER:30\r\n", Duration::MAX);
        assert_eq!(step.settle_ms, u64::MAX);
    }

    #[test]
    fn test_script_serde() {
        let json = r#"[{"command":"SET_POWER:10\r\n","settle_ms":20}]"#;
        let script: ConfigScript = serde_json::from_str(json).unwrap();

        assert_eq!(script.len(), 1);
        assert_eq!(script.steps()[0].label(), "SET_POWER:10");
        assert_eq!(script.steps()[0].settle(), Duration::from_millis(20));
    }
}
