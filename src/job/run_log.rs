//! Run logs produced for each device.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Summary recorded when every task succeeded.
pub const CLEAN_RUN_SUMMARY: &str = "The command ran to completion without any hassle";

/// Result of one task on one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    #[display("succeeded")]
    Succeeded,
    #[display("failed")]
    Failed,
    /// Not attempted because the link dropped earlier.
    #[display("skipped")]
    Skipped,
}

impl TaskOutcome {
    /// Lowercase name used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Overall result of a device's task list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceOutcome {
    #[display("succeeded")]
    Succeeded,
    #[display("has failures")]
    HasFailures,
}

/// Persisted state of a device within a workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum DeviceState {
    Pending,
    Completed,
    Failed,
}

/// Record of one executed task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunLog {
    pub task_id: String,
    #[serde(rename = "status")]
    pub outcome: TaskOutcome,
    /// Reference to stored output, such as the asset path of a read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Zero unless the task failed.
    #[serde(default)]
    pub error_code: u32,
}

impl TaskRunLog {
    /// A successful task, optionally pointing at its output.
    #[must_use]
    pub fn succeeded(task_id: impl Into<String>, output: Option<String>) -> Self {
        Self {
            task_id: task_id.into(),
            outcome: TaskOutcome::Succeeded,
            output,
            error_code: 0,
        }
    }

    /// A failed task.
    #[must_use]
    pub fn failed(task_id: impl Into<String>, error_code: u32) -> Self {
        Self {
            task_id: task_id.into(),
            outcome: TaskOutcome::Failed,
            output: None,
            error_code,
        }
    }

    /// A task that was never attempted.
    #[must_use]
    pub fn skipped(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            outcome: TaskOutcome::Skipped,
            output: None,
            error_code: 0,
        }
    }
}

/// Record of one device's run, handed to the run sink once its tasks finish.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRunLog {
    pub workflow_id: String,
    /// Endpoint the device reported.
    pub device_id: String,
    #[serde(rename = "status")]
    pub outcome: DeviceOutcome,
    pub location: String,
    #[serde(rename = "execution_time")]
    pub executed_at: DateTime<Utc>,
    #[serde(rename = "log")]
    pub summary: String,
    pub task_runs: Vec<TaskRunLog>,
}

impl DeviceRunLog {
    /// Build a log from task results, deriving the outcome and summary.
    #[must_use]
    pub fn new(
        workflow_id: impl Into<String>,
        device_id: impl Into<String>,
        location: impl Into<String>,
        executed_at: DateTime<Utc>,
        task_runs: Vec<TaskRunLog>,
    ) -> Self {
        let unsuccessful = task_runs
            .iter()
            .filter(|run| run.outcome != TaskOutcome::Succeeded)
            .count();
        let (outcome, summary) = if unsuccessful == 0 {
            (DeviceOutcome::Succeeded, CLEAN_RUN_SUMMARY.to_owned())
        } else {
            (
                DeviceOutcome::HasFailures,
                format!("{unsuccessful} of {} tasks did not succeed", task_runs.len()),
            )
        };
        Self {
            workflow_id: workflow_id.into(),
            device_id: device_id.into(),
            outcome,
            location: location.into(),
            executed_at,
            summary,
            task_runs,
        }
    }

    /// Outcomes in task order.
    pub fn outcomes(&self) -> impl Iterator<Item = TaskOutcome> + '_ {
        self.task_runs.iter().map(|run| run.outcome)
    }
}
