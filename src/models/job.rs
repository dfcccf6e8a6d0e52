use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::GatewayError;

/// The closed set of data-processing tasks the cluster knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskName {
    Recommender,
    Forecasting,
}

impl TaskName {
    pub const ALL: [TaskName; 2] = [TaskName::Recommender, TaskName::Forecasting];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Recommender => "recommender",
            TaskName::Forecasting => "forecasting",
        }
    }

    /// `recommender` -> `Recommender`, used in the human-readable application name.
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskName::Recommender => "Recommender",
            TaskName::Forecasting => "Forecasting",
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = GatewayError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        TaskName::ALL
            .into_iter()
            .find(|task| task.as_str() == wanted)
            .ok_or_else(|| {
                let known = TaskName::ALL.map(|t| t.as_str()).join(", ");
                GatewayError::InvalidTask(format!("unknown task {wanted:?}; expected one of: {known}"))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The literal command line handed to the resource manager.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One submitted unit of cluster work. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    job_id: String,
    task_name: TaskName,
    command: CommandSpec,
    submitted_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new(prefix: &str, task_name: TaskName, command: CommandSpec) -> Self {
        Self {
            job_id: format!("{}-{}-{}", prefix, task_name, Uuid::new_v4()),
            task_name,
            command,
            submitted_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn task_name(&self) -> TaskName {
        self.task_name
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSubmission {
    pub descriptor: JobDescriptor,
    /// Identifier assigned by the resource manager, when it reported one.
    pub application_id: Option<String>,
}
