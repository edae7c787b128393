//! Jobs, tasks and the audience a job may run against.
//!
//! These types deserialize from the workflow JSON handed out by the workflow
//! service, so field names follow its wire names.

use serde::{Deserialize, Serialize};

use crate::device::Endpoint;

/// Task name the workflow service uses for file reads.
pub const READ_TASK: &str = "Read file";
/// Task name the workflow service uses for file writes.
pub const WRITE_TASK: &str = "Write file";
/// Parameter naming the on-device file path.
pub const FILE_PATH_PARAM: &str = "file_path";
/// Parameter naming the asset to write.
pub const FILE_PARAM: &str = "file";

/// Permission needed to read data from a device.
pub const READ_SCOPE: &str = "read-data";
/// Permission needed to configure a device.
pub const CONFIGURE_SCOPE: &str = "configure";

const AUDIENCE_PREFIX: &str = "ep:";

/// Type tag of a task parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "FILE")]
    File,
    #[serde(other)]
    Other,
}

/// One input or output parameter of a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub value: String,
    #[serde(default)]
    pub mandatory: bool,
}

impl TaskParam {
    /// Build a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            mandatory: false,
        }
    }
}

/// What a task does, derived from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Read a file from the device.
    Read,
    /// Write a file to the device.
    Write,
    /// A task this crate has no built-in command for.
    Other,
}

/// One step of a job, run against every matching device in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub input_params: Vec<TaskParam>,
    #[serde(default)]
    pub output_params: Vec<TaskParam>,
}

impl Task {
    /// A task with no parameters.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            mandatory: false,
            input_params: Vec::new(),
            output_params: Vec::new(),
        }
    }

    /// A "Read file" task for `path`.
    #[must_use]
    pub fn read_file(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(id, READ_TASK).with_input(TaskParam::new(FILE_PATH_PARAM, ParamType::String, path))
    }

    /// A "Write file" task copying asset `asset` to `path`.
    #[must_use]
    pub fn write_file(
        id: impl Into<String>,
        path: impl Into<String>,
        asset: impl Into<String>,
    ) -> Self {
        Self::new(id, WRITE_TASK)
            .with_input(TaskParam::new(FILE_PATH_PARAM, ParamType::String, path))
            .with_input(TaskParam::new(FILE_PARAM, ParamType::File, asset))
    }

    /// Append an input parameter.
    #[must_use]
    pub fn with_input(mut self, param: TaskParam) -> Self {
        self.input_params.push(param);
        self
    }

    /// Classify the task by name.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        match self.name.as_str() {
            READ_TASK => TaskKind::Read,
            WRITE_TASK => TaskKind::Write,
            _ => TaskKind::Other,
        }
    }

    /// Value of the first input parameter with this name and type.
    #[must_use]
    pub fn input(&self, name: &str, kind: ParamType) -> Option<&str> {
        self.input_params
            .iter()
            .find(|param| param.name == name && param.kind == kind)
            .map(|param| param.value.as_str())
    }
}

/// Endpoints a job is authorised to run against, as `ep:<endpoint>` entries.
///
/// # Examples
///
/// ```
/// use sdalink::{device::Endpoint, job::Audience};
///
/// let audience = Audience::from_endpoints(["016eead293eb926ca57ba92703c00000"]);
/// assert!(audience.admits(&Endpoint::new("016eead293eb926ca57ba92703c00000")));
/// assert!(!audience.admits(&Endpoint::new("other")));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Audience(Vec<String>);

impl Audience {
    /// Build an audience from bare endpoint names.
    #[must_use]
    pub fn from_endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            endpoints
                .into_iter()
                .map(|endpoint| format!("{AUDIENCE_PREFIX}{}", endpoint.as_ref()))
                .collect(),
        )
    }

    /// Endpoint names listed in the audience. Entries without the `ep:`
    /// prefix are ignored.
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter_map(|entry| entry.strip_prefix(AUDIENCE_PREFIX))
    }

    /// Whether `endpoint` may be operated on.
    #[must_use]
    pub fn admits(&self, endpoint: &Endpoint) -> bool {
        !endpoint.is_empty() && self.endpoints().any(|name| name == endpoint.as_str())
    }

    /// Raw audience entries.
    #[must_use]
    pub fn entries(&self) -> &[String] { &self.0 }

    /// Whether the audience names no endpoint.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.endpoints().next().is_none() }
}

/// A workflow: the tasks to run and the devices allowed to run them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "id")]
    pub workflow_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "aud")]
    pub audience: Audience,
    pub tasks: Vec<Task>,
}

impl Job {
    /// A job with no name or location.
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, audience: Audience, tasks: Vec<Task>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: String::new(),
            location: String::new(),
            audience,
            tasks,
        }
    }

    /// Set the location tag copied into run logs.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Space-separated permission scopes the tasks need, in first-use order.
    ///
    /// # Examples
    ///
    /// ```
    /// use sdalink::job::{Audience, Job, Task};
    ///
    /// let job = Job::new(
    ///     "wf-1",
    ///     Audience::default(),
    ///     vec![
    ///         Task::read_file("t1", "/data/a"),
    ///         Task::write_file("t2", "/data/b", "asset"),
    ///         Task::read_file("t3", "/data/c"),
    ///     ],
    /// );
    /// assert_eq!(job.permission_scope(), "read-data configure");
    /// ```
    #[must_use]
    pub fn permission_scope(&self) -> String {
        let mut scopes: Vec<&str> = Vec::new();
        for task in &self.tasks {
            let scope = match task.kind() {
                TaskKind::Read => READ_SCOPE,
                TaskKind::Write => CONFIGURE_SCOPE,
                TaskKind::Other => continue,
            };
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        scopes.join(" ")
    }
}
