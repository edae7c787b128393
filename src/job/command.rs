//! Device commands and the resolvers that build them from tasks.

use async_trait::async_trait;
use bincode::{Decode, Encode};
use derive_more::Display;
use log::debug;
use thiserror::Error;

use super::{
    Job,
    ParamType,
    Task,
    TaskKind,
    model::{FILE_PARAM, FILE_PATH_PARAM},
    store::{AssetStore, StoreError},
};

/// Separator between the file name and content of a configure command.
pub const CONFIGURE_SEPARATOR: char = '^';

/// Operation a device command performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Encode, Decode)]
pub enum Operation {
    #[display("read-data")]
    Read,
    #[display("configure")]
    Configure,
}

/// Typed argument of a device command.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum CommandParam {
    Str(String),
    Int(i64),
    Bytes(Vec<u8>),
}

/// Operation plus arguments, encoded with
/// [`Message`](crate::message::Message) into the operation message a session
/// sends.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DeviceCommand {
    pub operation: Operation,
    pub params: Vec<CommandParam>,
}

impl DeviceCommand {
    /// A command with no arguments.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            params: Vec::new(),
        }
    }

    /// Append a string argument.
    #[must_use]
    pub fn with_str(mut self, value: impl Into<String>) -> Self {
        self.params.push(CommandParam::Str(value.into()));
        self
    }
}

/// Reasons a task cannot be turned into a command.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No command is known for the task name.
    #[error("no command for task '{0}'")]
    UnsupportedTask(String),
    /// A required parameter is absent or empty.
    #[error("task '{task}' lacks parameter '{param}'")]
    MissingParam { task: String, param: &'static str },
    /// The asset to write could not be loaded.
    #[error("asset '{asset}' unavailable")]
    Asset {
        asset: String,
        #[source]
        source: StoreError,
    },
    /// The asset is not text.
    #[error("asset '{0}' is not UTF-8 text")]
    AssetNotText(String),
}

/// Turns a task into the command sent to each device.
#[async_trait]
pub trait CommandResolver: Send + Sync {
    /// Resolve `task` of `job`, loading any input assets from `assets`.
    async fn resolve(
        &self,
        job: &Job,
        task: &Task,
        assets: &dyn AssetStore,
    ) -> Result<DeviceCommand, ResolveError>;
}

/// Resolver for the "Read file" and "Write file" tasks.
///
/// Reads become [`Operation::Read`] with the file name. Writes become
/// [`Operation::Configure`] with `name^content`, where the content is the
/// asset stored at `<workflow id>/<asset id>`. Only the final path segment of
/// the on-device path is sent.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileCommandResolver;

fn file_name(path: &str) -> &str { path.rsplit('/').next().unwrap_or(path) }

fn required<'a>(task: &'a Task, param: &'static str, kind: ParamType) -> Result<&'a str, ResolveError> {
    task.input(param, kind)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ResolveError::MissingParam {
            task: task.id.clone(),
            param,
        })
}

/// Path of a workflow's input asset.
#[must_use]
pub fn asset_path(workflow_id: &str, asset: &str) -> String { format!("{workflow_id}/{asset}") }

#[async_trait]
impl CommandResolver for FileCommandResolver {
    async fn resolve(
        &self,
        job: &Job,
        task: &Task,
        assets: &dyn AssetStore,
    ) -> Result<DeviceCommand, ResolveError> {
        let command = match task.kind() {
            TaskKind::Read => {
                let path = required(task, FILE_PATH_PARAM, ParamType::String)?;
                DeviceCommand::new(Operation::Read).with_str(file_name(path))
            }
            TaskKind::Write => {
                let path = required(task, FILE_PATH_PARAM, ParamType::String)?;
                let asset = required(task, FILE_PARAM, ParamType::File)?;
                let raw = assets
                    .read_file(&asset_path(&job.workflow_id, asset))
                    .await
                    .map_err(|source| ResolveError::Asset {
                        asset: asset.to_owned(),
                        source,
                    })?;
                let content = std::str::from_utf8(&raw)
                    .map_err(|_| ResolveError::AssetNotText(asset.to_owned()))?;
                DeviceCommand::new(Operation::Configure).with_str(format!(
                    "{}{CONFIGURE_SEPARATOR}{content}",
                    file_name(path)
                ))
            }
            TaskKind::Other => return Err(ResolveError::UnsupportedTask(task.name.clone())),
        };
        debug!(
            "resolved task {} to {} command with {} params",
            task.id,
            command.operation,
            command.params.len()
        );
        Ok(command)
    }
}
