//! Collaborators a job hands data to: the asset store and the run sink.

use std::{
    io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use log::info;
use thiserror::Error;

use super::{DeviceRunLog, DeviceState};
use crate::device::DeviceAddress;

/// Errors raised by an [`AssetStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored at the path.
    #[error("no asset at '{0}'")]
    NotFound(String),
    /// The path escapes the store or is otherwise unusable.
    #[error("invalid asset path '{0}'")]
    InvalidPath(String),
    /// Underlying I/O failed.
    #[error("asset i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Error type returned by [`RunSink`] implementations.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Storage for task input assets and read outputs, addressed by
/// `/`-separated relative paths.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Load the asset at `path`.
    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError>;

    /// Store `data` at `path`, replacing any previous content.
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StoreError>;
}

/// Receives the results of a job run.
#[async_trait]
pub trait RunSink: Send + Sync {
    /// Persist one device's run log.
    async fn save_device_run_log(&self, log: &DeviceRunLog) -> Result<(), SinkError>;

    /// Record the final state of a device once the whole job has run.
    async fn update_device_state(
        &self,
        workflow_id: &str,
        device: &DeviceAddress,
        state: DeviceState,
    ) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: AssetStore + ?Sized> AssetStore for Arc<S> {
    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError> {
        (**self).read_file(path).await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        (**self).write_file(path, data).await
    }
}

#[async_trait]
impl<S: RunSink + ?Sized> RunSink for Arc<S> {
    async fn save_device_run_log(&self, log: &DeviceRunLog) -> Result<(), SinkError> {
        (**self).save_device_run_log(log).await
    }

    async fn update_device_state(
        &self,
        workflow_id: &str,
        device: &DeviceAddress,
        state: DeviceState,
    ) -> Result<(), SinkError> {
        (**self).update_device_state(workflow_id, device, state).await
    }
}

/// [`AssetStore`] rooted at a directory.
#[derive(Clone, Debug)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    /// Store assets beneath `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    /// Directory assets live under.
    #[must_use]
    pub fn root(&self) -> &Path { &self.root }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let contained = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !contained {
            return Err(StoreError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, data).await?;
        Ok(())
    }
}

/// [`RunSink`] that only logs what it receives.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl RunSink for LogSink {
    async fn save_device_run_log(&self, log: &DeviceRunLog) -> Result<(), SinkError> {
        info!(
            "run log: workflow={}, device={}, status={}, tasks={}",
            log.workflow_id,
            log.device_id,
            log.outcome,
            log.task_runs.len()
        );
        Ok(())
    }

    async fn update_device_state(
        &self,
        workflow_id: &str,
        device: &DeviceAddress,
        state: DeviceState,
    ) -> Result<(), SinkError> {
        info!("device state: workflow={workflow_id}, device={device}, state={state}");
        Ok(())
    }
}
