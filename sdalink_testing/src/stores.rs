//! In-memory [`AssetStore`] and [`RunSink`] doubles.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use bytes::Bytes;
use sdalink::{
    device::DeviceAddress,
    job::{AssetStore, DeviceRunLog, DeviceState, RunSink, SinkError, StoreError},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Asset store backed by a map of paths to contents.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    files: Mutex<BTreeMap<String, Bytes>>,
}

impl MemoryAssetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Seed an asset.
    #[must_use]
    pub fn with_file(self, path: &str, data: impl Into<Bytes>) -> Self {
        lock(&self.files).insert(path.to_owned(), data.into());
        self
    }

    /// Contents at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Bytes> { lock(&self.files).get(path).cloned() }

    /// Stored paths in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> { lock(&self.files).keys().cloned().collect() }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError> {
        self.get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_owned()))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        lock(&self.files).insert(path.to_owned(), Bytes::copy_from_slice(data));
        Ok(())
    }
}

/// Sink that keeps every run log and state update it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    logs: Mutex<Vec<DeviceRunLog>>,
    states: Mutex<Vec<(String, DeviceAddress, DeviceState)>>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Run logs in the order they were saved.
    #[must_use]
    pub fn logs(&self) -> Vec<DeviceRunLog> { lock(&self.logs).clone() }

    /// Final device states in the order they were recorded.
    #[must_use]
    pub fn states(&self) -> Vec<(DeviceAddress, DeviceState)> {
        lock(&self.states)
            .iter()
            .map(|(_, address, state)| (address.clone(), *state))
            .collect()
    }

    /// Workflow ids attached to state updates.
    #[must_use]
    pub fn state_workflows(&self) -> Vec<String> {
        lock(&self.states)
            .iter()
            .map(|(workflow, _, _)| workflow.clone())
            .collect()
    }
}

#[async_trait]
impl RunSink for RecordingSink {
    async fn save_device_run_log(&self, log: &DeviceRunLog) -> Result<(), SinkError> {
        lock(&self.logs).push(log.clone());
        Ok(())
    }

    async fn update_device_state(
        &self,
        workflow_id: &str,
        device: &DeviceAddress,
        state: DeviceState,
    ) -> Result<(), SinkError> {
        lock(&self.states).push((workflow_id.to_owned(), device.clone(), state));
        Ok(())
    }
}
