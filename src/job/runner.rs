//! Sequential execution of a job across scanned devices.

use std::{fmt, sync::Arc};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{
    AssetStore,
    CommandResolver,
    DeviceOutcome,
    DeviceRunLog,
    DeviceState,
    FileCommandResolver,
    Job,
    JobError,
    RunSink,
    Task,
    TaskError,
    TaskKind,
    TaskRunLog,
};
use crate::{
    device::{DeviceAddress, Endpoint, ScannedDevice},
    message::Message,
    session::{SessionConfig, TransportSession},
    transport::{Transport, TransportFactory},
};

/// File name read outputs are stored under.
pub const OUTPUT_FILE_NAME: &str = "output.txt";

/// Where the output of a read task is stored.
#[must_use]
pub fn output_path(workflow_id: &str, endpoint: &Endpoint, task_id: &str) -> String {
    format!("{workflow_id}/{endpoint}/{task_id}/{OUTPUT_FILE_NAME}")
}

/// What happened to one scanned device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceDisposition {
    /// Tasks ran; the log records each outcome.
    Ran(DeviceRunLog),
    /// The device could not be connected.
    ConnectFailed { reason: String },
    /// MTU negotiation failed after connecting.
    MtuFailed { reason: String },
    /// The endpoint is not in the audience or could not be read.
    AudienceMismatch { endpoint: Option<Endpoint> },
    /// The job was cancelled before the device finished.
    NotRun,
}

impl DeviceDisposition {
    /// Short name used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ran(log) if log.outcome == DeviceOutcome::Succeeded => "succeeded",
            Self::Ran(_) => "has_failures",
            Self::ConnectFailed { .. } => "connect_failed",
            Self::MtuFailed { .. } => "mtu_failed",
            Self::AudienceMismatch { .. } => "audience_mismatch",
            Self::NotRun => "not_run",
        }
    }

    /// State persisted for the device after the job.
    #[must_use]
    pub fn device_state(&self) -> DeviceState {
        match self {
            Self::Ran(_) => DeviceState::Completed,
            Self::NotRun => DeviceState::Pending,
            _ => DeviceState::Failed,
        }
    }

    /// Run log, when tasks ran.
    #[must_use]
    pub fn run_log(&self) -> Option<&DeviceRunLog> {
        match self {
            Self::Ran(log) => Some(log),
            _ => None,
        }
    }
}

/// Disposition of one device, in scan order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceReport {
    pub address: DeviceAddress,
    pub disposition: DeviceDisposition,
}

/// Result of a whole job run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobReport {
    devices: Vec<DeviceReport>,
    cancelled: bool,
}

impl JobReport {
    /// Per-device results in scan order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceReport] { &self.devices }

    /// Whether the run stopped early.
    #[must_use]
    pub fn was_cancelled(&self) -> bool { self.cancelled }

    /// Run logs in scan order.
    pub fn run_logs(&self) -> impl Iterator<Item = &DeviceRunLog> {
        self.devices
            .iter()
            .filter_map(|report| report.disposition.run_log())
    }

    /// Devices whose tasks all succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.run_logs()
            .filter(|log| log.outcome == DeviceOutcome::Succeeded)
            .count()
    }

    /// Devices that ran with at least one unsuccessful task.
    #[must_use]
    pub fn with_failures(&self) -> usize {
        self.run_logs()
            .filter(|log| log.outcome == DeviceOutcome::HasFailures)
            .count()
    }

    /// Devices that never ran tasks, cancellation aside.
    #[must_use]
    pub fn unreachable(&self) -> usize {
        self.devices
            .iter()
            .filter(|report| {
                !matches!(
                    report.disposition,
                    DeviceDisposition::Ran(_) | DeviceDisposition::NotRun
                )
            })
            .count()
    }

    /// Devices left untouched by cancellation.
    #[must_use]
    pub fn not_run(&self) -> usize {
        self.devices
            .iter()
            .filter(|report| report.disposition == DeviceDisposition::NotRun)
            .count()
    }

    /// Unsuccessful tasks across every device.
    #[must_use]
    pub fn failed_tasks(&self) -> usize {
        self.run_logs()
            .flat_map(DeviceRunLog::outcomes)
            .filter(|outcome| *outcome != super::TaskOutcome::Succeeded)
            .count()
    }
}

/// Runs a job against devices one at a time.
///
/// Each device gets its own [`TransportSession`] built from the factory's
/// transport. Failures stay with the device they happened on: an unreachable
/// device is recorded and the runner moves on, a failed task is logged and
/// the next task still runs, and a dropped link skips only that device's
/// remaining tasks.
pub struct JobRunner<F> {
    factory: F,
    assets: Arc<dyn AssetStore>,
    sink: Arc<dyn RunSink>,
    resolver: Arc<dyn CommandResolver>,
    session_config: SessionConfig,
    cancel: CancellationToken,
}

impl<F> fmt::Debug for JobRunner<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("session_config", &self.session_config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<F: TransportFactory> JobRunner<F> {
    /// Create a runner using [`FileCommandResolver`] and default session
    /// settings.
    #[must_use]
    pub fn new(
        factory: F,
        assets: impl AssetStore + 'static,
        sink: impl RunSink + 'static,
    ) -> Self {
        Self {
            factory,
            assets: Arc::new(assets),
            sink: Arc::new(sink),
            resolver: Arc::new(FileCommandResolver),
            session_config: SessionConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the command resolver.
    #[must_use]
    pub fn resolver(mut self, resolver: impl CommandResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Replace the session settings.
    #[must_use]
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config.normalized();
        self
    }

    /// Stop the run when `token` is cancelled.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run `job` against `devices` in order.
    ///
    /// Every device gets a [`DeviceReport`]. After the last device each
    /// device's final [`DeviceState`] goes to the run sink in scan order.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when the job has no tasks or no audience; no
    /// device is contacted in that case.
    pub async fn run(&self, job: &Job, devices: &[ScannedDevice]) -> Result<JobReport, JobError> {
        if job.tasks.is_empty() {
            return Err(JobError::NoTasks(job.workflow_id.clone()));
        }
        if job.audience.is_empty() {
            return Err(JobError::EmptyAudience(job.workflow_id.clone()));
        }
        info!(
            "running job {}: devices={}, tasks={}, scope={}",
            job.workflow_id,
            devices.len(),
            job.tasks.len(),
            job.permission_scope()
        );

        let mut reports = Vec::with_capacity(devices.len());
        for device in devices {
            if self.cancel.is_cancelled() {
                break;
            }
            let span = tracing::info_span!("device", address = %device.address);
            let disposition = self.run_device(job, device).instrument(span).await;
            crate::metrics::inc_device_outcome(disposition.label());
            tracing::info!(
                address = %device.address,
                outcome = disposition.label(),
                "device finished"
            );
            reports.push(DeviceReport {
                address: device.address.clone(),
                disposition,
            });
        }
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            warn!("job {} cancelled", job.workflow_id);
        }
        for device in devices.iter().skip(reports.len()) {
            reports.push(DeviceReport {
                address: device.address.clone(),
                disposition: DeviceDisposition::NotRun,
            });
        }

        for report in &reports {
            let state = report.disposition.device_state();
            if let Err(err) = self
                .sink
                .update_device_state(&job.workflow_id, &report.address, state)
                .await
            {
                warn!("failed to record state of {}: {err}", report.address);
            }
        }

        Ok(JobReport {
            devices: reports,
            cancelled,
        })
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    async fn run_device(&self, job: &Job, device: &ScannedDevice) -> DeviceDisposition {
        let transport = self.factory.create(&device.address);
        let mut session =
            TransportSession::new(transport, device.address.clone(), self.session_config);
        let disposition = select! {
            () = self.cancel.cancelled() => DeviceDisposition::NotRun,
            disposition = self.drive(job, &mut session) => disposition,
        };
        session.disconnect().await;
        disposition
    }

    async fn drive<T: Transport>(
        &self,
        job: &Job,
        session: &mut TransportSession<T>,
    ) -> DeviceDisposition {
        if let Err(err) = session.connect().await {
            return DeviceDisposition::ConnectFailed {
                reason: err.to_string(),
            };
        }
        if let Err(err) = session.request_preferred_mtu().await {
            return DeviceDisposition::MtuFailed {
                reason: err.to_string(),
            };
        }
        let endpoint = match session.read_endpoint().await {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!("cannot identify {}: {err}", session.address());
                return DeviceDisposition::AudienceMismatch { endpoint: None };
            }
        };
        if !job.audience.admits(&endpoint) {
            warn!(
                "{} reports endpoint {endpoint}, which is not in the audience",
                session.address()
            );
            return DeviceDisposition::AudienceMismatch {
                endpoint: Some(endpoint),
            };
        }

        let task_runs = self.run_tasks(job, &endpoint, session).await;
        if session.state().accepts_commands()
            && let Err(err) = session.finish()
        {
            debug!("could not mark {endpoint} complete: {err}");
        }
        let log = DeviceRunLog::new(
            job.workflow_id.as_str(),
            endpoint.as_str(),
            job.location.as_str(),
            Utc::now(),
            task_runs,
        );
        if let Err(err) = self.sink.save_device_run_log(&log).await {
            warn!("failed to save run log for {endpoint}: {err}");
        }
        DeviceDisposition::Ran(log)
    }

    async fn run_tasks<T: Transport>(
        &self,
        job: &Job,
        endpoint: &Endpoint,
        session: &mut TransportSession<T>,
    ) -> Vec<TaskRunLog> {
        let mut runs = Vec::with_capacity(job.tasks.len());
        let mut tasks = job.tasks.iter();
        for task in tasks.by_ref() {
            let (run, link_lost) = match self.run_task(job, endpoint, task, session).await {
                Ok(output) => (TaskRunLog::succeeded(task.id.as_str(), output), false),
                Err(err) => {
                    warn!("task {} failed on {endpoint}: {err}", task.id);
                    (
                        TaskRunLog::failed(task.id.as_str(), err.code()),
                        err.is_link_lost(),
                    )
                }
            };
            crate::metrics::inc_task_outcome(run.outcome.as_str());
            runs.push(run);
            if link_lost {
                break;
            }
        }
        for task in tasks {
            let run = TaskRunLog::skipped(task.id.as_str());
            crate::metrics::inc_task_outcome(run.outcome.as_str());
            runs.push(run);
        }
        runs
    }

    async fn run_task<T: Transport>(
        &self,
        job: &Job,
        endpoint: &Endpoint,
        task: &Task,
        session: &mut TransportSession<T>,
    ) -> Result<Option<String>, TaskError> {
        let command = self
            .resolver
            .resolve(job, task, self.assets.as_ref())
            .await?;
        let message = command.to_bytes()?;
        let response = session.send_message(&message).await?;
        if response.is_empty() {
            return Err(TaskError::EmptyResponse);
        }
        if task.kind() != TaskKind::Read {
            return Ok(None);
        }
        let path = output_path(&job.workflow_id, endpoint, &task.id);
        self.assets
            .write_file(&path, &response)
            .await
            .map_err(TaskError::Store)?;
        Ok(Some(path))
    }
}
