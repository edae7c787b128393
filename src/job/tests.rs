//! Unit tests for job models, run logs and command resolution.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use rstest::rstest;
use tracing_test::traced_test;

use super::*;
use crate::{
    device::{Endpoint, ScannedDevice},
    message::Message,
    transport::{SimulatedDevice, SimulatedFleet, simulated::Reply},
};

#[derive(Default)]
struct MapStore(Mutex<HashMap<String, Bytes>>);

impl MapStore {
    fn with(path: &str, data: &str) -> Self {
        let store = Self::default();
        store
            .0
            .lock()
            .expect("store lock")
            .insert(path.to_owned(), Bytes::copy_from_slice(data.as_bytes()));
        store
    }
}

#[async_trait]
impl AssetStore for MapStore {
    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError> {
        self.0
            .lock()
            .expect("store lock")
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_owned()))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        self.0
            .lock()
            .expect("store lock")
            .insert(path.to_owned(), Bytes::copy_from_slice(data));
        Ok(())
    }
}

const JOB_JSON: &str = r#"{
    "id": "wf-42",
    "name": "nightly",
    "location": "plant-7",
    "aud": ["ep:016eead293eb926ca57ba92703c00000", "svc:ignored"],
    "tasks": [
        {
            "id": "t1",
            "name": "Read file",
            "input_params": [
                {"name": "file_path", "type": "STRING", "value": "/var/log/app.log", "mandatory": true}
            ]
        },
        {
            "id": "t2",
            "name": "Write file",
            "description": "push config",
            "input_params": [
                {"name": "file_path", "type": "STRING", "value": "/etc/app/config.txt"},
                {"name": "file", "type": "FILE", "value": "asset-9"},
                {"name": "extra", "type": "BLOB", "value": "x"}
            ]
        }
    ]
}"#;

#[test]
fn job_parses_from_workflow_json() {
    let job: Job = serde_json::from_str(JOB_JSON).expect("job JSON");
    assert_eq!(job.workflow_id, "wf-42");
    assert_eq!(job.location, "plant-7");
    assert_eq!(job.tasks.len(), 2);
    assert_eq!(job.tasks[0].kind(), TaskKind::Read);
    assert_eq!(job.tasks[1].kind(), TaskKind::Write);
    assert_eq!(
        job.tasks[1].input(FILE_PARAM, ParamType::File),
        Some("asset-9")
    );
    assert_eq!(job.tasks[1].input_params[2].kind, ParamType::Other);
    assert_eq!(
        job.audience.endpoints().collect::<Vec<_>>(),
        ["016eead293eb926ca57ba92703c00000"]
    );
}

#[test]
fn input_lookup_matches_name_and_type() {
    let task = Task::new("t", READ_TASK)
        .with_input(TaskParam::new(FILE_PATH_PARAM, ParamType::File, "wrong"))
        .with_input(TaskParam::new(FILE_PATH_PARAM, ParamType::String, "/a/b"));
    assert_eq!(task.input(FILE_PATH_PARAM, ParamType::String), Some("/a/b"));
    assert_eq!(task.input(FILE_PARAM, ParamType::File), None);
}

#[rstest]
#[case("dev-a", true)]
#[case("dev-b", true)]
#[case("dev-c", false)]
#[case("", false)]
fn audience_admits_listed_endpoints(#[case] endpoint: &str, #[case] admitted: bool) {
    let audience = Audience::from_endpoints(["dev-a", "dev-b"]);
    assert_eq!(audience.admits(&Endpoint::new(endpoint)), admitted);
}

#[test]
fn audience_without_endpoint_entries_is_empty() {
    let audience: Audience = serde_json::from_str(r#"["svc:x", "user:y"]"#).expect("audience");
    assert!(audience.is_empty());
    assert_eq!(audience.entries().len(), 2);
}

#[test]
fn permission_scope_skips_unknown_tasks() {
    let job = Job::new(
        "wf",
        Audience::default(),
        vec![
            Task::new("t0", "Reboot"),
            Task::write_file("t1", "/a", "asset"),
            Task::write_file("t2", "/b", "asset"),
        ],
    );
    assert_eq!(job.permission_scope(), CONFIGURE_SCOPE);
}

#[test]
fn clean_run_log_uses_wire_names() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("timestamp");
    let log = DeviceRunLog::new(
        "wf-1",
        "dev-a",
        "plant-7",
        at,
        vec![TaskRunLog::succeeded("t1", Some("wf-1/dev-a/t1/output.txt".into()))],
    );
    assert_eq!(log.outcome, DeviceOutcome::Succeeded);
    assert_eq!(log.summary, CLEAN_RUN_SUMMARY);

    let json = serde_json::to_value(&log).expect("serialise");
    assert_eq!(json["workflow_id"], "wf-1");
    assert_eq!(json["device_id"], "dev-a");
    assert_eq!(json["status"], "SUCCEEDED");
    assert_eq!(json["location"], "plant-7");
    assert_eq!(json["log"], CLEAN_RUN_SUMMARY);
    assert_eq!(json["execution_time"], "2024-05-01T12:00:00Z");
    assert_eq!(json["task_runs"][0]["status"], "SUCCEEDED");
    assert_eq!(json["task_runs"][0]["error_code"], 0);
}

#[test]
fn unsuccessful_tasks_mark_the_device() {
    let log = DeviceRunLog::new(
        "wf-1",
        "dev-a",
        "",
        Utc::now(),
        vec![
            TaskRunLog::succeeded("t1", None),
            TaskRunLog::failed("t2", error::code::LINK_LOST),
            TaskRunLog::skipped("t3"),
        ],
    );
    assert_eq!(log.outcome, DeviceOutcome::HasFailures);
    assert_eq!(log.summary, "2 of 3 tasks did not succeed");
    assert_eq!(
        log.outcomes().collect::<Vec<_>>(),
        [TaskOutcome::Succeeded, TaskOutcome::Failed, TaskOutcome::Skipped]
    );
    let json = serde_json::to_value(&log).expect("serialise");
    assert_eq!(json["status"], "HAS_FAILURES");
    assert_eq!(json["task_runs"][2]["status"], "SKIPPED");
}

#[tokio::test]
async fn read_task_resolves_to_file_name() {
    let job = Job::new("wf", Audience::default(), Vec::new());
    let task = Task::read_file("t1", "/var/log/app.log");
    let command = FileCommandResolver
        .resolve(&job, &task, &MapStore::default())
        .await
        .expect("resolve");
    assert_eq!(command, DeviceCommand::new(Operation::Read).with_str("app.log"));
}

#[tokio::test]
async fn write_task_joins_name_and_asset_content() {
    let job = Job::new("wf", Audience::default(), Vec::new());
    let task = Task::write_file("t2", "/etc/app/config.txt", "asset-9");
    let store = MapStore::with(&asset_path("wf", "asset-9"), "mode=fast\n");
    let command = FileCommandResolver
        .resolve(&job, &task, &store)
        .await
        .expect("resolve");
    assert_eq!(
        command,
        DeviceCommand::new(Operation::Configure).with_str("config.txt^mode=fast\n")
    );
}

#[tokio::test]
async fn missing_asset_is_reported() {
    let job = Job::new("wf", Audience::default(), Vec::new());
    let task = Task::write_file("t2", "/etc/config.txt", "absent");
    let err = FileCommandResolver
        .resolve(&job, &task, &MapStore::default())
        .await
        .expect_err("asset is absent");
    assert!(matches!(
        err,
        ResolveError::Asset { ref asset, source: StoreError::NotFound(_) } if asset == "absent"
    ));
}

#[tokio::test]
async fn binary_asset_is_rejected() {
    let job = Job::new("wf", Audience::default(), Vec::new());
    let task = Task::write_file("t2", "/etc/blob", "bin");
    let store = MapStore::default();
    store
        .write_file(&asset_path("wf", "bin"), &[0xff, 0xfe])
        .await
        .expect("seed");
    let err = FileCommandResolver
        .resolve(&job, &task, &store)
        .await
        .expect_err("asset is not UTF-8");
    assert!(matches!(err, ResolveError::AssetNotText(_)));
}

#[rstest]
#[case::unknown(Task::new("t", "Reboot"))]
#[case::no_path(Task::new("t", READ_TASK))]
#[case::empty_path(Task::read_file("t", ""))]
#[tokio::test]
async fn unresolvable_tasks_fail(#[case] task: Task) {
    let job = Job::new("wf", Audience::default(), Vec::new());
    let err = FileCommandResolver
        .resolve(&job, &task, &MapStore::default())
        .await
        .expect_err("task cannot resolve");
    assert_eq!(TaskError::from(err).code(), error::code::UNRESOLVED);
}

#[test]
fn commands_encode_as_operation_messages() {
    let command = DeviceCommand::new(Operation::Read).with_str("app.log");
    let bytes = command.to_bytes().expect("encode");
    let (decoded, used) = DeviceCommand::from_bytes(&bytes).expect("decode");
    assert_eq!(used, bytes.len());
    assert_eq!(decoded, command);
}

#[rstest]
#[case("a/b/output.txt", true)]
#[case("single", true)]
#[case("", false)]
#[case("../escape", false)]
#[case("/abs/path", false)]
#[case("a/./b", true)]
#[tokio::test]
async fn fs_store_keeps_paths_inside_root(#[case] path: &str, #[case] allowed: bool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = FsAssetStore::new(dir.path());
    let result = store.write_file(path, b"data").await;
    assert_eq!(result.is_ok(), allowed, "{path}: {result:?}");
    if allowed {
        assert_eq!(store.read_file(path).await.expect("read back"), &b"data"[..]);
    } else {
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
    }
}

#[tokio::test]
async fn fs_store_reports_missing_assets() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = FsAssetStore::new(dir.path());
    assert!(matches!(
        store.read_file("wf/none").await,
        Err(StoreError::NotFound(path)) if path == "wf/none"
    ));
}

#[test]
fn output_path_nests_under_workflow_and_endpoint() {
    assert_eq!(
        output_path("wf", &Endpoint::new("dev-a"), "t1"),
        "wf/dev-a/t1/output.txt"
    );
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn runner_traces_each_device() {
    let device = SimulatedDevice::new("AA:00", "dev-a")
        .ack_delay(Duration::ZERO)
        .respond_with(|message| Reply::payload(message.to_vec()));
    let runner = JobRunner::new(
        SimulatedFleet::new().with_device(device),
        MapStore::default(),
        LogSink,
    );
    let job = Job::new(
        "wf",
        Audience::from_endpoints(["dev-a"]),
        vec![Task::read_file("t1", "/a")],
    );

    let report = runner
        .run(&job, &[ScannedDevice::new("AA:00"), ScannedDevice::new("AA:09")])
        .await
        .expect("job runs");

    assert_eq!(report.succeeded(), 1);
    assert!(logs_contain("device finished"));
    assert!(logs_contain("outcome=\"succeeded\""));
    assert!(logs_contain("outcome=\"connect_failed\""));
}
