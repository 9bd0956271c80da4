//! End-to-end runs of the sequencer against a scripted engine.

use super::{RunReport, WorkflowSequencer, LAUNCH_STAGE, PROVISION_STAGE, STAGE_STAGE};
use crate::config::RuntimeConfig;
use crate::errors::{LaunchError, MsaflowError, ProvisioningError};
use crate::events::{
    CollectingEventSink, EPILOGUE_FINISHED, STAGE_COMPLETED, STAGE_FAILED, STAGE_STARTED,
};
use crate::params::{ParamSchema, ParameterSet};
use crate::platform::{FixedExecutionName, MockProvisioningClient, MockRemoteStore, VolumeHandle};
use crate::stages::EpilogueOutcome;
use crate::testing::{engine_script, CannedHttpServer, CannedResponse, WorkspaceFixture};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn params(value: serde_json::Value) -> ParameterSet {
    ParameterSet::from_json(Arc::new(ParamSchema::multiple_sequence_align()), &value).unwrap()
}

fn valid_params() -> ParameterSet {
    params(serde_json::json!({
        "input": "latch:///samplesheet.csv",
        "outdir": "latch:///results",
        "skip_shiny": true,
        "email": null,
    }))
}

fn sequencer(config: RuntimeConfig, events: &Arc<CollectingEventSink>) -> WorkflowSequencer {
    WorkflowSequencer::from_config(config)
        .unwrap()
        .with_execution_name_resolver(Arc::new(FixedExecutionName::new("run-1")))
        .with_event_sink(events.clone())
}

async fn run_with_server(
    fixture: &WorkspaceFixture,
    response: CannedResponse,
) -> (CannedHttpServer, Arc<CollectingEventSink>, Result<RunReport, MsaflowError>) {
    let server = CannedHttpServer::start(response).await;
    let mut config = fixture.config();
    config.provisioning.endpoint = server.url("/provision-storage");
    let events = Arc::new(CollectingEventSink::new());

    let result = sequencer(config, &events).run(&valid_params()).await;
    (server, events, result)
}

#[tokio::test]
async fn test_full_run() {
    let fixture = WorkspaceFixture::new();
    fixture.write_source("run", &engine_script(0, true));
    fixture.write_source("work/old-task/.command.sh", "stale");

    let (server, events, result) =
        run_with_server(&fixture, CannedResponse::json(200, r#"{"name":"pvc-1"}"#)).await;
    let report = result.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/provision-storage");
    assert_eq!(
        requests[0].header("authorization"),
        Some("Latch-Execution-Token abc123")
    );
    assert_eq!(requests[0].json(), serde_json::json!({"storage_gib": 100}));

    assert_eq!(report.volume, VolumeHandle::new("pvc-1"));
    assert_eq!(
        report.stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec![PROVISION_STAGE, STAGE_STAGE, LAUNCH_STAGE]
    );
    assert!(report.stages.iter().all(|s| s.is_success()));
    assert_eq!(report.staging.files_copied, 3);
    assert_eq!(report.staging.excluded, 1);
    assert!(matches!(report.launch.epilogue, EpilogueOutcome::Uploaded { .. }));

    assert_eq!(fixture.read_shared("claim.txt").unwrap().trim(), "pvc-1");
    let invocation = fixture.read_shared("invocation.txt").unwrap();
    assert!(invocation.lines().any(|line| line == "--skip_shiny"));
    assert!(!invocation.lines().any(|line| line == "--email"));
    assert!(fixture
        .mirror()
        .join("your_log_dir/nf_nf_core_multiplesequencealign/run-1/nextflow.log")
        .exists());

    assert_eq!(
        events.stages_with(STAGE_COMPLETED),
        vec![PROVISION_STAGE, STAGE_STAGE, LAUNCH_STAGE]
    );
    assert_eq!(events.events_of_type(EPILOGUE_FINISHED).len(), 1);
}

#[tokio::test]
async fn test_provisioning_failure_stops_before_staging() {
    let fixture = WorkspaceFixture::new();
    fixture.write_source("run", &engine_script(0, true));

    let (_server, events, result) =
        run_with_server(&fixture, CannedResponse::json(500, "internal error")).await;

    assert!(matches!(
        result.unwrap_err(),
        MsaflowError::Provisioning(ProvisioningError::Status { status: 500, .. })
    ));
    assert!(!fixture.shared().exists());
    assert_eq!(events.stages_with(STAGE_STARTED), vec![PROVISION_STAGE]);
    assert_eq!(events.stages_with(STAGE_FAILED), vec![PROVISION_STAGE]);
    assert!(events.events_of_type(EPILOGUE_FINISHED).is_empty());
}

#[tokio::test]
async fn test_missing_token_makes_no_request() {
    let fixture = WorkspaceFixture::new();
    let config = fixture.config().with_execution_token(None);
    let mut client = MockProvisioningClient::new();
    client.expect_provision().times(0);
    let events = Arc::new(CollectingEventSink::new());

    let err = sequencer(config, &events)
        .with_provisioning_client(Arc::new(client))
        .run(&valid_params())
        .await
        .unwrap_err();

    assert!(matches!(err, MsaflowError::Configuration(_)));
    assert!(!fixture.shared().exists());
}

#[tokio::test]
async fn test_invalid_params_have_no_side_effects() {
    let fixture = WorkspaceFixture::new();
    let mut client = MockProvisioningClient::new();
    client.expect_provision().times(0);
    let events = Arc::new(CollectingEventSink::new());

    let missing_outdir = params(serde_json::json!({ "input": "latch:///samplesheet.csv" }));
    let err = sequencer(fixture.config(), &events)
        .with_provisioning_client(Arc::new(client))
        .run(&missing_outdir)
        .await
        .unwrap_err();

    assert!(matches!(err, MsaflowError::Configuration(_)));
    assert!(err.to_string().contains("outdir"));
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_failed_pipeline_uploads_log_and_fails_run() {
    let fixture = WorkspaceFixture::new();
    fixture.write_source("run", &engine_script(1, true));
    let mut client = MockProvisioningClient::new();
    client
        .expect_provision()
        .times(1)
        .returning(|_, _| Ok(VolumeHandle::new("pvc-2")));
    let mut store = MockRemoteStore::new();
    store
        .expect_upload()
        .withf(|_, remote| {
            remote.to_string()
                == "latch:///your_log_dir/nf_nf_core_multiplesequencealign/run-1/nextflow.log"
        })
        .times(1)
        .returning(|_, _| Ok(10));
    let events = Arc::new(CollectingEventSink::new());

    let err = sequencer(fixture.config(), &events)
        .with_provisioning_client(Arc::new(client))
        .with_remote_store(Arc::new(store))
        .run(&valid_params())
        .await
        .unwrap_err();

    assert!(matches!(
        err.launch_error(),
        Some(LaunchError::NonZeroExit { code: Some(1) })
    ));
    assert_eq!(events.stages_with(STAGE_COMPLETED), vec![PROVISION_STAGE, STAGE_STAGE]);
    assert_eq!(events.stages_with(STAGE_FAILED), vec![LAUNCH_STAGE]);
}

#[tokio::test]
async fn test_command_preview_runs_nothing() {
    let fixture = WorkspaceFixture::new();
    let events = Arc::new(CollectingEventSink::new());

    let invocation = sequencer(fixture.config(), &events)
        .command(&VolumeHandle::new("pvc-3"), &valid_params())
        .unwrap();

    assert_eq!(invocation.env().get("K8S_STORAGE_CLAIM_NAME").unwrap(), "pvc-3");
    assert!(invocation
        .command_line()
        .ends_with("--input latch:///samplesheet.csv --outdir latch:///results --skip_shiny"));
    assert!(!fixture.shared().exists());
    assert!(events.is_empty());
}

#[test]
fn test_unusable_timeout_fails_construction() {
    let fixture = WorkspaceFixture::new();
    let mut config = fixture.config();
    config.provisioning.timeout_seconds = -1.0;

    let err = WorkflowSequencer::from_config(config).unwrap_err();

    assert!(matches!(err, MsaflowError::Configuration(_)));
}
