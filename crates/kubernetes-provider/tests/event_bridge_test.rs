//! Job event bridge against the in-memory audit sink

use chrono::DateTime;
use cronpilot_adapters::{InMemoryAuditSink, InMemoryCluster};
use cronpilot_core::{OwnerType, PermissionScheme, TargetType};
use cronpilot_kubernetes::{bridge_metrics, process_event, JobEventBridge};
use cronpilot_ports::{AuditError, NamespacePolicy};
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing_test::traced_test;

fn scheduled_run() -> batchv1::Job {
    batchv1::Job {
        metadata: ObjectMeta {
            name: Some("mailer-28211".to_string()),
            namespace: Some("cronpilot-p1".to_string()),
            owner_references: Some(vec![OwnerReference {
                api_version: "batch/v1".to_string(),
                kind: "CronJob".to_string(),
                name: "mailer".to_string(),
                uid: "5d1c".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn event(reason: &str, message: &str) -> corev1::Event {
    corev1::Event {
        metadata: ObjectMeta {
            name: Some("mailer-28211.17a".to_string()),
            namespace: Some("cronpilot-p1".to_string()),
            creation_timestamp: DateTime::from_timestamp(1_700_000_000, 0).map(Time),
            ..Default::default()
        },
        involved_object: corev1::ObjectReference {
            kind: Some("Job".to_string()),
            name: Some("mailer-28211".to_string()),
            namespace: Some("cronpilot-p1".to_string()),
            ..Default::default()
        },
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        type_: Some("Normal".to_string()),
        ..Default::default()
    }
}

fn managed() -> BTreeSet<String> {
    BTreeSet::from(["cronpilot-p1".to_string()])
}

fn bridge() -> (Arc<InMemoryAuditSink>, Arc<JobEventBridge>) {
    let sink = Arc::new(InMemoryAuditSink::new());
    let bridge = Arc::new(JobEventBridge::new(sink.clone()));
    (sink, bridge)
}

#[tokio::test]
async fn test_completed_run_is_audited_against_schedule() {
    let (sink, bridge) = bridge();
    bridge
        .observe(&scheduled_run(), &event("Completed", "Job completed"))
        .await;

    let events = sink.completed();
    assert_eq!(events.len(), 1);
    let recorded = &events[0];
    assert_eq!(recorded.opts.kind, PermissionScheme::JobRun);
    assert_eq!(recorded.opts.target.target_type, TargetType::Job);
    assert_eq!(recorded.opts.target.value, "mailer");
    assert_eq!(recorded.opts.allowed.scheme, PermissionScheme::JobReadEvents);
    assert_eq!(recorded.opts.allowed.contexts[0].value, "mailer");
    assert_eq!(recorded.opts.owner.owner_type, OwnerType::Internal);
    assert!(!recorded.opts.cancelable);

    let outcome = recorded.outcome.clone().unwrap();
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.custom_data["job-name"], "mailer-28211");
    assert_eq!(outcome.custom_data["job-controller"], "mailer");
    assert_eq!(outcome.custom_data["event-type"], "Normal");
    assert_eq!(outcome.custom_data["event-reason"], "Completed");
    assert_eq!(outcome.custom_data["message"], "Job completed");
    assert_eq!(
        outcome.custom_data["cluster-start-time"],
        "2023-11-14T22:13:20+00:00"
    );
}

#[tokio::test]
async fn test_backoff_limit_records_failure() {
    let (sink, bridge) = bridge();
    bridge
        .observe(
            &scheduled_run(),
            &event("BackoffLimitExceeded", "Job has reached the specified backoff limit"),
        )
        .await;

    let outcome = sink.completed()[0].outcome.clone().unwrap();
    assert_eq!(
        outcome.error.as_deref(),
        Some("job failed: Job has reached the specified backoff limit")
    );
}

#[tokio::test]
async fn test_successful_create_of_standalone_run() {
    let (sink, bridge) = bridge();
    let mut run = scheduled_run();
    run.metadata.owner_references = None;

    bridge
        .observe(&run, &event("SuccessfulCreate", "Created pod: mailer-28211-x"))
        .await;

    let events = sink.completed();
    assert_eq!(events[0].opts.kind, PermissionScheme::JobCreate);
    assert_eq!(events[0].opts.target.value, "mailer-28211");
}

#[tokio::test]
async fn test_unknown_reason_is_ignored() {
    let (sink, bridge) = bridge();
    let before = bridge_metrics().events_ignored_total.get();

    bridge
        .observe(&scheduled_run(), &event("SuccessfulDelete", "Deleted pod"))
        .await;

    assert!(sink.events().is_empty());
    assert!(bridge_metrics().events_ignored_total.get() > before);
}

#[tokio::test]
#[traced_test]
async fn test_sink_failure_is_dropped() {
    let (sink, bridge) = bridge();
    sink.fail_with(AuditError::Storage("event store unavailable".to_string()));
    let before = bridge_metrics().events_dropped_total.get();

    bridge
        .observe(&scheduled_run(), &event("Completed", "Job completed"))
        .await;

    assert!(sink.events().is_empty());
    assert!(bridge_metrics().events_dropped_total.get() > before);
    assert!(logs_contain("dropping job event"));
    assert!(logs_contain("event store unavailable"));
}

#[tokio::test]
async fn test_spawned_observation_runs_detached() {
    let (sink, bridge) = bridge();
    let handle = bridge.spawn_observe(scheduled_run(), event("Completed", "Job completed"));
    handle.await.unwrap();

    assert_eq!(sink.completed().len(), 1);
}

#[tokio::test]
async fn test_process_event_resolves_execution() {
    let (sink, bridge) = bridge();
    let cluster = InMemoryCluster::new("main", NamespacePolicy::new("default"));
    cluster.insert_job("cronpilot-p1", scheduled_run());

    let completed = event("Completed", "Job completed");
    let handle = process_event(&cluster, &managed(), &bridge, completed)
        .await
        .unwrap();
    handle.await.unwrap();

    let events = sink.completed();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].opts.target.value, "mailer");
}

#[tokio::test]
async fn test_process_event_skips_missing_execution() {
    let (sink, bridge) = bridge();
    let cluster = InMemoryCluster::new("main", NamespacePolicy::new("default"));

    let completed = event("Completed", "Job completed");
    let handle = process_event(&cluster, &managed(), &bridge, completed).await;

    assert!(handle.is_none());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_process_event_skips_other_kinds() {
    let (sink, bridge) = bridge();
    let cluster = InMemoryCluster::new("main", NamespacePolicy::new("default"));
    cluster.insert_job("cronpilot-p1", scheduled_run());

    let mut pod_event = event("Completed", "Job completed");
    pod_event.involved_object.kind = Some("Pod".to_string());

    assert!(process_event(&cluster, &managed(), &bridge, pod_event)
        .await
        .is_none());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_process_event_skips_unmanaged_namespace() {
    let (sink, bridge) = bridge();
    let cluster = InMemoryCluster::new("main", NamespacePolicy::new("default"));
    let mut foreign = scheduled_run();
    foreign.metadata.name = Some("cleanup".to_string());
    cluster.insert_job("kube-system", foreign);

    let mut system_event = event("Completed", "Job completed");
    system_event.metadata.namespace = Some("kube-system".to_string());
    system_event.involved_object.name = Some("cleanup".to_string());
    system_event.involved_object.namespace = Some("kube-system".to_string());

    assert!(process_event(&cluster, &managed(), &bridge, system_event)
        .await
        .is_none());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_process_event_uses_event_namespace_when_object_has_none() {
    let (sink, bridge) = bridge();
    let cluster = InMemoryCluster::new("main", NamespacePolicy::new("default"));
    cluster.insert_job("cronpilot-p1", scheduled_run());

    let mut completed = event("Completed", "Job completed");
    completed.involved_object.namespace = None;

    let handle = process_event(&cluster, &managed(), &bridge, completed)
        .await
        .unwrap();
    handle.await.unwrap();
    assert_eq!(sink.completed().len(), 1);
}
