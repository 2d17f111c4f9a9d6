use std::sync::Arc;
use std::time::Duration;

use bastion_core::TraceId;
use bastion_domain::{ChainScope, Severity};
use serde_json::{Value, json};

use crate::audit_event::{ActorDescriptor, AuditContext, AuditDescriptor};
use crate::audit_ports::AuditSink;
use crate::hash_chain::verify_chain;
use crate::test_support::{FailingSink, pipeline_harness, tenant_id};

use super::AuditReceipt;

fn tenant_context(tenant: &str) -> AuditContext {
    AuditContext::new(
        TraceId::new(),
        ChainScope::tenant(&tenant_id(tenant)),
        ActorDescriptor {
            principal_id: Some("u-1".to_owned()),
            ..ActorDescriptor::default()
        },
    )
}

fn descriptor(index: usize) -> AuditDescriptor {
    AuditDescriptor::new("document", "read", Severity::Info, format!("read #{index}"))
}

#[tokio::test]
async fn concurrent_emissions_form_one_linear_chain() {
    let harness = pipeline_harness(Vec::new());
    let mut tasks = Vec::new();
    for index in 0..64 {
        let pipeline = harness.pipeline.clone();
        tasks.push(tokio::spawn(async move {
            pipeline
                .emit_and_wait(descriptor(index), tenant_context("T1"))
                .await
        }));
    }

    let mut receipts = Vec::new();
    for task in tasks {
        let Ok(receipt) = task.await else {
            panic!("emission task panicked");
        };
        receipts.push(receipt);
    }

    assert!(receipts.iter().all(AuditReceipt::is_persisted));
    let events = harness
        .store
        .events(&ChainScope::tenant(&tenant_id("T1")))
        .await;
    assert_eq!(events.len(), 64);
    assert_eq!(
        events.iter().map(|event| event.sequence).collect::<Vec<_>>(),
        (1..=64).collect::<Vec<_>>()
    );
    assert!(verify_chain(&events).intact);
}

#[tokio::test]
async fn chains_are_partitioned_per_tenant() {
    let harness = pipeline_harness(Vec::new());
    harness
        .pipeline
        .emit_and_wait(descriptor(1), tenant_context("T1"))
        .await;
    let receipt = harness
        .pipeline
        .emit_and_wait(descriptor(2), tenant_context("T2"))
        .await;

    let AuditReceipt::Persisted { sequence, .. } = receipt else {
        panic!("expected persisted receipt, got {receipt:?}");
    };
    assert_eq!(sequence, 1);
}

#[tokio::test]
async fn store_failure_diverts_to_fallback_without_advancing_chain() {
    let harness = pipeline_harness(Vec::new());
    harness
        .pipeline
        .emit_and_wait(descriptor(1), tenant_context("T1"))
        .await;

    harness.store.set_failing(true);
    let receipt = harness
        .pipeline
        .emit_and_wait(descriptor(2), tenant_context("T1"))
        .await;
    assert!(matches!(receipt, AuditReceipt::Fallback { .. }));

    harness.store.set_failing(false);
    let receipt = harness
        .pipeline
        .emit_and_wait(descriptor(3), tenant_context("T1"))
        .await;
    let AuditReceipt::Persisted { sequence, .. } = receipt else {
        panic!("expected persisted receipt, got {receipt:?}");
    };
    assert_eq!(sequence, 2);

    let records = harness.fallback.records().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].1.contains("audit store offline"));

    let metrics = harness.pipeline.metrics();
    assert_eq!(metrics.persisted, 2);
    assert_eq!(metrics.persist_failures, 1);
    assert_eq!(metrics.fallback_writes, 1);
}

#[tokio::test]
async fn foreign_writer_conflict_reseals_on_fresh_head() {
    let harness = pipeline_harness(Vec::new());
    let scope = ChainScope::tenant(&tenant_id("T1"));
    harness
        .pipeline
        .emit_and_wait(descriptor(1), tenant_context("T1"))
        .await;

    harness.store.append_foreign(&scope).await;

    let receipt = harness
        .pipeline
        .emit_and_wait(descriptor(2), tenant_context("T1"))
        .await;
    let AuditReceipt::Persisted { sequence, .. } = receipt else {
        panic!("expected persisted receipt, got {receipt:?}");
    };
    assert_eq!(sequence, 3);
    assert_eq!(harness.pipeline.metrics().chain_conflicts, 1);
    assert!(verify_chain(&harness.store.events(&scope).await).intact);
}

#[tokio::test]
async fn persisted_payload_is_masked() {
    let harness = pipeline_harness(Vec::new());
    let descriptor = AuditDescriptor::new("account", "update", Severity::Low, "updated")
        .with_metadata(json!({ "password": "abc123xyz", "field": "display_name" }));

    harness
        .pipeline
        .emit_and_wait(descriptor, tenant_context("T1"))
        .await;

    let events = harness.store.all_events().await;
    assert_eq!(events.len(), 1);
    let metadata = &events[0].payload["metadata"];
    assert_eq!(metadata["password"]["masked"], Value::Bool(true));
    assert_eq!(metadata["password"]["originalLength"], json!(9));
    assert_eq!(metadata["field"], json!("display_name"));
    assert!(!events[0].payload.to_string().contains("abc123xyz"));
}

#[tokio::test]
async fn fan_out_failures_are_counted_not_raised() {
    let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(FailingSink)];
    let harness = pipeline_harness(sinks);

    let receipt = harness
        .pipeline
        .emit_and_wait(descriptor(1), tenant_context("T1"))
        .await;
    assert!(receipt.is_persisted());

    for _ in 0..200 {
        if harness.pipeline.metrics().fanout_failures == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(harness.pipeline.metrics().fanout_failures, 1);
}

#[tokio::test]
async fn flush_waits_for_fire_and_forget_emissions() {
    let harness = pipeline_harness(Vec::new());
    for index in 0..10 {
        harness.pipeline.emit(descriptor(index), tenant_context("T1"));
    }

    harness.pipeline.flush().await;

    assert_eq!(harness.store.all_events().await.len(), 10);
}
