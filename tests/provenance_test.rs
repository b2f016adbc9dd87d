use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use zevbit_flywheel::core::Storage;
use zevbit_flywheel::{
    DataSource, DecisionContext, FlywheelConfig, FlywheelEvent, LocalStorage, MemoryStorage,
    ProvenanceQuery, ProvenanceTracker, RecordingNotifier,
};

#[derive(Debug, Serialize, PartialEq)]
struct Estimate {
    total_cost: f64,
    cost_per_sqft: f64,
    reasoning: String,
    confidence: f64,
}

fn estimate_project_cost(sqft: u32, project_type: &str) -> Estimate {
    let cost_per_sqft = match project_type {
        "lawn" => 1.50,
        "garden" => 2.00,
        _ => 1.75,
    };
    Estimate {
        total_cost: sqft as f64 * cost_per_sqft,
        cost_per_sqft,
        reasoning: format!(
            "Based on ${}/sqft for {} projects using historical data",
            cost_per_sqft, project_type
        ),
        confidence: 0.87,
    }
}

#[tokio::test]
async fn test_track_decision_returns_output_and_records_provenance() -> Result<()> {
    let tracker = ProvenanceTracker::in_memory();

    let ctx = DecisionContext::new("estimate_project_cost", module_path!())
        .workflow("workflow_123")
        .arg("sqft", 5000)
        .arg("project_type", "lawn")
        .source(DataSource::dataset("historical_costs"))
        .source(DataSource::tool("soil_lookup"));

    let estimate = tracker
        .track_decision(ctx, || estimate_project_cost(5000, "lawn"))
        .await?;
    assert_eq!(estimate.total_cost, 7500.0);

    let records = tracker.query(&ProvenanceQuery::new());
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.function, "estimate_project_cost");
    assert_eq!(record.confidence, 0.87);
    assert!(record.reasoning.starts_with("Based on $1.5/sqft for lawn"));
    assert!(record.decision.contains("total_cost"));
    assert!(!record.flagged_for_review);
    assert_eq!(
        record.data_sources.function_signature,
        "estimate_project_cost(5000, lawn)"
    );
    assert_eq!(record.data_sources.sources.len(), 2);
    assert_eq!(record.workflow_id.as_deref(), Some("workflow_123"));

    // persisted next to the in-memory index
    let keys = tracker.storage().list("provenance/estimate_project_cost/").await?;
    assert_eq!(keys, vec![tracker.record_key(record)]);
    Ok(())
}

#[tokio::test]
async fn test_defaults_when_output_has_no_reasoning_or_confidence() -> Result<()> {
    let tracker = ProvenanceTracker::in_memory();

    let approved = tracker
        .track_decision(DecisionContext::new("approve_schedule", "scheduler"), || true)
        .await?;
    assert!(approved);

    let record = &tracker.query(&ProvenanceQuery::new())[0];
    assert_eq!(record.reasoning, "No explicit reasoning provided");
    assert_eq!(record.confidence, 0.8);
    assert_eq!(record.decision, "approve_schedule returned: true");
    Ok(())
}

#[tokio::test]
async fn test_persisted_provenance_contains_no_pii() -> Result<()> {
    let tracker = ProvenanceTracker::in_memory();

    tracker
        .track_decision(DecisionContext::new("qualify_lead", "agent"), || {
            json!({
                "status": "call john@example.com",
                "reasoning": "Customer john@example.com, ssn 123-45-6789",
                "confidence": 0.9
            })
        })
        .await?;

    let record = &tracker.query(&ProvenanceQuery::new())[0];
    assert_eq!(
        record.reasoning,
        "Customer [REDACTED_EMAIL], ssn [REDACTED_SSN]"
    );

    let stored = tracker.storage().read_file(&tracker.record_key(record)).await?;
    let stored = String::from_utf8(stored)?;
    assert!(!stored.contains("john@example.com"));
    assert!(!stored.contains("123-45-6789"));
    assert!(stored.contains("[REDACTED_EMAIL]"));
    Ok(())
}

#[tokio::test]
async fn test_low_confidence_decision_is_flagged_for_review() -> Result<()> {
    let notifier = Arc::new(RecordingNotifier::new());
    let tracker = ProvenanceTracker::with_shared(
        MemoryStorage::new(),
        &FlywheelConfig::default(),
        Arc::new(zevbit_flywheel::PiiRedactor::new()),
        None,
        notifier.clone(),
    );

    tracker
        .track_async(DecisionContext::new("estimate_clay_soil", "estimator"), async {
            json!({"total_cost": 12000, "confidence": 0.55, "reasoning": "Sparse clay data"})
        })
        .await?;

    let reviews = tracker.pending_reviews();
    assert_eq!(reviews.len(), 1);
    assert!(reviews[0].flagged_for_review);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        FlywheelEvent::ReviewRequested(record) => assert_eq!(record.confidence, 0.55),
        other => panic!("unexpected event: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_query_by_type_workflow_and_time() -> Result<()> {
    let tracker = ProvenanceTracker::in_memory();
    let start = Utc::now();

    for (function, workflow) in [
        ("estimate_cost", "wf-1"),
        ("estimate_cost", "wf-2"),
        ("schedule_crew", "wf-1"),
    ] {
        tracker
            .track_decision(
                DecisionContext::new(function, "agent").workflow(workflow),
                || json!({"status": "ok", "confidence": 0.9}),
            )
            .await?;
    }
    let end = Utc::now();

    assert_eq!(
        tracker
            .query(&ProvenanceQuery::new().decision_type("estimate_cost"))
            .len(),
        2
    );
    assert_eq!(tracker.query(&ProvenanceQuery::new().workflow("wf-1")).len(), 2);
    assert_eq!(
        tracker
            .query(
                &ProvenanceQuery::new()
                    .decision_type("schedule_crew")
                    .workflow("wf-1")
            )
            .len(),
        1
    );
    assert_eq!(
        tracker
            .query(&ProvenanceQuery::new().since(start).until(end))
            .len(),
        3
    );
    assert!(tracker
        .query(&ProvenanceQuery::new().since(end + chrono::Duration::seconds(1)))
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn test_restore_from_local_data_lake() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let lake = temp_dir.path().to_str().unwrap().to_string();

    let mut config = FlywheelConfig::default();
    config.data_lake.prefix = "prod".to_string();

    let writer = ProvenanceTracker::new(LocalStorage::new(lake.clone()), &config);
    writer
        .track_decision(DecisionContext::new("estimate_cost", "agent"), || {
            json!({"total_cost": 8500, "confidence": 0.92})
        })
        .await?;

    let reader = ProvenanceTracker::new(LocalStorage::new(lake), &config);
    assert!(reader.is_empty());
    assert_eq!(reader.restore().await?, 1);
    // 重複載入不會產生重複記錄
    assert_eq!(reader.restore().await?, 0);

    let restored = reader.query(&ProvenanceQuery::new().decision_type("estimate_cost"));
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].confidence, 0.92);
    Ok(())
}
