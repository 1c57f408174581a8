// system-tests/tests/suites/smoke.rs
// ============================================================================
// Module: Smoke Tests
// Description: End-to-end stream lifecycle over a real HTTP listener.
// Purpose: Drive create, start, register, data rounds, and metrics.
// Dependencies: system-tests helpers
// ============================================================================

//! ## Overview
//! Runs the create/start/register scenario against the built-in synthetic
//! catalog, then walks one algorithm through every window and reads metrics.

use serde_json::Value;
use serde_json::json;

use crate::helpers::client::ApiClient;
use crate::helpers::harness::base_config;
use crate::helpers::harness::spawn_server;

fn string_at(body: &Value, key: &str) -> String {
    body[key].as_str().unwrap_or_else(|| panic!("missing {key} in {body}")).to_string()
}

async fn create_music_stream(client: &ApiClient) -> String {
    let request = json!({
        "dataset_id": "amazon_music",
        "top_k": 10,
        "metrics": ["PrecisionK", "RecallK"]
    });
    let response = client.post("/streams", Some(&request)).await.unwrap();
    assert_eq!(response.status, 200, "{}", response.body);
    string_at(&response.body, "evaluator_stream_id")
}

/// Predicts item 0 for every masked row.
fn naive_prediction(unlabeled: &Value) -> Value {
    let rows = unlabeled["unlabeled_data"].as_array().unwrap();
    Value::Array(
        rows.iter()
            .map(|row| {
                json!({
                    "interactionid": row["interactionid"],
                    "uid": row["uid"],
                    "iid": 0,
                    "ts": row["ts"]
                })
            })
            .collect(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn healthcheck_reports_healthy() {
    let server = spawn_server(base_config()).await.unwrap();
    let response = server.client().get("/").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({ "Server is running, STATUS": "HEALTHY" }));
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_scenario_end_to_end() {
    let server = spawn_server(base_config()).await.unwrap();
    let client = server.client();

    let stream_id = create_music_stream(&client).await;
    let status = client.get(&format!("/streams/{stream_id}/status")).await.unwrap();
    assert_eq!(status.body["status"], "NOT_STARTED");

    let started = client.post(&format!("/streams/{stream_id}/start"), None).await.unwrap();
    assert_eq!(started.status, 200);
    assert_eq!(started.body, json!({ "status": true }));

    let again = client.post(&format!("/streams/{stream_id}/start"), None).await.unwrap();
    assert_eq!(again.status, 409);
    assert!(string_at(&again.body, "detail").starts_with("Error Starting Stream"));

    let registered = client
        .post(
            &format!("/streams/{stream_id}/algorithms"),
            Some(&json!({ "algorithm_name": "knn" })),
        )
        .await
        .unwrap();
    assert_eq!(registered.status, 200);
    let algorithm_id = string_at(&registered.body, "algorithm_uuid");
    let base = format!("/streams/{stream_id}/algorithms/{algorithm_id}");

    let state = client.get(&format!("{base}/state")).await.unwrap();
    assert_eq!(state.body, json!({ "algorithm_state": "NEW" }));

    let settings = client.get(&format!("/streams/{stream_id}/settings")).await.unwrap();
    assert_eq!(settings.status, 200);
    let windows = settings.body["number_of_windows"].as_u64().unwrap();
    assert!(windows > 0);

    let mut rounds = 0;
    loop {
        let training = client.get(&format!("{base}/training-data")).await.unwrap();
        assert_eq!(training.status, 200, "{}", training.body);
        let unlabeled = client.get(&format!("{base}/unlabeled-data")).await.unwrap();
        assert_eq!(unlabeled.status, 200, "{}", unlabeled.body);
        let prediction = naive_prediction(&unlabeled.body);
        let scored =
            client.post(&format!("{base}/predictions"), Some(&prediction)).await.unwrap();
        assert_eq!(scored.status, 200, "{}", scored.body);
        rounds += 1;
        let completed = client.get(&format!("{base}/is-completed")).await.unwrap();
        if completed.body == json!(true) {
            break;
        }
        assert!(rounds < windows, "algorithm never completed");
    }
    assert_eq!(rounds, windows);

    let status = client.get(&format!("/streams/{stream_id}/status")).await.unwrap();
    assert_eq!(status.body["status"], "COMPLETED");

    let metrics = client.get(&format!("/streams/{stream_id}/metrics")).await.unwrap();
    assert_eq!(metrics.status, 200);
    let micro = metrics.body["micro_metrics"].as_array().unwrap();
    let labels: Vec<&str> = micro.iter().map(|row| row["metric"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["PrecisionK_10", "RecallK_10"]);
    assert!(micro.iter().all(|row| row["algorithm_name"] == "knn"));
    let macro_rows = metrics.body["macro_metrics"].as_array().unwrap();
    assert!(macro_rows.iter().all(|row| row["num_window"] == windows));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn error_kinds_map_to_statuses() {
    let server = spawn_server(base_config()).await.unwrap();
    let client = server.client();

    let invalid = client.get("/streams/not-a-uuid/status").await.unwrap();
    assert_eq!(invalid.status, 400);
    assert_eq!(invalid.body, json!({ "detail": "Invalid Stream UUID format" }));

    let missing_id = "00000000-0000-4000-8000-000000000000";
    let missing = client.post(&format!("/streams/{missing_id}/start"), None).await.unwrap();
    assert_eq!(missing.status, 404);
    assert_eq!(
        missing.body,
        json!({ "detail": format!("Evaluator stream with ID {missing_id} not found") })
    );

    let stream_id = create_music_stream(&client).await;
    let bad_algorithm =
        client.get(&format!("/streams/{stream_id}/algorithms/xyz/state")).await.unwrap();
    assert_eq!(bad_algorithm.status, 400);
    assert_eq!(bad_algorithm.body, json!({ "detail": "Invalid Algorithm UUID format" }));

    let unknown_algorithm = client
        .get(&format!("/streams/{stream_id}/algorithms/{missing_id}/state"))
        .await
        .unwrap();
    assert_eq!(unknown_algorithm.status, 404);

    let early = client
        .post(
            &format!("/streams/{stream_id}/algorithms"),
            Some(&json!({ "algorithm_name": "pop" })),
        )
        .await
        .unwrap();
    let algorithm_id = string_at(&early.body, "algorithm_uuid");
    let not_started = client
        .get(&format!("/streams/{stream_id}/algorithms/{algorithm_id}/training-data"))
        .await
        .unwrap();
    assert_eq!(not_started.status, 409);

    let malformed = client.post_raw("/streams", "{\"dataset_id\":").await.unwrap();
    assert_eq!(malformed.status, 422);

    let unknown_dataset = client
        .post("/streams", Some(&json!({ "dataset_id": "netflix", "top_k": 5, "metrics": [] })))
        .await
        .unwrap();
    assert_eq!(unknown_dataset.status, 404);
    assert_eq!(unknown_dataset.body, json!({ "detail": "Invalid Dataset ID" }));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_body_gets_detail_json() {
    let mut config = base_config();
    config.server.max_body_bytes = 64;
    let server = spawn_server(config).await.unwrap();
    let client = server.client();

    let padded = json!({
        "dataset_id": "amazon_music",
        "top_k": 10,
        "metrics": ["HitK"],
        "note": "x".repeat(200)
    });
    let response = client.post("/streams", Some(&padded)).await.unwrap();
    assert_eq!(response.status, 413);
    assert_eq!(response.body, json!({ "detail": "request body exceeds 64 bytes" }));

    server.shutdown().await;
}
