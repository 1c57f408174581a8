// system-tests/tests/suites/store_persistence.rs
// ============================================================================
// Module: Store Persistence Tests
// Description: Session durability across server restarts.
// Purpose: Ensure committed state survives and uncommitted state never lands.
// Dependencies: system-tests helpers, tempfile
// ============================================================================

//! ## Overview
//! Starts a server on a `SQLite` file, advances a stream, stops the server, and
//! starts a fresh one on the same file. Every committed transition must be
//! visible afterwards and failed operations must leave no trace.

use serde_json::json;
use tempfile::TempDir;

use crate::helpers::harness::spawn_server;
use crate::helpers::harness::sqlite_config;

#[tokio::test(flavor = "multi_thread")]
async fn committed_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sessions.db");

    let server = spawn_server(sqlite_config(&db)).await.unwrap();
    let client = server.client();
    let request = json!({ "dataset_id": "lastfm2k", "top_k": 5, "metrics": ["NDCGK"] });
    let created = client.post("/streams", Some(&request)).await.unwrap();
    assert_eq!(created.status, 200, "{}", created.body);
    let stream_id = created.body["evaluator_stream_id"].as_str().unwrap().to_string();
    client.post(&format!("/streams/{stream_id}/start"), None).await.unwrap();
    let registered = client
        .post(
            &format!("/streams/{stream_id}/algorithms"),
            Some(&json!({ "algorithm_name": "mf" })),
        )
        .await
        .unwrap();
    let algorithm_id = registered.body["algorithm_uuid"].as_str().unwrap().to_string();
    let base = format!("/streams/{stream_id}/algorithms/{algorithm_id}");
    let training = client.get(&format!("{base}/training-data")).await.unwrap();
    assert_eq!(training.status, 200);

    let malformed = client
        .post(&format!("{base}/predictions"), Some(&json!({ "data": [1.0], "indices": [] })))
        .await
        .unwrap();
    assert!(malformed.status == 400 || malformed.status == 422, "{}", malformed.body);
    server.shutdown().await;

    let restarted = spawn_server(sqlite_config(&db)).await.unwrap();
    let client = restarted.client();
    let status = client.get(&format!("/streams/{stream_id}/status")).await.unwrap();
    assert_eq!(status.body["status"], "IN_PROGRESS");
    let state = client.get(&format!("{base}/state")).await.unwrap();
    assert_eq!(state.body, json!({ "algorithm_state": "READY" }));

    let again = client.post(&format!("/streams/{stream_id}/start"), None).await.unwrap();
    assert_eq!(again.status, 409);

    let listing = client.get(&format!("/streams/{stream_id}/algorithms/state")).await.unwrap();
    assert_eq!(
        listing.body,
        json!([{ "algorithm_uuid": algorithm_id, "algorithm_name": "mf", "state": "READY" }])
    );
    restarted.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn readiness_reports_sqlite_store() {
    let dir = TempDir::new().unwrap();
    let server = spawn_server(sqlite_config(&dir.path().join("ready.db"))).await.unwrap();
    let response = server.client().get("/ready").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({ "status": "ready" }));
    server.shutdown().await;
}
