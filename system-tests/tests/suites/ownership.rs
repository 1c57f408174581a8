// system-tests/tests/suites/ownership.rs
// ============================================================================
// Module: Ownership Tests
// Description: Header identity and per-stream access enforcement.
// Purpose: Ensure streams are visible only to their owners.
// Dependencies: system-tests helpers
// ============================================================================

//! ## Overview
//! Runs a server with header identity, `require_owner`, and `enforce_access`,
//! then checks that listings, access checks, and stream operations respect the
//! recorded owner.

use serde_json::json;

use crate::helpers::harness::owned_config;
use crate::helpers::harness::spawn_server;

#[tokio::test(flavor = "multi_thread")]
async fn owners_see_only_their_streams() {
    let server = spawn_server(owned_config()).await.unwrap();
    let anonymous = server.client();
    let alice = anonymous.as_user("alice");
    let bob = anonymous.as_user("bob");
    let request = json!({ "dataset_id": "yelp", "top_k": 5, "metrics": ["HitK"] });

    let rejected = anonymous.post("/streams", Some(&request)).await.unwrap();
    assert_eq!(rejected.status, 401);

    let created = alice.post("/streams", Some(&request)).await.unwrap();
    assert_eq!(created.status, 200, "{}", created.body);
    let stream_id = created.body["evaluator_stream_id"].as_str().unwrap().to_string();

    let listing = alice.get("/streams/user").await.unwrap();
    assert_eq!(listing.body, json!([{ "stream_id": stream_id, "status": "NOT_STARTED" }]));
    let listing = bob.get("/streams/user").await.unwrap();
    assert_eq!(listing.body, json!([]));

    let access = alice.get(&format!("/streams/{stream_id}/check_access")).await.unwrap();
    assert_eq!(access.body, json!(true));
    let access = bob.get(&format!("/streams/{stream_id}/check_access")).await.unwrap();
    assert_eq!(access.body, json!(false));

    let forbidden = bob.post(&format!("/streams/{stream_id}/start"), None).await.unwrap();
    assert_eq!(forbidden.status, 403);
    let unauthenticated =
        anonymous.post(&format!("/streams/{stream_id}/start"), None).await.unwrap();
    assert_eq!(unauthenticated.status, 401);

    let started = alice.post(&format!("/streams/{stream_id}/start"), None).await.unwrap();
    assert_eq!(started.status, 200);
    let status = alice.get(&format!("/streams/{stream_id}/status")).await.unwrap();
    assert_eq!(status.body["status"], "IN_PROGRESS");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn anonymous_listing_requires_identity() {
    let server = spawn_server(owned_config()).await.unwrap();
    let response = server.client().get("/streams/user").await.unwrap();
    assert_eq!(response.status, 401);
    assert_eq!(response.body, json!({ "detail": "Not authenticated" }));
    server.shutdown().await;
}
