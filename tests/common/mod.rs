// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{TimeZone, Utc};
use pedalcast::config::Credentials;
use pedalcast::db::DocumentStore;
use pedalcast::models::StravaToken;
use pedalcast::services::{StravaApi, StravaClient, SyncEngine, TokenManager};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ATHLETE_ID: u64 = 4242;

/// Mock server paths, mirroring the real Strava layout.
pub const API_PREFIX: &str = "/api/v3";
pub const OAUTH_PREFIX: &str = "/oauth";

#[allow(dead_code)]
pub fn test_credentials() -> Credentials {
    Credentials {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        redirect_uri: None,
    }
}

/// Strava client pointed at the mock server.
#[allow(dead_code)]
pub fn test_client(server: &MockServer) -> StravaClient {
    StravaClient::with_base_urls(
        &test_credentials(),
        &format!("{}{}", server.uri(), API_PREFIX),
        &format!("{}{}", server.uri(), OAUTH_PREFIX),
    )
}

/// Token record for `ATHLETE_ID`.
#[allow(dead_code)]
pub fn test_token(access: &str, refresh: &str, expires_at: i64) -> StravaToken {
    let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    StravaToken {
        athlete_id: ATHLETE_ID,
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at,
        scopes: ["read", "activity:read_all"]
            .into_iter()
            .map(String::from)
            .collect(),
        display_name: Some("Test Rider".to_string()),
        location: None,
        created_at: created,
        updated_at: created,
    }
}

/// Store a token that stays valid for the rest of the test run.
#[allow(dead_code)]
pub fn seed_valid_token(store: &DocumentStore, access: &str) {
    let expires_at = Utc::now().timestamp() + 6 * 3600;
    store
        .save_token(&test_token(access, "refresh-1", expires_at))
        .expect("seed token");
}

#[allow(dead_code)]
pub fn test_api(server: &MockServer, store: &DocumentStore) -> StravaApi {
    let client = test_client(server);
    let tokens = TokenManager::new(client.clone(), store.clone());
    StravaApi::new(client, tokens, None)
}

#[allow(dead_code)]
pub fn test_engine(server: &MockServer, store: &DocumentStore) -> SyncEngine {
    SyncEngine::new(test_api(server, store), store.clone())
}

// ─── Strava payloads ─────────────────────────────────────────

#[allow(dead_code)]
pub fn gear_json(id: &str, name: &str, resource_state: u8) -> Value {
    json!({
        "id": id,
        "name": name,
        "resource_state": resource_state,
        "distance": 12345.0,
        "brand_name": "Specialized",
        "model_name": "Tarmac",
        "frame_type": 3
    })
}

#[allow(dead_code)]
pub fn athlete_json(bikes: Vec<Value>) -> Value {
    json!({
        "id": ATHLETE_ID,
        "firstname": "Test",
        "lastname": "Rider",
        "city": "Portland",
        "state": "OR",
        "country": "United States",
        "bikes": bikes
    })
}

#[allow(dead_code)]
pub fn activity_json(id: u64, gear_id: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": format!("Ride {}", id),
        "type": "Ride",
        "sport_type": "Ride",
        "start_date": "2025-06-01T07:00:00Z",
        "distance": 30000.0,
        "moving_time": 3600,
        "elapsed_time": 3900,
        "total_elevation_gain": 250.0,
        "average_speed": 8.3,
        "max_speed": 15.2,
        "gear_id": gear_id
    })
}

/// `count` activities with IDs starting at `first_id`.
#[allow(dead_code)]
pub fn activity_page(first_id: u64, count: usize, gear_id: Option<&str>) -> Value {
    Value::Array(
        (0..count as u64)
            .map(|i| activity_json(first_id + i, gear_id))
            .collect(),
    )
}

// ─── Mocks ───────────────────────────────────────────────────

#[allow(dead_code)]
pub async fn mount_athlete(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{}/athlete", API_PREFIX)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve `body` for one activities page.
#[allow(dead_code)]
pub async fn mount_activity_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{}/athlete/activities", API_PREFIX)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Token endpoint response body.
#[allow(dead_code)]
pub fn token_response(access: &str, refresh: &str, expires_at: i64) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access,
        "refresh_token": refresh,
        "expires_at": expires_at,
        "expires_in": 21600
    })
}
