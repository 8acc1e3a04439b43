//! Deterministic flaky HTTP endpoints for exercising retry behavior.
//!
//! A scenario is created with `POST /scenarios` and then hit through
//! `/flaky/{key}`: the first `failures` requests get the scenario's error
//! status, later ones get 200 with an echo of the request.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

/// Longest delay `/slow/{ms}` will honor.
pub const MAX_SLOW_MS: u64 = 10_000;

#[derive(Clone, Debug)]
struct Scenario {
    failures: u32,
    status: StatusCode,
    hits: u32,
}

#[derive(Deserialize)]
pub struct CreateScenario {
    pub key: Option<String>,
    pub failures: u32,
    pub status: Option<u16>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioReport {
    pub key: String,
    pub failures: u32,
    pub status: u16,
    pub hits: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub attempt: u32,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

type Db = Arc<RwLock<HashMap<String, Scenario>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/scenarios", post(create_scenario))
        .route("/scenarios/{key}", get(get_scenario))
        .route("/flaky/{key}", any(flaky))
        .route("/echo", any(echo))
        .route("/slow/{ms}", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn create_scenario(
    State(db): State<Db>,
    Json(input): Json<CreateScenario>,
) -> Result<(StatusCode, Json<ScenarioReport>), StatusCode> {
    let status = match input.status {
        None => StatusCode::SERVICE_UNAVAILABLE,
        Some(code) => StatusCode::from_u16(code)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?,
    };
    let key = input.key.unwrap_or_else(|| Uuid::new_v4().to_string());
    let scenario = Scenario {
        failures: input.failures,
        status,
        hits: 0,
    };
    db.write().await.insert(key.clone(), scenario.clone());
    debug!(%key, failures = scenario.failures, status = status.as_u16(), "scenario created");
    Ok((StatusCode::CREATED, Json(report(key, &scenario))))
}

async fn get_scenario(
    State(db): State<Db>,
    Path(key): Path<String>,
) -> Result<Json<ScenarioReport>, StatusCode> {
    let scenarios = db.read().await;
    let scenario = scenarios.get(&key).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(report(key, scenario)))
}

async fn flaky(
    State(db): State<Db>,
    Path(key): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Echo>, StatusCode> {
    let mut scenarios = db.write().await;
    let scenario = scenarios.get_mut(&key).ok_or(StatusCode::NOT_FOUND)?;
    scenario.hits += 1;
    debug!(%key, hits = scenario.hits, failures = scenario.failures, "flaky hit");
    if scenario.hits <= scenario.failures {
        return Err(scenario.status);
    }
    Ok(Json(echo_of(method, scenario.hits, &headers, body)))
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    Json(echo_of(method, 1, &headers, body))
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms.min(MAX_SLOW_MS))).await;
    "done"
}

fn report(key: String, scenario: &Scenario) -> ScenarioReport {
    ScenarioReport {
        key,
        failures: scenario.failures,
        status: scenario.status.as_u16(),
        hits: scenario.hits,
    }
}

fn echo_of(method: Method, attempt: u32, headers: &HeaderMap, body: String) -> Echo {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Echo {
        method: method.as_str().to_string(),
        attempt,
        headers,
        body,
    }
}
