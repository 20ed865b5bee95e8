use std::{collections::BTreeMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_macros::debug_handler;
use chrono::{NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::{not_found, AppError},
    infra::cors::preflight,
};

use super::{
    data::Repository,
    domain::{CommandError, ItemId, Receipt, Store, Summary, VoteValue},
    visitor::VisitorId,
};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VisitDto {
    pub visitor_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClickDto {
    pub visitor_id: Option<String>,
    pub game_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoteDto {
    pub visitor_id: Option<String>,
    pub game_id: Option<String>,
    pub value: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct StatsDto {
    pub stats: Summary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VisitorDto {
    pub visitor_id: VisitorId,
    pub stats: Summary,
    pub visitor_votes: BTreeMap<ItemId, VoteValue>,
}

/// One lock guards both the in-memory store and the snapshot write, so a
/// mutation and its persistence are never interleaved with another one.
struct Container {
    repo: Repository,
    store: Mutex<Store>,
    today: fn() -> NaiveDate,
}
impl Container {
    fn new(repo: Repository, store: Store, today: fn() -> NaiveDate) -> Arc<Self> {
        Arc::new(Container {
            repo,
            store: Mutex::new(store),
            today,
        })
    }
}
type AppState = Arc<Container>;

pub(crate) fn router(repo: Repository, store: Store) -> Router {
    router_with_clock(repo, store, utc_today)
}

fn router_with_clock(repo: Repository, store: Store, today: fn() -> NaiveDate) -> Router {
    Router::new()
        .route("/api/stats", get(get_stats).options(preflight).fallback(not_found))
        .route("/api/visit", post(post_visit).options(preflight).fallback(not_found))
        .route("/api/click", post(post_click).options(preflight).fallback(not_found))
        .route("/api/vote", post(post_vote).options(preflight).fallback(not_found))
        .with_state(Container::new(repo, store, today))
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// An empty body counts as `{}`; anything else has to be a JSON object.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    let rejected = |e: serde_json::Error| {
        debug!(error = %e, "rejected request body");
        AppError::MalformedBody
    };
    // Derived DTOs would also accept the sequence form, e.g. `["v1"]`
    let object: Map<String, Value> = serde_json::from_slice(body).map_err(rejected)?;
    serde_json::from_value(Value::Object(object)).map_err(rejected)
}

/// Applies `command` to a copy of the store, persists the copy when it
/// changed, and only then makes it current. A failed save leaves the
/// in-memory state as it was.
async fn apply<F>(state: &Container, command: F) -> Result<Json<VisitorDto>, AppError>
where
    F: FnOnce(&mut Store, NaiveDate) -> Result<Receipt, CommandError>,
{
    let mut store = state.store.lock().await;
    // Read the clock under the lock so a waiter can't roll the date back
    let today = (state.today)();

    let mut next = store.clone();
    let receipt = command(&mut next, today)?;
    if receipt.changed {
        state.repo.save(&next).await?;
    }

    let response = VisitorDto {
        visitor_votes: next.votes_of(&receipt.visitor),
        stats: next.summary(today),
        visitor_id: receipt.visitor,
    };
    *store = next;

    Ok(Json(response))
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsDto> {
    let mut store = state.store.lock().await;
    let today = (state.today)();

    Json(StatsDto {
        stats: store.summary(today),
    })
}

async fn post_visit(State(state): State<AppState>, body: Bytes) -> Result<Json<VisitorDto>, AppError> {
    let dto: VisitDto = parse_body(&body)?;

    let response = apply(&state, |store, today| Ok(store.record_visit(dto.visitor_id, today))).await?;
    debug!(visitor = %response.visitor_id, "recorded visit");
    Ok(response)
}

async fn post_click(State(state): State<AppState>, body: Bytes) -> Result<Json<VisitorDto>, AppError> {
    let dto: ClickDto = parse_body(&body)?;
    let game_id = dto.game_id.clone();

    let response = apply(&state, |store, today| store.record_click(dto.visitor_id, dto.game_id, today)).await?;
    debug!(visitor = %response.visitor_id, game = ?game_id, "recorded click");
    Ok(response)
}

#[debug_handler]
async fn post_vote(State(state): State<AppState>, body: Bytes) -> Result<Json<VisitorDto>, AppError> {
    let dto: VoteDto = parse_body(&body)?;
    let game_id = dto.game_id.clone();

    let response = apply(&state, |store, today| {
        store.record_vote(dto.visitor_id, dto.game_id, dto.value.as_deref(), today)
    })
    .await?;
    debug!(visitor = %response.visitor_id, game = ?game_id, votes = ?response.visitor_votes, "recorded vote");
    Ok(response)
}
