use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::instrument;
use uuid::Uuid;

use super::dto::Review;
use crate::{
    auth::{RequireRole, UserOnly, UserOrAdmin},
    documents::factory::{self, body_object, RawQuery},
    envelope,
    error::Result,
    http::parse_id,
    query::{FilterClause, RequestQuery},
    state::AppState,
};

type ReviewEditor = RequireRole<UserOrAdmin>;

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/reviews",
            get(factory::get_all::<Review, ()>).post(create_review),
        )
        .route(
            "/reviews/:id",
            get(factory::get_one::<Review, ()>)
                .patch(factory::update_one::<Review, ReviewEditor>)
                .delete(factory::delete_one::<Review, ReviewEditor>),
        )
        .route(
            "/tours/:id/reviews",
            get(list_tour_reviews).post(create_tour_review),
        )
}

/// Fills `tour` and `user` when the body leaves them out.
fn fill_references(body: &mut Map<String, Value>, tour: Option<Uuid>, user: Uuid) {
    if let Some(tour) = tour {
        body.entry("tour").or_insert_with(|| Value::String(tour.to_string()));
    }
    body.entry("user").or_insert_with(|| Value::String(user.to_string()));
}

async fn create(
    state: &AppState,
    body: Value,
    tour: Option<Uuid>,
    author: Uuid,
) -> Result<(StatusCode, Json<Value>)> {
    let mut body = body_object(body)?;
    fill_references(&mut body, tour, author);
    let doc = factory::create::<Review>(state, body).await?;
    Ok((StatusCode::CREATED, envelope::one(doc)))
}

#[instrument(skip(state, principal, body))]
pub async fn create_review(
    State(state): State<AppState>,
    principal: RequireRole<UserOnly>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    create(&state, body, None, principal.0.id).await
}

#[instrument(skip(state, principal, body))]
pub async fn create_tour_review(
    State(state): State<AppState>,
    principal: RequireRole<UserOnly>,
    Path(tour): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let tour = parse_id(&tour)?;
    create(&state, body, Some(tour), principal.0.id).await
}

#[instrument(skip(state))]
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour): Path<String>,
    Query(raw): RawQuery,
) -> Result<Json<Value>> {
    let tour = parse_id(&tour)?;
    let query = RequestQuery::from_pairs(raw)?;
    let scope = [FilterClause::eq("tour", tour.to_string())];
    let docs = factory::list::<Review>(&state, &query, &scope).await?;
    Ok(envelope::many(docs))
}
