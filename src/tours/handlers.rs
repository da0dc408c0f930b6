use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::{dto::Tour, repo};
use crate::{
    auth::{AdminOrLeadGuide, RequireRole},
    documents::factory::{self, RawQuery},
    envelope,
    error::{AppError, Result},
    query::RequestQuery,
    state::AppState,
};

type TourWriter = RequireRole<AdminOrLeadGuide>;

pub fn tour_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tours",
            get(factory::get_all::<Tour, ()>).post(factory::create_one::<Tour, TourWriter>),
        )
        .route("/tours/top-5-cheap", get(top_five_cheap))
        .route("/tours/tour-stats", get(tour_stats))
        .route("/tours/monthly-plan/:year", get(monthly_plan))
        .route(
            "/tours/:id",
            get(factory::get_one::<Tour, ()>)
                .patch(factory::update_one::<Tour, TourWriter>)
                .delete(factory::delete_one::<Tour, TourWriter>),
        )
}

/// The five best-rated tours, cheapest first among equals.
pub fn top_five_cheap_query(raw: Vec<(String, String)>) -> Result<RequestQuery> {
    Ok(RequestQuery::from_pairs(raw)?
        .with("limit", "5")
        .with("sort", "-ratingsAverage,price")
        .with("fields", "name,price,ratingsAverage,summary,difficulty"))
}

#[instrument(skip(state))]
pub async fn top_five_cheap(
    State(state): State<AppState>,
    Query(raw): RawQuery,
) -> Result<Json<Value>> {
    let query = top_five_cheap_query(raw)?;
    let docs = factory::list::<Tour>(&state, &query, &[]).await?;
    Ok(envelope::many(docs))
}

#[instrument(skip(state))]
pub async fn tour_stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = repo::difficulty_stats(&state.db).await?;
    Ok(envelope::keyed("stats", stats))
}

#[instrument(skip(state))]
pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> Result<Json<Value>> {
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid year: {year}")))?;
    let plan = repo::monthly_plan(&state.db, year).await?;
    Ok(Json(json!({
        "status": "success",
        "results": plan.len(),
        "data": { "plan": plan },
    })))
}
