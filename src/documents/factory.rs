//! One set of CRUD handlers shared by every document collection.
//!
//! The `G` parameter of each handler is the guard extractor for the route:
//! `()` for public routes, `RequireRole<P>` or `CurrentUser` otherwise.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{repo, repo::DocumentQuery, Collection, Include, Resource};
use crate::{
    envelope,
    error::{AppError, Result},
    http::parse_id,
    query::{FilterClause, Projection, QuerySpec, Queryable, RequestQuery, SortKey, VERSION_FIELD},
    state::AppState,
};

/// Keys the server owns; a client body never sets them.
const SERVER_FIELDS: [&str; 4] = ["id", "_id", "createdAt", VERSION_FIELD];

pub type RawQuery = Query<Vec<(String, String)>>;

pub(crate) fn body_object(body: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut map) = body else {
        return Err(AppError::BadRequest("Request body must be a JSON object".into()));
    };
    for key in SERVER_FIELDS {
        map.remove(key);
    }
    Ok(map)
}

/// Deserializes into the schema, validates, and returns the normalized
/// body ready to store.
fn conform<R: Resource>(body: Map<String, Value>) -> Result<Map<String, Value>> {
    let mut typed: R = serde_json::from_value(Value::Object(body))
        .map_err(|e| super::invalid(e.to_string()))?;
    typed.validate()?;
    match serde_json::to_value(typed).map_err(anyhow::Error::from)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal(anyhow::anyhow!(
            "{} schema did not serialize to an object",
            R::COLLECTION.label()
        ))),
    }
}

fn decorate<R: Resource>(docs: &mut [Value]) {
    for doc in docs.iter_mut() {
        if let Value::Object(map) = doc {
            R::decorate(map);
        }
    }
}

/// Runs the request query against `R`'s collection, inside `scope`.
pub async fn list<R: Resource>(
    state: &AppState,
    query: &RequestQuery,
    scope: &[FilterClause],
) -> Result<Vec<Value>> {
    let spec = QuerySpec::from_request(query)?;
    let base = DocumentQuery::new(R::COLLECTION).find(scope);
    let mut docs = spec.apply(base).fetch(&state.db).await?;
    decorate::<R>(&mut docs);
    resolve_includes(state, R::LIST_INCLUDES, &mut docs).await?;
    Ok(docs)
}

pub async fn fetch_one<R: Resource>(state: &AppState, id: Uuid) -> Result<Value> {
    let doc = repo::find_by_id(&state.db, R::COLLECTION, id)
        .await?
        .ok_or_else(|| R::COLLECTION.not_found())?;
    let mut docs = [doc];
    decorate::<R>(&mut docs);
    resolve_includes(state, R::ONE_INCLUDES, &mut docs).await?;
    let [doc] = docs;
    Ok(doc)
}

pub async fn create<R: Resource>(state: &AppState, body: Map<String, Value>) -> Result<Value> {
    let mut doc = conform::<R>(body)?;
    doc.insert(VERSION_FIELD.to_string(), Value::from(0));
    let mut created = [repo::insert(&state.db, R::COLLECTION, doc).await?];
    decorate::<R>(&mut created);
    let [created] = created;
    info!(collection = R::COLLECTION.table(), id = %created["id"], "document created");
    Ok(created)
}

/// Shallow merge of `patch` over the stored body, then full validation.
pub async fn update<R: Resource>(
    state: &AppState,
    id: Uuid,
    patch: Map<String, Value>,
) -> Result<Value> {
    let mut stored = repo::find_stored(&state.db, R::COLLECTION, id)
        .await?
        .ok_or_else(|| R::COLLECTION.not_found())?;
    stored.remove(VERSION_FIELD);
    stored.extend(patch);
    let doc = conform::<R>(stored)?;
    let updated = repo::replace(&state.db, R::COLLECTION, id, doc)
        .await?
        .ok_or_else(|| R::COLLECTION.not_found())?;
    let mut updated = [updated];
    decorate::<R>(&mut updated);
    let [updated] = updated;
    info!(collection = R::COLLECTION.table(), %id, "document updated");
    Ok(updated)
}

pub async fn remove<R: Resource>(state: &AppState, id: Uuid) -> Result<()> {
    if !repo::delete(&state.db, R::COLLECTION, id).await? {
        return Err(R::COLLECTION.not_found());
    }
    info!(collection = R::COLLECTION.table(), %id, "document deleted");
    Ok(())
}

async fn resolve_includes(state: &AppState, includes: &[Include], docs: &mut [Value]) -> Result<()> {
    for include in includes {
        match include {
            Include::Author => include_authors(state, docs).await?,
            Include::Reviews => include_reviews(state, docs).await?,
        }
    }
    Ok(())
}

/// Swaps each `user` id for the user's public summary, or `null` when the
/// user is gone.
async fn include_authors(state: &AppState, docs: &mut [Value]) -> Result<()> {
    let ids: Vec<Uuid> = docs
        .iter()
        .filter_map(|d| d.get("user").and_then(Value::as_str))
        .filter_map(|s| s.parse().ok())
        .collect();
    if ids.is_empty() {
        return Ok(());
    }
    let summaries: HashMap<String, Value> = state
        .users
        .summaries(&ids)
        .await?
        .into_iter()
        .map(|s| serde_json::to_value(&s).map(|v| (s.id.to_string(), v)))
        .collect::<serde_json::Result<_>>()
        .map_err(anyhow::Error::from)?;

    for doc in docs.iter_mut() {
        let Some(Value::String(user_id)) = doc.get("user") else {
            continue;
        };
        let author = summaries.get(user_id).cloned().unwrap_or(Value::Null);
        doc["user"] = author;
    }
    Ok(())
}

async fn include_reviews(state: &AppState, docs: &mut [Value]) -> Result<()> {
    for doc in docs.iter_mut() {
        let Some(tour_id) = doc.get("id").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        let mut reviews = DocumentQuery::new(Collection::Reviews)
            .find(&[FilterClause::eq("tour", tour_id)])
            .sort(&[SortKey {
                field: crate::query::CREATED_AT.to_string(),
                direction: crate::query::Direction::Desc,
            }])
            .select(&Projection::Exclude(vec![VERSION_FIELD.to_string()]))
            .fetch(&state.db)
            .await?;
        include_authors(state, &mut reviews).await?;
        doc["reviews"] = Value::Array(reviews);
    }
    Ok(())
}

// --- handlers ---

#[instrument(skip(state, _guard))]
pub async fn get_all<R: Resource, G: Send>(
    State(state): State<AppState>,
    _guard: G,
    Query(raw): RawQuery,
) -> Result<Json<Value>> {
    let query = RequestQuery::from_pairs(raw)?;
    let docs = list::<R>(&state, &query, &[]).await?;
    Ok(envelope::many(docs))
}

#[instrument(skip(state, _guard))]
pub async fn get_one<R: Resource, G: Send>(
    State(state): State<AppState>,
    _guard: G,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let doc = fetch_one::<R>(&state, parse_id(&id)?).await?;
    Ok(envelope::one(doc))
}

#[instrument(skip(state, _guard, body))]
pub async fn create_one<R: Resource, G: Send>(
    State(state): State<AppState>,
    _guard: G,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let doc = create::<R>(&state, body_object(body)?).await?;
    Ok((StatusCode::CREATED, envelope::one(doc)))
}

#[instrument(skip(state, _guard, body))]
pub async fn update_one<R: Resource, G: Send>(
    State(state): State<AppState>,
    _guard: G,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let id = parse_id(&id)?;
    let doc = update::<R>(&state, id, body_object(body)?).await?;
    Ok(envelope::one(doc))
}

#[instrument(skip(state, _guard))]
pub async fn delete_one<R: Resource, G: Send>(
    State(state): State<AppState>,
    _guard: G,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    remove::<R>(&state, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
