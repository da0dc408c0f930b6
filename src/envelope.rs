//! Success bodies. Errors have their own envelope in [`crate::error`].

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// `{status: "success", data: {<key>: value}}`
pub fn keyed<T: Serialize>(key: &str, value: T) -> Json<Value> {
    let mut data = serde_json::Map::new();
    data.insert(key.to_string(), json!(value));
    Json(json!({ "status": "success", "data": data }))
}

/// One document under `data.data`.
pub fn one<T: Serialize>(doc: T) -> Json<Value> {
    keyed("data", doc)
}

/// A page of documents with its length.
pub fn many<T: Serialize>(docs: Vec<T>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": docs.len(),
        "data": { "data": docs },
    }))
}

pub fn message(text: &str) -> Json<Value> {
    Json(json!({ "status": "success", "message": text }))
}
