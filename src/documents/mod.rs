//! JSON document collections (tours, reviews, bookings) and the generic
//! handlers that serve them.

pub mod factory;
pub mod repo;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tours,
    Reviews,
    Bookings,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Tours => "tours",
            Collection::Reviews => "reviews",
            Collection::Bookings => "bookings",
        }
    }

    /// Singular name used in client messages.
    pub fn label(self) -> &'static str {
        match self {
            Collection::Tours => "tour",
            Collection::Reviews => "review",
            Collection::Bookings => "booking",
        }
    }

    pub fn not_found(self) -> AppError {
        AppError::NotFound(format!("No {} found with that ID", self.label()))
    }
}

/// Related data attached to a document on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Include {
    /// Replace the `user` id with `{id, name, photo}` of that user.
    Author,
    /// Attach the tour's reviews, each with its author, as `reviews`.
    Reviews,
}

/// A typed schema for one collection. Documents are validated by
/// deserializing into `Self`, so unknown fields are dropped and defaults
/// applied.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    const LIST_INCLUDES: &'static [Include] = &[];
    const ONE_INCLUDES: &'static [Include] = &[];

    /// Required fields and value ranges, checked on create and on the
    /// merged result of an update.
    fn validate(&mut self) -> Result<(), AppError>;

    /// Derived fields added to documents on read.
    fn decorate(_doc: &mut Map<String, Value>) {}
}

pub(crate) fn required<'a, T>(value: &'a Option<T>, message: &str) -> Result<&'a T, AppError> {
    value
        .as_ref()
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

pub(crate) fn invalid(message: impl Into<String>) -> AppError {
    AppError::BadRequest(format!("Invalid input data. {}", message.into()))
}
