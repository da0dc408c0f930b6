//! Request-query translation: `?duration[gte]=5&sort=-price&fields=name&page=2`
//! becomes a [`QuerySpec`] that can be applied to any [`Queryable`].

mod params;
mod queryable;
mod spec;

pub use params::{QueryValue, RequestQuery};
pub use queryable::{coerce, Queryable};
pub use spec::{
    Direction, FilterClause, FilterValue, Operator, Page, Projection, QuerySpec, SortKey,
    CREATED_AT, VERSION_FIELD,
};

#[cfg(test)]
pub(crate) use queryable::memory::MemoryQuery;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Malformed query parameter `{0}`")]
    MalformedKey(String),

    #[error("Query parameter `{0}` cannot be both a value and a set of operators")]
    Conflict(String),

    #[error("Operator `{op}` on `{field}` takes a single value")]
    MultipleValues { field: String, op: String },

    #[error("Filter on `{0}` is nested too deeply")]
    TooDeep(String),

    #[error("Projection cannot mix included and excluded fields")]
    MixedProjection,
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
