use serde_json::{Map, Value};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::Collection;
use crate::{
    error::{AppError, Result},
    query::{
        coerce, Direction, FilterClause, FilterValue, Operator, Projection, Queryable, SortKey,
        CREATED_AT,
    },
};

/// A stored document as clients see it: its fields plus `id` and `createdAt`.
const FULL_DOC: &str = "(doc || jsonb_build_object('id', id, 'createdAt', created_at))";

/// Where a client-facing field name lives in a row.
enum Column {
    Id,
    CreatedAt,
    /// Path into `doc`; `a.b` reads `doc -> 'a' -> 'b'`.
    Doc(Vec<String>),
}

impl Column {
    fn of(field: &str) -> Self {
        match field {
            "id" | "_id" => Column::Id,
            CREATED_AT => Column::CreatedAt,
            other => Column::Doc(other.split('.').map(str::to_string).collect()),
        }
    }
}

/// Query over one collection, compiled to a single `SELECT`. Field names
/// and values are always bound, never spliced into the SQL text.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    collection: Collection,
    clauses: Vec<FilterClause>,
    sort: Vec<SortKey>,
    projection: Option<Projection>,
    skip: u64,
    limit: Option<u64>,
}

impl DocumentQuery {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            clauses: Vec::new(),
            sort: Vec::new(),
            projection: None,
            skip: 0,
            limit: None,
        }
    }

    pub fn builder(&self) -> Result<QueryBuilder<'static, Postgres>> {
        let mut qb = QueryBuilder::new("SELECT ");
        match &self.projection {
            None => {
                qb.push(FULL_DOC);
            }
            Some(Projection::Include(fields)) => {
                let mut keep = fields.clone();
                if !keep.iter().any(|f| f == "id") {
                    keep.push("id".to_string());
                }
                qb.push("(SELECT coalesce(jsonb_object_agg(e.key, e.value), '{}'::jsonb) FROM jsonb_each(")
                    .push(FULL_DOC)
                    .push(") e WHERE e.key = ANY(")
                    .push_bind(keep)
                    .push("))");
            }
            Some(Projection::Exclude(fields)) => {
                qb.push("(")
                    .push(FULL_DOC)
                    .push(" - ")
                    .push_bind(fields.clone())
                    .push("::text[])");
            }
        }
        qb.push(" AS doc FROM ")
            .push(self.collection.table())
            .push(" WHERE TRUE");

        for clause in &self.clauses {
            qb.push(" AND ");
            push_clause(&mut qb, clause)?;
        }

        qb.push(" ORDER BY ");
        for key in &self.sort {
            push_column(&mut qb, &key.field);
            qb.push(match key.direction {
                Direction::Asc => " ASC NULLS FIRST, ",
                Direction::Desc => " DESC NULLS LAST, ",
            });
        }
        qb.push("id ASC");

        if self.skip > 0 {
            qb.push(" OFFSET ").push_bind(i64::try_from(self.skip).unwrap_or(i64::MAX));
        }
        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        Ok(qb)
    }

    pub async fn fetch(self, db: &PgPool) -> Result<Vec<Value>> {
        let mut qb = self.builder()?;
        debug!(collection = self.collection.table(), sql = qb.sql(), "document query");
        let docs = qb.build_query_scalar::<Value>().fetch_all(db).await?;
        Ok(docs)
    }
}

impl Queryable for DocumentQuery {
    fn find(mut self, clauses: &[FilterClause]) -> Self {
        self.clauses.extend_from_slice(clauses);
        self
    }

    fn sort(mut self, keys: &[SortKey]) -> Self {
        self.sort = keys.to_vec();
        self
    }

    fn select(mut self, projection: &Projection) -> Self {
        self.projection = Some(projection.clone());
        self
    }

    fn skip(mut self, n: u64) -> Self {
        self.skip = n;
        self
    }

    fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }
}

fn push_column(qb: &mut QueryBuilder<'static, Postgres>, field: &str) {
    match Column::of(field) {
        Column::Id => {
            qb.push("id");
        }
        Column::CreatedAt => {
            qb.push("created_at");
        }
        Column::Doc(path) => {
            qb.push("(doc #> ").push_bind(path).push(")");
        }
    }
}

fn push_clause(qb: &mut QueryBuilder<'static, Postgres>, clause: &FilterClause) -> Result<()> {
    let op = match &clause.op {
        Operator::Eq => "=",
        Operator::Gte => ">=",
        Operator::Gt => ">",
        Operator::Lte => "<=",
        Operator::Lt => "<",
        Operator::Other(other) => {
            return Err(AppError::BadRequest(format!(
                "Unsupported filter operator `{other}` on `{}`",
                clause.field
            )))
        }
    };

    match (Column::of(&clause.field), &clause.value) {
        (Column::Id, _) if clause.op != Operator::Eq => {
            return Err(AppError::BadRequest(
                "Only equality filters are supported on id".into(),
            ));
        }
        (Column::Id, FilterValue::One(v)) => {
            qb.push("id = ").push_bind(parse_uuid(v)?);
        }
        (Column::Id, FilterValue::AnyOf(vs)) => {
            let ids = vs.iter().map(|v| parse_uuid(v)).collect::<Result<Vec<_>>>()?;
            qb.push("id = ANY(").push_bind(ids).push(")");
        }
        (Column::CreatedAt, FilterValue::One(v)) => {
            qb.push("created_at ")
                .push(op)
                .push(" ")
                .push_bind(parse_timestamp(v)?);
        }
        (Column::CreatedAt, FilterValue::AnyOf(vs)) => {
            let times = vs.iter().map(|v| parse_timestamp(v)).collect::<Result<Vec<_>>>()?;
            qb.push("created_at = ANY(").push_bind(times).push(")");
        }
        (Column::Doc(path), FilterValue::One(v)) if clause.op == Operator::Eq => {
            qb.push("(doc #> ")
                .push_bind(path)
                .push(") = ")
                .push_bind(Json(coerce(v)));
        }
        (Column::Doc(path), FilterValue::One(v)) => {
            // Ranges only hold between numbers or between strings. jsonb
            // would otherwise order every string above every number.
            let value = coerce(v);
            let Some(kind) = range_kind(&value) else {
                qb.push("FALSE");
                return Ok(());
            };
            qb.push("(jsonb_typeof(doc #> ")
                .push_bind(path.clone())
                .push(") = ")
                .push_bind(kind)
                .push(" AND (doc #> ")
                .push_bind(path)
                .push(") ")
                .push(op)
                .push(" ")
                .push_bind(Json(value))
                .push(")");
        }
        (Column::Doc(path), FilterValue::AnyOf(vs)) => {
            let values: Vec<Json<Value>> = vs.iter().map(|v| Json(coerce(v))).collect();
            qb.push("(doc #> ")
                .push_bind(path)
                .push(") = ANY(")
                .push_bind(values)
                .push(")");
        }
    }
    Ok(())
}

/// `jsonb_typeof` name of a value a range filter can compare against.
fn range_kind(value: &Value) -> Option<&'static str> {
    match value {
        Value::Number(_) => Some("number"),
        Value::String(_) => Some("string"),
        _ => None,
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    crate::http::parse_id(raw)
}

/// RFC 3339, or a bare `YYYY-MM-DD` meaning midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(t);
    }
    let date = Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::BadRequest(format!("Invalid date: {raw}")))?;
    Ok(date.midnight().assume_utc())
}

pub async fn find_by_id(db: &PgPool, collection: Collection, id: Uuid) -> Result<Option<Value>> {
    let sql = format!("SELECT {FULL_DOC} FROM {} WHERE id = $1", collection.table());
    let doc = sqlx::query_scalar::<_, Value>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(doc)
}

/// The stored body only, without `id` and `createdAt`.
pub async fn find_stored(
    db: &PgPool,
    collection: Collection,
    id: Uuid,
) -> Result<Option<Map<String, Value>>> {
    let sql = format!("SELECT doc FROM {} WHERE id = $1", collection.table());
    let doc = sqlx::query_scalar::<_, Json<Map<String, Value>>>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(doc.map(|Json(m)| m))
}

pub async fn insert(db: &PgPool, collection: Collection, doc: Map<String, Value>) -> Result<Value> {
    let sql = format!(
        "INSERT INTO {} (doc) VALUES ($1) RETURNING {FULL_DOC}",
        collection.table()
    );
    let created = sqlx::query_scalar::<_, Value>(&sql)
        .bind(Json(doc))
        .fetch_one(db)
        .await?;
    Ok(created)
}

/// Overwrites the body and bumps `__v`.
pub async fn replace(
    db: &PgPool,
    collection: Collection,
    id: Uuid,
    doc: Map<String, Value>,
) -> Result<Option<Value>> {
    let sql = format!(
        r#"
        UPDATE {}
        SET doc = $2 || jsonb_build_object('__v', coalesce((doc ->> '__v')::bigint, 0) + 1)
        WHERE id = $1
        RETURNING {FULL_DOC}
        "#,
        collection.table()
    );
    let updated = sqlx::query_scalar::<_, Value>(&sql)
        .bind(id)
        .bind(Json(doc))
        .fetch_optional(db)
        .await?;
    Ok(updated)
}

pub async fn delete(db: &PgPool, collection: Collection, id: Uuid) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = $1", collection.table());
    let res = sqlx::query(&sql).bind(id).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
