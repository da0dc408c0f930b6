use super::{
    params::{QueryValue, RequestQuery},
    queryable::Queryable,
    QueryError,
};

/// Control keys that never become filters.
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];
pub const DEFAULT_PAGE_SIZE: u64 = 100;
/// Hard cap on page size so a single request cannot pull a whole collection.
pub const MAX_PAGE_SIZE: u64 = 1000;
pub const CREATED_AT: &str = "createdAt";
/// Internal document revision counter, hidden unless asked for.
pub const VERSION_FIELD: &str = "__v";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
    /// Anything else is carried as-is; the storage layer decides.
    Other(String),
}

impl Operator {
    fn parse(raw: &str) -> Self {
        match raw {
            "gte" => Operator::Gte,
            "gt" => Operator::Gt,
            "lte" => Operator::Lte,
            "lt" => Operator::Lt,
            other => Operator::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    One(String),
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub op: Operator,
    pub value: FilterValue,
}

impl FilterClause {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: Operator::Eq,
            value: FilterValue::One(value.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    /// `-price` sorts descending, `price` ascending.
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, direction) = match raw.strip_prefix('-') {
            Some(field) => (field, Direction::Desc),
            None => (raw, Direction::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }

    fn newest_first() -> Self {
        Self {
            field: CREATED_AT.to_string(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

/// Largest offset storage accepts (a signed 64-bit bind).
pub const MAX_SKIP: u64 = i64::MAX as u64;

impl Page {
    /// Saturates at [`MAX_SKIP`]; a page that far out is simply empty.
    pub fn skip(&self) -> u64 {
        self.number
            .saturating_sub(1)
            .saturating_mul(self.size)
            .min(MAX_SKIP)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Filter, sort, projection and page derived from one request.
///
/// Every step consumes the spec and returns a new one, and each step owns
/// exactly one part of it, so the steps can run in any order.
/// [`QuerySpec::apply`] always hands them to storage filter-first.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    filters: Vec<FilterClause>,
    sort: Vec<SortKey>,
    projection: Projection,
    page: Page,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: vec![SortKey::newest_first()],
            projection: Projection::Exclude(vec![VERSION_FIELD.to_string()]),
            page: Page::default(),
        }
    }
}

impl QuerySpec {
    /// Runs all four steps.
    pub fn from_request(query: &RequestQuery) -> Result<Self, QueryError> {
        Ok(Self::default()
            .filter(query)?
            .sort(query)
            .limit_fields(query)?
            .paginate(query))
    }

    pub fn filter(self, query: &RequestQuery) -> Result<Self, QueryError> {
        let mut filters = Vec::new();
        for (field, value) in query.iter() {
            if RESERVED_KEYS.contains(&field.as_str()) {
                continue;
            }
            match value {
                QueryValue::Text(v) => filters.push(FilterClause::eq(field, v.clone())),
                QueryValue::List(vs) => filters.push(FilterClause {
                    field: field.clone(),
                    op: Operator::Eq,
                    value: FilterValue::AnyOf(vs.clone()),
                }),
                QueryValue::Map(ops) => {
                    for (op, v) in ops {
                        let value = match v {
                            QueryValue::Text(v) => v.clone(),
                            QueryValue::List(_) => {
                                return Err(QueryError::MultipleValues {
                                    field: field.clone(),
                                    op: op.clone(),
                                })
                            }
                            QueryValue::Map(_) => return Err(QueryError::TooDeep(field.clone())),
                        };
                        filters.push(FilterClause {
                            field: field.clone(),
                            op: Operator::parse(op),
                            value: FilterValue::One(value),
                        });
                    }
                }
            }
        }
        Ok(Self { filters, ..self })
    }

    pub fn sort(self, query: &RequestQuery) -> Self {
        let keys: Vec<SortKey> = query
            .text("sort")
            .map(|s| s.split(',').filter_map(SortKey::parse).collect())
            .unwrap_or_default();
        let sort = if keys.is_empty() {
            vec![SortKey::newest_first()]
        } else {
            keys
        };
        Self { sort, ..self }
    }

    pub fn limit_fields(self, query: &RequestQuery) -> Result<Self, QueryError> {
        let fields: Vec<&str> = query
            .text("fields")
            .map(|s| s.split(',').map(str::trim).filter(|f| !f.is_empty()).collect())
            .unwrap_or_default();

        let projection = if fields.is_empty() {
            Projection::Exclude(vec![VERSION_FIELD.to_string()])
        } else if fields.iter().all(|f| f.starts_with('-')) {
            let mut excluded: Vec<String> =
                fields.iter().map(|f| f.trim_start_matches('-').to_string()).collect();
            if !excluded.iter().any(|f| f == VERSION_FIELD) {
                excluded.push(VERSION_FIELD.to_string());
            }
            Projection::Exclude(excluded)
        } else if fields.iter().any(|f| f.starts_with('-')) {
            return Err(QueryError::MixedProjection);
        } else {
            Projection::Include(fields.iter().map(|f| f.to_string()).collect())
        };
        Ok(Self { projection, ..self })
    }

    pub fn paginate(self, query: &RequestQuery) -> Self {
        let number = positive(query.text("page")).unwrap_or(1);
        let size = positive(query.text("limit"))
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Self {
            page: Page { number, size },
            ..self
        }
    }

    /// Narrows `base` by this spec. `base` may already carry its own scope.
    pub fn apply<Q: Queryable>(&self, base: Q) -> Q {
        base.find(&self.filters)
            .sort(&self.sort)
            .select(&self.projection)
            .skip(self.page.skip())
            .limit(self.page.size)
    }

    pub fn filters(&self) -> &[FilterClause] {
        &self.filters
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn page(&self) -> Page {
        self.page
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok()).filter(|n| *n >= 1)
}
