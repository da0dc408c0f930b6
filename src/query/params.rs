use std::collections::BTreeMap;

use super::QueryError;

/// One value of a request query after bracket expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, QueryValue>),
}

impl QueryValue {
    /// Last scalar wins when a key was repeated.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s),
            QueryValue::List(items) => items.last().map(String::as_str),
            QueryValue::Map(_) => None,
        }
    }
}

/// The flat `key=value` pairs of a request, expanded into a tree so that
/// `duration[gte]=5` reads as `{duration: {gte: "5"}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestQuery(BTreeMap<String, QueryValue>);

impl RequestQuery {
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut root = BTreeMap::new();
        for (key, value) in pairs {
            let path = parse_key(key.as_ref())?;
            insert(&mut root, &path, value.into())?;
        }
        Ok(Self(root))
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(QueryValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.0.iter()
    }

    /// Copy of this query with `key` overridden, used by alias routes.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), QueryValue::Text(value.to_string()));
        self
    }
}

/// `a[b][c]` -> `["a", "b", "c"]`; `a[]` -> `["a", ""]`.
fn parse_key(raw: &str) -> Result<Vec<String>, QueryError> {
    let malformed = || QueryError::MalformedKey(raw.to_string());

    let (head, mut rest) = match raw.find('[') {
        Some(idx) => (&raw[..idx], &raw[idx..]),
        None => (raw, ""),
    };
    if head.is_empty() || head.contains(']') {
        return Err(malformed());
    }

    let mut path = vec![head.to_string()];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
        let close = inner.find(']').ok_or_else(malformed)?;
        let segment = &inner[..close];
        if segment.contains('[') {
            return Err(malformed());
        }
        path.push(segment.to_string());
        rest = &inner[close + 1..];
    }
    Ok(path)
}

fn insert(
    map: &mut BTreeMap<String, QueryValue>,
    path: &[String],
    value: String,
) -> Result<(), QueryError> {
    let (key, tail) = match path.split_first() {
        Some(parts) => parts,
        None => return Ok(()),
    };

    // `key[]=v` appends to a list.
    if tail.len() == 1 && tail[0].is_empty() {
        return push_scalar(map, key, value);
    }
    if tail.is_empty() {
        return push_scalar(map, key, value);
    }

    let entry = map
        .entry(key.clone())
        .or_insert_with(|| QueryValue::Map(BTreeMap::new()));
    match entry {
        QueryValue::Map(inner) => insert(inner, tail, value),
        _ => Err(QueryError::Conflict(key.clone())),
    }
}

fn push_scalar(
    map: &mut BTreeMap<String, QueryValue>,
    key: &str,
    value: String,
) -> Result<(), QueryError> {
    let Some(slot) = map.get_mut(key) else {
        map.insert(key.to_string(), QueryValue::Text(value));
        return Ok(());
    };
    match slot {
        QueryValue::Text(prev) => {
            let prev = std::mem::take(prev);
            *slot = QueryValue::List(vec![prev, value]);
            Ok(())
        }
        QueryValue::List(items) => {
            items.push(value);
            Ok(())
        }
        QueryValue::Map(_) => Err(QueryError::Conflict(key.to_string())),
    }
}
