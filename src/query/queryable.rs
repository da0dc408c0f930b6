use serde_json::{Number, Value};

use super::spec::{FilterClause, Projection, SortKey};

/// A lazily executed query over one collection. Each call narrows the query
/// and hands it back; nothing runs until the owner executes it.
pub trait Queryable: Sized {
    fn find(self, clauses: &[FilterClause]) -> Self;
    fn sort(self, keys: &[SortKey]) -> Self;
    fn select(self, projection: &Projection) -> Self;
    fn skip(self, n: u64) -> Self;
    fn limit(self, n: u64) -> Self;
}

/// Query strings only carry text; turn it into the JSON scalar a document
/// most likely stores.
pub fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::memory::MemoryQuery;
    use super::*;
    use crate::query::{params::RequestQuery, spec::QuerySpec};

    fn tours() -> Vec<Value> {
        vec![
            json!({"id": "a", "name": "Forest Hiker", "price": 397, "duration": 5, "difficulty": "easy", "createdAt": "2024-01-01", "__v": 0}),
            json!({"id": "b", "name": "Sea Explorer", "price": 497, "duration": 7, "difficulty": "medium", "createdAt": "2024-01-03", "__v": 0}),
            json!({"id": "c", "name": "Snow Adventurer", "price": 997, "duration": 4, "difficulty": "difficult", "createdAt": "2024-01-02", "__v": 2}),
            json!({"id": "d", "name": "City Wanderer", "price": 497, "duration": 9, "difficulty": "easy", "createdAt": "2024-01-04", "__v": 1}),
        ]
    }

    fn run(pairs: &[(&str, &str)]) -> Vec<Value> {
        let q = RequestQuery::from_pairs(pairs.iter().map(|(k, v)| (*k, v.to_string()))).unwrap();
        QuerySpec::from_request(&q)
            .unwrap()
            .apply(MemoryQuery::new(tours()))
            .execute()
    }

    fn ids(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn coerces_scalars() {
        assert_eq!(coerce("5"), json!(5));
        assert_eq!(coerce("4.5"), json!(4.5));
        assert_eq!(coerce("true"), json!(true));
        assert_eq!(coerce("easy"), json!("easy"));
        assert_eq!(coerce("NaN"), json!("NaN"));
    }

    #[test]
    fn range_and_equality_form_a_conjunction() {
        let rows = run(&[("duration[gte]", "5"), ("difficulty", "easy")]);
        assert_eq!(ids(&rows), vec!["d", "a"]);
    }

    #[test]
    fn default_order_is_newest_first() {
        assert_eq!(ids(&run(&[])), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn secondary_sort_breaks_ties() {
        let rows = run(&[("sort", "-price,name")]);
        assert_eq!(ids(&rows), vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn default_projection_hides_version() {
        let rows = run(&[]);
        assert!(rows.iter().all(|r| r.get("__v").is_none()));
        assert!(rows[0].get("name").is_some());
    }

    #[test]
    fn inclusion_projection_keeps_id() {
        let rows = run(&[("fields", "name,price")]);
        let keys: Vec<_> = rows[0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&"id".to_string()));
    }

    #[test]
    fn pages_through_results() {
        let rows = run(&[("sort", "price"), ("page", "2"), ("limit", "2")]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["price"], 497);
        assert_eq!(rows[1]["id"], "c");
    }

    #[test]
    fn base_scope_is_kept() {
        let q = RequestQuery::from_pairs([("price[lt]", "900")]).unwrap();
        let base = MemoryQuery::new(tours())
            .find(&[crate::query::spec::FilterClause::eq("difficulty", "easy")]);
        let rows = QuerySpec::from_request(&q).unwrap().apply(base).execute();
        assert_eq!(ids(&rows), vec!["d", "a"]);
    }
}
