use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;

use crate::{
    documents::{invalid, required, Collection, Include, Resource},
    error::AppError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Number>,
    /// Tour id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour: Option<String>,
    /// Author's user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

fn reference(value: &mut Option<String>, missing: &str, field: &str) -> Result<(), AppError> {
    let raw = required(value, missing)?;
    let id: Uuid = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{field} is not a valid id")))?;
    *value = Some(id.to_string());
    Ok(())
}

impl Resource for Review {
    const COLLECTION: Collection = Collection::Reviews;
    const LIST_INCLUDES: &'static [Include] = &[Include::Author];
    const ONE_INCLUDES: &'static [Include] = &[Include::Author];

    fn validate(&mut self) -> Result<(), AppError> {
        if let Some(text) = &mut self.review {
            *text = text.trim().to_string();
        }
        match &self.review {
            Some(text) if !text.is_empty() => {}
            _ => return Err(AppError::BadRequest("Review can not be empty!".into())),
        }
        match required(&self.rating, "Rating must be entered")?.as_f64() {
            Some(r) if (1.0..=5.0).contains(&r) => {}
            _ => return Err(invalid("Rating must be between 1 and 5")),
        }
        reference(&mut self.tour, "Review must belong to a tour.", "tour")?;
        reference(&mut self.user, "Review must belong to a user.", "user")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn conform(value: Value) -> Result<Review, AppError> {
        let mut review: Review = serde_json::from_value(value).unwrap();
        review.validate()?;
        Ok(review)
    }

    #[test]
    fn references_are_normalized() {
        let tour = Uuid::new_v4();
        let review = conform(json!({
            "review": " Loved it ",
            "rating": 5,
            "tour": tour.to_string().to_uppercase(),
            "user": Uuid::new_v4().to_string(),
        }))
        .unwrap();
        assert_eq!(review.review.as_deref(), Some("Loved it"));
        assert_eq!(review.tour, Some(tour.to_string()));
    }

    #[test]
    fn rejects_bad_reviews() {
        let user = Uuid::new_v4().to_string();
        let tour = Uuid::new_v4().to_string();
        let cases = [
            (json!({"review": " ", "rating": 4, "tour": tour, "user": user}), "Review can not be empty!"),
            (json!({"review": "ok", "tour": tour, "user": user}), "Rating must be entered"),
            (json!({"review": "ok", "rating": 4, "user": user}), "Review must belong to a tour."),
            (json!({"review": "ok", "rating": 4, "tour": tour}), "Review must belong to a user."),
        ];
        for (body, message) in cases {
            assert_eq!(conform(body).unwrap_err().to_string(), message);
        }
        let out_of_range = json!({"review": "ok", "rating": 6, "tour": tour, "user": user});
        assert!(matches!(conform(out_of_range), Err(AppError::BadRequest(_))));
        let bad_ref = json!({"review": "ok", "rating": 4, "tour": "nope", "user": user});
        assert!(matches!(conform(bad_ref), Err(AppError::BadRequest(_))));
    }
}
