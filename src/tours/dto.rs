use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use time::format_description::well_known::Rfc3339;

use crate::{
    documents::{invalid, repo::parse_timestamp, required, Collection, Include, Resource},
    error::AppError,
};

pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];
pub const DEFAULT_RATING: f64 = 4.5;

fn default_rating() -> Number {
    Number::from_f64(DEFAULT_RATING).unwrap_or_else(|| Number::from(4))
}

fn default_quantity() -> Number {
    Number::from(0)
}

/// Stored shape of a tour. Numbers stay `Number` so `397` is not echoed
/// back as `397.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_group_size: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default = "default_rating")]
    pub ratings_average: Number,
    #[serde(default = "default_quantity")]
    pub ratings_quantity: Number,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<String>,
}

fn non_negative(n: &Number, field: &str) -> Result<f64, AppError> {
    match n.as_f64() {
        Some(v) if v >= 0.0 => Ok(v),
        _ => Err(invalid(format!("{field} must not be negative"))),
    }
}

fn trimmed(value: &mut Option<String>) {
    if let Some(s) = value {
        *s = s.trim().to_string();
    }
}

impl Resource for Tour {
    const COLLECTION: Collection = Collection::Tours;
    const ONE_INCLUDES: &'static [Include] = &[Include::Reviews];

    fn validate(&mut self) -> Result<(), AppError> {
        trimmed(&mut self.name);
        trimmed(&mut self.summary);
        trimmed(&mut self.description);

        let name = required(&self.name, "A tour must have a name")?;
        if name.is_empty() {
            return Err(AppError::BadRequest("A tour must have a name".into()));
        }
        non_negative(required(&self.duration, "A tour must have a duration")?, "duration")?;
        non_negative(
            required(&self.max_group_size, "A tour must have a group size")?,
            "maxGroupSize",
        )?;
        let difficulty = required(&self.difficulty, "A tour must have a difficulty")?;
        if !DIFFICULTIES.contains(&difficulty.as_str()) {
            return Err(invalid("Difficulty is either: easy, medium, difficult"));
        }
        let price = non_negative(required(&self.price, "A tour must have a price")?, "price")?;
        if let Some(discount) = &self.price_discount {
            if non_negative(discount, "priceDiscount")? >= price {
                return Err(invalid("Discount price should be below regular price"));
            }
        }
        match self.ratings_average.as_f64() {
            Some(r) if (1.0..=5.0).contains(&r) => {}
            _ => return Err(invalid("Rating must be between 1.0 and 5.0")),
        }
        non_negative(&self.ratings_quantity, "ratingsQuantity")?;
        required(&self.summary, "A tour must have a summary")?;
        required(&self.image_cover, "A tour must have a cover image")?;

        self.start_dates = self
            .start_dates
            .iter()
            .map(|raw| {
                parse_timestamp(raw)?
                    .format(&Rfc3339)
                    .map_err(|e| AppError::Internal(e.into()))
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn decorate(doc: &mut Map<String, Value>) {
        let weeks = doc
            .get("duration")
            .and_then(Value::as_f64)
            .and_then(|d| Number::from_f64(d / 7.0));
        if let Some(weeks) = weeks {
            doc.insert("durationWeeks".into(), Value::Number(weeks));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn forest_hiker() -> Value {
        json!({
            "name": "  The Forest Hiker ",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
            "startDates": ["2021-04-25", "2021-07-20T09:00:00Z"],
            "secretTour": true
        })
    }

    fn conform(value: Value) -> Result<Value, AppError> {
        let mut tour: Tour = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        tour.validate()?;
        Ok(serde_json::to_value(tour).unwrap())
    }

    #[test]
    fn defaults_and_normalization() {
        let doc = conform(forest_hiker()).unwrap();
        assert_eq!(doc["name"], "The Forest Hiker");
        assert_eq!(doc["ratingsAverage"], 4.5);
        assert_eq!(doc["ratingsQuantity"], 0);
        assert_eq!(doc["price"], json!(397));
        assert_eq!(doc["startDates"][0], "2021-04-25T00:00:00Z");
        assert!(doc.get("secretTour").is_none());
        assert!(doc.get("priceDiscount").is_none());
    }

    #[test]
    fn required_fields_have_messages() {
        let mut body = forest_hiker();
        body.as_object_mut().unwrap().remove("price");
        assert_eq!(conform(body).unwrap_err().to_string(), "A tour must have a price");
    }

    #[test]
    fn rejects_out_of_range_values() {
        for (field, value) in [
            ("difficulty", json!("extreme")),
            ("priceDiscount", json!(400)),
            ("ratingsAverage", json!(5.5)),
            ("duration", json!(-1)),
            ("startDates", json!(["someday"])),
        ] {
            let mut body = forest_hiker();
            body[field] = value;
            assert!(
                matches!(conform(body), Err(AppError::BadRequest(_))),
                "{field} should be rejected"
            );
        }
    }

    #[test]
    fn duration_weeks_is_derived() {
        let mut doc = json!({"duration": 14}).as_object().unwrap().clone();
        Tour::decorate(&mut doc);
        assert_eq!(doc["durationWeeks"], 2.0);

        let mut projected = json!({"name": "x"}).as_object().unwrap().clone();
        Tour::decorate(&mut projected);
        assert!(projected.get("durationWeeks").is_none());
    }
}
