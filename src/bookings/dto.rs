use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;

use crate::{
    documents::{invalid, required, Collection, Include, Resource},
    error::AppError,
};

fn paid_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(default = "paid_by_default")]
    pub paid: bool,
}

impl Resource for Booking {
    const COLLECTION: Collection = Collection::Bookings;
    const LIST_INCLUDES: &'static [Include] = &[Include::Author];
    const ONE_INCLUDES: &'static [Include] = &[Include::Author];

    fn validate(&mut self) -> Result<(), AppError> {
        for (value, missing) in [
            (&mut self.tour, "Booking must belong to a Tour!"),
            (&mut self.user, "Booking must belong to a User!"),
        ] {
            let id: Uuid = required(value, missing)?
                .trim()
                .parse()
                .map_err(|_| invalid("Booking references must be valid ids"))?;
            *value = Some(id.to_string());
        }
        let price = required(&self.price, "Booking must have a price.")?;
        match price.as_f64() {
            Some(p) if p >= 0.0 => Ok(()),
            _ => Err(invalid("price must not be negative")),
        }
    }
}
