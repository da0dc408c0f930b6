use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, instrument};

use super::dto::Booking;
use crate::{
    auth::{AdminOrLeadGuide, CurrentUser, RequireRole, User},
    documents::{factory, repo as documents, Collection},
    error::{AppError, Result},
    http::parse_id,
    payments::CheckoutRequest,
    state::AppState,
};

type BookingManager = RequireRole<AdminOrLeadGuide>;

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings/checkout-session/:id", get(checkout_session))
        .route(
            "/bookings",
            get(factory::get_all::<Booking, BookingManager>)
                .post(factory::create_one::<Booking, BookingManager>),
        )
        .route(
            "/bookings/:id",
            get(factory::get_one::<Booking, BookingManager>)
                .patch(factory::update_one::<Booking, BookingManager>)
                .delete(factory::delete_one::<Booking, BookingManager>),
        )
}

/// One-item checkout for `tour`, paid by `user`, amounts in cents.
pub fn checkout_request(tour: &Value, user: &User, base: &str) -> Result<CheckoutRequest> {
    let id = tour
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("tour document has no id")))?;
    let name = tour.get("name").and_then(Value::as_str).unwrap_or("Natours");
    let price = tour
        .get("price")
        .and_then(Value::as_f64)
        .ok_or_else(|| AppError::BadRequest("This tour has no price".into()))?;

    Ok(CheckoutRequest {
        customer_email: user.email.clone(),
        client_reference_id: id.to_string(),
        success_url: format!("{base}/my-tours"),
        cancel_url: format!("{base}/tour/{id}"),
        item_name: format!("{name} Tour"),
        item_description: tour.get("summary").and_then(Value::as_str).map(str::to_string),
        item_image: tour
            .get("imageCover")
            .and_then(Value::as_str)
            .map(|cover| format!("{base}/img/tours/{cover}")),
        unit_amount: (price * 100.0).round() as i64,
        currency: "usd".into(),
    })
}

/// Asks the payment provider for a session and wraps it for the client.
pub async fn open_session(state: &AppState, request: CheckoutRequest) -> Result<Json<Value>> {
    let session = state
        .payments
        .create_checkout_session(request)
        .await
        .map_err(|e| {
            error!(error = %e, "checkout session failed");
            AppError::Unavailable("Could not start the payment. Try again later!".into())
        })?;
    Ok(Json(json!({ "status": "success", "session": session })))
}

#[instrument(skip(state, user))]
pub async fn checkout_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tour_id): Path<String>,
) -> Result<Json<Value>> {
    let tour_id = parse_id(&tour_id)?;
    let tour = documents::find_by_id(&state.db, Collection::Tours, tour_id)
        .await?
        .ok_or_else(|| Collection::Tours.not_found())?;
    let request = checkout_request(&tour, &user, &state.config.public_base_url)?;
    open_session(&state, request).await
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::{auth::Role, state::testing::Fakes};

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Leo Gillespie".into(),
            email: "leo@example.com".into(),
            photo: "default.jpg".into(),
            role: Role::User,
            password_hash: String::new(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn tour() -> Value {
        json!({
            "id": "5c88fa8cf4afda39709c2955",
            "name": "The Sea Explorer",
            "price": 497.5,
            "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
            "imageCover": "tour-2-cover.jpg",
        })
    }

    #[test]
    fn request_describes_the_tour_in_cents() {
        let req = checkout_request(&tour(), &user(), "https://natours.dev").unwrap();
        assert_eq!(req.unit_amount, 49750);
        assert_eq!(req.item_name, "The Sea Explorer Tour");
        assert_eq!(req.success_url, "https://natours.dev/my-tours");
        assert_eq!(req.cancel_url, "https://natours.dev/tour/5c88fa8cf4afda39709c2955");
        assert_eq!(
            req.item_image.as_deref(),
            Some("https://natours.dev/img/tours/tour-2-cover.jpg")
        );
        assert_eq!(req.customer_email, "leo@example.com");
    }

    #[test]
    fn tour_without_price_cannot_be_sold() {
        let mut doc = tour();
        doc.as_object_mut().unwrap().remove("price");
        assert!(matches!(
            checkout_request(&doc, &user(), "http://x"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn session_is_returned_to_the_client() {
        let fakes = Fakes::default();
        let state = AppState::fake_with(&fakes);
        let req = checkout_request(&tour(), &user(), "http://localhost:3000").unwrap();

        let Json(body) = open_session(&state, req.clone()).await.unwrap();

        assert_eq!(body["status"], "success");
        assert_eq!(body["session"]["id"], "cs_test_123");
        assert_eq!(fakes.payments.requests.lock().unwrap().as_slice(), &[req]);
    }
}
