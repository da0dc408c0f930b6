use std::marker::PhantomData;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::{
    gate,
    repo_types::{Role, User},
};
use crate::{error::AppError, state::AppState};

/// The authenticated principal. Rejects the request when there is none.
///
/// The first extraction per request caches the user in the request
/// extensions, so handlers that also take a [`RequireRole`] do not verify
/// the token twice.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<CurrentUser>() {
            return Ok(cached.clone());
        }
        let user = gate::authenticate(state, &parts.headers).await?;
        let current = CurrentUser(user);
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

/// Role set a route is open to.
pub trait RolePolicy: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;
pub struct AdminOrLeadGuide;
pub struct UserOnly;
pub struct UserOrAdmin;

impl RolePolicy for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

impl RolePolicy for AdminOrLeadGuide {
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::LeadGuide];
}

impl RolePolicy for UserOnly {
    const ALLOWED: &'static [Role] = &[Role::User];
}

impl RolePolicy for UserOrAdmin {
    const ALLOWED: &'static [Role] = &[Role::User, Role::Admin];
}

/// Authenticated principal whose role is in `P::ALLOWED`; 403 otherwise.
pub struct RequireRole<P: RolePolicy>(pub User, PhantomData<P>);

#[async_trait]
impl<P: RolePolicy> FromRequestParts<AppState> for RequireRole<P> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        gate::authorize(&user, P::ALLOWED)?;
        Ok(RequireRole(user, PhantomData))
    }
}
