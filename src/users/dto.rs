use serde::Deserialize;
use serde_json::Value;

use crate::auth::Role;

/// Body of `PATCH /users/updateMe`. Password fields are only captured so
/// their presence can be refused; anything else unknown is dropped.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

impl UpdateMeRequest {
    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }
}

/// Body of the admin `PATCH /users/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct AdminUserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}
