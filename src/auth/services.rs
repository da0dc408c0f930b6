use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{NewPassword, SignupRequest};
use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, lower-cased and syntactically valid.
pub fn validate_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Please provide a valid email".into()));
    }
    Ok(email)
}

pub fn validate_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Please tell us your name!".into()));
    }
    Ok(name.to_string())
}

/// Length and confirmation check. Returns the accepted plain password.
pub fn validate_new_password(new: NewPassword) -> Result<String, AppError> {
    let password = new
        .password
        .ok_or_else(|| AppError::BadRequest("Please provide a password".into()))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if new.password_confirm.as_deref() != Some(password.as_str()) {
        return Err(AppError::BadRequest("Passwords are not the same!".into()));
    }
    Ok(password)
}

#[derive(Debug)]
pub struct ValidSignup {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn validate_signup(req: SignupRequest) -> Result<ValidSignup, AppError> {
    let name = validate_name(req.name.as_deref().unwrap_or_default())?;
    let email = validate_email(req.email.as_deref().unwrap_or_default())?;
    let password = validate_new_password(NewPassword {
        password: req.password,
        password_confirm: req.password_confirm,
    })?;
    Ok(ValidSignup {
        name,
        email,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(password: &str, confirm: &str) -> SignupRequest {
        SignupRequest {
            name: Some(" Jonas ".into()),
            email: Some(" Jonas@Example.COM ".into()),
            password: Some(password.into()),
            password_confirm: Some(confirm.into()),
        }
    }

    #[test]
    fn email_regex() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn signup_normalizes_name_and_email() {
        let ok = validate_signup(signup("pass1234", "pass1234")).unwrap();
        assert_eq!(ok.name, "Jonas");
        assert_eq!(ok.email, "jonas@example.com");
        assert_eq!(ok.password, "pass1234");
    }

    #[test]
    fn signup_rejects_short_or_unconfirmed_passwords() {
        assert!(matches!(
            validate_signup(signup("short", "short")),
            Err(AppError::BadRequest(_))
        ));
        let err = validate_signup(signup("pass1234", "pass12345")).unwrap_err();
        assert_eq!(err.to_string(), "Passwords are not the same!");
    }

    #[test]
    fn signup_requires_every_field() {
        let err = validate_signup(SignupRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "Please tell us your name!");

        let mut req = signup("pass1234", "pass1234");
        req.email = None;
        assert_eq!(
            validate_signup(req).unwrap_err().to_string(),
            "Please provide a valid email"
        );
    }
}
