use std::collections::BTreeMap;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

/** Field-level validation messages, keyed by the request field name */
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> FieldErrors {
        FieldErrors::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// Records `The {field} field is required.` when the trimmed value is empty
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.missing(field);
        }
    }

    pub fn missing(&mut self, field: &str) {
        self.add(field, format!("The {} field is required.", label(field)));
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Takes over the messages of fields that have none yet, so a field reported as
    /// missing is not also reported as malformed
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_insert(messages);
        }
    }

    /** Turns the collected messages into `Err(AppError::Validation)` if there are any */
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut ret = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            for error in field_errors.iter() {
                ret.add(&field, describe(&field, error));
            }
        }
        ret
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn describe(field: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let label = label(field);
    match error.code.as_ref() {
        "email" => format!("The {} field must be a valid email address.", label),
        "must_match" => format!("The {} field confirmation does not match.", label),
        "length" => match error.params.get("max") {
            Some(max) => format!("The {} field must not be greater than {} characters.", label, max),
            None => format!("The {} field has an invalid length.", label),
        },
        code => format!("The {} field is invalid ({}).", label, code),
    }
}

/** Holds the errors we will used during request processing */
#[derive(Debug, Error)]
pub enum AppError {
    #[error("The given data was invalid.")]
    Validation(FieldErrors),
    #[error("Unauthenticated.")]
    UnauthorizedError,
    #[error("The provided credentials are incorrect.")]
    InvalidCredentials,
    #[error("This action is unauthorized.")]
    Forbidden,
    #[error("Resource not found.")]
    NotFound,
    #[error("The resource was modified by another request, please retry.")]
    Conflict,
    #[error("Bad request.")]
    BadRequest,
    /// The detail is logged, never sent to the client
    #[error("Internal server error.")]
    InternalServerError(String),
}

impl AppError {
    pub fn internal(detail: impl ToString) -> AppError {
        AppError::InternalServerError(detail.to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_failed",
            AppError::UnauthorizedError => "unauthenticated",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::Conflict => "conflict",
            AppError::BadRequest => "bad_request",
            AppError::InternalServerError(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnauthorizedError | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::BadRequest => StatusCode::BAD_REQUEST,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let errors = match self {
            AppError::Validation(errors) => Some(errors.clone()),
            AppError::InvalidCredentials => {
                let mut errors = FieldErrors::new();
                errors.add("email", self.to_string());
                Some(errors)
            }
            AppError::InternalServerError(detail) => {
                log::error!("request failed: {}", detail);
                None
            }
            _ => None,
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: self.to_string(),
            code: self.code(),
            errors,
        })
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors.into())
    }
}
impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => AppError::NotFound,
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => AppError::Conflict,
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => AppError::NotFound,
            diesel::result::Error::InvalidCString(_) => AppError::BadRequest,
            err => AppError::internal(err),
        }
    }
}
impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::internal(format!("database pool: {}", err))
    }
}
impl From<actix_multipart::MultipartError> for AppError {
    fn from(_: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest
    }
}
impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::internal(err)
    }
}
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound,
            _ => AppError::internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use pretty_assertions::assert_eq;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email)]
        email: String,
        #[validate(length(max = 5))]
        name: String,
        #[validate(must_match(other = "password_confirmation"))]
        password: String,
        password_confirmation: String,
    }

    #[test]
    fn test_validator_messages() {
        let signup = Signup {
            email: "not-an-email".to_string(),
            name: "much too long".to_string(),
            password: "secret".to_string(),
            password_confirmation: "other".to_string(),
        };
        let errors = FieldErrors::from(signup.validate().unwrap_err());

        assert_eq!(
            errors.get("email").unwrap(),
            &vec!["The email field must be a valid email address.".to_string()]
        );
        assert_eq!(
            errors.get("name").unwrap(),
            &vec!["The name field must not be greater than 5 characters.".to_string()]
        );
        assert_eq!(
            errors.get("password").unwrap(),
            &vec!["The password field confirmation does not match.".to_string()]
        );
    }

    #[test]
    fn test_require_and_merge() {
        let mut errors = FieldErrors::new();
        errors.require("first_name", "   ");
        errors.require("last_name", "Doe");

        let mut other = FieldErrors::new();
        other.add("first_name", "second message");
        other.add("email", "bad email");
        errors.merge(other);

        assert!(!errors.has("last_name"));
        assert_eq!(
            errors.get("first_name").unwrap(),
            &vec!["The first name field is required.".to_string()]
        );
        assert_eq!(errors.get("email").unwrap(), &vec!["bad email".to_string()]);
        assert!(matches!(errors.into_result(), Err(AppError::Validation(_))));
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[actix_rt::test]
    async fn test_internal_detail_is_not_disclosed() {
        let err = AppError::internal("connection refused on db-primary:5432");
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "internal_error");
        assert!(!String::from_utf8_lossy(&body).contains("db-primary"));
    }

    #[actix_rt::test]
    async fn test_invalid_credentials_body() {
        let resp = AppError::InvalidCredentials.error_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"]["email"][0], "The provided credentials are incorrect.");
    }

    #[test]
    fn test_diesel_error_mapping() {
        assert!(matches!(AppError::from(diesel::result::Error::NotFound), AppError::NotFound));
        assert!(matches!(
            AppError::from(diesel::result::Error::RollbackTransaction),
            AppError::InternalServerError(_)
        ));
    }
}
