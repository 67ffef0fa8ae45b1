pub mod password;
pub mod token;

use actix_web::{dev::Payload, http::header::Header, web::Data, FromRequest, HttpRequest};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use futures::future::LocalBoxFuture;

use crate::{
    app::{AppError, AppState},
    database::models::User,
};
use token::Token;

/// The caller behind `Authorization: Bearer <token>`.
///
/// Taking it as a handler argument makes the route authenticated, a missing,
/// malformed, unknown or expired token answers 401 before the handler runs.
#[derive(Debug)]
pub struct AuthenticatedUser {
    pub user: User,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let header = Authorization::<Bearer>::parse(req);
        let app_state = req.app_data::<Data<AppState>>().cloned();

        Box::pin(async move {
            let plain_text = header
                .map_err(|_| AppError::UnauthorizedError)?
                .into_scheme()
                .token()
                .to_string();
            let app_state = app_state.ok_or_else(|| AppError::internal("application state is not registered"))?;

            let ttl = app_state.token_ttl;
            let (_, user) = app_state
                .with_db(move |conn| Token::find(conn, &plain_text, ttl))
                .await?;

            Ok(AuthenticatedUser { user })
        })
    }
}

/** Short-circuits with `Forbidden` when the caller may not act */
pub fn authorize(allowed: bool) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
