use actix_multipart::Multipart;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse,
};
use diesel::Connection;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{discard_uploads, store_upload, validate_input};
use crate::{
    app::{AppError, AppState, FieldErrors},
    auth::{
        password::{hash_password, verify_password},
        token::Token,
        AuthenticatedUser,
    },
    database::models::{user::DEFAULT_PROFILE_IMAGE, User},
    uploads::{read_form, validate_image, FormData, PROFILE_IMAGES},
};

/// Emails are compared and stored trimmed and lowercased
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Validate)]
struct RegisterInput {
    #[validate(length(max = 255))]
    first_name: String,
    #[validate(length(max = 255))]
    last_name: String,
    #[validate(email)]
    email: String,
    #[validate(must_match(other = "password_confirmation"))]
    password: String,
    password_confirmation: String,
}

impl RegisterInput {
    fn from_form(form: &FormData) -> RegisterInput {
        let text = |name: &str| form.text(name).unwrap_or_default().to_string();
        RegisterInput {
            first_name: text("first_name").trim().to_string(),
            last_name: text("last_name").trim().to_string(),
            email: normalize_email(&text("email")),
            password: text("password"),
            password_confirmation: text("password_confirmation"),
        }
    }
}

/// Creates an account from a registration form and logs it in.
/// Shared by `POST /register` and `POST /users`.
pub(crate) async fn create_account(app_state: &AppState, mut form: FormData) -> Result<HttpResponse, AppError> {
    let input = RegisterInput::from_form(&form);
    let profile_image = form.take_file("profile_image");

    let mut errors = FieldErrors::new();
    errors.require("first_name", &input.first_name);
    errors.require("last_name", &input.last_name);
    errors.require("email", &input.email);
    if input.password.is_empty() {
        errors.missing("password");
    }
    validate_image(&mut errors, "profile_image", profile_image.as_ref(), false);
    if !input.email.is_empty() {
        let email = input.email.clone();
        if app_state.with_db(move |conn| User::email_taken(conn, &email, None)).await? {
            errors.add("email", "The email has already been taken.");
        }
    }
    validate_input(&input, errors)?;

    let password = input.password.clone();
    let password_hash = web::block(move || hash_password(&password)).await??;

    let stored_image = match profile_image {
        Some(file) => Some(store_upload(&app_state.uploads, PROFILE_IMAGES, file).await?),
        None => None,
    };

    let image_path = stored_image.clone().unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string());
    let created = app_state
        .with_db(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let user = User::new(
                    conn,
                    &input.first_name,
                    &input.last_name,
                    &input.email,
                    &password_hash,
                    &image_path,
                )?;
                let token = Token::new(conn, &user, &user.first_name)?;
                Ok((user.with_relations(conn)?, token))
            })
        })
        .await;

    match created {
        Ok((profile, token)) => {
            log::info!("registered user {} <{}>", profile.user.id, profile.user.email);
            Ok(HttpResponse::Created().json(json!({
                "user": profile,
                "token": token.plain_text,
            })))
        }
        Err(err) => {
            discard_uploads(&app_state.uploads, stored_image.into_iter().collect()).await;
            // Lost a race against another registration with the same email
            if let AppError::Conflict = err {
                let mut errors = FieldErrors::new();
                errors.add("email", "The email has already been taken.");
                return Err(AppError::Validation(errors));
            }
            Err(err)
        }
    }
}

/// Pipe for registering a new account, it is of type multipart
/// - url: `{domain}/register`
///
/// # HTTP request requirements
/// ## body
/// - first_name: [String] - at most 255 characters
/// - last_name: [String] - at most 255 characters
/// - email: [String] - valid and not used by another account
/// - password: [String]
/// - password_confirmation: [String] - must equal `password`
/// - profile_image: file (optional) - png, jpeg, gif or svg, at most 4096 KiB
///
/// # Response
/// ## Ok
/// - 201, the user with its relations and a bearer token
/// ```
/// {
///     "user": { "id": 1, "first_name": "Ada", ..., "blogs": [], "comments": [], "likes": [] },
///     "token": "1|m9JcXh0c1yTq2pQhQKqz8pU1F7z6kF0gD7wq3Zt8"
/// }
/// ```
/// ## Error
/// - Unprocessable entity, with the offending fields
/// - Bad request
#[post("/register")]
pub async fn register(app_state: Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, AppError> {
    let form = read_form(&mut payload).await?;
    create_account(&app_state, form).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Pipe for logging in
/// - url: `{domain}/login`
///
/// # HTTP request requirements
/// ## body
/// - json with `email` and `password`
///
/// # Response
/// ## Ok
/// - the user with its relations and a fresh bearer token
/// ## Error
/// - Unauthorized, the same body for an unknown email and a wrong password
/// - Unprocessable entity
#[post("/login")]
pub async fn login(app_state: Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    request.email = normalize_email(&request.email);

    let mut errors = FieldErrors::new();
    errors.require("email", &request.email);
    if request.password.is_empty() {
        errors.missing("password");
    }
    validate_input(&request, errors)?;

    let email = request.email.clone();
    let user = app_state
        .with_db(move |conn| User::find_by_email(conn, &email))
        .await?;
    let user = match user {
        Some(user) => {
            let hash = user.password.clone();
            let password = request.password;
            if web::block(move || verify_password(&password, &hash)).await? {
                Some(user)
            } else {
                None
            }
        }
        None => None,
    };
    let user = user.ok_or_else(|| {
        log::warn!("failed login for <{}>", request.email);
        AppError::InvalidCredentials
    })?;

    let (token, profile) = app_state
        .with_db(move |conn| {
            let token = Token::new(conn, &user, &user.first_name)?;
            Ok((token, user.with_relations(conn)?))
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "user": profile,
        "token": token.plain_text,
    })))
}

/// Pipe for logging out, revokes every token of the caller
/// - url: `{domain}/logout`
///
/// # HTTP request requirements
/// ## header
/// - `Authorization: Bearer <token>`
///
/// # Response
/// ## Ok
/// ```
/// { "message": "You are logged out." }
/// ```
/// ## Error
/// - Unauthorized
#[post("/logout")]
pub async fn logout(app_state: Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    let user_id = auth.user.id;
    let revoked = app_state
        .with_db(move |conn| Token::delete_all_for_user(conn, user_id))
        .await?;
    log::info!("user {} logged out, {} token(s) revoked", auth.user.id, revoked);

    Ok(HttpResponse::Ok().json(json!({ "message": "You are logged out." })))
}

/// Pipe returning the user behind the bearer token
/// - url: `{domain}/user`
#[get("/user")]
pub async fn current_user(auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(auth.user))
}
