use actix_multipart::Multipart;
use actix_web::{
    delete, get, post, put,
    web::{self, Data},
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{
    auth::{create_account, normalize_email},
    discard_uploads, validate_input,
};
use crate::{
    app::{AppError, AppState, FieldErrors},
    auth::{authorize, AuthenticatedUser},
    database::models::{Blog, User},
    uploads::read_form,
};

#[derive(Debug, Deserialize, Validate)]
pub struct UserUpdateRequest {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub last_name: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
}

/// Pipe listing every user with their blogs, comments and likes, newest first
/// - url: `{domain}/users`
#[get("/users")]
pub async fn index(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let profiles = app_state
        .with_db(|conn| {
            let users = User::list(conn)?;
            User::load_profiles(conn, users)
        })
        .await?;

    Ok(HttpResponse::Ok().json(profiles))
}

/// Pipe for creating a user, takes the same multipart form as `/register`
/// and answers the same way
/// - url: `{domain}/users`
#[post("/users")]
pub async fn store(app_state: Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, AppError> {
    let form = read_form(&mut payload).await?;
    create_account(&app_state, form).await
}

/// Pipe returning a user with their blogs, comments and likes
/// - url: `{domain}/users/{user_id}`
///
/// # Response
/// ## Ok
/// ```
/// { "user": { "id": 1, "first_name": "Ada", ..., "blogs": [], "comments": [], "likes": [] } }
/// ```
/// ## Error
/// - Not found
#[get("/users/{user_id:\\d+}")]
pub async fn show(app_state: Data<AppState>, path: web::Path<i32>) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let profile = app_state
        .with_db(move |conn| User::find_by_id(conn, user_id)?.with_relations(conn))
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "user": profile })))
}

/// Pipe for editing a user's names and email
/// - url: `{domain}/users/{user_id}`
///
/// # HTTP request requirements
/// ## header
/// - `Authorization: Bearer <token>` of the user themself or of an admin
/// ## body
/// ```
/// { "first_name": "Ada", "last_name": "Byron", "email": "ada@example.com" }
/// ```
///
/// # Response
/// ## Error
/// - Unauthorized
/// - Forbidden
/// - Not found
/// - Unprocessable entity, the email may not be used by another user
#[put("/users/{user_id:\\d+}")]
pub async fn update(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
    body: web::Json<UserUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let actor = auth.user;
    let mut request = body.into_inner();
    request.first_name = request.first_name.trim().to_string();
    request.last_name = request.last_name.trim().to_string();
    request.email = normalize_email(&request.email);

    let profile = app_state
        .with_db(move |conn| {
            let mut user = User::find_by_id(conn, user_id)?;
            authorize(user.can_be_managed_by(&actor))?;

            let mut errors = FieldErrors::new();
            errors.require("first_name", &request.first_name);
            errors.require("last_name", &request.last_name);
            errors.require("email", &request.email);
            if !request.email.is_empty() && User::email_taken(conn, &request.email, Some(user.id))? {
                errors.add("email", "The email has already been taken.");
            }
            validate_input(&request, errors)?;

            user.edit(conn, &request.first_name, &request.last_name, &request.email)?;
            log::info!("user {} updated user {}", actor.id, user.id);
            user.with_relations(conn)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "User updated successfully.",
        "user": profile,
    })))
}

/// Pipe for deleting a user with everything they created
/// - url: `{domain}/users/{user_id}`
///
/// Tokens, blogs, comments and likes go with the row. The profile image and the
/// previews of the user's blogs are removed afterwards.
///
/// # Response
/// ## Ok
/// ```
/// { "message": "User deleted successfully." }
/// ```
/// ## Error
/// - Unauthorized
/// - Forbidden
/// - Not found
#[delete("/users/{user_id:\\d+}")]
pub async fn destroy(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let actor = auth.user;
    let files = app_state
        .with_db(move |conn| {
            let user = User::find_by_id(conn, user_id)?;
            authorize(user.can_be_managed_by(&actor))?;

            let mut files = Blog::previews_by_creator(conn, user.id)?;
            files.push(user.profile_image.clone());
            user.delete(conn)?;
            log::info!("user {} deleted user {}", actor.id, user.id);
            Ok(files)
        })
        .await?;

    discard_uploads(&app_state.uploads, files).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted successfully." })))
}
