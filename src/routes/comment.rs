use actix_web::{
    delete, get, post, put,
    web::{self, Data},
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::validate_input;
use crate::{
    app::{AppError, AppState, FieldErrors},
    auth::{authorize, AuthenticatedUser},
    database::models::{Blog, Comment},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub body: String,
}

impl CommentRequest {
    fn check(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.require("body", &self.body);
        validate_input(self, errors)
    }
}

/// Pipe for getting the comments of a blog, newest first
/// - url: `{domain}/blogs/{blog_id}/comments`
///
/// # Response
/// ## Ok
/// ```
/// {
///     "message": "Comments retrieved successfully.",
///     "comments": [{ "id": 4, "blog_id": 2, "user_id": 1, "body": "Nice", "user": {...}, ... }]
/// }
/// ```
/// ## Error
/// - Not found, when the blog does not exist
#[get("/blogs/{blog_id:\\d+}/comments")]
pub async fn index(app_state: Data<AppState>, path: web::Path<i32>) -> Result<HttpResponse, AppError> {
    let blog_id = path.into_inner();
    let comments = app_state
        .with_db(move |conn| {
            let blog = Blog::get_by_id(conn, blog_id)?;
            Comment::find_by_blog(conn, blog.id)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Comments retrieved successfully.",
        "comments": comments,
    })))
}

/// Pipe for commenting on a blog
/// - url: `{domain}/blogs/{blog_id}/comments`
///
/// # HTTP request requirements
/// ## header
/// - `Authorization: Bearer <token>`
/// ## body
/// ```
/// { "body": "Great read!" }
/// ```
///
/// # Response
/// ## Ok
/// - 201 with the comment and its author
/// ## Error
/// - Unauthorized
/// - Not found
/// - Unprocessable entity
#[post("/blogs/{blog_id:\\d+}/comments")]
pub async fn store(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
    body: web::Json<CommentRequest>,
) -> Result<HttpResponse, AppError> {
    let blog_id = path.into_inner();
    let user_id = auth.user.id;
    let request = body.into_inner();
    let comment = app_state
        .with_db(move |conn| {
            let blog = Blog::get_by_id(conn, blog_id)?;
            request.check()?;

            Comment::new(conn, blog.id, user_id, &request.body)?.with_author(conn)
        })
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Comment created successfully.",
        "comment": comment,
    })))
}

/// Pipe returning a single comment of a blog
/// - url: `{domain}/blogs/{blog_id}/comments/{comment_id}`
///
/// # Response
/// ## Error
/// - Not found, also when the comment belongs to another blog
#[get("/blogs/{blog_id:\\d+}/comments/{comment_id:\\d+}")]
pub async fn show(app_state: Data<AppState>, path: web::Path<(i32, i32)>) -> Result<HttpResponse, AppError> {
    let (blog_id, comment_id) = path.into_inner();
    let comment = app_state
        .with_db(move |conn| Comment::find_in_blog(conn, blog_id, comment_id)?.with_author(conn))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Comment retrieved successfully.",
        "comment": comment,
    })))
}

/// Pipe for editing a comment, only its author or an admin may
/// - url: `{domain}/blogs/{blog_id}/comments/{comment_id}`
#[put("/blogs/{blog_id:\\d+}/comments/{comment_id:\\d+}")]
pub async fn update(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<(i32, i32)>,
    body: web::Json<CommentRequest>,
) -> Result<HttpResponse, AppError> {
    let (blog_id, comment_id) = path.into_inner();
    let actor = auth.user;
    let request = body.into_inner();
    let comment = app_state
        .with_db(move |conn| {
            let mut comment = Comment::find_in_blog(conn, blog_id, comment_id)?;
            authorize(comment.can_be_edited_by(&actor))?;
            request.check()?;

            comment.edit(conn, &request.body)?;
            comment.with_author(conn)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Comment updated successfully.",
        "comment": comment,
    })))
}

/// Pipe for deleting a comment.
/// Its author, the creator of the blog and admins may delete it.
/// - url: `{domain}/blogs/{blog_id}/comments/{comment_id}`
#[delete("/blogs/{blog_id:\\d+}/comments/{comment_id:\\d+}")]
pub async fn destroy(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, AppError> {
    let (blog_id, comment_id) = path.into_inner();
    let actor = auth.user;
    app_state
        .with_db(move |conn| {
            let comment = Comment::find_in_blog(conn, blog_id, comment_id)?;
            let blog = Blog::get_by_id(conn, blog_id)?;
            authorize(comment.can_be_deleted_by(&actor, &blog))?;

            comment.delete(conn)?;
            log::info!("user {} deleted comment {}", actor.id, comment.id);
            Ok(())
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Comment deleted successfully." })))
}
