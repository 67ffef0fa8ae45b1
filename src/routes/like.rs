use actix_web::{
    delete, get, post,
    web::{self, Data},
    HttpResponse,
};
use serde_json::json;

use crate::{
    app::{AppError, AppState},
    auth::{authorize, AuthenticatedUser},
    database::models::{Blog, Like},
};

/// Pipe for getting the likes of a blog
/// - url: `{domain}/blogs/{blog_id}/likes`
#[get("/blogs/{blog_id:\\d+}/likes")]
pub async fn index(app_state: Data<AppState>, path: web::Path<i32>) -> Result<HttpResponse, AppError> {
    let blog_id = path.into_inner();
    let likes = app_state
        .with_db(move |conn| {
            let blog = Blog::get_by_id(conn, blog_id)?;
            Like::get_by_blog_id(conn, blog.id)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Likes retrieved successfully.",
        "likes_count": likes.len(),
        "likes": likes,
    })))
}

/// Pipe for liking a blog, or taking the like back when there already is one
/// - url: `{domain}/blogs/{blog_id}/likes`
///
/// # HTTP request requirements
/// ## header
/// - `Authorization: Bearer <token>`
///
/// # Response
/// ## Ok
/// - 201 when the blog got liked
/// ```
/// { "message": "Blog liked.", "liked": true, "likes_count": 3, "like": {...} }
/// ```
/// - 200 when the like was removed
/// ```
/// { "message": "Blog unliked.", "liked": false, "likes_count": 2 }
/// ```
/// ## Error
/// - Unauthorized
/// - Not found
#[post("/blogs/{blog_id:\\d+}/likes")]
pub async fn toggle(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let blog_id = path.into_inner();
    let user_id = auth.user.id;
    let (like, likes_count) = app_state
        .with_db(move |conn| {
            let blog = Blog::get_by_id(conn, blog_id)?;

            let like = Like::toggle(conn, user_id, blog.id)?;
            Ok((like, Like::count_for_blog(conn, blog.id)?))
        })
        .await?;

    Ok(match like {
        Some(like) => HttpResponse::Created().json(json!({
            "message": "Blog liked.",
            "liked": true,
            "likes_count": likes_count,
            "like": like,
        })),
        None => HttpResponse::Ok().json(json!({
            "message": "Blog unliked.",
            "liked": false,
            "likes_count": likes_count,
        })),
    })
}

/// Pipe returning a single like of a blog
/// - url: `{domain}/blogs/{blog_id}/likes/{like_id}`
#[get("/blogs/{blog_id:\\d+}/likes/{like_id:\\d+}")]
pub async fn show(app_state: Data<AppState>, path: web::Path<(i32, i32)>) -> Result<HttpResponse, AppError> {
    let (blog_id, like_id) = path.into_inner();
    let like = app_state
        .with_db(move |conn| Like::find_in_blog(conn, blog_id, like_id))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Like retrieved successfully.",
        "like": like,
    })))
}

/// Pipe for removing a like, only its owner or an admin may
/// - url: `{domain}/blogs/{blog_id}/likes/{like_id}`
#[delete("/blogs/{blog_id:\\d+}/likes/{like_id:\\d+}")]
pub async fn destroy(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, AppError> {
    let (blog_id, like_id) = path.into_inner();
    let actor = auth.user;
    app_state
        .with_db(move |conn| {
            let like = Like::find_in_blog(conn, blog_id, like_id)?;
            authorize(like.can_be_deleted_by(&actor))?;

            like.delete(conn)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Like removed successfully." })))
}
