use actix_web::{
    delete, get, post, put,
    web::{self, Data},
    HttpResponse,
};
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::validate_input;
use crate::{
    app::{AppError, AppState, FieldErrors},
    auth::{authorize, AuthenticatedUser},
    database::models::Category,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub name: String,
}

impl CategoryRequest {
    fn check(&mut self, conn: &mut SqliteConnection, except: Option<i32>) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();

        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        if !self.name.is_empty() && Category::name_taken(conn, &self.name, except)? {
            errors.add("name", "The name has already been taken.");
        }
        validate_input(&*self, errors)
    }
}

fn name_conflict(err: AppError) -> AppError {
    match err {
        AppError::Conflict => {
            let mut errors = FieldErrors::new();
            errors.add("name", "The name has already been taken.");
            AppError::Validation(errors)
        }
        err => err,
    }
}

/// Pipe listing every category by name with the number of blogs using it
/// - url: `{domain}/categories`
#[get("/categories")]
pub async fn index(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let categories = app_state.with_db(Category::list).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Categories retrieved successfully.",
        "categories": categories,
    })))
}

/// Pipe for creating a category
/// - url: `{domain}/categories`
///
/// # HTTP request requirements
/// ## header
/// - `Authorization: Bearer <token>`
/// ## body
/// ```
/// { "name": "Travel" }
/// ```
///
/// # Response
/// ## Ok
/// - 201 with the new category
/// ## Error
/// - Unauthorized
/// - Unprocessable entity when the name is missing, too long or taken
#[post("/categories")]
pub async fn store(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    body: web::Json<CategoryRequest>,
) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    let category = app_state
        .with_db(move |conn| {
            request.check(conn, None)?;
            Category::new(conn, &request.name).map_err(name_conflict)
        })
        .await?;
    log::info!("user {} created category {}", auth.user.id, category.id);

    Ok(HttpResponse::Created().json(json!({
        "message": "Category created successfully.",
        "category": category,
    })))
}

/// Pipe returning a category with its blogs
/// - url: `{domain}/categories/{category_id}`
#[get("/categories/{category_id:\\d+}")]
pub async fn show(app_state: Data<AppState>, path: web::Path<i32>) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();
    let details = app_state
        .with_db(move |conn| Category::find_by_id(conn, category_id)?.details(conn))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Category retrieved successfully.",
        "category": details,
    })))
}

/// Pipe for renaming a category, admins only
/// - url: `{domain}/categories/{category_id}`
///
/// # Response
/// ## Error
/// - Unauthorized
/// - Forbidden
/// - Not found
/// - Unprocessable entity
#[put("/categories/{category_id:\\d+}")]
pub async fn update(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
    body: web::Json<CategoryRequest>,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();
    let is_admin = auth.user.is_admin;
    let mut request = body.into_inner();
    let category = app_state
        .with_db(move |conn| {
            let mut category = Category::find_by_id(conn, category_id)?;
            authorize(is_admin)?;

            request.check(conn, Some(category.id))?;
            category.rename(conn, &request.name).map_err(name_conflict)?;
            Ok(category)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Category updated successfully.",
        "category": category,
    })))
}

/// Pipe for deleting a category, admins only. Blogs only lose the link.
/// - url: `{domain}/categories/{category_id}`
#[delete("/categories/{category_id:\\d+}")]
pub async fn destroy(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();
    let is_admin = auth.user.is_admin;
    let category = app_state
        .with_db(move |conn| {
            let category = Category::find_by_id(conn, category_id)?;
            authorize(is_admin)?;

            category.delete(conn)?;
            Ok(category)
        })
        .await?;
    log::info!("user {} deleted category {}", auth.user.id, category.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Category deleted successfully." })))
}
