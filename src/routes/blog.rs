use actix_multipart::Multipart;
use actix_web::{
    delete, get, post, put,
    web::{self, Data},
    HttpResponse,
};
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{discard_uploads, non_blank, store_upload, validate_input};
use crate::{
    app::{AppError, AppState, FieldErrors},
    auth::{authorize, AuthenticatedUser},
    database::models::blog::{Blog, BlogFields},
    uploads::{read_form, validate_image, FormData, UploadedFile, BLOG_PREVIEWS},
};

const MAX_CATEGORY_LENGTH: usize = 255;

#[derive(Debug, Validate)]
struct BlogInput {
    #[validate(length(max = 255))]
    title: String,
    #[validate(length(max = 500))]
    description: Option<String>,
    body: String,
    categories: Vec<String>,
}

impl BlogInput {
    /// Reads the text fields, `categories` may also be sent as `categories[]`
    fn from_form(form: &FormData) -> BlogInput {
        BlogInput {
            title: form.text("title").unwrap_or_default().trim().to_string(),
            description: non_blank(form.text("description")),
            body: form.text("body").unwrap_or_default().to_string(),
            categories: form.list("categories"),
        }
    }

    /// Checks every field, the preview and the title's uniqueness against other blogs
    fn check(
        &self,
        conn: &mut SqliteConnection,
        except: Option<i32>,
        preview: Option<&UploadedFile>,
        preview_required: bool,
    ) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.require("title", &self.title);
        errors.require("body", &self.body);
        validate_image(&mut errors, "preview", preview, preview_required);

        if self.categories.is_empty() {
            errors.missing("categories");
        }
        for (i, name) in self.categories.iter().enumerate() {
            let field = format!("categories.{}", i);
            errors.require(&field, name);
            if name.trim().chars().count() > MAX_CATEGORY_LENGTH {
                errors.add(
                    &field,
                    format!("The {} field must not be greater than {} characters.", field, MAX_CATEGORY_LENGTH),
                );
            }
        }

        if !self.title.is_empty() && Blog::title_taken(conn, &self.title, except)? {
            errors.add("title", "The title has already been taken.");
        }

        validate_input(self, errors)
    }

    fn into_fields(self) -> BlogFields {
        BlogFields {
            title: self.title,
            description: self.description,
            body: self.body,
            categories: self.categories,
        }
    }
}

/// A unique-index race on the title surfaces as a validation error like the pre-check
fn title_conflict(err: AppError) -> AppError {
    match err {
        AppError::Conflict => {
            let mut errors = FieldErrors::new();
            errors.add("title", "The title has already been taken.");
            AppError::Validation(errors)
        }
        err => err,
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// Pipe listing blogs, newest first, 10 per page
/// - url: `{domain}/blogs?page={page}`
///
/// # Response
/// ## Ok
/// ```
/// {
///     "message": "Blogs retrieved successfully.",
///     "blog": {
///         "current_page": 1,
///         "data": [{ "id": 3, "title": "...", "user": {...}, "categories": [...], "likes_count": 2, "comments_count": 0 }],
///         "per_page": 10,
///         "total": 3,
///         "last_page": 1
///     }
/// }
/// ```
#[get("/blogs")]
pub async fn index(app_state: Data<AppState>, query: web::Query<PageQuery>) -> Result<HttpResponse, AppError> {
    let page_number = query.page.unwrap_or(1);
    let page = app_state
        .with_db(move |conn| Blog::paginate(conn, page_number, None))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Blogs retrieved successfully.",
        "blog": page,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    #[serde(rename = "currentPage")]
    pub current_page: Option<String>,
}

/// Pipe searching blog titles, case-insensitive, 10 per page
/// - url: `{domain}/blogs/search?query={text}&currentPage={page}`
///
/// A missing or empty `query` matches every blog.
///
/// # Response
/// ## Ok
/// ```
/// { "currentPage": 1, "blogs": [...] }
/// ```
/// ## Error
/// - Unprocessable entity when `currentPage` is not an integer of at least 1
#[get("/blogs/search")]
pub async fn search(app_state: Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let current_page = match non_blank(query.current_page.as_deref()) {
        None => 1,
        Some(raw) => {
            let mut errors = FieldErrors::new();
            match raw.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                Ok(_) => {
                    errors.add("currentPage", "The current page field must be at least 1.");
                    return Err(AppError::Validation(errors));
                }
                Err(_) => {
                    errors.add("currentPage", "The current page field must be an integer.");
                    return Err(AppError::Validation(errors));
                }
            }
        }
    };

    let term = query.query;
    let page = app_state
        .with_db(move |conn| Blog::paginate(conn, current_page, term.as_deref()))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "currentPage": page.current_page,
        "blogs": page.data,
    })))
}

/// Pipe for creating a new blog, it is of type multipart
/// - url: `{domain}/blogs`
///
/// # HTTP request requirements
/// ## header
/// - `Authorization: Bearer <token>`
/// ## body
/// - title: [String] - unique, at most 255 characters
/// - description: [String] (optional) - at most 500 characters
/// - body: [String]
/// - preview: file - png, jpeg, gif or svg, at most 4096 KiB
/// - categories / categories[]: [String] - repeated, at least one
///
/// The creator is always the caller, whatever the body says.
///
/// # Response
/// ## Ok
/// - 201 with `message` and the blog with its relations
/// ## Error
/// - Unauthorized
/// - Unprocessable entity
/// - Bad request
#[post("/blogs")]
pub async fn store(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let mut form = read_form(&mut payload).await?;
    let input = BlogInput::from_form(&form);
    let preview = form.take_file("preview");
    let (input, preview) = app_state
        .with_db(move |conn| {
            input.check(conn, None, preview.as_ref(), true)?;
            Ok((input, preview))
        })
        .await?;

    let preview = preview.ok_or_else(|| AppError::internal("validated preview is missing"))?;
    let preview_path = store_upload(&app_state.uploads, BLOG_PREVIEWS, preview).await?;

    let creator = auth.user;
    let creator_id = creator.id;
    let fields = input.into_fields();
    let stored = preview_path.clone();
    let created = app_state
        .with_db(move |conn| Blog::new(conn, &creator, &fields, &stored))
        .await;
    let blog = match created {
        Ok(blog) => blog,
        Err(err) => {
            discard_uploads(&app_state.uploads, vec![preview_path]).await;
            return Err(title_conflict(err));
        }
    };
    log::info!("user {} created blog {}", creator_id, blog.id);

    let details = app_state.with_db(move |conn| blog.details(conn)).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Blog created successfully.",
        "blog": details,
    })))
}

/// Pipe returning one blog with its creator, categories, likes and comments
/// - url: `{domain}/blogs/{blog_id}`
///
/// # Response
/// ## Ok
/// ```
/// { "message": "Blog retrieved successfully.", "blog": {...} }
/// ```
/// ## Error
/// - Not found
#[get("/blogs/{blog_id:\\d+}")]
pub async fn show(app_state: Data<AppState>, path: web::Path<i32>) -> Result<HttpResponse, AppError> {
    let blog_id = path.into_inner();
    let details = app_state
        .with_db(move |conn| Blog::get_by_id(conn, blog_id)?.details(conn))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Blog retrieved successfully.",
        "blog": details,
    })))
}

/// Pipe for editing a blog, same multipart fields as creation
/// - url: `{domain}/blogs/{blog_id}`
///
/// Only the creator or an admin may edit, this is checked before the body is read.
/// The preview is optional here, a new one replaces the old file.
/// Categories are replaced by exactly the ones sent.
///
/// # Response
/// ## Ok
/// ```
/// { "message": "Blog updated successfully.", "blog": {...} }
/// ```
/// ## Error
/// - Unauthorized
/// - Forbidden
/// - Not found
/// - Unprocessable entity
#[put("/blogs/{blog_id:\\d+}")]
pub async fn update(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let blog_id = path.into_inner();
    let mut blog = app_state.with_db(move |conn| Blog::get_by_id(conn, blog_id)).await?;
    authorize(blog.can_be_modified_by(&auth.user))?;

    let mut form = read_form(&mut payload).await?;
    let input = BlogInput::from_form(&form);
    let preview = form.take_file("preview");
    let (input, preview) = app_state
        .with_db(move |conn| {
            input.check(conn, Some(blog_id), preview.as_ref(), false)?;
            Ok((input, preview))
        })
        .await?;

    let new_preview = match preview {
        Some(file) => Some(store_upload(&app_state.uploads, BLOG_PREVIEWS, file).await?),
        None => None,
    };
    let old_preview = blog.preview.clone();

    let fields = input.into_fields();
    let replacement = new_preview.clone();
    let edited = app_state
        .with_db(move |conn| {
            blog.edit(conn, &fields, replacement.as_deref())?;
            Ok(blog)
        })
        .await;
    let blog = match edited {
        Ok(blog) => blog,
        Err(err) => {
            discard_uploads(&app_state.uploads, new_preview.into_iter().collect()).await;
            return Err(title_conflict(err));
        }
    };
    if new_preview.is_some() {
        discard_uploads(&app_state.uploads, vec![old_preview]).await;
    }
    log::info!("user {} updated blog {}", auth.user.id, blog.id);

    let details = app_state.with_db(move |conn| blog.details(conn)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Blog updated successfully.",
        "blog": details,
    })))
}

/// Pipe for deleting a blog with its preview, comments, likes and category links
/// - url: `{domain}/blogs/{blog_id}`
///
/// # Response
/// ## Ok
/// ```
/// { "message": "Blog deleted successfully." }
/// ```
/// ## Error
/// - Unauthorized
/// - Forbidden
/// - Not found
#[delete("/blogs/{blog_id:\\d+}")]
pub async fn destroy(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let blog_id = path.into_inner();
    let blog = app_state.with_db(move |conn| Blog::get_by_id(conn, blog_id)).await?;
    authorize(blog.can_be_modified_by(&auth.user))?;

    discard_uploads(&app_state.uploads, vec![blog.preview.clone()]).await;

    app_state.with_db(move |conn| Blog::delete_by_id(conn, blog_id)).await?;
    log::info!("user {} deleted blog {}", auth.user.id, blog.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Blog deleted successfully." })))
}

/// Pipe for uploading an image to embed in a blog body, it is of type multipart
/// - url: `{domain}/blogs/uploadImage`
///
/// # HTTP request requirements
/// ## body
/// - blog_image: file - png, jpeg, gif or svg, at most 4096 KiB
///
/// # Response
/// ## Ok
/// ```
/// { "path": "/storage/uploads/blogs/1734690000000_diagram.png" }
/// ```
/// ## Error
/// - Unauthorized
/// - Unprocessable entity
#[post("/blogs/uploadImage")]
pub async fn upload_image(
    app_state: Data<AppState>,
    auth: AuthenticatedUser,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let mut form = read_form(&mut payload).await?;
    let image = form.take_file("blog_image");

    let mut errors = FieldErrors::new();
    validate_image(&mut errors, "blog_image", image.as_ref(), true);
    errors.into_result()?;

    let image = image.ok_or_else(|| AppError::internal("validated image is missing"))?;
    let path = store_upload(&app_state.uploads, BLOG_PREVIEWS, image).await?;
    log::info!("user {} uploaded {}", auth.user.id, path);

    Ok(HttpResponse::Ok().json(json!({ "path": path })))
}

#[cfg(test)]
mod tests {
    use actix_web::{
        http::StatusCode,
        test::{self, call_service},
        App,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        database::models::User,
        routes::{
            configure,
            test_utils::{bearer, create_user, execute_sql, json_body, stored_files, test_state, MultipartBody},
        },
        uploads::tests::PNG_BYTES,
    };

    fn blog_form(title: &str, categories: &[&str]) -> MultipartBody {
        let mut form = MultipartBody::new()
            .text("title", title)
            .text("description", "A short description")
            .text("body", "The body of the blog");
        for category in categories {
            form = form.text("categories[]", category);
        }
        form
    }

    fn seed_blog(state: &AppState, creator: &User, title: &str) -> Blog {
        let mut conn = state.db().unwrap();
        Blog::new(
            &mut conn,
            creator,
            &BlogFields {
                title: title.to_string(),
                description: None,
                body: "Seeded body".to_string(),
                categories: vec!["Seed".to_string()],
            },
            "/storage/uploads/blogs/seed.png",
        )
        .unwrap()
    }

    fn category_names(json: &serde_json::Value) -> Vec<String> {
        json["categories"]
            .as_array()
            .unwrap()
            .iter()
            .map(|category| category["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[actix_rt::test]
    async fn test_blog_create_requires_auth() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;

        let (content_type, payload) = blog_form("Title", &["A"]).file("preview", "p.png", PNG_BYTES).finish();
        let req = test::TestRequest::post()
            .uri("/blogs")
            .insert_header(content_type)
            .set_payload(payload)
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_blog_create() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (user, token) = create_user(&state, "writer@example.com", false);

        let (content_type, payload) = blog_form("Test title", &["A", "B"])
            .text("creator_id", "999")
            .file("preview", "cover.png", PNG_BYTES)
            .finish();
        let req = test::TestRequest::post()
            .uri("/blogs")
            .insert_header(content_type)
            .insert_header(bearer(&token))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let json = json_body(resp).await;
        assert_eq!(json["message"], "Blog created successfully.");
        assert_eq!(json["blog"]["creator_id"], user.id);
        assert_eq!(json["blog"]["user"]["id"], user.id);
        assert_eq!(json["blog"]["description"], "A short description");
        assert_eq!(category_names(&json["blog"]), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(json["blog"]["likes_count"], 0);

        let preview = json["blog"]["preview"].as_str().unwrap();
        assert!(preview.starts_with("/storage/uploads/blogs/"));
        assert!(state.uploads.resolve(preview.strip_prefix("/storage/").unwrap()).unwrap().exists());
    }

    /// Makes the next write of a blog lose a race for its title: another row with
    /// the same title appears inside the very statement.
    const TITLE_RACE_ON_INSERT: &str = "
        CREATE TRIGGER title_race_insert BEFORE INSERT ON blogs
        WHEN NOT EXISTS (SELECT 1 FROM blogs WHERE title = NEW.title)
        BEGIN
            INSERT INTO blogs (title, body, preview, creator_id, created_at, updated_at)
            VALUES (NEW.title, 'raced', '/storage/uploads/blogs/raced.png', NEW.creator_id, NEW.created_at, NEW.updated_at);
        END;";

    const TITLE_RACE_ON_UPDATE: &str = "
        CREATE TRIGGER title_race_update BEFORE UPDATE OF title ON blogs
        WHEN NEW.title <> OLD.title AND NOT EXISTS (SELECT 1 FROM blogs WHERE title = NEW.title)
        BEGIN
            INSERT INTO blogs (title, body, preview, creator_id, created_at, updated_at)
            VALUES (NEW.title, 'raced', '/storage/uploads/blogs/raced.png', OLD.creator_id, OLD.created_at, OLD.updated_at);
        END;";

    #[actix_rt::test]
    async fn test_blog_create_removes_preview_when_insert_fails() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (_, token) = create_user(&state, "writer@example.com", false);
        execute_sql(&state, TITLE_RACE_ON_INSERT);

        let (content_type, payload) = blog_form("Contested", &["A"]).file("preview", "cover.png", PNG_BYTES).finish();
        let req = test::TestRequest::post()
            .uri("/blogs")
            .insert_header(content_type)
            .insert_header(bearer(&token))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(resp).await["errors"]["title"][0], "The title has already been taken.");

        assert_eq!(stored_files(&state, BLOG_PREVIEWS), 0);
        let mut conn = state.db().unwrap();
        assert!(!Blog::title_taken(&mut conn, "Contested", None).unwrap());
    }

    #[actix_rt::test]
    async fn test_blog_update_keeps_old_preview_when_write_fails() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (owner, token) = create_user(&state, "owner@example.com", false);
        let old_preview = state.uploads.save(BLOG_PREVIEWS, "old.png", PNG_BYTES).unwrap();
        let blog = {
            let mut conn = state.db().unwrap();
            Blog::new(
                &mut conn,
                &owner,
                &BlogFields {
                    title: "Settled".to_string(),
                    description: None,
                    body: "Body".to_string(),
                    categories: vec!["A".to_string()],
                },
                &old_preview,
            )
            .unwrap()
        };
        execute_sql(&state, TITLE_RACE_ON_UPDATE);

        let (content_type, payload) = blog_form("Renamed", &["A"]).file("preview", "new.png", PNG_BYTES).finish();
        let req = test::TestRequest::put()
            .uri(&format!("/blogs/{}", blog.id))
            .insert_header(content_type)
            .insert_header(bearer(&token))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(resp).await["errors"]["title"][0], "The title has already been taken.");

        // Only the old preview is left and the blog still points at it
        assert_eq!(stored_files(&state, BLOG_PREVIEWS), 1);
        assert!(state.uploads.resolve(old_preview.strip_prefix("/storage/").unwrap()).unwrap().exists());
        let mut conn = state.db().unwrap();
        assert_eq!(Blog::get_by_id(&mut conn, blog.id).unwrap(), blog);
    }

    #[actix_rt::test]
    async fn test_blog_create_validation() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (user, token) = create_user(&state, "writer@example.com", false);
        seed_blog(&state, &user, "Taken");

        let (content_type, payload) = MultipartBody::new()
            .text("title", "Taken")
            .text("body", "")
            .text("categories[]", " ")
            .finish();
        let req = test::TestRequest::post()
            .uri("/blogs")
            .insert_header(content_type)
            .insert_header(bearer(&token))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = json_body(resp).await;
        assert_eq!(json["errors"]["title"][0], "The title has already been taken.");
        assert_eq!(json["errors"]["body"][0], "The body field is required.");
        assert_eq!(json["errors"]["preview"][0], "The preview field is required.");
        assert_eq!(json["errors"]["categories.0"][0], "The categories.0 field is required.");
        assert!(!state.uploads.root().join(BLOG_PREVIEWS).exists());
    }

    #[actix_rt::test]
    async fn test_blog_update_permissions() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (owner, owner_token) = create_user(&state, "owner@example.com", false);
        let (_, other_token) = create_user(&state, "other@example.com", false);
        let blog = seed_blog(&state, &owner, "Original");

        let (content_type, payload) = blog_form("Hijacked", &["X"]).finish();
        let req = test::TestRequest::put()
            .uri(&format!("/blogs/{}", blog.id))
            .insert_header(content_type)
            .insert_header(bearer(&other_token))
            .set_payload(payload)
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
        {
            let mut conn = state.db().unwrap();
            assert_eq!(Blog::get_by_id(&mut conn, blog.id).unwrap(), blog);
        }

        let (content_type, payload) = blog_form("Original", &["Seed", "New"]).finish();
        let req = test::TestRequest::put()
            .uri(&format!("/blogs/{}", blog.id))
            .insert_header(content_type)
            .insert_header(bearer(&owner_token))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = json_body(resp).await;
        assert_eq!(json["blog"]["title"], "Original");
        assert_eq!(json["blog"]["preview"], "/storage/uploads/blogs/seed.png");
        assert_eq!(category_names(&json["blog"]), vec!["New".to_string(), "Seed".to_string()]);
    }

    #[actix_rt::test]
    async fn test_blog_update_replaces_preview() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (owner, token) = create_user(&state, "owner@example.com", false);
        let old_preview = state.uploads.save(BLOG_PREVIEWS, "old.png", PNG_BYTES).unwrap();
        let blog = {
            let mut conn = state.db().unwrap();
            Blog::new(
                &mut conn,
                &owner,
                &BlogFields {
                    title: "Pictured".to_string(),
                    description: None,
                    body: "Body".to_string(),
                    categories: vec!["A".to_string()],
                },
                &old_preview,
            )
            .unwrap()
        };

        let (content_type, payload) = blog_form("Pictured", &["A"]).file("preview", "new.png", PNG_BYTES).finish();
        let req = test::TestRequest::put()
            .uri(&format!("/blogs/{}", blog.id))
            .insert_header(content_type)
            .insert_header(bearer(&token))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = json_body(resp).await;
        let new_preview = json["blog"]["preview"].as_str().unwrap();
        assert!(new_preview.ends_with("_new.png"));
        let resolve = |public: &str| state.uploads.resolve(public.strip_prefix("/storage/").unwrap()).unwrap();
        assert!(resolve(new_preview).exists());
        assert!(!resolve(&old_preview).exists());
    }

    #[actix_rt::test]
    async fn test_blog_delete() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (owner, _) = create_user(&state, "owner@example.com", false);
        let (_, other_token) = create_user(&state, "other@example.com", false);
        let (_, admin_token) = create_user(&state, "admin@example.com", true);
        let blog = seed_blog(&state, &owner, "Doomed");

        let req = test::TestRequest::delete()
            .uri(&format!("/blogs/{}", blog.id))
            .insert_header(bearer(&other_token))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri(&format!("/blogs/{}", blog.id))
            .insert_header(bearer(&admin_token))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["message"], "Blog deleted successfully.");

        let req = test::TestRequest::get()
            .uri(&format!("/blogs/{}", blog.id))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_blog_index_paginates() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (user, _) = create_user(&state, "writer@example.com", false);
        for i in 0..12 {
            seed_blog(&state, &user, &format!("Blog {}", i));
        }

        let req = test::TestRequest::get().uri("/blogs").to_request();
        let json = json_body(call_service(&app, req).await).await;
        assert_eq!(json["message"], "Blogs retrieved successfully.");
        assert_eq!(json["blog"]["total"], 12);
        assert_eq!(json["blog"]["per_page"], 10);
        assert_eq!(json["blog"]["last_page"], 2);
        assert_eq!(json["blog"]["data"].as_array().unwrap().len(), 10);
        assert_eq!(json["blog"]["data"][0]["title"], "Blog 11");

        let req = test::TestRequest::get().uri("/blogs?page=2").to_request();
        let json = json_body(call_service(&app, req).await).await;
        assert_eq!(json["blog"]["current_page"], 2);
        assert_eq!(json["blog"]["data"].as_array().unwrap().len(), 2);
        assert_eq!(json["blog"]["data"][1]["title"], "Blog 0");
    }

    #[actix_rt::test]
    async fn test_blog_search() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (user, _) = create_user(&state, "writer@example.com", false);
        seed_blog(&state, &user, "Learning Rust");
        seed_blog(&state, &user, "Cooking pasta");
        seed_blog(&state, &user, "100% rusty");

        let req = test::TestRequest::get().uri("/blogs/search?query=RUST").to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["currentPage"], 1);
        let titles: Vec<&str> = json["blogs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|blog| blog["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["100% rusty", "Learning Rust"]);

        let req = test::TestRequest::get().uri("/blogs/search?query=%25").to_request();
        let json = json_body(call_service(&app, req).await).await;
        assert_eq!(json["blogs"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::get().uri("/blogs/search").to_request();
        let json = json_body(call_service(&app, req).await).await;
        assert_eq!(json["blogs"].as_array().unwrap().len(), 3);

        let req = test::TestRequest::get().uri("/blogs/search?currentPage=0").to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_rt::test]
    async fn test_blog_pages_far_past_the_end_are_empty() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (user, _) = create_user(&state, "writer@example.com", false);
        seed_blog(&state, &user, "Lonely");

        let req = test::TestRequest::get()
            .uri("/blogs/search?currentPage=9223372036854775807")
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["currentPage"], i64::MAX);
        assert_eq!(json["blogs"], json!([]));

        let req = test::TestRequest::get().uri("/blogs?page=9223372036854775807").to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["blog"]["total"], 1);
        assert_eq!(json["blog"]["data"], json!([]));
    }

    #[actix_rt::test]
    async fn test_upload_image() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(Data::new(state.clone())).configure(configure)).await;
        let (_, token) = create_user(&state, "writer@example.com", false);

        let (content_type, payload) = MultipartBody::new().file("blog_image", "chart.png", PNG_BYTES).finish();
        let req = test::TestRequest::post()
            .uri("/blogs/uploadImage")
            .insert_header(content_type)
            .insert_header(bearer(&token))
            .set_payload(payload)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let path = json_body(resp).await["path"].as_str().unwrap().to_string();
        assert!(path.starts_with("/storage/uploads/blogs/"));

        let req = test::TestRequest::get().uri(&path).to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");

        let (content_type, payload) = MultipartBody::new().file("blog_image", "x.png", b"<html></html>").finish();
        let req = test::TestRequest::post()
            .uri("/blogs/uploadImage")
            .insert_header(content_type)
            .insert_header(bearer(&token))
            .set_payload(payload)
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
