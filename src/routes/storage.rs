use std::io;

use actix_web::{
    get,
    http::header,
    web::{self, Data},
    HttpResponse,
};

use crate::{
    app::{AppError, AppState},
    uploads::content_type_for,
};

/// Pipe serving an uploaded file
/// - url: `{domain}/storage/{path}`, the path handed out when the file was stored
///
/// # Example
/// ```
/// let request = actix_web::test::TestRequest::get()
///     .uri("/storage/uploads/blogs/1734690000000_diagram.png")
///     .to_request();
/// ```
///
/// # Response
/// ## Ok
/// - the file, with a content type matching its extension. Uploaded SVGs can carry
///   scripts, so every file is sent sandboxed and without content sniffing.
/// ## Error
/// - Not found, also for directories and paths leaving the storage directory
#[get("/storage/{path:.*}")]
pub async fn serve(app_state: Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let file_path = app_state
        .uploads
        .resolve(&path.into_inner())
        .ok_or(AppError::NotFound)?;
    let content_type = content_type_for(&file_path);

    let file = web::block(move || {
        if !file_path.is_file() {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        std::fs::read(file_path)
    })
    .await??;

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .insert_header((header::CONTENT_SECURITY_POLICY, "sandbox"))
        .body(file))
}
