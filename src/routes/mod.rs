pub mod auth;
pub mod blog;
pub mod category;
pub mod comment;
pub mod like;
pub mod storage;
pub mod user;

use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    web, HttpRequest,
};
use validator::Validate;

use crate::{
    app::{AppError, FieldErrors},
    uploads::{UploadStore, UploadedFile},
};

/// Registers every route of the API together with the extractor configs
/// that turn malformed bodies into `AppError` responses.
///
/// Literal segments such as `/blogs/search` never reach `/blogs/{id}`
/// since ids only match digits.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        //Auth routes
        .service(auth::register)
        .service(auth::login)
        .service(auth::logout)
        .service(auth::current_user)
        //Blog routes
        .service(blog::index)
        .service(blog::search)
        .service(blog::upload_image)
        .service(blog::store)
        .service(blog::show)
        .service(blog::update)
        .service(blog::destroy)
        //Comment routes
        .service(comment::index)
        .service(comment::store)
        .service(comment::show)
        .service(comment::update)
        .service(comment::destroy)
        //Like routes
        .service(like::index)
        .service(like::toggle)
        .service(like::show)
        .service(like::destroy)
        //Category routes
        .service(category::index)
        .service(category::store)
        .service(category::show)
        .service(category::update)
        .service(category::destroy)
        //User routes
        .service(user::index)
        .service(user::store)
        .service(user::show)
        .service(user::update)
        .service(user::destroy)
        //Uploaded files
        .service(storage::serve);
}

fn json_error(err: JsonPayloadError, _: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected json body: {}", err);
    AppError::BadRequest.into()
}

fn query_error(err: QueryPayloadError, _: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected query string: {}", err);
    AppError::BadRequest.into()
}

fn path_error(err: PathError, _: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected path: {}", err);
    AppError::NotFound.into()
}

/// Runs the derived rules of `input` on top of the hand-written checks in `errors`
/// and fails with every message collected.
pub(crate) fn validate_input<T: Validate>(input: &T, mut errors: FieldErrors) -> Result<(), AppError> {
    if let Err(invalid) = input.validate() {
        errors.merge(invalid.into());
    }
    errors.into_result()
}

/// Treats a blank optional text as absent
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Writes an already validated upload on the blocking pool, returns its public path
pub(crate) async fn store_upload(store: &UploadStore, dir: &'static str, file: UploadedFile) -> Result<String, AppError> {
    let store = store.clone();
    Ok(web::block(move || store.save(dir, &file.file_name, &file.bytes)).await??)
}

/// Removes stored files once the records pointing at them are gone, or when the
/// record they were uploaded for could not be written. Failures are only logged.
pub(crate) async fn discard_uploads(store: &UploadStore, public_paths: Vec<String>) {
    if public_paths.is_empty() {
        return;
    }
    let store = store.clone();
    if let Err(err) = web::block(move || store.delete_all(&public_paths)).await {
        log::warn!("could not schedule upload cleanup: {}", err);
    }
}
