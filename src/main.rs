#[macro_use]
extern crate diesel;

pub mod app;
pub mod config;
pub mod database;
pub mod schema;
pub mod uploads;

mod auth;
mod routes;

use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use app::AppState;
use config::Config;
use database::db_utils::connect_to_db;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let db_pool = connect_to_db(&config.database_url, config.pool_size)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
    let app_state = AppState::new(db_pool, &config);

    log::info!(
        "Server running on {}:{}, serving uploads from {}",
        config.bind_address,
        config.port,
        config.storage_root.display()
    );
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(Data::new(app_state.clone()))
            .configure(routes::configure)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
