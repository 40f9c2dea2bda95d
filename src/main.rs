mod config;
mod database;
mod error;
mod lookup;
mod migrations;
mod model;
mod routes;

use actix_web::{middleware::Logger, web, App, HttpServer};
use config::Config;
use log::info;
use lookup::{MovieLookup, OmdbClient, DEFAULT_API_KEY_VAR};
use std::io;
use std::path::Path;
use std::sync::Arc;

fn startup_error<E: std::fmt::Display>(context: &str, err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(
        env_logger::Env::new().default_filter_or("movieweb=debug,actix_web=info"),
    );

    let config = Config::from_env().map_err(|e| startup_error("invalid configuration", e))?;

    if let Some(dir) = Path::new(&config.database_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let db = database::init_pool(&config.database_path, config.pool_size)
        .map_err(|e| startup_error("could not open database", e))?;
    let tera = routes::templates().map_err(|e| startup_error("could not load templates", e))?;
    let lookup: Arc<dyn MovieLookup> = Arc::new(
        OmdbClient::new(&config.omdb_url, DEFAULT_API_KEY_VAR)
            .map_err(|e| startup_error("could not build movie lookup client", e))?,
    );

    let tera = web::Data::new(tera);
    let db = web::Data::new(db);
    let lookup = web::Data::from(lookup);

    info!("listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(routes::error_handlers())
            .wrap(Logger::default())
            .app_data(tera.clone())
            .app_data(db.clone())
            .app_data(lookup.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
