#![deny(missing_docs)]
//! Code Educator server executable.
//!
//! Serves code analysis and assistant endpoints over HTTP.

mod openapi;
mod routes;

#[cfg(not(test))]
use actix_cors::Cors;
#[cfg(not(test))]
use actix_web::{App, HttpServer, http::header, web};
#[cfg(not(test))]
use dotenvy::dotenv;
#[cfg(not(test))]
use educator_core::BackendConfig;

#[allow(unused_imports)]
use std::str::FromStr;

#[cfg(not(test))]
use crate::routes::{
    AppState, analyze, analyze_file, ask, ask_stream, debug, explain, generate, health, languages,
    model_details, models, openapi_json, quality, root, stats,
};

#[cfg(not(test))]
fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BackendConfig::from_env().map_err(|err| std::io::Error::other(err.to_string()))?;
    log::info!(
        "using model backend {} (default model {})",
        config.base_url,
        config.default_model
    );
    let state = web::Data::new(
        AppState::new(config).map_err(|err| std::io::Error::other(err.to_string()))?,
    );

    let origins = std::env::var("EDUCATOR_UI_ORIGINS")
        .unwrap_or_else(|_| "http://127.0.0.1:3000,http://localhost:3000".to_string());
    let allowed_origins: Vec<String> = origins
        .split(',')
        .map(|value| value.trim())
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

    let listen_addr = std::env::var("EDUCATOR_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listen_port =
        u16::from_str(&std::env::var("EDUCATOR_PORT").unwrap_or_else(|_| "8000".to_string()))
            .map_err(|err| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("EDUCATOR_PORT must be a u16 number: {err}"),
                )
            })?;

    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::CONTENT_TYPE])
                .max_age(3600);
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            App::new()
                .wrap(actix_web::middleware::Logger::default())
                .wrap(cors)
                .app_data(state.clone())
                .service(root)
                .service(health)
                .service(models)
                .service(model_details)
                .service(ask_stream)
                .service(ask)
                .service(explain)
                .service(generate)
                .service(debug)
                .service(analyze_file)
                .service(quality)
                .service(analyze)
                .service(languages)
                .service(stats)
                .service(openapi_json)
        })
        .bind((listen_addr, listen_port))?
        .run()
        .await
    })
}

#[cfg(test)]
fn main() {}
