use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;

use crate::handlers;
use crate::state::{AppState, ServerConfig};

/// Route table, shared by the binary and the handler tests.
pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::handler))
        .service(
            web::scope("/conversations")
                .route("", web::post().to(handlers::conversations::create))
                .route("", web::get().to(handlers::conversations::list))
                .route("/{id}", web::get().to(handlers::conversations::get))
                .route("/{id}", web::delete().to(handlers::delete::handler))
                .route("/{id}/chat", web::post().to(handlers::chat::handler))
                .route("/{id}/stop", web::post().to(handlers::stop::handler)),
        );
}

pub async fn run_server(config: ServerConfig) -> io::Result<()> {
    let state = AppState::from_config(&config).await?;
    run_server_with_state(config.port, state).await
}

pub async fn run_server_with_state(port: u16, state: AppState) -> io::Result<()> {
    let state = web::Data::new(state);
    log::info!("Listening on 0.0.0.0:{}", port);

    let app_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await;

    state.shutdown().await;
    result
}
