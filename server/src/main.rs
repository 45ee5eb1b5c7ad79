// /server/src/main.rs
use axum::Router;
use dotenvy::dotenv;
use sqlx::PgPool;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Подключаем все наши модули
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod mail;
mod models;
mod routes;
mod secret;
mod state;
mod validators;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "urban_utopia_server=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let pool: PgPool = db::connect_db(&config.database_url).await;

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Не удалось применить миграции");

    let mailer = mail::spawn_mailer(&config.sent_mail_dir);
    let media_root = config.media_root.clone();

    let app_state = AppState {
        pool,
        config,
        mailer,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(vec![
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_methods(tower_http::cors::Any);

    let app = Router::new()
        .nest("/api/v1", routes::create_router(app_state.clone()))
        .nest_service("/media", ServeDir::new(media_root))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::debug!("->> СЕРВЕР ЗАПУЩЕН на http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Не удалось открыть порт");
    axum::serve(listener, app)
        .await
        .expect("Сервер завершился с ошибкой");
}
