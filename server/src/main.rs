mod db;
mod routes;
mod services;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");
    let storage_root = PathBuf::from(std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./data/media".into()));
    let media_base_url = std::env::var("MEDIA_BASE_URL").unwrap_or_else(|_| "/media".into());

    let pool = db::init_pool(&database_url).await.expect("database init failed");

    let store = Arc::new(services::storage::FsStore::new(storage_root.clone(), media_base_url));
    let state = state::AppState::new(pool, store);
    let _sweep = services::sweep::spawn_orphan_sweep(state.clone());

    let app = routes::app(state, storage_root);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.expect("failed to bind");

    tracing::info!(%port, "sharenight listening");
    axum::serve(listener, app).await.expect("server failed");
}
