// Social analytics server

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use social_core::{app_state::AppState, config::Config, routes::create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    let addr = config.server_address();

    // Initialize application state
    let app_state = AppState::new(config).await?;

    // Build main application router
    let app = Router::new()
        .nest("/api/v1", create_router(app_state))
        .layer(CorsLayer::permissive());

    println!("🚀 Social analytics server starting on http://{}", addr);
    println!("📋 API:");
    println!("  GET  /api/v1/graph/distance/{{from}}/{{to}}  - Social distance");
    println!("  GET  /api/v1/users/{{id}}/recommendations   - People you may know");
    println!("  GET  /api/v1/users/{{id}}/feed              - Follow feed");
    println!("  GET  /api/v1/posts/popular                 - Engagement ranking");
    println!("  GET  /api/v1/posts/{{id}}/thread            - Comment thread");
    println!("  GET  /api/v1/comments/{{id}}/ancestors      - Comment ancestors");
    println!("  GET  /api/v1/search/posts|users|all        - Full-text search");
    println!("  GET  /api/v1/communities/{{id}}/stats       - Community stats");
    println!("  POST /api/v1/communities                   - Community + admin");
    println!("  POST /api/v1/posts/share                   - Post + fan-out");
    println!("  POST /api/v1/batch                         - Batch with per-item isolation");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
