mod auth;
mod context;
mod docs;
mod errors;
mod jams;
mod media;
mod messages;
mod notifications;
mod schemas;
mod serialized;
mod sse;
mod themes;
mod users;

use axum::routing::get;
use context::ServerContext;
use log::info;
use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tocatocar_collab::Collab;
use tower_http::cors::{Any, CorsLayer};

pub use errors::{ServerError, ServerResult};
pub use sse::ServerSentEvents;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        match env::var("TOCATOCAR_SERVER_PORT") {
            Ok(port) => port
                .trim()
                .parse()
                .map(|port| Self { port })
                .map_err(|_| format!("TOCATOCAR_SERVER_PORT must be a port number, got \"{}\"", port)),
            Err(_) => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Error)]
#[error("Could not serve on port {port}: {source}")]
pub struct ServeError {
    port: u16,
    source: std::io::Error,
}

/// Builds the full router on top of a collab system.
/// The SSE hub is registered as a publisher, so committed events reach connected clients.
pub fn app(collab: Arc<Collab>) -> axum::Router {
    let sse = ServerSentEvents::new();
    collab.register_publisher(sse.clone());

    let context = ServerContext { collab, sse };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/jams", jams::router().merge(media::router()))
        .nest("/themes", themes::router())
        .nest("/participations", themes::participations_router())
        .nest("/messages", messages::router())
        .nest("/notifications", notifications::router())
        .nest("/events", sse::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the Toca Tocar server
pub async fn run_server(collab: Arc<Collab>, config: ServerConfig) -> Result<(), ServeError> {
    let port = config.port;
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError { port, source })?;

    info!("Listening on port {}", port);

    axum::serve(listener, app(collab).into_make_service())
        .await
        .map_err(|source| ServeError { port, source })
}

#[cfg(test)]
mod test {
    use tocatocar_collab::{CollabConfig, MemoryDatabase};
    use utoipa::OpenApi;

    use super::*;

    #[test]
    fn test_app_builds() {
        let collab = Collab::new(Arc::new(MemoryDatabase::new()), &CollabConfig::default());
        app(Arc::new(collab));
    }

    #[test]
    fn test_api_document_lists_endpoints() {
        let api = docs::ApiDoc::openapi();

        for path in ["/v1/jams/{code}/queue", "/v1/themes/{id}/status", "/v1/events"] {
            assert!(api.paths.paths.contains_key(path), "{} is documented", path);
        }
    }
}
