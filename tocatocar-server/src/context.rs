use std::{convert::Infallible, sync::Arc};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tocatocar_collab::Collab;

use crate::sse::ServerSentEvents;

#[derive(Clone)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub sse: Arc<ServerSentEvents>,
}

/// Lets handlers take the context directly
#[async_trait]
impl FromRequestParts<ServerContext> for ServerContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}
