use async_trait::async_trait;
use axum::{
    extract::Query,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use dashmap::DashMap;
use futures_util::Stream;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{HashSet, VecDeque},
    convert::Infallible,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};
use tocatocar_collab::{user_channel, Id, PublishError, Publisher};
use utoipa::{IntoParams, ToSchema};

use crate::{context::ServerContext, Router};

type ConnectionId = Id<Connection>;

/// A realtime event, sent as the data of an SSE message named after [ServerEvent::event]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServerEvent {
    /// `jam-<id>` or `user-<id>`
    channel: String,
    /// `update-jam`, `new-message`, `new-notification` or `new-dm`
    event: String,
    #[schema(value_type = Object)]
    data: Value,
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: DashMap<ConnectionId, Connection>,
}

struct Connection {
    channels: HashSet<String>,
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    /// Sends an event to every connection subscribed to its channel
    pub fn broadcast(&self, event: ServerEvent) {
        for connection in self.connections.iter() {
            if connection.channels.contains(&event.channel) {
                connection.send(event.clone())
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn connect(&self, channels: HashSet<String>) -> ConnectionHandle {
        let id = ConnectionId::new();
        let connection = Connection::new(channels);
        let handle = connection.handle(id, self.me.clone());

        self.connections.insert(id, connection);
        debug!("SSE connection {} opened", id);

        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.remove(&id);
        debug!("SSE connection {} closed", id);
    }
}

#[async_trait]
impl Publisher for ServerSentEvents {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        self.broadcast(ServerEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            data: payload.clone(),
        });

        Ok(())
    }
}

impl Connection {
    fn new(channels: HashSet<String>) -> Self {
        Self {
            channels,
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push_back(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, id: ConnectionId, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        if let Some(message) = pending_messages.pop_front() {
            let event = Event::default()
                .event(message.event.as_str())
                .json_data(&message)
                .unwrap_or_else(|_| Event::default().comment("unserializable event"));

            return Poll::Ready(Some(Ok(event)));
        }

        // Stored while the queue is locked so a concurrent send can't slip in between
        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubscribeQuery {
    /// Comma separated channels, like `jam-1,user-2`
    channels: String,
    /// Session token, required to subscribe to a `user-<id>` channel.
    /// Browsers can't set headers on an EventSource, so it goes in the query.
    token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    params(SubscribeQuery),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events on the requested channels",
            body = ServerEvent
        )
    )
)]
async fn event_stream(
    context: ServerContext,
    Query(query): Query<SubscribeQuery>,
) -> Sse<ConnectionHandle> {
    let own_channel = match &query.token {
        Some(token) => context
            .collab
            .auth
            .actor(token)
            .await
            .ok()
            .map(|actor| user_channel(actor.id)),
        None => None,
    };

    let channels = allowed_channels(&query.channels, own_channel.as_deref());
    Sse::new(context.sse.connect(channels)).keep_alive(KeepAlive::default())
}

/// Jam channels are public, user channels only for their owner
fn allowed_channels(requested: &str, own_channel: Option<&str>) -> HashSet<String> {
    requested
        .split(',')
        .map(str::trim)
        .filter(|channel| {
            if channel.starts_with("jam-") {
                return true;
            }

            if channel.starts_with("user-") && Some(*channel) == own_channel {
                return true;
            }

            if !channel.is_empty() {
                warn!("Refused subscription to {}", channel);
            }

            false
        })
        .map(str::to_string)
        .collect()
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}

#[cfg(test)]
mod test {
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;

    fn channels(list: &[&str]) -> HashSet<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_allowed_channels() {
        assert_eq!(
            allowed_channels("jam-1, user-2,user-3,,other", Some("user-2")),
            channels(&["jam-1", "user-2"])
        );
        assert_eq!(allowed_channels("user-2", None), channels(&[]));
    }

    #[tokio::test]
    async fn test_events_reach_subscribers_only() {
        let sse = ServerSentEvents::new();

        let mut jam_one = sse.connect(channels(&["jam-1"]));
        let jam_two = sse.connect(channels(&["jam-2"]));

        sse.publish("jam-1", "update-jam", &json!({ "jamId": 1 }))
            .await
            .unwrap();

        assert!(jam_one.next().await.is_some());
        assert!(jam_two.pending_messages.lock().is_empty());
        assert_eq!(sse.connection_count(), 2);

        drop(jam_two);
        assert_eq!(sse.connection_count(), 1);
    }
}
