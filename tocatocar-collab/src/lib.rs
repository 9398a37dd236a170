mod access;
mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod events;
mod jams;
mod media;
mod notifications;
mod participation;
mod profiles;
mod realtime;
mod themes;
mod util;

use std::sync::Arc;

pub use access::*;
pub use auth::*;
pub use chat::*;
pub use config::*;
pub use db::*;
pub use errors::*;
pub use events::*;
pub use jams::*;
pub use media::*;
pub use notifications::*;
pub use participation::*;
pub use profiles::*;
pub use realtime::*;
pub use themes::*;
pub use util::Id;

use log::info;

/// The Toca Tocar collab system, facilitating jams, theme queues, chat, and more.
pub struct Collab {
    context: CollabContext,

    pub auth: Auth,
    pub profiles: ProfileManager,
    pub jams: JamManager,
    pub themes: ThemeManager,
    pub participation: ParticipationManager,
    pub chat: ChatManager,
    pub media: MediaManager,
    pub notifications: NotificationManager,
}

/// A type passed to the managers of the collab system, to access state and publish events.
#[derive(Clone)]
pub struct CollabContext {
    pub database: SharedDatabase,
    pub policy: Arc<AccessPolicy>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Collab {
    pub fn new(database: SharedDatabase, config: &CollabConfig) -> Self {
        let context = CollabContext {
            database,
            policy: Arc::new(AccessPolicy::new(&config.admin_emails)),
            dispatcher: Arc::new(Dispatcher::new(config.dispatch)),
        };

        if let Some(relay) = &config.relay {
            info!("Relaying events to {}", relay.url);

            context.dispatcher.register(Arc::new(HttpPublisher::new(
                relay.url.clone(),
                relay.key.clone(),
            )));
        }

        Self {
            auth: Auth::new(&context),
            profiles: ProfileManager::new(&context),
            jams: JamManager::new(&context),
            themes: ThemeManager::new(&context),
            participation: ParticipationManager::new(&context),
            chat: ChatManager::new(&context),
            media: MediaManager::new(&context),
            notifications: NotificationManager::new(&context),
            context,
        }
    }

    /// Adds a publisher that receives every committed event
    pub fn register_publisher(&self, publisher: Arc<dyn Publisher>) {
        self.context.dispatcher.register(publisher)
    }
}

impl CollabContext {
    /// Hands the events of a committed operation to the dispatcher and returns its value
    pub(crate) async fn settle<T>(&self, committed: Committed<T>) -> T {
        self.dispatcher.dispatch(committed.events).await;
        committed.value
    }
}
