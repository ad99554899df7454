//! Shared worker state, created once at startup and passed to all
//! dispatch handlers and sessions.

use std::sync::Arc;

use crate::agent::{AgentDefinition, assistant};
use crate::config::Settings;
use crate::room::RoomService;

pub struct AppState {
    pub settings: Arc<Settings>,
    pub rooms: RoomService,
    pub agent: Arc<AgentDefinition>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>) -> Self {
        let rooms = RoomService::new(
            &settings.livekit_url,
            &settings.livekit_api_key,
            &settings.livekit_api_secret,
        );
        Self {
            settings,
            rooms,
            agent: Arc::new(assistant()),
        }
    }
}
