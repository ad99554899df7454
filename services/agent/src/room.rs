//! LiveKit room layer: server-side room operations and the per-session
//! room connection.

use std::time::Duration;

use livekit_api::access_token::{AccessToken, AccessTokenError, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// JWT TTL for agent join tokens.
const TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Capacity of the participant-audio intake channel, in frames.
const INTAKE_CAPACITY: usize = 256;

/// Capacity of the playback broadcast channel, in frames.
const PLAYBACK_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("LiveKit token error: {0}")]
    Token(#[from] AccessTokenError),

    #[error("Room service error: {0}")]
    Service(String),

    #[error("Not connected to room '{0}'")]
    NotConnected(String),
}

/// Server-side room operations for the agent worker.
pub struct RoomService {
    api_key: String,
    api_secret: String,
    client: RoomClient,
}

impl RoomService {
    pub fn new(url: &str, api_key: &str, api_secret: &str) -> Self {
        let client = RoomClient::with_api_key(url, api_key, api_secret);
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            client,
        }
    }

    /// Creates the room if it does not exist yet and returns its metadata.
    pub async fn ensure_room(&self, name: &str) -> Result<Room, RoomError> {
        self.client
            .create_room(name, CreateRoomOptions::default())
            .await
            .map_err(|e| RoomError::Service(e.to_string()))
    }

    /// Mints a join token granting the agent identity full audio
    /// participation in `room_name`.
    pub fn agent_join_token(&self, room_name: &str, identity: &str) -> Result<String, RoomError> {
        let token = AccessToken::with_api_key(&self.api_key, &self.api_secret)
            .with_identity(identity)
            .with_name(identity)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(TOKEN_TTL);

        Ok(token.to_jwt()?)
    }

    /// Deletes the room, disconnecting every participant. This is the
    /// hang-up path for `end_call`.
    pub async fn delete_room(&self, name: &str) -> Result<(), RoomError> {
        self.client
            .delete_room(name)
            .await
            .map_err(|e| RoomError::Service(e.to_string()))
    }
}

/// A chunk of mono PCM16 audio crossing the room boundary.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// One session's binding to a LiveKit room.
///
/// The connection owns the PCM-frame seam between the session loop and the
/// room's media stack: participant audio is delivered through the intake
/// sender and consumed with [`RoomConnection::take_incoming`]; agent audio
/// published here is broadcast to whatever is playing it out into the room.
/// WebRTC media transport itself lives outside this crate.
pub struct RoomConnection {
    room_name: String,
    connected: bool,
    intake_tx: mpsc::Sender<AudioFrame>,
    intake_rx: Option<mpsc::Receiver<AudioFrame>>,
    playback_tx: broadcast::Sender<AudioFrame>,
}

impl RoomConnection {
    /// Binds to a room with a previously minted join token.
    pub async fn connect(url: &str, token: &str, room_name: &str) -> Result<Self, RoomError> {
        if url.is_empty() || token.is_empty() {
            return Err(RoomError::NotConnected(room_name.to_string()));
        }
        info!(
            "Agent connecting to LiveKit room '{}' at '{}' with token length {}",
            room_name,
            url,
            token.len()
        );

        let (intake_tx, intake_rx) = mpsc::channel(INTAKE_CAPACITY);
        let (playback_tx, _) = broadcast::channel(PLAYBACK_CAPACITY);

        Ok(Self {
            room_name: room_name.to_string(),
            connected: true,
            intake_tx,
            intake_rx: Some(intake_rx),
            playback_tx,
        })
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// The sender the media stack uses to deliver participant audio.
    pub fn intake(&self) -> mpsc::Sender<AudioFrame> {
        self.intake_tx.clone()
    }

    /// Takes the participant-audio stream. Yields at most once.
    pub fn take_incoming(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.intake_rx.take()
    }

    /// Subscribes to the agent audio published into the room.
    pub fn subscribe_playback(&self) -> broadcast::Receiver<AudioFrame> {
        self.playback_tx.subscribe()
    }

    /// Publishes a frame of agent audio to the room.
    pub async fn publish(&self, frame: AudioFrame) -> Result<(), RoomError> {
        if !self.connected {
            return Err(RoomError::NotConnected(self.room_name.clone()));
        }
        // No subscriber just means nothing is playing out yet.
        let _ = self.playback_tx.send(frame);
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if self.connected {
            info!("Agent disconnecting from room '{}'", self.room_name);
            self.connected = false;
        }
    }
}
