//! Connection handling for a Live API session.
//!
//! `RealtimeModel` owns the credentials and options and performs the
//! setup handshake; the resulting `RealtimeSession` splits into a sender
//! and receiver half so callers can drive both directions from one
//! `tokio::select!` loop.

use std::collections::VecDeque;

use anyhow::{Context, Result, bail};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, warn};

use crate::options::RealtimeOptions;
use crate::types::{
    Blob, ClientContent, ClientEvent, Content, FunctionCall, FunctionResponse, Part, RealtimeInput,
    ServerEvent, ToolResponse,
};

const LIVE_API_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// A configured realtime model; `connect` opens one session per call.
pub struct RealtimeModel {
    api_key: String,
    options: RealtimeOptions,
}

impl RealtimeModel {
    pub fn new(api_key: impl Into<String>, options: RealtimeOptions) -> Self {
        Self {
            api_key: api_key.into(),
            options,
        }
    }

    /// Connects to the Live API and completes the setup handshake.
    pub async fn connect(&self) -> Result<RealtimeSession> {
        let url = format!("{LIVE_API_URL}?key={}", self.api_key);
        let (ws_stream, _) = connect_async(url)
            .await
            .context("failed to connect to the Live API")?;
        let (mut tx, mut rx) = ws_stream.split();

        let setup = ClientEvent::Setup(self.options.setup());
        tx.send(WsMessage::Text(serde_json::to_string(&setup)?.into()))
            .await
            .context("failed to send session setup")?;

        // The server acknowledges setup before any content flows.
        loop {
            let Some(msg) = rx.next().await else {
                bail!("connection ended before session setup completed");
            };
            let event = match msg? {
                WsMessage::Text(text) => serde_json::from_str::<ServerEvent>(&text).ok(),
                WsMessage::Binary(data) => serde_json::from_slice::<ServerEvent>(&data).ok(),
                WsMessage::Close(frame) => {
                    bail!("connection closed during session setup: {frame:?}")
                }
                _ => continue,
            };
            match event {
                Some(event) if event.setup_complete.is_some() => break,
                Some(event) => warn!(?event, "unexpected message during session setup"),
                None => warn!("unparseable message during session setup"),
            }
        }
        info!(model = %self.options.model, "Live API session setup is complete");

        Ok(RealtimeSession {
            sender: RealtimeSender { tx },
            receiver: RealtimeReceiver {
                rx,
                pending: VecDeque::new(),
            },
        })
    }
}

/// An established session. Split it to use both halves concurrently.
pub struct RealtimeSession {
    sender: RealtimeSender,
    receiver: RealtimeReceiver,
}

impl RealtimeSession {
    pub fn split(self) -> (RealtimeSender, RealtimeReceiver) {
        (self.sender, self.receiver)
    }
}

/// Outbound half: audio input, tool responses, reply requests, close.
pub struct RealtimeSender {
    tx: WsSink,
}

impl RealtimeSender {
    async fn send_event(&mut self, event: &ClientEvent) -> Result<()> {
        self.tx
            .send(WsMessage::Text(serde_json::to_string(event)?.into()))
            .await?;
        Ok(())
    }

    /// Streams a chunk of base64-encoded PCM16 audio at the given rate.
    pub async fn send_audio(&mut self, base64_pcm16: String, sample_rate: u32) -> Result<()> {
        self.send_event(&ClientEvent::RealtimeInput(RealtimeInput {
            audio: Blob {
                mime_type: format!("audio/pcm;rate={sample_rate}"),
                data: base64_pcm16,
            },
        }))
        .await
    }

    pub async fn send_tool_responses(&mut self, responses: Vec<FunctionResponse>) -> Result<()> {
        self.send_event(&ClientEvent::ToolResponse(ToolResponse {
            function_responses: responses,
        }))
        .await
    }

    /// Asks the model to produce a spoken reply following `instructions`.
    ///
    /// The request completes a client turn; the reply itself arrives as
    /// ordinary server content on the receiver half.
    pub async fn generate_reply(&mut self, instructions: &str) -> Result<()> {
        self.send_event(&ClientEvent::ClientContent(ClientContent {
            turns: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: instructions.to_string(),
                }],
            }],
            turn_complete: true,
        }))
        .await
    }

    /// Requests a graceful close of the underlying connection.
    pub async fn close(&mut self) -> Result<()> {
        self.tx.send(WsMessage::Close(None)).await?;
        self.tx.close().await?;
        Ok(())
    }
}

/// Inbound half: decoded server events, one at a time.
pub struct RealtimeReceiver {
    rx: WsSource,
    pending: VecDeque<SessionEvent>,
}

impl RealtimeReceiver {
    /// Returns the next session event, or `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<Result<SessionEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            match self.rx.next().await? {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => self.pending.extend(flatten_server_event(event)),
                    Err(error) => warn!(%error, "failed to parse server message"),
                },
                Ok(WsMessage::Binary(data)) => match serde_json::from_slice::<ServerEvent>(&data) {
                    Ok(event) => self.pending.extend(flatten_server_event(event)),
                    Err(error) => warn!(%error, "failed to parse server message"),
                },
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "server closed the session");
                    return Some(Ok(SessionEvent::Closed));
                }
                Ok(_) => {}
                Err(error) => return Some(Err(error.into())),
            }
        }
    }
}

/// One decoded occurrence on the session stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A chunk of model speech, base64-encoded PCM16.
    Audio { data: String },
    /// Streamed text from the model turn.
    Text(String),
    /// Transcription of what the model heard from the user.
    InputTranscription(String),
    /// The model requests one or more tool invocations.
    ToolCall(Vec<FunctionCall>),
    /// Previously-issued tool calls the model no longer wants answered.
    ToolCallCancellation(Vec<String>),
    /// The model finished its turn.
    TurnComplete,
    /// The user spoke over the model; any queued playback is stale.
    Interrupted,
    /// The server closed the session.
    Closed,
}

/// Expands one server message into the session events it carries, in
/// server order: tool traffic first, then interruption, transcription,
/// turn parts, and finally the turn boundary.
fn flatten_server_event(event: ServerEvent) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    if let Some(tool_call) = event.tool_call {
        if !tool_call.function_calls.is_empty() {
            out.push(SessionEvent::ToolCall(tool_call.function_calls));
        }
    }
    if let Some(cancellation) = event.tool_call_cancellation {
        out.push(SessionEvent::ToolCallCancellation(cancellation.ids));
    }
    if let Some(content) = event.server_content {
        if content.interrupted == Some(true) {
            out.push(SessionEvent::Interrupted);
        }
        if let Some(transcription) = content.input_transcription {
            out.push(SessionEvent::InputTranscription(transcription.text));
        }
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(text) = part.text {
                    out.push(SessionEvent::Text(text));
                }
                if let Some(blob) = part.inline_data {
                    out.push(SessionEvent::Audio { data: blob.data });
                }
            }
        }
        if content.turn_complete == Some(true) {
            out.push(SessionEvent::TurnComplete);
        }
    }
    out
}
