//! The per-job agent session: one room, one model connection, one agent
//! configuration, driven by a single cooperative task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use gemini_realtime::{
    FunctionCall, FunctionResponse, RealtimeModel, RealtimeOptions, RealtimeSession, SessionEvent,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::AgentDefinition;
use crate::audio;
use crate::room::{AudioFrame, RoomConnection};
use crate::state::AppState;

/// Control requests issued by tool handlers and lifecycle hooks.
#[derive(Debug)]
pub enum SessionControl {
    /// Forward a reply-generation request to the model.
    GenerateReply(String),
    /// Begin graceful session teardown.
    Close,
}

/// Capacity of the session control channel.
const CONTROL_CAPACITY: usize = 8;

/// A handle tool handlers use to talk back to their session loop.
#[derive(Clone)]
pub struct SessionHandle {
    control_tx: mpsc::Sender<SessionControl>,
    closing: Arc<AtomicBool>,
}

/// Creates a control channel and its session handle.
pub fn session_channel() -> (SessionHandle, mpsc::Receiver<SessionControl>) {
    let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
    (
        SessionHandle {
            control_tx,
            closing: Arc::new(AtomicBool::new(false)),
        },
        control_rx,
    )
}

impl SessionHandle {
    /// Requests graceful closure. Later calls are no-ops; the session sees
    /// exactly one close request.
    pub async fn request_close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.control_tx.send(SessionControl::Close).await.is_err() {
            warn!("session control channel closed before close request");
        }
    }

    /// Fire-and-forget reply-generation request.
    pub async fn generate_reply(&self, instructions: impl Into<String>) {
        let request = SessionControl::GenerateReply(instructions.into());
        if self.control_tx.send(request).await.is_err() {
            warn!("session control channel closed before reply request");
        }
    }

    pub fn close_requested(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// The job a dispatch hands to the entrypoint: which room to join.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub session_id: Uuid,
    pub room_name: String,
}

/// Entrypoint for one agent session. Returns when the session ends.
pub async fn run_session(state: Arc<AppState>, job: JobContext) -> Result<()> {
    let agent = state.agent.clone();
    info!("connecting to room {}", job.room_name);

    let room_info = state.rooms.ensure_room(&job.room_name).await?;
    debug!(room_sid = %room_info.sid, "room ready");
    let token = state
        .rooms
        .agent_join_token(&job.room_name, &state.settings.agent_identity)?;
    let mut room =
        RoomConnection::connect(&state.settings.livekit_url, &token, &job.room_name).await?;

    let options = RealtimeOptions::default()
        .with_instructions(agent.instructions)
        .with_tools(agent.function_declarations());
    let model = RealtimeModel::new(state.settings.google_api_key.clone(), options);
    let session = model.connect().await?;
    info!("agent started");

    let (handle, control_rx) = session_channel();
    (agent.on_enter)(handle.clone()).await;

    let outcome = drive_session(&agent, handle, control_rx, &mut room, session).await;
    room.disconnect().await;

    if outcome? {
        // Hang-up: drop the whole room so the caller side ends too.
        if let Err(error) = state.rooms.delete_room(&job.room_name).await {
            warn!(%error, "failed to delete room {} on hang-up", job.room_name);
        }
    }
    Ok(())
}

/// Runs the session event loop. Returns `true` when the session ended via
/// a close request (hang-up) rather than the server ending the stream.
async fn drive_session(
    agent: &AgentDefinition,
    handle: SessionHandle,
    mut control_rx: mpsc::Receiver<SessionControl>,
    room: &mut RoomConnection,
    session: RealtimeSession,
) -> Result<bool> {
    let (mut model_tx, mut model_rx) = session.split();
    let mut frames = room
        .take_incoming()
        .context("room audio stream already taken")?;

    let mut input_resampler =
        audio::create_resampler(audio::ROOM_SAMPLE_RATE, audio::MODEL_INPUT_SAMPLE_RATE, 512)?;
    let mut output_resampler =
        audio::create_resampler(audio::MODEL_OUTPUT_SAMPLE_RATE, audio::ROOM_SAMPLE_RATE, 512)?;

    let mut hung_up = false;
    loop {
        tokio::select! {
            Some(control) = control_rx.recv() => match control {
                SessionControl::GenerateReply(instructions) => {
                    model_tx.generate_reply(&instructions).await?;
                }
                SessionControl::Close => {
                    hung_up = true;
                    break;
                }
            },
            Some(frame) = frames.recv() => {
                let pcm = audio::pcm16_to_f32(&frame.samples);
                let resampled = audio::resample_chunks(&mut input_resampler, &pcm);
                if !resampled.is_empty() {
                    model_tx
                        .send_audio(
                            audio::encode_f32_as_base64_pcm16(&resampled),
                            audio::MODEL_INPUT_SAMPLE_RATE as u32,
                        )
                        .await?;
                }
            },
            Some(event) = model_rx.next_event() => match event? {
                SessionEvent::Audio { data } => {
                    let pcm = audio::decode_base64_pcm16_to_f32(&data);
                    let resampled = audio::resample_chunks(&mut output_resampler, &pcm);
                    if !resampled.is_empty() {
                        room.publish(AudioFrame {
                            samples: audio::f32_to_pcm16(&resampled),
                            sample_rate: audio::ROOM_SAMPLE_RATE as u32,
                        })
                        .await?;
                    }
                }
                SessionEvent::ToolCall(calls) => {
                    let responses = dispatch_tool_calls(agent, &handle, calls).await;
                    if !responses.is_empty() {
                        model_tx.send_tool_responses(responses).await?;
                    }
                }
                SessionEvent::InputTranscription(text) => debug!(%text, "heard"),
                SessionEvent::Text(text) => debug!(%text, "model text"),
                SessionEvent::ToolCallCancellation(ids) => debug!(?ids, "tool calls cancelled"),
                SessionEvent::Interrupted => debug!("model turn interrupted"),
                SessionEvent::TurnComplete => {}
                SessionEvent::Closed => break,
            },
            else => break,
        }
    }

    model_tx.close().await.ok();
    Ok(hung_up)
}

/// Runs a batch of tool calls through the agent's tool table. Once a
/// handler has requested closure, the rest of the batch is dropped
/// unanswered — the session is tearing down.
pub(crate) async fn dispatch_tool_calls(
    agent: &AgentDefinition,
    handle: &SessionHandle,
    calls: Vec<FunctionCall>,
) -> Vec<FunctionResponse> {
    let mut responses = Vec::with_capacity(calls.len());
    for call in calls {
        if handle.close_requested() {
            debug!(tool = %call.name, "dropping tool call after close request");
            continue;
        }
        let response = match agent.tool(&call.name) {
            Some(tool) => match (tool.handler)(handle.clone()).await {
                Ok(Some(output)) => serde_json::json!({ "output": output }),
                Ok(None) => serde_json::json!({}),
                Err(error) => {
                    warn!(tool = %call.name, %error, "tool handler failed");
                    serde_json::json!({ "error": error.to_string() })
                }
            },
            None => {
                warn!(tool = %call.name, "model called an unknown tool");
                serde_json::json!({ "error": format!("unknown tool: {}", call.name) })
            }
        };
        responses.push(FunctionResponse {
            id: call.id.clone(),
            name: call.name,
            response,
        });
    }
    responses
}
