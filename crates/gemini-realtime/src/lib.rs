//! Client for the Gemini Live API (`BidiGenerateContent` over WebSocket).
//!
//! The crate covers the slice of the protocol a voice agent needs: the setup
//! handshake (model, voice, temperature, system instruction, tool
//! declarations), streaming PCM16 audio in, and decoding server events —
//! audio deltas, input transcriptions, tool calls, and turn boundaries.
//! Audio payloads cross the API as base64-encoded PCM16; this crate passes
//! them through untouched and leaves resampling to the caller.

pub mod options;
pub mod session;
pub mod types;

pub use options::RealtimeOptions;
pub use session::{RealtimeModel, RealtimeReceiver, RealtimeSender, RealtimeSession, SessionEvent};
pub use types::{FunctionCall, FunctionDeclaration, FunctionResponse};
