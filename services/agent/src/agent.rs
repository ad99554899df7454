//! The Bamboo assistant: fixed instructions, the callable tool table, and
//! the session-entry hook.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use gemini_realtime::FunctionDeclaration;
use tracing::info;

use crate::session::SessionHandle;

/// System instructions for every session. Trigger-word behavior lives in
/// the prompt and is interpreted by the model, not by this worker.
pub const INSTRUCTIONS: &str = "You are a helpful voice assistant. Keep answers concise and conversational.
If the voice speaking to you says 'Bamboo':
Please respond by saying 'limerick', followed by a funny limerick...  DO NOT REPEAT THE LIMERICK.
If the voice speaking to you says 'bop', use the 'log_bop' tool to log it and continue the conversation.
If the voice speaking to you says 'end call', use the 'end_call' tool to hang up the call.";

/// Reply-generation request issued when the agent enters a session.
pub const GREETING_INSTRUCTIONS: &str = "Greet the user warmly and offer your assistance.";

/// Confirmation returned by `log_bop`; the model may speak it back.
pub const BOP_REPLY: &str = "Logged the bop!";

/// A tool invocation handler. Receives the session handle so it can issue
/// control requests; the returned text, if any, goes back to the model as
/// the function result.
pub type ToolHandler =
    Arc<dyn Fn(SessionHandle) -> BoxFuture<'static, anyhow::Result<Option<String>>> + Send + Sync>;

/// Hook invoked once per session, after the room is bound.
pub type EnterHook = Arc<dyn Fn(SessionHandle) -> BoxFuture<'static, ()> + Send + Sync>;

/// One entry in the tool table.
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub handler: ToolHandler,
}

/// An immutable agent configuration: instructions, tools, and lifecycle
/// hook. One instance is shared across all sessions.
pub struct AgentDefinition {
    pub instructions: &'static str,
    pub tools: Vec<ToolDef>,
    pub on_enter: EnterHook,
}

impl AgentDefinition {
    pub fn tool(&self, name: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// The function declarations advertised to the model at session setup.
    pub fn function_declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools
            .iter()
            .map(|t| FunctionDeclaration::new(t.name, t.description))
            .collect()
    }
}

/// Builds the Bamboo assistant configuration.
pub fn assistant() -> AgentDefinition {
    AgentDefinition {
        instructions: INSTRUCTIONS,
        tools: vec![
            ToolDef {
                name: "end_call",
                description: "End everything. Hang up the call immediately.",
                handler: Arc::new(|session: SessionHandle| {
                    Box::pin(async move {
                        info!("ending the call");
                        session.request_close().await;
                        Ok(None)
                    })
                }),
            },
            ToolDef {
                name: "log_bop",
                description: "Log a bop",
                handler: Arc::new(|_session: SessionHandle| {
                    Box::pin(async move {
                        info!("heard a bop");
                        Ok(Some(BOP_REPLY.to_string()))
                    })
                }),
            },
        ],
        on_enter: Arc::new(|session: SessionHandle| {
            Box::pin(async move {
                session.generate_reply(GREETING_INSTRUCTIONS).await;
            })
        }),
    }
}
