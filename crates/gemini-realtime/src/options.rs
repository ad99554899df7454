//! Session configuration for a realtime model connection.

use crate::types::{
    Content, FunctionDeclaration, GenerationConfig, Part, PrebuiltVoiceConfig, ResponseModality,
    Setup, SpeechConfig, Tool, VoiceConfig,
};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_VOICE: &str = "Puck";
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Options for one Live API session: model identifier, voice, sampling
/// temperature, system instructions, and tool declarations.
#[derive(Debug, Clone)]
pub struct RealtimeOptions {
    pub model: String,
    pub voice: String,
    pub temperature: f32,
    pub instructions: Option<String>,
    pub tools: Vec<FunctionDeclaration>,
}

impl Default for RealtimeOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            instructions: None,
            tools: Vec::new(),
        }
    }
}

impl RealtimeOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<FunctionDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    /// Builds the setup message that opens a session with these options.
    pub fn setup(&self) -> Setup {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                temperature: Some(self.temperature),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice.clone(),
                        },
                    },
                }),
            },
            system_instruction: self.instructions.as_ref().map(|text| Content {
                role: "system".to_string(),
                parts: vec![Part { text: text.clone() }],
            }),
            tools: if self.tools.is_empty() {
                Vec::new()
            } else {
                vec![Tool {
                    function_declarations: self.tools.clone(),
                }]
            },
        }
    }
}
