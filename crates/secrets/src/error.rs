use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("secret request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("secret store returned {status} for '{name}'")]
    Status {
        name: String,
        status: reqwest::StatusCode,
    },

    #[error("metadata server token request failed: {0}")]
    Token(String),

    #[error("secret payload for '{name}' is not valid base64: {source}")]
    Decode {
        name: String,
        source: base64::DecodeError,
    },

    #[error("secret payload for '{name}' is not valid UTF-8")]
    Utf8 { name: String },
}
