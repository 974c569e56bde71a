/// Core error type for the channel sync bot.
///
/// Adapter crates should map their specific errors into this type so the
/// core can handle failures consistently (user-facing message vs skip-and-log).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot resolve channel reference `{input}`: {reason}")]
    Resolution { input: String, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
