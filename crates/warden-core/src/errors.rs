/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type so the core can
/// treat outcomes uniformly (usage reply to the issuer vs logged-and-dropped).
/// "Not found" conditions (a vote for an unknown poll, a result query with no
/// poll) are deliberately not error variants: they are routine outcomes and
/// surface as `Option`/enum returns instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persist(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
