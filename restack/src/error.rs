use thiserror::Error;

/// Errors that abort the current resolve and surface to the game loop.
///
/// Numerical guards (zero denominators in range updates, empty regret rows)
/// are handled locally and never reach this type. A missing value-network
/// checkpoint is not an error either; the stage degrades to a zero predictor.
#[derive(Debug, Error)]
pub enum Error {
    #[error("deck exhausted: requested {requested} cards but only {available} remain")]
    DeckExhausted { requested: usize, available: usize },

    #[error("hand evaluation expects 5 to 7 cards, got {0}")]
    InvalidHandSize(usize),

    #[error("a hole hand must be exactly 2 cards, got {0}")]
    InvalidHoleSize(usize),

    #[error("a public board must hold 0, 3, 4 or 5 cards, got {0}")]
    InvalidBoardSize(usize),

    #[error("malformed blob {path}: {reason}")]
    MalformedBlob { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
