use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChessError {
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("cannot parse move '{san}': {reason}")]
    UnparsableMove { san: String, reason: String },

    #[error("move '{san}' is not legal in {fen}")]
    IllegalMove { fen: String, san: String },
}
