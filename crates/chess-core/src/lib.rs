//! Chess rules used by the crawler: canonical position keys, SAN move
//! application and move history, backed by `shakmaty`.

pub mod error;
pub mod line;

pub use error::ChessError;
pub use line::{Line, PositionKey, STARTING_FEN};
