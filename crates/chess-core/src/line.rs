//! Positions reached by playing moves from a root position.
//!
//! A [`Line`] is the board plus the moves that produced it. Its
//! [`PositionKey`] is the full FEN and is the only notion of identity:
//! two lines are the same position iff their keys are equal, regardless of
//! the move order that produced them.

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::{
    fen::Fen,
    san::{San, SanPlus},
    CastlingMode, Chess, EnPassantMode, Move, Position,
};

use crate::error::ChessError;

/// FEN of the standard initial position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Canonical serialization of a board state (placement, side to move,
/// castling rights, legal en passant square, halfmove clock, fullmove number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    pub fn of(board: &Chess) -> Self {
        Self(Fen::from_position(board, EnPassantMode::Legal).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A board together with the moves played from `root` to reach it.
#[derive(Debug, Clone)]
pub struct Line {
    root: PositionKey,
    board: Chess,
    moves: Vec<Move>,
    key: PositionKey,
}

impl Line {
    /// The standard initial position with an empty history.
    pub fn start() -> Self {
        let board = Chess::default();
        let key = PositionKey::of(&board);
        Self {
            root: key.clone(),
            board,
            moves: Vec::new(),
            key,
        }
    }

    /// Start a line from an arbitrary position. Its history is empty and
    /// `root()` is the parsed position.
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let invalid = |reason: String| ChessError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };

        let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
        let board: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;

        let key = PositionKey::of(&board);
        Ok(Self {
            root: key.clone(),
            board,
            moves: Vec::new(),
            key,
        })
    }

    pub fn key(&self) -> &PositionKey {
        &self.key
    }

    pub fn fen(&self) -> &str {
        self.key.as_str()
    }

    /// Position the history starts from.
    pub fn root(&self) -> &PositionKey {
        &self.root
    }

    pub fn board(&self) -> &Chess {
        &self.board
    }

    /// Number of half-moves played from the root.
    pub fn ply(&self) -> usize {
        self.moves.len()
    }

    /// Apply a move given in SAN (check/mate suffixes allowed) and return the
    /// successor line. `self` is left untouched.
    pub fn play_san(&self, san: &str) -> Result<Line, ChessError> {
        let parsed: SanPlus = san.parse().map_err(|e| ChessError::UnparsableMove {
            san: san.to_string(),
            reason: format!("{e}"),
        })?;

        let mv = parsed
            .san
            .to_move(&self.board)
            .map_err(|_| ChessError::IllegalMove {
                fen: self.key.to_string(),
                san: san.to_string(),
            })?;

        Ok(self.successor(mv))
    }

    /// All legal moves from this position, in SAN.
    pub fn legal_moves_san(&self) -> Vec<String> {
        self.board
            .legal_moves()
            .iter()
            .map(|mv| San::from_move(&self.board, mv.clone()).to_string())
            .collect()
    }

    /// Moves from the root in UCI notation (`e2e4`, `e1g1`, `e7e8q`).
    pub fn history_uci(&self) -> Vec<String> {
        self.moves
            .iter()
            .map(|mv| mv.to_uci(CastlingMode::Standard).to_string())
            .collect()
    }

    fn successor(&self, mv: Move) -> Line {
        let mut board = self.board.clone();
        board.play_unchecked(mv.clone());

        let mut moves = Vec::with_capacity(self.moves.len() + 1);
        moves.extend(self.moves.iter().cloned());
        moves.push(mv);

        let key = PositionKey::of(&board);
        Line {
            root: self.root.clone(),
            board,
            moves,
            key,
        }
    }
}

impl Default for Line {
    fn default() -> Self {
        Self::start()
    }
}
