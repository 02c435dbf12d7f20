//! FIFO frontier with a visited set keyed by canonical position.

use std::collections::{HashSet, VecDeque};

use chess_core::{Line, PositionKey};

/// Positions waiting to be fetched, plus every key ever accepted.
///
/// A key is marked visited the moment it is offered and accepted, so a
/// position reached through several move orders is queued only once.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<Line>,
    visited: HashSet<PositionKey>,
}

impl Frontier {
    pub fn new(root: Line) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
        };
        frontier.offer(root);
        frontier
    }

    /// Queue `line` unless its position was seen before. Returns whether it
    /// was queued.
    pub fn offer(&mut self, line: Line) -> bool {
        if !self.visited.insert(line.key().clone()) {
            return false;
        }
        self.queue.push_back(line);
        true
    }

    pub fn pop(&mut self) -> Option<Line> {
        self.queue.pop_front()
    }

    pub fn is_visited(&self, key: &PositionKey) -> bool {
        self.visited.contains(key)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}
