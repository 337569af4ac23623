//! Manual next/prev navigation over the last single-rank launch

use super::SequenceRequest;
use crate::catalog::RankRange;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

/// Ordered ranks of a single-rank launch plus the position being played
///
/// Random order is fixed once at launch, so prev walks back through the
/// exact shuffle the listener heard.
#[derive(Debug, Clone)]
pub struct NavigationCursor {
    request: SequenceRequest,
    ranks: Vec<u32>,
    position: usize,
}

impl NavigationCursor {
    /// Cursor positioned on the head of `ranks`; `None` for an empty launch
    pub fn new(request: SequenceRequest, ranks: Vec<u32>) -> Option<Self> {
        if ranks.is_empty() {
            return None;
        }
        Some(Self {
            request,
            ranks,
            position: 0,
        })
    }

    pub fn current_rank(&self) -> u32 {
        self.ranks[self.position]
    }

    pub fn ranks(&self) -> &[u32] {
        &self.ranks
    }

    /// Rank one step away in `direction`, without moving
    pub fn peek(&self, direction: Direction) -> Option<u32> {
        self.target(direction).map(|index| self.ranks[index])
    }

    /// Move one step; `None` (cursor unchanged) when it would leave the range
    pub fn step(&mut self, direction: Direction) -> Option<u32> {
        let index = self.target(direction)?;
        self.position = index;
        Some(self.ranks[index])
    }

    /// Request that plays exactly `rank` with the cursor's settings
    pub fn request_for(&self, rank: u32) -> SequenceRequest {
        SequenceRequest {
            range: RankRange::single(rank),
            continuous: false,
            ..self.request.clone()
        }
    }

    fn target(&self, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Next => {
                let next = self.position + 1;
                (next < self.ranks.len()).then_some(next)
            }
            Direction::Prev => self.position.checked_sub(1),
        }
    }
}
