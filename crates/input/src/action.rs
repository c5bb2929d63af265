use std::collections::VecDeque;

use crawl_common::Movement;
use serde::{Deserialize, Serialize};

/// A discrete intent produced by the input layer once per key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Open or close the door in front of the player.
    OpenDoor,
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    TurnLeft,
    TurnRight,
    ToggleFreecam,
}

impl Action {
    /// The grid movement this action requests, if any.
    pub fn movement(self) -> Option<Movement> {
        match self {
            Self::MoveForward => Some(Movement::Forward),
            Self::MoveBackward => Some(Movement::Backward),
            Self::MoveLeft => Some(Movement::Left),
            Self::MoveRight => Some(Movement::Right),
            Self::TurnLeft => Some(Movement::TurnLeft),
            Self::TurnRight => Some(Movement::TurnRight),
            Self::OpenDoor | Self::ToggleFreecam => None,
        }
    }
}

/// FIFO of actions collected between frames.
#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: VecDeque<Action>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        tracing::trace!(?action, "action queued");
        self.pending.push_back(action);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending action in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = Action> + '_ {
        self.pending.drain(..)
    }
}
