//! Input: player intents the level core consumes, independent of any windowing layer.
//!
//! # Invariants
//! - The core never sees raw key or mouse events, only [`Action`]s and [`HeldKeys`].
//! - Actions are delivered in the order they were pushed.

pub mod action;
pub mod state;

pub use action::{Action, ActionQueue};
pub use state::{HeldKeys, InputState};

pub fn crate_info() -> &'static str {
    "crawl-input v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("input"));
    }
}
