//! Core dashboard domain logic.

pub mod dice;
pub mod dice_history;
pub mod logging;
