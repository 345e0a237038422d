//! Feature components built on the component runtime.

pub mod dice_roller;

pub use dice_roller::{DiceRollerComponent, DICE_ROLLED_EVENT};
