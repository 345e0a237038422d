//! GM Dashboard - Component Runtime and Dice Engine
//!
//! Core library behind the game master dashboard: the lifecycle runtime that
//! every dashboard component is built on, the dice engine, and the bridge to
//! the native backend.

pub mod bridge;
pub mod components;
pub mod config;
pub mod core;
pub mod runtime;


pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
