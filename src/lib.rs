//! Ground Traffic Library
//!
//! Scripted airport ground vehicles that can run headless or with a Bevy viewer.

pub mod simulation;

#[cfg(feature = "ui")]
pub mod ui;
