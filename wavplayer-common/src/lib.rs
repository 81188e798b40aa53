//! # WavPlayer Common Library
//!
//! Shared code for the player and anything that talks to it:
//! - Error type
//! - Status snapshot wire types
//! - Configuration file discovery and loading
//! - Time and position formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod time;

pub use error::{Error, Result};
pub use events::{PlayerStatus, StatusSnapshot};
