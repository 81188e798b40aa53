//! Session controller, status broadcaster and the service that hosts them

pub mod broadcaster;
pub mod service;
pub mod session_controller;

pub use broadcaster::StatusBroadcaster;
pub use service::{PlayerHandle, PlayerService};
pub use session_controller::{RequestOutcome, SessionController};
