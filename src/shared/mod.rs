//! Shared state and messaging between the capture worker and the display
//!
//! This module provides thread-safe session state and the event types the
//! worker publishes for the consumer side.

pub mod messages;
pub mod state;

pub use messages::{FrameUpdate, WorkerEvent};
pub use state::{SessionState, SharedSessionState};
