//! Draft editing ports and the controller that drives them.

#![forbid(unsafe_code)]

mod draft_controller;
mod draft_ports;
mod session;

pub use draft_controller::DraftController;
pub use draft_ports::DraftBackend;
pub use session::{EditingSession, SelectionState};
