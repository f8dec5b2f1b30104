//! Capture sessions: source selection, lifecycle, zoom routing, and the
//! process-wide active-instance slot.

pub mod commands;
pub mod controller;
pub mod registry;
pub mod selector;
pub mod zoom;

pub use commands::ZoomCommands;
pub use controller::{CaptureController, CaptureEnvironment};
pub use registry::ActiveInstanceRegistry;
pub use selector::{CaptureSourceSelector, Selection};
pub use zoom::{ZoomCoordinator, ZoomRoute};
