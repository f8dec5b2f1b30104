pub mod config;
pub mod constraints;
pub mod device;
pub mod error;
pub mod frame;
pub mod session;
pub mod state;
pub mod zoom;
