//! External-Device Bridge: the USB/UVC capture adapter.
//!
//! The UVC library is an optional runtime dependency. [`availability::is_supported`]
//! gates construction; once built, [`ExternalUsbAdapter`] owns one worker
//! loop per capture session and talks to the library only from there.

mod adapter;
mod callbacks;
pub mod availability;
mod shared;

pub use adapter::{ExternalUsbAdapter, UsbBackendFactory, UsbZoomHandle, EXTERNAL_USB_DEVICE_NAME};
pub use shared::HeadlessSurface;
