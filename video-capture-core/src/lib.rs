//! # video-capture-core
//!
//! Camera source selection and cross-backend zoom control.
//!
//! Picks a capture source from caller constraints and a persisted USB
//! preference, drives it through one of three backends (legacy sensor API,
//! modern sensor API, external UVC camera via a runtime-loaded library), and
//! routes zoom requests to whichever backend is live. The platform pieces
//! (device enumeration, sensor sessions, the UVC library, the frame consumer)
//! are traits; `sim` provides in-process stand-ins.
//!
//! ## Architecture
//!
//! ```text
//! video-capture-core (this crate)
//! ├── traits/    ← VideoCapturer, DeviceEnumerator, FrameSink, PreferenceStore, sensor + UVC contracts
//! ├── models/    ← CaptureError, CaptureConstraints, SessionInfo, BridgeState, zoom math, config
//! ├── runtime/   ← WorkerLoop, bounded cross-thread dispatch
//! ├── backend/   ← BackendAdapter over the legacy and modern sensor adapters
//! ├── bridge/    ← ExternalUsbAdapter, library availability check, headless view
//! ├── session/   ← CaptureSourceSelector, CaptureController, ZoomCoordinator, registry
//! ├── storage/   ← preference stores (memory, JSON file)
//! └── sim/       ← simulated platform (feature `sim`)
//! ```

pub mod backend;
pub mod bridge;
pub mod models;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Re-export key types at crate root for convenience.
pub use backend::{BackendAdapter, LegacySensorAdapter, ModernSensorAdapter};
pub use bridge::{ExternalUsbAdapter, UsbBackendFactory, UsbZoomHandle, EXTERNAL_USB_DEVICE_NAME};
pub use models::config::{ControllerConfig, UsbBridgeConfig};
pub use models::constraints::{CaptureConstraints, FacingMode};
pub use models::device::{BackendKind, DeviceDescriptor, Facing, Resolution};
pub use models::error::{CaptureError, DispatchError, HelperError};
pub use models::frame::{Nv21Buffer, VideoFrame};
pub use models::session::SessionInfo;
pub use models::state::BridgeState;
pub use runtime::{WorkerHandle, WorkerLoop};
pub use session::{
    ActiveInstanceRegistry, CaptureController, CaptureEnvironment, CaptureSourceSelector, Selection,
    ZoomCommands, ZoomCoordinator, ZoomRoute,
};
pub use storage::{JsonFilePreferences, MemoryPreferences};
pub use traits::device_enumerator::DeviceEnumerator;
pub use traits::frame_sink::FrameSink;
pub use traits::preference_store::PreferenceStore;
pub use traits::uvc::{UvcHelper, UvcLibrary};
pub use traits::video_capturer::VideoCapturer;
