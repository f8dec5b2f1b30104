pub mod device_enumerator;
pub mod frame_sink;
pub mod preference_store;
pub mod sensor;
pub mod uvc;
pub mod video_capturer;
