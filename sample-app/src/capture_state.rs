use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use video_capture_core::{FrameSink, SessionInfo, VideoFrame};

/// FrameSink that logs capture events and keeps counters for the report.
pub struct LoggingSink {
    stats: Mutex<SinkStats>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkStats {
    pub started: Option<bool>,
    pub frames: u64,
    pub last_frame_size: Option<(u32, u32)>,
    pub stopped: bool,
}

impl LoggingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stats: Mutex::new(SinkStats::default()),
        })
    }

    pub fn stats(&self) -> SinkStats {
        self.stats.lock().clone()
    }
}

impl FrameSink for LoggingSink {
    fn on_capture_started(&self, success: bool) {
        log::info!("Capture started: {}", success);
        self.stats.lock().started = Some(success);
    }

    fn on_frame_captured(&self, frame: &VideoFrame) {
        let mut stats = self.stats.lock();
        stats.frames += 1;
        stats.last_frame_size = Some((frame.buffer.width, frame.buffer.height));
        log::debug!(
            "Frame {} ({}x{}, {} bytes)",
            stats.frames,
            frame.buffer.width,
            frame.buffer.height,
            frame.buffer.data.len()
        );
    }

    fn on_capture_stopped(&self) {
        log::info!("Capture stopped");
        self.stats.lock().stopped = true;
    }
}

// -- Report --

/// What the demo run did, printed as JSON at the end.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoReport {
    pub session: Option<SessionInfo>,
    pub zoom_in: bool,
    pub zoom_out: bool,
    pub switched_to_front: Option<bool>,
    pub sink: SinkStats,
}
