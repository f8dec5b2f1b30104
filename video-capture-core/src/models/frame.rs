use std::sync::OnceLock;
use std::time::Instant;

/// Planar 4:2:0 frame with an interleaved VU chroma plane (NV21).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nv21Buffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Nv21Buffer {
    /// Bytes needed for a `width x height` NV21 frame: `w * h * 3 / 2`.
    pub fn expected_len(width: u32, height: u32) -> usize {
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(3)
            / 2
    }

    /// Wrap `data` when it holds at least one full frame.
    ///
    /// Extra trailing bytes are dropped; short or zero-sized frames yield `None`.
    pub fn from_slice(data: &[u8], width: u32, height: u32) -> Option<Self> {
        let expected = Self::expected_len(width, height);
        if expected == 0 || data.len() < expected {
            return None;
        }
        Some(Self {
            data: data[..expected].to_vec(),
            width,
            height,
        })
    }
}

/// A captured frame handed to the frame sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub buffer: Nv21Buffer,
    /// Clockwise rotation in degrees needed to display the frame upright.
    pub rotation: u32,
    pub timestamp_nanos: u64,
}

/// Nanoseconds on a process-local monotonic clock.
pub fn monotonic_nanos() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_len_is_one_and_a_half_bytes_per_pixel() {
        assert_eq!(Nv21Buffer::expected_len(640, 480), 460_800);
        assert_eq!(Nv21Buffer::expected_len(0, 480), 0);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let data = vec![0u8; 100];
        assert!(Nv21Buffer::from_slice(&data, 10, 10).is_none());
        assert!(Nv21Buffer::from_slice(&data, 0, 0).is_none());
    }

    #[test]
    fn oversized_buffers_are_trimmed() {
        let data = vec![7u8; 200];
        let buffer = Nv21Buffer::from_slice(&data, 10, 10).unwrap();
        assert_eq!(buffer.data.len(), 150);
    }

    #[test]
    fn timestamps_are_monotonic() {
        let a = monotonic_nanos();
        let b = monotonic_nanos();
        assert!(b >= a);
    }
}
