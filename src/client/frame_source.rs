use std::fmt;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

/// Capture side unavailable or failing. Ends the send loop, nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The device or image could not be opened.
    Unavailable(String),
    /// A frame could not be captured or encoded.
    CaptureFailed(String),
    /// `next_frame` after `release`.
    Released,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "capture source unavailable: {msg}"),
            Self::CaptureFailed(msg) => write!(f, "failed to capture frame: {msg}"),
            Self::Released => write!(f, "capture source already released"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Produces encoded pictures for the send loop.
///
/// `next_frame` may block; it is how sources pace the stream.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Bytes, ResourceError>;

    /// Give the capture device back. Called once when the send loop ends.
    fn release(&mut self) {}
}

/// Spaces calls `1 / fps` apart.
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl FramePacer {
    /// `fps` of zero is treated as one.
    #[must_use]
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            next_due: None,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the next slot. The first call returns at once.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if let Some(due) = self.next_due
            && due > now
        {
            thread::sleep(due - now);
        }
        // Falling behind resets the schedule instead of bursting to catch up.
        let base = self.next_due.map_or(now, |due| due.max(now));
        self.next_due = Some(base + self.interval);
    }
}

/// Sends the same picture over and over; used when no camera is available.
pub struct StillImageSource {
    image: Option<Bytes>,
    pacer: FramePacer,
}

impl StillImageSource {
    pub fn open(path: &Path, fps: u32) -> Result<Self, ResourceError> {
        let bytes = fs::read(path)
            .map_err(|e| ResourceError::Unavailable(format!("{}: {e}", path.display())))?;
        Ok(Self::from_bytes(bytes, fps))
    }

    pub fn from_bytes(image: impl Into<Bytes>, fps: u32) -> Self {
        Self {
            image: Some(image.into()),
            pacer: FramePacer::new(fps),
        }
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Bytes, ResourceError> {
        let image = self.image.clone().ok_or(ResourceError::Released)?;
        self.pacer.wait();
        Ok(image)
    }

    fn release(&mut self) {
        self.image = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_image_repeats_until_released() {
        let mut src = StillImageSource::from_bytes(vec![0xff, 0xd8, 0xff], 1000);
        assert_eq!(src.next_frame().as_deref(), Ok(&[0xff, 0xd8, 0xff][..]));
        assert_eq!(src.next_frame().as_deref(), Ok(&[0xff, 0xd8, 0xff][..]));
        src.release();
        assert_eq!(src.next_frame(), Err(ResourceError::Released));
    }

    #[test]
    fn pacer_spaces_frames() {
        let mut pacer = FramePacer::new(50);
        assert_eq!(pacer.interval(), Duration::from_millis(20));
        let start = Instant::now();
        for _ in 0..4 {
            pacer.wait();
        }
        // First call is free, the next three wait one interval each.
        assert!(start.elapsed() >= Duration::from_millis(55));
    }

    #[test]
    fn zero_fps_does_not_divide_by_zero() {
        assert_eq!(FramePacer::new(0).interval(), Duration::from_secs(1));
    }

    #[test]
    fn missing_image_is_unavailable() {
        let err = StillImageSource::open(Path::new("/no/such/picture.jpg"), 15)
            .err()
            .map(|e| matches!(e, ResourceError::Unavailable(_)));
        assert_eq!(err, Some(true));
    }
}
