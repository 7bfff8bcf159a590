//! Webcam capture through `OpenCV`, JPEG-encoded for streaming.

use std::sync::Arc;

use bytes::Bytes;
use opencv::{
    core::{Mat, Vector},
    imgcodecs,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::client::frame_source::{FramePacer, FrameSource, ResourceError};
use crate::log::LogSink;
use crate::{sink_info, sink_warn};

impl From<opencv::Error> for ResourceError {
    fn from(err: opencv::Error) -> Self {
        ResourceError::CaptureFailed(err.to_string())
    }
}

/// One camera device. Released on `release` or drop, whichever comes first.
pub struct CameraSource {
    cam: Option<VideoCapture>,
    encode_params: Vector<i32>,
    pacer: FramePacer,
    log: Arc<dyn LogSink>,
}

impl CameraSource {
    /// Open device `index`, capturing at most `fps` frames per second and
    /// encoding them at `jpeg_quality` (0-100).
    pub fn open(
        index: u32,
        fps: u32,
        jpeg_quality: u8,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ResourceError> {
        let device = i32::try_from(index)
            .map_err(|_| ResourceError::Unavailable(format!("invalid camera index {index}")))?;
        let cam = VideoCapture::new(device, videoio::CAP_ANY)
            .map_err(|e| ResourceError::Unavailable(e.to_string()))?;

        if !cam.is_opened().unwrap_or(false) {
            return Err(ResourceError::Unavailable(format!(
                "camera {index} could not be opened"
            )));
        }

        let quality = i32::from(jpeg_quality.min(100));
        sink_info!(log, "camera {} opened (jpeg quality {})", index, quality);

        Ok(Self {
            cam: Some(cam),
            encode_params: Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality]),
            pacer: FramePacer::new(fps),
            log,
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Bytes, ResourceError> {
        self.pacer.wait();
        let cam = self.cam.as_mut().ok_or(ResourceError::Released)?;

        let mut frame = Mat::default();
        if !cam.read(&mut frame)? || frame.empty() {
            return Err(ResourceError::CaptureFailed("camera returned no frame".into()));
        }

        let mut jpeg = Vector::<u8>::new();
        if !imgcodecs::imencode(".jpg", &frame, &mut jpeg, &self.encode_params)? {
            return Err(ResourceError::CaptureFailed("JPEG encoding failed".into()));
        }
        Ok(Bytes::from(jpeg.to_vec()))
    }

    fn release(&mut self) {
        if let Some(mut cam) = self.cam.take()
            && let Err(e) = cam.release()
        {
            sink_warn!(self.log, "camera release failed: {}", e);
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
