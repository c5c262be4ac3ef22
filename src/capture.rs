// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Selfie Capture
//!
//! Scoped acquisition of the front-facing camera and conversion of one
//! captured frame into a submittable JPEG.
//!
//! ## Resource Model
//!
//! - At most one [`CaptureSession`] is open per controller
//! - A session releases its stream on `stop`, on `capture`, and on drop
//! - `stop` with nothing open is a no-op
//!
//! The camera itself sits behind the [`CameraDevice`] port so the wizard can
//! run against real hardware, a still image ([`StillImageCamera`]) or a fake.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, RgbImage};
use tracing::{debug, info, warn};

use crate::models::SelfieImage;

/// Notice shown when the camera cannot be opened.
pub const CAMERA_UNAVAILABLE_NOTICE: &str = "Unable to access camera. Please check permissions.";

/// Requested camera orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device found")]
    NotFound,

    #[error("camera unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read camera frame: {0}")]
    Frame(String),
}

impl DeviceError {
    pub fn user_message(&self) -> &'static str {
        CAMERA_UNAVAILABLE_NOTICE
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("no camera session is active")]
    NoActiveSession,

    #[error("failed to encode captured frame: {0}")]
    Encode(String),
}

/// A raw RGB8 video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB8, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

/// An open video stream.
pub trait VideoStream: Send {
    fn read_frame(&mut self) -> Result<Frame, DeviceError>;

    /// Release the underlying hardware. Called exactly once per stream.
    fn stop(&mut self);
}

/// Source of video streams.
pub trait CameraDevice: Send {
    type Stream: VideoStream;

    fn open(&mut self, facing: FacingMode) -> Result<Self::Stream, DeviceError>;
}

// =============================================================================
// Capture Session
// =============================================================================

/// Owns an open stream; releases it on every exit path.
pub struct CaptureSession<S: VideoStream> {
    stream: Option<S>,
}

impl<S: VideoStream> CaptureSession<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::NoActiveSession)?;
        Ok(stream.read_frame()?)
    }

    /// Idempotent.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("Camera stream released");
        }
    }
}

impl<S: VideoStream> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// Capture Controller
// =============================================================================

/// Drives the selfie step: open, preview, capture, retake.
pub struct CaptureController<D: CameraDevice> {
    device: D,
    session: Option<CaptureSession<D::Stream>>,
    preview: Option<SelfieImage>,
}

impl<D: CameraDevice> CaptureController<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            session: None,
            preview: None,
        }
    }

    /// Whether a live stream is open.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(CaptureSession::is_open)
    }

    /// Last captured selfie, if it has not been discarded.
    pub fn preview(&self) -> Option<&SelfieImage> {
        self.preview.as_ref()
    }

    /// Open the front camera.
    ///
    /// Any open stream is released first and any previous capture is
    /// discarded (retake). On failure no session is left open.
    pub fn start(&mut self) -> Result<(), DeviceError> {
        self.stop();
        if self.preview.take().is_some() {
            debug!("Discarded previous selfie for retake");
        }

        match self.device.open(FacingMode::User) {
            Ok(stream) => {
                self.session = Some(CaptureSession::new(stream));
                info!("Camera stream acquired");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Camera could not be opened");
                Err(e)
            }
        }
    }

    /// Release the stream if one is open. Safe to call at any time.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }

    /// Grab the current frame, encode it and close the stream.
    ///
    /// The stream is closed whether or not encoding succeeds.
    pub fn capture(&mut self) -> Result<SelfieImage, CaptureError> {
        let mut session = self.session.take().ok_or(CaptureError::NoActiveSession)?;
        let frame = session.read_frame();
        session.release();

        let jpeg = encode_jpeg(&frame?)?;
        let selfie = SelfieImage::from_data_url(jpeg_data_url(&jpeg));
        info!(bytes = jpeg.len(), "Selfie captured");

        self.preview = Some(selfie.clone());
        Ok(selfie)
    }

    /// Forget the captured selfie without touching the camera.
    pub fn discard_preview(&mut self) {
        self.preview = None;
    }
}

impl<D: CameraDevice> Drop for CaptureController<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Encode an RGB frame as JPEG.
pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, CaptureError> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()).ok_or_else(|| {
        CaptureError::Encode(format!(
            "frame buffer of {} bytes does not match {}x{}",
            frame.rgb.len(),
            frame.width,
            frame.height
        ))
    })?;

    let mut output = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut output, ImageFormat::Jpeg)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    Ok(output.into_inner())
}

pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

// =============================================================================
// Still Image Camera
// =============================================================================

/// A camera that streams a single image file.
///
/// Used by the demo binary and by kiosks without a webcam.
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct StillImageStream {
    frame: Frame,
}

impl CameraDevice for StillImageCamera {
    type Stream = StillImageStream;

    fn open(&mut self, _facing: FacingMode) -> Result<Self::Stream, DeviceError> {
        if !self.path.exists() {
            return Err(DeviceError::NotFound);
        }
        let image = image::open(&self.path)
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?
            .to_rgb8();
        let (width, height) = image.dimensions();

        Ok(StillImageStream {
            frame: Frame {
                width,
                height,
                rgb: image.into_raw(),
            },
        })
    }
}

impl VideoStream for StillImageStream {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {}
}
