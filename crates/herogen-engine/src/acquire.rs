//! Producers of the wizard's source photo.
//!
//! Both producers answer the same question, "give me an encoded image or
//! fail", so the wizard never cares which one the user picked. `Ok(None)` means
//! the user backed out without choosing anything.

use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use herogen_contracts::image::{EncodedImage, ImageError};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ImageFormat, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use crate::camera::FfmpegCamera;

/// JPEG quality for captured frames.
pub const CAPTURE_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Unable to access camera. Please allow permissions. ({0})")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    Device(String),
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Unsupported(String),
    #[error("failed to encode captured frame: {0}")]
    Encode(String),
    #[error(transparent)]
    Payload(#[from] ImageError),
}

pub trait ImageSource {
    fn name(&self) -> &str;
    fn acquire(&mut self) -> Result<Option<EncodedImage>, AcquisitionError>;
}

pub struct FileSource {
    path: Option<PathBuf>,
}

impl FileSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Some(path.into()))
    }
}

impl ImageSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn acquire(&mut self) -> Result<Option<EncodedImage>, AcquisitionError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(None);
        };
        let bytes = fs::read(path).map_err(|source| AcquisitionError::Io {
            path: path.clone(),
            source,
        })?;
        let Some(mime) = sniff_image_mime(&bytes).or_else(|| mime_for_path(path)) else {
            return Err(AcquisitionError::Unsupported(format!(
                "{} is not a supported image",
                path.display()
            )));
        };
        info!(target: "acquire", path = %path.display(), mime, bytes = bytes.len(), "photo loaded");
        Ok(Some(EncodedImage::from_bytes(mime, &bytes)?))
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// A capture device that can be opened into a live frame stream.
pub trait CameraDevice {
    type Stream: FrameStream;

    fn describe(&self) -> String;
    fn open(&mut self) -> Result<Self::Stream, AcquisitionError>;
}

pub trait FrameStream {
    fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError>;
    /// Stops the device. Must be safe to call more than once.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAction {
    Continue,
    Capture,
    /// Release the device and open it again.
    Restart,
    Cancel,
}

/// Preview sink and shutter button for a live capture.
pub trait CaptureControl {
    fn preview(&mut self, frame: &RgbImage, frame_index: u64) -> CaptureAction;
}

impl<F> CaptureControl for F
where
    F: FnMut(&RgbImage, u64) -> CaptureAction,
{
    fn preview(&mut self, frame: &RgbImage, frame_index: u64) -> CaptureAction {
        self(frame, frame_index)
    }
}

/// Open device stream that is released on every exit path.
pub struct CameraSession<S: FrameStream> {
    stream: S,
}

impl<S: FrameStream> CameraSession<S> {
    pub fn open<D>(device: &mut D) -> Result<Self, AcquisitionError>
    where
        D: CameraDevice<Stream = S>,
    {
        let stream = device.open()?;
        debug!(target: "acquire", device = %device.describe(), "camera opened");
        Ok(Self { stream })
    }

    pub fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError> {
        self.stream.next_frame()
    }
}

impl<S: FrameStream> Drop for CameraSession<S> {
    fn drop(&mut self) {
        self.stream.release();
        debug!(target: "acquire", "camera released");
    }
}

pub struct CameraSource<D, C> {
    device: D,
    control: C,
}

impl<D, C> CameraSource<D, C>
where
    D: CameraDevice,
    C: CaptureControl,
{
    pub fn new(device: D, control: C) -> Self {
        Self { device, control }
    }
}

impl<D, C> ImageSource for CameraSource<D, C>
where
    D: CameraDevice,
    C: CaptureControl,
{
    fn name(&self) -> &str {
        "camera"
    }

    fn acquire(&mut self) -> Result<Option<EncodedImage>, AcquisitionError> {
        'session: loop {
            let mut session = CameraSession::open(&mut self.device).map_err(|err| {
                warn!(target: "acquire", error = %err, "camera open failed");
                err
            })?;
            let mut frame_index = 0u64;
            loop {
                let frame = session.next_frame()?;
                match self.control.preview(&frame, frame_index) {
                    CaptureAction::Continue => frame_index += 1,
                    CaptureAction::Capture => {
                        drop(session);
                        let image = encode_capture(frame)?;
                        info!(target: "acquire", frames = frame_index + 1, "photo captured");
                        return Ok(Some(image));
                    }
                    CaptureAction::Restart => continue 'session,
                    CaptureAction::Cancel => return Ok(None),
                }
            }
        }
    }
}

/// Mirrors a front-camera frame and encodes it as JPEG.
pub fn encode_capture(frame: RgbImage) -> Result<EncodedImage, AcquisitionError> {
    let mirrored = imageops::flip_horizontal(&frame);
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, CAPTURE_JPEG_QUALITY)
        .encode_image(&mirrored)
        .map_err(|err| AcquisitionError::Encode(err.to_string()))?;
    Ok(EncodedImage::from_bytes("image/jpeg", buffer.get_ref())?)
}

pub(crate) fn classify_open_error(device: &str, err: std::io::Error) -> AcquisitionError {
    if err.kind() == ErrorKind::PermissionDenied {
        AcquisitionError::PermissionDenied(format!("{device}: {err}"))
    } else {
        AcquisitionError::Device(format!("{device}: {err}"))
    }
}
