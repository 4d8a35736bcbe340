use std::fs::File;
use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use image::RgbImage;
use tracing::debug;

use crate::acquire::{classify_open_error, AcquisitionError, CameraDevice, FrameStream};

pub const IDEAL_WIDTH: u32 = 1280;
pub const IDEAL_HEIGHT: u32 = 720;
/// How much of ffmpeg's stderr is kept for error reporting.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBackend {
    V4l2,
    AvFoundation,
    DirectShow,
}

impl CaptureBackend {
    pub fn native() -> Self {
        if cfg!(target_os = "macos") {
            CaptureBackend::AvFoundation
        } else if cfg!(target_os = "windows") {
            CaptureBackend::DirectShow
        } else {
            CaptureBackend::V4l2
        }
    }

    fn ffmpeg_format(self) -> &'static str {
        match self {
            CaptureBackend::V4l2 => "v4l2",
            CaptureBackend::AvFoundation => "avfoundation",
            CaptureBackend::DirectShow => "dshow",
        }
    }

    fn default_device(self) -> &'static str {
        match self {
            CaptureBackend::V4l2 => "/dev/video0",
            CaptureBackend::AvFoundation => "0",
            CaptureBackend::DirectShow => "video=Integrated Camera",
        }
    }
}

/// Webcam read through the system `ffmpeg` binary as a raw RGB stream.
#[derive(Debug, Clone)]
pub struct FfmpegCamera {
    backend: CaptureBackend,
    device: String,
    width: u32,
    height: u32,
}

impl FfmpegCamera {
    pub fn new(device: Option<&str>) -> Self {
        let backend = CaptureBackend::native();
        let device = device
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(backend.default_device())
            .to_string();
        Self {
            backend,
            device,
            width: IDEAL_WIDTH,
            height: IDEAL_HEIGHT,
        }
    }

    fn capture_args(&self) -> Vec<String> {
        let size = format!("{}x{}", self.width, self.height);
        vec![
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            self.backend.ffmpeg_format().to_string(),
            "-video_size".to_string(),
            size,
            "-i".to_string(),
            self.device.clone(),
            "-vf".to_string(),
            format!("scale={}:{}", self.width, self.height),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "pipe:1".to_string(),
        ]
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

impl CameraDevice for FfmpegCamera {
    type Stream = FfmpegStream;

    fn describe(&self) -> String {
        format!("{}:{}", self.backend.ffmpeg_format(), self.device)
    }

    fn open(&mut self) -> Result<FfmpegStream, AcquisitionError> {
        if self.backend == CaptureBackend::V4l2 {
            File::open(&self.device).map_err(|err| classify_open_error(&self.device, err))?;
        }
        if !is_ffmpeg_on_path() {
            return Err(AcquisitionError::Device(
                "ffmpeg is required for camera capture, but was not found on PATH".to_string(),
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(self.capture_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| AcquisitionError::Device(format!("failed to spawn ffmpeg: {err}")))?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AcquisitionError::Device(
                "failed to open ffmpeg stdout".to_string(),
            ));
        };
        let stderr = child.stderr.take().map(drain_tail);
        debug!(target: "camera", device = %self.describe(), "capture process started");

        Ok(FfmpegStream {
            frame: vec![0u8; self.width as usize * self.height as usize * 3],
            width: self.width,
            height: self.height,
            child,
            stdout,
            stderr,
            released: false,
        })
    }
}

pub struct FfmpegStream {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    frame: Vec<u8>,
    width: u32,
    height: u32,
    released: bool,
}

impl FfmpegStream {
    fn stream_error(&mut self, err: std::io::Error) -> AcquisitionError {
        // The drain thread finishes once the child is gone.
        self.release();
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let detail = stderr.trim();
        if detail.contains("Permission denied") {
            return AcquisitionError::PermissionDenied(detail.to_string());
        }
        if detail.is_empty() {
            AcquisitionError::Device(format!("camera stream ended: {err}"))
        } else {
            AcquisitionError::Device(detail.to_string())
        }
    }
}

/// Reads a pipe to the end on a helper thread so the writer never blocks on a
/// full buffer, keeping only the last [`STDERR_TAIL_BYTES`].
fn drain_tail<R>(mut pipe: R) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut tail = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => {
                    tail.extend_from_slice(&chunk[..read]);
                    if tail.len() > STDERR_TAIL_BYTES {
                        tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}

impl FrameStream for FfmpegStream {
    fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Device("camera already released".to_string()));
        }
        if let Err(err) = self.stdout.read_exact(&mut self.frame) {
            return Err(self.stream_error(err));
        }
        RgbImage::from_raw(self.width, self.height, self.frame.clone()).ok_or_else(|| {
            AcquisitionError::Device("captured frame has unexpected size".to_string())
        })
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.release();
    }
}
