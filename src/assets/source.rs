use std::fmt;
use std::sync::Arc;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{MontageError, MontageResult};

/// Decoded raster in row-major premultiplied RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, rgba8_premul: Vec<u8>) -> MontageResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| MontageError::resource("bitmap size overflow"))?;
        if rgba8_premul.len() != expected {
            return Err(MontageError::resource(format!(
                "bitmap expects {expected} bytes for {width}x{height}, got {}",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul,
        })
    }

    pub fn solid(width: u32, height: u32, color: Rgba8Premul) -> Self {
        let px = color.to_array();
        let mut rgba8_premul = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            rgba8_premul.extend_from_slice(&px);
        }
        Self {
            width,
            height,
            rgba8_premul,
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba8_premul[i],
            self.rgba8_premul[i + 1],
            self.rgba8_premul[i + 2],
            self.rgba8_premul[i + 3],
        ]
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Result of asking a source for a frame.
#[derive(Clone, Debug)]
pub enum ResourceFrame {
    Ready(Arc<Bitmap>),
    /// Not decoded yet; the clip is skipped for this frame.
    NotReady,
    /// The source cannot produce this frame.
    Invalid,
}

/// Decoded-media provider consumed by the render pipeline.
///
/// `size` is called during prepare and must not decode. `frame_at` runs on render threads and
/// may block.
pub trait MediaSource: Send + Sync + fmt::Debug {
    fn size(&self) -> Option<(u32, u32)>;

    fn frame_at(&self, timestamp_secs: f64) -> ResourceFrame;
}

/// A single decoded image, independent of time.
#[derive(Debug)]
pub struct StillImage {
    bitmap: Arc<Bitmap>,
}

impl StillImage {
    pub fn new(bitmap: Bitmap) -> Self {
        Self {
            bitmap: Arc::new(bitmap),
        }
    }
}

impl MediaSource for StillImage {
    fn size(&self) -> Option<(u32, u32)> {
        Some((self.bitmap.width, self.bitmap.height))
    }

    fn frame_at(&self, _timestamp_secs: f64) -> ResourceFrame {
        ResourceFrame::Ready(Arc::clone(&self.bitmap))
    }
}

/// Generated solid colour; frames before `ready_after_secs` report not ready.
#[derive(Debug)]
pub struct SolidSource {
    bitmap: Arc<Bitmap>,
    ready_after_secs: f64,
}

impl SolidSource {
    pub fn new(width: u32, height: u32, color: Rgba8Premul) -> Self {
        Self {
            bitmap: Arc::new(Bitmap::solid(width, height, color)),
            ready_after_secs: f64::NEG_INFINITY,
        }
    }

    pub fn ready_after(mut self, secs: f64) -> Self {
        self.ready_after_secs = secs;
        self
    }
}

impl MediaSource for SolidSource {
    fn size(&self) -> Option<(u32, u32)> {
        Some((self.bitmap.width, self.bitmap.height))
    }

    fn frame_at(&self, timestamp_secs: f64) -> ResourceFrame {
        if !timestamp_secs.is_finite() || timestamp_secs < 0.0 {
            return ResourceFrame::Invalid;
        }
        if timestamp_secs < self.ready_after_secs {
            return ResourceFrame::NotReady;
        }
        ResourceFrame::Ready(Arc::clone(&self.bitmap))
    }
}
