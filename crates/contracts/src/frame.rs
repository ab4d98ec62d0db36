//! StereoFrame - camera ingestion output

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Stereo camera frame, opaque to the sync core.
///
/// Payloads are `Bytes` so handing a frame between stages never copies pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StereoFrame {
    /// Camera sequence number
    pub frame_id: u64,

    /// Hardware timestamp of the exposure (ns)
    pub timestamp: Timestamp,

    /// Left image
    pub left: ImageData,

    /// Right image
    pub right: ImageData,
}

/// Image data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Pixel format
    pub format: ImageFormat,

    /// Raw pixel data
    pub data: Bytes,
}

impl ImageData {
    /// Uniform grayscale image, used by mocks and tests.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        let size = width as usize * height as usize * ImageFormat::Gray8.bytes_per_pixel();
        Self {
            width,
            height,
            format: ImageFormat::Gray8,
            data: Bytes::from(vec![value; size]),
        }
    }
}

/// Image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Gray8,
    Gray16,
    Rgb8,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageFormat::Gray8 => 1,
            ImageFormat::Gray16 => 2,
            ImageFormat::Rgb8 => 3,
        }
    }
}

impl StereoFrame {
    /// Frame with empty images (tests, timing-only replays)
    pub fn empty(frame_id: u64, timestamp: Timestamp) -> Self {
        Self {
            frame_id,
            timestamp,
            left: ImageData::filled(0, 0, 0),
            right: ImageData::filled(0, 0, 0),
        }
    }
}
