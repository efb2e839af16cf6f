//! # Camera Server Interface
//!
//! The executive requests single frames from the camera server. Frames travel encoded (PNG or
//! JPEG) and are decoded on receipt into a [`CamImage`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use image::{DynamicImage, ImageResult};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Request to be sent by the camera client to the server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CamRequest {
    /// Format of the image to acquire
    pub format: ImageFormat,
}

/// An individual encoded frame from the camera
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CamFrame {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// The format of this frame
    pub format: ImageFormat,

    /// The encoded image data
    pub data: Vec<u8>,
}

/// A decoded frame
#[derive(Clone)]
pub struct CamImage {
    /// UTC timestamp at which the frame was acquired
    pub timestamp: DateTime<Utc>,

    /// The image itself
    pub image: DynamicImage,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Response to be sent by the server to the client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum CamResponse {
    /// The frame acquired in response to the request
    Frame(CamFrame),

    /// The camera could not produce a frame
    CameraError(String),
}

/// Possible formats for camera images. This is used rather than `image::ImageFormat` so that the
/// formats which can be sent are restricted, and so that the format can be serialised.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq)]
pub enum ImageFormat {
    /// PNG image
    Png,

    /// JPEG image with a quality value between 1 and 100, where 100 is best.
    Jpeg(u8),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamFrame {
    /// Decode this frame into a camera image
    pub fn to_cam_image(&self) -> ImageResult<CamImage> {
        let format = match self.format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg(_) => image::ImageFormat::Jpeg,
        };

        Ok(CamImage {
            timestamp: self.timestamp,
            image: image::load_from_memory_with_format(&self.data, format)?,
        })
    }
}

impl CamImage {
    /// Encode this camera image into a frame with the given format
    pub fn to_cam_frame(&self, format: ImageFormat) -> ImageResult<CamFrame> {
        let mut data = Vec::<u8>::new();

        let output_format = match format {
            ImageFormat::Png => image::ImageOutputFormat::Png,
            ImageFormat::Jpeg(q) => image::ImageOutputFormat::Jpeg(q),
        };

        self.image.write_to(&mut data, output_format)?;

        Ok(CamFrame {
            timestamp: self.timestamp,
            format,
            data,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_png_frame_is_lossless() {
        let mut img = RgbImage::new(8, 4);
        img.put_pixel(3, 2, Rgb([10, 200, 30]));

        let cam_image = CamImage {
            timestamp: Utc::now(),
            image: DynamicImage::ImageRgb8(img.clone()),
        };

        let frame = cam_image.to_cam_frame(ImageFormat::Png).unwrap();
        let decoded = frame.to_cam_image().unwrap();

        assert_eq!(decoded.image.to_rgb8(), img);
    }
}
