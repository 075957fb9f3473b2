use std::{fmt, io::Cursor, sync::Arc};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::Tier;
use crate::error::{Error, Result};

/// A decoded thumbnail image.
///
/// Cloning is cheap: clones share the decoded pixels.
#[derive(Clone)]
pub struct Thumbnail {
    image: Arc<DynamicImage>,
}

impl Thumbnail {
    /// Edge length of the placeholder for unbounded tiers.
    const PLACEHOLDER_EDGE: u32 = 512;

    const PLACEHOLDER_COLOR: Rgb<u8> = Rgb([0x44, 0x44, 0x44]);

    const JPEG_QUALITY: u8 = 85;

    /// Decodes an encoded image (JPEG, PNG).
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is empty, cannot be decoded, or decodes to
    /// an image without pixels.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::invalid_argument("empty image payload"));
        }

        let image = image::load_from_memory(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::invalid_argument("image has no pixels"));
        }

        Ok(Self::from(image))
    }

    /// Returns this image shrunk to fit the tier's bound, keeping its aspect
    /// ratio. Images that already fit are shared, not copied.
    #[must_use]
    pub fn fitted(&self, tier: Tier) -> Self {
        match tier.bound() {
            Some(bound) if self.width() > bound || self.height() > bound => {
                Self::from(self.image.thumbnail(bound, bound))
            }
            _ => self.clone(),
        }
    }

    /// Encodes the image as JPEG for the disk tier.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, Self::JPEG_QUALITY);
        self.image.to_rgb8().write_with_encoder(encoder)?;
        Ok(buffer.into_inner())
    }

    /// Encodes the image in `format`, for exporting.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode_as(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(self.image.to_rgb8()).write_to(&mut buffer, format)?;
        Ok(buffer.into_inner())
    }

    /// The default image shown for thumbnails that are unavailable.
    #[must_use]
    pub fn placeholder(tier: Tier) -> Self {
        let edge = tier.bound().unwrap_or(Self::PLACEHOLDER_EDGE);
        let image = RgbImage::from_pixel(edge, edge, Self::PLACEHOLDER_COLOR);
        Self::from(DynamicImage::ImageRgb8(image))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Whether both thumbnails share the same decoded pixels.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl From<DynamicImage> for Thumbnail {
    fn from(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbnail({}x{})", self.width(), self.height())
    }
}
