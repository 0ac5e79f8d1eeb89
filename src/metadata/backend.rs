//! Image library abstraction used by the format writer.
//!
//! The [`ImageBackend`] trait covers the three things the writer needs from
//! an image library: decode a file (with the format sniffed from its
//! content), re-encode pixels in that same format, and report whether the
//! PNG path can emit international (iTXt) text chunks.
//!
//! The production implementation is [`RustBackend`], built on the `image`
//! crate.

use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("content is not a recognized image")]
    Unrecognized,
    #[error("{0}")]
    Codec(String),
}

/// Which metadata strategy a decoded image gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// EXIF-capable containers: XP* tags in IFD0
    Exif(ExifContainer),
    /// PNG: text chunks
    Png,
    /// Anything else the library can decode, re-saved without metadata
    Other(ImageFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifContainer {
    Jpeg,
    Tiff,
}

impl Container {
    /// Classify a decoded format. Never looks at file extensions.
    pub fn from_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Exif(ExifContainer::Jpeg),
            ImageFormat::Tiff => Self::Exif(ExifContainer::Tiff),
            ImageFormat::Png => Self::Png,
            other => Self::Other(other),
        }
    }
}

/// A decoded image together with the format it was stored in.
#[derive(Debug)]
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub format: ImageFormat,
}

impl DecodedImage {
    pub fn container(&self) -> Container {
        Container::from_format(self.format)
    }
}

/// Trait for image library backends.
pub trait ImageBackend: Send + Sync {
    /// The display name of this backend.
    fn name(&self) -> &str;

    /// Open and decode `path`, detecting the format from the file content.
    fn decode(&self, path: &Path) -> Result<DecodedImage, BackendError>;

    /// Re-encode `image` in its original format with no metadata attached.
    fn encode(&self, image: &DecodedImage) -> Result<Vec<u8>, BackendError>;

    /// Whether PNG text can be written as iTXt. Backends that return `false`
    /// get Latin-1 tEXt chunks instead.
    fn supports_international_text(&self) -> bool {
        false
    }
}

/// Pure Rust backend using the `image` crate.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn name(&self) -> &str {
        "image-rs"
    }

    fn decode(&self, path: &Path) -> Result<DecodedImage, BackendError> {
        // ImageReader::open would seed the format from the extension
        let file = BufReader::new(File::open(path)?);
        let reader = ImageReader::new(file).with_guessed_format()?;
        let format = reader.format().ok_or(BackendError::Unrecognized)?;

        let pixels = reader.decode().map_err(|e| match e {
            ImageError::Unsupported(_) => BackendError::Unrecognized,
            ImageError::IoError(io) => BackendError::Io(io),
            other => BackendError::Codec(format!("Failed to decode {}: {other}", path.display())),
        })?;

        Ok(DecodedImage { pixels, format })
    }

    fn encode(&self, image: &DecodedImage) -> Result<Vec<u8>, BackendError> {
        let mut buf = Cursor::new(Vec::new());
        image
            .pixels
            .write_to(&mut buf, image.format)
            .map_err(|e| BackendError::Codec(format!("Failed to encode {:?}: {e}", image.format)))?;
        Ok(buf.into_inner())
    }

    fn supports_international_text(&self) -> bool {
        // iTXt chunks are assembled by hand, so the codec version doesn't matter
        true
    }
}
