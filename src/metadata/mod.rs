//! Metadata encoding and format-aware writing.
//!
//! - [`text`] — UTF-16LE XP* payloads and PNG text chunks
//! - [`backend`] — the image library seam ([`ImageBackend`], [`RustBackend`])
//! - [`FormatWriter`] — decode, stamp, save; one call per file
//!
//! The writer routes on the decoded [`Container`]: JPEG and TIFF get XPTitle,
//! XPComment, XPAuthor and XPKeywords in IFD0, PNG gets Title, Description,
//! Author, Copyright and Keywords as iTXt chunks, everything else is re-saved
//! untouched.

pub mod backend;
pub mod text;
mod tiff;
mod writer;

pub use backend::{BackendError, Container, DecodedImage, ExifContainer, ImageBackend, RustBackend};
pub use text::{FIXED_WIDTH_LIMIT, attach_international_text, encode_fixed_width};
pub use writer::{DEFAULT_OUTPUT_DIR, FormatWriter, TaskError, build_exif_block, output_path};
