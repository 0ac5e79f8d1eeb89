use anyhow::{Context, Result, anyhow};
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::{Bytes, ImageEXIF};
use little_exif::endian::Endian;
use little_exif::exif_tag::{ExifTag, ExifTagGroup};
use little_exif::exif_tag_format::ExifTagFormat;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::fs::Permissions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::backend::{BackendError, Container, DecodedImage, ExifContainer, ImageBackend};
use super::text::{attach_international_text, encode_fixed_width};
use super::tiff::{self, RawIfdEntry};
use crate::config::{MetadataRecord, RunOptions};

// EXIF tag IDs for tags not natively supported by little_exif
const TAG_XP_TITLE: u16 = 0x9C9B;
const TAG_XP_COMMENT: u16 = 0x9C9C;
const TAG_XP_AUTHOR: u16 = 0x9C9D;
const TAG_XP_KEYWORDS: u16 = 0x9C9E;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

/// Directory created next to the source when no output directory is given.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

const EXIF_KEYWORD_SEPARATOR: &str = ";";
const PNG_KEYWORD_SEPARATOR: &str = ", ";

/// Why a single file could not be written. Never fatal to the batch.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("file does not exist")]
    MissingInput,
    #[error("unrecognized image")]
    UnrecognizedFormat,
    #[error("processing error: {0}")]
    Save(String),
    #[error("overwrite failed: {0}")]
    Overwrite(String),
    #[error("worker aborted: {0}")]
    Aborted(String),
}

/// Writes a [`MetadataRecord`] into image files, one call per file.
///
/// The backend's international-text capability is queried once, when the
/// writer is built, and reused for every PNG it touches.
#[derive(Clone)]
pub struct FormatWriter {
    backend: Arc<dyn ImageBackend>,
    international_text: bool,
}

impl FormatWriter {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        let international_text = backend.supports_international_text();
        if !international_text {
            log::warn!(
                "{} cannot write iTXt chunks; PNG text falls back to tEXt",
                backend.name()
            );
        }
        Self { backend, international_text }
    }

    /// Decode `source`, stamp `record` into it and save the result.
    ///
    /// Returns the final path: `<output dir>/<file name>`, or `source` itself
    /// when `options.overwrite` is set. Nothing is ever left half-written at
    /// the destination.
    pub fn write(
        &self,
        source: &Path,
        record: &MetadataRecord,
        options: &RunOptions,
    ) -> Result<PathBuf, TaskError> {
        if !source.exists() {
            return Err(TaskError::MissingInput);
        }

        let image = self.backend.decode(source).map_err(|e| match e {
            BackendError::Unrecognized => TaskError::UnrecognizedFormat,
            other => TaskError::Save(other.to_string()),
        })?;

        let dst = output_path(source, options.output_dir.as_deref())
            .ok_or_else(|| TaskError::Save(format!("{} has no file name", source.display())))?;
        let permissions = std::fs::metadata(source)
            .map_err(|e| TaskError::Save(format!("Failed to stat {}: {e}", source.display())))?
            .permissions();

        let bytes = self
            .encode_with_metadata(&image, record)
            .map_err(|e| TaskError::Save(format!("{e:#}")))?;
        save_atomically(&dst, &bytes, permissions)
            .map_err(|e| TaskError::Save(format!("{e:#}")))?;

        if options.overwrite {
            std::fs::rename(&dst, source).map_err(|e| TaskError::Overwrite(e.to_string()))?;
            return Ok(source.to_path_buf());
        }

        Ok(dst)
    }

    fn encode_with_metadata(&self, image: &DecodedImage, record: &MetadataRecord) -> Result<Vec<u8>> {
        let encoded = self.backend.encode(image)?;

        match image.container() {
            Container::Exif(ExifContainer::Jpeg) => {
                let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded))
                    .map_err(|e| anyhow!("Failed to parse JPEG: {e}"))?;
                jpeg.set_exif(Some(Bytes::from(build_exif_block(record)?)));
                Ok(jpeg.encoder().bytes().to_vec())
            }
            Container::Exif(ExifContainer::Tiff) => {
                let entries = xp_fields(record)
                    .into_iter()
                    .map(|(tag_id, value)| (tag_id, encode_fixed_width(&value)))
                    .filter(|(_, raw)| !raw.is_empty())
                    .map(|(tag_id, raw)| RawIfdEntry::bytes(tag_id, raw))
                    .collect::<Result<Vec<_>>>()?;
                tiff::merge_into_ifd0(&encoded, &entries)
            }
            Container::Png => {
                let mut png = Png::from_bytes(Bytes::from(encoded))
                    .map_err(|e| anyhow!("Failed to parse PNG: {e}"))?;
                for (key, value) in png_text_fields(record) {
                    attach_international_text(&mut png, key, &value, self.international_text);
                }
                Ok(png.encoder().bytes().to_vec())
            }
            Container::Other(format) => {
                log::debug!("No metadata writer for {format:?}, saving unchanged");
                Ok(encoded)
            }
        }
    }
}

/// The four XP* tags and their values, keywords joined with `;`.
fn xp_fields(record: &MetadataRecord) -> [(u16, String); 4] {
    [
        (TAG_XP_TITLE, record.title().to_string()),
        (TAG_XP_COMMENT, record.description().to_string()),
        (TAG_XP_AUTHOR, record.author().to_string()),
        (TAG_XP_KEYWORDS, record.keywords().join(EXIF_KEYWORD_SEPARATOR)),
    ]
}

fn png_text_fields(record: &MetadataRecord) -> [(&'static str, String); 5] {
    [
        ("Title", record.title().to_string()),
        ("Description", record.description().to_string()),
        ("Author", record.author().to_string()),
        ("Copyright", record.copyright().to_string()),
        ("Keywords", record.keywords().join(PNG_KEYWORD_SEPARATOR)),
    ]
}

/// Create an XP* tag (UTF-16LE encoded, IFD0 group).
fn make_xp_tag(tag_id: u16, value: &str) -> Result<Option<ExifTag>> {
    let raw_data = encode_fixed_width(value);
    if raw_data.is_empty() {
        return Ok(None);
    }
    ExifTag::from_u16_with_data(
        tag_id,
        &ExifTagFormat::INT8U,
        &raw_data,
        &Endian::Little,
        &ExifTagGroup::IFD0,
    )
    .ok()
    .map(Some)
    .with_context(|| format!("Failed to build XP tag {tag_id:#06x}"))
}

/// Serialize the JPEG EXIF payload (TIFF data, without the `Exif\0\0` prefix)
/// for `record`. Identical records give identical bytes.
pub fn build_exif_block(record: &MetadataRecord) -> Result<Vec<u8>> {
    let mut metadata = Metadata::new();
    for (tag_id, value) in xp_fields(record) {
        if let Some(tag) = make_xp_tag(tag_id, &value)? {
            metadata.set_tag(tag);
        }
    }

    let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
    if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
        anyhow::bail!("little_exif produced an empty EXIF segment");
    }
    Ok(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())
}

/// `<output_dir or source_dir/output>/<source file name>`.
pub fn output_path(source: &Path, output_dir: Option<&Path>) -> Option<PathBuf> {
    let name = source.file_name()?;
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => source.parent().unwrap_or(Path::new("")).join(DEFAULT_OUTPUT_DIR),
    };
    Some(dir.join(name))
}

/// Write `bytes` to a temp file next to `dst` and rename it into place.
///
/// The file gets `permissions` (the source's) instead of the owner-only
/// mode temp files are created with.
fn save_atomically(dst: &Path, bytes: &[u8], permissions: Permissions) -> Result<()> {
    let dir = dst
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".seo-meta-")
        .suffix(".part")
        .tempfile_in(dir)
        .context("Failed to create temporary file")?;
    tmp.write_all(bytes).context("Failed to write image data")?;
    tmp.as_file()
        .set_permissions(permissions)
        .context("Failed to set output permissions")?;
    tmp.as_file().sync_all().context("Failed to flush image data")?;
    tmp.persist(dst)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move image into {}", dst.display()))?;

    Ok(())
}
