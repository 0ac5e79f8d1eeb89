use img_parts::Bytes;
use img_parts::png::{Png, PngChunk};

/// Largest payload (terminator included) a single XP* tag may carry.
pub const FIXED_WIDTH_LIMIT: usize = 65534;

/// Language tag written into every iTXt chunk.
const ITXT_LANGUAGE: &str = "zh";

const CHUNK_IDAT: [u8; 4] = *b"IDAT";
const CHUNK_ITXT: [u8; 4] = *b"iTXt";
const CHUNK_TEXT: [u8; 4] = *b"tEXt";

/// Encode a string as NUL-terminated UTF-16LE bytes (used for XP* tags).
///
/// Empty input yields an empty vector. Values longer than
/// [`FIXED_WIDTH_LIMIT`] bytes are cut back to the last whole code point that
/// still leaves room for the terminator, and a warning is logged.
pub fn encode_fixed_width(text: &str) -> Vec<u8> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut units: Vec<u16> = text.encode_utf16().collect();
    let max_units = FIXED_WIDTH_LIMIT / 2 - 1;

    if units.len() > max_units {
        let preview: String = text.chars().take(20).collect();
        log::warn!("Field too long, truncated: {preview}…");
        units.truncate(max_units);
        // Never leave a dangling high surrogate behind
        if units.last().is_some_and(|u| (0xD800..0xDC00).contains(u)) {
            units.pop();
        }
    }

    let mut bytes: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
    // Null terminator
    bytes.push(0);
    bytes.push(0);
    bytes
}

/// Attach a `key`/`value` text chunk to a PNG.
///
/// With `international` set the value goes into an uncompressed iTXt chunk as
/// UTF-8. Otherwise a Latin-1 tEXt chunk is written instead and a warning is
/// logged, since anything outside Latin-1 is replaced by `?`.
pub fn attach_international_text(png: &mut Png, key: &str, value: &str, international: bool) {
    let chunk = if international {
        PngChunk::new(CHUNK_ITXT, Bytes::from(itxt_contents(key, value)))
    } else {
        log::warn!("iTXt not supported, field '{key}' may not render correctly");
        PngChunk::new(CHUNK_TEXT, Bytes::from(text_contents(key, value)))
    };

    let chunks = png.chunks_mut();
    let pos = chunks
        .iter()
        .position(|c| c.kind() == CHUNK_IDAT)
        .unwrap_or(chunks.len().saturating_sub(1));
    chunks.insert(pos, chunk);
}

/// iTXt layout: keyword NUL, compression flag, compression method,
/// language tag NUL, translated keyword NUL, UTF-8 text.
fn itxt_contents(key: &str, value: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(key.len() + ITXT_LANGUAGE.len() + value.len() + 5);
    data.extend_from_slice(key.as_bytes());
    data.push(0);
    data.push(0); // uncompressed
    data.push(0);
    data.extend_from_slice(ITXT_LANGUAGE.as_bytes());
    data.push(0);
    data.push(0); // no translated keyword
    data.extend_from_slice(value.as_bytes());
    data
}

fn text_contents(key: &str, value: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(key.len() + value.len() + 1);
    data.extend_from_slice(key.as_bytes());
    data.push(0);
    data.extend(value.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')));
    data
}
