use anyhow::{Context, Result, bail};

const TYPE_BYTE: u16 = 1;

/// A raw IFD entry to merge into a TIFF, built in the file's endianness on write.
#[derive(Debug, Clone)]
pub struct RawIfdEntry {
    pub tag_id: u16,
    pub data_format: u16,
    pub count: u32,
    pub data: Vec<u8>,
}

impl RawIfdEntry {
    /// BYTE-typed entry. XP* tags carry their UTF-16LE payload this way.
    pub fn bytes(tag_id: u16, data: Vec<u8>) -> Result<Self> {
        let count = u32::try_from(data.len()).context("IFD entry too large")?;
        Ok(Self { tag_id, data_format: TYPE_BYTE, count, data })
    }
}

#[derive(Clone, Copy)]
struct ByteOrder {
    big_endian: bool,
}

impl ByteOrder {
    fn read_u16(self, data: &[u8], offset: usize) -> Result<u16> {
        let b: [u8; 2] = data
            .get(offset..offset + 2)
            .and_then(|s| s.try_into().ok())
            .context("TIFF read out of bounds")?;
        Ok(if self.big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    }

    fn read_u32(self, data: &[u8], offset: usize) -> Result<u32> {
        let b: [u8; 4] = data
            .get(offset..offset + 4)
            .and_then(|s| s.try_into().ok())
            .context("TIFF read out of bounds")?;
        Ok(if self.big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    }

    fn u16(self, val: u16) -> [u8; 2] {
        if self.big_endian { val.to_be_bytes() } else { val.to_le_bytes() }
    }

    fn u32(self, val: u32) -> [u8; 4] {
        if self.big_endian { val.to_be_bytes() } else { val.to_le_bytes() }
    }
}

/// Merge `entries` into IFD0 of a complete TIFF stream.
///
/// Entries with the same tag replace the original ones. The rebuilt IFD0 and
/// any out-of-line values are appended, then the header is pointed at the new
/// IFD; every original offset stays valid because nothing before the old end
/// of file moves.
pub fn merge_into_ifd0(original: &[u8], entries: &[RawIfdEntry]) -> Result<Vec<u8>> {
    if original.len() < 8 {
        bail!("TIFF data too short");
    }

    let order = match &original[0..2] {
        b"MM" => ByteOrder { big_endian: true },
        b"II" => ByteOrder { big_endian: false },
        _ => bail!("Invalid TIFF byte order"),
    };
    if order.read_u16(original, 2)? != 42 {
        bail!("Not a classic TIFF stream");
    }

    // Parse IFD0
    let ifd0_offset = order.read_u32(original, 4)? as usize;
    let ifd0_count = order.read_u16(original, ifd0_offset)? as usize;
    let ifd0_start = ifd0_offset + 2;
    let ifd0_end = ifd0_start + ifd0_count * 12;
    let ifd0_next = order.read_u32(original, ifd0_end)?;

    let mut merged: Vec<(u16, [u8; 12])> = Vec::with_capacity(ifd0_count + entries.len());
    for i in 0..ifd0_count {
        let eo = ifd0_start + i * 12;
        let tag = order.read_u16(original, eo)?;
        if entries.iter().any(|e| e.tag_id == tag) {
            continue;
        }
        let mut raw = [0u8; 12];
        raw.copy_from_slice(&original[eo..eo + 12]);
        merged.push((tag, raw));
    }

    let mut result = original.to_vec();
    pad_to_word(&mut result);

    // Append data blobs and build entries
    for entry in entries {
        let mut ib = [0u8; 12];
        ib[0..2].copy_from_slice(&order.u16(entry.tag_id));
        ib[2..4].copy_from_slice(&order.u16(entry.data_format));
        ib[4..8].copy_from_slice(&order.u32(entry.count));
        if entry.data.len() <= 4 {
            ib[8..8 + entry.data.len()].copy_from_slice(&entry.data);
        } else {
            let offset = offset_of(&result)?;
            ib[8..12].copy_from_slice(&order.u32(offset));
            result.extend_from_slice(&entry.data);
            pad_to_word(&mut result);
        }
        merged.push((entry.tag_id, ib));
    }

    // TIFF readers expect ascending tag order
    merged.sort_by_key(|(tag, _)| *tag);

    let new_ifd0_start = offset_of(&result)?;
    let total = u16::try_from(merged.len()).context("Too many IFD0 entries")?;
    result.extend_from_slice(&order.u16(total));
    for (_, raw) in &merged {
        result.extend_from_slice(raw);
    }
    result.extend_from_slice(&order.u32(ifd0_next));

    // Update TIFF header to point to new IFD0
    result[4..8].copy_from_slice(&order.u32(new_ifd0_start));

    Ok(result)
}

fn offset_of(data: &[u8]) -> Result<u32> {
    u32::try_from(data.len()).context("TIFF exceeds 4 GiB")
}

fn pad_to_word(data: &mut Vec<u8>) {
    if data.len() % 2 != 0 {
        data.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little-endian TIFF header plus an IFD0 holding the given raw entries.
    fn tiff_with_entries(entries: &[(u16, u16, u32, [u8; 4])]) -> Vec<u8> {
        let mut data = b"II*\0".to_vec();
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (tag, fmt, count, value) in entries {
            data.extend_from_slice(&tag.to_le_bytes());
            data.extend_from_slice(&fmt.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
            data.extend_from_slice(value);
        }
        data.extend_from_slice(&0u32.to_le_bytes());
        data
    }

    fn ifd0_tags(data: &[u8]) -> Vec<u16> {
        let order = ByteOrder { big_endian: &data[0..2] == b"MM" };
        let offset = order.read_u32(data, 4).unwrap() as usize;
        let count = order.read_u16(data, offset).unwrap() as usize;
        (0..count)
            .map(|i| order.read_u16(data, offset + 2 + i * 12).unwrap())
            .collect()
    }

    #[test]
    fn appends_sorted_entries_and_keeps_originals() {
        let original = tiff_with_entries(&[
            (0x0100, 3, 1, [4, 0, 0, 0]),
            (0x0101, 3, 1, [4, 0, 0, 0]),
        ]);
        let xp = RawIfdEntry::bytes(0x9C9B, vec![b'T', 0, b'i', 0, 0, 0]).unwrap();
        let merged = merge_into_ifd0(&original, &[xp]).unwrap();

        assert_eq!(ifd0_tags(&merged), vec![0x0100, 0x0101, 0x9C9B]);
        // Original bytes are untouched apart from the header offset
        assert_eq!(&merged[8..original.len()], &original[8..]);
    }

    #[test]
    fn out_of_line_value_is_addressed_correctly() {
        let original = tiff_with_entries(&[(0x0100, 3, 1, [4, 0, 0, 0])]);
        let payload = vec![b'A', 0, b'B', 0, b'C', 0, 0, 0];
        let entry = RawIfdEntry::bytes(0x9C9D, payload.clone()).unwrap();
        let merged = merge_into_ifd0(&original, &[entry]).unwrap();

        let ifd = u32::from_le_bytes(merged[4..8].try_into().unwrap()) as usize;
        let second = ifd + 2 + 12;
        assert_eq!(u16::from_le_bytes([merged[second], merged[second + 1]]), 0x9C9D);
        let count = u32::from_le_bytes(merged[second + 4..second + 8].try_into().unwrap());
        let value_at = u32::from_le_bytes(merged[second + 8..second + 12].try_into().unwrap());
        assert_eq!(count as usize, payload.len());
        assert_eq!(value_at % 2, 0);
        assert_eq!(&merged[value_at as usize..value_at as usize + payload.len()], &payload[..]);
        assert_eq!(ifd % 2, 0);
    }

    #[test]
    fn replaces_existing_tag() {
        let original = tiff_with_entries(&[(0x9C9B, 1, 2, [b'x', 0, 0, 0])]);
        let entry = RawIfdEntry::bytes(0x9C9B, vec![b'y', 0]).unwrap();
        let merged = merge_into_ifd0(&original, &[entry]).unwrap();

        assert_eq!(ifd0_tags(&merged), vec![0x9C9B]);
        let ifd = u32::from_le_bytes(merged[4..8].try_into().unwrap()) as usize;
        assert_eq!(merged[ifd + 2 + 8], b'y');
    }

    #[test]
    fn big_endian_is_respected() {
        let mut original = b"MM\0*".to_vec();
        original.extend_from_slice(&8u32.to_be_bytes());
        original.extend_from_slice(&1u16.to_be_bytes());
        original.extend_from_slice(&0x0100u16.to_be_bytes());
        original.extend_from_slice(&3u16.to_be_bytes());
        original.extend_from_slice(&1u32.to_be_bytes());
        original.extend_from_slice(&[0, 4, 0, 0]);
        original.extend_from_slice(&0u32.to_be_bytes());

        let entry = RawIfdEntry::bytes(0x9C9E, vec![b'k', 0, 0, 0, b'w', 0]).unwrap();
        let merged = merge_into_ifd0(&original, &[entry]).unwrap();
        assert_eq!(ifd0_tags(&merged), vec![0x0100, 0x9C9E]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(merge_into_ifd0(b"nope", &[]).is_err());
        assert!(merge_into_ifd0(b"XX*\0\x08\0\0\0\0\0", &[]).is_err());
        // IFD0 offset beyond the end of the stream
        assert!(merge_into_ifd0(b"II*\0\xff\0\0\0", &[]).is_err());
    }
}
