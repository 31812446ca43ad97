//! In-place EXIF pixel-dimension rewriting.
//!
//! After a crop, the `PixelXDimension`/`PixelYDimension` tags (0xa002 and
//! 0xa003) in the Exif sub-IFD no longer match the pixel data. This module
//! patches exactly those two values inside the raw TIFF-structured EXIF
//! block, leaving every other byte untouched so the rest of the metadata
//! passes through bit-identical.

use super::types::DecodeError;

// TIFF constants
const TIFF_MAGIC_LE: [u8; 4] = [0x49, 0x49, 0x2A, 0x00]; // II + 42
const TIFF_MAGIC_BE: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A]; // MM + 42

// TIFF tag IDs
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_PIXEL_X_DIMENSION: u16 = 0xa002;
const TAG_PIXEL_Y_DIMENSION: u16 = 0xa003;

// TIFF field types
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

/// Rewrite the EXIF pixel dimension tags to `width` x `height`.
///
/// Dimension tags that are absent stay absent; nothing is inserted. The
/// returned block differs from the input only in the patched value bytes.
///
/// # Errors
///
/// Returns `DecodeError::ExifError` when the block is not a parseable
/// TIFF structure.
pub fn update_exif_dimensions(
    exif: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, DecodeError> {
    if exif.len() < 8 {
        return Err(DecodeError::ExifError("EXIF block too short".to_string()));
    }

    let little_endian = if exif[..4] == TIFF_MAGIC_LE {
        true
    } else if exif[..4] == TIFF_MAGIC_BE {
        false
    } else {
        return Err(DecodeError::ExifError(
            "EXIF block has no TIFF header".to_string(),
        ));
    };

    let mut out = exif.to_vec();
    let ifd0_offset = read_u32(exif, 4, little_endian)? as usize;

    // Tags 0xa002/0xa003 live in the Exif sub-IFD pointed to by IFD0
    let exif_ifd_offset = find_tag_value(exif, ifd0_offset, TAG_EXIF_IFD, little_endian)?;
    let Some(exif_ifd_offset) = exif_ifd_offset else {
        // No Exif sub-IFD means no dimension tags to update
        return Ok(out);
    };

    patch_dimension(
        &mut out,
        exif_ifd_offset as usize,
        TAG_PIXEL_X_DIMENSION,
        width,
        little_endian,
    )?;
    patch_dimension(
        &mut out,
        exif_ifd_offset as usize,
        TAG_PIXEL_Y_DIMENSION,
        height,
        little_endian,
    )?;
    Ok(out)
}

/// Byte offset of the entry for `tag` within the IFD at `ifd_offset`.
fn find_entry_offset(
    buf: &[u8],
    ifd_offset: usize,
    tag: u16,
    little_endian: bool,
) -> Result<Option<usize>, DecodeError> {
    let entry_count = read_u16(buf, ifd_offset, little_endian)? as usize;
    if entry_count > 1000 {
        return Err(DecodeError::ExifError("Too many IFD entries".to_string()));
    }

    for i in 0..entry_count {
        let entry_offset = ifd_offset + 2 + i * 12;
        if read_u16(buf, entry_offset, little_endian)? == tag {
            return Ok(Some(entry_offset));
        }
    }
    Ok(None)
}

/// Inline LONG value of `tag` in the IFD at `ifd_offset`, if present.
fn find_tag_value(
    buf: &[u8],
    ifd_offset: usize,
    tag: u16,
    little_endian: bool,
) -> Result<Option<u32>, DecodeError> {
    match find_entry_offset(buf, ifd_offset, tag, little_endian)? {
        Some(entry_offset) => Ok(Some(read_u32(buf, entry_offset + 8, little_endian)?)),
        None => Ok(None),
    }
}

/// Overwrite the value of a SHORT or LONG dimension tag in place.
fn patch_dimension(
    buf: &mut [u8],
    ifd_offset: usize,
    tag: u16,
    value: u32,
    little_endian: bool,
) -> Result<(), DecodeError> {
    let Some(entry_offset) = find_entry_offset(buf, ifd_offset, tag, little_endian)? else {
        return Ok(());
    };

    let field_type = read_u16(buf, entry_offset + 2, little_endian)?;
    let count = read_u32(buf, entry_offset + 4, little_endian)?;
    if count != 1 {
        return Ok(());
    }

    let value_offset = entry_offset + 8;
    match field_type {
        TYPE_SHORT => {
            let v = value.min(u16::MAX as u32) as u16;
            let bytes = if little_endian {
                v.to_le_bytes()
            } else {
                v.to_be_bytes()
            };
            buf[value_offset..value_offset + 2].copy_from_slice(&bytes);
            // SHORT values are left-justified in the 4-byte field; the
            // remaining two bytes stay untouched
        }
        TYPE_LONG => {
            let bytes = if little_endian {
                value.to_le_bytes()
            } else {
                value.to_be_bytes()
            };
            buf[value_offset..value_offset + 4].copy_from_slice(&bytes);
        }
        _ => {}
    }
    Ok(())
}

fn read_u16(buf: &[u8], offset: usize, little_endian: bool) -> Result<u16, DecodeError> {
    let bytes: [u8; 2] = buf
        .get(offset..offset + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| DecodeError::ExifError("EXIF read past end of block".to_string()))?;
    Ok(if little_endian {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    })
}

fn read_u32(buf: &[u8], offset: usize, little_endian: bool) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| DecodeError::ExifError("EXIF read past end of block".to_string()))?;
    Ok(if little_endian {
        u32::from_le_bytes(bytes)
    } else {
        u32::from_be_bytes(bytes)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal little-endian EXIF block: IFD0 with an Exif sub-IFD
    /// pointer, and a sub-IFD holding LONG pixel dimensions.
    fn minimal_exif(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&TIFF_MAGIC_LE);
        buf.extend_from_slice(&8u32.to_le_bytes()); // IFD0 at offset 8

        // IFD0: one entry (ExifIFD pointer), then next-IFD = 0
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&TAG_EXIF_IFD.to_le_bytes());
        buf.extend_from_slice(&TYPE_LONG.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&26u32.to_le_bytes()); // sub-IFD offset
        buf.extend_from_slice(&0u32.to_le_bytes());

        // Exif sub-IFD at offset 26: two entries
        assert_eq!(buf.len(), 26);
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&TAG_PIXEL_X_DIMENSION.to_le_bytes());
        buf.extend_from_slice(&TYPE_LONG.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&width.to_le_bytes());
        buf.extend_from_slice(&TAG_PIXEL_Y_DIMENSION.to_le_bytes());
        buf.extend_from_slice(&TYPE_SHORT.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(height as u16).to_le_bytes());
        buf.extend_from_slice(&[0u8; 2]); // SHORT padding
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf
    }

    #[test]
    fn test_patches_both_dimensions() {
        let block = minimal_exif(6000, 4000);
        let updated = update_exif_dimensions(&block, 800, 600).unwrap();

        let x = read_u32(&updated, 26 + 2 + 8, true).unwrap();
        assert_eq!(x, 800);
        let y = read_u16(&updated, 26 + 2 + 12 + 8, true).unwrap();
        assert_eq!(y, 600);
    }

    #[test]
    fn test_only_dimension_bytes_change() {
        let block = minimal_exif(6000, 4000);
        let updated = update_exif_dimensions(&block, 800, 600).unwrap();
        assert_eq!(block.len(), updated.len());

        let x_value = 26 + 2 + 8;
        let y_value = 26 + 2 + 12 + 8;
        for (i, (a, b)) in block.iter().zip(updated.iter()).enumerate() {
            let in_patched_range =
                (x_value..x_value + 4).contains(&i) || (y_value..y_value + 2).contains(&i);
            if !in_patched_range {
                assert_eq!(a, b, "byte {i} changed unexpectedly");
            }
        }
    }

    #[test]
    fn test_missing_sub_ifd_is_passthrough() {
        // IFD0 with zero entries
        let mut buf = Vec::new();
        buf.extend_from_slice(&TIFF_MAGIC_LE);
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        let updated = update_exif_dimensions(&buf, 10, 10).unwrap();
        assert_eq!(updated, buf);
    }

    #[test]
    fn test_rejects_non_tiff_block() {
        let result = update_exif_dimensions(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0], 10, 10);
        assert!(matches!(result, Err(DecodeError::ExifError(_))));
    }

    #[test]
    fn test_rejects_truncated_block() {
        assert!(update_exif_dimensions(&[0x49, 0x49], 10, 10).is_err());
    }
}
