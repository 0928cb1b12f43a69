//! KVX decoding.
//!
//! ```text
//! ┌──────────────────────── repeated per mip ─────────────────────────┐
//! │ i32 num_bytes                                                     │
//! │ ┌── num_bytes ──────────────────────────────────────────────────┐ │
//! │ │ i32 size_x, size_y, size_z                                    │ │
//! │ │ i32 pivot_x, pivot_y, pivot_z        (24.8 fixed point)       │ │
//! │ │ u32 x_offsets[size_x + 1]            (from end of header)     │ │
//! │ │ u16 xy_offsets[size_x * (size_y + 1)]                         │ │
//! │ │ slab data                                                     │ │
//! │ └───────────────────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────────┘
//! u8 palette[768]                          (VGA, 0..=63 per channel)
//! ```
//!
//! A length prefix that cannot be a mip ends the mip list. Anything that
//! is structurally wrong inside a mip rejects the whole file.

use crate::config::DecoderConfig;
use crate::cursor::ByteReader;
use crate::error::{DecodeError, DecodeResult};
use crate::palette::{VgaPalette, PALETTE_BYTES};

use super::volume::{MipLevel, VoxelVolume, MAX_MIP_LEVELS, MIP_HEADER_BYTES, SLAB_HEADER_BYTES};

/// Decodes a KVX file with the default configuration.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first structural problem.
pub fn decode(bytes: &[u8]) -> DecodeResult<VoxelVolume> {
    decode_with(bytes, &DecoderConfig::default())
}

/// Decodes a KVX file.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first structural problem.
///
/// # Panics
///
/// Debug builds panic if `config` fails [`DecoderConfig::validate`].
pub fn decode_with(bytes: &[u8], config: &DecoderConfig) -> DecodeResult<VoxelVolume> {
    debug_assert!(
        config.validate().is_ok(),
        "max_mip_levels {} outside 1..={MAX_MIP_LEVELS}",
        config.max_mip_levels
    );
    let result = decode_levels(bytes, config.max_mip_levels);
    match &result {
        Ok(volume) => tracing::trace!(mips = volume.mip_count(), len = bytes.len(), "decoded voxel"),
        Err(err) => tracing::debug!(%err, len = bytes.len(), "rejected voxel data"),
    }
    result
}

/// A mip whose tables are validated but whose slabs are not yet walked.
struct RawMip<'a> {
    size: [usize; 3],
    pivot: [f64; 3],
    x_offsets: Vec<u32>,
    xy_offsets: Vec<u16>,
    slabs: &'a [u8],
}

fn decode_levels(bytes: &[u8], max_mips: usize) -> DecodeResult<VoxelVolume> {
    if bytes.len() < PALETTE_BYTES + 4 {
        return Err(DecodeError::TooShort { len: bytes.len() });
    }
    let palette_start = bytes.len() - PALETTE_BYTES;
    let mut reader = ByteReader::new(&bytes[..palette_start]);
    // bytes still available for a mip body after its length prefix
    let mut budget = palette_start as i64 - 4;
    let mut raw = Vec::with_capacity(max_mips.min(MAX_MIP_LEVELS));

    for level in 0..max_mips {
        let Some(num_bytes) = reader.read_i32() else {
            break;
        };
        let num_bytes = i64::from(num_bytes);
        if num_bytes > budget || num_bytes < MIP_HEADER_BYTES as i64 {
            reader.rewind(4);
            break;
        }
        // num_bytes <= budget, so the body is present
        let offset = reader.position();
        let body = reader
            .read_bytes(num_bytes as usize)
            .ok_or(DecodeError::Truncated { offset })?;
        raw.push(parse_tables(level, body)?);
        budget -= num_bytes + 4;
    }

    if raw.is_empty() {
        return Err(DecodeError::NoMipLevels);
    }
    if reader.position() != palette_start {
        return Err(DecodeError::PaletteMisaligned {
            expected: palette_start,
            actual: reader.position(),
        });
    }

    while raw.last().is_some_and(|mip| mip.slabs.is_empty()) {
        raw.pop();
    }
    if raw.is_empty() {
        return Err(DecodeError::NoMipLevels);
    }
    for i in 1..raw.len() {
        raw[i].pivot = raw[i - 1].pivot.map(|p| p / 2.0);
    }

    let mips = raw
        .into_iter()
        .enumerate()
        .map(|(level, mip)| finish_mip(level, mip))
        .collect::<DecodeResult<Vec<_>>>()?;
    let palette = VgaPalette::from_slice(&bytes[palette_start..]);
    VoxelVolume::new(mips, palette)
}

fn parse_tables(level: usize, body: &[u8]) -> DecodeResult<RawMip<'_>> {
    let mut reader = ByteReader::new(body);
    let mut header = [0i32; 6];
    for value in &mut header {
        let offset = reader.position();
        *value = reader.read_i32().ok_or(DecodeError::Truncated { offset })?;
    }
    let mut size = [0usize; 3];
    for (out, &value) in size.iter_mut().zip(&header[..3]) {
        *out = usize::try_from(value).map_err(|_| DecodeError::NegativeExtent { level, value })?;
    }
    let pivot = [
        f64::from(header[3]) / 256.0,
        f64::from(header[4]) / 256.0,
        f64::from(header[5]) / 256.0,
    ];
    let [size_x, size_y, _] = size;

    let available = body.len() as u64;
    let offset_size = (size_x as u64 + 1)
        .checked_mul(4)
        .zip((size_x as u64).checked_mul(size_y as u64 + 1))
        .and_then(|(xs, xy)| xy.checked_mul(2).and_then(|xy| xy.checked_add(xs)))
        .unwrap_or(u64::MAX);
    let needed = offset_size.saturating_add(MIP_HEADER_BYTES as u64);
    if needed > available {
        return Err(DecodeError::OffsetTableOverflow { level, needed, available });
    }
    // bounded by body.len()
    let offset_size = offset_size as usize;
    let data_size = body.len() - MIP_HEADER_BYTES - offset_size;
    let slabs = &body[MIP_HEADER_BYTES + offset_size..];

    if data_size == 0 {
        return Ok(RawMip {
            size,
            pivot,
            x_offsets: vec![0; size_x + 1],
            xy_offsets: vec![0; size_x * (size_y + 1)],
            slabs,
        });
    }

    let mut x_offsets = Vec::with_capacity(size_x + 1);
    for _ in 0..=size_x {
        let offset = reader.position();
        let raw = reader.read_u32().ok_or(DecodeError::Truncated { offset })?;
        x_offsets.push(i64::from(raw) - offset_size as i64);
    }
    if x_offsets[0] != 0 {
        return Err(DecodeError::FirstOffsetNonZero { level, value: x_offsets[0] });
    }
    if x_offsets[size_x] != data_size as i64 {
        return Err(DecodeError::LastOffsetMismatch {
            level,
            expected: data_size,
            actual: x_offsets[size_x],
        });
    }

    let mut xy_offsets = Vec::with_capacity(size_x * (size_y + 1));
    for _ in 0..size_x * (size_y + 1) {
        let offset = reader.position();
        xy_offsets.push(reader.read_u16().ok_or(DecodeError::Truncated { offset })?);
    }

    let limit = data_size as i64;
    for (x, &base) in x_offsets[..size_x].iter().enumerate() {
        for y in 0..=size_y {
            let offset = base + i64::from(xy_offsets[x * (size_y + 1) + y]);
            if base < 0 || offset > limit {
                return Err(DecodeError::ColumnOutOfRange {
                    level,
                    x,
                    y,
                    offset,
                    limit: data_size,
                });
            }
        }
    }

    Ok(RawMip {
        size,
        pivot,
        // every entry is in 0..=data_size, which fits u32
        x_offsets: x_offsets.into_iter().map(|o| o as u32).collect(),
        xy_offsets,
        slabs,
    })
}

/// Walks the slab stream once and takes an owned copy.
fn finish_mip(level: usize, raw: RawMip<'_>) -> DecodeResult<MipLevel> {
    let data = raw.slabs;
    let mut pos = 0;
    while data.len() - pos >= SLAB_HEADER_BYTES {
        let len = usize::from(data[pos + 1]);
        if SLAB_HEADER_BYTES + len > data.len() - pos {
            return Err(DecodeError::SlabOverrun { level, offset: pos });
        }
        pos += SLAB_HEADER_BYTES + len;
    }
    Ok(MipLevel {
        size: raw.size,
        pivot: raw.pivot,
        x_offsets: raw.x_offsets,
        xy_offsets: raw.xy_offsets,
        slab_data: data.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvx::FaceMask;

    /// Hand-assembles one mip block.
    fn mip_block(size: [i32; 3], pivot: [i32; 3], x_offsets: &[u32], xy_offsets: &[u16], slabs: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        for v in size.iter().chain(&pivot) {
            body.extend_from_slice(&v.to_le_bytes());
        }
        for v in x_offsets {
            body.extend_from_slice(&v.to_le_bytes());
        }
        for v in xy_offsets {
            body.extend_from_slice(&v.to_le_bytes());
        }
        body.extend_from_slice(slabs);
        let mut out = (body.len() as i32).to_le_bytes().to_vec();
        out.extend_from_slice(&body);
        out
    }

    fn single_voxel_block(pivot: [i32; 3]) -> Vec<u8> {
        // offset_size = 2*4 + 1*2*2 = 12
        mip_block([1, 1, 1], pivot, &[12, 16], &[0, 4], &[0, 1, 0x3F, 7])
    }

    fn with_palette(mut mips: Vec<u8>) -> Vec<u8> {
        let mut palette = vec![0u8; PALETTE_BYTES];
        palette[21..24].copy_from_slice(&[63, 0, 0]);
        mips.extend_from_slice(&palette);
        mips
    }

    #[test]
    fn test_single_voxel() {
        let volume = decode(&with_palette(single_voxel_block([128, 128, 256]))).unwrap();

        assert_eq!(volume.mip_count(), 1);
        let mip = &volume.mips()[0];
        assert_eq!((mip.size_x(), mip.size_y(), mip.size_z()), (1, 1, 1));
        assert_eq!(mip.pivot(), [0.5, 0.5, 1.0]);
        assert_eq!(mip.x_offsets(), &[0, 4]);

        let slab = mip.column(0, 0).next().unwrap();
        assert_eq!(slab.z_top, 0);
        assert_eq!(slab.cull, FaceMask::ALL);
        assert_eq!(slab.colors, &[7]);
        assert_eq!(volume.palette().unwrap().raw(7), [63, 0, 0]);
    }

    #[test]
    fn test_sub_mip_pivot_is_halved() {
        let mut mips = single_voxel_block([512, 256, 1024]);
        mips.extend(single_voxel_block([0, 0, 0]));
        let volume = decode(&with_palette(mips)).unwrap();

        assert_eq!(volume.mip_count(), 2);
        assert_eq!(volume.mips()[0].pivot(), [2.0, 1.0, 4.0]);
        assert_eq!(volume.mips()[1].pivot(), [1.0, 0.5, 2.0]);
    }

    #[test]
    fn test_max_mip_levels_limits_parsing() {
        let mut mips = single_voxel_block([0; 3]);
        mips.extend(single_voxel_block([0; 3]));
        let data = with_palette(mips);

        // second mip left unread, so the palette no longer lines up
        let config = DecoderConfig { max_mip_levels: 1 };
        assert!(matches!(
            decode_with(&data, &config),
            Err(DecodeError::PaletteMisaligned { .. })
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "max_mip_levels 0 outside")]
    fn test_unvalidated_mip_limit_is_caught() {
        let data = with_palette(single_voxel_block([0; 3]));
        let _ = decode_with(&data, &DecoderConfig { max_mip_levels: 0 });
    }

    #[test]
    fn test_trailing_empty_mips_are_dropped() {
        let mut mips = single_voxel_block([0; 3]);
        mips.extend(mip_block([1, 1, 1], [0; 3], &[12, 12], &[0, 0], &[]));
        let volume = decode(&with_palette(mips)).unwrap();
        assert_eq!(volume.mip_count(), 1);
    }

    #[test]
    fn test_all_empty_is_rejected() {
        let data = with_palette(mip_block([1, 1, 1], [0; 3], &[12, 12], &[0, 0], &[]));
        assert_eq!(decode(&data).unwrap_err(), DecodeError::NoMipLevels);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(decode(&[0u8; 771]).unwrap_err(), DecodeError::TooShort { len: 771 });
    }

    #[test]
    fn test_small_length_prefix_ends_mip_list() {
        let mut mips = single_voxel_block([0; 3]);
        mips.extend_from_slice(&10i32.to_le_bytes());
        let err = decode(&with_palette(mips.clone())).unwrap_err();
        assert!(matches!(err, DecodeError::PaletteMisaligned { actual, .. } if actual == mips.len() - 4));
    }

    #[test]
    fn test_bad_first_offset() {
        let data = with_palette(mip_block([1, 1, 1], [0; 3], &[13, 16], &[0, 4], &[0, 1, 0x3F, 7]));
        assert_eq!(decode(&data).unwrap_err(), DecodeError::FirstOffsetNonZero { level: 0, value: 1 });
    }

    #[test]
    fn test_bad_last_offset() {
        let data = with_palette(mip_block([1, 1, 1], [0; 3], &[12, 15], &[0, 4], &[0, 1, 0x3F, 7]));
        assert_eq!(
            decode(&data).unwrap_err(),
            DecodeError::LastOffsetMismatch { level: 0, expected: 4, actual: 3 }
        );
    }

    #[test]
    fn test_column_past_end() {
        let data = with_palette(mip_block([1, 1, 1], [0; 3], &[12, 16], &[0, 9], &[0, 1, 0x3F, 7]));
        assert!(matches!(
            decode(&data).unwrap_err(),
            DecodeError::ColumnOutOfRange { x: 0, y: 1, offset: 9, .. }
        ));
    }

    #[test]
    fn test_slab_overrun() {
        let data = with_palette(mip_block([1, 1, 1], [0; 3], &[12, 16], &[0, 4], &[0, 2, 0x3F, 7]));
        assert_eq!(decode(&data).unwrap_err(), DecodeError::SlabOverrun { level: 0, offset: 0 });
    }

    #[test]
    fn test_negative_extent() {
        let data = with_palette(mip_block([1, -2, 1], [0; 3], &[], &[], &[0; 16]));
        assert_eq!(decode(&data).unwrap_err(), DecodeError::NegativeExtent { level: 0, value: -2 });
    }

    #[test]
    fn test_offset_tables_larger_than_mip() {
        let data = with_palette(mip_block([100, 100, 1], [0; 3], &[], &[], &[]));
        assert!(matches!(
            decode(&data).unwrap_err(),
            DecodeError::OffsetTableOverflow { level: 0, available: 24, .. }
        ));
    }
}
