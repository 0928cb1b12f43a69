//! KVX encoding.

use super::volume::{MipLevel, VoxelVolume, MIP_HEADER_BYTES};
use crate::palette::PALETTE_BYTES;

/// Serializes a volume back to KVX bytes.
///
/// Pivots are written as 24.8 fixed point, rounded to the nearest step. A
/// volume without a palette gets an all-black one so the result decodes.
#[must_use]
pub fn encode(volume: &VoxelVolume) -> Vec<u8> {
    let body: usize = volume.mips().iter().map(|mip| 4 + mip_size(mip)).sum();
    let mut out = Vec::with_capacity(body + PALETTE_BYTES);
    for mip in volume.mips() {
        encode_mip(mip, &mut out);
    }
    match volume.palette() {
        Some(palette) => out.extend_from_slice(palette.as_bytes()),
        None => out.resize(out.len() + PALETTE_BYTES, 0),
    }
    out
}

fn offset_table_size(mip: &MipLevel) -> usize {
    (mip.size_x() + 1) * 4 + mip.size_x() * (mip.size_y() + 1) * 2
}

fn mip_size(mip: &MipLevel) -> usize {
    MIP_HEADER_BYTES + offset_table_size(mip) + mip.slab_data().len()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn encode_mip(mip: &MipLevel, out: &mut Vec<u8>) {
    let offset_size = offset_table_size(mip) as u32;
    out.extend_from_slice(&(mip_size(mip) as i32).to_le_bytes());
    for extent in [mip.size_x(), mip.size_y(), mip.size_z()] {
        out.extend_from_slice(&(extent as i32).to_le_bytes());
    }
    for pivot in mip.pivot() {
        out.extend_from_slice(&((pivot * 256.0).round() as i32).to_le_bytes());
    }
    for &offset in mip.x_offsets() {
        out.extend_from_slice(&(offset + offset_size).to_le_bytes());
    }
    for &offset in mip.xy_offsets() {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(mip.slab_data());
}
