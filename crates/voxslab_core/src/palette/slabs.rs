//! Derived slab streams.
//!
//! Both functions keep the slab layout intact so the column offsets of the
//! source mip stay valid: remapped data is byte-for-byte the same shape,
//! true-color data widens every byte to one `u32` word.

use super::{RemapTable, Rgb};

/// Copies a slab stream, translating every color through `table`.
pub(crate) fn remap_slabs(src: &[u8], table: &RemapTable) -> Vec<u8> {
    let mut out = src.to_vec();
    let mut pos = 0;
    while out.len() - pos >= 3 {
        let len = usize::from(out[pos + 1]);
        let start = pos + 3;
        let end = (start + len).min(out.len());
        for color in &mut out[start..end] {
            *color = table[usize::from(*color)];
        }
        pos = end;
    }
    out
}

/// Widens a slab stream to 32-bit words, replacing colors with `0xFFRRGGBB`.
///
/// Header bytes (`z_top`, `z_length`, `cull`) are widened unchanged.
pub(crate) fn true_color_slabs(src: &[u8], color: impl Fn(u8) -> Rgb) -> Vec<u32> {
    let mut out: Vec<u32> = src.iter().map(|&b| u32::from(b)).collect();
    let mut pos = 0;
    while src.len() - pos >= 3 {
        let len = usize::from(src[pos + 1]);
        let start = pos + 3;
        let end = (start + len).min(src.len());
        for (word, &index) in out[start..end].iter_mut().zip(&src[start..end]) {
            *word = color(index).to_bgra();
        }
        pos = end;
    }
    out
}
