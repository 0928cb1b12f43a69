//! Voxel palettes.
//!
//! KVX files end with a 256-entry VGA palette: three bytes per color, six
//! significant bits per channel. The renderer wants eight bits per channel,
//! so every consumer expands on read with `(v << 2) | (v >> 4)`, which maps
//! 0 to 0 and 63 to 255.
//!
//! ```text
//! byte offset:  0   1   2   3   4   5  ...  765 766 767
//!               R0  G0  B0  R1  G1  B1 ...  R255 G255 B255   (0..=63 each)
//! ```

mod remap;
mod slabs;

pub use remap::{compute_voxel_palette_remap, ColorMatcher, NearestColorMatcher, RemapCache, RemapTable};
pub(crate) use slabs::{remap_slabs, true_color_slabs};

/// Number of colors in every voxel palette.
pub const PALETTE_COLORS: usize = 256;

/// Size of a serialized VGA palette in bytes.
pub const PALETTE_BYTES: usize = PALETTE_COLORS * 3;

/// Expands a 6-bit VGA channel to 8 bits.
#[inline]
#[must_use]
pub const fn expand_vga(value: u8) -> u8 {
    (value << 2) | (value >> 4)
}

/// Reduces an 8-bit channel to the 6-bit VGA range.
#[inline]
#[must_use]
pub const fn quantize_vga(value: u8) -> u8 {
    value >> 2
}

/// An 8-bit-per-channel color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red component (0-255).
    pub r: u8,
    /// Green component (0-255).
    pub g: u8,
    /// Blue component (0-255).
    pub b: u8,
}

impl Rgb {
    /// Creates a color from its components.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packs as opaque `0xAARRGGBB`, the true-color slab word layout.
    #[inline]
    #[must_use]
    pub const fn to_bgra(self) -> u32 {
        0xFF00_0000 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Squared euclidean distance to another color.
    #[inline]
    #[must_use]
    pub const fn distance_sq(self, other: Self) -> u32 {
        let dr = self.r.abs_diff(other.r) as u32;
        let dg = self.g.abs_diff(other.g) as u32;
        let db = self.b.abs_diff(other.b) as u32;
        dr * dr + dg * dg + db * db
    }
}

/// The raw 768-byte palette stored at the end of a KVX file.
///
/// Values are kept exactly as read (6-bit). Use [`VgaPalette::rgb`] to get
/// expanded colors.
#[derive(Clone, PartialEq, Eq)]
pub struct VgaPalette {
    bytes: [u8; PALETTE_BYTES],
}

impl std::fmt::Debug for VgaPalette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VgaPalette")
            .field("first", &self.raw(0))
            .field("last", &self.raw(255))
            .finish()
    }
}

impl Default for VgaPalette {
    fn default() -> Self {
        Self { bytes: [0; PALETTE_BYTES] }
    }
}

impl VgaPalette {
    /// Wraps exactly 768 bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PALETTE_BYTES]) -> Self {
        Self { bytes }
    }

    /// Copies a palette out of a slice; `None` unless it is exactly 768 bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; PALETTE_BYTES] = bytes.try_into().ok()?;
        Some(Self { bytes })
    }

    /// Quantizes an 8-bit palette down to VGA range.
    #[must_use]
    pub fn from_rgb(palette: &RgbPalette) -> Self {
        let mut bytes = [0u8; PALETTE_BYTES];
        for (chunk, color) in bytes.chunks_exact_mut(3).zip(palette.colors.iter()) {
            chunk[0] = quantize_vga(color.r);
            chunk[1] = quantize_vga(color.g);
            chunk[2] = quantize_vga(color.b);
        }
        Self { bytes }
    }

    /// The raw bytes, as stored in the file.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PALETTE_BYTES] {
        &self.bytes
    }

    /// Raw 6-bit triple for `index`.
    #[inline]
    #[must_use]
    pub fn raw(&self, index: u8) -> [u8; 3] {
        let i = usize::from(index) * 3;
        [self.bytes[i], self.bytes[i + 1], self.bytes[i + 2]]
    }

    /// Expanded 8-bit color for `index`.
    #[inline]
    #[must_use]
    pub fn rgb(&self, index: u8) -> Rgb {
        let [r, g, b] = self.raw(index);
        Rgb::new(expand_vga(r), expand_vga(g), expand_vga(b))
    }

    /// Expands the whole palette.
    #[must_use]
    pub fn to_rgb(&self) -> RgbPalette {
        let mut out = RgbPalette::default();
        for (i, color) in out.colors.iter_mut().enumerate() {
            // i < 256 by construction of the array
            *color = self.rgb(i as u8);
        }
        out
    }
}

/// A 256-entry palette of 8-bit colors.
///
/// This is what the engine's active palette looks like to the voxel code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbPalette {
    /// Color entries.
    pub colors: [Rgb; PALETTE_COLORS],
}

impl Default for RgbPalette {
    fn default() -> Self {
        Self::grayscale()
    }
}

impl RgbPalette {
    /// A 256-step gray ramp; index `i` is `(i, i, i)`.
    #[must_use]
    pub fn grayscale() -> Self {
        Self::from_fn(|i| Rgb::new(i, i, i))
    }

    /// Builds a palette from a per-index generator.
    #[must_use]
    pub fn from_fn(mut f: impl FnMut(u8) -> Rgb) -> Self {
        let mut colors = [Rgb::default(); PALETTE_COLORS];
        for (i, color) in colors.iter_mut().enumerate() {
            *color = f(i as u8);
        }
        Self { colors }
    }

    /// Gets color at index.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u8) -> Rgb {
        self.colors[usize::from(index)]
    }

    /// Sets color at index.
    #[inline]
    pub fn set(&mut self, index: u8, color: Rgb) {
        self.colors[usize::from(index)] = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vga_expansion_covers_full_range() {
        assert_eq!(expand_vga(0), 0);
        assert_eq!(expand_vga(63), 255);
        assert_eq!(expand_vga(32), 130);
        for v in 0..64u8 {
            assert_eq!(quantize_vga(expand_vga(v)), v);
        }
    }

    #[test]
    fn test_palette_from_slice_requires_exact_length() {
        assert!(VgaPalette::from_slice(&[0u8; 767]).is_none());
        assert!(VgaPalette::from_slice(&[0u8; 769]).is_none());
        assert!(VgaPalette::from_slice(&[0u8; 768]).is_some());
    }

    #[test]
    fn test_rgb_lookup_expands() {
        let mut bytes = [0u8; PALETTE_BYTES];
        bytes[3] = 63;
        bytes[4] = 16;
        bytes[5] = 1;
        let palette = VgaPalette::from_bytes(bytes);

        assert_eq!(palette.raw(1), [63, 16, 1]);
        assert_eq!(palette.rgb(1), Rgb::new(255, 65, 4));
        assert_eq!(palette.to_rgb().get(1), Rgb::new(255, 65, 4));
    }

    #[test]
    fn test_bgra_packing() {
        assert_eq!(Rgb::new(0x12, 0x34, 0x56).to_bgra(), 0xFF12_3456);
    }

    #[test]
    fn test_quantize_round_trip() {
        let rgb = RgbPalette::from_fn(|i| Rgb::new(i, 255 - i, 128));
        let vga = VgaPalette::from_rgb(&rgb);
        assert_eq!(vga.raw(0), [0, 63, 32]);
        assert_eq!(vga.raw(255), [63, 0, 32]);
    }
}
