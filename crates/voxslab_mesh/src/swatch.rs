//! Palette swatch textures.
//!
//! Voxel meshes carry no per-vertex color. Each vertex UV points at the
//! center of one cell in a 16×16 image holding the 256 palette entries:
//!
//! ```text
//!        u →  0   1   2  ...  15
//!   v  0     c0  c1  c2  ... c15
//!   ↓  1    c16 c17 c18  ... c31
//!      ...
//!     15   c240          ... c255
//! ```

use voxslab_core::palette::{ColorMatcher, Rgb, RgbPalette, PALETTE_COLORS};
use voxslab_core::VoxelVolume;

/// Swatch edge length in pixels.
pub const SWATCH_SIZE: usize = 16;

/// A 16×16 RGBA palette image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwatchTexture {
    pixels: [Rgb; PALETTE_COLORS],
}

impl SwatchTexture {
    /// Builds a swatch straight from an 8-bit palette.
    #[must_use]
    pub fn from_palette(palette: &RgbPalette) -> Self {
        Self { pixels: palette.colors }
    }

    /// Builds the swatch for a volume: its own palette expanded to 8 bits,
    /// or `fallback` when it has none.
    #[must_use]
    pub fn for_volume(volume: &VoxelVolume, fallback: &RgbPalette) -> Self {
        match volume.palette() {
            Some(palette) => Self::from_palette(&palette.to_rgb()),
            None => Self::from_palette(fallback),
        }
    }

    /// Color at pixel `(x, y)`; coordinates wrap at 16.
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        self.pixels[(x % SWATCH_SIZE) + (y % SWATCH_SIZE) * SWATCH_SIZE]
    }

    /// Row-major RGBA8 bytes, fully opaque.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| [c.r, c.g, c.b, 0xFF]).collect()
    }

    /// Row-major indices into the active palette, for paletted renderers.
    #[must_use]
    pub fn to_indexed(&self, matcher: &impl ColorMatcher) -> Vec<u8> {
        self.pixels.iter().map(|&c| matcher.pick_rgb(c)).collect()
    }
}
