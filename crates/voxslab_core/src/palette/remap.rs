//! Palette remapping.
//!
//! A voxel carries its own palette, but paletted renderers draw with the
//! engine's active one. The remap table sends every voxel color index to
//! the closest active-palette index. Building it costs 256 color matches,
//! so the last result is memoized by palette bytes.

use super::{RgbPalette, Rgb, VgaPalette, PALETTE_COLORS};

/// Lookup table from voxel color index to active-palette index.
pub type RemapTable = [u8; PALETTE_COLORS];

/// Finds the nearest entry of the engine's active palette.
pub trait ColorMatcher {
    /// Returns the active-palette index closest to `(r, g, b)`.
    fn pick(&self, r: u8, g: u8, b: u8) -> u8;

    /// Convenience wrapper over [`ColorMatcher::pick`].
    fn pick_rgb(&self, color: Rgb) -> u8 {
        self.pick(color.r, color.g, color.b)
    }
}

/// Squared-distance color matcher over a fixed palette.
///
/// Ties resolve to the lowest index.
#[derive(Debug, Clone)]
pub struct NearestColorMatcher {
    palette: RgbPalette,
}

impl NearestColorMatcher {
    /// Creates a matcher for `palette`.
    #[must_use]
    pub const fn new(palette: RgbPalette) -> Self {
        Self { palette }
    }

    /// The palette being matched against.
    #[must_use]
    pub const fn palette(&self) -> &RgbPalette {
        &self.palette
    }
}

impl ColorMatcher for NearestColorMatcher {
    fn pick(&self, r: u8, g: u8, b: u8) -> u8 {
        let target = Rgb::new(r, g, b);
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, color) in self.palette.colors.iter().enumerate() {
            let dist = color.distance_sq(target);
            if dist < best_dist {
                best = i;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        // best < 256
        best as u8
    }
}

/// Builds the remap table for a voxel palette.
///
/// Each VGA entry is expanded to 8 bits before matching.
#[must_use]
pub fn compute_voxel_palette_remap(palette: &VgaPalette, matcher: &impl ColorMatcher) -> RemapTable {
    let mut table = [0u8; PALETTE_COLORS];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = matcher.pick_rgb(palette.rgb(i as u8));
    }
    table
}

/// Memoizes the most recent remap table.
///
/// Keyed by byte-for-byte palette equality. The matcher is assumed stable
/// for the lifetime of the cache; call [`RemapCache::clear`] when the
/// active palette changes.
#[derive(Debug, Default)]
pub struct RemapCache {
    last: Option<(VgaPalette, RemapTable)>,
    misses: u64,
}

impl RemapCache {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None, misses: 0 }
    }

    /// Returns the remap table for `palette`, recomputing only when it
    /// differs from the previous call.
    pub fn get(&mut self, palette: &VgaPalette, matcher: &impl ColorMatcher) -> &RemapTable {
        let hit = matches!(&self.last, Some((cached, _)) if cached == palette);
        if !hit {
            self.last = None;
            self.misses += 1;
            tracing::debug!(misses = self.misses, "recomputing voxel palette remap");
        }
        let (_, table) = self
            .last
            .get_or_insert_with(|| (palette.clone(), compute_voxel_palette_remap(palette, matcher)));
        table
    }

    /// Number of times a table had to be computed.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Forgets the cached table.
    pub fn clear(&mut self) {
        self.last = None;
    }
}
