//! Decoded voxel volumes.
//!
//! A volume is a short list of mip levels plus an optional palette. Each
//! level stores its voxels exactly as the KVX file does: a table of column
//! offsets and a packed stream of slabs.
//!
//! ```text
//! x_offsets[x]                 ─┐ byte offset of slice x in slab_data
//! xy_offsets[x*(size_y+1)+y]   ─┴ + byte offset of column (x, y) within slice x
//!
//! slab_data: [z_top][z_length][cull][color × z_length] [z_top]...
//! ```

use std::ops::Range;
use std::sync::OnceLock;

use crate::error::{DecodeError, DecodeResult};
use crate::palette::{remap_slabs, true_color_slabs, ColorMatcher, RemapCache, RgbPalette, VgaPalette};

/// Hard ceiling on mip levels in one volume.
pub const MAX_MIP_LEVELS: usize = 16;

/// Mip levels read by default.
pub const DEFAULT_MIP_LEVELS: usize = 5;

/// Size of the fixed per-mip header (extents and pivot).
pub const MIP_HEADER_BYTES: usize = 24;

/// Size of a slab header (`z_top`, `z_length`, `cull`).
pub const SLAB_HEADER_BYTES: usize = 3;

/// Longest run a single slab can hold.
pub const MAX_SLAB_LENGTH: usize = u8::MAX as usize;

/// Which faces of a slab are exposed.
///
/// Z grows downward in KVX space, so `TOP` is the face at `z_top` and
/// `BOTTOM` the face at `z_top + z_length`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FaceMask(pub u8);

impl FaceMask {
    /// No exposed faces.
    pub const NONE: Self = Self(0);
    /// −X face.
    pub const LEFT: Self = Self(1);
    /// +X face.
    pub const RIGHT: Self = Self(2);
    /// −Y face.
    pub const FRONT: Self = Self(4);
    /// +Y face.
    pub const BACK: Self = Self(8);
    /// Face at the low Z end (up).
    pub const TOP: Self = Self(16);
    /// Face at the high Z end (down).
    pub const BOTTOM: Self = Self(32);
    /// All six faces.
    pub const ALL: Self = Self(0x3F);

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every face in `other` is also in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no face is exposed.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 & Self::ALL.0 == 0
    }

    /// Number of exposed faces.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        (self.0 & Self::ALL.0).count_ones()
    }
}

impl std::ops::BitOr for FaceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FaceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One vertical run of voxels in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slab<'a> {
    /// Z of the first voxel.
    pub z_top: u8,
    /// Exposed faces.
    pub cull: FaceMask,
    /// One palette index per voxel, top to bottom.
    pub colors: &'a [u8],
}

impl Slab<'_> {
    /// Number of voxels in the run.
    #[inline]
    #[must_use]
    pub fn z_length(&self) -> usize {
        self.colors.len()
    }

    /// Z just past the last voxel.
    #[inline]
    #[must_use]
    pub fn z_end(&self) -> usize {
        usize::from(self.z_top) + self.colors.len()
    }

    /// Bytes this slab occupies in the stream.
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> usize {
        SLAB_HEADER_BYTES + self.colors.len()
    }
}

/// Iterator over the slabs of one byte range.
///
/// Stops at the end of the range. Column boundaries are not checked against
/// slab boundaries on decode, so a slab running past its column ends the
/// walk.
#[derive(Debug, Clone)]
pub struct Slabs<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Slabs<'a> {
    /// Walks a raw slab stream.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for Slabs<'a> {
    type Item = Slab<'a>;

    fn next(&mut self) -> Option<Slab<'a>> {
        let header = self.data.get(self.pos..self.pos + SLAB_HEADER_BYTES)?;
        let start = self.pos + SLAB_HEADER_BYTES;
        let end = start + usize::from(header[1]);
        let Some(colors) = self.data.get(start..end) else {
            self.pos = self.data.len();
            return None;
        };
        self.pos = end;
        Some(Slab {
            z_top: header[0],
            cull: FaceMask(header[2]),
            colors,
        })
    }
}

/// One resolution level of a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub(crate) size: [usize; 3],
    pub(crate) pivot: [f64; 3],
    pub(crate) x_offsets: Vec<u32>,
    pub(crate) xy_offsets: Vec<u16>,
    pub(crate) slab_data: Vec<u8>,
}

impl MipLevel {
    /// Grid extent along X.
    #[inline]
    #[must_use]
    pub const fn size_x(&self) -> usize {
        self.size[0]
    }

    /// Grid extent along Y.
    #[inline]
    #[must_use]
    pub const fn size_y(&self) -> usize {
        self.size[1]
    }

    /// Grid extent along Z.
    #[inline]
    #[must_use]
    pub const fn size_z(&self) -> usize {
        self.size[2]
    }

    /// Logical origin, in voxel units.
    #[inline]
    #[must_use]
    pub const fn pivot(&self) -> [f64; 3] {
        self.pivot
    }

    /// Per-slice offsets into the slab data (`size_x + 1` entries).
    #[inline]
    #[must_use]
    pub fn x_offsets(&self) -> &[u32] {
        &self.x_offsets
    }

    /// Per-column offsets relative to their slice (`size_x * (size_y + 1)` entries).
    #[inline]
    #[must_use]
    pub fn xy_offsets(&self) -> &[u16] {
        &self.xy_offsets
    }

    /// The packed slab stream.
    #[inline]
    #[must_use]
    pub fn slab_data(&self) -> &[u8] {
        &self.slab_data
    }

    /// True if the level holds no slabs.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slab_data.is_empty()
    }

    /// Byte range of column `(x, y)` within the slab data.
    ///
    /// Empty for out-of-range coordinates and for columns whose end offset
    /// precedes their start.
    #[must_use]
    pub fn column_range(&self, x: usize, y: usize) -> Range<usize> {
        if x >= self.size_x() || y >= self.size_y() {
            return 0..0;
        }
        let base = self.x_offsets[x] as usize;
        let row = x * (self.size_y() + 1) + y;
        let start = base + usize::from(self.xy_offsets[row]);
        let end = (base + usize::from(self.xy_offsets[row + 1])).min(self.slab_data.len());
        if start >= end {
            return 0..0;
        }
        start..end
    }

    /// Slabs of column `(x, y)`, top first.
    #[must_use]
    pub fn column(&self, x: usize, y: usize) -> Slabs<'_> {
        Slabs::new(&self.slab_data[self.column_range(x, y)])
    }

    /// Every slab of the level with its column coordinates.
    pub fn slabs(&self) -> impl Iterator<Item = (usize, usize, Slab<'_>)> + '_ {
        (0..self.size_x()).flat_map(move |x| {
            (0..self.size_y()).flat_map(move |y| self.column(x, y).map(move |slab| (x, y, slab)))
        })
    }

    /// Total number of slabs.
    #[must_use]
    pub fn slab_count(&self) -> usize {
        self.slabs().count()
    }

    /// Total number of voxels stored.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.slabs().map(|(_, _, slab)| slab.z_length()).sum()
    }
}

/// A decoded multi-resolution voxel model.
///
/// Immutable apart from two compute-once caches: remapped slab data and
/// true-color slab data.
#[derive(Debug, Clone)]
pub struct VoxelVolume {
    mips: Vec<MipLevel>,
    palette: Option<VgaPalette>,
    remapped: OnceLock<Option<Vec<Vec<u8>>>>,
    true_color: OnceLock<Vec<Vec<u32>>>,
}

impl VoxelVolume {
    /// Assembles a volume from finished mip levels.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NoMipLevels`] if `mips` is empty.
    pub fn new(mut mips: Vec<MipLevel>, palette: Option<VgaPalette>) -> DecodeResult<Self> {
        if mips.is_empty() {
            return Err(DecodeError::NoMipLevels);
        }
        mips.truncate(MAX_MIP_LEVELS);
        Ok(Self {
            mips,
            palette,
            remapped: OnceLock::new(),
            true_color: OnceLock::new(),
        })
    }

    /// A volume with a single mip level.
    #[must_use]
    pub fn from_mip(mip: MipLevel, palette: Option<VgaPalette>) -> Self {
        Self {
            mips: vec![mip],
            palette,
            remapped: OnceLock::new(),
            true_color: OnceLock::new(),
        }
    }

    /// All mip levels, highest resolution first.
    #[inline]
    #[must_use]
    pub fn mips(&self) -> &[MipLevel] {
        &self.mips
    }

    /// Mip level `index`, if present.
    #[inline]
    #[must_use]
    pub fn mip(&self, index: usize) -> Option<&MipLevel> {
        self.mips.get(index)
    }

    /// Number of mip levels.
    #[inline]
    #[must_use]
    pub fn mip_count(&self) -> usize {
        self.mips.len()
    }

    /// The volume's own palette; `None` means "use the engine palette".
    #[inline]
    #[must_use]
    pub const fn palette(&self) -> Option<&VgaPalette> {
        self.palette.as_ref()
    }

    /// Drops the built-in palette and any caches derived from it.
    pub fn remove_palette(&mut self) {
        self.palette = None;
        self.remapped = OnceLock::new();
        self.true_color = OnceLock::new();
    }

    /// True once [`VoxelVolume::remapped_slab_data`] has run.
    #[must_use]
    pub fn is_remapped(&self) -> bool {
        self.remapped.get().is_some()
    }

    /// True once [`VoxelVolume::true_color_slab_data`] has run.
    #[must_use]
    pub fn has_true_color(&self) -> bool {
        self.true_color.get().is_some()
    }

    /// Slab data of `mip` with colors translated into the active palette.
    ///
    /// Computed for every mip on first call and cached. Volumes without a
    /// palette already use the active palette and return their own data.
    pub fn remapped_slab_data(
        &self,
        mip: usize,
        cache: &mut RemapCache,
        matcher: &impl ColorMatcher,
    ) -> Option<&[u8]> {
        let level = self.mips.get(mip)?;
        let remapped = self.remapped.get_or_init(|| {
            self.palette.as_ref().map(|palette| {
                let table = *cache.get(palette, matcher);
                self.mips.iter().map(|m| remap_slabs(&m.slab_data, &table)).collect()
            })
        });
        match remapped {
            Some(all) => all.get(mip).map(Vec::as_slice),
            None => Some(level.slab_data()),
        }
    }

    /// Slab data of `mip` widened to 32-bit words with `0xFFRRGGBB` colors.
    ///
    /// Colors come from the volume palette, or from `fallback` if the
    /// volume has none. Computed on first call and cached; later calls
    /// ignore `fallback`.
    pub fn true_color_slab_data(&self, mip: usize, fallback: &RgbPalette) -> Option<&[u32]> {
        let all = self.true_color.get_or_init(|| {
            self.mips
                .iter()
                .map(|m| match &self.palette {
                    Some(palette) => true_color_slabs(&m.slab_data, |i| palette.rgb(i)),
                    None => true_color_slabs(&m.slab_data, |i| fallback.get(i)),
                })
                .collect()
        });
        all.get(mip).map(Vec::as_slice)
    }
}
