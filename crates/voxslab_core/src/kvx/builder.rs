//! Slab-by-slab construction of mip levels.

use super::volume::{FaceMask, MipLevel, MAX_SLAB_LENGTH, SLAB_HEADER_BYTES};
use crate::error::{BuildError, BuildResult};

/// Collects slabs per column and packs them into a [`MipLevel`].
///
/// Columns may be filled in any order; slabs within a column keep the order
/// they were pushed in.
#[derive(Debug, Clone)]
pub struct MipBuilder {
    size: [usize; 3],
    pivot: [f64; 3],
    columns: Vec<Vec<u8>>,
}

impl MipBuilder {
    /// Starts an empty level of the given extent, pivot at the origin.
    #[must_use]
    pub fn new(size_x: usize, size_y: usize, size_z: usize) -> Self {
        Self {
            size: [size_x, size_y, size_z],
            pivot: [0.0; 3],
            columns: vec![Vec::new(); size_x * size_y],
        }
    }

    /// Sets the pivot, in voxel units.
    #[must_use]
    pub const fn with_pivot(mut self, pivot: [f64; 3]) -> Self {
        self.pivot = pivot;
        self
    }

    /// Appends a slab to column `(x, y)`.
    ///
    /// # Errors
    ///
    /// Fails if the column is outside the level or `colors` is empty or
    /// longer than 255.
    pub fn push_slab(&mut self, x: usize, y: usize, z_top: u8, cull: FaceMask, colors: &[u8]) -> BuildResult<()> {
        let [size_x, size_y, _] = self.size;
        if x >= size_x || y >= size_y {
            return Err(BuildError::ColumnOutOfBounds { x, y, size_x, size_y });
        }
        if colors.is_empty() || colors.len() > MAX_SLAB_LENGTH {
            return Err(BuildError::BadSlabLength { len: colors.len() });
        }
        let column = &mut self.columns[x * size_y + y];
        column.reserve(SLAB_HEADER_BYTES + colors.len());
        // length checked above
        column.extend_from_slice(&[z_top, colors.len() as u8, cull.bits()]);
        column.extend_from_slice(colors);
        Ok(())
    }

    /// Packs the columns and builds offset tables.
    ///
    /// # Errors
    ///
    /// Fails with [`BuildError::SliceTooLarge`] if any X slice exceeds the
    /// 16-bit range of column offsets.
    pub fn build(self) -> BuildResult<MipLevel> {
        let [size_x, size_y, _] = self.size;
        let mut slab_data = Vec::with_capacity(self.columns.iter().map(Vec::len).sum());
        let mut x_offsets = Vec::with_capacity(size_x + 1);
        let mut xy_offsets = Vec::with_capacity(size_x * (size_y + 1));

        for (x, slice) in self.columns.chunks(size_y.max(1)).take(size_x).enumerate() {
            let base = slab_data.len();
            x_offsets.push(u32::try_from(base).map_err(|_| BuildError::SliceTooLarge { x, size: base })?);
            xy_offsets.push(0);
            for column in slice {
                slab_data.extend_from_slice(column);
                let size = slab_data.len() - base;
                xy_offsets.push(u16::try_from(size).map_err(|_| BuildError::SliceTooLarge { x, size })?);
            }
        }
        // size_y == 0: no columns, every slice is empty
        while x_offsets.len() < size_x {
            x_offsets.push(0);
            xy_offsets.push(0);
        }
        let end = slab_data.len();
        x_offsets.push(u32::try_from(end).map_err(|_| BuildError::SliceTooLarge { x: size_x, size: end })?);

        Ok(MipLevel {
            size: self.size,
            pivot: self.pivot,
            x_offsets,
            xy_offsets,
            slab_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_packing_order() {
        let mut builder = MipBuilder::new(2, 2, 4);
        builder.push_slab(1, 0, 0, FaceMask::ALL, &[7]).unwrap();
        builder.push_slab(0, 1, 1, FaceMask::ALL, &[3, 3]).unwrap();
        let mip = builder.build().unwrap();

        assert_eq!(mip.x_offsets(), &[0, 5, 9]);
        assert_eq!(mip.xy_offsets(), &[0, 0, 5, 0, 4, 4]);
        assert_eq!(mip.slab_data().len(), 9);
        assert_eq!(mip.column(1, 0).next().unwrap().colors, &[7]);
    }

    #[test]
    fn test_rejects_bad_slabs() {
        let mut builder = MipBuilder::new(1, 1, 1);
        assert_eq!(
            builder.push_slab(1, 0, 0, FaceMask::ALL, &[1]),
            Err(BuildError::ColumnOutOfBounds { x: 1, y: 0, size_x: 1, size_y: 1 })
        );
        assert_eq!(builder.push_slab(0, 0, 0, FaceMask::ALL, &[]), Err(BuildError::BadSlabLength { len: 0 }));
        assert_eq!(
            builder.push_slab(0, 0, 0, FaceMask::ALL, &[1; 256]),
            Err(BuildError::BadSlabLength { len: 256 })
        );
    }

    #[test]
    fn test_oversized_slice_fails() {
        let mut builder = MipBuilder::new(1, 1, 255);
        for _ in 0..300 {
            builder.push_slab(0, 0, 0, FaceMask::NONE, &[1; 255]).unwrap();
        }
        assert!(matches!(builder.build(), Err(BuildError::SliceTooLarge { x: 0, .. })));
    }

    #[test]
    fn test_empty_level() {
        let mip = MipBuilder::new(3, 2, 1).build().unwrap();
        assert!(mip.is_empty());
        assert_eq!(mip.x_offsets(), &[0, 0, 0, 0]);
        assert_eq!(mip.xy_offsets().len(), 9);
    }
}
