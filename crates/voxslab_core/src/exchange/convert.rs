//! VOX to KVX conversion.
//!
//! The model is rasterized into a dense grid, every filled cell gets a
//! visibility mask from its six neighbours, fully enclosed cells are
//! dropped, and each column is re-encoded as runs that share one mask.

use crate::config::ExchangeConfig;
use crate::error::ExchangeResult;
use crate::kvx::{encode, FaceMask, MipBuilder, VoxelVolume, MAX_SLAB_LENGTH};
use crate::palette::VgaPalette;

use super::chunks::{parse_vox, VoxModel};

/// Grid value of an empty cell.
pub const EMPTY_VOXEL: u8 = 0;

/// Dense color grid, one byte per cell, Z fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    width: usize,
    length: usize,
    height: usize,
    cells: Vec<u8>,
}

impl VoxelGrid {
    /// An empty grid.
    #[must_use]
    pub fn new(width: usize, length: usize, height: usize) -> Self {
        Self {
            width,
            length,
            height,
            cells: vec![EMPTY_VOXEL; width * length * height],
        }
    }

    /// Rasterizes a parsed model; later voxels overwrite earlier ones.
    #[must_use]
    pub fn from_model(model: &VoxModel) -> Self {
        let mut grid = Self::new(model.width as usize, model.length as usize, model.height as usize);
        for v in &model.voxels {
            grid.set(usize::from(v.x), usize::from(v.y), usize::from(v.z), v.color_index);
        }
        grid
    }

    /// Extents as `[width, length, height]`.
    #[inline]
    #[must_use]
    pub const fn dimensions(&self) -> [usize; 3] {
        [self.width, self.length, self.height]
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.length + y) * self.height + z
    }

    /// Color at a cell; out-of-range cells read as empty.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u8 {
        if x >= self.width || y >= self.length || z >= self.height {
            return EMPTY_VOXEL;
        }
        self.cells[self.index(x, y, z)]
    }

    /// Sets a cell; out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, color: u8) {
        if x < self.width && y < self.length && z < self.height {
            let i = self.index(x, y, z);
            self.cells[i] = color;
        }
    }

    /// Number of filled cells.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|&&c| c != EMPTY_VOXEL).count()
    }

    /// Exposed faces of one cell. Grid edges count as exposed; empty cells
    /// have no faces.
    #[must_use]
    pub fn visibility(&self, x: usize, y: usize, z: usize) -> FaceMask {
        if self.get(x, y, z) == EMPTY_VOXEL {
            return FaceMask::NONE;
        }
        let open = |cond: bool, face: FaceMask| if cond { face } else { FaceMask::NONE };
        open(x == 0 || self.get(x - 1, y, z) == EMPTY_VOXEL, FaceMask::LEFT)
            | open(self.get(x + 1, y, z) == EMPTY_VOXEL, FaceMask::RIGHT)
            | open(y == 0 || self.get(x, y - 1, z) == EMPTY_VOXEL, FaceMask::FRONT)
            | open(self.get(x, y + 1, z) == EMPTY_VOXEL, FaceMask::BACK)
            | open(z == 0 || self.get(x, y, z - 1) == EMPTY_VOXEL, FaceMask::TOP)
            | open(self.get(x, y, z + 1) == EMPTY_VOXEL, FaceMask::BOTTOM)
    }

    /// Visibility of every cell, in grid order.
    #[must_use]
    pub fn visibility_map(&self) -> Vec<FaceMask> {
        let mut out = Vec::with_capacity(self.cells.len());
        for x in 0..self.width {
            for y in 0..self.length {
                for z in 0..self.height {
                    out.push(self.visibility(x, y, z));
                }
            }
        }
        out
    }

    /// Empties every cell whose mask in `visibility` is zero.
    ///
    /// Returns the number of cells removed.
    pub fn prune(&mut self, visibility: &[FaceMask]) -> usize {
        let mut removed = 0;
        for (cell, mask) in self.cells.iter_mut().zip(visibility) {
            if *cell != EMPTY_VOXEL && mask.is_empty() {
                *cell = EMPTY_VOXEL;
                removed += 1;
            }
        }
        removed
    }
}

/// Converts VOX bytes into KVX bytes with default settings.
///
/// # Errors
///
/// See [`convert_to_kvx_with`].
pub fn convert_to_kvx(bytes: &[u8]) -> ExchangeResult<Vec<u8>> {
    convert_to_kvx_with(bytes, &ExchangeConfig::default())
}

/// Converts VOX bytes into KVX bytes.
///
/// The output has a single mip level whose pivot sits at the bottom
/// center of the model.
///
/// # Errors
///
/// Returns an [`crate::ExchangeError`] if the VOX data is malformed or an
/// X slice of the result exceeds 16-bit column offsets.
pub fn convert_to_kvx_with(bytes: &[u8], config: &ExchangeConfig) -> ExchangeResult<Vec<u8>> {
    let model = parse_vox(bytes)?;
    let volume = model_to_volume(&model, config)?;
    Ok(encode(&volume))
}

/// Builds a single-mip volume from a parsed model.
///
/// # Errors
///
/// Returns [`crate::ExchangeError::ColumnTooLarge`] if an X slice of slab
/// data exceeds 65535 bytes.
pub fn model_to_volume(model: &VoxModel, config: &ExchangeConfig) -> ExchangeResult<VoxelVolume> {
    let mut grid = VoxelGrid::from_model(model);
    let visibility = grid.visibility_map();
    if config.prune_hidden {
        let removed = grid.prune(&visibility);
        tracing::debug!(removed, remaining = grid.filled(), "pruned hidden voxels");
    }

    let [width, length, height] = grid.dimensions();
    let pivot = [width as f64 / 2.0, length as f64 / 2.0, height as f64];
    let mut builder = MipBuilder::new(width, length, height).with_pivot(pivot);
    let mut run = Vec::with_capacity(MAX_SLAB_LENGTH);

    for x in 0..width {
        for y in 0..length {
            let column = grid.index(x, y, 0);
            for z in 0..height {
                let color = grid.cells[column + z];
                let mask = visibility[column + z];
                if color != EMPTY_VOXEL {
                    run.push(color);
                }
                let flush = !run.is_empty()
                    && (z + 1 == height
                        || grid.cells[column + z + 1] == EMPTY_VOXEL
                        || visibility[column + z + 1] != mask
                        || run.len() == MAX_SLAB_LENGTH);
                if flush {
                    // height <= 256, so z and the run start fit a byte
                    let z_top = (z + 1 - run.len()) as u8;
                    builder.push_slab(x, y, z_top, mask, &run)?;
                    run.clear();
                }
            }
        }
    }

    let mip = builder.build()?;
    let palette = VgaPalette::from_rgb(&model.palette);
    tracing::debug!(width, length, height, bytes = mip.slab_data().len(), "converted VOX model");
    Ok(VoxelVolume::from_mip(mip, Some(palette)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::chunks::VoxVoxel;
    use crate::palette::{Rgb, RgbPalette};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn model(width: u32, length: u32, height: u32, cells: &[(u8, u8, u8, u8)]) -> VoxModel {
        VoxModel {
            width,
            length,
            height,
            voxels: cells
                .iter()
                .map(|&(x, y, z, color_index)| VoxVoxel { x, y, z, color_index })
                .collect(),
            palette: RgbPalette::from_fn(|i| Rgb::new(i, i, i)),
            has_custom_palette: true,
        }
    }

    fn solid(n: u8) -> VoxModel {
        let mut cells = Vec::new();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    cells.push((x, y, z, 1));
                }
            }
        }
        model(u32::from(n), u32::from(n), u32::from(n), &cells)
    }

    #[test]
    fn test_single_voxel_is_fully_exposed() {
        let volume = model_to_volume(&model(1, 1, 1, &[(0, 0, 0, 7)]), &ExchangeConfig::default()).unwrap();
        let mip = &volume.mips()[0];

        let slabs: Vec<_> = mip.column(0, 0).collect();
        assert_eq!(slabs.len(), 1);
        assert_eq!(slabs[0].cull, FaceMask::ALL);
        assert_eq!(slabs[0].colors, &[7]);
        assert_eq!(mip.pivot(), [0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_enclosed_center_is_pruned() {
        let mut grid = VoxelGrid::from_model(&solid(3));
        let visibility = grid.visibility_map();
        assert!(visibility[grid.index(1, 1, 1)].is_empty());

        assert_eq!(grid.prune(&visibility), 1);
        assert_eq!(grid.get(1, 1, 1), EMPTY_VOXEL);
        assert_eq!(grid.filled(), 26);
    }

    /// Every surviving cell keeps at least the faces it had before pruning.
    fn assert_prune_only_opens_faces(mut grid: VoxelGrid) {
        let before = grid.visibility_map();
        grid.prune(&before);
        let after = grid.visibility_map();

        let [width, length, height] = grid.dimensions();
        for x in 0..width {
            for y in 0..length {
                for z in 0..height {
                    let i = grid.index(x, y, z);
                    if grid.get(x, y, z) == EMPTY_VOXEL {
                        assert!(before[i].is_empty(), "exposed cell ({x}, {y}, {z}) was pruned");
                    } else {
                        assert!(
                            after[i].contains(before[i]),
                            "cell ({x}, {y}, {z}) lost faces: {:?} -> {:?}",
                            before[i],
                            after[i]
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_pruning_never_hides_faces() {
        assert_prune_only_opens_faces(VoxelGrid::from_model(&solid(3)));

        for seed in 0..16u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (width, length, height) = (rng.gen_range(1..8), rng.gen_range(1..8), rng.gen_range(1..8));
            let fill = rng.gen_range(0.3..0.95);
            let mut grid = VoxelGrid::new(width, length, height);
            for x in 0..width {
                for y in 0..length {
                    for z in 0..height {
                        if rng.gen_bool(fill) {
                            grid.set(x, y, z, rng.gen_range(1..=255));
                        }
                    }
                }
            }
            assert_prune_only_opens_faces(grid);
        }
    }

    #[test]
    fn test_masks_come_from_unpruned_grid() {
        let volume = model_to_volume(&solid(3), &ExchangeConfig::default()).unwrap();
        let mip = &volume.mips()[0];

        // center column: top and bottom caps, hole in the middle
        let center: Vec<_> = mip.column(1, 1).collect();
        assert_eq!(center.len(), 2);
        assert_eq!((center[0].z_top, center[0].cull), (0, FaceMask::TOP));
        assert_eq!((center[1].z_top, center[1].cull), (2, FaceMask::BOTTOM));
    }

    #[test]
    fn test_prune_disabled_keeps_hidden_cells() {
        let config = ExchangeConfig {
            prune_hidden: false,
            ..ExchangeConfig::default()
        };
        let volume = model_to_volume(&solid(3), &config).unwrap();
        let center: Vec<_> = volume.mips()[0].column(1, 1).collect();

        assert_eq!(center.len(), 3);
        assert_eq!(center[1].cull, FaceMask::NONE);
        assert_eq!(volume.mips()[0].voxel_count(), 27);
    }

    #[test]
    fn test_runs_split_on_mask_change() {
        // a 1x1 column of 4: top and bottom differ from the middle two
        let cells: Vec<_> = (0..4).map(|z| (0, 0, z, 2)).collect();
        let volume = model_to_volume(&model(1, 1, 4, &cells), &ExchangeConfig::default()).unwrap();
        let slabs: Vec<_> = volume.mips()[0].column(0, 0).collect();

        assert_eq!(slabs.len(), 3);
        assert_eq!(slabs[0].z_length(), 1);
        assert_eq!(slabs[1].z_top, 1);
        assert_eq!(slabs[1].z_length(), 2);
        assert_eq!(slabs[2].cull, FaceMask::LEFT | FaceMask::RIGHT | FaceMask::FRONT | FaceMask::BACK | FaceMask::BOTTOM);
    }

    #[test]
    fn test_palette_is_quantized() {
        let volume = model_to_volume(&model(1, 1, 1, &[(0, 0, 0, 1)]), &ExchangeConfig::default()).unwrap();
        let palette = volume.palette().unwrap();
        assert_eq!(palette.raw(255), [63, 63, 63]);
        assert_eq!(palette.raw(4), [1, 1, 1]);
    }

    #[test]
    fn test_output_decodes() {
        let mut cells = Vec::new();
        for z in 0..10 {
            cells.push((2, 1, z, 3));
        }
        let volume = model_to_volume(&model(4, 3, 10, &cells), &ExchangeConfig::default()).unwrap();
        let decoded = crate::kvx::decode(&encode(&volume)).unwrap();

        assert_eq!(decoded.mips()[0], volume.mips()[0]);
        assert_eq!(decoded.mips()[0].voxel_count(), 10);
    }
}
