//! # VOX Exchange Format
//!
//! MagicaVoxel `.vox` models are converted to KVX once at load time and
//! then go through the normal decoder, so every consumer sees one format.
//!
//! ```text
//! VOX bytes ──► parse_vox ──► VoxModel ──► model_to_volume ──► encode ──► KVX bytes
//!                                 │
//!                                 └─ dense grid, visibility masks, pruning
//! ```

mod chunks;
mod convert;

pub use chunks::{default_palette, parse_vox, VoxModel, VoxVoxel, MAX_VOX_EXTENT, VOX_MAGIC};
pub use convert::{convert_to_kvx, convert_to_kvx_with, model_to_volume, VoxelGrid, EMPTY_VOXEL};
