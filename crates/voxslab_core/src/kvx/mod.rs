//! # KVX Voxel Format
//!
//! Build-engine voxel models: a few mip levels of run-length encoded
//! columns plus a 6-bit VGA palette.
//!
//! ## Coordinate System
//!
//! ```text
//!        -Z (up, TOP faces)
//!         │
//!         │   +Y (BACK)
//!         │  /
//!         │ /
//!         └──────── +X (RIGHT)
//!
//! Z grows downward: z_top is the highest voxel of a slab.
//! ```

mod builder;
mod decode;
mod encode;
mod volume;

pub use builder::MipBuilder;
pub use decode::{decode, decode_with};
pub use encode::encode;
pub use volume::{
    FaceMask, MipLevel, Slab, Slabs, VoxelVolume, DEFAULT_MIP_LEVELS, MAX_MIP_LEVELS, MAX_SLAB_LENGTH,
    MIP_HEADER_BYTES, SLAB_HEADER_BYTES,
};
