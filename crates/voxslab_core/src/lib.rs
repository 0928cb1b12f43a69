//! # VOXSLAB Core
//!
//! Format layer for Build-engine style voxel models.
//!
//! ## Design Principles
//!
//! 1. **All or nothing** - a file either decodes completely or is rejected
//! 2. **No panics on input** - every read is bounds-checked
//! 3. **One format inside** - VOX models are converted to KVX on load
//! 4. **External configuration** - limits and defaults come from TOML
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  VOX bytes   │──► │  exchange    │──► │  KVX bytes   │
//! └──────────────┘    └──────────────┘    └──────┬───────┘
//!                                                │ kvx::decode
//!                                                ▼
//!                     ┌──────────────┐    ┌──────────────┐
//!                     │  palette     │◄── │ VoxelVolume  │
//!                     │ remap / rgb  │    │  mip levels  │
//!                     └──────────────┘    └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use voxslab_core::{DirectorySource, VoxelConfig, VoxelRegistry};
//!
//! let registry = VoxelRegistry::new(DirectorySource::new("voxels"), VoxelConfig::load("voxels.toml")?);
//! let def = registry.load_def("torch.kvx", 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod cursor;
pub mod def;
pub mod error;
pub mod exchange;
pub mod kvx;
pub mod palette;
pub mod registry;

pub use config::{DecoderConfig, DefDefaults, ExchangeConfig, VoxelConfig};
pub use def::VoxelDef;
pub use error::{BuildError, ConfigError, DecodeError, DecodeResult, ExchangeError, ExchangeResult, LoadError};
pub use exchange::{convert_to_kvx, convert_to_kvx_with};
pub use kvx::{decode, decode_with, encode, FaceMask, MipBuilder, MipLevel, Slab, VoxelVolume};
pub use palette::{
    compute_voxel_palette_remap, ColorMatcher, NearestColorMatcher, RemapCache, RemapTable, Rgb, RgbPalette,
    VgaPalette,
};
pub use registry::{load_volume, DirectorySource, MemorySource, VoxelRegistry, VoxelSource};
