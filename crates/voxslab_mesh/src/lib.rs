//! # VOXSLAB Mesh
//!
//! Geometry for decoded voxel volumes.
//!
//! ```text
//! VoxelVolume ──► build_mesh ──► VoxelMesh ──► MeshSink (renderer)
//!      │                            ▲    │
//!      └──► SwatchTexture ──────────┘    └──► write_gltf (.gltf + .bin + .png)
//!                                 (UVs sample palette cells)
//! ```
//!
//! Output is an indexed triangle list. Vertices are interned on their exact
//! bit pattern, so shared corners of same-colored faces collapse.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod builder;
pub mod error;
pub mod export;
pub mod model;
pub mod swatch;
pub mod vertex;

pub use builder::{build_mesh, build_mesh_with, palette_uv, Face, MeshConfig, VoxelMesh};
pub use error::{ExportError, ExportResult};
pub use export::{export_gltf, gltf_path, write_gltf, GltfExport};
pub use model::{MeshSink, VolumeHandle, VoxelModel};
pub use swatch::{SwatchTexture, SWATCH_SIZE};
pub use vertex::{pack_normal, unpack_normal, ModelVertex, VertexKey};
