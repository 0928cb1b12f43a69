//! # VOXSLAB
//!
//! Build-engine voxel models, from file bytes to triangles.
//!
//! ```text
//! .vox ──► exchange ──┐
//!                     ▼
//! .kvx ──────────► decode ──► VoxelVolume ──► build_mesh ──► MeshSink
//!                               │                  │
//!                               │                  └──► write_gltf (.gltf)
//!                               └──► VoxelRegistry (shared, cached)
//! ```
//!
//! [`voxslab_core`] holds the formats and the registry; [`voxslab_mesh`] turns volumes into
//! geometry. The common types are re-exported at the root.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub use voxslab_core;
pub use voxslab_mesh;

pub use voxslab_core::{
    convert_to_kvx, convert_to_kvx_with, decode, decode_with, encode, load_volume, DecodeError, DirectorySource,
    ExchangeError, FaceMask, LoadError, MemorySource, MipLevel, Slab, VoxelConfig, VoxelDef, VoxelRegistry,
    VoxelSource, VoxelVolume,
};
pub use voxslab_mesh::{
    build_mesh, build_mesh_with, gltf_path, write_gltf, ExportError, MeshConfig, MeshSink, ModelVertex, VoxelMesh,
    VoxelModel,
};

/// Per-mip summary used by tooling.
#[derive(Clone, Debug, PartialEq)]
pub struct MipSummary {
    /// Mip index, 0 is full detail.
    pub index: usize,
    /// Extent in voxels.
    pub size: [usize; 3],
    /// Pivot in voxels.
    pub pivot: [f64; 3],
    /// Number of slabs.
    pub slabs: usize,
    /// Number of solid voxels.
    pub voxels: usize,
}

impl MipSummary {
    /// Summarizes one mip level.
    #[must_use]
    pub fn of(index: usize, mip: &MipLevel) -> Self {
        Self {
            index,
            size: [mip.size_x(), mip.size_y(), mip.size_z()],
            pivot: mip.pivot(),
            slabs: mip.slab_count(),
            voxels: mip.voxel_count(),
        }
    }
}

/// Summaries for every mip level of a volume.
#[must_use]
pub fn summarize(volume: &VoxelVolume) -> Vec<MipSummary> {
    volume.mips().iter().enumerate().map(|(i, mip)| MipSummary::of(i, mip)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        let mut builder = voxslab_core::MipBuilder::new(2, 1, 4).with_pivot([1.0, 0.5, 4.0]);
        builder.push_slab(1, 0, 1, FaceMask::ALL, &[3, 3]).unwrap();
        let volume = VoxelVolume::from_mip(builder.build().unwrap(), None);

        let summary = summarize(&volume);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].size, [2, 1, 4]);
        assert_eq!(summary[0].pivot, [1.0, 0.5, 4.0]);
        assert_eq!((summary[0].slabs, summary[0].voxels), (1, 2));
    }
}
