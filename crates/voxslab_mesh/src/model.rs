//! Renderable voxel models.
//!
//! A [`VoxelModel`] pairs a decoded volume with the swatch texture its UVs
//! sample. The renderer stays behind [`MeshSink`]; this crate never talks to
//! a graphics API.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use voxslab_core::palette::RgbPalette;
use voxslab_core::VoxelVolume;

use crate::builder::{build_mesh_with, MeshConfig, VoxelMesh};
use crate::error::ExportResult;
use crate::export::write_gltf;
use crate::swatch::SwatchTexture;
use crate::vertex::ModelVertex;

/// How a model holds its volume.
#[derive(Debug, Clone)]
pub enum VolumeHandle {
    /// The model is the only user; dropping it frees the volume.
    Owned(Box<VoxelVolume>),
    /// Shared with a registry or other models.
    Shared(Arc<VoxelVolume>),
}

impl VolumeHandle {
    /// Borrows the volume.
    #[inline]
    #[must_use]
    pub fn volume(&self) -> &VoxelVolume {
        match self {
            Self::Owned(volume) => volume,
            Self::Shared(volume) => volume,
        }
    }

    /// Whether the volume is held privately.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

impl Deref for VolumeHandle {
    type Target = VoxelVolume;

    fn deref(&self) -> &VoxelVolume {
        self.volume()
    }
}

impl From<VoxelVolume> for VolumeHandle {
    fn from(volume: VoxelVolume) -> Self {
        Self::Owned(Box::new(volume))
    }
}

impl From<Arc<VoxelVolume>> for VolumeHandle {
    fn from(volume: Arc<VoxelVolume>) -> Self {
        Self::Shared(volume)
    }
}

/// Receives finished geometry; implemented by the renderer.
pub trait MeshSink {
    /// Renderer-side handle for an uploaded mesh.
    type Handle;

    /// Uploads one indexed triangle list.
    fn upload(&mut self, vertices: &[ModelVertex], indices: &[u32]) -> Self::Handle;
}

/// A voxel volume ready to be drawn.
#[derive(Debug, Clone)]
pub struct VoxelModel {
    volume: VolumeHandle,
    swatch: SwatchTexture,
}

impl VoxelModel {
    /// Wraps a volume, building its swatch from its own palette or `fallback`.
    #[must_use]
    pub fn new(volume: impl Into<VolumeHandle>, fallback: &RgbPalette) -> Self {
        let volume = volume.into();
        let swatch = SwatchTexture::for_volume(&volume, fallback);
        Self { volume, swatch }
    }

    /// The volume handle.
    #[must_use]
    pub const fn handle(&self) -> &VolumeHandle {
        &self.volume
    }

    /// The volume.
    #[must_use]
    pub fn volume(&self) -> &VoxelVolume {
        &self.volume
    }

    /// The palette swatch the mesh UVs sample.
    #[must_use]
    pub const fn swatch(&self) -> &SwatchTexture {
        &self.swatch
    }

    /// Meshes one mip level.
    #[must_use]
    pub fn mesh(&self, mip: usize, config: &MeshConfig) -> VoxelMesh {
        build_mesh_with(&self.volume, mip, config)
    }

    /// Meshes one mip level and hands it to `sink`.
    pub fn upload<S: MeshSink>(&self, sink: &mut S, mip: usize, config: &MeshConfig) -> S::Handle {
        let mesh = self.mesh(mip, config);
        tracing::debug!(
            mip,
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "uploading voxel mesh"
        );
        sink.upload(&mesh.vertices, &mesh.indices)
    }

    /// Meshes one mip level and writes it with the swatch as `<folder>/<name>.gltf`.
    ///
    /// # Errors
    ///
    /// See [`write_gltf`].
    pub fn write_gltf(
        &self,
        folder: impl AsRef<Path>,
        name: &str,
        mip: usize,
        config: &MeshConfig,
    ) -> ExportResult<PathBuf> {
        write_gltf(folder, name, &self.mesh(mip, config), &self.swatch)
    }
}
