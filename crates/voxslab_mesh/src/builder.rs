//! # Slab Mesher
//!
//! Turns the slabs of one mip level into an indexed quad mesh.
//!
//! Every slab contributes:
//! - a TOP quad at `z_top` colored by its first voxel,
//! - one quad per exposed side for each run of equal colors,
//! - a BOTTOM quad at `z_top + z_length` colored by its last voxel.
//!
//! Which of these exist is decided entirely by the slab's cull mask; the
//! mesher never looks at neighbouring columns.
//!
//! ## Axis Conversion
//!
//! ```text
//! voxel space (x, y, z), z down   ──►   engine space
//!   x' =  x - pivot.x
//!   y' = -z + pivot.z                  (up)
//!   z' = -y + pivot.y
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use voxslab_core::kvx::{FaceMask, MipLevel, Slab, VoxelVolume};

use crate::vertex::{pack_normal, ModelVertex, VertexKey};

/// Mesher settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Store the face normal in each vertex. When off, every vertex gets
    /// normal `0` and same-colored corners are shared across faces.
    pub face_normals: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self { face_normals: true }
    }
}

/// Indexed triangle mesh, two triangles per quad.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoxelMesh {
    /// Unique vertices.
    pub vertices: Vec<ModelVertex>,
    /// Triangle list, six indices per quad.
    pub indices: Vec<u32>,
}

impl VoxelMesh {
    /// Check if mesh is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Get vertex count.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get quad count.
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Axis-aligned bounds of all vertices, `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(mut lo, mut hi), v| {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(v.position[axis]);
                hi[axis] = hi[axis].max(v.position[axis]);
            }
            (lo, hi)
        }))
    }
}

/// A quad corner in voxel space.
type Corner = [usize; 3];

/// The six faces of a voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    /// −X.
    Left,
    /// +X.
    Right,
    /// −Y.
    Front,
    /// +Y.
    Back,
    /// Up (low Z).
    Top,
    /// Down (high Z).
    Bottom,
}

impl Face {
    /// Cull bit of this face.
    #[must_use]
    pub const fn mask(self) -> FaceMask {
        match self {
            Self::Left => FaceMask::LEFT,
            Self::Right => FaceMask::RIGHT,
            Self::Front => FaceMask::FRONT,
            Self::Back => FaceMask::BACK,
            Self::Top => FaceMask::TOP,
            Self::Bottom => FaceMask::BOTTOM,
        }
    }

    /// Outward normal in engine space.
    #[must_use]
    pub const fn normal(self) -> [f32; 3] {
        match self {
            Self::Left => [-1.0, 0.0, 0.0],
            Self::Right => [1.0, 0.0, 0.0],
            Self::Front => [0.0, 0.0, 1.0],
            Self::Back => [0.0, 0.0, -1.0],
            Self::Top => [0.0, 1.0, 0.0],
            Self::Bottom => [0.0, -1.0, 0.0],
        }
    }

    const SIDES: [Self; 4] = [Self::Left, Self::Right, Self::Front, Self::Back];

    /// Quad corners `[a, b, c, d]` in voxel space for a run covering
    /// `z0..z1` of column `(x, y)`. TOP sits at `z0`, BOTTOM at `z1`.
    fn corners(self, x: usize, y: usize, z0: usize, z1: usize) -> [Corner; 4] {
        match self {
            Self::Left => [[x, y, z0], [x, y + 1, z0], [x, y, z1], [x, y + 1, z1]],
            Self::Right => [[x + 1, y + 1, z0], [x + 1, y, z0], [x + 1, y + 1, z1], [x + 1, y, z1]],
            Self::Front => [[x + 1, y, z0], [x, y, z0], [x + 1, y, z1], [x, y, z1]],
            Self::Back => [[x, y + 1, z0], [x + 1, y + 1, z0], [x, y + 1, z1], [x + 1, y + 1, z1]],
            Self::Top => [[x, y, z0], [x + 1, y, z0], [x, y + 1, z0], [x + 1, y + 1, z0]],
            Self::Bottom => [[x + 1, y, z1], [x, y, z1], [x + 1, y + 1, z1], [x, y + 1, z1]],
        }
    }
}

/// Palette swatch UV for a color index.
#[inline]
#[must_use]
pub fn palette_uv(color: u8) -> [f32; 2] {
    [
        (f32::from(color & 15) + 0.5) / 16.0,
        (f32::from(color / 16) + 0.5) / 16.0,
    ]
}

/// Builds the mesh of mip `mip` with default settings.
#[must_use]
pub fn build_mesh(volume: &VoxelVolume, mip: usize) -> VoxelMesh {
    build_mesh_with(volume, mip, &MeshConfig::default())
}

/// Builds the mesh of mip `mip`.
///
/// An out-of-range mip index yields an empty mesh.
#[must_use]
pub fn build_mesh_with(volume: &VoxelVolume, mip: usize, config: &MeshConfig) -> VoxelMesh {
    let Some(level) = volume.mip(mip) else {
        tracing::warn!(mip, available = volume.mip_count(), "mesh requested for missing mip level");
        return VoxelMesh::default();
    };
    let mut builder = SlabMesher::new(level, config);
    for (x, y, slab) in level.slabs() {
        builder.add_slab(x, y, &slab);
    }
    let mesh = builder.finish();
    tracing::debug!(
        mip,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "built voxel mesh"
    );
    mesh
}

/// Per-call mesher state; the vertex map never outlives one build.
struct SlabMesher {
    pivot: [f32; 3],
    face_normals: bool,
    mesh: VoxelMesh,
    interned: HashMap<VertexKey, u32>,
}

impl SlabMesher {
    #[allow(clippy::cast_possible_truncation)]
    fn new(level: &MipLevel, config: &MeshConfig) -> Self {
        let [px, py, pz] = level.pivot();
        Self {
            pivot: [px as f32, py as f32, pz as f32],
            face_normals: config.face_normals,
            mesh: VoxelMesh::default(),
            interned: HashMap::new(),
        }
    }

    fn finish(self) -> VoxelMesh {
        self.mesh
    }

    fn add_slab(&mut self, x: usize, y: usize, slab: &Slab<'_>) {
        let Some((&first, _)) = slab.colors.split_first() else {
            return;
        };
        let z_top = usize::from(slab.z_top);
        let z_end = slab.z_end();

        if slab.cull.contains(FaceMask::TOP) {
            self.add_face(Face::Top, Face::Top.corners(x, y, z_top, z_top), first);
        }

        if Face::SIDES.iter().any(|face| slab.cull.contains(face.mask())) {
            let mut start = 0;
            while let Some(&color) = slab.colors.get(start) {
                let run = slab.colors[start..].iter().take_while(|&&c| c == color).count();
                let (z0, z1) = (z_top + start, z_top + start + run);
                for face in Face::SIDES {
                    if slab.cull.contains(face.mask()) {
                        self.add_face(face, face.corners(x, y, z0, z1), color);
                    }
                }
                start += run;
            }
        }

        if slab.cull.contains(FaceMask::BOTTOM) {
            let last = slab.colors[slab.colors.len() - 1];
            self.add_face(Face::Bottom, Face::Bottom.corners(x, y, z_end, z_end), last);
        }
    }

    /// Emits one quad from corners `[a, b, c, d]` as triangles `(a, b, d)`
    /// and `(b, c, d)`; corners are pushed in order `a, b, d, c`.
    fn add_face(&mut self, face: Face, [a, b, c, d]: [Corner; 4], color: u8) {
        let uv = palette_uv(color);
        let packed_normal = if self.face_normals { pack_normal(face.normal()) } else { 0 };
        let mut index = [0u32; 4];
        for (slot, corner) in index.iter_mut().zip([a, b, d, c]) {
            *slot = self.intern(ModelVertex {
                position: self.to_engine(corner),
                uv,
                packed_normal,
            });
        }
        self.mesh
            .indices
            .extend_from_slice(&[index[0], index[1], index[3], index[1], index[2], index[3]]);
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_engine(&self, [x, y, z]: Corner) -> [f32; 3] {
        let [px, py, pz] = self.pivot;
        [x as f32 - px, -(z as f32) + pz, -(y as f32) + py]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn intern(&mut self, vertex: ModelVertex) -> u32 {
        let vertices = &mut self.mesh.vertices;
        *self.interned.entry(vertex.key()).or_insert_with(|| {
            vertices.push(vertex);
            (vertices.len() - 1) as u32
        })
    }
}
