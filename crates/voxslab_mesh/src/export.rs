//! # glTF Export
//!
//! Writes one mesh as a glTF 2.0 asset next to its buffer and texture:
//!
//! ```text
//! <folder>/<name>.gltf      JSON document
//! <folder>/<name>.bin       vertex records, then u32 indices
//! <folder>/vx_<name>.png    16×16 palette swatch
//! ```
//!
//! Vertices are stored as whole [`ModelVertex`] records, so `POSITION` and
//! `TEXCOORD_0` are two strided views of the same buffer view. Packed normals
//! ride along in the stride but are not declared; glTF has no 2-10-10-10
//! attribute format. The scene node turns the model 180° about Z.

use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use serde::Serialize;

use crate::builder::VoxelMesh;
use crate::error::{ExportError, ExportResult};
use crate::swatch::{SwatchTexture, SWATCH_SIZE};
use crate::vertex::ModelVertex;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FILTER_NEAREST: u32 = 9728;
const WRAP_REPEAT: u32 = 10497;
const MODE_TRIANGLES: u32 = 4;

/// Byte offset of the UV inside a [`ModelVertex`].
const UV_OFFSET: usize = 12;

#[allow(clippy::cast_possible_truncation)]
const SWATCH_EDGE: u32 = SWATCH_SIZE as u32;

/// Name of the generator recorded in every exported asset.
pub const GENERATOR: &str = "voxslab";

/// Path of the `.gltf` document for `name` inside `folder`.
#[must_use]
pub fn gltf_path(folder: impl AsRef<Path>, name: &str) -> PathBuf {
    folder.as_ref().join(format!("{name}.gltf"))
}

/// File name of the binary buffer for `name`.
#[must_use]
pub fn buffer_file_name(name: &str) -> String {
    format!("{name}.bin")
}

/// File name of the swatch texture for `name`.
#[must_use]
pub fn texture_file_name(name: &str) -> String {
    format!("{}.png", material_name(name))
}

/// Material name for `name`; also the texture's base name.
#[must_use]
pub fn material_name(name: &str) -> String {
    format!("vx_{name}")
}

/// A mesh rendered into the three parts of a glTF asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GltfExport {
    /// The `.gltf` JSON document.
    pub document: String,
    /// The `.bin` buffer the document points at.
    pub buffer: Vec<u8>,
    /// The PNG swatch the material samples.
    pub texture: Vec<u8>,
}

/// Renders a mesh and its swatch as glTF parts without touching disk.
///
/// # Errors
///
/// [`ExportError::EmptyMesh`] if the mesh has no vertices, or an encoding
/// error from the JSON or PNG writers.
pub fn export_gltf(name: &str, mesh: &VoxelMesh, swatch: &SwatchTexture) -> ExportResult<GltfExport> {
    let (min, max) = mesh.bounds().ok_or(ExportError::EmptyMesh)?;
    let buffer = encode_buffer(mesh);
    let document = Document::new(name, mesh, min, max, buffer.len());

    Ok(GltfExport {
        document: serde_json::to_string_pretty(&document)?,
        buffer,
        texture: encode_png(swatch)?,
    })
}

/// Exports a mesh into `folder`, creating it if needed.
///
/// Returns the path of the written `.gltf` document.
///
/// # Errors
///
/// See [`export_gltf`]; also fails if a file cannot be written.
pub fn write_gltf(
    folder: impl AsRef<Path>,
    name: &str,
    mesh: &VoxelMesh,
    swatch: &SwatchTexture,
) -> ExportResult<PathBuf> {
    let export = export_gltf(name, mesh, swatch)?;
    let folder = folder.as_ref();
    fs::create_dir_all(folder)?;
    fs::write(folder.join(buffer_file_name(name)), &export.buffer)?;
    fs::write(folder.join(texture_file_name(name)), &export.texture)?;

    let path = gltf_path(folder, name);
    fs::write(&path, &export.document)?;
    tracing::info!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "wrote glTF model"
    );
    Ok(path)
}

/// Vertex records then indices, little-endian.
fn encode_buffer(mesh: &VoxelMesh) -> Vec<u8> {
    let mut out = Vec::with_capacity(mesh.vertices.len() * ModelVertex::SIZE + mesh.indices.len() * 4);
    for v in &mesh.vertices {
        for value in v.position.iter().chain(&v.uv) {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&v.packed_normal.to_le_bytes());
    }
    for index in &mesh.indices {
        out.extend_from_slice(&index.to_le_bytes());
    }
    out
}

fn encode_png(swatch: &SwatchTexture) -> ExportResult<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(&swatch.to_rgba8(), SWATCH_EDGE, SWATCH_EDGE, ColorType::Rgba8)?;
    Ok(png)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    asset: Asset,
    scene: usize,
    scenes: Vec<Scene>,
    nodes: Vec<Node>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    textures: Vec<Texture>,
    images: Vec<Image>,
    samplers: Vec<Sampler>,
    accessors: Vec<Accessor>,
    buffer_views: Vec<BufferView>,
    buffers: Vec<Buffer>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct Scene {
    name: &'static str,
    nodes: Vec<usize>,
}

#[derive(Serialize)]
struct Node {
    name: &'static str,
    mesh: usize,
    rotation: [f32; 4],
    scale: [f32; 3],
}

#[derive(Serialize)]
struct Mesh {
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: Attributes,
    indices: usize,
    material: usize,
    mode: u32,
}

#[derive(Serialize)]
struct Attributes {
    #[serde(rename = "POSITION")]
    position: usize,
    #[serde(rename = "TEXCOORD_0")]
    texcoord: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Material {
    name: String,
    pbr_metallic_roughness: MetallicRoughness,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetallicRoughness {
    base_color_texture: TextureRef,
    base_color_factor: [f32; 4],
    metallic_factor: f32,
    roughness_factor: f32,
}

#[derive(Serialize)]
struct TextureRef {
    index: usize,
}

#[derive(Serialize)]
struct Texture {
    sampler: usize,
    source: usize,
}

#[derive(Serialize)]
struct Image {
    uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Sampler {
    mag_filter: u32,
    min_filter: u32,
    wrap_s: u32,
    wrap_t: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    byte_offset: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    byte_stride: Option<usize>,
    target: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    uri: String,
    byte_length: usize,
}

impl Document {
    fn new(name: &str, mesh: &VoxelMesh, min: [f32; 3], max: [f32; 3], buffer_len: usize) -> Self {
        let vertex_bytes = mesh.vertices.len() * ModelVertex::SIZE;
        let vertices = |byte_offset: usize, kind: &'static str| Accessor {
            buffer_view: 0,
            byte_offset,
            component_type: COMPONENT_FLOAT,
            count: mesh.vertices.len(),
            kind,
            min: None,
            max: None,
        };

        Self {
            asset: Asset {
                version: "2.0",
                generator: GENERATOR,
            },
            scene: 0,
            scenes: vec![Scene {
                name: "default",
                nodes: vec![0],
            }],
            nodes: vec![Node {
                name: "main",
                mesh: 0,
                rotation: [0.0, 0.0, 1.0, 0.0],
                scale: [1.0; 3],
            }],
            meshes: vec![Mesh {
                primitives: vec![Primitive {
                    attributes: Attributes {
                        position: 0,
                        texcoord: 1,
                    },
                    indices: 2,
                    material: 0,
                    mode: MODE_TRIANGLES,
                }],
            }],
            materials: vec![Material {
                name: material_name(name),
                pbr_metallic_roughness: MetallicRoughness {
                    base_color_texture: TextureRef { index: 0 },
                    base_color_factor: [1.0; 4],
                    metallic_factor: 0.0,
                    roughness_factor: 1.0,
                },
            }],
            textures: vec![Texture { sampler: 0, source: 0 }],
            images: vec![Image {
                uri: texture_file_name(name),
            }],
            samplers: vec![Sampler {
                mag_filter: FILTER_NEAREST,
                min_filter: FILTER_NEAREST,
                wrap_s: WRAP_REPEAT,
                wrap_t: WRAP_REPEAT,
            }],
            accessors: vec![
                Accessor {
                    min: Some(min),
                    max: Some(max),
                    ..vertices(0, "VEC3")
                },
                vertices(UV_OFFSET, "VEC2"),
                Accessor {
                    buffer_view: 1,
                    byte_offset: 0,
                    component_type: COMPONENT_UNSIGNED_INT,
                    count: mesh.indices.len(),
                    kind: "SCALAR",
                    min: None,
                    max: None,
                },
            ],
            buffer_views: vec![
                BufferView {
                    buffer: 0,
                    byte_offset: 0,
                    byte_length: vertex_bytes,
                    byte_stride: Some(ModelVertex::SIZE),
                    target: TARGET_ARRAY_BUFFER,
                },
                BufferView {
                    buffer: 0,
                    byte_offset: vertex_bytes,
                    byte_length: buffer_len - vertex_bytes,
                    byte_stride: None,
                    target: TARGET_ELEMENT_ARRAY_BUFFER,
                },
            ],
            buffers: vec![Buffer {
                uri: buffer_file_name(name),
                byte_length: buffer_len,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_mesh, build_mesh_with, MeshConfig};
    use image::ImageFormat;
    use serde_json::Value;
    use voxslab_core::palette::RgbPalette;
    use voxslab_core::{FaceMask, MipBuilder, VoxelVolume};

    fn pillar() -> VoxelVolume {
        let mut builder = MipBuilder::new(2, 1, 3).with_pivot([1.0, 0.5, 3.0]);
        builder.push_slab(0, 0, 0, FaceMask::ALL, &[1, 2, 3]).unwrap();
        builder.push_slab(1, 0, 2, FaceMask::ALL, &[40]).unwrap();
        VoxelVolume::from_mip(builder.build().unwrap(), None)
    }

    fn swatch() -> SwatchTexture {
        SwatchTexture::from_palette(&RgbPalette::grayscale())
    }

    /// Reads `(count, bufferView, byteOffset)` of every accessor.
    fn accessors(document: &str) -> Vec<(u64, u64, u64)> {
        let json: Value = serde_json::from_str(document).unwrap();
        json["accessors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| {
                (
                    a["count"].as_u64().unwrap(),
                    a["bufferView"].as_u64().unwrap(),
                    a["byteOffset"].as_u64().unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_accessor_counts_match_mesh() {
        let mesh = build_mesh(&pillar(), 0);
        let export = export_gltf("pillar", &mesh, &swatch()).unwrap();
        let (v, i) = (mesh.vertex_count() as u64, mesh.indices.len() as u64);

        assert_eq!(accessors(&export.document), vec![(v, 0, 0), (v, 0, 12), (i, 1, 0)]);
        assert_eq!(export.buffer.len() as u64, v * 24 + i * 4);

        let json: Value = serde_json::from_str(&export.document).unwrap();
        assert_eq!(json["asset"]["version"], "2.0");
        assert_eq!(json["buffers"][0]["byteLength"].as_u64(), Some(export.buffer.len() as u64));
        assert_eq!(json["buffers"][0]["uri"], "pillar.bin");
        assert_eq!(json["bufferViews"][0]["byteStride"], 24);
        assert_eq!(json["bufferViews"][1]["byteOffset"].as_u64(), Some(v * 24));
        assert!(json["bufferViews"][1].get("byteStride").is_none());
        assert_eq!(json["images"][0]["uri"], "vx_pillar.png");
        assert_eq!(json["materials"][0]["name"], "vx_pillar");
        assert_eq!(json["samplers"][0]["magFilter"], 9728);
        assert_eq!(json["meshes"][0]["primitives"][0]["attributes"]["TEXCOORD_0"], 1);
    }

    #[test]
    fn test_position_bounds_are_declared() {
        let mesh = build_mesh(&pillar(), 0);
        let export = export_gltf("pillar", &mesh, &swatch()).unwrap();
        let json: Value = serde_json::from_str(&export.document).unwrap();
        let (min, max) = mesh.bounds().unwrap();

        let read = |v: &Value| -> Vec<f64> { v.as_array().unwrap().iter().map(|x| x.as_f64().unwrap()).collect() };
        assert_eq!(read(&json["accessors"][0]["min"]), min.map(f64::from).to_vec());
        assert_eq!(read(&json["accessors"][0]["max"]), max.map(f64::from).to_vec());
        assert!(json["accessors"][1].get("min").is_none());
    }

    #[test]
    fn test_buffer_holds_mesh() {
        let mesh = build_mesh_with(&pillar(), 0, &MeshConfig { face_normals: false });
        let export = export_gltf("pillar", &mesh, &swatch()).unwrap();

        let vertex_bytes = mesh.vertex_count() * ModelVertex::SIZE;
        let (vertices, indices) = export.buffer.split_at(vertex_bytes);
        assert_eq!(vertices, bytemuck::cast_slice::<ModelVertex, u8>(&mesh.vertices));
        let read: Vec<u32> = indices
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(read, mesh.indices);
    }

    #[test]
    fn test_texture_is_swatch_png() {
        let export = export_gltf("pillar", &build_mesh(&pillar(), 0), &swatch()).unwrap();
        let image = image::load_from_memory_with_format(&export.texture, ImageFormat::Png)
            .unwrap()
            .to_rgba8();

        assert_eq!(image.dimensions(), (16, 16));
        assert_eq!(image.get_pixel(5, 0).0, [5, 5, 5, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [16, 16, 16, 255]);
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let err = export_gltf("nothing", &VoxelMesh::default(), &swatch()).unwrap_err();
        assert!(matches!(err, ExportError::EmptyMesh));
    }

    #[test]
    fn test_write_gltf_round_trip() {
        let folder = std::env::temp_dir().join(format!("voxslab_gltf_{}", std::process::id()));
        let mesh = build_mesh(&pillar(), 0);

        let path = write_gltf(&folder, "pillar", &mesh, &swatch()).unwrap();
        assert_eq!(path, gltf_path(&folder, "pillar"));

        let document = fs::read_to_string(&path).unwrap();
        let buffer = fs::read(folder.join("pillar.bin")).unwrap();
        let texture = fs::read(folder.join("vx_pillar.png")).unwrap();
        fs::remove_dir_all(&folder).unwrap();

        let counts: Vec<u64> = accessors(&document).iter().map(|a| a.0).collect();
        assert_eq!(counts, vec![mesh.vertex_count() as u64, mesh.vertex_count() as u64, mesh.indices.len() as u64]);
        assert_eq!(buffer.len(), mesh.vertex_count() * 24 + mesh.indices.len() * 4);
        assert!(image::load_from_memory_with_format(&texture, ImageFormat::Png).is_ok());
    }
}
