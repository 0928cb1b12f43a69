//! # Mesh Error Types

use thiserror::Error;

/// Errors produced while exporting a mesh to disk.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The mesh has no vertices; there is nothing to write.
    #[error("mesh has no geometry to export")]
    EmptyMesh,

    /// An output file could not be written.
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    /// The glTF document could not be serialized.
    #[error("failed to serialize glTF document: {0}")]
    Json(#[from] serde_json::Error),

    /// The swatch could not be encoded as PNG.
    #[error("failed to encode swatch texture: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for mesh export.
pub type ExportResult<T> = Result<T, ExportError>;
