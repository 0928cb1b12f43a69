//! # Voxel Error Types
//!
//! All errors that can occur while decoding, converting or loading voxels.
//! Every variant means "this voxel is absent": nothing partially decoded is
//! ever handed back to the caller.

use thiserror::Error;

/// Errors produced by the KVX decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input is shorter than the trailing palette plus one length prefix.
    #[error("voxel data too short: {len} bytes")]
    TooShort {
        /// Length of the input buffer.
        len: usize,
    },

    /// No mip level could be parsed.
    #[error("no mip levels found")]
    NoMipLevels,

    /// The last mip level does not end exactly where the palette begins.
    #[error("mip data ends at byte {actual}, palette starts at byte {expected}")]
    PaletteMisaligned {
        /// Where the palette must start (`len - 768`).
        expected: usize,
        /// Where mip parsing actually stopped.
        actual: usize,
    },

    /// A mip level declares a negative grid extent.
    #[error("mip {level}: negative extent {value}")]
    NegativeExtent {
        /// Mip level index.
        level: usize,
        /// The offending extent.
        value: i32,
    },

    /// The offset tables do not fit in the declared mip size.
    #[error("mip {level}: offset tables need {needed} bytes, mip holds {available}")]
    OffsetTableOverflow {
        /// Mip level index.
        level: usize,
        /// Bytes required by header plus offset tables.
        needed: u64,
        /// Bytes declared by the mip's length prefix.
        available: u64,
    },

    /// The first X offset does not point at the start of the slab data.
    #[error("mip {level}: first column offset is {value}, expected 0")]
    FirstOffsetNonZero {
        /// Mip level index.
        level: usize,
        /// Re-based first offset.
        value: i64,
    },

    /// The last X offset does not point just past the slab data.
    #[error("mip {level}: last column offset is {actual}, expected {expected}")]
    LastOffsetMismatch {
        /// Mip level index.
        level: usize,
        /// Size of the slab data region.
        expected: usize,
        /// Re-based last offset.
        actual: i64,
    },

    /// A column starts outside of the slab data region.
    #[error("mip {level}: column ({x}, {y}) starts at {offset}, slab data is {limit} bytes")]
    ColumnOutOfRange {
        /// Mip level index.
        level: usize,
        /// Column X.
        x: usize,
        /// Column Y.
        y: usize,
        /// Computed column start.
        offset: i64,
        /// Size of the slab data region.
        limit: usize,
    },

    /// A slab claims more colors than its mip holds.
    #[error("mip {level}: slab at byte {offset} overruns the slab data")]
    SlabOverrun {
        /// Mip level index.
        level: usize,
        /// Offset of the slab header within the slab data.
        offset: usize,
    },

    /// The buffer ended inside a structure the offsets promised was there.
    #[error("unexpected end of voxel data at byte {offset}")]
    Truncated {
        /// Read position that failed.
        offset: usize,
    },
}

/// Errors produced while converting the VOX exchange format to KVX.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// File does not start with `"VOX "`.
    #[error("invalid VOX magic: {0:?}")]
    BadMagic([u8; 4]),

    /// A chunk tag did not match the required sequence.
    #[error("expected chunk {expected}, found {found}")]
    UnexpectedChunk {
        /// Tag that was required here.
        expected: &'static str,
        /// Tag actually present (lossy UTF-8).
        found: String,
    },

    /// A chunk declared a content size that does not fit its layout.
    #[error("chunk {chunk} has invalid content size {size}")]
    BadChunkSize {
        /// Chunk tag.
        chunk: &'static str,
        /// Declared content size.
        size: i64,
    },

    /// The buffer ended inside a chunk.
    #[error("unexpected end of VOX data at byte {offset}")]
    Truncated {
        /// Read position that failed.
        offset: usize,
    },

    /// Width, length or height is zero.
    #[error("model has empty dimensions {width}x{length}x{height}")]
    EmptyDimensions {
        /// Model width (X).
        width: u32,
        /// Model length (Y).
        length: u32,
        /// Model height (Z).
        height: u32,
    },

    /// Model is larger than the exchange format's u8 coordinates allow.
    #[error("model dimensions {width}x{length}x{height} exceed 256")]
    ModelTooLarge {
        /// Model width (X).
        width: u32,
        /// Model length (Y).
        length: u32,
        /// Model height (Z).
        height: u32,
    },

    /// A voxel lies outside the declared model size.
    #[error("voxel ({x}, {y}, {z}) outside model bounds")]
    VoxelOutOfBounds {
        /// Voxel X.
        x: u8,
        /// Voxel Y.
        y: u8,
        /// Voxel Z.
        z: u8,
    },

    /// A voxel uses color index 0, which is reserved for empty cells.
    #[error("voxel ({x}, {y}, {z}) uses reserved color index 0")]
    ReservedColorIndex {
        /// Voxel X.
        x: u8,
        /// Voxel Y.
        y: u8,
        /// Voxel Z.
        z: u8,
    },

    /// One X slice of slab data no longer fits 16-bit column offsets.
    #[error("column data for x={x} is {size} bytes, exceeds 65535")]
    ColumnTooLarge {
        /// Slice X.
        x: u32,
        /// Byte size of the slice.
        size: usize,
    },

    /// Slab assembly rejected a run the converter produced.
    #[error(transparent)]
    Build(BuildError),
}

/// Errors produced while assembling a mip level slab by slab.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Column coordinates lie outside the level.
    #[error("column ({x}, {y}) outside a {size_x}x{size_y} level")]
    ColumnOutOfBounds {
        /// Column X.
        x: usize,
        /// Column Y.
        y: usize,
        /// Level extent along X.
        size_x: usize,
        /// Level extent along Y.
        size_y: usize,
    },

    /// A slab must hold between 1 and 255 voxels.
    #[error("slab length {len} out of range 1..=255")]
    BadSlabLength {
        /// Number of colors supplied.
        len: usize,
    },

    /// One X slice of slab data no longer fits 16-bit column offsets.
    #[error("slice x={x} is {size} bytes, exceeds 65535")]
    SliceTooLarge {
        /// Slice X.
        x: usize,
        /// Byte size of the slice.
        size: usize,
    },
}

impl From<BuildError> for ExchangeError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::SliceTooLarge { x, size } => Self::ColumnTooLarge {
                x: u32::try_from(x).unwrap_or(u32::MAX),
                size,
            },
            other => Self::Build(other),
        }
    }
}

/// Errors produced while loading configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors produced while loading a voxel through a [`crate::VoxelSource`].
#[derive(Error, Debug)]
pub enum LoadError {
    /// The source has no resource with this name.
    #[error("voxel resource not found: {0}")]
    NotFound(String),

    /// The resource could not be read.
    #[error("failed to read voxel resource: {0}")]
    Io(#[from] std::io::Error),

    /// The resource is not a valid KVX file.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The resource is not a valid VOX file.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Result type for KVX decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for mip construction.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type for VOX conversion.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_errors_keep_their_meaning() {
        let oversized = ExchangeError::from(BuildError::SliceTooLarge { x: 3, size: 70_000 });
        assert_eq!(oversized, ExchangeError::ColumnTooLarge { x: 3, size: 70_000 });

        let bad_run = BuildError::BadSlabLength { len: 0 };
        assert_eq!(ExchangeError::from(bad_run.clone()), ExchangeError::Build(bad_run.clone()));
        assert_eq!(ExchangeError::Build(bad_run.clone()).to_string(), bad_run.to_string());

        let outside = BuildError::ColumnOutOfBounds {
            x: 300,
            y: 2,
            size_x: 4,
            size_y: 4,
        };
        assert!(matches!(
            ExchangeError::from(outside),
            ExchangeError::Build(BuildError::ColumnOutOfBounds { x: 300, .. })
        ));
    }
}
