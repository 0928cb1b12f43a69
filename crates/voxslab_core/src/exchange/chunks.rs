//! VOX chunk parsing.
//!
//! Only the first model of a file is read, and only the chunks needed to
//! build a column model: `SIZE`, `XYZI` and the `RGBA` palette. The chunk
//! order is fixed:
//!
//! ```text
//! "VOX " u32 version
//! MAIN   (content 0)
//! PACK?  (content 4, model count)
//! SIZE   (content 12, width length height)
//! XYZI   (content >= 4, count + 4 bytes per voxel)
//! ...    skipped by content size
//! RGBA?  (256 × RGBA, entry i is color index i + 1)
//! ```

use crate::cursor::ByteReader;
use crate::error::{ExchangeError, ExchangeResult};
use crate::palette::{Rgb, RgbPalette};

/// Magic bytes at the start of every VOX file.
pub const VOX_MAGIC: [u8; 4] = *b"VOX ";

/// Largest extent a VOX model can have; coordinates are single bytes.
pub const MAX_VOX_EXTENT: u32 = 256;

/// MagicaVoxel's stock palette, used when a file has no RGBA chunk. Packed `0xAABBGGRR`; index 0 is unused.
static DEFAULT_PALETTE: [u32; 256] = [
    0x00000000, 0xffffffff, 0xffccffff, 0xff99ffff, 0xff66ffff, 0xff33ffff, 0xff00ffff, 0xffffccff,
    0xffccccff, 0xff99ccff, 0xff66ccff, 0xff33ccff, 0xff00ccff, 0xffff99ff, 0xffcc99ff, 0xff9999ff,
    0xff6699ff, 0xff3399ff, 0xff0099ff, 0xffff66ff, 0xffcc66ff, 0xff9966ff, 0xff6666ff, 0xff3366ff,
    0xff0066ff, 0xffff33ff, 0xffcc33ff, 0xff9933ff, 0xff6633ff, 0xff3333ff, 0xff0033ff, 0xffff00ff,
    0xffcc00ff, 0xff9900ff, 0xff6600ff, 0xff3300ff, 0xff0000ff, 0xffffffcc, 0xffccffcc, 0xff99ffcc,
    0xff66ffcc, 0xff33ffcc, 0xff00ffcc, 0xffffcccc, 0xffcccccc, 0xff99cccc, 0xff66cccc, 0xff33cccc,
    0xff00cccc, 0xffff99cc, 0xffcc99cc, 0xff9999cc, 0xff6699cc, 0xff3399cc, 0xff0099cc, 0xffff66cc,
    0xffcc66cc, 0xff9966cc, 0xff6666cc, 0xff3366cc, 0xff0066cc, 0xffff33cc, 0xffcc33cc, 0xff9933cc,
    0xff6633cc, 0xff3333cc, 0xff0033cc, 0xffff00cc, 0xffcc00cc, 0xff9900cc, 0xff6600cc, 0xff3300cc,
    0xff0000cc, 0xffffff99, 0xffccff99, 0xff99ff99, 0xff66ff99, 0xff33ff99, 0xff00ff99, 0xffffcc99,
    0xffcccc99, 0xff99cc99, 0xff66cc99, 0xff33cc99, 0xff00cc99, 0xffff9999, 0xffcc9999, 0xff999999,
    0xff669999, 0xff339999, 0xff009999, 0xffff6699, 0xffcc6699, 0xff996699, 0xff666699, 0xff336699,
    0xff006699, 0xffff3399, 0xffcc3399, 0xff993399, 0xff663399, 0xff333399, 0xff003399, 0xffff0099,
    0xffcc0099, 0xff990099, 0xff660099, 0xff330099, 0xff000099, 0xffffff66, 0xffccff66, 0xff99ff66,
    0xff66ff66, 0xff33ff66, 0xff00ff66, 0xffffcc66, 0xffcccc66, 0xff99cc66, 0xff66cc66, 0xff33cc66,
    0xff00cc66, 0xffff9966, 0xffcc9966, 0xff999966, 0xff669966, 0xff339966, 0xff009966, 0xffff6666,
    0xffcc6666, 0xff996666, 0xff666666, 0xff336666, 0xff006666, 0xffff3366, 0xffcc3366, 0xff993366,
    0xff663366, 0xff333366, 0xff003366, 0xffff0066, 0xffcc0066, 0xff990066, 0xff660066, 0xff330066,
    0xff000066, 0xffffff33, 0xffccff33, 0xff99ff33, 0xff66ff33, 0xff33ff33, 0xff00ff33, 0xffffcc33,
    0xffcccc33, 0xff99cc33, 0xff66cc33, 0xff33cc33, 0xff00cc33, 0xffff9933, 0xffcc9933, 0xff999933,
    0xff669933, 0xff339933, 0xff009933, 0xffff6633, 0xffcc6633, 0xff996633, 0xff666633, 0xff336633,
    0xff006633, 0xffff3333, 0xffcc3333, 0xff993333, 0xff663333, 0xff333333, 0xff003333, 0xffff0033,
    0xffcc0033, 0xff990033, 0xff660033, 0xff330033, 0xff000033, 0xffffff00, 0xffccff00, 0xff99ff00,
    0xff66ff00, 0xff33ff00, 0xff00ff00, 0xffffcc00, 0xffcccc00, 0xff99cc00, 0xff66cc00, 0xff33cc00,
    0xff00cc00, 0xffff9900, 0xffcc9900, 0xff999900, 0xff669900, 0xff339900, 0xff009900, 0xffff6600,
    0xffcc6600, 0xff996600, 0xff666600, 0xff336600, 0xff006600, 0xffff3300, 0xffcc3300, 0xff993300,
    0xff663300, 0xff333300, 0xff003300, 0xffff0000, 0xffcc0000, 0xff990000, 0xff660000, 0xff330000,
    0xff0000ee, 0xff0000dd, 0xff0000bb, 0xff0000aa, 0xff000088, 0xff000077, 0xff000055, 0xff000044,
    0xff000022, 0xff000011, 0xff00ee00, 0xff00dd00, 0xff00bb00, 0xff00aa00, 0xff008800, 0xff007700,
    0xff005500, 0xff004400, 0xff002200, 0xff001100, 0xffee0000, 0xffdd0000, 0xffbb0000, 0xffaa0000,
    0xff880000, 0xff770000, 0xff550000, 0xff440000, 0xff220000, 0xff110000, 0xffeeeeee, 0xffdddddd,
    0xffbbbbbb, 0xffaaaaaa, 0xff888888, 0xff777777, 0xff555555, 0xff444444, 0xff222222, 0xff111111,
];

/// The MagicaVoxel default palette, indexed by color index.
#[must_use]
pub fn default_palette() -> RgbPalette {
    RgbPalette::from_fn(|i| {
        let packed = DEFAULT_PALETTE[usize::from(i)];
        Rgb::new(packed as u8, (packed >> 8) as u8, (packed >> 16) as u8)
    })
}

/// One filled cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxVoxel {
    /// X position.
    pub x: u8,
    /// Y position.
    pub y: u8,
    /// Z position (up in VOX, so low Z is the bottom of the model).
    pub z: u8,
    /// Color index, never 0.
    pub color_index: u8,
}

/// The first model of a VOX file.
#[derive(Debug, Clone)]
pub struct VoxModel {
    /// Extent along X.
    pub width: u32,
    /// Extent along Y.
    pub length: u32,
    /// Extent along Z.
    pub height: u32,
    /// Filled cells, in file order.
    pub voxels: Vec<VoxVoxel>,
    /// Colors indexed by color index; index 0 is unused.
    pub palette: RgbPalette,
    /// Whether `palette` came from an `RGBA` chunk.
    pub has_custom_palette: bool,
}

struct ChunkHeader {
    tag: [u8; 4],
    content: i32,
}

fn tag_name(tag: [u8; 4]) -> String {
    String::from_utf8_lossy(&tag).into_owned()
}

fn truncated(reader: &ByteReader<'_>) -> ExchangeError {
    ExchangeError::Truncated { offset: reader.position() }
}

fn read_header(reader: &mut ByteReader<'_>) -> ExchangeResult<ChunkHeader> {
    let offset = reader.position();
    let header = reader.read_bytes(12).ok_or(ExchangeError::Truncated { offset })?;
    let mut fields = ByteReader::new(header);
    match (fields.read_array::<4>(), fields.read_i32()) {
        (Some(tag), Some(content)) => Ok(ChunkHeader { tag, content }),
        _ => Err(ExchangeError::Truncated { offset }),
    }
}

fn expect_header(reader: &mut ByteReader<'_>, tag: &'static str) -> ExchangeResult<ChunkHeader> {
    let header = read_header(reader)?;
    if header.tag != tag.as_bytes() {
        return Err(ExchangeError::UnexpectedChunk {
            expected: tag,
            found: tag_name(header.tag),
        });
    }
    Ok(header)
}

fn content_len(header: &ChunkHeader, chunk: &'static str) -> ExchangeResult<usize> {
    usize::try_from(header.content).map_err(|_| ExchangeError::BadChunkSize {
        chunk,
        size: i64::from(header.content),
    })
}

/// Parses the chunks of a VOX file.
///
/// # Errors
///
/// Returns an [`ExchangeError`] for a wrong magic, chunks out of order,
/// chunk sizes that do not match their layout, voxels outside the model or
/// using color 0, and truncated data.
pub fn parse_vox(bytes: &[u8]) -> ExchangeResult<VoxModel> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.read_array::<4>().ok_or_else(|| truncated(&reader))?;
    if magic != VOX_MAGIC {
        return Err(ExchangeError::BadMagic(magic));
    }
    let version = reader.read_u32().ok_or_else(|| truncated(&reader))?;
    tracing::trace!(version, "reading VOX file");

    let main = expect_header(&mut reader, "MAIN")?;
    if main.content != 0 {
        return Err(ExchangeError::BadChunkSize {
            chunk: "MAIN",
            size: i64::from(main.content),
        });
    }

    let next = read_header(&mut reader)?;
    if next.tag == *b"PACK" {
        if next.content != 4 {
            return Err(ExchangeError::BadChunkSize {
                chunk: "PACK",
                size: i64::from(next.content),
            });
        }
        let models = reader.read_i32().ok_or_else(|| truncated(&reader))?;
        tracing::trace!(models, "VOX pack header, using first model");
    } else {
        reader.rewind(12);
    }

    let size = expect_header(&mut reader, "SIZE")?;
    if size.content != 12 {
        return Err(ExchangeError::BadChunkSize {
            chunk: "SIZE",
            size: i64::from(size.content),
        });
    }
    let mut extents = [0u32; 3];
    for extent in &mut extents {
        *extent = reader.read_u32().ok_or_else(|| truncated(&reader))?;
    }
    let [width, length, height] = extents;
    if extents.contains(&0) {
        return Err(ExchangeError::EmptyDimensions { width, length, height });
    }
    if extents.iter().any(|&e| e > MAX_VOX_EXTENT) {
        return Err(ExchangeError::ModelTooLarge { width, length, height });
    }

    let xyzi = expect_header(&mut reader, "XYZI")?;
    let content = content_len(&xyzi, "XYZI")?;
    if content < 4 {
        return Err(ExchangeError::BadChunkSize {
            chunk: "XYZI",
            size: i64::from(xyzi.content),
        });
    }
    let body = reader.read_bytes(content).ok_or_else(|| truncated(&reader))?;
    let voxels = parse_voxels(body, extents, xyzi.content)?;

    let (palette, has_custom_palette) = match find_rgba(&mut reader)? {
        Some(entries) => (palette_from_rgba(entries), true),
        None => {
            tracing::debug!("VOX file has no RGBA chunk, using default palette");
            (default_palette(), false)
        }
    };

    Ok(VoxModel {
        width,
        length,
        height,
        voxels,
        palette,
        has_custom_palette,
    })
}

fn parse_voxels(body: &[u8], [width, length, height]: [u32; 3], declared: i32) -> ExchangeResult<Vec<VoxVoxel>> {
    let mut reader = ByteReader::new(body);
    let count = reader.read_u32().ok_or_else(|| truncated(&reader))? as usize;
    if count > reader.remaining() / 4 {
        return Err(ExchangeError::BadChunkSize {
            chunk: "XYZI",
            size: i64::from(declared),
        });
    }

    let mut voxels = Vec::with_capacity(count);
    for _ in 0..count {
        let [x, y, z, color_index] = reader.read_array::<4>().ok_or_else(|| truncated(&reader))?;
        if u32::from(x) >= width || u32::from(y) >= length || u32::from(z) >= height {
            return Err(ExchangeError::VoxelOutOfBounds { x, y, z });
        }
        if color_index == 0 {
            return Err(ExchangeError::ReservedColorIndex { x, y, z });
        }
        voxels.push(VoxVoxel { x, y, z, color_index });
    }
    Ok(voxels)
}

/// Skips chunks until `RGBA`; `None` if the data ends first.
fn find_rgba<'a>(reader: &mut ByteReader<'a>) -> ExchangeResult<Option<&'a [u8]>> {
    while reader.remaining() > 0 {
        let header = read_header(reader)?;
        if header.tag == *b"RGBA" {
            let entries = reader.read_bytes(256 * 4).ok_or_else(|| truncated(reader))?;
            return Ok(Some(entries));
        }
        let tag = tag_name(header.tag);
        let skip = usize::try_from(header.content).map_err(|_| ExchangeError::BadChunkSize {
            chunk: "chunk",
            size: i64::from(header.content),
        })?;
        reader.skip(skip).ok_or_else(|| truncated(reader))?;
        tracing::trace!(%tag, skip, "skipped VOX chunk");
    }
    Ok(None)
}

fn palette_from_rgba(entries: &[u8]) -> RgbPalette {
    let mut palette = RgbPalette::from_fn(|_| Rgb::default());
    // entry i belongs to color index i + 1; the last entry has no index
    for (i, rgba) in entries.chunks_exact(4).take(255).enumerate() {
        palette.colors[i + 1] = Rgb::new(rgba[0], rgba[1], rgba[2]);
    }
    palette
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(content.len() as i32).to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(content);
        out
    }

    fn size_chunk(w: u32, l: u32, h: u32) -> Vec<u8> {
        let mut content = Vec::new();
        for v in [w, l, h] {
            content.extend_from_slice(&v.to_le_bytes());
        }
        chunk(b"SIZE", &content)
    }

    fn xyzi_chunk(voxels: &[[u8; 4]]) -> Vec<u8> {
        let mut content = (voxels.len() as u32).to_le_bytes().to_vec();
        for v in voxels {
            content.extend_from_slice(v);
        }
        chunk(b"XYZI", &content)
    }

    fn file(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = b"VOX ".to_vec();
        out.extend_from_slice(&150u32.to_le_bytes());
        out.extend(chunk(b"MAIN", &[]));
        for part in parts {
            out.extend_from_slice(part);
        }
        out
    }

    #[test]
    fn test_default_palette_matches_magicavoxel() {
        let palette = default_palette();
        assert_eq!(palette.get(1), Rgb::new(255, 255, 255));
        // 0xff0000ee: red channel in the low byte
        assert_eq!(palette.get(216), Rgb::new(0xee, 0, 0));
        assert_eq!(palette.get(255), Rgb::new(0x11, 0x11, 0x11));
    }

    #[test]
    fn test_minimal_file_without_palette() {
        let data = file(&[size_chunk(2, 1, 3), xyzi_chunk(&[[1, 0, 2, 9]])]);
        let model = parse_vox(&data).unwrap();

        assert_eq!((model.width, model.length, model.height), (2, 1, 3));
        assert_eq!(model.voxels, vec![VoxVoxel { x: 1, y: 0, z: 2, color_index: 9 }]);
        assert!(!model.has_custom_palette);
        assert_eq!(model.palette, default_palette());
    }

    #[test]
    fn test_pack_and_skipped_chunks_before_rgba() {
        let mut rgba = vec![0u8; 1024];
        rgba[0..4].copy_from_slice(&[10, 20, 30, 255]);
        rgba[1020..1024].copy_from_slice(&[1, 2, 3, 255]);
        let data = file(&[
            chunk(b"PACK", &1i32.to_le_bytes()),
            size_chunk(1, 1, 1),
            xyzi_chunk(&[[0, 0, 0, 1]]),
            chunk(b"nTRN", &[0; 17]),
            chunk(b"RGBA", &rgba),
        ]);
        let model = parse_vox(&data).unwrap();

        assert!(model.has_custom_palette);
        assert_eq!(model.palette.get(1), Rgb::new(10, 20, 30));
        assert_eq!(model.palette.get(0), Rgb::default());
        assert_eq!(model.palette.get(255), Rgb::default());
    }

    #[test]
    fn test_bad_magic() {
        assert_eq!(parse_vox(b"KVX 1234").unwrap_err(), ExchangeError::BadMagic(*b"KVX "));
    }

    #[test]
    fn test_missing_size_chunk() {
        let data = file(&[xyzi_chunk(&[])]);
        assert_eq!(
            parse_vox(&data).unwrap_err(),
            ExchangeError::UnexpectedChunk {
                expected: "SIZE",
                found: "XYZI".to_owned()
            }
        );
    }

    #[test]
    fn test_wrong_size_content() {
        let data = file(&[chunk(b"SIZE", &[0; 8])]);
        assert!(matches!(
            parse_vox(&data).unwrap_err(),
            ExchangeError::BadChunkSize { chunk: "SIZE", size: 8 }
        ));
    }

    #[test]
    fn test_voxel_checks() {
        let outside = file(&[size_chunk(1, 1, 1), xyzi_chunk(&[[0, 1, 0, 3]])]);
        assert_eq!(
            parse_vox(&outside).unwrap_err(),
            ExchangeError::VoxelOutOfBounds { x: 0, y: 1, z: 0 }
        );

        let reserved = file(&[size_chunk(1, 1, 1), xyzi_chunk(&[[0, 0, 0, 0]])]);
        assert_eq!(
            parse_vox(&reserved).unwrap_err(),
            ExchangeError::ReservedColorIndex { x: 0, y: 0, z: 0 }
        );
    }

    #[test]
    fn test_count_larger_than_chunk() {
        let mut content = 5u32.to_le_bytes().to_vec();
        content.extend_from_slice(&[0, 0, 0, 1]);
        let data = file(&[size_chunk(1, 1, 1), chunk(b"XYZI", &content)]);
        assert!(matches!(
            parse_vox(&data).unwrap_err(),
            ExchangeError::BadChunkSize { chunk: "XYZI", .. }
        ));
    }

    #[test]
    fn test_dimension_limits() {
        let empty = file(&[size_chunk(0, 4, 4)]);
        assert!(matches!(parse_vox(&empty).unwrap_err(), ExchangeError::EmptyDimensions { .. }));

        let huge = file(&[size_chunk(4, 300, 4)]);
        assert!(matches!(parse_vox(&huge).unwrap_err(), ExchangeError::ModelTooLarge { .. }));
    }

    #[test]
    fn test_truncated() {
        let mut data = file(&[size_chunk(1, 1, 1), xyzi_chunk(&[[0, 0, 0, 1]])]);
        data.truncate(data.len() - 2);
        assert!(matches!(parse_vox(&data).unwrap_err(), ExchangeError::Truncated { .. }));
    }
}
