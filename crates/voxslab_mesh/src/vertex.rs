//! Model vertex layout.

use bytemuck::{Pod, Zeroable};

/// One mesh vertex, laid out for direct upload.
///
/// ```text
/// offset  0: position [f32; 3]   engine space (x right, y up, z toward viewer)
/// offset 12: uv       [f32; 2]   palette swatch cell center
/// offset 20: packed_normal u32   2-10-10-10 signed, or 0
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    /// Position relative to the model pivot.
    pub position: [f32; 3],
    /// Texture coordinate into the 16×16 palette swatch.
    pub uv: [f32; 2],
    /// Packed face normal.
    pub packed_normal: u32,
}

/// Exact bit pattern of a vertex, usable as a hash key.
pub type VertexKey = [u32; 6];

impl ModelVertex {
    /// Size of one vertex in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Hash key comparing every field bit for bit.
    ///
    /// `0.0` and `-0.0` are different keys; NaN equals itself.
    #[inline]
    #[must_use]
    pub fn key(&self) -> VertexKey {
        bytemuck::cast(*self)
    }
}

/// Packs a unit normal as 2-10-10-10 signed with `w = 1`.
#[inline]
#[must_use]
pub fn pack_normal(normal: [f32; 3]) -> u32 {
    // truncation toward zero matches the engine's packer
    #[allow(clippy::cast_possible_truncation)]
    let component = |v: f32| ((v * 511.0) as i32 & 1023) as u32;
    0x4000_0000 | component(normal[2]) << 20 | component(normal[1]) << 10 | component(normal[0])
}

/// Reverses [`pack_normal`].
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn unpack_normal(packed: u32) -> [f32; 3] {
    let component = |shift: u32| {
        let raw = ((packed >> shift) & 1023) as i32;
        let signed = if raw >= 512 { raw - 1024 } else { raw };
        signed as f32 / 511.0
    };
    [component(0), component(10), component(20)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(ModelVertex::SIZE, 24);
        let v = ModelVertex {
            position: [1.0, 2.0, 3.0],
            uv: [0.5, 0.25],
            packed_normal: 7,
        };
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(&bytes[20..24], &7u32.to_le_bytes());
    }

    #[test]
    fn test_key_distinguishes_signed_zero() {
        let a = ModelVertex::default();
        let mut b = a;
        b.position[0] = -0.0;
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), ModelVertex::default().key());
    }

    #[test]
    fn test_normal_packing() {
        assert_eq!(pack_normal([0.0, 1.0, 0.0]), 0x4000_0000 | 511 << 10);
        assert_eq!(pack_normal([-1.0, 0.0, 0.0]), 0x4000_0000 | 513);
        assert_eq!(unpack_normal(pack_normal([0.0, 0.0, -1.0])), [0.0, 0.0, -1.0]);
        assert_eq!(unpack_normal(pack_normal([1.0, 0.0, 0.0])), [1.0, 0.0, 0.0]);
    }
}
