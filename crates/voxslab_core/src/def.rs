//! Voxel definitions: a shared volume plus its placement parameters.

use std::sync::Arc;

use crate::config::DefDefaults;
use crate::kvx::VoxelVolume;

/// How a voxel model is placed in the world.
#[derive(Debug, Clone)]
pub struct VoxelDef {
    /// The model.
    pub volume: Arc<VoxelVolume>,
    /// Uniform scale.
    pub scale: f64,
    /// Spin rate while placed in the map.
    pub placed_spin: i32,
    /// Spin rate once dropped.
    pub dropped_spin: i32,
    /// Yaw added to the model, in degrees.
    pub angle_offset_deg: f64,
}

impl VoxelDef {
    /// Builds a definition with the same spin for both states.
    #[must_use]
    pub fn new(volume: Arc<VoxelVolume>, spin: i32, defaults: &DefDefaults) -> Self {
        Self {
            volume,
            scale: defaults.scale,
            placed_spin: spin,
            dropped_spin: spin,
            angle_offset_deg: defaults.angle_offset_deg,
        }
    }

    /// The angle offset in radians.
    #[inline]
    #[must_use]
    pub fn angle_offset_rad(&self) -> f64 {
        self.angle_offset_deg.to_radians()
    }
}
