//! # Voxel Registry
//!
//! Loads voxel resources by name through a [`VoxelSource`], converts VOX
//! data on the way in, and keeps every successfully decoded volume for the
//! lifetime of the registry.
//!
//! ```text
//! name ──► VoxelSource::read ──► is_exchange? ──► convert_to_kvx ──► decode ──► Arc<VoxelVolume>
//!                                     │                                ▲
//!                                     └────────────── no ──────────────┘
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::VoxelConfig;
use crate::def::VoxelDef;
use crate::error::LoadError;
use crate::exchange::convert_to_kvx_with;
use crate::kvx::{decode_with, VoxelVolume};
use crate::palette::{ColorMatcher, RemapCache};

/// Where voxel bytes come from.
pub trait VoxelSource {
    /// Reads the whole resource `name`.
    ///
    /// # Errors
    ///
    /// [`LoadError::NotFound`] if there is no such resource, or
    /// [`LoadError::Io`] if it cannot be read.
    fn read(&self, name: &str) -> Result<Vec<u8>, LoadError>;
}

/// Reads voxel files relative to a base directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    base_path: PathBuf,
}

impl DirectorySource {
    /// Creates a source rooted at `base_path`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Lists file names in the directory with one of `extensions`
    /// (compared case-insensitively, without the dot). Sorted.
    #[must_use]
    pub fn list(&self, extensions: &[&str]) -> Vec<String> {
        let mut files = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.base_path) {
            for entry in entries.flatten() {
                let path = entry.path();
                let matches = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
                if matches {
                    if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                        files.push(name.to_string());
                    }
                }
            }
        }
        files.sort();
        files
    }
}

impl VoxelSource for DirectorySource {
    fn read(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        match std::fs::read(self.base_path.join(name)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(LoadError::NotFound(name.to_owned())),
            Err(err) => Err(LoadError::Io(err)),
        }
    }
}

/// In-memory resources, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// An empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a resource.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }
}

impl VoxelSource for MemorySource {
    fn read(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_owned()))
    }
}

/// Decodes a named resource, converting it first if it is VOX data.
///
/// # Errors
///
/// Returns [`LoadError::Exchange`] or [`LoadError::Decode`] for malformed
/// data.
pub fn load_volume(name: &str, bytes: &[u8], config: &VoxelConfig) -> Result<VoxelVolume, LoadError> {
    if !bytes.is_empty() && config.exchange.is_exchange(name, bytes) {
        let kvx = convert_to_kvx_with(bytes, &config.exchange)?;
        return Ok(decode_with(&kvx, &config.decoder)?);
    }
    Ok(decode_with(bytes, &config.decoder)?)
}

/// Name-keyed cache of decoded volumes.
///
/// Failed loads are logged and not cached, so a later call retries.
pub struct VoxelRegistry<S: VoxelSource> {
    source: S,
    config: VoxelConfig,
    volumes: Mutex<HashMap<String, Arc<VoxelVolume>>>,
    remap: Mutex<RemapCache>,
}

impl<S: VoxelSource> VoxelRegistry<S> {
    /// Creates an empty registry.
    pub fn new(source: S, config: VoxelConfig) -> Self {
        Self {
            source,
            config,
            volumes: Mutex::new(HashMap::new()),
            remap: Mutex::new(RemapCache::new()),
        }
    }

    /// The configuration loads are performed with.
    pub fn config(&self) -> &VoxelConfig {
        &self.config
    }

    /// Number of cached volumes.
    pub fn len(&self) -> usize {
        self.volumes.lock().len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.volumes.lock().is_empty()
    }

    /// Returns the cached volume for `name`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Propagates source, conversion and decode errors.
    pub fn try_get(&self, name: &str) -> Result<Arc<VoxelVolume>, LoadError> {
        if let Some(volume) = self.volumes.lock().get(name) {
            return Ok(Arc::clone(volume));
        }

        let bytes = self.source.read(name)?;
        let volume = Arc::new(load_volume(name, &bytes, &self.config)?);
        tracing::info!(name, mips = volume.mip_count(), "loaded voxel");

        // a concurrent load of the same name may have won; keep the first
        let mut volumes = self.volumes.lock();
        Ok(Arc::clone(volumes.entry(name.to_owned()).or_insert(volume)))
    }

    /// Like [`VoxelRegistry::try_get`], logging failures instead.
    pub fn get(&self, name: &str) -> Option<Arc<VoxelVolume>> {
        match self.try_get(name) {
            Ok(volume) => Some(volume),
            Err(err) => {
                tracing::warn!(%err, "{name} is not a valid voxel file");
                None
            }
        }
    }

    /// Loads `name` and wraps it in a definition with configured defaults.
    pub fn load_def(&self, name: &str, spin: i32) -> Option<VoxelDef> {
        self.get(name)
            .map(|volume| VoxelDef::new(volume, spin, &self.config.defs))
    }

    /// Remapped slab data of a volume, sharing this registry's remap cache.
    pub fn remapped_slab_data<'v>(
        &self,
        volume: &'v VoxelVolume,
        mip: usize,
        matcher: &impl ColorMatcher,
    ) -> Option<&'v [u8]> {
        let mut cache = self.remap.lock();
        volume.remapped_slab_data(mip, &mut cache, matcher)
    }

    /// Drops all cached volumes and the remap table.
    pub fn clear(&self) {
        self.volumes.lock().clear();
        self.remap.lock().clear();
    }
}
