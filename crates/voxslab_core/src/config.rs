//! # Voxel Configuration
//!
//! Tunables for decoding, VOX conversion and voxel definitions. Every field
//! has a default, so an empty file (or no file at all) is a valid config.
//!
//! ```toml
//! [decoder]
//! max_mip_levels = 5
//!
//! [exchange]
//! prune_hidden = true
//! extensions = [".vox"]
//! detect_by_magic = true
//!
//! [defs]
//! scale = 1.0
//! angle_offset_deg = 90.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::exchange::VOX_MAGIC;
use crate::kvx::{DEFAULT_MIP_LEVELS, MAX_MIP_LEVELS};

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelConfig {
    /// KVX decoder settings.
    pub decoder: DecoderConfig,
    /// VOX conversion settings.
    pub exchange: ExchangeConfig,
    /// Defaults for voxel definitions.
    pub defs: DefDefaults,
}

impl VoxelConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] on out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`VoxelConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded voxel config");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decoder.validate()?;
        if !(self.defs.scale.is_finite() && self.defs.scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "defs.scale must be a positive number, got {}",
                self.defs.scale
            )));
        }
        if !self.defs.angle_offset_deg.is_finite() {
            return Err(ConfigError::Invalid("defs.angle_offset_deg must be finite".to_owned()));
        }
        if let Some(ext) = self.exchange.extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(ConfigError::Invalid(format!(
                "exchange.extensions entries must start with '.', got {ext:?}"
            )));
        }
        Ok(())
    }
}

/// KVX decoder settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Mip levels to read at most (1..=16).
    pub max_mip_levels: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_mip_levels: DEFAULT_MIP_LEVELS,
        }
    }
}

impl DecoderConfig {
    /// Checks that the mip limit is in `1..=16`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an out-of-range limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mips = self.max_mip_levels;
        if !(1..=MAX_MIP_LEVELS).contains(&mips) {
            return Err(ConfigError::Invalid(format!(
                "decoder.max_mip_levels must be in 1..={MAX_MIP_LEVELS}, got {mips}"
            )));
        }
        Ok(())
    }
}

/// VOX conversion settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Drop voxels with no exposed face before encoding.
    pub prune_hidden: bool,
    /// File name suffixes treated as VOX (case-insensitive).
    pub extensions: Vec<String>,
    /// Also treat data starting with `"VOX "` as VOX.
    pub detect_by_magic: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            prune_hidden: true,
            extensions: vec![".vox".to_owned()],
            detect_by_magic: true,
        }
    }
}

impl ExchangeConfig {
    /// True if `name` ends with one of the configured extensions.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
    }

    /// True if a resource should go through the VOX converter.
    #[must_use]
    pub fn is_exchange(&self, name: &str, bytes: &[u8]) -> bool {
        self.matches_name(name) || (self.detect_by_magic && bytes.starts_with(&VOX_MAGIC))
    }
}

/// Defaults applied to voxel definitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefDefaults {
    /// Uniform model scale.
    pub scale: f64,
    /// Yaw added to every model, in degrees.
    pub angle_offset_deg: f64,
}

impl Default for DefDefaults {
    fn default() -> Self {
        Self {
            scale: 1.0,
            angle_offset_deg: 90.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = VoxelConfig::from_toml_str("").unwrap();
        assert_eq!(config, VoxelConfig::default());
        assert_eq!(config.decoder.max_mip_levels, 5);
        assert!(config.exchange.prune_hidden);
    }

    #[test]
    fn test_partial_sections() {
        let config = VoxelConfig::from_toml_str(
            r#"
            [decoder]
            max_mip_levels = 2

            [exchange]
            extensions = [".vox", ".VXM"]
            "#,
        )
        .unwrap();

        assert_eq!(config.decoder.max_mip_levels, 2);
        assert!(config.exchange.detect_by_magic);
        assert!(config.exchange.matches_name("DATA/MODEL.vxm"));
        assert!((config.defs.angle_offset_deg - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_out_of_range() {
        for text in [
            "[decoder]\nmax_mip_levels = 0",
            "[decoder]\nmax_mip_levels = 17",
            "[defs]\nscale = -1.0",
            "[exchange]\nextensions = [\"vox\"]",
        ] {
            assert!(matches!(VoxelConfig::from_toml_str(text), Err(ConfigError::Invalid(_))), "{text}");
        }
    }

    #[test]
    fn test_decoder_limit_is_not_adjusted() {
        assert!(DecoderConfig::default().validate().is_ok());
        assert!(DecoderConfig { max_mip_levels: 16 }.validate().is_ok());
        for max_mip_levels in [0, 17, 40] {
            let err = DecoderConfig { max_mip_levels }.validate().unwrap_err();
            assert!(err.to_string().contains(&format!("got {max_mip_levels}")), "{err}");
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            VoxelConfig::from_toml_str("[decoder\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_exchange_detection() {
        let exchange = ExchangeConfig::default();
        assert!(exchange.is_exchange("tree.VOX", b"KVX?"));
        assert!(exchange.is_exchange("tree.kvx", b"VOX \x96\0\0\0"));
        assert!(!exchange.is_exchange("tree.kvx", b"\x10\0\0\0"));

        let strict = ExchangeConfig {
            detect_by_magic: false,
            ..ExchangeConfig::default()
        };
        assert!(!strict.is_exchange("tree.kvx", b"VOX "));
    }
}
