//! Immutable run configuration passed to every stage of a pyramid run.

use std::fmt;

use image::imageops::FilterType;

use crate::error::{PyramidError, Result};

pub const DEFAULT_TILE_SIZE: u32 = 256;
pub const DEFAULT_JPEG_QUALITY: u8 = 75;
/// Every tile is composed on a full `tile_size x tile_size` canvas.
pub const MAX_TILE_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileFormat {
    #[default]
    Png,
    Jpeg,
}

impl TileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn supports_alpha(self) -> bool {
        matches!(self, TileFormat::Png)
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpeg",
        })
    }
}

/// Filter used when a read window is scaled down to its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    Lanczos,
}

impl Resampling {
    pub(crate) fn filter(self) -> FilterType {
        match self {
            Resampling::Nearest => FilterType::Nearest,
            Resampling::Bilinear => FilterType::Triangle,
            Resampling::Cubic => FilterType::CatmullRom,
            Resampling::Lanczos => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerType {
    #[default]
    BaseLayer,
    Overlay,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerType::BaseLayer => "baselayer",
            LayerType::Overlay => "overlay",
        })
    }
}

/// Descriptive fields stored with the tiles and shown in viewer pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub title: String,
    pub description: String,
    pub version: String,
    pub layer_type: LayerType,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            title: name.clone(),
            name,
            description: String::new(),
            version: "1.0".into(),
            layer_type: LayerType::BaseLayer,
        }
    }
}

/// Which side documents to produce alongside the tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Artifacts {
    pub tilemapresource: bool,
    pub openlayers: bool,
    pub googlemaps: bool,
    /// Only honoured for EPSG:4326 rasters.
    pub kml: bool,
}

impl Default for Artifacts {
    fn default() -> Self {
        Self {
            tilemapresource: true,
            openlayers: true,
            googlemaps: true,
            kml: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidConfig {
    pub tile_size: u32,
    pub format: TileFormat,
    pub jpeg_quality: u8,
    pub resampling: Resampling,
    pub metadata: Metadata,
    pub artifacts: Artifacts,
    /// Prefix for tile set links in `tilemapresource.xml` and `doc.kml`.
    pub publish_url: String,
    pub googlemaps_key: String,
}

impl PyramidConfig {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            format: TileFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            resampling: Resampling::default(),
            metadata,
            artifacts: Artifacts::default(),
            publish_url: String::new(),
            googlemaps_key: "INSERT_YOUR_KEY_HERE".into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(PyramidError::InvalidConfig(format!(
                "tile size {} not in 1..={MAX_TILE_SIZE}",
                self.tile_size
            )));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PyramidError::InvalidConfig(format!(
                "jpeg quality {} not in 1..=100",
                self.jpeg_quality
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_plain_png_baselayer() {
        let config = PyramidConfig::new(Metadata::named("scan.tif"));

        assert_eq!(config.tile_size, 256);
        assert_eq!(config.format, TileFormat::Png);
        assert_eq!(config.metadata.title, "scan.tif");
        assert_eq!(config.metadata.version, "1.0");
        assert_eq!(config.metadata.layer_type.to_string(), "baselayer");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_quality_and_tile_size() {
        let mut config = PyramidConfig::new(Metadata::named("x"));
        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.jpeg_quality = 90;
        config.tile_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn caps_tile_size() {
        let mut config = PyramidConfig::new(Metadata::named("x"));

        config.tile_size = MAX_TILE_SIZE;
        assert!(config.validate().is_ok());

        config.tile_size = 100_000;
        assert!(matches!(config.validate(), Err(PyramidError::InvalidConfig(_))));
    }
}
