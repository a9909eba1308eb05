use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PyramidError>;

/// Everything that can abort a pyramid run. None of these are retried.
#[derive(Debug, Error)]
pub enum PyramidError {
    #[error("invalid raster geometry: {xsize}x{ysize} pixels")]
    InvalidGeometry { xsize: u32, ysize: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("output {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("cannot read raster {}", .path.display())]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("read window {left},{top} {width}x{height} is outside the raster")]
    WindowOutOfBounds {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("tile encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("GeoTIFF tags: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("mbtiles: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metadata.json: {0}")]
    Json(#[from] serde_json::Error),
}
