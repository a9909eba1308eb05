//! Raster geometry: pixel size, affine geotransform and projection.
//!
//! Coordinates follow the GDAL convention:
//! ```text
//! x = origin_x + col * pixel_width  + row * row_rotation
//! y = origin_y + col * col_rotation + row * pixel_height
//! ```
//! with `(col, row) = (0, 0)` at the upper-left corner of the raster.

use crate::error::{PyramidError, Result};

pub const EPSG_4326: &str = "EPSG:4326";

/// Affine transform from pixel to world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    /// Usually negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// GDAL-style `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    pub fn from_gdal(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Parse an ESRI world file (`.tfw`, `.pgw`, `.jgw`, `.wld`, ...).
    ///
    /// World files store the *centre* of the upper-left pixel in the order
    /// `A D B E C F`; the geotransform wants its outer corner.
    pub fn from_world_file(text: &str) -> Option<Self> {
        let values: Vec<f64> = text
            .split_whitespace()
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .ok()?;

        let [a, d, b, e, c, f] = <[f64; 6]>::try_from(values.as_slice()).ok()?;

        Some(Self {
            origin_x: c - 0.5 * a - 0.5 * b,
            pixel_width: a,
            row_rotation: b,
            origin_y: f - 0.5 * d - 0.5 * e,
            col_rotation: d,
            pixel_height: e,
        })
    }
}

impl Default for GeoTransform {
    /// The transform GDAL reports for rasters without georeferencing.
    fn default() -> Self {
        Self::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

/// Geographic box of a raster or a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Everything the planner needs to know about the source raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGeometry {
    pub xsize: u32,
    pub ysize: u32,
    pub bands: u32,
    pub geotransform: GeoTransform,
    /// `EPSG:<code>`, a WKT string, or empty when unknown.
    pub projection: String,
}

impl RasterGeometry {
    pub fn validate(&self) -> Result<()> {
        if self.xsize == 0 || self.ysize == 0 {
            return Err(PyramidError::InvalidGeometry {
                xsize: self.xsize,
                ysize: self.ysize,
            });
        }

        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        let gt = &self.geotransform;

        Bounds {
            north: gt.origin_y,
            south: gt.origin_y + gt.pixel_height * self.ysize as f64,
            east: gt.origin_x + gt.pixel_width * self.xsize as f64,
            west: gt.origin_x,
        }
    }

    /// Exact-match check for plain lat/lon WGS84. Anything else is treated
    /// as the local pixel profile.
    pub fn is_epsg4326(&self) -> bool {
        let p = self.projection.trim();
        p.eq_ignore_ascii_case(EPSG_4326) || p.ends_with(r#"AUTHORITY["EPSG","4326"]]"#)
    }

    /// Spatial reference as written into `tilemapresource.xml`.
    pub fn srs(&self) -> &str {
        if self.is_epsg4326() {
            EPSG_4326
        } else {
            &self.projection
        }
    }
}
