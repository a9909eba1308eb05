//! tilepyr: cut one georeferenced raster into a local-profile tile pyramid.
//!
//! - Zoom `max_zoom` is the raster at native resolution; each lower zoom
//!   halves it until the whole raster fits a single tile at zoom 0.
//! - Tiles are addressed `(zoom, column, row)` with row 0 at the south edge.
//! - Edge tiles are padded: transparent for PNG, black for JPEG, with the
//!   data anchored to the tile's south-west corner.
//!
//! Directory output layout:
//!   <root>/<zoom>/<column>/<row>.<ext>    tile image
//!   <root>/<zoom>/<column>/<row>.kml      per-tile region (EPSG:4326 only)
//!   <root>/doc.kml                        super-overlay root (EPSG:4326 only)
//!   <root>/tilemapresource.xml            TMS descriptor
//!   <root>/openlayers.html                viewer
//!   <root>/googlemaps.html                viewer
//!   <root>/metadata.json                  name/version/description/type/format
//!
//! MBTiles output keeps tiles and metadata only:
//!   tiles(zoom_level, tile_column, tile_row, tile_data)
//!   metadata(name, value)

pub mod config;
pub mod encode;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod overlay;
pub mod pyramid;
pub mod raster;
pub mod render;
pub mod sink;

pub use config::{Artifacts, LayerType, Metadata, PyramidConfig, Resampling, TileFormat};
pub use error::{PyramidError, Result};
pub use generate::{generate, plan, Report, TileProgress};
pub use geometry::{Bounds, GeoTransform, RasterGeometry};
pub use pyramid::{PyramidParams, ReadWindow, TileCoord};
pub use raster::{ImageRaster, PixelBlock, RasterSource};
pub use sink::{DirectorySink, MbtilesSink, TileSink};
