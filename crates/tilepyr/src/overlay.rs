//! Nested region boxes for the KML super-overlay hierarchy.
//!
//! Each tile document covers its own box and links to the (up to four)
//! tiles one zoom deeper that lie inside the raster, so a globe viewer only
//! fetches the detail it needs.

use crate::geometry::{Bounds, RasterGeometry};
use crate::pyramid::{PyramidParams, TileCoord};

/// A tile's own box plus its in-bound children and their boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayNode {
    pub coord: TileCoord,
    pub bounds: Bounds,
    pub children: Vec<(TileCoord, Bounds)>,
}

/// Box of tile `(column, row)` measured from the raster's south-west corner.
pub fn tile_bounds(
    south: f64,
    west: f64,
    rpixel: f64,
    tile_size: u32,
    column: u32,
    row: u32,
) -> Bounds {
    let span = rpixel * tile_size as f64;

    Bounds {
        north: south + span * (row as f64 + 1.0),
        south: south + span * row as f64,
        east: west + span * (column as f64 + 1.0),
        west: west + span * column as f64,
    }
}

/// Children of `coord` at `zoom + 1` that exist in the pyramid.
///
/// Ordered column-major: `(2x, 2y)`, `(2x, 2y+1)`, `(2x+1, 2y)`, `(2x+1, 2y+1)`.
pub fn children(params: &PyramidParams, coord: TileCoord) -> Vec<TileCoord> {
    if coord.zoom >= params.max_zoom {
        return Vec::new();
    }

    let zoom = coord.zoom + 1;
    let mut out = Vec::with_capacity(4);

    for column in [coord.column * 2, coord.column * 2 + 1] {
        for row in [coord.row * 2, coord.row * 2 + 1] {
            let child = TileCoord::new(zoom, column, row);
            if params.contains(child) {
                out.push(child);
            }
        }
    }

    out
}

impl PyramidParams {
    /// Overlay linkage for one tile, using the raster's south-west corner as
    /// origin and the zoom's pixel size.
    pub fn overlay_node(&self, geometry: &RasterGeometry, coord: TileCoord) -> OverlayNode {
        let origin = geometry.bounds();
        let rpixel = self.zoom_pixel_sizes[coord.zoom as usize];

        let bounds = tile_bounds(origin.south, origin.west, rpixel, self.tile_size, coord.column, coord.row);

        let children = children(self, coord)
            .into_iter()
            .map(|child| {
                let b = tile_bounds(
                    origin.south,
                    origin.west,
                    rpixel / 2.0,
                    self.tile_size,
                    child.column,
                    child.row,
                );
                (child, b)
            })
            .collect();

        OverlayNode {
            coord,
            bounds,
            children,
        }
    }
}
