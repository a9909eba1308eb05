//! Pyramid planning: zoom levels, per-zoom resolution and tile read windows.
//!
//! Tiles use the "local pixel" profile: zoom `max_zoom` is native
//! resolution, every lower zoom halves it, and rows are counted from the
//! bottom (south) edge of the raster while pixel offsets are counted from
//! the top.

use crate::error::{PyramidError, Result};
use crate::geometry::RasterGeometry;

/// `(zoom, column, row)`; row 0 is the southernmost row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub zoom: u32,
    pub column: u32,
    pub row: u32,
}

impl TileCoord {
    pub const fn new(zoom: u32, column: u32, row: u32) -> Self {
        Self { zoom, column, row }
    }
}

/// Source rectangle (top-down pixel offsets) and the size it is resampled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadWindow {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
}

/// Derived once per run from the raster size and tile size.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidParams {
    pub xsize: u32,
    pub ysize: u32,
    pub tile_size: u32,
    pub max_zoom: u32,
    /// World units per pixel, indexed by zoom.
    pub zoom_pixel_sizes: Vec<f64>,
    pub tile_count: u64,
}

impl PyramidParams {
    pub fn new(geometry: &RasterGeometry, tile_size: u32) -> Result<Self> {
        geometry.validate()?;
        if tile_size == 0 {
            return Err(PyramidError::InvalidConfig("tile size must be > 0".into()));
        }

        let max_zoom = max_zoom_for(geometry.xsize, geometry.ysize, tile_size);
        let pixel_width = geometry.geotransform.pixel_width;

        let zoom_pixel_sizes = (0..=max_zoom)
            .map(|zoom| pixel_width * (1u64 << (max_zoom - zoom)) as f64)
            .collect();

        let mut params = Self {
            xsize: geometry.xsize,
            ysize: geometry.ysize,
            tile_size,
            max_zoom,
            zoom_pixel_sizes,
            tile_count: 0,
        };

        params.tile_count = (0..=max_zoom)
            .map(|zoom| {
                let (columns, rows) = params.grid_size(zoom);
                columns as u64 * rows as u64
            })
            .sum();

        Ok(params)
    }

    /// Side of the square source area one tile covers at `zoom`, in pixels.
    #[inline]
    pub fn window_size(&self, zoom: u32) -> u64 {
        (self.tile_size as u64) << (self.max_zoom - zoom)
    }

    /// Number of `(columns, rows)` at `zoom`.
    pub fn grid_size(&self, zoom: u32) -> (u32, u32) {
        let window = self.window_size(zoom);

        (
            (self.xsize as u64).div_ceil(window) as u32,
            (self.ysize as u64).div_ceil(window) as u32,
        )
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        if coord.zoom > self.max_zoom {
            return false;
        }

        let (columns, rows) = self.grid_size(coord.zoom);
        coord.column < columns && coord.row < rows
    }

    /// Read window for a single tile. The caller guarantees `contains(coord)`.
    pub fn read_window(&self, coord: TileCoord) -> ReadWindow {
        let window = self.window_size(coord.zoom);
        let (columns, rows) = self.grid_size(coord.zoom);

        let width = edge_extent(self.xsize, window, coord.column + 1 == columns);
        let height = edge_extent(self.ysize, window, coord.row + 1 == rows);

        let left = coord.column as u64 * window;
        let top = self.ysize as u64 - coord.row as u64 * window - height;

        let tile = self.tile_size as u64;

        ReadWindow {
            left: left as u32,
            top: top as u32,
            width: width as u32,
            height: height as u32,
            dst_width: (width * tile / window).max(1) as u32,
            dst_height: (height * tile / window).max(1) as u32,
        }
    }

    /// All tiles, highest zoom first, columns then rows ascending.
    pub fn tiles(&self) -> Tiles<'_> {
        Tiles {
            params: self,
            zoom: Some(self.max_zoom),
            column: 0,
            row: 0,
            remaining: self.tile_count,
        }
    }
}

/// Smallest zoom for which `tile_size * 2^zoom` covers both dimensions.
fn max_zoom_for(xsize: u32, ysize: u32, tile_size: u32) -> u32 {
    let log2 = |v: f64| v.ln() / 2f64.ln();
    let estimate = log2(xsize as f64 / tile_size as f64)
        .ceil()
        .max(log2(ysize as f64 / tile_size as f64).ceil())
        .max(0.0) as u32;

    // The float estimate can be one off for exact powers of two.
    let largest = xsize.max(ysize) as u64;
    let tile = tile_size as u64;
    let mut zoom = estimate.min(63);

    while zoom > 0 && tile << (zoom - 1) >= largest {
        zoom -= 1;
    }
    while tile << zoom < largest {
        zoom += 1;
    }

    zoom
}

/// Full window, or the remainder if this is the last column/row and the
/// raster does not divide evenly.
#[inline]
fn edge_extent(size: u32, window: u64, last: bool) -> u64 {
    let rem = size as u64 % window;
    if last && rem != 0 {
        rem
    } else {
        window
    }
}

/// Lazy tile enumeration returned by [`PyramidParams::tiles`].
#[derive(Debug, Clone)]
pub struct Tiles<'a> {
    params: &'a PyramidParams,
    zoom: Option<u32>,
    column: u32,
    row: u32,
    remaining: u64,
}

impl Iterator for Tiles<'_> {
    type Item = (TileCoord, ReadWindow);

    fn next(&mut self) -> Option<Self::Item> {
        let zoom = self.zoom?;
        let (columns, rows) = self.params.grid_size(zoom);

        let coord = TileCoord::new(zoom, self.column, self.row);

        self.row += 1;
        if self.row == rows {
            self.row = 0;
            self.column += 1;
            if self.column == columns {
                self.column = 0;
                self.zoom = zoom.checked_sub(1);
            }
        }

        self.remaining -= 1;
        Some((coord, self.params.read_window(coord)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Tiles<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;

    fn params(xsize: u32, ysize: u32, tile_size: u32) -> PyramidParams {
        let geometry = RasterGeometry {
            xsize,
            ysize,
            bands: 3,
            geotransform: GeoTransform::from_gdal([0.0, 0.5, 0.0, 0.0, 0.0, -0.5]),
            projection: String::new(),
        };

        PyramidParams::new(&geometry, tile_size).unwrap()
    }

    #[test]
    fn single_tile_raster() {
        let p = params(256, 256, 256);

        assert_eq!(p.max_zoom, 0);
        assert_eq!(p.tile_count, 1);

        let tiles: Vec<_> = p.tiles().collect();
        assert_eq!(
            tiles,
            vec![(
                TileCoord::new(0, 0, 0),
                ReadWindow {
                    left: 0,
                    top: 0,
                    width: 256,
                    height: 256,
                    dst_width: 256,
                    dst_height: 256,
                }
            )]
        );
    }

    #[test]
    fn uneven_raster_edges_and_row_convention() {
        let p = params(300, 300, 256);

        assert_eq!(p.max_zoom, 1);
        assert_eq!(p.tile_count, 5);
        assert_eq!(p.zoom_pixel_sizes, vec![1.0, 0.5]);

        let tiles: Vec<_> = p.tiles().collect();
        let coords: Vec<_> = tiles.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            coords,
            vec![
                TileCoord::new(1, 0, 0),
                TileCoord::new(1, 0, 1),
                TileCoord::new(1, 1, 0),
                TileCoord::new(1, 1, 1),
                TileCoord::new(0, 0, 0),
            ]
        );

        // Row 0 is the bottom of the raster: full height, starting 44 px down.
        let w = tiles[0].1;
        assert_eq!((w.left, w.top, w.width, w.height), (0, 44, 256, 256));
        assert_eq!((w.dst_width, w.dst_height), (256, 256));

        // Row 1 is the 44 px strip along the top edge.
        let w = tiles[1].1;
        assert_eq!((w.left, w.top, w.width, w.height), (0, 0, 256, 44));
        assert_eq!((w.dst_width, w.dst_height), (256, 44));

        let w = tiles[2].1;
        assert_eq!((w.left, w.top, w.width, w.height), (256, 44, 44, 256));

        let w = tiles[3].1;
        assert_eq!((w.left, w.top, w.width, w.height), (256, 0, 44, 44));
        assert_eq!((w.dst_width, w.dst_height), (44, 44));

        let w = tiles[4].1;
        assert_eq!((w.left, w.top, w.width, w.height), (0, 0, 300, 300));
        assert_eq!((w.dst_width, w.dst_height), (150, 150));
    }

    #[test]
    fn max_zoom_bounds_hold() {
        for &tile in &[1u32, 7, 64, 256, 512] {
            for &size in &[1u32, 2, 63, 64, 65, 255, 256, 257, 511, 512, 513, 1024, 4096, 5000] {
                for &other in &[1u32, size / 2 + 1, size] {
                    let p = params(size, other, tile);
                    let largest = size.max(other) as u64;

                    assert!((tile as u64) << p.max_zoom >= largest, "{size}x{other}/{tile}");
                    if p.max_zoom > 0 {
                        assert!((tile as u64) << (p.max_zoom - 1) < largest, "{size}x{other}/{tile}");
                    }
                }
            }
        }
    }

    #[test]
    fn small_raster_has_zoom_zero() {
        let p = params(100, 40, 256);

        assert_eq!(p.max_zoom, 0);
        let tiles: Vec<_> = p.tiles().collect();
        assert_eq!(tiles.len(), 1);
        assert_eq!(
            tiles[0].1,
            ReadWindow {
                left: 0,
                top: 0,
                width: 100,
                height: 40,
                dst_width: 100,
                dst_height: 40,
            }
        );
    }

    #[test]
    fn windows_tile_the_raster_exactly_at_every_zoom() {
        for &(xsize, ysize, tile) in &[(300, 300, 256), (1000, 333, 64), (517, 1025, 128), (64, 64, 16)] {
            let p = params(xsize, ysize, tile);
            let mut hits = vec![0u8; xsize as usize * ysize as usize];

            for zoom in 0..=p.max_zoom {
                hits.iter_mut().for_each(|h| *h = 0);

                for (_, w) in p.tiles().filter(|(c, _)| c.zoom == zoom) {
                    assert!(w.left + w.width <= xsize && w.top + w.height <= ysize);

                    for y in w.top..w.top + w.height {
                        for x in w.left..w.left + w.width {
                            hits[(y * xsize + x) as usize] += 1;
                        }
                    }
                }

                assert!(hits.iter().all(|&h| h == 1), "{xsize}x{ysize}/{tile} z{zoom}");
            }
        }
    }

    #[test]
    fn enumeration_is_deterministic_and_sized() {
        let p = params(1000, 700, 128);

        let first: Vec<_> = p.tiles().collect();
        let second: Vec<_> = p.tiles().collect();
        assert_eq!(first, second);
        assert_eq!(first.len() as u64, p.tile_count);
        assert_eq!(p.tiles().len() as u64, p.tile_count);

        let mut it = p.tiles();
        it.next();
        let resumed = it.clone();
        assert_eq!(it.collect::<Vec<_>>(), resumed.collect::<Vec<_>>());
    }

    #[test]
    fn aligned_raster_has_only_full_tiles() {
        let p = params(1024, 1024, 256);

        assert_eq!(p.max_zoom, 2);
        assert_eq!(p.tile_count, 16 + 4 + 1);
        assert!(p
            .tiles()
            .all(|(_, w)| w.dst_width == 256 && w.dst_height == 256));
    }

    #[test]
    fn rejects_zero_tile_size_and_empty_raster() {
        let geometry = RasterGeometry {
            xsize: 0,
            ysize: 10,
            bands: 1,
            geotransform: GeoTransform::default(),
            projection: String::new(),
        };

        assert!(matches!(
            PyramidParams::new(&geometry, 256),
            Err(PyramidError::InvalidGeometry { .. })
        ));

        let geometry = RasterGeometry { xsize: 10, ..geometry };
        assert!(matches!(
            PyramidParams::new(&geometry, 0),
            Err(PyramidError::InvalidConfig(_))
        ));
    }
}
