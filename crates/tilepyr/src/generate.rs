//! The generation driver: one synchronous pass over the pyramid.

use log::{debug, info, trace};

use crate::config::PyramidConfig;
use crate::encode::TileEncoder;
use crate::error::Result;
use crate::pyramid::{PyramidParams, TileCoord};
use crate::raster::RasterSource;
use crate::render::{
    render_googlemaps, render_openlayers, render_root_kml, render_tile_kml, render_tilemapresource, GoogleMapsPage,
    OpenLayersPage, RootKml, TileKml, TileMapResource,
};
use crate::sink::TileSink;

/// Tiles written so far out of the planned total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProgress {
    pub emitted: u64,
    pub total: u64,
}

impl TileProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.emitted as f64 * 100.0 / self.total as f64
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub params: PyramidParams,
    pub tiles_written: u64,
    pub documents_written: usize,
}

/// Check `config` against `source` and derive the pyramid without touching
/// any sink. Callers that create their output up front run this first.
pub fn plan<R>(source: &R, config: &PyramidConfig) -> Result<PyramidParams>
where
    R: RasterSource + ?Sized,
{
    config.validate()?;
    PyramidParams::new(source.geometry(), config.tile_size)
}

/// Write every tile of `source` into `sink`, highest zoom first, plus the
/// side documents the sink accepts.
///
/// Configuration and geometry are checked before anything reaches the sink.
pub fn generate<R, S, F>(source: &R, sink: &mut S, config: &PyramidConfig, mut on_progress: F) -> Result<Report>
where
    R: RasterSource + ?Sized,
    S: TileSink + ?Sized,
    F: FnMut(TileProgress),
{
    let params = plan(source, config)?;
    let geometry = source.geometry();
    let encoder = TileEncoder::new(config);
    let ext = config.format.extension();

    let bounds = geometry.bounds();
    info!(
        "input: {}x{} px, {} bands, projection {:?}",
        geometry.xsize,
        geometry.ysize,
        geometry.bands,
        geometry.projection
    );
    debug!(
        "bounds: north {} south {} east {} west {}",
        bounds.north, bounds.south, bounds.east, bounds.west
    );
    info!(
        "output: {} tiles of {}px {}, zoom levels 0..={}",
        params.tile_count, config.tile_size, config.format, params.max_zoom
    );
    for (zoom, size) in params.zoom_pixel_sizes.iter().enumerate() {
        debug!("zoom {zoom}: {size} units per pixel");
    }

    let meta = &config.metadata;
    sink.put_metadata("name", &meta.name)?;
    sink.put_metadata("version", &meta.version)?;
    sink.put_metadata("description", &meta.description)?;
    sink.put_metadata("type", &meta.layer_type.to_string())?;
    sink.put_metadata("format", &config.format.to_string())?;

    let with_kml = config.artifacts.kml && geometry.is_epsg4326();
    let mut documents_written = 0;

    if sink.accepts_documents() {
        if config.artifacts.tilemapresource {
            let xml = render_tilemapresource(&TileMapResource {
                title: &meta.title,
                bounds,
                srs: geometry.srs(),
                publish_url: &config.publish_url,
                zoom_pixel_sizes: &params.zoom_pixel_sizes,
                tile_size: config.tile_size,
                tile_extension: ext,
                mime_type: config.format.mime_type(),
                profile: "local",
            });
            sink.put_document("tilemapresource.xml", &xml)?;
            documents_written += 1;
        }

        if config.artifacts.openlayers {
            let html = render_openlayers(&OpenLayersPage {
                title: &meta.title,
                xsize: geometry.xsize,
                ysize: geometry.ysize,
                max_zoom: params.max_zoom,
                tile_size: config.tile_size,
                tile_extension: ext,
            });
            sink.put_document("openlayers.html", &html)?;
            documents_written += 1;
        }

        if config.artifacts.googlemaps {
            let html = render_googlemaps(&GoogleMapsPage {
                title: &meta.title,
                api_key: &config.googlemaps_key,
                xsize: geometry.xsize,
                ysize: geometry.ysize,
                max_zoom: params.max_zoom,
                tile_size: config.tile_size,
                tile_extension: ext,
            });
            sink.put_document("googlemaps.html", &html)?;
            documents_written += 1;
        }

        if with_kml {
            let kml = render_root_kml(&RootKml {
                title: &meta.title,
                bounds,
                tile_size: config.tile_size,
                publish_url: &config.publish_url,
            });
            sink.put_document("doc.kml", &kml)?;
            documents_written += 1;
        } else if config.artifacts.kml {
            info!("projection is not EPSG:4326, skipping KML");
        }
    } else {
        debug!("sink keeps no side documents");
    }

    let total = params.tile_count;
    let mut emitted = 0;
    let mut zoom = None;

    for (coord, window) in params.tiles() {
        if zoom != Some(coord.zoom) {
            let (columns, rows) = params.grid_size(coord.zoom);
            debug!("zoom {}: {columns}x{rows} tiles", coord.zoom);
            zoom = Some(coord.zoom);
        }

        let block = source.read_window(&window, config.resampling)?;
        let data = encoder.encode(&block)?;
        sink.put(coord, &data)?;

        if with_kml && sink.accepts_documents() {
            write_tile_kml(sink, &params, config, coord, source)?;
            documents_written += 1;
        }

        emitted += 1;
        on_progress(TileProgress { emitted, total });
    }

    sink.finish()?;

    Ok(Report {
        params,
        tiles_written: emitted,
        documents_written,
    })
}

fn write_tile_kml<R, S>(
    sink: &mut S,
    params: &PyramidParams,
    config: &PyramidConfig,
    coord: TileCoord,
    source: &R,
) -> Result<()>
where
    R: RasterSource + ?Sized,
    S: TileSink + ?Sized,
{
    let node = params.overlay_node(source.geometry(), coord);
    trace!(
        "{}/{}/{}: n {} s {} e {} w {}, {} children",
        coord.zoom,
        coord.column,
        coord.row,
        node.bounds.north,
        node.bounds.south,
        node.bounds.east,
        node.bounds.west,
        node.children.len()
    );

    let kml = render_tile_kml(&TileKml {
        coord,
        bounds: node.bounds,
        children: &node.children,
        tile_size: config.tile_size,
        tile_extension: config.format.extension(),
    });

    sink.put_document(&format!("{}/{}/{}.kml", coord.zoom, coord.column, coord.row), &kml)
}
