//! Side documents: TMS `tilemapresource.xml`, KML super-overlay and two
//! static HTML viewers. Each renderer takes one parameter struct and returns
//! the document text.

use std::borrow::Cow;
use std::fmt::Write;

use crate::geometry::Bounds;
use crate::pyramid::TileCoord;

pub struct TileMapResource<'a> {
    pub title: &'a str,
    pub bounds: Bounds,
    pub srs: &'a str,
    pub publish_url: &'a str,
    /// Units per pixel, indexed by zoom.
    pub zoom_pixel_sizes: &'a [f64],
    pub tile_size: u32,
    pub tile_extension: &'a str,
    pub mime_type: &'a str,
    pub profile: &'a str,
}

pub struct RootKml<'a> {
    pub title: &'a str,
    pub bounds: Bounds,
    pub tile_size: u32,
    pub publish_url: &'a str,
}

pub struct TileKml<'a> {
    pub coord: TileCoord,
    pub bounds: Bounds,
    pub children: &'a [(TileCoord, Bounds)],
    pub tile_size: u32,
    pub tile_extension: &'a str,
}

pub struct OpenLayersPage<'a> {
    pub title: &'a str,
    pub xsize: u32,
    pub ysize: u32,
    pub max_zoom: u32,
    pub tile_size: u32,
    pub tile_extension: &'a str,
}

pub struct GoogleMapsPage<'a> {
    pub title: &'a str,
    pub api_key: &'a str,
    pub xsize: u32,
    pub ysize: u32,
    pub max_zoom: u32,
    pub tile_size: u32,
    pub tile_extension: &'a str,
}

/// Escape text for XML/HTML element content and attribute values.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }

    Cow::Owned(out)
}

pub fn render_tilemapresource(p: &TileMapResource) -> String {
    let b = p.bounds;
    let mut s = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<TileMap version="1.0.0" tilemapservice="http://tms.osgeo.org/1.0.0">
  <Title>{title}</Title>
  <Abstract></Abstract>
  <SRS>{srs}</SRS>
  <BoundingBox minx="{west:.20}" miny="{south:.20}" maxx="{east:.20}" maxy="{north:.20}"/>
  <Origin x="{west:.20}" y="{south:.20}"/>
  <TileFormat width="{size}" height="{size}" mime-type="{mime}" extension="{ext}"/>
  <TileSets profile="{profile}">
"#,
        title = escape_xml(p.title),
        srs = escape_xml(p.srs),
        west = b.west,
        south = b.south,
        east = b.east,
        north = b.north,
        size = p.tile_size,
        mime = p.mime_type,
        ext = p.tile_extension,
        profile = p.profile,
    );

    for (zoom, units) in p.zoom_pixel_sizes.iter().enumerate() {
        let _ = writeln!(
            s,
            r#"    <TileSet href="{}{zoom}" units-per-pixel="{units:.20}" order="{zoom}"/>"#,
            escape_xml(p.publish_url),
        );
    }

    s.push_str("  </TileSets>\n</TileMap>\n");
    s
}

fn write_lat_lon(s: &mut String, tag: &str, indent: &str, b: &Bounds) {
    let _ = write!(
        s,
        "{indent}<{tag}>
{indent}  <north>{:.20}</north>
{indent}  <south>{:.20}</south>
{indent}  <east>{:.20}</east>
{indent}  <west>{:.20}</west>
{indent}</{tag}>
",
        b.north, b.south, b.east, b.west,
    );
}

fn write_lod(s: &mut String, indent: &str, min_lod_pixels: u32) {
    let _ = write!(
        s,
        "{indent}<Lod>
{indent}  <minLodPixels>{min_lod_pixels}</minLodPixels>
{indent}  <maxLodPixels>-1</maxLodPixels>
{indent}</Lod>
"
    );
}

const KML_HEAD: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<kml xmlns="http://earth.google.com/kml/2.1">
  <Document>
"#;

const KML_TAIL: &str = "  </Document>\n</kml>\n";

pub fn render_root_kml(p: &RootKml) -> String {
    let mut s = String::from(KML_HEAD);

    let _ = write!(
        s,
        r#"    <name>{}</name>
    <description></description>
    <Style>
      <ListStyle id="hideChildren">
        <listItemType>checkHideChildren</listItemType>
      </ListStyle>
    </Style>
    <Region>
"#,
        escape_xml(p.title)
    );
    write_lat_lon(&mut s, "LatLonAltBox", "      ", &p.bounds);
    s.push_str("    </Region>\n    <NetworkLink>\n      <open>1</open>\n      <Region>\n");
    write_lod(&mut s, "        ", p.tile_size / 2);
    write_lat_lon(&mut s, "LatLonAltBox", "        ", &p.bounds);
    let _ = write!(
        s,
        "      </Region>
      <Link>
        <href>{}0/0/0.kml</href>
        <viewRefreshMode>onRegion</viewRefreshMode>
      </Link>
    </NetworkLink>
",
        escape_xml(p.publish_url)
    );

    s.push_str(KML_TAIL);
    s
}

/// KML for one tile, stored at `<zoom>/<column>/<row>.kml` next to the tile image.
pub fn render_tile_kml(p: &TileKml) -> String {
    let TileCoord { zoom, column, row } = p.coord;
    let min_lod = p.tile_size / 2;
    let mut s = String::from(KML_HEAD);

    let _ = writeln!(s, "    <name>{zoom}/{column}/{row}.kml</name>\n    <Region>");
    write_lod(&mut s, "      ", min_lod);
    write_lat_lon(&mut s, "LatLonAltBox", "      ", &p.bounds);
    let _ = writeln!(
        s,
        "    </Region>
    <GroundOverlay>
      <drawOrder>{zoom}</drawOrder>
      <Icon>
        <href>{row}.{}</href>
      </Icon>",
        p.tile_extension
    );
    write_lat_lon(&mut s, "LatLonBox", "      ", &p.bounds);
    s.push_str("    </GroundOverlay>\n");

    for (child, b) in p.children {
        let TileCoord { zoom: cz, column: cx, row: cy } = *child;

        let _ = writeln!(
            s,
            "    <NetworkLink>\n      <name>{cz}/{cx}/{cy}.{}</name>\n      <Region>",
            p.tile_extension
        );
        write_lod(&mut s, "        ", min_lod);
        write_lat_lon(&mut s, "LatLonAltBox", "        ", b);
        let _ = write!(
            s,
            "      </Region>
      <Link>
        <href>../../{cz}/{cx}/{cy}.kml</href>
        <viewRefreshMode>onRegion</viewRefreshMode>
        <viewFormat/>
      </Link>
    </NetworkLink>
"
        );
    }

    s.push_str(KML_TAIL);
    s
}

const PAGE_STYLE: &str = r#"    <meta http-equiv="content-type" content="text/html; charset=utf-8"/>
    <style type="text/css">
        html, body { overflow: hidden; padding: 0; height: 100%; width: 100%; font-family: 'Lucida Grande',Geneva,Arial,Verdana,sans-serif; }
        body { margin: 10px; background: #fff; }
        h1 { margin: 0; padding: 6px; border:0; font-size: 20pt; }
        #header { height: 43px; padding: 0; background-color: #eee; border: 1px solid #888; }
        #subheader { height: 12px; text-align: right; font-size: 10px; color: #555;}
        #map { height: 95%; border: 1px solid #888; background-color: #fff; }
    </style>
"#;

const RESIZE_SCRIPT: &str = r#"
    function getWindowHeight() {
        if (self.innerHeight) return self.innerHeight;
        if (document.documentElement && document.documentElement.clientHeight)
            return document.documentElement.clientHeight;
        if (document.body) return document.body.clientHeight;
        return 0;
    }

    function getWindowWidth() {
        if (self.innerWidth) return self.innerWidth;
        if (document.documentElement && document.documentElement.clientWidth)
            return document.documentElement.clientWidth;
        if (document.body) return document.body.clientWidth;
        return 0;
    }

    function resize() {
        var map = document.getElementById("map");
        var header = document.getElementById("header");
        var subheader = document.getElementById("subheader");
        map.style.height = (getWindowHeight()-80) + "px";
        map.style.width = (getWindowWidth()-20) + "px";
        header.style.width = (getWindowWidth()-20) + "px";
        subheader.style.width = (getWindowWidth()-20) + "px";
    }

    onresize = function() { resize(); };
"#;

fn page(title: &str, script_src: &str, script: &str, body_attrs: &str) -> String {
    let title = escape_xml(title);

    format!(
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
  <head>
    <title>{title}</title>
{PAGE_STYLE}    <script src="{script_src}" type="text/javascript"></script>
    <script type="text/javascript">
    //<![CDATA[
{RESIZE_SCRIPT}{script}
    //]]>
    </script>
  </head>
  <body {body_attrs}>
      <div id="header"><h1>{title}</h1></div>
      <div id="subheader">Generated by raster2tiles</div>
      <div id="map"></div>
  </body>
</html>
"#
    )
}

/// OpenLayers 2 viewer in pixel units; tiles are fetched as `z/x/y.ext` with
/// `y` counted from the bottom.
pub fn render_openlayers(p: &OpenLayersPage) -> String {
    let script = format!(
        r#"
    var map, layer;

    function load() {{
        var options = {{
            controls: [],
            maxExtent: new OpenLayers.Bounds(0, 0, {xsize}, {ysize}),
            maxResolution: {max_resolution},
            numZoomLevels: {levels},
            units: 'pixels',
            projection: ""
        }};
        map = new OpenLayers.Map("map", options);

        map.addControl(new OpenLayers.Control.PanZoomBar());
        map.addControl(new OpenLayers.Control.MouseDefaults());
        map.addControl(new OpenLayers.Control.KeyboardDefaults());

        OpenLayers.Layer.TMS.prototype.getURL = function (bounds) {{
            bounds = this.adjustBoundsByGutter(bounds);
            var res = this.map.getResolution();
            var x = Math.round((bounds.left - this.tileOrigin.lon) / (res * this.tileSize.w));
            var y = Math.round((bounds.bottom - this.tileOrigin.lat) / (res * this.tileSize.h));
            var z = this.map.getZoom();
            var path = z + "/" + x + "/" + y + "." + this.type;
            var url = this.url;
            if (url instanceof Array) {{
                url = this.selectUrl(path, url);
            }}
            return url + path;
        }};
        layer = new OpenLayers.Layer.TMS("TMS", "", {{
            layername: 'map',
            type: '{ext}',
            tileSize: new OpenLayers.Size({tile_size}, {tile_size})
        }});
        map.addLayer(layer);
        map.zoomTo({zoom});

        resize();
    }}
"#,
        xsize = p.xsize,
        ysize = p.ysize,
        max_resolution = 1u64 << p.max_zoom,
        levels = p.max_zoom + 1,
        ext = p.tile_extension,
        tile_size = p.tile_size,
        zoom = p.max_zoom.min(3),
    );

    page(
        p.title,
        "http://www.openlayers.org/api/2.4/OpenLayers.js",
        &script,
        r#"onload="load()""#,
    )
}

/// Google Maps v2 viewer with a flat (non-Mercator) projection over the
/// raster's pixel space.
pub fn render_googlemaps(p: &GoogleMapsPage) -> String {
    let script = format!(
        r#"
    function FlatProjection(width, height, pixelsPerLon, zoom, maxZoom, tileSize) {{
        this.pixelsPerLonDegree = new Array(maxZoom);
        this.tileBounds = new Array(maxZoom);

        width /= Math.pow(2, zoom);
        height /= Math.pow(2, zoom);
        pixelsPerLon /= Math.pow(2, zoom);

        for (var i = maxZoom; i >= 0; i--) {{
            this.pixelsPerLonDegree[i] = pixelsPerLon * Math.pow(2, i);
            this.tileBounds[i] = new GPoint(Math.ceil(width * Math.pow(2, i) / tileSize),
                                            Math.ceil(height * Math.pow(2, i) / tileSize));
        }}
    }}

    FlatProjection.prototype = new GProjection();

    FlatProjection.prototype.fromLatLngToPixel = function(point, zoom) {{
        var x = Math.round(point.lng() * this.pixelsPerLonDegree[zoom]);
        var y = Math.round(point.lat() * this.pixelsPerLonDegree[zoom]);
        return new GPoint(x, y);
    }};

    FlatProjection.prototype.fromPixelToLatLng = function(pixel, zoom, unbounded) {{
        var lng = pixel.x / this.pixelsPerLonDegree[zoom];
        var lat = pixel.y / this.pixelsPerLonDegree[zoom];
        return new GLatLng(lat, lng, true);
    }};

    FlatProjection.prototype.tileCheckRange = function(tile, zoom, tilesize) {{
        return !(tile.y < 0 || tile.x < 0 || tile.y >= this.tileBounds[zoom].y || tile.x >= this.tileBounds[zoom].x);
    }};

    FlatProjection.prototype.getWrapWidth = function(zoom) {{
        return Number.MAX_VALUE;
    }};

    function load() {{
        var MapWidth = {xsize};
        var MapHeight = {ysize};
        var MapMaxZoom = {max_zoom};
        var MapPxPerLon = {tile_size};

        if (GBrowserIsCompatible()) {{
            var map = new GMap2(document.getElementById("map"));
            var tileLayer = [ new GTileLayer(new GCopyrightCollection(null), 0, MapMaxZoom) ];
            tileLayer[0].getTileUrl = function(a, b) {{
                // Google indexes rows from the top, tiles are stored bottom-up.
                var y = Math.floor(MapHeight / (MapPxPerLon * Math.pow(2, (MapMaxZoom - b)))) - a.y;
                return b + "/" + a.x + "/" + y + ".{ext}";
            }};
            var mapType = new GMapType(
                tileLayer,
                new FlatProjection(MapWidth, MapHeight, MapPxPerLon, MapMaxZoom - 2, MapMaxZoom, MapPxPerLon),
                'Default',
                {{ maxResolution: MapMaxZoom, minResolution: 0, tileSize: MapPxPerLon }}
            );
            map.addMapType(mapType);

            map.removeMapType(G_NORMAL_MAP);
            map.removeMapType(G_SATELLITE_MAP);
            map.removeMapType(G_HYBRID_MAP);

            map.setCenter(new GLatLng((MapHeight / MapPxPerLon / 4) / 2, (MapWidth / MapPxPerLon / 4) / 2), {zoom}, mapType);
            map.getContainer().style.backgroundColor = '#fff';
            map.addControl(new GLargeMapControl());
        }}
        resize();
    }}
"#,
        xsize = p.xsize,
        ysize = p.ysize,
        max_zoom = p.max_zoom,
        tile_size = p.tile_size,
        ext = p.tile_extension,
        zoom = p.max_zoom.min(3),
    );

    let src = format!(
        "http://maps.google.com/maps?file=api&amp;v=2.x&amp;key={}",
        escape_xml(p.api_key)
    );

    page(p.title, &src, &script, r#"onload="load()" onunload="GUnload()""#)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Bounds {
        Bounds {
            north: 50.0,
            south: 49.0,
            east: 15.5,
            west: 14.0,
        }
    }

    #[test]
    fn tilemapresource_lists_every_zoom() {
        let xml = render_tilemapresource(&TileMapResource {
            title: "Old & new",
            bounds: bounds(),
            srs: "EPSG:4326",
            publish_url: "http://example.org/tiles/",
            zoom_pixel_sizes: &[4.0, 2.0, 1.0],
            tile_size: 256,
            tile_extension: "png",
            mime_type: "image/png",
            profile: "local",
        });

        assert!(xml.contains("<Title>Old &amp; new</Title>"));
        assert!(xml.contains("<SRS>EPSG:4326</SRS>"));
        assert!(xml.contains(r#"minx="14.00000000000000000000""#));
        assert!(xml.contains(r#"maxy="50.00000000000000000000""#));
        assert!(xml.contains(r#"<TileFormat width="256" height="256" mime-type="image/png" extension="png"/>"#));
        assert!(xml.contains(
            r#"<TileSet href="http://example.org/tiles/2" units-per-pixel="1.00000000000000000000" order="2"/>"#
        ));
        assert_eq!(xml.matches("<TileSet ").count(), 3);
        assert!(xml.ends_with("</TileMap>\n"));
    }

    #[test]
    fn root_kml_links_to_top_tile() {
        let kml = render_root_kml(&RootKml {
            title: "scan",
            bounds: bounds(),
            tile_size: 256,
            publish_url: "",
        });

        assert!(kml.contains("<minLodPixels>128</minLodPixels>"));
        assert!(kml.contains("<href>0/0/0.kml</href>"));
        assert_eq!(kml.matches("<north>50.00000000000000000000</north>").count(), 2);
    }

    #[test]
    fn tile_kml_links_children_relative_to_itself() {
        let child = Bounds {
            north: 49.5,
            south: 49.0,
            east: 14.75,
            west: 14.0,
        };
        let children = [(TileCoord::new(3, 4, 6), child), (TileCoord::new(3, 4, 7), child)];

        let kml = render_tile_kml(&TileKml {
            coord: TileCoord::new(2, 2, 3),
            bounds: bounds(),
            children: &children,
            tile_size: 256,
            tile_extension: "png",
        });

        assert!(kml.contains("<name>2/2/3.kml</name>"));
        assert!(kml.contains("<drawOrder>2</drawOrder>"));
        assert!(kml.contains("<href>3.png</href>"));
        assert!(kml.contains("<href>../../3/4/6.kml</href>"));
        assert!(kml.contains("<href>../../3/4/7.kml</href>"));
        assert_eq!(kml.matches("<NetworkLink>").count(), 2);
        assert!(kml.contains("<north>49.50000000000000000000</north>"));
    }

    #[test]
    fn leaf_tile_kml_has_no_links() {
        let kml = render_tile_kml(&TileKml {
            coord: TileCoord::new(0, 0, 0),
            bounds: bounds(),
            children: &[],
            tile_size: 256,
            tile_extension: "jpg",
        });

        assert!(!kml.contains("<NetworkLink>"));
        assert!(kml.contains("<href>0.jpg</href>"));
    }

    #[test]
    fn viewer_pages_carry_raster_size_and_zoom() {
        let ol = render_openlayers(&OpenLayersPage {
            title: "<scan>",
            xsize: 3000,
            ysize: 2000,
            max_zoom: 4,
            tile_size: 256,
            tile_extension: "png",
        });

        assert!(ol.contains("<title>&lt;scan&gt;</title>"));
        assert!(ol.contains("new OpenLayers.Bounds(0, 0, 3000, 2000)"));
        assert!(ol.contains("maxResolution: 16,"));
        assert!(ol.contains("numZoomLevels: 5,"));
        assert!(ol.contains("map.zoomTo(3);"));

        let gm = render_googlemaps(&GoogleMapsPage {
            title: "scan",
            api_key: "KEY",
            xsize: 300,
            ysize: 300,
            max_zoom: 1,
            tile_size: 256,
            tile_extension: "jpg",
        });

        assert!(gm.contains("key=KEY"));
        assert!(gm.contains("var MapMaxZoom = 1;"));
        assert!(gm.contains(r#"y + ".jpg""#));
        assert!(gm.contains("onunload=\"GUnload()\""));
    }
}
