//! Source rasters: geometry accessor plus windowed, resampled pixel reads.
//!
//! [`ImageRaster`] decodes the whole image once through the `image` crate and
//! looks for georeferencing in this order:
//!
//! 1. GeoTIFF tags (`ModelTransformation`, or `ModelTiepoint` + `ModelPixelScale`)
//!    and the EPSG code from the GeoKey directory
//! 2. an ESRI world file next to the image (`.tfw`, `.pgw`, `.jgw`, `.wld`, ...)
//! 3. the identity transform `[0, 1, 0, 0, 0, 1]`

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, Pixel, RgbImage, RgbaImage};
use log::{debug, warn};
use tiff::decoder::Decoder;
use tiff::tags::Tag;

use crate::config::Resampling;
use crate::error::{PyramidError, Result};
use crate::geometry::{GeoTransform, RasterGeometry};
use crate::pyramid::ReadWindow;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Interleaved 8-bit pixels, `bands` samples per pixel, rows top-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBlock {
    pub width: u32,
    pub height: u32,
    pub bands: u32,
    pub data: Vec<u8>,
}

pub trait RasterSource {
    fn geometry(&self) -> &RasterGeometry;

    /// Read `window`'s source rectangle and resample it to its destination size.
    fn read_window(&self, window: &ReadWindow, resampling: Resampling) -> Result<PixelBlock>;
}

enum Pixels {
    Gray(GrayImage),
    GrayAlpha(GrayAlphaImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

/// A fully decoded raster held in memory.
pub struct ImageRaster {
    geometry: RasterGeometry,
    pixels: Pixels,
}

impl ImageRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let image = image::open(path).map_err(|source| PyramidError::UnreadableSource {
            path: path.to_path_buf(),
            source,
        })?;

        let (geotransform, projection) = match read_georeference(path)? {
            Some(georef) => georef,
            None => {
                debug!("{}: no georeferencing, using pixel coordinates", path.display());
                (GeoTransform::default(), String::new())
            }
        };

        Ok(Self::from_image(image, geotransform, projection))
    }

    pub fn from_image(image: DynamicImage, geotransform: GeoTransform, projection: impl Into<String>) -> Self {
        let (xsize, ysize) = (image.width(), image.height());

        let pixels = match image.color() {
            ColorType::L8 | ColorType::L16 => Pixels::Gray(image.into_luma8()),
            ColorType::La8 | ColorType::La16 => Pixels::GrayAlpha(image.into_luma_alpha8()),
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => Pixels::Rgb(image.into_rgb8()),
            _ => Pixels::Rgba(image.into_rgba8()),
        };

        let bands = match pixels {
            Pixels::Gray(_) => 1,
            Pixels::GrayAlpha(_) => 2,
            Pixels::Rgb(_) => 3,
            Pixels::Rgba(_) => 4,
        };

        Self {
            geometry: RasterGeometry {
                xsize,
                ysize,
                bands,
                geotransform,
                projection: projection.into(),
            },
            pixels,
        }
    }
}

impl RasterSource for ImageRaster {
    fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }

    fn read_window(&self, window: &ReadWindow, resampling: Resampling) -> Result<PixelBlock> {
        let g = &self.geometry;
        let fits = window.width > 0
            && window.height > 0
            && window.left as u64 + window.width as u64 <= g.xsize as u64
            && window.top as u64 + window.height as u64 <= g.ysize as u64;

        if !fits {
            return Err(PyramidError::WindowOutOfBounds {
                left: window.left,
                top: window.top,
                width: window.width,
                height: window.height,
            });
        }

        let filter = resampling.filter();
        let data = match &self.pixels {
            Pixels::Gray(img) => sample(img, window, filter),
            Pixels::GrayAlpha(img) => sample(img, window, filter),
            Pixels::Rgb(img) => sample(img, window, filter),
            Pixels::Rgba(img) => sample(img, window, filter),
        };

        Ok(PixelBlock {
            width: window.dst_width,
            height: window.dst_height,
            bands: g.bands,
            data,
        })
    }
}

fn sample<P>(image: &ImageBuffer<P, Vec<u8>>, w: &ReadWindow, filter: FilterType) -> Vec<u8>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let cropped = imageops::crop_imm(image, w.left, w.top, w.width, w.height).to_image();

    if (w.width, w.height) == (w.dst_width, w.dst_height) {
        cropped.into_raw()
    } else {
        imageops::resize(&cropped, w.dst_width, w.dst_height, filter).into_raw()
    }
}

fn read_georeference(path: &Path) -> Result<Option<(GeoTransform, String)>> {
    let is_tiff = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("tif") || s.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false);

    let mut projection = String::new();

    if is_tiff {
        let (transform, epsg) = read_geotiff_tags(path)?;
        if let Some(code) = epsg {
            projection = format!("EPSG:{code}");
        }

        if let Some(gt) = transform {
            debug!("{}: GeoTIFF transform {:?}, projection {:?}", path.display(), gt.to_gdal(), projection);
            return Ok(Some((gt, projection)));
        }
    }

    for candidate in world_file_candidates(path) {
        let Ok(text) = fs::read_to_string(&candidate) else {
            continue;
        };

        match GeoTransform::from_world_file(&text) {
            Some(gt) => {
                debug!("{}: world file {}", path.display(), candidate.display());
                return Ok(Some((gt, projection)));
            }
            None => warn!("ignoring malformed world file {}", candidate.display()),
        }
    }

    Ok(None)
}

/// `(transform, epsg)` from the first IFD of a (Geo)TIFF.
fn read_geotiff_tags(path: &Path) -> Result<(Option<GeoTransform>, Option<u16>)> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    let transform = if let Some(v) = decoder.find_tag(Tag::from_u16_exhaustive(TAG_MODEL_TRANSFORMATION))? {
        let m = v.into_f64_vec()?;
        (m.len() >= 8).then(|| GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]))
    } else {
        let scale = decoder.find_tag(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE))?;
        let tie = decoder.find_tag(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT))?;

        match (scale, tie) {
            (Some(scale), Some(tie)) => {
                let s = scale.into_f64_vec()?;
                let t = tie.into_f64_vec()?;

                (s.len() >= 2 && t.len() >= 6).then(|| {
                    GeoTransform::from_gdal([t[3] - t[0] * s[0], s[0], 0.0, t[4] + t[1] * s[1], 0.0, -s[1]])
                })
            }
            _ => None,
        }
    };

    let epsg = match decoder.find_tag(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))? {
        Some(v) => epsg_from_geokeys(&v.into_u16_vec()?),
        None => None,
    };

    Ok((transform, epsg))
}

/// GeoKey directory: `[version, revision, minor, count]` then `count` entries
/// of `[key, location, count, value]`. Only inline values are read.
fn epsg_from_geokeys(keys: &[u16]) -> Option<u16> {
    let count = *keys.get(3)? as usize;
    let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).take(count).collect();

    let lookup = |wanted: u16| {
        entries
            .iter()
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3])
            .filter(|&code| code != 0 && code != USER_DEFINED)
    };

    lookup(PROJECTED_CS_TYPE_GEO_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
}

/// `scan.tif` -> `scan.tfw`, `scan.tifw`, `scan.wld`.
fn world_file_candidates(path: &Path) -> Vec<PathBuf> {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return vec![path.with_extension("wld")];
    };

    let mut out = Vec::with_capacity(3);
    let mut chars = ext.chars();
    if let (Some(first), Some(last)) = (chars.next(), chars.next_back()) {
        out.push(path.with_extension(format!("{first}{last}w")));
    }
    out.push(path.with_extension(format!("{ext}w")));
    out.push(path.with_extension("wld"));

    out
}
