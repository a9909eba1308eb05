//! Tile image encoding.
//!
//! A pixel block is placed on a `tile_size x tile_size` canvas anchored at
//! the bottom-left corner (rows grow northwards), so partial edge tiles line
//! up with the raster's south-west origin. The rest of the canvas is
//! transparent for PNG and black for JPEG.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::config::{PyramidConfig, TileFormat};
use crate::error::{PyramidError, Result};
use crate::raster::PixelBlock;

#[derive(Debug, Clone, Copy)]
pub struct TileEncoder {
    format: TileFormat,
    tile_size: u32,
    jpeg_quality: u8,
}

impl TileEncoder {
    pub fn new(config: &PyramidConfig) -> Self {
        Self {
            format: config.format,
            tile_size: config.tile_size,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Bands written for a source with `bands` samples per pixel.
    fn output_bands(&self, bands: u32) -> u32 {
        let alpha = self.format.supports_alpha();

        match bands {
            // Synthesized alpha marks the data area opaque.
            3 if alpha => 4,
            2 | 4 if !alpha => bands - 1,
            b => b,
        }
    }

    pub fn encode(&self, block: &PixelBlock) -> Result<Vec<u8>> {
        if !(1..=4).contains(&block.bands) {
            return Err(PyramidError::InvalidConfig(format!(
                "cannot encode {} band tiles",
                block.bands
            )));
        }
        if block.width > self.tile_size || block.height > self.tile_size {
            return Err(PyramidError::InvalidConfig(format!(
                "{}x{} block does not fit a {} px tile",
                block.width, block.height, self.tile_size
            )));
        }

        let out_bands = self.output_bands(block.bands);
        let canvas = self.compose(block, out_bands);

        let size = self.tile_size;
        let mut bytes = Vec::new();

        match self.format {
            TileFormat::Png => {
                let color = match out_bands {
                    1 => ExtendedColorType::L8,
                    2 => ExtendedColorType::La8,
                    3 => ExtendedColorType::Rgb8,
                    _ => ExtendedColorType::Rgba8,
                };
                PngEncoder::new(&mut bytes).write_image(&canvas, size, size, color)?;
            }
            TileFormat::Jpeg => {
                let color = match out_bands {
                    1 => ExtendedColorType::L8,
                    _ => ExtendedColorType::Rgb8,
                };
                JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality)
                    .write_image(&canvas, size, size, color)?;
            }
        }

        Ok(bytes)
    }

    /// Copy `block` into a zeroed canvas with `out_bands` samples per pixel.
    fn compose(&self, block: &PixelBlock, out_bands: u32) -> Vec<u8> {
        let size = self.tile_size as usize;
        let in_b = block.bands as usize;
        let out_b = out_bands as usize;
        let (w, h) = (block.width as usize, block.height as usize);

        let mut canvas = vec![0u8; size * size * out_b];
        let y0 = size - h;

        for y in 0..h {
            let src_row = &block.data[y * w * in_b..(y + 1) * w * in_b];
            let dst_start = ((y0 + y) * size) * out_b;
            let dst_row = &mut canvas[dst_start..dst_start + w * out_b];

            for (src, dst) in src_row.chunks_exact(in_b).zip(dst_row.chunks_exact_mut(out_b)) {
                let n = in_b.min(out_b);
                dst[..n].copy_from_slice(&src[..n]);
                if out_b > in_b {
                    dst[out_b - 1] = u8::MAX;
                }
            }
        }

        canvas
    }
}
