use std::io::Cursor;

use anyhow::Context;

use crate::{
    error::VestureResult,
    raster::RasterImage,
};

pub fn decode_raster(bytes: &[u8]) -> VestureResult<RasterImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    RasterImage::new(width, height, rgba.into_raw())
}

pub fn encode_png(raster: &RasterImage) -> VestureResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(raster.width(), raster.height(), raster.pixels().to_vec())
        .context("raster buffer does not match its dimensions")?;
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode png")?;
    Ok(buf)
}
