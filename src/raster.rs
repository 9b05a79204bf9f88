use crate::error::{VestureError, VestureResult};

pub type Rgba8 = [u8; 4];

/// Straight-alpha RGBA pixel grid. Every stage of the pipeline consumes a
/// borrowed raster and produces a fresh one; nothing mutates a caller's
/// buffer in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> VestureResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| VestureError::validation("raster size overflow"))?;
        if pixels.len() != expected {
            return Err(VestureError::validation(format!(
                "raster expects {expected} bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// All-transparent raster of the given dimensions.
    pub fn blank(width: u32, height: u32) -> VestureResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| VestureError::validation("raster size overflow"))?;
        Self::new(width, height, vec![0u8; len])
    }

    pub fn filled(width: u32, height: u32, px: Rgba8) -> VestureResult<Self> {
        let count = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| VestureError::validation("raster size overflow"))?;
        Self::new(width, height, px.repeat(count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        let i = self.offset(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Clamp-to-edge sampling, usable with out-of-range coordinates.
    #[inline]
    pub fn pixel_clamped(&self, x: i64, y: i64) -> Rgba8 {
        let cx = x.clamp(0, i64::from(self.width) - 1) as u32;
        let cy = y.clamp(0, i64::from(self.height) - 1) as u32;
        self.pixel(cx, cy)
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, px: Rgba8) {
        let i = self.offset(x, y);
        self.pixels[i..i + 4].copy_from_slice(&px);
    }

    /// Copy out the sub-rectangle `[x0..=x1] x [y0..=y1]` (inclusive, must be
    /// inside the raster).
    pub fn crop(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> VestureResult<RasterImage> {
        if x1 < x0 || y1 < y0 || x1 >= self.width || y1 >= self.height {
            return Err(VestureError::validation(format!(
                "crop [{x0},{y0}]..[{x1},{y1}] outside {}x{}",
                self.width, self.height
            )));
        }
        let (cw, ch) = (x1 - x0 + 1, y1 - y0 + 1);
        let mut out = Vec::with_capacity((cw as usize) * (ch as usize) * 4);
        for y in y0..=y1 {
            let row = self.offset(x0, y);
            out.extend_from_slice(&self.pixels[row..row + (cw as usize) * 4]);
        }
        RasterImage::new(cw, ch, out)
    }
}

/// Relative luminance on 0..1 from 8-bit channels.
#[inline]
pub fn luma(px: Rgba8) -> f32 {
    (0.2126 * f32::from(px[0]) + 0.7152 * f32::from(px[1]) + 0.0722 * f32::from(px[2])) / 255.0
}

/// HSV-style saturation on 0..1.
#[inline]
pub fn saturation(px: Rgba8) -> f32 {
    let max = px[0].max(px[1]).max(px[2]);
    if max == 0 {
        return 0.0;
    }
    let min = px[0].min(px[1]).min(px[2]);
    f32::from(max - min) / f32::from(max)
}
