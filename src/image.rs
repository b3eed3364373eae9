#![forbid(unsafe_code)]

//! Provides a heap-allocated image type.

use alloc::vec::Vec;
use pixel_formats::r8g8b8a8_Srgb;

use crate::{
  png::{decode_png, encode_png, DecodeOptions, EncodeOptions},
  PngError, PngResult,
};

/// Converts an `(x,y)` position within a given `width` 2D space into a linear
/// index.
#[inline]
#[must_use]
pub const fn xy_width_to_index(x: u32, y: u32, width: u32) -> usize {
  (y as usize) * (width as usize) + (x as usize)
}

/// An owned direct-color image.
///
/// The fields are public, but if you put them together weirdly the methods of
/// this type might panic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct Bitmap<P = r8g8b8a8_Srgb> {
  pub width: u32,
  pub height: u32,
  pub pixels: Vec<P>,
}

/// The usual bitmap, sRGB with alpha.
pub type RgbaBitmap = Bitmap<r8g8b8a8_Srgb>;

impl<P> Bitmap<P> {
  /// Gets the pixel at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn get(&self, x: u32, y: u32) -> Option<&P> {
    if x < self.width && y < self.height {
      self.pixels.get(xy_width_to_index(x, y, self.width))
    } else {
      None
    }
  }

  /// Gets the pixel at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut P> {
    if x < self.width && y < self.height {
      self.pixels.get_mut(xy_width_to_index(x, y, self.width))
    } else {
      None
    }
  }
}

impl<P> Bitmap<P>
where
  P: From<r8g8b8a8_Srgb>,
{
  /// Decodes PNG bytes into a bitmap.
  ///
  /// ## Failure
  /// Anything that [`decode_png`] can give.
  pub fn try_from_png_bytes(bytes: &[u8], options: DecodeOptions) -> PngResult<Self> {
    let (width, height, rgba) = decode_png(bytes, options)?;
    let mut pixels: Vec<P> = Vec::new();
    pixels.try_reserve(rgba.len() / 4)?;
    pixels.extend(
      rgba.chunks_exact(4).map(|p| P::from(r8g8b8a8_Srgb { r: p[0], g: p[1], b: p[2], a: p[3] })),
    );
    Ok(Self { width, height, pixels })
  }
}

impl<P> Bitmap<P>
where
  P: Copy + Into<r8g8b8a8_Srgb>,
{
  /// Encodes the bitmap as PNG bytes.
  ///
  /// ## Failure
  /// * [`PngError::PixelBufferSize`] if there isn't exactly `width * height`
  ///   pixels.
  /// * Anything else that [`encode_png`] can give.
  pub fn to_png_bytes(&self, options: EncodeOptions) -> PngResult<Vec<u8>> {
    let expected = xy_width_to_index(0, self.height, self.width);
    if self.pixels.len() != expected {
      return Err(PngError::PixelBufferSize);
    }
    let mut rgba: Vec<u8> = Vec::new();
    rgba.try_reserve(self.pixels.len().checked_mul(4).ok_or(PngError::DimensionsTooLarge)?)?;
    for p in self.pixels.iter().copied() {
      let r8g8b8a8_Srgb { r, g, b, a } = p.into();
      rgba.extend_from_slice(&[r, g, b, a]);
    }
    encode_png(self.width, self.height, &rgba, options)
  }
}
