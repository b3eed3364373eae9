use crate::{PngError, PngResult};

/// Color type 6: red, green, blue, and alpha channels.
pub const COLOR_TYPE_RGBA: u8 = 6;

/// Image Header
///
/// The fields hold whatever the file said. Use [`validate`](IHDR::validate)
/// to check that it's an image this crate can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IHDR {
  /// width in pixels
  pub width: u32,
  /// height in pixels
  pub height: u32,
  /// bits per channel
  pub bit_depth: u8,
  /// pixel color type
  pub color_type: u8,
  /// always 0 (zlib)
  pub compression_method: u8,
  /// always 0 (the five adaptive filters)
  pub filter_method: u8,
  /// 0 for none, 1 for Adam7
  pub interlace_method: u8,
}
impl IHDR {
  /// Size of the chunk data.
  pub const LEN: usize = 13;

  /// A header for an 8-bit RGBA image that isn't interlaced.
  #[inline]
  #[must_use]
  pub const fn rgba8(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      bit_depth: 8,
      color_type: COLOR_TYPE_RGBA,
      compression_method: 0,
      filter_method: 0,
      interlace_method: 0,
    }
  }

  /// Checks that this is the one format handled here: 8-bit RGBA, standard
  /// compression and filtering, no interlace, nonzero dimensions.
  ///
  /// ## Failure
  /// * [`PngError::UnsupportedFormat`] otherwise.
  pub fn validate(&self) -> PngResult<()> {
    if *self == Self::rgba8(self.width, self.height) && self.width != 0 && self.height != 0 {
      Ok(())
    } else {
      log::debug!("unsupported header: {self:?}");
      Err(PngError::UnsupportedFormat)
    }
  }

  /// Bytes per line of filtered data, including the filter type byte.
  ///
  /// ## Failure
  /// * [`PngError::DimensionsTooLarge`] if it doesn't fit in `usize`.
  #[inline]
  pub fn bytes_per_filterline(&self) -> PngResult<usize> {
    usize::try_from(self.width)?
      .checked_mul(4)
      .and_then(|n| n.checked_add(1))
      .ok_or(PngError::DimensionsTooLarge)
  }

  /// Bytes of filtered data the zlib stream should decompress to.
  #[inline]
  pub fn filtered_len(&self) -> PngResult<usize> {
    self
      .bytes_per_filterline()?
      .checked_mul(usize::try_from(self.height)?)
      .ok_or(PngError::DimensionsTooLarge)
  }

  /// Bytes of RGBA8 pixel data in the final image.
  #[inline]
  pub fn pixels_len(&self) -> PngResult<usize> {
    rgba8_len(self.width, self.height)
  }

  /// The chunk data bytes.
  #[inline]
  #[must_use]
  pub fn to_bytes(&self) -> [u8; 13] {
    let [w0, w1, w2, w3] = self.width.to_be_bytes();
    let [h0, h1, h2, h3] = self.height.to_be_bytes();
    [
      w0,
      w1,
      w2,
      w3,
      h0,
      h1,
      h2,
      h3,
      self.bit_depth,
      self.color_type,
      self.compression_method,
      self.filter_method,
      self.interlace_method,
    ]
  }
}
impl TryFrom<&[u8]> for IHDR {
  type Error = PngError;
  /// Reads the fields of a 13 byte chunk, without judging them.
  fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
    match value {
      [w0, w1, w2, w3, h0, h1, h2, h3, bit_depth, color_type, compression_method, filter_method, interlace_method] => {
        Ok(Self {
          width: u32::from_be_bytes([*w0, *w1, *w2, *w3]),
          height: u32::from_be_bytes([*h0, *h1, *h2, *h3]),
          bit_depth: *bit_depth,
          color_type: *color_type,
          compression_method: *compression_method,
          filter_method: *filter_method,
          interlace_method: *interlace_method,
        })
      }
      _ => Err(PngError::MalformedChunk),
    }
  }
}

/// `width * height * 4`, or an error if that overflows.
#[inline]
pub(crate) fn rgba8_len(width: u32, height: u32) -> PngResult<usize> {
  usize::try_from(width)?
    .checked_mul(usize::try_from(height)?)
    .and_then(|n| n.checked_mul(4))
    .ok_or(PngError::DimensionsTooLarge)
}

#[test]
fn test_ihdr_parse_and_validate() {
  let bytes = [0, 0, 1, 0, 0, 0, 0, 3, 8, 6, 0, 0, 0];
  let ihdr = IHDR::try_from(&bytes[..]).unwrap();
  assert_eq!(ihdr, IHDR::rgba8(256, 3));
  assert_eq!(ihdr.validate(), Ok(()));
  assert_eq!(ihdr.to_bytes(), bytes);
  assert_eq!(ihdr.bytes_per_filterline(), Ok(1025));
  assert_eq!(ihdr.filtered_len(), Ok(1025 * 3));
  assert_eq!(ihdr.pixels_len(), Ok(1024 * 3));
}

#[test]
fn test_ihdr_wrong_size() {
  assert_eq!(IHDR::try_from(&[0_u8; 12][..]), Err(PngError::MalformedChunk));
  assert_eq!(IHDR::try_from(&[0_u8; 14][..]), Err(PngError::MalformedChunk));
}

#[test]
fn test_ihdr_unsupported() {
  let good = IHDR::rgba8(4, 4);
  for bad in [
    IHDR { bit_depth: 16, ..good },
    IHDR { color_type: 2, ..good },
    IHDR { compression_method: 1, ..good },
    IHDR { filter_method: 1, ..good },
    IHDR { interlace_method: 1, ..good },
    IHDR { width: 0, ..good },
    IHDR { height: 0, ..good },
  ] {
    assert_eq!(bad.validate(), Err(PngError::UnsupportedFormat), "{bad:?}");
  }
}
