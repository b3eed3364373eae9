use core::num::TryFromIntError;

/// An error from the `rgba_png` crate.
///
/// Every error is reported at the point it's detected and handed straight back
/// to the caller. A failed decode never gives a partial image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngError {
  /// The first 8 bytes aren't the PNG signature.
  NotAPng,

  /// The header describes an image outside of what this codec handles.
  ///
  /// Only 8-bit RGBA, non-interlaced images with standard compression and
  /// filter methods (and nonzero dimensions) are supported.
  UnsupportedFormat,

  /// The chunk layout is broken: the first chunk isn't a 13 byte `IHDR`, or
  /// there's no image data at all.
  MalformedChunk,

  /// The two byte zlib header in front of the image data is not usable.
  ZlibHeaderInvalid,

  /// The DEFLATE data is bad.
  ///
  /// This covers illegal block types, bad symbols, back-references before the
  /// start of the output, truncated bits, and data that doesn't fit the
  /// expected output size.
  CorruptDeflateStream,

  /// A scanline used a filter type other than 0 through 4.
  IllegalFilterType,

  /// A chunk CRC or the zlib Adler-32 didn't match.
  ///
  /// Only reported when checksum verification is turned on in the
  /// [`DecodeOptions`](crate::png::DecodeOptions).
  ChecksumMismatch,

  /// The image is too large.
  ///
  /// Either it's past the configured dimension limit, or the byte size of a
  /// buffer would overflow `usize`.
  DimensionsTooLarge,

  /// The pixel slice given to the encoder isn't exactly `width * height * 4`
  /// bytes.
  PixelBufferSize,

  /// The arena (or the allocator) couldn't give us enough space.
  OutOfMemory,
}

/// Result alias used all over the crate.
pub type PngResult<T> = Result<T, PngError>;

impl core::fmt::Display for PngError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(match self {
      Self::NotAPng => "data does not start with the PNG signature",
      Self::UnsupportedFormat => "only 8-bit RGBA non-interlaced PNG is supported",
      Self::MalformedChunk => "PNG chunk layout is malformed",
      Self::ZlibHeaderInvalid => "invalid zlib header",
      Self::CorruptDeflateStream => "corrupt DEFLATE stream",
      Self::IllegalFilterType => "illegal scanline filter type",
      Self::ChecksumMismatch => "checksum mismatch",
      Self::DimensionsTooLarge => "image dimensions too large",
      Self::PixelBufferSize => "pixel buffer size does not match the image dimensions",
      Self::OutOfMemory => "out of memory",
    })
  }
}

#[cfg(feature = "alloc")]
impl From<alloc::collections::TryReserveError> for PngError {
  #[inline]
  fn from(_: alloc::collections::TryReserveError) -> Self {
    Self::OutOfMemory
  }
}
impl From<TryFromIntError> for PngError {
  #[inline]
  fn from(_: TryFromIntError) -> Self {
    Self::DimensionsTooLarge
  }
}
impl From<bytemuck::PodCastError> for PngError {
  #[inline]
  fn from(_: bytemuck::PodCastError) -> Self {
    Self::OutOfMemory
  }
}
