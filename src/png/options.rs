use super::FilterChoice;

/// Settings for decoding.
///
/// The default is lenient: checksums are written by every encoder but not
/// checked here, the same as most decoders. Use
/// [`strict`](DecodeOptions::strict) to have them checked.
///
/// Neither the default nor `strict` limits the image size, so anything the
/// encoder can write will decode. For untrusted input, set a
/// [`max_dimension`](DecodeOptions::max_dimension) (such as
/// [`UNTRUSTED_MAX_DIMENSION`](DecodeOptions::UNTRUSTED_MAX_DIMENSION)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeOptions {
  /// Check every chunk's CRC while scanning the chunks.
  pub verify_crc: bool,
  /// Check the zlib header's `FCHECK` bits and the Adler-32 trailer.
  pub verify_adler32: bool,
  /// Images wider or taller than this are rejected before any big buffer is
  /// sized.
  pub max_dimension: u32,
}
impl DecodeOptions {
  /// A width and height limit that keeps a hostile header from asking for
  /// gigabytes of memory.
  pub const UNTRUSTED_MAX_DIMENSION: u32 = 17_000;

  /// Checks all checksums.
  #[inline]
  #[must_use]
  pub const fn strict() -> Self {
    Self { verify_crc: true, verify_adler32: true, max_dimension: u32::MAX }
  }

  /// The same options with a different size limit.
  #[inline]
  #[must_use]
  pub const fn with_max_dimension(self, max_dimension: u32) -> Self {
    Self { max_dimension, ..self }
  }
}
impl Default for DecodeOptions {
  #[inline]
  #[must_use]
  fn default() -> Self {
    Self { verify_crc: false, verify_adler32: false, max_dimension: u32::MAX }
  }
}

/// Settings for encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EncodeOptions {
  pub filter: FilterChoice,
}
