//! The zlib wrapper ([RFC 1950](https://www.rfc-editor.org/rfc/rfc1950))
//! around a DEFLATE stream.
//!
//! * 2 byte header: `CMF` (compression method and window size), then `FLG`
//!   (check bits, preset dictionary flag, level hint).
//! * The DEFLATE data.
//! * 4 byte big-endian Adler-32 of the uncompressed data.

use super::inflate;
use crate::{arena::Arena, bit_cursor::BitCursor, PngError, PngResult};

/// The header this crate's encoder writes: deflate, 32k window, "fastest"
/// level hint.
pub const ZLIB_HEADER_STORED: [u8; 2] = [0x78, 0x01];

/// Adler-32's modulus, the largest prime under 2^16.
const ADLER_MOD: u32 = 65521;

/// Most bytes that can go into the sums before they could overflow a `u32`.
const ADLER_NMAX: usize = 5552;

/// A running Adler-32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
  a: u32,
  b: u32,
}
impl Default for Adler32 {
  #[inline]
  #[must_use]
  fn default() -> Self {
    Self::new()
  }
}
impl Adler32 {
  #[inline]
  #[must_use]
  pub const fn new() -> Self {
    Self { a: 1, b: 0 }
  }

  pub fn update(&mut self, bytes: &[u8]) {
    for chunk in bytes.chunks(ADLER_NMAX) {
      for byte in chunk.iter().copied() {
        self.a += u32::from(byte);
        self.b += self.a;
      }
      self.a %= ADLER_MOD;
      self.b %= ADLER_MOD;
    }
  }

  #[inline]
  #[must_use]
  pub const fn finish(self) -> u32 {
    (self.b << 16) | self.a
  }
}

/// Checks the 2 byte zlib header.
///
/// * `CM` (low nibble of the first byte) must be 8, deflate.
/// * `CINFO` (high nibble of the first byte) must be 7 or less.
/// * `FDICT` (bit 5 of the second byte) must be clear, PNG never uses a preset
///   dictionary.
/// * `FCHECK` makes the header a multiple of 31 when read as a big-endian
///   `u16`. That's only checked when `verify_fcheck` is set.
///
/// ## Failure
/// * [`PngError::ZlibHeaderInvalid`] if a check fails, or there's less than 2
///   bytes.
pub fn check_zlib_header(bytes: &[u8], verify_fcheck: bool) -> PngResult<()> {
  let (cmf, flg) = match bytes {
    [cmf, flg, ..] => (*cmf, *flg),
    _ => return Err(PngError::ZlibHeaderInvalid),
  };
  let cm = cmf & 0b1111;
  let cinfo = cmf >> 4;
  let fdict = (flg >> 5) & 1;
  if cm != 8 || cinfo > 7 || fdict != 0 {
    log::debug!("zlib header rejected: CM={cm} CINFO={cinfo} FDICT={fdict}");
    return Err(PngError::ZlibHeaderInvalid);
  }
  if verify_fcheck && u16::from_be_bytes([cmf, flg]) % 31 != 0 {
    log::debug!("zlib header rejected: FCHECK of {cmf:02X} {flg:02X}");
    return Err(PngError::ZlibHeaderInvalid);
  }
  Ok(())
}

/// Decompresses a whole zlib stream into `out`, returning the number of bytes
/// written.
///
/// With `verify` set the header's `FCHECK` and the Adler-32 trailer both have
/// to be correct. Otherwise the trailer isn't even required to be present.
///
/// ## Failure
/// * [`PngError::ZlibHeaderInvalid`]
/// * Anything [`inflate`] can give.
/// * [`PngError::ChecksumMismatch`] if verifying and the trailer doesn't match
///   (a missing trailer is [`PngError::CorruptDeflateStream`]).
pub fn zlib_decompress(
  zlib_bytes: &[u8], out: &mut [u8], arena: &mut Arena<'_>, verify: bool,
) -> PngResult<usize> {
  check_zlib_header(zlib_bytes, verify)?;
  let mut bits = BitCursor::new(&zlib_bytes[2..]);
  let written = inflate(&mut bits, out, arena)?;
  if verify {
    bits.flush_to_byte_boundary();
    let trailer = bits.take_aligned_bytes(4)?;
    let declared = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut adler = Adler32::new();
    adler.update(&out[..written]);
    let actual = adler.finish();
    if declared != actual {
      log::warn!("zlib: Adler-32 mismatch, declared {declared:08X}, actual {actual:08X}");
      return Err(PngError::ChecksumMismatch);
    }
  }
  Ok(written)
}
