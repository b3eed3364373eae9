//! Holds all the tools for decoding and encoding PNG data.
//!
//! Only one kind of PNG is handled: 8 bits per channel RGBA, not interlaced.
//! Anything else is rejected with [`PngError::UnsupportedFormat`].
//!
//! ## Decoding
//!
//! The general format of a PNG is that the information is stored in "chunks".
//! The first chunk is always the header ([`IHDR`]), which gives the
//! dimensions and pixel format. The pixels themselves are filtered line by
//! line, then zlib compressed, and the compressed stream is split over one or
//! more image data (`IDAT`) chunks. Any other chunks are skipped.
//!
//! Decoding reverses that: all the `IDAT` data is gathered into one buffer,
//! decompressed, and unfiltered.
//!
//! All the memory for this comes out of an [`Arena`] that you provide. To know
//! how big of an arena to make, parse the image and ask it:
//!
//! ```no_run
//! use rgba_png::{arena::Arena, png::*};
//! # fn or_png_error(png: &[u8]) -> Result<(), rgba_png::PngError> {
//! let image = PngImage::parse(png)?;
//! let mut memory = vec![0_u8; image.decode_memory_requirement()?];
//! let mut arena = Arena::new(&mut memory);
//! let rgba = image.decode_in(&mut arena)?;
//! println!("{}x{}, first pixel {:?}", rgba.width(), rgba.height(), rgba.pixel(0, 0));
//! # Ok(())
//! # }
//! ```
//!
//! With the `alloc` feature there's also [`decode_png`], which takes care of
//! the memory.
//!
//! ## Encoding
//!
//! See [`encode_png_in`] and [`encode_png`]. The output isn't compressed, so
//! it's always a little larger than the raw pixel data.

use crate::{
  arena::{Arena, ARENA_ALIGN},
  decompress::{zlib::zlib_decompress, INFLATE_SCRATCH_BYTES},
  PngError, PngResult,
};

pub mod crc32;
pub use crc32::*;

mod chunk;
pub use chunk::*;

mod ihdr;
pub use ihdr::*;

mod filter;
pub use filter::*;

mod options;
pub use options::*;

mod encode;
pub use encode::*;

/// The first 8 bytes of every PNG.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Checks if the PNG's initial 8 bytes are correct.
///
/// * If this is the case, the rest of the bytes are very likely PNG data.
/// * If this is *not* the case, the rest of the bytes are very likely *not* PNG
///   data.
#[inline]
#[must_use]
pub const fn is_png_header_correct(bytes: &[u8]) -> bool {
  matches!(bytes, [137, 80, 78, 71, 13, 10, 26, 10, ..])
}

/// A PNG that's had its header checked, ready to decode.
#[derive(Clone, Copy)]
pub struct PngImage<'b> {
  ihdr: IHDR,
  bytes: &'b [u8],
  options: DecodeOptions,
}
impl core::fmt::Debug for PngImage<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PngImage")
      .field("ihdr", &self.ihdr)
      .field("bytes", &self.bytes.len())
      .field("options", &self.options)
      .finish()
  }
}
impl<'b> PngImage<'b> {
  /// Checks the signature and header, with the default options.
  #[inline]
  pub fn parse(bytes: &'b [u8]) -> PngResult<Self> {
    Self::parse_with(bytes, DecodeOptions::default())
  }

  /// Checks the signature and header.
  ///
  /// ## Failure
  /// * [`PngError::NotAPng`] if the signature is wrong.
  /// * [`PngError::MalformedChunk`] if the first chunk isn't a 13 byte `IHDR`.
  /// * [`PngError::UnsupportedFormat`] if it's not an 8-bit RGBA image, or is
  ///   interlaced.
  /// * [`PngError::DimensionsTooLarge`] if it's over the configured limit.
  /// * [`PngError::ChecksumMismatch`] if checking CRCs and the header's is
  ///   wrong.
  pub fn parse_with(bytes: &'b [u8], options: DecodeOptions) -> PngResult<Self> {
    if !is_png_header_correct(bytes) {
      return Err(PngError::NotAPng);
    }
    let first = match RawChunkIter::new(bytes).next() {
      Some(chunk) if chunk.ty == ChunkType::IHDR => chunk,
      other => {
        log::debug!("first chunk should be IHDR: {other:?}");
        return Err(PngError::MalformedChunk);
      }
    };
    let ihdr = IHDR::try_from(first.data)?;
    if options.verify_crc && !first.crc_matches() {
      log::warn!("IHDR CRC mismatch");
      return Err(PngError::ChecksumMismatch);
    }
    ihdr.validate()?;
    if ihdr.width > options.max_dimension || ihdr.height > options.max_dimension {
      log::debug!("{}x{} is over the limit of {}", ihdr.width, ihdr.height, options.max_dimension);
      return Err(PngError::DimensionsTooLarge);
    }
    log::debug!("parsed PNG header: {}x{}", ihdr.width, ihdr.height);
    Ok(Self { ihdr, bytes, options })
  }

  #[inline]
  #[must_use]
  pub const fn ihdr(&self) -> IHDR {
    self.ihdr
  }

  #[inline]
  #[must_use]
  pub const fn width(&self) -> u32 {
    self.ihdr.width
  }

  #[inline]
  #[must_use]
  pub const fn height(&self) -> u32 {
    self.ihdr.height
  }

  /// All the chunks, `IHDR` included, up to and including `IEND`.
  #[inline]
  pub fn chunks(&self) -> impl Iterator<Item = RawChunk<'b>> + 'b {
    let mut done = false;
    RawChunkIter::new(self.bytes).take_while(move |chunk| {
      let keep = !done;
      done = chunk.ty == ChunkType::IEND;
      keep
    })
  }

  /// The `IDAT` chunks, in order.
  #[inline]
  pub fn idat_chunks(&self) -> impl Iterator<Item = RawChunk<'b>> + 'b {
    self.chunks().filter(|chunk| chunk.ty == ChunkType::IDAT)
  }

  /// Total size of all the `IDAT` data.
  ///
  /// ## Failure
  /// * [`PngError::MalformedChunk`] if there's no `IDAT` chunk.
  /// * [`PngError::ChecksumMismatch`] if checking CRCs and one is wrong.
  pub fn idat_len(&self) -> PngResult<usize> {
    let mut total = 0_usize;
    let mut count = 0_usize;
    for chunk in self.chunks() {
      log::trace!("chunk {:?}, {} bytes", chunk.ty, chunk.data.len());
      if self.options.verify_crc && !chunk.crc_matches() {
        log::warn!("{:?} chunk CRC mismatch", chunk.ty);
        return Err(PngError::ChecksumMismatch);
      }
      if chunk.ty == ChunkType::IDAT {
        total = total.checked_add(chunk.data.len()).ok_or(PngError::DimensionsTooLarge)?;
        count += 1;
      }
    }
    if count == 0 {
      return Err(PngError::MalformedChunk);
    }
    log::debug!("{count} IDAT chunks, {total} bytes");
    Ok(total)
  }

  /// How many bytes of arena memory [`decode_in`](Self::decode_in) needs.
  ///
  /// This is enough for the gathered `IDAT` data, the decompressed lines, the
  /// pixels, and the decompressor's working space, plus alignment padding.
  pub fn decode_memory_requirement(&self) -> PngResult<usize> {
    [self.idat_len()?, self.ihdr.filtered_len()?, self.ihdr.pixels_len()?, INFLATE_SCRATCH_BYTES]
      .into_iter()
      .try_fold(4 * ARENA_ALIGN, |total, n| total.checked_add(n))
      .ok_or(PngError::DimensionsTooLarge)
  }

  /// Decodes the image, with all memory coming from `arena`.
  ///
  /// Only the returned pixels stay allocated. The compressed and filtered
  /// buffers are scratch space that's released before this returns.
  ///
  /// ## Failure
  /// * [`PngError::OutOfMemory`] if `arena` is too small, see
  ///   [`decode_memory_requirement`](Self::decode_memory_requirement).
  /// * [`PngError::ZlibHeaderInvalid`]
  /// * [`PngError::CorruptDeflateStream`], which includes data that
  ///   decompresses to fewer bytes than the image needs.
  /// * [`PngError::IllegalFilterType`]
  /// * Anything from [`idat_len`](Self::idat_len).
  pub fn decode_in<'m>(&self, arena: &mut Arena<'m>) -> PngResult<Rgba8Image<'m>> {
    let pixels = arena.alloc_bytes(self.ihdr.pixels_len()?)?;
    let mut scratch = arena.scratch();

    let zlib_bytes = scratch.alloc_bytes(self.idat_len()?)?;
    let mut filled = 0;
    for chunk in self.idat_chunks() {
      let end = filled + chunk.data.len();
      zlib_bytes[filled..end].copy_from_slice(chunk.data);
      filled = end;
    }

    let filtered_len = self.ihdr.filtered_len()?;
    let filtered = scratch.alloc_bytes(filtered_len)?;
    let written =
      zlib_decompress(zlib_bytes, filtered, &mut scratch, self.options.verify_adler32)?;
    if written < filtered_len {
      log::debug!("decompressed {written} bytes, expected {filtered_len}");
      return Err(PngError::CorruptDeflateStream);
    }

    FilterContext::new(self.ihdr.width)?.unfilter_image(filtered, pixels)?;
    Ok(Rgba8Image { width: self.ihdr.width, height: self.ihdr.height, pixels })
  }
}

/// Decoded RGBA8 pixels in arena memory.
///
/// Only the decoder makes these, so `pixels` always holds exactly
/// `width * height` whole pixels.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rgba8Image<'m> {
  width: u32,
  height: u32,
  pixels: &'m [u8],
}
impl core::fmt::Debug for Rgba8Image<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Rgba8Image")
      .field("width", &self.width)
      .field("height", &self.height)
      .field("pixels", &(&self.pixels[..self.pixels.len().min(12)], self.pixels.len()))
      .finish()
  }
}
impl<'m> Rgba8Image<'m> {
  #[inline]
  #[must_use]
  pub const fn width(&self) -> u32 {
    self.width
  }

  #[inline]
  #[must_use]
  pub const fn height(&self) -> u32 {
    self.height
  }

  /// Row-major, top to bottom, 4 bytes per pixel.
  #[inline]
  #[must_use]
  pub const fn pixels(&self) -> &'m [u8] {
    self.pixels
  }

  /// The pixels as `[r, g, b, a]` arrays.
  #[inline]
  #[must_use]
  pub fn as_rgba(&self) -> &'m [[u8; 4]] {
    bytemuck::cast_slice(self.pixels)
  }

  /// Gets the pixel at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
    if x < self.width && y < self.height {
      let i = (y as usize) * (self.width as usize) + (x as usize);
      self.as_rgba().get(i).copied()
    } else {
      None
    }
  }
}

/// Parses and decodes a PNG with all memory coming from `arena`.
pub fn decode_png_in<'m>(
  bytes: &[u8], arena: &mut Arena<'m>, options: DecodeOptions,
) -> PngResult<Rgba8Image<'m>> {
  PngImage::parse_with(bytes, options)?.decode_in(arena)
}

/// Parses and decodes a PNG, allocating the working memory.
///
/// Returns `(width, height, pixels)`.
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub fn decode_png(
  bytes: &[u8], options: DecodeOptions,
) -> PngResult<(u32, u32, alloc::vec::Vec<u8>)> {
  use alloc::vec::Vec;
  let image = PngImage::parse_with(bytes, options)?;
  let needed = image.decode_memory_requirement()?;
  let mut memory: Vec<u8> = Vec::new();
  memory.try_reserve(needed)?;
  memory.resize(needed, 0);
  let mut arena = Arena::new(&mut memory);
  let rgba = image.decode_in(&mut arena)?;
  let mut pixels: Vec<u8> = Vec::new();
  pixels.try_reserve(rgba.pixels.len())?;
  pixels.extend_from_slice(rgba.pixels);
  Ok((rgba.width, rgba.height, pixels))
}
