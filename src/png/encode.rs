//! Writing PNG files.
//!
//! There's no compression, the zlib stream is made of "stored" DEFLATE blocks.
//! Each block goes in its own `IDAT` chunk:
//!
//! ```text
//! IDAT #0:   78 01 | block header | data
//! IDAT #1:         | block header | data
//! ...
//! IDAT #n-1:       | block header | data | Adler-32
//! ```
//!
//! When a whole line (filter byte and pixels) fits in one block, blocks are cut
//! on line boundaries. Otherwise they're just filled up to 65535 bytes each.

use super::*;
use crate::{
  arena::Arena,
  decompress::zlib::{Adler32, ZLIB_HEADER_STORED},
};

/// The most data a stored block can hold (`LEN` is a `u16`).
pub const MAX_STORED_BLOCK_LEN: usize = u16::MAX as usize;

/// Length, type, and CRC.
const CHUNK_OVERHEAD: usize = 12;
/// `BFINAL`/`BTYPE` byte, `LEN`, `NLEN`.
const STORED_BLOCK_HEADER_LEN: usize = 5;

/// How much filtered data goes into each stored block.
#[inline]
#[must_use]
pub const fn stored_block_limit(filterline_len: usize) -> usize {
  if filterline_len <= MAX_STORED_BLOCK_LEN {
    (MAX_STORED_BLOCK_LEN / filterline_len) * filterline_len
  } else {
    MAX_STORED_BLOCK_LEN
  }
}

fn check_dimensions(width: u32, height: u32) -> PngResult<()> {
  if width == 0 || height == 0 {
    return Err(PngError::UnsupportedFormat);
  }
  if width > i32::MAX as u32 || height > i32::MAX as u32 {
    return Err(PngError::DimensionsTooLarge);
  }
  Ok(())
}

/// Exact size of the PNG that the encoder makes for an image of this size.
///
/// ## Failure
/// * [`PngError::UnsupportedFormat`] if either dimension is 0.
/// * [`PngError::DimensionsTooLarge`] if the size overflows.
pub fn encoded_len(width: u32, height: u32) -> PngResult<usize> {
  check_dimensions(width, height)?;
  let ihdr = IHDR::rgba8(width, height);
  let filtered_len = ihdr.filtered_len()?;
  let block_limit = stored_block_limit(ihdr.bytes_per_filterline()?);
  let block_count = (filtered_len / block_limit) + usize::from(filtered_len % block_limit != 0);
  let fixed = PNG_SIGNATURE.len()
    + (CHUNK_OVERHEAD + IHDR::LEN)
    + ZLIB_HEADER_STORED.len()
    + 4
    + CHUNK_OVERHEAD;
  block_count
    .checked_mul(CHUNK_OVERHEAD + STORED_BLOCK_HEADER_LEN)
    .and_then(|n| n.checked_add(filtered_len))
    .and_then(|n| n.checked_add(fixed))
    .ok_or(PngError::DimensionsTooLarge)
}

/// Arena size that [`encode_png_in`] needs for an image of this size.
pub fn encode_memory_requirement(width: u32, height: u32) -> PngResult<usize> {
  let filtered_len = IHDR::rgba8(width, height).filtered_len()?;
  encoded_len(width, height)?
    .checked_add(filtered_len)
    .and_then(|n| n.checked_add(2 * ARENA_ALIGN))
    .ok_or(PngError::DimensionsTooLarge)
}

fn check_pixels(width: u32, height: u32, pixels: &[u8]) -> PngResult<()> {
  check_dimensions(width, height)?;
  if pixels.len() != rgba8_len(width, height)? {
    log::debug!("encode: {width}x{height} image given {} pixel bytes", pixels.len());
    return Err(PngError::PixelBufferSize);
  }
  Ok(())
}

struct PngWriter<'o> {
  out: &'o mut [u8],
  position: usize,
}
impl<'o> PngWriter<'o> {
  fn put(&mut self, bytes: &[u8]) -> PngResult<()> {
    let end = self.position + bytes.len();
    self.out.get_mut(self.position..end).ok_or(PngError::OutOfMemory)?.copy_from_slice(bytes);
    self.position = end;
    Ok(())
  }

  /// Writes the chunk header, returns where the CRC'd bytes start.
  fn begin_chunk(&mut self, length: usize, ty: ChunkType) -> PngResult<usize> {
    let header = ChunkHeader { length: u32::try_from(length)?, ty };
    self.put(&header.to_bytes())?;
    Ok(self.position - 4)
  }

  fn end_chunk(&mut self, crc_start: usize) -> PngResult<()> {
    let mut crc = Crc32::new();
    crc.update(&self.out[crc_start..self.position]);
    self.put(&crc.finish().to_be_bytes())
  }
}

/// Frames already filtered image data into a PNG.
///
/// `out` must be at least [`encoded_len`] bytes. Returns the number of bytes
/// written.
pub fn write_png(width: u32, height: u32, filtered: &[u8], out: &mut [u8]) -> PngResult<usize> {
  let ihdr = IHDR::rgba8(width, height);
  debug_assert_eq!(Ok(filtered.len()), ihdr.filtered_len());
  let block_limit = stored_block_limit(ihdr.bytes_per_filterline()?);
  let block_count = (filtered.len() + block_limit - 1) / block_limit;

  let mut w = PngWriter { out, position: 0 };
  w.put(&PNG_SIGNATURE)?;

  let crc_start = w.begin_chunk(IHDR::LEN, ChunkType::IHDR)?;
  w.put(&ihdr.to_bytes())?;
  w.end_chunk(crc_start)?;

  let mut adler = Adler32::new();
  for (i, block) in filtered.chunks(block_limit).enumerate() {
    let is_first = i == 0;
    let is_last = i + 1 == block_count;
    let chunk_len = STORED_BLOCK_HEADER_LEN
      + block.len()
      + if is_first { ZLIB_HEADER_STORED.len() } else { 0 }
      + if is_last { 4 } else { 0 };
    let crc_start = w.begin_chunk(chunk_len, ChunkType::IDAT)?;
    if is_first {
      w.put(&ZLIB_HEADER_STORED)?;
    }
    let len = u16::try_from(block.len())?;
    let [l0, l1] = len.to_le_bytes();
    let [n0, n1] = (!len).to_le_bytes();
    w.put(&[u8::from(is_last), l0, l1, n0, n1])?;
    w.put(block)?;
    adler.update(block);
    if is_last {
      w.put(&adler.finish().to_be_bytes())?;
    }
    w.end_chunk(crc_start)?;
  }

  let crc_start = w.begin_chunk(0, ChunkType::IEND)?;
  w.end_chunk(crc_start)?;
  log::debug!("encode: {width}x{height} in {block_count} IDAT chunks, {} bytes", w.position);
  Ok(w.position)
}

/// Encodes RGBA8 pixels (row-major, top to bottom) as a PNG, using arena
/// memory.
///
/// The returned bytes are allocated from `arena`. The filtered copy of the
/// image is scratch space and is given back before this returns.
///
/// ## Failure
/// * [`PngError::UnsupportedFormat`] if a dimension is 0.
/// * [`PngError::PixelBufferSize`] if `pixels` isn't `width * height * 4`
///   bytes.
/// * [`PngError::DimensionsTooLarge`]
/// * [`PngError::OutOfMemory`]
pub fn encode_png_in<'m>(
  arena: &mut Arena<'m>, width: u32, height: u32, pixels: &[u8], options: EncodeOptions,
) -> PngResult<&'m [u8]> {
  check_pixels(width, height, pixels)?;
  let out = arena.alloc_bytes(encoded_len(width, height)?)?;
  let mut scratch = arena.scratch();
  let filtered = scratch.alloc_bytes(IHDR::rgba8(width, height).filtered_len()?)?;
  FilterContext::new(width)?.filter_image(pixels, filtered, options.filter);
  let written = write_png(width, height, filtered, out)?;
  Ok(&out[..written])
}

/// Encodes RGBA8 pixels as a PNG into a new `Vec`.
///
/// Same as [`encode_png_in`], but the memory comes from the global allocator.
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub fn encode_png(
  width: u32, height: u32, pixels: &[u8], options: EncodeOptions,
) -> PngResult<alloc::vec::Vec<u8>> {
  use alloc::vec::Vec;
  check_pixels(width, height, pixels)?;
  let filtered_len = IHDR::rgba8(width, height).filtered_len()?;
  let mut filtered: Vec<u8> = Vec::new();
  filtered.try_reserve(filtered_len)?;
  filtered.resize(filtered_len, 0);
  FilterContext::new(width)?.filter_image(pixels, &mut filtered, options.filter);

  let out_len = encoded_len(width, height)?;
  let mut out: Vec<u8> = Vec::new();
  out.try_reserve(out_len)?;
  out.resize(out_len, 0);
  let written = write_png(width, height, &filtered, &mut out)?;
  out.truncate(written);
  Ok(out)
}
