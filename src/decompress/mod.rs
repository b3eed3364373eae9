//! DEFLATE decompression ([RFC 1951](https://www.rfc-editor.org/rfc/rfc1951)).
//!
//! The stream is a series of blocks, each starting with a 3-bit header:
//! * 1 bit `BFINAL`, set on the last block.
//! * 2 bits `BTYPE`: stored, fixed Huffman, or dynamic Huffman.
//!
//! Stored blocks are byte aligned raw data. Huffman blocks are a series of
//! literal/length symbols, where each length is followed by a distance symbol,
//! and the pair says to copy earlier output forward.
//!
//! The decoder writes into a fixed size output slice. Running off the end of
//! that slice is treated as a corrupt stream, the output never grows.

use crate::{arena::Arena, bit_cursor::BitCursor, PngError, PngResult};

mod huffman;
pub use huffman::*;

mod code_length_alphabet;
use code_length_alphabet::*;

pub mod zlib;

/// The literal/length symbol that ends a block.
pub(crate) const END_OF_BLOCK: usize = 256;

/// Base lengths for length codes 257..=285.
pub const LENGTH_BASE: [u16; 29] = [
  3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
  163, 195, 227, 258,
];

/// Extra bits for length codes 257..=285.
pub const LENGTH_EXTRA: [u8; 29] =
  [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0];

/// Base distances for distance codes 0..=29.
pub const DIST_BASE: [u16; 30] = [
  1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537, 2049,
  3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance codes 0..=29.
pub const DIST_EXTRA: [u8; 30] =
  [0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13];

/// Code lengths of the fixed literal/length alphabet.
pub const FIXED_LIT_LEN_LENGTHS: [u8; 288] = {
  let mut out = [0_u8; 288];
  let mut i = 0;
  while i < 288 {
    out[i] = match i {
      0..=143 => 8,
      144..=255 => 9,
      256..=279 => 7,
      _ => 8,
    };
    i += 1;
  }
  out
};

/// Code lengths of the fixed distance alphabet.
pub const FIXED_DIST_LENGTHS: [u8; 30] = [5; 30];

/// Bytes of scratch arena space one block can need, padding included.
///
/// A dynamic block needs the most: the code length alphabet, the code length
/// array, and both tables.
pub const INFLATE_SCRATCH_BYTES: usize = 2048;

/// The `BTYPE` of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
  /// `00`: raw bytes.
  Stored,
  /// `01`: Huffman coded with the fixed alphabets.
  Fixed,
  /// `10`: Huffman coded with alphabets sent at the start of the block.
  Dynamic,
}
impl TryFrom<u32> for BlockType {
  type Error = PngError;
  #[inline]
  fn try_from(btype: u32) -> Result<Self, Self::Error> {
    Ok(match btype {
      0b00 => Self::Stored,
      0b01 => Self::Fixed,
      0b10 => Self::Dynamic,
      _ => return Err(PngError::CorruptDeflateStream),
    })
  }
}

/// Decompresses a raw DEFLATE stream into `out`, returning how many bytes were
/// written.
///
/// * Scratch memory for each block's Huffman tables comes from `arena` and is
///   handed back at the end of that block.
/// * Decoding stops after the final block. Any bytes after that are ignored
///   (`bits` is left positioned just past the final block).
///
/// ## Failure
/// * [`PngError::CorruptDeflateStream`] for any bad data, including a stream
///   that would write past the end of `out`.
/// * [`PngError::OutOfMemory`] if the arena can't hold a block's tables.
pub fn inflate(bits: &mut BitCursor<'_>, out: &mut [u8], arena: &mut Arena<'_>) -> PngResult<usize> {
  let mut written = 0_usize;
  loop {
    let is_final = bits.consume_bit()? != 0;
    let block_type = BlockType::try_from(bits.consume_bits(2)?)?;
    log::trace!("inflate: {block_type:?} block at output {written}, final: {is_final}");
    written = match block_type {
      BlockType::Stored => copy_stored_block(bits, out, written)?,
      BlockType::Fixed => {
        let mut scratch = arena.scratch();
        let lit_len = HuffmanTable::build(&FIXED_LIT_LEN_LENGTHS, &mut scratch)?;
        let dist = HuffmanTable::build(&FIXED_DIST_LENGTHS, &mut scratch)?;
        decode_symbols(bits, &lit_len, &dist, out, written)?
      }
      BlockType::Dynamic => {
        let mut scratch = arena.scratch();
        let (lit_len, dist) = read_dynamic_tables(bits, &mut scratch)?;
        decode_symbols(bits, &lit_len, &dist, out, written)?
      }
    };
    if is_final {
      return Ok(written);
    }
  }
}

fn copy_stored_block(bits: &mut BitCursor<'_>, out: &mut [u8], written: usize) -> PngResult<usize> {
  bits.flush_to_byte_boundary();
  let header = bits.take_aligned_bytes(4)?;
  let len = u16::from_le_bytes([header[0], header[1]]);
  let nlen = u16::from_le_bytes([header[2], header[3]]);
  if len != !nlen {
    log::trace!("inflate: stored block LEN {len:#06X} vs NLEN {nlen:#06X}");
    return Err(PngError::CorruptDeflateStream);
  }
  let data = bits.take_aligned_bytes(usize::from(len))?;
  let end = written + data.len();
  out.get_mut(written..end).ok_or(PngError::CorruptDeflateStream)?.copy_from_slice(data);
  Ok(end)
}

#[inline]
fn extra_bits(bits: &mut BitCursor<'_>, count: u8) -> PngResult<usize> {
  if count == 0 {
    Ok(0)
  } else {
    Ok(bits.consume_bits(u32::from(count))? as usize)
  }
}

/// The main symbol loop of a Huffman block. Runs until end-of-block.
fn decode_symbols(
  bits: &mut BitCursor<'_>, lit_len: &HuffmanTable<'_>, dist: &HuffmanTable<'_>, out: &mut [u8],
  mut written: usize,
) -> PngResult<usize> {
  loop {
    let symbol = usize::from(lit_len.decode(bits)?);
    match symbol {
      0..=255 => {
        *out.get_mut(written).ok_or(PngError::CorruptDeflateStream)? = symbol as u8;
        written += 1;
      }
      END_OF_BLOCK => return Ok(written),
      257..=285 => {
        let i = symbol - 257;
        let length = usize::from(LENGTH_BASE[i]) + extra_bits(bits, LENGTH_EXTRA[i])?;
        let d = usize::from(dist.decode(bits)?);
        let (base, extra) = match (DIST_BASE.get(d), DIST_EXTRA.get(d)) {
          (Some(base), Some(extra)) => (usize::from(*base), *extra),
          _ => return Err(PngError::CorruptDeflateStream),
        };
        let distance = base + extra_bits(bits, extra)?;
        if distance > written {
          log::trace!("inflate: distance {distance} with only {written} bytes written");
          return Err(PngError::CorruptDeflateStream);
        }
        let end = written + length;
        if end > out.len() {
          return Err(PngError::CorruptDeflateStream);
        }
        // byte at a time, since the source can overlap what we're writing.
        for i in written..end {
          out[i] = out[i - distance];
        }
        written = end;
      }
      _ => return Err(PngError::CorruptDeflateStream),
    }
  }
}

#[cfg(test)]
pub(crate) mod test_bits {
  /// Packs bits the way a DEFLATE encoder does, for building test streams.
  #[derive(Debug, Default)]
  pub(crate) struct BitWriter {
    pub(crate) bytes: Vec<u8>,
    bit_count: u32,
  }
  impl BitWriter {
    /// Plain values (headers, extra bits) go in least significant bit first.
    pub(crate) fn push_bits(&mut self, value: u32, count: u32) {
      for i in 0..count {
        self.push_one((value >> i) & 1);
      }
    }
    /// Huffman codes go in most significant bit first.
    pub(crate) fn push_code(&mut self, code: u32, len: u32) {
      for i in (0..len).rev() {
        self.push_one((code >> i) & 1);
      }
    }
    fn push_one(&mut self, bit: u32) {
      if self.bit_count % 8 == 0 {
        self.bytes.push(0);
      }
      if bit != 0 {
        *self.bytes.last_mut().unwrap() |= 1 << (self.bit_count % 8);
      }
      self.bit_count += 1;
    }
  }
}
