use crate::{arena::Arena, bit_cursor::BitCursor, PngError, PngResult};

/// Longest code DEFLATE allows.
pub const MAX_CODE_LENGTH: usize = 15;

/// A canonical Huffman decoding table.
///
/// Rather than a tree, this is two flat arrays:
/// * `counts[len]` is how many codes have bit length `len` (`counts[0]` is
///   always 0, unused symbols don't get a code).
/// * `symbols` lists the used symbols in code order: all the 1-bit codes, then
///   all the 2-bit codes, and so on, each group in increasing symbol order.
///
/// That's all canonical codes need, because every code of a given length is
/// just the next number after the previous code of that length.
#[derive(Debug, Clone, Copy)]
pub struct HuffmanTable<'a> {
  counts: &'a [u16],
  symbols: &'a [u16],
}

impl<'a> HuffmanTable<'a> {
  /// Builds the table for the given per-symbol code lengths (0 meaning the
  /// symbol is unused) out of arena memory.
  ///
  /// This doesn't check that the lengths make a complete (or even a valid)
  /// prefix code. A bad set of lengths still gives a well-formed table, it
  /// just won't decode into anything sensible, and a stream using it will
  /// fail later on.
  ///
  /// ## Failure
  /// * [`PngError::CorruptDeflateStream`] if any length is over 15.
  /// * [`PngError::OutOfMemory`] if the arena is full.
  pub fn build(code_lengths: &[u8], arena: &mut Arena<'a>) -> PngResult<Self> {
    let counts = arena.alloc_u16(MAX_CODE_LENGTH + 1)?;
    let symbols = arena.alloc_u16(code_lengths.len())?;
    fill_table(code_lengths, counts, symbols)?;
    Ok(Self { counts, symbols })
  }

  /// Number of codes with each bit length.
  #[inline]
  #[must_use]
  pub fn counts(&self) -> &'a [u16] {
    self.counts
  }

  /// The used symbols, in code order.
  #[inline]
  #[must_use]
  pub fn symbols(&self) -> &'a [u16] {
    &self.symbols[..self.counts.iter().map(|&c| usize::from(c)).sum::<usize>()]
  }

  /// Reads one symbol's worth of bits and returns the symbol.
  ///
  /// Huffman codes are stored starting from their most significant bit, so
  /// the code is built up one bit at a time. At each length we know the first
  /// code of that length (`first`) and where that length's symbols begin
  /// (`index`), so a code of this length matches when it's below
  /// `first + count`.
  ///
  /// ## Failure
  /// * [`PngError::CorruptDeflateStream`] if no code matches within 15 bits,
  ///   or the bits run out.
  pub fn decode(&self, bits: &mut BitCursor<'_>) -> PngResult<u16> {
    let mut code: i32 = 0;
    let mut first: i32 = 0;
    let mut index: i32 = 0;
    for len in 1..=MAX_CODE_LENGTH {
      code |= bits.consume_bit()? as i32;
      let count = i32::from(self.counts[len]);
      if code - count < first {
        let position = (index + (code - first)) as usize;
        return self.symbols.get(position).copied().ok_or(PngError::CorruptDeflateStream);
      }
      index += count;
      first += count;
      first <<= 1;
      code <<= 1;
    }
    Err(PngError::CorruptDeflateStream)
  }
}

/// Fills in `counts` and `symbols` (RFC 1951, section 3.2.2).
///
/// * `counts` must have 16 entries.
/// * `symbols` must be at least as long as `code_lengths`.
pub(crate) fn fill_table(
  code_lengths: &[u8], counts: &mut [u16], symbols: &mut [u16],
) -> PngResult<()> {
  debug_assert_eq!(counts.len(), MAX_CODE_LENGTH + 1);
  debug_assert!(symbols.len() >= code_lengths.len());

  // 1) Count the number of codes for each code length.
  counts.fill(0);
  for len in code_lengths.iter().copied().map(usize::from) {
    *counts.get_mut(len).ok_or(PngError::CorruptDeflateStream)? += 1;
  }
  counts[0] = 0;

  // 2) Where each length's symbols start within `symbols`.
  let mut offsets = [0_u16; MAX_CODE_LENGTH + 2];
  for len in 1..=MAX_CODE_LENGTH {
    offsets[len + 1] = offsets[len] + counts[len];
  }

  // 3) Walk the symbols in order, so each length group ends up sorted the same
  //    way the canonical codes are handed out.
  for (symbol, len) in code_lengths.iter().copied().enumerate() {
    if len != 0 {
      let slot = &mut offsets[usize::from(len)];
      symbols[usize::from(*slot)] = symbol as u16;
      *slot += 1;
    }
  }
  Ok(())
}

/// Given per-symbol bit lengths, computes each symbol's canonical code.
///
/// * A length of 0 means the symbol doesn't get a code (its output is 0).
/// * Lengths can't be over 15.
///
/// ## Failure
/// * [`PngError::CorruptDeflateStream`] if a length is over 15, or if there
///   are more codes of some length than that many bits can hold.
pub fn canonical_codes(code_lengths: &[u8], codes: &mut [u16]) -> PngResult<()> {
  debug_assert!(codes.len() >= code_lengths.len());

  let mut bl_count = [0_u16; MAX_CODE_LENGTH + 1];
  for len in code_lengths.iter().copied().map(usize::from) {
    *bl_count.get_mut(len).ok_or(PngError::CorruptDeflateStream)? += 1;
  }
  bl_count[0] = 0;

  // Find the numerical value of the smallest code for each code length.
  let mut next_code = [0_u32; MAX_CODE_LENGTH + 1];
  let mut code = 0_u32;
  for bits in 1..=MAX_CODE_LENGTH {
    code = (code + u32::from(bl_count[bits - 1])) << 1;
    next_code[bits] = code;
  }

  // Consecutive values for all codes of the same length.
  for (len, out) in code_lengths.iter().copied().map(usize::from).zip(codes.iter_mut()) {
    if len == 0 {
      *out = 0;
      continue;
    }
    if next_code[len] >> len != 0 {
      return Err(PngError::CorruptDeflateStream);
    }
    *out = next_code[len] as u16;
    next_code[len] += 1;
  }
  Ok(())
}

#[cfg(test)]
fn build_in_memory<'m>(code_lengths: &[u8], memory: &'m mut [u8]) -> HuffmanTable<'m> {
  HuffmanTable::build(code_lengths, &mut Arena::new(memory)).unwrap()
}

#[test]
fn test_canonical_codes_rfc_examples() {
  // the small example in RFC 1951
  let mut codes = [0_u16; 4];
  canonical_codes(&[2, 1, 3, 3], &mut codes).unwrap();
  assert_eq!(codes, [0b10, 0b0, 0b110, 0b111]);

  // the bigger example
  let mut codes = [0_u16; 8];
  canonical_codes(&[3, 3, 3, 3, 3, 2, 4, 4], &mut codes).unwrap();
  assert_eq!(codes, [0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111]);

  // the fixed literal/length code
  let mut lengths = [0_u8; 288];
  lengths[..144].fill(8);
  lengths[144..256].fill(9);
  lengths[256..280].fill(7);
  lengths[280..].fill(8);
  let mut codes = [0_u16; 288];
  canonical_codes(&lengths, &mut codes).unwrap();
  assert_eq!(codes[0], 0b00110000);
  assert_eq!(codes[143], 0b10111111);
  assert_eq!(codes[144], 0b110010000);
  assert_eq!(codes[255], 0b111111111);
  assert_eq!(codes[256], 0b0000000);
  assert_eq!(codes[279], 0b0010111);
  assert_eq!(codes[280], 0b11000000);
  assert_eq!(codes[287], 0b11000111);
}

#[test]
fn test_canonical_codes_are_prefix_free() {
  let lengths = [3_u8, 0, 3, 3, 3, 2, 4, 4, 0, 5, 6, 6];
  let mut codes = [0_u16; 12];
  canonical_codes(&lengths, &mut codes).unwrap();
  let used: Vec<(u16, u8)> =
    codes.iter().copied().zip(lengths.iter().copied()).filter(|&(_, l)| l != 0).collect();
  // strictly increasing within each length
  for len in 1..=6 {
    let same: Vec<u16> = used.iter().filter(|&&(_, l)| l == len).map(|&(c, _)| c).collect();
    assert!(same.windows(2).all(|w| w[0] < w[1]), "len {len}: {same:?}");
  }
  // no code is a prefix of another
  for (i, &(code_a, len_a)) in used.iter().enumerate() {
    for (j, &(code_b, len_b)) in used.iter().enumerate() {
      if i != j && len_a <= len_b {
        assert_ne!(code_b >> (len_b - len_a), code_a, "{code_a:b} prefixes {code_b:b}");
      }
    }
  }
}

#[test]
fn test_canonical_codes_oversubscribed() {
  let mut codes = [0_u16; 3];
  assert_eq!(canonical_codes(&[1, 1, 1], &mut codes), Err(PngError::CorruptDeflateStream));
  assert_eq!(canonical_codes(&[16, 1, 1], &mut codes), Err(PngError::CorruptDeflateStream));
}

#[test]
fn test_build_table_layout() {
  let mut memory = [0_u8; 256];
  let table = build_in_memory(&[2, 1, 3, 3, 0], &mut memory);
  assert_eq!(table.counts(), &[0, 1, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
  assert_eq!(table.symbols(), &[1, 0, 2, 3]);
}

#[test]
fn test_build_rejects_long_lengths() {
  let mut memory = [0_u8; 256];
  let result = HuffmanTable::build(&[16, 1], &mut Arena::new(&mut memory));
  assert_eq!(result.err(), Some(PngError::CorruptDeflateStream));
}

#[test]
fn test_decode_symbols() {
  // codes: A=10, B=0, C=110, D=111
  // sending B A D C gives the bits 0 10 111 110, packed LSB first.
  let mut memory = [0_u8; 256];
  let table = build_in_memory(&[2, 1, 3, 3], &mut memory);
  let mut bits = BitCursor::new(&[0b1111_1010, 0b0000_0000]);
  assert_eq!(table.decode(&mut bits), Ok(1));
  assert_eq!(table.decode(&mut bits), Ok(0));
  assert_eq!(table.decode(&mut bits), Ok(3));
  assert_eq!(table.decode(&mut bits), Ok(2));
}

#[test]
fn test_decode_no_match() {
  // only one 1-bit code, so a leading 1 bit never matches anything.
  let mut memory = [0_u8; 256];
  let table = build_in_memory(&[1], &mut memory);
  let mut bits = BitCursor::new(&[0xFF, 0xFF]);
  assert_eq!(table.decode(&mut bits), Err(PngError::CorruptDeflateStream));
  // and an empty table never matches either
  let mut memory = [0_u8; 256];
  let table = build_in_memory(&[0, 0, 0], &mut memory);
  let mut bits = BitCursor::new(&[0, 0]);
  assert_eq!(table.decode(&mut bits), Err(PngError::CorruptDeflateStream));
}

#[test]
fn test_decode_agrees_with_canonical_codes() {
  use super::{test_bits::BitWriter, FIXED_DIST_LENGTHS, FIXED_LIT_LEN_LENGTHS};
  // every length from 1 to 15, the last one twice, so a complete code
  let mut deep = [0_u8; 16];
  for (len, slot) in (1..=15).zip(deep.iter_mut()) {
    *slot = len;
  }
  deep[15] = 15;
  let length_sets: [&[u8]; 5] = [
    &FIXED_LIT_LEN_LENGTHS,
    &FIXED_DIST_LENGTHS,
    &[2, 1, 3, 3],
    &[3, 0, 3, 3, 3, 2, 4, 4, 0, 5, 6, 6],
    &deep,
  ];
  for lengths in length_sets {
    let mut codes = vec![0_u16; lengths.len()];
    canonical_codes(lengths, &mut codes).unwrap();
    let used: Vec<u16> =
      (0..lengths.len() as u16).filter(|&s| lengths[usize::from(s)] != 0).collect();
    // every symbol forwards, then backwards
    let sent: Vec<u16> = used.iter().chain(used.iter().rev()).copied().collect();
    let mut w = BitWriter::default();
    for &symbol in &sent {
      let s = usize::from(symbol);
      w.push_code(u32::from(codes[s]), u32::from(lengths[s]));
    }
    let mut memory = [0_u8; 1024];
    let table = build_in_memory(lengths, &mut memory);
    let mut bits = BitCursor::new(&w.bytes);
    for &symbol in &sent {
      assert_eq!(table.decode(&mut bits), Ok(symbol), "lengths {lengths:?}");
    }
  }
}
