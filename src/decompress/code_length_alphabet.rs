use super::*;

/// Order that the code length alphabet's own code lengths are sent in.
const CODE_LENGTH_ORDER: [usize; 19] =
  [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

/// The most literal/length codes a dynamic block may declare.
const MAX_LIT_LEN_CODES: usize = 286;
/// The most distance codes a dynamic block may declare.
const MAX_DIST_CODES: usize = 30;

/// The 19 symbol alphabet that a dynamic block uses to send the code lengths
/// of its real alphabets.
///
/// * 0 through 15: that literal length.
/// * 16: repeat the previous length 3 to 6 times (2 extra bits).
/// * 17: repeat a zero length 3 to 10 times (3 extra bits).
/// * 18: repeat a zero length 11 to 138 times (7 extra bits).
#[derive(Debug, Clone, Copy)]
pub(crate) struct CodeLengthAlphabet<'a> {
  table: HuffmanTable<'a>,
}
impl<'a> CodeLengthAlphabet<'a> {
  /// Reads `count` 3-bit lengths (in the transmission order) and builds the
  /// alphabet from them.
  fn read(bits: &mut BitCursor<'_>, count: usize, arena: &mut Arena<'a>) -> PngResult<Self> {
    let mut lengths = [0_u8; 19];
    for i in CODE_LENGTH_ORDER[..count].iter().copied() {
      lengths[i] = bits.consume_bits(3)? as u8;
    }
    Ok(Self { table: HuffmanTable::build(&lengths, arena)? })
  }

  /// Decodes code lengths until `lengths` is full.
  ///
  /// A repeat that would run past the end of `lengths`, or a "repeat previous"
  /// with no previous length, is an error.
  fn fill_code_lengths(&self, bits: &mut BitCursor<'_>, lengths: &mut [u8]) -> PngResult<()> {
    let mut acquired = 0_usize;
    while acquired < lengths.len() {
      let (value, repeat_count) = match self.table.decode(bits)? {
        literal @ 0..=15 => (literal as u8, 1),
        16 => {
          let previous = match acquired.checked_sub(1) {
            Some(i) => lengths[i],
            None => return Err(PngError::CorruptDeflateStream),
          };
          (previous, 3 + bits.consume_bits(2)? as usize)
        }
        17 => (0, 3 + bits.consume_bits(3)? as usize),
        18 => (0, 11 + bits.consume_bits(7)? as usize),
        _ => return Err(PngError::CorruptDeflateStream),
      };
      let end = acquired + repeat_count;
      lengths.get_mut(acquired..end).ok_or(PngError::CorruptDeflateStream)?.fill(value);
      acquired = end;
    }
    Ok(())
  }
}

/// Reads a dynamic block's header and builds its literal/length and distance
/// tables.
///
/// Everything (the code length alphabet, the length array, both tables) comes
/// out of `arena`, which should be a scratch arena that's dropped once the
/// block is done.
pub(crate) fn read_dynamic_tables<'a>(
  bits: &mut BitCursor<'_>, arena: &mut Arena<'a>,
) -> PngResult<(HuffmanTable<'a>, HuffmanTable<'a>)> {
  let hlit = bits.consume_bits(5)? as usize + 257;
  let hdist = bits.consume_bits(5)? as usize + 1;
  let hclen = bits.consume_bits(4)? as usize + 4;
  log::trace!("inflate: dynamic header hlit={hlit} hdist={hdist} hclen={hclen}");
  if hlit > MAX_LIT_LEN_CODES || hdist > MAX_DIST_CODES {
    return Err(PngError::CorruptDeflateStream);
  }

  let alphabet = CodeLengthAlphabet::read(bits, hclen, arena)?;
  let lengths = arena.alloc_bytes(hlit + hdist)?;
  alphabet.fill_code_lengths(bits, lengths)?;

  let (lit_len_lengths, dist_lengths) = lengths.split_at(hlit);
  if lit_len_lengths[END_OF_BLOCK] == 0 {
    // a block that can't end is never valid
    return Err(PngError::CorruptDeflateStream);
  }
  let lit_len = HuffmanTable::build(lit_len_lengths, arena)?;
  let dist = HuffmanTable::build(dist_lengths, arena)?;
  Ok((lit_len, dist))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_repeat_previous_needs_a_previous() {
    // alphabet where symbol 16 is the only code (length 1, code `0`)
    let mut memory = [0_u8; 512];
    let mut arena = Arena::new(&mut memory);
    let mut cl_lengths = [0_u8; 19];
    cl_lengths[16] = 1;
    let table = HuffmanTable::build(&cl_lengths, &mut arena).unwrap();
    let alphabet = CodeLengthAlphabet { table };
    let mut lengths = [0_u8; 8];
    let mut bits = BitCursor::new(&[0, 0]);
    let result = alphabet.fill_code_lengths(&mut bits, &mut lengths);
    assert_eq!(result, Err(PngError::CorruptDeflateStream));
  }

  #[test]
  fn test_repeats_fill_lengths() {
    // symbols 2, 16, and 18, with codes 0, 10, 11
    let mut memory = [0_u8; 512];
    let mut arena = Arena::new(&mut memory);
    let mut cl_lengths = [0_u8; 19];
    cl_lengths[2] = 1;
    cl_lengths[16] = 2;
    cl_lengths[18] = 2;
    let table = HuffmanTable::build(&cl_lengths, &mut arena).unwrap();
    let alphabet = CodeLengthAlphabet { table };
    // `2`, then `16` with extra bits 01 (repeat 4 times), then `18` with
    // extra bits 0000000 (11 zeros).
    // bit stream: 0 | 1 0 | 1 0 | 1 1 | 0 0 0 0 0 0 0
    let mut bits = BitCursor::new(&[0b0110_1010, 0b0000_0000]);
    let mut lengths = [9_u8; 16];
    alphabet.fill_code_lengths(&mut bits, &mut lengths).unwrap();
    assert_eq!(lengths, [2, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
  }

  #[test]
  fn test_repeat_overrun_is_an_error() {
    let mut memory = [0_u8; 512];
    let mut arena = Arena::new(&mut memory);
    let mut cl_lengths = [0_u8; 19];
    cl_lengths[18] = 1;
    let table = HuffmanTable::build(&cl_lengths, &mut arena).unwrap();
    let alphabet = CodeLengthAlphabet { table };
    // `18` asks for at least 11 zeros, but there's only room for 5.
    let mut lengths = [0_u8; 5];
    let mut bits = BitCursor::new(&[0, 0]);
    let result = alphabet.fill_code_lengths(&mut bits, &mut lengths);
    assert_eq!(result, Err(PngError::CorruptDeflateStream));
  }
}
