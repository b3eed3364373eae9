use crate::{PngError, PngResult};

/// Reads bits out of a byte slice, least significant bit first, the way
/// DEFLATE packs them.
///
/// Bytes are pulled into the spare bit buffer one at a time, only when a read
/// needs them, so there are never more than 7 spare bits left over after a
/// read completes.
#[derive(Clone)]
pub struct BitCursor<'b> {
  bytes: &'b [u8],
  position: usize,
  spare_bits: u64,
  spare_bit_count: u32,
}

impl core::fmt::Debug for BitCursor<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    struct SpareBits(u64, u32);
    impl core::fmt::Debug for SpareBits {
      fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.1 == 0 {
          f.write_str("\"\"")
        } else {
          write!(f, "\"{bits:0width$b}\"", bits = self.0, width = self.1 as usize)
        }
      }
    }
    f.debug_struct("BitCursor")
      .field("position", &self.position)
      .field("remaining", &(self.bytes.len() - self.position))
      .field("spare_bits", &SpareBits(self.spare_bits, self.spare_bit_count))
      .finish()
  }
}

impl<'b> BitCursor<'b> {
  #[inline]
  #[must_use]
  pub const fn new(bytes: &'b [u8]) -> Self {
    Self { bytes, position: 0, spare_bits: 0, spare_bit_count: 0 }
  }

  fn grab_byte(&mut self) -> PngResult<u8> {
    let byte = *self.bytes.get(self.position).ok_or(PngError::CorruptDeflateStream)?;
    self.position += 1;
    Ok(byte)
  }

  fn feed(&mut self, count_after: u32) -> PngResult<()> {
    debug_assert!(count_after <= 32);
    while count_after > self.spare_bit_count {
      let new_byte = u64::from(self.grab_byte()?);
      self.spare_bits |= new_byte << self.spare_bit_count;
      self.spare_bit_count += 8;
    }
    Ok(())
  }

  /// Takes the next `count` bits as an integer, first bit in the lowest
  /// position.
  ///
  /// ## Failure
  /// * [`PngError::CorruptDeflateStream`] if the bytes run out first.
  ///
  /// ## Panics
  /// * In debug builds, if `count` isn't in `1..=32`.
  pub fn consume_bits(&mut self, count: u32) -> PngResult<u32> {
    debug_assert!((1..=32).contains(&count), "can't consume {count} bits");
    if self.spare_bit_count < count {
      self.feed(count)?;
    }
    let mask = (1_u64 << count) - 1;
    let out = (self.spare_bits & mask) as u32;
    self.spare_bits >>= count;
    self.spare_bit_count -= count;
    Ok(out)
  }

  /// Takes one bit.
  #[inline]
  pub fn consume_bit(&mut self) -> PngResult<u32> {
    self.consume_bits(1)
  }

  /// Throws away the rest of a partially used byte.
  #[inline]
  pub fn flush_to_byte_boundary(&mut self) {
    debug_assert!(self.spare_bit_count < 8);
    self.spare_bits = 0;
    self.spare_bit_count = 0;
  }

  /// Takes `count` whole bytes. Call this only at a byte boundary.
  pub fn take_aligned_bytes(&mut self, count: usize) -> PngResult<&'b [u8]> {
    debug_assert_eq!(self.spare_bit_count, 0);
    let end = self.position.checked_add(count).ok_or(PngError::CorruptDeflateStream)?;
    let out = self.bytes.get(self.position..end).ok_or(PngError::CorruptDeflateStream)?;
    self.position = end;
    Ok(out)
  }
}

#[test]
fn test_consume_bits_lsb_first() {
  let mut bits = BitCursor::new(&[0b1010_1101, 0b0000_0011]);
  assert_eq!(bits.consume_bit(), Ok(1));
  assert_eq!(bits.consume_bits(2), Ok(0b10));
  assert_eq!(bits.consume_bits(3), Ok(0b101));
  // crosses into the second byte
  assert_eq!(bits.consume_bits(4), Ok(0b1110));
  assert_eq!(bits.consume_bits(6), Ok(0));
  assert_eq!(bits.consume_bit(), Err(PngError::CorruptDeflateStream));
}

#[test]
fn test_consume_32_bits() {
  let mut bits = BitCursor::new(&[0xFF, 0x78, 0x56, 0x34, 0x12]);
  assert_eq!(bits.consume_bits(4), Ok(0xF));
  assert_eq!(bits.consume_bits(32), Ok(0x2345_678F));
  assert_eq!(bits.consume_bits(4), Ok(0x1));
}

#[test]
fn test_flush_then_aligned_bytes() {
  let mut bits = BitCursor::new(&[0b101, 9, 8, 7]);
  assert_eq!(bits.consume_bits(3), Ok(0b101));
  bits.flush_to_byte_boundary();
  assert_eq!(bits.take_aligned_bytes(2), Ok(&[9_u8, 8][..]));
  assert_eq!(bits.take_aligned_bytes(2), Err(PngError::CorruptDeflateStream));
  assert_eq!(bits.take_aligned_bytes(1), Ok(&[7_u8][..]));
}
