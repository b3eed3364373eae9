//! The CRC-32 used by PNG chunks (and zlib, and zip, and everyone else).

/// Lookup table for polynomial `0xEDB8_8320`, built at compile time.
pub(crate) const CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
  let mut out = [0; 256];
  let mut n = 0;
  while n < 256 {
    let mut c = n as u32;
    let mut k = 0;
    while k < 8 {
      if (c & 1) != 0 {
        c = 0xEDB8_8320_u32 ^ (c >> 1);
      } else {
        c >>= 1;
      }
      k += 1;
    }
    out[n] = c;
    n += 1;
  }
  out
}

/// A running CRC-32.
///
/// Feed it any number of byte ranges with [`update`](Crc32::update), then call
/// [`finish`](Crc32::finish).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32(u32);
impl Default for Crc32 {
  #[inline]
  #[must_use]
  fn default() -> Self {
    Self::new()
  }
}
impl Crc32 {
  #[inline]
  #[must_use]
  pub const fn new() -> Self {
    Self(u32::MAX)
  }

  #[inline]
  pub fn update(&mut self, bytes: &[u8]) {
    for byte in bytes.iter().copied() {
      let i = (self.0 ^ u32::from(byte)) as u8 as usize;
      self.0 = CRC_TABLE[i] ^ (self.0 >> 8);
    }
  }

  #[inline]
  #[must_use]
  pub const fn finish(self) -> u32 {
    self.0 ^ u32::MAX
  }
}

/// CRC of a PNG chunk: covers the type bytes and the data, not the length.
#[inline]
#[must_use]
pub fn png_crc(chunk_ty: [u8; 4], data: &[u8]) -> u32 {
  let mut crc = Crc32::new();
  crc.update(&chunk_ty);
  crc.update(data);
  crc.finish()
}

#[test]
fn test_crc_check_value() {
  // the standard CRC-32 check value
  let mut crc = Crc32::new();
  crc.update(b"123456789");
  assert_eq!(crc.finish(), 0xCBF4_3926);
}

#[test]
fn test_crc_in_pieces() {
  let mut crc = Crc32::default();
  crc.update(b"1234");
  crc.update(b"");
  crc.update(b"56789");
  assert_eq!(crc.finish(), 0xCBF4_3926);
}

#[test]
fn test_iend_crc() {
  // every PNG ends with these same 12 bytes
  assert_eq!(png_crc(*b"IEND", &[]), 0xAE42_6082);
}
