use super::crc32::png_crc;

/// A chunk's 4 byte type tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChunkType(pub [u8; 4]);
impl ChunkType {
  pub const IHDR: Self = Self(*b"IHDR");
  pub const IDAT: Self = Self(*b"IDAT");
  pub const IEND: Self = Self(*b"IEND");
}
impl core::fmt::Debug for ChunkType {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    use core::fmt::Write;
    for byte in self.0 {
      f.write_char(if byte.is_ascii_graphic() { byte as char } else { '?' })?;
    }
    Ok(())
  }
}

/// The 8 bytes in front of every chunk's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
  /// Length of the data only, not counting the header or the CRC.
  pub length: u32,
  pub ty: ChunkType,
}
impl ChunkHeader {
  /// Reads a header from the front of `bytes`.
  #[inline]
  #[must_use]
  pub fn parse(bytes: &[u8]) -> Option<Self> {
    match bytes {
      [l0, l1, l2, l3, t0, t1, t2, t3, ..] => Some(Self {
        length: u32::from_be_bytes([*l0, *l1, *l2, *l3]),
        ty: ChunkType([*t0, *t1, *t2, *t3]),
      }),
      _ => None,
    }
  }

  #[inline]
  #[must_use]
  pub fn to_bytes(self) -> [u8; 8] {
    let [l0, l1, l2, l3] = self.length.to_be_bytes();
    let [t0, t1, t2, t3] = self.ty.0;
    [l0, l1, l2, l3, t0, t1, t2, t3]
  }
}

/// An unparsed chunk from a PNG.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawChunk<'b> {
  pub ty: ChunkType,
  pub data: &'b [u8],
  pub declared_crc: u32,
}
impl core::fmt::Debug for RawChunk<'_> {
  #[inline]
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("RawChunk")
      .field("ty", &self.ty)
      .field("data", &(&self.data[..self.data.len().min(12)], self.data.len()))
      .field("declared_crc", &self.declared_crc)
      .finish()
  }
}
impl RawChunk<'_> {
  /// The CRC of the type and data, as it should have been written.
  #[inline]
  #[must_use]
  pub fn compute_actual_crc(&self) -> u32 {
    png_crc(self.ty.0, self.data)
  }

  #[inline]
  #[must_use]
  pub fn crc_matches(&self) -> bool {
    self.compute_actual_crc() == self.declared_crc
  }
}

#[inline]
fn try_pull_byte_array<const N: usize>(bytes: &[u8]) -> Option<([u8; N], &[u8])> {
  if bytes.len() >= N {
    let (head, tail) = bytes.split_at(N);
    Some((head.try_into().ok()?, tail))
  } else {
    None
  }
}

/// An iterator that produces successive raw chunks from PNG bytes.
///
/// Chunks are found by their length field alone. The iterator ends at the
/// first chunk that's cut off by the end of the data (including any trailing
/// garbage too short to be a chunk). It does not stop at `IEND` on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct RawChunkIter<'b>(&'b [u8]);
impl<'b> RawChunkIter<'b> {
  /// Pass the full PNG bytes, it will skip the signature automatically.
  #[inline]
  #[must_use]
  pub const fn new(bytes: &'b [u8]) -> Self {
    match bytes {
      [_, _, _, _, _, _, _, _, rest @ ..] => Self(rest),
      _ => Self(&[]),
    }
  }

  /// Iterates chunks in bytes that don't start with the signature.
  #[inline]
  #[must_use]
  pub const fn from_chunk_bytes(bytes: &'b [u8]) -> Self {
    Self(bytes)
  }
}
impl<'b> Iterator for RawChunkIter<'b> {
  type Item = RawChunk<'b>;
  #[inline]
  fn next(&mut self) -> Option<Self::Item> {
    let header = ChunkHeader::parse(self.0)?;
    let after_header = &self.0[8..];
    let data_len = usize::try_from(header.length).ok()?;
    if after_header.len() < data_len {
      log::trace!("{:?} chunk wants {data_len} bytes, {} left", header.ty, after_header.len());
      self.0 = &[];
      return None;
    }
    let (data, rest) = after_header.split_at(data_len);
    let (crc_bytes, rest) = match try_pull_byte_array::<4>(rest) {
      Some(pulled) => pulled,
      None => {
        self.0 = &[];
        return None;
      }
    };
    self.0 = rest;
    Some(RawChunk { ty: header.ty, data, declared_crc: u32::from_be_bytes(crc_bytes) })
  }
}
