//! The PNG scanline filters.
//!
//! Each line of image data gets a filter applied before compression, to make
//! the bytes more compressible. The filter type goes in a byte at the start of
//! the line. Filters work bytewise with wrapping arithmetic, looking at the
//! matching byte of the pixel to the left (`a`), the pixel above (`b`), and
//! the pixel above and to the left (`c`). Anything off the left edge, or above
//! the first line, counts as 0.

use crate::{PngError, PngResult};

/// RGBA8 is 4 bytes per pixel, which is the distance back to `a` and `c`.
pub const BYTES_PER_PIXEL: usize = 4;

/// A scanline filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterType {
  None = 0,
  Sub = 1,
  Up = 2,
  Average = 3,
  Paeth = 4,
}
impl FilterType {
  pub const ALL: [Self; 5] = [Self::None, Self::Sub, Self::Up, Self::Average, Self::Paeth];
}
impl TryFrom<u8> for FilterType {
  type Error = PngError;
  #[inline]
  fn try_from(byte: u8) -> Result<Self, Self::Error> {
    Ok(match byte {
      0 => Self::None,
      1 => Self::Sub,
      2 => Self::Up,
      3 => Self::Average,
      4 => Self::Paeth,
      _ => return Err(PngError::IllegalFilterType),
    })
  }
}

/// How the encoder picks each line's filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FilterChoice {
  /// Every line uses [`FilterType::None`].
  #[default]
  None,
  /// Every line uses this filter.
  Fixed(FilterType),
  /// Each line uses whichever filter gives the smallest sum of absolute
  /// values (treating the output bytes as signed), the usual heuristic.
  Adaptive,
}

pub(crate) const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
  let a_ = a as i32;
  let b_ = b as i32;
  let c_ = c as i32;
  let p: i32 = a_ + b_ - c_;
  let pa = (p - a_).abs();
  let pb = (p - b_).abs();
  let pc = (p - c_).abs();
  // The order of these tests is fixed by the PNG format, ties go a, b, c.
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}

#[inline]
fn average(a: u8, b: u8) -> u8 {
  ((u16::from(a) + u16::from(b)) / 2) as u8
}

/// The predicted value for byte `i` of a line, from the bytes around it.
///
/// * `line` holds the unfiltered bytes of this line (at least up through
///   `i - BYTES_PER_PIXEL`).
/// * `prior` is the unfiltered previous line, empty for the first line.
#[inline]
fn predict(ty: FilterType, line: &[u8], prior: &[u8], i: usize) -> u8 {
  let a = if i >= BYTES_PER_PIXEL { line[i - BYTES_PER_PIXEL] } else { 0 };
  let b = prior.get(i).copied().unwrap_or(0);
  match ty {
    FilterType::None => 0,
    FilterType::Sub => a,
    FilterType::Up => b,
    FilterType::Average => average(a, b),
    FilterType::Paeth => {
      let c =
        if i >= BYTES_PER_PIXEL { prior.get(i - BYTES_PER_PIXEL).copied().unwrap_or(0) } else { 0 };
      paeth_predictor(a, b, c)
    }
  }
}

/// Reverses a filter in place.
///
/// `line` is the filtered data (without the filter byte), `prior` is the
/// already unfiltered previous line, or an empty slice for the first line.
pub fn unfilter_scanline(ty: FilterType, line: &mut [u8], prior: &[u8]) {
  debug_assert!(prior.is_empty() || prior.len() == line.len());
  match ty {
    FilterType::None => (),
    FilterType::Up if !prior.is_empty() => {
      line.iter_mut().zip(prior.iter().copied()).for_each(|(x, b)| *x = x.wrapping_add(b));
    }
    FilterType::Up => (),
    _ => {
      // left to right, so `a` is already unfiltered when we get to it.
      for i in 0..line.len() {
        let predicted = predict(ty, line, prior, i);
        line[i] = line[i].wrapping_add(predicted);
      }
    }
  }
}

/// Applies a filter to `raw`, writing the filtered bytes to `out`.
///
/// `prior` is the previous raw line, or an empty slice for the first line.
pub fn filter_scanline(ty: FilterType, raw: &[u8], prior: &[u8], out: &mut [u8]) {
  debug_assert!(prior.is_empty() || prior.len() == raw.len());
  debug_assert_eq!(raw.len(), out.len());
  for (i, o) in out.iter_mut().enumerate() {
    *o = raw[i].wrapping_sub(predict(ty, raw, prior, i));
  }
}

/// The "minimum sum of absolute differences" score of a filter on one line.
fn filter_cost(ty: FilterType, raw: &[u8], prior: &[u8]) -> u64 {
  (0..raw.len())
    .map(|i| u64::from((raw[i].wrapping_sub(predict(ty, raw, prior, i)) as i8).unsigned_abs()))
    .sum()
}

/// Line geometry of an RGBA8 image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
  pub bytes_per_pixel: usize,
  /// Pixel bytes per line, not counting the filter byte.
  pub bytes_per_row: usize,
}
impl FilterContext {
  /// ## Failure
  /// * [`PngError::DimensionsTooLarge`] if a line's byte count overflows.
  #[inline]
  pub fn new(width: u32) -> PngResult<Self> {
    let bytes_per_row = usize::try_from(width)?
      .checked_mul(BYTES_PER_PIXEL)
      .ok_or(PngError::DimensionsTooLarge)?;
    Ok(Self { bytes_per_pixel: BYTES_PER_PIXEL, bytes_per_row })
  }

  /// Bytes per filtered line, including the filter byte.
  #[inline]
  #[must_use]
  pub const fn filterline_len(&self) -> usize {
    self.bytes_per_row + 1
  }

  /// Unfilters every line of `filtered` into `out`.
  ///
  /// * `filtered` is `height` lines of filter byte plus pixel data.
  /// * `out` is `height` lines of pixel data only.
  ///
  /// The line count comes from `out`, and `filtered` has to have at least that
  /// many lines.
  ///
  /// ## Failure
  /// * [`PngError::IllegalFilterType`] for a filter byte over 4.
  /// * [`PngError::CorruptDeflateStream`] if `filtered` is too short.
  pub fn unfilter_image(&self, filtered: &[u8], out: &mut [u8]) -> PngResult<()> {
    if self.bytes_per_row == 0 {
      return Ok(());
    }
    let height = out.len() / self.bytes_per_row;
    if filtered.len() / self.filterline_len() < height {
      return Err(PngError::CorruptDeflateStream);
    }
    let mut prior: &[u8] = &[];
    for (filterline, row) in
      filtered.chunks_exact(self.filterline_len()).zip(out.chunks_exact_mut(self.bytes_per_row))
    {
      let ty = FilterType::try_from(filterline[0])?;
      row.copy_from_slice(&filterline[1..]);
      unfilter_scanline(ty, row, prior);
      prior = row;
    }
    Ok(())
  }

  /// Filters every line of `raw` into `out`, each line getting its filter
  /// byte.
  ///
  /// `out` has to be exactly one byte per line longer than `raw`.
  pub fn filter_image(&self, raw: &[u8], out: &mut [u8], choice: FilterChoice) {
    if self.bytes_per_row == 0 {
      return;
    }
    debug_assert_eq!(out.len(), raw.len() + raw.len() / self.bytes_per_row);
    let mut prior: &[u8] = &[];
    for (row, filterline) in
      raw.chunks_exact(self.bytes_per_row).zip(out.chunks_exact_mut(self.filterline_len()))
    {
      let ty = match choice {
        FilterChoice::None => FilterType::None,
        FilterChoice::Fixed(ty) => ty,
        FilterChoice::Adaptive => FilterType::ALL
          .iter()
          .copied()
          .min_by_key(|ty| filter_cost(*ty, row, prior))
          .unwrap_or(FilterType::None),
      };
      filterline[0] = ty as u8;
      filter_scanline(ty, row, prior, &mut filterline[1..]);
      prior = row;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_filter_type_byte() {
    for ty in FilterType::ALL {
      assert_eq!(FilterType::try_from(ty as u8), Ok(ty));
    }
    assert_eq!(FilterType::try_from(5), Err(PngError::IllegalFilterType));
    assert_eq!(FilterType::try_from(255), Err(PngError::IllegalFilterType));
  }

  #[test]
  fn test_paeth_ties() {
    // all the same distance, so `a` wins
    assert_eq!(paeth_predictor(10, 10, 10), 10);
    // p = 20, pa = 10, pb = 0, pc = 10
    assert_eq!(paeth_predictor(10, 20, 10), 20);
    // p = 0, pa = 10, pb = 10, pc = 20 -> a
    assert_eq!(paeth_predictor(10, 10, 20), 10);
    // p = 10 + 20 - 5 = 25, pa = 15, pb = 5, pc = 20 -> b
    assert_eq!(paeth_predictor(10, 20, 5), 20);
    // p = 5 + 5 - 200 = -190, pa = 195, pb = 195, pc = 390 -> a
    assert_eq!(paeth_predictor(5, 5, 200), 5);
    // p = 100 + 0 - 60 = 40, pa = 60, pb = 40, pc = 20 -> c
    assert_eq!(paeth_predictor(100, 0, 60), 60);
  }

  #[test]
  fn test_average_uses_the_full_sum() {
    // a = 200 and b = 100, which would wrap if added as u8
    let prior = [0_u8, 0, 0, 0, 100, 0, 0, 0];
    let mut line = [200_u8, 0, 0, 0, 7, 0, 0, 0];
    unfilter_scanline(FilterType::Average, &mut line, &prior);
    assert_eq!(line[0], 200);
    assert_eq!(line[4], 7 + 150);
  }

  #[test]
  fn test_first_line_and_first_pixel() {
    let raw = [1_u8, 2, 3, 4, 5, 6, 7, 8];
    for ty in FilterType::ALL {
      let mut filtered = [0_u8; 8];
      filter_scanline(ty, &raw, &[], &mut filtered);
      let mut line = filtered;
      unfilter_scanline(ty, &mut line, &[]);
      assert_eq!(line, raw, "{ty:?}");
    }
    // on the first line, Up does nothing and Sub only looks left
    let mut filtered = [0_u8; 8];
    filter_scanline(FilterType::Up, &raw, &[], &mut filtered);
    assert_eq!(filtered, raw);
    filter_scanline(FilterType::Sub, &raw, &[], &mut filtered);
    assert_eq!(filtered, [1, 2, 3, 4, 4, 4, 4, 4]);
  }

  fn random_image(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0_u8; (width * height * 4) as usize];
    getrandom::getrandom(&mut pixels).unwrap();
    // make parts of it smooth so the filters have something to find
    for (i, byte) in pixels.iter_mut().enumerate().filter(|(i, _)| i % 3 == 0) {
      *byte = (i / 7) as u8;
    }
    pixels
  }

  #[test]
  fn test_image_round_trip_every_choice() {
    let (width, height) = (13, 9);
    let ctx = FilterContext::new(width).unwrap();
    let raw = random_image(width, height);
    let mut choices = vec![FilterChoice::None, FilterChoice::Adaptive];
    choices.extend(FilterType::ALL.iter().copied().map(FilterChoice::Fixed));
    for choice in choices {
      let mut filtered = vec![0_u8; raw.len() + height as usize];
      ctx.filter_image(&raw, &mut filtered, choice);
      if let FilterChoice::Fixed(ty) = choice {
        assert!(filtered.chunks(ctx.filterline_len()).all(|line| line[0] == ty as u8));
      }
      let mut out = vec![0_u8; raw.len()];
      ctx.unfilter_image(&filtered, &mut out).unwrap();
      assert!(out == raw, "{choice:?}");
    }
  }

  #[test]
  fn test_adaptive_picks_sub_for_a_gradient() {
    // every pixel is 1 more than the last, so Sub gives all 1s
    let ctx = FilterContext::new(64).unwrap();
    let raw: Vec<u8> = (0..256_u32).map(|i| (i / 4) as u8).collect();
    let mut filtered = vec![0_u8; 257];
    ctx.filter_image(&raw, &mut filtered, FilterChoice::Adaptive);
    assert_eq!(filtered[0], FilterType::Sub as u8);
  }

  #[test]
  fn test_unfilter_image_errors() {
    let ctx = FilterContext::new(1).unwrap();
    let mut out = [0_u8; 8];
    // second line has filter type 5
    let filtered = [0, 1, 2, 3, 4, 5, 1, 2, 3, 4];
    assert_eq!(ctx.unfilter_image(&filtered, &mut out), Err(PngError::IllegalFilterType));
    // only one line of data for two lines of output
    assert_eq!(ctx.unfilter_image(&filtered[..5], &mut out), Err(PngError::CorruptDeflateStream));
  }
}
