use rgba_png::{arena::Arena, png::*, PngError};

use super::{rand_bytes, rand_u32};

fn push_chunk(out: &mut Vec<u8>, ty: [u8; 4], data: &[u8]) {
  out.extend_from_slice(&(data.len() as u32).to_be_bytes());
  out.extend_from_slice(&ty);
  out.extend_from_slice(data);
  out.extend_from_slice(&png_crc(ty, data).to_be_bytes());
}

/// Builds a PNG from header bytes and any number of `IDAT` payloads.
fn frame_png(ihdr: [u8; 13], idats: &[&[u8]]) -> Vec<u8> {
  let mut out = PNG_SIGNATURE.to_vec();
  push_chunk(&mut out, *b"IHDR", &ihdr);
  for idat in idats {
    push_chunk(&mut out, *b"IDAT", idat);
  }
  push_chunk(&mut out, *b"IEND", &[]);
  out
}

fn filter_lines(width: u32, pixels: &[u8], choice: FilterChoice) -> Vec<u8> {
  let ctx = FilterContext::new(width).unwrap();
  let mut out = vec![0_u8; pixels.len() + pixels.len() / ctx.bytes_per_row];
  ctx.filter_image(pixels, &mut out, choice);
  out
}

/// Compresses with a normal zlib compressor, then frames it.
fn miniz_png(width: u32, height: u32, pixels: &[u8], choice: FilterChoice, level: u8) -> Vec<u8> {
  let filtered = filter_lines(width, pixels, choice);
  let zlib = miniz_oxide::deflate::compress_to_vec_zlib(&filtered, level);
  frame_png(IHDR::rgba8(width, height).to_bytes(), &[&zlib])
}

const RGBW_2X2: [u8; 16] = [
  255, 0, 0, 255, // red
  0, 255, 0, 255, // green
  0, 0, 255, 255, // blue
  255, 255, 255, 255, // white
];

#[test]
fn test_rgbw_2x2_from_a_zlib_compressor() {
  for level in [0, 1, 6, 9, 10] {
    for choice in [FilterChoice::None, FilterChoice::Fixed(FilterType::Paeth)] {
      let png = miniz_png(2, 2, &RGBW_2X2, choice, level);
      let (width, height, pixels) = decode_png(&png, DecodeOptions::strict()).unwrap();
      assert_eq!((width, height), (2, 2));
      assert_eq!(pixels, RGBW_2X2, "level {level}, {choice:?}");
    }
  }
}

#[test]
fn test_larger_compressed_images() {
  // smooth areas plus noise, so the compressor uses real Huffman blocks
  let (width, height) = (67, 45);
  let mut pixels = rand_bytes((width * height * 4) as usize);
  for (i, p) in pixels.iter_mut().enumerate() {
    if (i / 4) % 5 != 0 {
      *p = ((i % 256) as u8) / 8;
    }
  }
  for level in [1, 6, 9] {
    for choice in [FilterChoice::None, FilterChoice::Adaptive] {
      let png = miniz_png(width, height, &pixels, choice, level);
      let (_, _, decoded) = decode_png(&png, DecodeOptions::strict()).unwrap();
      assert!(decoded == pixels, "level {level}, {choice:?}");
    }
  }
}

#[test]
fn test_idat_split_with_other_chunks() {
  let filtered = filter_lines(2, &RGBW_2X2, FilterChoice::Fixed(FilterType::Sub));
  let zlib = miniz_oxide::deflate::compress_to_vec_zlib(&filtered, 6);
  let (a, rest) = zlib.split_at(1);
  let (b, c) = rest.split_at(rest.len() / 2);
  let mut png = PNG_SIGNATURE.to_vec();
  push_chunk(&mut png, *b"IHDR", &IHDR::rgba8(2, 2).to_bytes());
  push_chunk(&mut png, *b"tEXt", b"Comment\0ignored");
  push_chunk(&mut png, *b"IDAT", a);
  push_chunk(&mut png, *b"IDAT", &[]);
  push_chunk(&mut png, *b"IDAT", b);
  push_chunk(&mut png, *b"IDAT", c);
  push_chunk(&mut png, *b"IEND", &[]);
  let image = PngImage::parse_with(&png, DecodeOptions::strict()).unwrap();
  assert_eq!(image.idat_len(), Ok(zlib.len()));
  assert_eq!(image.idat_chunks().count(), 4);
  let (_, _, pixels) = decode_png(&png, DecodeOptions::strict()).unwrap();
  assert_eq!(pixels, RGBW_2X2);
}

#[test]
fn test_round_trip_random_sizes() {
  let choices = [
    FilterChoice::None,
    FilterChoice::Adaptive,
    FilterChoice::Fixed(FilterType::Average),
    FilterChoice::Fixed(FilterType::Paeth),
  ];
  for i in 0..24 {
    let width = 1 + rand_u32(40);
    let height = 1 + rand_u32(40);
    let pixels = rand_bytes((width * height * 4) as usize);
    let options = EncodeOptions { filter: choices[i % choices.len()] };
    let png = encode_png(width, height, &pixels, options).unwrap();
    assert_eq!(png.len(), encoded_len(width, height).unwrap());
    let (w, h, decoded) = decode_png(&png, DecodeOptions::strict()).unwrap();
    assert_eq!((w, h), (width, height));
    assert!(decoded == pixels, "{width}x{height} {options:?}");
  }
}

#[test]
fn test_round_trip_rows_wider_than_a_block() {
  // 17_000 * 4 + 1 bytes per line doesn't fit in one stored block
  let (width, height) = (17_000, 3);
  let pixels = rand_bytes(17_000 * 3 * 4);
  let png = encode_png(width, height, &pixels, EncodeOptions::default()).unwrap();
  let (_, _, decoded) = decode_png(&png, DecodeOptions::strict()).unwrap();
  assert!(decoded == pixels);
}

#[test]
fn test_default_options_decode_any_encoded_size() {
  // wider than the untrusted-input limit, which only applies when asked for
  let (width, height) = (20_000, 1);
  let pixels = rand_bytes(20_000 * 4);
  let png = encode_png(width, height, &pixels, EncodeOptions::default()).unwrap();
  let (_, _, decoded) = decode_png(&png, DecodeOptions::default()).unwrap();
  assert!(decoded == pixels);
  let (_, _, decoded) = decode_png(&png, DecodeOptions::strict()).unwrap();
  assert!(decoded == pixels);
  let untrusted =
    DecodeOptions::default().with_max_dimension(DecodeOptions::UNTRUSTED_MAX_DIMENSION);
  assert_eq!(decode_png(&png, untrusted), Err(PngError::DimensionsTooLarge));
}

#[test]
fn test_encoder_output_is_a_plain_zlib_stream() {
  let (width, height) = (300, 70);
  let pixels = rand_bytes((width * height * 4) as usize);
  let options = EncodeOptions { filter: FilterChoice::Adaptive };
  let png = encode_png(width, height, &pixels, options).unwrap();
  let image = PngImage::parse_with(&png, DecodeOptions::strict()).unwrap();
  // several blocks, each in its own chunk
  assert!(image.idat_chunks().count() > 1);
  let zlib: Vec<u8> = image.idat_chunks().flat_map(|chunk| chunk.data.iter().copied()).collect();
  let filtered = miniz_oxide::inflate::decompress_to_vec_zlib(&zlib).unwrap();
  assert_eq!(filtered.len(), (width as usize * 4 + 1) * height as usize);
  // every chunk CRC is right
  assert!(image.chunks().all(|chunk| chunk.crc_matches()));
  assert_eq!(image.chunks().last().map(|chunk| chunk.ty), Some(ChunkType::IEND));
}

#[test]
fn test_not_a_png() {
  assert_eq!(decode_png(b"not a png at all", DecodeOptions::default()), Err(PngError::NotAPng));
  let mut png = encode_png(1, 1, &[1, 2, 3, 4], EncodeOptions::default()).unwrap();
  png[0] = 0x88;
  assert_eq!(decode_png(&png, DecodeOptions::default()), Err(PngError::NotAPng));
}

#[test]
fn test_unsupported_headers() {
  let zlib = miniz_oxide::deflate::compress_to_vec_zlib(&[0; 17], 6);
  let mut sixteen_bit = IHDR::rgba8(2, 2);
  sixteen_bit.bit_depth = 16;
  let mut rgb = IHDR::rgba8(2, 2);
  rgb.color_type = 2;
  let mut interlaced = IHDR::rgba8(2, 2);
  interlaced.interlace_method = 1;
  for ihdr in [sixteen_bit, rgb, interlaced, IHDR::rgba8(0, 2)] {
    let png = frame_png(ihdr.to_bytes(), &[&zlib]);
    assert_eq!(decode_png(&png, DecodeOptions::strict()), Err(PngError::UnsupportedFormat));
  }
}

#[test]
fn test_bad_zlib_header() {
  let mut zlib = miniz_oxide::deflate::compress_to_vec_zlib(&[0; 18], 6);
  zlib[0] = 0x79;
  let png = frame_png(IHDR::rgba8(2, 2).to_bytes(), &[&zlib]);
  assert_eq!(decode_png(&png, DecodeOptions::default()), Err(PngError::ZlibHeaderInvalid));
}

#[test]
fn test_illegal_filter_type() {
  let mut filtered = filter_lines(2, &RGBW_2X2, FilterChoice::None);
  filtered[9] = 5;
  let zlib = miniz_oxide::deflate::compress_to_vec_zlib(&filtered, 6);
  let png = frame_png(IHDR::rgba8(2, 2).to_bytes(), &[&zlib]);
  assert_eq!(decode_png(&png, DecodeOptions::default()), Err(PngError::IllegalFilterType));
}

#[test]
fn test_checksums_only_checked_when_strict() {
  let png = encode_png(2, 2, &RGBW_2X2, EncodeOptions::default()).unwrap();
  // last byte of the IDAT CRC (IEND is the final 12 bytes)
  let mut bad_crc = png.clone();
  let i = bad_crc.len() - 13;
  bad_crc[i] ^= 0xFF;
  assert_eq!(decode_png(&bad_crc, DecodeOptions::default()).map(|d| d.2), Ok(RGBW_2X2.to_vec()));
  assert_eq!(decode_png(&bad_crc, DecodeOptions::strict()), Err(PngError::ChecksumMismatch));

  // last byte of the Adler-32, fixing the CRC so only the Adler-32 is wrong
  let bad_adler = frame_png_from(&png, |idat| *idat.last_mut().unwrap() ^= 0xFF);
  assert_eq!(decode_png(&bad_adler, DecodeOptions::default()).map(|d| d.2), Ok(RGBW_2X2.to_vec()));
  assert_eq!(decode_png(&bad_adler, DecodeOptions::strict()), Err(PngError::ChecksumMismatch));
}

/// Rebuilds a PNG from an encoded one, editing the (single) `IDAT` payload.
fn frame_png_from(png: &[u8], edit: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
  let image = PngImage::parse(png).unwrap();
  let mut idat: Vec<u8> = image.idat_chunks().flat_map(|chunk| chunk.data.iter().copied()).collect();
  edit(&mut idat);
  frame_png(image.ihdr().to_bytes(), &[&idat])
}

#[test]
fn test_fixed_size_arena() {
  let mut memory = [0_u8; 1024];
  let mut arena = Arena::new(&mut memory);
  let png = encode_png_in(&mut arena, 2, 2, &RGBW_2X2, EncodeOptions::default()).unwrap();
  let mut decode_memory = [0_u8; 4096];
  let mut decode_arena = Arena::new(&mut decode_memory);
  let image = decode_png_in(png, &mut decode_arena, DecodeOptions::strict()).unwrap();
  assert_eq!(image.pixels(), &RGBW_2X2);
  assert_eq!(image.pixel(1, 1), Some([255, 255, 255, 255]));
  // the pixels are all that stays allocated
  assert!(decode_arena.used() < 16 + 32);
}

#[test]
fn test_random_data_does_not_panic() {
  // random bytes after a good signature
  for _ in 0..50 {
    let mut bytes = PNG_SIGNATURE.to_vec();
    bytes.extend_from_slice(&rand_bytes(512));
    let _ = decode_png(&bytes, DecodeOptions::default());
  }
  // random bytes in place of the compressed data
  for _ in 0..50 {
    let png = frame_png(IHDR::rgba8(8, 8).to_bytes(), &[&rand_bytes(300)]);
    let _ = decode_png(&png, DecodeOptions::default());
  }
  // damage to a real compressed stream (the header chunk is left alone)
  let (width, height) = (16, 16);
  let pixels = rand_bytes(16 * 16 * 4);
  let good = miniz_png(width, height, &pixels, FilterChoice::Adaptive, 6);
  for _ in 0..200 {
    let mut png = good.clone();
    for _ in 0..4 {
      let i = 33 + rand_u32((png.len() - 33) as u32) as usize;
      png[i] = rand_bytes(1)[0];
    }
    let _ = decode_png(&png, DecodeOptions::default());
    let _ = decode_png(&png, DecodeOptions::strict());
  }
}
