//! Prints what the codec makes of each PNG named on the command line, then
//! re-encodes it and checks that the pixels survive.
//!
//! `cargo run --example png_info -- some.png other.png`

use rgba_png::{arena::Arena, png::*, PngResult};

fn main() {
  let paths: Vec<String> = std::env::args().skip(1).collect();
  if paths.is_empty() {
    println!("usage: png_info FILE...");
    return;
  }
  for path in paths {
    let bytes = match std::fs::read(&path) {
      Ok(bytes) => bytes,
      Err(e) => {
        println!("{path}: can't read: {e}");
        continue;
      }
    };
    if let Err(e) = describe(&path, &bytes) {
      println!("{path}: {e}");
    }
  }
}

/// Checks everything, and refuses images too big to be sensible.
fn untrusted_file_options() -> DecodeOptions {
  DecodeOptions::strict().with_max_dimension(DecodeOptions::UNTRUSTED_MAX_DIMENSION)
}

fn describe(path: &str, bytes: &[u8]) -> PngResult<()> {
  let image = PngImage::parse_with(bytes, untrusted_file_options())?;
  let ihdr = image.ihdr();
  println!("{path}: {}x{}, {} bytes", ihdr.width, ihdr.height, bytes.len());
  for chunk in image.chunks() {
    let crc = if chunk.crc_matches() { "ok" } else { "BAD" };
    println!("  {:?} {:>8} bytes, crc {crc}", chunk.ty, chunk.data.len());
  }

  let mut memory = vec![0_u8; image.decode_memory_requirement()?];
  let mut arena = Arena::new(&mut memory);
  let rgba = image.decode_in(&mut arena)?;
  println!("  decoded with {} of {} arena bytes", arena.used(), arena.capacity());
  if let Some([r, g, b, a]) = rgba.pixel(0, 0) {
    println!("  top left pixel: r={r} g={g} b={b} a={a}");
  }

  let encoded = encode_png(rgba.width(), rgba.height(), rgba.pixels(), EncodeOptions::default())?;
  let (_, _, again) = decode_png(&encoded, DecodeOptions::strict())?;
  let same = again == rgba.pixels();
  println!("  re-encoded as {} bytes (uncompressed), round trip ok: {same}", encoded.len());
  Ok(())
}
