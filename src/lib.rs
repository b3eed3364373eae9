#![cfg_attr(not(test), no_std)]
#![cfg_attr(docs_rs, feature(doc_cfg))]
#![warn(missing_debug_implementations)]

//! An RGBA8 PNG codec that brings its own inflate.
//!
//! * [`png`] parses and decodes 8-bit RGBA, non-interlaced PNG files, and
//!   writes them back out (uncompressed, using stored DEFLATE blocks).
//! * [`decompress`] is the zlib/DEFLATE decompressor the decoder runs on. It
//!   handles all three block types.
//! * [`arena`] is where all the working memory comes from. Nothing in the core
//!   of the crate touches the global allocator.
//!
//! With the `alloc` feature (on by default) there's also owned convenience
//! functions, and the [`image`] module's heap-allocated bitmap.
//!
//! The crate reports what it's doing through the [`log`] facade. It doesn't
//! install a logger, that's up to the application.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(target_pointer_width = "16")]
compile_error!("this crate assumes 32-bit or bigger pointers!");

mod error;
pub use error::*;

pub mod arena;

pub mod bit_cursor;

pub mod decompress;

pub mod png;

#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub mod image;
