//! asciiview library crate.
//!
//! Converts visual sources to monochrome ASCII text. Three kinds of
//! [`source::FrameSource`] produce raw RGBA [`source::PixelBuffer`]s at a
//! fixed target resolution; the [`ascii`] module turns each buffer into a
//! text grid, one glyph per sampled pixel.

pub mod ascii;
pub mod config;
pub mod source;

pub use ascii::{rasterize, AsciiFrame};
pub use source::{FrameSource, PixelBuffer, SourceConfig, SourceError};
