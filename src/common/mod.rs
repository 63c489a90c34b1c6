//! Common utilities shared across the de-encapsulation pipeline.
//!
//! This module provides codepage resolution and byte-order-mark handling used
//! by the header validator, the font-table parser, and the text decoder.

// Submodule declarations
pub mod bom;
pub mod encoding;

// Re-exports for convenience
pub use bom::{Bom, strip_bom};
pub use encoding::{charset_to_codepage, codepage_to_encoding};
