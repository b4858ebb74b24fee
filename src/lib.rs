#![warn(rust_2018_idioms)]

//! A Type 1, Type 2, and Type 13 charstring interpreter for CFF font data.
//!
//! Charstrings are the compact bytecode that encodes glyph outlines in
//! PostScript-flavored fonts. This crate decodes them: it drives a bounded
//! operand stack, a bounded subroutine call stack, and a per-flavor operator
//! dispatch table over an untrusted byte stream, reporting path construction,
//! hints, and composition to a caller-supplied [`outline::PathSink`] and
//! returning the glyph's metrics.
//!
//! ### Example
//!
//! ```
//! use charstring::cff::GlyphParams;
//! use charstring::charstring::{interpret, CharStringFlavor};
//! use charstring::outline::PathSink;
//! use charstring::pathfinder_geometry::vector::Vector2F;
//!
//! struct Collect(Vec<String>);
//!
//! impl PathSink for Collect {
//!     fn move_to(&mut self, to: Vector2F) {
//!         self.0.push(format!("move_to({}, {})", to.x(), to.y()));
//!     }
//!
//!     fn line_to(&mut self, to: Vector2F) {
//!         self.0.push(format!("line_to({}, {})", to.x(), to.y()));
//!     }
//! }
//!
//! // 10 10 rmoveto; 100 0 rlineto; endchar
//! let char_string = [149, 149, 21, 239, 139, 5, 14];
//! let params = GlyphParams::new();
//! let mut sink = Collect(Vec::new());
//! let _metrics = interpret(
//!     &char_string,
//!     CharStringFlavor::Type2,
//!     &params,
//!     &mut sink,
//! )?;
//! assert_eq!(sink.0, ["move_to(10, 10)", "line_to(110, 10)"]);
//! # Ok::<(), charstring::charstring::CharStringError>(())
//! ```

/// Reading of binary data.
pub mod binary;
pub mod cff;
pub mod charstring;
pub mod error;
pub mod outline;
pub mod size;

pub use pathfinder_geometry;
