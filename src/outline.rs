//! Path and hint event sinks.
//!
//! The interpreter reports everything it decodes as a series of callbacks on
//! an implementor of the [`PathSink`] trait: path construction in absolute
//! coordinates, hint declarations, hint masks, and composite-glyph requests.
//! Every method has a no-op default so a consumer only implements the events
//! it cares about.

use pathfinder_geometry::line_segment::LineSegment2F;
use pathfinder_geometry::vector::Vector2F;

/// Orientation of a hint stem.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StemDirection {
    Horizontal,
    Vertical,
}

/// Distinguishes `hintmask` from `cntrmask` in [`PathSink::hint_mask`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MaskKind {
    Hint,
    Counter,
}

/// Identifies which subroutine INDEX a subroutine call resolved into.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SubroutineIndex {
    Local(usize),
    Global(usize),
}

/// A trait for receiving the events decoded from a charstring.
///
/// Coordinates are absolute; the interpreter accumulates the charstring's
/// relative deltas before calling back.
pub trait PathSink {
    /// The pen moved to `to`, beginning a new subpath.
    fn move_to(&mut self, _to: Vector2F) {}

    /// A line to `to`.
    fn line_to(&mut self, _to: Vector2F) {}

    /// A cubic Bézier curve to `to`. `flex` is set on the two curves that a
    /// flex operator expands into, allowing a consumer to treat them as a
    /// single flattened segment if it wishes.
    fn curve_to(&mut self, _ctrl: LineSegment2F, _to: Vector2F, _flex: bool) {}

    /// The current subpath was closed.
    fn close(&mut self) {}

    /// A hint stem. `low_edge` is the absolute coordinate of the lower/left
    /// edge; `width` is the stem width, or one of the ghost-hint sentinels
    /// (-20, -21) passed through unmodified.
    fn hint_stem(&mut self, _direction: StemDirection, _low_edge: f32, _width: f32) {}

    /// A hint or counter mask. `bytes` holds `ceil(stems / 8)` bytes and is
    /// only valid for the duration of the call.
    fn hint_mask(&mut self, _kind: MaskKind, _bytes: &[u8]) {}

    /// An accent composition request from a 4-operand `endchar` or a Type 1
    /// `seac`. Resolving the standard-encoding codes to glyphs and rendering
    /// the two components is the caller's responsibility.
    fn compose(&mut self, _adx: f32, _ady: f32, _base_code: u8, _accent_code: u8) {}

    /// The glyph ended.
    fn end_char(&mut self) {}

    /// A subroutine call resolved to `index` and is about to execute.
    fn enter_subr(&mut self, _index: SubroutineIndex) {}

    /// The most recently entered subroutine returned.
    fn exit_subr(&mut self) {}
}

/// A sink that discards all events, for metrics-only interpretation.
pub struct NullSink;

impl PathSink for NullSink {}
