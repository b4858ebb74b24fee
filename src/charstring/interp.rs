//! The charstring interpreter.
//!
//! One [`interpret`] call decodes a single glyph charstring, reporting what
//! it finds to a [`PathSink`] and returning the glyph's metrics. All mutable
//! state lives in the per-invocation machine, so independent interpreters
//! may run concurrently over shared font data.

use bitflags::bitflags;
use itertools::Itertools;
use log::warn;
use pathfinder_geometry::line_segment::LineSegment2F;
use pathfinder_geometry::rect::RectF;
use pathfinder_geometry::vector::vec2f;
use pathfinder_geometry::vector::Vector2F;
use rustc_hash::FxHashSet;
use tinyvec::{ArrayVec, TinyVec};

use crate::binary::read::{ReadCtxt, ReadScope};
use crate::cff::{GlyphParams, Index};
use crate::charstring::{
    conv_subroutine_index, parse_fixed, parse_int1, parse_int2, parse_int3, parse_long32,
    parse_shftshort, parse_short16, ArgumentsStack, CharStringError, CharStringFlavor, Dispatch,
    IsEven, OpCode, TryNumFrom, BCA_LENGTH, MAX_AXES, MAX_MASTERS, MAX_STEMS,
};
use crate::charstring::{GlyphMetrics, TWO_BYTE_OPERATOR_MARK};
use crate::error::ParseError;
use crate::outline::{MaskKind, PathSink, StemDirection, SubroutineIndex};

// Othersubr numbers assigned by the Type 1 rendering conventions.
const OTHERSUBR_FLEX_END: i32 = 0;
const OTHERSUBR_FLEX_BEGIN: i32 = 1;
const OTHERSUBR_FLEX_POINT: i32 = 2;
const OTHERSUBR_HINT_REPLACEMENT: i32 = 3;

// A Type 1 flex consists of a reference point followed by the six points of
// the two curves.
const FLEX_POINT_COUNT: usize = 7;

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    struct StateFlags: u8 {
        /// The glyph's advance width has been determined.
        const WIDTH_DONE = 0b0001;
        /// A moveto operator has been seen.
        const MOVED = 0b0010;
        /// The current subpath has not been closed yet.
        const OPEN = 0b0100;
        /// endchar (or Type 1 seac) has been seen; nothing may execute after.
        const ENDED = 0b1000;
    }
}

/// Bounded stack of suspended callers for subroutine calls.
struct CallStack<'data> {
    frames: Vec<ReadCtxt<'data>>,
    max_depth: usize,
}

impl<'data> CallStack<'data> {
    fn new(max_depth: usize) -> Self {
        CallStack {
            frames: Vec::with_capacity(max_depth),
            max_depth,
        }
    }

    fn push(&mut self, frame: ReadCtxt<'data>) -> Result<(), CharStringError> {
        if self.frames.len() == self.max_depth {
            Err(CharStringError::NestingLimitReached)
        } else {
            self.frames.push(frame);
            Ok(())
        }
    }

    fn pop(&mut self) -> Option<ReadCtxt<'data>> {
        self.frames.pop()
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// The transient array and the multiple-master registers addressed by
/// `put`/`get` and `store`/`load`.
struct Registers {
    bca: [f32; BCA_LENGTH],
    wv: [f32; MAX_MASTERS],
    ndv: [f32; MAX_AXES],
    udv: [f32; MAX_AXES],
}

impl Registers {
    fn new(weight_vector: Option<&[f32]>) -> Self {
        let mut wv = [0.0; MAX_MASTERS];
        if let Some(weights) = weight_vector {
            let n = weights.len().min(MAX_MASTERS);
            wv[..n].copy_from_slice(&weights[..n]);
        }
        Registers {
            bca: [0.0; BCA_LENGTH],
            wv,
            ndv: [0.0; MAX_AXES],
            udv: [0.0; MAX_AXES],
        }
    }

    fn register_mut(&mut self, number: i32) -> Result<&mut [f32], CharStringError> {
        match number {
            0 => Ok(&mut self.wv[..]),
            1 => Ok(&mut self.ndv[..]),
            2 => Ok(&mut self.udv[..]),
            _ => Err(CharStringError::BoundsCheck),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BBox {
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
}

impl BBox {
    fn new() -> Self {
        BBox {
            x_min: f32::MAX,
            y_min: f32::MAX,
            x_max: f32::MIN,
            y_max: f32::MIN,
        }
    }

    fn is_default(&self) -> bool {
        self.x_min == f32::MAX
            && self.y_min == f32::MAX
            && self.x_max == f32::MIN
            && self.y_max == f32::MIN
    }

    fn extend_by(&mut self, x: f32, y: f32) {
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.x_max = self.x_max.max(x);
        self.y_max = self.y_max.max(y);
    }

    fn to_rect(&self) -> Option<RectF> {
        if self.is_default() {
            None
        } else {
            Some(RectF::from_points(
                vec2f(self.x_min, self.y_min),
                vec2f(self.x_max, self.y_max),
            ))
        }
    }
}

struct Machine<'m, 'data, S: PathSink> {
    flavor: CharStringFlavor,
    dispatch: &'static Dispatch,
    params: &'m GlyphParams<'m, 'data>,
    sink: &'m mut S,
    stack: ArgumentsStack<'m, f32>,
    call_stack: CallStack<'data>,
    flags: StateFlags,
    x: f32,
    y: f32,
    bbox: BBox,
    // Advance and sidebearing from hsbw/sbw; the Type 2 family instead
    // records the stack-borne width operand in `width`.
    advance: Vector2F,
    side_bearing: Vector2F,
    width: f32,
    stem_count: usize,
    hstem_edge: f32,
    vstem_edge: f32,
    regs: Registers,
    rand_state: u32,
    // Type 1 othersubr machinery
    ps_stack: TinyVec<[f32; 4]>,
    flex_points: TinyVec<[(f32, f32); 8]>,
    flex_active: bool,
}

/// Interpret one glyph charstring.
///
/// Decodes `char_string` according to `flavor`, reporting path and hint
/// events to `sink` and returning the glyph's metrics. Any error is fatal
/// for this glyph only; the caller decides whether to substitute a `.notdef`
/// outline, skip the glyph, or abort the font pass.
pub fn interpret<'data, S: PathSink>(
    char_string: &'data [u8],
    flavor: CharStringFlavor,
    params: &GlyphParams<'_, 'data>,
    sink: &mut S,
) -> Result<GlyphMetrics, CharStringError> {
    let mut storage = vec![0.0; flavor.max_operands()];
    let mut machine = Machine {
        flavor,
        dispatch: flavor.dispatch(),
        params,
        sink,
        stack: ArgumentsStack {
            len: 0,
            max_len: storage.len(),
            data: &mut storage,
        },
        call_stack: CallStack::new(flavor.max_call_depth()),
        flags: StateFlags::empty(),
        x: 0.,
        y: 0.,
        bbox: BBox::new(),
        advance: Vector2F::zero(),
        side_bearing: Vector2F::zero(),
        width: 0.,
        stem_count: 0,
        hstem_edge: 0.,
        vstem_edge: 0.,
        regs: Registers::new(params.weight_vector),
        rand_state: params.random_seed as u32,
        ps_stack: TinyVec::new(),
        flex_points: TinyVec::new(),
        flex_active: false,
    };
    machine.run(char_string)?;
    Ok(machine.finish())
}

impl<'m, 'data, S: PathSink> Machine<'m, 'data, S> {
    fn run(&mut self, char_string: &'data [u8]) -> Result<(), CharStringError> {
        let mut s = ReadScope::new(char_string).ctxt();
        loop {
            if !s.bytes_available() {
                // Falling off the end of a subroutine is an implicit return.
                match self.call_stack.pop() {
                    Some(frame) => {
                        self.sink.exit_subr();
                        s = frame;
                        continue;
                    }
                    None => break,
                }
            }

            let b0 = s.read_u8()?;
            let op = match self.dispatch.single[usize::from(b0)] {
                OpCode::Escape => {
                    debug_assert_eq!(b0, TWO_BYTE_OPERATOR_MARK);
                    let b1 = s.read_u8()?;
                    self.dispatch.escape[usize::from(b1)]
                }
                op => op,
            };

            match op {
                OpCode::Reserved => return Err(CharStringError::ReservedOperator),
                OpCode::Escape => unreachable!("escape of escape"),

                // Numbers
                OpCode::Num1 => self.stack.push(parse_int1(b0))?,
                OpCode::Num2Pos => self.stack.push(parse_int2(b0, &mut s)?)?,
                OpCode::Num2Neg => self.stack.push(parse_int3(b0, &mut s)?)?,
                OpCode::Short16 => self.stack.push(parse_short16(&mut s)?)?,
                OpCode::ShftShort => self.stack.push(parse_shftshort(&mut s)?)?,
                OpCode::Long32 => self.stack.push(parse_long32(&mut s)?)?,
                OpCode::Fixed16 => self.stack.push(parse_fixed(&mut s)?)?,

                // Hints
                OpCode::HStem | OpCode::HStemHm => self.stems(StemDirection::Horizontal)?,
                OpCode::VStem | OpCode::VStemHm => self.stems(StemDirection::Vertical)?,
                OpCode::HStem3 => self.stems3(StemDirection::Horizontal)?,
                OpCode::VStem3 => self.stems3(StemDirection::Vertical)?,
                OpCode::HintMask => self.hint_mask(MaskKind::Hint, &mut s)?,
                OpCode::CntrMask => self.hint_mask(MaskKind::Counter, &mut s)?,
                OpCode::DotSection => self.stack.clear(),

                // Path construction
                OpCode::RMoveTo => self.parse_move_to()?,
                OpCode::HMoveTo => self.parse_horizontal_move_to()?,
                OpCode::VMoveTo => self.parse_vertical_move_to()?,
                OpCode::RLineTo => self.parse_line_to()?,
                OpCode::HLineTo => self.parse_horizontal_line_to()?,
                OpCode::VLineTo => self.parse_vertical_line_to()?,
                OpCode::RRCurveTo => self.parse_curve_to()?,
                OpCode::RCurveLine => self.parse_curve_line()?,
                OpCode::RLineCurve => self.parse_line_curve()?,
                OpCode::VVCurveTo => self.parse_vv_curve_to()?,
                OpCode::HHCurveTo => self.parse_hh_curve_to()?,
                OpCode::VHCurveTo => self.parse_vh_curve_to()?,
                OpCode::HVCurveTo => self.parse_hv_curve_to()?,
                OpCode::ClosePath => {
                    self.close_subpath();
                    self.stack.clear();
                }

                // Flex
                OpCode::HFlex => self.parse_hflex()?,
                OpCode::Flex => self.parse_flex()?,
                OpCode::HFlex1 => self.parse_hflex1()?,
                OpCode::Flex1 => self.parse_flex1()?,

                // Metrics and termination
                OpCode::Hsbw => self.hsbw()?,
                OpCode::Sbw => self.sbw()?,
                OpCode::Seac => {
                    self.seac()?;
                    if s.bytes_available() {
                        return Err(CharStringError::DataAfterEndChar);
                    }
                    break;
                }
                OpCode::EndChar => {
                    self.end_char()?;
                    if s.bytes_available() {
                        return Err(CharStringError::DataAfterEndChar);
                    }
                    break;
                }

                // Subroutines
                OpCode::CallSubr | OpCode::CallGsubr | OpCode::CallGrel => {
                    let subr = self.resolve_subr(op)?;
                    self.call_stack.push(s.clone())?;
                    s = ReadScope::new(subr).ctxt();
                }
                OpCode::Return => match self.call_stack.pop() {
                    Some(frame) => {
                        self.sink.exit_subr();
                        s = frame;
                    }
                    // A return in the outermost charstring ends interpretation;
                    // the missing-endchar check below rejects it.
                    None => break,
                },
                OpCode::CallOtherSubr => self.call_othersubr()?,
                OpCode::Pop => {
                    let value = self.ps_stack.pop().unwrap_or_else(|| {
                        warn!("pop from an empty othersubr result stack");
                        0.0
                    });
                    self.stack.push(value)?;
                }
                OpCode::SetCurrentPoint => self.set_current_point()?,

                // Arithmetic, logic, and stack manipulation
                OpCode::And => self.binary_op(|a, b| ((a != 0.) && (b != 0.)) as i32 as f32)?,
                OpCode::Or => self.binary_op(|a, b| ((a != 0.) || (b != 0.)) as i32 as f32)?,
                OpCode::Not => self.unary_op(|a| (a == 0.) as i32 as f32)?,
                OpCode::Abs => self.unary_op(f32::abs)?,
                OpCode::Add => self.binary_op(|a, b| a + b)?,
                OpCode::Sub => self.binary_op(|a, b| a - b)?,
                OpCode::Div => self.div()?,
                OpCode::Neg => self.unary_op(|a| -a)?,
                OpCode::Eq => self.binary_op(|a, b| (a == b) as i32 as f32)?,
                OpCode::Drop => {
                    self.require(1)?;
                    let _ = self.stack.pop();
                }
                OpCode::Put => self.put()?,
                OpCode::Get => self.get()?,
                OpCode::IfElse => self.if_else()?,
                OpCode::Random => {
                    let value = self.next_random();
                    self.stack.push(value)?;
                }
                OpCode::Mul => self.binary_op(|a, b| a * b)?,
                OpCode::Sqrt => self.unary_op(|a| a.abs().sqrt())?,
                OpCode::Dup => self.stack.dup_top()?,
                OpCode::Exch => self.stack.exch()?,
                OpCode::Index => {
                    self.require(1)?;
                    let i = i32::try_num_from(self.stack.pop())
                        .ok_or(CharStringError::InvalidArgumentsStackLength)?;
                    self.stack.copy_from_top(i)?;
                }
                OpCode::Roll => {
                    self.require(2)?;
                    let j = i32::try_num_from(self.stack.pop())
                        .ok_or(CharStringError::InvalidArgumentsStackLength)?;
                    let n = i32::try_num_from(self.stack.pop())
                        .ok_or(CharStringError::InvalidArgumentsStackLength)?;
                    self.stack.roll(n, j)?;
                }
                OpCode::Store => self.store()?,
                OpCode::Load => self.load()?,
                OpCode::Blend => self.blend()?,
            }

            if self.flags.contains(StateFlags::ENDED) {
                // Pending subroutine frames are abandoned, not resumed.
                break;
            }
        }

        if !self.flags.contains(StateFlags::ENDED) {
            return Err(CharStringError::MissingEndChar);
        }

        Ok(())
    }

    fn finish(self) -> GlyphMetrics {
        let advance = if self.flavor.has_stack_width() {
            let width = if self.flags.contains(StateFlags::WIDTH_DONE) {
                self.params.nominal_width_x + self.width
            } else {
                self.params.default_width_x
            };
            vec2f(width, 0.)
        } else {
            self.advance
        };

        GlyphMetrics {
            advance,
            left_side_bearing: self.side_bearing,
            bounds: self.bbox.to_rect(),
        }
    }

    fn require(&self, n: usize) -> Result<(), CharStringError> {
        if self.stack.len() < n {
            Err(CharStringError::InvalidArgumentsStackLength)
        } else {
            Ok(())
        }
    }

    // Sink wrappers accumulating the bounding box

    fn move_to_abs(&mut self) {
        self.bbox.extend_by(self.x, self.y);
        self.sink.move_to(vec2f(self.x, self.y));
    }

    fn line_to_abs(&mut self) {
        self.bbox.extend_by(self.x, self.y);
        self.sink.line_to(vec2f(self.x, self.y));
    }

    fn curve_to_abs(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, flex: bool) {
        self.bbox.extend_by(x1, y1);
        self.bbox.extend_by(x2, y2);
        self.bbox.extend_by(self.x, self.y);
        self.sink.curve_to(
            LineSegment2F::new(vec2f(x1, y1), vec2f(x2, y2)),
            vec2f(self.x, self.y),
            flex,
        );
    }

    fn close_subpath(&mut self) {
        if self.flags.contains(StateFlags::OPEN) {
            self.flags.remove(StateFlags::OPEN);
            self.sink.close();
        }
    }

    // Width handling (Type 2 family)

    /// Consume a leading width operand if `cond` holds, returning the stack
    /// offset at which the operator's own arguments begin.
    fn handle_width(&mut self, cond: bool) -> usize {
        if self.flavor.has_stack_width() && cond && !self.flags.contains(StateFlags::WIDTH_DONE) {
            self.flags.insert(StateFlags::WIDTH_DONE);
            self.width = self.stack.at(0);
            1
        } else {
            0
        }
    }

    // Hints

    fn stems(&mut self, direction: StemDirection) -> Result<(), CharStringError> {
        // If the stack length is uneven, then the first value is a width.
        let offset = self.handle_width(self.stack.len().is_odd());

        if self.flavor == CharStringFlavor::Type1 {
            // Type 1 stems carry one (edge, width) pair per operator, with
            // the edge relative to the sidebearing origin.
            self.require(offset + 2)?;
            let low = self.stack.at(offset);
            let width = self.stack.at(offset + 1);
            let origin = match direction {
                StemDirection::Horizontal => self.side_bearing.y(),
                StemDirection::Vertical => self.side_bearing.x(),
            };
            self.sink.hint_stem(direction, origin + low, width);
            self.stem_count += 1;
        } else {
            self.stem_pairs(direction, offset);
        }

        self.stack.clear();
        Ok(())
    }

    /// Type 1 `hstem3`/`vstem3`: three stems relative to the sidebearing.
    fn stems3(&mut self, direction: StemDirection) -> Result<(), CharStringError> {
        if self.stack.len() != 6 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        let origin = match direction {
            StemDirection::Horizontal => self.side_bearing.y(),
            StemDirection::Vertical => self.side_bearing.x(),
        };
        for (low, width) in self.stack.all().iter().copied().tuples() {
            self.sink.hint_stem(direction, origin + low, width);
        }
        self.stem_count += 3;
        self.stack.clear();
        Ok(())
    }

    /// Consume Type 2 stem pairs as (delta from the running edge, width),
    /// reporting each as an absolute stem.
    fn stem_pairs(&mut self, direction: StemDirection, offset: usize) {
        let mut edge = match direction {
            StemDirection::Horizontal => self.hstem_edge,
            StemDirection::Vertical => self.vstem_edge,
        };

        for (delta, width) in self.stack.all()[offset..].iter().copied().tuples() {
            edge += delta;
            self.sink.hint_stem(direction, edge, width);
            // Ghost hints still advance the running edge by their sentinel
            // width, matching the delta encoding in the font.
            edge += width;
            self.stem_count += 1;
        }

        match direction {
            StemDirection::Horizontal => self.hstem_edge = edge,
            StemDirection::Vertical => self.vstem_edge = edge,
        }
    }

    fn hint_mask(
        &mut self,
        kind: MaskKind,
        s: &mut ReadCtxt<'data>,
    ) -> Result<(), CharStringError> {
        // Operands left on the stack are an implicit vstem list.
        let offset = self.handle_width(self.stack.len().is_odd());
        self.stem_pairs(StemDirection::Vertical, offset);
        self.stack.clear();

        if self.stem_count > MAX_STEMS {
            return Err(CharStringError::ParseError(ParseError::LimitExceeded));
        }

        let len = (self.stem_count + 7) >> 3;
        let bytes = s.read_slice(len)?;
        // The mask is handed to the sink as a copy so the charstring bytes
        // are never retained past the callback.
        let mut mask: ArrayVec<[u8; MAX_STEMS / 8]> = ArrayVec::new();
        mask.extend_from_slice(bytes);
        self.sink.hint_mask(kind, &mask);
        Ok(())
    }

    // Path construction. Argument layouts follow Adobe Technical Note #5177.

    fn start_subpath(&mut self) {
        self.close_subpath();
        self.flags.insert(StateFlags::MOVED | StateFlags::OPEN);
        self.move_to_abs();
    }

    fn parse_move_to(&mut self) -> Result<(), CharStringError> {
        // dx1 dy1
        if self.flex_active {
            return self.flex_point();
        }

        let offset = self.handle_width(self.stack.len() == 3);
        if self.stack.len() != offset + 2 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        self.x += self.stack.at(offset);
        self.y += self.stack.at(offset + 1);
        self.start_subpath();

        self.stack.clear();
        Ok(())
    }

    fn parse_horizontal_move_to(&mut self) -> Result<(), CharStringError> {
        // dx1
        let offset = self.handle_width(self.stack.len() == 2);
        if self.stack.len() != offset + 1 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        self.x += self.stack.at(offset);
        self.start_subpath();

        self.stack.clear();
        Ok(())
    }

    fn parse_vertical_move_to(&mut self) -> Result<(), CharStringError> {
        // dy1
        let offset = self.handle_width(self.stack.len() == 2);
        if self.stack.len() != offset + 1 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        self.y += self.stack.at(offset);
        self.start_subpath();

        self.stack.clear();
        Ok(())
    }

    fn parse_line_to(&mut self) -> Result<(), CharStringError> {
        // {dxa dya}+
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len().is_odd() || self.stack.is_empty() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() {
            self.x += self.stack.at(i);
            self.y += self.stack.at(i + 1);
            self.line_to_abs();
            i += 2;
        }

        self.stack.clear();
        Ok(())
    }

    fn parse_horizontal_line_to(&mut self) -> Result<(), CharStringError> {
        // dx1 {dya dxb}*
        //     {dxa dyb}+
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.is_empty() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() {
            self.x += self.stack.at(i);
            i += 1;
            self.line_to_abs();

            if i == self.stack.len() {
                break;
            }

            self.y += self.stack.at(i);
            i += 1;
            self.line_to_abs();
        }

        self.stack.clear();
        Ok(())
    }

    fn parse_vertical_line_to(&mut self) -> Result<(), CharStringError> {
        // dy1 {dxa dyb}*
        //     {dya dxb}+
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.is_empty() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() {
            self.y += self.stack.at(i);
            i += 1;
            self.line_to_abs();

            if i == self.stack.len() {
                break;
            }

            self.x += self.stack.at(i);
            i += 1;
            self.line_to_abs();
        }

        self.stack.clear();
        Ok(())
    }

    fn parse_curve_to(&mut self) -> Result<(), CharStringError> {
        // {dxa dya dxb dyb dxc dyc}+
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() % 6 != 0 || self.stack.is_empty() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() {
            let x1 = self.x + self.stack.at(i);
            let y1 = self.y + self.stack.at(i + 1);
            let x2 = x1 + self.stack.at(i + 2);
            let y2 = y1 + self.stack.at(i + 3);
            self.x = x2 + self.stack.at(i + 4);
            self.y = y2 + self.stack.at(i + 5);

            self.curve_to_abs(x1, y1, x2, y2, false);
            i += 6;
        }

        self.stack.clear();
        Ok(())
    }

    fn parse_curve_line(&mut self) -> Result<(), CharStringError> {
        // {dxa dya dxb dyb dxc dyc}+ dxd dyd
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() < 8 || (self.stack.len() - 2) % 6 != 0 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() - 2 {
            let x1 = self.x + self.stack.at(i);
            let y1 = self.y + self.stack.at(i + 1);
            let x2 = x1 + self.stack.at(i + 2);
            let y2 = y1 + self.stack.at(i + 3);
            self.x = x2 + self.stack.at(i + 4);
            self.y = y2 + self.stack.at(i + 5);

            self.curve_to_abs(x1, y1, x2, y2, false);
            i += 6;
        }

        self.x += self.stack.at(i);
        self.y += self.stack.at(i + 1);
        self.line_to_abs();

        self.stack.clear();
        Ok(())
    }

    fn parse_line_curve(&mut self) -> Result<(), CharStringError> {
        // {dxa dya}+ dxb dyb dxc dyc dxd dyd
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() < 8 || (self.stack.len() - 6).is_odd() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() - 6 {
            self.x += self.stack.at(i);
            self.y += self.stack.at(i + 1);

            self.line_to_abs();
            i += 2;
        }

        let x1 = self.x + self.stack.at(i);
        let y1 = self.y + self.stack.at(i + 1);
        let x2 = x1 + self.stack.at(i + 2);
        let y2 = y1 + self.stack.at(i + 3);
        self.x = x2 + self.stack.at(i + 4);
        self.y = y2 + self.stack.at(i + 5);
        self.curve_to_abs(x1, y1, x2, y2, false);

        self.stack.clear();
        Ok(())
    }

    fn parse_hh_curve_to(&mut self) -> Result<(), CharStringError> {
        // dy1? {dxa dxb dyb dxc}+
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        let mut i = 0;

        // The odd argument count indicates an Y position.
        if self.stack.len().is_odd() {
            self.y += self.stack.at(0);
            i += 1;
        }

        if (self.stack.len() - i) % 4 != 0 || self.stack.len() == i {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        while i < self.stack.len() {
            let x1 = self.x + self.stack.at(i);
            let y1 = self.y;
            let x2 = x1 + self.stack.at(i + 1);
            let y2 = y1 + self.stack.at(i + 2);
            self.x = x2 + self.stack.at(i + 3);
            self.y = y2;

            self.curve_to_abs(x1, y1, x2, y2, false);
            i += 4;
        }

        self.stack.clear();
        Ok(())
    }

    fn parse_vv_curve_to(&mut self) -> Result<(), CharStringError> {
        // dx1? {dya dxb dyb dyc}+
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        let mut i = 0;

        // The odd argument count indicates an X position.
        if self.stack.len().is_odd() {
            self.x += self.stack.at(0);
            i += 1;
        }

        if (self.stack.len() - i) % 4 != 0 || self.stack.len() == i {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        while i < self.stack.len() {
            let x1 = self.x;
            let y1 = self.y + self.stack.at(i);
            let x2 = x1 + self.stack.at(i + 1);
            let y2 = y1 + self.stack.at(i + 2);
            self.x = x2;
            self.y = y2 + self.stack.at(i + 3);

            self.curve_to_abs(x1, y1, x2, y2, false);
            i += 4;
        }

        self.stack.clear();
        Ok(())
    }

    fn parse_hv_curve_to(&mut self) -> Result<(), CharStringError> {
        // dx1 dx2 dy2 dy3 {dya dxb dyb dxc dxd dxe dye dyf}* dxf?
        //                 {dxa dxb dyb dyc dyd dxe dye dxf}+ dyf?
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() < 4 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        self.stack.reverse();
        while !self.stack.is_empty() {
            if self.stack.len() < 4 {
                return Err(CharStringError::InvalidArgumentsStackLength);
            }

            let x1 = self.x + self.stack.pop();
            let y1 = self.y;
            let x2 = x1 + self.stack.pop();
            let y2 = y1 + self.stack.pop();
            self.y = y2 + self.stack.pop();
            self.x = x2
                + if self.stack.len() == 1 {
                    self.stack.pop()
                } else {
                    0.0
                };
            self.curve_to_abs(x1, y1, x2, y2, false);
            if self.stack.is_empty() {
                break;
            }

            if self.stack.len() < 4 {
                return Err(CharStringError::InvalidArgumentsStackLength);
            }

            let x1 = self.x;
            let y1 = self.y + self.stack.pop();
            let x2 = x1 + self.stack.pop();
            let y2 = y1 + self.stack.pop();
            self.x = x2 + self.stack.pop();
            self.y = y2
                + if self.stack.len() == 1 {
                    self.stack.pop()
                } else {
                    0.0
                };
            self.curve_to_abs(x1, y1, x2, y2, false);
        }

        debug_assert!(self.stack.is_empty());
        Ok(())
    }

    fn parse_vh_curve_to(&mut self) -> Result<(), CharStringError> {
        // dy1 dx2 dy2 dx3 {dxa dxb dyb dyc dyd dxe dye dxf}* dyf?
        //                 {dya dxb dyb dxc dxd dxe dye dyf}+ dxf?
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() < 4 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        self.stack.reverse();
        while !self.stack.is_empty() {
            if self.stack.len() < 4 {
                return Err(CharStringError::InvalidArgumentsStackLength);
            }

            let x1 = self.x;
            let y1 = self.y + self.stack.pop();
            let x2 = x1 + self.stack.pop();
            let y2 = y1 + self.stack.pop();
            self.x = x2 + self.stack.pop();
            self.y = y2
                + if self.stack.len() == 1 {
                    self.stack.pop()
                } else {
                    0.0
                };
            self.curve_to_abs(x1, y1, x2, y2, false);
            if self.stack.is_empty() {
                break;
            }

            if self.stack.len() < 4 {
                return Err(CharStringError::InvalidArgumentsStackLength);
            }

            let x1 = self.x + self.stack.pop();
            let y1 = self.y;
            let x2 = x1 + self.stack.pop();
            let y2 = y1 + self.stack.pop();
            self.y = y2 + self.stack.pop();
            self.x = x2
                + if self.stack.len() == 1 {
                    self.stack.pop()
                } else {
                    0.0
                };
            self.curve_to_abs(x1, y1, x2, y2, false);
        }

        debug_assert!(self.stack.is_empty());
        Ok(())
    }

    // Flex. Each variant expands to exactly two flex-tagged curves.

    fn parse_flex(&mut self) -> Result<(), CharStringError> {
        // dx1 dy1 dx2 dy2 dx3 dy3 dx4 dy4 dx5 dy5 dx6 dy6 fd
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() != 13 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let dx1 = self.x + self.stack.at(0);
        let dy1 = self.y + self.stack.at(1);
        let dx2 = dx1 + self.stack.at(2);
        let dy2 = dy1 + self.stack.at(3);
        let dx3 = dx2 + self.stack.at(4);
        let dy3 = dy2 + self.stack.at(5);
        let dx4 = dx3 + self.stack.at(6);
        let dy4 = dy3 + self.stack.at(7);
        let dx5 = dx4 + self.stack.at(8);
        let dy5 = dy4 + self.stack.at(9);
        self.x = dx5 + self.stack.at(10);
        self.y = dy5 + self.stack.at(11);
        self.flex_curves(dx1, dy1, dx2, dy2, dx3, dy3, dx4, dy4, dx5, dy5);

        self.stack.clear();
        Ok(())
    }

    fn parse_flex1(&mut self) -> Result<(), CharStringError> {
        // dx1 dy1 dx2 dy2 dx3 dy3 dx4 dy4 dx5 dy5 d6
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() != 11 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let dx1 = self.x + self.stack.at(0);
        let dy1 = self.y + self.stack.at(1);
        let dx2 = dx1 + self.stack.at(2);
        let dy2 = dy1 + self.stack.at(3);
        let dx3 = dx2 + self.stack.at(4);
        let dy3 = dy2 + self.stack.at(5);
        let dx4 = dx3 + self.stack.at(6);
        let dy4 = dy3 + self.stack.at(7);
        let dx5 = dx4 + self.stack.at(8);
        let dy5 = dy4 + self.stack.at(9);

        // The dominant axis takes the literal final delta; the other axis
        // returns to its starting value.
        if (dx5 - self.x).abs() > (dy5 - self.y).abs() {
            self.x = dx5 + self.stack.at(10);
        } else {
            self.y = dy5 + self.stack.at(10);
        }

        self.flex_curves(dx1, dy1, dx2, dy2, dx3, dy3, dx4, dy4, dx5, dy5);

        self.stack.clear();
        Ok(())
    }

    fn parse_hflex(&mut self) -> Result<(), CharStringError> {
        // dx1 dx2 dy2 dx3 dx4 dx5 dx6
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() != 7 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let dx1 = self.x + self.stack.at(0);
        let dy1 = self.y;
        let dx2 = dx1 + self.stack.at(1);
        let dy2 = dy1 + self.stack.at(2);
        let dx3 = dx2 + self.stack.at(3);
        let dy3 = dy2;
        let dx4 = dx3 + self.stack.at(4);
        let dy4 = dy2;
        let dx5 = dx4 + self.stack.at(5);
        let dy5 = self.y;
        self.x = dx5 + self.stack.at(6);
        self.flex_curves(dx1, dy1, dx2, dy2, dx3, dy3, dx4, dy4, dx5, dy5);

        self.stack.clear();
        Ok(())
    }

    fn parse_hflex1(&mut self) -> Result<(), CharStringError> {
        // dx1 dy1 dx2 dy2 dx3 dx4 dx5 dy5 dx6
        if !self.flags.contains(StateFlags::MOVED) {
            return Err(CharStringError::MissingMoveTo);
        }

        if self.stack.len() != 9 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let dx1 = self.x + self.stack.at(0);
        let dy1 = self.y + self.stack.at(1);
        let dx2 = dx1 + self.stack.at(2);
        let dy2 = dy1 + self.stack.at(3);
        let dx3 = dx2 + self.stack.at(4);
        let dy3 = dy2;
        let dx4 = dx3 + self.stack.at(5);
        let dy4 = dy2;
        let dx5 = dx4 + self.stack.at(6);
        let dy5 = dy4 + self.stack.at(7);
        self.x = dx5 + self.stack.at(8);
        self.flex_curves(dx1, dy1, dx2, dy2, dx3, dy3, dx4, dy4, dx5, dy5);

        self.stack.clear();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn flex_curves(
        &mut self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        x3: f32,
        y3: f32,
        x4: f32,
        y4: f32,
        x5: f32,
        y5: f32,
    ) {
        let (end_x, end_y) = (self.x, self.y);
        self.x = x3;
        self.y = y3;
        self.curve_to_abs(x1, y1, x2, y2, true);
        self.x = end_x;
        self.y = end_y;
        self.curve_to_abs(x4, y4, x5, y5, true);
    }

    // Metrics and termination

    fn hsbw(&mut self) -> Result<(), CharStringError> {
        // sbx wx
        if self.stack.len() != 2 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        let sbx = self.stack.at(0);
        let wx = self.stack.at(1);
        self.side_bearing = vec2f(sbx, 0.);
        self.advance = vec2f(wx, 0.);
        self.x = sbx;
        self.y = 0.;
        self.flags.insert(StateFlags::WIDTH_DONE);
        self.stack.clear();
        Ok(())
    }

    fn sbw(&mut self) -> Result<(), CharStringError> {
        // sbx sby wx wy
        if self.stack.len() != 4 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        let sbx = self.stack.at(0);
        let sby = self.stack.at(1);
        self.side_bearing = vec2f(sbx, sby);
        self.advance = vec2f(self.stack.at(2), self.stack.at(3));
        self.x = sbx;
        self.y = sby;
        self.flags.insert(StateFlags::WIDTH_DONE);
        self.stack.clear();
        Ok(())
    }

    /// Type 1 accent composition. Packages the request for the caller and
    /// ends the glyph.
    fn seac(&mut self) -> Result<(), CharStringError> {
        // asb adx ady bchar achar
        if self.stack.len() != 5 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        let accent_code = u8::try_num_from(self.stack.pop())
            .ok_or(CharStringError::InvalidArgumentsStackLength)?;
        let base_code = u8::try_num_from(self.stack.pop())
            .ok_or(CharStringError::InvalidArgumentsStackLength)?;
        let ady = self.stack.pop();
        let adx = self.stack.pop();
        let asb = self.stack.pop();

        // The accent origin is adjusted by the difference between this
        // glyph's sidebearing and the accent's standard sidebearing.
        let adx = adx + self.side_bearing.x() - asb;

        self.close_subpath();
        self.sink.compose(adx, ady, base_code, accent_code);
        self.flags.insert(StateFlags::ENDED);
        self.sink.end_char();
        Ok(())
    }

    fn end_char(&mut self) -> Result<(), CharStringError> {
        if self.flavor.has_stack_width() {
            if self.stack.len() == 4
                || (!self.flags.contains(StateFlags::WIDTH_DONE) && self.stack.len() == 5)
            {
                // Accent composition via the deprecated seac-like form.
                let accent_code = u8::try_num_from(self.stack.pop())
                    .ok_or(CharStringError::InvalidArgumentsStackLength)?;
                let base_code = u8::try_num_from(self.stack.pop())
                    .ok_or(CharStringError::InvalidArgumentsStackLength)?;
                let ady = self.stack.pop();
                let adx = self.stack.pop();

                if !self.flags.contains(StateFlags::WIDTH_DONE) && !self.stack.is_empty() {
                    self.width = self.stack.pop();
                    self.flags.insert(StateFlags::WIDTH_DONE);
                }

                self.sink.compose(adx, ady, base_code, accent_code);
            } else if self.stack.len() == 1 && !self.flags.contains(StateFlags::WIDTH_DONE) {
                self.width = self.stack.pop();
                self.flags.insert(StateFlags::WIDTH_DONE);
            }
        }

        self.close_subpath();
        self.flags.insert(StateFlags::ENDED);
        self.sink.end_char();
        self.stack.clear();
        Ok(())
    }

    // Subroutines

    fn resolve_subr(&mut self, op: OpCode) -> Result<&'data [u8], CharStringError> {
        if self.stack.is_empty() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        if self.call_stack.depth() == self.call_stack.max_depth {
            return Err(CharStringError::NestingLimitReached);
        }

        let operand = self.stack.pop();
        let (index, subrs): (usize, &Index<'data>) = match op {
            OpCode::CallSubr => {
                let subrs = self
                    .params
                    .local_subrs
                    .ok_or(CharStringError::NoLocalSubroutines)?;
                let bias = self.flavor.subr_bias(subrs.count);
                (conv_subroutine_index(operand, bias)?, subrs)
            }
            OpCode::CallGsubr => {
                let subrs = self
                    .params
                    .global_subrs
                    .ok_or(CharStringError::NoGlobalSubroutines)?;
                let bias = self.flavor.subr_bias(subrs.count);
                (conv_subroutine_index(operand, bias)?, subrs)
            }
            OpCode::CallGrel => {
                // Relative global call: unbiased, offset from the configured
                // library base.
                let subrs = self
                    .params
                    .global_subrs
                    .ok_or(CharStringError::NoGlobalSubroutines)?;
                let index = conv_subroutine_index(operand, 0)?
                    .checked_add(self.params.cube_base)
                    .ok_or(CharStringError::InvalidSubroutineIndex)?;
                (index, subrs)
            }
            _ => unreachable!("not a subroutine call"),
        };

        let char_string = subrs
            .read_object(index)
            .ok_or(CharStringError::InvalidSubroutineIndex)?;
        self.sink.enter_subr(match op {
            OpCode::CallSubr => SubroutineIndex::Local(index),
            _ => SubroutineIndex::Global(index),
        });
        Ok(char_string)
    }

    // Type 1 othersubrs. Only the flex and hint-replacement conventions have
    // interpreter-visible behavior; anything else passes its arguments
    // through to the `pop` result stack.

    fn call_othersubr(&mut self) -> Result<(), CharStringError> {
        self.require(2)?;
        let othersubr = i32::try_num_from(self.stack.pop())
            .ok_or(CharStringError::InvalidArgumentsStackLength)?;
        let n = i32::try_num_from(self.stack.pop())
            .ok_or(CharStringError::InvalidArgumentsStackLength)?;
        let n = usize::try_from(n).map_err(|_| CharStringError::InvalidArgumentsStackLength)?;
        self.require(n)?;

        match othersubr {
            OTHERSUBR_FLEX_END => {
                if n != 3 || self.flex_points.len() != FLEX_POINT_COUNT {
                    return Err(CharStringError::InvalidArgumentsStackLength);
                }
                let _y = self.stack.pop();
                let _x = self.stack.pop();
                let _flex_height = self.stack.pop();

                // Points: reference (ignored), then the six points of the
                // two curves.
                let (x1, y1) = self.flex_points[1];
                let (x2, y2) = self.flex_points[2];
                let (x3, y3) = self.flex_points[3];
                let (x4, y4) = self.flex_points[4];
                let (x5, y5) = self.flex_points[5];
                let (end_x, end_y) = self.flex_points[6];
                self.x = x3;
                self.y = y3;
                self.curve_to_abs(x1, y1, x2, y2, true);
                self.x = end_x;
                self.y = end_y;
                self.curve_to_abs(x4, y4, x5, y5, true);

                self.flex_active = false;
                self.flex_points.clear();

                // The conventional trailer is `pop pop setcurrentpoint`;
                // leave the end point for the two pops.
                self.ps_stack.clear();
                self.ps_stack.push(end_y);
                self.ps_stack.push(end_x);
            }
            OTHERSUBR_FLEX_BEGIN => {
                if n != 0 {
                    return Err(CharStringError::InvalidArgumentsStackLength);
                }
                self.flex_active = true;
                self.flex_points.clear();
            }
            OTHERSUBR_FLEX_POINT => {
                // The point itself was collected by the preceding rmoveto.
                for _ in 0..n {
                    let _ = self.stack.pop();
                }
            }
            OTHERSUBR_HINT_REPLACEMENT => {
                // `subr# 1 3 callothersubr pop callsubr` — hand the
                // subroutine number back for the following pop.
                self.ps_stack.clear();
                for _ in 0..n {
                    let value = self.stack.pop();
                    self.ps_stack.push(value);
                }
            }
            _ => {
                warn!("unknown othersubr {}, flushing {} arguments", othersubr, n);
                self.ps_stack.clear();
                for _ in 0..n {
                    let value = self.stack.pop();
                    self.ps_stack.push(value);
                }
            }
        }
        Ok(())
    }

    /// Collect one flex point from an rmoveto seen while flex is active.
    fn flex_point(&mut self) -> Result<(), CharStringError> {
        if self.stack.len() != 2 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        if self.flex_points.len() == FLEX_POINT_COUNT {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        self.x += self.stack.at(0);
        self.y += self.stack.at(1);
        self.flex_points.push((self.x, self.y));
        self.stack.clear();
        Ok(())
    }

    fn set_current_point(&mut self) -> Result<(), CharStringError> {
        // x y
        if self.stack.len() != 2 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        self.x = self.stack.at(0);
        self.y = self.stack.at(1);
        self.stack.clear();
        Ok(())
    }

    // Arithmetic, registers, and blending

    fn unary_op(&mut self, f: impl FnOnce(f32) -> f32) -> Result<(), CharStringError> {
        self.require(1)?;
        let a = self.stack.pop();
        self.stack.push(f(a))
    }

    fn binary_op(&mut self, f: impl FnOnce(f32, f32) -> f32) -> Result<(), CharStringError> {
        self.require(2)?;
        let b = self.stack.pop();
        let a = self.stack.pop();
        self.stack.push(f(a, b))
    }

    fn div(&mut self) -> Result<(), CharStringError> {
        self.require(2)?;
        let b = self.stack.pop();
        let a = self.stack.pop();
        if b == 0. {
            return Err(CharStringError::DivideByZero);
        }
        self.stack.push(a / b)
    }

    fn if_else(&mut self) -> Result<(), CharStringError> {
        self.require(4)?;
        let v2 = self.stack.pop();
        let v1 = self.stack.pop();
        let s2 = self.stack.pop();
        let s1 = self.stack.pop();
        self.stack.push(if v1 <= v2 { s1 } else { s2 })
    }

    fn put(&mut self) -> Result<(), CharStringError> {
        self.require(2)?;
        let idx_val = self.stack.pop();
        let i = self.bca_index(idx_val)?;
        let value = self.stack.pop();
        self.regs.bca[i] = value;
        Ok(())
    }

    fn get(&mut self) -> Result<(), CharStringError> {
        self.require(1)?;
        let idx_val = self.stack.pop();
        let i = self.bca_index(idx_val)?;
        self.stack.push(self.regs.bca[i])
    }

    fn bca_index(&self, value: f32) -> Result<usize, CharStringError> {
        let i = i32::try_num_from(value).ok_or(CharStringError::BoundsCheck)?;
        let i = usize::try_from(i).map_err(|_| CharStringError::BoundsCheck)?;
        if i < BCA_LENGTH {
            Ok(i)
        } else {
            Err(CharStringError::BoundsCheck)
        }
    }

    fn store(&mut self) -> Result<(), CharStringError> {
        // regitem j index count
        self.require(4)?;
        let count = self.count_operand()?;
        let idx_val = self.stack.pop();
        let index = self.bca_index(idx_val)?;
        let j = i32::try_num_from(self.stack.pop()).ok_or(CharStringError::BoundsCheck)?;
        let j = usize::try_from(j).map_err(|_| CharStringError::BoundsCheck)?;
        let regitem = i32::try_num_from(self.stack.pop()).ok_or(CharStringError::BoundsCheck)?;

        if index + count > BCA_LENGTH {
            return Err(CharStringError::BoundsCheck);
        }
        let bca = self.regs.bca;
        let register = self.regs.register_mut(regitem)?;
        if j + count > register.len() {
            return Err(CharStringError::BoundsCheck);
        }
        register[j..j + count].copy_from_slice(&bca[index..index + count]);
        Ok(())
    }

    fn load(&mut self) -> Result<(), CharStringError> {
        // regitem index count
        self.require(3)?;
        let count = self.count_operand()?;
        let idx_val = self.stack.pop();
        let index = self.bca_index(idx_val)?;
        let regitem = i32::try_num_from(self.stack.pop()).ok_or(CharStringError::BoundsCheck)?;

        if index + count > BCA_LENGTH {
            return Err(CharStringError::BoundsCheck);
        }
        let register = self.regs.register_mut(regitem)?;
        if count > register.len() {
            return Err(CharStringError::BoundsCheck);
        }
        let values: TinyVec<[f32; MAX_MASTERS]> = register[..count].iter().copied().collect();
        self.regs.bca[index..index + count].copy_from_slice(&values);
        Ok(())
    }

    fn count_operand(&mut self) -> Result<usize, CharStringError> {
        let count = i32::try_num_from(self.stack.pop()).ok_or(CharStringError::BoundsCheck)?;
        usize::try_from(count).map_err(|_| CharStringError::BoundsCheck)
    }

    /// Multiple-master blend. Collapses `n * masters` operands into `n`
    /// values, each the first master's value plus the weighted deltas of
    /// the remaining masters.
    fn blend(&mut self) -> Result<(), CharStringError> {
        let weights = self
            .params
            .weight_vector
            .ok_or(CharStringError::MissingWeightVector)?;
        let k = weights.len();
        if k < 2 {
            return Err(CharStringError::MissingWeightVector);
        }

        self.require(1)?;
        let n = i32::try_num_from(self.stack.pop())
            .ok_or(CharStringError::InvalidArgumentsStackLength)?;
        let n = usize::try_from(n).map_err(|_| CharStringError::InvalidArgumentsStackLength)?;
        self.require(n * k)?;

        let start = self.stack.len() - n * k;
        for i in 0..n {
            let mut value = self.stack.data[start + i];
            for (m, weight) in weights[1..].iter().enumerate() {
                value += self.stack.data[start + n + i * (k - 1) + m] * weight;
            }
            self.stack.data[start + i] = value;
        }
        self.stack.len = start + n;
        Ok(())
    }

    fn next_random(&mut self) -> f32 {
        self.rand_state = self
            .rand_state
            .wrapping_mul(1103515245)
            .wrapping_add(12345);
        let frac = ((self.rand_state >> 16) & 0x7fff) as f32 / 32768.0;
        // random yields a value in (0, 1]
        1.0 - frac
    }
}

/// A sink recording which subroutines a charstring pulls in, for subsetting.
#[derive(Default)]
pub struct UsedSubrs {
    pub local_subr_used: FxHashSet<usize>,
    pub global_subr_used: FxHashSet<usize>,
}

impl PathSink for UsedSubrs {
    fn enter_subr(&mut self, index: SubroutineIndex) {
        match index {
            SubroutineIndex::Local(index) => self.local_subr_used.insert(index),
            SubroutineIndex::Global(index) => self.global_subr_used.insert(index),
        };
    }
}

/// Interpret `char_string` recording the local and global subroutines it uses.
pub fn char_string_used_subrs<'data>(
    char_string: &'data [u8],
    flavor: CharStringFlavor,
    params: &GlyphParams<'_, 'data>,
) -> Result<UsedSubrs, CharStringError> {
    let mut used_subrs = UsedSubrs::default();
    interpret(char_string, flavor, params, &mut used_subrs)?;
    Ok(used_subrs)
}

/// A sink that prints every event, for debugging.
pub struct DebugSink;

impl PathSink for DebugSink {
    fn move_to(&mut self, to: Vector2F) {
        println!("move_to({}, {})", to.x(), to.y());
    }

    fn line_to(&mut self, to: Vector2F) {
        println!("line_to({}, {})", to.x(), to.y());
    }

    fn curve_to(&mut self, ctrl: LineSegment2F, to: Vector2F, flex: bool) {
        println!(
            "curve_to({}, {}, {}, {}, {}, {}){}",
            ctrl.from_x(),
            ctrl.from_y(),
            ctrl.to_x(),
            ctrl.to_y(),
            to.x(),
            to.y(),
            if flex { " flex" } else { "" }
        );
    }

    fn close(&mut self) {
        println!("close()");
    }

    fn hint_stem(&mut self, direction: StemDirection, low_edge: f32, width: f32) {
        println!("hint_stem({:?}, {}, {})", direction, low_edge, width);
    }

    fn hint_mask(&mut self, kind: MaskKind, bytes: &[u8]) {
        println!("hint_mask({:?}, {:02x?})", kind, bytes);
    }

    fn compose(&mut self, adx: f32, ady: f32, base_code: u8, accent_code: u8) {
        println!("compose({}, {}, {}, {})", adx, ady, base_code, accent_code);
    }

    fn end_char(&mut self) {
        println!("end_char()");
    }

    fn enter_subr(&mut self, index: SubroutineIndex) {
        match index {
            SubroutineIndex::Local(index) => println!("callsubr {}", index),
            SubroutineIndex::Global(index) => println!("callgsubr {}", index),
        }
    }

    fn exit_subr(&mut self) {
        println!("return");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;

    #[derive(Debug, PartialEq, Clone)]
    enum Event {
        MoveTo(f32, f32),
        LineTo(f32, f32),
        CurveTo(f32, f32, f32, f32, f32, f32, bool),
        Close,
        Stem(StemDirection, f32, f32),
        Mask(MaskKind, Vec<u8>),
        Compose(f32, f32, u8, u8),
        End,
        EnterSubr(SubroutineIndex),
        ExitSubr,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl PathSink for Recorder {
        fn move_to(&mut self, to: Vector2F) {
            self.events.push(Event::MoveTo(to.x(), to.y()));
        }

        fn line_to(&mut self, to: Vector2F) {
            self.events.push(Event::LineTo(to.x(), to.y()));
        }

        fn curve_to(&mut self, ctrl: LineSegment2F, to: Vector2F, flex: bool) {
            self.events.push(Event::CurveTo(
                ctrl.from_x(),
                ctrl.from_y(),
                ctrl.to_x(),
                ctrl.to_y(),
                to.x(),
                to.y(),
                flex,
            ));
        }

        fn close(&mut self) {
            self.events.push(Event::Close);
        }

        fn hint_stem(&mut self, direction: StemDirection, low_edge: f32, width: f32) {
            self.events.push(Event::Stem(direction, low_edge, width));
        }

        fn hint_mask(&mut self, kind: MaskKind, bytes: &[u8]) {
            self.events.push(Event::Mask(kind, bytes.to_vec()));
        }

        fn compose(&mut self, adx: f32, ady: f32, base_code: u8, accent_code: u8) {
            self.events.push(Event::Compose(adx, ady, base_code, accent_code));
        }

        fn end_char(&mut self) {
            self.events.push(Event::End);
        }

        fn enter_subr(&mut self, index: SubroutineIndex) {
            self.events.push(Event::EnterSubr(index));
        }

        fn exit_subr(&mut self) {
            self.events.push(Event::ExitSubr);
        }
    }

    fn run(
        char_string: &[u8],
        flavor: CharStringFlavor,
        params: &GlyphParams<'_, '_>,
    ) -> Result<(GlyphMetrics, Vec<Event>), CharStringError> {
        let mut sink = Recorder::default();
        let metrics = interpret(char_string, flavor, params, &mut sink)?;
        Ok((metrics, sink.events))
    }

    /// Serialise `objects` as a CFF INDEX with a 1-byte offset size.
    fn build_index(objects: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&u16::try_from(objects.len()).unwrap().to_be_bytes());
        data.push(1); // offSize
        let mut offset = 1usize;
        data.push(1);
        for object in objects {
            offset += object.len();
            data.push(u8::try_from(offset).unwrap());
        }
        for object in objects {
            data.extend_from_slice(object);
        }
        data
    }

    #[test]
    fn square_glyph() {
        // 0 0 rmoveto; 100 0 rlineto; 0 100 rlineto; -100 0 rlineto; endchar
        let cs = [139, 139, 21, 239, 139, 5, 139, 239, 5, 39, 139, 5, 14];
        let params = GlyphParams::new();
        let (metrics, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(
            events,
            vec![
                Event::MoveTo(0., 0.),
                Event::LineTo(100., 0.),
                Event::LineTo(100., 100.),
                Event::LineTo(0., 100.),
                Event::Close,
                Event::End,
            ]
        );
        let bounds = metrics.bounds.unwrap();
        assert_eq!(bounds.origin(), vec2f(0., 0.));
        assert_eq!(bounds.lower_right(), vec2f(100., 100.));
    }

    #[test]
    fn interpretation_is_deterministic() {
        let cs = [139, 139, 21, 239, 139, 5, 139, 239, 5, 39, 139, 5, 14];
        let params = GlyphParams::new();
        let first = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        let second = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(first.1, second.1);
        assert_eq!(first.0.advance, second.0.advance);
    }

    #[test]
    fn width_from_move_to() {
        // 25 10 10 rmoveto; endchar — the extra leading operand is the width
        let cs = [164, 149, 149, 21, 14];
        let mut params = GlyphParams::new();
        params.nominal_width_x = 50.;
        params.default_width_x = 700.;
        let (metrics, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(metrics.advance, vec2f(75., 0.));
        assert_eq!(events[0], Event::MoveTo(10., 10.));
    }

    #[test]
    fn default_width_without_operand() {
        let cs = [149, 149, 21, 14];
        let mut params = GlyphParams::new();
        params.default_width_x = 700.;
        let (metrics, _) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(metrics.advance, vec2f(700., 0.));
    }

    #[test]
    fn width_extracted_at_most_once() {
        // 25 0 50 hstem; 10 10 rmoveto; 60 endchar — the stray endchar
        // operand must not be consumed as a second width
        let cs = [164, 139, 189, 1, 149, 149, 21, 199, 14];
        let mut params = GlyphParams::new();
        params.nominal_width_x = 100.;
        let (metrics, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(metrics.advance, vec2f(125., 0.));
        assert_eq!(events[0], Event::Stem(StemDirection::Horizontal, 0., 50.));
    }

    #[test]
    fn nine_stems_two_mask_bytes() {
        let cs = [
            139, 149, 149, 149, 149, 149, 18, // 3 hstems
            139, 149, 149, 149, 149, 149, 23, // 3 vstems
            139, 149, 149, 149, 149, 149, 19, 0xAA, 0x01, // 3 implicit vstems + hintmask
            139, 139, 21, // 0 0 rmoveto
            14, // endchar
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        let stems = events
            .iter()
            .filter(|event| matches!(event, Event::Stem(..)))
            .count();
        assert_eq!(stems, 9);
        // ceil(9 / 8) mask bytes were consumed from the charstring, leaving
        // the cursor positioned exactly at the following rmoveto
        assert!(events.contains(&Event::Mask(MaskKind::Hint, vec![0xAA, 0x01])));
        assert!(events.contains(&Event::MoveTo(0., 0.)));
    }

    #[test]
    fn stem_edges_accumulate() {
        // 0 10 10 10 hstem declares stems at 0..10 and 20..30
        let cs = [139, 149, 149, 149, 1, 139, 139, 21, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[0], Event::Stem(StemDirection::Horizontal, 0., 10.));
        assert_eq!(events[1], Event::Stem(StemDirection::Horizontal, 20., 10.));
    }

    #[test]
    fn ghost_hint_width_passes_through() {
        // 100 -21 hstem
        let cs = [239, 118, 1, 139, 139, 21, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[0], Event::Stem(StemDirection::Horizontal, 100., -21.));
    }

    #[test]
    fn seac_style_endchar() {
        // adx ady bchar achar endchar
        let cs = [142, 143, 204, 236, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events, vec![Event::Compose(3., 4., 65, 97), Event::End]);
    }

    #[test]
    fn flex1_x_dominant() {
        let cs = [
            139, 139, 21, // 0 0 rmoveto
            149, 149, 149, 129, 149, 149, 149, 129, 149, 149, 149, 12, 37, // flex1
            14,
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(
            events,
            vec![
                Event::MoveTo(0., 0.),
                Event::CurveTo(10., 10., 20., 0., 30., 10., true),
                // x takes the literal final delta, y returns to its start
                Event::CurveTo(40., 0., 50., 10., 60., 0., true),
                Event::Close,
                Event::End,
            ]
        );
    }

    #[test]
    fn flex1_y_dominant() {
        // Deltas transposed from the x-dominant case
        let cs = [
            139, 139, 21, //
            149, 149, 129, 149, 149, 149, 129, 149, 149, 149, 149, 12, 37, //
            14,
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(
            events,
            vec![
                Event::MoveTo(0., 0.),
                Event::CurveTo(10., 10., 0., 20., 10., 30., true),
                Event::CurveTo(0., 40., 10., 50., 0., 60., true),
                Event::Close,
                Event::End,
            ]
        );
    }

    #[test]
    fn hflex_keeps_baseline() {
        // hflex: dx1 dx2 dy2 dx3 dx4 dx5 dx6
        let cs = [
            139, 139, 21, //
            149, 149, 159, 149, 149, 149, 149, 12, 34, //
            14,
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(
            events[1],
            Event::CurveTo(10., 0., 20., 20., 30., 20., true)
        );
        assert_eq!(
            events[2],
            Event::CurveTo(40., 20., 50., 0., 60., 0., true)
        );
    }

    #[test]
    fn subroutine_recursion_limit() {
        // Subroutine i calls subroutine i + 1, eleven levels deep; the call
        // that would create the eleventh frame must fail
        let bodies: Vec<Vec<u8>> = (0..10)
            .map(|i| vec![32 + i as u8 + 1, 10])
            .chain(std::iter::once(vec![14]))
            .collect();
        let objects: Vec<&[u8]> = bodies.iter().map(|body| body.as_slice()).collect();
        let index_data = build_index(&objects);
        let index = ReadScope::new(&index_data).read::<Index<'_>>().unwrap();
        let mut params = GlyphParams::new();
        params.local_subrs = Some(&index);

        let cs = [32, 10, 14];
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::NestingLimitReached
        );
    }

    #[test]
    fn subroutine_nesting_to_the_limit_succeeds() {
        // Ten frames is exactly the Type 2 limit
        let bodies: Vec<Vec<u8>> = (0..9)
            .map(|i| vec![32 + i as u8 + 1, 10])
            .chain(std::iter::once(vec![11]))
            .collect();
        let objects: Vec<&[u8]> = bodies.iter().map(|body| body.as_slice()).collect();
        let index_data = build_index(&objects);
        let index = ReadScope::new(&index_data).read::<Index<'_>>().unwrap();
        let mut params = GlyphParams::new();
        params.local_subrs = Some(&index);

        let cs = [32, 10, 14];
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        let entered = events
            .iter()
            .filter(|event| matches!(event, Event::EnterSubr(_)))
            .count();
        assert_eq!(entered, 10);
    }

    #[test]
    fn endchar_in_subroutine_abandons_pending_frames() {
        let index_data = build_index(&[&[14u8][..]]);
        let index = ReadScope::new(&index_data).read::<Index<'_>>().unwrap();
        let mut params = GlyphParams::new();
        params.local_subrs = Some(&index);

        // The caller's trailing rmoveto is abandoned, not executed
        let cs = [32, 10, 139, 139, 21];
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(
            events,
            vec![
                Event::EnterSubr(SubroutineIndex::Local(0)),
                Event::End,
            ]
        );
    }

    #[test]
    fn global_subroutine_usage_is_recorded() {
        let index_data = build_index(&[&[139u8, 139, 21][..]]);
        let index = ReadScope::new(&index_data).read::<Index<'_>>().unwrap();
        let mut params = GlyphParams::new();
        params.global_subrs = Some(&index);

        let cs = [32, 29, 14];
        let used = char_string_used_subrs(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert!(used.global_subr_used.contains(&0));
        assert!(used.local_subr_used.is_empty());
    }

    #[test]
    fn unresolved_subroutine_is_fatal() {
        let index_data = build_index(&[&[11u8][..]]);
        let index = ReadScope::new(&index_data).read::<Index<'_>>().unwrap();
        let mut params = GlyphParams::new();
        params.local_subrs = Some(&index);

        // Biased index 5 does not exist
        let cs = [32 + 5, 10, 14];
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::InvalidSubroutineIndex
        );
    }

    #[test]
    fn callgrel_resolves_from_cube_base() {
        let index_data = build_index(&[&[11u8][..], &[139u8, 139, 21][..]]);
        let index = ReadScope::new(&index_data).read::<Index<'_>>().unwrap();
        let mut params = GlyphParams::new();
        params.global_subrs = Some(&index);
        params.cube_base = 1;

        let cs = [139, 2, 14];
        let (_, events) = run(&cs, CharStringFlavor::CubeMM, &params).unwrap();
        assert_eq!(events[0], Event::EnterSubr(SubroutineIndex::Global(1)));
        assert_eq!(events[1], Event::MoveTo(0., 0.));
    }

    #[test]
    fn operand_stack_overflow() {
        let mut cs = vec![139u8; 49];
        cs.push(14);
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::ArgumentsStackLimitReached
        );
    }

    #[test]
    fn type13_operand_capacity_is_larger() {
        let mut cs = vec![139u8; 49];
        cs.extend_from_slice(&[14]);
        let params = GlyphParams::new();
        // 49 operands overflow Type 2 but fit Type 13's 96-deep stack
        assert!(run(&cs, CharStringFlavor::Type13, &params).is_ok());
    }

    #[test]
    fn reserved_opcode_is_fatal() {
        let params = GlyphParams::new();
        assert_eq!(
            run(&[0, 14], CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::ReservedOperator
        );
        // closepath is Type 1 only
        assert_eq!(
            run(&[9, 14], CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::ReservedOperator
        );
        // the Type 2 shortint form does not exist in Type 13
        assert_eq!(
            run(&[28, 0, 5, 14], CharStringFlavor::Type13, &params).unwrap_err(),
            CharStringError::ReservedOperator
        );
    }

    #[test]
    fn type13_number_forms() {
        let cs = [
            233, 0x01, 0x2C, 139, 21, // 300 0 rmoveto (shortint)
            223, 0x00, 0x80, 139, 5, // 64 0 rlineto (shftshort)
            254, 0x00, 0x00, 0x01, 0x2C, 139, 5, // 300 0 rlineto (longint)
            14,
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type13, &params).unwrap();
        assert_eq!(
            events,
            vec![
                Event::MoveTo(300., 0.),
                Event::LineTo(364., 0.),
                Event::LineTo(664., 0.),
                Event::Close,
                Event::End,
            ]
        );
    }

    #[test]
    fn type2_fixed_number() {
        let cs = [255, 0x00, 0x01, 0x00, 0x00, 139, 21, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[0], Event::MoveTo(1., 0.));
    }

    #[test]
    fn type1_hsbw_sets_metrics_and_origin() {
        let cs = [
            179, 248, 136, 13, // 40 500 hsbw
            149, 149, 21, // 10 10 rmoveto
            239, 139, 5, // 100 0 rlineto
            9,  // closepath
            14, // endchar
        ];
        let params = GlyphParams::new();
        let (metrics, events) = run(&cs, CharStringFlavor::Type1, &params).unwrap();
        assert_eq!(metrics.advance, vec2f(500., 0.));
        assert_eq!(metrics.left_side_bearing, vec2f(40., 0.));
        assert_eq!(
            events,
            vec![
                Event::MoveTo(50., 10.),
                Event::LineTo(150., 10.),
                Event::Close,
                Event::End,
            ]
        );
    }

    #[test]
    fn type1_long_number_is_integer() {
        // 255 begins a plain 32-bit integer in Type 1, not a 16.16 fixed
        let cs = [
            139, 139, 13, // 0 0 hsbw
            255, 0x00, 0x00, 0x01, 0x00, 139, 21, // 256 0 rmoveto
            14,
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type1, &params).unwrap();
        assert_eq!(events[0], Event::MoveTo(256., 0.));
    }

    #[test]
    fn type1_seac_packages_composition() {
        let cs = [
            179, 248, 136, 13, // 40 500 hsbw
            159, 239, 189, 204, 236, 12, 6, // 20 100 50 65 97 seac
        ];
        let params = GlyphParams::new();
        let (metrics, events) = run(&cs, CharStringFlavor::Type1, &params).unwrap();
        // adx is adjusted by the difference of the sidebearings
        assert_eq!(events, vec![Event::Compose(120., 50., 65, 97), Event::End]);
        assert_eq!(metrics.advance, vec2f(500., 0.));
    }

    #[test]
    fn type1_stems_are_sidebearing_relative() {
        let cs = [
            179, 248, 136, 13, // 40 500 hsbw
            149, 189, 3, // 10 50 vstem
            139, 139, 21, 14,
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type1, &params).unwrap();
        assert_eq!(events[0], Event::Stem(StemDirection::Vertical, 50., 50.));
    }

    #[test]
    fn type1_othersubr_flex() {
        let mut cs = vec![
            139, 248, 136, 13, // 0 500 hsbw
            239, 239, 21, // 100 100 rmoveto
            139, 140, 12, 16, // 0 1 callothersubr (flex begin)
        ];
        for _ in 0..7 {
            // 10 0 rmoveto; 0 2 callothersubr (flex point)
            cs.extend_from_slice(&[149, 139, 21, 139, 141, 12, 16]);
        }
        cs.extend_from_slice(&[
            189, 247, 62, 239, 142, 139, 12, 16, // 50 170 100 3 0 callothersubr
            12, 17, 12, 17, // pop pop
            12, 33, // setcurrentpoint
            14,
        ]);
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type1, &params).unwrap();
        assert_eq!(
            events,
            vec![
                Event::MoveTo(100., 100.),
                Event::CurveTo(120., 100., 130., 100., 140., 100., true),
                Event::CurveTo(150., 100., 160., 100., 170., 100., true),
                Event::Close,
                Event::End,
            ]
        );
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let cs = [149, 139, 12, 12, 14];
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::DivideByZero
        );
    }

    #[test]
    fn put_get_transient_array() {
        // 24 0 put; 0 get recalls the stored value, which becomes dx
        let cs = [163, 139, 12, 20, 139, 12, 21, 139, 21, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[0], Event::MoveTo(24., 0.));
    }

    #[test]
    fn transient_array_bounds_are_checked() {
        let cs = [179, 12, 21, 14];
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::BoundsCheck
        );
    }

    #[test]
    fn register_store_and_load_round_trip() {
        // Put 50 into BCA[0], store it into NDV[0], load it back into
        // BCA[1], then recall it for use as a coordinate
        let cs = [
            189, 139, 12, 20, // 50 0 put
            140, 139, 139, 140, 12, 8, // 1 0 0 1 store
            140, 140, 140, 12, 13, // 1 1 1 load
            140, 12, 21, // 1 get
            139, 21, // 0 rmoveto
            14,
        ];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[0], Event::MoveTo(50., 0.));
    }

    #[test]
    fn register_number_is_bounds_checked() {
        // regitem 3 does not name a register
        let cs = [142, 139, 140, 12, 13, 14];
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::BoundsCheck
        );
    }

    #[test]
    fn blend_collapses_deltas() {
        // 10 4 1 blend -> 10 + 4 * w[1] = 12; 0 rmoveto
        let cs = [149, 143, 140, 16, 139, 21, 14];
        let weights = [0.5, 0.5];
        let mut params = GlyphParams::new();
        params.weight_vector = Some(&weights);
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[0], Event::MoveTo(12., 0.));
    }

    #[test]
    fn blend_requires_weight_vector() {
        let cs = [149, 143, 140, 16, 14];
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::MissingWeightVector
        );
    }

    #[test]
    fn roll_rotates_the_operand_stack() {
        // 1 2 3; 3 1 roll -> 3 1 2; rmoveto takes 3 as width
        let cs = [140, 141, 142, 142, 140, 12, 30, 21, 14];
        let params = GlyphParams::new();
        let (metrics, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(metrics.advance, vec2f(3., 0.));
        assert_eq!(events[0], Event::MoveTo(1., 2.));
    }

    #[test]
    fn hlineto_alternates_direction() {
        let cs = [139, 139, 21, 149, 159, 169, 6, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(
            events,
            vec![
                Event::MoveTo(0., 0.),
                Event::LineTo(10., 0.),
                Event::LineTo(10., 20.),
                Event::LineTo(40., 20.),
                Event::Close,
                Event::End,
            ]
        );
    }

    #[test]
    fn hhcurveto_with_leading_dy() {
        let cs = [139, 139, 21, 144, 149, 149, 149, 149, 27, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[1], Event::CurveTo(10., 5., 20., 15., 30., 15., false));
    }

    #[test]
    fn vhcurveto_odd_trailing_argument() {
        // dy1 dx2 dy2 dx3 dxf: the extra argument bends the final curve
        let cs = [139, 139, 21, 149, 149, 149, 149, 149, 30, 14];
        let params = GlyphParams::new();
        let (_, events) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(events[1], Event::CurveTo(0., 10., 10., 20., 20., 30., false));
    }

    #[test]
    fn missing_endchar_is_fatal() {
        let cs = [139, 139, 21];
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::MissingEndChar
        );
    }

    #[test]
    fn data_after_endchar_is_fatal() {
        let cs = [14, 139];
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::DataAfterEndChar
        );
    }

    #[test]
    fn path_operator_before_moveto_is_fatal() {
        let cs = [239, 139, 5, 14];
        let params = GlyphParams::new();
        assert_eq!(
            run(&cs, CharStringFlavor::Type2, &params).unwrap_err(),
            CharStringError::MissingMoveTo
        );
    }

    #[test]
    fn random_is_deterministic_and_in_range() {
        let cs = [12, 23, 139, 21, 14];
        let params = GlyphParams::new();
        let (_, first) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        let (_, second) = run(&cs, CharStringFlavor::Type2, &params).unwrap();
        assert_eq!(first, second);
        match first[0] {
            Event::MoveTo(x, _) => assert!(x > 0. && x <= 1.),
            _ => panic!("expected a moveto"),
        }
    }
}
