//! CFF INDEX and DICT handling.
//!
//! Refer to [Technical Note #5176](http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/font/pdfs/5176.CFF.pdf)
//! for more information.
//!
//! This module is the collaborator boundary of the interpreter: it reads the
//! INDEX structures that hold charstrings and subroutines, and the Top,
//! Private, and Font DICTs that supply the font-wide parameters
//! ([`GlyphParams`]) the interpreter needs.

use std::convert::{TryFrom, TryInto};
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder};
use lazy_static::lazy_static;
use tinyvec::{tiny_vec, TinyVec};

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::error::ParseError;

// CFF Spec: An operator may be preceded by up to a maximum of 48 operands.
const MAX_OPERANDS: usize = 48;
const END_OF_FLOAT_FLAG: u8 = 0xf;

const OPERAND_ZERO: [Operand; 1] = [Operand::Integer(0)];
const OFFSET_ZERO: [Operand; 1] = [Operand::Offset(0)];
const DEFAULT_UNDERLINE_POSITION: [Operand; 1] = [Operand::Integer(-100)];
const DEFAULT_UNDERLINE_THICKNESS: [Operand; 1] = [Operand::Integer(50)];
const DEFAULT_CHARSTRING_TYPE: [Operand; 1] = [Operand::Integer(2)];
const DEFAULT_BBOX: [Operand; 4] = [
    Operand::Integer(0),
    Operand::Integer(0),
    Operand::Integer(0),
    Operand::Integer(0),
];
const DEFAULT_CID_COUNT: [Operand; 1] = [Operand::Integer(8720)];
const DEFAULT_BLUE_SHIFT: [Operand; 1] = [Operand::Integer(7)];
const DEFAULT_BLUE_FUZZ: [Operand; 1] = [Operand::Integer(1)];
lazy_static! {
    static ref DEFAULT_FONT_MATRIX: [Operand; 6] = {
        let real_0_001 = Operand::Real(Real(tiny_vec![0x0a, 0x00, 0x1f])); // 0.001
        [
            real_0_001.clone(),
            Operand::Integer(0),
            Operand::Integer(0),
            real_0_001,
            Operand::Integer(0),
            Operand::Integer(0),
        ]
    };
    static ref DEFAULT_BLUE_SCALE: [Operand; 1] =
        [Operand::Real(Real(tiny_vec![0x0a, 0x03, 0x96, 0x25, 0xff]))]; // 0.039625
    static ref DEFAULT_EXPANSION_FACTOR: [Operand; 1] =
        [Operand::Real(Real(tiny_vec![0x0a, 0x06, 0xff]))]; // 0.06
}

/// A CFF INDEX described in Section 5 of Technical Note #5176
#[derive(Clone)]
pub struct Index<'a> {
    pub count: usize,
    off_size: u8,
    offset_array: &'a [u8],
    data_array: &'a [u8],
}

/// A CFF DICT described in Section 4 of Technical Note #5176
#[derive(Clone, Debug)]
pub struct Dict<T>
where
    T: DictDefault,
{
    dict: Vec<(Operator, Vec<Operand>)>,
    default: PhantomData<T>,
}

pub trait DictDefault {
    fn default(op: Operator) -> Option<&'static [Operand]>;
}

#[derive(Clone, Debug)]
pub struct TopDictDefault;

#[derive(Clone, Debug)]
pub struct FontDictDefault;

#[derive(Clone, Debug)]
pub struct PrivateDictDefault;

pub type TopDict = Dict<TopDictDefault>;

pub type FontDict = Dict<FontDictDefault>;

pub type PrivateDict = Dict<PrivateDictDefault>;

#[derive(Debug, PartialEq, Clone)]
pub enum Operand {
    Integer(i32),
    Offset(i32),
    Real(Real),
}

enum Op {
    Operator(Operator),
    Operand(Operand),
}

// A Real stores the bytes of its nibble encoding. Seven bytes inline covers
// every default value and typical font data while keeping Operand small.

/// A real number
///
/// To parse the value into `f64` use the `TryFrom`/`TryInto` impl.
#[derive(Debug, PartialEq, Clone)]
pub struct Real(TinyVec<[u8; 7]>);

#[repr(u16)]
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Operator {
    Version = 0,
    Notice = 1,
    FullName = 2,
    FamilyName = 3,
    Weight = 4,
    FontBBox = 5,
    BlueValues = 6,
    OtherBlues = 7,
    FamilyBlues = 8,
    FamilyOtherBlues = 9,
    StdHW = 10,
    StdVW = 11,
    UniqueID = 13,
    XUID = 14,
    Charset = 15,
    Encoding = 16,
    CharStrings = 17,
    Private = 18,
    Subrs = 19,
    DefaultWidthX = 20,
    NominalWidthX = 21,
    Copyright = op2(0),
    IsFixedPitch = op2(1),
    ItalicAngle = op2(2),
    UnderlinePosition = op2(3),
    UnderlineThickness = op2(4),
    PaintType = op2(5),
    CharstringType = op2(6),
    FontMatrix = op2(7),
    StrokeWidth = op2(8),
    BlueScale = op2(9),
    BlueShift = op2(10),
    BlueFuzz = op2(11),
    StemSnapH = op2(12),
    StemSnapV = op2(13),
    ForceBold = op2(14),
    LanguageGroup = op2(17),
    ExpansionFactor = op2(18),
    InitialRandomSeed = op2(19),
    SyntheticBase = op2(20),
    PostScript = op2(21),
    BaseFontName = op2(22),
    BaseFontBlend = op2(23),
    ROS = op2(30),
    CIDFontVersion = op2(31),
    CIDFontRevision = op2(32),
    CIDFontType = op2(33),
    CIDCount = op2(34),
    UIDBase = op2(35),
    FDArray = op2(36),
    FDSelect = op2(37),
    FontName = op2(38),
}

const fn op2(value: u8) -> u16 {
    (12 << 8) | (value as u16)
}

impl TryFrom<u16> for Operator {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Operator, ParseError> {
        match value {
            0 => Ok(Operator::Version),
            1 => Ok(Operator::Notice),
            2 => Ok(Operator::FullName),
            3 => Ok(Operator::FamilyName),
            4 => Ok(Operator::Weight),
            5 => Ok(Operator::FontBBox),
            6 => Ok(Operator::BlueValues),
            7 => Ok(Operator::OtherBlues),
            8 => Ok(Operator::FamilyBlues),
            9 => Ok(Operator::FamilyOtherBlues),
            10 => Ok(Operator::StdHW),
            11 => Ok(Operator::StdVW),
            13 => Ok(Operator::UniqueID),
            14 => Ok(Operator::XUID),
            15 => Ok(Operator::Charset),
            16 => Ok(Operator::Encoding),
            17 => Ok(Operator::CharStrings),
            18 => Ok(Operator::Private),
            19 => Ok(Operator::Subrs),
            20 => Ok(Operator::DefaultWidthX),
            21 => Ok(Operator::NominalWidthX),
            value if value == op2(0) => Ok(Operator::Copyright),
            value if value == op2(1) => Ok(Operator::IsFixedPitch),
            value if value == op2(2) => Ok(Operator::ItalicAngle),
            value if value == op2(3) => Ok(Operator::UnderlinePosition),
            value if value == op2(4) => Ok(Operator::UnderlineThickness),
            value if value == op2(5) => Ok(Operator::PaintType),
            value if value == op2(6) => Ok(Operator::CharstringType),
            value if value == op2(7) => Ok(Operator::FontMatrix),
            value if value == op2(8) => Ok(Operator::StrokeWidth),
            value if value == op2(9) => Ok(Operator::BlueScale),
            value if value == op2(10) => Ok(Operator::BlueShift),
            value if value == op2(11) => Ok(Operator::BlueFuzz),
            value if value == op2(12) => Ok(Operator::StemSnapH),
            value if value == op2(13) => Ok(Operator::StemSnapV),
            value if value == op2(14) => Ok(Operator::ForceBold),
            value if value == op2(17) => Ok(Operator::LanguageGroup),
            value if value == op2(18) => Ok(Operator::ExpansionFactor),
            value if value == op2(19) => Ok(Operator::InitialRandomSeed),
            value if value == op2(20) => Ok(Operator::SyntheticBase),
            value if value == op2(21) => Ok(Operator::PostScript),
            value if value == op2(22) => Ok(Operator::BaseFontName),
            value if value == op2(23) => Ok(Operator::BaseFontBlend),
            value if value == op2(30) => Ok(Operator::ROS),
            value if value == op2(31) => Ok(Operator::CIDFontVersion),
            value if value == op2(32) => Ok(Operator::CIDFontRevision),
            value if value == op2(33) => Ok(Operator::CIDFontType),
            value if value == op2(34) => Ok(Operator::CIDCount),
            value if value == op2(35) => Ok(Operator::UIDBase),
            value if value == op2(36) => Ok(Operator::FDArray),
            value if value == op2(37) => Ok(Operator::FDSelect),
            value if value == op2(38) => Ok(Operator::FontName),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl<'b> ReadBinary for Index<'b> {
    type HostType<'a> = Index<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let count = usize::from(ctxt.read_u16be()?);

        if count > 0 {
            let off_size = ctxt.read_u8()?;
            if off_size < 1 || off_size > 4 {
                return Err(ParseError::BadValue);
            }

            let offset_array_size = (count + 1) * usize::from(off_size);
            let offset_array = ctxt.read_slice(offset_array_size)?;

            let last_offset = lookup_offset_index(off_size, offset_array, count);
            if last_offset < 1 {
                return Err(ParseError::BadValue);
            }

            let data_array_size = last_offset - 1;
            let data_array = ctxt.read_slice(data_array_size)?;

            Ok(Index {
                count,
                off_size,
                offset_array,
                data_array,
            })
        } else {
            // count == 0
            Ok(Index {
                count,
                off_size: 1,
                offset_array: &[],
                data_array: &[],
            })
        }
    }
}

impl<'a> Index<'a> {
    /// An INDEX with no entries.
    pub fn empty() -> Index<'a> {
        Index {
            count: 0,
            off_size: 1,
            offset_array: &[],
            data_array: &[],
        }
    }

    /// Returns `None` if `index` is out of range or the offset array is
    /// inconsistent with the data it covers.
    pub fn read_object(&self, index: usize) -> Option<&'a [u8]> {
        if index < self.count {
            // INDEX offsets are 1-based; an offset of 0 is malformed
            let start_index =
                lookup_offset_index(self.off_size, self.offset_array, index).checked_sub(1)?;
            let end_index =
                lookup_offset_index(self.off_size, self.offset_array, index + 1).checked_sub(1)?;
            self.data_array.get(start_index..end_index)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.count).filter_map(move |i| self.read_object(i))
    }

    /// Returns the size of the data held by this INDEX.
    pub fn data_len(&self) -> usize {
        self.data_array.len()
    }
}

fn lookup_offset_index(off_size: u8, offset_array: &[u8], index: usize) -> usize {
    let start = index * usize::from(off_size);
    let end = start + usize::from(off_size);
    BigEndian::read_uint(&offset_array[start..end], usize::from(off_size)) as usize
}

impl ReadBinary for Op {
    type HostType<'b> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let b0 = ctxt.read_u8()?;

        match b0 {
            0..=11 | 13..=21 => ok_operator(u16::from(b0).try_into().unwrap()), // NOTE(unwrap): Safe due to pattern
            12 => ok_operator(op2(ctxt.read_u8()?).try_into()?),
            28 => {
                let num = ctxt.read_i16be()?;
                Ok(Op::Operand(Operand::Integer(i32::from(num))))
            }
            29 => ok_int(ctxt.read_i32be()?),
            30 => ok_real(ctxt.read_until_nibble(END_OF_FLOAT_FLAG)?),
            32..=246 => ok_int(i32::from(b0) - 139),
            247..=250 => {
                let b1 = ctxt.read_u8()?;
                ok_int((i32::from(b0) - 247) * 256 + i32::from(b1) + 108)
            }
            251..=254 => {
                let b1 = ctxt.read_u8()?;
                ok_int(-(i32::from(b0) - 251) * 256 - i32::from(b1) - 108)
            }
            22..=27 | 31 | 255 => Err(ParseError::BadValue), // reserved
        }
    }
}

fn ok_operator(op: Operator) -> Result<Op, ParseError> {
    Ok(Op::Operator(op))
}

fn ok_int(num: i32) -> Result<Op, ParseError> {
    Ok(Op::Operand(Operand::Integer(num)))
}

fn ok_real(slice: &[u8]) -> Result<Op, ParseError> {
    Ok(Op::Operand(Operand::Real(Real(TinyVec::from(slice)))))
}

impl<T> ReadBinary for Dict<T>
where
    T: DictDefault,
{
    type HostType<'b> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let mut dict = Vec::new();
        let mut operands = Vec::new();

        while ctxt.bytes_available() {
            match Op::read(ctxt)? {
                Op::Operator(operator) => {
                    integer_to_offset(operator, &mut operands);
                    dict.push((operator, operands.clone()));
                    operands.clear();
                }
                Op::Operand(operand) => {
                    operands.push(operand);
                    if operands.len() > MAX_OPERANDS {
                        return Err(ParseError::LimitExceeded);
                    }
                }
            }
        }

        Ok(Dict {
            dict,
            default: PhantomData,
        })
    }
}

// Special case handling for operands that are offsets. This function swaps them from an
// Integer to an Offset.
fn integer_to_offset(operator: Operator, operands: &mut [Operand]) {
    match (operator, &operands) {
        // Encodings 0..=1 indicate predefined encodings and are not offsets
        (Operator::Encoding, [Operand::Integer(offset)]) if *offset > 1 => {
            operands[0] = Operand::Offset(*offset);
        }
        (Operator::Charset, [Operand::Integer(offset)])
        | (Operator::CharStrings, [Operand::Integer(offset)])
        | (Operator::Subrs, [Operand::Integer(offset)])
        | (Operator::FDArray, [Operand::Integer(offset)])
        | (Operator::FDSelect, [Operand::Integer(offset)]) => {
            operands[0] = Operand::Offset(*offset);
        }
        (Operator::Private, [Operand::Integer(length), Operand::Integer(offset)]) => {
            let offset = *offset;
            operands[0] = Operand::Offset(*length);
            operands[1] = Operand::Offset(offset);
        }
        _ => {}
    }
}

impl DictDefault for TopDictDefault {
    fn default(op: Operator) -> Option<&'static [Operand]> {
        match op {
            Operator::IsFixedPitch => Some(&OPERAND_ZERO),
            Operator::ItalicAngle => Some(&OPERAND_ZERO),
            Operator::UnderlinePosition => Some(&DEFAULT_UNDERLINE_POSITION),
            Operator::UnderlineThickness => Some(&DEFAULT_UNDERLINE_THICKNESS),
            Operator::PaintType => Some(&OPERAND_ZERO),
            Operator::CharstringType => Some(&DEFAULT_CHARSTRING_TYPE),
            Operator::FontMatrix => Some(DEFAULT_FONT_MATRIX.as_ref()),
            Operator::FontBBox => Some(&DEFAULT_BBOX),
            Operator::StrokeWidth => Some(&OPERAND_ZERO),
            Operator::Charset => Some(&OFFSET_ZERO),
            Operator::Encoding => Some(&OFFSET_ZERO),
            Operator::CIDFontVersion => Some(&OPERAND_ZERO),
            Operator::CIDFontRevision => Some(&OPERAND_ZERO),
            Operator::CIDFontType => Some(&OPERAND_ZERO),
            Operator::CIDCount => Some(&DEFAULT_CID_COUNT),
            _ => None,
        }
    }
}

impl DictDefault for FontDictDefault {
    fn default(_op: Operator) -> Option<&'static [Operand]> {
        None
    }
}

impl DictDefault for PrivateDictDefault {
    fn default(op: Operator) -> Option<&'static [Operand]> {
        match op {
            Operator::BlueScale => Some(DEFAULT_BLUE_SCALE.as_ref()),
            Operator::BlueShift => Some(&DEFAULT_BLUE_SHIFT),
            Operator::BlueFuzz => Some(&DEFAULT_BLUE_FUZZ),
            Operator::ForceBold => Some(&OPERAND_ZERO),
            Operator::LanguageGroup => Some(&OPERAND_ZERO),
            Operator::ExpansionFactor => Some(DEFAULT_EXPANSION_FACTOR.as_ref()),
            Operator::InitialRandomSeed => Some(&OPERAND_ZERO),
            Operator::DefaultWidthX => Some(&OPERAND_ZERO),
            Operator::NominalWidthX => Some(&OPERAND_ZERO),
            _ => None,
        }
    }
}

impl<T> Dict<T>
where
    T: DictDefault,
{
    pub fn new() -> Self {
        Dict {
            dict: Vec::new(),
            default: PhantomData,
        }
    }

    pub fn get_with_default(&self, key: Operator) -> Option<&[Operand]> {
        self.get(key).or_else(|| T::default(key))
    }

    pub fn get(&self, key: Operator) -> Option<&[Operand]> {
        self.dict.iter().find_map(|(op, args)| {
            if *op == key {
                Some(args.as_slice())
            } else {
                None
            }
        })
    }

    /// Returns the i32 value of this operator if the operands hold a single Integer.
    pub fn get_i32(&self, key: Operator) -> Option<Result<i32, ParseError>> {
        self.get_with_default(key).map(|operands| match operands {
            [Operand::Integer(number)] => Ok(*number),
            [Operand::Offset(number)] => Ok(*number),
            _ => Err(ParseError::BadValue),
        })
    }

    /// Returns the f64 value of this operator if the operands hold a single number.
    pub fn get_f64(&self, key: Operator) -> Option<Result<f64, ParseError>> {
        self.get_with_default(key).map(|operands| match operands {
            [Operand::Integer(number)] | [Operand::Offset(number)] => Ok(f64::from(*number)),
            [Operand::Real(real)] => f64::try_from(real.clone()),
            _ => Err(ParseError::BadValue),
        })
    }

    /// Returns the operands of a delta-encoded array operator with the deltas
    /// resolved to absolute values.
    pub fn get_deltas(&self, key: Operator) -> Option<Result<Vec<f64>, ParseError>> {
        self.get_with_default(key).map(|operands| {
            let mut values = Vec::with_capacity(operands.len());
            let mut prev = 0.;
            for operand in operands {
                let delta = match operand {
                    Operand::Integer(number) | Operand::Offset(number) => f64::from(*number),
                    Operand::Real(real) => f64::try_from(real.clone())?,
                };
                prev += delta;
                values.push(prev);
            }
            Ok(values)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Operator, Vec<Operand>)> {
        self.dict.iter()
    }

    /// Returns the first operator of this DICT or `None` if the DICT is empty.
    pub fn first_operator(&self) -> Option<Operator> {
        self.iter().next().map(|(operator, _)| *operator)
    }

    /// Read a PrivateDict from this Dict returning it and its offset within `scope` on success.
    ///
    /// A Private DICT is required, but may be specified as having a length of 0 if there are no
    /// non-default values to be stored.
    pub fn read_private_dict(
        &self,
        scope: &ReadScope<'_>,
    ) -> Result<(PrivateDict, usize), ParseError> {
        let (private_dict_offset, private_dict_length) =
            match self.get_with_default(Operator::Private) {
                Some([Operand::Offset(length), Operand::Offset(offset)]) => {
                    Ok((usize::try_from(*offset)?, usize::try_from(*length)?))
                }
                Some(_) => Err(ParseError::BadValue),
                None => Err(ParseError::MissingValue),
            }?;
        scope
            .offset_length(private_dict_offset, private_dict_length)?
            .read::<PrivateDict>()
            .map(|dict| (dict, private_dict_offset))
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }
}

impl<T: DictDefault> Default for Dict<T> {
    fn default() -> Self {
        Dict::new()
    }
}

/// Read the local subr INDEX referenced by a Private DICT.
///
/// Local subrs are stored in an INDEX structure which is located via the offset operand
/// of the Subrs operator in the Private DICT. A font without local subrs has no Subrs
/// operator in the Private DICT. The local subrs offset is relative to the beginning of
/// the Private DICT data.
pub fn read_local_subr_index<'a>(
    scope: &ReadScope<'a>,
    private_dict: &PrivateDict,
    private_dict_offset: usize,
) -> Result<Option<Index<'a>>, ParseError> {
    private_dict
        .get_i32(Operator::Subrs)
        .transpose()?
        .map(|offset| {
            let offset = usize::try_from(offset)?;
            scope
                .offset(private_dict_offset + offset)
                .read::<Index<'_>>()
        })
        .transpose()
}

impl Dict<PrivateDictDefault> {
    pub fn default_width_x(&self) -> Result<f64, ParseError> {
        // NOTE(unwrap): Safe as DefaultWidthX has a default
        self.get_f64(Operator::DefaultWidthX).unwrap()
    }

    pub fn nominal_width_x(&self) -> Result<f64, ParseError> {
        // NOTE(unwrap): Safe as NominalWidthX has a default
        self.get_f64(Operator::NominalWidthX).unwrap()
    }

    pub fn initial_random_seed(&self) -> Result<i32, ParseError> {
        // NOTE(unwrap): Safe as InitialRandomSeed has a default
        self.get_i32(Operator::InitialRandomSeed).unwrap()
    }

    pub fn stem_snap_h(&self) -> Option<Result<Vec<f64>, ParseError>> {
        self.get_deltas(Operator::StemSnapH)
    }

    pub fn stem_snap_v(&self) -> Option<Result<Vec<f64>, ParseError>> {
        self.get_deltas(Operator::StemSnapV)
    }
}

const FLOAT_BUF_LEN: usize = 64;

impl TryFrom<Real> for f64 {
    type Error = ParseError;

    /// Try to parse this `Real` into an `f64`.
    fn try_from(real: Real) -> Result<Self, Self::Error> {
        let mut buf = [0u8; FLOAT_BUF_LEN];
        let mut used = 0;

        for byte in real.0 {
            let nibble1 = byte >> 4;
            let nibble2 = byte & 0xF;

            if nibble1 == END_OF_FLOAT_FLAG {
                break;
            }
            parse_float_nibble(nibble1, &mut used, &mut buf)?;
            if nibble2 == END_OF_FLOAT_FLAG {
                break;
            }
            parse_float_nibble(nibble2, &mut used, &mut buf)?;
        }

        // NOTE(unwrap): Safe as we have constructed the string from only ASCII characters in
        // parse_float_nibble.
        let s = core::str::from_utf8(&buf[..used]).unwrap();
        s.parse().map_err(|_| ParseError::BadValue)
    }
}

// Adobe Technical Note #5176, Table 5 Nibble Definitions
fn parse_float_nibble(nibble: u8, idx: &mut usize, data: &mut [u8]) -> Result<(), ParseError> {
    if *idx == FLOAT_BUF_LEN {
        return Err(ParseError::LimitExceeded);
    }

    match nibble {
        0..=9 => {
            data[*idx] = b'0' + nibble;
        }
        10 => {
            data[*idx] = b'.';
        }
        11 => {
            data[*idx] = b'E';
        }
        12 => {
            if *idx + 1 == FLOAT_BUF_LEN {
                return Err(ParseError::LimitExceeded);
            }

            data[*idx] = b'E';
            *idx += 1;
            data[*idx] = b'-';
        }
        13 => return Err(ParseError::BadValue),
        14 => {
            data[*idx] = b'-';
        }
        _ => return Err(ParseError::BadValue),
    }

    *idx += 1;
    Ok(())
}

/// Font-wide parameters supplied to the interpreter for one glyph.
///
/// These are resolved from the font's DICTs and INDEX structures by the
/// caller. Everything here is read-only; one `GlyphParams` may be shared by
/// any number of concurrently running interpreters.
#[derive(Clone)]
pub struct GlyphParams<'a, 'data> {
    /// Value of `nominalWidthX` from the Private DICT.
    pub nominal_width_x: f32,
    /// Value of `defaultWidthX` from the Private DICT.
    pub default_width_x: f32,
    /// Seed for the `random` operator, from `initialRandomSeed`.
    pub random_seed: i32,
    /// The local Subrs INDEX, if the font has one.
    pub local_subrs: Option<&'a Index<'data>>,
    /// The GlobalSubrs INDEX, if the font has one.
    pub global_subrs: Option<&'a Index<'data>>,
    /// Weight vector for multiple-master blending. Required by `blend`.
    pub weight_vector: Option<&'a [f32]>,
    /// Base index into the GlobalSubrs INDEX for Cube `callgrel` resolution.
    pub cube_base: usize,
}

impl<'a, 'data> GlyphParams<'a, 'data> {
    /// Parameters for a font with no subroutines and default widths.
    pub fn new() -> Self {
        GlyphParams {
            nominal_width_x: 0.,
            default_width_x: 0.,
            random_seed: 0,
            local_subrs: None,
            global_subrs: None,
            weight_vector: None,
            cube_base: 0,
        }
    }

    /// Resolve parameters from a Private DICT and the font's subr INDEXes.
    pub fn from_private_dict(
        private_dict: &PrivateDict,
        local_subrs: Option<&'a Index<'data>>,
        global_subrs: Option<&'a Index<'data>>,
    ) -> Result<Self, ParseError> {
        Ok(GlyphParams {
            nominal_width_x: private_dict.nominal_width_x()? as f32,
            default_width_x: private_dict.default_width_x()? as f32,
            random_seed: private_dict.initial_random_seed()?,
            local_subrs,
            global_subrs,
            weight_vector: None,
            cube_base: 0,
        })
    }
}

impl Default for GlyphParams<'_, '_> {
    fn default() -> Self {
        GlyphParams::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A two entry INDEX: [0x01, 0x02, 0x03] and [0x04]
    const INDEX: &[u8] = &[
        0x00, 0x02, // count
        0x01, // offSize
        0x01, 0x04, 0x05, // offsets
        0x01, 0x02, 0x03, 0x04, // data
    ];

    #[test]
    fn read_index() {
        let index = ReadScope::new(INDEX).read::<Index<'_>>().unwrap();
        assert_eq!(index.count, 2);
        assert_eq!(index.read_object(0), Some(&[0x01, 0x02, 0x03][..]));
        assert_eq!(index.read_object(1), Some(&[0x04][..]));
        assert_eq!(index.read_object(2), None);
    }

    #[test]
    fn read_empty_index() {
        let index = ReadScope::new(&[0x00, 0x00]).read::<Index<'_>>().unwrap();
        assert_eq!(index.count, 0);
        assert_eq!(index.read_object(0), None);
    }

    #[test]
    fn zero_offset_in_index_is_rejected() {
        // Offsets are 1-based; a 0 offset must not underflow
        let data = &[0x00, 0x01, 0x01, 0x00, 0x02, 0xFF];
        let index = ReadScope::new(data).read::<Index<'_>>().unwrap();
        assert_eq!(index.read_object(0), None);
    }

    #[test]
    fn read_private_dict_widths() {
        let data = &[
            28, 0x01, 0xF4, 20, // 500 defaultWidthX
            247, 0xFF, 21, // 363 nominalWidthX
        ];
        let dict = ReadScope::new(data).read::<PrivateDict>().unwrap();
        assert_eq!(dict.default_width_x().unwrap(), 500.);
        assert_eq!(dict.nominal_width_x().unwrap(), 363.);
        // Defaults apply for operators that are absent
        assert_eq!(dict.initial_random_seed().unwrap(), 0);
    }

    #[test]
    fn read_real_operand() {
        // BlueScale 0.5 encoded as 30 [0a 5f]
        let data = &[30, 0x0a, 0x5f, 0x0c, 0x09];
        let dict = ReadScope::new(data).read::<PrivateDict>().unwrap();
        assert_eq!(dict.get_f64(Operator::BlueScale).unwrap().unwrap(), 0.5);
    }

    #[test]
    fn stem_snap_deltas() {
        // StemSnapH [100, 120] delta encoded as 100 20
        let data = &[239, 159, 12, 12];
        let dict = ReadScope::new(data).read::<PrivateDict>().unwrap();
        assert_eq!(dict.stem_snap_h().unwrap().unwrap(), vec![100., 120.]);
    }

    #[test]
    fn local_subrs_offset_is_private_dict_relative() {
        // A 2-byte Private DICT (Subrs at offset 2) followed by the INDEX
        let mut data = vec![141, 19];
        data.extend_from_slice(INDEX);
        let scope = ReadScope::new(&data);
        let dict = scope.offset_length(0, 2).unwrap().read::<PrivateDict>().unwrap();
        let subrs = read_local_subr_index(&scope, &dict, 0).unwrap().unwrap();
        assert_eq!(subrs.count, 2);
        assert_eq!(subrs.read_object(1), Some(&[0x04][..]));
    }

    #[test]
    fn glyph_params_from_private_dict() {
        let data = &[28, 0x01, 0xF4, 20, 247, 0xFF, 21];
        let dict = ReadScope::new(data).read::<PrivateDict>().unwrap();
        let params = GlyphParams::from_private_dict(&dict, None, None).unwrap();
        assert_eq!(params.default_width_x, 500.);
        assert_eq!(params.nominal_width_x, 363.);
        assert_eq!(params.random_seed, 0);
        assert!(params.local_subrs.is_none());
    }
}
