//! Type codec: decodes raw VM cells into engine argument values, driven by an
//! event's `paramTypes` signature.
//!
//! Each tag in the signature produces exactly one argument, but arrays take two
//! raw cells (base address, then element count). Decoding therefore walks two
//! independent indices: the logical slot (position in the signature and in the
//! decoded argument list) and the raw cell cursor.

use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value};

use crate::config::BridgeConfig;
use crate::error::{MarshalError, SignatureError};
use crate::vm::{Cell, UCell, VmMemory, cell_to_float};

/// One entry of a `paramTypes` signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// `s`: VM string address.
    Text,
    /// `d`: signed 32-bit integer.
    Int,
    /// `i`: unsigned 32-bit integer.
    UInt,
    /// `f`: 32-bit float.
    Float,
    /// `a`: integer array (base address + count).
    IntArray,
    /// `v`: float array (base address + count).
    FloatArray,
}

impl TypeTag {
    pub fn from_char(tag: char) -> Option<Self> {
        match tag {
            's' => Some(Self::Text),
            'd' => Some(Self::Int),
            'i' => Some(Self::UInt),
            'f' => Some(Self::Float),
            'a' => Some(Self::IntArray),
            'v' => Some(Self::FloatArray),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Text => 's',
            Self::Int => 'd',
            Self::UInt => 'i',
            Self::Float => 'f',
            Self::IntArray => 'a',
            Self::FloatArray => 'v',
        }
    }

    /// Number of raw VM cells this tag consumes.
    pub fn cells(self) -> usize {
        match self {
            Self::IntArray | Self::FloatArray => 2,
            _ => 1,
        }
    }
}

/// A parsed, immutable `paramTypes` signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamTypes {
    raw: String,
    tags: Vec<TypeTag>,
}

impl ParamTypes {
    pub fn parse(raw: &str) -> Result<Self, SignatureError> {
        let tags = raw
            .chars()
            .enumerate()
            .map(|(position, tag)| {
                TypeTag::from_char(tag).ok_or(SignatureError::UnknownTag { tag, position })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_string(),
            tags,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn tags(&self) -> &[TypeTag] {
        &self.tags
    }

    /// Number of decoded arguments (logical slots).
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Number of raw VM cells a full argument list occupies.
    pub fn cell_count(&self) -> usize {
        self.tags.iter().map(|tag| tag.cells()).sum()
    }
}

impl FromStr for ParamTypes {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ParamTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// How scalar arguments and array counts arrive from the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgPassing {
    /// The cell holds the value itself (public callback path).
    #[default]
    ByValue,
    /// The cell holds the address of the value (native function path).
    ByReference,
}

/// Cursor over raw VM cells that tracks the logical slot separately from the
/// raw cell index.
#[derive(Debug)]
pub struct ArgCursor<'a> {
    cells: &'a [Cell],
    slot: usize,
    cell: usize,
}

impl<'a> ArgCursor<'a> {
    pub fn new(cells: &'a [Cell]) -> Self {
        Self {
            cells,
            slot: 0,
            cell: 0,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn cell(&self) -> usize {
        self.cell
    }

    /// Take the next raw cell for the current slot.
    pub fn take(&mut self) -> Result<Cell, MarshalError> {
        let value = self
            .cells
            .get(self.cell)
            .copied()
            .ok_or(MarshalError::MissingArgument {
                slot: self.slot,
                cell: self.cell,
            })?;
        self.cell += 1;
        Ok(value)
    }

    /// Finish the current slot.
    pub fn advance_slot(&mut self) {
        self.slot += 1;
    }
}

/// Decodes VM cells against one signature.
pub struct Decoder<'a> {
    memory: &'a dyn VmMemory,
    passing: ArgPassing,
    config: &'a BridgeConfig,
}

impl<'a> Decoder<'a> {
    pub fn new(memory: &'a dyn VmMemory, passing: ArgPassing, config: &'a BridgeConfig) -> Self {
        Self {
            memory,
            passing,
            config,
        }
    }

    /// Decode a complete argument list. The first failure aborts decoding.
    pub fn decode_all(&self, types: &ParamTypes, cells: &[Cell]) -> Result<Vec<Value>, MarshalError> {
        let mut cursor = ArgCursor::new(cells);
        let mut args = Vec::with_capacity(types.len());
        for &tag in types.tags() {
            args.push(self.decode(tag, &mut cursor)?);
            cursor.advance_slot();
        }
        Ok(args)
    }

    /// Decode the argument for the cursor's current slot.
    pub fn decode(&self, tag: TypeTag, cursor: &mut ArgCursor<'_>) -> Result<Value, MarshalError> {
        match tag {
            TypeTag::Text => {
                let addr = cursor.take()?;
                self.text(addr)
            }
            TypeTag::Int => Ok(Value::from(self.scalar(cursor)?)),
            TypeTag::UInt => Ok(Value::from(self.scalar(cursor)? as UCell)),
            TypeTag::Float => Ok(float_value(cell_to_float(self.scalar(cursor)?))),
            TypeTag::IntArray => {
                let elements = self.array(cursor)?;
                Ok(Value::Array(elements.iter().map(|&c| Value::from(c)).collect()))
            }
            TypeTag::FloatArray => {
                let elements = self.array(cursor)?;
                Ok(Value::Array(
                    elements
                        .iter()
                        .map(|&c| float_value(cell_to_float(c)))
                        .collect(),
                ))
            }
        }
    }

    fn scalar(&self, cursor: &mut ArgCursor<'_>) -> Result<Cell, MarshalError> {
        let raw = cursor.take()?;
        match self.passing {
            ArgPassing::ByValue => Ok(raw),
            ArgPassing::ByReference => self.memory.deref(raw),
        }
    }

    fn text(&self, addr: Cell) -> Result<Value, MarshalError> {
        let bytes = self.memory.read_string(addr, self.config.max_string_len)?;
        let text = if self.config.strict_utf8 {
            String::from_utf8(bytes).map_err(|_| MarshalError::InvalidUtf8 { addr })?
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };
        Ok(Value::String(text))
    }

    fn array(&self, cursor: &mut ArgCursor<'_>) -> Result<&'a [Cell], MarshalError> {
        let base = cursor.take()?;
        // The element count always lives in the raw cell after the base.
        let count = self.scalar(cursor)?;
        let len = usize::try_from(count).map_err(|_| MarshalError::NegativeLength { len: count })?;
        if len > self.config.max_array_len {
            return Err(MarshalError::ArrayTooLong {
                len,
                max: self.config.max_array_len,
            });
        }
        let memory: &'a dyn VmMemory = self.memory;
        memory.read_array(base, len)
    }
}

/// NaN and infinities have no JSON number form and decode as null.
fn float_value(value: f32) -> Value {
    Number::from_f64(f64::from(value)).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::DataSegment;
    use serde_json::json;

    fn decode(types: &str, mem: &DataSegment, cells: &[Cell]) -> Result<Vec<Value>, MarshalError> {
        let config = BridgeConfig::default();
        let types = ParamTypes::parse(types).unwrap();
        Decoder::new(mem, ArgPassing::ByValue, &config).decode_all(&types, cells)
    }

    #[test]
    fn parse_known_tags() {
        let types = ParamTypes::parse("sdifav").unwrap();
        assert_eq!(types.len(), 6);
        assert_eq!(types.cell_count(), 8);
        assert_eq!(types.as_str(), "sdifav");
        assert_eq!(types.tags()[4], TypeTag::IntArray);
    }

    #[test]
    fn parse_rejects_unknown_tag() {
        assert_eq!(
            ParamTypes::parse("dxs"),
            Err(SignatureError::UnknownTag {
                tag: 'x',
                position: 1
            })
        );
    }

    #[test]
    fn empty_signature_is_valid() {
        let types: ParamTypes = "".parse().unwrap();
        assert!(types.is_empty());
        assert_eq!(types.cell_count(), 0);
    }

    #[test]
    fn tag_chars_round_trip() {
        for c in "sdifav".chars() {
            assert_eq!(TypeTag::from_char(c).unwrap().as_char(), c);
        }
    }

    #[test]
    fn decodes_scalars_and_string() {
        let mut mem = DataSegment::new();
        let s = mem.push_string("hello");
        let f = crate::vm::float_to_cell(3.5);
        let args = decode("sdif", &mem, &[s, 42, 7, f]).unwrap();
        assert_eq!(args, vec![json!("hello"), json!(42), json!(7), json!(3.5)]);
    }

    #[test]
    fn signed_and_unsigned_views_differ() {
        let mem = DataSegment::new();
        let args = decode("di", &mem, &[-1, -1]).unwrap();
        assert_eq!(args, vec![json!(-1), json!(4_294_967_295u32)]);
    }

    #[test]
    fn array_consumes_two_cells() {
        let mut mem = DataSegment::new();
        let base = mem.push_array(&[10, 20, 30]);
        let args = decode("ai", &mem, &[base, 3, 99]).unwrap();
        assert_eq!(args, vec![json!([10, 20, 30]), json!(99)]);
    }

    #[test]
    fn float_array_decodes_floats() {
        let mut mem = DataSegment::new();
        let base = mem.push_floats(&[1.5, -2.25]);
        let args = decode("vd", &mem, &[base, 2, 5]).unwrap();
        assert_eq!(args, vec![json!([1.5, -2.25]), json!(5)]);
    }

    #[test]
    fn cursor_tracks_slots_and_cells_separately() {
        let mut mem = DataSegment::new();
        let base = mem.push_array(&[1]);
        let config = BridgeConfig::default();
        let decoder = Decoder::new(&mem, ArgPassing::ByValue, &config);
        let cells = [base, 1, 8];
        let mut cursor = ArgCursor::new(&cells);

        decoder.decode(TypeTag::IntArray, &mut cursor).unwrap();
        cursor.advance_slot();
        assert_eq!((cursor.slot(), cursor.cell()), (1, 2));

        decoder.decode(TypeTag::Int, &mut cursor).unwrap();
        cursor.advance_slot();
        assert_eq!((cursor.slot(), cursor.cell()), (2, 3));
    }

    #[test]
    fn by_reference_resolves_scalars_and_counts() {
        let mut mem = DataSegment::new();
        let base = mem.push_array(&[4, 5]);
        let count = mem.push_cell(2);
        let int = mem.push_cell(-9);
        let float = mem.push_float(0.5);
        let s = mem.push_string("ref");

        let config = BridgeConfig::default();
        let types = ParamTypes::parse("sadf").unwrap();
        let args = Decoder::new(&mem, ArgPassing::ByReference, &config)
            .decode_all(&types, &[s, base, count, int, float])
            .unwrap();
        assert_eq!(args, vec![json!("ref"), json!([4, 5]), json!(-9), json!(0.5)]);
    }

    #[test]
    fn missing_cells_are_a_fault() {
        let mem = DataSegment::new();
        assert_eq!(
            decode("dd", &mem, &[1]),
            Err(MarshalError::MissingArgument { slot: 1, cell: 1 })
        );
    }

    #[test]
    fn bad_string_address_is_a_fault() {
        let mem = DataSegment::new();
        assert_eq!(
            decode("s", &mem, &[64]),
            Err(MarshalError::InvalidAddress { addr: 64 })
        );
    }

    #[test]
    fn negative_array_count_is_a_fault() {
        let mut mem = DataSegment::new();
        let base = mem.push_array(&[1]);
        assert_eq!(
            decode("a", &mem, &[base, -1]),
            Err(MarshalError::NegativeLength { len: -1 })
        );
    }

    #[test]
    fn array_limit_is_enforced() {
        let mut mem = DataSegment::new();
        let base = mem.push_array(&[1, 2, 3]);
        let config = BridgeConfig {
            max_array_len: 2,
            ..BridgeConfig::default()
        };
        let types = ParamTypes::parse("a").unwrap();
        let err = Decoder::new(&mem, ArgPassing::ByValue, &config)
            .decode_all(&types, &[base, 3])
            .unwrap_err();
        assert_eq!(err, MarshalError::ArrayTooLong { len: 3, max: 2 });
    }

    #[test]
    fn invalid_utf8_is_lossy_unless_strict() {
        let mut mem = DataSegment::new();
        let addr = mem.push_array(&[0xff, b'a' as Cell, 0]);
        assert_eq!(decode("s", &mem, &[addr]).unwrap(), vec![json!("\u{fffd}a")]);

        let config = BridgeConfig {
            strict_utf8: true,
            ..BridgeConfig::default()
        };
        let types = ParamTypes::parse("s").unwrap();
        let err = Decoder::new(&mem, ArgPassing::ByValue, &config)
            .decode_all(&types, &[addr])
            .unwrap_err();
        assert_eq!(err, MarshalError::InvalidUtf8 { addr });
    }

    #[test]
    fn nan_float_decodes_as_null() {
        let mem = DataSegment::new();
        let nan = crate::vm::float_to_cell(f32::NAN);
        assert_eq!(decode("f", &mem, &[nan]).unwrap(), vec![Value::Null]);
    }
}
