/*
 * Created on Mon Feb 12 2024
 *
 * This file is a part of digestmap
 * digestmap is a free and open-source hash table library for fixed-size
 * binary keys and values, written by Sayan Nandan ("the Author") with the
 * vision to provide predictable memory usage for digest-keyed workloads
 * without compromising on performance or reliability.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Structured records
//!
//! A [`RecordShape`] is table-wide metadata: ordered field names with a parallel
//! list of fixed-width integer type codes. A row is the packed little-endian
//! concatenation of its field values; a [`Record`] is the unpacked view, tied to
//! its shape so fields can be read back by name or by position.


use {
    crate::error::{TableError, TableResult},
    std::{fmt, ops::Index, sync::Arc},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
/// A fixed-width little-endian integer encoding. The letter convention follows
/// the usual packed-struct notation: `B`/`H`/`I`/`Q` for unsigned 8/16/32/64
/// bit, the lower case letters for their signed counterparts
pub enum FieldCode {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl FieldCode {
    /// The letter this code is written as in persisted headers
    pub const fn letter(&self) -> u8 {
        match self {
            Self::U8 => b'B',
            Self::U16 => b'H',
            Self::U32 => b'I',
            Self::U64 => b'Q',
            Self::I8 => b'b',
            Self::I16 => b'h',
            Self::I32 => b'i',
            Self::I64 => b'q',
        }
    }
    /// Decode a header letter. Unknown letters must be rejected by callers
    pub const fn from_letter(letter: u8) -> Option<Self> {
        Some(match letter {
            b'B' => Self::U8,
            b'H' => Self::U16,
            b'I' => Self::U32,
            b'Q' => Self::U64,
            b'b' => Self::I8,
            b'h' => Self::I16,
            b'i' => Self::I32,
            b'q' => Self::I64,
            _ => return None,
        })
    }
    /// Encoded width in bytes
    pub const fn width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::U64 | Self::I64 => 8,
        }
    }
    pub const fn signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }
    /// Pack `value` into `out` (which must be exactly [`FieldCode::width`]
    /// bytes). A value of the wrong class or outside the encodable range fails
    /// with [`TableError::ValueOutOfRange`]
    fn encode(self, value: FieldValue, out: &mut [u8]) -> TableResult<()> {
        debug_assert_eq!(out.len(), self.width());
        match (self, value) {
            (Self::U8, FieldValue::UInt(x)) if x <= u8::MAX as u64 => out[0] = x as u8,
            (Self::U16, FieldValue::UInt(x)) if x <= u16::MAX as u64 => {
                out.copy_from_slice(&(x as u16).to_le_bytes())
            }
            (Self::U32, FieldValue::UInt(x)) if x <= u32::MAX as u64 => {
                out.copy_from_slice(&(x as u32).to_le_bytes())
            }
            (Self::U64, FieldValue::UInt(x)) => out.copy_from_slice(&x.to_le_bytes()),
            (Self::I8, FieldValue::SInt(x)) if x >= i8::MIN as i64 && x <= i8::MAX as i64 => {
                out[0] = x as i8 as u8
            }
            (Self::I16, FieldValue::SInt(x)) if x >= i16::MIN as i64 && x <= i16::MAX as i64 => {
                out.copy_from_slice(&(x as i16).to_le_bytes())
            }
            (Self::I32, FieldValue::SInt(x)) if x >= i32::MIN as i64 && x <= i32::MAX as i64 => {
                out.copy_from_slice(&(x as i32).to_le_bytes())
            }
            (Self::I64, FieldValue::SInt(x)) => out.copy_from_slice(&x.to_le_bytes()),
            _ => return Err(TableError::ValueOutOfRange),
        }
        Ok(())
    }
    /// Range/class check without writing anything
    fn check(self, value: FieldValue) -> TableResult<()> {
        let ok = match (self, value) {
            (Self::U8, FieldValue::UInt(x)) => x <= u8::MAX as u64,
            (Self::U16, FieldValue::UInt(x)) => x <= u16::MAX as u64,
            (Self::U32, FieldValue::UInt(x)) => x <= u32::MAX as u64,
            (Self::U64, FieldValue::UInt(_)) => true,
            (Self::I8, FieldValue::SInt(x)) => x >= i8::MIN as i64 && x <= i8::MAX as i64,
            (Self::I16, FieldValue::SInt(x)) => x >= i16::MIN as i64 && x <= i16::MAX as i64,
            (Self::I32, FieldValue::SInt(x)) => x >= i32::MIN as i64 && x <= i32::MAX as i64,
            (Self::I64, FieldValue::SInt(_)) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(TableError::ValueOutOfRange)
        }
    }
    /// Unpack one value from `raw` (which must be exactly [`FieldCode::width`]
    /// bytes)
    fn decode(self, raw: &[u8]) -> FieldValue {
        debug_assert_eq!(raw.len(), self.width());
        let mut word = [0u8; 8];
        word[..raw.len()].copy_from_slice(raw);
        let unsigned = u64::from_le_bytes(word);
        match self {
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => FieldValue::UInt(unsigned),
            Self::I8 => FieldValue::SInt(raw[0] as i8 as i64),
            Self::I16 => FieldValue::SInt(unsigned as u16 as i16 as i64),
            Self::I32 => FieldValue::SInt(unsigned as u32 as i32 as i64),
            Self::I64 => FieldValue::SInt(unsigned as i64),
        }
    }
}

impl fmt::Display for FieldCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter() as char)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// One field value. Unsigned and signed fields are kept apart so that range
/// checks are exact for the full 64-bit widths
pub enum FieldValue {
    UInt(u64),
    SInt(i64),
}

enum_impls! {
    FieldValue => {
        u8 as UInt,
        u16 as UInt,
        u32 as UInt,
        u64 as UInt,
        i8 as SInt,
        i16 as SInt,
        i32 as SInt,
        i64 as SInt,
    }
}

impl FieldValue {
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(x) => Some(*x),
            Self::SInt(_) => None,
        }
    }
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SInt(x) => Some(*x),
            Self::UInt(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(x) => write!(f, "{x}"),
            Self::SInt(x) => write!(f, "{x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The shape of a structured value: ordered, unique field names and the
/// parallel type codes. The packed width of the shape is the `value_size` of
/// the table that stores its rows
pub struct RecordShape {
    fields: Box<[Box<str>]>,
    codes: Box<[FieldCode]>,
    width: usize,
}

impl RecordShape {
    /// Define a shape from parallel field name / type code lists. Fails with
    /// [`TableError::InvalidSize`] if the lists are empty, differ in length, or
    /// a name is empty or repeated
    pub fn new(fields: &[&str], codes: &[FieldCode]) -> TableResult<Self> {
        if fields.is_empty() || fields.len() != codes.len() {
            return Err(TableError::InvalidSize);
        }
        for (at, field) in fields.iter().enumerate() {
            if field.is_empty() || fields[..at].contains(field) {
                return Err(TableError::InvalidSize);
            }
        }
        Ok(Self {
            fields: fields.iter().map(|f| Box::from(*f)).collect(),
            codes: codes.into(),
            width: codes.iter().map(FieldCode::width).sum(),
        })
    }
    /// Number of fields
    pub fn arity(&self) -> usize {
        self.codes.len()
    }
    /// Packed row width in bytes
    pub const fn width(&self) -> usize {
        self.width
    }
    pub fn field_name(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(|f| &**f)
    }
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| &**f)
    }
    pub fn codes(&self) -> &[FieldCode] {
        &self.codes
    }
    /// Position of the field called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| &**f == name)
    }
    /// Pack `values` (in declared field order) into `row`. Nothing is written
    /// unless every value fits
    pub fn pack(&self, values: &[FieldValue], row: &mut [u8]) -> TableResult<()> {
        if values.len() != self.arity() || row.len() != self.width {
            return Err(TableError::InvalidSize);
        }
        // validate before the first write so a failed pack leaves `row` intact
        for (code, value) in self.codes.iter().zip(values) {
            code.check(*value)?;
        }
        let mut at = 0;
        for (code, value) in self.codes.iter().zip(values) {
            let width = code.width();
            code.encode(*value, &mut row[at..at + width])?;
            at += width;
        }
        Ok(())
    }
    /// Unpack a packed row
    pub fn unpack(&self, row: &[u8]) -> TableResult<Box<[FieldValue]>> {
        if row.len() != self.width {
            return Err(TableError::InvalidSize);
        }
        Ok(self.decode_row(row))
    }
    /// Unpack a row whose width is already known to match (rows coming out of
    /// the backing table always do)
    pub(crate) fn decode_row(&self, row: &[u8]) -> Box<[FieldValue]> {
        debug_assert_eq!(row.len(), self.width);
        let mut values = Vec::with_capacity(self.arity());
        let mut at = 0;
        for code in self.codes.iter() {
            let width = code.width();
            values.push(code.decode(&row[at..at + width]));
            at += width;
        }
        values.into_boxed_slice()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An unpacked structured value: the ordered field values plus a handle to the
/// shape they were unpacked with
pub struct Record {
    shape: Arc<RecordShape>,
    values: Box<[FieldValue]>,
}

impl Record {
    pub(crate) fn new(shape: Arc<RecordShape>, values: Box<[FieldValue]>) -> Self {
        debug_assert_eq!(values.len(), shape.arity());
        Self { shape, values }
    }
    /// The shape this record was read with
    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }
    /// The field values, in declared order
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
    /// Read a field by name
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.shape.position(name).map(|at| self.values[at])
    }
}

impl Index<usize> for Record {
    type Output = FieldValue;
    fn index(&self, position: usize) -> &Self::Output {
        &self.values[position]
    }
}
