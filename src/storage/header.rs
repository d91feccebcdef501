/*
 * Created on Sun Feb 18 2024
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

use {
    crate::{
        error::{StorageError, StorageResult},
        record::{FieldCode, RecordShape},
        structured::StructuredTable,
        table::HashTable,
    },
    serde::{Deserialize, Serialize},
};

/// Namespace tag every stream written by this crate carries
pub const NAMESPACE: &str = "digestmap";
/// Format major version this build writes and accepts
pub const FORMAT_VERSION: u32 = 1;
/// Stream kind tag for a raw [`HashTable`]
pub const KIND_RAW: &str = "raw";
/// Stream kind tag for a [`StructuredTable`]
pub const KIND_STRUCTURED: &str = "structured";

/*
    The header is one msgpack map with string keys (we serialize the struct in
    named mode, not as a tuple) so the stream stays self-describing; the entry
    payload that follows it is raw packed records with no per-entry framing.
    `value_size` is carried even though the structured format implies it: it
    lets the raw loader size its buffers and gives the structured loader a
    cheap consistency check.
*/

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct StreamHeader {
    pub namespace: String,
    pub version: u32,
    pub kind: String,
    pub key_size: u64,
    pub value_size: u64,
    pub value_fields: Vec<String>,
    pub value_format: Vec<String>,
    pub count: u64,
}

impl StreamHeader {
    pub fn for_raw(table: &HashTable) -> Self {
        Self {
            namespace: NAMESPACE.to_owned(),
            version: FORMAT_VERSION,
            kind: KIND_RAW.to_owned(),
            key_size: table.key_size() as u64,
            value_size: table.value_size() as u64,
            value_fields: vec![],
            value_format: vec![],
            count: table.len() as u64,
        }
    }
    pub fn for_structured(table: &StructuredTable) -> Self {
        let shape = table.shape();
        Self {
            namespace: NAMESPACE.to_owned(),
            version: FORMAT_VERSION,
            kind: KIND_STRUCTURED.to_owned(),
            key_size: table.key_size() as u64,
            value_size: shape.width() as u64,
            value_fields: shape.field_names().map(str::to_owned).collect(),
            value_format: shape
                .codes()
                .iter()
                .map(|code| (code.letter() as char).to_string())
                .collect(),
            count: table.len() as u64,
        }
    }
    /// The exact byte length of this header on the wire
    pub fn encoded_len(&self) -> usize {
        // serializing a plain owned struct to a vec cannot fail
        rmp_serde::to_vec_named(self).map_or(0, |bytes| bytes.len())
    }
    /// Reject streams this build cannot read: foreign namespaces, other format
    /// majors, and streams holding a different object kind
    pub fn validate(&self, expected_kind: &str) -> StorageResult<()> {
        if self.namespace != NAMESPACE || self.version != FORMAT_VERSION {
            return Err(StorageError::HeaderDecodeVersionMismatch);
        }
        if self.kind != expected_kind {
            return Err(StorageError::HeaderDecodeBadKind);
        }
        if self.kind == KIND_RAW && !(self.value_fields.is_empty() && self.value_format.is_empty())
        {
            return Err(StorageError::HeaderDecodeCorrupted);
        }
        Ok(())
    }
    /// Rebuild the row shape a structured stream declares
    pub fn shape(&self) -> StorageResult<RecordShape> {
        if self.value_fields.is_empty() || self.value_fields.len() != self.value_format.len() {
            return Err(StorageError::HeaderDecodeCorrupted);
        }
        let mut codes = Vec::with_capacity(self.value_format.len());
        for letter in self.value_format.iter() {
            let &[letter] = letter.as_bytes() else {
                return Err(StorageError::HeaderDecodeUnknownTypeCode);
            };
            match FieldCode::from_letter(letter) {
                Some(code) => codes.push(code),
                None => return Err(StorageError::HeaderDecodeUnknownTypeCode),
            }
        }
        let fields: Vec<&str> = self.value_fields.iter().map(String::as_str).collect();
        let shape =
            RecordShape::new(&fields, &codes).map_err(|_| StorageError::HeaderDecodeCorrupted)?;
        if shape.width() as u64 != self.value_size {
            return Err(StorageError::HeaderDecodeCorrupted);
        }
        Ok(shape)
    }
}
