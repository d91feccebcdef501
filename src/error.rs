/*
 * Created on Mon Feb 05 2024
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

use std::{fmt, io};

pub type TableResult<T> = Result<T, TableError>;
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
/// In-memory table errors. All of these are recoverable; none of them leave the
/// table with broken invariants
pub enum TableError {
    /// the key is not present (or, for value-qualified lookups, the stored value
    /// does not match)
    NotFound,
    /// a key, value, record or configuration parameter does not have the
    /// configured length/arity
    InvalidSize,
    /// a record field does not fit the integer width its type code declares, or
    /// a load factor configuration is unusable
    ValueOutOfRange,
    /// a slot index does not resolve to a live entry (it is from an older table
    /// generation, or simply junk)
    InvalidState,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::InvalidSize => write!(f, "key/value size mismatch"),
            Self::ValueOutOfRange => write!(f, "value out of range"),
            Self::InvalidState => write!(f, "stale or invalid slot index"),
        }
    }
}

impl std::error::Error for TableError {}

#[derive(Debug)]
/// Errors raised while reading or writing persisted table streams
pub enum StorageError {
    /// a table-level failure while rebuilding entries
    Table(TableError),
    /// stream read/write failure
    Io(io::Error),
    /// the header is structurally invalid, internally inconsistent, or the
    /// stream ends inside it
    HeaderDecodeCorrupted,
    /// the stream's namespace or format version disagrees with this build
    HeaderDecodeVersionMismatch,
    /// the stream holds a different object kind than the one requested
    HeaderDecodeBadKind,
    /// the header declares a field type code this build does not know
    HeaderDecodeUnknownTypeCode,
    /// the stream payload does not match its checksum trailer
    ChecksumMismatch,
}

enum_impls! {
    StorageError => {
        TableError as Table,
        io::Error as Io,
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(e) => write!(f, "table error: {e}"),
            Self::Io(e) => write!(f, "stream i/o error: {e}"),
            Self::HeaderDecodeCorrupted => write!(f, "corrupted stream header"),
            Self::HeaderDecodeVersionMismatch => {
                write!(f, "incompatible stream namespace or version")
            }
            Self::HeaderDecodeBadKind => write!(f, "stream holds a different object kind"),
            Self::HeaderDecodeUnknownTypeCode => write!(f, "unknown field type code in header"),
            Self::ChecksumMismatch => write!(f, "stream checksum mismatch"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Table(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
