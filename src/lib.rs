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

//! # digestmap
//!
//! An in-memory associative container specialized for fixed-size binary keys and
//! fixed-size binary values. The container is aimed at workloads where keys are
//! already uniformly distributed digests (for example 256-bit content hashes) and
//! values are small fixed-width records; for these workloads it needs noticeably
//! less memory than a general purpose map and has a fully predictable layout.
//!
//! Two layers are exposed:
//! - [`HashTable`]: a raw open-addressed table mapping key bytes to value bytes
//! - [`StructuredTable`]: an adapter that materializes values as records of named
//!   fixed-width integer fields, and persists itself to a self-describing stream

#![deny(unreachable_patterns)]

#[macro_use]
extern crate log;

#[macro_use]
mod macros;
mod error;
mod record;
mod storage;
mod structured;
mod table;

pub use self::{
    error::{StorageError, StorageResult, TableError, TableResult},
    record::{FieldCode, FieldValue, Record, RecordShape},
    structured::{Records, StructuredTable},
    table::{HashTable, Items, TableConfig, TableStats},
};
