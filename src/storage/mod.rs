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

//! # Persisted table streams
//!
//! One envelope serves both table flavors: a self-describing msgpack header,
//! the raw concatenation of the packed `(key || value)` records of every live
//! entry, and a little-endian CRC-64/XZ trailer computed over everything before
//! it. Readers reject foreign namespaces, other format majors, mismatched
//! object kinds, unknown field type codes and checksum failures.

mod header;
mod rw;
#[cfg(test)]
mod tests;

use {
    self::{
        header::{StreamHeader, KIND_RAW, KIND_STRUCTURED},
        rw::{TrackedReader, TrackedWriter},
    },
    crate::{
        error::{StorageError, StorageResult},
        structured::StructuredTable,
        table::HashTable,
    },
    std::{
        io::{Read, Write},
        sync::Arc,
    },
};

/// Byte length of the checksum trailer
const TRAILER_SIZE: usize = 8;

fn write_stream<'a, W: Write>(
    stream: W,
    header: &StreamHeader,
    entries: impl Iterator<Item = (&'a [u8], &'a [u8])>,
) -> StorageResult<()> {
    let mut wtr = TrackedWriter::new(stream);
    rmp_serde::encode::write_named(&mut wtr, header)
        .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    for (key, value) in entries {
        wtr.write_all(key)?;
        wtr.write_all(value)?;
    }
    let written = wtr.written();
    let (mut stream, checksum) = wtr.finish();
    stream.write_all(&checksum.to_le_bytes())?;
    stream.flush()?;
    debug!(
        "wrote {} stream: {} entries, {} bytes (incl. trailer)",
        header.kind,
        header.count,
        written + TRAILER_SIZE as u64
    );
    Ok(())
}

/// Read the header of a stream, leaving the reader at the first entry
fn read_header<R: Read>(rdr: &mut TrackedReader<R>, kind: &str) -> StorageResult<StreamHeader> {
    let header: StreamHeader =
        rmp_serde::decode::from_read(&mut *rdr).map_err(|_| StorageError::HeaderDecodeCorrupted)?;
    header.validate(kind)?;
    Ok(header)
}

/// Load `count` packed records into a freshly constructed table, then verify
/// the checksum trailer
fn read_entries<R: Read>(
    mut rdr: TrackedReader<R>,
    header: &StreamHeader,
) -> StorageResult<HashTable> {
    let key_size =
        usize::try_from(header.key_size).map_err(|_| StorageError::HeaderDecodeCorrupted)?;
    let value_size =
        usize::try_from(header.value_size).map_err(|_| StorageError::HeaderDecodeCorrupted)?;
    let mut table = HashTable::new(key_size, value_size)?;
    let mut record = vec![0u8; key_size + value_size];
    for _ in 0..header.count {
        rdr.read_exact(&mut record)?;
        table.insert(&record[..key_size], &record[key_size..])?;
    }
    let read = rdr.read_so_far();
    let (mut stream, computed) = rdr.finish();
    let mut trailer = [0u8; TRAILER_SIZE];
    stream.read_exact(&mut trailer)?;
    if u64::from_le_bytes(trailer) != computed {
        return Err(StorageError::ChecksumMismatch);
    }
    debug!(
        "read {} stream: {} entries, {} bytes (incl. trailer)",
        header.kind,
        header.count,
        read + TRAILER_SIZE as u64
    );
    // the rebuild above is not part of the new table's operation history
    table.reset_metrics();
    Ok(table)
}

impl HashTable {
    /// Persist the table to `stream`
    pub fn save<W: Write>(&self, stream: W) -> StorageResult<()> {
        write_stream(stream, &StreamHeader::for_raw(self), self.items())
    }
    /// Reconstruct a table persisted with [`HashTable::save`]. The new table
    /// uses the default configuration and fresh statistics
    pub fn load<R: Read>(stream: R) -> StorageResult<Self> {
        let mut rdr = TrackedReader::new(stream);
        let header = read_header(&mut rdr, KIND_RAW)?;
        read_entries(rdr, &header)
    }
}

impl StructuredTable {
    /// Persist the table to `stream`, including its full row shape
    pub fn write<W: Write>(&self, stream: W) -> StorageResult<()> {
        write_stream(
            stream,
            &StreamHeader::for_structured(self),
            self.raw_table().items(),
        )
    }
    /// Reconstruct a table persisted with [`StructuredTable::write`],
    /// including its row shape. The new table uses the default configuration
    /// and fresh statistics
    pub fn read<R: Read>(stream: R) -> StorageResult<Self> {
        let mut rdr = TrackedReader::new(stream);
        let header = read_header(&mut rdr, KIND_STRUCTURED)?;
        let shape = header.shape()?;
        let table = read_entries(rdr, &header)?;
        Ok(Self::from_parts(table, Arc::new(shape)))
    }
    /// The exact number of bytes [`StructuredTable::write`] would emit right
    /// now: header, `len()` packed records, checksum trailer
    pub fn size(&self) -> usize {
        StreamHeader::for_structured(self).encoded_len()
            + self.len() * (self.key_size() + self.shape().width())
            + TRAILER_SIZE
    }
}
