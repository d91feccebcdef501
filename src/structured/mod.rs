/*
 * Created on Wed Feb 14 2024
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

#[cfg(test)]
mod tests;

use {
    crate::{
        error::{TableError, TableResult},
        record::{FieldValue, Record, RecordShape},
        table::{HashTable, Items, TableConfig, TableStats},
    },
    std::{fmt, iter::FusedIterator, sync::Arc},
};

/// A [`HashTable`] whose values are structured records instead of raw bytes.
///
/// The table owns a [`RecordShape`]; on every write the record is packed into
/// the backing table's fixed-width value bytes, on every read it is unpacked
/// again. All index, iteration and statistics semantics are those of the
/// backing table.
pub struct StructuredTable {
    table: HashTable,
    shape: Arc<RecordShape>,
}

impl fmt::Debug for StructuredTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredTable")
            .field("table", &self.table)
            .field("shape", &self.shape)
            .finish()
    }
}

impl StructuredTable {
    /// Create an empty table for `key_size` byte keys and rows of the given
    /// shape, with the default [`TableConfig`]
    pub fn new(key_size: usize, shape: RecordShape) -> TableResult<Self> {
        Self::with_config(key_size, shape, TableConfig::default())
    }
    /// Create an empty table with explicit tunables
    pub fn with_config(key_size: usize, shape: RecordShape, cfg: TableConfig) -> TableResult<Self> {
        let table = HashTable::with_config(key_size, shape.width(), cfg)?;
        Ok(Self {
            table,
            shape: Arc::new(shape),
        })
    }
    /// Create a table from an initial sequence of `(key, values)` entries
    pub fn with_entries<'a, I>(key_size: usize, shape: RecordShape, entries: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [FieldValue])>,
    {
        let mut slf = Self::new(key_size, shape)?;
        slf.update(entries)?;
        Ok(slf)
    }
    pub(crate) fn from_parts(table: HashTable, shape: Arc<RecordShape>) -> Self {
        debug_assert_eq!(table.value_size(), shape.width());
        Self { table, shape }
    }
}

/*
    accessors
*/

impl StructuredTable {
    /// Number of live entries
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    /// Configured key size in bytes
    pub const fn key_size(&self) -> usize {
        self.table.key_size()
    }
    /// The row shape of this table
    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }
    /// Snapshot of the backing table's operation counters
    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }
    pub(crate) fn raw_table(&self) -> &HashTable {
        &self.table
    }
    fn record(&self, row: &[u8]) -> Record {
        Record::new(self.shape.clone(), self.shape.decode_row(row))
    }
    /// Build a record from caller-supplied values, verifying arity and ranges
    fn record_from_values(&self, values: &[FieldValue]) -> TableResult<Record> {
        if values.len() != self.shape.arity() {
            return Err(TableError::InvalidSize);
        }
        Ok(Record::new(self.shape.clone(), values.into()))
    }
    fn pack(&self, values: &[FieldValue]) -> TableResult<Vec<u8>> {
        let mut row = vec![0u8; self.shape.width()];
        self.shape.pack(values, &mut row)?;
        Ok(row)
    }
}

/*
    reads
*/

impl StructuredTable {
    /// Return the record stored for `key`
    pub fn lookup(&self, key: &[u8]) -> TableResult<Record> {
        Ok(self.record(self.table.lookup(key)?))
    }
    /// Return the record stored for `key`, or one built from `default` if the
    /// key is absent
    pub fn get(&self, key: &[u8], default: &[FieldValue]) -> TableResult<Record> {
        match self.lookup(key) {
            Err(TableError::NotFound) => self.record_from_values(default),
            ret => ret,
        }
    }
    /// Check whether `key` is present
    pub fn contains(&self, key: &[u8]) -> TableResult<bool> {
        self.table.contains(key)
    }
    /// Iterate over `(key, record)` pairs in slot order
    pub fn items(&self) -> Records<'_> {
        Records {
            items: self.table.items(),
            table: self,
        }
    }
}

/*
    writes
*/

impl StructuredTable {
    /// Insert `key -> values` (in declared field order), overwriting any
    /// present record. Fails before touching the table if a value does not fit
    /// its declared field width
    pub fn insert(&mut self, key: &[u8], values: &[FieldValue]) -> TableResult<()> {
        let row = self.pack(values)?;
        self.table.insert(key, &row)
    }
    /// The same operation as [`StructuredTable::insert`] under its other
    /// common name
    #[inline(always)]
    pub fn upsert(&mut self, key: &[u8], values: &[FieldValue]) -> TableResult<()> {
        self.insert(key, values)
    }
    /// Return the record stored for `key`; if absent, insert `default` first
    pub fn setdefault(&mut self, key: &[u8], default: &[FieldValue]) -> TableResult<Record> {
        let row = self.pack(default)?;
        let stored = self.table.setdefault(key, &row)?;
        Ok(Record::new(self.shape.clone(), self.shape.decode_row(stored)))
    }
    /// Remove the entry for `key`
    pub fn remove(&mut self, key: &[u8]) -> TableResult<()> {
        self.table.remove(key)
    }
    /// Remove the entry for `key` and return its record
    pub fn pop(&mut self, key: &[u8]) -> TableResult<Record> {
        let row = self.table.pop(key)?;
        Ok(self.record(&row))
    }
    /// Like [`StructuredTable::pop`], but a miss returns a record built from
    /// `default` instead of failing
    pub fn pop_or(&mut self, key: &[u8], default: &[FieldValue]) -> TableResult<Record> {
        match self.pop(key) {
            Err(TableError::NotFound) => self.record_from_values(default),
            ret => ret,
        }
    }
    /// Bulk upsert from a sequence of `(key, values)` entries
    pub fn update<'a, I>(&mut self, entries: I) -> TableResult<()>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [FieldValue])>,
    {
        for (key, values) in entries {
            self.insert(key, values)?;
        }
        Ok(())
    }
    /// Bulk upsert every entry of `other`. The shapes must agree; rows are
    /// then copied without a pack/unpack round trip
    pub fn update_with(&mut self, other: &StructuredTable) -> TableResult<()> {
        if self.shape != other.shape {
            return Err(TableError::InvalidSize);
        }
        for (key, row) in other.table.items() {
            self.table.insert(key, row)?;
        }
        Ok(())
    }
    /// Drop every entry and return to the initial capacity. Statistics are
    /// deliberately left untouched
    pub fn clear(&mut self) {
        self.table.clear()
    }
}

/*
    slot indices
*/

impl StructuredTable {
    /// Return the current slot index of `key` (see [`HashTable::k_to_idx`] for
    /// the validity rules)
    pub fn k_to_idx(&self, key: &[u8]) -> TableResult<usize> {
        self.table.k_to_idx(key)
    }
    /// Resolve a slot index (obtained in this generation) back to its key
    pub fn idx_to_k(&self, idx: usize) -> TableResult<&[u8]> {
        self.table.idx_to_k(idx)
    }
    /// Resolve a slot index (obtained in this generation) back to its entry
    pub fn idx_to_kv(&self, idx: usize) -> TableResult<(&[u8], Record)> {
        let (key, row) = self.table.idx_to_kv(idx)?;
        Ok((key, self.record(row)))
    }
    /// Return the slot index of `key` only if the stored record equals
    /// `values`
    pub fn kv_to_idx(&self, key: &[u8], values: &[FieldValue]) -> TableResult<usize> {
        let row = self.pack(values)?;
        self.table.kv_to_idx(key, &row)
    }
}

/// A lazy cursor over the `(key, record)` pairs of a [`StructuredTable`], in
/// slot order
pub struct Records<'a> {
    items: Items<'a>,
    table: &'a StructuredTable,
}

impl<'a> Clone for Records<'a> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            table: self.table,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (&'a [u8], Record);
    fn next(&mut self) -> Option<Self::Item> {
        self.items
            .next()
            .map(|(key, row)| (key, self.table.record(row)))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<'a> ExactSizeIterator for Records<'a> {
    fn len(&self) -> usize {
        self.items.len()
    }
}

impl<'a> FusedIterator for Records<'a> {}

impl<'a> fmt::Debug for Records<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
