/*
 * Created on Tue Feb 06 2024
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

mod iter;

pub use iter::Items;

use {
    crate::error::{TableError, TableResult},
    std::{
        fmt,
        sync::atomic::{AtomicU64, Ordering},
    },
};

/*
    The table keys directly off the leading 8 bytes of the key (little endian),
    masked down to the capacity. There is deliberately no mixing step: callers
    hand us digests, and digest bytes are as uniform as any hash we could
    compute from them. The flip side is that low-entropy keys degenerate into
    long probe chains; that is the documented contract, not a bug.
*/

/// State of one physical slot. One byte per slot, kept in a dedicated array so
/// that probing touches the record bytes only on a key comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum SlotState {
    Vacant = 0,
    Occupied = 1,
    Tombstone = 2,
}

/// Monotonic operation counters. Relaxed atomics so that read paths can stay
/// `&self` (and the table stays [`Sync`] for concurrent readers) without a lock
pub(crate) struct TableMetrics {
    get: AtomicU64,
    set: AtomicU64,
    del: AtomicU64,
    iter: AtomicU64,
    lookup: AtomicU64,
    linear: AtomicU64,
    resize_table: AtomicU64,
    resize_kv: AtomicU64,
}

macro_rules! metrics_hit {
    ($($hit:ident => $fld:ident),* $(,)?) => {
        impl TableMetrics {
            $(#[inline(always)] fn $hit(&self) { self.$fld.fetch_add(1, Ordering::Relaxed); })*
        }
    };
}

metrics_hit! {
    hit_get => get,
    hit_set => set,
    hit_del => del,
    hit_iter => iter,
    hit_lookup => lookup,
    hit_linear => linear,
    hit_resize_table => resize_table,
    hit_resize_kv => resize_kv,
}

impl TableMetrics {
    const fn new() -> Self {
        Self {
            get: AtomicU64::new(0),
            set: AtomicU64::new(0),
            del: AtomicU64::new(0),
            iter: AtomicU64::new(0),
            lookup: AtomicU64::new(0),
            linear: AtomicU64::new(0),
            resize_table: AtomicU64::new(0),
            resize_kv: AtomicU64::new(0),
        }
    }
    fn snapshot(&self) -> TableStats {
        TableStats {
            get: self.get.load(Ordering::Relaxed),
            set: self.set.load(Ordering::Relaxed),
            del: self.del.load(Ordering::Relaxed),
            iter: self.iter.load(Ordering::Relaxed),
            lookup: self.lookup.load(Ordering::Relaxed),
            linear: self.linear.load(Ordering::Relaxed),
            resize_table: self.resize_table.load(Ordering::Relaxed),
            resize_kv: self.resize_kv.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// An immutable snapshot of a table's operation counters, as returned by
/// [`HashTable::stats`]
pub struct TableStats {
    /// direct value reads (`lookup`, `get`, `setdefault`, `pop`)
    pub get: u64,
    /// inserts (including overwrites)
    pub set: u64,
    /// remove attempts
    pub del: u64,
    /// iteration starts
    pub iter: u64,
    /// internal probe sequences (every operation that has to locate a key)
    pub lookup: u64,
    /// individual linear probe hops
    pub linear: u64,
    /// rehash events (growth, shrink, same-capacity compaction)
    pub resize_table: u64,
    /// record buffer reallocations (growth, shrink)
    pub resize_kv: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Tunables for a [`HashTable`]. The defaults match the workloads the crate is
/// built for and rarely need changing
pub struct TableConfig {
    /// capacity of a fresh table, in slots; rounded up to a power of two. The
    /// table is never shrunk below this
    pub initial_capacity: usize,
    /// grow once `used / capacity` exceeds this
    pub max_load_factor: f64,
    /// shrink once `used / capacity` falls below this (and capacity is still
    /// above the initial capacity)
    pub min_load_factor: f64,
    /// compact (at unchanged capacity) once `tombstones / capacity` exceeds this
    pub max_tombstone_ratio: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 8,
            max_load_factor: 0.75,
            min_load_factor: 0.30,
            max_tombstone_ratio: 0.25,
        }
    }
}

impl TableConfig {
    fn validate(&self) -> TableResult<()> {
        if self.initial_capacity == 0 {
            return Err(TableError::InvalidSize);
        }
        // min*2 <= max guarantees that halving an underloaded table cannot
        // overshoot the max load factor
        let factors_usable = self.min_load_factor > 0.0
            && self.min_load_factor * 2.0 <= self.max_load_factor
            && self.max_load_factor < 1.0
            && self.max_tombstone_ratio > 0.0
            && self.max_tombstone_ratio < 1.0;
        if factors_usable {
            Ok(())
        } else {
            Err(TableError::ValueOutOfRange)
        }
    }
}

/// Result of walking a probe chain for a key
struct Probe {
    /// slot holding the key, if the key is present
    hit: Option<usize>,
    /// slot a fresh insert of this key should target: the first tombstone on
    /// the chain, else the vacant slot that terminated it. `None` only if the
    /// chain wrapped all the way around without either
    free: Option<usize>,
}

#[inline(always)]
fn home_slot(key: &[u8], mask: usize) -> usize {
    let mut word = [0u8; 8];
    let prefix = key.len().min(word.len());
    word[..prefix].copy_from_slice(&key[..prefix]);
    (u64::from_le_bytes(word) & mask as u64) as usize
}

/// An open-addressed hash table mapping fixed-size byte keys to fixed-size byte
/// values.
///
/// Keys are assumed to be uniformly distributed (digests); the slot index is
/// taken straight from the leading key bytes. Collisions resolve by linear
/// probing with tombstoned deletes; the table grows, shrinks and compacts
/// itself to keep the load factor inside the configured band.
///
/// Slot indices returned by [`HashTable::k_to_idx`] are stable across inserts
/// and deletes but are invalidated by any operation that rehashes (watch
/// [`TableStats::resize_table`]); resolving an invalidated index yields either
/// [`TableError::InvalidState`] or, if the slot has been reoccupied, some other
/// live entry.
pub struct HashTable {
    key_size: usize,
    value_size: usize,
    cfg: TableConfig,
    initial_capacity: usize,
    capacity: usize,
    used: usize,
    tombstones: usize,
    slots: Box<[SlotState]>,
    kv: Box<[u8]>,
    metrics: TableMetrics,
}

impl fmt::Debug for HashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("key_size", &self.key_size)
            .field("value_size", &self.value_size)
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("tombstones", &self.tombstones)
            .finish()
    }
}

impl HashTable {
    /// Create an empty table for `key_size` byte keys and `value_size` byte
    /// values with the default [`TableConfig`]
    pub fn new(key_size: usize, value_size: usize) -> TableResult<Self> {
        Self::with_config(key_size, value_size, TableConfig::default())
    }
    /// Create an empty table with explicit tunables
    pub fn with_config(key_size: usize, value_size: usize, cfg: TableConfig) -> TableResult<Self> {
        if key_size == 0 {
            return Err(TableError::InvalidSize);
        }
        cfg.validate()?;
        let initial_capacity = cfg.initial_capacity.next_power_of_two();
        Ok(Self {
            key_size,
            value_size,
            cfg,
            initial_capacity,
            capacity: initial_capacity,
            used: 0,
            tombstones: 0,
            slots: vec![SlotState::Vacant; initial_capacity].into_boxed_slice(),
            kv: vec![0u8; initial_capacity * (key_size + value_size)].into_boxed_slice(),
            metrics: TableMetrics::new(),
        })
    }
    /// Create a table from an initial sequence of entries
    pub fn with_entries<'a, I>(key_size: usize, value_size: usize, entries: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let mut slf = Self::new(key_size, value_size)?;
        for (key, value) in entries {
            slf.insert(key, value)?;
        }
        Ok(slf)
    }
}

/*
    accessors
*/

impl HashTable {
    /// Number of live entries
    pub fn len(&self) -> usize {
        self.used
    }
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }
    /// Configured key size in bytes
    pub const fn key_size(&self) -> usize {
        self.key_size
    }
    /// Configured value size in bytes
    pub const fn value_size(&self) -> usize {
        self.value_size
    }
    /// Current slot count. Always a power of two
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
    /// Snapshot of the operation counters
    pub fn stats(&self) -> TableStats {
        self.metrics.snapshot()
    }
    #[inline(always)]
    const fn record_size(&self) -> usize {
        self.key_size + self.value_size
    }
    #[inline(always)]
    fn check_key(&self, key: &[u8]) -> TableResult<()> {
        if key.len() == self.key_size {
            Ok(())
        } else {
            Err(TableError::InvalidSize)
        }
    }
    #[inline(always)]
    fn check_value(&self, value: &[u8]) -> TableResult<()> {
        if value.len() == self.value_size {
            Ok(())
        } else {
            Err(TableError::InvalidSize)
        }
    }
    #[inline(always)]
    pub(crate) fn slot_key(&self, slot: usize) -> &[u8] {
        let at = slot * self.record_size();
        &self.kv[at..at + self.key_size]
    }
    #[inline(always)]
    pub(crate) fn slot_value(&self, slot: usize) -> &[u8] {
        let at = slot * self.record_size() + self.key_size;
        &self.kv[at..at + self.value_size]
    }
    #[inline(always)]
    pub(crate) fn slot_kv(&self, slot: usize) -> (&[u8], &[u8]) {
        let at = slot * self.record_size();
        let (key, value) = self.kv[at..at + self.record_size()].split_at(self.key_size);
        (key, value)
    }
    #[inline(always)]
    pub(crate) fn slot_occupied(&self, slot: usize) -> bool {
        self.slots[slot] == SlotState::Occupied
    }
    #[inline(always)]
    fn slot_value_mut(&mut self, slot: usize) -> &mut [u8] {
        let at = slot * self.record_size() + self.key_size;
        let value_size = self.value_size;
        &mut self.kv[at..at + value_size]
    }
    /// Persistence loaders rebuild tables entry by entry; their bookkeeping is
    /// not part of the table's own operation history
    pub(crate) fn reset_metrics(&mut self) {
        self.metrics = TableMetrics::new();
    }
}

/*
    probing
*/

impl HashTable {
    #[inline(always)]
    fn home_index(&self, key: &[u8]) -> usize {
        home_slot(key, self.capacity - 1)
    }
    /// Walk the probe chain of `key`. Tombstones are traversed; the walk ends
    /// on a key match, a vacant slot, or after a full loop (possible when
    /// occupied + tombstoned slots cover the whole table)
    fn probe_raw(&self, key: &[u8]) -> Probe {
        let mask = self.capacity - 1;
        let mut slot = self.home_index(key);
        let mut grave = None;
        let mut inspected = 0;
        loop {
            match self.slots[slot] {
                SlotState::Vacant => {
                    return Probe {
                        hit: None,
                        free: Some(grave.unwrap_or(slot)),
                    }
                }
                SlotState::Tombstone => {
                    if grave.is_none() {
                        grave = Some(slot);
                    }
                }
                SlotState::Occupied => {
                    if self.slot_key(slot) == key {
                        return Probe {
                            hit: Some(slot),
                            free: grave,
                        };
                    }
                }
            }
            inspected += 1;
            if inspected == self.capacity {
                // full loop: no vacant slot anywhere
                return Probe {
                    hit: None,
                    free: grave,
                };
            }
            self.metrics.hit_linear();
            slot = (slot + 1) & mask;
        }
    }
    #[inline(always)]
    fn probe(&self, key: &[u8]) -> Probe {
        self.metrics.hit_lookup();
        self.probe_raw(key)
    }
}

/*
    reads
*/

impl HashTable {
    /// Return the value stored for `key`
    pub fn lookup(&self, key: &[u8]) -> TableResult<&[u8]> {
        self.check_key(key)?;
        self.metrics.hit_get();
        match self.probe(key).hit {
            Some(slot) => Ok(self.slot_value(slot)),
            None => Err(TableError::NotFound),
        }
    }
    /// Return the value stored for `key`, or `default` if the key is absent
    pub fn get<'a>(&'a self, key: &[u8], default: &'a [u8]) -> TableResult<&'a [u8]> {
        self.check_key(key)?;
        self.metrics.hit_get();
        Ok(match self.probe(key).hit {
            Some(slot) => self.slot_value(slot),
            None => default,
        })
    }
    /// Check whether `key` is present
    pub fn contains(&self, key: &[u8]) -> TableResult<bool> {
        self.check_key(key)?;
        Ok(self.probe(key).hit.is_some())
    }
    /// Iterate over `(key, value)` pairs in slot order. The iterator borrows
    /// the table, so the table cannot be mutated while it is live; drop the
    /// iterator to cancel
    pub fn items(&self) -> Items<'_> {
        self.metrics.hit_iter();
        Items::new(self)
    }
}

/*
    writes
*/

impl HashTable {
    /// Insert `key -> value`, overwriting the value if the key is present
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> TableResult<()> {
        self.check_key(key)?;
        self.check_value(value)?;
        self.metrics.hit_set();
        let Probe { hit, free } = self.probe(key);
        if let Some(slot) = hit {
            self.slot_value_mut(slot).copy_from_slice(value);
            return Ok(());
        }
        let slot = match free {
            Some(slot) => slot,
            None => {
                // neither a vacant slot nor a reusable tombstone on the chain;
                // grow and retry on the fresh layout
                self.rehash(self.capacity * 2);
                match self.probe_raw(key).free {
                    Some(slot) => slot,
                    None => unreachable!("rehash must leave vacant slots"),
                }
            }
        };
        if self.slots[slot] == SlotState::Tombstone {
            self.tombstones -= 1;
        }
        self.slots[slot] = SlotState::Occupied;
        let at = slot * self.record_size();
        self.kv[at..at + self.key_size].copy_from_slice(key);
        let key_size = self.key_size;
        let record_size = self.record_size();
        self.kv[at + key_size..at + record_size].copy_from_slice(value);
        self.used += 1;
        if self.used as f64 > self.cfg.max_load_factor * self.capacity as f64 {
            self.rehash(self.capacity * 2);
        }
        Ok(())
    }
    /// The same operation as [`HashTable::insert`] under its other common name
    #[inline(always)]
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> TableResult<()> {
        self.insert(key, value)
    }
    /// Return the value stored for `key`; if absent, insert `default` first
    pub fn setdefault(&mut self, key: &[u8], default: &[u8]) -> TableResult<&[u8]> {
        self.check_key(key)?;
        self.check_value(default)?;
        if self.probe(key).hit.is_none() {
            self.insert(key, default)?;
        }
        self.lookup(key)
    }
    /// Remove the entry for `key`, leaving a tombstone
    pub fn remove(&mut self, key: &[u8]) -> TableResult<()> {
        self.check_key(key)?;
        self.metrics.hit_del();
        match self.probe(key).hit {
            Some(slot) => {
                self.slots[slot] = SlotState::Tombstone;
                self.used -= 1;
                self.tombstones += 1;
                self.reclaim();
                Ok(())
            }
            None => Err(TableError::NotFound),
        }
    }
    /// Remove the entry for `key` and return its value
    pub fn pop(&mut self, key: &[u8]) -> TableResult<Box<[u8]>> {
        let value: Box<[u8]> = self.lookup(key)?.into();
        self.remove(key)?;
        Ok(value)
    }
    /// Like [`HashTable::pop`], but a miss returns a copy of `default` instead
    /// of failing
    pub fn pop_or(&mut self, key: &[u8], default: &[u8]) -> TableResult<Box<[u8]>> {
        self.check_key(key)?;
        match self.pop(key) {
            Err(TableError::NotFound) => Ok(default.into()),
            ret => ret,
        }
    }
    /// Drop every entry and return to the initial capacity. Statistics are
    /// deliberately left untouched
    pub fn clear(&mut self) {
        self.capacity = self.initial_capacity;
        self.used = 0;
        self.tombstones = 0;
        self.slots = vec![SlotState::Vacant; self.capacity].into_boxed_slice();
        self.kv = vec![0u8; self.capacity * self.record_size()].into_boxed_slice();
    }
}

/*
    slot indices
*/

impl HashTable {
    /// Return the current slot index of `key`. The index stays valid until the
    /// next rehash (see the type-level docs)
    pub fn k_to_idx(&self, key: &[u8]) -> TableResult<usize> {
        self.check_key(key)?;
        self.probe(key).hit.ok_or(TableError::NotFound)
    }
    /// Resolve a slot index (obtained in this generation) back to its key
    pub fn idx_to_k(&self, idx: usize) -> TableResult<&[u8]> {
        self.check_idx(idx)?;
        Ok(self.slot_key(idx))
    }
    /// Resolve a slot index (obtained in this generation) back to its entry
    pub fn idx_to_kv(&self, idx: usize) -> TableResult<(&[u8], &[u8])> {
        self.check_idx(idx)?;
        Ok(self.slot_kv(idx))
    }
    /// Return the slot index of `key` only if the stored value also equals
    /// `value`
    pub fn kv_to_idx(&self, key: &[u8], value: &[u8]) -> TableResult<usize> {
        self.check_key(key)?;
        self.check_value(value)?;
        match self.probe(key).hit {
            Some(slot) if self.slot_value(slot) == value => Ok(slot),
            _ => Err(TableError::NotFound),
        }
    }
    #[inline(always)]
    fn check_idx(&self, idx: usize) -> TableResult<()> {
        if idx < self.capacity && self.slot_occupied(idx) {
            Ok(())
        } else {
            Err(TableError::InvalidState)
        }
    }
}

/*
    resizing
*/

impl HashTable {
    /// Rehash every live entry into freshly allocated arrays of `new_capacity`
    /// slots. Tombstones are dropped. Invalidates all outstanding slot indices
    fn rehash(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity.is_power_of_two());
        debug_assert!(self.used <= new_capacity);
        let record_size = self.record_size();
        let mut slots = vec![SlotState::Vacant; new_capacity].into_boxed_slice();
        let mut kv = vec![0u8; new_capacity * record_size].into_boxed_slice();
        let mask = new_capacity - 1;
        for slot in 0..self.capacity {
            if self.slots[slot] != SlotState::Occupied {
                continue;
            }
            let record = &self.kv[slot * record_size..(slot + 1) * record_size];
            let mut target = home_slot(&record[..self.key_size], mask);
            while slots[target] != SlotState::Vacant {
                target = (target + 1) & mask;
            }
            slots[target] = SlotState::Occupied;
            kv[target * record_size..(target + 1) * record_size].copy_from_slice(record);
        }
        trace!(
            "rehash: capacity {} -> {} ({} used, {} tombstones dropped)",
            self.capacity,
            new_capacity,
            self.used,
            self.tombstones
        );
        let kv_realloc = new_capacity != self.capacity;
        self.slots = slots;
        self.kv = kv;
        self.capacity = new_capacity;
        self.tombstones = 0;
        self.metrics.hit_resize_table();
        if kv_realloc {
            self.metrics.hit_resize_kv();
        }
    }
    /// Post-remove housekeeping: shrink an underloaded table, else compact away
    /// an excessive tombstone share
    fn reclaim(&mut self) {
        let capacity = self.capacity as f64;
        if (self.used as f64) < self.cfg.min_load_factor * capacity
            && self.capacity > self.initial_capacity
        {
            self.rehash(self.shrink_target());
        } else if self.tombstones as f64 > self.cfg.max_tombstone_ratio * capacity {
            self.rehash(self.capacity);
        }
    }
    /// Largest halving that brings the load factor back into the configured
    /// band (or bottoms out at the initial capacity)
    fn shrink_target(&self) -> usize {
        let mut target = self.capacity;
        while target > self.initial_capacity
            && (self.used as f64) < self.cfg.min_load_factor * target as f64
            && self.used as f64 <= self.cfg.max_load_factor * (target / 2) as f64
        {
            target /= 2;
        }
        target
    }
}
