/*
 * Created on Thu Feb 15 2024
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
    super::{StructuredTable, TableError},
    crate::record::{FieldCode, FieldValue, RecordShape},
    sha2::{Digest, Sha256},
};

#[cfg(not(miri))]
const STRESS_CNT: usize = 10_000;
#[cfg(miri)]
const STRESS_CNT: usize = 128;

const KEY1: [u8; 32] = [b'a'; 32];
const KEY2: [u8; 32] = [b'b'; 32];
const KEY3: [u8; 32] = [b'c'; 32];

fn digest(x: u64) -> [u8; 32] {
    Sha256::digest(x.to_le_bytes()).into()
}

/// 3x unsigned 32-bit fields, as a content-addressed store would use for
/// (segment, offset, size) style bookkeeping
fn shape() -> RecordShape {
    RecordShape::new(
        &["v1", "v2", "v3"],
        &[FieldCode::U32, FieldCode::U32, FieldCode::U32],
    )
    .unwrap()
}

fn v(v1: u64, v2: u64, v3: u64) -> [FieldValue; 3] {
    [
        FieldValue::UInt(v1),
        FieldValue::UInt(v2),
        FieldValue::UInt(v3),
    ]
}

fn table() -> StructuredTable {
    StructuredTable::new(32, shape()).unwrap()
}

fn table12() -> StructuredTable {
    let mut t = table();
    t.insert(&KEY1, &v(11, 12, 13)).unwrap();
    t.insert(&KEY2, &v(21, 22, 23)).unwrap();
    t
}

#[test]
fn init_empty_and_with_entries() {
    let t = table();
    assert_eq!(t.len(), 0);
    assert!(t.is_empty());
    let one = v(11, 12, 13);
    let two = v(21, 22, 23);
    let entries: [(&[u8], &[FieldValue]); 2] = [(&KEY1, &one), (&KEY2, &two)];
    let t = StructuredTable::with_entries(32, shape(), entries).unwrap();
    assert_eq!(t.lookup(&KEY1).unwrap().values(), &one);
    assert_eq!(t.lookup(&KEY2).unwrap().values(), &two);
}

#[test]
fn insert_lookup() {
    let t = table12();
    let rec = t.lookup(&KEY1).unwrap();
    assert_eq!(rec.values(), &v(11, 12, 13));
    assert_eq!(rec.field("v1"), Some(FieldValue::UInt(11)));
    assert_eq!(rec.field("v3"), Some(FieldValue::UInt(13)));
    assert_eq!(rec.field("nx"), None);
    assert_eq!(rec[1], FieldValue::UInt(12));
    assert_eq!(rec.shape(), t.shape());
    assert_eq!(t.lookup(&KEY2).unwrap().values(), &v(21, 22, 23));
}

#[test]
fn remove_lookup() {
    let mut t = table12();
    t.remove(&KEY1).unwrap();
    assert_eq!(t.lookup(&KEY1).unwrap_err(), TableError::NotFound);
    t.remove(&KEY2).unwrap();
    assert_eq!(t.lookup(&KEY2).unwrap_err(), TableError::NotFound);
    assert_eq!(t.len(), 0);
}

#[test]
fn items() {
    let t = table12();
    let mut seen = 0;
    for (key, rec) in t.items() {
        match key {
            _ if key == KEY1 => assert_eq!(rec.values(), &v(11, 12, 13)),
            _ if key == KEY2 => assert_eq!(rec.values(), &v(21, 22, 23)),
            _ => panic!("unexpected key"),
        }
        seen += 1;
    }
    assert_eq!(seen, 2);
    assert_eq!(t.items().len(), 2);
}

#[test]
fn contains_get_setdefault() {
    let mut t = table12();
    assert!(t.contains(&KEY1).unwrap());
    assert!(!t.contains(&KEY3).unwrap());
    assert_eq!(t.get(&KEY1, &v(0, 0, 0)).unwrap().values(), &v(11, 12, 13));
    assert_eq!(t.get(&KEY3, &v(31, 32, 33)).unwrap().values(), &v(31, 32, 33));
    assert!(!t.contains(&KEY3).unwrap());
    assert_eq!(
        t.setdefault(&KEY1, &v(0, 0, 0)).unwrap().values(),
        &v(11, 12, 13)
    );
    assert_eq!(
        t.setdefault(&KEY3, &v(31, 32, 33)).unwrap().values(),
        &v(31, 32, 33)
    );
    assert_eq!(t.lookup(&KEY3).unwrap().values(), &v(31, 32, 33));
}

#[test]
fn pop() {
    let mut t = table12();
    assert_eq!(t.pop(&KEY1).unwrap().values(), &v(11, 12, 13));
    assert!(!t.contains(&KEY1).unwrap());
    assert_eq!(t.pop(&KEY3).unwrap_err(), TableError::NotFound);
    assert_eq!(t.pop_or(&KEY3, &v(0, 1, 2)).unwrap().values(), &v(0, 1, 2));
    assert_eq!(t.len(), 1);
}

#[test]
fn update_bulk() {
    let mut t = table12();
    let three = v(31, 32, 33);
    let one = v(1, 1, 1);
    let entries: [(&[u8], &[FieldValue]); 2] = [(&KEY3, &three), (&KEY1, &one)];
    t.update(entries).unwrap();
    assert_eq!(t.len(), 3);
    assert_eq!(t.lookup(&KEY1).unwrap().values(), &one);
    assert_eq!(t.lookup(&KEY3).unwrap().values(), &three);
}

#[test]
fn update_with_table() {
    let mut t = table12();
    let mut other = table();
    other.insert(&KEY2, &v(9, 9, 9)).unwrap();
    other.insert(&KEY3, &v(31, 32, 33)).unwrap();
    t.update_with(&other).unwrap();
    assert_eq!(t.len(), 3);
    assert_eq!(t.lookup(&KEY2).unwrap().values(), &v(9, 9, 9));
    assert_eq!(t.lookup(&KEY3).unwrap().values(), &v(31, 32, 33));
    // shape mismatch is refused outright
    let alien =
        StructuredTable::new(32, RecordShape::new(&["x"], &[FieldCode::U64]).unwrap()).unwrap();
    assert_eq!(t.update_with(&alien).unwrap_err(), TableError::InvalidSize);
}

#[test]
fn overflow_fails_before_insert() {
    let mut t = table12();
    assert_eq!(
        t.insert(&KEY3, &v(1, u32::MAX as u64 + 1, 2)).unwrap_err(),
        TableError::ValueOutOfRange
    );
    assert_eq!(t.len(), 2);
    assert!(!t.contains(&KEY3).unwrap());
    // arity mismatch
    assert_eq!(
        t.insert(&KEY3, &v(1, 2, 3)[..2]).unwrap_err(),
        TableError::InvalidSize
    );
}

#[test]
fn index_ops() {
    let t = table12();
    let idx1 = t.k_to_idx(&KEY1).unwrap();
    let idx2 = t.k_to_idx(&KEY2).unwrap();
    assert_ne!(idx1, idx2);
    assert_eq!(t.k_to_idx(&KEY3).unwrap_err(), TableError::NotFound);
    assert_eq!(t.idx_to_k(idx1).unwrap(), &KEY1);
    assert_eq!(t.idx_to_k(idx2).unwrap(), &KEY2);
    let (key, rec) = t.idx_to_kv(idx1).unwrap();
    assert_eq!(key, &KEY1);
    assert_eq!(rec.values(), &v(11, 12, 13));
}

#[test]
fn kv_to_idx() {
    let t = table12();
    let idx1 = t.kv_to_idx(&KEY1, &v(11, 12, 13)).unwrap();
    assert_eq!(idx1, t.k_to_idx(&KEY1).unwrap());
    assert_eq!(
        t.kv_to_idx(&KEY1, &v(21, 22, 23)).unwrap_err(),
        TableError::NotFound
    );
    assert_eq!(
        t.kv_to_idx(&KEY2, &v(11, 12, 13)).unwrap_err(),
        TableError::NotFound
    );
    assert_eq!(
        t.kv_to_idx(&KEY3, &v(31, 32, 33)).unwrap_err(),
        TableError::NotFound
    );
}

#[test]
fn stats_pass_through() {
    let mut t = table();
    assert_eq!(t.stats().set, 0);
    t.insert(&KEY1, &v(1, 2, 3)).unwrap();
    t.lookup(&KEY1).unwrap();
    assert_eq!(t.stats().set, 1);
    assert_eq!(t.stats().get, 1);
}

#[test]
fn clear() {
    let mut t = table12();
    t.clear();
    assert_eq!(t.len(), 0);
    assert!(!t.contains(&KEY1).unwrap());
    assert_eq!(t.stats().set, 2);
}

#[test]
fn stress() {
    let mut t = table();
    for x in 0..STRESS_CNT as u64 {
        let key = digest(x);
        let seed = key[0] as u64;
        t.insert(&key, &v(seed, seed * 2, seed * 3)).unwrap();
    }
    assert_eq!(t.len(), STRESS_CNT);
    let mut seen = 0;
    for (key, rec) in t.items() {
        let seed = key[0] as u64;
        assert_eq!(rec.values(), &v(seed, seed * 2, seed * 3));
        seen += 1;
    }
    assert_eq!(seen, STRESS_CNT);
    for x in 0..STRESS_CNT as u64 {
        let key = digest(x);
        let seed = key[0] as u64;
        assert_eq!(t.lookup(&key).unwrap().values(), &v(seed, seed * 2, seed * 3));
    }
    for x in 0..STRESS_CNT as u64 {
        t.remove(&digest(x)).unwrap();
    }
    assert_eq!(t.len(), 0);
}
