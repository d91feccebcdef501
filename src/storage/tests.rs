/*
 * Created on Wed Feb 21 2024
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
    super::{header::StreamHeader, write_stream},
    crate::{
        error::StorageError,
        record::{FieldCode, FieldValue, RecordShape},
        structured::StructuredTable,
        table::HashTable,
    },
    sha2::{Digest, Sha256},
};

const KEY1: [u8; 32] = [b'a'; 32];
const KEY2: [u8; 32] = [b'b'; 32];
const VALUE1: [u8; 4] = [b'A'; 4];
const VALUE2: [u8; 4] = [b'B'; 4];

fn digest(x: u64) -> [u8; 32] {
    Sha256::digest(x.to_le_bytes()).into()
}

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

fn structured12() -> StructuredTable {
    let mut t = StructuredTable::new(32, shape()).unwrap();
    t.insert(&KEY1, &v(11, 12, 13)).unwrap();
    t.insert(&KEY2, &v(21, 22, 23)).unwrap();
    t
}

#[test]
fn raw_save_load() {
    let mut t = HashTable::new(32, 4).unwrap();
    t.insert(&KEY1, &VALUE1).unwrap();
    t.insert(&KEY2, &VALUE2).unwrap();
    let mut stream = Vec::new();
    t.save(&mut stream).unwrap();
    let loaded = HashTable::load(&stream[..]).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.key_size(), 32);
    assert_eq!(loaded.value_size(), 4);
    assert_eq!(loaded.lookup(&KEY1).unwrap(), &VALUE1);
    assert_eq!(loaded.lookup(&KEY2).unwrap(), &VALUE2);
}

#[test]
fn raw_save_load_empty() {
    let t = HashTable::new(16, 8).unwrap();
    let mut stream = Vec::new();
    t.save(&mut stream).unwrap();
    let loaded = HashTable::load(&stream[..]).unwrap();
    assert_eq!(loaded.len(), 0);
    assert_eq!(loaded.key_size(), 16);
    assert_eq!(loaded.value_size(), 8);
}

#[test]
fn structured_write_read() {
    let t = structured12();
    let mut stream = Vec::new();
    t.write(&mut stream).unwrap();
    let loaded = StructuredTable::read(&stream[..]).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.shape(), t.shape());
    let rec = loaded.lookup(&KEY1).unwrap();
    assert_eq!(rec.values(), &v(11, 12, 13));
    assert_eq!(rec.field("v2"), Some(FieldValue::UInt(12)));
    assert_eq!(loaded.lookup(&KEY2).unwrap().values(), &v(21, 22, 23));
}

#[test]
fn structured_round_trip_is_lossless() {
    let mut t = StructuredTable::new(32, shape()).unwrap();
    for x in 0..1000u64 {
        let key = digest(x);
        let seed = key[0] as u64;
        t.insert(&key, &v(seed * 123_456, seed * 234_567, seed * 345_678))
            .unwrap();
    }
    let mut stream = Vec::new();
    t.write(&mut stream).unwrap();
    let loaded = StructuredTable::read(&stream[..]).unwrap();
    assert_eq!(loaded.len(), t.len());
    for (key, rec) in t.items() {
        assert_eq!(loaded.lookup(key).unwrap(), rec);
    }
}

#[test]
fn load_starts_with_fresh_stats() {
    let t = structured12();
    let mut stream = Vec::new();
    t.write(&mut stream).unwrap();
    let loaded = StructuredTable::read(&stream[..]).unwrap();
    assert_eq!(loaded.stats(), Default::default());
}

#[test]
fn size_is_byte_accurate() {
    for n in [0u64, 1, 100, 1000] {
        let mut t = StructuredTable::new(32, shape()).unwrap();
        for x in 0..n {
            let key = digest(x);
            let seed = key[0] as u64;
            // mid-size integers: not minimal, not maximal
            t.insert(&key, &v(seed * 123_456, seed * 234_567, seed * 345_678))
                .unwrap();
        }
        let estimated = t.size();
        let mut stream = Vec::new();
        t.write(&mut stream).unwrap();
        let real = stream.len();
        assert_eq!(estimated, real);
        // the documented accuracy band, should the two ever drift
        assert!(estimated <= real);
        assert!(estimated as f64 >= real as f64 * 0.9);
    }
}

#[test]
fn rejects_foreign_namespace() {
    let mut header = StreamHeader::for_raw(&HashTable::new(32, 4).unwrap());
    header.namespace = "somethingelse".to_owned();
    let mut stream = Vec::new();
    write_stream(&mut stream, &header, std::iter::empty()).unwrap();
    assert!(matches!(
        HashTable::load(&stream[..]).unwrap_err(),
        StorageError::HeaderDecodeVersionMismatch
    ));
}

#[test]
fn rejects_future_version() {
    let mut header = StreamHeader::for_raw(&HashTable::new(32, 4).unwrap());
    header.version += 1;
    let mut stream = Vec::new();
    write_stream(&mut stream, &header, std::iter::empty()).unwrap();
    assert!(matches!(
        HashTable::load(&stream[..]).unwrap_err(),
        StorageError::HeaderDecodeVersionMismatch
    ));
}

#[test]
fn rejects_wrong_kind() {
    let t = HashTable::new(32, 12).unwrap();
    let mut stream = Vec::new();
    t.save(&mut stream).unwrap();
    assert!(matches!(
        StructuredTable::read(&stream[..]).unwrap_err(),
        StorageError::HeaderDecodeBadKind
    ));
    let t = structured12();
    let mut stream = Vec::new();
    t.write(&mut stream).unwrap();
    assert!(matches!(
        HashTable::load(&stream[..]).unwrap_err(),
        StorageError::HeaderDecodeBadKind
    ));
}

#[test]
fn rejects_unknown_type_code() {
    let mut header = StreamHeader::for_structured(&structured12());
    header.count = 0;
    header.value_format[1] = "X".to_owned();
    let mut stream = Vec::new();
    write_stream(&mut stream, &header, std::iter::empty()).unwrap();
    assert!(matches!(
        StructuredTable::read(&stream[..]).unwrap_err(),
        StorageError::HeaderDecodeUnknownTypeCode
    ));
}

#[test]
fn rejects_inconsistent_header() {
    // declared packed width disagrees with the format list
    let mut header = StreamHeader::for_structured(&structured12());
    header.count = 0;
    header.value_size += 1;
    let mut stream = Vec::new();
    write_stream(&mut stream, &header, std::iter::empty()).unwrap();
    assert!(matches!(
        StructuredTable::read(&stream[..]).unwrap_err(),
        StorageError::HeaderDecodeCorrupted
    ));
}

#[test]
fn rejects_corrupted_payload() {
    let t = structured12();
    let mut stream = Vec::new();
    t.write(&mut stream).unwrap();
    // flip one bit inside the last entry (just ahead of the trailer)
    let at = stream.len() - 9;
    stream[at] ^= 0x80;
    assert!(matches!(
        StructuredTable::read(&stream[..]).unwrap_err(),
        StorageError::ChecksumMismatch
    ));
}

#[test]
fn rejects_truncated_stream() {
    let t = structured12();
    let mut stream = Vec::new();
    t.write(&mut stream).unwrap();
    stream.truncate(stream.len() - 12);
    assert!(matches!(
        StructuredTable::read(&stream[..]).unwrap_err(),
        StorageError::Io(_)
    ));
    // nothing at all
    assert!(matches!(
        StructuredTable::read(&[][..]).unwrap_err(),
        StorageError::HeaderDecodeCorrupted
    ));
}
