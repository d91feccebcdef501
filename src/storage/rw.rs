/*
 * Created on Mon Feb 19 2024
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
    crc::{Crc, Digest, CRC_64_XZ},
    std::io::{Read, Result as IoResult, Write},
};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// Running CRC-64/XZ over a byte stream
pub(super) struct StreamCrc64 {
    digest: Digest<'static, u64>,
}

impl StreamCrc64 {
    pub const fn new() -> Self {
        Self {
            digest: CRC64.digest(),
        }
    }
    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes)
    }
    pub fn finish(self) -> u64 {
        self.digest.finalize()
    }
}

/// A writer that checksums and counts everything written through it. The
/// checksum trailer itself is written to the inner stream after
/// [`TrackedWriter::finish`]
pub(super) struct TrackedWriter<W: Write> {
    inner: W,
    crc: StreamCrc64,
    written: u64,
}

impl<W: Write> TrackedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            crc: StreamCrc64::new(),
            written: 0,
        }
    }
    pub const fn written(&self) -> u64 {
        self.written
    }
    pub fn finish(self) -> (W, u64) {
        (self.inner, self.crc.finish())
    }
}

impl<W: Write> Write for TrackedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let n = self.inner.write(buf)?;
        self.crc.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> IoResult<()> {
        self.inner.flush()
    }
}

/// A reader that checksums and counts everything read through it, so the
/// trailer can be verified once the payload has been consumed
pub(super) struct TrackedReader<R: Read> {
    inner: R,
    crc: StreamCrc64,
    read: u64,
}

impl<R: Read> TrackedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            crc: StreamCrc64::new(),
            read: 0,
        }
    }
    pub const fn read_so_far(&self) -> u64 {
        self.read
    }
    pub fn finish(self) -> (R, u64) {
        (self.inner, self.crc.finish())
    }
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let n = self.inner.read(buf)?;
        self.crc.update(&buf[..n]);
        self.read += n as u64;
        Ok(n)
    }
}
