// Copyright 2026 keel contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Chunked append-only byte log backing [`CommandBuffer`](super::CommandBuffer).

/// Chunk size used by command buffers unless overridden.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// A cursor into the chunk chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    chunk: usize,
    offset: usize,
}

/// Append-only byte log over a chain of fixed-size chunks.
///
/// A record never straddles a chunk boundary: when a record does not
/// fit in the current chunk's remainder, the cursor moves to the next
/// chunk (allocating it on the write side). Because the reader replays
/// the exact record-size sequence the writer produced, both sides skip
/// the same padding and stay in lockstep without any length framing.
#[derive(Debug, Clone)]
pub(super) struct ChunkedLog<const CHUNK_SIZE: usize = DEFAULT_CHUNK_SIZE> {
    chunks: Vec<Box<[u8; CHUNK_SIZE]>>,
    write: Cursor,
    read: Cursor,
}

impl<const CHUNK_SIZE: usize> ChunkedLog<CHUNK_SIZE> {
    pub(super) fn new() -> Self {
        Self {
            chunks: Vec::new(),
            write: Cursor::default(),
            read: Cursor::default(),
        }
    }

    /// Appends `bytes` as one record at the write cursor.
    ///
    /// Panics if the record is larger than a chunk; protocols reject
    /// such payloads at compile time, so hitting this means the buffer
    /// was fed a record bypassing the protocol's static size check.
    pub(super) fn write_bytes(&mut self, bytes: &[u8]) {
        let len = bytes.len();
        assert!(
            len <= CHUNK_SIZE,
            "record of {len} bytes exceeds chunk size {CHUNK_SIZE}"
        );
        if CHUNK_SIZE - self.write.offset < len {
            self.write.chunk += 1;
            self.write.offset = 0;
        }
        if self.write.chunk == self.chunks.len() {
            self.chunks.push(Box::new([0u8; CHUNK_SIZE]));
        }
        let chunk = &mut self.chunks[self.write.chunk];
        chunk[self.write.offset..self.write.offset + len].copy_from_slice(bytes);
        self.write.offset += len;
    }

    /// Reads the next record of `len` bytes at the read cursor, or
    /// `None` if that would pass the last written position.
    pub(super) fn read_bytes(&mut self, len: usize) -> Option<&[u8]> {
        assert!(
            len <= CHUNK_SIZE,
            "record of {len} bytes exceeds chunk size {CHUNK_SIZE}"
        );
        let mut cursor = self.read;
        // Mirror the writer's skip-to-next-chunk rule.
        if CHUNK_SIZE - cursor.offset < len {
            cursor.chunk += 1;
            cursor.offset = 0;
        }
        // End of stream: the read cursor never passes the write cursor.
        if cursor.chunk > self.write.chunk
            || (cursor.chunk == self.write.chunk && cursor.offset + len > self.write.offset)
        {
            return None;
        }
        let start = cursor.offset;
        self.read = Cursor {
            chunk: cursor.chunk,
            offset: start + len,
        };
        Some(&self.chunks[cursor.chunk][start..start + len])
    }

    /// Resets the read cursor to the start without discarding data.
    pub(super) fn rewind(&mut self) {
        self.read = Cursor::default();
    }

    /// Resets both cursors and zeroes all chunk storage for reuse.
    pub(super) fn clear(&mut self) {
        self.read = Cursor::default();
        self.write = Cursor::default();
        for chunk in &mut self.chunks {
            chunk.fill(0);
        }
    }

    /// Returns `true` if nothing has been written since creation or
    /// the last [`clear`](Self::clear).
    pub(super) fn is_empty(&self) -> bool {
        self.write == Cursor::default()
    }

    #[cfg(test)]
    pub(super) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
