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

//! Typed facade over the chunked byte log.

use bytemuck::Pod;
use std::fmt;
use std::marker::PhantomData;

use super::chunk::{ChunkedLog, DEFAULT_CHUNK_SIZE};

/// A command-buffer tag enumerant.
///
/// One tag type identifies one protocol: a closed set of payload types.
/// The reserved [`NONE`](CommandTag::NONE) value (raw `0`) marks end of
/// stream and must never be written as a record tag. Implemented by
/// the enum that [`command_protocol!`](crate::command_protocol)
/// generates; hand-written impls must uphold the same rules.
pub trait CommandTag: Copy + Eq + fmt::Debug + Send + 'static {
    /// The reserved end-of-stream value, raw `0`.
    const NONE: Self;

    /// Returns the raw wire value of this tag.
    fn to_raw(self) -> u16;

    /// Maps a raw wire value back to a tag, or `None` if the value is
    /// not part of the protocol.
    fn from_raw(raw: u16) -> Option<Self>;
}

/// A payload that executes itself when dispatched (command semantics).
pub trait Command {
    /// Performs the command's effect.
    fn execute(self);
}

/// Links a payload type to its tag within protocol `C`.
///
/// Generated by [`command_protocol!`](crate::command_protocol) for
/// every declared payload, enabling [`CommandBuffer::push`].
pub trait CommandRecord<C: CommandTag>: Pod {
    /// The tag this payload is written under.
    const TAG: C;
}

/// Receives one payload of type `T` during a visitor pass (event
/// semantics). A protocol's generated `visit` routine requires the
/// visitor to implement `Visit<T>` for every payload in the protocol,
/// so a missing case is a compile error rather than a silent skip.
pub trait Visit<T> {
    /// Handles one record.
    fn visit(&mut self, record: T);
}

/// An append-only log of tagged, trivially copyable records.
///
/// Records are laid out as `[raw tag: u16][payload bytes]` with no
/// per-record allocation; storage is a chain of `CHUNK_SIZE`-byte
/// chunks grown on demand. The write cursor only ever advances; the
/// read cursor scans front-to-back and can be rewound, but no record
/// is ever removed from the middle of the chain.
#[derive(Debug, Clone)]
pub struct CommandBuffer<C: CommandTag, const CHUNK_SIZE: usize = DEFAULT_CHUNK_SIZE> {
    log: ChunkedLog<CHUNK_SIZE>,
    _protocol: PhantomData<C>,
}

impl<C: CommandTag, const CHUNK_SIZE: usize> CommandBuffer<C, CHUNK_SIZE> {
    /// Creates an empty buffer. No chunk is allocated until the first
    /// write.
    pub fn new() -> Self {
        Self {
            log: ChunkedLog::new(),
            _protocol: PhantomData,
        }
    }

    /// Appends one tagged record.
    ///
    /// `tag` must not be [`CommandTag::NONE`]; writing the reserved
    /// end-of-stream value would truncate the log for readers.
    pub fn write<T: Pod>(&mut self, tag: C, payload: &T) {
        debug_assert!(tag != C::NONE, "NONE is reserved for end of stream");
        self.log.write_bytes(&tag.to_raw().to_le_bytes());
        self.log.write_bytes(bytemuck::bytes_of(payload));
    }

    /// Appends a record under the tag its protocol declares for `T`.
    pub fn push<T: CommandRecord<C>>(&mut self, payload: T) {
        self.write(T::TAG, &payload);
    }

    /// Returns the next tag in log order, or [`CommandTag::NONE`] at
    /// end of stream.
    pub fn read_next(&mut self) -> C {
        let Some(bytes) = self.log.read_bytes(2) else {
            return C::NONE;
        };
        let raw = u16::from_le_bytes([bytes[0], bytes[1]]);
        match C::from_raw(raw) {
            Some(tag) => tag,
            None => {
                // Tags only come from `write` in-process, so an unknown
                // raw value means the buffer was read with the wrong
                // protocol type or the stream is corrupt.
                debug_assert!(false, "unknown raw tag {raw} in command stream");
                log::error!("Unknown raw tag {raw} in command stream; stopping dispatch.");
                C::NONE
            }
        }
    }

    /// Returns the payload following the most recently read tag, or
    /// `None` at end of stream. The caller matches `T` to the tag via
    /// the protocol's static mapping.
    pub fn read<T: Pod>(&mut self) -> Option<T> {
        self.log
            .read_bytes(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
    }

    /// Resets the read cursor to the beginning without discarding data.
    pub fn rewind_read_head(&mut self) {
        self.log.rewind();
    }

    /// Resets both cursors and zeroes storage for safe reuse.
    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Returns `true` if no record has been written since creation or
    /// the last [`clear`](Self::clear).
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl<C: CommandTag, const CHUNK_SIZE: usize> Default for CommandBuffer<C, CHUNK_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u16)]
    enum TestTag {
        None = 0,
        Move = 1,
        Fire = 2,
    }

    impl CommandTag for TestTag {
        const NONE: Self = TestTag::None;

        fn to_raw(self) -> u16 {
            self as u16
        }

        fn from_raw(raw: u16) -> Option<Self> {
            match raw {
                0 => Some(TestTag::None),
                1 => Some(TestTag::Move),
                2 => Some(TestTag::Fire),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Move {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Fire {
        weapon: u32,
    }

    #[test]
    fn written_sequence_reads_back_in_order() {
        let mut buffer: CommandBuffer<TestTag> = CommandBuffer::new();
        buffer.write(TestTag::Move, &Move { dx: 1.0, dy: 2.0 });
        buffer.write(TestTag::Fire, &Fire { weapon: 7 });
        buffer.write(TestTag::Move, &Move { dx: -3.0, dy: 0.5 });

        assert_eq!(buffer.read_next(), TestTag::Move);
        assert_eq!(buffer.read::<Move>(), Some(Move { dx: 1.0, dy: 2.0 }));
        assert_eq!(buffer.read_next(), TestTag::Fire);
        assert_eq!(buffer.read::<Fire>(), Some(Fire { weapon: 7 }));
        assert_eq!(buffer.read_next(), TestTag::Move);
        assert_eq!(buffer.read::<Move>(), Some(Move { dx: -3.0, dy: 0.5 }));
        assert_eq!(buffer.read_next(), TestTag::None);
    }

    #[test]
    fn rewind_then_reread_yields_same_sequence() {
        let mut buffer: CommandBuffer<TestTag> = CommandBuffer::new();
        buffer.write(TestTag::Fire, &Fire { weapon: 1 });
        assert_eq!(buffer.read_next(), TestTag::Fire);
        assert_eq!(buffer.read::<Fire>(), Some(Fire { weapon: 1 }));
        assert_eq!(buffer.read_next(), TestTag::None);

        buffer.rewind_read_head();
        assert_eq!(buffer.read_next(), TestTag::Fire);
        assert_eq!(buffer.read::<Fire>(), Some(Fire { weapon: 1 }));
        assert_eq!(buffer.read_next(), TestTag::None);
    }

    #[test]
    fn read_at_end_of_stream_returns_none() {
        let mut buffer: CommandBuffer<TestTag> = CommandBuffer::new();
        assert_eq!(buffer.read_next(), TestTag::None);
        assert_eq!(buffer.read::<Move>(), None);
    }

    #[test]
    fn spans_multiple_chunks_transparently() {
        // 32-byte chunks: each Move record is 2 (tag) + 8 (payload)
        // bytes, so 100 records span many chunks.
        let mut buffer: CommandBuffer<TestTag, 32> = CommandBuffer::new();
        for i in 0..100 {
            buffer.write(
                TestTag::Move,
                &Move {
                    dx: i as f32,
                    dy: -(i as f32),
                },
            );
        }
        for i in 0..100 {
            assert_eq!(buffer.read_next(), TestTag::Move);
            assert_eq!(
                buffer.read::<Move>(),
                Some(Move {
                    dx: i as f32,
                    dy: -(i as f32),
                })
            );
        }
        assert_eq!(buffer.read_next(), TestTag::None);
    }

    #[test]
    fn clear_allows_reuse() {
        let mut buffer: CommandBuffer<TestTag> = CommandBuffer::new();
        buffer.write(TestTag::Fire, &Fire { weapon: 3 });
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.read_next(), TestTag::None);

        buffer.write(TestTag::Move, &Move { dx: 0.0, dy: 1.0 });
        assert_eq!(buffer.read_next(), TestTag::Move);
        assert_eq!(buffer.read::<Move>(), Some(Move { dx: 0.0, dy: 1.0 }));
    }

    #[test]
    fn buffer_moves_across_threads() {
        let mut buffer: CommandBuffer<TestTag> = CommandBuffer::new();
        buffer.write(TestTag::Fire, &Fire { weapon: 9 });

        // The intended pattern: fill, then hand ownership to a consumer.
        let handle = std::thread::spawn(move || {
            let mut buffer = buffer;
            assert_eq!(buffer.read_next(), TestTag::Fire);
            buffer.read::<Fire>().map(|f| f.weapon)
        });
        assert_eq!(handle.join().unwrap(), Some(9));
    }
}
