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

//! The binary command-buffer transport.
//!
//! A [`CommandBuffer`] is an append-only log of tagged, trivially
//! copyable records, backed by a chain of fixed-size chunks. One thread
//! fills a buffer completely, hands it across a worker queue, and the
//! receiving thread drains it with a protocol-generated dispatch or
//! visitor routine. A single buffer is never written and read
//! concurrently; the hand-off through the queue is the synchronization
//! point, so the buffer itself carries no locks.
//!
//! Protocols (a closed set of tag/payload pairs) are declared with the
//! [`command_protocol!`](crate::command_protocol) macro.

mod buffer;
mod chunk;
mod protocol;

pub use buffer::{Command, CommandBuffer, CommandRecord, CommandTag, Visit};
pub use chunk::DEFAULT_CHUNK_SIZE;
