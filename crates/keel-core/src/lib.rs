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

//! # Keel Core
//!
//! Foundational crate for the keel runtime coordination layer: the
//! chunked binary command-buffer transport, the weak-owner event
//! listener primitives, and small shared utilities (bitflag sets,
//! hook timing).

#![warn(missing_docs)]

pub mod command;
pub mod contain;
pub mod event;
pub mod flags;
pub mod timer;

pub use command::{Command, CommandBuffer, CommandTag};
pub use event::{Event, EventAnchor, EventBus};
pub use timer::Stopwatch;
