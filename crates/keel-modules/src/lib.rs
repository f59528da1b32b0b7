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

//! # Keel Modules
//!
//! The module lifecycle layer: registration, per-tick state-machine
//! processing (init, reload, teardown, flag updates, frame hooks), a
//! read-only render pass, and lifecycle events delivered through
//! weak-owner listeners.
//!
//! One module's failure degrades only that module: every hook runs
//! under the containment wrapper and is reported, never propagated.

#![warn(missing_docs)]

pub mod flags;
pub mod manager;
pub mod module;
pub mod reference;

pub use flags::{FlagChange, ModuleFlags, ModuleStatus};
pub use manager::{HookPhase, HookReport, ModuleDirectory, ModuleError, ModuleManager};
pub use module::{FrameInfo, Module, ModuleContext, RenderContext};
pub use reference::{ModuleRef, WeakModuleRef};
