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

//! The module trait and the contexts its hooks receive.

use keel_core::event::EventAnchor;
use keel_threads::WorkerRegistry;
use std::time::Duration;

use crate::manager::ModuleDirectory;

/// Timing for the current tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInfo {
    /// Monotonic tick counter, starting at 0.
    pub frame_index: u64,
    /// Wall-clock time since the previous tick.
    pub delta: Duration,
}

/// Context handed to `init`, `frame`, and `teardown` hooks.
///
/// All fields are cheap shared handles; hooks that need to run work on
/// another thread resolve a worker through `workers` and post a task —
/// the manager does not wait for cross-thread work before moving to
/// the next module.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Timing for the current tick.
    pub frame: FrameInfo,
    /// Role registry for reaching the main and graphics workers.
    pub workers: WorkerRegistry,
    /// Lookup of other loaded modules by name.
    pub modules: ModuleDirectory,
    /// Listener-ownership anchor for this module. Listener
    /// registrations made with it are detached automatically when the
    /// module is unloaded.
    pub anchor: EventAnchor,
}

/// Context handed to the render hook. Deliberately narrower than
/// [`ModuleContext`]: the render pass reads lifecycle and flag state
/// but never mutates it.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Timing for the tick this render pass belongs to.
    pub frame: FrameInfo,
    /// Role registry, for verifying thread affinity or posting
    /// follow-up work.
    pub workers: WorkerRegistry,
}

/// A pluggable unit of application behavior.
///
/// Hooks are invoked by the [`ModuleManager`](crate::ModuleManager) in
/// this order over a module's life: `init` once, then `frame` each
/// tick and `render` each render pass while the matching run flag is
/// set, then `teardown` once. Every hook runs under the containment
/// wrapper: a returned error or a panic is recorded and reported but
/// never stops sibling modules or the frame.
pub trait Module: Send {
    /// Brings the module up. Failure means the module never becomes
    /// active and its on-loaded event never fires.
    fn init(&mut self, ctx: &mut ModuleContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Per-tick work. Skipped while the frame capability is paused.
    fn frame(&mut self, ctx: &mut ModuleContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Render-phase work, run on the graphics worker's pass. Skipped
    /// while the render capability is paused.
    fn render(&mut self, ctx: &mut RenderContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Releases the module's resources. Runs at unload and as the
    /// first half of a reload.
    fn teardown(&mut self, ctx: &mut ModuleContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }
}
