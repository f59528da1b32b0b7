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

//! The module manager: registration, the per-tick lifecycle state
//! machine, and the render pass.

use keel_core::contain;
use keel_core::event::{EventAnchor, EventBus};
use keel_core::timer::Stopwatch;
use keel_threads::WorkerRegistry;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::flags::{ModuleFlags, ModuleStatus};
use crate::module::{FrameInfo, Module, ModuleContext, RenderContext};
use crate::reference::{ModuleRef, ModuleSlot};

/// Errors from module registration.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Another registered module already uses this name.
    #[error("module name '{0}' is already taken")]
    NameTaken(String),
}

/// Which lifecycle hook a [`HookReport`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// The init hook, at first load or as the second half of a reload.
    Init,
    /// The per-tick frame hook.
    Frame,
    /// The render-pass hook.
    Render,
    /// The teardown hook, at unload or as the first half of a reload.
    Teardown,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookPhase::Init => "init",
            HookPhase::Frame => "frame",
            HookPhase::Render => "render",
            HookPhase::Teardown => "teardown",
        })
    }
}

/// One hook invocation, as published on the manager's report bus.
#[derive(Debug, Clone)]
pub struct HookReport {
    /// Name of the module the hook belongs to.
    pub module: String,
    /// Which hook ran.
    pub phase: HookPhase,
    /// Wall-clock duration of the hook.
    pub elapsed: Duration,
    /// The failure message, if the hook returned an error or panicked.
    pub error: Option<String>,
}

impl HookReport {
    /// Returns `true` if the hook completed without error or panic.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Shared by-name lookup of registered modules.
///
/// Cheap to clone; clones share the same table. Handed to module hooks
/// through [`ModuleContext`] so modules can reach their siblings.
#[derive(Debug, Clone, Default)]
pub struct ModuleDirectory {
    modules: Arc<Mutex<HashMap<String, ModuleRef>>>,
}

impl ModuleDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<ModuleRef> {
        self.modules
            .lock()
            .expect("module table poisoned")
            .get(name)
            .cloned()
    }

    /// Returns the number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.lock().expect("module table poisoned").len()
    }

    /// Returns `true` if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, handle: ModuleRef) -> Result<(), ModuleError> {
        let mut modules = self.modules.lock().expect("module table poisoned");
        if modules.contains_key(handle.name()) {
            return Err(ModuleError::NameTaken(handle.name().to_string()));
        }
        modules.insert(handle.name().to_string(), handle);
        Ok(())
    }

    fn remove(&self, name: &str) {
        self.modules
            .lock()
            .expect("module table poisoned")
            .remove(name);
    }
}

struct ModuleEntry {
    handle: ModuleRef,
    module: Box<dyn Module>,
    /// Listener-ownership anchor for the current incarnation; replaced
    /// on reload so stale registrations die with the old incarnation.
    anchor: EventAnchor,
    /// Marked during a tick, removed at the end of it.
    retired: bool,
}

/// Owns registered modules and drives their lifecycle.
///
/// [`tick`](Self::tick) runs the state machine in a fixed order:
/// pending inits, then reloads, then teardowns, then flag updates, then
/// the frame hooks of every active running module. Lifecycle requests
/// arriving mid-tick are consumed on the next tick, so observers see
/// whole-tick granularity.
///
/// The manager itself lives on the main worker; [`render_pass`](Self::render_pass)
/// is the one method intended to run on the graphics worker's schedule.
pub struct ModuleManager {
    entries: Vec<ModuleEntry>,
    directory: ModuleDirectory,
    workers: WorkerRegistry,
    reports: EventBus<HookReport>,
    /// Info for the most recent tick; render passes reuse it.
    frame: FrameInfo,
    next_index: u64,
}

impl ModuleManager {
    /// Creates a manager with no modules.
    pub fn new(workers: WorkerRegistry) -> Self {
        Self {
            entries: Vec::new(),
            directory: ModuleDirectory::new(),
            workers,
            reports: EventBus::new(),
            frame: FrameInfo::default(),
            next_index: 0,
        }
    }

    /// Registers `module` under `name` and schedules its init for the
    /// next tick. `initial_flags` is applied as a request against
    /// [`ModuleFlags::DEFAULT`], so passing `EMPTY` loads the module
    /// with everything running.
    ///
    /// The returned handle is valid immediately, but the module is not
    /// active until its init succeeds.
    pub fn load_module(
        &mut self,
        name: impl Into<String>,
        path: Option<PathBuf>,
        module: Box<dyn Module>,
        initial_flags: ModuleFlags,
    ) -> Result<ModuleRef, ModuleError> {
        let name = name.into();
        let handle = ModuleRef::new(ModuleSlot::new(name.clone(), path, initial_flags));
        self.directory.insert(handle.clone())?;
        log::info!("Module '{name}' registered, init pending");
        self.entries.push(ModuleEntry {
            handle: handle.clone(),
            module,
            anchor: EventAnchor::new(),
            retired: false,
        });
        Ok(handle)
    }

    /// Returns the handle registered under `name`, if any.
    pub fn get_module(&self, name: &str) -> Option<ModuleRef> {
        self.directory.get(name)
    }

    /// Returns a shared view of the module table.
    pub fn modules(&self) -> ModuleDirectory {
        self.directory.clone()
    }

    /// Returns the hook-report sink. Drain or receive from it to
    /// observe hook timings and failures.
    pub fn reports(&self) -> &EventBus<HookReport> {
        &self.reports
    }

    /// Runs one tick of the lifecycle state machine.
    pub fn tick(&mut self, delta: Duration) {
        let Self {
            entries,
            directory,
            workers,
            reports,
            frame,
            next_index,
        } = self;
        frame.frame_index = *next_index;
        frame.delta = delta;
        *next_index += 1;
        let frame = *frame;

        // Pending inits.
        for entry in entries.iter_mut() {
            if !entry.handle.take_status(ModuleStatus::NEEDS_INIT) {
                continue;
            }
            let mut ctx = context(frame, workers, directory, &entry.anchor);
            if run_hook(reports, entry.handle.name(), HookPhase::Init, || {
                entry.module.init(&mut ctx)
            }) {
                entry.handle.set_status(ModuleStatus::ACTIVE);
                entry.handle.emit_loaded();
            } else {
                // A module that never came up is dropped at tick end;
                // its name frees up for a fresh load attempt.
                entry.retired = true;
            }
        }

        // Pending reloads: teardown and init back to back, same tick.
        for entry in entries.iter_mut() {
            if entry.retired || !entry.handle.take_status(ModuleStatus::NEEDS_RELOAD) {
                continue;
            }
            let name = entry.handle.name().to_string();
            log::info!("Module '{name}' reloading");
            let mut ctx = context(frame, workers, directory, &entry.anchor);
            run_hook(reports, &name, HookPhase::Teardown, || {
                entry.module.teardown(&mut ctx)
            });
            entry.anchor = EventAnchor::new();
            let mut ctx = context(frame, workers, directory, &entry.anchor);
            if run_hook(reports, &name, HookPhase::Init, || {
                entry.module.init(&mut ctx)
            }) {
                entry.handle.emit_loaded();
            } else {
                entry.handle.clear_status(ModuleStatus::ACTIVE);
                entry.retired = true;
            }
        }

        // Pending teardowns. The closed event fires while the module
        // is still active, before its teardown hook runs.
        for entry in entries.iter_mut() {
            if entry.retired || !entry.handle.take_status(ModuleStatus::NEEDS_TEARDOWN) {
                continue;
            }
            entry.handle.emit_closed();
            entry.handle.clear_status(ModuleStatus::ACTIVE);
            let mut ctx = context(frame, workers, directory, &entry.anchor);
            run_hook(reports, entry.handle.name(), HookPhase::Teardown, || {
                entry.module.teardown(&mut ctx)
            });
            // A failed teardown still unloads; retrying it would run
            // the hook against half-released state.
            entry.retired = true;
        }

        // Pending flag updates, applied before this tick's frame hooks
        // so a pause requested last tick skips this tick's frame.
        for entry in entries.iter_mut() {
            if entry.retired || !entry.handle.take_status(ModuleStatus::NEEDS_FLAG_UPDATE) {
                continue;
            }
            for change in entry.handle.apply_pending_flags() {
                log::debug!(
                    "Module '{}' capability {:?} -> {}",
                    entry.handle.name(),
                    change.capability,
                    change.enabled
                );
                entry.handle.emit_flag_changed(change);
            }
        }

        // Frame hooks.
        for entry in entries.iter_mut() {
            if entry.retired
                || !entry.handle.is_active()
                || !entry.handle.flags().contains(ModuleFlags::RUN_ON_FRAME)
            {
                continue;
            }
            let mut ctx = context(frame, workers, directory, &entry.anchor);
            run_hook(reports, entry.handle.name(), HookPhase::Frame, || {
                entry.module.frame(&mut ctx)
            });
        }

        entries.retain(|entry| {
            if entry.retired {
                log::info!("Module '{}' unloaded", entry.handle.name());
                directory.remove(entry.handle.name());
                false
            } else {
                true
            }
        });
    }

    /// Runs the render hook of every active module whose render
    /// capability is running. Reads lifecycle and flag state but never
    /// mutates it; safe to interleave with ticks from the graphics
    /// worker's schedule.
    pub fn render_pass(&mut self) {
        let Self {
            entries,
            workers,
            reports,
            frame,
            ..
        } = self;
        for entry in entries.iter_mut() {
            if !entry.handle.is_active()
                || !entry.handle.flags().contains(ModuleFlags::RUN_ON_RENDER)
            {
                continue;
            }
            let mut ctx = RenderContext {
                frame: *frame,
                workers: workers.clone(),
            };
            run_hook(reports, entry.handle.name(), HookPhase::Render, || {
                entry.module.render(&mut ctx)
            });
        }
    }

    /// Tears down every remaining module, in reverse load order.
    ///
    /// Closed events fire exactly as they do for a per-module unload.
    pub fn shutdown(&mut self) {
        let Self {
            entries,
            directory,
            workers,
            reports,
            frame,
            ..
        } = self;
        let frame = *frame;
        for entry in entries.iter_mut().rev() {
            if entry.handle.is_active() {
                entry.handle.emit_closed();
                entry.handle.clear_status(ModuleStatus::ACTIVE);
                let mut ctx = context(frame, workers, directory, &entry.anchor);
                run_hook(reports, entry.handle.name(), HookPhase::Teardown, || {
                    entry.module.teardown(&mut ctx)
                });
            }
            directory.remove(entry.handle.name());
        }
        entries.clear();
    }
}

fn context(
    frame: FrameInfo,
    workers: &WorkerRegistry,
    directory: &ModuleDirectory,
    anchor: &EventAnchor,
) -> ModuleContext {
    ModuleContext {
        frame,
        workers: workers.clone(),
        modules: directory.clone(),
        anchor: anchor.clone(),
    }
}

/// Runs one hook under containment, publishes a report, and returns
/// whether the hook succeeded. An error or panic is logged and
/// reported; it never unwinds into the tick.
fn run_hook(
    reports: &EventBus<HookReport>,
    name: &str,
    phase: HookPhase,
    hook: impl FnOnce() -> anyhow::Result<()>,
) -> bool {
    let watch = Stopwatch::new();
    let error = match contain::contain(hook) {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(message) => Some(format!("panicked: {message}")),
    };
    let success = error.is_none();
    if let Some(message) = &error {
        log::error!("Module '{name}' {phase} hook failed: {message}");
    }
    reports.publish(HookReport {
        module: name.to_string(),
        phase,
        elapsed: watch.elapsed(),
        error,
    });
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records hook invocations into a shared trace, with switchable
    /// failure modes.
    struct Probe {
        name: &'static str,
        trace: Arc<Mutex<Vec<String>>>,
        fail_init: Arc<AtomicBool>,
        panic_frame: Arc<AtomicBool>,
    }

    impl Probe {
        fn new(name: &'static str, trace: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                trace: trace.clone(),
                fail_init: Arc::new(AtomicBool::new(false)),
                panic_frame: Arc::new(AtomicBool::new(false)),
            }
        }

        fn record(&self, hook: &str) {
            self.trace
                .lock()
                .unwrap()
                .push(format!("{}:{hook}", self.name));
        }
    }

    impl Module for Probe {
        fn init(&mut self, _ctx: &mut ModuleContext) -> anyhow::Result<()> {
            self.record("init");
            if self.fail_init.load(Ordering::SeqCst) {
                anyhow::bail!("init refused");
            }
            Ok(())
        }

        fn frame(&mut self, _ctx: &mut ModuleContext) -> anyhow::Result<()> {
            self.record("frame");
            if self.panic_frame.load(Ordering::SeqCst) {
                panic!("frame exploded");
            }
            Ok(())
        }

        fn render(&mut self, _ctx: &mut RenderContext) -> anyhow::Result<()> {
            self.record("render");
            Ok(())
        }

        fn teardown(&mut self, _ctx: &mut ModuleContext) -> anyhow::Result<()> {
            self.record("teardown");
            Ok(())
        }
    }

    fn manager() -> ModuleManager {
        ModuleManager::new(WorkerRegistry::new())
    }

    fn tick(m: &mut ModuleManager) {
        m.tick(Duration::from_millis(16));
    }

    fn trace_of(trace: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        trace.lock().unwrap().clone()
    }

    #[test]
    fn first_tick_inits_then_frames() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        let handle = manager
            .load_module(
                "alpha",
                None,
                Box::new(Probe::new("alpha", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        assert!(!handle.is_active());

        tick(&mut manager);
        assert!(handle.is_active());
        assert_eq!(trace_of(&trace), vec!["alpha:init", "alpha:frame"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        manager
            .load_module(
                "alpha",
                None,
                Box::new(Probe::new("alpha", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        let second = manager.load_module(
            "alpha",
            None,
            Box::new(Probe::new("alpha", &trace)),
            ModuleFlags::EMPTY,
        );
        assert!(matches!(second, Err(ModuleError::NameTaken(name)) if name == "alpha"));
    }

    #[test]
    fn failed_init_retires_the_module_and_spares_siblings() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        let bad = Probe::new("bad", &trace);
        bad.fail_init.store(true, Ordering::SeqCst);
        let bad_handle = manager
            .load_module("bad", None, Box::new(bad), ModuleFlags::EMPTY)
            .unwrap();
        manager
            .load_module(
                "good",
                None,
                Box::new(Probe::new("good", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();

        tick(&mut manager);
        assert!(!bad_handle.is_active());
        assert!(manager.get_module("bad").is_none(), "name freed");
        assert!(manager.get_module("good").is_some());
        assert_eq!(
            trace_of(&trace),
            vec!["bad:init", "good:init", "good:frame"]
        );

        let reports = manager.reports().drain();
        let failed: Vec<_> = reports.iter().filter(|r| !r.success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].module, "bad");
        assert_eq!(failed[0].phase, HookPhase::Init);
    }

    #[test]
    fn pause_request_skips_the_next_frame() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        let handle = manager
            .load_module(
                "alpha",
                None,
                Box::new(Probe::new("alpha", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();

        tick(&mut manager);
        handle.set_flags(ModuleFlags::PAUSE_ON_FRAME);
        // The flag update lands before this tick's frame hooks.
        tick(&mut manager);
        assert_eq!(trace_of(&trace), vec!["alpha:init", "alpha:frame"]);

        handle.set_flags(ModuleFlags::RUN_ON_FRAME);
        tick(&mut manager);
        assert_eq!(
            trace_of(&trace),
            vec!["alpha:init", "alpha:frame", "alpha:frame"]
        );
    }

    #[test]
    fn close_fires_closed_before_teardown_and_frees_the_name() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        let handle = manager
            .load_module(
                "alpha",
                None,
                Box::new(Probe::new("alpha", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        tick(&mut manager);

        let anchor = EventAnchor::new();
        let closed_trace = trace.clone();
        handle.on_closed(&anchor, move |module| {
            closed_trace
                .lock()
                .unwrap()
                .push(format!("{}:closed(active={})", module.name(), module.is_active()));
        });

        assert!(handle.request_close());
        tick(&mut manager);
        assert_eq!(
            trace_of(&trace),
            vec![
                "alpha:init",
                "alpha:frame",
                "alpha:closed(active=true)",
                "alpha:teardown"
            ]
        );
        assert!(!handle.is_active());
        assert!(manager.get_module("alpha").is_none());

        // The name can be reused by a fresh load.
        assert!(manager
            .load_module(
                "alpha",
                None,
                Box::new(Probe::new("alpha2", &trace)),
                ModuleFlags::EMPTY
            )
            .is_ok());
    }

    #[test]
    fn reload_runs_teardown_then_init_in_one_tick() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        let handle = manager
            .load_module(
                "alpha",
                None,
                Box::new(Probe::new("alpha", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        tick(&mut manager);

        assert!(handle.request_reload());
        tick(&mut manager);
        assert!(handle.is_active());
        assert_eq!(
            trace_of(&trace),
            vec![
                "alpha:init",
                "alpha:frame",
                "alpha:teardown",
                "alpha:init",
                "alpha:frame"
            ]
        );
    }

    #[test]
    fn panicking_frame_hook_is_contained_and_reported() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        let volatile = Probe::new("volatile", &trace);
        let panic_frame = volatile.panic_frame.clone();
        manager
            .load_module("volatile", None, Box::new(volatile), ModuleFlags::EMPTY)
            .unwrap();
        manager
            .load_module(
                "steady",
                None,
                Box::new(Probe::new("steady", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        tick(&mut manager);

        panic_frame.store(true, Ordering::SeqCst);
        manager.reports().drain();
        tick(&mut manager);

        // The sibling still framed after the panic.
        assert!(trace_of(&trace).ends_with(&[
            "volatile:frame".to_string(),
            "steady:frame".to_string()
        ]));

        let failed: Vec<_> = manager
            .reports()
            .drain()
            .into_iter()
            .filter(|r| !r.success())
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].module, "volatile");
        assert!(failed[0].error.as_deref().unwrap().contains("frame exploded"));

        // The module keeps running on later ticks.
        panic_frame.store(false, Ordering::SeqCst);
        tick(&mut manager);
        assert!(manager.get_module("volatile").unwrap().is_active());
    }

    #[test]
    fn render_pass_respects_the_render_flag() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        manager
            .load_module(
                "drawn",
                None,
                Box::new(Probe::new("drawn", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        manager
            .load_module(
                "hidden",
                None,
                Box::new(Probe::new("hidden", &trace)),
                ModuleFlags::PAUSE_ON_RENDER,
            )
            .unwrap();
        tick(&mut manager);

        trace.lock().unwrap().clear();
        manager.render_pass();
        assert_eq!(trace_of(&trace), vec!["drawn:render"]);
    }

    #[test]
    fn shutdown_tears_down_in_reverse_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        manager
            .load_module(
                "first",
                None,
                Box::new(Probe::new("first", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        manager
            .load_module(
                "second",
                None,
                Box::new(Probe::new("second", &trace)),
                ModuleFlags::EMPTY,
            )
            .unwrap();
        tick(&mut manager);

        trace.lock().unwrap().clear();
        manager.shutdown();
        assert_eq!(trace_of(&trace), vec!["second:teardown", "first:teardown"]);
        assert!(manager.modules().is_empty());
    }
}
