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

//! Stable handles to registered modules.

use keel_core::event::{Event, EventAnchor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::flags::{apply_request, FlagChange, ModuleFlags, ModuleStatus, FLAG_PAIRS};

/// Canonical shared state for one registered module.
///
/// The flag and status bitmaps are atomics because flag requests and
/// lifecycle requests may arrive from any thread; the manager's tick
/// consumes them single-threaded on its owning thread.
pub(crate) struct ModuleSlot {
    name: String,
    path: Option<PathBuf>,
    /// Applied run-state flags; exactly one bit of each pair is set.
    effective: AtomicU32,
    /// Desired run-state flags, applied on the next tick.
    pending: AtomicU32,
    status: AtomicU32,
    on_loaded: Mutex<Event<ModuleRef>>,
    on_closed: Mutex<Event<ModuleRef>>,
    on_flag_changed: Mutex<Event<(ModuleRef, FlagChange)>>,
}

impl ModuleSlot {
    pub(crate) fn new(name: String, path: Option<PathBuf>, initial: ModuleFlags) -> Self {
        // Normalizing against DEFAULT guarantees exactly one bit per
        // pair in the effective state from the start.
        let flags = apply_request(ModuleFlags::DEFAULT, initial);
        Self {
            name,
            path,
            effective: AtomicU32::new(flags.bits()),
            pending: AtomicU32::new(flags.bits()),
            status: AtomicU32::new(ModuleStatus::NEEDS_INIT.bits()),
            on_loaded: Mutex::new(Event::new()),
            on_closed: Mutex::new(Event::new()),
            on_flag_changed: Mutex::new(Event::new()),
        }
    }
}

/// A stable, weakly observable handle to a registered module.
///
/// Clones are cheap and share the same underlying state. The handle
/// stays valid after the module is unloaded, but
/// [`is_active`](Self::is_active) turns false; holders must check it
/// before each use because the module may be unloaded between frames.
#[derive(Clone)]
pub struct ModuleRef {
    slot: Arc<ModuleSlot>,
}

impl ModuleRef {
    pub(crate) fn new(slot: ModuleSlot) -> Self {
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Returns the module's display name.
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Returns the source path the module was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.slot.path.as_deref()
    }

    /// Returns the applied run-state flags.
    pub fn flags(&self) -> ModuleFlags {
        ModuleFlags::from_bits(self.slot.effective.load(Ordering::Acquire))
    }

    /// Returns the pending lifecycle status bits.
    pub fn status(&self) -> ModuleStatus {
        ModuleStatus::from_bits(self.slot.status.load(Ordering::Acquire))
    }

    /// Returns `true` strictly between a successful init and the start
    /// of teardown.
    pub fn is_active(&self) -> bool {
        self.status().contains(ModuleStatus::ACTIVE)
    }

    /// Requests a run-state change. May be called from any thread.
    ///
    /// For each run/pause pair the request touches (exactly one bit of
    /// the pair present), the desired state is updated; pairs with
    /// neither or both bits are untouched. If the desired state now
    /// differs from the applied state, a flag update is scheduled for
    /// the next tick — changes are batched and applied at most once
    /// per tick, never synchronously here.
    pub fn set_flags(&self, request: ModuleFlags) {
        let mut current = self.slot.pending.load(Ordering::Acquire);
        loop {
            let next = apply_request(ModuleFlags::from_bits(current), request);
            if next.bits() == current {
                break;
            }
            match self.slot.pending.compare_exchange_weak(
                current,
                next.bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        let pending = self.slot.pending.load(Ordering::Acquire);
        if pending != self.slot.effective.load(Ordering::Acquire) {
            self.set_status(ModuleStatus::NEEDS_FLAG_UPDATE);
        }
    }

    /// Schedules a teardown-then-init for the next tick. Returns
    /// `false` if the module is not active.
    pub fn request_reload(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.set_status(ModuleStatus::NEEDS_RELOAD);
        true
    }

    /// Schedules a teardown for the next tick. Returns `false` if the
    /// module is not active.
    pub fn request_close(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.set_status(ModuleStatus::NEEDS_TEARDOWN);
        true
    }

    /// Registers a callback fired after this module's `init` succeeds.
    /// The registration lives as long as `anchor`.
    pub fn on_loaded<F>(&self, anchor: &EventAnchor, callback: F)
    where
        F: Fn(&ModuleRef) + Send + 'static,
    {
        self.slot
            .on_loaded
            .lock()
            .expect("listener list poisoned")
            .connect(anchor, callback);
    }

    /// Registers a callback fired before this module's `teardown` runs.
    pub fn on_closed<F>(&self, anchor: &EventAnchor, callback: F)
    where
        F: Fn(&ModuleRef) + Send + 'static,
    {
        self.slot
            .on_closed
            .lock()
            .expect("listener list poisoned")
            .connect(anchor, callback);
    }

    /// Registers a callback fired once per capability whose effective
    /// value changed, when a flag update is applied.
    pub fn on_flag_changed<F>(&self, anchor: &EventAnchor, callback: F)
    where
        F: Fn(&ModuleRef, &FlagChange) + Send + 'static,
    {
        self.slot
            .on_flag_changed
            .lock()
            .expect("listener list poisoned")
            .connect(anchor, move |(module, change)| callback(module, change));
    }

    /// Downgrades to a weak handle that does not keep the slot alive.
    pub fn downgrade(&self) -> WeakModuleRef {
        WeakModuleRef {
            slot: Arc::downgrade(&self.slot),
        }
    }

    // --- manager-side operations, all called from the tick thread ---

    pub(crate) fn set_status(&self, bits: ModuleStatus) {
        self.slot.status.fetch_or(bits.bits(), Ordering::AcqRel);
    }

    pub(crate) fn clear_status(&self, bits: ModuleStatus) {
        self.slot.status.fetch_and(!bits.bits(), Ordering::AcqRel);
    }

    /// Clears `bit` and returns whether it was set (consume-once).
    pub(crate) fn take_status(&self, bit: ModuleStatus) -> bool {
        let previous = self.slot.status.fetch_and(!bit.bits(), Ordering::AcqRel);
        ModuleStatus::from_bits(previous).contains(bit)
    }

    /// Applies the pending flags to the effective state, returning one
    /// [`FlagChange`] per capability whose value actually changed.
    pub(crate) fn apply_pending_flags(&self) -> Vec<FlagChange> {
        let pending = ModuleFlags::from_bits(self.slot.pending.load(Ordering::Acquire));
        let effective = ModuleFlags::from_bits(self.slot.effective.load(Ordering::Acquire));
        let mut changes = Vec::new();
        for (run, _pause) in FLAG_PAIRS {
            let was = effective.contains(run);
            let now = pending.contains(run);
            if was != now {
                changes.push(FlagChange {
                    capability: run,
                    enabled: now,
                });
            }
        }
        self.slot.effective.store(pending.bits(), Ordering::Release);
        changes
    }

    pub(crate) fn emit_loaded(&self) {
        emit_unlocked(&self.slot.on_loaded, self);
    }

    pub(crate) fn emit_closed(&self) {
        emit_unlocked(&self.slot.on_closed, self);
    }

    pub(crate) fn emit_flag_changed(&self, change: FlagChange) {
        emit_unlocked(&self.slot.on_flag_changed, &(self.clone(), change));
    }
}

/// Emits with the listener lock released while callbacks run, so a
/// callback may register further listeners on the same event without
/// deadlocking. Listeners registered mid-pass first fire on the next
/// emit.
fn emit_unlocked<A>(event: &Mutex<Event<A>>, args: &A) {
    let mut active = std::mem::take(&mut *event.lock().expect("listener list poisoned"));
    active.emit(args);
    let mut current = event.lock().expect("listener list poisoned");
    active.append(&mut current);
    *current = active;
}

impl std::fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRef")
            .field("name", &self.slot.name)
            .field("flags", &self.flags())
            .field("status", &self.status())
            .finish()
    }
}

/// Weak counterpart to [`ModuleRef`]; upgrade before each use.
#[derive(Clone)]
pub struct WeakModuleRef {
    slot: Weak<ModuleSlot>,
}

impl WeakModuleRef {
    /// Attempts to upgrade to a strong handle.
    pub fn upgrade(&self) -> Option<ModuleRef> {
        self.slot.upgrade().map(|slot| ModuleRef { slot })
    }
}
