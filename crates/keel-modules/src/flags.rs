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

//! Module run-state flags and lifecycle status bits.

use keel_core::keel_bitflags;

keel_bitflags! {
    /// Run-state flags controlling which hooks a module runs.
    ///
    /// Flags come in run/pause pairs; in the effective state at most
    /// one bit of a pair is ever set. A [`set_flags`](crate::ModuleRef::set_flags)
    /// request touches a pair only when exactly one bit of that pair is
    /// present in the request: run-bit alone sets the capability true,
    /// pause-bit alone sets it false, both or neither leave it alone.
    /// Callers therefore build requests by OR-ing only the pairs they
    /// want to change; passing `0` for a pair does NOT clear it.
    pub struct ModuleFlags: u32 {
        /// Run the per-frame hook each tick.
        const RUN_ON_FRAME = 1 << 0;
        /// Pause the per-frame hook (module stays active).
        const PAUSE_ON_FRAME = 1 << 1;
        /// Run the render hook each render pass.
        const RUN_ON_RENDER = 1 << 2;
        /// Pause the render hook (module stays active).
        const PAUSE_ON_RENDER = 1 << 3;
    }
}

impl ModuleFlags {
    /// Baseline for newly loaded modules: all capabilities running.
    pub const DEFAULT: Self = Self::RUN_ON_FRAME.with(Self::RUN_ON_RENDER);
}

keel_bitflags! {
    /// Pending lifecycle actions and the active bit for one module.
    ///
    /// Stored in an atomic so any thread can schedule an action; the
    /// manager's tick consumes the pending bits single-threaded.
    pub struct ModuleStatus: u32 {
        /// Init hook scheduled for the next tick.
        const NEEDS_INIT = 1 << 0;
        /// Teardown-then-init scheduled for the next tick.
        const NEEDS_RELOAD = 1 << 1;
        /// Teardown scheduled for the next tick.
        const NEEDS_TEARDOWN = 1 << 2;
        /// A flag request changed the effective state; diff on next tick.
        const NEEDS_FLAG_UPDATE = 1 << 3;
        /// Set strictly between a successful init and the start of
        /// teardown.
        const ACTIVE = 1 << 4;
    }
}

/// One independently toggleable capability whose effective value
/// changed, as carried by an on-flag-changed event. Events are fired
/// per capability, never batched across pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagChange {
    /// The run bit identifying the pair ([`ModuleFlags::RUN_ON_FRAME`]
    /// or [`ModuleFlags::RUN_ON_RENDER`]).
    pub capability: ModuleFlags,
    /// Whether the capability is now running.
    pub enabled: bool,
}

/// The run/pause pairs, in event-firing order.
pub(crate) const FLAG_PAIRS: [(ModuleFlags, ModuleFlags); 2] = [
    (ModuleFlags::RUN_ON_FRAME, ModuleFlags::PAUSE_ON_FRAME),
    (ModuleFlags::RUN_ON_RENDER, ModuleFlags::PAUSE_ON_RENDER),
];

/// Applies a flag request to an effective state, pair by pair.
pub(crate) fn apply_request(current: ModuleFlags, request: ModuleFlags) -> ModuleFlags {
    let mut next = current;
    for (run, pause) in FLAG_PAIRS {
        let wants_run = request.contains(run);
        let wants_pause = request.contains(pause);
        if wants_run == wants_pause {
            // Neither bit, or contradictory both-bits: no change.
            continue;
        }
        if wants_run {
            next = next.without(pause).with(run);
        } else {
            next = next.without(run).with(pause);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_runs_both_capabilities() {
        assert!(ModuleFlags::DEFAULT.contains(ModuleFlags::RUN_ON_FRAME));
        assert!(ModuleFlags::DEFAULT.contains(ModuleFlags::RUN_ON_RENDER));
        assert!(!ModuleFlags::DEFAULT.intersects(
            ModuleFlags::PAUSE_ON_FRAME | ModuleFlags::PAUSE_ON_RENDER
        ));
    }

    #[test]
    fn untouched_pair_keeps_its_value() {
        let current = ModuleFlags::RUN_ON_FRAME | ModuleFlags::PAUSE_ON_RENDER;
        let next = apply_request(current, ModuleFlags::EMPTY);
        assert_eq!(next, current);
    }

    #[test]
    fn pause_bit_flips_a_running_pair() {
        let current = ModuleFlags::DEFAULT;
        let next = apply_request(current, ModuleFlags::PAUSE_ON_FRAME);
        assert!(next.contains(ModuleFlags::PAUSE_ON_FRAME));
        assert!(!next.contains(ModuleFlags::RUN_ON_FRAME));
        // The other pair is untouched.
        assert!(next.contains(ModuleFlags::RUN_ON_RENDER));
    }

    #[test]
    fn contradictory_request_leaves_the_pair_alone() {
        let current = ModuleFlags::DEFAULT;
        let next = apply_request(
            current,
            ModuleFlags::RUN_ON_FRAME | ModuleFlags::PAUSE_ON_FRAME,
        );
        assert_eq!(next, current);
    }

    #[test]
    fn both_pairs_can_change_in_one_request() {
        let current = ModuleFlags::DEFAULT;
        let next = apply_request(
            current,
            ModuleFlags::PAUSE_ON_FRAME | ModuleFlags::PAUSE_ON_RENDER,
        );
        assert_eq!(
            next,
            ModuleFlags::PAUSE_ON_FRAME | ModuleFlags::PAUSE_ON_RENDER
        );
    }

    #[test]
    fn setting_an_already_set_value_is_idempotent() {
        let current = ModuleFlags::DEFAULT;
        let next = apply_request(current, ModuleFlags::RUN_ON_FRAME);
        assert_eq!(next, current);
    }
}
