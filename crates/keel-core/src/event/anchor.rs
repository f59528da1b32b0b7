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

//! Weak-owner listener lists.
//!
//! A listener is registered against an [`EventAnchor`]: a liveness
//! token owned by whatever registered the callback. The [`Event`]
//! source holds only a weak reference to the anchor, so dropping the
//! anchor (for example when a module is unloaded) is sufficient to
//! retire all of its registrations. Dead entries are pruned lazily on
//! the next emit; no explicit unregister call exists or is needed.

use std::sync::{Arc, Weak};

use crate::contain;

/// Owner-liveness token for event listener registrations.
///
/// Clones share the same liveness: listeners stay registered as long
/// as any clone is alive. Dropping the last clone marks every listener
/// registered with this anchor as dead; they are never invoked again.
#[derive(Debug, Clone, Default)]
pub struct EventAnchor {
    alive: Arc<()>,
}

impl EventAnchor {
    /// Creates a fresh anchor.
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&self) -> Weak<()> {
        Arc::downgrade(&self.alive)
    }
}

struct Listener<A> {
    owner: Weak<()>,
    callback: Box<dyn Fn(&A) + Send>,
}

/// An owning list of listeners for one event kind.
///
/// Iteration order is not a contract: pruning swap-removes dead
/// entries, so emits after an owner's death may reorder the survivors.
pub struct Event<A> {
    listeners: Vec<Listener<A>>,
}

impl<A> Event<A> {
    /// Creates an event source with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers `callback`, tied to the lifetime of `anchor`.
    pub fn connect<F>(&mut self, anchor: &EventAnchor, callback: F)
    where
        F: Fn(&A) + Send + 'static,
    {
        self.listeners.push(Listener {
            owner: anchor.token(),
            callback: Box::new(callback),
        });
    }

    /// Invokes every live listener with `args`, pruning entries whose
    /// owner anchor has been dropped.
    ///
    /// A panicking callback is caught and logged; it neither stops the
    /// emit pass nor unwinds into the caller.
    pub fn emit(&mut self, args: &A) {
        let mut i = 0;
        while i < self.listeners.len() {
            if self.listeners[i].owner.strong_count() == 0 {
                self.listeners.swap_remove(i);
                continue;
            }
            let callback = &self.listeners[i].callback;
            if let Err(message) = contain::contain(|| callback(args)) {
                log::error!("Event listener panicked: {message}");
            }
            i += 1;
        }
    }

    /// Moves every listener out of `other` into `self`, preserving
    /// their registration order after `self`'s own entries. Used by
    /// callers that swap a list out of a lock for the emit pass and
    /// fold late registrations back in afterwards.
    pub fn append(&mut self, other: &mut Event<A>) {
        self.listeners.append(&mut other.listeners);
    }

    /// Returns the number of registered entries, dead ones included
    /// until the next emit prunes them.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}
