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

//! The worker role registry.
//!
//! At most one worker may hold the `Main` role and one the `Graphics`
//! role at a time. Roles are claimed against an explicitly created
//! [`WorkerRegistry`] that is injected into whatever needs to resolve
//! a role — there is no process-wide mutable global. A claim is held
//! by a [`RoleGuard`]; dropping the guard releases the role, giving
//! claims an explicit start/stop pair.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::worker::WorkerHandle;

/// The distinguished roles a worker can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// The control thread driving module ticks and event collection.
    Main,
    /// The thread owning the graphics context; render-phase work only.
    Graphics,
}

/// Errors from role claims.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The role is already held by another worker.
    #[error("worker role {0:?} is already claimed")]
    RoleTaken(WorkerRole),
}

type RoleMap = Mutex<HashMap<WorkerRole, WorkerHandle>>;

/// Registry mapping roles to the worker handles currently holding them.
///
/// Cheap to clone; clones share the same role table.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    roles: Arc<RoleMap>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `role` for `handle`.
    ///
    /// Fails with [`RegistryError::RoleTaken`] while another claim on
    /// the same role is alive. The returned guard releases the role
    /// when dropped.
    pub fn claim(&self, role: WorkerRole, handle: WorkerHandle) -> Result<RoleGuard, RegistryError> {
        let mut roles = self.roles.lock().expect("role table poisoned");
        if roles.contains_key(&role) {
            return Err(RegistryError::RoleTaken(role));
        }
        log::debug!("Worker '{}' claimed role {role:?}", handle.name());
        roles.insert(role, handle);
        Ok(RoleGuard {
            roles: Arc::clone(&self.roles),
            role,
        })
    }

    /// Returns the handle currently holding `role`, if any.
    pub fn get(&self, role: WorkerRole) -> Option<WorkerHandle> {
        self.roles
            .lock()
            .expect("role table poisoned")
            .get(&role)
            .cloned()
    }
}

/// Live claim on a worker role; releases the role on drop.
#[derive(Debug)]
pub struct RoleGuard {
    roles: Arc<RoleMap>,
    role: WorkerRole,
}

impl RoleGuard {
    /// Returns the claimed role.
    pub fn role(&self) -> WorkerRole {
        self.role
    }
}

impl Drop for RoleGuard {
    fn drop(&mut self) {
        if let Ok(mut roles) = self.roles.lock() {
            roles.remove(&self.role);
            log::debug!("Worker role {:?} released", self.role);
        }
    }
}
