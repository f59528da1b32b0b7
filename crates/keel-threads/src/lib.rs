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

//! # Keel Threads
//!
//! Per-thread FIFO task queues with a hook-driven run loop, and the
//! registry that hands out the process's `Main` and `Graphics` worker
//! roles.
//!
//! A [`Worker`] owns one queue and runs it on exactly one OS thread.
//! Any thread may post work through a cloned [`WorkerHandle`]; errors
//! escaping a task are contained by the run loop and routed through
//! the worker's [`WorkerHooks`], never across threads.

#![warn(missing_docs)]

pub mod registry;
pub mod worker;

pub use registry::{RegistryError, RoleGuard, WorkerRegistry, WorkerRole};
pub use worker::{ErrorLocation, Task, TaskError, Worker, WorkerError, WorkerHandle, WorkerHooks};
