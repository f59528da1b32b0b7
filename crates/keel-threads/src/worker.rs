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

//! The worker task queue and its run loop.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use keel_core::contain;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// A unit of deferred work. Runs exactly once on the worker's thread;
/// a returned error (or a panic) is contained by the run loop and
/// routed to [`WorkerHooks::on_task_error`].
pub type Task = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// An error escaping a task or a hook.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task or hook returned an error.
    #[error("failed: {0}")]
    Failed(#[from] anyhow::Error),
    /// The task or hook panicked; the payload is the panic message.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Where an error escaped, for [`WorkerHooks::on_internal_error`].
/// Lets a hook distinguish "my task misbehaved" from "my error handler
/// misbehaved".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLocation {
    /// Thrown by [`WorkerHooks::on_init`].
    UserInit,
    /// Thrown by [`WorkerHooks::on_exit`].
    UserExit,
    /// Thrown by [`WorkerHooks::on_idle`].
    UserIdle,
    /// Thrown by [`WorkerHooks::on_task_error`] itself.
    UserTaskError,
    /// A task error that [`WorkerHooks::on_task_error`] declined to
    /// contain, aborting the main loop.
    MainLoop,
}

/// Defines a worker's behavior outside of "run the next task".
///
/// Every method has a default; a unit struct with an empty impl is a
/// valid worker. Errors returned (or panics thrown) by these hooks are
/// fatal to the worker's run loop, reported via
/// [`on_internal_error`](Self::on_internal_error) and followed by
/// [`on_exit`](Self::on_exit) — hook failures are never retried.
pub trait WorkerHooks: Send {
    /// Called once when the run loop starts, before any task. If this
    /// fails the worker never half-starts: the loop is abandoned and
    /// `on_exit` still runs.
    fn on_init(&mut self, worker: &WorkerHandle) -> anyhow::Result<()> {
        let _ = worker;
        Ok(())
    }

    /// Called once when the run loop exits, on every exit path.
    fn on_exit(&mut self, worker: &WorkerHandle) -> anyhow::Result<()> {
        let _ = worker;
        Ok(())
    }

    /// Executes one dequeued task. Override to filter or wrap tasks;
    /// errors escaping this method go to [`on_task_error`](Self::on_task_error).
    fn run_task(&mut self, worker: &WorkerHandle, task: Task) -> anyhow::Result<()> {
        let _ = worker;
        task()
    }

    /// Called when the queue is empty. May sleep, block on an external
    /// signal, or spin; the default naps briefly.
    fn on_idle(&mut self, worker: &WorkerHandle) -> anyhow::Result<()> {
        let _ = worker;
        thread::sleep(Duration::from_millis(1));
        Ok(())
    }

    /// Called when an error escapes a task. Returns `true` to contain
    /// it and keep running, `false` to abort the run loop. The default
    /// logs and contains.
    fn on_task_error(&mut self, worker: &WorkerHandle, error: &TaskError) -> bool {
        log::error!("Worker '{}': task {error}", worker.name());
        true
    }

    /// Called when an error escapes outside a task context: from a
    /// hook, or from a task error the hook declined to contain. The
    /// run loop is torn down after this returns.
    fn on_internal_error(&mut self, worker: &WorkerHandle, location: ErrorLocation, error: &TaskError) {
        log::error!(
            "Worker '{}': internal error at {location:?}: {error}",
            worker.name()
        );
    }
}

/// Errors from worker control operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// `run_main_loop` was invoked while the loop was already running.
    #[error("worker '{0}' is already running")]
    AlreadyRunning(String),
}

struct HandleInner {
    name: String,
    sender: Sender<Task>,
    running: AtomicBool,
}

/// Cloneable, thread-safe handle to a worker: post tasks, observe and
/// request the run state.
#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<HandleInner>,
}

impl WorkerHandle {
    /// Enqueues `task` for execution on the worker's thread.
    ///
    /// Never blocks. Tasks posted from one producer thread run in FIFO
    /// order; no order is guaranteed across producers.
    pub fn post_task<F>(&self, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.post(Box::new(task));
    }

    /// Enqueues an already boxed [`Task`].
    pub fn post(&self, task: Task) {
        if self.inner.sender.send(task).is_err() {
            // The worker holds its receiver for its whole lifetime, so
            // this only happens when posting to a dropped worker.
            log::warn!("Worker '{}': task posted after worker drop", self.name());
        }
    }

    /// Returns `true` while the worker's run loop is scheduled to run.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Requests the run state. Setting `false` is cooperative: the
    /// loop exits after the task currently in flight (if any) returns.
    /// A task that never returns blocks shutdown indefinitely.
    pub fn set_running(&self, running: bool) {
        self.inner.running.store(running, Ordering::Release);
    }

    /// Returns the worker's display name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// A logical thread of control: a FIFO task queue plus the hooks that
/// define its behavior. Created once; the run loop executes on exactly
/// the thread that calls [`run_main_loop`](Self::run_main_loop).
pub struct Worker<H: WorkerHooks> {
    handle: WorkerHandle,
    receiver: Receiver<Task>,
    hooks: H,
}

impl<H: WorkerHooks> Worker<H> {
    /// Creates a worker with the given display name and hooks. The
    /// loop does not run until [`run_main_loop`](Self::run_main_loop)
    /// is called.
    pub fn new(name: impl Into<String>, hooks: H) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            handle: WorkerHandle {
                inner: Arc::new(HandleInner {
                    name: name.into(),
                    sender,
                    running: AtomicBool::new(false),
                }),
            },
            receiver,
            hooks,
        }
    }

    /// Returns a cloneable handle for posting tasks and controlling
    /// the run state from any thread.
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Runs the worker loop on the calling thread until the run state
    /// is cleared.
    ///
    /// Fails with [`WorkerError::AlreadyRunning`] if the loop is
    /// already active. On every other path — init failure, a fatal
    /// task error, cooperative shutdown — `on_exit` runs exactly once
    /// before this returns.
    pub fn run_main_loop(&mut self) -> Result<(), WorkerError> {
        if self.handle.is_running() {
            return Err(WorkerError::AlreadyRunning(self.handle.name().to_string()));
        }
        self.handle.set_running(true);
        log::debug!("Worker '{}': run loop starting", self.handle.name());

        // Init must succeed or the worker never half-starts.
        if let Some(error) = Self::contained(&self.handle, &mut self.hooks, H::on_init) {
            self.hooks
                .on_internal_error(&self.handle, ErrorLocation::UserInit, &error);
            self.handle.set_running(false);
            self.exit();
            return Ok(());
        }

        while self.handle.is_running() {
            match self.receiver.try_recv() {
                Ok(task) => self.run_one(task),
                Err(TryRecvError::Empty) => {
                    if let Some(error) = Self::contained(&self.handle, &mut self.hooks, H::on_idle)
                    {
                        self.hooks.on_internal_error(
                            &self.handle,
                            ErrorLocation::UserIdle,
                            &error,
                        );
                        break;
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    // Unreachable while the handle is alive; treated as
                    // a shutdown request for robustness.
                    log::warn!("Worker '{}': queue disconnected", self.handle.name());
                    break;
                }
            }
        }

        self.handle.set_running(false);
        self.exit();
        log::debug!("Worker '{}': run loop finished", self.handle.name());
        Ok(())
    }

    /// Runs one task under containment, routing errors to the hooks.
    fn run_one(&mut self, task: Task) {
        let handle = self.handle.clone();
        let outcome = contain::contain(|| self.hooks.run_task(&handle, task));
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(error)) => TaskError::Failed(error),
            Err(message) => TaskError::Panicked(message),
        };

        match contain::contain(|| self.hooks.on_task_error(&handle, &error)) {
            Ok(true) => {} // contained, keep running
            Ok(false) => {
                self.hooks
                    .on_internal_error(&self.handle, ErrorLocation::MainLoop, &error);
                self.handle.set_running(false);
            }
            Err(message) => {
                let hook_error = TaskError::Panicked(message);
                self.hooks.on_internal_error(
                    &self.handle,
                    ErrorLocation::UserTaskError,
                    &hook_error,
                );
                self.handle.set_running(false);
            }
        }
    }

    /// Invokes `on_exit`, routing its own failure to `on_internal_error`.
    fn exit(&mut self) {
        if let Some(error) = Self::contained(&self.handle, &mut self.hooks, H::on_exit) {
            self.hooks
                .on_internal_error(&self.handle, ErrorLocation::UserExit, &error);
        }
    }

    /// Runs a fallible hook under panic containment, flattening both
    /// failure modes into one [`TaskError`].
    fn contained(
        handle: &WorkerHandle,
        hooks: &mut H,
        hook: impl FnOnce(&mut H, &WorkerHandle) -> anyhow::Result<()>,
    ) -> Option<TaskError> {
        match contain::contain(|| hook(hooks, handle)) {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(TaskError::Failed(error)),
            Err(message) => Some(TaskError::Panicked(message)),
        }
    }
}

impl<H: WorkerHooks + 'static> Worker<H> {
    /// Creates a worker and runs its loop on a new OS thread. Returns
    /// the handle and the join handle for teardown.
    pub fn spawn(
        name: impl Into<String>,
        hooks: H,
    ) -> std::io::Result<(WorkerHandle, JoinHandle<()>)> {
        let name = name.into();
        let mut worker = Worker::new(name.clone(), hooks);
        let handle = worker.handle();
        let join = thread::Builder::new().name(name).spawn(move || {
            // A freshly created worker is not running, so this cannot
            // hit the already-running path.
            if let Err(error) = worker.run_main_loop() {
                log::error!("Worker spawn: {error}");
            }
        })?;
        Ok((handle, join))
    }
}
