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

//! Sandbox host: wires a graphics worker, the module manager, and a
//! render command protocol together and runs a short frame loop.

use bytemuck::{Pod, Zeroable};
use keel_core::command::{Command, CommandBuffer};
use keel_core::command_protocol;
use keel_modules::{Module, ModuleContext, ModuleFlags, ModuleManager};
use keel_threads::{Worker, WorkerHooks, WorkerRegistry, WorkerRole};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Clear {
    r: f32,
    g: f32,
    b: f32,
    a: f32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct DrawQuad {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Present {
    frame: u64,
}

impl Command for Clear {
    fn execute(self) {
        log::debug!("clear({}, {}, {}, {})", self.r, self.g, self.b, self.a);
    }
}

impl Command for DrawQuad {
    fn execute(self) {
        log::debug!(
            "draw quad at ({}, {}) size {}x{}",
            self.x,
            self.y,
            self.width,
            self.height
        );
    }
}

impl Command for Present {
    fn execute(self) {
        if self.frame % 60 == 0 {
            log::info!("present frame {}", self.frame);
        }
    }
}

command_protocol! {
    /// Commands the simulation side records for the graphics worker.
    pub protocol RenderCmd {
        1 => Clear(Clear),
        2 => DrawQuad(DrawQuad),
        3 => Present(Present),
    }
}

/// Hooks for the graphics worker; the defaults already run, contain,
/// and log posted tasks.
struct GraphicsHooks;

impl WorkerHooks for GraphicsHooks {
    fn on_init(&mut self, handle: &keel_threads::WorkerHandle) -> anyhow::Result<()> {
        log::info!("Worker '{}' up", handle.name());
        Ok(())
    }
}

/// Records one frame's worth of render commands and ships the buffer
/// to the graphics worker for dispatch.
#[derive(Default)]
struct SceneModule {
    quads: u32,
}

impl Module for SceneModule {
    fn frame(&mut self, ctx: &mut ModuleContext) -> anyhow::Result<()> {
        self.quads = (self.quads % 8) + 1;

        let mut buffer: CommandBuffer<RenderCmd> = CommandBuffer::new();
        buffer.push(Clear {
            r: 0.02,
            g: 0.02,
            b: 0.08,
            a: 1.0,
        });
        for i in 0..self.quads {
            buffer.push(DrawQuad {
                x: i as f32 * 10.0,
                y: 5.0,
                width: 8.0,
                height: 8.0,
            });
        }
        buffer.push(Present {
            frame: ctx.frame.frame_index,
        });

        let Some(graphics) = ctx.workers.get(WorkerRole::Graphics) else {
            anyhow::bail!("graphics worker not registered");
        };
        graphics.post_task(move || {
            let mut buffer = buffer;
            RenderCmd::dispatch(&mut buffer);
            Ok(())
        });
        Ok(())
    }
}

/// Logs a liveness line once a second; paused from the outside halfway
/// through the run to exercise the flag machinery.
#[derive(Default)]
struct HeartbeatModule;

impl Module for HeartbeatModule {
    fn frame(&mut self, ctx: &mut ModuleContext) -> anyhow::Result<()> {
        if ctx.frame.frame_index % 60 == 0 {
            log::info!(
                "heartbeat: frame {} (delta {:?})",
                ctx.frame.frame_index,
                ctx.frame.delta
            );
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let registry = WorkerRegistry::new();
    let (graphics, graphics_join) = Worker::spawn("graphics", GraphicsHooks)?;
    let _role = registry.claim(WorkerRole::Graphics, graphics.clone())?;

    let mut manager = ModuleManager::new(registry.clone());
    manager.load_module(
        "scene",
        None,
        Box::new(SceneModule::default()),
        ModuleFlags::EMPTY,
    )?;
    let heartbeat = manager.load_module(
        "heartbeat",
        None,
        Box::new(HeartbeatModule),
        ModuleFlags::EMPTY,
    )?;

    let mut last = Instant::now();
    for frame in 0..180u32 {
        let now = Instant::now();
        let delta = now - last;
        last = now;

        manager.tick(delta);
        manager.render_pass();

        if frame == 90 {
            heartbeat.set_flags(ModuleFlags::PAUSE_ON_FRAME);
            log::info!("heartbeat paused");
        }

        for report in manager.reports().drain() {
            if !report.success() {
                log::warn!(
                    "hook failure: {} {} ({})",
                    report.module,
                    report.phase,
                    report.error.as_deref().unwrap_or("unknown")
                );
            }
        }

        std::thread::sleep(Duration::from_millis(16));
    }

    manager.shutdown();
    graphics.set_running(false);
    if graphics_join.join().is_err() {
        log::error!("graphics worker panicked during shutdown");
    }
    Ok(())
}
