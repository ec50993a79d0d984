use std::sync::Arc;

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use quadlab_engine::device::{Viewport, WgpuDevice};
use quadlab_engine::input::KeyEvent;
use quadlab_engine::shader::ShaderSources;
use quadlab_engine::window::{App, AppControl};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::config::SandboxConfig;
use crate::lifecycle::Lifecycle;
use crate::scene::Scene;

/// The device together with the resources that borrow it.
#[self_referencing]
struct Session {
    device: WgpuDevice,

    #[borrows(device)]
    #[covariant]
    scene: Scene<'this, WgpuDevice>,
}

/// Drives the quad scene from the window runtime.
pub struct Sandbox {
    config: SandboxConfig,
    lifecycle: Lifecycle,
    session: Option<Session>,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::default(),
            session: None,
        }
    }

    fn start(&mut self, window: Arc<Window>) -> Result<()> {
        self.lifecycle.advance(Lifecycle::WindowCreated)?;

        let device = WgpuDevice::new(window, self.config.gpu_init())
            .context("failed to create the graphics device")?;
        self.lifecycle.advance(Lifecycle::ContextCurrent)?;

        let sources = ShaderSources::load(&self.config.shader_path);
        let step = self.config.pulse_step;
        let session = SessionTryBuilder {
            device,
            scene_builder: |device| Scene::load(device, &sources, step),
        }
        .try_build()?;
        self.session = Some(session);
        self.lifecycle.advance(Lifecycle::ResourcesLoaded)?;

        self.lifecycle.advance(Lifecycle::Running)?;
        log::info!("running; press {:?} to quit", self.config.quit_key);
        Ok(())
    }
}

impl App for Sandbox {
    fn on_start(&mut self, window: Arc<Window>) -> Result<()> {
        let started = self.start(window);
        if started.is_err() {
            self.lifecycle.terminate();
        }
        started
    }

    fn on_key(&mut self, event: KeyEvent) -> AppControl {
        if event.is_press_of(self.config.quit_key) {
            log::info!("close requested");
            return AppControl::Exit;
        }
        AppControl::Continue
    }

    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(session) = &self.session {
            session.borrow_device().resize(size);
        }
    }

    fn on_frame(&mut self, window: &Window) -> Result<AppControl> {
        if !self.lifecycle.is_running() {
            return Ok(AppControl::Continue);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(AppControl::Continue);
        };

        let size = window.inner_size();
        session
            .with_scene_mut(|scene| scene.draw_frame(Viewport::from_size(size.width, size.height)))
            .context("frame failed")?;

        Ok(AppControl::Continue)
    }

    fn on_exit(&mut self) {
        // Scene resources go before the device they were created on.
        self.session = None;
        self.lifecycle.terminate();
        log::info!("sandbox terminated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadlab_engine::input::{Key, KeyAction};

    #[test]
    fn quit_key_press_requests_exit() {
        let mut sandbox = Sandbox::new(SandboxConfig::default());

        assert_eq!(
            sandbox.on_key(KeyEvent::new(Key::Q, KeyAction::Pressed)),
            AppControl::Exit
        );
    }

    #[test]
    fn other_keys_and_repeats_are_ignored() {
        let mut sandbox = Sandbox::new(SandboxConfig::default());

        for event in [
            KeyEvent::new(Key::W, KeyAction::Pressed),
            KeyEvent::new(Key::Q, KeyAction::Released),
            KeyEvent::new(Key::Q, KeyAction::Repeated),
        ] {
            assert_eq!(sandbox.on_key(event), AppControl::Continue);
        }
    }

    #[test]
    fn quit_key_is_configurable() {
        let mut sandbox = Sandbox::new(SandboxConfig {
            quit_key: Key::Escape,
            ..SandboxConfig::default()
        });

        assert_eq!(
            sandbox.on_key(KeyEvent::new(Key::Q, KeyAction::Pressed)),
            AppControl::Continue
        );
        assert_eq!(
            sandbox.on_key(KeyEvent::new(Key::Escape, KeyAction::Pressed)),
            AppControl::Exit
        );
    }

    #[test]
    fn exit_without_start_terminates() {
        let mut sandbox = Sandbox::new(SandboxConfig::default());
        sandbox.on_exit();
        assert_eq!(sandbox.lifecycle, Lifecycle::Terminated);
    }
}
