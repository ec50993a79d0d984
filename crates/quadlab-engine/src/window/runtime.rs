use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::input::platform::translate_key_event;

use super::{App, AppControl};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub resizable: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "quadlab".to_string(),
            initial_size: LogicalSize::new(640.0, 480.0),
            resizable: true,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and runs `app` until the window closes.
    ///
    /// Returns the first error raised by the app or by window creation.
    pub fn run<A>(config: RuntimeConfig, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    app: A,

    window: Option<Arc<Window>>,
    close_requested: bool,
    finished: bool,
    failure: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, app: A) -> Self {
        Self {
            config,
            app,
            window: None,
            close_requested: false,
            finished: false,
            failure: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size)
            .with_resizable(self.config.resizable);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        Ok(Arc::new(window))
    }

    fn fail(&mut self, error: anyhow::Error) {
        log::error!("{error:#}");
        if self.failure.is_none() {
            self.failure = Some(error);
        }
        self.close_requested = true;
    }

    fn finish(&mut self, event_loop: &ActiveEventLoop) {
        if !self.finished {
            self.finished = true;
            self.app.on_exit();
            self.window = None;
        }
        event_loop.exit();
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.finished {
            return;
        }

        let window = match self.create_window(event_loop) {
            Ok(window) => window,
            Err(e) => {
                self.fail(e);
                self.finish(event_loop);
                return;
            }
        };
        self.window = Some(Arc::clone(&window));

        if let Err(e) = self.app.on_start(Arc::clone(&window)) {
            self.fail(e);
            self.finish(event_loop);
            return;
        }

        window.request_redraw();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // Iteration boundary: honour close requests made since the last frame.
        if self.close_requested {
            self.finish(event_loop);
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw; presentation paces the loop.
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.clone() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let key = translate_key_event(&event);
                if self.app.on_key(key) == AppControl::Exit {
                    self.close_requested = true;
                }
            }

            WindowEvent::Resized(new_size) => {
                self.app.on_resize(new_size);
                window.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                self.app.on_resize(window.inner_size());
                window.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                if self.close_requested {
                    return;
                }

                match self.app.on_frame(&window) {
                    Ok(AppControl::Continue) => {}
                    Ok(AppControl::Exit) => self.close_requested = true,
                    Err(e) => self.fail(e),
                }
            }

            _ => {}
        }

        if self.close_requested && self.failure.is_some() {
            self.finish(event_loop);
        }
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        self.finish(event_loop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_640_by_480() {
        let config = RuntimeConfig::default();
        assert_eq!(config.initial_size, LogicalSize::new(640.0, 480.0));
        assert!(config.resizable);
    }
}
