use std::path::PathBuf;

use quadlab_engine::device::GpuInit;
use quadlab_engine::input::Key;
use quadlab_engine::window::RuntimeConfig;
use winit::dpi::LogicalSize;

/// Sandbox settings.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub title: String,
    pub width: f64,
    pub height: f64,

    /// Pace presentation to the display refresh.
    pub vsync: bool,

    /// Two-section shader asset (`#shader vertex` / `#shader fragment`).
    pub shader_path: PathBuf,

    pub quit_key: Key,

    /// Angle added to the color pulse every frame, in radians.
    pub pulse_step: f32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            title: "It works!".to_string(),
            width: 640.0,
            height: 480.0,
            vsync: true,
            shader_path: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("res/shaders/base.shader"),
            quit_key: Key::Q,
            pulse_step: 0.01,
        }
    }
}

impl SandboxConfig {
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            title: self.title.clone(),
            initial_size: LogicalSize::new(self.width, self.height),
            resizable: true,
        }
    }

    pub fn gpu_init(&self) -> GpuInit {
        GpuInit::default().with_vsync(self.vsync)
    }
}
