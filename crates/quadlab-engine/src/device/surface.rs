//! Surface configuration choices, kept free of live wgpu objects.

use winit::dpi::PhysicalSize;

use super::SurfaceErrorAction;

const SRGB_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Bgra8UnormSrgb,
    wgpu::TextureFormat::Rgba8UnormSrgb,
];

/// Picks an sRGB format when asked and offered, else the surface's first.
pub(crate) fn choose_format(
    offered: &[wgpu::TextureFormat],
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let srgb = prefer_srgb
        .then(|| SRGB_FORMATS.into_iter().find(|f| offered.contains(f)))
        .flatten();

    srgb.or_else(|| offered.first().copied())
}

/// FIFO is always supported, so it backs any unsupported request.
pub(crate) fn choose_present_mode(
    offered: &[wgpu::PresentMode],
    requested: wgpu::PresentMode,
) -> wgpu::PresentMode {
    match requested {
        // Resolved by wgpu itself.
        wgpu::PresentMode::AutoVsync | wgpu::PresentMode::AutoNoVsync => requested,
        mode if offered.contains(&mode) => mode,
        mode => {
            log::warn!("present mode {mode:?} unsupported, using Fifo");
            wgpu::PresentMode::Fifo
        }
    }
}

pub(crate) fn choose_alpha_mode(
    offered: &[wgpu::CompositeAlphaMode],
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| offered.contains(m))
        .or_else(|| offered.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// wgpu rejects 0x0 surfaces, which is what a minimized window reports.
pub(crate) fn is_presentable(size: PhysicalSize<u32>) -> bool {
    size.width > 0 && size.height > 0
}

pub(crate) fn classify_error(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            SurfaceErrorAction::Reconfigured
        }
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::{CompositeAlphaMode, PresentMode, SurfaceError, TextureFormat};

    #[test]
    fn srgb_is_preferred_when_offered() {
        let offered = [TextureFormat::Bgra8Unorm, TextureFormat::Bgra8UnormSrgb];
        assert_eq!(choose_format(&offered, true), Some(TextureFormat::Bgra8UnormSrgb));
        assert_eq!(choose_format(&offered, false), Some(TextureFormat::Bgra8Unorm));
    }

    #[test]
    fn first_format_backs_missing_srgb() {
        let offered = [TextureFormat::Rgba16Float];
        assert_eq!(choose_format(&offered, true), Some(TextureFormat::Rgba16Float));
        assert_eq!(choose_format(&[], true), None);
    }

    #[test]
    fn unsupported_present_mode_falls_back_to_fifo() {
        let offered = [PresentMode::Fifo, PresentMode::Immediate];
        assert_eq!(choose_present_mode(&offered, PresentMode::Immediate), PresentMode::Immediate);
        assert_eq!(choose_present_mode(&offered, PresentMode::Mailbox), PresentMode::Fifo);
        assert_eq!(choose_present_mode(&offered, PresentMode::AutoNoVsync), PresentMode::AutoNoVsync);
    }

    #[test]
    fn alpha_mode_request_must_be_offered() {
        let offered = [CompositeAlphaMode::Opaque, CompositeAlphaMode::PreMultiplied];
        assert_eq!(
            choose_alpha_mode(&offered, Some(CompositeAlphaMode::PreMultiplied)),
            CompositeAlphaMode::PreMultiplied
        );
        assert_eq!(
            choose_alpha_mode(&offered, Some(CompositeAlphaMode::PostMultiplied)),
            CompositeAlphaMode::Opaque
        );
        assert_eq!(choose_alpha_mode(&[], None), CompositeAlphaMode::Auto);
    }

    #[test]
    fn surface_errors_map_to_actions() {
        assert_eq!(classify_error(&SurfaceError::Lost), SurfaceErrorAction::Reconfigured);
        assert_eq!(classify_error(&SurfaceError::Outdated), SurfaceErrorAction::Reconfigured);
        assert_eq!(classify_error(&SurfaceError::Timeout), SurfaceErrorAction::SkipFrame);
        assert_eq!(classify_error(&SurfaceError::OutOfMemory), SurfaceErrorAction::Fatal);
    }

    #[test]
    fn minimized_window_is_not_presentable() {
        assert!(is_presentable(PhysicalSize::new(640, 480)));
        assert!(!is_presentable(PhysicalSize::new(0, 480)));
        assert!(!is_presentable(PhysicalSize::new(0, 0)));
    }
}
