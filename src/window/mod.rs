use winit::dpi::PhysicalSize;
use winit::window::{Fullscreen, Window, WindowAttributes};

use crate::config::{TitanConfig, WindowMode};

/// Initial attributes for the main window.
pub fn window_attributes(config: &TitanConfig) -> WindowAttributes {
    Window::default_attributes()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(true)
}

/// Apply the presentation mode in `config` to `window`.
///
/// # Windowed
/// Leaves fullscreen, restores decorations and requests
/// `config.width × config.height`. The final size arrives as a
/// `WindowEvent::Resized` when the OS applies it asynchronously.
///
/// # Fullscreen
/// Picks the current monitor's video mode whose area is closest to the
/// configured size. Falls back to borderless when no monitor or mode is
/// available.
///
/// # Borderless
/// Borderless fullscreen on the current monitor at its native resolution.
pub fn apply_window_settings(window: &Window, config: &TitanConfig) {
    match config.mode {
        WindowMode::Windowed => {
            window.set_fullscreen(None);
            window.set_decorations(true);
            let _ = window.request_inner_size(PhysicalSize::new(config.width, config.height));
        }

        WindowMode::Fullscreen => {
            let fullscreen = match window.current_monitor() {
                Some(monitor) => {
                    let target_area = config.width as u64 * config.height as u64;
                    let best = monitor.video_modes().min_by_key(|vm| {
                        let s = vm.size();
                        (s.width as u64 * s.height as u64).abs_diff(target_area)
                    });
                    match best {
                        Some(vm) => Fullscreen::Exclusive(vm),
                        None => Fullscreen::Borderless(Some(monitor)),
                    }
                }
                None => Fullscreen::Borderless(None),
            };
            window.set_fullscreen(Some(fullscreen));
        }

        WindowMode::Borderless => {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }
}
