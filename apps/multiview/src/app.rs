use std::rc::Rc;

use anyhow::{Context as _, Result};
use multiview_config::MultiviewConfig;
use multiview_ui::FontAtlas;
use tracing::{info, warn};
use x11::xlib;

use crate::core::context::Context;
use crate::gl::backend::GlxBackend;
use crate::gl::context::{ContextKind, ContextManager, ContextVersion};
use crate::gl::fbconfig::choose_best_config;
use crate::window::error::HealthStatus;
use crate::window::events::CloseAtoms;
use crate::window::factory::create_window;
use crate::window::manager::{ManagedWindow, WindowManager};

/// Set everything up, run the event loop until a window is closed, then tear down.
///
/// Teardown runs painters first, then both GL contexts, then the XCB connection
/// and finally the Xlib display.
pub fn run(config: &MultiviewConfig) -> Result<HealthStatus> {
    let mut ctx = Context::new().context("Failed to set up the X connection")?;

    let mut windows = Vec::with_capacity(config.windows.len());
    for settings in &config.windows {
        let window = create_window(&ctx, settings)
            .with_context(|| format!("Failed to create window \"{}\"", settings.title))?;
        windows.push(ManagedWindow {
            window,
            width: settings.width.into(),
            height: settings.height.into(),
            context: if settings.shared_context { ContextKind::Shared } else { ContextKind::Primary },
            lines: settings.lines.clone(),
        });
    }

    let fb_config = choose_best_config(&ctx.display, ctx.screen_num as i32)?;
    if fb_config.visual_id != xlib::VisualID::from(ctx.root_visual) {
        warn!(
            "Framebuffer config visual {:#x} differs from the root visual {:#x} used by the windows",
            fb_config.visual_id, ctx.root_visual
        );
    }

    let first = windows.first().map(|w| w.window).context("No windows configured")?;

    let version = ContextVersion { major: config.context.major, minor: config.context.minor };
    let contexts = ContextManager::new(ctx.display.clone(), fb_config, version)?;
    let mut backend = GlxBackend::new(contexts, first).context("Failed to load GL under the primary context")?;
    backend.log_driver_info();
    backend.verify_sharing(first);

    let font_path = config.font.resolve_path()?;
    let atlas = FontAtlas::load(&font_path, config.font.size)
        .with_context(|| format!("Failed to load font {}", font_path.display()))?;

    let close_atoms = CloseAtoms::from(&ctx);
    let mut wm = WindowManager::new(backend, windows, Rc::new(atlas), &config.render, close_atoms)
        .context("Failed to initialize window render state")?;

    wm.run(&mut ctx)?;

    let health = wm.shutdown();
    drop(ctx);
    info!("Shut down cleanly");
    Ok(health)
}
