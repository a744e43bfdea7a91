use glow::HasContext;
use multiview_ui::{DrawList, FontAtlas};
use tracing::{debug, info, warn};
use x11rb::protocol::xproto::Window;

use crate::core::display::{take_xlib_errors, XlibError};
use crate::gl::context::{ContextError, ContextKind, ContextManager};
use crate::gl::painter::{GlPainter, Shared, TextPipeline};
use crate::render::{RenderBackend, RenderError};

/// GLX + glow implementation of [`RenderBackend`].
pub struct GlxBackend {
    gl: glow::Context,
    contexts: ContextManager,
    pipeline: Shared<TextPipeline>,
}

impl GlxBackend {
    /// Activate the primary context on `window` and load GL under it.
    pub fn new(mut contexts: ContextManager, window: Window) -> Result<Self, ContextError> {
        let gl = contexts.activate_and_load(window, ContextKind::Primary)?;
        Ok(Self { gl, contexts, pipeline: Shared::default() })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Log whether a texture made under the primary context shows up under the shared one.
    pub fn verify_sharing(&mut self, window: Window) {
        match self.contexts.check_resource_sharing(window, &self.gl) {
            Ok(true) => info!("Shared context sees primary context resources"),
            Ok(false) => warn!("Shared context does not see primary context resources"),
            Err(e) => warn!("Could not verify context sharing: {}", e),
        }
    }

    pub fn log_driver_info(&self) {
        unsafe {
            info!(
                "GL_VENDOR: {}, GL_RENDERER: {}, GL_VERSION: {}",
                self.gl.get_parameter_string(glow::VENDOR),
                self.gl.get_parameter_string(glow::RENDERER),
                self.gl.get_parameter_string(glow::VERSION)
            );
        }
    }
}

impl RenderBackend for GlxBackend {
    type Painter = GlPainter;

    fn make_current(&mut self, window: Window, kind: ContextKind) -> Result<(), RenderError> {
        Ok(self.contexts.make_current(window, kind)?)
    }

    /// The first painter also builds the shared pipeline from `atlas`; later
    /// painters reuse it.
    fn create_painter(&mut self, window: Window, atlas: &FontAtlas, width: u32, height: u32) -> Result<GlPainter, RenderError> {
        self.contexts.require_active(window)?;
        let gl = &self.gl;
        self.pipeline.acquire(|| TextPipeline::new(gl, atlas))?;

        match GlPainter::new(gl, width, height) {
            Ok(painter) => Ok(painter),
            Err(e) => {
                if let Some(pipeline) = self.pipeline.release() {
                    pipeline.destroy(gl);
                }
                Err(e)
            }
        }
    }

    fn clear(&mut self, window: Window, color: [f32; 4]) -> Result<(), RenderError> {
        self.contexts.require_active(window)?;
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
        Ok(())
    }

    fn paint(&mut self, window: Window, painter: &GlPainter, list: &DrawList) -> Result<(), RenderError> {
        self.contexts.require_active(window)?;
        let pipeline = self
            .pipeline
            .get()
            .ok_or_else(|| RenderError::Create("text pipeline released".to_string()))?;
        painter.paint(&self.gl, pipeline, list)
    }

    fn swap_buffers(&mut self, window: Window) -> Result<(), RenderError> {
        Ok(self.contexts.swap_buffers(window)?)
    }

    fn destroy_painter(&mut self, window: Window, painter: GlPainter) -> Result<(), RenderError> {
        self.contexts.require_active(window)?;
        painter.destroy(&self.gl);
        if let Some(pipeline) = self.pipeline.release() {
            pipeline.destroy(&self.gl);
            debug!("Released text pipeline");
        }
        Ok(())
    }

    fn take_async_errors(&mut self) -> Vec<XlibError> {
        self.contexts.sync();
        take_xlib_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;
    use crate::gl::context::ContextVersion;
    use crate::gl::fbconfig::choose_best_config;
    use crate::window::factory::create_window;
    use multiview_config::WindowSettings;

    fn read_center(gl: &glow::Context) -> [u8; 4] {
        let mut pixel = [0u8; 4];
        unsafe {
            gl.read_buffer(glow::BACK);
            gl.read_pixels(400, 300, 1, 1, glow::RGBA, glow::UNSIGNED_BYTE, glow::PixelPackData::Slice(Some(&mut pixel[..])));
        }
        pixel
    }

    #[test]
    #[ignore = "needs a running X server with GLX and GL 4.5"]
    fn test_clear_only_reaches_the_current_window() {
        let ctx = Context::new().unwrap();
        let first = create_window(&ctx, &WindowSettings::default()).unwrap();
        let second = create_window(&ctx, &WindowSettings::default()).unwrap();
        let config = choose_best_config(&ctx.display, ctx.screen_num as i32).unwrap();
        let contexts = ContextManager::new(ctx.display.clone(), config, ContextVersion { major: 4, minor: 5 }).unwrap();
        let mut backend = GlxBackend::new(contexts, first).unwrap();

        backend.clear(first, [1.0, 0.0, 0.0, 1.0]).unwrap();
        unsafe { backend.gl().finish() };

        backend.make_current(second, ContextKind::Shared).unwrap();
        backend.clear(second, [0.0, 0.0, 1.0, 1.0]).unwrap();
        unsafe { backend.gl().finish() };
        assert_eq!(read_center(backend.gl()), [0, 0, 255, 255]);

        backend.make_current(first, ContextKind::Primary).unwrap();
        assert_eq!(read_center(backend.gl()), [255, 0, 0, 255]);
    }

    #[test]
    #[ignore = "needs a running X server with GLX and GL 4.5"]
    fn test_drawing_without_activation_is_rejected() {
        let ctx = Context::new().unwrap();
        let first = create_window(&ctx, &WindowSettings::default()).unwrap();
        let second = create_window(&ctx, &WindowSettings::default()).unwrap();
        let config = choose_best_config(&ctx.display, ctx.screen_num as i32).unwrap();
        let contexts = ContextManager::new(ctx.display.clone(), config, ContextVersion { major: 4, minor: 5 }).unwrap();
        let mut backend = GlxBackend::new(contexts, first).unwrap();

        // setup leaves the primary bound to the first window only
        assert!(backend.clear(second, [0.0; 4]).is_err());
        assert!(backend.swap_buffers(second).is_err());
        assert!(backend.swap_buffers(first).is_ok());
    }

    #[test]
    #[ignore = "needs a running X server with GLX and GL 4.5"]
    fn test_painters_share_one_pipeline_across_contexts() {
        let ctx = Context::new().unwrap();
        let first = create_window(&ctx, &WindowSettings::default()).unwrap();
        let second = create_window(&ctx, &WindowSettings::default()).unwrap();
        let config = choose_best_config(&ctx.display, ctx.screen_num as i32).unwrap();
        let contexts = ContextManager::new(ctx.display.clone(), config, ContextVersion { major: 4, minor: 5 }).unwrap();
        let mut backend = GlxBackend::new(contexts, first).unwrap();
        let atlas = FontAtlas::from_glyphs(4, 4, vec![255; 16], Default::default(), 4.0, 6.0);

        let a = backend.create_painter(first, &atlas, 800, 600).unwrap();
        backend.make_current(second, ContextKind::Shared).unwrap();
        let b = backend.create_painter(second, &atlas, 800, 600).unwrap();
        assert_eq!(backend.pipeline.users(), 2);

        backend.destroy_painter(second, b).unwrap();
        assert!(backend.pipeline.get().is_some());
        backend.make_current(first, ContextKind::Primary).unwrap();
        backend.destroy_painter(first, a).unwrap();
        assert!(backend.pipeline.get().is_none());
        assert!(backend.take_async_errors().is_empty());
    }
}
