use std::rc::Rc;

use multiview_ui::{DrawList, FontAtlas, UiError, UiState};
use thiserror::Error;
use x11rb::protocol::xproto::Window;

use crate::core::display::XlibError;
use crate::gl::context::{ContextError, ContextKind};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Shader build failed: {0}")]
    Shader(String),

    #[error("GL object creation failed: {0}")]
    Create(String),

    #[error("GL error {code:#06x} during {operation}")]
    Gl { code: u32, operation: &'static str },

    #[error(transparent)]
    Ui(#[from] UiError),
}

/// Everything the window manager needs from the graphics stack.
///
/// Every call that draws or presents names its target window; implementations
/// reject it unless that window was made current first.
pub trait RenderBackend {
    type Painter;

    fn make_current(&mut self, window: Window, kind: ContextKind) -> Result<(), RenderError>;

    fn create_painter(&mut self, window: Window, atlas: &FontAtlas, width: u32, height: u32) -> Result<Self::Painter, RenderError>;

    fn clear(&mut self, window: Window, color: [f32; 4]) -> Result<(), RenderError>;

    fn paint(&mut self, window: Window, painter: &Self::Painter, list: &DrawList) -> Result<(), RenderError>;

    fn swap_buffers(&mut self, window: Window) -> Result<(), RenderError>;

    fn destroy_painter(&mut self, window: Window, painter: Self::Painter) -> Result<(), RenderError>;

    /// Errors the server reported asynchronously since the last call.
    fn take_async_errors(&mut self) -> Vec<XlibError> {
        Vec::new()
    }
}

/// UI layout plus GPU resources for one window.
pub struct WindowRenderState<P> {
    pub ui: UiState,
    pub painter: P,
}

impl<P> WindowRenderState<P> {
    /// Build the state for `window`, whose context must already be current.
    pub fn init<B>(backend: &mut B, window: Window, width: u32, height: u32, atlas: Rc<FontAtlas>) -> Result<Self, RenderError>
    where
        B: RenderBackend<Painter = P>,
    {
        let painter = backend.create_painter(window, &atlas, width, height)?;
        Ok(Self { ui: UiState::new(width, height, atlas), painter })
    }

    pub fn frame(&mut self, lines: &[String]) -> Result<&DrawList, UiError> {
        emit_frame(&mut self.ui, lines)
    }
}

/// Run one frame: one text call per line with a line break between them.
pub fn emit_frame<'a>(ui: &'a mut UiState, lines: &[String]) -> Result<&'a DrawList, UiError> {
    ui.begin()?;
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ui.next_line()?;
        }
        ui.text(line)?;
    }
    ui.end()
}
