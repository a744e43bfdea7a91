use std::fmt;
use std::os::raw::c_int;
use std::rc::Rc;

use glow::HasContext;
use thiserror::Error;
use tracing::{debug, info};
use x11::{glx, xlib};
use x11rb::protocol::xproto::Window;

use crate::core::display::XlibDisplay;
use crate::core::error::SetupError;
use crate::gl::fbconfig::FramebufferConfig;

const GLX_CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
const GLX_CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;
const GLX_CONTEXT_PROFILE_MASK_ARB: c_int = 0x9126;
const GLX_CONTEXT_CORE_PROFILE_BIT_ARB: c_int = 0x0000_0001;

const CREATE_CONTEXT_ATTRIBS: &str = "glXCreateContextAttribsARB";

type CreateContextAttribsFn = unsafe extern "C" fn(
    *mut xlib::Display,
    glx::GLXFBConfig,
    glx::GLXContext,
    xlib::Bool,
    *const c_int,
) -> glx::GLXContext;

/// Which of the two contexts a window is activated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Primary,
    Shared,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Primary => f.write_str("primary"),
            ContextKind::Shared => f.write_str("shared"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("glXMakeCurrent failed for window {window:#x} with the {kind} context")]
    MakeCurrent { window: Window, kind: ContextKind },

    #[error("No context is active")]
    NoActiveContext,

    #[error("Window {requested:#x} is not the active target (active: {active:#x})")]
    WrongTarget { requested: Window, active: Window },

    #[error("GL call failed: {0}")]
    Gl(String),
}

/// Requested context version; the profile is always core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextVersion {
    pub major: i32,
    pub minor: i32,
}

impl ContextVersion {
    fn attribs(&self) -> [c_int; 7] {
        [
            GLX_CONTEXT_MAJOR_VERSION_ARB,
            self.major,
            GLX_CONTEXT_MINOR_VERSION_ARB,
            self.minor,
            GLX_CONTEXT_PROFILE_MASK_ARB,
            GLX_CONTEXT_CORE_PROFILE_BIT_ARB,
            0,
        ]
    }
}

fn resolve_create_context_attribs() -> Result<CreateContextAttribsFn, SetupError> {
    let name = b"glXCreateContextAttribsARB\0";
    let proc_addr = unsafe { glx::glXGetProcAddressARB(name.as_ptr()) };
    match proc_addr {
        Some(f) => Ok(unsafe { std::mem::transmute::<unsafe extern "C" fn(), CreateContextAttribsFn>(f) }),
        None => Err(SetupError::MissingExtension(CREATE_CONTEXT_ATTRIBS)),
    }
}

fn create_context(
    display: &XlibDisplay,
    config: &FramebufferConfig,
    version: ContextVersion,
    share: glx::GLXContext,
    kind: ContextKind,
) -> Result<glx::GLXContext, SetupError> {
    let create = resolve_create_context_attribs()?;
    let attribs = version.attribs();

    let context = unsafe { create(display.as_ptr(), config.as_raw(), share, xlib::True, attribs.as_ptr()) };
    if context.is_null() {
        return Err(SetupError::ContextCreation(kind));
    }

    debug!("Created {} context {:p} ({}.{} core)", kind, context, version.major, version.minor);
    Ok(context)
}

pub fn create_primary_context(
    display: &XlibDisplay,
    config: &FramebufferConfig,
    version: ContextVersion,
) -> Result<glx::GLXContext, SetupError> {
    create_context(display, config, version, std::ptr::null_mut(), ContextKind::Primary)
}

/// Same attributes as the primary, with the primary as share parent so both
/// see one texture/buffer/shader namespace.
pub fn create_shared_context(
    display: &XlibDisplay,
    config: &FramebufferConfig,
    version: ContextVersion,
    primary: glx::GLXContext,
) -> Result<glx::GLXContext, SetupError> {
    create_context(display, config, version, primary, ContextKind::Shared)
}

/// Owns the primary and shared contexts and the thread's active binding.
///
/// `make_current` is the only way to change which window GL calls target.
/// Every drawing path checks `require_active` first.
pub struct ContextManager {
    display: Rc<XlibDisplay>,
    primary: glx::GLXContext,
    shared: glx::GLXContext,
    active: Option<(Window, ContextKind)>,
}

impl ContextManager {
    pub fn new(display: Rc<XlibDisplay>, config: FramebufferConfig, version: ContextVersion) -> Result<Self, SetupError> {
        let primary = create_primary_context(&display, &config, version)?;
        let shared = match create_shared_context(&display, &config, version, primary) {
            Ok(shared) => shared,
            Err(e) => {
                unsafe { glx::glXDestroyContext(display.as_ptr(), primary) };
                return Err(e);
            }
        };

        info!("Created primary and shared GL {}.{} core contexts", version.major, version.minor);
        Ok(Self { display, primary, shared, active: None })
    }

    pub fn active(&self) -> Option<(Window, ContextKind)> {
        self.active
    }

    fn raw(&self, kind: ContextKind) -> glx::GLXContext {
        match kind {
            ContextKind::Primary => self.primary,
            ContextKind::Shared => self.shared,
        }
    }

    pub fn make_current(&mut self, window: Window, kind: ContextKind) -> Result<(), ContextError> {
        let ok = unsafe {
            glx::glXMakeCurrent(self.display.as_ptr(), xlib::XID::from(window), self.raw(kind))
        };
        if ok == xlib::False {
            // the old binding is unreliable after a failed switch
            self.active = None;
            return Err(ContextError::MakeCurrent { window, kind });
        }
        self.active = Some((window, kind));
        Ok(())
    }

    pub fn require_active(&self, window: Window) -> Result<ContextKind, ContextError> {
        match self.active {
            None => Err(ContextError::NoActiveContext),
            Some((active, kind)) if active == window => Ok(kind),
            Some((active, _)) => Err(ContextError::WrongTarget { requested: window, active }),
        }
    }

    /// Activate `kind` on `window` and load GL functions under it.
    pub fn activate_and_load(&mut self, window: Window, kind: ContextKind) -> Result<glow::Context, ContextError> {
        self.make_current(window, kind)?;
        load_gl(self.active)
    }

    /// Flush outstanding requests so asynchronous GLX errors reach the handler.
    pub fn sync(&self) {
        self.display.sync();
    }

    pub fn release_current(&mut self) {
        unsafe { glx::glXMakeCurrent(self.display.as_ptr(), 0, std::ptr::null_mut()) };
        self.active = None;
    }

    pub fn swap_buffers(&self, window: Window) -> Result<(), ContextError> {
        self.require_active(window)?;
        unsafe { glx::glXSwapBuffers(self.display.as_ptr(), xlib::XID::from(window)) };
        Ok(())
    }

    /// Create a texture under the primary context, look it up under the shared
    /// one, then delete it. Leaves the primary active on `window`.
    pub fn check_resource_sharing(&mut self, window: Window, gl: &glow::Context) -> Result<bool, ContextError> {
        self.make_current(window, ContextKind::Primary)?;
        let texture = unsafe { gl.create_texture() }.map_err(ContextError::Gl)?;
        unsafe {
            // a name only becomes a texture object once bound
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.finish();
        }

        let visible = self.make_current(window, ContextKind::Shared).map(|_| unsafe { gl.is_texture(texture) });

        self.make_current(window, ContextKind::Primary)?;
        unsafe { gl.delete_texture(texture) };

        let visible = visible?;
        debug!("Texture visible under shared context: {}", visible);
        Ok(visible)
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        self.release_current();
        unsafe {
            glx::glXDestroyContext(self.display.as_ptr(), self.shared);
            glx::glXDestroyContext(self.display.as_ptr(), self.primary);
        }
        debug!("Destroyed shared and primary contexts");
    }
}

/// Load GL entry points through GLX for the context bound in `active`.
///
/// glow reads the version and extension list while loading, so this refuses to
/// run unless a context has been made current.
pub fn load_gl(active: Option<(Window, ContextKind)>) -> Result<glow::Context, ContextError> {
    let (window, kind) = active.ok_or(ContextError::NoActiveContext)?;
    let gl = unsafe {
        glow::Context::from_loader_function_cstr(|name| {
            glx::glXGetProcAddressARB(name.as_ptr().cast())
                .map_or(std::ptr::null(), |f| f as *const std::ffi::c_void)
        })
    };
    debug!("Loaded GL functions under the {} context on {:#x}", kind, window);
    Ok(gl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_list_is_terminated() {
        let attribs = ContextVersion { major: 4, minor: 5 }.attribs();
        assert_eq!(
            attribs,
            [0x2091, 4, 0x2092, 5, 0x9126, GLX_CONTEXT_CORE_PROFILE_BIT_ARB, 0]
        );
    }

    #[test]
    fn test_loading_gl_needs_a_current_context() {
        assert!(matches!(load_gl(None), Err(ContextError::NoActiveContext)));
    }

    #[test]
    fn test_context_kind_display() {
        assert_eq!(ContextKind::Primary.to_string(), "primary");
        assert_eq!(ContextKind::Shared.to_string(), "shared");
    }

    #[test]
    #[ignore = "needs a running X server with GLX and GL 4.5"]
    fn test_texture_is_visible_through_shared_context() {
        use crate::core::context::Context;
        use crate::gl::fbconfig::choose_best_config;
        use crate::window::factory::create_window;
        use multiview_config::WindowSettings;

        let ctx = Context::new().unwrap();
        let window = create_window(&ctx, &WindowSettings::default()).unwrap();
        let config = choose_best_config(&ctx.display, ctx.screen_num as i32).unwrap();
        let mut contexts = ContextManager::new(ctx.display.clone(), config, ContextVersion { major: 4, minor: 5 }).unwrap();

        let gl = contexts.activate_and_load(window, ContextKind::Shared).unwrap();
        assert!(contexts.check_resource_sharing(window, &gl).unwrap());
        assert_eq!(contexts.active(), Some((window, ContextKind::Primary)));
    }
}
