use std::rc::Rc;

use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Visualid, Window};
use x11rb::rust_connection::RustConnection;

use crate::core::display::{install_error_handler, XlibDisplay};
use crate::core::error::SetupError;

x11rb::atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        _NET_WM_NAME,
        UTF8_STRING,
    }
}

/// Connection layer: the XCB connection for windows and events, plus the Xlib
/// display GLX needs. Both point at the same server.
pub struct Context {
    pub conn: RustConnection,
    pub display: Rc<XlibDisplay>,
    pub screen_num: usize,
    pub root_window: Window,
    pub root_visual: Visualid,
    pub black_pixel: u32,
    pub atoms: AtomCollection,
}

impl Context {
    pub fn new() -> Result<Self, SetupError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let xlib_display = XlibDisplay::open().ok_or(SetupError::DisplayOpen)?;
        install_error_handler();

        let screen = &conn.setup().roots[screen_num];
        let root_window = screen.root;
        let root_visual = screen.root_visual;
        let black_pixel = screen.black_pixel;

        let atoms = AtomCollection::new(&conn)?.reply()?;

        info!("Connected to X server, screen {} root {:#x}", screen_num, root_window);
        let xlib_screen = xlib_display.default_screen();
        if xlib_screen as usize != screen_num {
            debug!("Xlib default screen {} differs from XCB screen {}", xlib_screen, screen_num);
        }

        Ok(Self {
            conn,
            display: Rc::new(xlib_display),
            screen_num,
            root_window,
            root_visual,
            black_pixel,
            atoms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "needs a running X server"]
    fn test_context_matches_xcb_screen() {
        let ctx = Context::new().unwrap();
        let screen = &ctx.conn.setup().roots[ctx.screen_num];
        assert_eq!(ctx.root_window, screen.root);
        assert_eq!(ctx.root_visual, screen.root_visual);
        assert!(ctx.display.default_screen() >= 0);
        assert_ne!(ctx.atoms.WM_DELETE_WINDOW, ctx.atoms.WM_PROTOCOLS);
    }
}
