use multiview_config::WindowSettings;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::errors::ReplyOrIdError;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, CreateWindowAux, EventMask, PropMode, Window, WindowClass};
use x11rb::wrapper::ConnectionExt as _;

use crate::core::context::Context;

/// Create a top-level window at (0,0), map it and flush.
///
/// Event interest is exposure and key press only. The window also advertises
/// `WM_DELETE_WINDOW` so a close request reaches the event loop.
pub fn create_window(ctx: &Context, settings: &WindowSettings) -> Result<Window, ReplyOrIdError> {
    let window = ctx.conn.generate_id()?;

    let values = CreateWindowAux::new()
        .background_pixel(ctx.black_pixel)
        .event_mask(EventMask::EXPOSURE | EventMask::KEY_PRESS);

    ctx.conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        window,
        ctx.root_window,
        0,
        0,
        settings.width,
        settings.height,
        0,
        WindowClass::INPUT_OUTPUT,
        ctx.root_visual,
        &values,
    )?;

    ctx.conn.change_property32(
        PropMode::REPLACE,
        window,
        ctx.atoms.WM_PROTOCOLS,
        AtomEnum::ATOM,
        &[ctx.atoms.WM_DELETE_WINDOW],
    )?;
    ctx.conn.change_property8(
        PropMode::REPLACE,
        window,
        AtomEnum::WM_NAME,
        AtomEnum::STRING,
        settings.title.as_bytes(),
    )?;
    ctx.conn.change_property8(
        PropMode::REPLACE,
        window,
        ctx.atoms._NET_WM_NAME,
        ctx.atoms.UTF8_STRING,
        settings.title.as_bytes(),
    )?;

    ctx.conn.map_window(window)?;
    ctx.conn.flush()?;

    debug!("Created window {:#x} ({}x{})", window, settings.width, settings.height);
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xproto::MapState;

    #[test]
    #[ignore = "needs a running X server"]
    fn test_windows_are_distinct_and_mapped() {
        let ctx = Context::new().unwrap();
        let settings = WindowSettings::default();

        let windows: Vec<Window> = (0..3).map(|_| create_window(&ctx, &settings).unwrap()).collect();
        assert_ne!(windows[0], windows[1]);
        assert_ne!(windows[1], windows[2]);
        assert_ne!(windows[0], windows[2]);

        for &window in &windows {
            // A window manager may delay the map while it reparents.
            let mapped = (0..50).any(|_| {
                let attrs = ctx.conn.get_window_attributes(window).unwrap().reply().unwrap();
                if attrs.map_state == MapState::UNMAPPED {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    false
                } else {
                    true
                }
            });
            assert!(mapped, "window {:#x} never mapped", window);
            let geom = ctx.conn.get_geometry(window).unwrap().reply().unwrap();
            assert_eq!((geom.width, geom.height), (800, 600));
        }
    }
}
