use std::fmt;
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::Mutex;

use tracing::debug;
use x11::xlib;

/// Errors reported through the Xlib error handler, waiting to be collected.
static PENDING_ERRORS: Mutex<Vec<XlibError>> = Mutex::new(Vec::new());

/// An asynchronous error Xlib delivered for a GLX or core request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XlibError {
    pub error_code: u8,
    pub request_code: u8,
    pub minor_code: u8,
    pub resource: xlib::XID,
}

impl fmt::Display for XlibError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X error {} on request {}.{} (resource {:#x})",
            self.error_code, self.request_code, self.minor_code, self.resource
        )
    }
}

unsafe extern "C" fn queue_xlib_error(_display: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> c_int {
    if let Some(event) = event.as_ref() {
        let error = XlibError {
            error_code: event.error_code,
            request_code: event.request_code,
            minor_code: event.minor_code,
            resource: event.resourceid,
        };
        if let Ok(mut pending) = PENDING_ERRORS.lock() {
            pending.push(error);
        }
    }
    0
}

/// Route Xlib errors into the pending queue instead of the default handler,
/// which would exit the process.
pub fn install_error_handler() {
    unsafe { xlib::XSetErrorHandler(Some(queue_xlib_error)) };
    debug!("Installed Xlib error handler");
}

/// Every error queued since the last call
pub fn take_xlib_errors() -> Vec<XlibError> {
    match PENDING_ERRORS.lock() {
        Ok(mut pending) => std::mem::take(&mut *pending),
        Err(_) => Vec::new(),
    }
}

/// Owned Xlib display connection, used for GLX calls only.
/// Windows and events go through the XCB connection in [`super::context::Context`].
pub struct XlibDisplay {
    raw: NonNull<xlib::Display>,
}

impl XlibDisplay {
    /// Open the display named by `$DISPLAY`.
    pub fn open() -> Option<Self> {
        let raw = unsafe { xlib::XOpenDisplay(std::ptr::null()) };
        NonNull::new(raw).map(|raw| Self { raw })
    }

    pub fn as_ptr(&self) -> *mut xlib::Display {
        self.raw.as_ptr()
    }

    pub fn default_screen(&self) -> i32 {
        unsafe { xlib::XDefaultScreen(self.as_ptr()) }
    }

    /// Round trip to the server so pending errors reach the handler.
    pub fn sync(&self) {
        unsafe { xlib::XSync(self.as_ptr(), xlib::False) };
    }
}

impl Drop for XlibDisplay {
    fn drop(&mut self) {
        unsafe { xlib::XCloseDisplay(self.as_ptr()) };
    }
}

impl fmt::Debug for XlibDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XlibDisplay").field("raw", &self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_queues_errors_instead_of_exiting() {
        let mut event: xlib::XErrorEvent = unsafe { std::mem::zeroed() };
        event.error_code = 8; // BadMatch
        event.request_code = 152;
        event.minor_code = 5;
        event.resourceid = 0x400001;

        let status = unsafe { queue_xlib_error(std::ptr::null_mut(), &mut event) };
        assert_eq!(status, 0);

        let errors = take_xlib_errors();
        assert_eq!(
            errors,
            vec![XlibError { error_code: 8, request_code: 152, minor_code: 5, resource: 0x400001 }]
        );
        assert!(errors[0].to_string().contains("request 152.5"));
        assert!(take_xlib_errors().is_empty());
    }

    #[test]
    fn test_null_event_is_ignored() {
        let status = unsafe { queue_xlib_error(std::ptr::null_mut(), std::ptr::null_mut()) };
        assert_eq!(status, 0);
    }
}
