use x11rb::connection::Connection;
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::{
    Atom, ClientMessageEvent, ExposeEvent, KeyPressEvent, Window, CLIENT_MESSAGE_EVENT, EXPOSE_EVENT,
    KEY_PRESS_EVENT,
};
use x11rb::x11_utils::TryParse;

use crate::core::context::Context;

/// Set on events delivered through SendEvent.
pub const SYNTHETIC_EVENT_FLAG: u8 = 0x80;

/// Response type of an X error sitting in the event queue.
const X_ERROR: u8 = 0;

/// Raw 32-byte event as read off the wire
pub type RawEvent = Vec<u8>;

/// Where the dispatch loop reads events from.
pub trait EventSource {
    /// Next queued event, or `None` immediately when the queue is empty.
    fn poll_raw(&mut self) -> Result<Option<RawEvent>, ConnectionError>;

    /// Block until an event arrives.
    fn wait_raw(&mut self) -> Result<RawEvent, ConnectionError>;

    fn flush(&mut self) -> Result<(), ConnectionError>;
}

impl EventSource for Context {
    fn poll_raw(&mut self) -> Result<Option<RawEvent>, ConnectionError> {
        self.conn.poll_for_raw_event()
    }

    fn wait_raw(&mut self) -> Result<RawEvent, ConnectionError> {
        self.conn.wait_for_raw_event()
    }

    fn flush(&mut self) -> Result<(), ConnectionError> {
        self.conn.flush()
    }
}

/// Atoms identifying a window-manager close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseAtoms {
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
}

impl From<&Context> for CloseAtoms {
    fn from(ctx: &Context) -> Self {
        Self {
            wm_protocols: ctx.atoms.WM_PROTOCOLS,
            wm_delete_window: ctx.atoms.WM_DELETE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    Expose { window: Window, count: u16 },
    KeyPress { window: Window, keycode: u8 },
    CloseRequest { window: Window },
    Error { code: u8 },
    Ignored { response_type: u8 },
}

/// Event type with the synthetic flag masked off.
pub fn event_type(raw: &[u8]) -> Option<u8> {
    raw.first().map(|t| t & !SYNTHETIC_EVENT_FLAG)
}

pub fn classify(raw: &[u8], atoms: &CloseAtoms) -> DispatchEvent {
    let Some(response_type) = event_type(raw) else {
        return DispatchEvent::Ignored { response_type: 0 };
    };

    match response_type {
        X_ERROR => DispatchEvent::Error { code: raw.get(1).copied().unwrap_or(0) },
        EXPOSE_EVENT => match ExposeEvent::try_parse(raw) {
            Ok((event, _)) => DispatchEvent::Expose { window: event.window, count: event.count },
            Err(_) => DispatchEvent::Ignored { response_type },
        },
        KEY_PRESS_EVENT => match KeyPressEvent::try_parse(raw) {
            Ok((event, _)) => DispatchEvent::KeyPress { window: event.event, keycode: event.detail },
            Err(_) => DispatchEvent::Ignored { response_type },
        },
        CLIENT_MESSAGE_EVENT => match ClientMessageEvent::try_parse(raw) {
            Ok((event, _))
                if event.format == 32
                    && event.type_ == atoms.wm_protocols
                    && event.data.as_data32()[0] == atoms.wm_delete_window =>
            {
                DispatchEvent::CloseRequest { window: event.window }
            }
            _ => DispatchEvent::Ignored { response_type },
        },
        other => DispatchEvent::Ignored { response_type: other },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use x11rb::protocol::xproto::{ClientMessageData, KeyButMask};

    pub(crate) const ATOMS: CloseAtoms = CloseAtoms { wm_protocols: 300, wm_delete_window: 301 };

    pub(crate) fn expose(window: Window, count: u16) -> RawEvent {
        let event = ExposeEvent {
            response_type: EXPOSE_EVENT,
            sequence: 1,
            window,
            x: 0,
            y: 0,
            width: 800,
            height: 600,
            count,
        };
        <[u8; 32]>::from(event).to_vec()
    }

    pub(crate) fn close_request(window: Window) -> RawEvent {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 2,
            window,
            type_: ATOMS.wm_protocols,
            data: ClientMessageData::from([ATOMS.wm_delete_window, 0, 0, 0, 0]),
        };
        <[u8; 32]>::from(event).to_vec()
    }

    pub(crate) fn key_press(window: Window, keycode: u8) -> RawEvent {
        let event = KeyPressEvent {
            response_type: KEY_PRESS_EVENT,
            detail: keycode,
            sequence: 3,
            time: 0,
            root: 1,
            event: window,
            child: 0,
            root_x: 0,
            root_y: 0,
            event_x: 0,
            event_y: 0,
            state: KeyButMask::from(0u16),
            same_screen: true,
        };
        <[u8; 32]>::from(event).to_vec()
    }

    #[test]
    fn test_expose_is_classified() {
        assert_eq!(classify(&expose(0x200001, 0), &ATOMS), DispatchEvent::Expose { window: 0x200001, count: 0 });
    }

    #[test]
    fn test_synthetic_flag_is_masked() {
        let mut raw = expose(0x200002, 1);
        raw[0] |= SYNTHETIC_EVENT_FLAG;
        assert_eq!(event_type(&raw), Some(EXPOSE_EVENT));
        assert_eq!(classify(&raw, &ATOMS), DispatchEvent::Expose { window: 0x200002, count: 1 });
    }

    #[test]
    fn test_key_press_is_classified() {
        assert_eq!(
            classify(&key_press(0x200003, 9), &ATOMS),
            DispatchEvent::KeyPress { window: 0x200003, keycode: 9 }
        );
    }

    #[test]
    fn test_close_request_needs_matching_atoms() {
        assert_eq!(classify(&close_request(0x200004), &ATOMS), DispatchEvent::CloseRequest { window: 0x200004 });

        let other = CloseAtoms { wm_protocols: 300, wm_delete_window: 999 };
        assert_eq!(
            classify(&close_request(0x200004), &other),
            DispatchEvent::Ignored { response_type: CLIENT_MESSAGE_EVENT }
        );
    }

    #[test]
    fn test_errors_and_unknown_types() {
        let mut raw = vec![0u8; 32];
        raw[1] = 3; // BadWindow
        assert_eq!(classify(&raw, &ATOMS), DispatchEvent::Error { code: 3 });

        raw[0] = 22; // ConfigureNotify
        assert_eq!(classify(&raw, &ATOMS), DispatchEvent::Ignored { response_type: 22 });

        assert_eq!(classify(&[], &ATOMS), DispatchEvent::Ignored { response_type: 0 });
    }

    #[test]
    fn test_truncated_expose_is_ignored() {
        let raw = expose(1, 0);
        assert_eq!(classify(&raw[..8], &ATOMS), DispatchEvent::Ignored { response_type: EXPOSE_EVENT });
    }
}
