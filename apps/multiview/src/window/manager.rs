use std::rc::Rc;

use multiview_config::RenderSettings;
use multiview_ui::FontAtlas;
use tracing::{debug, info, trace};
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::Window;

use crate::gl::context::ContextKind;
use crate::render::{emit_frame, RenderBackend, RenderError, WindowRenderState};
use crate::window::error::{log_and_ignore, ErrorCategory, ErrorTracker, HealthStatus};
use crate::window::events::{classify, CloseAtoms, DispatchEvent, EventSource, RawEvent};

/// A created, mapped window waiting for its render state.
#[derive(Debug, Clone)]
pub struct ManagedWindow {
    pub window: Window,
    pub width: u32,
    pub height: u32,
    pub context: ContextKind,
    pub lines: Vec<String>,
}

struct WindowSlot<P> {
    window: Window,
    context: ContextKind,
    lines: Vec<String>,
    state: WindowRenderState<P>,
}

/// What one drain of the event queue did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub events: usize,
    pub exposures: usize,
    pub presented: usize,
    pub close_requested: bool,
}

pub struct WindowManager<B: RenderBackend> {
    backend: B,
    slots: Vec<WindowSlot<B::Painter>>,
    close_atoms: CloseAtoms,
    clear_color: [f32; 4],
    busy_poll: bool,
    errors: ErrorTracker,
}

impl<B: RenderBackend> WindowManager<B> {
    /// Build one render state per window, each under the context that window is
    /// activated with. Any failure here is fatal.
    pub fn new(
        mut backend: B,
        windows: Vec<ManagedWindow>,
        atlas: Rc<FontAtlas>,
        settings: &RenderSettings,
        close_atoms: CloseAtoms,
    ) -> Result<Self, RenderError> {
        let mut slots = Vec::with_capacity(windows.len());
        for managed in windows {
            backend.make_current(managed.window, managed.context)?;
            let mut state = WindowRenderState::init(&mut backend, managed.window, managed.width, managed.height, atlas.clone())?;
            state.ui.set_text_color(settings.text_color);
            debug!(
                "Render state ready for window {:#x} ({}x{}, {} context)",
                managed.window, managed.width, managed.height, managed.context
            );
            slots.push(WindowSlot {
                window: managed.window,
                context: managed.context,
                lines: managed.lines,
                state,
            });
        }

        let mut errors = ErrorTracker::new();
        for error in backend.take_async_errors() {
            errors.record(ErrorCategory::X11, "setup", None, error);
        }

        info!("Managing {} windows", slots.len());
        Ok(Self {
            backend,
            slots,
            close_atoms,
            clear_color: settings.clear_color,
            busy_poll: settings.busy_poll,
            errors,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        self.slots.iter().map(|s| s.window)
    }

    pub fn health(&self) -> HealthStatus {
        self.errors.health_check()
    }

    fn owns(&self, window: Window) -> bool {
        self.slots.iter().any(|s| s.window == window)
    }

    /// Drain every queued event without blocking, starting with `first` if given.
    /// Exposures seen during the drain are answered with a single redraw pass.
    pub fn dispatch_pending<E: EventSource>(
        &mut self,
        source: &mut E,
        first: Option<RawEvent>,
    ) -> Result<DrainOutcome, ConnectionError> {
        let mut outcome = DrainOutcome::default();
        let mut next = first;

        loop {
            let raw = match next.take() {
                Some(raw) => raw,
                None => match source.poll_raw()? {
                    Some(raw) => raw,
                    None => break,
                },
            };
            outcome.events += 1;
            self.handle_event(&raw, &mut outcome);
        }

        if outcome.exposures > 0 && !outcome.close_requested {
            outcome.presented = self.redraw_all();
        }
        if outcome.events > 0 {
            trace!("Drained {:?}", outcome);
        }
        Ok(outcome)
    }

    fn handle_event(&mut self, raw: &[u8], outcome: &mut DrainOutcome) {
        match classify(raw, &self.close_atoms) {
            DispatchEvent::Expose { window, count } => {
                debug!("Expose on {:#x} ({} more pending)", window, count);
                outcome.exposures += 1;
            }
            DispatchEvent::KeyPress { window, keycode } => {
                debug!("Key {} pressed in {:#x}, ignored", keycode, window);
            }
            DispatchEvent::CloseRequest { window } => {
                if self.owns(window) {
                    info!("Close requested for window {:#x}", window);
                    outcome.close_requested = true;
                } else {
                    debug!("Close request for unknown window {:#x}", window);
                }
            }
            DispatchEvent::Error { code } => {
                self.errors.record(ErrorCategory::X11, "event queue", None, format!("X error code {}", code));
            }
            DispatchEvent::Ignored { response_type } => {
                trace!("Ignoring event type {}", response_type);
            }
        }
    }

    /// Redraw every window in creation order and return how many were presented.
    ///
    /// Each window is made current before anything touches it. A window whose
    /// context cannot be activated is skipped for this pass.
    pub fn redraw_all(&mut self) -> usize {
        let Self { backend, slots, errors, clear_color, .. } = self;
        let mut presented = 0;

        for slot in slots.iter_mut() {
            let window = slot.window;
            if errors
                .warn_if_failed(backend.make_current(window, slot.context), "make_current", window, ErrorCategory::Context)
                .is_none()
            {
                continue;
            }

            errors.warn_if_failed(backend.clear(window, *clear_color), "clear", window, ErrorCategory::Draw);

            let state = &mut slot.state;
            match emit_frame(&mut state.ui, &slot.lines) {
                Ok(list) => {
                    errors.warn_if_failed(backend.paint(window, &state.painter, list), "paint", window, ErrorCategory::Draw);
                }
                Err(e) => errors.record(ErrorCategory::Draw, "frame", Some(window), e),
            }

            if errors
                .warn_if_failed(backend.swap_buffers(window), "swap_buffers", window, ErrorCategory::Present)
                .is_some()
            {
                presented += 1;
            }
        }

        for error in backend.take_async_errors() {
            errors.record(ErrorCategory::X11, "redraw", None, error);
        }
        presented
    }

    /// Dispatch until a window is asked to close. When a drain finds nothing the
    /// loop blocks for the next event, unless busy polling is on.
    pub fn run<E: EventSource>(&mut self, source: &mut E) -> Result<(), ConnectionError> {
        info!("Entering event loop (busy poll: {})", self.busy_poll);
        let mut pending = None;

        loop {
            source.flush()?;
            let outcome = self.dispatch_pending(source, pending.take())?;
            if outcome.close_requested {
                info!("Leaving event loop");
                return Ok(());
            }
            if outcome.events == 0 {
                if self.busy_poll {
                    std::hint::spin_loop();
                } else {
                    pending = Some(source.wait_raw()?);
                }
            }
        }
    }

    /// Release every window's GPU resources under that window's context and hand
    /// back the final error counts. The backend is dropped last.
    pub fn shutdown(self) -> HealthStatus {
        let Self { mut backend, slots, errors, .. } = self;

        for slot in slots {
            let window = slot.window;
            match backend.make_current(window, slot.context) {
                Ok(()) => log_and_ignore(backend.destroy_painter(window, slot.state.painter), "destroy_painter"),
                Err(e) => log_and_ignore::<(), _>(Err(e), "make_current at teardown"),
            }
        }

        let health = errors.health_check();
        drop(backend);
        debug!("Teardown complete: {:?}", health);
        health
    }
}
