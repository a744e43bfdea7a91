use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

use crate::gl::context::ContextKind;

/// Fatal failures while acquiring the connection, windows, config and contexts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Unable to connect to X server: {0}")]
    Connect(#[from] ConnectError),

    #[error("Unable to open X display")]
    DisplayOpen,

    #[error("X11 connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("X11 request failed: {0}")]
    Reply(#[from] ReplyError),

    #[error("X11 request failed: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),

    #[error("Failed to retrieve a framebuffer config")]
    NoFramebufferConfig,

    #[error("No appropriate visual found")]
    NoVisual,

    #[error("{0} not found")]
    MissingExtension(&'static str),

    #[error("Failed to create the {0} OpenGL context")]
    ContextCreation(ContextKind),
}
