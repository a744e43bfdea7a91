pub mod atlas;
pub mod layout;

pub use atlas::{FontAtlas, GlyphInfo};
pub use layout::{DrawList, UiError, UiState, Vertex};

/// Design System Constants
pub mod colors {
    pub const TEXT_PRIMARY: [f32; 4] = [0.94, 0.94, 0.96, 1.0]; // #f0f0f5
    pub const TEXT_SECONDARY: [f32; 4] = [0.53, 0.53, 0.63, 1.0]; // #8888a0
}

/// Layout constants, in pixels
pub mod metrics {
    pub const MARGIN: f32 = 12.0;
    pub const LINE_GAP: f32 = 4.0;
}
