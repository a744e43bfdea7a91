use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::atlas::FontAtlas;
use crate::{colors, metrics};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UiError {
    #[error("begin() called while a frame is already open")]
    FrameAlreadyOpen,

    #[error("{0}() called outside of begin()/end()")]
    NoOpenFrame(&'static str),
}

/// Vertex layout consumed by the painter: position in window pixels, atlas UV, RGBA.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Indexed triangle list accumulated during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl DrawList {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    fn push_quad(&mut self, min: [f32; 2], max: [f32; 2], uv_min: [f32; 2], uv_max: [f32; 2], color: [f32; 4]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[
            Vertex { pos: [min[0], min[1]], uv: [uv_min[0], uv_min[1]], color },
            Vertex { pos: [max[0], min[1]], uv: [uv_max[0], uv_min[1]], color },
            Vertex { pos: [max[0], max[1]], uv: [uv_max[0], uv_max[1]], color },
            Vertex { pos: [min[0], max[1]], uv: [uv_min[0], uv_max[1]], color },
        ]);
        self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Immediate-mode text layout for one window.
///
/// A frame is `begin`, any number of `text`/`next_line` calls, then `end`, which
/// hands back the finished draw list. `begin` resets every piece of per-frame
/// state, so the same calls always yield the same list.
#[derive(Debug)]
pub struct UiState {
    width: u32,
    height: u32,
    atlas: Rc<FontAtlas>,
    text_color: [f32; 4],
    cursor: [f32; 2],
    draw_list: DrawList,
    in_frame: bool,
}

impl UiState {
    pub fn new(width: u32, height: u32, atlas: Rc<FontAtlas>) -> Self {
        Self {
            width,
            height,
            atlas,
            text_color: colors::TEXT_PRIMARY,
            cursor: [metrics::MARGIN, metrics::MARGIN],
            draw_list: DrawList::default(),
            in_frame: false,
        }
    }

    pub fn set_text_color(&mut self, color: [f32; 4]) {
        self.text_color = color;
    }

    pub fn begin(&mut self) -> Result<(), UiError> {
        if self.in_frame {
            return Err(UiError::FrameAlreadyOpen);
        }
        self.in_frame = true;
        self.cursor = [metrics::MARGIN, metrics::MARGIN];
        self.draw_list.clear();
        Ok(())
    }

    /// Lay out `text` at the cursor. Characters missing from the atlas advance
    /// by nothing; whitespace advances without emitting a quad. Glyphs starting
    /// outside the window are culled.
    pub fn text(&mut self, text: &str) -> Result<(), UiError> {
        if !self.in_frame {
            return Err(UiError::NoOpenFrame("text"));
        }

        let baseline = self.cursor[1] + self.atlas.ascent();
        for ch in text.chars() {
            let Some(glyph) = self.atlas.glyph(ch).copied() else {
                continue;
            };

            let x = self.cursor[0] + glyph.bearing[0];
            let y = baseline - glyph.bearing[1] - glyph.size[1];
            let visible = x < self.width as f32 && y < self.height as f32;
            if visible && glyph.size[0] > 0.0 && glyph.size[1] > 0.0 {
                self.draw_list.push_quad(
                    [x, y],
                    [x + glyph.size[0], y + glyph.size[1]],
                    glyph.uv_min,
                    glyph.uv_max,
                    self.text_color,
                );
            }
            self.cursor[0] += glyph.advance;
        }
        Ok(())
    }

    pub fn next_line(&mut self) -> Result<(), UiError> {
        if !self.in_frame {
            return Err(UiError::NoOpenFrame("next_line"));
        }
        self.cursor = [metrics::MARGIN, self.cursor[1] + self.atlas.line_height() + metrics::LINE_GAP];
        Ok(())
    }

    /// Close the frame and return the accumulated geometry.
    pub fn end(&mut self) -> Result<&DrawList, UiError> {
        if !self.in_frame {
            return Err(UiError::NoOpenFrame("end"));
        }
        self.in_frame = false;
        Ok(&self.draw_list)
    }

    pub fn cursor(&self) -> [f32; 2] {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::GlyphInfo;
    use std::collections::HashMap;

    fn mono_atlas() -> Rc<FontAtlas> {
        let mut glyphs = HashMap::new();
        for ch in "HeloLtsg2".chars() {
            glyphs.insert(
                ch,
                GlyphInfo {
                    uv_min: [0.0, 0.0],
                    uv_max: [0.25, 0.25],
                    size: [6.0, 10.0],
                    bearing: [1.0, 0.0],
                    advance: 8.0,
                },
            );
        }
        glyphs.insert(
            ' ',
            GlyphInfo { uv_min: [0.0, 0.0], uv_max: [0.0, 0.0], size: [0.0, 0.0], bearing: [0.0, 0.0], advance: 4.0 },
        );
        Rc::new(FontAtlas::from_glyphs(32, 32, vec![0; 1024], glyphs, 10.0, 14.0))
    }

    fn frame(ui: &mut UiState, lines: &[&str]) -> DrawList {
        ui.begin().unwrap();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                ui.next_line().unwrap();
            }
            ui.text(line).unwrap();
        }
        ui.end().unwrap().clone()
    }

    #[test]
    fn test_text_emits_one_quad_per_visible_glyph() {
        let mut ui = UiState::new(800, 600, mono_atlas());
        let list = frame(&mut ui, &["Lets go"]);
        // space has no bitmap
        assert_eq!(list.quad_count(), 6);
        assert_eq!(list.vertices.len(), 24);
        assert_eq!(list.indices.len(), 36);
        assert_eq!(&list.indices[6..12], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn test_glyph_placement_follows_baseline() {
        let mut ui = UiState::new(800, 600, mono_atlas());
        let list = frame(&mut ui, &["H"]);
        let top_left = list.vertices[0].pos;
        let bottom_right = list.vertices[2].pos;
        assert_eq!(top_left, [metrics::MARGIN + 1.0, metrics::MARGIN]);
        assert_eq!(bottom_right, [metrics::MARGIN + 7.0, metrics::MARGIN + 10.0]);
    }

    #[test]
    fn test_next_line_resets_x_and_advances_y() {
        let mut ui = UiState::new(800, 600, mono_atlas());
        ui.begin().unwrap();
        ui.text("Hello").unwrap();
        assert_eq!(ui.cursor(), [metrics::MARGIN + 40.0, metrics::MARGIN]);
        ui.next_line().unwrap();
        assert_eq!(ui.cursor(), [metrics::MARGIN, metrics::MARGIN + 14.0 + metrics::LINE_GAP]);
        ui.end().unwrap();
    }

    #[test]
    fn test_repeated_frames_are_identical() {
        let mut ui = UiState::new(800, 600, mono_atlas());
        let first = frame(&mut ui, &["Hello", "Hello"]);
        let second = frame(&mut ui, &["Hello", "Hello"]);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_characters_are_skipped() {
        let mut ui = UiState::new(800, 600, mono_atlas());
        let list = frame(&mut ui, &["H\u{2603}H"]);
        assert_eq!(list.quad_count(), 2);
    }

    #[test]
    fn test_frame_sequencing_errors() {
        let mut ui = UiState::new(800, 600, mono_atlas());
        assert_eq!(ui.text("x"), Err(UiError::NoOpenFrame("text")));
        assert_eq!(ui.next_line(), Err(UiError::NoOpenFrame("next_line")));
        assert_eq!(ui.end().unwrap_err(), UiError::NoOpenFrame("end"));

        ui.begin().unwrap();
        assert_eq!(ui.begin(), Err(UiError::FrameAlreadyOpen));
        assert!(ui.end().is_ok());
    }

    #[test]
    fn test_text_color_is_applied() {
        let mut ui = UiState::new(800, 600, mono_atlas());
        ui.set_text_color(colors::TEXT_SECONDARY);
        let list = frame(&mut ui, &["L"]);
        assert!(list.vertices.iter().all(|v| v.color == colors::TEXT_SECONDARY));
    }

    #[test]
    fn test_glyphs_outside_the_window_are_culled() {
        // pen starts at the 12px margin, each glyph is 1px in and advances 8px
        let mut ui = UiState::new(30, 600, mono_atlas());
        assert_eq!(frame(&mut ui, &["Hello"]).quad_count(), 3);

        let mut ui = UiState::new(800, 20, mono_atlas());
        assert_eq!(frame(&mut ui, &["Hello", "Hello"]).quad_count(), 5);
    }
}
