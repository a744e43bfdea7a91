//! Font atlas for text rendering
//!
//! Glyphs for printable ASCII are rasterized with `fontdue` on the CPU and packed
//! into a single-channel bitmap. The bitmap is uploaded to the GPU separately by
//! each window's painter, since texture names only live in a context namespace.

use std::collections::HashMap;
use std::path::Path;

use fontdue::{Font, FontSettings};
use thiserror::Error;
use tracing::{debug, info};

const ASCII_START: u32 = 32; // Space
const ASCII_END: u32 = 126; // Tilde
const GLYPHS_PER_ROW: u32 = 16;
const CELL_PADDING: u32 = 2;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("Failed to read font {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load font: {0}")]
    Load(String),
}

/// Placement of a single glyph inside the atlas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphInfo {
    /// Normalized top-left UV
    pub uv_min: [f32; 2],
    /// Normalized bottom-right UV
    pub uv_max: [f32; 2],
    /// Bitmap size in pixels
    pub size: [f32; 2],
    /// Offset of the bitmap's bottom-left corner from the pen position (y up)
    pub bearing: [f32; 2],
    /// Horizontal pen advance
    pub advance: f32,
}

/// R8 glyph atlas plus the metrics needed for layout
#[derive(Debug, Clone)]
pub struct FontAtlas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    glyphs: HashMap<char, GlyphInfo>,
    ascent: f32,
    line_height: f32,
}

impl FontAtlas {
    pub fn load(path: impl AsRef<Path>, font_size: f32) -> Result<Self, FontError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.display().to_string(),
            source,
        })?;
        info!("Loading font {} at {}px", path.display(), font_size);
        Self::from_bytes(&data, font_size)
    }

    pub fn from_bytes(font_data: &[u8], font_size: f32) -> Result<Self, FontError> {
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| FontError::Load(e.to_string()))?;

        let rasterized: Vec<_> = (ASCII_START..=ASCII_END)
            .filter_map(char::from_u32)
            .map(|ch| {
                let (metrics, bitmap) = font.rasterize(ch, font_size);
                (ch, metrics, bitmap)
            })
            .collect();

        let max_w = rasterized.iter().map(|(_, m, _)| m.width as u32).max().unwrap_or(0);
        let max_h = rasterized.iter().map(|(_, m, _)| m.height as u32).max().unwrap_or(0);
        let cell_w = max_w + CELL_PADDING;
        let cell_h = max_h + CELL_PADDING;
        let rows = (rasterized.len() as u32).div_ceil(GLYPHS_PER_ROW);

        let width = (GLYPHS_PER_ROW * cell_w).max(1);
        let height = (rows * cell_h).max(1);
        let mut pixels = vec![0u8; (width * height) as usize];
        let mut glyphs = HashMap::with_capacity(rasterized.len());

        for (i, (ch, metrics, bitmap)) in rasterized.into_iter().enumerate() {
            let origin_x = (i as u32 % GLYPHS_PER_ROW) * cell_w;
            let origin_y = (i as u32 / GLYPHS_PER_ROW) * cell_h;

            for row in 0..metrics.height {
                let src = row * metrics.width;
                let dst = (origin_y as usize + row) * width as usize + origin_x as usize;
                pixels[dst..dst + metrics.width].copy_from_slice(&bitmap[src..src + metrics.width]);
            }

            glyphs.insert(
                ch,
                GlyphInfo {
                    uv_min: [origin_x as f32 / width as f32, origin_y as f32 / height as f32],
                    uv_max: [
                        (origin_x + metrics.width as u32) as f32 / width as f32,
                        (origin_y + metrics.height as u32) as f32 / height as f32,
                    ],
                    size: [metrics.width as f32, metrics.height as f32],
                    bearing: [metrics.xmin as f32, metrics.ymin as f32],
                    advance: metrics.advance_width,
                },
            );
        }

        let (ascent, line_height) = match font.horizontal_line_metrics(font_size) {
            Some(lm) => (lm.ascent, lm.new_line_size),
            None => (font_size, font_size * 1.2),
        };

        debug!("Font atlas {}x{} with {} glyphs", width, height, glyphs.len());
        Ok(Self { width, height, pixels, glyphs, ascent, line_height })
    }

    /// Build an atlas from prepared parts. `pixels` must hold `width * height` bytes.
    pub fn from_glyphs(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        glyphs: HashMap<char, GlyphInfo>,
        ascent: f32,
        line_height: f32,
    ) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self { width, height, pixels, glyphs, ascent, line_height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major coverage values, one byte per texel
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn glyph(&self, ch: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&ch)
    }

    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_glyphs_exposes_parts() {
        let mut glyphs = HashMap::new();
        let info = GlyphInfo {
            uv_min: [0.0, 0.0],
            uv_max: [0.5, 1.0],
            size: [4.0, 8.0],
            bearing: [0.0, 0.0],
            advance: 5.0,
        };
        glyphs.insert('a', info);

        let atlas = FontAtlas::from_glyphs(8, 8, vec![0; 64], glyphs, 7.0, 10.0);
        assert_eq!(atlas.width(), 8);
        assert_eq!(atlas.pixels().len(), 64);
        assert_eq!(atlas.glyph('a'), Some(&info));
        assert!(atlas.glyph('b').is_none());
        assert_eq!(atlas.line_height(), 10.0);
    }

    #[test]
    fn test_invalid_font_bytes_are_rejected() {
        let err = FontAtlas::from_bytes(b"definitely not a font", 16.0).unwrap_err();
        assert!(matches!(err, FontError::Load(_)));
    }

    #[test]
    fn test_missing_font_file() {
        let err = FontAtlas::load("/nonexistent/font.ttf", 16.0).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/font.ttf"));
    }
}
