//! Software renderer using tiny-skia and cosmic-text
//!
//! All rendering is done on the CPU and produces an RGBA pixel buffer.
//! The renderer is bound to one font family and weight for its lifetime;
//! only the size varies between calls.
use std::collections::HashMap;

use cosmic_text::{
    Attrs, Buffer, Color as CosmicColor, Family, FontSystem, LayoutGlyph, Metrics, Shaping,
    SwashCache, SwashContent, Weight, fontdb,
};
use largetype_core::{FontFamily, FontWeight, TextAlign};
use thiserror::Error;
use tiny_skia::{Color, PixmapMut};

use crate::fit::TextMeasure;

/// Maximum entries in the text shaping cache (LRU eviction when exceeded)
const TEXT_CACHE_MAX_ENTRIES: usize = 256;

/// Line height as a multiple of font size
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Font '{name}' not found. Use a valid font name.")]
    FontNotFound { name: String },
}

/// One shaped line of text
#[derive(Clone)]
struct CachedRun {
    glyphs: Vec<LayoutGlyph>,
    /// Width of this line
    line_w: f32,
    /// Baseline offset from the top of the block
    line_y: f32,
}

/// Cached result of text shaping
struct CachedText {
    runs: Vec<CachedRun>,
    width: f32,
    height: f32,
    /// LRU tracking: incremented on each access
    last_used: u64,
}

/// Key for text cache: (text content, font size rounded to tenths)
type TextCacheKey = (String, u32);

/// A software renderer for the overlay label
pub struct Renderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    family: FontFamily,
    weight: Weight,
    /// Cache of shaped text; the fit search measures the same text many times
    text_cache: HashMap<TextCacheKey, CachedText>,
    /// Counter for LRU tracking
    cache_access_counter: u64,
}

impl Renderer {
    /// Create a renderer for the given font.
    ///
    /// Generic families always resolve. A custom family must match a face in
    /// the system font database by family or PostScript name.
    pub fn new(family: &FontFamily, weight: FontWeight) -> Result<Self, RenderError> {
        let font_system = FontSystem::new();

        let family = match family {
            FontFamily::Custom(name) => {
                let resolved = resolve_family_name(font_system.db(), name)
                    .ok_or_else(|| RenderError::FontNotFound { name: name.clone() })?;
                tracing::debug!(font = %name, family = %resolved, "Resolved custom font");
                FontFamily::Custom(resolved)
            }
            generic => generic.clone(),
        };

        Ok(Self {
            font_system,
            swash_cache: SwashCache::new(),
            family,
            weight: Weight(weight.numeric()),
            text_cache: HashMap::with_capacity(64),
            cache_access_counter: 0,
        })
    }

    /// Evict least recently used entries if cache is too large
    fn evict_lru_if_needed(&mut self) {
        if self.text_cache.len() <= TEXT_CACHE_MAX_ENTRIES {
            return;
        }

        // Drop the oldest quarter
        let target_size = TEXT_CACHE_MAX_ENTRIES * 3 / 4;
        let mut entries: Vec<_> = self
            .text_cache
            .iter()
            .map(|(k, v)| (k.clone(), v.last_used))
            .collect();
        entries.sort_by_key(|(_, last_used)| *last_used);

        for (key, _) in entries
            .into_iter()
            .take(self.text_cache.len() - target_size)
        {
            self.text_cache.remove(&key);
        }
    }

    /// Find cached entry by borrowed key (avoids String allocation on hit)
    fn find_cached(&mut self, text: &str, font_size_key: u32) -> Option<&mut CachedText> {
        self.text_cache
            .iter_mut()
            .find(|(k, _)| k.0 == text && k.1 == font_size_key)
            .map(|(_, v)| v)
    }

    /// Ensure text is cached, shaping if needed. Returns (width, height).
    fn ensure_cached(&mut self, text: &str, font_size: f32) -> (f32, f32) {
        let font_size_key = (font_size * 10.0).round() as u32;

        self.cache_access_counter += 1;
        let current_access = self.cache_access_counter;

        if let Some(cached) = self.find_cached(text, font_size_key) {
            cached.last_used = current_access;
            return (cached.width, cached.height);
        }

        let metrics = Metrics::new(font_size, font_size * LINE_HEIGHT_FACTOR);
        let mut text_buffer = Buffer::new(&mut self.font_system, metrics);

        let attrs = Attrs::new()
            .family(family_of(&self.family))
            .weight(self.weight);
        text_buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        text_buffer.shape_until_scroll(&mut self.font_system, false);

        let mut runs = Vec::new();
        let mut width = 0.0f32;
        let mut height = 0.0f32;

        for run in text_buffer.layout_runs() {
            width = width.max(run.line_w);
            height += run.line_height;
            runs.push(CachedRun {
                glyphs: run.glyphs.to_vec(),
                line_w: run.line_w,
                line_y: run.line_y,
            });
        }

        self.text_cache.insert(
            (text.to_string(), font_size_key),
            CachedText {
                runs,
                width,
                height,
                last_used: current_access,
            },
        );
        self.evict_lru_if_needed();

        (width, height)
    }

    /// Get cached runs for drawing. Must call ensure_cached first.
    fn get_cached_runs(&mut self, text: &str, font_size: f32) -> Vec<CachedRun> {
        let font_size_key = (font_size * 10.0).round() as u32;
        self.find_cached(text, font_size_key)
            .map(|c| c.runs.clone())
            .unwrap_or_default()
    }

    /// Clear a pixel buffer with a color
    pub fn clear(&self, buffer: &mut [u8], width: u32, height: u32, color: Color) {
        if let Some(mut pixmap) = PixmapMut::from_bytes(buffer, width, height) {
            pixmap.fill(color);
        }
    }

    /// Draw a text block with its top-left corner at (x, y).
    ///
    /// Each line is placed inside the block according to `align`; the block
    /// is as wide as its widest line.
    pub fn draw_text(
        &mut self,
        buffer: &mut [u8],
        buf_width: u32,
        buf_height: u32,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Color,
        align: TextAlign,
    ) {
        let Some(mut pixmap) = PixmapMut::from_bytes(buffer, buf_width, buf_height) else {
            return;
        };

        let (block_width, _) = self.ensure_cached(text, font_size);
        // Clone needed: swash_cache borrows font_system mutably while drawing
        let runs = self.get_cached_runs(text, font_size);

        let text_color = CosmicColor::rgba(
            (color.red() * 255.0) as u8,
            (color.green() * 255.0) as u8,
            (color.blue() * 255.0) as u8,
            (color.alpha() * 255.0) as u8,
        );

        for run in &runs {
            let line_x = x + align_offset(align, block_width, run.line_w);
            let baseline = y + run.line_y;

            for glyph in &run.glyphs {
                let physical_glyph = glyph.physical((line_x, baseline), 1.0);

                if let Some(image) = self
                    .swash_cache
                    .get_image(&mut self.font_system, physical_glyph.cache_key)
                {
                    draw_glyph_to_pixmap(
                        &mut pixmap,
                        &image.data,
                        image.content,
                        image.placement.width,
                        image.placement.height,
                        physical_glyph.x + image.placement.left,
                        physical_glyph.y - image.placement.top,
                        text_color,
                    );
                }
            }
        }
    }

    /// Measure text dimensions (uses shaping cache)
    pub fn measure_text(&mut self, text: &str, font_size: f32) -> (f32, f32) {
        self.ensure_cached(text, font_size)
    }
}

impl TextMeasure for Renderer {
    fn measure(&mut self, text: &str, font_size: f32) -> (f32, f32) {
        self.measure_text(text, font_size)
    }
}

fn family_of(family: &FontFamily) -> Family<'_> {
    match family {
        FontFamily::SansSerif | FontFamily::System => Family::SansSerif,
        FontFamily::Monospace => Family::Monospace,
        FontFamily::Custom(name) => Family::Name(name),
    }
}

/// Family name the shaper should ask for, given a family or PostScript name.
///
/// Matching is case-insensitive; the result is spelled as the database has
/// it. Family names win over PostScript names.
fn resolve_family_name(db: &fontdb::Database, name: &str) -> Option<String> {
    let by_family = db.faces().find_map(|face| {
        face.families
            .iter()
            .find(|(family, _)| family.eq_ignore_ascii_case(name))
            .map(|(family, _)| family.clone())
    });

    by_family.or_else(|| {
        db.faces()
            .find(|face| face.post_script_name.eq_ignore_ascii_case(name))
            .and_then(|face| face.families.first())
            .map(|(family, _)| family.clone())
    })
}

/// Horizontal offset of a line inside a block
pub(crate) fn align_offset(align: TextAlign, block_width: f32, line_width: f32) -> f32 {
    let slack = (block_width - line_width).max(0.0);
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => slack / 2.0,
        TextAlign::Right => slack,
    }
}

/// Draw a glyph image onto a pixmap with alpha blending
fn draw_glyph_to_pixmap(
    pixmap: &mut PixmapMut,
    glyph_data: &[u8],
    content: SwashContent,
    glyph_width: u32,
    glyph_height: u32,
    dest_x: i32,
    dest_y: i32,
    color: CosmicColor,
) {
    let pixmap_width = pixmap.width() as i32;
    let pixmap_height = pixmap.height() as i32;
    let data = pixmap.data_mut();

    for gy in 0..glyph_height as i32 {
        let py = dest_y + gy;
        if py < 0 || py >= pixmap_height {
            continue;
        }

        for gx in 0..glyph_width as i32 {
            let px = dest_x + gx;
            if px < 0 || px >= pixmap_width {
                continue;
            }

            let glyph_idx = (gy as u32 * glyph_width + gx as u32) as usize;

            // Color glyphs (emoji) carry their own RGBA; masks take the text color
            let (r, g, b, coverage) = match content {
                SwashContent::Color => {
                    let Some(px) = glyph_data.get(glyph_idx * 4..glyph_idx * 4 + 4) else {
                        continue;
                    };
                    (px[0] as u32, px[1] as u32, px[2] as u32, px[3] as u32)
                }
                SwashContent::SubpixelMask => {
                    let Some(px) = glyph_data.get(glyph_idx * 4..glyph_idx * 4 + 4) else {
                        continue;
                    };
                    let coverage = (px[0] as u32 + px[1] as u32 + px[2] as u32) / 3;
                    (color.r() as u32, color.g() as u32, color.b() as u32, coverage)
                }
                SwashContent::Mask => {
                    let Some(&alpha) = glyph_data.get(glyph_idx) else {
                        continue;
                    };
                    (color.r() as u32, color.g() as u32, color.b() as u32, alpha as u32)
                }
            };

            if coverage == 0 {
                continue;
            }

            let pixel_idx = ((py as u32 * pixmap_width as u32 + px as u32) * 4) as usize;
            if pixel_idx + 3 >= data.len() {
                continue;
            }

            let src_a = (coverage * color.a() as u32) / 255;
            let inv_a = 255 - src_a;

            data[pixel_idx] = ((r * src_a + data[pixel_idx] as u32 * inv_a) / 255) as u8;
            data[pixel_idx + 1] = ((g * src_a + data[pixel_idx + 1] as u32 * inv_a) / 255) as u8;
            data[pixel_idx + 2] = ((b * src_a + data[pixel_idx + 2] as u32 * inv_a) / 255) as u8;
            data[pixel_idx + 3] = (src_a + (data[pixel_idx + 3] as u32 * inv_a) / 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_offsets() {
        assert_eq!(align_offset(TextAlign::Left, 100.0, 60.0), 0.0);
        assert_eq!(align_offset(TextAlign::Center, 100.0, 60.0), 20.0);
        assert_eq!(align_offset(TextAlign::Right, 100.0, 60.0), 40.0);
        // The widest line sits flush regardless of alignment
        assert_eq!(align_offset(TextAlign::Right, 100.0, 100.0), 0.0);
    }

    #[test]
    fn unknown_custom_font_is_rejected() {
        let family = FontFamily::Custom("No Such Font 7f3c9a".into());
        let err = Renderer::new(&family, FontWeight::Regular)
            .err()
            .expect("font should not resolve");
        assert!(matches!(err, RenderError::FontNotFound { ref name } if name == "No Such Font 7f3c9a"));
    }

    #[test]
    fn postscript_name_resolves_to_a_served_family() {
        let font_system = FontSystem::new();
        let db = font_system.db();
        let Some(face) = db
            .faces()
            .find(|face| !face.families.is_empty() && !face.post_script_name.is_empty())
        else {
            return; // no system fonts to check against
        };

        let resolved = resolve_family_name(db, &face.post_script_name.to_ascii_lowercase())
            .expect("PostScript name resolves");
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(&resolved)],
            ..Default::default()
        };
        assert!(db.query(&query).is_some(), "{resolved} is not served");
    }

    #[test]
    fn family_name_keeps_database_spelling() {
        let font_system = FontSystem::new();
        let db = font_system.db();
        let Some((family, _)) = db.faces().find_map(|face| face.families.first()) else {
            return;
        };

        assert_eq!(
            resolve_family_name(db, &family.to_ascii_uppercase()).as_deref(),
            Some(family.as_str())
        );
    }

    #[test]
    fn generic_families_always_resolve() {
        assert!(Renderer::new(&FontFamily::Monospace, FontWeight::Bold).is_ok());
    }

    #[test]
    fn glyph_mask_blends_text_color() {
        let mut data = vec![0u8; 2 * 2 * 4];
        let mut pixmap = PixmapMut::from_bytes(&mut data, 2, 2).unwrap();
        let white = CosmicColor::rgba(255, 255, 255, 255);

        draw_glyph_to_pixmap(&mut pixmap, &[255], SwashContent::Mask, 1, 1, 1, 1, white);

        assert_eq!(&data[12..16], &[255, 255, 255, 255]);
        assert_eq!(&data[0..4], &[0, 0, 0, 0]);
    }
}
