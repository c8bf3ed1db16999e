//! Text measurement for block layout.
//!
//! Blocks are laid out before they are rasterised and the compositor trusts
//! the resulting height, so every wrapped line must still fit its column
//! when the renderer draws it. [`TextMetrics`] measures against the font
//! database the rasteriser uses:
//!
//! 1. the **primary face** is the one the SVG renderer picks for the
//!    block's `font-family` list and weight (same `fontdb` query, with the
//!    renderer's serif last resort appended);
//! 2. a character the primary face lacks is measured in the **fallback
//!    face** the renderer would substitute: the first other face in
//!    database order that has the glyph and shares style, weight or stretch;
//! 3. a character no face covers is drawn as the primary face's `.notdef`
//!    and measured as such.
//!
//! Widths are the sum of `hmtx` advances. Shaping only adjusts pairs
//! (kerning), which [`SHAPING_SLACK`] covers.
//!
//! With no face loaded at all the renderer draws no text. A static em table
//! then keeps heights stable and independent of the machine.

use resvg::usvg::fontdb::{Database, Family, Query, Stretch, Style, Weight, ID};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Multiplier applied to font-measured widths.
pub const SHAPING_SLACK: f32 = 1.02;

/// Measures and wraps text the way it will be drawn.
///
/// Cheap to share: results are cached per character and weight behind a
/// mutex, so one instance serves every block of an export.
pub struct TextMetrics {
    fonts: Option<Arc<Database>>,
    families: Vec<FamilyName>,
    cache: Mutex<Cache>,
}

impl std::fmt::Debug for TextMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextMetrics")
            .field("faces", &self.fonts.as_ref().map_or(0, |db| db.len()))
            .field("families", &self.families)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Cache {
    primary: HashMap<u16, Option<ID>>,
    advances: HashMap<(char, u16), f32>,
    faces: HashMap<ID, Option<Arc<FaceData>>>,
}

struct FaceData {
    bytes: Vec<u8>,
    index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FamilyName {
    Named(String),
    Serif,
    SansSerif,
    Monospace,
    Cursive,
    Fantasy,
}

impl FamilyName {
    fn parse(name: &str) -> Option<Self> {
        let name = name.trim().trim_matches(|c| c == '\'' || c == '"').trim();
        if name.is_empty() {
            return None;
        }
        Some(match name.to_ascii_lowercase().as_str() {
            "serif" => FamilyName::Serif,
            "sans-serif" => FamilyName::SansSerif,
            "monospace" => FamilyName::Monospace,
            "cursive" => FamilyName::Cursive,
            "fantasy" => FamilyName::Fantasy,
            _ => FamilyName::Named(name.to_string()),
        })
    }

    fn as_family(&self) -> Family<'_> {
        match self {
            FamilyName::Named(name) => Family::Name(name),
            FamilyName::Serif => Family::Serif,
            FamilyName::SansSerif => Family::SansSerif,
            FamilyName::Monospace => Family::Monospace,
            FamilyName::Cursive => Family::Cursive,
            FamilyName::Fantasy => Family::Fantasy,
        }
    }
}

impl TextMetrics {
    /// Metrics from the static em table only.
    pub fn estimated() -> Self {
        Self {
            fonts: None,
            families: Vec::new(),
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Metrics backed by `fonts`, resolving faces for a CSS `font-family` list.
    pub fn with_fonts(fonts: Arc<Database>, font_family: &str) -> Self {
        let mut families: Vec<FamilyName> =
            font_family.split(',').filter_map(FamilyName::parse).collect();
        if !families.contains(&FamilyName::Serif) {
            families.push(FamilyName::Serif);
        }
        Self {
            fonts: (fonts.len() > 0).then_some(fonts),
            families,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Whether widths come from real font faces.
    pub fn uses_fonts(&self) -> bool {
        self.fonts.is_some()
    }

    /// Advance of `c` in pixels at `font_size` and CSS `weight`.
    pub fn char_width(&self, c: char, font_size: f32, weight: u16) -> f32 {
        self.advance_em(c, weight) * font_size
    }

    /// Width of `text` in pixels at `font_size` and CSS `weight`.
    pub fn measure(&self, text: &str, font_size: f32, weight: u16) -> f32 {
        text.chars().map(|c| self.advance_em(c, weight)).sum::<f32>() * font_size
    }

    /// Greedy word-wrap of `text` into lines no wider than `max_width`.
    ///
    /// Explicit newlines are kept (pre-wrap semantics); a word wider than the
    /// line is broken between characters. Empty input yields no lines.
    pub fn wrap(&self, text: &str, font_size: f32, weight: u16, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.trim_end().split('\n') {
            let paragraph = paragraph.trim_end();
            if paragraph.trim().is_empty() {
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                continue;
            }
            self.wrap_paragraph(paragraph, font_size, weight, max_width, &mut lines);
        }
        lines
    }

    fn wrap_paragraph(
        &self,
        paragraph: &str,
        font_size: f32,
        weight: u16,
        max_width: f32,
        out: &mut Vec<String>,
    ) {
        let space = self.measure(" ", font_size, weight);
        let mut line = String::new();
        let mut width = 0.0_f32;

        for word in paragraph.split_whitespace() {
            let word_w = self.measure(word, font_size, weight);

            if !line.is_empty() && width + space + word_w <= max_width {
                line.push(' ');
                line.push_str(word);
                width += space + word_w;
                continue;
            }

            if !line.is_empty() {
                out.push(std::mem::take(&mut line));
                width = 0.0;
            }

            if word_w <= max_width {
                line.push_str(word);
                width = word_w;
                continue;
            }

            // Break an over-long word between characters.
            for c in word.chars() {
                let cw = self.char_width(c, font_size, weight);
                if !line.is_empty() && width + cw > max_width {
                    out.push(std::mem::take(&mut line));
                    width = 0.0;
                }
                line.push(c);
                width += cw;
            }
        }

        if !line.is_empty() {
            out.push(line);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn advance_em(&self, c: char, weight: u16) -> f32 {
        let Some(db) = self.fonts.as_deref() else {
            return estimate_em(c);
        };
        let mut cache = self.lock();
        if let Some(&em) = cache.advances.get(&(c, weight)) {
            return em;
        }
        let em = self
            .font_advance(db, &mut cache, c, weight)
            .map(|em| em * SHAPING_SLACK)
            .unwrap_or_else(|| estimate_em(c));
        cache.advances.insert((c, weight), em);
        em
    }

    fn font_advance(&self, db: &Database, cache: &mut Cache, c: char, weight: u16) -> Option<f32> {
        let primary = self.primary_face(db, cache, weight)?;
        if let Some(em) = glyph_advance(db, cache, primary, Some(c)) {
            return Some(em);
        }
        if let Some(fallback) = fallback_face(db, primary, c) {
            if let Some(em) = glyph_advance(db, cache, fallback, Some(c)) {
                return Some(em);
            }
        }
        glyph_advance(db, cache, primary, None)
    }

    fn primary_face(&self, db: &Database, cache: &mut Cache, weight: u16) -> Option<ID> {
        *cache.primary.entry(weight).or_insert_with(|| {
            let families: Vec<Family<'_>> =
                self.families.iter().map(FamilyName::as_family).collect();
            db.query(&Query {
                families: &families,
                weight: Weight(weight),
                stretch: Stretch::Normal,
                style: Style::Normal,
            })
        })
    }
}

/// First other face that has `c` and shares style, weight or stretch with
/// `primary`, in database order.
fn fallback_face(db: &Database, primary: ID, c: char) -> Option<ID> {
    let base = db.face(primary)?;
    db.faces()
        .filter(|face| face.id != primary)
        .filter(|face| {
            face.style == base.style || face.weight == base.weight || face.stretch == base.stretch
        })
        .find(|face| {
            db.with_face_data(face.id, |data, index| {
                ttf_parser::Face::parse(data, index)
                    .ok()
                    .and_then(|f| f.glyph_index(c))
                    .is_some()
            })
            .unwrap_or(false)
        })
        .map(|face| face.id)
}

/// Advance of `c` (or `.notdef` for `None`) in em units.
fn glyph_advance(db: &Database, cache: &mut Cache, id: ID, c: Option<char>) -> Option<f32> {
    let data = cache
        .faces
        .entry(id)
        .or_insert_with(|| {
            db.with_face_data(id, |bytes, index| {
                Arc::new(FaceData {
                    bytes: bytes.to_vec(),
                    index,
                })
            })
        })
        .clone()?;
    let face = ttf_parser::Face::parse(&data.bytes, data.index).ok()?;
    let glyph = match c {
        Some(c) => face.glyph_index(c)?,
        None => ttf_parser::GlyphId(0),
    };
    let advance = face.glyph_hor_advance(glyph)?;
    Some(f32::from(advance) / f32::from(face.units_per_em().max(1)))
}

/// Static advance table in em units, used when no face is loaded.
fn estimate_em(c: char) -> f32 {
    match c {
        ' ' => 0.32,
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.36,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' => 0.48,
        'm' | 'w' | 'M' | 'W' | '@' | '%' => 1.1,
        'A'..='Z' => 0.8,
        '0'..='9' | 'a'..='z' => 0.7,
        c if is_emoji(c) => 1.3,
        // CJK, Hangul, dashes and other symbols take a full em.
        _ => 1.0,
    }
}

/// Pictographs, which colour emoji fonts draw wider than an em.
fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x2600..=0x27BF     // misc symbols, dingbats
        | 0x2B00..=0x2BFF   // arrows, stars
        | 0x1F000..=0x1FAFF // emoji blocks
    )
}
