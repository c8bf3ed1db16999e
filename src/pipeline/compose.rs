//! Page composition: place rasterised blocks onto fixed-size pages.
//!
//! The compositor is a pure state machine. It never sees pixels, only each
//! block's layout size, and answers with where the block goes. That keeps
//! the page-break rule testable without rendering anything.
//!
//! ## Paginated layout
//!
//! Every block is scaled to the printable width (page width minus both
//! margins), which preserves its aspect ratio. A [`Cursor`] tracks the
//! current page and vertical offset. A block that does not fit below the
//! cursor moves to a fresh page, unless the current page is still empty:
//! a block taller than the printable height is placed at the top of an
//! empty page and flagged as overflowing instead of leaving a blank page
//! behind. Blocks are never split.
//!
//! ## Single-canvas layout
//!
//! The older layout stacks all blocks on one continuous canvas and cuts
//! that canvas into page-height strips. Blocks straddling a strip boundary
//! are cut in two; each piece records the source rows it shows.

use crate::pipeline::flatten::SectionKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Tolerance for float noise when comparing millimetre offsets.
const EPSILON_MM: f32 = 1e-3;

// ── Geometry ─────────────────────────────────────────────────────────────

/// Physical paper size. Portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSize {
    /// 210 × 297 mm.
    #[default]
    A4,
    /// 8.5 × 11 in.
    Letter,
    Custom { width_mm: f32, height_mm: f32 },
}

impl PaperSize {
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }
}

impl FromStr for PaperSize {
    type Err = String;

    /// Accepts `a4`, `letter` or `<width>x<height>` in millimetres.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a4" => Ok(PaperSize::A4),
            "letter" => Ok(PaperSize::Letter),
            other => {
                let (w, h) = other
                    .split_once('x')
                    .ok_or_else(|| format!("unknown paper size '{s}' (expected a4, letter or WxH in mm)"))?;
                let parse = |v: &str| {
                    v.trim()
                        .parse::<f32>()
                        .map_err(|_| format!("invalid paper dimension '{v}'"))
                };
                Ok(PaperSize::Custom {
                    width_mm: parse(w)?,
                    height_mm: parse(h)?,
                })
            }
        }
    }
}

/// Page size, margins and block spacing, all in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
    /// Applied on all four sides.
    pub margin_mm: f32,
    /// Vertical gap after each placed block.
    pub block_gap_mm: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: 10.0,
            block_gap_mm: 3.0,
        }
    }
}

impl PageGeometry {
    pub fn content_width_mm(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn printable_height_mm(&self) -> f32 {
        self.height_mm - 2.0 * self.margin_mm
    }

    /// Lowest y (from the top edge) content may reach.
    pub fn bottom_limit_mm(&self) -> f32 {
        self.height_mm - self.margin_mm
    }

    /// Placed height of a block of `width_px × height_px` at full content width.
    pub fn scaled_height_mm(&self, width_px: u32, height_px: u32) -> f32 {
        height_px as f32 * self.mm_per_px(width_px)
    }

    fn mm_per_px(&self, width_px: u32) -> f32 {
        self.content_width_mm() / width_px.max(1) as f32
    }
}

/// How blocks are laid out onto pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutStrategy {
    /// One block never spans two pages.
    #[default]
    Paginated,
    /// One continuous canvas cut into page-height strips.
    SingleCanvas,
}

impl fmt::Display for LayoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayoutStrategy::Paginated => "paginated",
            LayoutStrategy::SingleCanvas => "single-canvas",
        })
    }
}

impl FromStr for LayoutStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paginated" => Ok(LayoutStrategy::Paginated),
            "single-canvas" | "single_canvas" | "canvas" => Ok(LayoutStrategy::SingleCanvas),
            other => Err(format!(
                "unknown layout '{other}' (expected paginated or single-canvas)"
            )),
        }
    }
}

// ── Cursor ───────────────────────────────────────────────────────────────

/// Position where the next block would go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    /// 0-based page index.
    pub page: usize,
    /// Offset from the top edge of the page, in mm.
    pub y_mm: f32,
    occupied: bool,
}

/// Where [`Cursor::advance`] put a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub page: usize,
    pub y_mm: f32,
    /// The block opened a page that did not exist before.
    pub opened_page: bool,
}

impl Cursor {
    /// Top of the first page.
    pub fn start(geometry: &PageGeometry) -> Self {
        Self {
            page: 0,
            y_mm: geometry.margin_mm,
            occupied: false,
        }
    }

    /// Whether the current page already holds a block.
    pub fn page_occupied(&self) -> bool {
        self.occupied
    }

    /// Place a block of `height_mm` and return the next cursor with its slot.
    pub fn advance(self, height_mm: f32, geometry: &PageGeometry, gap_mm: f32) -> (Cursor, Slot) {
        let fits = self.y_mm + height_mm <= geometry.bottom_limit_mm() + EPSILON_MM;
        let (page, y_mm, opened_page) = if self.occupied && !fits {
            (self.page + 1, geometry.margin_mm, true)
        } else {
            (self.page, self.y_mm, !self.occupied && self.page == 0)
        };

        let next = Cursor {
            page,
            y_mm: y_mm + height_mm + gap_mm,
            occupied: true,
        };
        (
            next,
            Slot {
                page,
                y_mm,
                opened_page,
            },
        )
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Source rows of a block shown by one placement (layout pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Slice {
    pub top_px: f32,
    pub height_px: f32,
}

/// One block (or block piece) on one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    /// Index of the block in the flattened section list.
    pub block: usize,
    pub kind: SectionKind,
    pub page: usize,
    pub x_mm: f32,
    /// Offset of the block's top edge from the top of the page.
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    /// Taller than the printable height; extends past the bottom margin.
    pub overflows: bool,
    /// Set when only part of the block is shown (single-canvas layout).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<Slice>,
}

/// One output page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub index: usize,
    pub placements: Vec<Placement>,
}

/// The sealed layout of one export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub geometry: PageGeometry,
    pub layout: LayoutStrategy,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All placements in page order.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.pages.iter().flat_map(|p| p.placements.iter())
    }

    /// Number of distinct blocks placed.
    pub fn block_count(&self) -> usize {
        let mut blocks: Vec<usize> = self.placements().map(|p| p.block).collect();
        blocks.dedup();
        blocks.len()
    }

    /// Page holding the first piece of `block`.
    pub fn page_of(&self, block: usize) -> Option<usize> {
        self.placements().find(|p| p.block == block).map(|p| p.page)
    }
}

/// Accumulates blocks into pages.
#[derive(Debug)]
pub struct Compositor {
    geometry: PageGeometry,
    layout: LayoutStrategy,
    cursor: Cursor,
    /// Running height of the continuous canvas (single-canvas layout).
    canvas_mm: f32,
    pages: Vec<Page>,
}

impl Compositor {
    pub fn new(geometry: PageGeometry, layout: LayoutStrategy) -> Self {
        Self {
            geometry,
            layout,
            cursor: Cursor::start(&geometry),
            canvas_mm: 0.0,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Place block `block` of layout size `width_px × height_px`.
    ///
    /// Returns the placements made: exactly one under the paginated layout,
    /// one per touched strip under the single-canvas layout.
    pub fn place(
        &mut self,
        block: usize,
        kind: SectionKind,
        width_px: u32,
        height_px: u32,
    ) -> Vec<Placement> {
        let placed = match self.layout {
            LayoutStrategy::Paginated => vec![self.place_paginated(block, kind, width_px, height_px)],
            LayoutStrategy::SingleCanvas => self.place_on_canvas(block, kind, width_px, height_px),
        };
        for p in &placed {
            while self.pages.len() <= p.page {
                let index = self.pages.len();
                debug!("Opened page {}", index + 1);
                self.pages.push(Page {
                    index,
                    placements: Vec::new(),
                });
            }
            self.pages[p.page].placements.push(p.clone());
        }
        placed
    }

    fn place_paginated(
        &mut self,
        block: usize,
        kind: SectionKind,
        width_px: u32,
        height_px: u32,
    ) -> Placement {
        let g = self.geometry;
        let height_mm = g.scaled_height_mm(width_px, height_px);
        let (next, slot) = self.cursor.advance(height_mm, &g, g.block_gap_mm);
        self.cursor = next;

        let overflows = height_mm > g.printable_height_mm() + EPSILON_MM;
        if overflows {
            warn!(
                "Block {} ({}) is {:.1} mm tall, exceeds printable height {:.1} mm; placed alone on page {}",
                block,
                kind,
                height_mm,
                g.printable_height_mm(),
                slot.page + 1
            );
        }

        Placement {
            block,
            kind,
            page: slot.page,
            x_mm: g.margin_mm,
            y_mm: slot.y_mm,
            width_mm: g.content_width_mm(),
            height_mm,
            overflows,
            slice: None,
        }
    }

    fn place_on_canvas(
        &mut self,
        block: usize,
        kind: SectionKind,
        width_px: u32,
        height_px: u32,
    ) -> Vec<Placement> {
        let g = self.geometry;
        let strip = g.printable_height_mm();
        let mm_per_px = g.mm_per_px(width_px);
        let height_mm = height_px as f32 * mm_per_px;

        let top = self.canvas_mm;
        let bottom = top + height_mm;
        self.canvas_mm = bottom + g.block_gap_mm;

        let mut placements = Vec::new();
        let mut at = top;
        while at < bottom - EPSILON_MM {
            let page = (at / strip + EPSILON_MM / strip).floor() as usize;
            let strip_end = (page + 1) as f32 * strip;
            let piece_end = bottom.min(strip_end);
            let piece_mm = piece_end - at;
            let whole = at <= top + EPSILON_MM && piece_end >= bottom - EPSILON_MM;

            placements.push(Placement {
                block,
                kind,
                page,
                x_mm: g.margin_mm,
                y_mm: g.margin_mm + (at - page as f32 * strip),
                width_mm: g.content_width_mm(),
                height_mm: piece_mm,
                overflows: false,
                slice: (!whole).then(|| Slice {
                    top_px: (at - top) / mm_per_px,
                    height_px: piece_mm / mm_per_px,
                }),
            });
            at = piece_end;
        }
        placements
    }

    /// Seal the layout.
    pub fn finish(self) -> Document {
        Document {
            geometry: self.geometry,
            layout: self.layout,
            pages: self.pages,
        }
    }
}
