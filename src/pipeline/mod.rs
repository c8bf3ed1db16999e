//! Pipeline stages for report export.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the compositor can be exercised without rendering
//! a single pixel.
//!
//! ## Data Flow
//!
//! ```text
//! flatten ──▶ markup ──▶ stage ──▶ compose ──▶ serialize
//! (Report)    (SVG)      (raster)  (pages)     (PDF bytes)
//! ```
//!
//! 1. [`flatten`]   — report → ordered sections, one per independently
//!    placeable unit
//! 2. [`markup`]    — section → fixed-width SVG with an exact height,
//!    wrapping text with [`metrics`] measured against the render fonts
//! 3. [`stage`]     — scoped staging area; rasterises markup in
//!    `spawn_blocking` and checks the raster size
//! 4. [`compose`]   — pure page-break state machine
//! 5. [`serialize`] — composed pages → printpdf document

pub mod compose;
pub mod flatten;
pub mod markup;
pub mod metrics;
pub mod serialize;
pub mod stage;
