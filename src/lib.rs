//! # ebook-forge – rich text → paginated ebook page images
//!
//! This crate lays out editor-authored rich text inside a fixed text box and
//! burns the result onto raster pages over a background template. The
//! pipeline stages are:
//!
//! 1. **Parse** – HTML subset → DOM tree ([`dom`])
//! 2. **Style** – inherit and override text styles per node ([`style`])
//! 3. **Segment** – one pre-wrapped block per text run ([`blocks`], [`fonts`])
//! 4. **Paginate** – assign block line ranges to pages ([`pagination`])
//! 5. **Render** – rasterise each page to PNG with tiny-skia ([`render`])
//!
//! [`pipeline`] drives the stages, loads cover/template [`assets`], and
//! writes the run directory and manifest. Steps 1–4 are pure, so a page plan
//! can be computed and inspected ([`layout_plan`]) without touching disk.
//!
//! A C-compatible FFI surface is exposed via the [`ffi`] module.

pub mod assets;
pub mod blocks;
pub mod config;
pub mod dom;
pub mod error;
pub mod ffi;
pub mod fonts;
pub mod layout_plan;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod style;

// Re-exports for convenience
pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind, Result};
pub use pipeline::{generate_ebook, plan_ebook, GenerateRequest, Manifest};
