//! Cover and template assets.
//!
//! An asset reference is either a base64 `data:` URI or a file path. Relative
//! paths, and absolute-looking paths that do not exist on disk (the studio
//! stores uploads as `/uploads/...`), are resolved under the configured asset
//! root.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::imageops::FilterType;
use image::DynamicImage;
use tiny_skia::Pixmap;

use crate::error::{EngineError, Result};

/// Read the raw bytes behind an asset reference.
pub fn read_asset(source: &str, root: &Path, stage: &'static str) -> Result<Vec<u8>> {
    if source.starts_with("data:") {
        return parse_data_uri(source).map_err(|e| EngineError::asset(stage, e));
    }
    let path = resolve_path(source, root);
    std::fs::read(&path)
        .map_err(|e| EngineError::asset(stage, format!("cannot read {}: {e}", path.display())))
}

fn resolve_path(source: &str, root: &Path) -> PathBuf {
    let path = Path::new(source);
    if path.is_absolute() {
        if path.exists() {
            return path.to_path_buf();
        }
        return root.join(source.trim_start_matches(['/', '\\']));
    }
    root.join(path)
}

/// Decode a base64 data URI (`data:image/png;base64,...`).
fn parse_data_uri(src: &str) -> std::result::Result<Vec<u8>, String> {
    let rest = &src["data:".len()..];
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(payload.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

pub fn decode_image(bytes: &[u8], stage: &'static str) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| EngineError::asset(stage, format!("undecodable image: {e}")))
}

/// Stretch `img` to exactly `width`×`height`.
pub fn normalise(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    img.resize_exact(width, height, FilterType::Triangle)
}

/// Convert to a premultiplied tiny-skia pixmap.
pub fn to_pixmap(img: &DynamicImage, stage: &'static str) -> Result<Pixmap> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| EngineError::asset(stage, format!("invalid image size {width}x{height}")))?;
    for (src, dst) in rgba.as_raw().chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

/// Read, decode and normalise an asset in one go.
pub fn load_image(
    source: &str,
    root: &Path,
    width: u32,
    height: u32,
    stage: &'static str,
) -> Result<DynamicImage> {
    let bytes = read_asset(source, root, stage)?;
    let img = decode_image(&bytes, stage)?;
    if img.width() != width || img.height() != height {
        log::debug!(
            "{stage}: resizing {}x{} to {width}x{height}",
            img.width(),
            img.height()
        );
    }
    Ok(normalise(&img, width, height))
}

// ---------------------------------------------------------------------------
// Template stores
// ---------------------------------------------------------------------------

/// Resolves a template id to the encoded background image.
pub trait TemplateStore: Send + Sync + Debug {
    /// Raw image bytes for `id`; [`EngineError::NotFound`] when unknown.
    fn load(&self, id: &str) -> Result<Vec<u8>>;
}

/// Templates stored as `<root>/<id>.png` (or `.jpg` / `.jpeg`).
#[derive(Debug, Clone)]
pub struct TemplateDirectory {
    root: PathBuf,
}

impl TemplateDirectory {
    const EXTENSIONS: [&'static str; 3] = ["png", "jpg", "jpeg"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return None;
        }
        Self::EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{id}.{ext}")))
            .find(|p| p.is_file())
    }
}

impl TemplateStore for TemplateDirectory {
    fn load(&self, id: &str) -> Result<Vec<u8>> {
        let path = self
            .find(id)
            .ok_or_else(|| EngineError::NotFound(format!("template '{id}'")))?;
        std::fs::read(&path).map_err(|e| {
            EngineError::asset("template load", format!("cannot read {}: {e}", path.display()))
        })
    }
}

/// In-memory store, for callers that keep templates in a database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    templates: HashMap<String, Vec<u8>>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, bytes: Vec<u8>) {
        self.templates.insert(id.into(), bytes);
    }
}

impl TemplateStore for InMemoryTemplates {
    fn load(&self, id: &str) -> Result<Vec<u8>> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("template '{id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(px));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn data_uri_round_trips() {
        let png = png_bytes(2, 2, [10, 20, 30, 255]);
        let uri = format!("data:image/png;base64,{}", BASE64_STD.encode(&png));
        let img = load_image(&uri, Path::new("."), 4, 6, "cover load").unwrap();
        assert_eq!((img.width(), img.height()), (4, 6));
    }

    #[test]
    fn non_base64_data_uri_is_rejected() {
        let err = read_asset("data:text/plain,hello", Path::new("."), "cover load").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Asset);
    }

    #[test]
    fn missing_file_is_asset_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_asset("nope.png", dir.path(), "cover load").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Asset);
        assert!(err.to_string().contains("cover load"));
    }

    #[test]
    fn rooted_upload_path_resolves_under_asset_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/c.png"), png_bytes(1, 1, [0, 0, 0, 255])).unwrap();
        let bytes = read_asset("/uploads/c.png", dir.path(), "cover load").unwrap();
        assert!(decode_image(&bytes, "cover load").is_ok());
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        let err = decode_image(b"not an image", "template load").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Asset);
    }

    #[test]
    fn pixmap_is_premultiplied() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([200, 100, 0, 128])));
        let pixmap = to_pixmap(&img, "cover load").unwrap();
        let px = pixmap.pixel(0, 0).unwrap();
        assert_eq!(px.alpha(), 128);
        assert_eq!(px.red(), 100);
        assert_eq!(px.green(), 50);
    }

    #[test]
    fn template_directory_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("classic.jpg"), b"bytes").unwrap();
        let store = TemplateDirectory::new(dir.path());
        assert_eq!(store.load("classic").unwrap(), b"bytes");
        assert_eq!(store.load("modern").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.load("../classic").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn in_memory_templates() {
        let mut store = InMemoryTemplates::new();
        store.insert("t1", vec![1, 2, 3]);
        assert_eq!(store.load("t1").unwrap(), vec![1, 2, 3]);
        assert_eq!(store.load("t2").unwrap_err().kind(), ErrorKind::NotFound);
    }
}
