//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Inputs
//! - Requests and engine configs are passed as null-terminated UTF-8 JSON
//!   strings, in the same shapes the `forge` CLI reads from disk.
//! - A null config pointer selects [`EngineConfig::default`].
//!
//! ## Memory management
//! - Strings returned through `out_*` parameters are allocated on the Rust
//!   heap and **must** be freed with `ebook_free_string`.
//! - Passing a null pointer to `ebook_free_string` is a no-op.
//!
//! ## Error handling
//! - Every fallible function returns an [`EbookStatus`] (`0` = success).
//! - `ebook_last_error` returns `{"kind": ..., "message": ...}` JSON for the
//!   most recent failure on the calling thread.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -lebook_forge
//! // #include "ebook_forge.h"
//! import "C"
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::assets::TemplateDirectory;
use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorKind};
use crate::fonts::FontManager;
use crate::pipeline::{generate_ebook, plan_ebook, GenerateRequest};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Result code of every fallible `ebook_*` call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbookStatus {
    Ok = 0,
    NullArgument = 1,
    InvalidUtf8 = 2,
    Validation = 3,
    Asset = 4,
    NotFound = 5,
    Io = 6,
}

impl From<ErrorKind> for EbookStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Validation => EbookStatus::Validation,
            ErrorKind::Asset => EbookStatus::Asset,
            ErrorKind::NotFound => EbookStatus::NotFound,
            ErrorKind::Io => EbookStatus::Io,
        }
    }
}

fn set_last_error(kind: &str, message: &str) {
    let json = serde_json::json!({ "kind": kind, "message": message }).to_string();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(json).ok();
    });
}

fn fail(err: EngineError) -> EbookStatus {
    let report = err.report();
    let json = serde_json::to_string(&report).unwrap_or_default();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(json).ok();
    });
    report.kind.into()
}

/// # Safety
/// `p` must be null or a valid null-terminated string.
unsafe fn read_str<'a>(p: *const c_char) -> Result<&'a str, EbookStatus> {
    CStr::from_ptr(p).to_str().map_err(|e| {
        set_last_error("invalid_utf8", &format!("Invalid UTF-8: {e}"));
        EbookStatus::InvalidUtf8
    })
}

/// # Safety
/// Same contract as [`read_str`] for both pointers; `config_json` may be null.
unsafe fn read_inputs(
    request_json: *const c_char,
    config_json: *const c_char,
) -> Result<(GenerateRequest, EngineConfig), EbookStatus> {
    let request = GenerateRequest::from_json(read_str(request_json)?).map_err(fail)?;
    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        EngineConfig::from_json(read_str(config_json)?).map_err(fail)?
    };
    Ok((request, config))
}

/// # Safety
/// `out` must be a valid pointer.
unsafe fn write_out(out: *mut *mut c_char, json: String) -> EbookStatus {
    match CString::new(json) {
        Ok(cs) => {
            *out = cs.into_raw();
            EbookStatus::Ok
        }
        Err(_) => {
            *out = ptr::null_mut();
            set_last_error("io", "JSON contained null byte");
            EbookStatus::Io
        }
    }
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Generate an ebook: cover, page PNGs and `manifest.json` under
/// `<output_root>/<ebook_id>/`.
///
/// # Parameters
/// - `request_json`: the generation request
/// - `config_json`: engine configuration, or `NULL` for defaults
/// - `out_manifest`: on success, receives the manifest JSON
///
/// # Safety
/// - `request_json` and `config_json` (if non-null) must be valid
///   null-terminated strings.
/// - `out_manifest` must be a valid pointer; free the result with
///   `ebook_free_string`.
#[no_mangle]
pub unsafe extern "C" fn ebook_generate(
    request_json: *const c_char,
    config_json: *const c_char,
    out_manifest: *mut *mut c_char,
) -> EbookStatus {
    if request_json.is_null() || out_manifest.is_null() {
        set_last_error("null_argument", "Null pointer argument");
        return EbookStatus::NullArgument;
    }
    let (request, config) = match read_inputs(request_json, config_json) {
        Ok(v) => v,
        Err(status) => return status,
    };
    let fonts = match FontManager::from_sources(&config.fonts) {
        Ok(f) => f,
        Err(e) => return fail(e),
    };
    let templates = TemplateDirectory::new(&config.template_root);

    match generate_ebook(&request, &config, &fonts, &templates) {
        Ok(manifest) => match manifest.to_json() {
            Ok(json) => write_out(out_manifest, json),
            Err(e) => fail(e),
        },
        Err(e) => fail(e),
    }
}

/// Compute the page plan without reading assets or writing files.
///
/// # Safety
/// Same as [`ebook_generate`]; free `*out_plan` with `ebook_free_string`.
#[no_mangle]
pub unsafe extern "C" fn ebook_plan(
    request_json: *const c_char,
    config_json: *const c_char,
    out_plan: *mut *mut c_char,
) -> EbookStatus {
    if request_json.is_null() || out_plan.is_null() {
        set_last_error("null_argument", "Null pointer argument");
        return EbookStatus::NullArgument;
    }
    let (request, config) = match read_inputs(request_json, config_json) {
        Ok(v) => v,
        Err(status) => return status,
    };
    let fonts = match FontManager::from_sources(&config.fonts) {
        Ok(f) => f,
        Err(e) => return fail(e),
    };

    match plan_ebook(&request, &config, &fonts) {
        Ok(plan) => match plan.to_json() {
            Ok(json) => write_out(out_plan, json),
            Err(e) => fail(e),
        },
        Err(e) => fail(e),
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a string returned through an `out_*` parameter.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn ebook_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error as `{"kind", "message"}` JSON.
///
/// The returned pointer is valid until the next `ebook_*` call on the same
/// thread. The caller should **not** free this pointer.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn ebook_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn ebook_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
