//! Body rendering seam.
//!
//! Story files contain game markup. Turning that into reader text belongs
//! to the reader, not to the index; the index only needs *some* text per
//! unit. [`RawText`] passes bodies through untouched.

/// Turns a story file's raw contents into the text that gets indexed.
pub trait BodyRenderer: Send + Sync {
    fn render(&self, raw: &str) -> String;
}

/// Identity renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawText;

impl BodyRenderer for RawText {
    fn render(&self, raw: &str) -> String {
        raw.to_string()
    }
}
