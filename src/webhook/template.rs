//! # Exact-Size Template Rendering
//!
//! `%s` templates whose rendered length is computed before rendering.
//!
//! Both the JSON payload and the HTTP request are produced from a template
//! literal. The output length is derived from the literal and the argument
//! lengths alone, a buffer of exactly that size is allocated, and rendering
//! must fill it completely. Any disagreement is an `InternalSizeMismatch`.

use crate::error::{Result, WebhookError};

/// Placeholder marker inside a template literal
pub const PLACEHOLDER: &str = "%s";

/// A template literal with its placeholder count resolved at compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    literal: &'static str,
    placeholders: usize,
}

impl Template {
    /// Wrap a literal, counting its `%s` markers
    pub const fn new(literal: &'static str) -> Self {
        let bytes = literal.as_bytes();
        let mut placeholders = 0;
        let mut i = 0;

        while i + 1 < bytes.len() {
            if bytes[i] == b'%' && bytes[i + 1] == b's' {
                placeholders += 1;
                i += 2;
            } else {
                i += 1;
            }
        }

        Self {
            literal,
            placeholders,
        }
    }

    pub const fn literal(&self) -> &'static str {
        self.literal
    }

    pub const fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Bytes taken by placeholder markers in the literal
    pub const fn marker_len(&self) -> usize {
        self.placeholders * PLACEHOLDER.len()
    }

    /// Literal length minus markers: the bytes every rendering contains
    pub const fn fixed_len(&self) -> usize {
        self.literal.len() - self.marker_len()
    }

    /// Rendered length for arguments of the given lengths
    pub fn rendered_len(&self, arg_lens: &[usize]) -> usize {
        self.fixed_len() + arg_lens.iter().sum::<usize>()
    }

    /// Render into a freshly allocated buffer of exactly `expected_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `InternalSizeMismatch` if rendering produces more or fewer
    /// bytes than `expected_len`. Bytes beyond the buffer are never written.
    pub fn render_exact(&self, args: &[&[u8]], expected_len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; expected_len];
        let mut writer = ExactWriter::new(&mut buf);

        let mut pieces = self.literal.split(PLACEHOLDER).peekable();
        let mut args = args.iter();
        while let Some(piece) = pieces.next() {
            writer.put(piece.as_bytes());
            if pieces.peek().is_some() {
                if let Some(arg) = args.next() {
                    writer.put(arg);
                }
            }
        }

        let written = writer.attempted;
        if written != expected_len {
            return Err(WebhookError::InternalSizeMismatch {
                expected: expected_len,
                actual: written,
            });
        }

        Ok(buf)
    }
}

/// Fills a fixed slice front to back, counting bytes that did not fit
struct ExactWriter<'b> {
    buf: &'b mut [u8],
    attempted: usize,
}

impl<'b> ExactWriter<'b> {
    fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, attempted: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        let start = self.attempted;
        let end = start + bytes.len();
        if let Some(dst) = self.buf.get_mut(start..end) {
            dst.copy_from_slice(bytes);
        }
        self.attempted = end;
    }
}

/// Number of decimal digits needed to print `n`
pub const fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}
