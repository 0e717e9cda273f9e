//! Emission helpers shared by every section: identifiers, declarations, literals.
pub mod zod;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static INVALID_IDENT_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "yield", "let", "static",
    "implements", "interface", "package", "private", "protected", "public", "await",
];

/// Map an arbitrary string onto a valid TypeScript identifier.
///
/// Every character outside `[A-Za-z0-9_]` becomes `$<hex code point>$`, so two
/// distinct inputs never collide (`f/a-b` and `f/a_b` stay apart).
pub fn identifier(raw: &str) -> String {
    let mut out = INVALID_IDENT_CHAR
        .replace_all(raw, |caps: &Captures| {
            let c = caps[0].chars().next().unwrap_or('_');
            format!("${:x}$", c as u32)
        })
        .into_owned();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) || RESERVED.contains(&out.as_str()) {
        out.insert(0, '_');
    }
    out
}

/// A TypeScript string literal (JSON quoting is valid TS).
pub fn quote(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

/// One `const` declaration wrapped in the preamble's `lazyObject` thunk, so
/// declaration order in the file never matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDeclaration {
    pub name: String,
    pub source_text: String,
}

impl GeneratedDeclaration {
    pub fn new(name: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self { name: name.into(), source_text: source_text.into() }
    }

    pub fn render(&self) -> String {
        format!("const {} = lazyObject(() => {});", self.name, self.source_text)
    }
}
