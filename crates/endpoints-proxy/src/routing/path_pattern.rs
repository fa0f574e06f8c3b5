//! REST path templates compiled into anchored regexes.
//!
//! A template such as `books/v1/items/{id}/pages/{x.y}` becomes
//! `^books/v1/items/(?P<_NFSA>...)/pages/(?P<_PAXHS>...)/?$`. Variable names
//! may contain `.`, so each capture is named `_` + unpadded base32 of the
//! variable name and decoded again when a path is matched.

use regex::Regex;
use std::collections::BTreeMap;

/// Characters allowed inside a captured path value
const PATH_VALUE_CLASS: &str = r"[^:/?#\[\]{}]*";

/// RFC 4648 base32 alphabet
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Errors raised while compiling a template or decoding a capture name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("unbalanced braces in path template {0:?}")]
    UnbalancedBraces(String),

    #[error("invalid variable name {name:?} in path template {template:?}")]
    InvalidVariable { template: String, name: String },

    #[error("path template {template:?} does not compile: {reason}")]
    Regex { template: String, reason: String },

    #[error("invalid escaped parameter name {0:?}")]
    InvalidSafeName(String),
}

/// A compiled REST path template
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile a template.
    ///
    /// # Errors
    ///
    /// Fails on unbalanced braces, a variable name outside
    /// `[A-Za-z_][A-Za-z0-9_.]*`, or a variable repeated in one template.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let mut expr = String::from("^");
        let mut depth = 0usize;
        let mut literal_start = 0;
        let mut open = 0;

        for (i, ch) in template.char_indices() {
            match ch {
                '{' => {
                    depth += 1;
                    if depth == 1 {
                        expr.push_str(&regex::escape(&template[literal_start..i]));
                        open = i;
                    }
                }
                '}' => {
                    if depth == 0 {
                        return Err(PatternError::UnbalancedBraces(template.to_string()));
                    }
                    depth -= 1;
                    if depth == 0 {
                        let name = &template[open + 1..i];
                        if !is_valid_variable_name(name) {
                            return Err(PatternError::InvalidVariable {
                                template: template.to_string(),
                                name: name.to_string(),
                            });
                        }
                        let safe = to_safe_name(name);
                        expr.push_str(&format!("(?P<{}>{})", safe, PATH_VALUE_CLASS));
                        literal_start = i + 1;
                    }
                }
                _ => {}
            }
        }

        if depth != 0 {
            return Err(PatternError::UnbalancedBraces(template.to_string()));
        }

        expr.push_str(&regex::escape(&template[literal_start..]));
        expr.push_str("/?$");

        let regex = Regex::new(&expr).map_err(|e| PatternError::Regex {
            template: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: template.to_string(),
            regex,
        })
    }

    /// Template the pattern was compiled from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Match a path tail, returning the captured values keyed by the original
    /// (possibly dotted) variable names decoded from the capture group names.
    pub fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|safe| {
                let value = captures.name(safe)?;
                let name = from_safe_name(safe).ok()?;
                Some((name, value.as_str().to_string()))
            })
            .collect();
        Some(params)
    }
}

fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Escape a variable name into a legal capture group name
pub fn to_safe_name(name: &str) -> String {
    format!("_{}", base32_encode(name.as_bytes()))
}

/// Recover the variable name from a capture group name
pub fn from_safe_name(safe: &str) -> Result<String, PatternError> {
    let invalid = || PatternError::InvalidSafeName(safe.to_string());

    let encoded = safe.strip_prefix('_').ok_or_else(invalid)?;
    let mut padded = encoded.to_string();
    while padded.len() % 8 != 0 {
        padded.push('=');
    }

    let bytes = base32_decode(&padded).ok_or_else(invalid)?;
    String::from_utf8(bytes).map_err(|_| invalid())
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize]));
        }
        buffer &= (1 << bits) - 1;
    }

    if bits > 0 {
        out.push(char::from(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize]));
    }

    out
}

/// Decode padded base32; `None` on bad length or characters
fn base32_decode(padded: &str) -> Option<Vec<u8>> {
    if padded.len() % 8 != 0 {
        return None;
    }

    let data = padded.trim_end_matches('=');
    // Valid unpadded tails leave 0, 2, 4, 5 or 7 characters in the last block
    if matches!(data.len() % 8, 1 | 3 | 6) {
        return None;
    }

    let mut out = Vec::with_capacity(data.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for ch in data.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&a| a == ch)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
        buffer &= (1 << bits) - 1;
    }

    Some(out)
}

/// Specificity score of a method path; higher sorts first.
///
/// Each segment shifts the score left by one and literal segments add one,
/// then the result is aligned to 31 bits.
pub fn score_path(path: &str) -> u64 {
    let mut score: u64 = 0;
    let mut segments = 0usize;

    for segment in path.split('/') {
        segments += 1;
        score <<= 1;
        if !segment.is_empty() && !segment.starts_with('{') {
            score += 1;
        }
    }

    if segments <= 31 {
        score <<= 31 - segments;
    }
    score
}
