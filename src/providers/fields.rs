//! Tolerant field probing over raw upstream JSON.
//!
//! Paths are dot-separated; numeric segments index arrays (`"tags.0"`, `"rankVo.hotCode"`).

use serde_json::Value;

pub fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(raw, |node, segment| match segment.parse::<usize>() {
        Ok(index) => node.get(index),
        Err(_) => node.get(segment),
    })
}

/// A non-empty string at `path`. Numbers are rendered, everything else is ignored.
pub fn text(raw: &Value, path: &str) -> Option<String> {
    match lookup(raw, path)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty value along a precedence chain.
pub fn first_text(raw: &Value, chain: &[&str]) -> Option<String> {
    chain.iter().find_map(|path| text(raw, path))
}

/// Like [`first_text`], falling back to `default`.
pub fn pick(raw: &Value, chain: &[&str], default: &str) -> String {
    first_text(raw, chain).unwrap_or_else(|| default.to_string())
}

pub fn number(raw: &Value, path: &str) -> Option<f64> {
    match lookup(raw, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A whole number at `path` shifted by `offset`, kept only if it is a valid 1-based index.
/// Fractional, negative and out-of-range values yield `None`.
pub fn ordinal(raw: &Value, path: &str, offset: u32) -> Option<u32> {
    let n = number(raw, path)?;
    if n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
        return None;
    }
    (n as u32).checked_add(offset).filter(|index| *index >= 1)
}

/// 1-based index for the record at `position` in its list.
pub fn position_index(position: usize) -> u32 {
    u32::try_from(position).map_or(u32::MAX, |p| p.saturating_add(1))
}
