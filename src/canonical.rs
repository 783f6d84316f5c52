//! Canonical-name normalization.
//!
//! Table columns, record fields, and named parameters all meet through the
//! canonical form: uppercase snake case with separators inserted at
//! camel-case, acronym, and letter-digit boundaries. `studentId`,
//! `STUDENT_ID`, `student_id`, and `Student-Id` all collapse to
//! `STUDENT_ID`, so matching is case- and format-insensitive.

use std::collections::HashMap;
use std::sync::RwLock;

/// Compute the canonical uppercase snake_case form of an identifier.
///
/// Separator characters (`_`, `-`, `.`, space, `/`) are normalized to a
/// single underscore. A name that already carries separators is only
/// uppercased; otherwise underscores are inserted where a lowercase letter
/// or digit is followed by an uppercase letter, and where an acronym run
/// ends (`HTML5Parser` -> `HTML5_PARSER`).
#[must_use]
pub fn canonicalize(name: &str) -> String {
    let normalized = normalize_separators(name);
    if normalized.contains('_') {
        return normalized.to_uppercase();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let lower_or_digit_to_upper =
                (prev.is_lowercase() || prev.is_ascii_digit()) && c.is_uppercase();
            // End of an acronym run: "HTMLParser" splits before the 'P'.
            let acronym_boundary = prev.is_uppercase()
                && c.is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if lower_or_digit_to_upper || acronym_boundary {
                out.push('_');
            }
        }
        out.push(c);
    }
    out.to_uppercase()
}

fn normalize_separators(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_sep = false;
    for c in name.chars() {
        if matches!(c, '_' | '-' | '.' | ' ' | '/') {
            if !prev_sep && !out.is_empty() {
                out.push('_');
            }
            prev_sep = true;
        } else {
            out.push(c);
            prev_sep = false;
        }
    }
    if out.ends_with('_') {
        out.pop();
    }
    out
}

/// Process-lifetime cache of canonicalized names.
///
/// Read-mostly; a race to canonicalize the same key is harmless because
/// both writers compute the same value.
#[derive(Debug, Default)]
pub struct CanonicalCache {
    cache: RwLock<HashMap<String, String>>,
}

impl CanonicalCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize through the cache.
    pub fn canonical(&self, name: &str) -> String {
        if let Ok(read) = self.cache.read()
            && let Some(hit) = read.get(name)
        {
            return hit.clone();
        }
        let computed = canonicalize(name);
        if let Ok(mut write) = self.cache.write() {
            write
                .entry(name.to_string())
                .or_insert_with(|| computed.clone());
        }
        computed
    }

    /// Compare two identifiers by canonical form.
    pub fn equals_canonical(&self, a: &str, b: &str) -> bool {
        self.canonical(a) == self.canonical(b)
    }

    /// Find the element of `candidates` that canonically matches `name`.
    pub fn find_canonical<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a str>,
        name: &str,
    ) -> Option<&'a str> {
        let target = self.canonical(name);
        candidates
            .into_iter()
            .find(|c| self.canonical(c) == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalence_classes_collapse() {
        let forms = ["studentId", "STUDENT_ID", "student_id", "Student-Id"];
        for a in forms {
            for b in forms {
                assert_eq!(canonicalize(a), canonicalize(b), "{a} vs {b}");
            }
        }
        assert_eq!(canonicalize("studentId"), "STUDENT_ID");
    }

    #[test]
    fn acronym_and_digit_boundaries() {
        assert_eq!(canonicalize("HTML5Parser"), "HTML5_PARSER");
        assert_eq!(canonicalize("HTMLParser"), "HTML_PARSER");
        assert_eq!(canonicalize("parseHTML"), "PARSE_HTML");
        assert_eq!(canonicalize("userId2"), "USER_ID2");
    }

    #[test]
    fn snake_case_passes_through() {
        assert_eq!(canonicalize("SNAKE_CASE"), "SNAKE_CASE");
        assert_eq!(canonicalize("already_snake"), "ALREADY_SNAKE");
        assert_eq!(canonicalize("student id"), "STUDENT_ID");
    }

    #[test]
    fn cache_returns_stable_values() {
        let cache = CanonicalCache::new();
        assert_eq!(cache.canonical("orderId"), "ORDER_ID");
        assert_eq!(cache.canonical("orderId"), "ORDER_ID");
        assert!(cache.equals_canonical("orderId", "order_id"));
        assert!(!cache.equals_canonical("orderId", "customer_id"));
    }

    #[test]
    fn find_canonical_picks_first_match() {
        let cache = CanonicalCache::new();
        let names = ["GUESTS", "PLAYERS"];
        assert_eq!(
            cache.find_canonical(names.iter().copied(), "players"),
            Some("PLAYERS")
        );
        assert_eq!(cache.find_canonical(names.iter().copied(), "rooms"), None);
    }
}
