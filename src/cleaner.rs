//! Path normalization. Every extractor produces routes in its framework's
//! native placeholder syntax; the cleaner converts them to one canonical
//! template form before they enter the endpoint database.

use crate::model::PartialMapping;

/// Stateless path normalizer holding the user-supplied override mappings.
#[derive(Debug, Default, Clone)]
pub struct PathCleaner {
    mappings: Vec<PartialMapping>,
}

impl PathCleaner {
    pub fn new(mappings: Vec<PartialMapping>) -> Self {
        Self { mappings }
    }

    /// Converts a raw extractor-produced path into canonical form and applies
    /// any override mappings.
    pub fn clean(&self, raw: &str) -> String {
        let mut path = canonicalize(raw);
        for mapping in &self.mappings {
            if path.contains(&mapping.search) {
                path = path.replace(&mapping.search, &mapping.replacement);
                path = canonicalize(&path);
            }
        }
        path
    }
}

/// True for a segment that matches any concrete value.
pub fn is_placeholder_segment(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// Rewrites one raw path into the canonical template form: forward slashes,
/// a single leading `/`, no doubled or trailing separators, and every
/// parametric segment rendered as `{name}`.
pub fn canonicalize(raw: &str) -> String {
    let mut out = String::from("/");
    let slashed = raw.replace('\\', "/");
    for segment in slashed.split('/') {
        if segment.is_empty() {
            continue;
        }
        let cleaned = canonicalize_segment(segment);
        if cleaned.is_empty() {
            continue;
        }
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(&cleaned);
    }
    out
}

fn canonicalize_segment(segment: &str) -> String {
    // servlet wildcard mappings
    if segment == "*" {
        return "{}".to_string();
    }
    // Rails/Sinatra symbol segments
    if let Some(name) = segment.strip_prefix(':') {
        return format!("{{{}}}", name);
    }
    // Django path converters: <id>, <int:id>
    if segment.starts_with('<') && segment.ends_with('>') {
        let inner = &segment[1..segment.len() - 1];
        let name = inner.rsplit(':').next().unwrap_or(inner);
        return format!("{{{}}}", name);
    }
    // Regex named group: (?P<id>[0-9]+)
    if let Some(start) = segment.find("(?P<") {
        if let Some(end) = segment[start + 4..].find('>') {
            let name = &segment[start + 4..start + 4 + end];
            return format!("{{{}}}", name);
        }
    }
    // Template placeholders: {id}, {id=3}, {id:int}, {id?}
    if segment.starts_with('{') && segment.ends_with('}') {
        let inner = &segment[1..segment.len() - 1];
        let name: String = inner
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() {
            return "{}".to_string();
        }
        return format!("{{{}}}", name);
    }
    segment.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_has_single_separators() {
        assert_eq!(canonicalize("api//users/"), "/api/users");
        assert_eq!(canonicalize("api\\users"), "/api/users");
        assert_eq!(canonicalize(""), "/");
        assert_eq!(canonicalize("/"), "/");
    }

    #[test]
    fn placeholder_syntaxes_normalize() {
        assert_eq!(canonicalize("/reports/*"), "/reports/{}");
        assert_eq!(canonicalize("/users/:id"), "/users/{id}");
        assert_eq!(canonicalize("/users/<int:id>/"), "/users/{id}");
        assert_eq!(canonicalize("/users/<id>"), "/users/{id}");
        assert_eq!(canonicalize("users/(?P<slug>[a-z]+)"), "/users/{slug}");
        assert_eq!(canonicalize("/items/{id:int}"), "/items/{id}");
        assert_eq!(canonicalize("/items/{id=7}"), "/items/{id}");
        assert_eq!(canonicalize("/items/{id?}"), "/items/{id}");
    }

    #[test]
    fn overrides_apply_after_normalization() {
        let cleaner = PathCleaner::new(vec![PartialMapping::new("/internal", "/api")]);
        assert_eq!(cleaner.clean("internal//users"), "/api/users");
        assert_eq!(cleaner.clean("/public/users"), "/public/users");
    }

    #[test]
    fn placeholder_segments_detected() {
        assert!(is_placeholder_segment("{id}"));
        assert!(!is_placeholder_segment("id"));
    }
}
