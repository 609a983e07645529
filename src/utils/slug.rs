//! Slug derivation for documents and heading anchors.

use std::path::Path;

/// Slugs that collide with fixed routes and are never published.
pub const RESERVED_SLUGS: &[&str] = &["about", "index", "static"];

/// Derive a document slug from a file name by stripping `extension`.
///
/// Returns `None` for hidden files, other extensions, non-UTF-8 names and
/// names that would leave an empty slug.
///
/// | File name      | extension | slug          |
/// |----------------|-----------|---------------|
/// | `setup.md`     | `md`      | `setup`       |
/// | `v1.2.md`      | `md`      | `v1.2`        |
/// | `.draft.md`    | `md`      | -             |
/// | `LICENSE`      | `md`      | -             |
pub fn document_slug<'a>(file_name: &'a Path, extension: &str) -> Option<&'a str> {
    let name = file_name.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    let slug = name.strip_suffix(extension)?.strip_suffix('.')?;
    (!slug.is_empty()).then_some(slug)
}

#[inline]
pub fn is_reserved(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

/// Convert heading text to an anchor id.
///
/// Transliterates to ASCII, lowercases, keeps alphanumerics and joins
/// everything else with single dashes.
pub fn heading_id(text: &str) -> String {
    let ascii = deunicode::deunicode(text);
    let mut id = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !id.is_empty() {
                id.push('-');
            }
            pending_dash = false;
            id.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if id.is_empty() {
        "section".to_owned()
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_slug_strips_extension() {
        assert_eq!(document_slug(Path::new("setup.md"), "md"), Some("setup"));
        assert_eq!(document_slug(Path::new("v1.2.md"), "md"), Some("v1.2"));
        assert_eq!(document_slug(Path::new("my notes.md"), "md"), Some("my notes"));
    }

    #[test]
    fn test_document_slug_rejects_other_files() {
        assert_eq!(document_slug(Path::new("LICENSE"), "md"), None);
        assert_eq!(document_slug(Path::new("notes.txt"), "md"), None);
        assert_eq!(document_slug(Path::new("cmd"), "md"), None);
        assert_eq!(document_slug(Path::new(".md"), "md"), None);
        assert_eq!(document_slug(Path::new(".draft.md"), "md"), None);
    }

    #[test]
    fn test_document_slug_custom_extension() {
        assert_eq!(document_slug(Path::new("intro.markdown"), "markdown"), Some("intro"));
        assert_eq!(document_slug(Path::new("intro.md"), "markdown"), None);
    }

    #[test]
    fn test_reserved() {
        assert!(is_reserved("about"));
        assert!(is_reserved("static"));
        assert!(!is_reserved("about-us"));
    }

    #[test]
    fn test_heading_id_basic() {
        assert_eq!(heading_id("Getting Started"), "getting-started");
        assert_eq!(heading_id("  Hello,   World!  "), "hello-world");
        assert_eq!(heading_id("API v2 (beta)"), "api-v2-beta");
    }

    #[test]
    fn test_heading_id_transliterates() {
        assert_eq!(heading_id("Café Crème"), "cafe-creme");
    }

    #[test]
    fn test_heading_id_fallback() {
        assert_eq!(heading_id("!!!"), "section");
        assert_eq!(heading_id(""), "section");
    }
}
