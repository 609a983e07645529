//! HTML minification for generated pages.

use std::borrow::Cow;

/// Minify `html` when `enabled`.
///
/// Returns `Cow::Borrowed` if minify disabled, `Cow::Owned` if minified.
pub fn minify_html(html: &[u8], enabled: bool) -> Cow<'_, [u8]> {
    if !enabled {
        return Cow::Borrowed(html);
    }

    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    Cow::Owned(minify_html::minify(html, &cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_borrowed() {
        let html = b"<p>  hello  </p>";
        assert!(matches!(minify_html(html, false), Cow::Borrowed(_)));
    }

    #[test]
    fn test_enabled_shrinks_and_keeps_content() {
        let html = b"<html>\n  <body>\n    <!-- note -->\n    <p>hello</p>\n  </body>\n</html>";
        let out = minify_html(html, true);
        let out = String::from_utf8_lossy(&out);
        assert!(out.len() < html.len());
        assert!(out.contains("hello"));
        assert!(!out.contains("note"));
    }
}
