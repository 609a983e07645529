//! Listing page of every published route.

use crate::{
    error::FsError,
    layout::Layout,
    utils::{fs::write_atomic, html::escape_html, minify::minify_html},
};
use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    sync::Arc,
};

const TITLE: &str = "index";

pub struct IndexBuilder {
    path: PathBuf,
    layout: Arc<Layout>,
    minify: bool,
}

impl IndexBuilder {
    pub fn new(path: PathBuf, layout: Arc<Layout>, minify: bool) -> Self {
        Self {
            path,
            layout,
            minify,
        }
    }

    /// One link per slug, in the given order.
    pub fn render(&self, slugs: &[String]) -> String {
        let mut body = String::from("<h1>Overview</h1>\n<ul class=\"pages\">\n");
        for slug in slugs {
            let _ = writeln!(
                body,
                "  <li><a href=\"/{}\">{}</a></li>",
                urlencoding::encode(slug),
                escape_html(slug)
            );
        }
        body.push_str("</ul>\n");
        self.layout.render(TITLE, &body)
    }

    /// Overwrite the index file with the listing of `slugs`.
    pub fn build(&self, slugs: &[String]) -> Result<&Path, FsError> {
        let html = self.render(slugs);
        write_atomic(&self.path, &minify_html(html.as_bytes(), self.minify))?;
        Ok(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn builder(dir: &Path) -> IndexBuilder {
        IndexBuilder::new(dir.join("index.html"), Arc::new(Layout::builtin()), false)
    }

    fn slugs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_render_lists_in_order() {
        let dir = TempDir::new().unwrap();
        let html = builder(dir.path()).render(&slugs(&["b", "a"]));

        assert!(html.contains("<title>index</title>"));
        let b = html.find("href=\"/b\"").unwrap();
        let a = html.find("href=\"/a\"").unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_render_escapes_and_encodes() {
        let dir = TempDir::new().unwrap();
        let html = builder(dir.path()).render(&slugs(&["a&b <x>"]));
        assert!(html.contains("href=\"/a%26b%20%3Cx%3E\""));
        assert!(html.contains(">a&amp;b &lt;x&gt;</a>"));
    }

    #[test]
    fn test_empty_index() {
        let dir = TempDir::new().unwrap();
        let html = builder(dir.path()).render(&[]);
        assert!(!html.contains("<li>"));
    }

    #[test]
    fn test_build_overwrites() {
        let dir = TempDir::new().unwrap();
        let builder = builder(dir.path());

        builder.build(&slugs(&["a"])).unwrap();
        let path = builder.build(&slugs(&["a", "b"])).unwrap();

        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("href=\"/b\""));
        assert_eq!(path, dir.path().join("index.html"));
    }
}
