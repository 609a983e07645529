//! Markdown to HTML page compilation.
//!
//! ```text
//! Document.raw ──utf8──► markdown_to_html ──► nav + fragment
//!                                                 │
//!                         Layout::render(title) ◄─┘
//!                                 │
//!                           minify (optional)
//!                                 │
//!               write_atomic(<generated>/pages/<slug>.html)
//! ```

use crate::{
    error::CompileError,
    fetch::Document,
    layout::Layout,
    utils::{fs::write_atomic, html::escape_html, minify::minify_html, slug::heading_id},
};
use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Navigation prepended to every compiled page.
const NAV: &str = "<nav><a href=\"/\">Overview</a></nav>\n";

/// A compiled page on disk.
#[derive(Debug, Clone)]
pub struct Page {
    pub slug: String,
    pub title: String,
    pub path: PathBuf,
}

/// Compiles documents into standalone HTML files under `pages_dir`.
pub struct PageCompiler {
    pages_dir: PathBuf,
    layout: Arc<Layout>,
    minify: bool,
}

impl PageCompiler {
    pub fn new(pages_dir: PathBuf, layout: Arc<Layout>, minify: bool) -> Self {
        Self {
            pages_dir,
            layout,
            minify,
        }
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    /// Where the artifact for `slug` lives.
    pub fn artifact_path(&self, slug: &str) -> PathBuf {
        self.pages_dir.join(format!("{slug}.html"))
    }

    /// Render a document to a full HTML page. Returns `(title, html)`.
    pub fn render(&self, doc: &Document) -> Result<(String, Vec<u8>), CompileError> {
        let source = std::str::from_utf8(&doc.raw).map_err(|source| CompileError::InvalidUtf8 {
            slug: doc.slug.clone(),
            source,
        })?;

        let (fragment, title) = markdown_to_html(source);
        let title = title.unwrap_or_else(|| doc.slug.clone());

        let mut body = String::with_capacity(NAV.len() + fragment.len());
        body.push_str(NAV);
        body.push_str(&fragment);

        let page = self.layout.render(&title, &body);
        let bytes = minify_html(page.as_bytes(), self.minify).into_owned();
        Ok((title, bytes))
    }

    /// Render and write the artifact for `doc`.
    pub fn compile(&self, doc: &Document) -> Result<Page, CompileError> {
        let (title, html) = self.render(doc)?;
        let path = self.artifact_path(&doc.slug);
        write_atomic(&path, &html)?;
        Ok(Page {
            slug: doc.slug.clone(),
            title,
            path,
        })
    }
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Convert markdown to an HTML fragment.
///
/// Returns the fragment and the text of the first level-1 heading.
pub fn markdown_to_html(source: &str) -> (String, Option<String>) {
    let mut events: Vec<Event> = Parser::new_ext(source, parser_options()).collect();
    let title = assign_heading_ids(&mut events);
    mark_external_links(&mut events);

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    (out, title)
}

/// Give every heading a unique id. Returns the first H1's text.
fn assign_heading_ids(events: &mut [Event]) -> Option<String> {
    let mut seen: FxHashMap<String, usize> = FxHashMap::default();
    let mut title = None;

    // Explicit ids claim their name first
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            seen.insert(id.to_string(), 0);
        }
    }

    let mut i = 0;
    while i < events.len() {
        let Event::Start(Tag::Heading { level, id, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = *level;
        let has_id = id.is_some();

        let text = heading_text(&events[i + 1..]);
        if title.is_none() && level == HeadingLevel::H1 && !text.trim().is_empty() {
            title = Some(text.trim().to_owned());
        }

        if !has_id {
            let unique = unique_id(&mut seen, heading_id(&text));
            if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
                *id = Some(CowStr::from(unique));
            }
        }
        i += 1;
    }

    title
}

/// Plain text of a heading, up to its end tag.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// `base`, or `base-N` with the first free N.
fn unique_id(seen: &mut FxHashMap<String, usize>, base: String) -> String {
    let Some(&last) = seen.get(&base) else {
        seen.insert(base.clone(), 0);
        return base;
    };

    let mut n = last;
    let id = loop {
        n += 1;
        let candidate = format!("{base}-{n}");
        if !seen.contains_key(&candidate) {
            break candidate;
        }
    };
    seen.insert(base, n);
    seen.insert(id.clone(), 0);
    id
}

/// Rewrite absolute links so they open in a new tab.
fn mark_external_links(events: &mut [Event]) {
    for event in events.iter_mut() {
        let Event::Start(Tag::Link {
            dest_url, title, ..
        }) = event
        else {
            continue;
        };
        if !(dest_url.starts_with("http://") || dest_url.starts_with("https://")) {
            continue;
        }

        let mut open = format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener\"",
            escape_html(dest_url)
        );
        if !title.is_empty() {
            open.push_str(&format!(" title=\"{}\"", escape_html(title)));
        }
        open.push('>');
        *event = Event::InlineHtml(CowStr::from(open));
    }
}
