//! Page layout shared by compiled pages, the index and the fixed routes.

use crate::{config::ConfigError, utils::html::escape_html};
use std::{fs, path::Path};

/// Built-in layout (embedded at compile time)
const DEFAULT_LAYOUT: &str = include_str!("embed/layout.html");

const TITLE: &str = "{title}";
const BODY: &str = "{body}";

/// HTML shell with `{title}` and `{body}` placeholders.
///
/// The template is split around `{body}` once, so page content is never
/// scanned for placeholders.
#[derive(Debug, Clone)]
pub struct Layout {
    head: String,
    tail: String,
}

impl Layout {
    pub fn builtin() -> Self {
        Self::parse(DEFAULT_LAYOUT).unwrap_or_else(|_| Self {
            head: String::new(),
            tail: String::new(),
        })
    }

    /// Parse a template. It must contain exactly one `{body}`.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let (head, tail) = template
            .split_once(BODY)
            .ok_or_else(|| ConfigError::invalid("[paths.layout]", "missing {body} placeholder"))?;
        if tail.contains(BODY) {
            return Err(ConfigError::invalid(
                "[paths.layout]",
                "{body} may only appear once",
            ));
        }
        Ok(Self {
            head: head.to_owned(),
            tail: tail.to_owned(),
        })
    }

    /// Load from `path`, or the built-in layout when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let template = fs::read_to_string(path)
                    .map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
                Self::parse(&template)
            }
            None => Ok(Self::builtin()),
        }
    }

    /// Wrap `body` (trusted HTML) in the layout, titled `title` (escaped).
    pub fn render(&self, title: &str, body: &str) -> String {
        let title = escape_html(title);
        let head = self.head.replace(TITLE, &title);
        let tail = self.tail.replace(TITLE, &title);

        let mut out = String::with_capacity(head.len() + body.len() + tail.len());
        out.push_str(&head);
        out.push_str(body);
        out.push_str(&tail);
        out
    }
}
