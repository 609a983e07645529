//! Small helpers shared across modules.

pub mod fs;
pub mod html;
pub mod log;
pub mod minify;
pub mod slug;
