use std::sync::OnceLock;

use regex::Regex;

use crate::state::PageId;

fn separator_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Constant pattern; every slug test compiles it.
    RE.get_or_init(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}]+").expect("static slug pattern"))
}

/// Lowercases `title` and joins its alphanumeric runs with `-`.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    separator_run()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// `<prefix>/<slug>-<id>`, or `<prefix>/<id>` when the title has no usable characters.
pub fn page_path(prefix: &str, title: &str, id: &PageId) -> String {
    let prefix = prefix.trim_end_matches('/');
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{prefix}/{id}")
    } else {
        format!("{prefix}/{slug}-{id}")
    }
}
