//! HTML directory listings.

use std::fmt::Write as _;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::vfs::{DirEntry, MountContext, VirtualPath};

/// Bytes left as-is in entry links: unreserved characters plus the
/// sub-delimiters that are safe inside a path segment. Everything else,
/// including space, `%`, `(`, `)`, `&`, `#`, `?` and all non-ASCII bytes, is
/// encoded.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'@')
    .remove(b'$')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b':')
    .remove(b'=');

/// Percent-encode one path segment for use in a link.
pub fn encode_segment(name: &str) -> String {
    utf8_percent_encode(name, SEGMENT).to_string()
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Sort entries by name, ignoring case. Directories and files interleave.
pub fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Human-readable byte count.
fn format_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Render the listing page for `dir`.
///
/// Entries are sorted here, so callers can pass the backend's snapshot as-is.
pub fn render_listing(ctx: &MountContext, dir: &VirtualPath, mut entries: Vec<DirEntry>) -> String {
    sort_entries(&mut entries);

    let dir_string = dir.to_dir_string();
    let title = escape_html(&dir_string);
    let base: String = dir
        .segments()
        .iter()
        .map(|s| format!("{}/", encode_segment(s)))
        .collect();
    let base = format!("{}{}", ctx.url_prefix(), base);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{title}</title>");
    let _ = writeln!(html, "<base href=\"{}\">", escape_html(&base));
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>.{title}</h1>");
    html.push_str("<table>\n");

    if !dir.is_root() {
        html.push_str("<tr><td></td><td></td><td><a href=\"../\">../</a></td></tr>\n");
    }

    for entry in &entries {
        let href = encode_segment(&entry.name);
        let name = escape_html(&entry.name);
        let (size, suffix) = if entry.is_dir() {
            (String::new(), "/")
        } else {
            (format_size(entry.size), "")
        };
        let mtime = httpdate::fmt_http_date(entry.mtime);
        let _ = writeln!(
            html,
            "<tr><td>{size}</td><td>{mtime}</td><td><a href=\"{href}\">{name}{suffix}</a></td></tr>"
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}
