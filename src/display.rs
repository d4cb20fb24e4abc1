//! Small presentational helpers shared by every page.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use time::{format_description::BorrowedFormatItem, macros::format_description, OffsetDateTime};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none], [year], [hour repr:12 padding:none]:[minute] [period]"
);

/// Renders a UNIX timestamp as `Jan 5, 2025, 3:07 PM` (UTC).
pub fn format_date(timestamp: i64) -> String {
    let date = OffsetDateTime::from_unix_timestamp(timestamp).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    date.format(DATE_FORMAT).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub name: &'static str,
    pub hex: &'static str,
}

pub const PALETTE: [Color; 8] = [
    Color { name: "red", hex: "#ef4444" },
    Color { name: "blue", hex: "#3b82f6" },
    Color { name: "green", hex: "#22c55e" },
    Color { name: "yellow", hex: "#eab308" },
    Color { name: "purple", hex: "#a855f7" },
    Color { name: "pink", hex: "#ec4899" },
    Color { name: "indigo", hex: "#6366f1" },
    Color { name: "teal", hex: "#14b8a6" },
];

/// Avatar colour for a username. Hashes UTF-16 code units with 32-bit shift
/// semantics so links shared from older clients keep their colour.
pub fn username_color(username: &str) -> Color {
    let mut hash: i64 = 0;
    for unit in username.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5);
        hash = i64::from(unit).wrapping_add(i64::from(shifted).wrapping_sub(hash));
    }

    PALETTE[(hash.unsigned_abs() % PALETTE.len() as u64) as usize]
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn is_safe_link(dest: &str) -> bool {
    let dest = dest.trim_start().to_ascii_lowercase();
    match dest.split_once(':') {
        Some((scheme, _)) if !scheme.contains('/') => matches!(scheme, "http" | "https" | "mailto"),
        _ => true,
    }
}

/// Message bodies are markdown. Raw HTML is shown as text and links are limited
/// to http(s), mailto and relative targets.
pub fn markdown(content: &str) -> String {
    let parser = Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) if !is_safe_link(&dest_url) => {
            Event::Start(Tag::Link { link_type, dest_url: CowStr::Borrowed("#"), title, id })
        }
        Event::Start(Tag::Image { link_type, dest_url, title, id }) if !is_safe_link(&dest_url) => {
            Event::Start(Tag::Image { link_type, dest_url: CowStr::Borrowed("#"), title, id })
        }
        _ => event,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}
