use crate::core::model::{JobBatch, SpanKind, TextSpan};
use chrono::Local;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

/// The known Drive folder URL shapes. Each template has exactly one
/// capturing group: the folder identifier.
const URL_TEMPLATES: [&str; 5] = [
    r"https://drive\.google\.com/drive/folders/([\w.\-]+)",
    r"https://drive\.google\.com/folderview\?id=([\w.\-]+)",
    r"https://drive\.google\.com/open\?id=([\w.\-]+)",
    r"https://drive\.google\.com/(?:a/[\w.\-]+/)?file/d/([\w.\-]+)",
    r"https://drive\.google\.com/uc\?id=([\w.\-]+)",
];

fn templates() -> &'static [Regex] {
    static TEMPLATES: OnceLock<Vec<Regex>> = OnceLock::new();
    TEMPLATES
        .get_or_init(|| {
            URL_TEMPLATES
                .iter()
                .map(|t| Regex::new(t).expect("folder url template"))
                .collect()
        })
        .as_slice()
}

/// Extract the folder identifier from a Drive URL. The first non-empty
/// capture across all templates wins; an unrecognized URL yields `None`.
pub fn parse_folder_identifier(url: &str) -> Option<String> {
    for template in templates() {
        if let Some(caps) = template.captures(url) {
            if let Some(id) = caps.get(1) {
                if !id.as_str().is_empty() {
                    return Some(id.as_str().to_string());
                }
            }
        }
    }
    None
}

/// Slice a message by UTF-16 code-unit offsets, the unit Telegram entity
/// offsets are expressed in.
fn slice_utf16(text: &str, offset: usize, length: usize) -> String {
    let end = offset + length;
    let mut out = String::new();
    let mut pos = 0usize;
    for ch in text.chars() {
        let width = ch.len_utf16();
        if pos + width > end {
            break;
        }
        if pos >= offset {
            out.push(ch);
        }
        pos += width;
    }
    out
}

fn trim_name(s: &str) -> String {
    s.trim_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// Batch title: the text before the first newline, or today's date when the
/// message is a single line.
fn derive_title(text: &str) -> String {
    match text.split_once('\n') {
        Some((first, _)) => trim_name(first),
        None => Local::now().format("%Y%m%d").to_string(),
    }
}

/// Scan the message's spans and assemble the deduplicated job batch.
///
/// `text_link` spans carry their URL explicitly and are named after the
/// linked text; bare `url` spans are named `fileNNN` in encounter order.
/// Spans whose URL matches no known folder shape are skipped silently.
pub fn extract_batch(text: &str, spans: &[TextSpan]) -> JobBatch {
    let mut batch = JobBatch::new(derive_title(text));
    let mut counter = 0usize;

    for span in spans {
        let (url, name) = match span.kind {
            SpanKind::TextLink => {
                let Some(url) = span.url.clone() else {
                    continue;
                };
                let name = trim_name(&slice_utf16(text, span.offset, span.length));
                (url, name)
            }
            SpanKind::Url => {
                let url = slice_utf16(text, span.offset, span.length);
                let name = format!("file{:03}", counter);
                counter += 1;
                (url, name)
            }
            SpanKind::Other => continue,
        };

        debug!(%name, %url, "found link span");
        let Some(identifier) = parse_folder_identifier(&url) else {
            continue;
        };

        // Display names become Drive path components.
        let name = sanitize_filename::sanitize(name);
        info!(%name, %identifier, "found folder link");
        batch.insert(identifier, name);
    }

    batch
}
