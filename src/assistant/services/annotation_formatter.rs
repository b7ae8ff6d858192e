use std::sync::LazyLock;

use regex::Regex;

use crate::assistant::models::{Annotation, AnnotationKind};

/// Markdown-style link, `[label](url)`, with tolerant whitespace.
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\s*\(\s*(.*?)\s*\)").expect("valid regex"));

/// Citation bracket marker, `【…】`.
static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("【(.*?)】").expect("valid regex"));

/// Sanitize a live snapshot for rendering mid-stream.
///
/// Links are rewritten to the literal "Download Link" because a URL is not
/// trustworthy while the message is still being generated; citation markers
/// are left alone here and handled at finalization.
pub fn sanitize_live(snapshot: &str) -> String {
    MARKDOWN_LINK.replace_all(snapshot, "Download Link").into_owned()
}

/// Strip every citation bracket marker from finalized text.
pub fn strip_citation_markers(text: &str) -> String {
    CITATION_MARKER.replace_all(text, "").into_owned()
}

/// Format a finalized message: resolve annotations into inline reference
/// markers plus a trailing citation list, then strip residual markers.
///
/// Annotations are processed in document order and each replaces only the
/// FIRST occurrence of its exact matched span, so identical text elsewhere in
/// the message is never corrupted. A file-path annotation without a resolved
/// href leaves its raw span untouched.
pub fn format_annotations(raw_text: &str, annotations: &[Annotation]) -> String {
    let mut text = raw_text.to_string();
    let mut footers: Vec<String> = Vec::new();
    let mut citation_index = 0usize;

    for annotation in annotations {
        match &annotation.kind {
            AnnotationKind::FileCitation { quote, filename } => {
                citation_index += 1;
                text = text.replacen(
                    annotation.matched_span.as_str(),
                    &format!("[{citation_index}]"),
                    1,
                );
                footers.push(format!("[{citation_index}] {quote} from {filename}"));
            }
            AnnotationKind::FilePath {
                download_href: Some(href),
                ..
            } => {
                let file_name = annotation
                    .matched_span
                    .rsplit('/')
                    .next()
                    .unwrap_or(annotation.matched_span.as_str());
                let link = format!("<a href=\"{href}\" download=\"{file_name}\">Download Link</a>");
                text = text.replacen(annotation.matched_span.as_str(), &link, 1);
            }
            // Unresolvable file: leave the raw marker in place.
            AnnotationKind::FilePath {
                download_href: None,
                ..
            } => {}
        }
    }

    let mut formatted = strip_citation_markers(&text);
    if !footers.is_empty() {
        formatted.push_str("\n\n");
        formatted.push_str(&footers.join("\n"));
    }
    formatted
}
