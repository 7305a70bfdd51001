use std::ops::Range;

use serde::de::IgnoredAny;

/// End offset of the JSON object starting at `text[start]`, if one parses.
///
/// Nesting deeper than serde_json's recursion limit counts as a failed
/// parse.
fn object_end(text: &str, start: usize) -> Option<usize> {
    let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<IgnoredAny>();
    match values.next() {
        Some(Ok(_)) => Some(start + values.byte_offset()),
        _ => None,
    }
}

/// Byte ranges of syntactically complete JSON objects embedded in `text`,
/// scanning left to right.
///
/// Each `{` is tried as an object start; a successful scan resumes after the
/// object it found, a failed one moves on to the next `{`.
pub(crate) fn embedded_object_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(rel) = memchr::memchr(b'{', &bytes[from..]) {
        let start = from + rel;
        match object_end(text, start) {
            Some(end) => {
                spans.push(start..end);
                from = end;
            }
            None => from = start + 1,
        }
    }
    spans
}
