//! Terminal formatting for patient replies.

/// Default line length for wrapped replies.
pub const DEFAULT_WIDTH: usize = 80;

/// Splits `text` into lines that are each shorter than `width` characters.
///
/// A line is broken at the last space inside its first `width` characters and
/// that space is dropped. A run with no space is cut at `width - 1`
/// characters. Newlines in `text` always start a new line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(2);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut remaining = paragraph.trim_end_matches('\r');
        while remaining.chars().count() >= width {
            let window_end = byte_offset(remaining, width);
            match remaining[..window_end].rfind(' ') {
                Some(space) => {
                    lines.push(remaining[..space].to_string());
                    remaining = &remaining[space + 1..];
                }
                None => {
                    let cut = byte_offset(remaining, width - 1);
                    lines.push(remaining[..cut].to_string());
                    remaining = &remaining[cut..];
                }
            }
        }
        lines.push(remaining.to_string());
    }

    lines
}

/// Byte index of the `chars`-th character, or the end of the string.
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}
