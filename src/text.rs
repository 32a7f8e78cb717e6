//! Text position utilities for byte offset and line:column conversions.
//!
//! Lines and columns are 1-indexed (editor convention); byte offsets are
//! 0-indexed. Columns count Unicode scalar values, matching the positions
//! the report format expects.

use crate::edit::Span;

/// Convert a byte offset to 1-indexed line and column.
///
/// If `offset` exceeds the content length, returns the position at the end
/// of content.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    let mut current = 0usize;

    for ch in content.chars() {
        if current >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
        current += ch.len_utf8();
    }

    (line, col)
}

/// Extract the text content of a span.
///
/// Returns `None` if the span extends beyond content bounds or does not fall
/// on character boundaries.
pub fn extract_span<'a>(content: &'a str, span: &Span) -> Option<&'a str> {
    content.get(span.start..span.end)
}

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0)
}

/// Leading whitespace of the line containing `offset`.
///
/// Used to match surrounding indentation when inserting statements.
pub fn line_indent<'a>(content: &'a str, offset: usize) -> &'a str {
    let start = line_start(content, offset);
    let rest = &content[start..];
    let end = rest
        .char_indices()
        .find(|(_, c)| *c != ' ' && *c != '\t')
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    &rest[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    mod positions {
        use super::*;

        #[test]
        fn offset_to_position_simple() {
            let content = "line1\nline2\nline3\n";
            assert_eq!(byte_offset_to_position(content, 0), (1, 1));
            assert_eq!(byte_offset_to_position(content, 4), (1, 5));
            assert_eq!(byte_offset_to_position(content, 6), (2, 1));
            assert_eq!(byte_offset_to_position(content, 12), (3, 1));
        }

        #[test]
        fn offset_beyond_content_clamps_to_end() {
            let content = "short";
            assert_eq!(byte_offset_to_position(content, 100), (1, 6));
        }

        #[test]
        fn empty_content() {
            assert_eq!(byte_offset_to_position("", 0), (1, 1));
        }

        #[test]
        fn multibyte_columns_count_chars() {
            let content = "aéb\ncd";
            let offset = content.find('b').unwrap();
            assert_eq!(byte_offset_to_position(content, offset), (1, 3));
        }
    }

    mod spans {
        use super::*;

        #[test]
        fn extract_span_valid() {
            let content = "hello world";
            assert_eq!(extract_span(content, &Span::new(0, 5)), Some("hello"));
        }

        #[test]
        fn extract_span_out_of_bounds() {
            let content = "short";
            assert_eq!(extract_span(content, &Span::new(0, 100)), None);
        }
    }

    mod lines {
        use super::*;

        #[test]
        fn line_start_offsets() {
            let content = "one\ntwo\nthree";
            assert_eq!(line_start(content, 0), 0);
            assert_eq!(line_start(content, 2), 0);
            assert_eq!(line_start(content, 5), 4);
            assert_eq!(line_start(content, 9), 8);
        }

        #[test]
        fn indent_of_indented_line() {
            let content = "class A {\n    foo() {}\n}\n";
            let offset = content.find("foo").unwrap();
            assert_eq!(line_indent(content, offset), "    ");
        }

        #[test]
        fn indent_of_unindented_line() {
            let content = "top\n\tbody\n";
            assert_eq!(line_indent(content, 0), "");
            let offset = content.find("body").unwrap();
            assert_eq!(line_indent(content, offset), "\t");
        }
    }
}
