//! Line and indentation helpers used when splicing generated code into a buffer.

/// Offset of the first character of the line containing `offset`.
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .rfind('\n')
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

/// Offset just past the line terminator of the line containing `offset`.
pub fn line_end(source: &str, offset: usize) -> usize {
    source[offset.min(source.len())..]
        .find('\n')
        .map(|idx| offset + idx + 1)
        .unwrap_or(source.len())
}

/// The leading whitespace of the line containing `offset`.
pub fn indentation_at(source: &str, offset: usize) -> &str {
    let start = line_start(source, offset);
    let line = &source[start..];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..len]
}

/// Returns true if only whitespace precedes `offset` on its line.
pub fn starts_line(source: &str, offset: usize) -> bool {
    source[line_start(source, offset)..offset]
        .chars()
        .all(|c| c == ' ' || c == '\t')
}

/// Removes `indent` from the start of every line after the first.
///
/// The first line of a node's text starts at the node itself, so it carries no
/// leading indentation.
pub fn dedent(text: &str, indent: &str) -> String {
    if indent.is_empty() || !text.contains('\n') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
            out.push_str(line.strip_prefix(indent).unwrap_or_else(|| line.trim_start_matches([' ', '\t'])));
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Prefixes every line after the first with `indent`. Blank lines stay blank.
pub fn indent_tail(text: &str, indent: &str) -> String {
    if indent.is_empty() || !text.contains('\n') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + indent.len() * 4);
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
            if !line.trim().is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

/// Prefixes every non-blank line with `indent`.
pub fn indent_all(text: &str, indent: &str) -> String {
    let tail = indent_tail(text, indent);
    if text.lines().next().is_some_and(|l| !l.trim().is_empty()) {
        format!("{indent}{tail}")
    } else {
        tail
    }
}

/// Converts a byte offset into a zero-based `(line, column)` pair.
pub fn offset_to_line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let start = line_start(source, offset);
    let line = source[..start].matches('\n').count() as u32;
    let col = source[start..offset].chars().count() as u32;
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation_at() {
        let src = "function f() {\n    let x = 1;\n}";
        assert_eq!(indentation_at(src, 20), "    ");
        assert_eq!(indentation_at(src, 0), "");
    }

    #[test]
    fn test_dedent_then_indent() {
        let text = "if (a) {\n        b();\n    }";
        let relative = dedent(text, "    ");
        assert_eq!(relative, "if (a) {\n    b();\n}");
        assert_eq!(indent_tail(&relative, "  "), "if (a) {\n      b();\n  }");
    }

    #[test]
    fn test_offset_to_line_col() {
        assert_eq!(offset_to_line_col("ab\ncd", 4), (1, 1));
        assert_eq!(offset_to_line_col("ab\ncd", 0), (0, 0));
    }

    #[test]
    fn test_starts_line() {
        let src = "a;\n  b;";
        assert!(starts_line(src, 5));
        assert!(!starts_line(src, 1));
    }
}
