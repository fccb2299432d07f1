//! DOT format helpers for rendering graphs with Graphviz.

/// Escapes a string for use inside a quoted DOT label.
///
/// Newlines become `\l` so that multi-line block listings stay left aligned.
///
/// ```rust
/// use flowcheck::utils::escape_dot;
///
/// assert_eq!(escape_dot("print \"B\""), "print \\\"B\\\"");
/// assert_eq!(escape_dot("a < b"), "a \\< b");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "")
        .replace('\n', "\\l")
        .replace('<', "\\<")
        .replace('>', "\\>")
        .replace('{', "\\{")
        .replace('}', "\\}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_plain() {
        assert_eq!(escape_dot("entry"), "entry");
    }

    #[test]
    fn test_escape_dot_instruction_text() {
        assert_eq!(escape_dot("jumpif i >= 10 exit"), "jumpif i \\>= 10 exit");
        assert_eq!(escape_dot("s = \"a\\b\""), "s = \\\"a\\\\b\\\"");
        assert_eq!(escape_dot("x = 1\r\ny = 2"), "x = 1\\ly = 2");
    }
}
