//! Content sanitisation seam.

/// Sanitised content plus the number of printable characters, which is what
/// the minimum-length rule measures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    pub content: String,
    pub printable_len: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    #[error("unrecoverable encoding: {0}")]
    Encoding(String),
}

/// Turns raw submitted markup into stored content. Malformed input must not
/// fail; only input that cannot be represented at all may.
pub trait ContentFilter: Send + Sync {
    fn filter(&self, raw: &str) -> Result<Filtered, FilterError>;
}

/// Treats submissions as plain text: escapes HTML, normalises line endings
/// and drops control characters.
#[derive(Debug, Clone, Default)]
pub struct PlainTextFilter;

pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len() + input.len() / 4);
    for c in input.chars() {
        match c {
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '&' => output.push_str("&amp;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(c),
        }
    }
    output
}

impl ContentFilter for PlainTextFilter {
    fn filter(&self, raw: &str) -> Result<Filtered, FilterError> {
        if raw.contains('\0') {
            return Err(FilterError::Encoding("NUL byte".into()));
        }
        let cleaned: String = raw
            .replace("\r\n", "\n")
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect();
        let cleaned = cleaned.trim();
        let printable_len = cleaned.chars().filter(|c| !c.is_whitespace()).count();
        Ok(Filtered { content: escape_html(cleaned), printable_len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        let f = PlainTextFilter.filter("<b>hi</b> & 'you'").unwrap();
        assert_eq!(f.content, "&lt;b&gt;hi&lt;/b&gt; &amp; &#x27;you&#x27;");
    }

    #[test]
    fn printable_length_ignores_whitespace() {
        let f = PlainTextFilter.filter("  a \r\n b\t\x07 ").unwrap();
        assert_eq!(f.printable_len, 2);
        assert_eq!(f.content, "a \n b");
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(PlainTextFilter.filter("你好吗").unwrap().printable_len, 3);
    }

    #[test]
    fn nul_is_unrecoverable() {
        assert!(PlainTextFilter.filter("a\0b").is_err());
    }
}
