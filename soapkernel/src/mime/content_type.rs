//! Content-Type header parsing (`type/subtype; name=value; name="quoted"`)

use std::fmt;

/// Parsed Content-Type header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lower-cased `type/subtype`
    pub mime_type: String,

    /// Parameters in header order, names lower-cased, values unquoted
    pub params: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into().to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    /// Parses a header value; never fails, unknown syntax ends up in `mime_type`
    pub fn parse(value: &str) -> Self {
        let mut segments = split_unquoted(value, ';').into_iter();
        let mime_type = segments
            .next()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let params = segments
            .filter_map(|segment| {
                let (name, value) = segment.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, unquote(value.trim())))
            })
            .collect();

        Self { mime_type, params }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is(&self, mime_type: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type)
    }

    pub fn is_multipart(&self) -> bool {
        self.mime_type.starts_with("multipart/")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type)?;
        for (name, value) in &self.params {
            write!(f, "; {}=\"{}\"", name, value.replace('"', "\\\""))?;
        }
        Ok(())
    }
}

/// Splits on `separator` outside double quotes
fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_soap_content_type() {
        let ct = ContentType::parse("Text/XML; charset=UTF-8");
        assert_eq!(ct.mime_type, "text/xml");
        assert_eq!(ct.param("charset"), Some("UTF-8"));
        assert!(!ct.is_multipart());
    }

    #[test]
    fn test_parse_multipart_with_quoted_semicolon() {
        let ct = ContentType::parse(
            r#"multipart/related; type="text/xml"; boundary="a;b=c"; start="<root@x>""#,
        );
        assert!(ct.is("multipart/related"));
        assert_eq!(ct.param("boundary"), Some("a;b=c"));
        assert_eq!(ct.param("START"), Some("<root@x>"));
        assert_eq!(ct.param("type"), Some("text/xml"));
    }

    #[test]
    fn test_display_quotes_params() {
        let ct = ContentType::new("multipart/related").with_param("boundary", "xyz");
        assert_eq!(ct.to_string(), r#"multipart/related; boundary="xyz""#);
    }
}
