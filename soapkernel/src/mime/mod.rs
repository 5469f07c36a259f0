//! # MIME multipart/related codec
//!
//! Minimal codec for SOAP with Attachments packages: a root part holding
//! the envelope followed by one part per attachment.
//!
//! ```
//! use soapkernel::mime::{MultipartRelated, Part};
//!
//! let mut package = MultipartRelated::new("text/xml");
//! package.push(Part::new("text/xml; charset=utf-8", "<env/>").content_id("root"));
//! package.set_start("root");
//!
//! let body = package.to_bytes();
//! let parsed = MultipartRelated::parse(&body, &package.content_type()).unwrap();
//! assert_eq!(parsed.root().unwrap().content, b"<env/>");
//! ```

mod content_type;
pub mod transfer;

pub use content_type::ContentType;

use crate::attachment::normalize_content_id;
use crate::error::{Error, Result};
use uuid::Uuid;

pub const MULTIPART_RELATED: &str = "multipart/related";

/// A single MIME part, content already decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Headers in wire order (names as received)
    pub headers: Vec<(String, String)>,
    pub content: Vec<u8>,
}

impl Part {
    pub fn new(content_type: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: vec![("Content-Type".to_string(), content_type.into())],
            content: content.into(),
        }
    }

    /// Sets the `Content-ID` header (angle brackets are added)
    pub fn content_id(self, id: &str) -> Self {
        self.header("Content-ID", format!("<{}>", normalize_content_id(id)))
    }

    pub fn transfer_encoding(self, encoding: &str) -> Self {
        self.header("Content-Transfer-Encoding", encoding.to_string())
    }

    /// Sets a header, replacing any header with the same name
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_content_type(&self) -> Option<&str> {
        self.get_header("Content-Type")
    }

    /// Content-ID without angle brackets
    pub fn get_content_id(&self) -> Option<String> {
        self.get_header("Content-ID").map(normalize_content_id)
    }

    pub fn get_transfer_encoding(&self) -> &str {
        self.get_header("Content-Transfer-Encoding").unwrap_or("binary")
    }
}

/// A `multipart/related` package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartRelated {
    pub boundary: String,

    /// MIME type of the root part (`type` parameter)
    pub root_type: String,

    /// Content-ID of the root part (`start` parameter), without brackets
    pub start: Option<String>,

    pub parts: Vec<Part>,
}

impl MultipartRelated {
    /// Creates an empty package with a random boundary
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            boundary: format!("uuid:{}", Uuid::new_v4()),
            root_type: root_type.into(),
            start: None,
            parts: Vec::new(),
        }
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn set_start(&mut self, content_id: &str) {
        self.start = Some(normalize_content_id(content_id));
    }

    fn root_index(&self) -> Option<usize> {
        match &self.start {
            Some(start) => self
                .parts
                .iter()
                .position(|p| p.get_content_id().as_deref() == Some(start.as_str())),
            None if self.parts.is_empty() => None,
            None => Some(0),
        }
    }

    /// Root part: the one named by `start`, otherwise the first part
    pub fn root(&self) -> Option<&Part> {
        self.root_index().map(|i| &self.parts[i])
    }

    /// Parts other than the root part
    pub fn non_root_parts(&self) -> impl Iterator<Item = &Part> {
        let root = self.root_index();
        self.parts
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != root)
            .map(|(_, p)| p)
    }

    /// Content-Type header value announcing this package
    pub fn content_type(&self) -> String {
        let mut ct = ContentType::new(MULTIPART_RELATED)
            .with_param("type", self.root_type.clone())
            .with_param("boundary", self.boundary.clone());
        if let Some(start) = &self.start {
            ct = ct.with_param("start", format!("<{}>", start));
        }
        ct.to_string()
    }

    /// Serializes the package, encoding each part per its transfer encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            for (name, value) in &part.headers {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(value.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&transfer::encode(
                &part.content,
                part.get_transfer_encoding(),
            ));
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
        out
    }

    /// Parses a body announced by a `multipart/*` Content-Type header
    pub fn parse(body: &[u8], content_type: &str) -> Result<Self> {
        let ct = ContentType::parse(content_type);
        if !ct.is_multipart() {
            return Err(Error::malformed(format!(
                "not a multipart content type: {}",
                ct.mime_type
            )));
        }
        let boundary = ct
            .param("boundary")
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::MissingBoundary(content_type.to_string()))?
            .to_string();

        let parts = split_parts(body, &boundary)?
            .into_iter()
            .map(parse_part)
            .collect::<Result<Vec<_>>>()?;

        let package = Self {
            boundary,
            root_type: ct.param("type").unwrap_or_default().to_string(),
            start: ct.param("start").map(normalize_content_id),
            parts,
        };

        if let Some(start) = &package.start {
            if package.root().is_none() {
                return Err(Error::MissingRootPart(start.clone()));
            }
        }
        if package.parts.is_empty() {
            return Err(Error::malformed("no part found"));
        }

        Ok(package)
    }
}

/// Returns the raw bytes of each part between delimiters
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut parts = Vec::new();

    // Le préambule avant le premier délimiteur est ignoré
    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| Error::malformed("opening boundary not found"))?;

    loop {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            return Ok(parts);
        }
        let start = skip_line(body, after)
            .ok_or_else(|| Error::malformed("truncated boundary line"))?;

        let next = find_delimiter_line(body, &delimiter, start)
            .ok_or_else(|| Error::malformed("closing boundary not found"))?;
        let end = strip_line_break(body, start, next);
        parts.push(&body[start..end]);
        pos = next;
    }
}

/// Finds the next delimiter placed at the beginning of a line
fn find_delimiter_line(body: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(found) = find(body, delimiter, search) {
        if found == from || body[found - 1] == b'\n' {
            return Some(found);
        }
        search = found + 1;
    }
    None
}

/// End of the part content: the line break before the delimiter is not content
fn strip_line_break(body: &[u8], start: usize, delimiter_pos: usize) -> usize {
    let mut end = delimiter_pos;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

/// Position after the end of the current line
fn skip_line(body: &[u8], from: usize) -> Option<usize> {
    body[from..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|i| from + i + 1)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

fn parse_part(raw: &[u8]) -> Result<Part> {
    let (header_block, content) = split_header_block(raw);
    let headers = parse_headers(&String::from_utf8_lossy(header_block))?;
    let mut part = Part {
        headers,
        content: Vec::new(),
    };
    part.content = transfer::decode(content, part.get_transfer_encoding())?;
    Ok(part)
}

/// Splits a raw part at the first empty line
fn split_header_block(raw: &[u8]) -> (&[u8], &[u8]) {
    // Partie sans en-tête : elle commence directement par une ligne vide
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return (&raw[..0], rest);
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return (&raw[..0], rest);
    }

    let crlf = find(raw, b"\r\n\r\n", 0).map(|i| (i, 4));
    let lf = find(raw, b"\n\n", 0).map(|i| (i, 2));
    let separator = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match separator {
        Some((i, len)) => (&raw[..i], &raw[i + len..]),
        None => (raw, &raw[raw.len()..]),
    }
}

fn parse_headers(block: &str) -> Result<Vec<(String, String)>> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in block.lines() {
        if line.is_empty() {
            continue;
        }
        // Ligne de continuation (folding)
        if line.starts_with([' ', '\t']) {
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => return Err(Error::malformed("continuation line without header")),
            }
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::malformed(format!("invalid part header: {}", line)))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(headers)
}
