//! MIME attachments carried alongside a SOAP envelope

use uuid::Uuid;

/// Default transfer encoding of attachment parts
pub const DEFAULT_TRANSFER_ENCODING: &str = "binary";

/// Domain part of generated Content-IDs
const CONTENT_ID_DOMAIN: &str = "soapkernel";

/// A single MIME part attached to a SOAP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Content-ID without the surrounding angle brackets
    pub content_id: String,

    /// MIME type of the part (ex: "application/pdf")
    pub content_type: String,

    /// Decoded content
    pub content: Vec<u8>,

    /// Transfer encoding used on the wire ("binary", "base64", ...)
    pub content_transfer_encoding: String,
}

impl Attachment {
    pub fn new(
        content_id: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            content_id: normalize_content_id(&content_id.into()),
            content_type: content_type.into(),
            content: content.into(),
            content_transfer_encoding: DEFAULT_TRANSFER_ENCODING.to_string(),
        }
    }

    /// Creates an attachment with a fresh `uuid@soapkernel` Content-ID
    pub fn with_generated_id(content_type: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::new(generate_content_id(), content_type, content)
    }

    /// Sets the transfer encoding used when the attachment is serialized
    pub fn transfer_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_transfer_encoding = encoding.into().to_ascii_lowercase();
        self
    }

    /// `cid:` URI referencing this attachment from the envelope
    pub fn cid_uri(&self) -> String {
        format!("cid:{}", self.content_id)
    }
}

/// Generates a new unique Content-ID (without angle brackets)
pub fn generate_content_id() -> String {
    format!("{}@{}", Uuid::new_v4(), CONTENT_ID_DOMAIN)
}

/// Strips whitespace, angle brackets and a `cid:` prefix from a Content-ID
pub fn normalize_content_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("cid:").unwrap_or(trimmed);
    trimmed
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(trimmed)
        .to_string()
}

/// Ordered collection of attachments keyed by Content-ID
///
/// Inserting an attachment whose Content-ID is already present replaces it
/// in place, so the serialization order stays stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachments {
    items: Vec<Attachment>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an attachment, returning the one it replaced
    pub fn insert(&mut self, attachment: Attachment) -> Option<Attachment> {
        match self
            .items
            .iter_mut()
            .find(|a| a.content_id == attachment.content_id)
        {
            Some(existing) => Some(std::mem::replace(existing, attachment)),
            None => {
                self.items.push(attachment);
                None
            }
        }
    }

    pub fn get(&self, content_id: &str) -> Option<&Attachment> {
        let id = normalize_content_id(content_id);
        self.items.iter().find(|a| a.content_id == id)
    }

    /// Removes and returns the attachment with this Content-ID
    pub fn remove(&mut self, content_id: &str) -> Option<Attachment> {
        let id = normalize_content_id(content_id);
        let index = self.items.iter().position(|a| a.content_id == id)?;
        Some(self.items.remove(index))
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.get(content_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attachment> {
        self.items.iter()
    }
}

impl IntoIterator for Attachments {
    type Item = Attachment;
    type IntoIter = std::vec::IntoIter<Attachment>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Attachments {
    type Item = &'a Attachment;
    type IntoIter = std::slice::Iter<'a, Attachment>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Attachment> for Attachments {
    fn from_iter<I: IntoIterator<Item = Attachment>>(iter: I) -> Self {
        let mut attachments = Attachments::new();
        for attachment in iter {
            attachments.insert(attachment);
        }
        attachments
    }
}
