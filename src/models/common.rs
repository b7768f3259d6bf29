//! Shared value types

use serde::{Deserialize, Serialize};

/// Reference to an object in storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    pub file_path: String,
    pub file_type: String,
}

impl FileObject {
    pub fn new(file_path: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            file_type: file_type.into(),
        }
    }

    pub fn png(file_path: impl Into<String>) -> Self {
        Self::new(file_path, SupportImageMime::Png.as_str())
    }
}

/// Image types accepted for avatars, backgrounds and product images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportImageMime {
    Png,
    Jpeg,
    Svg,
}

impl SupportImageMime {
    pub fn parse(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(SupportImageMime::Png),
            "image/jpeg" | "image/jpg" => Some(SupportImageMime::Jpeg),
            "image/svg+xml" => Some(SupportImageMime::Svg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportImageMime::Png => "image/png",
            SupportImageMime::Jpeg => "image/jpeg",
            SupportImageMime::Svg => "image/svg+xml",
        }
    }

    /// The MIME subtype doubles as the stored file extension
    pub fn extension(&self) -> &'static str {
        mime_subtype(self.as_str())
    }
}

/// Document types accepted for organization certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportCertificateMime {
    Png,
    Jpeg,
    Pdf,
}

impl SupportCertificateMime {
    pub fn parse(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(SupportCertificateMime::Png),
            "image/jpeg" | "image/jpg" => Some(SupportCertificateMime::Jpeg),
            "application/pdf" => Some(SupportCertificateMime::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportCertificateMime::Png => "image/png",
            SupportCertificateMime::Jpeg => "image/jpeg",
            SupportCertificateMime::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        mime_subtype(self.as_str())
    }
}

fn mime_subtype(mime: &str) -> &str {
    mime.split_once('/').map(|(_, subtype)| subtype).unwrap_or(mime)
}

/// Guess a content type from a stored object's extension
pub fn content_type_for_path(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpeg") | Some("jpg") => "image/jpeg",
        Some("svg+xml") | Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("ico") => "image/x-icon",
        Some("html") => "text/html",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
