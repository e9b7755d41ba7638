//! Document text extraction and the `text` fingerprint namespace.
//!
//! Text is pulled out of:
//! - PDF documents (via pdf-extract)
//! - Word documents (via docx-rs)
//! - RTF files (control words stripped)
//! - Plain text files (TXT, MD)
//!
//! The extracted text is normalized (lowercase, no ASCII punctuation,
//! collapsed whitespace), cut to [`TEXT_LIMIT`] characters and digested with
//! SHA-256. Two documents with the same wording but different containers or
//! formatting therefore share a `text` fingerprint.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Extensions (lowercase, with dot) that carry extractable text.
pub const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".txt", ".md", ".rtf"];

/// Normalized text beyond this many characters does not contribute to the hash.
pub const TEXT_LIMIT: usize = 200_000;

/// Errors that can occur during document text extraction.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: std::path::PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An error occurred during PDF extraction.
    #[error("Failed to extract text from PDF {path}: {message}")]
    PdfError {
        /// Path to the PDF file
        path: std::path::PathBuf,
        /// Error message
        message: String,
    },

    /// An error occurred during DOCX extraction.
    #[error("Failed to extract text from DOCX {path}: {message}")]
    DocxError {
        /// Path to the DOCX file
        path: std::path::PathBuf,
        /// Error message
        message: String,
    },

    /// The document format is not supported.
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
}

/// Extractor for document text.
pub struct DocumentExtractor;

impl DocumentExtractor {
    /// Extract text from a document at the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the document file
    pub fn extract_text(path: &Path) -> Result<String, DocumentError> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Self::extract_pdf(path),
            "docx" => Self::extract_docx(path),
            "txt" | "md" => Self::extract_plain_text(path),
            "rtf" => Self::extract_plain_text(path).map(|raw| strip_rtf(&raw)),
            _ => Err(DocumentError::UnsupportedFormat(extension)),
        }
    }

    /// Extract text from a PDF file.
    fn extract_pdf(path: &Path) -> Result<String, DocumentError> {
        pdf_extract::extract_text(path).map_err(|e| DocumentError::PdfError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Extract text from a DOCX file.
    fn extract_docx(path: &Path) -> Result<String, DocumentError> {
        let bytes = fs::read(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let docx = docx_rs::read_docx(&bytes).map_err(|e| DocumentError::DocxError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut text = String::new();
        for child in docx.document.children {
            Self::extract_text_from_child(&child, &mut text);
        }

        Ok(text)
    }

    /// Recursively extract text from DOCX document children.
    fn extract_text_from_child(child: &docx_rs::DocumentChild, text: &mut String) {
        match child {
            docx_rs::DocumentChild::Paragraph(p) => {
                for child in &p.children {
                    if let docx_rs::ParagraphChild::Run(r) = child {
                        for child in &r.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                text.push('\n');
            }
            docx_rs::DocumentChild::Table(t) => {
                for row_child in &t.rows {
                    let docx_rs::TableChild::TableRow(tr) = row_child;
                    for cell_child in &tr.cells {
                        let docx_rs::TableRowChild::TableCell(tc) = cell_child;
                        for child in &tc.children {
                            match child {
                                docx_rs::TableCellContent::Paragraph(p) => {
                                    Self::extract_text_from_child(
                                        &docx_rs::DocumentChild::Paragraph(p.clone()),
                                        text,
                                    );
                                }
                                docx_rs::TableCellContent::Table(t) => {
                                    Self::extract_text_from_child(
                                        &docx_rs::DocumentChild::Table(t.clone()),
                                        text,
                                    );
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Extract text from a plain text file.
    fn extract_plain_text(path: &Path) -> Result<String, DocumentError> {
        fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Normalize text for robust similarity comparison.
    ///
    /// Normalization includes:
    /// - Converting to lowercase
    /// - Removing punctuation
    /// - Normalizing whitespace
    pub fn normalize_text(text: &str) -> String {
        text.to_lowercase()
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Compute the `text` fingerprint of a document.
    ///
    /// Returns `Ok(None)` when the document holds no text after normalization.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the format is unsupported or extraction fails.
    pub fn text_fingerprint(path: &Path) -> Result<Option<String>, DocumentError> {
        let text = Self::extract_text(path)?;
        let normalized = Self::normalize_text(&text);
        if normalized.is_empty() {
            return Ok(None);
        }
        let limited: String = normalized.chars().take(TEXT_LIMIT).collect();
        Ok(Some(format!("{:x}", Sha256::digest(limited.as_bytes()))))
    }
}

/// Check whether an extension (lowercase, with dot) is a document type.
#[must_use]
pub fn is_document_extension(extension: &str) -> bool {
    DOCUMENT_EXTENSIONS.contains(&extension)
}

/// Drop RTF groups markers and control words, keeping the literal text.
fn strip_rtf(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => out.push(' '),
            '\\' => match chars.peek() {
                Some('\\' | '{' | '}') => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                _ => {
                    while chars.peek().is_some_and(|ch| ch.is_ascii_alphanumeric() || *ch == '-') {
                        chars.next();
                    }
                    if chars.peek() == Some(&' ') {
                        chars.next();
                    }
                    out.push(' ');
                }
            },
            _ => out.push(c),
        }
    }
    out
}
