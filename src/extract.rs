//! Plain-text extraction from uploaded files.
//!
//! Uses pdf-extract for PDF, zip + quick-xml for DOCX.

use crate::document::FileType;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use thiserror::Error;

/// Main part of a word-processing package
const DOCX_BODY: &str = "word/document.xml";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("text file is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    #[error("failed to open DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),
    #[error("failed to parse DOCX body: {0}")]
    Xml(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no text content found")]
    NoContent,
}

/// Extract readable text from raw file bytes
pub fn extract_text(bytes: &[u8], file_type: FileType) -> Result<String, ExtractError> {
    let text = match file_type {
        FileType::Txt => String::from_utf8(bytes.to_vec())?,
        FileType::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?
        }
        FileType::Docx => extract_docx(bytes)?,
    };

    if text.trim().is_empty() {
        return Err(ExtractError::NoContent);
    }
    Ok(text)
}

/// Collect the text runs of `word/document.xml`, one line per paragraph
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name(DOCX_BODY)?.read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => current.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::GeneralRef(e)) if in_text => {
                let name = String::from_utf8_lossy(&e).into_owned();
                current.push_str(&resolve_entity(&name)?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}

/// Resolve `&name;` and `&#NN;` references that quick-xml reports separately
fn resolve_entity(name: &str) -> Result<String, ExtractError> {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => code.parse::<u32>(),
        };
        return parsed
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| ExtractError::Xml(format!("invalid character reference &{name};")));
    }

    quick_xml::escape::resolve_xml_entity(name)
        .map(str::to_string)
        .ok_or_else(|| ExtractError::Xml(format!("unknown entity &{name};")))
}
