//! Artifact export: turns a summarized document into downloadable bytes.
//!
//! Output is deterministic. The DOCX package is written with stored (not
//! deflated) entries and the fixed DOS epoch timestamp, so the same document
//! always produces the same bytes.

use crate::document::{Document, DocumentId};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quick_xml::Writer;
use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Write};
use std::str::FromStr;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Heading1 mirrors a bold 16pt title; body text is 12pt (sizes in half-points)
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="24"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:after="240"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style></w:styles>"#;

/// RFC 5987 `attr-char`: everything else is percent-encoded in `filename*`
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("unsupported export format: {0} (expected txt or docx)")]
    UnsupportedFormat(String),
    #[error("document {0} has no summary yet")]
    NotSummarized(DocumentId),
    #[error("failed to write DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),
    #[error("failed to write DOCX body: {0}")]
    Xml(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Docx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Docx => "docx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain; charset=utf-8",
            ExportFormat::Docx => DOCX_MIME,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txt" => Ok(ExportFormat::Txt),
            "docx" => Ok(ExportFormat::Docx),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// An exported byte stream with the metadata needed to serve it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// ASCII-only name, safe as a quoted header parameter
    pub file_name: String,
    /// Name built from the untouched title
    pub display_name: String,
}

impl Artifact {
    /// `Content-Disposition` value with an ASCII fallback and the UTF-8 name
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            self.file_name,
            utf8_percent_encode(&self.display_name, ATTR_CHAR)
        )
    }
}

/// Export a document's summary in the requested format.
///
/// The format is checked before the document, so an unknown format is
/// rejected whatever state the document is in.
pub fn export(document: &Document, format: &str) -> Result<Artifact, ExportError> {
    let format: ExportFormat = format.parse()?;
    let summary = document
        .summary_text()
        .ok_or(ExportError::NotSummarized(document.id))?;

    let bytes = match format {
        ExportFormat::Txt => summary.as_bytes().to_vec(),
        ExportFormat::Docx => render_docx(&document.title, summary)?,
    };

    Ok(Artifact {
        format,
        bytes,
        content_type: format.content_type(),
        file_name: file_name(&document.title, format),
        display_name: format!("{}_summary.{}", document.title.trim(), format.extension()),
    })
}

/// `<title>_summary.<ext>`, reduced to characters safe in a header value
pub fn file_name(title: &str, format: ExportFormat) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { "document".to_string() } else { stem };
    format!("{}_summary.{}", stem, format.extension())
}

/// Build the DOCX package: title heading, then one paragraph per summary line
pub fn render_docx(title: &str, summary: &str) -> Result<Vec<u8>, ExportError> {
    let body = document_xml(title, summary)?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS_XML.as_bytes()),
        ("word/document.xml", &body),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.as_bytes()),
        ("word/styles.xml", STYLES_XML.as_bytes()),
    ];
    for (name, data) in parts {
        writer.start_file(name, options)?;
        writer.write_all(data)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn document_xml(title: &str, summary: &str) -> Result<Vec<u8>, ExportError> {
    let mut writer = Writer::new(Vec::new());

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut root = BytesStart::new("w:document");
    root.push_attribute(("xmlns:w", WORDML_NS));
    write(&mut writer, Event::Start(root))?;
    write(&mut writer, Event::Start(BytesStart::new("w:body")))?;

    write_paragraph(&mut writer, Some("Heading1"), title)?;
    for line in summary.lines() {
        write_paragraph(&mut writer, None, line)?;
    }

    write(&mut writer, Event::End(BytesEnd::new("w:body")))?;
    write(&mut writer, Event::End(BytesEnd::new("w:document")))?;
    Ok(writer.into_inner())
}

fn write_paragraph(
    writer: &mut Writer<Vec<u8>>,
    style: Option<&str>,
    text: &str,
) -> Result<(), ExportError> {
    write(writer, Event::Start(BytesStart::new("w:p")))?;

    if let Some(style) = style {
        write(writer, Event::Start(BytesStart::new("w:pPr")))?;
        let mut style_ref = BytesStart::new("w:pStyle");
        style_ref.push_attribute(("w:val", style));
        write(writer, Event::Empty(style_ref))?;
        write(writer, Event::End(BytesEnd::new("w:pPr")))?;
    }

    if !text.is_empty() {
        write(writer, Event::Start(BytesStart::new("w:r")))?;
        let mut run_text = BytesStart::new("w:t");
        run_text.push_attribute(("xml:space", "preserve"));
        write(writer, Event::Start(run_text))?;
        write(writer, Event::Text(BytesText::new(&xml_safe(text))))?;
        write(writer, Event::End(BytesEnd::new("w:t")))?;
        write(writer, Event::End(BytesEnd::new("w:r")))?;
    }

    write(writer, Event::End(BytesEnd::new("w:p")))
}

/// Replace characters XML 1.0 does not allow with a space
fn xml_safe(text: &str) -> Cow<'_, str> {
    fn forbidden(c: char) -> bool {
        matches!(
            c,
            '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}'
        )
    }

    if text.chars().any(forbidden) {
        Cow::Owned(text.chars().map(|c| if forbidden(c) { ' ' } else { c }).collect())
    } else {
        Cow::Borrowed(text)
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), ExportError> {
    writer
        .write_event(event)
        .map_err(|e| ExportError::Xml(e.to_string()))
}
