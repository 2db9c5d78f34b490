//! Minimal WordprocessingML package: one section, one paragraph per input line.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Empty,
    Heading { level: u8, text: String },
    Bold(String),
    Plain(String),
}

/// Maps each line to exactly one paragraph, preserving order.
pub fn parse(content: &str) -> Vec<Block> {
    content.split('\n').map(parse_line).collect()
}

fn parse_line(line: &str) -> Block {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.trim().is_empty() {
        Block::Empty
    } else if let Some(text) = line.strip_prefix("# ") {
        Block::Heading {
            level: 1,
            text: text.to_string(),
        }
    } else if let Some(text) = line.strip_prefix("## ") {
        Block::Heading {
            level: 2,
            text: text.to_string(),
        }
    } else if let Some(text) = line.strip_prefix("### ") {
        Block::Heading {
            level: 3,
            text: text.to_string(),
        }
    } else if line.len() >= 4 && line.starts_with("**") && line.ends_with("**") {
        Block::Bold(line[2..line.len() - 2].to_string())
    } else {
        Block::Plain(line.to_string())
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="26"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:sz w:val="24"/></w:rPr></w:style></w:styles>"#;

pub fn encode(blocks: &[Block]) -> Result<Vec<u8>, zip::result::ZipError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        ("word/styles.xml", STYLES),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    zip.start_file("word/document.xml", options)?;
    zip.write_all(document_xml(blocks).as_bytes())?;

    Ok(zip.finish()?.into_inner())
}

fn document_xml(blocks: &[Block]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    );
    for block in blocks {
        match block {
            Block::Empty => xml.push_str("<w:p/>"),
            Block::Heading { level, text } => {
                xml.push_str(&format!(
                    r#"<w:p><w:pPr><w:pStyle w:val="Heading{level}"/></w:pPr>{}</w:p>"#,
                    run(text, false)
                ));
            }
            Block::Bold(text) => xml.push_str(&format!("<w:p>{}</w:p>", run(text, true))),
            Block::Plain(text) => xml.push_str(&format!("<w:p>{}</w:p>", run(text, false))),
        }
    }
    xml.push_str("<w:sectPr/></w:body></w:document>");
    xml
}

fn run(text: &str, bold: bool) -> String {
    // XML 1.0 forbids most control characters even when escaped.
    let text: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect();
    let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        r#"<w:r>{props}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        escape(text.as_str())
    )
}
