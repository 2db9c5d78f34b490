//! Plain-text PDF output.
//!
//! Markdown emphasis is stripped and the text is flowed under a centered title
//! using the standard Helvetica fonts, so no font files are embedded.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};

pub const TITLE: &str = "Product Documentation";

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const TITLE_SIZE: f32 = 20.0;
const BODY_SIZE: f32 = 12.0;
const LINE_GAP: f32 = 5.0;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Removes `#`, `*`, `` ` `` and `_`, then collapses each blank-line pair into one newline.
pub fn plain_text(content: &str) -> String {
    content
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '`' | '_'))
        .collect::<String>()
        .replace("\n\n", "\n")
}

pub fn encode(content: &str) -> Result<Vec<u8>, lopdf::Error> {
    let layout = Layout::default();
    let pages = layout.paginate(&plain_text(content));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let title_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => body_font,
            "F2" => title_font,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for (idx, lines) in pages.iter().enumerate() {
        let content = layout.page_content(idx == 0, lines);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

struct Layout {
    line_height: f32,
    max_chars: usize,
}

impl Default for Layout {
    fn default() -> Self {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        Self {
            line_height: BODY_SIZE + LINE_GAP,
            max_chars: (usable / (BODY_SIZE * AVG_GLYPH_WIDTH)) as usize,
        }
    }
}

impl Layout {
    fn title_height(&self) -> f32 {
        TITLE_SIZE * 1.2 + BODY_SIZE * 1.2
    }

    fn lines_per_page(&self, first: bool) -> usize {
        let mut available = PAGE_HEIGHT - 2.0 * MARGIN;
        if first {
            available -= self.title_height();
        }
        ((available / self.line_height) as usize).max(1)
    }

    /// Wraps the text and splits it into pages. Always yields at least one page.
    fn paginate(&self, text: &str) -> Vec<Vec<String>> {
        let lines: Vec<String> = text.split('\n').flat_map(|l| self.wrap(l)).collect();

        let mut pages = Vec::new();
        let mut rest = lines.as_slice();
        loop {
            let take = self.lines_per_page(pages.is_empty()).min(rest.len());
            let (page, tail) = rest.split_at(take);
            pages.push(page.to_vec());
            rest = tail;
            if rest.is_empty() {
                return pages;
            }
        }
    }

    fn wrap(&self, line: &str) -> Vec<String> {
        let line = line.replace('\t', "    ").replace('\r', "");
        if line.chars().count() <= self.max_chars {
            return vec![line];
        }

        let mut out = Vec::new();
        let mut current = String::new();
        for word in line.split(' ') {
            let word_len = word.chars().count();
            let current_len = current.chars().count();
            if current_len > 0 && current_len + 1 + word_len > self.max_chars {
                out.push(std::mem::take(&mut current));
            }
            if word_len > self.max_chars {
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(self.max_chars) {
                    if !current.is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                    current = chunk.iter().collect();
                }
                continue;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        out.push(current);
        out
    }

    fn page_content(&self, first: bool, lines: &[String]) -> Content {
        let mut operations = Vec::new();
        let mut top = PAGE_HEIGHT - MARGIN;

        if first {
            let width = TITLE.chars().count() as f32 * TITLE_SIZE * AVG_GLYPH_WIDTH;
            let x = (PAGE_WIDTH - width) / 2.0;
            let baseline = top - TITLE_SIZE;
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F2".into(), TITLE_SIZE.into()]),
                Operation::new("Td", vec![x.into(), baseline.into()]),
                Operation::new("Tj", vec![pdf_string(TITLE)]),
                Operation::new("ET", vec![]),
            ]);
            top -= self.title_height();
        }

        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), BODY_SIZE.into()]),
            Operation::new("TL", vec![self.line_height.into()]),
            Operation::new("Td", vec![MARGIN.into(), (top - BODY_SIZE).into()]),
        ]);
        for line in lines {
            operations.push(Operation::new("Tj", vec![pdf_string(line)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        Content { operations }
    }
}

/// WinAnsi-compatible literal; characters outside Latin-1 become `?`.
fn pdf_string(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| match u32::from(c) {
            0x20..=0xFF => c as u8,
            _ => b'?',
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}
