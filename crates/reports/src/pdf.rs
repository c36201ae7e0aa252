//! Minimal PDF 1.4 writer.
//!
//! Supports exactly what the reports need: A4 pages, Helvetica (regular and
//! bold) in WinAnsi encoding, left-aligned text lines with automatic wrapping
//! and page breaks, and a page footer.

use std::fmt::Write as _;

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const FONT_SIZE: u32 = 10;
const HEADING_SIZE: u32 = 13;
const LEADING: u32 = 14;
/// Characters per line for 10pt Helvetica inside the margins.
const WRAP_AT: usize = 95;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Text(String),
    Heading(String),
    Blank,
}

#[derive(Debug, Clone)]
pub struct PdfDocument {
    title: String,
    lines: Vec<Line>,
}

impl PdfDocument {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            lines: vec![Line::Heading(title.clone()), Line::Blank],
            title,
        }
    }

    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(Line::Heading(text.into()));
        self
    }

    /// Add a text line, wrapped on whitespace when too long.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for wrapped in wrap(text.as_ref(), WRAP_AT) {
            self.lines.push(Line::Text(wrapped));
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(Line::Blank);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn lines_per_page() -> usize {
        // Reserve one line for the footer.
        ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize - 1
    }

    fn pages(&self) -> Vec<&[Line]> {
        if self.lines.is_empty() {
            return vec![&[]];
        }
        self.lines.chunks(Self::lines_per_page()).collect()
    }

    /// Serialize the document.
    pub fn render(&self) -> Vec<u8> {
        let pages = self.pages();
        let page_count = pages.len();

        // 1 catalog, 2 pages tree, 3 regular font, 4 bold font, 5 info,
        // then a (page, content) pair per page.
        let first_page_obj = 6;
        let kids = (0..page_count)
            .map(|i| format!("{} 0 R", first_page_obj + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");

        let mut objects: Vec<Vec<u8>> = vec![
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>").into_bytes(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_vec(),
            {
                let mut info = b"<< /Title (".to_vec();
                info.extend(encode_text(&self.title));
                info.extend_from_slice(b") /Producer (regdesk) >>");
                info
            },
        ];

        for (index, lines) in pages.iter().enumerate() {
            let content_obj = first_page_obj + 2 * index + 1;
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_obj} 0 R >>"
                )
                .into_bytes(),
            );

            let stream = page_stream(lines, index + 1, page_count);
            let mut content = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            content.extend(stream);
            content.extend_from_slice(b"\nendstream");
            objects.push(content);
        }

        let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj\n", index + 1).into_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_at = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in &offsets {
            let _ = writeln!(xref, "{offset:010} 00000 n ");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        );
        out.extend(xref.into_bytes());
        out
    }
}

fn page_stream(lines: &[Line], page: usize, total: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        match line {
            Line::Blank => {}
            Line::Text(text) => push_text(&mut stream, "F1", FONT_SIZE, y, text),
            Line::Heading(text) => push_text(&mut stream, "F2", HEADING_SIZE, y, text),
        }
        y -= LEADING;
    }
    push_text(&mut stream, "F1", 8, MARGIN / 2, &format!("Página {page} de {total}"));
    stream
}

fn push_text(stream: &mut Vec<u8>, font: &str, size: u32, y: u32, text: &str) {
    stream.extend(format!("BT /{font} {size} Tf {MARGIN} {y} Td (").into_bytes());
    stream.extend(encode_text(text));
    stream.extend_from_slice(b") Tj ET\n");
}

/// Encode a string as the body of a PDF literal string in WinAnsi.
///
/// Latin-1 characters map to their byte value, anything outside it becomes
/// `?`, and the string delimiters are escaped.
pub(crate) fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            '\t' | '\n' | '\r' => out.push(b' '),
            c if (c as u32) < 0x20 => out.push(b'?'),
            c if (c as u32) < 0x7F || ((c as u32) >= 0xA0 && (c as u32) <= 0xFF) => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    if text.chars().count() <= width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        // Hard-split words longer than a full line.
        while word.chars().count() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            lines.push(head);
        }
        let needed = usize::from(!current.is_empty()) + word.chars().count();
        if current.chars().count() + needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
