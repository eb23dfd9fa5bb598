// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flowing text layout into new PDFs using `printpdf` 0.8.
//
// Lines are collected as styled blocks, wrapped at an estimated glyph width
// and paginated top to bottom. printpdf builds each page from a `Vec<Op>`
// and serialises the whole document with `PdfDocument::save()`.

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use seitenwerk_core::error::Result;
use tracing::{debug, instrument};

use crate::convert::fonts::FontFamily;

const LETTER_MM: (f32, f32) = (215.9, 279.4);
const MARGIN_PT: f32 = 56.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// One logical line (paragraph) with its styling. Wrapped on output.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledLine {
    pub text: String,
    pub family: FontFamily,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub align: Align,
    /// Extra vertical space above the line, in points.
    pub space_before: f32,
}

impl StyledLine {
    pub fn new(text: impl Into<String>, family: FontFamily, size: f32) -> Self {
        Self {
            text: text.into(),
            family,
            size,
            bold: false,
            italic: false,
            align: Align::Left,
            space_before: 0.0,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    pub fn aligned(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn spaced(mut self, points: f32) -> Self {
        self.space_before = points;
        self
    }

    fn line_height(&self) -> f32 {
        self.size * 1.25
    }
}

#[derive(Debug, Clone)]
enum Block {
    Line(StyledLine),
    PageBreak,
}

/// Accumulates styled lines and lays them out on Letter-sized pages.
pub struct LayoutWriter {
    title: String,
    width: Mm,
    height: Mm,
    blocks: Vec<Block>,
}

impl LayoutWriter {
    pub fn portrait(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            width: Mm(LETTER_MM.0),
            height: Mm(LETTER_MM.1),
            blocks: Vec::new(),
        }
    }

    pub fn landscape(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            width: Mm(LETTER_MM.1),
            height: Mm(LETTER_MM.0),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, line: StyledLine) {
        self.blocks.push(Block::Line(line));
    }

    /// Start a new page unless the current one is still empty.
    pub fn page_break(&mut self) {
        if matches!(self.blocks.last(), Some(Block::Line(_))) {
            self.blocks.push(Block::PageBreak);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Lay out every block and serialise. An empty writer yields one blank page.
    #[instrument(skip(self), fields(title = %self.title, blocks = self.blocks.len()))]
    pub fn finish(self) -> Result<Vec<u8>> {
        let page_w = self.width.into_pt().0;
        let page_h = self.height.into_pt().0;
        let usable_w = page_w - 2.0 * MARGIN_PT;

        let mut pages: Vec<PdfPage> = Vec::new();
        let mut ops: Vec<Op> = Vec::new();
        let mut cursor = page_h - MARGIN_PT;
        let mut lines_on_page = 0usize;

        for block in self.blocks {
            let line = match block {
                Block::PageBreak => {
                    pages.push(PdfPage::new(self.width, self.height, std::mem::take(&mut ops)));
                    cursor = page_h - MARGIN_PT;
                    lines_on_page = 0;
                    continue;
                }
                Block::Line(line) => line,
            };

            let advance = line.size * line.family.average_advance();
            let max_chars = ((usable_w / advance) as usize).max(1);
            let font = line.family.builtin(line.bold, line.italic);
            if lines_on_page > 0 {
                cursor -= line.space_before;
            }

            for wrapped in wrap_text(&line.text, max_chars) {
                if cursor - line.line_height() < MARGIN_PT && lines_on_page > 0 {
                    pages.push(PdfPage::new(self.width, self.height, std::mem::take(&mut ops)));
                    cursor = page_h - MARGIN_PT;
                    lines_on_page = 0;
                }
                cursor -= line.line_height();
                lines_on_page += 1;
                if wrapped.is_empty() {
                    continue;
                }

                let text_w = wrapped.chars().count() as f32 * advance;
                let x = match line.align {
                    Align::Left => MARGIN_PT,
                    Align::Center => MARGIN_PT + ((usable_w - text_w) / 2.0).max(0.0),
                    Align::Right => (page_w - MARGIN_PT - text_w).max(MARGIN_PT),
                };
                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(x),
                        y: Pt(cursor),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(line.size),
                    font,
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(wrapped)],
                    font,
                });
                ops.push(Op::EndTextSection);
            }
        }
        if !ops.is_empty() || pages.is_empty() {
            pages.push(PdfPage::new(self.width, self.height, ops));
        }

        let mut document = PdfDocument::new(&self.title);
        document.with_pages(pages);
        debug!(pages = document.pages.len(), "Text layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        Ok(document.save(&PdfSaveOptions::default(), &mut warnings))
    }
}

/// Lay out plain text, one paragraph per source line, in a single style.
pub fn plain_text_pdf(title: &str, text: &str, family: FontFamily, size: f32) -> Result<Vec<u8>> {
    let mut writer = LayoutWriter::portrait(title);
    for line in text.lines() {
        writer.push(StyledLine::new(line, family, size));
    }
    writer.finish()
}

/// Greedy word wrap by character count. Words longer than a line are split;
/// an empty input line yields one empty output line.
pub(crate) fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(max_chars);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }
        if chars.is_empty() {
            continue;
        }
        let needed = if current_len == 0 { chars.len() } else { current_len + 1 + chars.len() };
        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += chars.len();
        current.extend(chars);
    }
    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}
