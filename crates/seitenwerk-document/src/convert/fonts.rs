// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font substitution between PDF font names, PDF built-in faces and
// word-processor font names.

use printpdf::BuiltinFont;

/// The three families every converter can reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFamily {
    #[default]
    Serif,
    Sans,
    Monospace,
}

impl FontFamily {
    /// Map a source font name to a family. Unknown names are treated as serif.
    pub fn from_name(font_name: &str) -> Self {
        let lower = font_name.to_ascii_lowercase();
        if lower.contains("times") || lower.contains("roman") {
            Self::Serif
        } else if ["arial", "helvetica", "sans"].iter().any(|n| lower.contains(n)) {
            Self::Sans
        } else if ["courier", "mono"].iter().any(|n| lower.contains(n)) {
            Self::Monospace
        } else {
            Self::Serif
        }
    }

    pub fn builtin(&self, bold: bool, italic: bool) -> BuiltinFont {
        match (self, bold, italic) {
            (Self::Serif, false, false) => BuiltinFont::TimesRoman,
            (Self::Serif, true, false) => BuiltinFont::TimesBold,
            (Self::Serif, false, true) => BuiltinFont::TimesItalic,
            (Self::Serif, true, true) => BuiltinFont::TimesBoldItalic,
            (Self::Sans, false, false) => BuiltinFont::Helvetica,
            (Self::Sans, true, false) => BuiltinFont::HelveticaBold,
            (Self::Sans, false, true) => BuiltinFont::HelveticaOblique,
            (Self::Sans, true, true) => BuiltinFont::HelveticaBoldOblique,
            (Self::Monospace, false, false) => BuiltinFont::Courier,
            (Self::Monospace, true, false) => BuiltinFont::CourierBold,
            (Self::Monospace, false, true) => BuiltinFont::CourierOblique,
            (Self::Monospace, true, true) => BuiltinFont::CourierBoldOblique,
        }
    }

    /// Font name written into word-processor and slide documents.
    pub fn word_name(&self) -> &'static str {
        match self {
            Self::Serif => "Times New Roman",
            Self::Sans => "Arial",
            Self::Monospace => "Courier New",
        }
    }

    /// Average glyph advance as a fraction of the font size, for wrapping.
    pub(crate) fn average_advance(&self) -> f32 {
        match self {
            Self::Serif => 0.47,
            Self::Sans => 0.5,
            Self::Monospace => 0.6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_table() {
        assert_eq!(FontFamily::from_name("TimesNewRomanPS-BoldMT"), FontFamily::Serif);
        assert_eq!(FontFamily::from_name("Arial-ItalicMT"), FontFamily::Sans);
        assert_eq!(FontFamily::from_name("Helvetica"), FontFamily::Sans);
        assert_eq!(FontFamily::from_name("DejaVuSans"), FontFamily::Sans);
        assert_eq!(FontFamily::from_name("CourierNewPSMT"), FontFamily::Monospace);
        assert_eq!(FontFamily::from_name("LiberationMono"), FontFamily::Monospace);
        assert_eq!(FontFamily::from_name("Garamond"), FontFamily::Serif);
        assert_eq!(FontFamily::from_name(""), FontFamily::Serif);
    }

    #[test]
    fn builtin_variants() {
        assert_eq!(FontFamily::Sans.builtin(true, true), BuiltinFont::HelveticaBoldOblique);
        assert_eq!(FontFamily::Serif.builtin(false, false), BuiltinFont::TimesRoman);
        assert_eq!(FontFamily::Monospace.word_name(), "Courier New");
    }
}
