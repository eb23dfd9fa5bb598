// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: the parsed document model, text and image extraction over
// lopdf, and the printpdf layout writer used by the converters.

pub mod content;
pub(crate) mod images;
pub mod model;
pub(crate) mod objects;
pub mod writer;

pub use content::{TextLine, TextSpan};
pub use model::{Document, EncryptionAlgorithm, EncryptionState, OutlineEntry, Page, PageHandle};
pub use writer::{Align, LayoutWriter, StyledLine};
