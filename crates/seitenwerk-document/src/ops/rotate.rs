// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rotate: set absolute page rotations.

use std::collections::BTreeMap;

use lopdf::{Object, ObjectId};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{NamedOutput, Rotation};
use tracing::{debug, info, instrument, warn};

use super::{require_pages, require_unlocked};
use crate::pdf::Document;
use crate::pdf::objects::{page_rotation, save};
use crate::strategy::StrategyChain;

pub const OUTPUT_NAME: &str = "rotated.pdf";

fn write_rotate(document: &mut lopdf::Document, page_id: ObjectId, rotation: Rotation) -> Result<()> {
    match document.get_object_mut(page_id) {
        Ok(Object::Dictionary(page)) => {
            page.set("Rotate", Object::Integer(i64::from(rotation.degrees())));
            Ok(())
        }
        _ => Err(SeitenwerkError::codec(format!("page {:?} is not a dictionary", page_id))),
    }
}

/// Rotate the pages named in `rotations` (1-based page to angle in degrees)
/// to the normalized angle. Pages not named keep their rotation.
#[instrument(skip(document), fields(pages = document.page_count()))]
pub fn rotate(document: &Document, rotations: &BTreeMap<u32, i64>) -> Result<NamedOutput> {
    require_unlocked(document, "rotate")?;
    require_pages(document, "rotate")?;

    let targets: Vec<(ObjectId, Rotation)> = rotations
        .iter()
        .filter_map(|(&number, &angle)| match document.page(number) {
            Some(page) => Some((page.handle.0, Rotation::normalize(angle))),
            None => {
                warn!(page = number, count = document.page_count(), "Skipping out-of-range page");
                None
            }
        })
        .collect();

    let source = document.inner();
    let bytes = StrategyChain::new("rotate")
        .strategy("set-rotation-flag", || set_flags(source, &targets))
        .strategy("quarter-turns", || quarter_turns(source, &targets))
        .run()?;
    info!(rotated = targets.len(), "Rotation complete");
    Ok(NamedOutput::pdf(OUTPUT_NAME, bytes))
}

fn set_flags(source: &lopdf::Document, targets: &[(ObjectId, Rotation)]) -> Result<Vec<u8>> {
    let mut working = source.clone();
    for &(page_id, target) in targets {
        write_rotate(&mut working, page_id, target)?;
    }
    save(&mut working)
}

/// Reach each target one clockwise quarter turn at a time from the page's
/// current, possibly inherited, rotation.
fn quarter_turns(source: &lopdf::Document, targets: &[(ObjectId, Rotation)]) -> Result<Vec<u8>> {
    let mut working = source.clone();
    for &(page_id, target) in targets {
        let mut current = page_rotation(&working, page_id);
        let mut steps = 0;
        while current != target {
            current = current.turned();
            write_rotate(&mut working, page_id, current)?;
            steps += 1;
        }
        debug!(page_id = ?page_id, steps, "Page turned");
    }
    save(&mut working)
}
