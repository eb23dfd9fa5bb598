// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Password protection through the PDF standard security handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use lopdf::encryption::crypt_filters::{Aes256CryptFilter, CryptFilter};
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Object, StringFormat};
use ring::rand::{SecureRandom, SystemRandom};
use seitenwerk_core::NamedOutput;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, info, instrument};

use super::require_unlocked;
use crate::pdf::Document;
use crate::pdf::model::encryption_algorithm;
use crate::pdf::objects::{copy_pages, load, load_decrypted, save};
use crate::strategy::StrategyChain;

pub const ENCRYPTED_OUTPUT_NAME: &str = "encrypted.pdf";
pub const DECRYPTED_OUTPUT_NAME: &str = "decrypted.pdf";

/// Name of the crypt filter registered for AES-256.
const STD_CF: &[u8] = b"StdCF";

fn random_bytes<const N: usize>(rng: &SystemRandom) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    rng.fill(&mut bytes)
        .map_err(|_| SeitenwerkError::codec("system random source unavailable"))?;
    Ok(bytes)
}

fn granted() -> Permissions {
    Permissions::PRINTABLE
        | Permissions::COPYABLE
        | Permissions::ANNOTABLE
        | Permissions::FILLABLE
        | Permissions::COPYABLE_FOR_ACCESSIBILITY
}

/// The standard handler derives keys from the first `/ID` string.
fn ensure_id(document: &mut lopdf::Document, rng: &SystemRandom) -> Result<()> {
    if document.trailer.has(b"ID") {
        return Ok(());
    }
    let first = hex::encode(random_bytes::<16>(rng)?);
    let second = hex::encode(random_bytes::<16>(rng)?);
    document.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(first.into_bytes(), StringFormat::Literal),
            Object::String(second.into_bytes(), StringFormat::Literal),
        ]),
    );
    Ok(())
}

fn encrypt_with(source: &lopdf::Document, build: impl FnOnce(&lopdf::Document) -> Result<EncryptionState>) -> Result<Vec<u8>> {
    let mut working = source.clone();
    let state = build(&working)?;
    working
        .encrypt(&state)
        .map_err(|err| SeitenwerkError::codec(format!("failed to encrypt document: {err}")))?;
    save(&mut working)
}

/// Protect `document` with a user (open) password and an owner password.
///
/// The owner password defaults to the user password; both default to empty.
/// AES-256 is tried first, RC4 128-bit second.
#[instrument(skip_all, fields(pages = document.page_count(), has_user = user_password.is_some(), has_owner = owner_password.is_some()))]
pub fn encrypt(document: &Document, user_password: Option<&str>, owner_password: Option<&str>) -> Result<NamedOutput> {
    require_unlocked(document, "encrypt")?;
    let user = user_password.unwrap_or_default();
    let owner = owner_password.unwrap_or(user);

    let rng = SystemRandom::new();
    let mut source = document.inner().clone();
    ensure_id(&mut source, &rng)?;

    let bytes = StrategyChain::new("encrypt")
        .strategy("aes-256", || {
            let file_key = random_bytes::<32>(&rng)?;
            encrypt_with(&source, |_| {
                let filter: Arc<dyn CryptFilter> = Arc::new(Aes256CryptFilter);
                let version = EncryptionVersion::V5 {
                    encrypt_metadata: true,
                    crypt_filters: BTreeMap::from([(STD_CF.to_vec(), filter)]),
                    file_encryption_key: &file_key,
                    stream_filter: STD_CF.to_vec(),
                    string_filter: STD_CF.to_vec(),
                    owner_password: owner,
                    user_password: user,
                    permissions: granted(),
                };
                EncryptionState::try_from(version)
                    .map_err(|err| SeitenwerkError::codec(format!("AES-256 key setup failed: {err}")))
            })
        })
        .strategy("rc4-128", || {
            encrypt_with(&source, |working| {
                let version = EncryptionVersion::V2 {
                    document: working,
                    owner_password: owner,
                    user_password: user,
                    key_length: 128,
                    permissions: granted(),
                };
                EncryptionState::try_from(version)
                    .map_err(|err| SeitenwerkError::codec(format!("RC4 key setup failed: {err}")))
            })
        })
        .run()?;
    info!(output_bytes = bytes.len(), "Document encrypted");
    Ok(NamedOutput::pdf(ENCRYPTED_OUTPUT_NAME, bytes))
}

/// Remove password protection from `bytes` using `password`.
///
/// Unencrypted input is re-serialized unchanged in content.
#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub fn decrypt(bytes: &[u8], password: &str) -> Result<NamedOutput> {
    let source = load(bytes).map_err(|err| match err {
        SeitenwerkError::CodecFailure(message) => SeitenwerkError::invalid(message),
        other => other,
    })?;

    let Some(algorithm) = encryption_algorithm(&source) else {
        debug!("Document is not encrypted; re-saving");
        let mut copy = source;
        let output = save(&mut copy)?;
        return Ok(NamedOutput::pdf(DECRYPTED_OUTPUT_NAME, output));
    };
    debug!(?algorithm, "Authenticating");

    let output = StrategyChain::new("decrypt")
        .strategy("decrypt-and-rebuild", || {
            let decrypted = load_decrypted(bytes, password)?;
            let page_ids: Vec<_> = decrypted.get_pages().into_values().collect();
            if page_ids.is_empty() {
                return Err(SeitenwerkError::codec("decrypted document has no pages"));
            }
            let mut rebuilt = copy_pages(&decrypted, &page_ids)?;
            save(&mut rebuilt)
        })
        .strategy("decrypt-and-resave", || {
            let mut decrypted = load_decrypted(bytes, password)?;
            save(&mut decrypted)
        })
        .run()?;
    info!(output_bytes = output.len(), "Document decrypted");
    Ok(NamedOutput::pdf(DECRYPTED_OUTPUT_NAME, output))
}
