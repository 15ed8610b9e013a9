//! Key policies and the authorization check run before every mutation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::types::{EntityRef, PublicKey};

/// Public identities that signed a transaction or command.
pub type SignerSet = BTreeSet<PublicKey>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Single(PublicKey),
    /// Satisfied by any `threshold` distinct members.
    Threshold {
        threshold: u32,
        members: Vec<PublicKey>,
    },
}

impl Key {
    /// Builds a threshold key. Duplicate members are collapsed, keeping first
    /// occurrence order; `threshold` must lie in `1..=members`.
    pub fn threshold(threshold: u32, members: impl IntoIterator<Item = PublicKey>) -> Result<Self> {
        let mut seen = SignerSet::new();
        let members: Vec<PublicKey> = members.into_iter().filter(|m| seen.insert(*m)).collect();
        check_threshold(threshold, members.len())?;
        Ok(Key::Threshold { threshold, members })
    }

    /// Rejects threshold keys that no signer set could ever satisfy.
    pub fn validate(&self) -> Result<()> {
        match self {
            Key::Single(_) => Ok(()),
            Key::Threshold { threshold, members } => {
                let distinct: SignerSet = members.iter().copied().collect();
                check_threshold(*threshold, distinct.len())
            }
        }
    }

    pub fn is_satisfied_by(&self, signers: &SignerSet) -> bool {
        match self {
            Key::Single(pk) => signers.contains(pk),
            Key::Threshold { threshold, members } => {
                let distinct: SignerSet = members.iter().copied().collect();
                let signed = distinct.iter().filter(|m| signers.contains(*m)).count();
                *threshold >= 1 && signed >= *threshold as usize
            }
        }
    }
}

fn check_threshold(threshold: u32, distinct_members: usize) -> Result<()> {
    if distinct_members == 0 {
        return Err(LedgerError::InvalidKey("threshold key has no members".into()));
    }
    if threshold == 0 || threshold as usize > distinct_members {
        return Err(LedgerError::InvalidKey(format!(
            "threshold {threshold} outside 1..={distinct_members}"
        )));
    }
    Ok(())
}

/// Validates an optional key slot.
pub fn validate_optional(key: Option<&Key>) -> Result<()> {
    key.map_or(Ok(()), Key::validate)
}

impl From<PublicKey> for Key {
    fn from(pk: PublicKey) -> Self {
        Key::Single(pk)
    }
}

/// An absent key means the operation is public.
pub fn is_authorized(required: Option<&Key>, signers: &SignerSet) -> bool {
    required.map_or(true, |key| key.is_satisfied_by(signers))
}

/// Fails closed with `Unauthorized` naming `entity`.
pub fn authorize(required: Option<&Key>, signers: &SignerSet, entity: EntityRef) -> Result<()> {
    if is_authorized(required, signers) {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized(entity))
    }
}

/// Like [`authorize`] but an absent key rejects instead of allowing.
pub fn authorize_required(required: Option<&Key>, signers: &SignerSet, entity: EntityRef) -> Result<()> {
    match required {
        Some(key) if key.is_satisfied_by(signers) => Ok(()),
        _ => Err(LedgerError::Unauthorized(entity)),
    }
}
