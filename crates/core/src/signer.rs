//! Credentials, the signing oracle and key provisioning.
//!
//! Signatures here are opaque: the ledger only ever consumes the public
//! identity a signature resolves to, never the secret seed.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::hash::{block, hash_bytes_be};
use crate::types::{Digest, PublicKey};

const PUBLIC_KEY_DOMAIN: &[u8] = b"tally/public-key";
const SIGNATURE_DOMAIN: &[u8] = b"tally/signature";

/// Private signing material of one key.
#[derive(Clone)]
pub struct Credential {
    seed: [u8; 32],
    public_key: PublicKey,
}

impl Credential {
    /// The leading byte of the seed is cleared so it is always a valid
    /// field element.
    pub fn from_seed(mut seed: [u8; 32]) -> Result<Self> {
        seed[0] = 0;
        let public_key = hash_bytes_be(&[&block(PUBLIC_KEY_DOMAIN), &seed])?;
        Ok(Self { seed, public_key })
    }

    pub fn generate<R: Rng>(rng: &mut R) -> Result<Self> {
        let mut seed = [0u8; 32];
        rng.fill(&mut seed[..]);
        Self::from_seed(seed)
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub signer: PublicKey,
    pub proof: [u8; 32],
}

/// Turns a credential and a transaction digest into a signer identity.
pub trait SigningOracle: Send + Sync {
    fn sign(&self, credential: &Credential, digest: &Digest) -> Result<Signature>;
}

/// Oracle whose proof is a Poseidon hash of seed and digest.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoseidonOracle;

impl SigningOracle for PoseidonOracle {
    fn sign(&self, credential: &Credential, digest: &Digest) -> Result<Signature> {
        let proof = hash_bytes_be(&[&block(SIGNATURE_DOMAIN), &credential.seed, digest])?;
        Ok(Signature {
            signer: credential.public_key,
            proof,
        })
    }
}

/// Source of fresh credentials for new accounts and key members.
pub struct KeyProvisioner {
    rng: StdRng,
}

impl KeyProvisioner {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible provisioning for tests and scripted scenarios.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_credential(&mut self) -> Result<Credential> {
        Credential::generate(&mut self.rng)
    }
}

impl Default for KeyProvisioner {
    fn default() -> Self {
        Self::new()
    }
}
