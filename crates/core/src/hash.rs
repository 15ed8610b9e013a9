use ark_bn254::Fr as F;
use light_poseidon::{Poseidon, PoseidonBytesHasher};

use crate::error::{LedgerError, Result};
use crate::types::Digest;

/// Bytes absorbed per block; keeps every block below the field modulus.
const BLOCK_PAYLOAD: usize = 31;

/// Computes Poseidon hash over raw 32-byte big-endian blobs and returns a 32-byte BE digest
pub fn hash_bytes_be(inputs: &[&[u8; 32]]) -> Result<Digest> {
    let slices: Vec<&[u8]> = inputs.iter().map(|arr| &arr[..]).collect();
    let mut poseidon = Poseidon::<F>::new_circom(slices.len())
        .map_err(|e| LedgerError::Digest(e.to_string()))?;
    poseidon
        .hash_bytes_be(&slices)
        .map_err(|e| LedgerError::Digest(e.to_string()))
}

/// Left-pads up to 31 bytes into a block that is always a valid field element.
pub(crate) fn block(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let len = bytes.len().min(BLOCK_PAYLOAD);
    out[32 - len..].copy_from_slice(&bytes[..len]);
    out
}

/// Sponge-style digest of arbitrary bytes: every 31-byte block is chained
/// into the running state, then the total length is absorbed.
pub fn digest(data: &[u8]) -> Result<Digest> {
    let mut state = [0u8; 32];
    for chunk in data.chunks(BLOCK_PAYLOAD) {
        state = hash_bytes_be(&[&state, &block(chunk)])?;
    }
    let len = block(&(data.len() as u64).to_be_bytes());
    hash_bytes_be(&[&state, &len])
}
