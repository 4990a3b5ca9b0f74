//! Just enough ABI plumbing for the profile-registry `eth_call`:
//! selector + single-address calldata on the way out, a
//! `(string, string, string, bool)` tuple on the way back.

use sha3::{Digest, Keccak256};

use crate::error::{PersonaError, PersonaResult};

const WORD: usize = 32;

/// First four bytes of the Keccak-256 hash of the function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Hex calldata for a call taking a single `address` argument.
pub fn encode_address_call(signature: &str, address: &str) -> PersonaResult<String> {
    let bytes = hex::decode(address.trim_start_matches("0x"))
        .map_err(|_| PersonaError::InvalidAddress(address.to_string()))?;
    if bytes.len() != 20 {
        return Err(PersonaError::InvalidAddress(address.to_string()));
    }

    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&bytes);
    Ok(format!("0x{}", hex::encode(data)))
}

/// Decoded `getProfile(address)` return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryProfile {
    pub name: String,
    pub bio: String,
    pub image_uri: String,
    pub exists: bool,
}

/// Decodes `(string name, string bio, string imageUri, bool exists)` return
/// data. `None` for anything that does not match that layout.
pub fn decode_profile_return(raw: &str) -> Option<RegistryProfile> {
    let data = hex::decode(raw.trim_start_matches("0x")).ok()?;
    if data.len() < 4 * WORD {
        return None;
    }

    let name = read_string(&data, uint_word(&data, 0)?)?;
    let bio = read_string(&data, uint_word(&data, WORD)?)?;
    let image_uri = read_string(&data, uint_word(&data, 2 * WORD)?)?;
    let exists = data[3 * WORD + 31] != 0;

    Some(RegistryProfile {
        name,
        bio,
        image_uri,
        exists,
    })
}

/// Reads a uint word at `byte_offset`, rejecting values wider than u64.
fn uint_word(data: &[u8], byte_offset: usize) -> Option<usize> {
    let word = data.get(byte_offset..byte_offset + WORD)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Some(u64::from_be_bytes(buf) as usize)
}

/// Reads a dynamic string: length word at `offset`, utf-8 bytes after it.
fn read_string(data: &[u8], offset: usize) -> Option<String> {
    let len = uint_word(data, offset)?;
    let bytes = data.get(offset + WORD..offset + WORD + len)?;
    String::from_utf8(bytes.to_vec()).ok()
}
