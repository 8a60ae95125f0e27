//! Payload encryption for the appliance control channel
//!
//! Two envelope schemes exist in the field. Firmware before V2 encrypts
//! every pack with AES-128-ECB (no IV, no integrity). V2 and later use
//! AES-128-GCM with a nonce and additional-authenticated-data string that
//! are compiled into the firmware. They are not secret, but must match
//! byte-for-byte or decryption fails. The scheme is negotiated once per
//! session from the firmware version in the handshake reply; see
//! [`Scheme::for_firmware`].
//!
//! Before binding, both schemes run under the well-known [`GENERIC_KEY`].
//! After a successful bind the appliance-issued session key replaces it for
//! the rest of the session.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use aes_gcm::aead::{Aead, Payload as AeadPayload};
use aes_gcm::{Aes128Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use tracing::trace;

use crate::constants::KEY_LEN;
use crate::error::{Error, Result};
use crate::payload::Payload;

/// Well-known key both schemes use until the appliance issues a session key
pub const GENERIC_KEY: &[u8; KEY_LEN] = b"a3K8Bx%2r8Y7#xDh";

/// Fixed 96-bit GCM nonce shared with V2 firmware
pub const GCM_NONCE: [u8; 12] = [
    0x54, 0x40, 0x78, 0x44, 0x49, 0x67, 0x5a, 0x51, 0x6c, 0x5e, 0x63, 0x13,
];

/// Fixed GCM additional-authenticated-data string shared with V2 firmware
pub const GCM_AAD: &[u8] = b"qualcomm-test";

/// AES block size in bytes
const BLOCK: usize = 16;

/// GCM authentication tag size in bytes
const TAG_LEN: usize = 16;

/// Encryption scheme negotiated for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// AES-128-ECB with PKCS#7 padding, unauthenticated (pre-V2 firmware)
    Ecb,
    /// AES-128-GCM with fixed nonce/AAD and a detached tag (V2+ firmware)
    Gcm,
}

impl Scheme {
    /// Select the scheme from the firmware version string of a handshake
    /// reply. Only versions beginning with `"V2."` speak GCM; anything
    /// else, including a missing version, stays on ECB.
    pub fn for_firmware(ver: Option<&str>) -> Self {
        match ver {
            Some(v) if v.starts_with("V2.") => Self::Gcm,
            _ => Self::Ecb,
        }
    }

    /// Whether envelopes of this scheme carry an authentication tag
    pub fn carries_tag(self) -> bool {
        matches!(self, Self::Gcm)
    }
}

/// Ciphertext ready for the wire: base64 pack plus, under GCM, a base64 tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPack {
    pub pack: String,
    pub tag: Option<String>,
}

/// Per-session encryption context: the negotiated scheme and whichever key
/// is current (generic before binding, session key after).
///
/// The context is computed once per negotiation step and passed explicitly
/// into every seal/open call, so key selection is never re-derived ad hoc.
///
/// # Examples
///
/// ```
/// use greelink_core::crypto::{CipherContext, Scheme};
/// use greelink_core::payload::Payload;
///
/// let ctx = CipherContext::handshake(Scheme::Ecb);
/// let sealed = ctx.seal(&Payload::Scan).unwrap();
/// assert!(sealed.tag.is_none());
///
/// let opened = ctx.open(&sealed.pack, None).unwrap();
/// assert_eq!(opened["t"], "scan");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherContext {
    scheme: Scheme,
    key: [u8; KEY_LEN],
}

impl CipherContext {
    /// Context for pre-bind traffic: the given scheme under the generic key
    pub fn handshake(scheme: Scheme) -> Self {
        Self {
            scheme,
            key: *GENERIC_KEY,
        }
    }

    /// Context for post-bind traffic under the appliance-issued session key
    pub fn bound(scheme: Scheme, key: [u8; KEY_LEN]) -> Self {
        Self { scheme, key }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Serialize and encrypt an inner payload for the wire
    pub fn seal(&self, payload: &Payload) -> Result<SealedPack> {
        let plain = serde_json::to_vec(payload)?;
        trace!(scheme = ?self.scheme, len = plain.len(), "sealing pack");

        match self.scheme {
            Scheme::Ecb => Ok(SealedPack {
                pack: BASE64.encode(ecb_encrypt(&self.key, &plain)),
                tag: None,
            }),
            Scheme::Gcm => {
                let (data, tag) = gcm_encrypt(&self.key, &plain)?;
                Ok(SealedPack {
                    pack: BASE64.encode(data),
                    tag: Some(BASE64.encode(tag)),
                })
            }
        }
    }

    /// Decrypt a wire pack back into a JSON value.
    ///
    /// Under GCM the tag is verified before the plaintext is parsed; a
    /// missing or mismatched tag rejects the pack.
    pub fn open(&self, pack: &str, tag: Option<&str>) -> Result<Value> {
        let data = BASE64.decode(pack)?;

        let plain = match self.scheme {
            Scheme::Ecb => ecb_decrypt(&self.key, &data)?,
            Scheme::Gcm => {
                let tag = BASE64.decode(tag.ok_or(Error::MissingTag)?)?;
                gcm_decrypt(&self.key, &data, &tag)?
            }
        };

        trace!(scheme = ?self.scheme, len = plain.len(), "opened pack");
        Ok(serde_json::from_slice(&plain)?)
    }
}

/// AES-128-ECB with PKCS#7 padding
fn ecb_encrypt(key: &[u8; KEY_LEN], plain: &[u8]) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key));

    let pad = BLOCK - plain.len() % BLOCK;
    let mut buf = Vec::with_capacity(plain.len() + pad);
    buf.extend_from_slice(plain);
    buf.resize(plain.len() + pad, pad as u8);

    for chunk in buf.chunks_exact_mut(BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    buf
}

fn ecb_decrypt(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() % BLOCK != 0 {
        return Err(Error::Cipher);
    }

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut buf = data.to_vec();
    for chunk in buf.chunks_exact_mut(BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }

    // PKCS#7: every pad byte must equal the pad length
    let pad = buf[buf.len() - 1] as usize;
    if pad == 0 || pad > BLOCK || pad > buf.len() {
        return Err(Error::Cipher);
    }
    if !buf[buf.len() - pad..].iter().all(|&b| b as usize == pad) {
        return Err(Error::Cipher);
    }

    buf.truncate(buf.len() - pad);
    Ok(buf)
}

/// AES-128-GCM under the fixed nonce/AAD, tag returned separately
fn gcm_encrypt(key: &[u8; KEY_LEN], plain: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cipher = Aes128Gcm::new(GenericArray::from_slice(key));
    let mut sealed = cipher
        .encrypt(
            Nonce::from_slice(&GCM_NONCE),
            AeadPayload {
                msg: plain,
                aad: GCM_AAD,
            },
        )
        .map_err(|_| Error::Cipher)?;

    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    Ok((sealed, tag))
}

fn gcm_decrypt(key: &[u8; KEY_LEN], data: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
    if tag.len() != TAG_LEN {
        return Err(Error::Cipher);
    }

    let cipher = Aes128Gcm::new(GenericArray::from_slice(key));
    let mut joined = Vec::with_capacity(data.len() + TAG_LEN);
    joined.extend_from_slice(data);
    joined.extend_from_slice(tag);

    cipher
        .decrypt(
            Nonce::from_slice(&GCM_NONCE),
            AeadPayload {
                msg: joined.as_slice(),
                aad: GCM_AAD,
            },
        )
        .map_err(|_| Error::Cipher)
}
