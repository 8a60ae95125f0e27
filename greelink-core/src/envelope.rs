//! Wire envelope model
//!
//! Every message except the bare `scan` probe travels inside this outer
//! JSON frame. The `pack` field is the encrypted inner payload; `tag` is
//! present only under the authenticated scheme. The `i` counter looks
//! monotonic on the wire but the appliance never checks it and neither do
//! we: replies are matched by payload type and session phase only, which
//! is a known weakness of the protocol, not of this implementation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{CipherContext, SealedPack};
use crate::error::Result;
use crate::payload::Payload;

/// Client identifier every outbound envelope carries
pub const CLIENT_ID: &str = "app";

/// Envelope type tag; the only kind this protocol has
pub const PACK_TYPE: &str = "pack";

/// The outer request/response frame
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub cid: String,
    pub i: u32,
    pub t: String,
    pub uid: i64,
    pub pack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Envelope {
    /// Encrypt a payload and wrap it for the wire
    pub fn seal(cipher: &CipherContext, i: u32, payload: &Payload) -> Result<Self> {
        let SealedPack { pack, tag } = cipher.seal(payload)?;
        Ok(Self {
            cid: CLIENT_ID.to_owned(),
            i,
            t: PACK_TYPE.to_owned(),
            uid: 0,
            pack,
            tag,
        })
    }

    /// Decrypt this envelope's pack into a JSON value
    pub fn open(&self, cipher: &CipherContext) -> Result<Value> {
        cipher.open(&self.pack, self.tag.as_deref())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("cid", &self.cid)
            .field("i", &self.i)
            .field("uid", &self.uid)
            .field("pack_len", &self.pack.len())
            .field("tagged", &self.tag.is_some())
            .finish()
    }
}
