//! Periodic load-update feed
//!
//! Loads arrive either as JSON or as a packed binary array keyed by the
//! logicals status id. The binary layout is an external contract
//! observed from real payloads: per record, a little-endian u16 id
//! length, the id bytes, a u8 load percentage, a little-endian f32
//! score and a u8 online flag.

use crate::server::int_bool;
use bytes::Buf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One server's refreshed load/score/online fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadUpdate {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Load")]
    pub load: u8,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "Status", with = "int_bool")]
    pub online: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoadsError {
    /// The feed was produced for a different server-list generation;
    /// callers should escalate to a full list fetch.
    #[error("stale loads status id {got}, directory has {current:?}")]
    StaleStatus {
        current: Option<String>,
        got: String,
    },

    #[error("malformed binary loads payload: {0}")]
    Malformed(String),
}

/// Decode the packed binary feed; truncated or malformed input is
/// rejected wholesale without partial application.
pub fn parse_binary_loads(payload: &[u8]) -> Result<Vec<LoadUpdate>, LoadsError> {
    let mut buf = payload;
    let mut updates = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < 2 {
            return Err(LoadsError::Malformed("truncated id length".to_string()));
        }
        let id_len = buf.get_u16_le() as usize;
        if buf.remaining() < id_len + 1 + 4 + 1 {
            return Err(LoadsError::Malformed("truncated record".to_string()));
        }
        let mut id_bytes = vec![0u8; id_len];
        buf.copy_to_slice(&mut id_bytes);
        let id = String::from_utf8(id_bytes)
            .map_err(|_| LoadsError::Malformed("id is not valid utf-8".to_string()))?;
        let load = buf.get_u8();
        let score = f64::from(buf.get_f32_le());
        let online = buf.get_u8() != 0;
        updates.push(LoadUpdate {
            id,
            load,
            score,
            online,
        });
    }
    Ok(updates)
}
