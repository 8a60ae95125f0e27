//! Inner payload model
//!
//! Every datagram except the bare discovery probe carries an encrypted
//! `pack` whose plaintext is one of these JSON shapes, discriminated by the
//! `t` field. Decoding is two-stage: [`crate::crypto::CipherContext::open`]
//! yields a raw JSON value (failures there are decode errors), and
//! [`Payload::from_value`] converts it into this union (failures there are
//! unexpected-payload errors: the bytes were readable, the content was
//! not valid for any known message).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The inner payload vocabulary, tagged by `t`.
///
/// Fields the appliance sends beyond the ones modelled here are ignored on
/// input; none of them participate in the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Payload {
    /// Discovery probe, sent bare (no envelope, no encryption)
    #[serde(rename = "scan")]
    Scan,

    /// Handshake reply: identity and firmware version
    #[serde(rename = "dev")]
    Dev {
        cid: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        ver: Option<String>,
    },

    /// Bind request, encrypted under the generic key
    #[serde(rename = "bind")]
    Bind { mac: String, uid: i64 },

    /// Bind acknowledgement carrying the session key
    #[serde(rename = "bindok")]
    BindOk { key: String },

    /// Status poll: which columns to report
    #[serde(rename = "status")]
    Status { cols: Vec<String>, mac: String },

    /// Status reply: parallel arrays of columns and values
    #[serde(rename = "dat")]
    Dat { cols: Vec<String>, dat: Vec<Value> },

    /// Command request: parallel arrays of columns and target values
    #[serde(rename = "cmd")]
    Cmd { opt: Vec<String>, p: Vec<Value> },

    /// Command reply: echoed columns with resulting values in `val`, `p`,
    /// or both
    #[serde(rename = "res")]
    Res {
        opt: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        val: Option<Vec<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        p: Option<Vec<Value>>,
    },
}

impl Payload {
    /// Convert an opened pack into the payload union.
    ///
    /// An unknown or ill-shaped `t` is an [`Error::UnexpectedPayload`],
    /// distinct from the decode errors of the crypto layer, because the
    /// datagram itself was readable.
    pub fn from_value(value: Value) -> Result<Self> {
        let tag = value
            .get("t")
            .and_then(Value::as_str)
            .unwrap_or("<untagged>")
            .to_owned();
        serde_json::from_value(value).map_err(|_| Error::UnexpectedPayload(tag))
    }

    /// The wire tag of this payload
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Dev { .. } => "dev",
            Self::Bind { .. } => "bind",
            Self::BindOk { .. } => "bindok",
            Self::Status { .. } => "status",
            Self::Dat { .. } => "dat",
            Self::Cmd { .. } => "cmd",
            Self::Res { .. } => "res",
        }
    }

    /// Serialize to raw datagram bytes (used for the bare `scan` probe;
    /// everything else goes through an envelope)
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Pair a `res` reply's columns with their values, preferring `val` over
/// `p` position by position. Columns with no value in either array are
/// skipped.
pub fn res_values<'a>(
    opt: &'a [String],
    val: Option<&'a [Value]>,
    p: Option<&'a [Value]>,
) -> impl Iterator<Item = (&'a str, &'a Value)> {
    opt.iter().enumerate().filter_map(move |(j, code)| {
        val.and_then(|v| v.get(j))
            .or_else(|| p.and_then(|v| v.get(j)))
            .map(|v| (code.as_str(), v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_scan_probe_shape() {
        let bytes = Payload::Scan.encode().unwrap();
        assert_eq!(bytes, br#"{"t":"scan"}"#);
    }

    #[test]
    fn test_dev_parses_with_extra_fields() {
        let value = json!({
            "t": "dev",
            "cid": "f4911e7aca59",
            "name": "living room",
            "ver": "V1.1.13",
            "brand": "gree",
            "catalog": "gree",
        });
        let payload = Payload::from_value(value).unwrap();
        assert_eq!(
            payload,
            Payload::Dev {
                cid: "f4911e7aca59".into(),
                name: Some("living room".into()),
                ver: Some("V1.1.13".into()),
            }
        );
    }

    #[test]
    fn test_dev_version_may_be_absent() {
        let payload = Payload::from_value(json!({"t": "dev", "cid": "abc"})).unwrap();
        assert_eq!(
            payload,
            Payload::Dev {
                cid: "abc".into(),
                name: None,
                ver: None,
            }
        );
    }

    #[test]
    fn test_unknown_tag_is_unexpected() {
        let err = Payload::from_value(json!({"t": "hb"})).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPayload(tag) if tag == "hb"));
    }

    #[test]
    fn test_untagged_object_is_unexpected() {
        let err = Payload::from_value(json!({"cols": []})).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPayload(tag) if tag == "<untagged>"));
    }

    #[test]
    fn test_missing_required_field_is_unexpected() {
        // `dat` without its value array is readable but not a valid message
        let err = Payload::from_value(json!({"t": "dat", "cols": ["Pow"]})).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPayload(tag) if tag == "dat"));
    }

    #[test]
    fn test_res_prefers_val_over_p() {
        let opt = vec!["Pow".to_string(), "Mod".to_string()];
        let val = vec![json!(0), json!(1)];
        let p = vec![json!(9), json!(9)];

        let pairs: Vec<_> = res_values(&opt, Some(&val), Some(&p)).collect();
        assert_eq!(pairs, vec![("Pow", &json!(0)), ("Mod", &json!(1))]);
    }

    #[test]
    fn test_res_falls_back_to_p() {
        let opt = vec!["Pow".to_string()];
        let p = vec![json!(0)];

        let pairs: Vec<_> = res_values(&opt, None, Some(&p)).collect();
        assert_eq!(pairs, vec![("Pow", &json!(0))]);
    }

    #[test]
    fn test_res_skips_columns_without_values() {
        let opt = vec!["Pow".to_string(), "Mod".to_string()];
        let val = vec![json!(1)];

        let pairs: Vec<_> = res_values(&opt, Some(&val), None).collect();
        assert_eq!(pairs, vec![("Pow", &json!(1))]);
    }

    #[test]
    fn test_cmd_serializes_parallel_arrays() {
        let cmd = Payload::Cmd {
            opt: vec!["Pow".into(), "SetTem".into()],
            p: vec![json!(1), json!(24)],
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            value,
            json!({"t": "cmd", "opt": ["Pow", "SetTem"], "p": [1, 24]})
        );
    }

    #[test]
    fn test_res_omits_absent_arrays() {
        let res = Payload::Res {
            opt: vec!["Pow".into()],
            val: Some(vec![json!(1)]),
            p: None,
        };
        let text = serde_json::to_string(&res).unwrap();
        assert!(!text.contains("\"p\""));
    }
}
