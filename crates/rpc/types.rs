//! Node-facing wire types: transaction/call payloads, blocks, and the
//! instruction-trace format returned by `debug_traceTransaction`.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transaction or call object as it appears in
/// `eth_sendTransaction`/`eth_call`/`eth_estimateGas` params; the two share
/// one shape on this wire.
///
/// All fields are optional on the wire; absent fields are omitted when
/// re-serializing so a synthesized payload looks like any other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(
        default,
        alias = "input",
        with = "hex_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Bytes>,
}

/// One entry of the per-instruction execution log.
///
/// Memory and storage capture are disabled on the trace request, so only the
/// program counter, opcode name, call depth and stack survive. Stack words
/// are listed bottom-to-top (top of stack last), as the node reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub pc: u64,
    pub op: String,
    pub depth: u64,
    #[serde(default, with = "stack_words")]
    pub stack: Vec<U256>,
}

/// Result shape of `debug_traceTransaction`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTrace {
    #[serde(default)]
    pub gas: u64,
    #[serde(default)]
    pub return_value: String,
    #[serde(default)]
    pub struct_logs: Vec<TraceStep>,
}

/// Subset of a block returned by `eth_getBlockByNumber` with full
/// transaction objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    #[serde(default)]
    pub number: Option<U256>,
    #[serde(default)]
    pub hash: Option<H256>,
    #[serde(default)]
    pub transactions: Vec<RpcBlockTransaction>,
}

/// The per-transaction fields the capture fallback needs from a block scan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlockTransaction {
    pub hash: H256,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default, with = "hex_bytes")]
    pub input: Bytes,
}

/// Block reference for `eth_getBlockByNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSelector {
    Latest,
    Number(u64),
}

impl BlockSelector {
    /// The positional JSON-RPC parameter for this selector.
    pub fn to_param(self) -> Value {
        match self {
            BlockSelector::Latest => Value::String("latest".to_string()),
            BlockSelector::Number(n) => Value::String(format!("0x{n:x}")),
        }
    }
}

/// `0x`-prefixed hex (de)serialization for [`Bytes`].
pub mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(raw).map(Bytes::from).map_err(D::Error::custom)
    }
}

/// [`hex_bytes`] lifted over `Option`.
pub mod hex_bytes_opt {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Bytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&format!("0x{}", hex::encode(bytes))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Bytes>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let raw = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(raw)
            .map(|b| Some(Bytes::from(b)))
            .map_err(D::Error::custom)
    }
}

/// Stack-word (de)serialization.
///
/// Nodes disagree on whether stack entries carry a `0x` prefix; accept both,
/// emit the prefixed form.
pub mod stack_words {
    use ethereum_types::U256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(words: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(words.len()))?;
        for word in words {
            seq.serialize_element(&format!("{word:#x}"))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| {
                let trimmed = s.strip_prefix("0x").unwrap_or(s);
                U256::from_str_radix(trimmed, 16).map_err(D::Error::custom)
            })
            .collect()
    }
}
