use base64::{encode_config, URL_SAFE_NO_PAD};
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Derivation code of identifiers derived from another receipt.
const BUYER_COPY_CODE: &str = "B";

/// Receipt Identifier
///
/// Opaque document key. The store assigns it on creation; buyer copies get
/// one derived from the receipt they were copied from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ReceiptId(String);

impl ReceiptId {
    pub fn new(id: impl Into<String>) -> Self {
        ReceiptId(id.into())
    }

    /// Encodes a store-generated sequence number.
    pub fn from_sequence(seq: u64) -> Self {
        ReceiptId(encode_config(seq.to_be_bytes(), URL_SAFE_NO_PAD))
    }

    /// Buyer Copy Identifier
    ///
    /// Every delivery of the creation event of `original` maps to the same
    /// key, so writing the copy with insert-if-absent semantics can happen
    /// at most once.
    pub fn buyer_copy_of(original: &ReceiptId) -> Self {
        let digest = blake3::hash(original.as_str().as_bytes());
        ReceiptId(format!(
            "{}{}",
            BUYER_COPY_CODE,
            encode_config(digest.as_bytes(), URL_SAFE_NO_PAD)
        ))
    }

    /// Reads a key coming out of the store.
    pub fn from_key(key: &[u8]) -> Result<Self, Error> {
        match std::str::from_utf8(key) {
            Ok(s) if !s.is_empty() => Ok(ReceiptId(s.to_string())),
            _ => Err(Error::ImproperReceiptId),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReceiptId {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReceiptId {
    fn from(id: &str) -> Self {
        ReceiptId::new(id)
    }
}

#[test]
fn test_buyer_copy_id() {
    let r1 = ReceiptId::from("r1");
    let copy = ReceiptId::buyer_copy_of(&r1);
    assert_eq!(copy, ReceiptId::buyer_copy_of(&ReceiptId::from("r1")));
    assert_ne!(copy, ReceiptId::buyer_copy_of(&ReceiptId::from("r2")));
    assert!(copy.as_str().starts_with(BUYER_COPY_CODE));
    // 32 byte digest, unpadded base64
    assert_eq!(copy.as_str().len(), 1 + 43);
}

#[test]
fn test_from_key() {
    assert_eq!(ReceiptId::from_key(b"r1").unwrap(), ReceiptId::from("r1"));
    assert!(matches!(
        ReceiptId::from_key(&[0xff, 0xfe]),
        Err(Error::ImproperReceiptId)
    ));
    assert!(ReceiptId::from_key(b"").is_err());
    assert_ne!(ReceiptId::from_sequence(1), ReceiptId::from_sequence(2));
}
