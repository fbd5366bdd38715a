mod id;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use id::ReceiptId;

/// Receipt
///
/// A commerce record documenting one transaction. The store key is not part
/// of the document; see `ReceiptId`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Owner
    ///
    /// Identifier of the party the record is listed for.
    pub user_id: String,

    /// Purchaser, when distinct from the owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_id: Option<String>,

    /// Set only on records derived by duplication.
    #[serde(default, deserialize_with = "falsy", skip_serializing_if = "is_false")]
    pub is_buyer_copy: bool,

    /// Back reference from a buyer copy to its source record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_receipt_id: Option<ReceiptId>,

    #[serde(default, deserialize_with = "stamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "stamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Remaining commerce fields, opaque to the trigger and copied verbatim.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Outcome of looking at a freshly created receipt.
#[derive(Debug, PartialEq)]
pub enum Duplication<'a> {
    Skip(SkipReason),
    BuyerCopy { buyer_id: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// No purchaser recorded.
    NoBuyer,
    /// Seller and buyer are the same party.
    SelfPurchase,
    /// The record is itself a derived copy.
    AlreadyBuyerCopy,
}

impl Receipt {
    pub fn new(user_id: impl Into<String>) -> Self {
        Receipt {
            user_id: user_id.into(),
            buyer_id: None,
            is_buyer_copy: false,
            original_receipt_id: None,
            created_at: None,
            timestamp: None,
            details: Map::new(),
        }
    }

    pub fn with_buyer(mut self, buyer_id: impl Into<String>) -> Self {
        self.buyer_id = Some(buyer_id.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Decide whether this record needs a buyer-facing copy.
    pub fn duplication(&self) -> Duplication<'_> {
        if self.is_buyer_copy {
            return Duplication::Skip(SkipReason::AlreadyBuyerCopy);
        }
        match self.buyer_id.as_deref() {
            None | Some("") => Duplication::Skip(SkipReason::NoBuyer),
            Some(buyer_id) if buyer_id == self.user_id => {
                Duplication::Skip(SkipReason::SelfPurchase)
            }
            Some(buyer_id) => Duplication::BuyerCopy { buyer_id },
        }
    }

    /// Buyer Copy
    ///
    /// Shallow copy of the record re-owned by `buyer_id`. Creation stamps are
    /// not carried over: buyer-side ordering follows the time of derivation.
    pub fn buyer_copy(&self, source: &ReceiptId, buyer_id: &str, now: DateTime<Utc>) -> Receipt {
        Receipt {
            user_id: buyer_id.to_string(),
            is_buyer_copy: true,
            original_receipt_id: Some(source.clone()),
            created_at: Some(now),
            timestamp: Some(now),
            ..self.clone()
        }
    }
}

// Missing, `null` and `false` all read as false.
fn falsy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn is_false(b: &bool) -> bool {
    !*b
}

// Stamps written by other clients of the collection.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStamp {
    Text(String),
    Millis(i64),
    Firestore {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
    Other(IgnoredAny),
}

// RFC 3339 text, epoch milliseconds or a `{seconds, nanoseconds}` object.
// Anything else reads as no stamp rather than failing the whole record.
fn stamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let stamp = match Option::<RawStamp>::deserialize(deserializer)? {
        None | Some(RawStamp::Other(_)) => None,
        Some(RawStamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Some(RawStamp::Millis(ms)) => Utc.timestamp_millis_opt(ms).single(),
        Some(RawStamp::Firestore {
            seconds,
            nanoseconds,
        }) => Utc.timestamp_opt(seconds, nanoseconds).single(),
    };
    Ok(stamp)
}
