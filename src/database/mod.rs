use crate::receipt::{Receipt, ReceiptId};

#[cfg(feature = "sled-db")]
pub mod sled;

/// Receipt Store
///
/// The `receipts` collection. Records are created once and never mutated
/// through this interface.
pub trait ReceiptDatabase {
    type Error: std::error::Error;

    /// Add
    ///
    /// Stores a new receipt under an identifier assigned by the store and
    /// returns that identifier.
    fn add_receipt(&self, receipt: &Receipt) -> Result<ReceiptId, Self::Error>;

    /// Put
    ///
    /// Stores the receipt under the given identifier, IF there is no record
    /// for it yet. Returns true if the record was written, false otherwise.
    fn put_receipt(&self, id: &ReceiptId, receipt: &Receipt) -> Result<bool, Self::Error>;

    /// Get
    ///
    /// Returns the receipt stored under the given identifier
    fn get_receipt(&self, id: &ReceiptId) -> Result<Option<Receipt>, Self::Error>;

    /// Listing
    ///
    /// Returns the receipts owned by `user_id`, oldest first.
    fn receipts_of_user(&self, user_id: &str) -> Result<Vec<(ReceiptId, Receipt)>, Self::Error>;

    /// Returns every stored receipt in key order.
    fn receipts(&self) -> Result<Vec<(ReceiptId, Receipt)>, Self::Error>;
}

/// Listing order: creation stamp, then timestamp, then key. Unstamped records
/// come first.
pub(crate) fn listing_order(receipts: &mut [(ReceiptId, Receipt)]) {
    receipts.sort_by(|(a_id, a), (b_id, b)| {
        (a.created_at, a.timestamp, a_id).cmp(&(b.created_at, b.timestamp, b_id))
    });
}

#[test]
fn test_listing_order() {
    use chrono::{Duration, Utc};

    let now = Utc::now();
    let stamped = |user: &str, at| {
        let mut r = Receipt::new(user);
        r.created_at = Some(at);
        r
    };
    let mut listing = vec![
        (ReceiptId::from("c"), stamped("u", now)),
        (ReceiptId::from("b"), Receipt::new("u")),
        (ReceiptId::from("a"), stamped("u", now - Duration::seconds(10))),
        (ReceiptId::from("d"), stamped("u", now)),
    ];
    listing_order(&mut listing);
    let ids: Vec<_> = listing.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c", "d"]);
}
