use std::sync::Arc;

use chrono::Utc;

use crate::{
    database::ReceiptDatabase,
    error::Error,
    receipt::{Duplication, Receipt, ReceiptId},
};


/// Buyer copy processor
///
/// Looks at one newly created receipt at a time and materializes its
/// buyer-facing copy when one is needed. Invocations for different receipts
/// share nothing but the store.
pub struct ReceiptProcessor<D: ReceiptDatabase> {
    db: Arc<D>,
}

impl<D: ReceiptDatabase> ReceiptProcessor<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    /// Process Receipt
    ///
    /// Creates the buyer copy of `receipt` unless it is skipped. Returns the
    /// identifier of the copy, or `None` when nothing was written: the
    /// receipt was skipped or its copy already exists.
    pub fn process(&self, id: &ReceiptId, receipt: &Receipt) -> Result<Option<ReceiptId>, Error> {
        let buyer_id = match receipt.duplication() {
            Duplication::Skip(reason) => {
                tracing::debug!(receipt_id = %id, ?reason, "No buyer copy needed");
                return Ok(None);
            }
            Duplication::BuyerCopy { buyer_id } => buyer_id,
        };

        let copy_id = ReceiptId::buyer_copy_of(id);
        let copy = receipt.buyer_copy(id, buyer_id, Utc::now());

        let written = self
            .db
            .put_receipt(&copy_id, &copy)
            .map_err(|e| Error::StorageError(e.to_string()))?;

        if written {
            tracing::info!(receipt_id = %id, copy_id = %copy_id, buyer_id, "Buyer copy created");
            Ok(Some(copy_id))
        } else {
            // same creation event delivered again
            tracing::debug!(receipt_id = %id, copy_id = %copy_id, "Buyer copy already exists");
            Ok(None)
        }
    }

    /// Handle Receipt
    ///
    /// Fire-and-forget form of `process`. The source receipt is already
    /// stored, so failures are only logged: nothing is retried or rolled back.
    pub fn handle(&self, id: &ReceiptId, receipt: &Receipt) {
        if let Err(e) = self.process(id, receipt) {
            tracing::error!(receipt_id = %id, error = %e, "Failed to create buyer copy");
        }
    }
}
