mod tables;

use std::path::Path;

use ::sled::{
    transaction::{ConflictableTransactionResult, TransactionError},
    Db, Subscriber, Transactional,
};
use chrono::Utc;
use tables::{SledIndexTree, SledReceiptTree};

use super::{listing_order, ReceiptDatabase};
use crate::{
    error::Error,
    receipt::{Receipt, ReceiptId},
};

pub struct SledReceiptDatabase {
    db: Db,
    // "rcts" tree
    receipts: SledReceiptTree<Receipt>,
    // "usrs" tree
    owners: SledIndexTree,
}

impl SledReceiptDatabase {
    pub fn new<'a, P>(path: P) -> Result<Self, Error>
    where
        P: Into<&'a Path>,
    {
        let db = ::sled::open(path.into())?;
        Ok(Self {
            receipts: SledReceiptTree::new(db.open_tree(b"rcts")?),
            owners: SledIndexTree::new(db.open_tree(b"usrs")?),
            db,
        })
    }

    /// Change Feed
    ///
    /// Subscribes to every write on the receipts tree. Only writes made after
    /// this call are delivered.
    pub fn watch_receipts(&self) -> Subscriber {
        self.receipts.tree.watch_prefix(vec![])
    }

    /// Decodes a raw receipts tree entry, as delivered by the change feed.
    pub fn decode_entry(key: &[u8], value: &[u8]) -> Result<(ReceiptId, Receipt), Error> {
        Ok((
            ReceiptId::from_key(key)?,
            SledReceiptTree::<Receipt>::decode(value)?,
        ))
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    // Writes raw bytes to the receipts tree, bypassing encoding.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.receipts.tree.insert(key, value)?;
        Ok(())
    }

    // Writes the receipt and its owner index entry in one transaction,
    // unless the key is already taken.
    fn insert_new(&self, id: &ReceiptId, receipt: &Receipt) -> Result<bool, Error> {
        let key = id.as_str().as_bytes();
        let value = SledReceiptTree::<Receipt>::encode(receipt)?;
        let index_key = SledIndexTree::index_key(&receipt.user_id, id.as_str());

        (&self.receipts.tree, &self.owners.tree)
            .transaction(|(receipts, owners)| -> ConflictableTransactionResult<bool> {
                if receipts.get(key)?.is_some() {
                    return Ok(false);
                }
                receipts.insert(key, value.as_slice())?;
                owners.insert(index_key.as_slice(), &[] as &[u8])?;
                Ok(true)
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => Error::from(e),
                TransactionError::Abort(()) => {
                    Error::StorageError(format!("write of receipt {} aborted", id))
                }
            })
    }
}

impl ReceiptDatabase for SledReceiptDatabase {
    type Error = Error;

    // Creation stamps are server-assigned when the caller left them empty.
    fn add_receipt(&self, receipt: &Receipt) -> Result<ReceiptId, Self::Error> {
        let now = Utc::now();
        let mut receipt = receipt.clone();
        receipt.created_at.get_or_insert(now);
        receipt.timestamp.get_or_insert(now);

        let id = ReceiptId::from_sequence(self.db.generate_id()?);
        if self.insert_new(&id, &receipt)? {
            Ok(id)
        } else {
            Err(Error::StorageError(format!("generated id {} already taken", id)))
        }
    }

    fn put_receipt(&self, id: &ReceiptId, receipt: &Receipt) -> Result<bool, Self::Error> {
        self.insert_new(id, receipt)
    }

    fn get_receipt(&self, id: &ReceiptId) -> Result<Option<Receipt>, Self::Error> {
        self.receipts.get(id.as_str())
    }

    fn receipts_of_user(&self, user_id: &str) -> Result<Vec<(ReceiptId, Receipt)>, Self::Error> {
        let mut listing = vec![];
        for key in self.owners.ids_of(user_id)? {
            let id = ReceiptId::from_key(&key)?;
            if let Some(receipt) = self.receipts.get(&key)? {
                listing.push((id, receipt));
            }
        }
        listing_order(&mut listing);
        Ok(listing)
    }

    // Storage errors abort the walk. A record that does not decode is
    // reported and left out, the way the change feed treats it.
    fn receipts(&self) -> Result<Vec<(ReceiptId, Receipt)>, Self::Error> {
        let mut all = vec![];
        for entry in self.receipts.tree.iter() {
            let (key, value) = entry?;
            match Self::decode_entry(&key, &value) {
                Ok(decoded) => all.push(decoded),
                Err(e) => tracing::warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping undecodable receipt"
                ),
            }
        }
        Ok(all)
    }
}
