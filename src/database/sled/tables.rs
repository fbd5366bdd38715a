use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;

// Direct singular key-value of T, CBOR encoded
pub(crate) struct SledReceiptTree<T> {
    pub(crate) tree: ::sled::Tree,
    marker: PhantomData<T>,
}

impl<T> SledReceiptTree<T> {
    pub fn new(tree: ::sled::Tree) -> Self {
        Self {
            tree,
            marker: PhantomData,
        }
    }
}

// DB "Tables" functionality
impl<T> SledReceiptTree<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<T>, Error> {
        match self.tree.get(key)? {
            Some(value) => Ok(Some(serde_cbor::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn encode(value: &T) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(value)?)
    }

    pub fn decode(raw: &[u8]) -> Result<T, Error> {
        Ok(serde_cbor::from_slice(raw)?)
    }
}

// Secondary index: "<owner>\0<id>" -> ()
pub(crate) struct SledIndexTree {
    pub(crate) tree: ::sled::Tree,
}

impl SledIndexTree {
    pub fn new(tree: ::sled::Tree) -> Self {
        Self { tree }
    }

    pub fn index_key(owner: &str, id: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(owner.len() + id.len() + 1);
        key.extend_from_slice(owner.as_bytes());
        key.push(0);
        key.extend_from_slice(id.as_bytes());
        key
    }

    // ids indexed under `owner`, in key order
    pub fn ids_of(&self, owner: &str) -> Result<Vec<Vec<u8>>, Error> {
        let mut prefix = owner.as_bytes().to_vec();
        prefix.push(0);
        self.tree
            .scan_prefix(&prefix)
            .keys()
            .map(|key| -> Result<Vec<u8>, Error> { Ok(key?[prefix.len()..].to_vec()) })
            .collect()
    }
}
