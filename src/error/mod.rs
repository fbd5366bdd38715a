use serde_cbor;
use serde_json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON Serialization error")]
    JSONSerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("CBOR Serialization error")]
    CBORSerializationError {
        #[from]
        source: serde_cbor::Error,
    },

    #[cfg(feature = "sled-db")]
    #[error("Database error: {source}")]
    SledError {
        #[from]
        source: sled::Error,
    },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Improper receipt identifier")]
    ImproperReceiptId,

    #[error("Invalid payment request: {0}")]
    PaymentRequestError(String),
}
