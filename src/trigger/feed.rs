use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{database::sled::SledReceiptDatabase, error::Error};

/// Raw receipts tree insert: key and CBOR value.
pub(crate) type RawInsert = (Vec<u8>, Vec<u8>);

/// Change feed reader
///
/// Drains the sled subscriber on its own thread into an unbounded queue.
/// A sled subscriber is a bounded channel and every writer blocks once it is
/// full, so the thread draining it must never write to the store itself.
pub(crate) struct FeedReader {
    inserts: Receiver<RawInsert>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FeedReader {
    /// Subscribes and returns once the subscription is in place.
    pub fn start(db: Arc<SledReceiptDatabase>, poll_interval: Duration) -> Result<Self, Error> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (insert_tx, inserts) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("receipt-feed".into())
            .spawn(move || {
                let mut subscriber = db.watch_receipts();
                if ready_tx.send(()).is_err() {
                    return;
                }
                while !flag.load(Ordering::SeqCst) {
                    match subscriber.next_timeout(poll_interval) {
                        Ok(::sled::Event::Insert { key, value }) => {
                            if insert_tx.send((key.to_vec(), value.to_vec())).is_err() {
                                break;
                            }
                        }
                        Ok(::sled::Event::Remove { .. }) => {}
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| Error::StorageError(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| Error::StorageError("receipt feed reader exited before subscribing".into()))?;

        Ok(Self {
            inserts,
            stop,
            thread: Some(thread),
        })
    }

    /// Waits up to `timeout` for the next insert. `Disconnected` means the
    /// reader is gone and no more inserts will arrive.
    pub fn next_insert(&self, timeout: Duration) -> Result<RawInsert, RecvTimeoutError> {
        self.inserts.recv_timeout(timeout)
    }
}

impl Drop for FeedReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Receipt feed reader panicked");
            }
        }
    }
}
