use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::RecvTimeoutError,
        Arc,
    },
    thread::{self, JoinHandle},
};

use feed::FeedReader;

use crate::{
    config::TriggerConfig,
    database::{sled::SledReceiptDatabase, ReceiptDatabase},
    error::Error,
    processor::ReceiptProcessor,
};

mod feed;

#[cfg(test)]
mod tests;

/// On-create trigger
///
/// Subscribes to the receipts tree change feed and hands every inserted
/// receipt to the processor. Delivery is at least once per insert and
/// unordered across receipts.
pub struct Trigger {
    db: Arc<SledReceiptDatabase>,
    processor: ReceiptProcessor<SledReceiptDatabase>,
    config: TriggerConfig,
}

pub struct TriggerHandle {
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<Result<(), Error>>,
}

impl TriggerHandle {
    /// Raises the shutdown flag and waits for the trigger thread.
    pub fn stop(self) -> Result<(), Error> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.thread
            .join()
            .map_err(|_| Error::StorageError("trigger thread panicked".into()))?
    }
}

impl Trigger {
    pub fn new(db: Arc<SledReceiptDatabase>, config: TriggerConfig) -> Self {
        Self {
            processor: ReceiptProcessor::new(Arc::clone(&db)),
            db,
            config,
        }
    }

    pub fn processor(&self) -> &ReceiptProcessor<SledReceiptDatabase> {
        &self.processor
    }

    /// Catch Up
    ///
    /// Processes every stored receipt once, covering receipts created while
    /// no trigger was running. Returns the number of copies created.
    pub fn catch_up(&self) -> Result<usize, Error> {
        let mut created = 0;
        for (id, receipt) in self.processor.db().receipts()? {
            match self.processor.process(&id, &receipt) {
                Ok(Some(_)) => created += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(receipt_id = %id, error = %e, "Failed to create buyer copy")
                }
            }
        }
        tracing::info!(created, "Catch-up finished");
        Ok(created)
    }

    /// Run the trigger until `shutdown` is raised or the feed closes.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<(), Error> {
        // Subscribe first so receipts written during catch-up are not missed.
        // Buyer copies are written on this thread, the feed is drained on
        // the reader's.
        let feed = FeedReader::start(Arc::clone(&self.db), self.config.poll_interval())?;
        if self.config.catch_up {
            self.catch_up()?;
        }

        tracing::info!("Watching for new receipts");
        while !shutdown.load(Ordering::SeqCst) {
            match feed.next_insert(self.config.poll_interval()) {
                Ok((key, value)) => self.on_insert(&key, &value),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Receipt feed closed");
                    break;
                }
            }
        }
        tracing::info!("Trigger shutting down");
        Ok(())
    }

    /// Runs the trigger on its own thread.
    pub fn spawn(self) -> Result<TriggerHandle, Error> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("receipt-trigger".into())
            .spawn(move || self.run(&flag))
            .map_err(|e| Error::StorageError(e.to_string()))?;
        Ok(TriggerHandle { shutdown, thread })
    }

    fn on_insert(&self, key: &[u8], value: &[u8]) {
        match SledReceiptDatabase::decode_entry(key, value) {
            Ok((id, receipt)) => self.processor.handle(&id, &receipt),
            // malformed record: skip
            Err(e) => tracing::warn!(
                key = %String::from_utf8_lossy(key),
                error = %e,
                "Skipping undecodable receipt"
            ),
        }
    }
}
