use super::Trigger;
use crate::{
    config::TriggerConfig,
    database::{sled::SledReceiptDatabase, ReceiptDatabase},
    error::Error,
    receipt::{Receipt, ReceiptId},
};
use std::{
    fs,
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};
use tempfile::Builder;

fn open_db() -> Result<(tempfile::TempDir, Arc<SledReceiptDatabase>), Error> {
    let root = Builder::new().prefix("test-db").tempdir().unwrap();
    fs::create_dir_all(root.path()).unwrap();
    let db = Arc::new(SledReceiptDatabase::new(root.path())?);
    Ok((root, db))
}

fn config() -> TriggerConfig {
    TriggerConfig {
        poll_interval_ms: 20,
        ..TriggerConfig::default()
    }
}

// Polls the store until the copy of `id` shows up.
fn wait_for_copy(db: &SledReceiptDatabase, id: &ReceiptId) -> Result<Option<Receipt>, Error> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let copy_id = ReceiptId::buyer_copy_of(id);
    while Instant::now() < deadline {
        if let Some(copy) = db.get_receipt(&copy_id)? {
            return Ok(Some(copy));
        }
        thread::sleep(Duration::from_millis(10));
    }
    Ok(None)
}

// More sales than a sled subscriber buffers.
const BACKLOG: usize = 1100;

// Waits on a separate thread until `user_id` owns `count` receipts, so a
// stalled trigger fails the test instead of hanging it.
fn wait_for_listing(db: &Arc<SledReceiptDatabase>, user_id: &'static str, count: usize) -> bool {
    let db = Arc::clone(db);
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || loop {
        match db.receipts_of_user(user_id) {
            Ok(listing) if listing.len() >= count => {
                let _ = done_tx.send(());
                return;
            }
            Ok(_) => thread::sleep(Duration::from_millis(20)),
            Err(_) => return,
        }
    });
    done_rx.recv_timeout(Duration::from_secs(30)).is_ok()
}

#[test]
fn test_trigger_reacts_to_insert() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let handle = Trigger::new(Arc::clone(&db), config()).spawn()?;
    // give the thread time to subscribe
    thread::sleep(Duration::from_millis(100));

    let id = db.add_receipt(
        &Receipt::new("seller1")
            .with_buyer("buyer1")
            .with_detail("amount", 25.99),
    )?;
    let own = db.add_receipt(&Receipt::new("seller1").with_buyer("seller1"))?;

    let copy = wait_for_copy(&db, &id)?.expect("buyer copy was not created");
    assert_eq!(copy.user_id, "buyer1");
    assert!(copy.is_buyer_copy);
    assert_eq!(copy.original_receipt_id, Some(id.clone()));

    // let the copy's own insert event pass through the trigger
    thread::sleep(Duration::from_millis(200));
    handle.stop()?;

    assert_eq!(db.get_receipt(&ReceiptId::buyer_copy_of(&own))?, None);
    assert_eq!(
        db.get_receipt(&ReceiptId::buyer_copy_of(&ReceiptId::buyer_copy_of(&id)))?,
        None
    );
    assert_eq!(db.receipts()?.len(), 3);
    Ok(())
}

#[test]
fn test_catch_up() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let sale = db.add_receipt(&Receipt::new("seller1").with_buyer("buyer1"))?;
    db.add_receipt(&Receipt::new("seller2"))?;
    let other_sale = db.add_receipt(&Receipt::new("seller2").with_buyer("buyer2"))?;

    let trigger = Trigger::new(Arc::clone(&db), config());
    assert_eq!(trigger.catch_up()?, 2);
    // second pass finds every copy in place
    assert_eq!(trigger.catch_up()?, 0);

    assert!(db.get_receipt(&ReceiptId::buyer_copy_of(&sale))?.is_some());
    assert!(db.get_receipt(&ReceiptId::buyer_copy_of(&other_sale))?.is_some());
    assert_eq!(db.receipts_of_user("buyer2")?.len(), 1);
    Ok(())
}

#[test]
fn test_spawn_catches_up_first() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let sale = db.add_receipt(&Receipt::new("seller1").with_buyer("buyer1"))?;

    let handle = Trigger::new(Arc::clone(&db), config()).spawn()?;
    let copy = wait_for_copy(&db, &sale)?;
    handle.stop()?;

    assert!(copy.is_some());
    Ok(())
}

#[test]
fn test_stop_without_traffic() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let handle = Trigger::new(
        db,
        TriggerConfig {
            catch_up: false,
            ..config()
        },
    )
    .spawn()?;
    handle.stop()
}

#[test]
fn test_undecodable_insert_is_skipped() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let trigger = Trigger::new(Arc::clone(&db), config());

    trigger.on_insert(b"r1", b"garbage");
    trigger.on_insert(&[0xff], b"garbage");
    assert!(db.receipts()?.is_empty());
    Ok(())
}

#[test]
fn test_catch_up_over_large_backlog() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    for _ in 0..BACKLOG {
        db.add_receipt(&Receipt::new("seller1").with_buyer("buyer1"))?;
    }

    let handle = Trigger::new(Arc::clone(&db), config()).spawn()?;
    assert!(
        wait_for_listing(&db, "buyer1", BACKLOG),
        "catch-up stalled before copying every sale"
    );
    // the feed keeps moving once catch-up is done
    let late = db.add_receipt(&Receipt::new("seller2").with_buyer("buyer2"))?;
    assert!(wait_for_copy(&db, &late)?.is_some());
    handle.stop()?;

    assert_eq!(db.receipts_of_user("buyer1")?.len(), BACKLOG);
    Ok(())
}

#[test]
fn test_trigger_keeps_up_with_burst() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let handle = Trigger::new(
        Arc::clone(&db),
        TriggerConfig {
            catch_up: false,
            ..config()
        },
    )
    .spawn()?;
    thread::sleep(Duration::from_millis(100));

    for _ in 0..BACKLOG {
        db.add_receipt(&Receipt::new("seller1").with_buyer("buyer1"))?;
    }
    assert!(
        wait_for_listing(&db, "buyer1", BACKLOG),
        "trigger stalled during the burst"
    );
    handle.stop()?;

    assert_eq!(db.receipts_of_user("buyer1")?.len(), BACKLOG);
    // copies never recurse
    assert_eq!(db.receipts()?.len(), 2 * BACKLOG);
    Ok(())
}

#[test]
fn test_catch_up_survives_undecodable_record() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let before = db.add_receipt(&Receipt::new("seller1").with_buyer("buyer1"))?;
    db.insert_raw(b"broken", b"garbage")?;
    let after = db.add_receipt(&Receipt::new("seller2").with_buyer("buyer2"))?;

    let trigger = Trigger::new(Arc::clone(&db), config());
    assert_eq!(trigger.catch_up()?, 2);
    assert!(db.get_receipt(&ReceiptId::buyer_copy_of(&before))?.is_some());
    assert!(db.get_receipt(&ReceiptId::buyer_copy_of(&after))?.is_some());
    Ok(())
}

#[test]
fn test_foreign_stamps_still_get_a_copy() -> Result<(), Error> {
    let (_root, db) = open_db()?;
    let doc = serde_json::json!({
        "userId": "seller1",
        "buyerId": "buyer1",
        "createdAt": 1709287200000i64,
        "timestamp": { "_seconds": 1709287200, "_nanoseconds": 0 },
        "amount": 25.99,
    });
    db.insert_raw(b"r-client", &serde_cbor::to_vec(&doc)?)?;

    let trigger = Trigger::new(Arc::clone(&db), config());
    assert_eq!(trigger.catch_up()?, 1);
    let copy = db
        .get_receipt(&ReceiptId::buyer_copy_of(&ReceiptId::from("r-client")))?
        .unwrap();
    assert_eq!(copy.user_id, "buyer1");
    assert_eq!(copy.details.get("amount"), Some(&serde_json::json!(25.99)));
    Ok(())
}
