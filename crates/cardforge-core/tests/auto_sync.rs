//! Debounced auto-sync behaviour

mod common;

use std::time::Duration;

use cardforge_core::sync::AutoSync;
use common::engine;
use pretty_assertions::assert_eq;

const DEBOUNCE: Duration = Duration::from_millis(150);
const OBSERVE: Duration = Duration::from_millis(1_200);

#[tokio::test(flavor = "multi_thread")]
async fn burst_of_edits_triggers_one_pass() {
    let engine = engine().await;
    let library = engine.library();
    library.set_sync_enabled(true).await.unwrap();
    let revisions = library.subscribe();
    let auto = AutoSync::new(&engine, DEBOUNCE);

    let mut outcomes = Vec::new();
    let edits = async {
        for i in 0..5 {
            library.create_deck(&format!("Deck {i}")).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    let _ = tokio::time::timeout(OBSERVE, async {
        tokio::join!(auto.run(revisions, |outcome| {
            outcomes.push(outcome.is_completed());
            std::future::ready(())
        }), edits)
    })
    .await;

    assert_eq!(outcomes, vec![true]);
    assert_eq!(engine.remote().names().len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_writes_do_not_retrigger() {
    let engine = engine().await;
    let library = engine.library();
    library.set_sync_enabled(true).await.unwrap();
    library.create_deck("Seed").await.unwrap();
    let revisions = library.subscribe();
    let auto = AutoSync::new(&engine, DEBOUNCE);

    let mut passes = 0;
    let _ = tokio::time::timeout(OBSERVE, async {
        tokio::join!(auto.run(revisions, |_| {
            passes += 1;
            std::future::ready(())
        }), async {
            library.notify_external_change();
        })
    })
    .await;

    // One pass for the external change; its own writes stay silent.
    assert_eq!(passes, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_sync_never_fires() {
    let engine = engine().await;
    let library = engine.library();
    let revisions = library.subscribe();
    let auto = AutoSync::new(&engine, DEBOUNCE);

    let mut passes = 0;
    let _ = tokio::time::timeout(OBSERVE, async {
        tokio::join!(auto.run(revisions, |_| {
            passes += 1;
            std::future::ready(())
        }), async {
            library.create_deck("Local only").await.unwrap();
        })
    })
    .await;

    assert_eq!(passes, 0);
    assert!(engine.remote().names().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_out_user_never_fires() {
    let engine = engine().await;
    let library = engine.library();
    library.set_sync_enabled(true).await.unwrap();
    engine.remote().set_signed_in(false);
    let revisions = library.subscribe();
    let auto = AutoSync::new(&engine, DEBOUNCE);

    let mut passes = 0;
    let _ = tokio::time::timeout(OBSERVE, async {
        tokio::join!(auto.run(revisions, |_| {
            passes += 1;
            std::future::ready(())
        }), async {
            library.create_deck("Waiting").await.unwrap();
        })
    })
    .await;

    assert_eq!(passes, 0);
}
