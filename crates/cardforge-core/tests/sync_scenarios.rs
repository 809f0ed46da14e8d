//! End-to-end sync passes against an in-memory remote

mod common;

use std::time::Duration;

use cardforge_core::models::{deck_file_name, image_file_name, ConflictStrategy};
use cardforge_core::storage::{ImagePayload, MemoryRemoteStore, RemoteError, RemoteOp};
use cardforge_core::sync::{
    ConflictChoice, ConflictView, EngineState, ResolverState, SyncEngine, SyncError, SyncOutcome,
    SyncPolicy, SyncReport, TransportFailurePolicy,
};
use cardforge_core::{Card, CardId, ContentHash, Deck, DeckId, SlotValue};
use common::{
    edited_elsewhere, engine, engine_with, pixel_data_url, second_device, write_remote, SlowRemote,
};
use pretty_assertions::assert_eq;

fn completed(outcome: SyncOutcome) -> SyncReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        other => panic!("expected a completed pass, got {other:?}"),
    }
}

fn conflict(outcome: SyncOutcome) -> ConflictView {
    match outcome {
        SyncOutcome::Conflict { conflict, .. } => conflict,
        other => panic!("expected a conflict, got {other:?}"),
    }
}

/// Overwrite the remote copy of `deck` with an edit made elsewhere 5 s later.
fn diverge(engine: &SyncEngine<MemoryRemoteStore>, deck: &Deck) -> Vec<u8> {
    let remote = edited_elsewhere(deck, "Edited elsewhere");
    write_remote(engine.remote(), &remote, deck.updated_at + 5_000)
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_images_are_stored_once() {
    let engine = engine().await;
    let library = engine.library();

    let first = library
        .import_image(ImagePayload::from_data_url(&pixel_data_url()).unwrap())
        .await
        .unwrap();
    let second = library
        .import_image(ImagePayload::from_data_url(&pixel_data_url()).unwrap())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(library.content_store().list_hashes().await.unwrap(), vec![first]);
}

#[tokio::test(flavor = "multi_thread")]
async fn uploaded_deck_parses_back_with_same_cards_and_style() {
    let engine = engine().await;
    let library = engine.library();

    let mut deck = library.create_deck("Round trip").await.unwrap();
    deck.style.font_family = Some("Inter".to_string());
    deck.style
        .extra
        .insert("cornerRadius".to_string(), serde_json::json!(12));
    deck.cards.push(Card::new("front-back").with_slot("front", "Q").with_slot("back", "A"));
    deck.cards.push(
        Card::new("scored").with_slot("points", SlotValue::Other(serde_json::json!(3))),
    );
    let deck = library.save_deck(&deck).await.unwrap();

    completed(engine.run().await);

    let bytes = engine.remote().content(&deck.file_name()).unwrap();
    let parsed = Deck::parse(&bytes).unwrap();
    assert_eq!(parsed.cards, deck.cards);
    assert_eq!(parsed.style, deck.style);
    assert_eq!(bytes, deck.serialize().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_content_never_conflicts_despite_timestamp_gap() {
    let engine = engine().await;
    let deck = engine.library().create_deck("Same").await.unwrap();
    write_remote(engine.remote(), &deck, deck.updated_at + 86_400_000);

    let report = completed(engine.run().await);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.uploaded, 0);
    assert!(engine.remote().saved_names().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn reformatted_but_equal_remote_is_not_a_conflict() {
    let engine = engine().await;
    let deck = engine.library().create_deck("Pretty").await.unwrap();
    let pretty = serde_json::to_vec_pretty(&deck.to_document()).unwrap();
    engine
        .remote()
        .put_file(&deck.file_name(), &pretty, deck.updated_at + 60_000);

    let report = completed(engine.run().await);
    assert_eq!(report.skipped, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_newer_within_window_uploads_local() {
    let engine = engine().await;
    let deck = engine.library().create_deck("Local").await.unwrap();
    let remote = edited_elsewhere(&deck, "Remote");
    write_remote(engine.remote(), &remote, deck.updated_at + 1_000);

    let report = completed(engine.run().await);
    assert_eq!(report.uploaded, 1);
    assert_eq!(
        engine.remote().content(&deck.file_name()),
        Some(deck.serialize().unwrap())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_newer_beyond_window_with_different_content_conflicts() {
    let engine = engine().await;
    let deck = engine.library().create_deck("Local").await.unwrap();
    let remote = edited_elsewhere(&deck, "Remote");
    write_remote(engine.remote(), &remote, deck.updated_at + 1_001);

    let view = conflict(engine.run().await);
    assert_eq!(view.deck_id, deck.id);
    assert_eq!(view.local.name, "Local");
    assert_eq!(view.remote.name, "Remote");
    assert_eq!(view.remote_modified_at - view.local_updated_at, 1_001);
    assert_eq!(engine.state(), EngineState::PausedOnConflict);
    assert_eq!(engine.resolver_state(), ResolverState::ConflictPending);
    assert!(engine.remote().saved_names().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn local_newer_beyond_window_uploads() {
    let engine = engine().await;
    let deck = engine.library().create_deck("Fresh").await.unwrap();
    let mut stale = deck.clone();
    stale.name = "Stale".to_string();
    write_remote(engine.remote(), &stale, deck.updated_at - 10_000);

    let report = completed(engine.run().await);
    assert_eq!(report.uploaded, 1);
    assert_eq!(
        engine.remote().content(&deck.file_name()),
        Some(deck.serialize().unwrap())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_deck_is_removed_remotely_and_not_rediscovered() {
    let engine = engine().await;
    let library = engine.library();
    let deck = library.create_deck("Doomed").await.unwrap();
    completed(engine.run().await);
    assert_eq!(engine.remote().names(), vec![deck.file_name()]);

    library.delete_deck(&deck.id).await.unwrap();
    let report = completed(engine.run().await);

    assert_eq!(report.deleted_remote, 1);
    assert_eq!(report.downloaded, 0);
    assert!(engine.remote().names().is_empty());
    assert!(library.list_decks().await.unwrap().is_empty());
    assert!(library.tombstones().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn tombstone_without_remote_copy_is_cleared() {
    let engine = engine().await;
    let library = engine.library();
    let deck = library.create_deck("Never synced").await.unwrap();
    library.delete_deck(&deck.id).await.unwrap();

    let report = completed(engine.run().await);
    assert_eq!(report.deleted_remote, 0);
    assert!(library.tombstones().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn non_transport_delete_failure_still_clears_tombstone() {
    let engine = engine().await;
    let library = engine.library();
    let deck = library.create_deck("Locked").await.unwrap();
    completed(engine.run().await);

    engine.remote().fail(
        RemoteOp::Delete,
        None,
        RemoteError::Api {
            status: 403,
            message: "forbidden".to_string(),
        },
    );
    library.delete_deck(&deck.id).await.unwrap();

    let report = completed(engine.run().await);
    assert_eq!(report.deleted_remote, 0);
    assert!(library.tombstones().await.unwrap().is_empty());
    assert!(library.list_decks().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn auth_failure_on_delete_fails_pass_and_keeps_tombstone() {
    for transport_failure in [TransportFailurePolicy::AbortPass, TransportFailurePolicy::SkipDeck] {
        let engine = engine_with(SyncPolicy {
            transport_failure,
            ..SyncPolicy::default()
        })
        .await;
        let library = engine.library();
        let deck = library.create_deck("Doomed").await.unwrap();
        completed(engine.run().await);

        engine.remote().fail(
            RemoteOp::Delete,
            None,
            RemoteError::Auth("token revoked".to_string()),
        );
        library.delete_deck(&deck.id).await.unwrap();

        match engine.run().await {
            SyncOutcome::Failed { error, .. } => assert!(matches!(error, SyncError::Auth(_))),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(library.tombstones().await.unwrap(), vec![deck.id]);
        assert!(engine.remote().content(&deck.file_name()).is_some());

        engine.remote().clear_failures();
        let report = completed(engine.run().await);
        assert_eq!(report.deleted_remote, 1);
        assert_eq!(report.downloaded, 0);
        assert!(library.list_decks().await.unwrap().is_empty());
        assert!(library.tombstones().await.unwrap().is_empty());
        assert!(engine.remote().content(&deck.file_name()).is_none());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn fields_from_other_clients_survive_local_edits() {
    let engine = engine().await;
    let id = DeckId::new();
    let card_id = CardId::new();
    let raw = format!(
        r#"{{"id":"{id}","name":"Shared","description":"web","cards":[{{"id":"{card_id}","layout":"basic","data":{{}},"rotation":90}}],"style":{{}},"updatedAt":1000}}"#
    );
    let name = deck_file_name(&id);
    engine.remote().put_file(&name, raw.as_bytes(), 1_000);

    assert_eq!(completed(engine.run().await).downloaded, 1);
    engine.library().rename_deck(&id, "Renamed").await.unwrap();
    assert_eq!(completed(engine.run().await).uploaded, 1);

    let uploaded: serde_json::Value =
        serde_json::from_slice(&engine.remote().content(&name).unwrap()).unwrap();
    assert_eq!(uploaded["name"], "Renamed");
    assert_eq!(uploaded["description"], "web");
    assert_eq!(uploaded["cards"][0]["rotation"], 90);
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_failure_keeps_tombstone_for_next_pass() {
    let engine = engine().await;
    let library = engine.library();
    let deck = library.create_deck("Flaky").await.unwrap();
    completed(engine.run().await);

    engine.remote().fail(
        RemoteOp::Delete,
        Some(&deck.file_name()),
        RemoteError::Transport("connection reset".to_string()),
    );
    library.delete_deck(&deck.id).await.unwrap();

    match engine.run().await {
        SyncOutcome::Failed { error, .. } => assert!(error.is_transport()),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(library.tombstones().await.unwrap(), vec![deck.id]);
    assert!(library.list_decks().await.unwrap().is_empty());

    engine.remote().clear_failures();
    let report = completed(engine.run().await);
    assert_eq!(report.deleted_remote, 1);
    assert!(engine.remote().names().is_empty());
    assert!(library.tombstones().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn skip_policy_defers_tombstone_without_resurrecting_deck() {
    let engine =
        engine_with(SyncPolicy::default().with_transport_failure(TransportFailurePolicy::SkipDeck))
            .await;
    let library = engine.library();
    let deck = library.create_deck("Flaky").await.unwrap();
    completed(engine.run().await);

    engine.remote().fail(
        RemoteOp::Delete,
        None,
        RemoteError::Transport("timeout".to_string()),
    );
    library.delete_deck(&deck.id).await.unwrap();

    let report = completed(engine.run().await);
    assert_eq!(report.downloaded, 0);
    assert_eq!(library.tombstones().await.unwrap(), vec![deck.id]);
    assert!(library.list_decks().await.unwrap().is_empty());
    assert_eq!(engine.remote().names(), vec![deck.file_name()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn keep_local_overwrites_remote_with_local_bytes() {
    let engine = engine().await;
    let library = engine.library();
    let deck = library.create_deck("Mine").await.unwrap();
    completed(engine.run().await);
    let local_bytes = deck.serialize().unwrap();
    diverge(&engine, &deck);

    conflict(engine.run().await);
    let report = completed(
        engine
            .resolve_conflict(ConflictChoice::KeepLocal)
            .await
            .unwrap(),
    );

    assert_eq!(report.uploaded, 1);
    assert_eq!(engine.remote().content(&deck.file_name()), Some(local_bytes));
    assert_eq!(engine.state(), EngineState::Idle);

    let log = library.list_conflicts(10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].strategy, ConflictStrategy::KeepLocal);
    assert_eq!(log[0].deck_id, deck.id.as_str());
}

#[tokio::test(flavor = "multi_thread")]
async fn use_cloud_overwrites_local_with_remote_bytes() {
    let engine = engine().await;
    let library = engine.library();
    let deck = library.create_deck("Mine").await.unwrap();
    completed(engine.run().await);
    let remote_bytes = diverge(&engine, &deck);

    conflict(engine.run().await);
    let view = engine.begin_conflict_resolution().unwrap();
    assert_eq!(view.remote.name, "Edited elsewhere");
    assert_eq!(engine.resolver_state(), ResolverState::Resolving);
    assert_eq!(engine.state(), EngineState::PausedOnConflict);

    let report = completed(engine.resolve_conflict(ConflictChoice::UseCloud).await.unwrap());
    assert_eq!(report.downloaded, 1);

    let stored = library.get_deck(&deck.id).await.unwrap().unwrap();
    assert_eq!(stored.serialize().unwrap(), remote_bytes);
    assert_eq!(
        library.list_conflicts(1).await.unwrap()[0].strategy,
        ConflictStrategy::UseCloud
    );

    // Both replicas now agree.
    let report = completed(engine.run().await);
    assert_eq!(report.skipped, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn keep_local_uploads_edits_made_while_paused() {
    let engine = engine().await;
    let library = engine.library();
    let deck = library.create_deck("Mine").await.unwrap();
    completed(engine.run().await);
    diverge(&engine, &deck);

    conflict(engine.run().await);
    library.rename_deck(&deck.id, "Renamed").await.unwrap();
    completed(
        engine
            .resolve_conflict(ConflictChoice::KeepLocal)
            .await
            .unwrap(),
    );

    let bytes = engine.remote().content(&deck.file_name()).unwrap();
    assert_eq!(Deck::parse(&bytes).unwrap().name, "Renamed");
}

#[tokio::test(flavor = "multi_thread")]
async fn resolution_resumes_each_remaining_deck_exactly_once() {
    let engine = engine().await;
    let library = engine.library();
    let a = library.create_deck("A").await.unwrap();
    let b = library.create_deck("B").await.unwrap();
    let c = library.create_deck("C").await.unwrap();
    let d = library.create_deck("D").await.unwrap();
    completed(engine.run().await);

    diverge(&engine, &b);
    library.rename_deck(&c.id, "C2").await.unwrap();
    library.rename_deck(&d.id, "D2").await.unwrap();
    engine.remote().reset_call_log();

    let view = conflict(engine.run().await);
    assert_eq!(view.deck_id, b.id);
    assert_eq!(view.remaining, 2);
    assert!(engine.remote().saved_names().is_empty());

    let report = completed(
        engine
            .resolve_conflict(ConflictChoice::KeepLocal)
            .await
            .unwrap(),
    );
    assert_eq!(
        engine.remote().saved_names(),
        vec![b.file_name(), c.file_name(), d.file_name()]
    );
    assert_eq!(report.uploaded, 3);
    assert!(!engine.remote().saved_names().contains(&a.file_name()));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_resume_keeps_conflict_and_tail() {
    let engine = engine().await;
    let library = engine.library();
    let a = library.create_deck("A").await.unwrap();
    let b = library.create_deck("B").await.unwrap();
    completed(engine.run().await);

    diverge(&engine, &a);
    library.rename_deck(&b.id, "B2").await.unwrap();
    assert_eq!(conflict(engine.run().await).remaining, 1);

    for op in [RemoteOp::SignIn, RemoteOp::List] {
        engine
            .remote()
            .fail(op, None, RemoteError::Transport("offline".to_string()));
        let outcome = engine
            .resolve_conflict(ConflictChoice::KeepLocal)
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Failed { .. }));
        assert_eq!(engine.state(), EngineState::PausedOnConflict);
        let view = engine.pending_conflict().unwrap();
        assert_eq!(view.deck_id, a.id);
        assert_eq!(view.remaining, 1);
        assert!(matches!(engine.run().await, SyncOutcome::AwaitingResolution));
        engine.remote().clear_failures();
    }
    assert!(library.list_conflicts(10).await.unwrap().is_empty());

    engine.remote().reset_call_log();
    let report = completed(
        engine
            .resolve_conflict(ConflictChoice::KeepLocal)
            .await
            .unwrap(),
    );
    assert_eq!(report.uploaded, 2);
    assert_eq!(
        engine.remote().saved_names(),
        vec![a.file_name(), b.file_name()]
    );
    assert_eq!(engine.state(), EngineState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn paused_engine_refuses_new_passes_until_dismissed() {
    let engine = engine().await;
    let library = engine.library();
    let a = library.create_deck("A").await.unwrap();
    let b = library.create_deck("B").await.unwrap();
    completed(engine.run().await);

    diverge(&engine, &a);
    library.rename_deck(&b.id, "B2").await.unwrap();
    engine.remote().reset_call_log();

    conflict(engine.run().await);
    assert!(matches!(engine.run().await, SyncOutcome::AwaitingResolution));
    assert!(matches!(
        engine.run_queue(vec![b.id]).await,
        SyncOutcome::AwaitingResolution
    ));

    assert!(matches!(
        engine.dismiss_conflict().await.unwrap(),
        SyncOutcome::Aborted
    ));
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(engine.pending_conflict().is_none());
    assert!(engine.remote().saved_names().is_empty());
    assert_eq!(
        library.list_conflicts(1).await.unwrap()[0].strategy,
        ConflictStrategy::Dismissed
    );

    // Nothing was decided, so the next pass stops on the same deck.
    let view = conflict(engine.run().await);
    assert_eq!(view.deck_id, a.id);
}

#[tokio::test(flavor = "multi_thread")]
async fn abort_policy_stops_pass_on_transport_failure() {
    let engine = engine().await;
    let library = engine.library();
    let a = library.create_deck("A").await.unwrap();
    let b = library.create_deck("B").await.unwrap();
    library.create_deck("C").await.unwrap();
    engine.remote().fail(
        RemoteOp::Save,
        Some(&b.file_name()),
        RemoteError::Transport("connection reset".to_string()),
    );

    match engine.run().await {
        SyncOutcome::Failed { error, report } => {
            assert!(error.is_transport());
            assert_eq!(report.uploaded, 1);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(engine.remote().saved_names(), vec![a.file_name()]);
    assert_eq!(engine.state(), EngineState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn skip_policy_continues_after_transport_failure() {
    let engine =
        engine_with(SyncPolicy::default().with_transport_failure(TransportFailurePolicy::SkipDeck))
            .await;
    let library = engine.library();
    let a = library.create_deck("A").await.unwrap();
    let b = library.create_deck("B").await.unwrap();
    let c = library.create_deck("C").await.unwrap();
    engine.remote().fail(
        RemoteOp::Save,
        Some(&b.file_name()),
        RemoteError::Api {
            status: 503,
            message: "unavailable".to_string(),
        },
    );

    let report = completed(engine.run().await);
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed_decks, vec![b.id]);
    assert_eq!(
        engine.remote().saved_names(),
        vec![a.file_name(), c.file_name()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn discovery_imports_valid_decks_and_isolates_bad_files() {
    let remote = MemoryRemoteStore::new();
    let first = second_device(&remote).await;
    let shared = first.library().create_deck("Shared").await.unwrap();
    completed(first.run().await);

    remote.put_file(&format!("deck-{}.json", DeckId::new()), b"{ broken", 1);
    let stray = Deck::new("Stray");
    remote.put_file(
        &format!("deck-{}.json", DeckId::new()),
        &stray.serialize().unwrap(),
        1,
    );
    remote.put_file("notes.txt", b"ignored", 1);

    let other = second_device(&remote).await;
    let report = completed(other.run().await);

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.discovery_failures, 2);
    let decks = other.library().list_decks().await.unwrap();
    assert_eq!(decks.len(), 1);
    assert_eq!(decks[0].id, shared.id);
    assert_eq!(decks[0].serialize().unwrap(), shared.serialize().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn discovery_survives_unreadable_remote_file() {
    let remote = MemoryRemoteStore::new();
    let first = second_device(&remote).await;
    let readable = first.library().create_deck("Readable").await.unwrap();
    let unreadable = first.library().create_deck("Unreadable").await.unwrap();
    completed(first.run().await);

    remote.fail(
        RemoteOp::Get,
        Some(&unreadable.file_name()),
        RemoteError::Transport("reset".to_string()),
    );
    let other = second_device(&remote).await;
    let report = completed(other.run().await);

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.discovery_failures, 1);
    assert!(other.library().get_deck(&readable.id).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_pass_skips_discovery() {
    let remote = MemoryRemoteStore::new();
    let first = second_device(&remote).await;
    first.library().create_deck("Elsewhere").await.unwrap();
    completed(first.run().await);

    let other = second_device(&remote).await;
    let report = completed(other.run_queue(Vec::new()).await);
    assert_eq!(report.downloaded, 0);
    assert!(other.library().list_decks().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn sign_in_failure_fails_pass_before_any_remote_call() {
    let engine = engine().await;
    engine.library().create_deck("Offline").await.unwrap();
    engine.remote().set_signed_in(false);

    match engine.run().await {
        SyncOutcome::Failed { error, report } => {
            assert!(matches!(error, SyncError::Auth(_)));
            assert_eq!(report, SyncReport::default());
        }
        other => panic!("expected auth failure, got {other:?}"),
    }
    assert!(engine.remote().saved_names().is_empty());
    assert!(engine
        .library()
        .settings()
        .await
        .unwrap()
        .last_synced_at
        .is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_trigger_while_running_is_busy() {
    let library = cardforge_core::services::LibraryService::open_in_memory()
        .await
        .unwrap();
    library.create_deck("Slow").await.unwrap();
    let engine = SyncEngine::new(
        library,
        SlowRemote {
            inner: MemoryRemoteStore::new(),
            delay: Duration::from_millis(200),
        },
        SyncPolicy::default(),
    );

    let (first, (state, second)) = tokio::join!(engine.run(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        (engine.state(), engine.run().await)
    });

    assert_eq!(state, EngineState::Running);
    assert!(matches!(second, SyncOutcome::Busy));
    assert!(first.is_completed());
    assert_eq!(engine.state(), EngineState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn referenced_images_travel_with_decks() {
    let remote = MemoryRemoteStore::new();
    let first = second_device(&remote).await;
    let deck = first.library().create_deck("Pictures").await.unwrap();
    let deck = first
        .library()
        .add_card(
            &deck.id,
            Card::new("picture").with_slot("image", pixel_data_url()),
        )
        .await
        .unwrap();
    let hash = deck.image_references()[0].clone();

    let report = completed(first.run().await);
    assert_eq!(report.images_pushed, 1);
    assert!(remote.names().contains(&image_file_name(&hash, "image/png")));

    let report = completed(first.run().await);
    assert_eq!(report.images_pushed, 0);

    let other = second_device(&remote).await;
    let report = completed(other.run().await);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.images_pulled, 1);

    let original = first.library().image(&hash).await.unwrap().unwrap();
    let pulled = other.library().image(&hash).await.unwrap().unwrap();
    assert_eq!(pulled, original);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_images_do_not_block_decks() {
    let remote = MemoryRemoteStore::new();
    let first = second_device(&remote).await;
    let deck = first.library().create_deck("Gaps").await.unwrap();
    let ghost = ContentHash::of(b"never stored");
    first
        .library()
        .add_card(&deck.id, Card::new("picture").with_slot("image", ghost))
        .await
        .unwrap();

    let report = completed(first.run().await);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.images_missing, 1);

    let other = second_device(&remote).await;
    let report = completed(other.run().await);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.images_missing, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn tampered_remote_image_is_rejected() {
    let remote = MemoryRemoteStore::new();
    let first = second_device(&remote).await;
    let deck = first.library().create_deck("Tampered").await.unwrap();
    let deck = first
        .library()
        .add_card(
            &deck.id,
            Card::new("picture").with_slot("image", pixel_data_url()),
        )
        .await
        .unwrap();
    let hash = deck.image_references()[0].clone();
    completed(first.run().await);

    remote.put_file(&image_file_name(&hash, "image/png"), b"not the picture", 1);
    let other = second_device(&remote).await;
    let report = completed(other.run().await);

    assert_eq!(report.images_pulled, 0);
    assert_eq!(report.images_missing, 1);
    assert!(other.library().image(&hash).await.unwrap().is_none());
}
