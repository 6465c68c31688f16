mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{charts_with_program, network_error, stats, Gate, Harness, Reply};
use enrolldash_core::{
    CacheStore, Clock, FetchCoordinator, FetchState, MemoryStorage, RefreshOutcome, StatsSnapshot,
};

/// Let spawned refresh tasks run until the backend has seen `calls` stats requests.
async fn wait_for_stats_calls(harness: &Harness, calls: usize) {
    while harness.backend.stats_calls() < calls {
        tokio::task::yield_now().await;
    }
}

fn default_snapshot() -> StatsSnapshot {
    StatsSnapshot {
        total_students: 120,
        total_programs: 8,
        total_colleges: 3,
    }
}

// ----------------------------------------------------------------------------
// Mount sequence
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_mount_without_cache_shows_loading_then_data() {
    let harness = Harness::new();
    let coordinator = harness.coordinator();

    let handle = coordinator.mount();
    assert_eq!(coordinator.state().fetch_state, FetchState::Loading);

    assert_eq!(handle.wait().await, RefreshOutcome::Updated);
    let state = coordinator.state();
    assert_eq!(state.fetch_state, FetchState::Idle);
    assert_eq!(state.stats, default_snapshot());
    assert_eq!(state.chart_data.by_program.len(), 1, "zero-count program dropped");
    assert_eq!(state.chart_data.by_program[0].code, "BSCS");
    assert_eq!(
        state.last_updated.map(|t| t.timestamp_millis()),
        Some(harness.clock.now_ms())
    );

    let cached = harness.cache().read().expect("refresh writes through to the cache");
    assert_eq!(cached.stats, state.stats);
    assert_eq!(cached.chart_data, state.chart_data);
}

#[tokio::test]
async fn test_mount_with_cache_shows_cached_data_then_revalidates() {
    let harness = Harness::new();
    let cached_stats = StatsSnapshot {
        total_students: 50,
        total_programs: 2,
        total_colleges: 1,
    };
    harness
        .cache()
        .write(&cached_stats, &Default::default());
    harness.clock.advance(60_000);

    let gate = Gate::new();
    harness.backend.script_stats(Some(gate.clone()), Reply::Ok(stats(120, 8, 3)));

    let coordinator = harness.coordinator();
    let handle = coordinator.mount();

    // Cached data is on screen before any network round trip
    let state = coordinator.state();
    assert_eq!(state.stats, cached_stats);
    assert_eq!(state.fetch_state, FetchState::Refreshing, "no loading flicker");
    assert!(state.has_data);
    assert_eq!(
        state.last_updated.map(|t| t.timestamp_millis()),
        Some(harness.clock.now_ms() - 60_000)
    );

    gate.open();
    assert_eq!(handle.wait().await, RefreshOutcome::Updated);
    assert_eq!(coordinator.state().stats, default_snapshot());
    assert_eq!(harness.backend.stats_calls(), 1, "revalidation always runs");
}

#[tokio::test]
async fn test_mount_with_expired_cache_loads() {
    let harness = Harness::new();
    harness.cache().write(&default_snapshot(), &Default::default());
    harness.clock.advance(300_001);

    let coordinator = harness.coordinator();
    let handle = coordinator.mount();

    let state = coordinator.state();
    assert_eq!(state.fetch_state, FetchState::Loading);
    assert_eq!(state.stats, StatsSnapshot::default());
    assert!(!state.has_data);

    assert_eq!(handle.wait().await, RefreshOutcome::Updated);
}

// ----------------------------------------------------------------------------
// Supersession
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_newer_refresh_supersedes_older_one() {
    let harness = Harness::new();
    let gate_a = Gate::new();
    harness.backend.script_stats(Some(gate_a.clone()), Reply::Ok(stats(1, 1, 1)));
    harness
        .backend
        .script_charts(Some(gate_a.clone()), Reply::Ok(charts_with_program("STALE", 1)));

    let coordinator = harness.coordinator();
    let refresh_a = coordinator.refresh(true);
    wait_for_stats_calls(&harness, 1).await;

    let refresh_b = coordinator.refresh(false);
    assert_eq!(refresh_b.wait().await, RefreshOutcome::Updated);

    // A's response arrives late
    gate_a.open();
    assert_eq!(refresh_a.wait().await, RefreshOutcome::Superseded);
    tokio::task::yield_now().await;

    let state = coordinator.state();
    assert_eq!(state.stats, default_snapshot());
    assert_eq!(state.chart_data.by_program[0].code, "BSCS");
    assert_eq!(state.fetch_state, FetchState::Idle);
    assert!(state.stats_error.is_none());

    let cached = harness.cache().read().expect("cache holds B's data");
    assert_eq!(cached.stats, default_snapshot());
}

#[tokio::test]
async fn test_superseded_failure_is_not_surfaced() {
    let harness = Harness::new();
    let gate_a = Gate::new();
    harness.backend.script_stats(Some(gate_a.clone()), Reply::Err(network_error));

    let coordinator = harness.coordinator();
    let refresh_a = coordinator.refresh(true);
    wait_for_stats_calls(&harness, 1).await;

    let refresh_b = coordinator.refresh(true);
    gate_a.open();

    assert_eq!(refresh_a.wait().await, RefreshOutcome::Superseded);
    assert_eq!(refresh_b.wait().await, RefreshOutcome::Updated);

    let state = coordinator.state();
    assert_eq!(state.fetch_state, FetchState::Idle);
    assert!(state.stats_error.is_none());
    assert!(state.charts_error.is_none());
}

#[tokio::test]
async fn test_rapid_refreshes_only_last_one_lands() {
    let harness = Harness::new();
    let coordinator = harness.coordinator();

    let handles: Vec<_> = (0..5).map(|_| coordinator.refresh(true)).collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.wait().await);
    }

    let updated = outcomes
        .iter()
        .filter(|o| **o == RefreshOutcome::Updated)
        .count();
    assert_eq!(updated, 1);
    assert_eq!(outcomes.last(), Some(&RefreshOutcome::Updated));
    assert_eq!(coordinator.state().fetch_state, FetchState::Idle);
}

// ----------------------------------------------------------------------------
// Failures
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_failure_without_data_resets_to_zeroed_defaults() {
    let harness = Harness::new();
    harness.backend.script_stats(None, Reply::Err(network_error));

    let coordinator = harness.coordinator();
    let outcome = coordinator.refresh(true).wait().await;

    assert_eq!(
        outcome,
        RefreshOutcome::Failed("Network error. Check your connection.".to_string())
    );
    let state = coordinator.state();
    assert_eq!(state.fetch_state, FetchState::Error);
    assert_eq!(state.stats, StatsSnapshot::default());
    assert!(state.chart_data.is_empty());
    assert_eq!(state.stats_error.as_deref(), Some("Network error. Check your connection."));
    assert!(state.charts_error.is_none());
    assert!(state.last_updated.is_none());
    assert!(harness.cache().read().is_none());
}

#[tokio::test]
async fn test_failure_keeps_last_known_good_data() {
    let harness = Harness::new();
    let coordinator = harness.coordinator();
    assert_eq!(coordinator.refresh(true).wait().await, RefreshOutcome::Updated);
    let good = coordinator.state();

    harness.clock.advance(1_000);
    harness.backend.script_charts(None, Reply::Err(network_error));
    let handle = coordinator.refresh(true);
    assert_eq!(
        coordinator.state().fetch_state,
        FetchState::Refreshing,
        "data already shown, so no loading state"
    );
    assert!(matches!(handle.wait().await, RefreshOutcome::Failed(_)));

    let state = coordinator.state();
    assert_eq!(state.fetch_state, FetchState::Error);
    assert_eq!(state.stats, good.stats);
    assert_eq!(state.chart_data, good.chart_data);
    assert_eq!(state.last_updated, good.last_updated);
    assert!(state.stats_error.is_none());
    assert!(state.charts_error.is_some());
}

#[tokio::test]
async fn test_one_failed_request_fails_the_whole_refresh() {
    let harness = Harness::new();
    let coordinator = harness.coordinator();
    coordinator.refresh(true).wait().await;

    harness.backend.script_stats(None, Reply::Ok(stats(999, 99, 9)));
    harness.backend.script_charts(None, Reply::Err(network_error));
    let outcome = coordinator.refresh(false).wait().await;

    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    assert_eq!(
        coordinator.state().stats,
        default_snapshot(),
        "stats are not applied without charts"
    );
    assert_eq!(harness.cache().read().map(|e| e.stats), Some(default_snapshot()));
}

#[tokio::test]
async fn test_error_state_recovers_on_next_refresh() {
    let harness = Harness::new();
    harness.backend.script_stats(None, Reply::Err(network_error));
    harness.backend.script_charts(None, Reply::Err(network_error));

    let coordinator = harness.coordinator();
    coordinator.refresh(true).wait().await;
    let state = coordinator.state();
    assert_eq!(state.fetch_state, FetchState::Error);
    assert!(state.stats_error.is_some() && state.charts_error.is_some());

    let handle = coordinator.refresh(true);
    assert_eq!(coordinator.state().fetch_state, FetchState::Loading);
    assert_eq!(handle.wait().await, RefreshOutcome::Updated);

    let state = coordinator.state();
    assert_eq!(state.fetch_state, FetchState::Idle);
    assert!(state.stats_error.is_none());
    assert!(state.charts_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_timeout_turns_hung_request_into_error() {
    let harness = Harness::new();
    // Never opened
    let gate = Gate::new();
    harness.backend.script_stats(Some(gate), Reply::Ok(stats(1, 1, 1)));

    let coordinator = harness
        .coordinator()
        .with_refresh_timeout(Some(Duration::from_secs(5)));
    let outcome = coordinator.refresh(true).wait().await;

    assert_eq!(
        outcome,
        RefreshOutcome::Failed("The server took too long to respond.".to_string())
    );
    assert_eq!(coordinator.state().fetch_state, FetchState::Error);
}

#[tokio::test]
async fn test_storage_failure_does_not_fail_refresh() {
    let harness = Harness::new();
    let cache = CacheStore::new(Arc::new(MemoryStorage::disabled()), harness.clock.clone());
    let coordinator = FetchCoordinator::new(
        harness.backend.clone(),
        harness.backend.clone(),
        cache,
        harness.clock.clone(),
    );

    assert_eq!(coordinator.mount().wait().await, RefreshOutcome::Updated);
    assert_eq!(coordinator.state().stats, default_snapshot());
}

#[tokio::test]
async fn test_subscribers_see_each_transition() {
    let harness = Harness::new();
    let coordinator = harness.coordinator();
    let mut rx = coordinator.subscribe();

    let handle = coordinator.refresh(true);
    assert!(rx.has_changed().expect("sender alive"));
    assert_eq!(rx.borrow_and_update().fetch_state, FetchState::Loading);

    handle.wait().await;
    rx.changed().await.expect("sender alive");
    let state = rx.borrow_and_update().clone();
    assert_eq!(state.fetch_state, FetchState::Idle);
    assert_eq!(state.stats, default_snapshot());
}
