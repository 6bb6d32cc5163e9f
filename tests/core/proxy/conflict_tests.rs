// ConflictResolver determinism and snapshot handling

use proxywatch::core::proxy::{ConflictResolver, SyncableState, Winner};

#[test]
fn test_resolution_is_deterministic() {
    let resolver = ConflictResolver::new();
    let local = SyncableState::new(vec![1, 2, 3], "window-1", 4).with_timestamp(1_000);
    let remote = SyncableState::new(vec![9], "window-2", 2).with_timestamp(999);

    let first = resolver.resolve(&local, &remote);
    for _ in 0..10 {
        assert_eq!(resolver.resolve(&local, &remote), first);
    }
    assert_eq!(first.winner, Winner::Local);
    assert_eq!(first.resolved_state, local);
    assert!(first.is_conflict());
}

#[test]
fn test_resolution_never_merges_fields() {
    let resolver = ConflictResolver::new();
    let local = SyncableState::new("local".to_string(), "a", 7).with_timestamp(10);
    let remote = SyncableState::new("remote".to_string(), "b", 1).with_timestamp(20);

    let resolution = resolver.resolve(&local, &remote);

    assert_eq!(resolution.winner, Winner::Remote);
    assert_eq!(resolution.resolved_state.version, 1);
    assert_eq!(resolution.resolved_state.instance_id, "b");
    let details = resolution.conflict_details.unwrap();
    assert_eq!(details.local_instance, "a");
    assert_eq!(details.remote_timestamp, 20);
}

#[test]
fn test_new_snapshot_is_stamped_now() {
    let before = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    let state = SyncableState::new((), "a", 1);

    assert!(state.timestamp >= before);
}
