//! Concurrent-change detection and recovery across sessions.

use workset_core::{Modification, Persistable};
use workset_testkit::{test_session, test_store, Site};

#[test]
fn a_stale_update_fails_with_a_conflict() {
    let store = test_store();

    let writer = test_session(&store);
    let original = writer.register(Site::new("Berlin")).unwrap();
    writer.commit().unwrap();
    let id = original.read().store_id();

    // A second session loads the same row and commits an update first.
    let other = test_session(&store);
    let theirs = Site::load(&other, id).unwrap();
    Site::set_name(&other, &theirs, "Hamburg").unwrap();
    other.commit().unwrap();
    assert_eq!(store.row_version("Site", id), Some(2));

    // The first session still holds version 1; its update must fail.
    Site::set_name(&writer, &original, "Munich").unwrap();
    let err = writer.commit().unwrap_err();
    assert!(err.is_conflict());

    // Recovery rolled the session back to the other writer's state.
    assert!(!writer.is_closed());
    assert_eq!(writer.dirty_count(), 0);
    assert_eq!(original.read().name, "Hamburg");
    assert_eq!(original.read().meta().version(), 2);
    assert_eq!(original.read().modification(), Modification::Unmodified);
}

#[test]
fn the_session_is_usable_again_after_a_conflict() {
    let store = test_store();

    let writer = test_session(&store);
    let original = writer.register(Site::new("Berlin")).unwrap();
    writer.commit().unwrap();
    let id = original.read().store_id();

    let other = test_session(&store);
    let theirs = Site::load(&other, id).unwrap();
    Site::set_name(&other, &theirs, "Hamburg").unwrap();
    other.commit().unwrap();

    Site::set_name(&writer, &original, "Munich").unwrap();
    assert!(writer.commit().unwrap_err().is_conflict());

    // After recovery the object carries the fresh version; retrying the
    // same intent now succeeds.
    Site::set_name(&writer, &original, "Munich").unwrap();
    writer.commit().unwrap();
    assert_eq!(store.row_version("Site", id), Some(3));

    let reader = test_session(&store);
    let latest = Site::load(&reader, id).unwrap();
    assert_eq!(latest.read().name, "Munich");
}

#[test]
fn a_delete_raced_by_an_update_conflicts() {
    let store = test_store();

    let writer = test_session(&store);
    let original = writer.register(Site::new("Berlin")).unwrap();
    writer.commit().unwrap();
    let id = original.read().store_id();

    let other = test_session(&store);
    let theirs = Site::load(&other, id).unwrap();
    Site::set_name(&other, &theirs, "Hamburg").unwrap();
    other.commit().unwrap();

    writer.delete(&original.erased()).unwrap();
    let err = writer.commit().unwrap_err();
    assert!(err.is_conflict());

    // The row survived. The delete left the cycle at dispatch, so
    // recovery does not revive the object; it stays deleted in memory.
    assert_eq!(store.row_count(), 1);
    assert!(!writer.is_in_use(original.uid()));
    assert_eq!(original.read().modification(), Modification::Deleted);
    assert_eq!(original.read().name, "Berlin");
    assert!(!writer.is_closed());
}

#[test]
fn an_update_raced_by_a_delete_conflicts() {
    let store = test_store();

    let writer = test_session(&store);
    let original = writer.register(Site::new("Berlin")).unwrap();
    writer.commit().unwrap();
    let id = original.read().store_id();

    let other = test_session(&store);
    let theirs = Site::load(&other, id).unwrap();
    other.delete(&theirs.erased()).unwrap();
    other.commit().unwrap();
    assert_eq!(store.row_count(), 0);

    Site::set_name(&writer, &original, "Munich").unwrap();
    let err = writer.commit().unwrap_err();
    assert!(err.is_conflict());
    // Rollback cannot refresh a vanished row, so the session closed
    // itself rather than stay inconsistent.
    assert!(writer.is_closed());
}
