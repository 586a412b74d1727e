//! Tests for Transaction staging rules

use std::path::PathBuf;

use atlasenv::heap::{ObjectKind, Pool, PoolLayout, PoolOptions, PoolRef};
use atlasenv::EnvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_pool(layout: PoolLayout) -> (TempDir, Pool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = Pool::create(&temp_dir.path().join("pool"), layout, &PoolOptions::default()).unwrap();
    (temp_dir, pool)
}

fn assert_invalid_reference<T: std::fmt::Debug>(result: atlasenv::Result<T>) {
    match result {
        Err(EnvError::InvalidReference { .. }) => {}
        other => panic!("expected invalid reference, got {:?}", other),
    }
}

// =============================================================================
// Allocate / Free Tests
// =============================================================================

#[test]
fn test_second_root_is_refused() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    assert_invalid_reference(pool.transaction(|tx| tx.allocate(ObjectKind::Root)));
}

#[test]
fn test_root_cannot_be_freed() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    let root = pool.root();
    assert_invalid_reference(pool.transaction(|tx| tx.free(root)));
}

#[test]
fn test_linked_child_cannot_be_freed() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    let root = pool.root();

    let content = pool
        .transaction(|tx| {
            let content = tx.allocate(ObjectKind::Bytes)?;
            tx.set_child(root, Some(content))?;
            Ok(content)
        })
        .unwrap();

    assert_invalid_reference(pool.transaction(|tx| tx.free(content)));

    // Unlinked first, it can go
    pool.transaction(|tx| {
        tx.set_child(root, None)?;
        tx.free(content)
    })
    .unwrap();
    assert_eq!(pool.child(root).unwrap(), None);
}

#[test]
fn test_freed_object_is_gone_within_transaction() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    assert_invalid_reference(pool.transaction(|tx| {
        let scratch = tx.allocate(ObjectKind::Bytes)?;
        tx.free(scratch)?;
        tx.append(scratch, b"late")
    }));
}

#[test]
fn test_allocated_ids_are_not_reused() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    let first = pool
        .transaction(|tx| {
            let obj = tx.allocate(ObjectKind::Bytes)?;
            tx.free(obj)?;
            Ok(obj)
        })
        .unwrap();
    let second = pool.transaction(|tx| tx.allocate(ObjectKind::Bytes)).unwrap();
    assert!(second.id() > first.id());
}

// =============================================================================
// Kind Checking Tests
// =============================================================================

#[test]
fn test_append_requires_bytes() {
    let (_temp, mut pool) = setup_pool(PoolLayout::Directory);
    let root = pool.root();
    assert_invalid_reference(pool.transaction(|tx| tx.append(root, b"x")));

    let set = pool.transaction(|tx| tx.allocate(ObjectKind::RefSet)).unwrap();
    assert_invalid_reference(pool.transaction(|tx| tx.append(set, b"x")));
}

#[test]
fn test_push_ref_requires_ref_set() {
    let (_temp, mut pool) = setup_pool(PoolLayout::Directory);
    let root = pool.root();
    let entry = PoolRef {
        path: PathBuf::from("db/000003.log"),
        pool_id: 1,
        object: root,
    };

    let bytes = pool.transaction(|tx| tx.allocate(ObjectKind::Bytes)).unwrap();
    assert_invalid_reference(pool.transaction(|tx| tx.push_ref(bytes, entry.clone())));

    let set = pool.transaction(|tx| tx.allocate(ObjectKind::RefSet)).unwrap();
    pool.transaction(|tx| tx.push_ref(set, entry.clone())).unwrap();
    assert_eq!(pool.refs(set).unwrap(), &[entry]);
}

#[test]
fn test_root_cannot_be_a_child() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    let root = pool.root();
    assert_invalid_reference(pool.transaction(|tx| tx.set_child(root, Some(root))));
}

// =============================================================================
// Staged View Tests
// =============================================================================

#[test]
fn test_child_sees_staged_link() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    let root = pool.root();

    pool.transaction(|tx| {
        assert_eq!(tx.root(), Some(root));
        assert_eq!(tx.child(root)?, None);

        let content = tx.allocate(ObjectKind::Bytes)?;
        tx.set_child(root, Some(content))?;
        assert_eq!(tx.child(root)?, Some(content));
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_empty_append_stages_nothing() {
    let (_temp, mut pool) = setup_pool(PoolLayout::File);
    let content = pool.transaction(|tx| tx.allocate(ObjectKind::Bytes)).unwrap();
    let used = pool.used_bytes();

    pool.transaction(|tx| {
        tx.append(content, b"")?;
        assert!(tx.is_empty());
        Ok(())
    })
    .unwrap();
    assert_eq!(pool.used_bytes(), used);
}
