//! Tests for advisory file locks

use std::path::PathBuf;

use atlasenv::lock::LockTable;
use atlasenv::EnvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_lock() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("LOCK");
    (temp_dir, path)
}

// =============================================================================
// Table Tests
// =============================================================================

#[test]
fn test_insert_reports_duplicates() {
    let table = LockTable::new();
    let path = PathBuf::from("/db/LOCK");

    assert!(table.insert(&path));
    assert!(!table.insert(&path));
    assert!(table.contains(&path));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_remove_absent_is_noop() {
    let table = LockTable::new();
    table.remove(&PathBuf::from("/db/LOCK"));
    assert!(table.is_empty());

    table.insert(&PathBuf::from("/db/LOCK"));
    table.remove(&PathBuf::from("/db/LOCK"));
    assert!(table.is_empty());
}

// =============================================================================
// Lock / Unlock Tests
// =============================================================================

#[test]
fn test_lock_creates_lock_file() {
    let (_temp, path) = setup_temp_lock();
    let table = LockTable::new();

    let lock = table.lock_file(&path).unwrap();
    assert!(path.exists());
    assert_eq!(lock.path(), path.as_path());
    assert!(table.contains(&path));
}

#[test]
fn test_second_lock_in_process_fails() {
    let (_temp, path) = setup_temp_lock();
    let table = LockTable::new();

    let _lock = table.lock_file(&path).unwrap();
    let err = table.lock_file(&path).unwrap_err();
    assert!(matches!(err, EnvError::AlreadyLocked { .. }));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_unlock_then_relock() {
    let (_temp, path) = setup_temp_lock();
    let table = LockTable::new();

    let lock = table.lock_file(&path).unwrap();
    table.unlock_file(lock).unwrap();
    assert!(!table.contains(&path));

    let lock = table.lock_file(&path).unwrap();
    table.unlock_file(lock).unwrap();
}

#[test]
fn test_locks_are_per_path() {
    let temp = TempDir::new().unwrap();
    let table = LockTable::new();

    let a = table.lock_file(&temp.path().join("a.LOCK")).unwrap();
    let b = table.lock_file(&temp.path().join("b.LOCK")).unwrap();
    assert_eq!(table.len(), 2);

    table.unlock_file(a).unwrap();
    assert_eq!(table.len(), 1);
    table.unlock_file(b).unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_lock_in_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    let table = LockTable::new();
    let path = temp.path().join("no-such-dir").join("LOCK");

    assert!(table.lock_file(&path).unwrap_err().is_not_found());
    assert!(table.is_empty());
}

#[test]
fn test_dropped_lock_can_be_relocked() {
    let (_temp, path) = setup_temp_lock();
    let table = LockTable::new();

    {
        let _lock = table.lock_file(&path).unwrap();
        assert!(table.contains(&path));
    }
    assert!(!table.contains(&path));

    let lock = table.lock_file(&path).unwrap();
    table.unlock_file(lock).unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_dropped_lock_leaves_other_paths_held() {
    let temp = TempDir::new().unwrap();
    let table = LockTable::new();
    let a = temp.path().join("a.LOCK");
    let b = temp.path().join("b.LOCK");

    let held = table.lock_file(&a).unwrap();
    drop(table.lock_file(&b).unwrap());

    assert!(table.contains(&a));
    assert!(!table.contains(&b));
    assert!(matches!(
        table.lock_file(&a),
        Err(EnvError::AlreadyLocked { .. })
    ));
    table.unlock_file(held).unwrap();
}
