//! Tests for DurableFile over a real pool

use atlasenv::file::{DurableAppend, DurableFile, DurableRead};
use atlasenv::heap::{Pool, PoolLayout, PoolOptions};
use atlasenv::EnvError;

use crate::{data_path, durable_file_with, pattern, setup_manager};

#[test]
fn test_fresh_pool_reads_empty() {
    let (temp, manager) = setup_manager();
    let path = data_path(&temp, "000001.log");
    let (pool, created) = manager.open_or_create(&path).unwrap();
    assert!(created);

    let file = DurableFile::open_existing(pool, 1024).unwrap();
    assert_eq!(file.len().unwrap(), 0);
    assert!(file.is_empty().unwrap());
    assert_eq!(file.read_at(0, &mut [0u8; 8]).unwrap(), 0);
}

#[test]
fn test_append_without_content_fails() {
    let (temp, manager) = setup_manager();
    let (pool, _) = manager.open_or_create(&data_path(&temp, "a")).unwrap();

    let file = DurableFile::open_existing(pool, 1024).unwrap();
    assert!(matches!(
        file.append(b"x"),
        Err(EnvError::InvalidReference { .. })
    ));
}

#[test]
fn test_append_commits_at_most_max_commit_bytes() {
    let (temp, manager) = setup_manager();
    let (pool, _) = manager.open_or_create(&data_path(&temp, "a")).unwrap();

    let file = DurableFile::open_for_append(pool, 4).unwrap();
    assert_eq!(file.append(b"0123456789").unwrap(), 4);
    assert_eq!(file.append(b"456789").unwrap(), 4);
    assert_eq!(file.len().unwrap(), 8);

    let mut buf = [0u8; 16];
    let n = file.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"01234567");
}

#[test]
fn test_open_for_append_continues_content() {
    let (temp, manager) = setup_manager();
    let path = data_path(&temp, "a");
    drop(durable_file_with(&manager, &path, b"hello "));

    let (pool, created) = manager.open_or_create(&path).unwrap();
    assert!(!created);
    let file = DurableFile::open_for_append(pool, 1024).unwrap();
    file.append(b"world").unwrap();

    let mut buf = [0u8; 32];
    let n = file.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"hello world");
}

#[test]
fn test_open_truncated_replaces_content() {
    let (temp, manager) = setup_manager();
    let path = data_path(&temp, "a");
    let old = durable_file_with(&manager, &path, &pattern(100));

    let fresh = DurableFile::open_truncated(old.pool().clone(), 1024).unwrap();
    assert_eq!(fresh.len().unwrap(), 0);
    fresh.append(b"new").unwrap();
    drop(old);
    drop(fresh);

    // Only the new content and the root are left in the pool
    let pool = Pool::open(&path, PoolLayout::File, &PoolOptions::default()).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.object_count, 2);
    let content = stats.root_child.unwrap();
    assert_eq!(pool.bytes(content).unwrap(), b"new");
}

#[test]
fn test_read_at_clamps_to_content() {
    let (temp, manager) = setup_manager();
    let content = pattern(50);
    let file = durable_file_with(&manager, &data_path(&temp, "a"), &content);

    let mut buf = [0u8; 20];
    assert_eq!(file.read_at(40, &mut buf).unwrap(), 10);
    assert_eq!(&buf[..10], &content[40..]);
    assert_eq!(file.read_at(50, &mut buf).unwrap(), 0);
    assert_eq!(file.read_at(1000, &mut buf).unwrap(), 0);
}

#[test]
fn test_content_survives_reopen() {
    let (temp, manager) = setup_manager();
    let path = data_path(&temp, "a");
    let content = pattern(3000);
    {
        let file = durable_file_with(&manager, &path, &content);
        file.sync().unwrap();
    }
    assert!(!manager.is_open(&path));

    let file = DurableFile::open_existing(manager.open_existing(&path).unwrap(), 1024).unwrap();
    let mut buf = vec![0u8; 4000];
    let n = file.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf[..n], &content[..]);
}
