//! Reference-store scenarios spanning more than one call: the compare-and-swap
//! race a concurrent writer would hit, symbolic-ref resolution through `HEAD`,
//! and `dwim` shorthand lookup order.

use std::fs;

use covdata::errors::CovError;
use covdata::hash::Oid;
use covdata::internal::refs::{Head, Reference, RefStore};

fn store() -> (tempfile::TempDir, RefStore) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
    fs::create_dir_all(dir.path().join("refs/tags")).unwrap();
    let store = RefStore::new(dir.path());
    (dir, store)
}

#[test]
fn concurrent_writer_loses_the_cas_race() {
    let (_dir, refs) = store();
    let base = Oid::of(b"base");
    let mine = Oid::of(b"mine");
    let theirs = Oid::of(b"theirs");

    refs.create_direct("refs/heads/main", base).unwrap();

    // Someone else updates the ref between my read and my write.
    refs.create_matching("refs/heads/main", theirs, base).unwrap();

    // My compare-and-swap, still believing `base` is current, is rejected.
    let err = refs.create_matching("refs/heads/main", mine, base).unwrap_err();
    assert!(matches!(err, CovError::Modified(name) if name == "refs/heads/main"));

    // The ref still holds the value the other writer installed.
    assert_eq!(
        refs.lookup("refs/heads/main").unwrap(),
        Some(Reference::Direct(theirs))
    );
}

#[test]
fn creating_against_absent_ref_requires_zero_expected() {
    let (_dir, refs) = store();
    let oid = Oid::of(b"first");
    assert!(refs.create_matching("refs/heads/new", oid, Oid::zero()).is_ok());
    assert_eq!(
        refs.lookup("refs/heads/new").unwrap(),
        Some(Reference::Direct(oid))
    );
}

#[test]
fn head_follows_symbolic_chain_to_branch_tip() {
    let (_dir, refs) = store();
    let tip = Oid::of(b"tip");
    refs.create_direct("refs/heads/main", tip).unwrap();
    refs.create_symbolic("HEAD", "refs/heads/main").unwrap();

    let head = refs.current_head().unwrap();
    assert_eq!(
        head,
        Head {
            branch: Some("main".to_string()),
            tip: Some(tip),
            reference: "refs/heads/main".to_string(),
        }
    );
}

#[test]
fn detached_head_reports_no_branch() {
    let (_dir, refs) = store();
    let tip = Oid::of(b"detached");
    refs.create_direct("HEAD", tip).unwrap();
    let head = refs.current_head().unwrap();
    assert_eq!(head.branch, None);
    assert_eq!(head.tip, Some(tip));
}

#[test]
fn dwim_prefers_bare_name_then_refs_then_tags_then_heads() {
    let (_dir, refs) = store();
    let tag_oid = Oid::of(b"a-tag");
    let branch_oid = Oid::of(b"a-branch");
    refs.create_direct("refs/tags/v1", tag_oid).unwrap();
    refs.create_direct("refs/heads/v1", branch_oid).unwrap();

    let (resolved_name, reference) = refs.dwim("v1").unwrap().unwrap();
    assert_eq!(resolved_name, "refs/tags/v1");
    assert_eq!(reference, Reference::Direct(tag_oid));
}

#[test]
fn deleting_head_is_rejected() {
    let (_dir, refs) = store();
    refs.create_symbolic("HEAD", "refs/heads/main").unwrap();
    assert!(refs.delete("HEAD").is_err());
}

#[test]
fn iter_prefix_lists_branches_in_sorted_order() {
    let (_dir, refs) = store();
    refs.create_direct("refs/heads/zebra", Oid::of(b"z")).unwrap();
    refs.create_direct("refs/heads/alpha", Oid::of(b"a")).unwrap();
    let names: Vec<String> = refs
        .iter_prefix("refs/heads/")
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["refs/heads/alpha", "refs/heads/zebra"]);
}
