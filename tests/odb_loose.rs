//! Loose-object store behaviour that only shows up once many objects share a
//! fan-out directory: prefix resolution, ambiguity, and reads of objects
//! that were never written.

use covdata::errors::CovError;
use covdata::hash::Oid;
use covdata::internal::codec::line_coverage::{LineCoverage, LineEntry};
use covdata::internal::codec::CovObject;
use covdata::internal::odb::LooseObjectStore;

fn store() -> (tempfile::TempDir, LooseObjectStore) {
    let dir = tempfile::tempdir().unwrap();
    let odb = LooseObjectStore::new(dir.path().join("objects").join("coverage"));
    (dir, odb)
}

fn object(seed: &[u8]) -> CovObject {
    CovObject::LineCoverage(LineCoverage::new(vec![LineEntry::Hits {
        count: seed.len() as u32,
    }]))
}

#[test]
fn unique_prefix_resolves_to_its_object() {
    let (_dir, odb) = store();
    let oid = odb.write(&object(b"alpha")).unwrap();
    let prefix = &oid.to_string()[..8];
    assert_eq!(odb.resolve_prefix(prefix).unwrap(), oid);
}

#[test]
fn missing_prefix_is_not_found() {
    let (_dir, odb) = store();
    odb.write(&object(b"alpha")).unwrap();
    let err = odb.resolve_prefix("ffffffff").unwrap_err();
    assert!(matches!(err, CovError::NotFound(_)));
}

#[test]
fn reading_an_object_never_written_fails() {
    let (_dir, odb) = store();
    let oid = Oid::of(b"never written");
    assert!(odb.read(&oid).is_err());
    assert!(!odb.contains(&oid));
}

#[test]
fn two_byte_prefix_shared_by_many_objects_is_ambiguous() {
    let (_dir, odb) = store();
    let mut oids = Vec::new();
    // Keep writing distinct objects until two land in the same two-hex-char
    // fan-out bucket -- guaranteed well before a few hundred tries.
    let shared_dir = loop {
        let seed = format!("seed-{}", oids.len());
        let oid = odb.write(&object(seed.as_bytes())).unwrap();
        let (dir, _) = oid.fanout();
        if oids.iter().any(|(_, d): &(Oid, String)| *d == dir) {
            break dir;
        }
        oids.push((oid, dir));
        assert!(oids.len() < 10_000, "never found a colliding fan-out bucket");
    };
    let err = odb.resolve_prefix(&shared_dir).unwrap_err();
    assert!(matches!(err, CovError::AmbiguousPrefix(_, n) if n >= 2));
}

#[test]
fn short_prefix_is_rejected_before_touching_disk() {
    let (_dir, odb) = store();
    assert!(matches!(
        odb.resolve_prefix("a"),
        Err(CovError::InvalidName(_))
    ));
}
