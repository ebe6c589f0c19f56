//! Revision parsing against a real `RefStore` + `LooseObjectStore` pair
//! instead of the unit tests' in-memory `Chain` fixture: `parent_of` reads an
//! actual stored `Report`, and `peel_name` walks real ref files.

use covdata::errors::CovError;
use covdata::hash::Oid;
use covdata::internal::codec::report::{CommitView, Report, Signature};
use covdata::internal::codec::{CovObject, CoverageStats, UNINITIALISED};
use covdata::internal::odb::LooseObjectStore;
use covdata::internal::refs::RefStore;
use covdata::internal::revparse::{parse, RevContext, RevSpec};

struct RepoContext {
    refs: RefStore,
    odb: LooseObjectStore,
}

impl RevContext for RepoContext {
    fn peel_name(&self, name: &str) -> Result<Option<Oid>, CovError> {
        match self.refs.dwim(name)? {
            Some((resolved, _)) => self.refs.peel_target(&resolved),
            None => Ok(None),
        }
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<Oid, CovError> {
        self.odb.resolve_prefix(prefix)
    }

    fn parent_of(&self, oid: Oid) -> Result<Option<Oid>, CovError> {
        match self.odb.read(&oid)? {
            CovObject::Report(report) if report.parent_oid.is_zero() => Ok(None),
            CovObject::Report(report) => Ok(Some(report.parent_oid)),
            _ => Err(CovError::InvalidName(format!("{oid} is not a report"))),
        }
    }
}

fn report_at(parent_oid: Oid, add_time_utc: i64) -> Report {
    Report {
        parent_oid,
        file_list_oid: Oid::of(b"files"),
        add_time_utc,
        commit: CommitView {
            branch: "main".to_string(),
            author: Signature {
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            committer: Signature {
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            message: format!("commit at {add_time_utc}"),
            commit_id: Oid::of(format!("commit-{add_time_utc}").as_bytes()),
            commit_time_utc: add_time_utc,
        },
        stats: CoverageStats {
            lines_total: 10,
            lines: covdata::internal::codec::Pair {
                relevant: 10,
                visited: 5,
            },
            functions: UNINITIALISED,
            branches: UNINITIALISED,
        },
        builds: vec![],
    }
}

fn build_chain() -> (tempfile::TempDir, RepoContext, Oid, Oid, Oid) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
    let refs = RefStore::new(dir.path());
    let odb = LooseObjectStore::new(dir.path().join("objects").join("coverage"));

    let root_oid = odb.write(&CovObject::Report(report_at(Oid::zero(), 1))).unwrap();
    let mid_oid = odb.write(&CovObject::Report(report_at(root_oid, 2))).unwrap();
    let tip_oid = odb.write(&CovObject::Report(report_at(mid_oid, 3))).unwrap();

    refs.create_direct("refs/heads/main", tip_oid).unwrap();
    refs.create_symbolic("HEAD", "refs/heads/main").unwrap();

    (dir, RepoContext { refs, odb }, root_oid, mid_oid, tip_oid)
}

#[test]
fn head_resolves_through_symbolic_ref_to_tip_report() {
    let (_dir, ctx, _root, _mid, tip) = build_chain();
    assert_eq!(parse("HEAD", &ctx).unwrap(), RevSpec::Single(tip));
}

#[test]
fn caret_walks_one_real_stored_parent() {
    let (_dir, ctx, _root, mid, _tip) = build_chain();
    assert_eq!(parse("HEAD^", &ctx).unwrap(), RevSpec::Single(mid));
}

#[test]
fn tilde_two_reaches_the_root_report() {
    let (_dir, ctx, root, _mid, _tip) = build_chain();
    assert_eq!(parse("HEAD~2", &ctx).unwrap(), RevSpec::Single(root));
}

#[test]
fn root_report_has_no_parent() {
    let (_dir, ctx, root, ..) = build_chain();
    assert!(parse(&format!("{root}^"), &ctx).is_err());
}

#[test]
fn range_resolves_both_endpoints_independently() {
    let (_dir, ctx, root, _mid, tip) = build_chain();
    assert_eq!(
        parse(&format!("{root}..HEAD"), &ctx).unwrap(),
        RevSpec::Range(root, tip)
    );
}

#[test]
fn abbreviated_hex_prefix_resolves_via_the_object_store() {
    let (_dir, ctx, root, ..) = build_chain();
    let prefix = &root.to_string()[..10];
    assert_eq!(parse(prefix, &ctx).unwrap(), RevSpec::Single(root));
}

#[test]
fn unknown_branch_name_is_not_found() {
    let (_dir, ctx, ..) = build_chain();
    assert!(parse("no-such-branch", &ctx).is_err());
}
