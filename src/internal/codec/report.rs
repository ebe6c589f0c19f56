//! `Report` object: the top of the object graph, linking a `Files` snapshot to
//! a Git commit and summarising the `Build`s that contributed to it
//! (`spec.md` §3, §6).

use serde_json::{Map, Value};

use crate::errors::CovError;
use crate::hash::Oid;
use crate::internal::codec::{
    pad4, propset, read_envelope, validate_layout, write_envelope, CoverageStats, ObjectKind,
    StringPoolBuilder, StringPoolView, ENVELOPE_LEN, STATS_SIZE,
};
use crate::utils::Cursor;

const BUILD_SUMMARY_STRIDE_WORDS: u32 = 13; // build_oid(5) + propset_offset(1) + stats(7)
const BUILD_SUMMARY_STRIDE_BYTES: usize = BUILD_SUMMARY_STRIDE_WORDS as usize * 4;

const COMMIT_VIEW_LEN: usize = 4 * 6 + 20 + 8;
const HEADER_LEN: usize =
    ENVELOPE_LEN + 20 + 20 + 12 + 8 + COMMIT_VIEW_LEN + STATS_SIZE + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitView {
    pub branch: String,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    pub commit_id: Oid,
    pub commit_time_utc: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub build_oid: Oid,
    pub propset_json: String,
    pub stats: CoverageStats,
}

impl BuildSummary {
    /// Decode `propset_json` into its key/value pairs.
    pub fn properties(&self) -> Result<Map<String, Value>, CovError> {
        propset::parse(&self.propset_json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub parent_oid: Oid,
    pub file_list_oid: Oid,
    pub add_time_utc: i64,
    pub commit: CommitView,
    pub stats: CoverageStats,
    pub builds: Vec<BuildSummary>,
}

impl Report {
    pub fn load(data: &[u8]) -> Result<Report, CovError> {
        let (envelope, mut cur) = read_envelope(data)?;
        if envelope.kind != ObjectKind::Report {
            return Err(CovError::syntax("report", "magic mismatch"));
        }
        let err = |reason: &str| CovError::syntax("report header", reason.to_string());

        let parent_oid = cur.oid().map_err(|_| err("truncated header"))?;
        let file_list_oid = cur.oid().map_err(|_| err("truncated header"))?;
        let builds_offset = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;
        let builds_stride = cur.u32().map_err(|_| err("truncated header"))?;
        let builds_count = cur.u32().map_err(|_| err("truncated header"))? as usize;
        let add_time_utc = cur.i64().map_err(|_| err("truncated header"))?;

        let branch_off = cur.u32().map_err(|_| err("truncated header"))?;
        let author_name_off = cur.u32().map_err(|_| err("truncated header"))?;
        let author_email_off = cur.u32().map_err(|_| err("truncated header"))?;
        let committer_name_off = cur.u32().map_err(|_| err("truncated header"))?;
        let committer_email_off = cur.u32().map_err(|_| err("truncated header"))?;
        let message_off = cur.u32().map_err(|_| err("truncated header"))?;
        let commit_id = cur.oid().map_err(|_| err("truncated header"))?;
        let commit_time_utc = cur.i64().map_err(|_| err("truncated header"))?;

        let stats = CoverageStats::read(&mut cur)?;

        let strings_offset = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;
        let strings_size = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;

        if builds_count > 0 && builds_stride < BUILD_SUMMARY_STRIDE_WORDS {
            return Err(CovError::syntax(
                "report builds",
                "entry stride smaller than declared minimum",
            ));
        }
        let stride_bytes = builds_stride as usize * 4;

        validate_layout(
            data.len(),
            HEADER_LEN,
            builds_offset,
            stride_bytes * builds_count,
            strings_offset,
            strings_size,
        )?;

        let strings = StringPoolView::new(
            cur.slice(strings_offset, strings_size)
                .map_err(|_| err("strings region out of bounds"))?,
        );

        let commit = CommitView {
            branch: strings.get(branch_off)?.to_string(),
            author: Signature {
                name: strings.get(author_name_off)?.to_string(),
                email: strings.get(author_email_off)?.to_string(),
            },
            committer: Signature {
                name: strings.get(committer_name_off)?.to_string(),
                email: strings.get(committer_email_off)?.to_string(),
            },
            message: strings.get(message_off)?.to_string(),
            commit_id,
            commit_time_utc,
        };

        let mut builds = Vec::with_capacity(builds_count);
        for i in 0..builds_count {
            let entry_bytes = cur
                .slice(builds_offset + i * stride_bytes, BUILD_SUMMARY_STRIDE_BYTES)
                .map_err(|_| err("builds region out of bounds"))?;
            let mut bcur = Cursor::new(entry_bytes);
            let truncated = || CovError::syntax("report build summary", "truncated");
            let build_oid = bcur.oid().map_err(|_| truncated())?;
            let propset_off = bcur.u32().map_err(|_| truncated())?;
            let build_stats = CoverageStats::read(&mut bcur)?;
            builds.push(BuildSummary {
                build_oid,
                propset_json: strings.get(propset_off)?.to_string(),
                stats: build_stats,
            });
        }

        Ok(Report {
            parent_oid,
            file_list_oid,
            add_time_utc,
            commit,
            stats,
            builds,
        })
    }

    pub fn store(&self) -> Vec<u8> {
        let mut pool = StringPoolBuilder::new();
        let branch_off = pool.intern(&self.commit.branch);
        let author_name_off = pool.intern(&self.commit.author.name);
        let author_email_off = pool.intern(&self.commit.author.email);
        let committer_name_off = pool.intern(&self.commit.committer.name);
        let committer_email_off = pool.intern(&self.commit.committer.email);
        let message_off = pool.intern(&self.commit.message);

        let mut builds_bytes = Vec::with_capacity(self.builds.len() * BUILD_SUMMARY_STRIDE_BYTES);
        for build in &self.builds {
            let propset_off = pool.intern(&build.propset_json);
            builds_bytes.extend_from_slice(build.build_oid.as_ref());
            builds_bytes.extend_from_slice(&propset_off.to_le_bytes());
            build.stats.write(&mut builds_bytes);
        }

        let builds_offset_words = HEADER_LEN as u32 / 4;
        let strings_offset_bytes = HEADER_LEN + builds_bytes.len();
        let mut strings_bytes = pool.into_bytes();
        pad4(&mut strings_bytes);

        let mut out = Vec::with_capacity(strings_offset_bytes + strings_bytes.len());
        write_envelope(&mut out, ObjectKind::Report);
        out.extend_from_slice(self.parent_oid.as_ref());
        out.extend_from_slice(self.file_list_oid.as_ref());
        out.extend_from_slice(&builds_offset_words.to_le_bytes());
        out.extend_from_slice(&BUILD_SUMMARY_STRIDE_WORDS.to_le_bytes());
        out.extend_from_slice(&(self.builds.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.add_time_utc.to_le_bytes());
        out.extend_from_slice(&branch_off.to_le_bytes());
        out.extend_from_slice(&author_name_off.to_le_bytes());
        out.extend_from_slice(&author_email_off.to_le_bytes());
        out.extend_from_slice(&committer_name_off.to_le_bytes());
        out.extend_from_slice(&committer_email_off.to_le_bytes());
        out.extend_from_slice(&message_off.to_le_bytes());
        out.extend_from_slice(self.commit.commit_id.as_ref());
        out.extend_from_slice(&self.commit.commit_time_utc.to_le_bytes());
        self.stats.write(&mut out);
        out.extend_from_slice(&((strings_offset_bytes / 4) as u32).to_le_bytes());
        out.extend_from_slice(&((strings_bytes.len() / 4) as u32).to_le_bytes());
        out.extend_from_slice(&builds_bytes);
        out.extend_from_slice(&strings_bytes);
        out
    }

    /// Check the aggregate-stats invariant: `stats == sum(builds[].stats)`
    /// (`spec.md` §3, §8).
    pub fn stats_match_builds(&self) -> bool {
        let summed = self
            .builds
            .iter()
            .fold(CoverageStats::default(), |acc, b| acc.combine(&b.stats));
        summed == self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::codec::Pair;

    fn sample() -> Report {
        let stats = CoverageStats {
            lines_total: 1000,
            lines: Pair {
                relevant: 900,
                visited: 850,
            },
            functions: Pair {
                relevant: 40,
                visited: 38,
            },
            branches: Pair {
                relevant: 120,
                visited: 100,
            },
        };
        Report {
            parent_oid: Oid::zero(),
            file_list_oid: Oid::of(b"files"),
            add_time_utc: 1_700_000_100,
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
                message: "Add coverage for the analytical engine".to_string(),
                commit_id: Oid::of(b"commit"),
                commit_time_utc: 1_700_000_000,
            },
            stats,
            builds: vec![BuildSummary {
                build_oid: Oid::of(b"build-1"),
                propset_json: "\"os\":\"linux\"".to_string(),
                stats,
            }],
        }
    }

    #[test]
    fn round_trips() {
        let report = sample();
        let bytes = report.store();
        assert_eq!(Report::load(&bytes).unwrap(), report);
    }

    #[test]
    fn stats_match_builds_holds_for_single_build() {
        assert!(sample().stats_match_builds());
    }

    #[test]
    fn report_with_no_builds_round_trips() {
        let mut report = sample();
        report.builds.clear();
        let bytes = report.store();
        assert_eq!(Report::load(&bytes).unwrap(), report);
    }

    #[test]
    fn stats_mismatch_is_detected() {
        let mut report = sample();
        report.stats.lines.visited += 1;
        assert!(!report.stats_match_builds());
    }

    #[test]
    fn shared_strings_across_commit_and_builds_dedupe() {
        let mut report = sample();
        report.builds.push(BuildSummary {
            build_oid: Oid::of(b"build-2"),
            propset_json: "\"os\":\"linux\"".to_string(),
            stats: report.stats,
        });
        let bytes = report.store();
        let back = Report::load(&bytes).unwrap();
        assert_eq!(back.builds[0].propset_json, back.builds[1].propset_json);
    }

    #[test]
    fn build_summary_properties_decode() {
        let report = sample();
        let props = report.builds[0].properties().unwrap();
        assert_eq!(props.get("os").unwrap(), "linux");
    }
}
