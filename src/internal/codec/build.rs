//! `Build` object: a single coverage upload, `{file_list_oid, add_time_utc,
//! propset_json, stats}` (`spec.md` §3, §6).

use serde_json::{Map, Value};

use crate::errors::CovError;
use crate::hash::Oid;
use crate::internal::codec::{
    pad4, propset, read_envelope, validate_layout, write_envelope, CoverageStats, ObjectKind,
    StringPoolBuilder, StringPoolView, ENVELOPE_LEN, STATS_SIZE,
};

const HEADER_LEN: usize = ENVELOPE_LEN + 20 + 8 + 4 + STATS_SIZE + 4 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub file_list_oid: Oid,
    pub add_time_utc: i64,
    pub propset_json: String,
    pub stats: CoverageStats,
}

impl Build {
    pub fn load(data: &[u8]) -> Result<Build, CovError> {
        let (envelope, mut cur) = read_envelope(data)?;
        if envelope.kind != ObjectKind::Build {
            return Err(CovError::syntax("build", "magic mismatch"));
        }
        let err = |reason: &str| CovError::syntax("build header", reason.to_string());
        let file_list_oid = cur.oid().map_err(|_| err("truncated header"))?;
        let add_time_utc = cur.i64().map_err(|_| err("truncated header"))?;
        let propset_offset = cur.u32().map_err(|_| err("truncated header"))?;
        let stats = CoverageStats::read(&mut cur)?;
        let strings_offset = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;
        let strings_size = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;

        validate_layout(data.len(), HEADER_LEN, HEADER_LEN, 0, strings_offset, strings_size)?;

        let strings = StringPoolView::new(
            cur.slice(strings_offset, strings_size)
                .map_err(|_| err("strings region out of bounds"))?,
        );
        let propset_json = strings.get(propset_offset)?.to_string();

        Ok(Build {
            file_list_oid,
            add_time_utc,
            propset_json,
            stats,
        })
    }

    pub fn store(&self) -> Vec<u8> {
        let mut pool = StringPoolBuilder::new();
        let propset_offset = pool.intern(&self.propset_json);
        let mut strings_bytes = pool.into_bytes();
        pad4(&mut strings_bytes);

        let mut out = Vec::with_capacity(HEADER_LEN + strings_bytes.len());
        write_envelope(&mut out, ObjectKind::Build);
        out.extend_from_slice(self.file_list_oid.as_ref());
        out.extend_from_slice(&self.add_time_utc.to_le_bytes());
        out.extend_from_slice(&propset_offset.to_le_bytes());
        self.stats.write(&mut out);
        out.extend_from_slice(&((HEADER_LEN / 4) as u32).to_le_bytes());
        out.extend_from_slice(&((strings_bytes.len() / 4) as u32).to_le_bytes());
        out.extend_from_slice(&strings_bytes);
        out
    }

    /// Decode `propset_json` into its key/value pairs.
    pub fn properties(&self) -> Result<Map<String, Value>, CovError> {
        propset::parse(&self.propset_json)
    }

    /// Replace `propset_json` with the normalised form of `entries`.
    pub fn set_properties(&mut self, entries: Map<String, Value>) {
        self.propset_json = propset::normalize(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::codec::Pair;

    fn sample() -> Build {
        Build {
            file_list_oid: Oid::of(b"files"),
            add_time_utc: 1_700_000_000,
            propset_json: "\"branch\":\"main\",\"os\":\"linux\"".to_string(),
            stats: CoverageStats {
                lines_total: 500,
                lines: Pair {
                    relevant: 420,
                    visited: 400,
                },
                functions: Pair {
                    relevant: 30,
                    visited: 28,
                },
                branches: Pair {
                    relevant: 60,
                    visited: 50,
                },
            },
        }
    }

    #[test]
    fn round_trips() {
        let build = sample();
        let bytes = build.store();
        assert_eq!(Build::load(&bytes).unwrap(), build);
    }

    #[test]
    fn empty_propset_round_trips() {
        let mut build = sample();
        build.propset_json = String::new();
        let bytes = build.store();
        assert_eq!(Build::load(&bytes).unwrap(), build);
    }

    #[test]
    fn truncated_object_is_syntax_error() {
        let bytes = sample().store();
        assert!(Build::load(&bytes[..HEADER_LEN - 4]).is_err());
    }

    #[test]
    fn properties_decodes_propset_json() {
        let build = sample();
        let props = build.properties().unwrap();
        assert_eq!(props.get("branch").unwrap(), "main");
        assert_eq!(props.get("os").unwrap(), "linux");
    }

    #[test]
    fn set_properties_writes_normalised_form() {
        let mut build = sample();
        let mut entries = crate::internal::codec::propset::parse("").unwrap();
        entries.insert("retries".to_string(), serde_json::Value::from(2));
        build.set_properties(entries);
        assert_eq!(build.propset_json, "\"retries\":2");
    }
}
