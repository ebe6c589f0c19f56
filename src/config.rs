//! Git-compatible `key = value` / `[section "sub"]` configuration reader and
//! writer (`spec.md` §6 "Configuration keys recognised").

use std::path::Path;

use crate::errors::CovError;
use crate::internal::codec::{RatingThresholds, Ratio};

/// A single `section[.sub].key = value` entry, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: String,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: Vec<Entry>,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    pub fn parse(text: &str) -> Result<Config, CovError> {
        let mut config = Config::new();
        let mut section = String::new();

        for (lineno, raw_line) in text.lines().enumerate() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = parse_section_header(header).ok_or_else(|| {
                    CovError::syntax("config", format!("line {}: malformed section header", lineno + 1))
                })?;
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                CovError::syntax("config", format!("line {}: expected `key = value`", lineno + 1))
            })?;
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(CovError::syntax(
                    "config",
                    format!("line {}: empty key", lineno + 1),
                ));
            }
            let value = value.trim().to_string();
            config.entries.push(Entry {
                key: format!("{section}.{key}"),
                value,
            });
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Config, CovError> {
        let text = std::fs::read_to_string(path).map_err(|e| CovError::io(path.to_path_buf(), e))?;
        Config::parse(&text)
    }

    /// First value for `key` (`section.name` or `section.sub.name`).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key.eq_ignore_ascii_case(key))
            .map(|e| e.value.as_str())
    }

    /// All entries whose key starts with `prefix`, in file order -- used for
    /// `module.<name>.path` which may repeat.
    pub fn get_all_with_prefix<'a>(&'a self, prefix: &str) -> Vec<(&'a str, &'a str)> {
        self.entries
            .iter()
            .filter(|e| e.key.starts_with(prefix))
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.value = value.into();
        } else {
            self.entries.push(Entry {
                key,
                value: value.into(),
            });
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut current_section: Option<String> = None;
        for entry in &self.entries {
            let (section, key) = entry.key.rsplit_once('.').unwrap_or(("", entry.key.as_str()));
            if current_section.as_deref() != Some(section) {
                out.push_str(&format!("[{}]\n", section_header(section)));
                current_section = Some(section.to_string());
            }
            out.push_str(&format!("\t{key} = {}\n", entry.value));
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), CovError> {
        std::fs::write(path, self.to_text()).map_err(|e| CovError::io(path.to_path_buf(), e))
    }

    /// `core.gitdir`, interpreted relative to the cov repo root.
    pub fn gitdir(&self) -> Option<&str> {
        self.get("core.gitdir")
    }

    /// Parse `core.rating`; defaults to 75%/90% if absent (`spec.md` §6).
    pub fn rating_thresholds(&self) -> Result<RatingThresholds, CovError> {
        match self.get("core.rating") {
            None => Ok(RatingThresholds::default()),
            Some(raw) => parse_rating(raw),
        }
    }

    /// `module.sep` and every `module.<name>.path` entry.
    pub fn module_entries(&self) -> (Option<&str>, Vec<(String, String)>) {
        let sep = self.get("module.sep");
        let paths = self
            .get_all_with_prefix("module.")
            .into_iter()
            .filter(|(k, _)| *k != "module.sep")
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (sep, paths)
    }
}

fn strip_comment(line: &str) -> &str {
    for marker in ['#', ';'] {
        if let Some(idx) = line.find(marker) {
            return &line[..idx];
        }
    }
    line
}

/// `section` or `section "sub"` -> `"section.sub"` / `"section"`.
fn parse_section_header(header: &str) -> Option<String> {
    let header = header.trim();
    if let Some(quote_start) = header.find('"') {
        let name = header[..quote_start].trim().to_ascii_lowercase();
        let rest = &header[quote_start + 1..];
        let quote_end = rest.rfind('"')?;
        let sub = &rest[..quote_end];
        Some(format!("{name}.{sub}"))
    } else {
        Some(header.to_ascii_lowercase())
    }
}

fn section_header(section: &str) -> String {
    match section.split_once('.') {
        Some((name, sub)) => format!("{name} \"{sub}\""),
        None => section.to_string(),
    }
}

/// `"<I%>, <P%>"` or `"<I>/<D>, <P>/<D>"`.
fn parse_rating(raw: &str) -> Result<RatingThresholds, CovError> {
    let (incomplete, passing) = raw
        .split_once(',')
        .ok_or_else(|| CovError::syntax("core.rating", format!("`{raw}` is missing a comma")))?;
    Ok(RatingThresholds {
        incomplete: parse_ratio(incomplete.trim())?,
        passing: parse_ratio(passing.trim())?,
    })
}

fn parse_ratio(token: &str) -> Result<Ratio, CovError> {
    let err = || CovError::syntax("core.rating", format!("`{token}` is not a valid ratio"));
    if let Some(pct) = token.strip_suffix('%') {
        let pct: f64 = pct.parse().map_err(|_| err())?;
        if !(0.0..=100.0).contains(&pct) {
            return Err(err());
        }
        // Represent as num/100 denominator so Ratio stays integer-exact for
        // the common whole-percent case.
        return Ok(Ratio::new((pct * 100.0).round() as u32, 10_000));
    }
    let (num, den) = token.split_once('/').ok_or_else(err)?;
    Ok(Ratio::new(
        num.trim().parse().map_err(|_| err())?,
        den.trim().parse().map_err(|_| err())?,
    ))
}
