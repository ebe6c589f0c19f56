//! Module filter: buckets files into named logical groups by longest
//! matching path prefix (`spec.md` §3 "Entities", §4.I).

use crate::errors::CovError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub prefixes: Vec<String>,
}

/// Ordered `{module_name -> [path_prefix]}` map plus the separator used when
/// splitting config keys like `module.<name>.path` (`spec.md` §6).
#[derive(Debug, Clone, Default)]
pub struct ModuleFilter {
    sep: String,
    modules: Vec<Module>,
}

impl ModuleFilter {
    pub fn new(sep: impl Into<String>) -> Self {
        ModuleFilter {
            sep: sep.into(),
            modules: Vec::new(),
        }
    }

    pub fn sep(&self) -> &str {
        &self.sep
    }

    pub fn add(&mut self, name: impl Into<String>, prefix: impl Into<String>) {
        let name = name.into();
        let prefix = prefix.into();
        if let Some(module) = self.modules.iter_mut().find(|m| m.name == name) {
            module.prefixes.push(prefix);
        } else {
            self.modules.push(Module {
                name,
                prefixes: vec![prefix],
            });
        }
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Classify `path` by the longest matching prefix across every module's
    /// prefix list; ties broken by module declaration order. `None` if no
    /// module claims the path.
    pub fn classify<'a>(&'a self, path: &str) -> Option<&'a str> {
        let mut best: Option<(&'a str, usize)> = None;
        for module in &self.modules {
            for prefix in &module.prefixes {
                if path.starts_with(prefix.as_str()) {
                    let len = prefix.len();
                    if best.map(|(_, best_len)| len > best_len).unwrap_or(true) {
                        best = Some((module.name.as_str(), len));
                    }
                }
            }
        }
        best.map(|(name, _)| name)
    }

    /// Bucket every path into its classified module, preserving input order
    /// within each bucket. Paths matching no module are returned separately.
    pub fn bucket<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> (Vec<(String, Vec<&'a str>)>, Vec<&'a str>) {
        let mut buckets: Vec<(String, Vec<&'a str>)> = self
            .modules
            .iter()
            .map(|m| (m.name.clone(), Vec::new()))
            .collect();
        let mut unmatched = Vec::new();

        for path in paths {
            match self.classify(path) {
                Some(name) => {
                    let bucket = buckets
                        .iter_mut()
                        .find(|(n, _)| n == name)
                        .expect("classify only returns declared module names");
                    bucket.1.push(path);
                }
                None => unmatched.push(path),
            }
        }
        (buckets, unmatched)
    }

    /// Parse `module.sep` and `module.<name>.path` config entries into a
    /// filter (`spec.md` §6).
    pub fn from_config_entries(
        sep: Option<&str>,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, CovError> {
        let mut filter = ModuleFilter::new(sep.unwrap_or("/"));
        for (key, value) in entries {
            let name = key
                .strip_prefix("module.")
                .and_then(|rest| rest.strip_suffix(".path"))
                .ok_or_else(|| CovError::syntax("module config key", format!("`{key}` is malformed")))?;
            filter.add(name, value);
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let mut filter = ModuleFilter::new("/");
        filter.add("core", "src/");
        filter.add("core-io", "src/io/");
        assert_eq!(filter.classify("src/io/reader.cc"), Some("core-io"));
        assert_eq!(filter.classify("src/main.cc"), Some("core"));
    }

    #[test]
    fn unmatched_path_is_none() {
        let mut filter = ModuleFilter::new("/");
        filter.add("core", "src/");
        assert_eq!(filter.classify("docs/readme.md"), None);
    }

    #[test]
    fn bucket_splits_matched_and_unmatched() {
        let mut filter = ModuleFilter::new("/");
        filter.add("core", "src/");
        let (buckets, unmatched) = filter.bucket(["src/a.cc", "docs/readme.md", "src/b.cc"]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].1, vec!["src/a.cc", "src/b.cc"]);
        assert_eq!(unmatched, vec!["docs/readme.md"]);
    }

    #[test]
    fn multiple_prefixes_per_module_accumulate() {
        let mut filter = ModuleFilter::new("/");
        filter.add("docs", "README");
        filter.add("docs", "docs/");
        assert_eq!(filter.classify("docs/intro.md"), Some("docs"));
        assert_eq!(filter.classify("README.md"), Some("docs"));
    }

    #[test]
    fn from_config_entries_parses_keys() {
        let filter = ModuleFilter::from_config_entries(
            Some(":"),
            [
                ("module.core.path".to_string(), "src/".to_string()),
                ("module.docs.path".to_string(), "docs/".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(filter.sep(), ":");
        assert_eq!(filter.classify("src/a.cc"), Some("core"));
    }

    #[test]
    fn from_config_entries_rejects_malformed_key() {
        assert!(ModuleFilter::from_config_entries(None, [("bogus".to_string(), "x".to_string())]).is_err());
    }
}
