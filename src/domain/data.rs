//! The coverage data model and merge engine
//!
//! [`CoverageData`] holds the facts collected about a program run:
//!
//! - **lines**: line numbers executed per file, when branch coverage is off
//! - **arcs**: `(from, to)` line pairs per file, when branch coverage is on.
//!   A negative `from` of `-N` is an entry into the code block starting at
//!   line N; a negative `to` is an exit from it
//! - **file tracers**: the plugin that produced a file's data
//! - **runs**: free-form metadata about each contributing execution
//!
//! Lines and arcs are never held at once. [`Measurements`] makes that a
//! property of the type: a store is unset, holds lines, or holds arcs.
//!
//! This module does no I/O. Reading and writing data files lives in
//! `storage`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::aliases::PathAliases;
use super::error::DataError;
use super::hasher::Hasher;

/// An executed line number
pub type LineNo = u32;

/// A transition between two lines; negative numbers are block entry/exit
pub type Arc = (i32, i32);

/// Metadata about one execution that contributed data
pub type RunInfo = Map<String, Value>;

/// The measured data, in exactly one representation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Measurements {
    /// Nothing measured yet
    #[default]
    Unset,
    /// Executed lines per file (never an empty map)
    Lines(BTreeMap<String, BTreeSet<LineNo>>),
    /// Executed arcs per file (never an empty map)
    Arcs(BTreeMap<String, BTreeSet<Arc>>),
}

impl Measurements {
    fn lines(map: BTreeMap<String, BTreeSet<LineNo>>) -> Self {
        if map.is_empty() {
            Measurements::Unset
        } else {
            Measurements::Lines(map)
        }
    }

    fn arcs(map: BTreeMap<String, BTreeSet<Arc>>) -> Self {
        if map.is_empty() {
            Measurements::Unset
        } else {
            Measurements::Arcs(map)
        }
    }

    fn contains(&self, filename: &str) -> bool {
        match self {
            Measurements::Unset => false,
            Measurements::Lines(map) => map.contains_key(filename),
            Measurements::Arcs(map) => map.contains_key(filename),
        }
    }
}

/// The serialized shape of a data file
///
/// Only one of `lines` and `arcs` is ever written. Empty `file_tracers` and
/// `runs` are left out entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<BTreeMap<String, Vec<LineNo>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arcs: Option<BTreeMap<String, Vec<Arc>>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub file_tracers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<RunInfo>,
}

/// Collected coverage data for any number of files
#[derive(Debug, Clone, Default)]
pub struct CoverageData {
    measurements: Measurements,
    file_tracers: BTreeMap<String, String>,
    runs: Vec<RunInfo>,
    strict: bool,
}

impl CoverageData {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that checks its invariants after every change
    ///
    /// A broken invariant panics. Meant for tests and debugging.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// True if no lines or arcs have been recorded, not even empty files
    pub fn is_empty(&self) -> bool {
        self.measurements == Measurements::Unset
    }

    /// Does this data have arcs?
    ///
    /// Arc data is only present if branch coverage was used.
    pub fn has_arcs(&self) -> bool {
        matches!(self.measurements, Measurements::Arcs(_))
    }

    fn has_lines(&self) -> bool {
        matches!(self.measurements, Measurements::Lines(_))
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    /// Lines executed in `filename`, sorted
    ///
    /// With arc data, these are the positive starting points of the arcs.
    /// Returns `None` if the file wasn't measured, and an empty list if it
    /// was measured but nothing ran.
    pub fn lines(&self, filename: &str) -> Option<Vec<LineNo>> {
        match &self.measurements {
            Measurements::Unset => None,
            Measurements::Lines(map) => map
                .get(filename)
                .map(|lines| lines.iter().copied().collect()),
            Measurements::Arcs(map) => map.get(filename).map(|arcs| {
                arcs.iter()
                    .filter(|(start, _)| *start > 0)
                    .map(|(start, _)| *start as LineNo)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            }),
        }
    }

    /// Arcs executed in `filename`, sorted; `None` if it has no arc data
    pub fn arcs(&self, filename: &str) -> Option<Vec<Arc>> {
        match &self.measurements {
            Measurements::Arcs(map) => map.get(filename).map(|arcs| arcs.iter().copied().collect()),
            _ => None,
        }
    }

    /// The plugin that measured `filename`
    ///
    /// `None` means the file wasn't measured, `Some("")` that it was measured
    /// without a plugin.
    pub fn file_tracer(&self, filename: &str) -> Option<&str> {
        if self.measurements.contains(filename) {
            Some(self.file_tracers.get(filename).map(String::as_str).unwrap_or(""))
        } else {
            None
        }
    }

    /// Information about each run that contributed to this data
    pub fn run_infos(&self) -> &[RunInfo] {
        &self.runs
    }

    /// Every measured file, sorted
    pub fn measured_files(&self) -> Vec<&str> {
        match &self.measurements {
            Measurements::Unset => Vec::new(),
            Measurements::Lines(map) => map.keys().map(String::as_str).collect(),
            Measurements::Arcs(map) => map.keys().map(String::as_str).collect(),
        }
    }

    /// Number of executed lines per file
    ///
    /// Keys are full paths if `full_path` is set, otherwise base names. Files
    /// sharing a base name overwrite each other.
    pub fn line_counts(&self, full_path: bool) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for filename in self.measured_files() {
            let key = if full_path {
                filename.to_string()
            } else {
                basename(filename)
            };
            let count = self.lines(filename).map_or(0, |lines| lines.len());
            counts.insert(key, count);
        }
        counts
    }

    /// Sets executed lines for each file in `line_data`
    ///
    /// Each file's previous lines are replaced, not extended. Call this once
    /// per store; use [`update`](Self::update) to accumulate.
    pub fn set_lines<K, I>(
        &mut self,
        line_data: impl IntoIterator<Item = (K, I)>,
    ) -> Result<(), DataError>
    where
        K: Into<String>,
        I: IntoIterator<Item = LineNo>,
    {
        let mut map = match std::mem::take(&mut self.measurements) {
            Measurements::Arcs(arcs) => {
                self.measurements = Measurements::Arcs(arcs);
                return Err(DataError::LinesIntoArcs);
            }
            Measurements::Lines(map) => map,
            Measurements::Unset => BTreeMap::new(),
        };

        for (filename, lines) in line_data {
            map.insert(filename.into(), lines.into_iter().collect());
        }
        self.measurements = Measurements::lines(map);

        self.validate();
        Ok(())
    }

    /// Sets executed arcs for each file in `arc_data`
    ///
    /// Same single-call contract as [`set_lines`](Self::set_lines).
    pub fn set_arcs<K, I>(
        &mut self,
        arc_data: impl IntoIterator<Item = (K, I)>,
    ) -> Result<(), DataError>
    where
        K: Into<String>,
        I: IntoIterator<Item = Arc>,
    {
        let mut map = match std::mem::take(&mut self.measurements) {
            Measurements::Lines(lines) => {
                self.measurements = Measurements::Lines(lines);
                return Err(DataError::ArcsIntoLines);
            }
            Measurements::Arcs(map) => map,
            Measurements::Unset => BTreeMap::new(),
        };

        for (filename, arcs) in arc_data {
            map.insert(filename.into(), arcs.into_iter().collect());
        }
        self.measurements = Measurements::arcs(map);

        self.validate();
        Ok(())
    }

    /// Records which plugin measured each file
    ///
    /// Every file must already be measured, and a file's plugin can't change
    /// once set. Nothing is recorded if any entry is rejected.
    pub fn set_file_tracers<K, V>(
        &mut self,
        file_tracers: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), DataError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut accepted: Vec<(String, String)> = Vec::new();
        for (filename, plugin) in file_tracers {
            let (filename, plugin) = (filename.into(), plugin.into());
            if !self.measurements.contains(&filename) {
                return Err(DataError::UnmeasuredFile(filename));
            }
            let existing = accepted
                .iter()
                .rev()
                .find(|(f, _)| *f == filename)
                .map(|(_, p)| p.as_str())
                .or_else(|| self.file_tracers.get(&filename).map(String::as_str));
            if let Some(existing) = existing {
                if existing != plugin {
                    return Err(DataError::ConflictingTracer {
                        path: filename,
                        existing: existing.to_string(),
                        incoming: plugin,
                    });
                }
            }
            if !plugin.is_empty() {
                accepted.push((filename, plugin));
            }
        }

        self.file_tracers.extend(accepted);
        self.validate();
        Ok(())
    }

    /// Adds key/value pairs to the run information
    ///
    /// There is only one run record until data is combined. Repeated keys
    /// overwrite earlier values.
    pub fn add_run_info<K, V>(&mut self, info: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        if self.runs.is_empty() {
            self.runs.push(RunInfo::new());
        }
        let run = &mut self.runs[0];
        for (key, value) in info {
            run.insert(key.into(), value.into());
        }
        self.validate();
    }

    /// Ensures `filename` is measured, with no lines or arcs if it's new
    pub fn touch_file(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        match &mut self.measurements {
            Measurements::Unset => {
                self.measurements =
                    Measurements::Lines(BTreeMap::from([(filename, BTreeSet::new())]));
            }
            Measurements::Lines(map) => {
                map.entry(filename).or_default();
            }
            Measurements::Arcs(map) => {
                map.entry(filename).or_default();
            }
        }
        self.validate();
    }

    /// Clears all data in memory
    pub fn erase(&mut self) {
        self.measurements = Measurements::Unset;
        self.file_tracers.clear();
        self.runs.clear();
        self.validate();
    }

    /// Merges `other` into this data
    ///
    /// Paths from `other` are mapped through `aliases` first. Line and arc
    /// sets are unioned, run records appended. Lines can't be merged with
    /// arcs, and a file can't end up with two different plugins; either
    /// failure leaves this data untouched.
    pub fn update(
        &mut self,
        other: &CoverageData,
        aliases: Option<&PathAliases>,
    ) -> Result<(), DataError> {
        if self.has_lines() && other.has_arcs() {
            return Err(DataError::CombineArcsWithLines);
        }
        if self.has_arcs() && other.has_lines() {
            return Err(DataError::CombineLinesWithArcs);
        }

        let no_aliases = PathAliases::new();
        let aliases = aliases.unwrap_or(&no_aliases);

        // Plugins must be settled against our data as it was before merging
        let mut adopted: BTreeMap<String, String> = BTreeMap::new();
        for filename in other.measured_files() {
            let other_plugin = other.file_tracer(filename).unwrap_or("");
            let local = aliases.map(filename);
            let this_plugin = self
                .file_tracer(&local)
                .or_else(|| adopted.get(&local).map(String::as_str));
            match this_plugin {
                None => {
                    if !other_plugin.is_empty() {
                        adopted.insert(local, other_plugin.to_string());
                    }
                }
                Some(this_plugin) if this_plugin != other_plugin => {
                    return Err(DataError::ConflictingTracer {
                        path: local,
                        existing: this_plugin.to_string(),
                        incoming: other_plugin.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        self.file_tracers.extend(adopted);

        self.runs.extend(other.runs.iter().cloned());

        match &other.measurements {
            Measurements::Unset => {}
            Measurements::Lines(theirs) => {
                let mut ours = match std::mem::take(&mut self.measurements) {
                    Measurements::Lines(map) => map,
                    _ => BTreeMap::new(),
                };
                for (filename, lines) in theirs {
                    ours.entry(aliases.map(filename))
                        .or_default()
                        .extend(lines.iter().copied());
                }
                self.measurements = Measurements::lines(ours);
            }
            Measurements::Arcs(theirs) => {
                let mut ours = match std::mem::take(&mut self.measurements) {
                    Measurements::Arcs(map) => map,
                    _ => BTreeMap::new(),
                };
                for (filename, arcs) in theirs {
                    ours.entry(aliases.map(filename))
                        .or_default()
                        .extend(arcs.iter().copied());
                }
                self.measurements = Measurements::arcs(ours);
            }
        }

        self.validate();
        Ok(())
    }

    /// Feeds `filename`'s results to `hasher`: its sorted arcs (or lines),
    /// then its plugin name. Run information is left out.
    pub fn add_to_hash(&self, filename: &str, hasher: &mut Hasher) {
        if self.has_arcs() {
            hasher.update(&self.arcs(filename).unwrap_or_default());
        } else {
            hasher.update(&self.lines(filename).unwrap_or_default());
        }
        hasher.update(self.file_tracer(filename).unwrap_or(""));
    }

    /// The serializable form of this data
    pub fn to_payload(&self) -> DataPayload {
        let mut payload = DataPayload {
            file_tracers: self.file_tracers.clone(),
            runs: self.runs.clone(),
            ..DataPayload::default()
        };
        match &self.measurements {
            Measurements::Arcs(map) => {
                payload.arcs = Some(
                    map.iter()
                        .map(|(f, arcs)| (f.clone(), arcs.iter().copied().collect()))
                        .collect(),
                );
            }
            Measurements::Lines(map) => {
                payload.lines = Some(
                    map.iter()
                        .map(|(f, lines)| (f.clone(), lines.iter().copied().collect()))
                        .collect(),
                );
            }
            Measurements::Unset => payload.lines = Some(BTreeMap::new()),
        }
        payload
    }

    /// Replaces everything in this store with `payload`
    ///
    /// This is not a merge. On error the store is left as it was.
    pub fn load_payload(&mut self, payload: DataPayload) -> Result<(), DataError> {
        let lines = payload.lines.unwrap_or_default();
        let arcs = payload.arcs.unwrap_or_default();
        if !lines.is_empty() && !arcs.is_empty() {
            return Err(DataError::Invariant("Shouldn't have both lines and arcs".to_string()));
        }

        let measurements = if arcs.is_empty() {
            Measurements::lines(
                lines
                    .into_iter()
                    .map(|(f, lines)| (f, lines.into_iter().collect()))
                    .collect(),
            )
        } else {
            Measurements::arcs(
                arcs.into_iter()
                    .map(|(f, arcs)| (f, arcs.into_iter().collect()))
                    .collect(),
            )
        };

        let loaded = CoverageData {
            measurements,
            file_tracers: payload.file_tracers,
            runs: payload.runs,
            strict: self.strict,
        };
        loaded.check_invariants()?;
        *self = loaded;
        Ok(())
    }

    /// Checks the internal invariants the type system doesn't cover
    pub fn check_invariants(&self) -> Result<(), DataError> {
        match &self.measurements {
            Measurements::Lines(map) if map.is_empty() => {
                return Err(DataError::Invariant("Lines are set but empty".to_string()));
            }
            Measurements::Arcs(map) if map.is_empty() => {
                return Err(DataError::Invariant("Arcs are set but empty".to_string()));
            }
            Measurements::Lines(map) => {
                for (filename, lines) in map {
                    if lines.contains(&0) {
                        return Err(DataError::Invariant(format!("lines[{filename:?}] has line 0")));
                    }
                }
            }
            _ => {}
        }

        for (filename, plugin) in &self.file_tracers {
            if plugin.is_empty() {
                return Err(DataError::Invariant(format!(
                    "file_tracers[{filename:?}] shouldn't be empty"
                )));
            }
            if !self.measurements.contains(filename) {
                return Err(DataError::Invariant(format!(
                    "file_tracers has unmeasured file {filename:?}"
                )));
            }
        }
        Ok(())
    }

    fn validate(&self) {
        if self.strict {
            if let Err(e) = self.check_invariants() {
                panic!("{e}");
            }
        }
    }
}

fn basename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines_1() -> Vec<(&'static str, Vec<LineNo>)> {
        vec![("a.py", vec![1, 2]), ("b.py", vec![3])]
    }

    fn lines_2() -> Vec<(&'static str, Vec<LineNo>)> {
        vec![("a.py", vec![1, 5]), ("c.py", vec![17])]
    }

    fn arcs_3() -> Vec<(&'static str, Vec<Arc>)> {
        vec![
            ("x.py", vec![(-1, 1), (1, 2), (2, 3), (3, -1)]),
            ("y.py", vec![(-1, 17), (17, 23), (23, -1)]),
        ]
    }

    fn arcs_4() -> Vec<(&'static str, Vec<Arc>)> {
        vec![
            ("x.py", vec![(-1, 2), (2, 5), (5, -1)]),
            ("z.py", vec![(-1, 1000), (1000, -1)]),
        ]
    }

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn empty_data_is_empty() {
        let data = CoverageData::strict();
        assert!(data.is_empty());
        assert!(!data.has_arcs());
        assert!(data.measured_files().is_empty());
    }

    #[test]
    fn adding_lines() {
        let mut data = CoverageData::strict();
        data.set_lines(lines_1()).unwrap();
        assert!(!data.is_empty());
        assert!(!data.has_arcs());
        assert_eq!(data.line_counts(false), counts(&[("a.py", 2), ("b.py", 1)]));
        assert_eq!(data.measured_files(), vec!["a.py", "b.py"]);
        assert_eq!(data.lines("a.py"), Some(vec![1, 2]));
        assert_eq!(data.arcs("a.py"), None);
    }

    #[test]
    fn adding_arcs() {
        let mut data = CoverageData::strict();
        data.set_arcs(arcs_3()).unwrap();
        assert!(data.has_arcs());
        assert_eq!(data.line_counts(false), counts(&[("x.py", 3), ("y.py", 2)]));
        assert_eq!(data.lines("x.py"), Some(vec![1, 2, 3]));
        assert_eq!(data.arcs("x.py"), Some(vec![(-1, 1), (1, 2), (2, 3), (3, -1)]));
        assert_eq!(data.lines("y.py"), Some(vec![17, 23]));
    }

    #[test]
    fn lines_from_arcs_are_distinct() {
        let mut data = CoverageData::strict();
        data.set_arcs([("x.py", vec![(-1, 1), (1, 2), (1, 3), (2, -1), (3, -1)])])
            .unwrap();
        assert_eq!(data.lines("x.py"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn cant_set_arcs_with_lines() {
        let mut data = CoverageData::strict();
        data.set_lines(lines_1()).unwrap();
        let err = data.set_arcs(arcs_3()).unwrap_err();
        assert_eq!(err.to_string(), "Can't add arcs to existing line data");
        assert_eq!(data.lines("a.py"), Some(vec![1, 2]));
    }

    #[test]
    fn cant_set_lines_with_arcs() {
        let mut data = CoverageData::strict();
        data.set_arcs(arcs_3()).unwrap();
        let err = data.set_lines(lines_1()).unwrap_err();
        assert_eq!(err.to_string(), "Can't add lines to existing arc data");
        assert!(data.has_arcs());
    }

    #[test]
    fn set_lines_replaces_rather_than_accumulates() {
        let mut data = CoverageData::strict();
        data.set_lines([("a.py", vec![1, 2])]).unwrap();
        data.set_lines([("a.py", vec![7])]).unwrap();
        assert_eq!(data.lines("a.py"), Some(vec![7]));
    }

    #[test]
    fn touch_file_with_lines() {
        let mut data = CoverageData::strict();
        data.set_lines(lines_1()).unwrap();
        data.touch_file("zzz.py");
        assert_eq!(data.measured_files(), vec!["a.py", "b.py", "zzz.py"]);
        assert_eq!(data.lines("zzz.py"), Some(vec![]));
    }

    #[test]
    fn touch_file_with_arcs() {
        let mut data = CoverageData::strict();
        data.set_arcs(arcs_3()).unwrap();
        data.touch_file("zzz.py");
        assert_eq!(data.measured_files(), vec!["x.py", "y.py", "zzz.py"]);
        assert_eq!(data.arcs("zzz.py"), Some(vec![]));
    }

    #[test]
    fn touch_file_is_idempotent() {
        let mut data = CoverageData::strict();
        data.set_lines(lines_1()).unwrap();
        data.touch_file("a.py");
        assert_eq!(data.lines("a.py"), Some(vec![1, 2]));
    }

    #[test]
    fn no_lines_vs_unmeasured_file() {
        let mut data = CoverageData::strict();
        data.set_lines(lines_1()).unwrap();
        data.touch_file("zzz.py");
        assert_eq!(data.lines("zzz.py"), Some(vec![]));
        assert_eq!(data.lines("no_such_file.py"), None);
    }

    #[test]
    fn no_arcs_vs_unmeasured_file() {
        let mut data = CoverageData::strict();
        data.set_arcs(arcs_3()).unwrap();
        data.touch_file("zzz.py");
        assert_eq!(data.lines("zzz.py"), Some(vec![]));
        assert_eq!(data.lines("no_such_file.py"), None);
        assert_eq!(data.arcs("zzz.py"), Some(vec![]));
        assert_eq!(data.arcs("no_such_file.py"), None);
    }

    #[test]
    fn run_info() {
        let mut data = CoverageData::strict();
        assert!(data.run_infos().is_empty());
        data.add_run_info([("hello", json!("there"))]);
        assert_eq!(data.run_infos(), [json!({"hello": "there"}).as_object().unwrap().clone()]);
        data.add_run_info([("count", json!(17))]);
        assert_eq!(
            data.run_infos(),
            [json!({"hello": "there", "count": 17}).as_object().unwrap().clone()]
        );
    }

    #[test]
    fn run_info_last_write_wins() {
        let mut data = CoverageData::strict();
        data.add_run_info([("os", json!("linux"))]);
        data.add_run_info([("pid", json!(42))]);
        data.add_run_info([("os", json!("darwin"))]);
        assert_eq!(data.run_infos().len(), 1);
        assert_eq!(Value::Object(data.run_infos()[0].clone()), json!({"os": "darwin", "pid": 42}));
    }

    #[test]
    fn file_tracer_name() {
        let mut data = CoverageData::strict();
        data.set_lines([
            ("p1.foo", vec![1, 2, 3]),
            ("p2.html", vec![10, 11, 12]),
            ("main.py", vec![20]),
        ])
        .unwrap();
        data.set_file_tracers([("p1.foo", "p1.plugin"), ("p2.html", "p2.plugin")])
            .unwrap();
        assert_eq!(data.file_tracer("p1.foo"), Some("p1.plugin"));
        assert_eq!(data.file_tracer("p2.html"), Some("p2.plugin"));
        assert_eq!(data.file_tracer("main.py"), Some(""));
        assert_eq!(data.file_tracer("p3.not_here"), None);
    }

    #[test]
    fn cant_file_tracer_unmeasured_files() {
        let mut data = CoverageData::strict();
        let err = data.set_file_tracers([("p1.foo", "p1.plugin")]).unwrap_err();
        assert_eq!(err.to_string(), "Can't add file tracer data for unmeasured file 'p1.foo'");

        data.set_lines([("p2.html", vec![10, 11, 12])]).unwrap();
        let err = data
            .set_file_tracers([("p2.html", "p2.plugin"), ("p1.foo", "p1.plugin")])
            .unwrap_err();
        assert!(matches!(err, DataError::UnmeasuredFile(ref f) if f == "p1.foo"));
        assert_eq!(data.file_tracer("p2.html"), Some(""));
    }

    #[test]
    fn cant_change_file_tracer_name() {
        let mut data = CoverageData::strict();
        data.set_lines([("p1.foo", vec![1, 2, 3])]).unwrap();
        data.set_file_tracers([("p1.foo", "p1")]).unwrap();

        let err = data.set_file_tracers([("p1.foo", "p2")]).unwrap_err();
        assert_eq!(err.to_string(), "Conflicting file tracer name for 'p1.foo': 'p1' vs 'p2'");
        assert_eq!(data.file_tracer("p1.foo"), Some("p1"));

        // Same name again is fine
        data.set_file_tracers([("p1.foo", "p1")]).unwrap();
    }

    #[test]
    fn update_lines() {
        let mut data1 = CoverageData::strict();
        data1.set_lines(lines_1()).unwrap();
        let mut data2 = CoverageData::strict();
        data2.set_lines(lines_2()).unwrap();

        let mut data3 = CoverageData::strict();
        data3.update(&data1, None).unwrap();
        data3.update(&data2, None).unwrap();

        assert_eq!(data3.line_counts(false), counts(&[("a.py", 3), ("b.py", 1), ("c.py", 1)]));
        assert_eq!(data3.measured_files(), vec!["a.py", "b.py", "c.py"]);
        assert!(data3.run_infos().is_empty());
    }

    #[test]
    fn update_arcs() {
        let mut data1 = CoverageData::strict();
        data1.set_arcs(arcs_3()).unwrap();
        let mut data2 = CoverageData::strict();
        data2.set_arcs(arcs_4()).unwrap();

        let mut data3 = CoverageData::strict();
        data3.update(&data1, None).unwrap();
        data3.update(&data2, None).unwrap();

        assert_eq!(data3.line_counts(false), counts(&[("x.py", 4), ("y.py", 2), ("z.py", 1)]));
        assert_eq!(data3.measured_files(), vec!["x.py", "y.py", "z.py"]);
        assert_eq!(
            data3.arcs("x.py"),
            Some(vec![(-1, 1), (-1, 2), (1, 2), (2, 3), (2, 5), (3, -1), (5, -1)])
        );
    }

    #[test]
    fn update_twice_is_same_as_once() {
        let mut data1 = CoverageData::strict();
        data1.set_lines(lines_1()).unwrap();

        let mut once = CoverageData::strict();
        once.update(&data1, None).unwrap();
        let mut twice = once.clone();
        twice.update(&data1, None).unwrap();

        assert_eq!(once.measurements(), twice.measurements());
    }

    #[test]
    fn update_run_info() {
        let mut data1 = CoverageData::strict();
        data1.set_arcs(arcs_3()).unwrap();
        data1.add_run_info([("hello", "there"), ("count", "17")]);

        let mut data2 = CoverageData::strict();
        data2.set_arcs(arcs_4()).unwrap();
        data2.add_run_info([("hello", "goodbye")]);
        data2.add_run_info([("count", 23)]);

        let mut data3 = CoverageData::strict();
        data3.update(&data1, None).unwrap();
        data3.update(&data2, None).unwrap();

        let runs: Vec<Value> = data3.run_infos().iter().cloned().map(Value::Object).collect();
        assert_eq!(
            runs,
            vec![
                json!({"hello": "there", "count": "17"}),
                json!({"hello": "goodbye", "count": 23}),
            ]
        );
    }

    #[test]
    fn update_cant_mix_lines_and_arcs() {
        let mut data1 = CoverageData::strict();
        data1.set_lines(lines_1()).unwrap();
        let mut data2 = CoverageData::strict();
        data2.set_arcs(arcs_3()).unwrap();

        let err = data1.update(&data2, None).unwrap_err();
        assert_eq!(err.to_string(), "Can't combine arc data with line data");
        let err = data2.update(&data1, None).unwrap_err();
        assert_eq!(err.to_string(), "Can't combine line data with arc data");
    }

    #[test]
    fn update_file_tracers() {
        let mut data1 = CoverageData::strict();
        data1
            .set_lines([
                ("p1.html", vec![1, 2, 3, 4]),
                ("p2.html", vec![5, 6, 7]),
                ("main.py", vec![10, 11, 12]),
            ])
            .unwrap();
        data1
            .set_file_tracers([("p1.html", "html.plugin"), ("p2.html", "html.plugin2")])
            .unwrap();

        let mut data2 = CoverageData::strict();
        data2
            .set_lines([
                ("p1.html", vec![3, 4, 5, 6]),
                ("p2.html", vec![7, 8, 9]),
                ("p3.foo", vec![1000, 1001]),
                ("main.py", vec![10, 11, 12]),
            ])
            .unwrap();
        data2
            .set_file_tracers([
                ("p1.html", "html.plugin"),
                ("p2.html", "html.plugin2"),
                ("p3.foo", "foo_plugin"),
            ])
            .unwrap();

        let mut data3 = CoverageData::strict();
        data3.update(&data1, None).unwrap();
        data3.update(&data2, None).unwrap();
        assert_eq!(data3.file_tracer("p1.html"), Some("html.plugin"));
        assert_eq!(data3.file_tracer("p2.html"), Some("html.plugin2"));
        assert_eq!(data3.file_tracer("p3.foo"), Some("foo_plugin"));
        assert_eq!(data3.file_tracer("main.py"), Some(""));
    }

    #[test]
    fn update_conflicting_file_tracers() {
        let mut data1 = CoverageData::strict();
        data1.set_lines([("p1.html", vec![1, 2, 3])]).unwrap();
        data1.set_file_tracers([("p1.html", "html.plugin")]).unwrap();

        let mut data2 = CoverageData::strict();
        data2.set_lines([("p1.html", vec![1, 2, 3])]).unwrap();
        data2.set_file_tracers([("p1.html", "html.other_plugin")]).unwrap();

        let err = data1.update(&data2, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflicting file tracer name for 'p1.html': 'html.plugin' vs 'html.other_plugin'"
        );
        let err = data2.update(&data1, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflicting file tracer name for 'p1.html': 'html.other_plugin' vs 'html.plugin'"
        );
    }

    #[test]
    fn update_file_tracer_vs_no_file_tracer() {
        let mut data1 = CoverageData::strict();
        data1.set_lines([("p1.html", vec![1, 2, 3])]).unwrap();
        data1.set_file_tracers([("p1.html", "html.plugin")]).unwrap();

        let mut data2 = CoverageData::strict();
        data2.set_lines([("p1.html", vec![1, 2, 3])]).unwrap();

        let err = data1.update(&data2, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflicting file tracer name for 'p1.html': 'html.plugin' vs ''"
        );
        let err = data2.update(&data1, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflicting file tracer name for 'p1.html': '' vs 'html.plugin'"
        );
    }

    #[test]
    fn failed_update_changes_nothing() {
        let mut data1 = CoverageData::strict();
        data1.set_lines([("p1.html", vec![1]), ("a.py", vec![1])]).unwrap();
        data1.set_file_tracers([("p1.html", "html.plugin")]).unwrap();
        data1.add_run_info([("run", 1)]);

        let mut data2 = CoverageData::strict();
        data2.set_lines([("a.py", vec![2]), ("p1.html", vec![9])]).unwrap();
        data2.set_file_tracers([("p1.html", "other")]).unwrap();
        data2.add_run_info([("run", 2)]);

        let before = data1.clone();
        assert!(data1.update(&data2, None).is_err());
        assert_eq!(data1.measurements(), before.measurements());
        assert_eq!(data1.run_infos(), before.run_infos());
    }

    #[test]
    fn update_with_aliases() {
        let mut theirs = CoverageData::strict();
        theirs
            .set_lines([
                ("/jenkins/build/1/src/a.py", vec![1, 2]),
                ("/jenkins/build/1/src/page.html", vec![4]),
            ])
            .unwrap();
        theirs
            .set_file_tracers([("/jenkins/build/1/src/page.html", "html.plugin")])
            .unwrap();

        let mut aliases = PathAliases::new();
        aliases.add("/jenkins/build/*/src", "/local/src").unwrap();

        let mut ours = CoverageData::strict();
        ours.set_lines([("/local/src/a.py", vec![3])]).unwrap();
        ours.update(&theirs, Some(&aliases)).unwrap();

        let a_py = crate::domain::canonical_filename("/local/src/a.py");
        let page = crate::domain::canonical_filename("/local/src/page.html");
        assert_eq!(ours.lines(&a_py), Some(vec![1, 2, 3]));
        assert_eq!(ours.file_tracer(&page), Some("html.plugin"));
    }

    #[test]
    fn add_to_hash_with_lines() {
        let mut data = CoverageData::strict();
        data.set_lines(lines_1()).unwrap();
        let mut hasher = Hasher::new();
        data.add_to_hash("a.py", &mut hasher);

        let mut expected = Hasher::new();
        expected.update(&vec![1u32, 2]);
        expected.update("");
        assert_eq!(hasher.hexdigest(), expected.hexdigest());
    }

    #[test]
    fn add_to_hash_with_arcs() {
        let mut data = CoverageData::strict();
        data.set_arcs(arcs_3()).unwrap();
        data.set_file_tracers([("y.py", "hologram_plugin")]).unwrap();
        let mut hasher = Hasher::new();
        data.add_to_hash("y.py", &mut hasher);

        let mut expected = Hasher::new();
        expected.update(&vec![(-1i32, 17i32), (17, 23), (23, -1)]);
        expected.update("hologram_plugin");
        assert_eq!(hasher.hexdigest(), expected.hexdigest());
    }

    #[test]
    fn hash_ignores_run_info() {
        let digest = |run: i64, arcs: Vec<Arc>| {
            let mut data = CoverageData::strict();
            data.set_arcs([("f.py", arcs)]).unwrap();
            data.add_run_info([("when", run)]);
            let mut hasher = Hasher::new();
            data.add_to_hash("f.py", &mut hasher);
            hasher.hexdigest()
        };
        assert_eq!(digest(1, vec![(1, 2), (2, 3)]), digest(2, vec![(1, 2), (2, 3)]));
        assert_ne!(digest(1, vec![(1, 2), (2, 3)]), digest(1, vec![(1, 2), (2, 4)]));
    }

    #[test]
    fn erase_clears_everything() {
        let mut data = CoverageData::strict();
        data.set_arcs(arcs_3()).unwrap();
        data.set_file_tracers([("x.py", "plugin")]).unwrap();
        data.add_run_info([("a", 1)]);
        data.erase();
        assert!(data.is_empty());
        assert!(data.run_infos().is_empty());
        assert_eq!(data.file_tracer("x.py"), None);
        // Either representation may be chosen again
        data.set_lines(lines_1()).unwrap();
    }

    #[test]
    fn payload_omits_empty_sections() {
        let mut data = CoverageData::new();
        data.set_lines(lines_1()).unwrap();
        let json = serde_json::to_value(data.to_payload()).unwrap();
        assert_eq!(json, json!({"lines": {"a.py": [1, 2], "b.py": [3]}}));

        let empty = serde_json::to_value(CoverageData::new().to_payload()).unwrap();
        assert_eq!(empty, json!({"lines": {}}));
    }

    #[test]
    fn payload_round_trip_keeps_everything() {
        let mut data = CoverageData::strict();
        data.set_arcs(arcs_3()).unwrap();
        data.set_file_tracers([("y.py", "magic_plugin")]).unwrap();
        data.add_run_info([("version", json!("v3.14")), ("chunks", json!(["z", "a"]))]);

        let mut loaded = CoverageData::strict();
        loaded.load_payload(data.to_payload()).unwrap();
        assert_eq!(loaded.measurements(), data.measurements());
        assert_eq!(loaded.file_tracer("y.py"), Some("magic_plugin"));
        assert_eq!(loaded.run_infos(), data.run_infos());
    }

    #[test]
    fn load_rejects_both_kinds() {
        let payload = DataPayload {
            lines: Some(BTreeMap::from([("a.py".to_string(), vec![1])])),
            arcs: Some(BTreeMap::from([("b.py".to_string(), vec![(1, 2)])])),
            ..DataPayload::default()
        };
        let mut data = CoverageData::new();
        data.set_lines(lines_1()).unwrap();
        assert!(matches!(data.load_payload(payload), Err(DataError::Invariant(_))));
        assert_eq!(data.measured_files(), vec!["a.py", "b.py"]);
    }

    #[test]
    fn load_rejects_tracer_for_unmeasured_file() {
        let payload = DataPayload {
            lines: Some(BTreeMap::from([("a.py".to_string(), vec![1])])),
            file_tracers: BTreeMap::from([("b.py".to_string(), "plugin".to_string())]),
            ..DataPayload::default()
        };
        assert!(CoverageData::new().load_payload(payload).is_err());
    }

    #[test]
    fn line_counts_by_full_path() {
        let mut data = CoverageData::strict();
        data.set_lines([("/src/a.py", vec![1, 2]), ("/lib/a.py", vec![3])]).unwrap();
        assert_eq!(
            data.line_counts(true),
            counts(&[("/lib/a.py", 1), ("/src/a.py", 2)])
        );
        // Base names collide; the later file wins
        assert_eq!(data.line_counts(false).len(), 1);
    }

    #[test]
    #[should_panic(expected = "has line 0")]
    fn strict_mode_catches_bad_lines() {
        let mut data = CoverageData::strict();
        data.set_lines([("a.py", vec![0])]).unwrap();
    }

    #[test]
    fn lenient_mode_skips_checks() {
        let mut data = CoverageData::new();
        data.set_lines([("a.py", vec![0])]).unwrap();
        assert!(data.check_invariants().is_err());
    }
}
