//! Golden fixtures for exact-output comparisons.
//!
//! A fixture holds the lines a Step is expected to capture, together with
//! provenance written when it was last regenerated. Fixtures are addressed by a
//! [`FixtureIdentity`] (module path plus step index) and kept in a
//! [`FixtureStore`].
//!
//! On disk, [`JsonFixtureStore`] lays fixtures out as
//! `<root>/<module segments...>/<step_index>.json`.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
    error::{FixtureLoadError, Result, StepError},
    step::Step,
};

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("static regex is valid"))
}

/// Locates one Step's fixture: the module it belongs to and its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixtureIdentity {
    /// Module path, segments separated by `::` or `/`.
    pub module: String,
    /// Index of the Step within the module.
    pub step_index: usize,
}

impl FixtureIdentity {
    /// Creates an identity.
    pub fn new(module: impl Into<String>, step_index: usize) -> Self {
        Self {
            module: module.into(),
            step_index,
        }
    }

    /// Creates the identity of `step` within `module`.
    pub fn for_step(module: impl Into<String>, step: &Step) -> Self {
        Self::new(module, step.step_index)
    }

    /// Returns the sanitized directory segments of the module path.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Configuration`] when the module path is empty or
    /// contains `..`.
    pub fn segments(&self) -> Result<Vec<String>> {
        let segments: Vec<String> = self
            .module
            .split("::")
            .flat_map(|part| part.split('/'))
            .filter(|seg| !seg.is_empty())
            .map(|seg| unsafe_chars().replace_all(seg, "_").into_owned())
            .collect();

        if segments.is_empty() {
            return Err(StepError::Configuration(format!(
                "fixture module path '{}' is empty",
                self.module
            )));
        }
        if segments.iter().any(|seg| seg == "." || seg == "..") {
            return Err(StepError::Configuration(format!(
                "fixture module path '{}' must not contain '.' or '..' segments",
                self.module
            )));
        }
        Ok(segments)
    }

    /// Directory holding this module's fixtures, relative to `root`.
    pub fn dir_path(&self, root: &Path) -> Result<PathBuf> {
        let mut path = root.to_path_buf();
        path.extend(self.segments()?);
        Ok(path)
    }

    /// File name of this Step's fixture.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.step_index)
    }

    /// Full path of the fixture under `root`.
    pub fn path(&self, root: &Path) -> Result<PathBuf> {
        Ok(self.dir_path(root)?.join(self.file_name()))
    }
}

/// Provenance stored alongside a fixture's output.
///
/// Records which strategy the Step used when the fixture was regenerated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureMetadata {
    /// Substrings the Step required.
    #[serde(default)]
    pub look_fors: Vec<String>,
    /// Substrings the Step forbade.
    #[serde(default)]
    pub look_nots: Vec<String>,
    /// True when the Step compared against this fixture.
    #[serde(default)]
    pub compared_fixture: bool,
    /// RFC 3339 UTC time of regeneration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regenerated_at: Option<String>,
    /// Any other keys found in the file.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FixtureMetadata {
    /// Describes the strategy `step` uses, stamped with the current time.
    pub fn for_step(step: &Step) -> Self {
        Self {
            look_fors: step.look_fors.clone(),
            look_nots: step.look_nots.clone(),
            compared_fixture: step.compares_fixture(),
            regenerated_at: Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            extra: BTreeMap::new(),
        }
    }
}

/// A persisted golden fixture.
///
/// Only `output` is required when reading, so hand-written fixtures work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureRecord {
    /// Module path the fixture belongs to.
    #[serde(default)]
    pub name: String,
    /// Step index.
    #[serde(default)]
    pub index: usize,
    /// Free-text provenance note.
    #[serde(default)]
    pub comment: String,
    /// Strategy metadata.
    #[serde(default)]
    pub additional_information: FixtureMetadata,
    /// Captured screen lines, in order.
    pub output: Vec<String>,
}

impl FixtureRecord {
    /// Builds the record written when regenerating `step`'s fixture.
    pub fn regenerated(identity: &FixtureIdentity, step: &Step, output: Vec<String>) -> Self {
        Self {
            name: identity.module.clone(),
            index: identity.step_index,
            comment: step.comment.clone(),
            additional_information: FixtureMetadata::for_step(step),
            output,
        }
    }

    /// Parses a record from JSON text.
    pub fn from_json(text: &str) -> std::result::Result<Self, FixtureLoadError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the record as pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if an `extra` metadata value cannot be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

/// Storage for golden fixtures.
///
/// `save` overwrites; readers never see a partially written record.
pub trait FixtureStore {
    /// Loads the fixture for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::FixtureLoad`] with [`FixtureLoadError::NotFound`]
    /// when nothing is stored, or [`FixtureLoadError::Malformed`] when the
    /// stored data is not a valid record.
    fn load(&self, identity: &FixtureIdentity) -> Result<FixtureRecord>;

    /// Stores `record` for `identity`, replacing any previous fixture.
    ///
    /// Returns where the record was written.
    fn save(&self, identity: &FixtureIdentity, record: &FixtureRecord) -> Result<PathBuf>;
}

impl<S: FixtureStore + ?Sized> FixtureStore for &S {
    fn load(&self, identity: &FixtureIdentity) -> Result<FixtureRecord> {
        (**self).load(identity)
    }

    fn save(&self, identity: &FixtureIdentity, record: &FixtureRecord) -> Result<PathBuf> {
        (**self).save(identity, record)
    }
}

/// Fixture store backed by JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFixtureStore {
    root: PathBuf,
}

impl JsonFixtureStore {
    /// Creates a store rooted at `root`. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FixtureStore for JsonFixtureStore {
    fn load(&self, identity: &FixtureIdentity) -> Result<FixtureRecord> {
        let path = identity.path(&self.root)?;
        debug!(path = %path.display(), "loading fixture");

        let text = fs::read_to_string(&path).map_err(|e| {
            let source = if e.kind() == io::ErrorKind::NotFound {
                FixtureLoadError::NotFound
            } else {
                FixtureLoadError::Io(e)
            };
            StepError::FixtureLoad { path: path.clone(), source }
        })?;

        FixtureRecord::from_json(&text).map_err(|source| StepError::FixtureLoad { path, source })
    }

    fn save(&self, identity: &FixtureIdentity, record: &FixtureRecord) -> Result<PathBuf> {
        let dir = identity.dir_path(&self.root)?;
        let path = dir.join(identity.file_name());
        let save_err = |source: io::Error| StepError::FixtureSave {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&dir).map_err(save_err)?;

        // Write beside the target and rename so readers see old or new, never half
        let mut tmp = NamedTempFile::new_in(&dir).map_err(save_err)?;
        let text = record.to_json().map_err(|e| save_err(e.into()))?;
        tmp.write_all(text.as_bytes()).map_err(save_err)?;
        tmp.as_file().sync_all().map_err(save_err)?;
        tmp.persist(&path).map_err(|e| save_err(e.error))?;

        info!(path = %path.display(), lines = record.output.len(), "fixture regenerated");
        Ok(path)
    }
}

/// Fixture store kept in memory.
///
/// Paths reported by `save` are virtual: `<module segments>/<index>.json`.
#[derive(Debug, Default)]
pub struct MemoryFixtureStore {
    records: Mutex<HashMap<FixtureIdentity, FixtureRecord>>,
}

impl MemoryFixtureStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a record whose output is `lines`.
    pub fn with_output<I, S>(self, identity: FixtureIdentity, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record = FixtureRecord {
            name: identity.module.clone(),
            index: identity.step_index,
            output: lines.into_iter().map(Into::into).collect(),
            ..Default::default()
        };
        self.lock().insert(identity, record);
        self
    }

    /// Returns a copy of the stored record, if any.
    pub fn get(&self, identity: &FixtureIdentity) -> Option<FixtureRecord> {
        self.lock().get(identity).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FixtureIdentity, FixtureRecord>> {
        // A poisoned map is still consistent; every write is a single insert
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FixtureStore for MemoryFixtureStore {
    fn load(&self, identity: &FixtureIdentity) -> Result<FixtureRecord> {
        let path = identity.path(Path::new(""))?;
        self.get(identity).ok_or(StepError::FixtureLoad {
            path,
            source: FixtureLoadError::NotFound,
        })
    }

    fn save(&self, identity: &FixtureIdentity, record: &FixtureRecord) -> Result<PathBuf> {
        let path = identity.path(Path::new(""))?;
        self.lock().insert(identity.clone(), record.clone());
        Ok(path)
    }
}
