use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::audio::SampleBuffer;
use crate::error::{Error, LoadError, Result};
use crate::loader::manifest::{FallbackTable, SampleDefinition};
use crate::loader::sample_loader::AssetLoader;
use crate::pipeline::pattern::InstrumentId;

/// A decoded sound ready to trigger.
#[derive(Clone, Debug)]
pub struct Sample {
    pub instrument: InstrumentId,
    pub buffer: Arc<SampleBuffer>,
    pub url: String, // where the buffer actually came from
    pub fallback: bool,
    pub label: String,
    pub key: String,
}

/// A definition that could not be resolved by either its own url or its
/// category's fallback.
#[derive(Debug)]
pub struct UnresolvedAsset {
    pub definition: SampleDefinition,
    pub primary_error: LoadError,
    pub fallback_error: Option<LoadError>,
}

impl UnresolvedAsset {
    pub fn to_error(&self) -> Error {
        let reason = match &self.fallback_error {
            Some(f) => format!("{} (fallback: {f})", self.primary_error),
            None => format!("{} (no fallback)", self.primary_error),
        };
        Error::AssetUnresolved { instrument: self.definition.instrument(), reason }
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub primary: usize,
    pub fallback: usize,
    pub unresolved: Vec<UnresolvedAsset>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    // definitions to hand back to `SampleStore::retry`
    pub fn failed_definitions(&self) -> Vec<SampleDefinition> {
        self.unresolved.iter().map(|u| u.definition.clone()).collect()
    }
}

enum Resolution {
    Primary(SampleBuffer),
    Fallback { url: String, buffer: SampleBuffer },
}

// whatever the loader says, a buffer with no frames can't be played
fn load_playable<L: AssetLoader + ?Sized>(loader: &L, url: &str) -> std::result::Result<SampleBuffer, LoadError> {
    let buffer = loader.resolve_asset(url)?;
    if buffer.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(buffer)
}

// primary url first, then the category fallback exactly once
fn resolve_definition<L: AssetLoader + ?Sized>(
    def: &SampleDefinition,
    fallbacks: &FallbackTable,
    loader: &L,
) -> std::result::Result<Resolution, UnresolvedAsset> {
    let primary_error = match load_playable(loader, &def.url) {
        Ok(buffer) => return Ok(Resolution::Primary(buffer)),
        Err(e) => e,
    };
    let Some(url) = fallbacks.get(&def.category) else {
        return Err(UnresolvedAsset { definition: def.clone(), primary_error, fallback_error: None });
    };
    warn!(url = %def.url, fallback = %url, error = %primary_error, "using fallback");
    match load_playable(loader, url) {
        Ok(buffer) => Ok(Resolution::Fallback { url: url.clone(), buffer }),
        Err(e) => Err(UnresolvedAsset {
            definition: def.clone(),
            primary_error,
            fallback_error: Some(e),
        }),
    }
}

/// Every loaded sound, keyed by instrument. Read-only once loaded, apart from
/// explicit retries.
#[derive(Debug, Default)]
pub struct SampleStore {
    samples: HashMap<InstrumentId, Sample>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every definition in order, reporting progress (percent) after each.
    pub fn load<L: AssetLoader + ?Sized>(
        manifest: &[SampleDefinition],
        fallbacks: &FallbackTable,
        loader: &L,
        progress: impl FnMut(f32),
    ) -> (Self, LoadReport) {
        let mut store = Self::new();
        let report = store.resolve_all(manifest, fallbacks, loader, progress);
        info!(
            primary = report.primary,
            fallback = report.fallback,
            unresolved = report.unresolved.len(),
            "samples loaded"
        );
        (store, report)
    }

    /// Tries the given definitions again and adds whatever now resolves.
    pub fn retry<L: AssetLoader + ?Sized>(
        &mut self,
        unresolved: &[SampleDefinition],
        fallbacks: &FallbackTable,
        loader: &L,
        progress: impl FnMut(f32),
    ) -> LoadReport {
        let report = self.resolve_all(unresolved, fallbacks, loader, progress);
        info!(
            recovered = report.primary + report.fallback,
            unresolved = report.unresolved.len(),
            "retried samples"
        );
        report
    }

    fn resolve_all<L: AssetLoader + ?Sized>(
        &mut self,
        defs: &[SampleDefinition],
        fallbacks: &FallbackTable,
        loader: &L,
        mut progress: impl FnMut(f32),
    ) -> LoadReport {
        let mut report = LoadReport::default();
        let total = defs.len().max(1) as f32;
        for (i, def) in defs.iter().enumerate() {
            match resolve_definition(def, fallbacks, loader) {
                Ok(Resolution::Primary(buffer)) => {
                    report.primary += 1;
                    self.insert(def, def.url.clone(), buffer, false);
                }
                Ok(Resolution::Fallback { url, buffer }) => {
                    report.fallback += 1;
                    self.insert(def, url, buffer, true);
                }
                Err(unresolved) => {
                    warn!(instrument = %def.instrument(), "{}", unresolved.to_error());
                    report.unresolved.push(unresolved);
                }
            }
            progress((i + 1) as f32 / total * 100.0);
        }
        report
    }

    fn insert(&mut self, def: &SampleDefinition, url: String, buffer: SampleBuffer, fallback: bool) {
        let instrument = def.instrument();
        self.samples.insert(
            instrument.clone(),
            Sample {
                instrument,
                buffer: Arc::new(buffer),
                url,
                fallback,
                label: def.label.clone(),
                key: def.key.clone(),
            },
        );
    }

    pub fn resolve(&self, instrument: &InstrumentId) -> Result<&Sample> {
        self.samples.get(instrument).ok_or_else(|| Error::SampleNotFound(instrument.clone()))
    }

    pub fn get(&self, category: &str, name: &str) -> Option<&Sample> {
        self.samples.get(&InstrumentId::new(category, name))
    }

    pub fn contains(&self, instrument: &InstrumentId) -> bool {
        self.samples.contains_key(instrument)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use super::*;
    use crate::audio::StereoFrame;

    // serves a fixed set of urls and remembers every request
    #[derive(Default)]
    struct FakeLoader {
        good: HashSet<String>,
        empty: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeLoader {
        fn with(good: &[&str]) -> Self {
            Self { good: good.iter().map(|s| s.to_string()).collect(), ..Self::default() }
        }
    }

    impl AssetLoader for FakeLoader {
        fn resolve_asset(&self, url: &str) -> std::result::Result<SampleBuffer, LoadError> {
            self.calls.borrow_mut().push(url.to_string());
            if self.empty.contains(url) {
                Err(LoadError::Empty)
            } else if self.good.contains(url) {
                Ok(SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 10]))
            } else {
                Err(LoadError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, url.to_string())))
            }
        }
    }

    fn def(url: &str, category: &str, name: &str) -> SampleDefinition {
        SampleDefinition::new(url, category, name, "", "")
    }

    fn fallbacks() -> FallbackTable {
        let mut f = FallbackTable::new();
        f.insert("drums".into(), "fb/drums.wav".into());
        f
    }

    #[test]
    fn primary_urls_load_without_fallback() {
        let loader = FakeLoader::with(&["a.wav", "fb/drums.wav"]);
        let (store, report) = SampleStore::load(&[def("a.wav", "drums", "kick")], &fallbacks(), &loader, |_| {});
        let s = store.get("drums", "kick").unwrap();
        assert!(!s.fallback);
        assert_eq!(s.url, "a.wav");
        assert_eq!(report.primary, 1);
        assert!(report.is_complete());
    }

    #[test]
    fn failed_primary_uses_category_fallback() {
        let loader = FakeLoader::with(&["fb/drums.wav"]);
        let (store, report) = SampleStore::load(&[def("gone.wav", "drums", "kick")], &fallbacks(), &loader, |_| {});
        let s = store.resolve(&InstrumentId::new("drums", "kick")).unwrap();
        assert!(s.fallback);
        assert_eq!(s.url, "fb/drums.wav");
        assert_eq!(report.fallback, 1);
    }

    #[test]
    fn fallback_is_tried_exactly_once() {
        let loader = FakeLoader::default();
        let (store, report) = SampleStore::load(&[def("gone.wav", "drums", "kick")], &fallbacks(), &loader, |_| {});
        assert!(store.is_empty());
        assert_eq!(*loader.calls.borrow(), vec!["gone.wav", "fb/drums.wav"]);
        let u = &report.unresolved[0];
        assert!(u.fallback_error.is_some());
        assert!(matches!(u.to_error(), Error::AssetUnresolved { .. }));
    }

    #[test]
    fn category_without_fallback_is_unresolved() {
        let loader = FakeLoader::with(&["fb/drums.wav"]);
        let (_, report) = SampleStore::load(&[def("x.wav", "keys", "organ")], &fallbacks(), &loader, |_| {});
        assert_eq!(report.unresolved.len(), 1);
        assert!(report.unresolved[0].fallback_error.is_none());
        assert_eq!(loader.calls.borrow().len(), 1);
    }

    #[test]
    fn empty_buffer_counts_as_a_failure() {
        let mut loader = FakeLoader::with(&["fb/drums.wav"]);
        loader.empty.insert("silent.wav".into());
        let (store, _) = SampleStore::load(&[def("silent.wav", "drums", "kick")], &fallbacks(), &loader, |_| {});
        assert!(store.get("drums", "kick").unwrap().fallback);
    }

    #[test]
    fn progress_reaches_one_hundred() {
        let loader = FakeLoader::with(&["a.wav"]);
        let defs = [def("a.wav", "drums", "a"), def("b.wav", "keys", "b"), def("a.wav", "drums", "c"), def("a.wav", "drums", "d")];
        let mut seen = Vec::new();
        SampleStore::load(&defs, &fallbacks(), &loader, |p| seen.push(p));
        assert_eq!(seen, vec![25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let store = SampleStore::new();
        let id = InstrumentId::new("drums", "nope");
        assert!(matches!(store.resolve(&id), Err(Error::SampleNotFound(i)) if i == id));
        assert!(store.get("drums", "nope").is_none());
    }

    #[test]
    fn retry_only_touches_failed_definitions() {
        let loader = FakeLoader::with(&["a.wav"]);
        let defs = [def("a.wav", "keys", "a"), def("b.wav", "keys", "b")];
        let (mut store, report) = SampleStore::load(&defs, &fallbacks(), &loader, |_| {});
        assert_eq!(store.len(), 1);

        let better = FakeLoader::with(&["a.wav", "b.wav"]);
        let again = store.retry(&report.failed_definitions(), &fallbacks(), &better, |_| {});
        assert_eq!(*better.calls.borrow(), vec!["b.wav"]);
        assert!(again.is_complete());
        assert_eq!(store.len(), 2);
    }
}
