//! Loading and caching of the class and ability models.
//!
//! [`ModelManager`] owns one normalized master per key. Callers only ever
//! receive deep clones, so a displayed model can be moved, rotated or
//! disposed without touching the cache.

use std::{cell::Cell, collections::HashMap, fmt};

use futures::{StreamExt, stream::FuturesUnordered};
use log::{debug, error, info};

use crate::{
    config::AssetPaths,
    data_structures::scene_graph::{DisposeReport, Node},
    keys::{AbilityKey, AssetKey, Category, ClassKey},
    resources::{
        load_model_gltf,
        texture::{ModelSource, Transfer},
    },
};

/// Aggregate progress over all expected assets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        self.loaded as f32 / self.total as f32 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.loaded == self.total
    }
}

/// A single asset that failed to load.
#[derive(Debug)]
pub struct LoadError {
    pub key: AssetKey,
    pub path: String,
    pub source: anyhow::Error,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to load {} model {} from {}: {:#}",
            self.key.category(),
            self.key,
            self.path,
            self.source
        )
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

#[derive(Default)]
struct Listeners {
    progress: Vec<Box<dyn Fn(AssetKey, Category, u32)>>,
    item_loaded: Vec<Box<dyn Fn(LoadProgress)>>,
    complete: Vec<Box<dyn Fn()>>,
    error: Vec<Box<dyn Fn(&LoadError)>>,
}

pub struct ModelManager<S: ModelSource> {
    source: S,
    paths: AssetPaths,
    model_size: f32,
    classes: HashMap<ClassKey, Node>,
    abilities: HashMap<AbilityKey, Node>,
    progress: LoadProgress,
    completed: bool,
    listeners: Listeners,
}

impl<S: ModelSource> ModelManager<S> {
    /// A manager that normalizes every model to `model_size`.
    pub fn new(source: S, paths: AssetPaths, model_size: f32) -> Self {
        Self {
            source,
            paths,
            model_size,
            classes: HashMap::new(),
            abilities: HashMap::new(),
            progress: LoadProgress {
                loaded: 0,
                total: AssetKey::all().count(),
            },
            completed: false,
            listeners: Listeners::default(),
        }
    }

    /// Called with a rounded percentage on every transfer tick of known length.
    pub fn on_progress(&mut self, listener: impl Fn(AssetKey, Category, u32) + 'static) {
        self.listeners.progress.push(Box::new(listener));
    }

    pub fn on_item_loaded(&mut self, listener: impl Fn(LoadProgress) + 'static) {
        self.listeners.item_loaded.push(Box::new(listener));
    }

    /// Called once all assets are loaded.
    pub fn on_complete(&mut self, listener: impl Fn() + 'static) {
        self.listeners.complete.push(Box::new(listener));
    }

    pub fn on_error(&mut self, listener: impl Fn(&LoadError) + 'static) {
        self.listeners.error.push(Box::new(listener));
    }

    /// Loads every asset that is not cached yet.
    ///
    /// All loads are started before the first one is awaited and results
    /// are applied in completion order. The first failure is returned
    /// right away; loads still in flight are dropped and everything that
    /// already finished stays cached, so a later call only retries the rest.
    pub async fn load_all(&mut self) -> Result<(), LoadError> {
        let pending: Vec<AssetKey> = AssetKey::all().filter(|k| !self.contains(*k)).collect();
        if !pending.is_empty() {
            info!(
                "Loading {} of {} models.",
                pending.len(),
                self.progress.total
            );
        }

        let Self {
            source,
            paths,
            model_size,
            classes,
            abilities,
            progress,
            completed,
            listeners,
        } = self;
        let source = &*source;
        let listeners = &*listeners;

        let mut in_flight: FuturesUnordered<_> = pending
            .into_iter()
            .map(|key| {
                let path = paths.path(key);
                async move {
                    debug!("Started loading {} model {} from {}", key.category(), key, path);
                    let started = instant::Instant::now();
                    let milestone = Cell::new(0);
                    let on_transfer = |transfer: Transfer| {
                        let Some(percent) = transfer.percent() else {
                            return;
                        };
                        for listener in &listeners.progress {
                            listener(key, key.category(), percent);
                        }
                        let reached = percent / 25 * 25;
                        if reached > milestone.get() {
                            milestone.set(reached);
                            debug!("{} {}: {}%", key.category(), key, reached);
                        }
                    };
                    let result = load_model_gltf(source, &path, &on_transfer).await;
                    (key, path, started.elapsed(), result)
                }
            })
            .collect();

        while let Some((key, path, elapsed, result)) = in_flight.next().await {
            match result {
                Ok(mut model) => {
                    model.normalize(*model_size);
                    match key {
                        AssetKey::Class(class) => classes.insert(class, model),
                        AssetKey::Ability(ability) => abilities.insert(ability, model),
                    };
                    progress.loaded += 1;
                    info!(
                        "Loaded {} model {} in {:?} ({}/{})",
                        key.category(),
                        key,
                        elapsed,
                        progress.loaded,
                        progress.total
                    );
                    for listener in &listeners.item_loaded {
                        listener(*progress);
                    }
                }
                Err(source) => {
                    let error = LoadError { key, path, source };
                    error!("{}", error);
                    for listener in &listeners.error {
                        listener(&error);
                    }
                    return Err(error);
                }
            }
        }

        if progress.is_complete() && !*completed {
            *completed = true;
            info!("All {} models loaded.", progress.total);
            for listener in &listeners.complete {
                listener();
            }
        }
        Ok(())
    }

    /// A deep copy of the class model, if it is loaded.
    pub fn get_class(&self, key: ClassKey) -> Option<Node> {
        self.classes.get(&key).cloned()
    }

    /// A deep copy of the ability model, if it is loaded.
    pub fn get_ability(&self, key: AbilityKey) -> Option<Node> {
        self.abilities.get(&key).cloned()
    }

    pub fn available_classes(&self) -> Vec<ClassKey> {
        ClassKey::ALL
            .into_iter()
            .filter(|k| self.classes.contains_key(k))
            .collect()
    }

    pub fn available_abilities(&self) -> Vec<AbilityKey> {
        AbilityKey::ALL
            .into_iter()
            .filter(|k| self.abilities.contains_key(k))
            .collect()
    }

    pub fn contains(&self, key: AssetKey) -> bool {
        match key {
            AssetKey::Class(class) => self.classes.contains_key(&class),
            AssetKey::Ability(ability) => self.abilities.contains_key(&ability),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.progress.is_complete()
    }

    pub fn progress(&self) -> LoadProgress {
        self.progress
    }

    /// Releases every master and returns to the empty state.
    ///
    /// Listeners stay registered and a later `load_all` starts over,
    /// including a fresh completion notification.
    pub fn dispose(&mut self) -> DisposeReport {
        let mut report = DisposeReport::default();
        for model in self.classes.values_mut().chain(self.abilities.values_mut()) {
            report += model.dispose();
        }
        self.classes.clear();
        self.abilities.clear();
        self.progress.loaded = 0;
        self.completed = false;
        info!(
            "Disposed models: {} geometries, {} textures, {} materials.",
            report.geometries, report.textures, report.materials
        );
        report
    }
}
