//! Dependency image pipeline
//!
//! Sequences one run: stage the resolved dependencies, fingerprint them,
//! consult the cache record and, on a miss, build and tag a new image.
//!
//! ```text
//! Staging -> Hashing -> CacheHit ------------------------------> Done
//!                    \-> CacheMiss -> Building -> Recording -> Done
//! ```
//!
//! The build manifest is rewritten after Hashing on every run, hit or miss.
//! Any failure before Recording ends the run with an error and leaves the
//! cache record untouched, so the next run retries the same build.

use crate::builder::{BuildContext, BuildOptions, ImageBuilder, ImageTags, LIB_DIR_NAME};
use crate::cache::{should_rebuild, CacheDecision, CacheRecord};
use crate::config::Config;
use crate::error::{DepImageError, DepImageResult};
use crate::fingerprint::{aggregate, fingerprint_files, Fingerprint};
use crate::resolve::{DependencyEntry, DependencyResolver};
use crate::stage::{stage, StagedFile};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pipeline phase, used for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Staging,
    Hashing,
    CacheHit,
    CacheMiss,
    Building,
    Recording,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Staging => "staging",
            Self::Hashing => "hashing",
            Self::CacheHit => "cache hit",
            Self::CacheMiss => "cache miss",
            Self::Building => "building",
            Self::Recording => "recording",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Settings for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Staging root (lib dir, manifest and cache record live here)
    pub root: PathBuf,
    /// Stable image name
    pub image_name: String,
    /// Base image reference
    pub base_image: String,
    /// Copy destination inside the image
    pub deploy_dir: String,
    /// Files hashed concurrently
    pub hash_concurrency: usize,
    /// Optional build time limit
    pub build_timeout: Option<Duration>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.staging.root.clone(),
            image_name: config.image.name.clone(),
            base_image: config.image.base.clone(),
            deploy_dir: config.image.deploy_dir.clone(),
            hash_concurrency: config.hash_concurrency(),
            build_timeout: config.build_timeout(),
        }
    }

    /// Directory the dependencies are staged into
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join(LIB_DIR_NAME)
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Aggregate fingerprint of the staged dependency set
    pub fingerprint: Fingerprint,
    /// Tags referencing the image for this fingerprint
    pub tags: ImageTags,
    /// Whether the build was skipped
    pub cache: CacheDecision,
    /// Number of staged files
    pub staged: usize,
    /// The image was built but the record could not be written; the next
    /// run will rebuild
    pub record_stale: bool,
}

/// Result of a dry check: no build, no record update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub fingerprint: Fingerprint,
    pub previous: Option<Fingerprint>,
    pub cache: CacheDecision,
    pub staged: usize,
}

/// Builds and caches the dependency image for one staging root.
///
/// A staging root must be driven by one pipeline run at a time; callers
/// running several builds in parallel must serialize runs that share a root.
pub struct DependencyImage<'a> {
    settings: PipelineSettings,
    builder: &'a dyn ImageBuilder,
    on_phase: Option<Box<dyn Fn(Phase) + 'a>>,
}

impl<'a> DependencyImage<'a> {
    pub fn new(settings: PipelineSettings, builder: &'a dyn ImageBuilder) -> Self {
        Self {
            settings,
            builder,
            on_phase: None,
        }
    }

    /// Observe phase transitions
    pub fn on_phase(mut self, callback: impl Fn(Phase) + 'a) -> Self {
        self.on_phase = Some(Box::new(callback));
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn record(&self) -> CacheRecord {
        CacheRecord::in_root(&self.settings.root)
    }

    /// Resolve, stage, fingerprint and build if the fingerprint changed.
    ///
    /// With `force`, the cache record is ignored and the image is always
    /// built.
    pub async fn run(
        &self,
        resolver: &dyn DependencyResolver,
        options: &BuildOptions,
        force: bool,
    ) -> DepImageResult<BuildOutcome> {
        let entries = resolver.resolve().await?;
        self.run_entries(entries, options, force).await
    }

    /// Like [`run`](Self::run) with an already resolved dependency set
    pub async fn run_entries(
        &self,
        entries: Vec<DependencyEntry>,
        options: &BuildOptions,
        force: bool,
    ) -> DepImageResult<BuildOutcome> {
        let (staged, fingerprint) = self.stage_and_hash(entries).await?;
        let tags = ImageTags::new(&self.settings.image_name, &fingerprint);
        let record = self.record();

        // regenerated on every run so the context always reflects the config
        let context = BuildContext::prepare(
            &self.settings.root,
            &self.settings.base_image,
            &self.settings.deploy_dir,
        )
        .await?;

        let previous = if force {
            debug!("Forced build, ignoring cache record");
            None
        } else {
            record.load().await?
        };

        let cache = should_rebuild(&fingerprint, previous.as_ref());
        if cache.is_hit() {
            self.enter(Phase::CacheHit);
            info!("Cache hit, skipping build of {}", tags.qualified);
            self.enter(Phase::Done);
            return Ok(BuildOutcome {
                fingerprint,
                tags,
                cache,
                staged: staged.len(),
                record_stale: false,
            });
        }

        self.enter(Phase::CacheMiss);
        info!("Cache miss, rebuilding {}", tags.qualified);

        self.enter(Phase::Building);
        let options = match (options.timeout, self.settings.build_timeout) {
            (None, Some(timeout)) => options.clone().with_timeout(Some(timeout)),
            _ => options.clone(),
        };
        self.builder.build(&context, &tags, &options).await?;

        self.enter(Phase::Recording);
        let record_stale = match record.store(&fingerprint).await {
            Ok(()) => false,
            Err(e) => {
                warn!("Image built but cache record not updated: {}", e);
                true
            }
        };

        self.enter(Phase::Done);
        Ok(BuildOutcome {
            fingerprint,
            tags,
            cache,
            staged: staged.len(),
            record_stale,
        })
    }

    /// Stage and fingerprint, then compare with the record without building
    pub async fn check(&self, resolver: &dyn DependencyResolver) -> DepImageResult<CheckOutcome> {
        let entries = resolver.resolve().await?;
        let (staged, fingerprint) = self.stage_and_hash(entries).await?;
        let previous = self.record().load().await?;
        let cache = should_rebuild(&fingerprint, previous.as_ref());

        Ok(CheckOutcome {
            fingerprint,
            previous,
            cache,
            staged: staged.len(),
        })
    }

    /// Remove the staging root, including the cache record
    pub async fn clean(&self) -> DepImageResult<bool> {
        remove_root(&self.settings.root).await
    }

    async fn stage_and_hash(
        &self,
        entries: Vec<DependencyEntry>,
    ) -> DepImageResult<(Vec<StagedFile>, Fingerprint)> {
        self.enter(Phase::Staging);
        let lib_dir = self.settings.lib_dir();
        let staged = tokio::task::spawn_blocking(move || stage(&entries, &lib_dir))
            .await
            .map_err(|e| DepImageError::staging("staging task failed", std::io::Error::other(e)))??;

        self.enter(Phase::Hashing);
        let paths: Vec<PathBuf> = staged.iter().map(|f| f.path.clone()).collect();
        let fingerprints = fingerprint_files(&paths, self.settings.hash_concurrency).await?;
        let fingerprint = aggregate(&fingerprints);
        info!(
            "Fingerprint of {} dependencies: {}",
            staged.len(),
            fingerprint.short(12)
        );

        Ok((staged, fingerprint))
    }

    fn enter(&self, phase: Phase) {
        debug!("Pipeline phase: {}", phase);
        if let Some(ref callback) = self.on_phase {
            callback(phase);
        }
    }
}

async fn remove_root(root: &Path) -> DepImageResult<bool> {
    match tokio::fs::remove_dir_all(root).await {
        Ok(()) => {
            info!("Removed staging root {}", root.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DepImageError::io(format!("removing {}", root.display()), e)),
    }
}
