//! Yotter Core - lazy grouped-attribute caching for a privacy front-end.
//!
//! Videos, channels and playlists expose attributes that are fetched from
//! upstream on first read, one attribute group at a time, and kept in a
//! two-tier cache. Within a [`Scope`] there is at most one live instance per
//! id, so everything reading the same video shares one set of values.
//!
//! # Example
//!
//! ```rust,ignore
//! use yotter_core::{LazyGrouped, Yotter};
//!
//! let yotter = Yotter::builder()
//!     .data_dir("./var")
//!     .auto_create_dirs(true)
//!     .build()?;
//!
//! let video = yotter.scope().video("dQw4w9WgXcQ");
//! println!("{} by {}", video.title(), video.channel_name());
//! # Ok::<(), yotter_core::YotterError>(())
//! ```

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod humanize;
pub mod identity;
pub mod mapper;
pub mod store;
pub mod upstream;
pub mod youtube;

// Re-export commonly used types
pub use cache::{CacheKey, CachedGroup, Tier, TieredCache, TieredStats};
pub use config::YotterConfig;
pub use entity::{EntityContext, GroupState, LazyGrouped};
pub use error::{Result, YotterError};
pub use identity::{IdentityMap, Scope};
pub use mapper::PropMappers;
pub use store::{
    BackingStore, ImportSummary, ModerationList, ModerationLists, ModerationOutcome, RecordKind,
    SqliteStore, UnitOfWork,
};
pub use upstream::{ChannelSource, PlaylistSource, Sources, VideoSource};
pub use youtube::{Channel, Playlist, Services, Video};

use cache::{CacheConfig, MemoryCache, SqliteCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Main entry point: the wired-up cache, sources, mappers and backing store.
pub struct Yotter {
    config: YotterConfig,
    services: Arc<Services>,
    global: Scope,
    store: Arc<dyn BackingStore>,
    /// Durable tier, kept for maintenance. `None` when running in memory.
    durable: Option<Arc<SqliteCache>>,
}

impl Yotter {
    pub fn builder() -> YotterBuilder {
        YotterBuilder::new()
    }

    pub fn config(&self) -> &YotterConfig {
        &self.config
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn mappers(&self) -> &Arc<PropMappers> {
        &self.services.context.mappers
    }

    /// The process-wide scope.
    pub fn scope(&self) -> &Scope {
        &self.global
    }

    /// A fresh request scope bound to a new unit of work on the backing
    /// store. Drop it when the request ends.
    pub fn unit_of_work(&self) -> Scope {
        let unit = Arc::new(UnitOfWork::new(self.store.clone()));
        Scope::unit_of_work(
            self.services.clone(),
            unit,
            self.config.identity_map_capacity,
        )
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    /// Recent videos of several channels and playlists, newest first.
    pub fn recent_videos(
        &self,
        scope: &Scope,
        channel_ids: &[String],
        playlist_ids: &[String],
        max_per_parent: usize,
        max_days: i64,
    ) -> Vec<Arc<Video>> {
        let mut videos = Vec::new();
        for cid in channel_ids {
            videos.extend(scope.channel(cid).get_recent_videos(scope, max_per_parent, max_days));
        }
        for pid in playlist_ids {
            videos.extend(scope.playlist(pid).get_recent_videos(scope, max_per_parent, max_days));
        }
        // Stable, so same-instant videos keep per-parent order
        videos.sort_by_key(|video| std::cmp::Reverse(video.published()));
        debug!(
            "Merged {} recent videos from {} channels and {} playlists",
            videos.len(),
            channel_ids.len(),
            playlist_ids.len()
        );
        videos
    }

    /// Drop every cached group in both tiers. Overrides included.
    pub fn purge_cache(&self) -> Result<()> {
        self.services.context.cache.clear()?;
        self.global.clear();
        debug!("Cleared the global identity maps");
        Ok(())
    }

    /// Remove expired durable entries and shrink the durable tier to its
    /// size bound. Returns the number of entries removed.
    pub fn maintain_cache(&self) -> Result<usize> {
        let Some(durable) = &self.durable else {
            return Ok(0);
        };
        let expired = durable.cleanup_expired()?;
        let evicted = durable.evict_to_size(self.config.durable_max_size_bytes)?;
        if expired + evicted > 0 {
            info!("Cache maintenance removed {} expired and {} evicted entries", expired, evicted);
        }
        Ok(expired + evicted)
    }

    pub fn cache_stats(&self) -> TieredStats {
        self.services.context.cache.stats()
    }

    pub fn moderate(
        &self,
        kind: RecordKind,
        id: &str,
        list: ModerationList,
        add: bool,
    ) -> Result<ModerationOutcome> {
        let unit = UnitOfWork::new(self.store.clone());
        store::moderate(&unit, kind, id, list, add)
    }

    pub fn export_lists(&self) -> Result<ModerationLists> {
        ModerationLists::export(self.store.as_ref(), &self.config.server_name)
    }

    pub fn import_lists(&self, lists: &ModerationLists) -> Result<ImportSummary> {
        let unit = UnitOfWork::new(self.store.clone());
        lists.import(&unit)
    }
}

/// Builder for configuring [`Yotter`] initialization.
///
/// # Example
///
/// ```rust,ignore
/// use yotter_core::{Sources, Yotter};
///
/// let yotter = Yotter::builder()
///     .config(yotter_core::YotterConfig::load()?)
///     .auto_create_dirs(true)
///     .build()?;
/// ```
pub struct YotterBuilder {
    config: Option<YotterConfig>,
    data_dir: Option<PathBuf>,
    auto_create_dirs: bool,
    in_memory: bool,
    sources: Option<Sources>,
}

impl Default for YotterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl YotterBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            data_dir: None,
            auto_create_dirs: false,
            in_memory: false,
            sources: None,
        }
    }

    /// Deployment settings. Default: [`YotterConfig::default`].
    pub fn config(mut self, config: YotterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the configured data directory.
    pub fn data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// Create the data directory if it doesn't exist.
    ///
    /// Default: `false` (the directory must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Keep both cache tiers and the backing store in memory. Nothing is
    /// written to the data directory.
    pub fn in_memory(mut self, enable: bool) -> Self {
        self.in_memory = enable;
        self
    }

    /// Loaders to use. Default: the public web endpoints.
    pub fn sources(mut self, sources: Sources) -> Self {
        self.sources = Some(sources);
        self
    }

    fn prepare_data_dir(&self, data_dir: &Path) -> Result<()> {
        if data_dir.exists() {
            return Ok(());
        }
        if !self.auto_create_dirs {
            return Err(YotterError::Config {
                message: format!("Data directory does not exist: {}", data_dir.display()),
            });
        }
        std::fs::create_dir_all(data_dir).map_err(|e| YotterError::Io {
            message: format!("Failed to create data directory: {}", data_dir.display()),
            path: Some(data_dir.to_path_buf()),
            source: Some(e),
        })
    }

    pub fn build(self) -> Result<Yotter> {
        let mut config = self.config.clone().unwrap_or_default();
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }

        let (cache, store, durable): (TieredCache, Arc<dyn BackingStore>, _) = if self.in_memory {
            (
                TieredCache::in_memory(config.volatile_capacity),
                Arc::new(SqliteStore::in_memory()?),
                None,
            )
        } else {
            self.prepare_data_dir(&config.data_dir)?;
            let durable = Arc::new(SqliteCache::with_config(
                config.cache_db_path(),
                CacheConfig::durable(config.durable_max_size_bytes),
            )?);
            let volatile = Arc::new(MemoryCache::new(config.volatile_capacity));
            (
                TieredCache::new(volatile, durable.clone()),
                Arc::new(SqliteStore::new(config.store_db_path())?),
                Some(durable),
            )
        };

        let sources = match self.sources {
            Some(sources) => sources,
            None => Sources::web()?,
        };

        let context = EntityContext::new(Arc::new(cache), Arc::new(PropMappers::from_config(&config)))
            .with_negative_ttl(config.negative_ttl());
        let services = Arc::new(Services::new(Arc::new(context), sources));
        let global = Scope::global(services.clone(), config.identity_map_capacity);

        info!(
            "Yotter initialized (data dir: {}, in memory: {})",
            config.data_dir.display(),
            self.in_memory
        );

        Ok(Yotter {
            config,
            services,
            global,
            store,
            durable,
        })
    }
}
