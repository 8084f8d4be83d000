use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::cache::{OPTIMIZATION_FILE, ResultCache, SOFTWARE_AUDIT_FILE};
use crate::catalog::{BuiltinCatalog, CatalogProvider, FileCatalog};
use crate::config::EffectiveConfig;
use crate::core::{AuditResult, OptimizationReport, SCHEMA_VERSION};
use crate::inventory::InventorySource;
use crate::optimize::ScanContext;
use crate::probe::{HostProbe, SystemProbe};
use crate::reconcile::{AuditRequest, Reconciler};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
    pub show_progress: bool,
    pub use_cache: bool,
    pub persist: bool,
}

pub struct Engine {
    opts: EngineOptions,
    cfg: EffectiveConfig,
    session_id: String,
    started: Instant,
}

impl Engine {
    pub fn new(opts: EngineOptions, cfg: EffectiveConfig) -> Self {
        Self {
            opts,
            cfg,
            session_id: crate::report::new_session_id(),
            started: Instant::now(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.opts.timeout
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.cfg.paths.data_dir
    }

    /// The whole run shares one deadline so a slow host cannot stall every
    /// check in turn.
    pub fn host_probe(&self) -> HostProbe {
        HostProbe::new(
            std::cmp::min(self.opts.timeout, Duration::from_secs(30)),
            Some(self.started + self.opts.timeout.saturating_mul(4)),
        )
    }

    pub fn catalog(&self, override_path: Option<PathBuf>) -> Box<dyn CatalogProvider> {
        match override_path.or_else(|| self.cfg.catalog.path.clone()) {
            Some(path) => Box::new(FileCatalog::new(path)),
            None => Box::new(BuiltinCatalog),
        }
    }

    fn cache(&self, file_name: &str) -> Option<ResultCache> {
        if !self.opts.use_cache {
            return None;
        }
        let cache = ResultCache::in_dir(
            &self.cfg.paths.data_dir,
            file_name,
            self.cfg.cache.max_age(),
        );
        cache.is_enabled().then_some(cache)
    }

    pub fn audit_software(
        &self,
        request: &AuditRequest,
        sources: &[Box<dyn InventorySource>],
        catalog: &dyn CatalogProvider,
        probe: &dyn SystemProbe,
    ) -> Result<AuditResult> {
        let cache = self.cache(SOFTWARE_AUDIT_FILE);
        if let Some(cached) = cache.as_ref().and_then(|c| c.load::<AuditResult>()) {
            if cached.category_filter == request.category
                && cached.include_installed == request.include_installed
                && cached.catalog_source == catalog.source()
            {
                tracing::info!("using cached software audit");
                return Ok(cached);
            }
            tracing::debug!("cached software audit does not match the request");
        }

        let pb = self.spinner("Collecting installed software...");
        let inventory = crate::inventory::collect(sources);
        tracing::info!(
            records = inventory.records.len(),
            failed_sources = inventory.failures.len(),
            "inventory collected"
        );

        if let Some(pb) = &pb {
            pb.set_message("Reconciling against catalog...");
        }
        let result = Reconciler::new(catalog, probe).reconcile(&inventory.records, request);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let mut result = result.context("software audit failed")?;
        for failure in &inventory.failures {
            result.notes.push(format!(
                "source unavailable: {} ({})",
                failure.source, failure.error
            ));
        }
        tracing::info!(
            installed = result.summary.installed_count,
            missing = result.summary.missing_count,
            skipped = result.summary.skipped_count,
            "software audit finished"
        );

        if let Some(cache) = &cache {
            if let Err(err) = cache.store(&result) {
                tracing::warn!("failed to cache software audit: {err:#}");
            }
        }
        self.persist(SOFTWARE_AUDIT_FILE, &result);
        Ok(result)
    }

    pub fn optimize(&self, ctx: &ScanContext<'_>) -> Result<OptimizationReport> {
        let cache = self.cache(OPTIMIZATION_FILE);
        if let Some(cached) = cache.as_ref().and_then(|c| c.load::<OptimizationReport>()) {
            tracing::info!("using cached optimization scan");
            return Ok(cached);
        }

        let pb = self.spinner("Scanning for optimization opportunities...");
        let scans = crate::optimize::run_all(ctx);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let opportunities: Vec<_> = scans
            .iter()
            .flat_map(|s| s.opportunities.iter().cloned())
            .collect();
        let score = crate::scoring::score(&opportunities);
        let recommendations = crate::scoring::recommendations(&opportunities);
        tracing::info!(
            opportunities = opportunities.len(),
            score = score.overall,
            "optimization scan finished"
        );

        let report = OptimizationReport {
            schema_version: SCHEMA_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            os: crate::platform::os_info(),
            generated_at: now_rfc3339(),
            scans,
            opportunities,
            score,
            recommendations,
        };

        if let Some(cache) = &cache {
            if let Err(err) = cache.store(&report) {
                tracing::warn!("failed to cache optimization scan: {err:#}");
            }
        }
        self.persist(OPTIMIZATION_FILE, &report);
        Ok(report)
    }

    fn persist<T: serde::Serialize>(&self, file_name: &str, value: &T) {
        if !self.opts.persist {
            return;
        }
        match crate::report::persist_result(
            &self.cfg.paths.data_dir,
            &self.session_id,
            file_name,
            value,
        ) {
            Ok(path) => tracing::debug!(path = %path.display(), "session result saved"),
            Err(err) => tracing::warn!("failed to save session result: {err:#}"),
        }
    }

    fn spinner(&self, message: &'static str) -> Option<indicatif::ProgressBar> {
        use std::io::IsTerminal;

        if !(self.opts.show_progress && std::io::stderr().is_terminal()) {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
