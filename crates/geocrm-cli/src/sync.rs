//! Wiring for the `sync` and `run` commands.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use geocrm_core::AppConfig;
use geocrm_crm::OdooDirectory;
use geocrm_geocode::GeocodeResolver;
use geocrm_sync::{
    PassOutcome, PassReport, PgStore, Reconciler, SyncSession, SyncSettings, XlsxRoster,
};

type AppReconciler = Reconciler<XlsxRoster, OdooDirectory, GeocodeResolver, PgStore>;

/// The reconciler and the process-lifetime session it runs under.
struct SyncWorker {
    reconciler: AppReconciler,
    session: SyncSession,
}

impl SyncWorker {
    fn from_app_config(config: &AppConfig, pool: PgPool) -> anyhow::Result<Self> {
        let reconciler = Reconciler::new(
            XlsxRoster::from_app_config(config),
            OdooDirectory::from_app_config(config)?,
            GeocodeResolver::from_app_config(config)?,
            PgStore::new(pool),
            SyncSettings::from_app_config(config),
        );
        Ok(Self {
            reconciler,
            session: SyncSession::new(),
        })
    }

    async fn pass(&mut self) -> anyhow::Result<PassReport> {
        let report = self.reconciler.run_pass(&mut self.session).await?;
        log_report(&report);
        Ok(report)
    }
}

fn log_report(report: &PassReport) {
    let totals = &report.totals;
    match &report.outcome {
        PassOutcome::Completed => tracing::info!(
            entries = totals.entries,
            matched = totals.matched,
            unmatched = totals.unmatched,
            processed = totals.processed,
            failed = totals.failed,
            resumed_from = ?report.resumed_from,
            "pass completed"
        ),
        PassOutcome::Paused { reason } => tracing::warn!(
            processed = totals.processed,
            failed = totals.failed,
            reason = %reason,
            "pass paused on fatal network condition"
        ),
        PassOutcome::Skipped { resumes_at, .. } => {
            tracing::info!(%resumes_at, "pass skipped, synchronization paused");
        }
    }
    if !report.unmatched.is_empty() {
        tracing::info!(
            count = report.unmatched.len(),
            names = ?report.unmatched,
            "roster entries without a CRM partner"
        );
    }
}

/// Runs a single pass.
///
/// # Errors
///
/// Returns an error if a collaborator cannot be built or the pass fails.
pub(crate) async fn run_once(config: &AppConfig, pool: PgPool) -> anyhow::Result<()> {
    let mut worker = SyncWorker::from_app_config(config, pool)?;
    worker.pass().await?;
    Ok(())
}

/// Runs a pass immediately, then every `sync_interval_secs` until a shutdown
/// signal arrives. A tick that finds the previous pass still running is
/// skipped.
///
/// # Errors
///
/// Returns an error if a collaborator cannot be built or the scheduler
/// cannot be started.
pub(crate) async fn run_scheduled(config: &AppConfig, pool: PgPool) -> anyhow::Result<()> {
    let worker = Arc::new(Mutex::new(SyncWorker::from_app_config(config, pool)?));

    if let Err(e) = worker.lock().await.pass().await {
        tracing::error!(error = %e, "initial pass failed");
    }

    let interval = Duration::from_secs(config.sync_interval_secs.max(1));
    let mut scheduler = JobScheduler::new().await?;
    let job_worker = Arc::clone(&worker);
    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let worker = Arc::clone(&job_worker);
        Box::pin(async move {
            let Ok(mut guard) = worker.try_lock() else {
                tracing::warn!("scheduler: previous pass still running, skipping tick");
                return;
            };
            if let Err(e) = guard.pass().await {
                tracing::error!(error = %e, "scheduler: pass failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(interval_secs = interval.as_secs(), "scheduler started");

    shutdown_signal().await;
    scheduler.shutdown().await?;
    // Wait for an in-flight pass to finish.
    let _guard = worker.lock().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping scheduler");
}
