// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timer-driven publication workers.
//!
//! Every tick fails claims older than the publish lease, promotes Drafts
//! whose schedule has elapsed, then runs a fixed number of workers that claim
//! due Queued jobs one at a time until none are left. Claims are conditional
//! single-row updates in storage, so workers in this or another process never
//! publish the same job twice. A claim left behind by a crashed worker ends
//! up Failed, where an operator can requeue it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use syncrelay_config::model::SchedulerConfig;
use syncrelay_core::{
    AdapterDispatcher, CatalogStore, PublicationJob, PublicationStore, PublishRequest, RelayError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Work done by one [`PublicationScheduler::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Abandoned claims moved to Failed.
    pub expired: u64,
    pub promoted: u64,
    pub published: u64,
    pub failed: u64,
}

impl TickReport {
    fn merge(&mut self, other: TickReport) {
        self.expired += other.expired;
        self.promoted += other.promoted;
        self.published += other.published;
        self.failed += other.failed;
    }

    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

pub struct PublicationScheduler {
    jobs: Arc<dyn PublicationStore>,
    catalog: Arc<dyn CatalogStore>,
    dispatcher: Arc<dyn AdapterDispatcher>,
    workers: usize,
    tick_interval: Duration,
    publish_timeout: Duration,
    publish_lease: chrono::Duration,
    promote_due_drafts: bool,
}

impl PublicationScheduler {
    pub fn new(
        config: &SchedulerConfig,
        jobs: Arc<dyn PublicationStore>,
        catalog: Arc<dyn CatalogStore>,
        dispatcher: Arc<dyn AdapterDispatcher>,
    ) -> Self {
        Self {
            jobs,
            catalog,
            dispatcher,
            workers: config.workers.max(1),
            tick_interval: config.tick_interval(),
            publish_timeout: config.publish_timeout(),
            publish_lease: chrono::Duration::from_std(config.publish_lease())
                .unwrap_or_else(|_| chrono::Duration::days(1)),
            promote_due_drafts: config.promote_due_drafts,
        }
    }

    /// One scan of the queue.
    ///
    /// Only jobs due at the start of the tick are claimed. A storage error in
    /// any worker is returned after all workers have stopped.
    pub async fn tick(&self) -> Result<TickReport, RelayError> {
        let now = Utc::now();
        let mut report = TickReport::default();
        report.expired = self
            .jobs
            .release_expired_claims(now - self.publish_lease, "publish claim expired")
            .await?;
        if report.expired > 0 {
            warn!(count = report.expired, "abandoned publication claims failed");
        }
        if self.promote_due_drafts {
            report.promoted = self.jobs.promote_due_drafts(now).await?;
            if report.promoted > 0 {
                info!(count = report.promoted, "promoted due drafts");
            }
        }

        let results =
            futures::future::join_all((0..self.workers).map(|worker| self.drain(worker, now)))
                .await;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(worker_report) => report.merge(worker_report),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Ticks every `tick_interval` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            workers = self.workers,
            tick_interval_secs = self.tick_interval.as_secs(),
            "publication scheduler started"
        );
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) if !report.is_idle() => {
                            debug!(
                                expired = report.expired,
                                promoted = report.promoted,
                                published = report.published,
                                failed = report.failed,
                                "scheduler tick"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "scheduler tick failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping publication scheduler");
                    break;
                }
            }
        }
    }

    async fn drain(&self, worker: usize, now: DateTime<Utc>) -> Result<TickReport, RelayError> {
        let mut report = TickReport::default();
        while let Some(job) = self.jobs.claim_next_publication(now).await? {
            debug!(worker, job_id = job.id, "claimed publication");
            if self.publish_claimed(job).await? {
                report.published += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    /// Publishes a job this worker holds in Publishing. Returns whether it succeeded.
    async fn publish_claimed(&self, job: PublicationJob) -> Result<bool, RelayError> {
        let request = match self.resolve(&job).await? {
            Ok(request) => request,
            Err(reason) => {
                if self.jobs.fail_publication(job.id, &reason).await? {
                    warn!(job_id = job.id, error = %reason, "publication failed");
                } else {
                    warn!(job_id = job.id, error = %reason, "claim lost before failure was stored");
                }
                return Ok(false);
            }
        };

        let outcome =
            match tokio::time::timeout(self.publish_timeout, self.dispatcher.publish(&request))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(RelayError::Timeout {
                    duration: self.publish_timeout,
                }),
            };

        match outcome {
            Ok(result) => {
                if !self
                    .jobs
                    .complete_publication(job.id, &result, Utc::now())
                    .await?
                {
                    warn!(
                        job_id = job.id,
                        platform = %request.preset.platform,
                        result = ?result,
                        "publication went out but the claim was lost, result not stored"
                    );
                    return Ok(false);
                }
                info!(
                    job_id = job.id,
                    platform = %request.preset.platform,
                    preset = %request.preset.name,
                    "publication published"
                );
                Ok(true)
            }
            Err(e) => {
                let reason = e.to_string();
                if !self.jobs.fail_publication(job.id, &reason).await? {
                    warn!(
                        job_id = job.id,
                        error = %reason,
                        "claim lost before failure was stored"
                    );
                    return Ok(false);
                }
                warn!(
                    job_id = job.id,
                    platform = %request.preset.platform,
                    error = %reason,
                    "publication failed"
                );
                Ok(false)
            }
        }
    }

    /// Loads the preset and media a job points at. `Err` carries the reason
    /// the job cannot be published.
    async fn resolve(
        &self,
        job: &PublicationJob,
    ) -> Result<Result<PublishRequest, String>, RelayError> {
        let Some(preset) = self.catalog.get_preset(job.preset_id).await? else {
            return Ok(Err(format!("preset {} not found", job.preset_id)));
        };
        if !preset.is_active {
            return Ok(Err(format!("preset `{}` is inactive", preset.name)));
        }
        let media = match job.media_id {
            Some(media_id) => match self.catalog.get_media(media_id).await? {
                Some(media) => Some(media),
                None => return Ok(Err(format!("media {media_id} not found"))),
            },
            None => None,
        };
        Ok(Ok(PublishRequest {
            job_id: job.id,
            preset,
            media,
            title: job.title.clone(),
            description: job.description.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_worker_reports() {
        let mut total = TickReport {
            promoted: 2,
            ..TickReport::default()
        };
        assert!(!total.is_idle());
        total.merge(TickReport {
            expired: 1,
            promoted: 0,
            published: 3,
            failed: 1,
        });
        assert_eq!(
            total,
            TickReport {
                expired: 1,
                promoted: 2,
                published: 3,
                failed: 1,
            }
        );
        assert!(TickReport::default().is_idle());
    }
}
