// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator-facing publication queue.

use std::sync::Arc;

use chrono::Utc;
use syncrelay_core::{
    CatalogStore, NewPublication, PublicationJob, PublicationStatus, PublicationStore, RelayError,
};
use tracing::info;

pub struct PublicationQueue {
    jobs: Arc<dyn PublicationStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl PublicationQueue {
    pub fn new(jobs: Arc<dyn PublicationStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { jobs, catalog }
    }

    /// Enqueues a publication.
    ///
    /// The preset and media asset must exist. Jobs without a schedule, or
    /// scheduled in the past, start Queued; future ones start as Draft.
    pub async fn create(&self, publication: &NewPublication) -> Result<PublicationJob, RelayError> {
        if self
            .catalog
            .get_preset(publication.preset_id)
            .await?
            .is_none()
        {
            return Err(RelayError::not_found("preset", publication.preset_id));
        }
        if let Some(media_id) = publication.media_id {
            if self.catalog.get_media(media_id).await?.is_none() {
                return Err(RelayError::not_found("media", media_id));
            }
        }

        let status = if publication
            .scheduled_at
            .is_none_or(|at| at <= Utc::now())
        {
            PublicationStatus::Queued
        } else {
            PublicationStatus::Draft
        };
        let job = self.jobs.insert_publication(publication, status).await?;
        info!(
            job_id = job.id,
            preset_id = job.preset_id,
            status = %job.status,
            scheduled_at = ?job.scheduled_at,
            "publication created"
        );
        Ok(job)
    }

    pub async fn get(&self, id: i64) -> Result<PublicationJob, RelayError> {
        self.jobs
            .get_publication(id)
            .await?
            .ok_or_else(|| RelayError::not_found("publication", id))
    }

    /// Newest first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<PublicationStatus>,
        limit: usize,
    ) -> Result<Vec<PublicationJob>, RelayError> {
        self.jobs.list_publications(status, limit).await
    }

    /// Removes a job that is not being published right now.
    ///
    /// The status check and the delete are one statement, so a worker
    /// claiming the job concurrently either wins and the delete fails with
    /// [`RelayError::InvalidState`], or finds nothing to claim.
    pub async fn delete(&self, id: i64) -> Result<(), RelayError> {
        self.jobs.delete_publication(id).await?;
        info!(job_id = id, "publication deleted");
        Ok(())
    }

    /// Draft -> Queued ahead of its schedule.
    pub async fn promote(&self, id: i64) -> Result<PublicationJob, RelayError> {
        self.move_to_queued(id, PublicationStatus::Draft).await
    }

    /// Failed -> Queued. The previous error is cleared.
    pub async fn requeue(&self, id: i64) -> Result<PublicationJob, RelayError> {
        self.move_to_queued(id, PublicationStatus::Failed).await
    }

    /// Number of jobs per status.
    pub async fn counts(&self) -> Result<Vec<(PublicationStatus, u64)>, RelayError> {
        self.jobs.count_publications().await
    }

    async fn move_to_queued(
        &self,
        id: i64,
        from: PublicationStatus,
    ) -> Result<PublicationJob, RelayError> {
        let to = PublicationStatus::Queued;
        if !self.jobs.transition_publication(id, from, to).await? {
            let current = self.get(id).await?;
            return Err(RelayError::InvalidState {
                entity: "publication",
                id,
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }
        info!(job_id = id, from = %from, "publication queued");
        self.get(id).await
    }
}
