// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print pipeline: converts an accepted job's document to ESC/POS and
// streams it to the device backend. Spawned once per accepted job; holds
// only a `JobId`, never a reference back into the job itself, so the job
// store stays the sole owner of job state.

use thermal_core::types::{JobId, JobState};
use thermal_document::convert_to_escpos;
use tracing::{info, instrument, warn};

use crate::device::DeviceHandle;
use crate::job_store::JobStore;

/// Run the print pipeline for a single job to completion.
///
/// Steps (in order): bail out if the job is no longer pending; transition
/// to processing; convert the document; acquire the device writer and
/// stream the result; transition to completed or aborted; schedule
/// eviction after the retention window. Cancellation is honored only at
/// the two checkpoints noted below -- once bytes have reached the device,
/// cancellation can no longer retract them.
#[instrument(skip(store, device), fields(job_id = job_id.0))]
pub async fn run(store: JobStore, device: DeviceHandle, job_id: JobId, max_pixels: u32, dpi: u32) {
    let Some(job) = store.snapshot(job_id).await else {
        warn!("pipeline invoked for unknown job");
        return;
    };
    if job.state != JobState::Pending {
        return;
    }

    if store.transition(job_id, JobState::Processing).await.is_err() {
        return;
    }

    if store.is_canceled(job_id).await {
        return;
    }

    let escpos = match convert_to_escpos(&job.document_bytes, job.format, max_pixels, dpi).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "document conversion failed");
            store.set_error(job_id, e.to_string()).await;
            let _ = store.transition(job_id, JobState::Aborted).await;
            return;
        }
    };

    if store.is_canceled(job_id).await {
        return;
    }

    match device.send_raw(&escpos).await {
        Ok(()) => {
            info!("job printed successfully");
            let _ = store.transition(job_id, JobState::Completed).await;
        }
        Err(e) => {
            warn!(error = %e, "device write failed");
            store.set_error(job_id, e.to_string()).await;
            let _ = store.transition(job_id, JobState::Aborted).await;
        }
    }

    store.schedule_eviction(job_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use thermal_core::types::DocumentFormat;

    #[tokio::test]
    async fn pending_job_converts_and_completes() {
        let store = JobStore::new();
        let device = DeviceHandle::new(None, None, 5000);
        // no real device available in test; pipeline will fail to connect
        // and abort the job -- still exercises the conversion step.
        let gray = image::GrayImage::from_pixel(8, 8, image::Luma([255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(gray)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let job = store
            .accept("doc".into(), "user".into(), DocumentFormat::Png, Bytes::from(png))
            .await;

        run(store.clone(), device, job.id, 576, 203).await;

        let snap = store.snapshot(job.id).await.unwrap();
        assert!(snap.state.is_terminal());
    }

    #[tokio::test]
    async fn canceled_job_is_left_alone() {
        let store = JobStore::new();
        let device = DeviceHandle::new(None, None, 5000);
        let job = store
            .accept("doc".into(), "user".into(), DocumentFormat::EscPos, Bytes::from_static(b"\x1b@"))
            .await;
        store.cancel(job.id).await.unwrap();

        run(store.clone(), device, job.id, 576, 203).await;

        let snap = store.snapshot(job.id).await.unwrap();
        assert_eq!(snap.state, JobState::Canceled);
    }
}
