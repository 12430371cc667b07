//! Deferred work produced by the execute pass.
//!
//! Jobs land in two ordered queues. [`TaskQueue::run`] drains the conversion stage
//! completely before starting the postprocess stage. Inside a stage jobs run on the current
//! rayon pool. A postprocess job is skipped when the conversion job it depends on failed.

use std::{collections::BTreeSet, path::Path};

use rayon::prelude::*;

use crate::progress::ProgressReporter;

pub type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(usize);

struct QueuedJob {
    id: JobId,
    description: String,
    depends_on: Option<JobId>,
    job: Job,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Postprocess jobs not run because their conversion job failed.
    pub skipped: usize,
}

#[derive(Default)]
pub struct TaskQueue {
    conversion: Vec<QueuedJob>,
    postprocess: Vec<QueuedJob>,
    next_id: usize,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn push_conversion<F>(&mut self, description: impl Into<String>, job: F) -> JobId
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.allocate();
        self.conversion.push(QueuedJob {
            id,
            description: description.into(),
            depends_on: None,
            job: Box::new(job),
        });
        id
    }

    pub fn push_postprocess<F>(
        &mut self,
        depends_on: JobId,
        description: impl Into<String>,
        job: F,
    ) -> JobId
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.allocate();
        self.postprocess.push(QueuedJob {
            id,
            description: description.into(),
            depends_on: Some(depends_on),
            job: Box::new(job),
        });
        id
    }

    pub fn conversion_len(&self) -> usize {
        self.conversion.len()
    }

    pub fn postprocess_len(&self) -> usize {
        self.postprocess.len()
    }

    pub fn len(&self) -> usize {
        self.conversion.len() + self.postprocess.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains both stages. Call inside `ThreadPool::install` to bound the worker count.
    pub fn run(self, progress_path: Option<&Path>) -> RunReport {
        let mut report = RunReport::default();

        let progress = ProgressReporter::new(progress_path, "conversion", self.conversion.len());
        let results = run_stage(self.conversion, &progress);
        progress.finish();
        let failed: BTreeSet<JobId> = results
            .iter()
            .filter_map(|&(id, ok)| (!ok).then_some(id))
            .collect();
        report.failed += failed.len();
        report.succeeded += results.len() - failed.len();

        let (runnable, skipped): (Vec<_>, Vec<_>) = self
            .postprocess
            .into_iter()
            .partition(|job| job.depends_on.map_or(true, |dep| !failed.contains(&dep)));
        for job in &skipped {
            log::warn!(
                "Skipping '{}': the conversion it depends on failed",
                job.description
            );
        }
        report.skipped = skipped.len();

        let progress = ProgressReporter::new(progress_path, "postprocess", runnable.len());
        let results = run_stage(runnable, &progress);
        progress.finish();
        let post_failed = results.iter().filter(|(_, ok)| !ok).count();
        report.failed += post_failed;
        report.succeeded += results.len() - post_failed;

        log::info!(
            "Finished: {} succeeded, {} failed, {} skipped",
            report.succeeded,
            report.failed,
            report.skipped
        );
        report
    }
}

fn run_stage(jobs: Vec<QueuedJob>, progress: &ProgressReporter) -> Vec<(JobId, bool)> {
    jobs.into_par_iter()
        .map(|queued| {
            let ok = match (queued.job)() {
                Ok(()) => true,
                Err(e) => {
                    log::error!("{} failed: {:#}", queued.description, e);
                    false
                }
            };
            progress.advance(&queued.description);
            (queued.id, ok)
        })
        .collect()
}
