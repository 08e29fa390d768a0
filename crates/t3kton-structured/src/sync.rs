//! Status Synchronizer: reads Contractor and builds a fresh status snapshot.

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use t3kton_contractor::{Contractor, Locator, RemoteJob};
use t3kton_types::{ConfigValues, JobStatus, StructureStatus};

use crate::error::cancellable;
use crate::{ReconcileError, ReconcileResult};

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([0-9.]+)").expect("progress pattern is valid"));

static TIME_REMAINING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'time_remaining': '([0-9:]{5})'").expect("time remaining pattern is valid")
});

const COMPLETE_PROGRESS: &str = "100.0";

/// Extracts `(progress, max_time_remaining)` from a job's status blob.
///
/// # Examples
///
/// ```
/// use t3kton_structured::parse_job_progress;
///
/// let blob = "[[42.5, {'time_remaining': '01:30'}]]";
/// assert_eq!(parse_job_progress(blob), ("42.5".to_string(), "01:30".to_string()));
/// assert_eq!(parse_job_progress(""), ("0".to_string(), String::new()));
/// ```
pub fn parse_job_progress(blob: &str) -> (String, String) {
    let progress = PROGRESS_RE
        .captures(blob)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| "0".to_string(), |m| m.as_str().to_string());

    let remaining = match TIME_REMAINING_RE.captures(blob).and_then(|caps| caps.get(1)) {
        Some(m) => m.as_str().to_string(),
        None if progress == COMPLETE_PROGRESS => "00:00".to_string(),
        None => String::new(),
    };

    (progress, remaining)
}

/// Name segment of a blueprint locator such as
/// `/api/v1/BluePrint/StructureBluePrint:base:`.
fn blueprint_name(locator: &str) -> String {
    match locator.parse::<Locator>() {
        Ok(parsed) => parsed.id().to_string(),
        Err(_) => locator.split(':').nth(1).unwrap_or_default().to_string(),
    }
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn job_status(job: &RemoteJob) -> JobStatus {
    let (progress, max_time_remaining) = parse_job_progress(&job.status);
    JobStatus {
        state: job.state.clone(),
        script: job.script_name.clone(),
        message: job.message.clone(),
        can_start: job.can_start.clone(),
        created: format_timestamp(job.created),
        last_updated: format_timestamp(job.updated),
        progress,
        max_time_remaining,
    }
}

/// Builds [`StructureStatus`] snapshots from Contractor. Never writes.
#[derive(Debug, Clone)]
pub struct StatusSynchronizer {
    contractor: Contractor,
}

impl StatusSynchronizer {
    pub fn new(contractor: Contractor) -> Self {
        Self { contractor }
    }

    /// Reads structure `id`, its foundation and its current job.
    ///
    /// Any failed read aborts the snapshot.
    #[instrument(skip(self, cancel))]
    pub async fn fetch(&self, id: i64, cancel: &CancellationToken) -> ReconcileResult<StructureStatus> {
        let contractor = &self.contractor;

        let remote = cancellable(cancel, async {
            contractor
                .structure(id)
                .await
                .map_err(|e| ReconcileError::fetch(format!("structure {id}"), e))
        })
        .await?;

        let foundation_locator: Locator = remote
            .foundation
            .parse()
            .map_err(|e| ReconcileError::fetch(format!("foundation of structure {id}"), e))?;
        debug!(foundation = %foundation_locator, "Getting Foundation");

        let foundation = cancellable(cancel, async {
            contractor
                .foundation(&foundation_locator)
                .await
                .map_err(|e| ReconcileError::fetch(format!("foundation {foundation_locator}"), e))
        })
        .await?;

        let mut status = StructureStatus {
            state: remote.state,
            blueprint: blueprint_name(&remote.blueprint),
            hostname: remote.hostname,
            foundation: if foundation.locator.is_empty() {
                foundation_locator.to_string()
            } else {
                foundation.locator
            },
            foundation_blueprint: blueprint_name(&foundation.blueprint),
            config_values: None,
            job: None,
        };
        if !remote.config_values.is_empty() {
            status.config_values = Some(ConfigValues::from_json_map(&remote.config_values));
        }

        let job_locator = cancellable(cancel, async {
            contractor
                .get_current_job(id)
                .await
                .map_err(|e| ReconcileError::fetch(format!("current job of structure {id}"), e))
        })
        .await?;

        if let Some(job_locator) = job_locator {
            debug!(job = %job_locator, "Getting Job");
            let job = cancellable(cancel, async {
                contractor
                    .structure_job(&job_locator)
                    .await
                    .map_err(|e| ReconcileError::fetch(format!("job {job_locator}"), e))
            })
            .await?;
            status.job = Some(job_status(&job));
        }

        Ok(status)
    }
}
