//! Background maintenance tasks tracked through the [`JobTracker`].

use chrono::Utc;
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::{services, FullRepository};
use crate::services::error::DomainResult;
use crate::services::job_tracker::{JobTracker, LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTask {
    /// Restore yearly week allowances.
    AnnualReset,
    /// Expire certificates past their end date.
    Expirations,
    /// Store a fresh capacity snapshot.
    Capacity,
    /// Zero monthly referral counters.
    ReferralCounters,
}

impl MaintenanceTask {
    pub const ALL: [MaintenanceTask; 4] = [
        MaintenanceTask::AnnualReset,
        MaintenanceTask::Expirations,
        MaintenanceTask::Capacity,
        MaintenanceTask::ReferralCounters,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MaintenanceTask::AnnualReset => "annual-reset",
            MaintenanceTask::Expirations => "expirations",
            MaintenanceTask::Capacity => "capacity",
            MaintenanceTask::ReferralCounters => "referral-counters",
        }
    }
}

impl fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown maintenance task: {}", s))
    }
}

/// Run a task to completion and return its JSON summary.
pub async fn run_task(
    repo: &dyn FullRepository,
    task: MaintenanceTask,
) -> DomainResult<serde_json::Value> {
    let today = Utc::now().date_naive();
    let summary = match task {
        MaintenanceTask::AnnualReset => {
            json!({ "certificates_reset": services::run_annual_reset(repo, today).await? })
        }
        MaintenanceTask::Expirations => {
            json!({ "certificates_expired": services::run_expirations(repo, today).await? })
        }
        MaintenanceTask::Capacity => {
            let snapshot = services::recalculate_capacity(repo).await?;
            json!({
                "utilization_pct": snapshot.utilization_pct,
                "system_status": snapshot.system_status,
                "waitlist_active": snapshot.waitlist_active,
            })
        }
        MaintenanceTask::ReferralCounters => {
            json!({ "users_reset": services::reset_referral_counters(repo).await? })
        }
    };
    Ok(summary)
}

/// Start `task` on the runtime and return the job id to poll.
pub fn spawn_task(
    repo: Arc<dyn FullRepository>,
    tracker: JobTracker,
    task: MaintenanceTask,
) -> String {
    let job_id = tracker.create_job(task.as_str());
    let id = job_id.clone();
    tokio::spawn(async move {
        tracker.log(&id, LogLevel::Info, format!("Starting {}", task));
        match run_task(repo.as_ref(), task).await {
            Ok(summary) => {
                tracker.log(&id, LogLevel::Success, format!("{} finished", task));
                tracker.complete_job(&id, Some(summary));
            }
            Err(e) => {
                log::error!("Maintenance task {} failed: {}", task, e);
                tracker.fail_job(&id, e.to_string());
            }
        }
    });
    job_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalRepository;
    use crate::services::job_tracker::JobStatus;
    use std::time::Duration;

    #[test]
    fn test_task_names() {
        for task in MaintenanceTask::ALL {
            assert_eq!(task.as_str().parse::<MaintenanceTask>().unwrap(), task);
        }
        assert!("vacuum".parse::<MaintenanceTask>().is_err());
    }

    #[tokio::test]
    async fn test_capacity_task_on_empty_store() {
        let repo = LocalRepository::new();
        let summary = run_task(&repo, MaintenanceTask::Capacity).await.unwrap();
        assert_eq!(summary["system_status"], "GREEN");
    }

    #[tokio::test]
    async fn test_spawned_job_completes() {
        let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
        let tracker = JobTracker::new();
        let job_id = spawn_task(repo, tracker.clone(), MaintenanceTask::Expirations);

        for _ in 0..50 {
            if tracker.get_job(&job_id).map(|j| j.status) != Some(JobStatus::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let job = tracker.get_job(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.unwrap()["certificates_expired"], 0);
    }
}
