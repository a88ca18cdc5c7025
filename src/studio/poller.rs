//! Completion Poller
//!
//! Waits for a project to reach a terminal state. The realtime channel
//! is tried first to avoid busy-polling; any failure on that path falls
//! back to stage-aware HTTP polling. The two stages are explicit so the
//! handoff is observable and tests can force the HTTP path.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::types::{ProgressUpdate, ProjectStatus, ProjectStatusSource};

use super::client::StudioClient;
use super::error::{StudioError, StudioResult};
use super::socket::SocketClient;

/// Poll interval when the status is unknown.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;

/// Normalize a raw status string for comparisons.
pub fn normalize_status(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `completed` and `failed` are terminal; no further transitions occur.
pub fn is_terminal_status(normalized: &str) -> bool {
    normalized == "completed" || normalized == "failed"
}

/// Recommended poll interval for a status. Early stages change quickly,
/// rendering and manual review do not.
pub fn interval_for_status(raw: &str) -> Duration {
    match normalize_status(raw).as_str() {
        "start" | "uploading" => Duration::from_secs(3),
        "editing" => Duration::from_secs(10),
        "manual" | "rendering" => Duration::from_secs(15),
        "completed" | "failed" => Duration::ZERO,
        _ => DEFAULT_INTERVAL,
    }
}

/// Which stage produced the final status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPath {
    Realtime,
    Http,
}

#[derive(Clone, Debug)]
pub struct PollOptions {
    pub timeout_minutes: u64,
    /// Skip the realtime stage entirely and go straight to HTTP polling.
    pub force_http: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            force_http: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PollOutcome {
    pub status: ProjectStatus,
    pub via: PollPath,
}

pub struct CompletionPoller {
    client: Arc<StudioClient>,
    socket_url: Option<String>,
}

impl CompletionPoller {
    pub fn new(client: Arc<StudioClient>, socket_url: Option<String>) -> Self {
        Self { client, socket_url }
    }

    /// Wait until the project reaches a terminal state.
    ///
    /// Realtime failures never surface to the caller: the poller logs
    /// them and restarts on the HTTP stage with a fresh deadline. Only
    /// an HTTP-stage timeout is fatal.
    pub async fn wait(
        &self,
        project_id: &str,
        options: PollOptions,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> StudioResult<PollOutcome> {
        if !options.force_http {
            match self
                .realtime_stage(project_id, options.timeout_minutes, on_progress)
                .await
            {
                Ok(status) => {
                    return Ok(PollOutcome {
                        status,
                        via: PollPath::Realtime,
                    })
                }
                Err(err) => {
                    debug!(
                        "realtime stage failed for {} ({}), falling back to HTTP polling",
                        project_id, err
                    );
                }
            }
        }

        let status = poll_http(
            self.client.as_ref(),
            project_id,
            options.timeout_minutes,
            on_progress,
        )
        .await?;
        Ok(PollOutcome {
            status,
            via: PollPath::Http,
        })
    }

    async fn realtime_stage(
        &self,
        project_id: &str,
        timeout_minutes: u64,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> StudioResult<ProjectStatus> {
        let mut socket = SocketClient::new(Arc::clone(&self.client), self.socket_url.as_deref())?;
        socket.connect().await?;

        // The project may have finished between submission and channel
        // connection; check once before waiting on events.
        match self.client.get_project_status(project_id).await {
            Ok(status) if is_terminal_status(&normalize_status(&status.status)) => {
                socket.disconnect().await;
                return Ok(status);
            }
            Ok(_) | Err(_) => {}
        }

        let result = socket
            .wait_for_completion(
                project_id,
                Duration::from_secs(timeout_minutes * 60),
                on_progress,
            )
            .await;
        socket.disconnect().await;
        result
    }
}

/// Stage-aware HTTP polling: fetch status, report transitions, sleep
/// the per-status interval, return on terminal status. The deadline is
/// computed fresh when this stage starts (it is not inherited from a
/// realtime attempt).
pub async fn poll_http(
    source: &dyn ProjectStatusSource,
    project_id: &str,
    timeout_minutes: u64,
    on_progress: &mut dyn FnMut(ProgressUpdate),
) -> StudioResult<ProjectStatus> {
    let deadline = Instant::now() + Duration::from_secs(timeout_minutes * 60);
    let mut last_status: Option<String> = None;

    while Instant::now() < deadline {
        let status = source.fetch_status(project_id).await?;
        let normalized = normalize_status(&status.status);

        // Only report transitions; repeated identical statuses are noise.
        if last_status.as_deref() != Some(normalized.as_str()) {
            last_status = Some(normalized.clone());
            on_progress(ProgressUpdate {
                project_id: project_id.to_string(),
                status: status.status.clone(),
                progress: status.progress,
                retention_time_remaining: status.retention_time_remaining.clone(),
            });
        }

        if is_terminal_status(&normalized) {
            return Ok(status);
        }

        let interval = interval_for_status(&status.status);
        if !interval.is_zero() {
            sleep(interval).await;
        }
    }

    Err(StudioError::timeout(format!(
        "Polling timed out after {} minutes",
        timeout_minutes
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedSource {
        statuses: Mutex<Vec<&'static str>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(statuses: Vec<&'static str>) -> Self {
            Self {
                statuses: Mutex::new(statuses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ProjectStatusSource for ScriptedSource {
        async fn fetch_status(&self, _project_id: &str) -> StudioResult<ProjectStatus> {
            *self.calls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.remove(0)
            } else {
                statuses[0]
            };
            Ok(ProjectStatus {
                status: status.to_string(),
                ..ProjectStatus::default()
            })
        }
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("  Completed "), "completed");
        assert_eq!(normalize_status(""), "");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(is_terminal_status("completed"));
        assert!(is_terminal_status("failed"));
        assert!(!is_terminal_status("rendering"));
        assert!(!is_terminal_status(""));
    }

    #[test]
    fn test_interval_for_status() {
        assert_eq!(interval_for_status("Uploading"), Duration::from_secs(3));
        assert_eq!(interval_for_status("start"), Duration::from_secs(3));
        assert_eq!(interval_for_status("editing"), Duration::from_secs(10));
        assert_eq!(interval_for_status("manual"), Duration::from_secs(15));
        assert_eq!(interval_for_status("rendering"), Duration::from_secs(15));
        assert_eq!(interval_for_status("completed"), Duration::ZERO);
        assert_eq!(interval_for_status("mystery"), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_http_reports_transitions_once() {
        let source = ScriptedSource::new(vec!["editing", "editing", "completed"]);
        let mut updates: Vec<String> = Vec::new();

        let status = poll_http(&source, "proj-1", 30, &mut |update| {
            updates.push(update.status.clone());
        })
        .await
        .unwrap();

        assert_eq!(status.status, "completed");
        assert_eq!(source.calls(), 3);
        // One callback for editing (no duplicate), one for completed.
        assert_eq!(updates, vec!["editing".to_string(), "completed".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_http_returns_immediately_on_terminal() {
        let source = ScriptedSource::new(vec!["failed"]);
        let mut count = 0;
        let status = poll_http(&source, "proj-1", 30, &mut |_| count += 1)
            .await
            .unwrap();
        assert_eq!(status.status, "failed");
        assert_eq!(source.calls(), 1);
        assert_eq!(count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_http_times_out() {
        let source = ScriptedSource::new(vec!["editing"]);
        let err = poll_http(&source, "proj-1", 1, &mut |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.code, "timeout");
        assert!(err.message.contains("1 minutes"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_http_propagates_fetch_errors() {
        struct FailingSource;

        #[async_trait]
        impl ProjectStatusSource for FailingSource {
            async fn fetch_status(&self, _project_id: &str) -> StudioResult<ProjectStatus> {
                Err(StudioError::network("boom"))
            }
        }

        let err = poll_http(&FailingSource, "proj-1", 30, &mut |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.code, "network_error");
    }
}
