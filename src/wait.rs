use crate::config::PollConfig;
use crate::error::{ApiError, WaitError};
use crate::provider::InstanceStatus;
use std::future::Future;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Repeatedly probes the instance status until it reports `running`. Returns the number of
/// probes it took.
///
/// Statuses other than `running` never fail the wait, so a pod stuck in an error state is only
/// left behind by `max_attempts`, `deadline` or the cancellation token.
pub async fn wait_until_ready<F, Fut>(
    mut probe: F,
    poll: &PollConfig,
    cancel: &CancellationToken,
) -> Result<u32, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<InstanceStatus, ApiError>>,
{
    let start = Instant::now();
    let mut attempts = 0;
    let mut last_status: Option<InstanceStatus> = None;

    loop {
        attempts += 1;
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            status = probe() => status.map_err(WaitError::Probe)?,
        };
        debug!(
            attempt = attempts,
            status = %status,
            elapsed_secs = start.elapsed().as_secs(),
            "Polling instance status"
        );
        if status.is_ready() {
            return Ok(attempts);
        }
        if matches!(status, InstanceStatus::Other(_)) && last_status.as_ref() != Some(&status) {
            warn!(status = %status, "Unrecognized instance status, still waiting");
        }
        last_status = Some(status);

        if poll.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(WaitError::TimedOut { attempts });
        }
        let mut pause = poll.interval;
        if let Some(deadline) = poll.deadline {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Err(WaitError::TimedOut { attempts });
            }
            pause = pause.min(deadline - elapsed);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            _ = sleep(pause) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn scripted<'a>(
        calls: &'a Cell<u32>,
        script: &'a [&'a str],
    ) -> impl FnMut() -> std::future::Ready<Result<InstanceStatus, ApiError>> + 'a {
        move || {
            let n = calls.get();
            calls.set(n + 1);
            let raw = script.get(n as usize).or(script.last()).copied().unwrap_or("pending");
            std::future::ready(Ok(InstanceStatus::parse(raw)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_pending() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let attempts = wait_until_ready(
            scripted(&calls, &["pending", "pending", "running"]),
            &PollConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_keeps_polling() {
        let calls = Cell::new(0);
        let attempts = wait_until_ready(
            scripted(&calls, &["provisioning", "failed", "failed", "running"]),
            &PollConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_cancelled() {
        let calls = Cell::new(0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(62)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = wait_until_ready(
            scripted(&calls, &["pending"]),
            &PollConfig::default(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled));
        // t = 0, 5, ..., 60
        assert_eq!(calls.get(), 13);
        assert_eq!(start.elapsed(), Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts() {
        let calls = Cell::new(0);
        let poll = PollConfig {
            max_attempts: Some(4),
            ..PollConfig::default()
        };
        let err = wait_until_ready(scripted(&calls, &["pending"]), &poll, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::TimedOut { attempts: 4 }));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let calls = Cell::new(0);
        let poll = PollConfig {
            deadline: Some(Duration::from_secs(12)),
            ..PollConfig::default()
        };
        let start = Instant::now();
        let err = wait_until_ready(scripted(&calls, &["pending"]), &poll, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::TimedOut { .. }));
        // t = 0, 5, 10, 12
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_probe_error_aborts() {
        let calls = Cell::new(0);
        let err = wait_until_ready(
            || {
                calls.set(calls.get() + 1);
                std::future::ready(Err(ApiError::MissingField("status")))
            },
            &PollConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Probe(ApiError::MissingField("status"))));
        assert_eq!(calls.get(), 1);
    }
}
