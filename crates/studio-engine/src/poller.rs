use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use studio_contracts::jobs::{PollTick, VideoJob};

use crate::error::{MediaError, StudioResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the service reports completion.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            deadline: Some(Duration::from_secs(900)),
        }
    }
}

/// Cooperative cancellation shared between a caller and a running poll loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for up to `duration`. Returns `true` as soon as the token is
    /// cancelled.
    pub fn wait(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*cancelled {
            let now = Instant::now();
            if now >= until {
                return false;
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(cancelled, until - now)
                .unwrap_or_else(PoisonError::into_inner);
            cancelled = guard;
        }
        true
    }
}

/// The wait between two status queries.
pub trait Pause: Send + Sync {
    /// Returns `true` when the wait was cut short by cancellation.
    fn pause(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CancellableSleep;

impl Pause for CancellableSleep {
    fn pause(&self, duration: Duration, cancel: &CancelToken) -> bool {
        cancel.wait(duration)
    }
}

/// Drives a submitted video job to completion: wait one interval, query,
/// repeat until `done`. Never more than one query in flight.
pub struct JobPoller<'a> {
    policy: PollPolicy,
    pause: &'a dyn Pause,
    cancel: &'a CancelToken,
}

impl<'a> JobPoller<'a> {
    pub fn new(policy: PollPolicy, pause: &'a dyn Pause, cancel: &'a CancelToken) -> Self {
        Self {
            policy,
            pause,
            cancel,
        }
    }

    pub fn run(
        &self,
        job: VideoJob,
        mut query: impl FnMut(&VideoJob) -> StudioResult<VideoJob>,
        on_tick: &mut dyn FnMut(&PollTick),
    ) -> StudioResult<VideoJob> {
        let started = Instant::now();
        let mut waited = Duration::ZERO;
        let mut cycle = 0u32;
        let mut job = job;

        while !job.is_terminal() {
            if self.cancel.is_cancelled() {
                return Err(MediaError::Cancelled);
            }
            if let Some(deadline) = self.policy.deadline {
                let elapsed = started.elapsed().max(waited);
                if elapsed >= deadline {
                    tracing::warn!(
                        operation = %job.operation,
                        waited_s = elapsed.as_secs(),
                        "video job deadline reached"
                    );
                    return Err(MediaError::PollTimeout { waited: elapsed });
                }
            }

            if self.pause.pause(self.policy.interval, self.cancel) {
                return Err(MediaError::Cancelled);
            }
            waited += self.policy.interval;
            cycle += 1;

            let next = query(&job)?;
            if self.cancel.is_cancelled() {
                return Err(MediaError::Cancelled);
            }
            tracing::debug!(
                operation = %next.operation,
                cycle,
                done = next.done,
                "polled video job"
            );
            job = next;
            on_tick(&PollTick {
                cycle,
                waited,
                job: job.clone(),
            });
        }

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::thread;

    use super::*;
    use crate::test_support::{RecordingPause, Step, StepLog};

    fn scripted(
        log: &StepLog,
        states: &[bool],
    ) -> impl FnMut(&VideoJob) -> StudioResult<VideoJob> {
        let log = log.clone();
        let mut remaining: VecDeque<bool> = states.iter().copied().collect();
        move |job: &VideoJob| {
            log.push(Step::Query(job.operation.clone()));
            let done = remaining.pop_front().unwrap_or(true);
            Ok(VideoJob {
                done,
                result_uri: done.then(|| "https://example.test/video".to_string()),
                ..job.clone()
            })
        }
    }

    fn policy(interval_s: u64, deadline_s: Option<u64>) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(interval_s),
            deadline: deadline_s.map(Duration::from_secs),
        }
    }

    #[test]
    fn every_query_is_preceded_by_a_full_interval() -> anyhow::Result<()> {
        let log = StepLog::default();
        let pause = RecordingPause::new(&log);
        let cancel = CancelToken::new();
        let poller = JobPoller::new(policy(10, None), &pause, &cancel);
        let mut ticks = Vec::new();

        let job = poller.run(
            VideoJob::submitted("operations/abc"),
            scripted(&log, &[false, false, true]),
            &mut |tick| ticks.push((tick.cycle, tick.waited, tick.job.done)),
        )?;

        assert!(job.done);
        let interval = Duration::from_secs(10);
        assert_eq!(
            log.steps(),
            vec![
                Step::Pause(interval),
                Step::Query("operations/abc".to_string()),
                Step::Pause(interval),
                Step::Query("operations/abc".to_string()),
                Step::Pause(interval),
                Step::Query("operations/abc".to_string()),
            ]
        );
        assert_eq!(
            ticks,
            vec![
                (1, Duration::from_secs(10), false),
                (2, Duration::from_secs(20), false),
                (3, Duration::from_secs(30), true),
            ]
        );
        Ok(())
    }

    #[test]
    fn already_done_job_returns_without_waiting() -> anyhow::Result<()> {
        let log = StepLog::default();
        let pause = RecordingPause::new(&log);
        let cancel = CancelToken::new();
        let mut done = VideoJob::submitted("operations/ready");
        done.done = true;

        let job = JobPoller::new(policy(10, None), &pause, &cancel).run(
            done,
            scripted(&log, &[]),
            &mut |_| {},
        )?;
        assert!(job.done);
        assert!(log.steps().is_empty());
        Ok(())
    }

    #[test]
    fn deadline_stops_polling_with_timeout() {
        let log = StepLog::default();
        let pause = RecordingPause::new(&log);
        let cancel = CancelToken::new();

        let result = JobPoller::new(policy(10, Some(30)), &pause, &cancel).run(
            VideoJob::submitted("operations/slow"),
            scripted(&log, &[false; 10]),
            &mut |_| {},
        );

        match result {
            Err(MediaError::PollTimeout { waited }) => {
                assert_eq!(waited, Duration::from_secs(30))
            }
            other => panic!("expected PollTimeout, got {other:?}"),
        }
        let queries = log
            .steps()
            .into_iter()
            .filter(|step| matches!(step, Step::Query(_)))
            .count();
        assert_eq!(queries, 3);
    }

    #[test]
    fn cancellation_during_wait_skips_the_query() {
        let log = StepLog::default();
        let pause = RecordingPause::new(&log).cancel_on_pause(2);
        let cancel = CancelToken::new();

        let result = JobPoller::new(policy(10, None), &pause, &cancel).run(
            VideoJob::submitted("operations/abc"),
            scripted(&log, &[false; 10]),
            &mut |_| {},
        );

        assert!(matches!(result, Err(MediaError::Cancelled)));
        let interval = Duration::from_secs(10);
        assert_eq!(
            log.steps(),
            vec![
                Step::Pause(interval),
                Step::Query("operations/abc".to_string()),
                Step::Pause(interval),
            ]
        );
    }

    #[test]
    fn cancel_token_wakes_a_blocked_wait() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let started = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert!(cancel.wait(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(handle.join().is_ok());
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn uncancelled_wait_runs_to_completion() {
        let cancel = CancelToken::new();
        assert!(!CancellableSleep.pause(Duration::from_millis(5), &cancel));
    }
}
