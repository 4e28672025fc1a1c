use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::domain::{ChatMessage, MessageId, ProjectId};
use crate::ports::{ChatRepository, RepositoryError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Disconnected,
    Polling { consecutive_failures: u32 },
}

/// Delay before the next poll: the base interval, doubled per consecutive
/// failure, capped at `max`.
pub fn backoff_delay(interval: Duration, max: Duration, failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures.min(16)).unwrap_or(u32::MAX);
    interval.saturating_mul(factor).min(max.max(interval))
}

/// Messages in `messages` whose ids were not in the previous response.
/// `seen` is replaced by the ids of this response, so it never outgrows the
/// server's window.
fn fresh_messages(seen: &mut HashSet<MessageId>, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let current: HashSet<MessageId> = messages.iter().map(|m| m.id.clone()).collect();
    let fresh = messages
        .into_iter()
        .filter(|m| !seen.contains(&m.id))
        .collect();
    *seen = current;
    fresh
}

/// Pull-based chat refresh for one project.
pub struct ChatPoller {
    repository: Arc<dyn ChatRepository>,
    project_id: ProjectId,
    interval: Duration,
    max_backoff: Duration,
}

/// Owning handle for a running poller. Stopping it, or dropping it, ends
/// polling.
pub struct ChatWatch {
    state: watch::Receiver<PollerState>,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ChatWatch {
    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Chat poller ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ChatWatch {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl ChatPoller {
    pub fn new(repository: Arc<dyn ChatRepository>, project_id: ProjectId) -> Self {
        Self {
            repository,
            project_id,
            interval: DEFAULT_POLL_INTERVAL,
            max_backoff: MAX_BACKOFF,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawns the polling loop. New messages, de-duplicated by id, are sent
    /// in batches on `sink`; the first batch is the current history.
    pub fn start(self, sink: mpsc::Sender<Vec<ChatMessage>>) -> ChatWatch {
        let (state_tx, state_rx) = watch::channel(PollerState::Disconnected);
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(sink, state_tx, stop_rx));

        ChatWatch {
            state: state_rx,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    async fn run(
        self,
        sink: mpsc::Sender<Vec<ChatMessage>>,
        state: watch::Sender<PollerState>,
        mut stop: oneshot::Receiver<()>,
    ) {
        let mut seen: HashSet<MessageId> = HashSet::new();
        let mut failures = 0u32;
        state.send_replace(PollerState::Polling {
            consecutive_failures: 0,
        });
        tracing::info!("Chat polling started for project {}", self.project_id);

        loop {
            let result = tokio::select! {
                biased;
                _ = &mut stop => break,
                result = self.repository.list_messages(&self.project_id) => result,
            };

            match result {
                Ok(messages) => {
                    failures = 0;
                    let fresh = fresh_messages(&mut seen, messages);
                    if !fresh.is_empty() {
                        let sent = tokio::select! {
                            biased;
                            _ = &mut stop => break,
                            sent = sink.send(fresh) => sent,
                        };
                        if sent.is_err() {
                            tracing::debug!("Chat receiver gone, stopping poller");
                            break;
                        }
                    }
                }
                Err(RepositoryError::Authentication(msg)) => {
                    tracing::warn!("Chat polling stopped, authentication failed: {}", msg);
                    break;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!("Chat poll failed ({} in a row): {}", failures, e);
                }
            }

            state.send_replace(PollerState::Polling {
                consecutive_failures: failures,
            });

            let delay = backoff_delay(self.interval, self.max_backoff, failures);
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        state.send_replace(PollerState::Disconnected);
        tracing::info!("Chat polling stopped for project {}", self.project_id);
    }
}
