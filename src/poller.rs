//! Client-side poll loop and local transcript
//!
//! The loop drains the relay on a fixed interval and appends whatever comes
//! back to the transcript. A failed tick is logged and skipped; the next tick
//! simply tries again.

use crate::client::RelayClient;
use crate::error::Result;
use crate::message::Message;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Ordered record of everything the client has sent or received
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append drained messages in the order the relay returned them
    pub fn extend_received(&mut self, messages: Vec<Message>) -> usize {
        let count = messages.len();
        self.entries.extend(messages);
        count
    }

    pub fn push_sent(&mut self, body: &str) -> &Message {
        self.entries.push(Message::sent(body));
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One line per message: `[HH:MM:SS] sender: body`
pub fn render_line(msg: &Message) -> String {
    format!(
        "[{}] {}: {}",
        msg.received_at.with_timezone(&Local).format("%H:%M:%S"),
        msg.sender,
        msg.body
    )
}

/// Send through the relay and record the message locally. Nothing is
/// recorded when the send fails.
pub async fn send_and_record(
    client: &RelayClient,
    transcript: &Mutex<Transcript>,
    to: &str,
    body: &str,
) -> Result<Message> {
    let receipt = client.send(to, body).await?;
    debug!("Sent {} ({})", receipt.sid, receipt.status);

    let mut transcript = transcript.lock().await;
    Ok(transcript.push_sent(body).clone())
}

type MessageCallback = Arc<dyn Fn(&[Message]) + Send + Sync>;

/// Shortest accepted tick interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct PollLoop {
    client: RelayClient,
    interval: Duration,
    transcript: Arc<Mutex<Transcript>>,
    on_messages: Option<MessageCallback>,
}

impl PollLoop {
    /// Intervals below `MIN_POLL_INTERVAL` are raised to it.
    pub fn new(
        client: RelayClient,
        interval: Duration,
        transcript: Arc<Mutex<Transcript>>,
    ) -> Self {
        Self {
            client,
            interval: interval.max(MIN_POLL_INTERVAL),
            transcript,
            on_messages: None,
        }
    }

    /// Called with each non-empty batch after it has been merged
    pub fn on_messages<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Message]) + Send + Sync + 'static,
    {
        self.on_messages = Some(Arc::new(f));
        self
    }

    /// Drain once and merge. Returns how many messages were added.
    pub async fn tick(&self) -> Result<usize> {
        let messages = self.client.poll().await?;
        if messages.is_empty() {
            return Ok(0);
        }

        let mut transcript = self.transcript.lock().await;
        let start = transcript.len();
        let added = transcript.extend_received(messages);
        if let Some(ref cb) = self.on_messages {
            cb(&transcript.entries()[start..]);
        }
        debug!("Merged {} messages into transcript", added);
        Ok(added)
    }

    /// Start ticking in the background. The first poll happens one interval
    /// after spawning.
    pub fn spawn(self) -> PollHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                // A dropped handle also resolves `changed()`, ending the loop
                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => break,
                    result = self.tick() => {
                        if let Err(e) = result {
                            warn!("Poll tick skipped: {}", e);
                        }
                    }
                }
            }
            debug!("Poll loop stopped");
        });

        PollHandle { cancel_tx, task }
    }
}

/// Owner of a running poll loop. Dropping it stops the loop.
pub struct PollHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the loop and wait for it to exit. No tick runs after this returns.
    pub async fn cancel(self) {
        let _ = self.cancel_tx.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn test_transcript_preserves_order() {
        let mut transcript = Transcript::new();
        transcript.push_sent("first");
        let added = transcript.extend_received(vec![
            Message::received("+15551234567", "second", Some("SM2")),
            Message::received("+15551234567", "third", Some("SM3")),
        ]);

        assert_eq!(added, 2);
        let bodies: Vec<&str> = transcript.entries().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        assert_eq!(transcript.entries()[0].kind, MessageKind::Sent);
    }

    #[test]
    fn test_transcript_empty() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert_eq!(transcript.extend_received(Vec::new()), 0);
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_render_line() {
        let msg = Message::received("+15551234567", "hello", Some("SM1"));
        let line = render_line(&msg);
        assert!(line.starts_with('['));
        assert!(line.ends_with("+15551234567: hello"));
    }

    #[tokio::test]
    async fn test_zero_interval_clamped() {
        let client = RelayClient::new("http://127.0.0.1:9").unwrap();
        let transcript = Arc::new(Mutex::new(Transcript::new()));
        let poll_loop = PollLoop::new(client, Duration::ZERO, transcript);
        assert_eq!(poll_loop.interval, MIN_POLL_INTERVAL);

        let handle = poll_loop.spawn();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());
        handle.cancel().await;
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_loop() {
        let client = RelayClient::new("http://127.0.0.1:9").unwrap();
        let transcript = Arc::new(Mutex::new(Transcript::new()));
        let handle = PollLoop::new(client, Duration::from_millis(10), transcript).spawn();

        let PollHandle { cancel_tx, task } = handle;
        drop(cancel_tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
