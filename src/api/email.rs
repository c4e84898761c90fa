//! Best-effort outbound email queue.
//!
//! A bounded channel feeds one persistent worker task; callers enqueue
//! and move on. Each message gets a fixed number of delivery attempts
//! with a short backoff in between; permanent failures are logged and
//! dropped, never surfaced to the request that queued them. There is
//! no persistence: messages still queued at shutdown are lost.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait EmailSender: Send + Sync {
    /// Attempt a single delivery.
    ///
    /// # Errors
    /// Returns an error when the transport rejects the message.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Stub transport: logs the send instead of talking SMTP.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EmailQueueConfig {
    capacity: usize,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl EmailQueueConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            capacity: 256,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

impl Default for EmailQueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for enqueueing messages; cheap to clone into handlers.
#[derive(Clone)]
pub struct EmailQueue {
    tx: mpsc::Sender<EmailMessage>,
}

impl EmailQueue {
    /// Start the worker and return the queue handle plus the worker's
    /// join handle. Dropping every queue handle stops the worker once
    /// the channel drains.
    #[must_use]
    pub fn start(
        config: EmailQueueConfig,
        sender: Arc<dyn EmailSender>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity);
        let handle = tokio::spawn(worker_loop(rx, sender, config));
        (Self { tx }, handle)
    }

    /// Fire-and-forget enqueue; a full queue drops the message with a
    /// warning rather than blocking the request.
    pub fn enqueue(&self, message: EmailMessage) {
        if let Err(err) = self.tx.try_send(message) {
            warn!("email queue full or closed, dropping message: {err}");
        }
    }
}

async fn worker_loop(
    mut rx: mpsc::Receiver<EmailMessage>,
    sender: Arc<dyn EmailSender>,
    config: EmailQueueConfig,
) {
    while let Some(message) = rx.recv().await {
        deliver_with_retries(sender.as_ref(), &message, &config).await;
    }
}

async fn deliver_with_retries(
    sender: &dyn EmailSender,
    message: &EmailMessage,
    config: &EmailQueueConfig,
) {
    for attempt in 1..=config.max_attempts {
        match sender.send(message) {
            Ok(()) => {
                info!(to = %message.to, "email sent");
                return;
            }
            Err(err) => {
                if attempt < config.max_attempts {
                    warn!(
                        to = %message.to,
                        attempt,
                        max_attempts = config.max_attempts,
                        "email send failed, retrying: {err}"
                    );
                    sleep(config.retry_backoff).await;
                } else {
                    error!(to = %message.to, "email failed permanently: {err}");
                }
            }
        }
    }
}

/// Build the verification email for a freshly issued one-time code.
#[must_use]
pub(crate) fn verification_email(to: &str, code: &str) -> EmailMessage {
    let body = format!(
        "Hello,\n\n\
         Welcome to VacQ - Your Massage Reservation System!\n\n\
         To complete your registration, please use the verification code below:\n\n\
             Verification Code: {code}\n\n\
         This code will expire in 10 minutes.\n\
         For your security, do not share this code with anyone.\n\n\
         If you didn't create an account with VacQ, please ignore this email.\n\n\
         Best regards,\n\
         VacQ Team\n"
    );
    EmailMessage {
        to: to.to_string(),
        subject: "VacQ - Email Verification Code".to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct RecordingSender {
        attempts: AtomicU32,
        fail_first: u32,
        delivered: Mutex<Vec<String>>,
    }

    impl RecordingSender {
        fn new(fail_first: u32) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                fail_first,
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl EmailSender for RecordingSender {
        fn send(&self, message: &EmailMessage) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_first {
                return Err(anyhow!("transient failure"));
            }
            self.delivered
                .lock()
                .expect("lock")
                .push(message.to.clone());
            Ok(())
        }
    }

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        }
    }

    fn test_config() -> EmailQueueConfig {
        EmailQueueConfig::new().with_retry_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn delivers_queued_messages_in_order() {
        let sender = Arc::new(RecordingSender::new(0));
        let (queue, handle) = EmailQueue::start(test_config(), sender.clone());
        queue.enqueue(message("first@example.com"));
        queue.enqueue(message("second@example.com"));
        drop(queue);
        handle.await.expect("worker");

        let delivered = sender.delivered.lock().expect("lock").clone();
        assert_eq!(delivered, vec!["first@example.com", "second@example.com"]);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let sender = Arc::new(RecordingSender::new(2));
        let (queue, handle) = EmailQueue::start(test_config(), sender.clone());
        queue.enqueue(message("retry@example.com"));
        drop(queue);
        handle.await.expect("worker");

        assert_eq!(sender.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(sender.delivered.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn drops_after_max_attempts() {
        let sender = Arc::new(RecordingSender::new(u32::MAX));
        let (queue, handle) = EmailQueue::start(test_config(), sender.clone());
        queue.enqueue(message("dead@example.com"));
        drop(queue);
        handle.await.expect("worker");

        assert_eq!(sender.attempts.load(Ordering::SeqCst), 3);
        assert!(sender.delivered.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let sender = Arc::new(RecordingSender::new(u32::MAX));
        let config = test_config().with_capacity(1);
        let (queue, handle) = EmailQueue::start(config, sender);
        for index in 0..16 {
            queue.enqueue(message(&format!("bulk{index}@example.com")));
        }
        drop(queue);
        handle.await.expect("worker");
    }

    #[test]
    fn verification_email_contains_code_and_ttl() {
        let email = verification_email("new@example.com", "123456");
        assert_eq!(email.to, "new@example.com");
        assert!(email.body.contains("123456"));
        assert!(email.body.contains("expire in 10 minutes"));
    }
}
