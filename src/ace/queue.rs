//! Per-conversation learning queue
//!
//! Each conversation gets one worker task that runs reflection jobs strictly
//! in submission order. Different conversations run on different workers.
//! A barrier message lets callers wait until everything submitted before it
//! has been applied to the playbook.
//!
//! Workers exit after sitting idle; the next submission spawns a fresh one.
//! A worker only retires while holding the sender lock with its channel
//! empty, so at most one worker exists per conversation.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::curator::Curator;
use super::reflector::{Reflection, Reflector};
use super::registry::SharedPlaybook;
use crate::llm::ChatMessage;

pub const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// One exchange to reflect on
#[derive(Debug, Clone)]
pub struct ReflectJob {
    pub user_message: String,
    pub response: String,
    pub history: Vec<ChatMessage>,
}

/// Result of reflecting on and learning from one exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningOutcome {
    pub reflection: Reflection,
    pub reflection_summary: String,
    pub learned_strategies: usize,
    pub playbook_size: usize,
}

impl LearningOutcome {
    pub fn summary(&self) -> &str {
        &self.reflection_summary
    }
}

/// Reflector + Curator pipeline
pub struct Learner {
    reflector: Reflector,
    curator: Curator,
}

impl Learner {
    pub fn new(reflector: Reflector, curator: Curator) -> Self {
        Self { reflector, curator }
    }

    pub async fn learn(
        &self,
        conversation_id: &str,
        job: &ReflectJob,
        playbook: &SharedPlaybook,
    ) -> LearningOutcome {
        let reflection = self
            .reflector
            .reflect(&job.user_message, &job.response, &job.history, conversation_id)
            .await;

        let learned_strategies = self
            .curator
            .curate(&job.user_message, &job.response, &reflection, playbook)
            .await;

        let playbook_size = playbook.lock().len();

        info!(
            conversation_id,
            learned = learned_strategies,
            playbook_size,
            "ACE reflection complete"
        );

        LearningOutcome {
            reflection_summary: reflection.summary.clone(),
            reflection,
            learned_strategies,
            playbook_size,
        }
    }
}

enum QueueMessage {
    Reflect {
        job: ReflectJob,
        reply: Option<oneshot::Sender<LearningOutcome>>,
    },
    Barrier(oneshot::Sender<()>),
}

type SenderSlot = Arc<Mutex<Option<mpsc::UnboundedSender<QueueMessage>>>>;

/// Single-writer job queue for one conversation
pub struct LearningQueue {
    conversation_id: String,
    playbook: SharedPlaybook,
    sender: SenderSlot,
    idle_timeout: Duration,
}

impl LearningQueue {
    pub fn new(conversation_id: &str, playbook: SharedPlaybook) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            playbook,
            sender: Arc::new(Mutex::new(None)),
            idle_timeout: WORKER_IDLE_TIMEOUT,
        }
    }

    /// Queue a reflection job. Must be called inside a tokio runtime.
    pub fn submit(
        &self,
        learner: &Arc<Learner>,
        job: ReflectJob,
    ) -> oneshot::Receiver<LearningOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(
            learner,
            QueueMessage::Reflect {
                job,
                reply: Some(tx),
            },
        );
        rx
    }

    /// Wait until every job submitted so far has finished
    pub async fn settle(&self) {
        let (tx, rx) = oneshot::channel();
        let queued = match self.sender.lock().as_ref() {
            Some(s) => s.send(QueueMessage::Barrier(tx)).is_ok(),
            None => false,
        };
        // No live worker means nothing is pending
        if queued {
            let _ = rx.await;
        }
    }

    fn send(&self, learner: &Arc<Learner>, message: QueueMessage) {
        let mut sender = self.sender.lock();

        let message = match sender.as_ref() {
            Some(s) => match s.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(m)) => m,
            },
            None => message,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, send cannot fail
        let _ = tx.send(message);
        *sender = Some(tx);

        debug!(conversation_id = %self.conversation_id, "Spawning learning worker");
        tokio::spawn(run_worker(
            rx,
            Arc::clone(&self.sender),
            Arc::clone(learner),
            self.conversation_id.clone(),
            Arc::clone(&self.playbook),
            self.idle_timeout,
        ));
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<QueueMessage>,
    sender: SenderSlot,
    learner: Arc<Learner>,
    conversation_id: String,
    playbook: SharedPlaybook,
    idle_timeout: Duration,
) {
    loop {
        let message = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(_) => match retire_if_idle(&sender, &mut rx) {
                Some(message) => message,
                None => break,
            },
        };
        handle(message, &learner, &conversation_id, &playbook).await;
    }
    debug!(conversation_id = %conversation_id, "Learning worker stopped");
}

/// Detach the worker's sender unless a message slipped in.
///
/// Senders go through the same lock, so nothing can be queued between the
/// emptiness check and the detach.
fn retire_if_idle(
    sender: &Mutex<Option<mpsc::UnboundedSender<QueueMessage>>>,
    rx: &mut mpsc::UnboundedReceiver<QueueMessage>,
) -> Option<QueueMessage> {
    let mut slot = sender.lock();
    match rx.try_recv() {
        Ok(message) => Some(message),
        Err(_) => {
            *slot = None;
            None
        }
    }
}

async fn handle(
    message: QueueMessage,
    learner: &Learner,
    conversation_id: &str,
    playbook: &SharedPlaybook,
) {
    match message {
        QueueMessage::Reflect { job, reply } => {
            let outcome = learner.learn(conversation_id, &job, playbook).await;
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        }
        QueueMessage::Barrier(done) => {
            let _ = done.send(());
        }
    }
}
