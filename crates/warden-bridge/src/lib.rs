//! Platform bridge adapter.
//!
//! The chat platform's client library runs in a separate process and speaks
//! newline-delimited JSON over stdio. This crate implements the `warden-core`
//! `TransportPort` by writing request frames to the bridge's stdin and
//! correlating its ack frames back to the pending calls.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{oneshot, Mutex},
};

use warden_core::{
    domain::{ChatTarget, GroupId, MessageRef, PollId, RosterEntry, UserId},
    errors::Error,
    ports::TransportPort,
    Result,
};

pub mod runner;
pub mod wire;

use wire::{Action, MessageRefData, OutboundFrame, PollRefData, RosterEntryData};

struct Ack {
    ok: bool,
    data: serde_json::Value,
    error: Option<String>,
}

pub struct BridgeTransport {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Ack>>>,
    seq: AtomicU64,
}

impl BridgeTransport {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            pending: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(1),
        }
    }

    /// Route one ack frame to the call waiting on it.
    pub(crate) async fn complete(
        &self,
        seq: u64,
        ok: bool,
        data: serde_json::Value,
        error: Option<String>,
    ) {
        match self.pending.lock().await.remove(&seq) {
            Some(tx) => {
                let _ = tx.send(Ack { ok, data, error });
            }
            None => tracing::warn!("ack for unknown request {seq} dropped"),
        }
    }

    /// Fail every pending request, e.g. when the bridge process exits.
    pub(crate) async fn abort_pending(&self) {
        self.pending.lock().await.clear();
    }

    async fn request(&self, action: Action) -> Result<serde_json::Value> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(seq, tx);

        let frame = OutboundFrame { seq, action };
        let mut line = serde_json::to_string(&frame)?;
        line.push('\n');

        {
            let mut writer = self.writer.lock().await;
            let written = async {
                writer.write_all(line.as_bytes()).await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = written {
                self.pending.lock().await.remove(&seq);
                return Err(Error::Transport(format!("bridge write failed: {e}")));
            }
        }

        match rx.await {
            Ok(ack) if ack.ok => Ok(ack.data),
            Ok(ack) => Err(Error::Transport(
                ack.error
                    .unwrap_or_else(|| "bridge rejected the request".to_string()),
            )),
            Err(_) => Err(Error::Transport("bridge connection closed".to_string())),
        }
    }

    async fn simple(&self, action: Action) -> Result<()> {
        self.request(action).await.map(|_| ())
    }
}

#[async_trait]
impl TransportPort for BridgeTransport {
    async fn send_message(
        &self,
        target: ChatTarget,
        content: &str,
        mentions: &[UserId],
    ) -> Result<MessageRef> {
        let (target_id, direct) = match target {
            ChatTarget::Group(g) => (g.0, false),
            ChatTarget::Direct(u) => (u.0, true),
        };
        let data = self
            .request(Action::SendMessage {
                target: target_id,
                direct,
                content: content.to_string(),
                mentions: mentions.iter().map(|u| u.0.clone()).collect(),
            })
            .await?;
        let message: MessageRefData = serde_json::from_value(data)?;
        Ok(MessageRef {
            chat: message.chat,
            id: message.id,
        })
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<()> {
        self.simple(Action::DeleteMessage {
            chat: message.chat.clone(),
            id: message.id.clone(),
        })
        .await
    }

    async fn remove_participant(&self, group: &GroupId, user: &UserId) -> Result<()> {
        self.simple(Action::RemoveParticipant {
            group: group.0.clone(),
            user: user.0.clone(),
        })
        .await
    }

    async fn promote_participant(&self, group: &GroupId, user: &UserId) -> Result<()> {
        self.simple(Action::PromoteParticipant {
            group: group.0.clone(),
            user: user.0.clone(),
        })
        .await
    }

    async fn demote_participant(&self, group: &GroupId, user: &UserId) -> Result<()> {
        self.simple(Action::DemoteParticipant {
            group: group.0.clone(),
            user: user.0.clone(),
        })
        .await
    }

    async fn add_participant(&self, group: &GroupId, user: &UserId) -> Result<()> {
        self.simple(Action::AddParticipant {
            group: group.0.clone(),
            user: user.0.clone(),
        })
        .await
    }

    async fn set_group_subject(&self, group: &GroupId, subject: &str) -> Result<()> {
        self.simple(Action::SetSubject {
            group: group.0.clone(),
            subject: subject.to_string(),
        })
        .await
    }

    async fn set_group_description(&self, group: &GroupId, description: &str) -> Result<()> {
        self.simple(Action::SetDescription {
            group: group.0.clone(),
            description: description.to_string(),
        })
        .await
    }

    async fn get_group_roster(&self, group: &GroupId) -> Result<Vec<RosterEntry>> {
        let data = self
            .request(Action::GetRoster {
                group: group.0.clone(),
            })
            .await?;
        let entries: Vec<RosterEntryData> = serde_json::from_value(data)?;
        Ok(entries
            .into_iter()
            .map(|e| RosterEntry {
                id: UserId(e.id),
                is_admin: e.admin,
            })
            .collect())
    }

    async fn send_poll(
        &self,
        group: &GroupId,
        question: &str,
        options: &[String],
    ) -> Result<PollId> {
        let data = self
            .request(Action::SendPoll {
                group: group.0.clone(),
                question: question.to_string(),
                options: options.to_vec(),
            })
            .await?;
        let poll: PollRefData = serde_json::from_value(data)?;
        Ok(PollId(poll.poll))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, BufReader};

    async fn next_frame(
        lines: &mut tokio::io::Lines<BufReader<tokio::io::DuplexStream>>,
    ) -> serde_json::Value {
        let line = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn request_resolves_when_its_ack_arrives() {
        let (writer, server) = tokio::io::duplex(4096);
        let transport = Arc::new(BridgeTransport::new(writer));
        let mut lines = BufReader::new(server).lines();

        let caller = transport.clone();
        let call = tokio::spawn(async move {
            caller
                .send_poll(
                    &GroupId("g1".to_string()),
                    "q?",
                    &["a".to_string(), "b".to_string()],
                )
                .await
        });

        let frame = next_frame(&mut lines).await;
        assert_eq!(frame["action"], "send_poll");
        assert_eq!(frame["question"], "q?");
        let seq = frame["seq"].as_u64().unwrap();

        transport
            .complete(seq, true, serde_json::json!({"poll": "p9"}), None)
            .await;

        let id = call.await.unwrap().unwrap();
        assert_eq!(id, PollId("p9".to_string()));
    }

    #[tokio::test]
    async fn rejected_ack_surfaces_as_a_transport_error() {
        let (writer, server) = tokio::io::duplex(4096);
        let transport = Arc::new(BridgeTransport::new(writer));
        let mut lines = BufReader::new(server).lines();

        let caller = transport.clone();
        let call = tokio::spawn(async move {
            caller
                .remove_participant(&GroupId("g1".to_string()), &UserId("u1".to_string()))
                .await
        });

        let frame = next_frame(&mut lines).await;
        assert_eq!(frame["action"], "remove_participant");
        let seq = frame["seq"].as_u64().unwrap();

        transport
            .complete(
                seq,
                false,
                serde_json::Value::Null,
                Some("not an admin".to_string()),
            )
            .await;

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m == "not an admin"));
    }

    #[tokio::test]
    async fn aborting_pending_fails_the_outstanding_call() {
        let (writer, server) = tokio::io::duplex(4096);
        let transport = Arc::new(BridgeTransport::new(writer));
        let mut lines = BufReader::new(server).lines();

        let caller = transport.clone();
        let call = tokio::spawn(async move {
            caller
                .get_group_roster(&GroupId("g1".to_string()))
                .await
        });

        let _ = next_frame(&mut lines).await;
        transport.abort_pending().await;

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_out_of_order() {
        let (writer, server) = tokio::io::duplex(4096);
        let transport = Arc::new(BridgeTransport::new(writer));
        let mut lines = BufReader::new(server).lines();

        let first_caller = transport.clone();
        let first = tokio::spawn(async move {
            first_caller
                .send_poll(&GroupId("g1".to_string()), "one?", &["a".to_string(), "b".to_string()])
                .await
        });
        let first_frame = next_frame(&mut lines).await;

        let second_caller = transport.clone();
        let second = tokio::spawn(async move {
            second_caller
                .send_poll(&GroupId("g1".to_string()), "two?", &["a".to_string(), "b".to_string()])
                .await
        });
        let second_frame = next_frame(&mut lines).await;

        // Acks arrive in reverse order; each still lands on the right caller.
        transport
            .complete(
                second_frame["seq"].as_u64().unwrap(),
                true,
                serde_json::json!({"poll": "p2"}),
                None,
            )
            .await;
        transport
            .complete(
                first_frame["seq"].as_u64().unwrap(),
                true,
                serde_json::json!({"poll": "p1"}),
                None,
            )
            .await;

        assert_eq!(first.await.unwrap().unwrap(), PollId("p1".to_string()));
        assert_eq!(second.await.unwrap().unwrap(), PollId("p2".to_string()));
    }
}
