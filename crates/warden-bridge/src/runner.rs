//! Spawns the bridge process and pumps its frames.

use std::{process::Stdio, sync::Arc};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use warden_core::{
    dispatch::{Dispatcher, IncomingEvent},
    domain::{GroupId, MessageRef, PollId, UserId},
    errors::Error,
    roster::RosterOracle,
    Result,
};

use crate::{
    wire::{self, InboundFrame},
    BridgeTransport,
};

pub struct Bridge {
    pub transport: Arc<BridgeTransport>,
    child: Child,
    stdout: ChildStdout,
}

impl Bridge {
    /// Spawn the bridge process and wire its stdin to the transport.
    pub fn spawn(command: &[String]) -> Result<Bridge> {
        let Some((program, args)) = command.split_first() else {
            return Err(Error::Config("bridge command is empty".to_string()));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("bridge stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("bridge stdout was not captured".to_string()))?;

        Ok(Bridge {
            transport: Arc::new(BridgeTransport::new(stdin)),
            child,
            stdout,
        })
    }

    /// Pump inbound frames until the bridge closes its stdout or the token is
    /// cancelled.
    ///
    /// Acks complete their pending request directly on the read loop; events
    /// go through a sequential worker so they are handled in arrival order
    /// even while a handler is itself waiting on a transport ack.
    pub async fn pump(
        self,
        dispatcher: Arc<Dispatcher>,
        oracle: Arc<RosterOracle>,
        prefix: char,
        cancel: CancellationToken,
    ) -> Result<()> {
        let Bridge {
            transport,
            mut child,
            stdout,
        } = self;

        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingEvent>();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatcher.handle_incoming(event).await;
            }
        });

        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
              _ = cancel.cancelled() => break,
              line = lines.next_line() => {
                let line = match line {
                  Ok(Some(line)) => line,
                  Ok(None) => break,
                  Err(e) => {
                    tracing::warn!("bridge read failed: {e}");
                    break;
                  }
                };
                if line.trim().is_empty() {
                  continue;
                }

                let frame: InboundFrame = match serde_json::from_str(&line) {
                  Ok(frame) => frame,
                  Err(e) => {
                    tracing::warn!("unparseable bridge frame dropped: {e}");
                    continue;
                  }
                };

                match frame {
                  InboundFrame::Ack { seq, ok, data, error } => {
                    transport.complete(seq, ok, data, error).await;
                  }
                  InboundFrame::Hello { bot_id } => {
                    tracing::info!("bridge connected as {bot_id}");
                    oracle.set_self_id(UserId(bot_id));
                  }
                  other => {
                    if let Some(event) = classify_event(other, prefix) {
                      if tx.send(event).is_err() {
                        break;
                      }
                    }
                  }
                }
              }
            }
        }

        drop(tx);
        let _ = worker.await;
        transport.abort_pending().await;
        let _ = child.kill().await;

        Ok(())
    }
}

fn classify_event(frame: InboundFrame, prefix: char) -> Option<IncomingEvent> {
    match frame {
        InboundFrame::Message {
            group,
            sender,
            id,
            body,
            mentions,
        } => {
            let group_id = GroupId(group.clone());
            let sender = UserId(sender);
            let mentions: Vec<UserId> = mentions.into_iter().map(UserId).collect();

            Some(match wire::parse_command(&body, prefix) {
                Some((name, args)) => IncomingEvent::Command {
                    group: group_id,
                    sender,
                    name,
                    args,
                    mentions,
                },
                None => IncomingEvent::PlainMessage {
                    group: group_id,
                    sender,
                    body,
                    message: MessageRef { chat: group, id },
                },
            })
        }
        InboundFrame::Membership {
            group,
            action,
            participants,
        } => Some(IncomingEvent::MembershipChange {
            group: GroupId(group),
            action: action.into(),
            participants: participants.into_iter().map(UserId).collect(),
        }),
        InboundFrame::PollVote {
            poll,
            voter,
            selected,
        } => Some(IncomingEvent::VoteUpdate {
            poll: PollId(poll),
            voter: UserId(voter),
            selected,
        }),
        InboundFrame::Hello { .. } | InboundFrame::Ack { .. } => None,
    }
}
