//! Optimistic sends and their reconciliation with server-confirmed messages.
//!
//! Every send records its [`DeliveryPath`] when it starts:
//!
//! - [`DeliveryPath::LocalApply`]: the channel was not open, so no echo is
//!   expected. The REST response confirms the optimistic entry.
//! - [`DeliveryPath::AwaitEcho`]: the channel was open, so the server will
//!   echo the message as a `new_message` frame. The echo confirms the entry;
//!   the REST response only updates the conversation summary.
//!
//! The path is never re-derived from live connectivity, so exactly one code
//! path confirms a given message. The one exception is losing the channel
//! while waiting for an echo: no echo can arrive on a dead connection, so
//! those sends fall back to their REST response.
//!
//! Deduplication is always by server id, which makes every handler here
//! idempotent under duplicate delivery.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parley_proto::{ChatId, Message};

use crate::{
    error::ClientError,
    event::RequestId,
    session::{Confirmation, Session},
};

/// How a send's confirmed message reaches the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// Append from the REST response.
    LocalApply,
    /// Append from the server echo.
    AwaitEcho,
}

#[derive(Debug, Clone)]
struct PendingSend {
    seq: u64,
    chat_id: ChatId,
    content: String,
    path: DeliveryPath,
    /// REST response, once it arrived.
    response: Option<Message>,
    /// Echo that was matched to this send.
    echo: Option<Message>,
}

/// Outcome of a successful `POST /messages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendCompletion {
    /// The REST response confirmed the optimistic entry.
    Applied,
    /// The echo already confirmed it; nothing left to do.
    AlreadyEchoed,
    /// Waiting for the echo.
    AwaitingEcho,
}

/// Outcome of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    /// Already present (same server id).
    Duplicate,
    /// Echo of one of our sends; confirmed its optimistic entry.
    ConfirmedOwn,
    /// Echo of a send whose REST response will confirm it.
    Deferred,
    /// New message appended.
    Appended {
        /// Whether the conversation is in the chat list.
        known_chat: bool,
    },
}

/// Tracks sends between the REST call and their confirmation.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    pending: BTreeMap<RequestId, PendingSend>,
    next_request_id: RequestId,
}

impl Reconciler {
    /// No pending sends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends not yet fully reconciled.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Delivery path recorded for a pending send.
    pub fn path(&self, request_id: RequestId) -> Option<DeliveryPath> {
        self.pending.get(&request_id).map(|p| p.path)
    }

    /// Forget every pending send.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Insert the optimistic entry and record the send.
    pub fn begin_send<I>(
        &mut self,
        session: &mut Session<I>,
        chat_id: ChatId,
        content: String,
        path: DeliveryPath,
        timestamp: DateTime<Utc>,
    ) -> RequestId
    where
        I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
    {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let seq = session.push_optimistic(chat_id.clone(), content.clone(), timestamp);
        self.pending
            .insert(request_id, PendingSend { seq, chat_id, content, path, response: None, echo: None });
        request_id
    }

    /// Handle a successful REST response.
    ///
    /// # Errors
    ///
    /// - `ClientError::UnknownRequest` if `request_id` is not pending
    pub fn complete_send<I>(
        &mut self,
        session: &mut Session<I>,
        request_id: RequestId,
        message: Message,
    ) -> Result<SendCompletion, ClientError>
    where
        I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
    {
        let pending =
            self.pending.get_mut(&request_id).ok_or(ClientError::UnknownRequest { request_id })?;

        session.bump_summary(&pending.chat_id, &pending.content, message.timestamp, false);
        session.reset_unread(&pending.chat_id);

        match pending.path {
            DeliveryPath::LocalApply => {
                let seq = pending.seq;
                // An echo with another id belonged to a different send of the same text.
                let stray = pending.echo.take().filter(|echo| echo.id != message.id);
                self.pending.remove(&request_id);
                confirm_or_insert(session, seq, message);
                if let Some(echo) = stray {
                    self.on_new_message(session, echo);
                }
                Ok(SendCompletion::Applied)
            },
            DeliveryPath::AwaitEcho if pending.echo.is_some() => {
                let echoed_other = pending.echo.as_ref().is_some_and(|echo| echo.id != message.id);
                self.pending.remove(&request_id);
                if echoed_other {
                    session.push_confirmed(message);
                }
                Ok(SendCompletion::AlreadyEchoed)
            },
            // A history load already delivered it; its echo will be a duplicate.
            DeliveryPath::AwaitEcho if session.contains_message(&pending.chat_id, message.id) => {
                let seq = pending.seq;
                self.pending.remove(&request_id);
                confirm_or_insert(session, seq, message);
                Ok(SendCompletion::AlreadyEchoed)
            },
            DeliveryPath::AwaitEcho => {
                pending.response = Some(message);
                Ok(SendCompletion::AwaitingEcho)
            },
        }
    }

    /// Handle a failed REST call. Returns the content to hand back for a
    /// retry, or `None` if an echo already proved the message was stored.
    ///
    /// # Errors
    ///
    /// - `ClientError::UnknownRequest` if `request_id` is not pending
    pub fn fail_send<I>(
        &mut self,
        session: &mut Session<I>,
        request_id: RequestId,
    ) -> Result<Option<(ChatId, String)>, ClientError>
    where
        I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
    {
        let pending =
            self.pending.remove(&request_id).ok_or(ClientError::UnknownRequest { request_id })?;

        match (pending.path, pending.echo) {
            (DeliveryPath::AwaitEcho, Some(_)) => Ok(None),
            (DeliveryPath::LocalApply, Some(echo)) => {
                confirm_or_insert(session, pending.seq, echo);
                Ok(None)
            },
            (_, None) => {
                session.remove_optimistic(&pending.chat_id, pending.seq);
                Ok(Some((pending.chat_id, pending.content)))
            },
        }
    }

    /// Handle a `new_message` frame.
    ///
    /// Own messages are matched against pending sends by conversation and
    /// content, oldest send first. Unread counts only grow for other
    /// people's messages in conversations that are not open.
    pub fn on_new_message<I>(&mut self, session: &mut Session<I>, message: Message) -> Incoming
    where
        I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
    {
        if session.contains_message(&message.chat_id, message.id) {
            return Incoming::Duplicate;
        }

        let own = message.sender_id == session.viewer().id;
        if own && let Some(request_id) = self.match_echo(&message) {
            return self.apply_echo(session, request_id, message);
        }

        let chat_id = message.chat_id.clone();
        let content = message.content.clone();
        let timestamp = message.timestamp;
        session.push_confirmed(message);
        let known_chat = session.bump_summary(&chat_id, &content, timestamp, !own);
        Incoming::Appended { known_chat }
    }

    /// Reconcile a freshly loaded history with pending sends.
    ///
    /// A send whose response is already known and whose id appears in the
    /// history is finished: the history supplies the confirmed copy.
    pub fn on_history<I>(&mut self, session: &mut Session<I>, chat_id: &ChatId, history: Vec<Message>)
    where
        I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
    {
        let finished: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| &p.chat_id == chat_id)
            .filter(|(_, p)| {
                p.response.as_ref().is_some_and(|r| history.iter().any(|m| m.id == r.id))
            })
            .map(|(id, _)| *id)
            .collect();

        for request_id in finished {
            if let Some(pending) = self.pending.remove(&request_id) {
                session.remove_optimistic(&pending.chat_id, pending.seq);
            }
        }
        session.merge_history(chat_id, history);
    }

    /// The channel left Open.
    ///
    /// Sends still awaiting an echo switch to their REST response: those
    /// that already have one are confirmed now, the rest switch to
    /// [`DeliveryPath::LocalApply`]. Returns how many sends were affected.
    pub fn on_channel_lost<I>(&mut self, session: &mut Session<I>) -> usize
    where
        I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
    {
        let awaiting: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.path == DeliveryPath::AwaitEcho && p.echo.is_none())
            .map(|(id, _)| *id)
            .collect();

        for request_id in &awaiting {
            let Some(pending) = self.pending.get_mut(request_id) else {
                continue;
            };
            match pending.response.take() {
                Some(response) => {
                    let seq = pending.seq;
                    self.pending.remove(request_id);
                    confirm_or_insert(session, seq, response);
                },
                None => pending.path = DeliveryPath::LocalApply,
            }
        }
        awaiting.len()
    }

    /// Pick the send an own echo belongs to. A send whose response carries
    /// the echo's id wins, then sends waiting for an echo, then sends that
    /// will confirm from their response. Oldest first within each group.
    fn match_echo(&self, message: &Message) -> Option<RequestId> {
        let candidates = || {
            self.pending.iter().filter(|(_, p)| {
                p.echo.is_none() && p.chat_id == message.chat_id && p.content == message.content
            })
        };

        candidates()
            .find(|(_, p)| p.response.as_ref().is_some_and(|r| r.id == message.id))
            .or_else(|| {
                candidates().find(|(_, p)| p.path == DeliveryPath::AwaitEcho && p.response.is_none())
            })
            .or_else(|| candidates().find(|(_, p)| p.path == DeliveryPath::LocalApply))
            .map(|(id, _)| *id)
    }

    fn apply_echo<I>(&mut self, session: &mut Session<I>, request_id: RequestId, echo: Message) -> Incoming
    where
        I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
    {
        let Some(pending) = self.pending.get_mut(&request_id) else {
            return Incoming::Duplicate;
        };

        match pending.path {
            DeliveryPath::LocalApply => {
                pending.echo = Some(echo);
                Incoming::Deferred
            },
            DeliveryPath::AwaitEcho => {
                let seq = pending.seq;
                let chat_id = pending.chat_id.clone();
                let timestamp = echo.timestamp;
                let content = echo.content.clone();

                if pending.response.is_some() {
                    self.pending.remove(&request_id);
                } else {
                    pending.echo = Some(echo.clone());
                }
                confirm_or_insert(session, seq, echo);
                session.bump_summary(&chat_id, &content, timestamp, false);
                Incoming::ConfirmedOwn
            },
        }
    }
}

/// Confirm the optimistic entry, or insert the message if the entry is gone.
fn confirm_or_insert<I>(session: &mut Session<I>, seq: u64, message: Message)
where
    I: Copy + Ord + std::ops::Sub<Output = std::time::Duration>,
{
    if session.confirm(seq, &message) == Confirmation::Missing {
        session.push_confirmed(message);
    }
}
