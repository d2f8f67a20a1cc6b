//! Client events and actions.

use parley_core::{ChannelError, ChannelState};
use parley_proto::{Chat, ChatId, Friend, Group, Message, MessageId, OutboundFrame, UserId};

/// Identifies one `POST /messages` call.
pub type RequestId = u64;

/// A REST call that did not succeed.
///
/// `status` is `None` when no response was received at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestFailure {
    /// HTTP status, if the server answered.
    pub status: Option<u16>,
    /// Server-provided message, or a description of the failure.
    pub message: String,
}

impl std::fmt::Display for RestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Executing REST calls and reporting their results
/// - Running the WebSocket and reporting its lifecycle and frames
/// - Driving time forward via ticks
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual) time.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Start the real-time channel for the logged-in user.
    EnableRealtime {
        /// Current time.
        now: I,
    },

    /// Stop the real-time channel and cancel its timers.
    DisableRealtime,

    /// The WebSocket connected.
    TransportOpened {
        /// Current time.
        now: I,
    },

    /// The WebSocket closed.
    TransportClosed {
        /// Close reason, for diagnostics.
        reason: String,
        /// Current time.
        now: I,
    },

    /// The WebSocket failed.
    TransportError {
        /// What went wrong.
        error: ChannelError,
        /// Current time.
        now: I,
    },

    /// Text frame received from the server.
    FrameReceived {
        /// Raw frame text.
        raw: String,
        /// Current time.
        now: I,
    },

    /// Time tick for timers (connect timeout, reconnect, typing expiry).
    Tick {
        /// Current time.
        now: I,
    },

    /// User wants to send a message.
    SendMessage {
        /// Target conversation.
        chat_id: ChatId,
        /// Message text.
        content: String,
    },

    /// A `POST /messages` call finished.
    MessagePosted {
        /// Request the result belongs to.
        request_id: RequestId,
        /// Persisted message or failure.
        result: Result<Message, RestFailure>,
    },

    /// Our typing state changed in a conversation.
    SetTyping {
        /// Conversation.
        chat_id: ChatId,
        /// Started or stopped.
        is_typing: bool,
    },

    /// User read up to a message.
    MarkRead {
        /// Conversation.
        chat_id: ChatId,
        /// Newest message read.
        message_id: MessageId,
    },

    /// User opened a conversation.
    OpenChat {
        /// Conversation to activate.
        chat_id: ChatId,
    },

    /// User left the active conversation.
    CloseChat,

    /// `GET /friends` finished.
    FriendsLoaded(Vec<Friend>),

    /// `GET /groups` finished.
    GroupsLoaded(Vec<Group>),

    /// `GET /chats` finished.
    ChatsLoaded(Vec<Chat>),

    /// `GET /chats/{id}/messages` finished.
    MessagesLoaded {
        /// Conversation the messages belong to.
        chat_id: ChatId,
        /// Messages in server order.
        messages: Vec<Message>,
    },

    /// `DELETE /friends/{id}/unfriend` succeeded.
    Unfriended {
        /// Former friend.
        friend_id: UserId,
    },

    /// `POST /groups` succeeded.
    GroupCreated(Group),

    /// Session ended (logout). Clears all state and stops realtime.
    Reset,
}

/// Severity of a [`ClientAction::Log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Routine detail.
    Debug,
    /// Notable lifecycle change.
    Info,
    /// Something was dropped or failed.
    Warn,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open the WebSocket.
    Connect {
        /// URL including the user id.
        url: String,
    },

    /// Close the WebSocket.
    Disconnect,

    /// Send a frame on the open WebSocket.
    Send(OutboundFrame),

    /// Call `POST /messages` and report back with
    /// [`ClientEvent::MessagePosted`].
    PostMessage {
        /// Correlates the completion.
        request_id: RequestId,
        /// Target conversation.
        chat_id: ChatId,
        /// Message text.
        content: String,
    },

    /// Call `GET /chats/{id}/messages` and report back with
    /// [`ClientEvent::MessagesLoaded`].
    FetchMessages {
        /// Conversation to load.
        chat_id: ChatId,
    },

    /// Call `GET /chats` and report back with [`ClientEvent::ChatsLoaded`].
    FetchChats,

    /// A send failed. The content is handed back for a manual retry.
    SendFailed {
        /// Target conversation.
        chat_id: ChatId,
        /// Original text.
        content: String,
        /// Server message or failure description.
        reason: String,
    },

    /// A message arrived in a conversation that is not open.
    Notify {
        /// Conversation.
        chat_id: ChatId,
        /// Notification title.
        title: String,
        /// Notification body.
        body: String,
        /// Group name or sender name; notifications with the same tag
        /// replace each other.
        tag: String,
    },

    /// The channel changed state. Display only.
    ChannelChanged(ChannelState),

    /// Realtime gave up reconnecting; the session is REST-only until
    /// re-enabled.
    RealtimeUnavailable {
        /// Reconnect attempts made.
        attempts: u32,
    },

    /// Diagnostic message.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message.
        message: String,
    },
}
