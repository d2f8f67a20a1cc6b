//! I/O requested from the driver and the results it reports back.

use parley_client::{RequestId, RestFailure};
use parley_proto::{Chat, ChatId, Friend, Group, Message, NewGroup, OutboundFrame, UserId};

/// Side effects the driver performs on behalf of the [`crate::Bridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the WebSocket. The driver answers with
    /// [`crate::DriverInput::Opened`] or [`crate::DriverInput::Failed`].
    Connect {
        /// URL including the user id.
        url: String,
    },
    /// Close the WebSocket. No close event is expected back.
    Disconnect,
    /// Send a frame on the open WebSocket.
    Send(OutboundFrame),
    /// Call a REST endpoint and report a [`RestResult`].
    Rest(RestCall),
    /// Show a desktop-style notification. Same tag replaces.
    Notify {
        /// Title line.
        title: String,
        /// Body text.
        body: String,
        /// Replacement key.
        tag: String,
    },
}

/// REST calls the driver makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestCall {
    /// `POST /messages`.
    PostMessage {
        /// Correlates the result.
        request_id: RequestId,
        /// Target conversation.
        chat_id: ChatId,
        /// Text body.
        content: String,
    },
    /// `GET /chats/{id}/messages`.
    FetchMessages {
        /// Conversation to load.
        chat_id: ChatId,
    },
    /// `GET /chats`.
    FetchChats,
    /// `GET /friends`.
    FetchFriends,
    /// `GET /groups`.
    FetchGroups,
    /// `DELETE /friends/{id}/unfriend`.
    Unfriend {
        /// Friend to remove.
        friend_id: UserId,
    },
    /// `POST /groups`.
    CreateGroup(NewGroup),
    /// `POST /auth/logout`.
    Logout,
}

/// Results of [`RestCall`]s, in the same shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestResult {
    /// `POST /messages` finished.
    MessagePosted {
        /// Request the result belongs to.
        request_id: RequestId,
        /// Stored message or failure.
        result: Result<Message, RestFailure>,
    },
    /// `GET /chats/{id}/messages` finished.
    MessagesLoaded {
        /// Conversation requested.
        chat_id: ChatId,
        /// Messages or failure.
        result: Result<Vec<Message>, RestFailure>,
    },
    /// `GET /chats` finished.
    ChatsLoaded(Result<Vec<Chat>, RestFailure>),
    /// `GET /friends` finished.
    FriendsLoaded(Result<Vec<Friend>, RestFailure>),
    /// `GET /groups` finished.
    GroupsLoaded(Result<Vec<Group>, RestFailure>),
    /// `DELETE /friends/{id}/unfriend` finished.
    Unfriended {
        /// Friend requested.
        friend_id: UserId,
        /// Outcome.
        result: Result<(), RestFailure>,
    },
    /// `POST /groups` finished.
    GroupCreated(Result<Group, RestFailure>),
    /// `POST /auth/logout` finished. The session ends either way.
    LoggedOut(Result<(), RestFailure>),
}
