//! Application side-effects and intents.
//!
//! [`AppAction`]s are produced by the [`crate::App`] for the runtime to
//! execute, mostly by handing them to the [`crate::Bridge`].

use parley_proto::{ChatId, UserId};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Open a conversation.
    OpenChat {
        /// Conversation to open.
        chat_id: ChatId,
    },

    /// Close the open conversation.
    CloseChat,

    /// Send a message.
    SendMessage {
        /// Target conversation.
        chat_id: ChatId,
        /// Text body.
        content: String,
    },

    /// Our typing state changed.
    SetTyping {
        /// Conversation.
        chat_id: ChatId,
        /// Started or stopped.
        is_typing: bool,
    },

    /// Remove a friend.
    Unfriend {
        /// Friend's user id.
        friend_id: UserId,
    },

    /// Create a group conversation.
    CreateGroup {
        /// Group name.
        name: String,
        /// Member user ids.
        members: Vec<UserId>,
    },

    /// Reload friends, groups and chats.
    Refresh,

    /// Switch realtime on.
    EnableRealtime,

    /// Switch realtime off.
    DisableRealtime,

    /// End the session.
    Logout,

    /// Show a notification.
    Notify {
        /// Title line.
        title: String,
        /// Body text.
        body: String,
        /// Replacement key.
        tag: String,
    },
}
