//! Line rendering.
//!
//! A terminal that only appends lines cannot redraw, so [`View`] remembers
//! what it already printed and turns each render into the lines that
//! changed since the last one. Pure: no I/O, so tests can drive it with a
//! simulated session.

use std::{
    collections::BTreeSet,
    ops::{Add, Sub},
    time::Duration,
};

use parley_app::App;
use parley_client::LocalMessage;
use parley_proto::ChatId;

/// What has been printed so far.
#[derive(Debug, Default)]
pub struct View {
    connection: Option<&'static str>,
    chat_list: Vec<(String, u32)>,
    open_chat: Option<ChatId>,
    printed: BTreeSet<u64>,
    typing: String,
    status: Option<String>,
}

impl View {
    /// Empty view; the first render prints everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines describing what changed since the previous render.
    pub fn render<I>(&mut self, app: &App<I>) -> Vec<String>
    where
        I: Copy + Ord + Sub<Output = Duration> + Add<Duration, Output = I>,
    {
        let mut lines = Vec::new();

        let connection = app.connection_label();
        if self.connection != Some(connection) {
            self.connection = Some(connection);
            lines.push(format!("realtime: {connection}"));
        }

        let chat_list: Vec<(String, u32)> =
            app.visible_chats().iter().map(|c| (c.name.clone(), c.unread_count)).collect();
        if chat_list != self.chat_list {
            if !chat_list.is_empty() {
                lines.push(format!("chats: {}", chat_summary(&chat_list)));
            }
            self.chat_list = chat_list;
        }

        self.render_conversation(app, &mut lines);

        let typing = app.typing_label().to_string();
        if typing != self.typing {
            if !typing.is_empty() {
                lines.push(format!("~ {typing}"));
            }
            self.typing = typing;
        }

        let status = app.status_message().map(str::to_string);
        if status != self.status {
            if let Some(status) = &status {
                lines.push(format!("! {status}"));
            }
            self.status = status;
        }

        lines
    }

    fn render_conversation<I>(&mut self, app: &App<I>, lines: &mut Vec<String>)
    where
        I: Copy + Ord + Sub<Output = Duration> + Add<Duration, Output = I>,
    {
        let session = app.session();
        let open = session.active_chat().cloned();
        if open != self.open_chat {
            self.printed.clear();
            match app.active_chat() {
                Some(chat) => lines.push(format!("== {} ==", chat.name)),
                None => lines.push("== no chat open ==".to_string()),
            }
            self.open_chat = open;
        }

        let Some(chat_id) = &self.open_chat else {
            return;
        };
        for message in session.messages(chat_id) {
            if self.printed.insert(message.seq) {
                lines.push(message_line(message));
            }
        }
    }
}

fn chat_summary(chats: &[(String, u32)]) -> String {
    chats
        .iter()
        .map(|(name, unread)| match unread {
            0 => name.clone(),
            n => format!("{name} ({n})"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn message_line(message: &LocalMessage) -> String {
    let pending = if message.is_confirmed() { "" } else { " (sending)" };
    format!(
        "{} {}: {}{pending}",
        message.timestamp.format("%H:%M"),
        message.sender_name,
        message.content
    )
}
