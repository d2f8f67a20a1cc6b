//! Fuzz target for the client's frame handling
//!
//! Each input line is fed to a connected client as a received frame. The
//! client must never panic, and the session invariants (one entry per
//! server id, active chat has no unread) must hold afterwards.

#![no_main]

use std::{collections::BTreeSet, time::Instant};

use chrono::DateTime;
use libfuzzer_sys::fuzz_target;
use parley_client::{Client, ClientConfig, ClientEvent};
use parley_core::SystemEnv;
use parley_proto::{Chat, ChatId, ChatKind, User};

fn viewer() -> User {
    User {
        id: 1,
        username: "ada".to_string(),
        email: String::new(),
        full_name: "Ada Lovelace".to_string(),
        status: None,
    }
}

fn chat(id: &str) -> Chat {
    Chat {
        id: ChatId::new(id),
        kind: ChatKind::Direct,
        name: id.to_string(),
        participant: None,
        group: None,
        last_message: String::new(),
        timestamp: DateTime::UNIX_EPOCH,
        unread_count: 0,
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut client = Client::new(SystemEnv::new(), viewer(), ClientConfig::default());
    let now = Instant::now();
    let _ = client.handle(ClientEvent::ChatsLoaded(vec![chat("abc"), chat("xyz")]));
    let _ = client.handle(ClientEvent::OpenChat { chat_id: ChatId::new("abc") });
    let _ = client.handle(ClientEvent::EnableRealtime { now });
    let _ = client.handle(ClientEvent::TransportOpened { now });

    for line in text.lines() {
        let _ = client.handle(ClientEvent::FrameReceived { raw: line.to_string(), now });
    }

    let session = client.session();
    for chat in session.chats() {
        let mut seen = BTreeSet::new();
        for id in session.messages(&chat.id).iter().filter_map(|m| m.id) {
            assert!(seen.insert(id), "duplicate message {id} in {}", chat.id);
        }
    }
    if let Some(active) = session.active_chat() {
        assert_eq!(session.chat(active).map(|c| c.unread_count), Some(0));
    }
});
