//! Sync scenarios driven through `Client::handle` with a virtual clock.
//!
//! Each test plays the driver: it feeds REST results, WebSocket lifecycle
//! events and raw frames, and checks the actions and the session snapshot.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parley_client::{
    ChannelState, Client, ClientAction, ClientConfig, ClientError, ClientEvent, DeliveryPath,
    LogLevel, RestFailure, TypingLabel,
};
use parley_core::{ChannelError, Environment};
use parley_harness::{SimEnv, SimInstant};
use parley_proto::{
    Chat, ChatId, ChatKind, Friend, Group, InboundFrame, Message, OutboundFrame, PresenceStatus,
    ReadReceipt, TypingUpdate, User, UserStatus,
};
use proptest::prelude::*;

const VIEWER: u64 = 1;
const BOB: u64 = 7;
const CY: u64 = 9;

fn viewer() -> User {
    User {
        id: VIEWER,
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        full_name: "Ada Lovelace".to_string(),
        status: None,
    }
}

fn bob() -> Friend {
    Friend {
        id: BOB,
        username: "bob".to_string(),
        full_name: "Bob Byte".to_string(),
        status: PresenceStatus::Offline,
    }
}

fn abc() -> ChatId {
    ChatId::new("abc")
}

fn team() -> ChatId {
    ChatId::new("group-3")
}

fn chats(at: DateTime<Utc>) -> Vec<Chat> {
    vec![
        Chat {
            id: abc(),
            kind: ChatKind::Direct,
            name: "Bob Byte".to_string(),
            participant: Some(bob()),
            group: None,
            last_message: String::new(),
            timestamp: at,
            unread_count: 0,
        },
        Chat {
            id: team(),
            kind: ChatKind::Group,
            name: "Team".to_string(),
            participant: None,
            group: Some(Group {
                id: 3,
                name: "Team".to_string(),
                members: vec![VIEWER, BOB, CY],
                created_by: VIEWER,
            }),
            last_message: String::new(),
            timestamp: at - TimeDelta::seconds(60),
            unread_count: 0,
        },
    ]
}

fn message(id: u64, chat_id: ChatId, sender_id: u64, content: &str, at: DateTime<Utc>) -> Message {
    let sender_name = match sender_id {
        VIEWER => "ada",
        BOB => "bob",
        CY => "cy",
        _ => "someone",
    };
    Message {
        id,
        chat_id,
        sender_id,
        sender_name: sender_name.to_string(),
        content: content.to_string(),
        timestamp: at,
    }
}

struct Harness {
    env: SimEnv,
    client: Client<SimEnv>,
}

impl Harness {
    fn new() -> Self {
        let env = SimEnv::new();
        let mut client = Client::new(env.clone(), viewer(), ClientConfig::default());
        client.handle(ClientEvent::ChatsLoaded(chats(env.timestamp()))).unwrap();
        Self { env, client }
    }

    /// Enabled and Open.
    fn online() -> Self {
        let mut harness = Self::new();
        harness.handle(ClientEvent::EnableRealtime { now: harness.now() });
        harness.handle(ClientEvent::TransportOpened { now: harness.now() });
        assert_eq!(harness.client.channel().state(), ChannelState::Open);
        harness
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn advance(&self, secs: u64) {
        self.env.advance(Duration::from_secs(secs));
    }

    fn handle(&mut self, event: ClientEvent<SimInstant>) -> Vec<ClientAction> {
        self.client.handle(event).unwrap()
    }

    fn frame(&mut self, frame: InboundFrame) -> Vec<ClientAction> {
        let raw = frame.encode().unwrap();
        let now = self.now();
        self.handle(ClientEvent::FrameReceived { raw, now })
    }

    fn tick(&mut self) -> Vec<ClientAction> {
        let now = self.now();
        self.handle(ClientEvent::Tick { now })
    }

    fn send(&mut self, chat_id: ChatId, content: &str) -> u64 {
        let actions =
            self.handle(ClientEvent::SendMessage { chat_id, content: content.to_string() });
        match actions.as_slice() {
            [ClientAction::PostMessage { request_id, .. }] => *request_id,
            other => panic!("expected a single PostMessage, got {other:?}"),
        }
    }

    fn posted(&mut self, request_id: u64, message: Message) -> Vec<ClientAction> {
        self.handle(ClientEvent::MessagePosted { request_id, result: Ok(message) })
    }

    fn ids(&self, chat_id: &ChatId) -> Vec<Option<u64>> {
        self.client.session().messages(chat_id).iter().map(|m| m.id).collect()
    }

    fn unread(&self, chat_id: &ChatId) -> u32 {
        self.client.session().chat(chat_id).map_or(0, |c| c.unread_count)
    }
}

fn logs(actions: &[ClientAction]) -> Vec<(LogLevel, &str)> {
    actions
        .iter()
        .filter_map(|a| match a {
            ClientAction::Log { level, message } => Some((*level, message.as_str())),
            _ => None,
        })
        .collect()
}

#[test]
fn echo_before_response_leaves_one_confirmed_entry() {
    let mut h = Harness::online();
    let request_id = h.send(abc(), "hello");
    assert_eq!(h.client.delivery_path(request_id), Some(DeliveryPath::AwaitEcho));
    assert_eq!(h.ids(&abc()), vec![None]);

    let echo = message(42, abc(), VIEWER, "hello", h.env.timestamp());
    let actions = h.frame(InboundFrame::NewMessage(echo.clone()));
    assert!(actions.is_empty(), "own echo must not notify: {actions:?}");
    assert_eq!(h.ids(&abc()), vec![Some(42)]);

    h.posted(request_id, echo);
    assert_eq!(h.ids(&abc()), vec![Some(42)]);
    assert_eq!(h.client.pending_sends(), 0);

    let chat = h.client.session().chat(&abc()).cloned().unwrap();
    assert_eq!(chat.last_message, "hello");
    assert_eq!(chat.unread_count, 0);
}

#[test]
fn response_before_echo_waits_for_the_echo() {
    let mut h = Harness::online();
    let request_id = h.send(abc(), "hello");
    let persisted = message(42, abc(), VIEWER, "hello", h.env.timestamp());

    h.posted(request_id, persisted.clone());
    assert_eq!(h.ids(&abc()), vec![None], "AwaitEcho sends are confirmed by the echo");
    assert_eq!(h.client.pending_sends(), 1);

    h.frame(InboundFrame::NewMessage(persisted.clone()));
    assert_eq!(h.ids(&abc()), vec![Some(42)]);
    assert_eq!(h.client.pending_sends(), 0);

    // A redelivered echo is a duplicate.
    let actions = h.frame(InboundFrame::NewMessage(persisted));
    assert_eq!(logs(&actions), vec![(LogLevel::Debug, "duplicate message 42 in abc")]);
    assert_eq!(h.ids(&abc()), vec![Some(42)]);
}

#[test]
fn offline_send_is_applied_from_the_response() {
    let mut h = Harness::new();
    let request_id = h.send(abc(), "hello");
    assert_eq!(h.client.delivery_path(request_id), Some(DeliveryPath::LocalApply));

    h.posted(request_id, message(5, abc(), VIEWER, "hello", h.env.timestamp()));

    let session = h.client.session();
    let [entry] = session.messages(&abc()) else {
        panic!("expected exactly one entry");
    };
    assert_eq!(entry.id, Some(5));
    assert_eq!(entry.content, "hello");
    assert_eq!(h.client.pending_sends(), 0);
}

#[test]
fn losing_the_channel_switches_pending_echoes_to_the_response() {
    let mut h = Harness::online();
    let request_id = h.send(abc(), "hello");

    let now = h.now();
    let actions = h.handle(ClientEvent::TransportClosed { reason: "gone".to_string(), now });
    assert_eq!(
        logs(&actions),
        vec![
            (LogLevel::Info, "realtime connection lost: transport error: gone"),
            (LogLevel::Info, "reconnect 1/3 in 2000ms"),
            (LogLevel::Debug, "1 send(s) no longer awaiting an echo"),
        ]
    );
    assert_eq!(actions.last(), Some(&ClientAction::ChannelChanged(ChannelState::Closed)));
    assert_eq!(h.client.delivery_path(request_id), Some(DeliveryPath::LocalApply));

    h.posted(request_id, message(42, abc(), VIEWER, "hello", h.env.timestamp()));
    assert_eq!(h.ids(&abc()), vec![Some(42)]);
    assert_eq!(h.client.pending_sends(), 0);
}

#[test]
fn repeated_text_across_a_reconnect_confirms_both_sends() {
    let mut h = Harness::new();
    h.handle(ClientEvent::EnableRealtime { now: h.now() });
    let offline = h.send(abc(), "ok");
    h.handle(ClientEvent::TransportOpened { now: h.now() });
    let online = h.send(abc(), "ok");
    assert_eq!(h.client.delivery_path(offline), Some(DeliveryPath::LocalApply));
    assert_eq!(h.client.delivery_path(online), Some(DeliveryPath::AwaitEcho));

    let at = h.env.timestamp();
    let second = message(11, abc(), VIEWER, "ok", at + TimeDelta::seconds(1));
    h.frame(InboundFrame::NewMessage(second.clone()));
    h.posted(offline, message(10, abc(), VIEWER, "ok", at));
    h.posted(online, second);

    assert_eq!(h.ids(&abc()), vec![Some(10), Some(11)]);
    assert_eq!(h.client.pending_sends(), 0);
}

#[test]
fn failed_send_hands_the_content_back() {
    let mut h = Harness::online();
    let request_id = h.send(abc(), "hello");

    let failure =
        RestFailure { status: Some(500), message: "Internal server error".to_string() };
    let actions = h.handle(ClientEvent::MessagePosted { request_id, result: Err(failure) });

    assert_eq!(
        actions,
        vec![ClientAction::SendFailed {
            chat_id: abc(),
            content: "hello".to_string(),
            reason: "Internal server error".to_string(),
        }]
    );
    assert!(h.ids(&abc()).is_empty());
    assert_eq!(h.client.pending_sends(), 0);
}

#[test]
fn blank_and_misaddressed_sends_are_rejected() {
    let mut h = Harness::online();

    let err = h
        .client
        .handle(ClientEvent::SendMessage { chat_id: abc(), content: "   ".to_string() })
        .unwrap_err();
    assert_eq!(err, ClientError::EmptyMessage);

    let err = h
        .client
        .handle(ClientEvent::SendMessage { chat_id: ChatId::new("nope"), content: "hi".into() })
        .unwrap_err();
    assert_eq!(err.to_string(), "chat nope not found");
    assert!(err.is_user_facing());
    assert_eq!(h.client.pending_sends(), 0);
}

#[test]
fn completion_for_an_unknown_request_is_an_error() {
    let mut h = Harness::online();
    let result = Ok(message(1, abc(), VIEWER, "x", h.env.timestamp()));
    let err = h.client.handle(ClientEvent::MessagePosted { request_id: 99, result }).unwrap_err();

    assert!(matches!(err, ClientError::UnknownRequest { request_id: 99 }));
    assert!(!err.is_user_facing());
}

#[test]
fn reconnect_backoff_then_gives_up() {
    let mut h = Harness::new();
    h.handle(ClientEvent::EnableRealtime { now: h.now() });

    for (attempt, delay) in [(1, 2), (2, 4), (3, 8)] {
        let now = h.now();
        let error = ChannelError::Transport("refused".to_string());
        let actions = h.handle(ClientEvent::TransportError { error, now });
        let expected = format!("reconnect {attempt}/3 in {}ms", delay * 1000);
        assert!(logs(&actions).contains(&(LogLevel::Info, expected.as_str())), "{actions:?}");
        assert_eq!(h.client.next_deadline(), Some(now + Duration::from_secs(delay)));

        h.advance(delay - 1);
        assert!(h.tick().is_empty(), "reconnect must wait the full delay");
        h.advance(1);
        assert!(matches!(
            h.tick().as_slice(),
            [ClientAction::Connect { .. }, ClientAction::ChannelChanged(ChannelState::Connecting)]
        ));
    }

    let now = h.now();
    let error = ChannelError::Transport("refused".to_string());
    let actions = h.handle(ClientEvent::TransportError { error, now });
    assert!(actions.contains(&ClientAction::RealtimeUnavailable { attempts: 3 }));
    assert_eq!(h.client.next_deadline(), None);
    assert!(h.client.session().realtime_enabled());

    // Quiet until realtime is enabled again.
    h.advance(60);
    assert!(h.tick().is_empty());
    let actions = h.handle(ClientEvent::EnableRealtime { now: h.now() });
    assert!(matches!(actions.first(), Some(ClientAction::Connect { .. })));
}

#[test]
fn connect_attempt_times_out_after_five_seconds() {
    let mut h = Harness::new();
    h.handle(ClientEvent::EnableRealtime { now: h.now() });

    h.advance(4);
    assert!(h.tick().is_empty());
    h.advance(1);

    let actions = h.tick();
    assert_eq!(actions.first(), Some(&ClientAction::Disconnect));
    assert_eq!(logs(&actions), vec![(LogLevel::Info, "reconnect 1/3 in 2000ms")]);
    assert_eq!(h.client.channel().state(), ChannelState::Closed);

    // A late open for the abandoned attempt is out of order.
    let err = h.client.handle(ClientEvent::TransportOpened { now: h.now() }).unwrap_err();
    assert!(matches!(err, ClientError::Channel(ChannelError::InvalidState { .. })));
}

#[test]
fn reconnect_trace() {
    let mut h = Harness::new();
    let mut trace = Vec::new();
    let mut record = |h: &Harness, actions: Vec<ClientAction>| {
        let at = h.now().since_start().as_secs();
        for action in actions {
            let line = match action {
                ClientAction::Connect { url } => format!("connect {url}"),
                ClientAction::Disconnect => "disconnect".to_string(),
                ClientAction::Log { level, message } => format!("{level:?} {message}"),
                ClientAction::ChannelChanged(state) => format!("state {state:?}"),
                ClientAction::RealtimeUnavailable { attempts } => {
                    format!("unavailable after {attempts}")
                },
                other => format!("{other:?}"),
            };
            trace.push(format!("{at}s {line}"));
        }
    };

    let actions = h.handle(ClientEvent::EnableRealtime { now: h.now() });
    record(&h, actions);
    let error = ChannelError::Transport("refused".to_string());
    let actions = h.handle(ClientEvent::TransportError { error, now: h.now() });
    record(&h, actions);
    h.advance(2);
    let actions = h.tick();
    record(&h, actions);
    h.advance(5);
    let actions = h.tick();
    record(&h, actions);
    h.advance(4);
    let actions = h.tick();
    record(&h, actions);
    let reason = "refused".to_string();
    let actions = h.handle(ClientEvent::TransportClosed { reason, now: h.now() });
    record(&h, actions);
    h.advance(8);
    let actions = h.tick();
    record(&h, actions);
    let actions = h.handle(ClientEvent::TransportOpened { now: h.now() });
    record(&h, actions);

    insta::assert_snapshot!(trace.join("\n"), @r"
    0s connect ws://localhost:8080/ws?userId=1
    0s state Connecting
    0s Info realtime connection lost: transport error: refused
    0s Info reconnect 1/3 in 2000ms
    0s state Closed
    2s connect ws://localhost:8080/ws?userId=1
    2s state Connecting
    7s disconnect
    7s Info reconnect 2/3 in 4000ms
    7s state Closed
    11s connect ws://localhost:8080/ws?userId=1
    11s state Connecting
    11s Info realtime connection lost: transport error: refused
    11s Info reconnect 3/3 in 8000ms
    11s state Closed
    19s connect ws://localhost:8080/ws?userId=1
    19s state Connecting
    19s Info realtime connected
    19s state Open
    ");
}

#[test]
fn typing_start_and_stop() {
    let mut h = Harness::online();
    let update = |is_typing| TypingUpdate { chat_id: abc(), user_id: BOB, is_typing };

    h.frame(InboundFrame::Typing(update(true)));
    let session = h.client.session();
    assert_eq!(session.typing().typing_in(&abc()), vec![BOB]);
    assert_eq!(session.typing().label(&abc()), TypingLabel::Single(BOB));
    assert_eq!(session.typing().label(&abc()).to_string(), "Someone is typing...");

    h.frame(InboundFrame::Typing(update(false)));
    assert!(h.client.session().typing().typing_in(&abc()).is_empty());
    // The earlier snapshot is unchanged.
    assert_eq!(session.typing().typing_in(&abc()), vec![BOB]);
}

#[test]
fn own_typing_events_are_ignored() {
    let mut h = Harness::online();
    h.frame(InboundFrame::Typing(TypingUpdate { chat_id: abc(), user_id: VIEWER, is_typing: true }));
    assert!(h.client.session().typing().typing_in(&abc()).is_empty());
}

#[test]
fn stale_typing_indicators_expire() {
    let mut h = Harness::online();
    h.frame(InboundFrame::Typing(TypingUpdate { chat_id: team(), user_id: BOB, is_typing: true }));
    h.advance(4);
    h.frame(InboundFrame::Typing(TypingUpdate { chat_id: team(), user_id: CY, is_typing: true }));
    assert_eq!(h.client.session().typing().label(&team()).to_string(), "2 people are typing...");

    h.advance(6);
    let actions = h.tick();
    assert_eq!(
        logs(&actions),
        vec![(LogLevel::Debug, "typing indicator for 7 in group-3 expired")]
    );
    assert_eq!(h.client.session().typing().typing_in(&team()), vec![CY]);

    h.advance(4);
    h.tick();
    assert!(h.client.session().typing().typing_in(&team()).is_empty());
}

#[test]
fn typing_expiry_is_reported_as_a_deadline() {
    let mut h = Harness::online();
    assert_eq!(h.client.next_deadline(), None);

    let started = h.now();
    h.frame(InboundFrame::Typing(TypingUpdate { chat_id: abc(), user_id: BOB, is_typing: true }));
    assert_eq!(h.client.next_deadline(), Some(started + Duration::from_secs(10)));

    h.advance(10);
    h.tick();
    assert!(h.client.session().typing().typing_in(&abc()).is_empty());
    assert_eq!(h.client.next_deadline(), None);
}

#[test]
fn channel_loss_clears_typing() {
    let mut h = Harness::online();
    h.frame(InboundFrame::Typing(TypingUpdate { chat_id: abc(), user_id: BOB, is_typing: true }));

    let error = ChannelError::Transport("reset".to_string());
    h.handle(ClientEvent::TransportError { error, now: h.now() });
    assert!(h.client.session().typing().typing_in(&abc()).is_empty());
}

#[test]
fn presence_updates_friend_and_participant() {
    let mut h = Harness::online();
    h.handle(ClientEvent::FriendsLoaded(vec![bob()]));

    h.frame(InboundFrame::UserStatus(UserStatus { user_id: BOB, status: PresenceStatus::Online }));
    let session = h.client.session();
    assert_eq!(session.presence().status(BOB), PresenceStatus::Online);
    assert_eq!(session.friends()[0].status, PresenceStatus::Online);
    let participant = session.chat(&abc()).and_then(|c| c.participant.clone()).unwrap();
    assert_eq!(participant.status, PresenceStatus::Online);
}

#[test]
fn inbound_messages_count_unread_and_notify() {
    let mut h = Harness::online();
    let at = h.env.timestamp();

    let actions = h.frame(InboundFrame::NewMessage(message(10, abc(), BOB, "hi", at)));
    assert_eq!(
        actions,
        vec![ClientAction::Notify {
            chat_id: abc(),
            title: "New message from bob".to_string(),
            body: "hi".to_string(),
            tag: "bob".to_string(),
        }]
    );
    assert_eq!(h.unread(&abc()), 1);

    let later = at + TimeDelta::seconds(1);
    let actions = h.frame(InboundFrame::NewMessage(message(11, team(), CY, "standup?", later)));
    assert!(matches!(
        actions.as_slice(),
        [ClientAction::Notify { tag, .. }] if tag == "Team"
    ));
    assert_eq!(h.unread(&team()), 1);
    assert_eq!(h.client.session().chats()[0].id, team(), "most recent first");
    assert_eq!(h.client.session().total_unread(), 2);
}

#[test]
fn active_chat_stays_read() {
    let mut h = Harness::online();
    let at = h.env.timestamp();
    h.frame(InboundFrame::NewMessage(message(10, abc(), BOB, "one", at)));
    assert_eq!(h.unread(&abc()), 1);

    let actions = h.handle(ClientEvent::OpenChat { chat_id: abc() });
    assert_eq!(actions, vec![ClientAction::FetchMessages { chat_id: abc() }]);
    assert_eq!(h.unread(&abc()), 0);

    let actions = h.frame(InboundFrame::NewMessage(message(11, abc(), BOB, "two", at)));
    assert!(actions.is_empty(), "no notification for the open chat: {actions:?}");
    assert_eq!(h.unread(&abc()), 0);

    // Messages elsewhere still count, one each.
    h.frame(InboundFrame::NewMessage(message(12, team(), CY, "a", at)));
    h.frame(InboundFrame::NewMessage(message(13, team(), CY, "b", at)));
    assert_eq!(h.unread(&team()), 2);
}

#[test]
fn message_for_an_unknown_chat_refreshes_the_list() {
    let mut h = Harness::online();
    let stranger = ChatId::new("direct-1-99");
    let actions = h.frame(InboundFrame::NewMessage(message(
        20,
        stranger.clone(),
        99,
        "hello there",
        h.env.timestamp(),
    )));

    assert_eq!(actions.first(), Some(&ClientAction::FetchChats));
    assert!(matches!(actions.get(1), Some(ClientAction::Notify { tag, .. }) if tag == "someone"));
    assert_eq!(h.ids(&stranger), vec![Some(20)]);
}

#[test]
fn malformed_frames_are_logged_and_dropped() {
    let mut h = Harness::online();
    let before = h.client.session();

    for raw in ["not json", r#"{"type":"launch","data":{}}"#, r#"{"type":"typing","data":{}}"#] {
        let actions = h.handle(ClientEvent::FrameReceived { raw: raw.to_string(), now: h.now() });
        let dropped = matches!(
            actions.as_slice(),
            [ClientAction::Log { level: LogLevel::Warn, message }]
                if message.starts_with("dropped inbound frame")
        );
        assert!(dropped, "{raw}: {actions:?}");
    }
    assert!(std::sync::Arc::ptr_eq(&before, &h.client.session()));
}

#[test]
fn read_cursor_never_regresses() {
    let mut h = Harness::online();

    let actions = h.handle(ClientEvent::MarkRead { chat_id: abc(), message_id: 5 });
    assert_eq!(actions, vec![ClientAction::Send(OutboundFrame::read(abc(), 5))]);
    h.handle(ClientEvent::MarkRead { chat_id: abc(), message_id: 3 });
    assert_eq!(h.client.session().receipts().cursor(&abc()), Some(5));

    h.handle(ClientEvent::MarkRead { chat_id: abc(), message_id: 8 });
    assert_eq!(h.client.session().receipts().cursor(&abc()), Some(8));
}

#[test]
fn receipts_and_typing_are_not_sent_while_offline() {
    let mut h = Harness::new();

    let actions = h.handle(ClientEvent::MarkRead { chat_id: abc(), message_id: 5 });
    assert!(actions.is_empty());
    assert_eq!(h.client.session().receipts().cursor(&abc()), Some(5));

    let actions = h.handle(ClientEvent::SetTyping { chat_id: abc(), is_typing: true });
    assert!(actions.is_empty());
}

#[test]
fn marking_the_newest_message_read_clears_unread() {
    let mut h = Harness::online();
    let at = h.env.timestamp();
    h.frame(InboundFrame::NewMessage(message(10, abc(), BOB, "one", at)));
    h.frame(InboundFrame::NewMessage(message(11, abc(), BOB, "two", at)));
    assert_eq!(h.unread(&abc()), 2);

    h.handle(ClientEvent::MarkRead { chat_id: abc(), message_id: 10 });
    assert_eq!(h.unread(&abc()), 2, "older message does not clear the count");

    h.handle(ClientEvent::MarkRead { chat_id: abc(), message_id: 11 });
    assert_eq!(h.unread(&abc()), 0);
}

#[test]
fn opening_a_chat_marks_its_history_read() {
    let mut h = Harness::online();
    h.handle(ClientEvent::OpenChat { chat_id: abc() });

    let at = h.env.timestamp();
    let history = vec![message(3, abc(), BOB, "old", at), message(4, abc(), VIEWER, "reply", at)];
    let actions = h.handle(ClientEvent::MessagesLoaded { chat_id: abc(), messages: history });

    assert_eq!(actions, vec![ClientAction::Send(OutboundFrame::read(abc(), 4))]);
    assert_eq!(h.client.session().receipts().cursor(&abc()), Some(4));
}

#[test]
fn peer_receipts_are_tracked() {
    let mut h = Harness::online();
    h.frame(InboundFrame::MessageRead(ReadReceipt { chat_id: abc(), message_id: 12 }));
    h.frame(InboundFrame::MessageRead(ReadReceipt { chat_id: abc(), message_id: 9 }));

    let session = h.client.session();
    assert_eq!(session.receipts().peer_cursor(&abc()), Some(12));
    assert!(session.receipts().seen_by_peer(&abc(), 11));
    assert!(!session.receipts().seen_by_peer(&abc(), 13));
}

#[test]
fn reset_forgets_everything() {
    let mut h = Harness::online();
    h.send(abc(), "hello");

    let actions = h.handle(ClientEvent::Reset);
    assert!(actions.contains(&ClientAction::Disconnect));

    let session = h.client.session();
    assert!(session.chats().is_empty());
    assert!(!session.realtime_enabled());
    assert_eq!(session.viewer().id, VIEWER);
    assert_eq!(h.client.pending_sends(), 0);
}

#[derive(Debug, Clone, Copy)]
enum Delivery {
    Echo(usize),
    Response(usize),
}

fn deliveries() -> impl Strategy<Value = (usize, Vec<Delivery>)> {
    (1usize..5, 0usize..4).prop_flat_map(|(sends, duplicates)| {
        let mut all: Vec<Delivery> = (0..sends)
            .flat_map(|i| [Delivery::Echo(i), Delivery::Response(i)])
            .collect();
        all.extend((0..duplicates).map(|d| Delivery::Echo(d % sends)));
        (Just(sends), Just(all).prop_shuffle())
    })
}

#[test]
fn prop_echo_and_response_in_any_order_confirm_once() {
    proptest!(|((sends, order) in deliveries())| {
        let mut h = Harness::online();
        let at = h.env.timestamp();

        let requests: Vec<u64> = (0..sends).map(|i| h.send(abc(), &format!("m{i}"))).collect();
        let persisted: Vec<Message> = (0..sends)
            .map(|i| message(100 + i as u64, abc(), VIEWER, &format!("m{i}"), at))
            .collect();

        for delivery in order {
            match delivery {
                Delivery::Echo(i) => {
                    h.frame(InboundFrame::NewMessage(persisted[i].clone()));
                },
                Delivery::Response(i) => {
                    h.posted(requests[i], persisted[i].clone());
                },
            }
        }

        let mut ids: Vec<u64> = h.ids(&abc()).into_iter().map(|id| id.unwrap()).collect();
        ids.sort_unstable();
        let expected: Vec<u64> = (0..sends as u64).map(|i| 100 + i).collect();
        prop_assert_eq!(ids, expected);
        prop_assert_eq!(h.client.pending_sends(), 0);
        prop_assert_eq!(h.unread(&abc()), 0);
    });
}
