//! End-to-end scenarios: two users, each running the full App/Bridge/Client
//! stack through [`Runtime`] against one shared [`SimServer`].
//!
//! Every driver checks the standard invariants on each render, so any
//! scenario that reaches an inconsistent session fails at that render.

use std::time::Duration;

use parley_app::{Command, KeyInput, RestCall, Runtime};
use parley_client::{ClientConfig, TypingLabel};
use parley_harness::{
    SharedServer, Shown, SimDriver, SimEnv, SimServer,
    invariants::{ClientSnapshot, InvariantRegistry},
    sim_server::lock,
};
use parley_proto::{ChatId, OutboundFrame, PresenceStatus, User};

type Rt = Runtime<SimDriver, SimEnv>;

const ADA: u64 = 1;
const BOB: u64 = 7;

struct World {
    env: SimEnv,
    server: SharedServer,
    ada: User,
    bob: User,
}

fn world() -> World {
    let env = SimEnv::new();
    let mut server = SimServer::new(env.clone());
    let ada = server.add_user(ADA, "ada", "Ada Lovelace");
    let bob = server.add_user(BOB, "bob", "Bob Byte");
    server.befriend(ADA, BOB);
    World { env, server: server.shared(), ada, bob }
}

fn direct() -> ChatId {
    SimServer::direct_chat_id(ADA, BOB)
}

fn runtime(world: &World, user: &User, realtime: bool) -> Rt {
    let driver = SimDriver::new(world.env.clone(), world.server.clone(), user.id)
        .with_invariants(InvariantRegistry::standard());
    Runtime::new(driver, world.env.clone(), user.clone(), ClientConfig::default(), realtime)
}

/// Step until the driver has nothing left to deliver. Returns whether the
/// App asked to quit.
async fn settle(rt: &mut Rt) -> bool {
    for _ in 0..500 {
        if rt.driver().is_idle() {
            return false;
        }
        if rt.step().await.unwrap() {
            return true;
        }
    }
    panic!("runtime did not settle");
}

async fn started(world: &World, user: &User) -> Rt {
    let mut rt = runtime(world, user, true);
    assert!(!rt.start().await.unwrap());
    settle(&mut rt).await;
    rt
}

/// Ada and Bob both online, each with presence of the other settled.
async fn both_online(world: &World) -> (Rt, Rt) {
    let mut ada = started(world, &world.ada).await;
    let bob = started(world, &world.bob).await;
    settle(&mut ada).await;
    (ada, bob)
}

async fn command(rt: &mut Rt, command: Command) {
    rt.driver_mut().command(command);
    settle(rt).await;
}

fn ids(rt: &Rt, chat_id: &ChatId) -> Vec<Option<u64>> {
    rt.app().session().messages(chat_id).iter().map(|m| m.id).collect()
}

fn unread(rt: &Rt, chat_id: &ChatId) -> u32 {
    rt.app().session().chat(chat_id).map_or(0, |c| c.unread_count)
}

#[tokio::test]
async fn startup_loads_lists_and_connects() {
    let world = world();
    let (ada, _bob) = both_online(&world).await;

    let session = ada.app().session();
    assert_eq!(ada.app().connection_label(), "connected");
    assert_eq!(session.chats().len(), 1);
    assert_eq!(session.chats()[0].id, direct());
    assert_eq!(session.friends()[0].status, PresenceStatus::Online, "bob's presence frame");
    assert!(lock(&world.server).is_connected(ADA));
}

#[tokio::test]
async fn message_reaches_peer_with_notification() {
    let world = world();
    let (mut ada, mut bob) = both_online(&world).await;

    command(&mut ada, Command::Open("Bob".into())).await;
    command(&mut ada, Command::Say("hello".into())).await;
    settle(&mut bob).await;

    assert_eq!(ids(&ada, &direct()), vec![Some(1)]);
    assert!(ada.driver().sent().is_empty(), "a whole-line send shows no typing burst");

    assert_eq!(ids(&bob, &direct()), vec![Some(1)]);
    assert_eq!(unread(&bob, &direct()), 1);
    assert_eq!(bob.driver().shown(), &[Shown {
        title: "New message from Ada Lovelace".into(),
        body: "hello".into(),
        tag: "Ada Lovelace".into(),
    }]);
    assert_eq!(bob.app().notifications().len(), 1);
    assert!(bob.app().session().typing().typing_in(&direct()).is_empty());
}

#[tokio::test]
async fn peer_view_after_one_message() {
    let world = world();
    let (mut ada, mut bob) = both_online(&world).await;

    command(&mut ada, Command::Open("Bob".into())).await;
    command(&mut ada, Command::Say("hello".into())).await;
    settle(&mut bob).await;

    let snapshot = ClientSnapshot::from_session(bob.app().session());
    insta::assert_json_snapshot!(snapshot, @r#"
    {
      "id": 7,
      "active_chat": null,
      "chats": [
        {
          "id": "direct-1-7",
          "unread_count": 1,
          "timestamp_ms": 1704067200000,
          "last_message": "hello"
        }
      ],
      "messages": {
        "direct-1-7": [
          {
            "id": 1,
            "sender_id": 1,
            "content": "hello",
            "timestamp_ms": 1704067200000
          }
        ]
      },
      "typing": {},
      "cursor_history": {}
    }
    "#);
}

#[tokio::test]
async fn echo_first_or_response_first_confirms_once() {
    for frames_first in [false, true] {
        let world = world();
        let mut ada = started(&world, &world.ada).await;
        ada.driver_mut().set_frames_first(frames_first);

        command(&mut ada, Command::Open("Bob".into())).await;
        command(&mut ada, Command::Say("one".into())).await;
        command(&mut ada, Command::Say("two".into())).await;

        assert_eq!(ids(&ada, &direct()), vec![Some(1), Some(2)], "frames_first={frames_first}");
        assert_eq!(ada.bridge().client().pending_sends(), 0);
    }
}

#[tokio::test]
async fn dropped_connection_confirms_from_the_response() {
    let world = world();
    let mut ada = started(&world, &world.ada).await;
    command(&mut ada, Command::Open("Bob".into())).await;

    lock(&world.server).set_hold_echoes(true);
    command(&mut ada, Command::Say("hello".into())).await;
    assert_eq!(ids(&ada, &direct()), vec![None], "still waiting for the echo");

    ada.driver_mut().drop_connection("server restart");
    settle(&mut ada).await;
    assert_eq!(ids(&ada, &direct()), vec![Some(1)]);
    assert_eq!(ada.app().connection_label(), "disconnected");

    // Held echoes die with the connection.
    lock(&world.server).set_hold_echoes(false);
    assert_eq!(lock(&world.server).release_echoes(), 0);

    world.env.advance(Duration::from_secs(2));
    ada.step().await.unwrap();
    settle(&mut ada).await;
    assert_eq!(ada.app().connection_label(), "connected");
    assert_eq!(ids(&ada, &direct()), vec![Some(1)]);
}

#[tokio::test]
async fn failed_send_restores_the_draft() {
    let world = world();
    let mut ada = started(&world, &world.ada).await;
    command(&mut ada, Command::Open("Bob".into())).await;

    lock(&world.server).fail_next_posts(1);
    command(&mut ada, Command::Say("hello".into())).await;

    assert!(ids(&ada, &direct()).is_empty());
    assert_eq!(ada.app().draft(), "hello");
    assert_eq!(ada.app().status_message(), Some("Message not sent: Internal server error"));

    // Retry with Enter.
    ada.driver_mut().key(KeyInput::Enter);
    settle(&mut ada).await;
    assert_eq!(ids(&ada, &direct()), vec![Some(1)]);
    assert_eq!(ada.app().draft(), "");
}

#[tokio::test]
async fn realtime_gives_up_but_messages_still_send() {
    let world = world();
    lock(&world.server).set_refuse_connections(true);

    let mut ada = runtime(&world, &world.ada, true);
    ada.driver_mut().set_auto_advance(true);
    ada.start().await.unwrap();
    for _ in 0..40 {
        ada.step().await.unwrap();
    }

    assert_eq!(world.env.elapsed(), Duration::from_secs(2 + 4 + 8));
    assert_eq!(
        ada.app().status_message(),
        Some("Realtime unavailable after 3 attempts; messages still send")
    );
    assert_eq!(ada.app().connection_label(), "disconnected");
    assert_eq!(ada.bridge().next_deadline(), None);

    command(&mut ada, Command::Open("Bob".into())).await;
    command(&mut ada, Command::Say("offline hello".into())).await;
    assert_eq!(ids(&ada, &direct()), vec![Some(1)]);
}

#[tokio::test]
async fn typing_indicator_shows_stops_and_expires() {
    let world = world();
    let (mut ada, mut bob) = both_online(&world).await;
    command(&mut ada, Command::Open("Bob".into())).await;
    command(&mut bob, Command::Open("Ada".into())).await;

    bob.driver_mut().key(KeyInput::Char('h'));
    settle(&mut bob).await;
    settle(&mut ada).await;
    assert_eq!(ada.app().typing_label(), TypingLabel::Single(BOB));

    // Three idle seconds end Bob's burst.
    world.env.advance(Duration::from_secs(3));
    bob.step().await.unwrap();
    settle(&mut ada).await;
    assert_eq!(ada.app().typing_label(), TypingLabel::None);
    assert_eq!(bob.driver().sent().last(), Some(&OutboundFrame::typing(direct(), false)));

    // A start whose stop never arrives expires on Ada's side.
    bob.driver_mut().key(KeyInput::Char('i'));
    settle(&mut bob).await;
    settle(&mut ada).await;
    assert_eq!(ada.app().typing_label(), TypingLabel::Single(BOB));

    world.env.advance(Duration::from_secs(10));
    ada.step().await.unwrap();
    assert_eq!(ada.app().typing_label(), TypingLabel::None);
}

#[tokio::test]
async fn opening_a_chat_sends_a_read_receipt() {
    let world = world();
    let (mut ada, mut bob) = both_online(&world).await;

    command(&mut bob, Command::Open("Ada".into())).await;
    command(&mut bob, Command::Say("ping".into())).await;
    settle(&mut ada).await;
    assert_eq!(unread(&ada, &direct()), 1);
    assert_eq!(ada.app().notifications().len(), 1);

    command(&mut ada, Command::Open("Bob".into())).await;
    assert_eq!(unread(&ada, &direct()), 0);
    assert!(ada.app().notifications().is_empty());
    assert_eq!(ada.app().session().receipts().cursor(&direct()), Some(1));
    assert_eq!(ada.driver().sent(), &[OutboundFrame::read(direct(), 1)]);

    settle(&mut bob).await;
    assert!(bob.app().session().receipts().seen_by_peer(&direct(), 1));
}

#[tokio::test]
async fn message_in_a_new_group_refreshes_the_peer() {
    let world = world();
    let (mut ada, mut bob) = both_online(&world).await;

    command(&mut ada, Command::Group { name: "Team".into(), members: vec!["bob".into()] }).await;
    let team = SimServer::group_chat_id(1);
    assert!(ada.app().session().chat(&team).is_some());

    command(&mut ada, Command::Open("Team".into())).await;
    command(&mut ada, Command::Say("standup".into())).await;
    settle(&mut bob).await;

    let fetches = bob
        .driver()
        .calls()
        .iter()
        .filter(|c| matches!(c, RestCall::FetchChats))
        .count();
    assert_eq!(fetches, 2, "initial load plus the unknown-chat refresh");
    assert_eq!(unread(&bob, &team), 1);
    assert_eq!(ids(&bob, &team), vec![Some(1)]);
}

#[tokio::test]
async fn malformed_frames_do_not_disturb_the_session() {
    let world = world();
    let mut ada = started(&world, &world.ada).await;
    let renders = ada.driver().renders();

    lock(&world.server).push_raw(ADA, "{oops".to_string());
    settle(&mut ada).await;

    assert_eq!(ada.driver().renders(), renders);
    assert_eq!(ada.app().status_message(), None);
    assert_eq!(ada.app().connection_label(), "connected");
}

#[tokio::test]
async fn logout_quits_and_goes_offline() {
    let world = world();
    let (mut ada, mut bob) = both_online(&world).await;

    ada.driver_mut().command(Command::Logout);
    assert!(settle(&mut ada).await, "logout quits the app");
    assert_eq!(ada.app().status_message(), Some("Logged out"));
    assert!(ada.app().session().chats().is_empty());
    assert!(!lock(&world.server).is_connected(ADA));

    settle(&mut bob).await;
    assert_eq!(bob.app().session().friends()[0].status, PresenceStatus::Offline);
}

#[tokio::test]
async fn open_resolves_friends_and_groups() {
    let world = world();
    let (mut ada, _bob) = both_online(&world).await;
    command(&mut ada, Command::Group { name: "Team".into(), members: vec!["bob".into()] }).await;

    command(&mut ada, Command::Open("bob".into())).await;
    assert_eq!(ada.app().session().active_chat(), Some(&direct()));

    command(&mut ada, Command::Open("team".into())).await;
    assert_eq!(ada.app().session().active_chat(), Some(&SimServer::group_chat_id(1)));

    command(&mut ada, Command::Search("tea".into())).await;
    let groups: Vec<&str> = ada.app().visible_groups().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(groups, vec!["Team"]);
    assert!(ada.app().visible_friends().is_empty());
}
