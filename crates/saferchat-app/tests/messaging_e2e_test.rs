//! End-to-end messaging through the runtime.
//!
//! Full clients (runtime, session, simulated transport) talk through one
//! in-memory relay under paused time.

use std::convert::Infallible;

use saferchat_app::{Runtime, RuntimeError};
use saferchat_client::{
    EntryKind, Notice, Sender, Session, SessionConfig, SessionError, SessionState,
};
use saferchat_core::{Link, Transport, TransportConnection};
use saferchat_harness::{DriverHandle, ScriptedDriver, SimEnv, SimRelay, SimTransport, engine};
use saferchat_proto::{ClientCommand, Frame, PeerInfo};
use tokio::task::JoinHandle;

type Client = JoinHandle<Result<Session<SimEnv>, RuntimeError<Infallible>>>;

fn spawn_client(relay: &SimRelay, key: usize) -> (Client, DriverHandle) {
    let session =
        Session::with_engine(SimEnv::with_seed(key as u64), SessionConfig::default(), engine(key));
    let link = Link::new(SimTransport::new(relay), "mem://relay");
    let (driver, handle) = ScriptedDriver::new();
    (tokio::spawn(Runtime::new(session, link, driver).run()), handle)
}

fn is_joined(notice: &Notice) -> bool {
    matches!(notice, Notice::Joined { .. })
}

fn text_from<'a>(name: &'a str) -> impl Fn(&Notice) -> bool + 'a {
    move |notice| {
        matches!(notice, Notice::Entry(entry)
            if entry.kind == EntryKind::Text && entry.sender.name() == Some(name))
    }
}

async fn join(handle: &mut DriverHandle, nickname: &str) {
    handle.join(nickname, "lobby", "hunter2");
    handle.wait_for(is_joined).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn two_clients_exchange_messages() {
    let relay = SimRelay::new();
    let (alice_task, mut alice) = spawn_client(&relay, 0);
    let (bob_task, mut bob) = spawn_client(&relay, 1);

    join(&mut alice, "alice").await;
    join(&mut bob, "bob").await;

    alice.say("hello bob");
    let Some(Notice::Entry(entry)) = bob.wait_for(text_from("alice")).await else {
        panic!("bob never saw alice's message");
    };
    assert_eq!(entry.sender, Sender::Peer { id: 2, name: "alice".into() });
    assert_eq!(entry.content.as_deref(), Some("hello bob"));

    bob.say("hi alice");
    let Some(Notice::Entry(entry)) = alice.wait_for(text_from("bob")).await else {
        panic!("alice never saw bob's message");
    };
    assert_eq!(entry.content.as_deref(), Some("hi alice"));
    assert_eq!(relay.stats().messages_routed, 2);

    alice.quit();
    let session = alice_task.await.unwrap().unwrap();
    let texts: Vec<_> = session
        .log()
        .entries()
        .iter()
        .filter(|e| e.kind == EntryKind::Text && e.sender != Sender::System)
        .map(|e| (e.sender.name().map(str::to_string), e.content.clone()))
        .collect();
    assert_eq!(
        texts,
        vec![
            (Some("alice".into()), Some("hello bob".into())),
            (Some("bob".into()), Some("hi alice".into())),
        ]
    );

    // Quitting left the channel
    let left = bob
        .wait_for(|n| matches!(n, Notice::Entry(e) if e.kind == EntryKind::Left))
        .await
        .unwrap();
    assert!(matches!(left, Notice::Entry(e) if e.sender.name() == Some("alice")));

    drop(bob);
    bob_task.await.unwrap().unwrap();
    assert_eq!(relay.connection_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn wrong_secret_is_rejected_and_can_be_retried() {
    let relay = SimRelay::new();
    let (_alice_task, mut alice) = spawn_client(&relay, 0);
    let (bob_task, mut bob) = spawn_client(&relay, 1);
    join(&mut alice, "alice").await;

    bob.join("bob", "lobby", "letmein");
    let rejected = bob.wait_for(|n| matches!(n, Notice::Rejected { .. })).await.unwrap();
    assert_eq!(rejected, Notice::Rejected { reason: "invalid secret".into() });

    join(&mut bob, "bob").await;
    assert_eq!(relay.members("lobby"), vec!["alice".to_string(), "bob".to_string()]);

    bob.quit();
    let session = bob_task.await.unwrap().unwrap();
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn peer_with_malformed_key_is_never_listed() {
    let relay = SimRelay::new();
    let (_alice_task, mut alice) = spawn_client(&relay, 0);
    join(&mut alice, "alice").await;

    // A broken client announces a key that is not even base64
    let mut eve = SimTransport::new(&relay).connect("mem://relay").await.unwrap();
    let join_eve = ClientCommand::JoinChannel {
        channel: "lobby".into(),
        secret: saferchat_crypto::digest("hunter2"),
        name: PeerInfo { name: "eve".into(), key: "not-base64!!".into() },
    };
    eve.send(Frame::Command(join_eve).encode().unwrap()).await.unwrap();

    let (_bob_task, mut bob) = spawn_client(&relay, 1);
    bob.join("bob", "lobby", "hunter2");
    let roster = bob.wait_for(|n| matches!(n, Notice::Roster(_))).await.unwrap();
    let Notice::Roster(peers) = roster else { unreachable!() };
    let names: Vec<_> = peers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["alice"]);

    // Alice skipped eve too, then saw bob
    let notices = {
        let mut seen = Vec::new();
        while let Some(notice) = alice.next_notice().await {
            let done = matches!(&notice, Notice::Roster(p) if p.iter().any(|p| p.name == "bob"));
            seen.push(notice);
            if done {
                break;
            }
        }
        seen
    };
    assert!(!notices.iter().any(|n| matches!(n, Notice::Entry(e) if e.sender.name() == Some("eve"))));
}

#[tokio::test(start_paused = true)]
async fn local_refusals_reach_the_driver() {
    let relay = SimRelay::new();
    let (_alice_task, mut alice) = spawn_client(&relay, 0);

    alice.say("too early");
    assert_eq!(alice.next_refusal().await, Some(SessionError::NotJoined));

    join(&mut alice, "alice").await;
    alice.say(&"x".repeat(500));
    assert_eq!(alice.next_refusal().await, Some(SessionError::MessageTooLong { len: 500, max: 190 }));
}
