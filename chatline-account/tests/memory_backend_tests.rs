// ABOUTME: Tests for the in-memory account backend.
// ABOUTME: Covers the event source, message storage, sending, echo mode, and configuration.

use chatline_account::backends::memory::{MemoryAccount, ECHO_ADDR};
use chatline_account::event::{CONFIGURE_PROGRESS, INCOMING_MSG, INFO, MSGS_CHANGED};
use chatline_account::{AccountError, AccountService, ChatId, Event, MsgId};
use std::time::Duration;

const WAIT: Duration = Duration::from_millis(20);

fn drain(account: &MemoryAccount) -> Vec<Event> {
    let mut events = vec![];
    while let Ok(Some(event)) = account.next_event(WAIT) {
        events.push(event);
    }
    events
}

#[test]
fn test_next_event_times_out_when_idle() {
    let account = MemoryAccount::new();
    assert_eq!(account.next_event(WAIT), Ok(None));
}

#[test]
fn test_events_come_out_in_emit_order() {
    let account = MemoryAccount::new();
    account.emit(Event::info("one"));
    account.emit(Event::new("DC_EVENT_SOMETHING_NEW", 1, 2));
    account.emit(Event::info("three"));

    let names: Vec<String> = drain(&account).into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec![INFO, "DC_EVENT_SOMETHING_NEW", INFO]);
}

#[test]
fn test_close_drains_then_reports_closed() {
    let account = MemoryAccount::new();
    account.emit(Event::info("queued before close"));
    account.close();
    account.emit(Event::info("dropped after close"));

    let first = account.next_event(WAIT).unwrap().unwrap();
    assert_eq!(first.data2.as_str(), Some("queued before close"));
    assert_eq!(account.next_event(WAIT), Err(AccountError::SourceClosed));
    // Closing twice is harmless
    account.close();
    assert_eq!(account.next_event(WAIT), Err(AccountError::SourceClosed));
}

#[tokio::test]
async fn test_deliver_incoming_stores_and_emits() {
    let account = MemoryAccount::new().configured_as("me@example.org");
    let chat = account.create_chat("bob@example.org");
    let msg = account.deliver_incoming(chat, "bob@example.org", "hello");

    let events = drain(&account);
    assert_eq!(events, vec![Event::incoming_msg(chat, msg)]);

    let message = account.get_message_by_id(msg).await.unwrap();
    assert_eq!(message.text, "hello");
    assert_eq!(message.chat_id, chat);
    assert_eq!(message.sender.addr, "bob@example.org");
    assert!(!message.outgoing);
    assert!(!message.is_attachment());
}

#[tokio::test]
async fn test_deliver_attachment() {
    let account = MemoryAccount::new();
    let chat = account.create_chat("bob@example.org");
    let msg = account.deliver_attachment(chat, "bob@example.org", "look", "/tmp/cat.jpg");

    let message = account.get_message_by_id(msg).await.unwrap();
    assert!(message.is_image());
    assert_eq!(
        message.attachment_path(),
        Some(std::path::Path::new("/tmp/cat.jpg"))
    );
}

#[tokio::test]
async fn test_unknown_message_is_not_found() {
    let account = MemoryAccount::new();
    let err = account.get_message_by_id(MsgId(999)).await.unwrap_err();
    assert_eq!(err, AccountError::message_not_found(MsgId(999)));
}

#[tokio::test]
async fn test_removed_message_is_not_found() {
    let account = MemoryAccount::new();
    let chat = account.create_chat("bob@example.org");
    let msg = account.deliver_incoming(chat, "bob@example.org", "oops");
    assert!(account.remove_message(msg));
    assert!(account.get_message_by_id(msg).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_create_chat_is_idempotent_per_peer() {
    let account = MemoryAccount::new();
    let first = account.create_chat("bob@example.org");
    let again = account.create_chat("bob@example.org");
    let other = account.create_chat("carol@example.org");
    assert_eq!(first, again);
    assert_ne!(first, other);
    assert_eq!(account.get_chats().await.unwrap().len(), 2);
    assert_eq!(account.get_chat(other).await.unwrap().name, "carol@example.org");
    assert!(account.get_chat(ChatId(1)).await.is_err());
}

#[tokio::test]
async fn test_send_text_requires_configuration() {
    let account = MemoryAccount::new();
    let chat = account.create_chat("bob@example.org");
    let err = account.send_text(chat, "hi").await.unwrap_err();
    assert_eq!(err, AccountError::NotConfigured);
}

#[tokio::test]
async fn test_send_text_stores_outgoing_and_emits_msgs_changed() {
    let account = MemoryAccount::new().configured_as("me@example.org");
    let chat = account.create_chat("bob@example.org");
    let sent = account.send_text(chat, "hi bob").await.unwrap();

    let events = drain(&account);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, MSGS_CHANGED);

    let messages = account.get_messages(chat).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, sent);
    assert!(messages[0].outgoing);
    assert_eq!(messages[0].sender.addr, "me@example.org");
}

#[tokio::test]
async fn test_send_text_rejects_empty_and_unknown_chat() {
    let account = MemoryAccount::new().configured_as("me@example.org");
    let chat = account.create_chat("bob@example.org");
    assert!(matches!(
        account.send_text(chat, "").await,
        Err(AccountError::InvalidInput(_))
    ));
    assert!(account
        .send_text(ChatId(4242), "hi")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_echo_mode_answers_sent_text() {
    let account = MemoryAccount::new()
        .configured_as("me@example.org")
        .with_echo(true);
    let chat = account.create_chat(ECHO_ADDR);
    account.send_text(chat, "ping").await.unwrap();

    let events = drain(&account);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name, MSGS_CHANGED);
    assert_eq!(events[1].name, INCOMING_MSG);

    let echoed = MsgId::from_value(&events[1].data2).unwrap();
    let message = account.get_message_by_id(echoed).await.unwrap();
    assert_eq!(message.text, "ping");
    assert_eq!(message.sender.addr, ECHO_ADDR);
    assert!(!message.outgoing);
}

#[tokio::test]
async fn test_messages_are_listed_oldest_first() {
    let account = MemoryAccount::new();
    let bob = account.create_chat("bob@example.org");
    let carol = account.create_chat("carol@example.org");
    let m1 = account.deliver_incoming(bob, "bob@example.org", "1");
    account.deliver_incoming(carol, "carol@example.org", "other chat");
    let m2 = account.deliver_incoming(bob, "bob@example.org", "2");

    let ids: Vec<MsgId> = account
        .get_messages(bob)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![m1, m2]);
}

#[tokio::test]
async fn test_mark_seen() {
    let account = MemoryAccount::new();
    let chat = account.create_chat("bob@example.org");
    let msg = account.deliver_incoming(chat, "bob@example.org", "read me");
    assert!(!account.is_seen(msg));
    account.mark_seen(&[msg, MsgId(777)]).await.unwrap();
    assert!(account.is_seen(msg));
    assert!(!account.is_seen(MsgId(777)));
}

#[tokio::test]
async fn test_configure_success_emits_progress() {
    let account = MemoryAccount::new();
    account.configure("me@example.org", "secret").await.unwrap();
    assert!(account.is_configured().await.unwrap());

    let events = drain(&account);
    assert_eq!(events[0], Event::configure_progress(1000));
    assert_eq!(events[1].name, INFO);
}

#[tokio::test]
async fn test_configure_rejects_bad_address() {
    let account = MemoryAccount::new();
    let err = account.configure("not-an-address", "secret").await.unwrap_err();
    assert!(matches!(err, AccountError::InvalidInput(_)));
    assert!(!account.is_configured().await.unwrap());

    let events = drain(&account);
    assert_eq!(events[0].name, CONFIGURE_PROGRESS);
    assert_eq!(events[0].data1, serde_json::json!(0));
}

#[tokio::test(start_paused = true)]
async fn test_lookup_delay() {
    let account = MemoryAccount::new().with_lookup_delay(Duration::from_secs(3));
    let chat = account.create_chat("bob@example.org");
    let msg = account.deliver_incoming(chat, "bob@example.org", "slow");

    let start = tokio::time::Instant::now();
    account.get_message_by_id(msg).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(3));
}
