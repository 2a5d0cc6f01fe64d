use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::time::{sleep, timeout};

use super::subscription::{PING_TOPIC, topic_names, wants_heartbeat};
use crate::broker::{Counters, Manager};
use crate::config::BrokerSettings;

const WAIT: Duration = Duration::from_secs(2);

fn spawn_manager() -> Manager {
    let (manager, _task) = Manager::spawn(&BrokerSettings::default(), Arc::new(Counters::default()));
    manager
}

#[test]
fn test_heartbeat_predicate() {
    assert!(wants_heartbeat("room", "a,b"));
    assert!(!wants_heartbeat("sse", "admin"));
    // each half of the exemption applies on its own
    assert!(!wants_heartbeat("sse", "news"));
    assert!(!wants_heartbeat("room", "admin"));
    assert!(wants_heartbeat("room", "admin,news"));
}

#[test]
fn test_topic_names() {
    assert_eq!(topic_names("room", "a,b"), vec!["room:a", "room:b", PING_TOPIC]);
    assert_eq!(topic_names("sse", "admin"), vec!["sse:admin"]);
    assert_eq!(topic_names("room", "a,a"), vec!["room:a", PING_TOPIC]);
}

#[tokio::test]
async fn test_open_receives_every_topic_and_ping() {
    let manager = spawn_manager();
    let subscription = manager.open("room", "a,b").await.unwrap();

    manager.publish("room:a", "from a").await.unwrap();
    manager.publish("room:b", "from b").await.unwrap();
    manager.publish(PING_TOPIC, "ping").await.unwrap();

    let mut received = Vec::new();
    for _ in 0..3 {
        let message = timeout(WAIT, subscription.recv()).await.unwrap().unwrap();
        received.push(message.payload_text().into_owned());
    }
    received.sort();
    assert_eq!(received, vec!["from a", "from b", "ping"]);
}

#[tokio::test]
async fn test_admin_subscription_skips_ping() {
    let manager = spawn_manager();
    let admin = manager.open("sse", "admin").await.unwrap();
    assert_eq!(admin.topics(), ["sse:admin"]);

    manager.publish(PING_TOPIC, "ping").await.unwrap();
    manager.publish("sse:admin", "stats").await.unwrap();

    let message = timeout(WAIT, admin.recv()).await.unwrap().unwrap();
    assert_eq!(&*message.topic, "sse:admin");
    assert_eq!(message.payload, "stats");
    assert!(admin.queue().try_recv().is_none());
}

#[tokio::test]
async fn test_close_twice_closes_queue_once() {
    let manager = spawn_manager();
    let mut subscription = manager.open("room", "a,b").await.unwrap();
    let queue = subscription.queue().clone();

    subscription.close().await.unwrap();
    subscription.close().await.unwrap();
    assert!(subscription.is_closed());

    // same mailbox as the unsubscribes, so they have been applied
    assert_eq!(manager.subscriber_count("room:a").await.unwrap(), Some(0));
    assert_eq!(manager.subscriber_count(PING_TOPIC).await.unwrap(), Some(0));
    assert!(queue.is_closed());
    assert!(subscription.recv().await.is_none());
}

#[tokio::test]
async fn test_end_to_end_publish_then_close() {
    let manager = spawn_manager();
    let mut subscription = manager.open("room", "a,b").await.unwrap();

    manager.publish("room:a", "hello").await.unwrap();
    let message = timeout(WAIT, subscription.recv()).await.unwrap().unwrap();
    assert_eq!(message.payload, "hello");

    subscription.close().await.unwrap();
    manager.subscriber_count("room:a").await.unwrap();

    manager.publish("room:a", "after close").await.unwrap();
    sleep(Duration::from_millis(20)).await;
    assert!(subscription.queue().try_recv().is_none());
    assert_eq!(manager.counters().messages(), 2);
}

#[tokio::test]
async fn test_drop_releases_registrations() {
    let manager = spawn_manager();
    let subscription = manager.open("room", "dropped").await.unwrap();
    let queue = subscription.queue().clone();
    assert_eq!(manager.subscriber_count("room:dropped").await.unwrap(), Some(1));

    drop(subscription);

    timeout(WAIT, async {
        while manager.subscriber_count("room:dropped").await.unwrap() != Some(0) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("drop did not release the subscription");
    timeout(WAIT, async {
        while !queue.is_closed() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queue was not closed");
}

#[tokio::test]
async fn test_into_stream_yields_messages() {
    let manager = spawn_manager();
    let subscription = manager.open("room", "stream").await.unwrap();
    let mut stream = Box::pin(subscription.into_stream());

    manager.publish("room:stream", "first").await.unwrap();
    manager.publish("room:stream", "second").await.unwrap();

    let first = timeout(WAIT, stream.next()).await.unwrap().unwrap();
    let second = timeout(WAIT, stream.next()).await.unwrap().unwrap();
    assert_eq!(first.payload, "first");
    assert_eq!(second.payload, "second");

    drop(stream);
    timeout(WAIT, async {
        while manager.subscriber_count("room:stream").await.unwrap() != Some(0) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dropping the stream did not release the subscription");
}

#[tokio::test]
async fn test_cancelled_close_is_finished_by_drop() {
    let settings = BrokerSettings {
        mailbox_capacity: 1,
        ..BrokerSettings::default()
    };
    let (manager, _task) = Manager::spawn(&settings, Arc::new(Counters::default()));
    let mut subscription = manager.open("room", "a,b").await.unwrap();
    let queue = subscription.queue().clone();

    // occupy the only control slot so the first unsubscribe cannot be sent
    let other = manager.new_queue();
    manager.subscribe("room:other", &other).await.unwrap();
    assert!(subscription.close().now_or_never().is_none());
    assert!(!subscription.is_closed());

    drop(subscription);

    timeout(WAIT, async {
        while !queue.is_closed() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queue was not closed after a cancelled close");
    for topic in ["room:a", "room:b", PING_TOPIC] {
        assert_eq!(manager.subscriber_count(topic).await.unwrap(), Some(0));
    }
}
