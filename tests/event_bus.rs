// tests/event_bus.rs

use devloop::bus::{EventBus, Message, Topic};

#[tokio::test]
async fn subscribers_only_see_messages_published_after_subscribing() {
    let bus = EventBus::new();
    bus.publish(Message::AppReady);

    let mut ready = bus.subscribe(Topic::AppReady);
    assert_eq!(ready.try_recv(), None);

    bus.publish(Message::AppReady);
    assert_eq!(ready.recv().await, Some(Message::AppReady));
    assert_eq!(ready.try_recv(), None);
}

#[tokio::test]
async fn topics_are_isolated() {
    let bus = EventBus::new();
    let mut frontend = bus.subscribe(Topic::FrontendUpdate);
    let mut errors = bus.subscribe(Topic::AppError);

    bus.publish(Message::FrontendUpdate);
    bus.publish(Message::app_error("boom"));
    bus.publish(Message::BackendUpdate);

    assert_eq!(frontend.try_recv(), Some(Message::FrontendUpdate));
    assert_eq!(frontend.try_recv(), None);
    assert_eq!(errors.try_recv(), Some(Message::app_error("boom")));
    assert_eq!(errors.try_recv(), None);
}

#[tokio::test]
async fn delivery_order_matches_publish_order() {
    let bus = EventBus::new();
    let mut errors = bus.subscribe(Topic::AppError);
    let mut all = bus.subscribe_all();

    for i in 0..10 {
        bus.publish(Message::app_error(format!("error {i}")));
    }

    for i in 0..10 {
        assert_eq!(errors.recv().await, Some(Message::app_error(format!("error {i}"))));
        assert_eq!(all.recv().await, Some(Message::app_error(format!("error {i}"))));
    }
}

#[tokio::test]
async fn publishing_never_blocks_on_a_slow_subscriber() {
    let bus = EventBus::new();
    let mut slow = bus.subscribe(Topic::AppReady);

    // Far more than the channel holds; publish must still return.
    for _ in 0..1_000 {
        bus.publish(Message::AppReady);
    }

    // The lagging subscriber skips what it lost and keeps receiving.
    assert_eq!(slow.recv().await, Some(Message::AppReady));
    bus.publish(Message::FrontendUpdate);
    assert_eq!(bus.subscriber_count(Topic::AppReady), 1);
}

#[test]
fn publishing_without_subscribers_is_fine() {
    let bus = EventBus::new();
    bus.publish(Message::BackendUpdate);
    assert_eq!(bus.subscriber_count(Topic::BackendUpdate), 0);
}

#[test]
fn messages_serialize_with_their_topic() {
    assert_eq!(
        Message::app_error("exit status 2").to_json_line(),
        "{\"topic\":\"app:error\",\"message\":\"exit status 2\"}\n"
    );
    assert_eq!(Message::AppReady.to_json_line(), "{\"topic\":\"app:ready\"}\n");
    assert_eq!(Message::FrontendUpdate.topic(), Topic::FrontendUpdate);
    assert_eq!(Topic::BackendUpdate.to_string(), "backend:update");
}
