// tests/dev_server_pair.rs

use std::time::Duration;

use devloop::bus::{EventBus, Message};
use devloop::errors::DevloopError;
use devloop::server::{run_pair, ControlServer};
use devloop_test_utils::{init_tracing, with_timeout};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn first_error_cancels_the_other_task() {
    init_tracing();
    let token = CancellationToken::new();

    let waiter = token.clone();
    let control = async move {
        waiter.cancelled().await;
        Ok(())
    };
    let app = async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Err(DevloopError::Watch("inotify limit reached".to_string()))
    };

    let err = with_timeout(run_pair(token.clone(), control, app))
        .await
        .unwrap_err();
    assert!(matches!(err, DevloopError::Watch(_)), "{err:?}");
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn later_errors_do_not_replace_the_first() {
    let token = CancellationToken::new();

    let waiter = token.clone();
    let control = async move {
        waiter.cancelled().await;
        Err(DevloopError::Lifecycle("control unwound with error".to_string()))
    };
    let app = async move { Err(DevloopError::Handoff("port exhausted".to_string())) };

    let err = with_timeout(run_pair(token, control, app)).await.unwrap_err();
    assert!(matches!(err, DevloopError::Handoff(_)), "{err:?}");
}

#[tokio::test]
async fn external_cancellation_ends_both_cleanly() {
    let token = CancellationToken::new();
    let (a, b) = (token.clone(), token.clone());

    let pair = tokio::spawn(run_pair(
        token.clone(),
        async move {
            a.cancelled().await;
            Ok(())
        },
        async move {
            b.cancelled().await;
            Ok(())
        },
    ));

    token.cancel();
    with_timeout(pair).await.unwrap().unwrap();
}

#[tokio::test]
async fn control_server_streams_bus_messages_as_json_lines() {
    init_tracing();
    let bus = EventBus::new();
    let server = ControlServer::bind("127.0.0.1:0", bus.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let token = CancellationToken::new();
    let running = tokio::spawn(server.run(token.clone()));

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut lines = BufReader::new(stream).lines();

    // The subscription is created when the connection is accepted; keep
    // publishing until the first message shows up.
    let first = with_timeout(async {
        loop {
            bus.publish(Message::AppReady);
            tokio::select! {
                line = lines.next_line() => break line.unwrap().unwrap(),
                _ = tokio::time::sleep(Duration::from_millis(20)) => {}
            }
        }
    })
    .await;
    assert_eq!(first, r#"{"topic":"app:ready"}"#);

    bus.publish(Message::app_error("exit status 1"));
    let line = with_timeout(async {
        loop {
            let line = lines.next_line().await.unwrap().unwrap();
            if line != r#"{"topic":"app:ready"}"# {
                break line;
            }
        }
    })
    .await;
    assert_eq!(line, r#"{"topic":"app:error","message":"exit status 1"}"#);

    token.cancel();
    with_timeout(running).await.unwrap().unwrap();
}
