//! Rules documents loaded from disk and served over channels.
//!
//! Run with: cargo test -p mockrpc-test --test config_files

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mockrpc_test::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

fn config_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("configs").join(name)
}

fn m(text: &str) -> Message {
    Message::from(json!({ "message": text }))
}

fn greeter() -> Dispatcher {
    let config = MockConfig::from_path(config_path("greeter.json")).expect("load greeter.json");
    Dispatcher::new(Arc::new(config.build().expect("build greeter.json")))
}

#[test]
fn json_document_keeps_service_identity() {
    init_tracing();
    let config = MockConfig::from_path(config_path("greeter.json")).unwrap();
    let service = config.service();
    assert_eq!(service.full_name().as_deref(), Some("greeter.Greeter"));
    assert_eq!(service.proto_path.as_deref(), Some("greeter.proto"));

    let store = config.build().unwrap();
    assert_eq!(store.len(), 5);
    assert!(store.shadowed().is_empty());
}

#[test]
fn bare_rules_list_from_yaml() {
    init_tracing();
    let store = MockConfig::from_path(config_path("rules-only.yaml"))
        .unwrap()
        .build()
        .unwrap();
    let dispatcher = Dispatcher::new(Arc::new(store));

    let out = dispatcher
        .call("/any.Service/howAreYou", StreamType::ClientStream, [m("Hi"), m("How are you?")])
        .unwrap();
    assert_eq!(out, vec![m("I'm fine, thank you")]);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = MockConfig::from_path(config_path("does-not-exist.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "{err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mutual_stream_over_channels() {
    init_tracing();
    let dispatcher = greeter();
    let (in_tx, in_rx) = mpsc::channel(4);
    let (out_tx, mut out_rx) = mpsc::channel(4);
    let handle = dispatcher.spawn("/greeter.Greeter/chat", StreamType::MutualStream, in_rx, out_tx);

    in_tx.send(m("Hi")).await.unwrap();
    assert_eq!(out_rx.recv().await.unwrap().unwrap(), m("Hi there"));

    in_tx.send(m("How are you?")).await.unwrap();
    assert_eq!(out_rx.recv().await.unwrap().unwrap(), m("I'm fine, thank you."));

    drop(in_tx);
    assert!(out_rx.recv().await.is_none());
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_stream_error_over_channels() {
    init_tracing();
    let dispatcher = greeter();
    let (in_tx, in_rx) = mpsc::channel(1);
    let (out_tx, mut out_rx) = mpsc::channel(4);
    let handle = dispatcher.spawn("returnsErrorWithMetadata", StreamType::ServerStream, in_rx, out_tx);

    in_tx.send(Message::empty()).await.unwrap();
    drop(in_tx);

    let err = out_rx.recv().await.unwrap().unwrap_err();
    let descriptor = err.into_descriptor();
    assert_eq!(descriptor.code, 3);
    assert_eq!(descriptor.message, "Message text is required");
    assert_eq!(descriptor.metadata.get("key").map(String::as_str), Some("value"));
    assert!(out_rx.recv().await.is_none());
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_calls_share_one_store() {
    let dispatcher = greeter();
    let mut handles = Vec::new();
    for i in 0..16 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                dispatcher.unary("hello", m("Hello"))
            } else {
                dispatcher.call("niceToMeetYou", StreamType::ServerStream, [m("Hi. I'm Frank")])
            }
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.await.unwrap().unwrap();
        if i % 2 == 0 {
            assert_eq!(out, vec![m("Hello")]);
        } else {
            assert_eq!(out, vec![m("Hi, I'm Sana"), m("Have you met John?")]);
        }
    }
}
