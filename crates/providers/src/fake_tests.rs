// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::provider::collect_response;

#[tokio::test]
async fn create_records_model_and_prompt() {
    let provider = FakeProvider::new("fake-cli");
    provider.create("model-x", "be helpful").await.unwrap();
    assert_eq!(
        provider.calls(),
        vec![ProviderCall::Create {
            model: "model-x".to_string(),
            system_prompt: "be helpful".to_string(),
        }]
    );
}

#[tokio::test]
async fn send_returns_scripted_response() {
    let provider = FakeProvider::new("fake-cli");
    provider.set_response("hello", vec!["hi".to_string(), " there".to_string()]);
    let mut session = provider.create("m", "p").await.unwrap();
    let chunks = session.send("hello").await.unwrap();
    assert_eq!(collect_response(chunks).await, "hi there");
}

#[tokio::test]
async fn send_unscripted_prompt_uses_default_response() {
    let provider = FakeProvider::new("fake-cli");
    let mut session = provider.create("m", "p").await.unwrap();
    let chunks = session.send("anything").await.unwrap();
    assert_eq!(collect_response(chunks).await, "ok");
}

#[tokio::test]
async fn send_after_stop_is_already_stopped_error() {
    let provider = FakeProvider::new("fake-cli");
    let mut session = provider.create("m", "p").await.unwrap();
    session.stop().await.unwrap();
    let result = session.send("hi").await;
    assert!(matches!(result, Err(ProviderError::AlreadyStopped)));
}

#[tokio::test]
async fn suspend_returns_nonempty_state() {
    let provider = FakeProvider::new("fake-cli");
    let mut session = provider.create("m", "p").await.unwrap();
    let state = session.suspend().await.unwrap();
    assert!(!state.is_empty());
}

#[tokio::test]
async fn restore_records_state_blob() {
    let provider = FakeProvider::new("fake-cli");
    provider.restore(b"prior-state").await.unwrap();
    assert_eq!(
        provider.calls(),
        vec![ProviderCall::Restore {
            state: b"prior-state".to_vec()
        }]
    );
}
