//! Composer attempts against a live server.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{photo, serve, serve_with, HAIKU};
use photopoet_ai::AiError;
use photopoet_client::ClientError;
use photopoet_core::attempt::{AttemptState, GENERIC_FAILURE_MESSAGE, MISSING_PHOTO_MESSAGE};
use photopoet_core::style::PoemStyle;

#[tokio::test]
async fn successful_attempt_is_done_and_saved() {
    let server = serve().await;
    let client = server.started_client().await;

    let generation = client
        .composer
        .submit(Some(photo("lake.png")), PoemStyle::Haiku)
        .await
        .unwrap();

    assert_eq!(generation.poem, HAIKU);
    assert_eq!(generation.style, PoemStyle::Haiku);
    assert_eq!(generation.themes, "mountains, solitude, water");
    assert_eq!(generation.emotions, "peace, awe");
    assert_eq!(
        client.composer.current(),
        AttemptState::Done {
            style: PoemStyle::Haiku,
            poem: HAIKU.to_string(),
        }
    );

    let mut history = Vec::new();
    for _ in 0..100 {
        history = client.history.list().await.unwrap();
        if !history.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].poem, HAIKU);
    assert_eq!(history[0].photo_file_name, "lake.png");
    assert_eq!(history[0].title, None);
}

#[tokio::test]
async fn missing_photo_fails_without_a_request() {
    let server = serve().await;
    let client = server.started_client().await;

    let err = client.composer.submit(None, PoemStyle::Sonnet).await.unwrap_err();

    assert_matches!(err, ClientError::MissingPhoto);
    assert_eq!(
        client.composer.current(),
        AttemptState::Idle {
            last_error: Some(MISSING_PHOTO_MESSAGE.to_string()),
        }
    );
    assert!(client.history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_composition_returns_to_idle_with_message() {
    let server = serve_with(
        Duration::ZERO,
        Some(AiError::ApiError {
            status: 500,
            body: "model overloaded".into(),
        }),
    )
    .await;
    let client = server.started_client().await;

    let err = client
        .composer
        .submit(Some(photo("lake.png")), PoemStyle::Ode)
        .await
        .unwrap_err();

    assert_matches!(&err, ClientError::Api { status: 502, code, .. } if code == "GENERATION_FAILED");
    assert_eq!(
        client.composer.current(),
        AttemptState::Idle {
            last_error: Some(GENERIC_FAILURE_MESSAGE.to_string()),
        }
    );
    assert_eq!(client.composer.current().poem(), None);
    assert!(client.history.list().await.unwrap().is_empty());

    // The next attempt starts clean.
    let generation = client
        .composer
        .submit(Some(photo("lake.png")), PoemStyle::Ode)
        .await
        .unwrap();
    assert_eq!(generation.style, PoemStyle::Ode);
}

#[tokio::test]
async fn second_submit_is_refused_while_in_flight() {
    let server = serve_with(Duration::from_millis(300), None).await;
    let client = server.started_client().await;
    let mut states = client.composer.subscribe();

    let composer = client.composer.clone();
    let first = tokio::spawn(async move {
        composer
            .submit(Some(photo("first.png")), PoemStyle::Haiku)
            .await
    });
    states
        .wait_for(|state| state.is_in_flight())
        .await
        .unwrap();
    assert!(client.composer.is_busy());

    let second = client
        .composer
        .submit(Some(photo("second.png")), PoemStyle::Limerick)
        .await;
    assert_matches!(second, Err(ClientError::AttemptInFlight));

    let generation = first.await.unwrap().unwrap();
    assert_eq!(generation.photo_file_name, "first.png");
    assert!(!client.composer.is_busy());
}

#[tokio::test]
async fn attempt_starts_in_analyzing() {
    let server = serve_with(Duration::from_millis(50), None).await;
    let client = server.started_client().await;
    let mut states = client.composer.subscribe();

    let composer = client.composer.clone();
    let attempt = tokio::spawn(async move {
        composer
            .submit(Some(photo("lake.png")), PoemStyle::Ballad)
            .await
    });

    let first = states.wait_for(|s| s.is_in_flight()).await.unwrap().clone();
    assert_eq!(first, AttemptState::Analyzing { style: PoemStyle::Ballad });

    attempt.await.unwrap().unwrap();
    assert_matches!(client.composer.current(), AttemptState::Done { style: PoemStyle::Ballad, .. });
}

#[tokio::test]
async fn abandoned_attempt_frees_the_composer() {
    let server = serve_with(Duration::from_secs(2), None).await;
    let client = server.started_client().await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(200),
        client.composer.submit(Some(photo("lake.png")), PoemStyle::Haiku),
    )
    .await;
    assert!(abandoned.is_err(), "attempt should still be running");

    assert!(!client.composer.is_busy());
    assert_eq!(
        client.composer.current(),
        AttemptState::Idle {
            last_error: Some(GENERIC_FAILURE_MESSAGE.to_string()),
        }
    );

    // Give the server side time to settle its own attempt.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let generation = client
        .composer
        .submit(Some(photo("lake.png")), PoemStyle::Haiku)
        .await
        .unwrap();
    assert_eq!(generation.poem, HAIKU);
}
