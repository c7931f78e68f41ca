// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slash command endpoint tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use stepcurry::services::messages;
use tower::ServiceExt;

mod common;

use common::{challenge_id, CHANNEL, RESPONSE_URL};

fn command_request(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn form_for(user_id: &str) -> String {
    format!(
        "token=ignored&team_id=T1&team_domain=acme&channel_id={}&channel_name=general&user_id={}&user_name=someone&command=%2Fchallenge&text=&response_url={}",
        CHANNEL,
        user_id,
        "https%3A%2F%2Fhooks.slack.test%2Fcommands%2F1"
    )
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_challenge_command_opens_challenge() {
    let (app, harness) = common::create_test_app();

    let response = app
        .oneshot(command_request("/commands/challenge", &form_for("U1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = harness
        .store
        .get_challenge(&challenge_id())
        .await
        .unwrap()
        .expect("challenge stored");
    assert!(stored.active);
    assert_eq!(stored.creator_id, "U1");
    assert_eq!(harness.scheduler.tasks().len(), 1);
}

#[tokio::test]
async fn test_second_challenge_command_replies_already_active() {
    let (app, harness) = common::create_test_app();

    let first = app
        .clone()
        .oneshot(command_request("/commands/challenge", &form_for("U1")))
        .await
        .unwrap();
    let second = app
        .oneshot(command_request("/commands/challenge", &form_for("U2")))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        harness.responder.replies(),
        vec![(
            RESPONSE_URL.to_string(),
            messages::CHALLENGE_ALREADY_ACTIVE.to_string()
        )]
    );
}

#[tokio::test]
async fn test_standings_command_without_challenge() {
    let (app, harness) = common::create_test_app();

    let response = app
        .oneshot(command_request("/commands/standings", &form_for("U1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let replies = harness.responder.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].1, messages::NO_ACTIVE_CHALLENGE);
}

#[tokio::test]
async fn test_command_with_invalid_response_url_rejected() {
    let (app, harness) = common::create_test_app();

    let response = app
        .oneshot(command_request(
            "/commands/challenge",
            "team_id=T1&channel_id=C1&user_id=U1&response_url=not-a-url",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "bad_request");
    assert!(harness.slack.posts().is_empty());
}

#[tokio::test]
async fn test_command_with_empty_team_rejected() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(command_request(
            "/commands/standings",
            "team_id=&channel_id=C1&user_id=U1&response_url=https%3A%2F%2Fhooks.slack.test%2F1",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_challenge_command_slack_failure_is_bad_gateway() {
    let (app, harness) = common::create_test_app();
    harness.slack.fail_posts_with("invalid_auth");

    let response = app
        .oneshot(command_request("/commands/challenge", &form_for("U1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
