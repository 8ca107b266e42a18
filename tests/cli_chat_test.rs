//! Integration tests for the chat surface.
//!
//! The real backend is never called here: these cover the credential guard
//! and the conversation bookkeeping that works offline. The advisor itself
//! is unit-tested against a scripted client.

mod common;

use common::TestWorkspace;
use predicates::prelude::*;

#[test]
fn test_chat_without_api_key_fails_cleanly() {
    let ws = TestWorkspace::initialized();
    let id = ws.create_doc("Lonely");

    ws.mull()
        .args(["chat", &id, "what do you think?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no API key"));

    // No partial conversation was stored.
    ws.mull()
        .args(["history", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"messages\":[]"));
}

#[test]
fn test_chat_missing_document() {
    let ws = TestWorkspace::initialized();

    ws.mull()
        .args(["chat", "ml-ffff", "hello"])
        .assert()
        .failure();
}

#[test]
fn test_history_empty() {
    let ws = TestWorkspace::initialized();
    let id = ws.create_doc("Quiet");

    ws.mull()
        .args(["history", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"messages\":[]"));
}

#[test]
fn test_history_human_format() {
    let ws = TestWorkspace::initialized();
    let id = ws.create_doc("Quiet");

    ws.mull()
        .args(["history", &id, "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversation yet."));
}
