mod common;

use common::ScriptedTransport;
use resumelens::client::{REFRESH_PATH, LOGIN_PATH};
use resumelens::session::{LogoutReason, SessionEvent};
use resumelens::{ApiClient, Error, Role, Session, SessionStore};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

const SAVED_PATH: &str = "/api/jobs/saved";

fn logged_in_client(
    transport: &ScriptedTransport,
    refresh_token: Option<&str>,
) -> (ApiClient, Rc<RefCell<Vec<SessionEvent>>>) {
    let mut store = SessionStore::ephemeral();
    store
        .establish(Session {
            access_token: "stale-access".to_string(),
            refresh_token: refresh_token.map(|t| t.to_string()),
            role: Role::User,
            display_name: Some("Grace".to_string()),
        })
        .unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    store.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    (
        ApiClient::with_transport(Box::new(transport.clone()), store),
        events,
    )
}

fn logouts(events: &Rc<RefCell<Vec<SessionEvent>>>) -> Vec<LogoutReason> {
    events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            SessionEvent::LoggedOut(r) => Some(*r),
            _ => None,
        })
        .collect()
}

#[test]
fn test_refresh_then_replay_once() {
    let transport = ScriptedTransport::new();
    transport
        .reply(401, json!({"msg": "Token has expired"}))
        .reply(200, json!({"success": true, "access_token": "fresh-access"}))
        .reply(200, json!({"success": true, "data": ["job-1", "job-2"]}));
    let (mut client, events) = logged_in_client(&transport, Some("refresh-1"));

    let saved = client.saved_jobs().unwrap();
    assert_eq!(saved, vec!["job-1", "job-2"]);

    let sent = transport.sent();
    assert_eq!(transport.paths(), vec![SAVED_PATH, REFRESH_PATH, SAVED_PATH]);
    assert_eq!(sent[0].bearer.as_deref(), Some("stale-access"));
    // refresh endpoint is authenticated with the refresh token
    assert_eq!(sent[1].bearer.as_deref(), Some("refresh-1"));
    assert_eq!(sent[2].bearer.as_deref(), Some("fresh-access"));
    assert_eq!(sent[0].request, sent[2].request);

    assert_eq!(
        client.session().access_token().as_deref(),
        Some("fresh-access")
    );
    assert_eq!(
        client.session().refresh_token().as_deref(),
        Some("refresh-1")
    );
    assert_eq!(*events.borrow(), vec![SessionEvent::TokenRefreshed]);
}

#[test]
fn test_failed_refresh_clears_session() {
    let transport = ScriptedTransport::new();
    transport
        .reply(401, json!({"message": "Token has expired"}))
        .reply(401, json!({"msg": "Token has been revoked"}));
    let (mut client, events) = logged_in_client(&transport, Some("refresh-1"));

    match client.saved_jobs() {
        Err(Error::Unauthorized(msg)) => assert_eq!(msg, "Token has expired"),
        other => panic!("expected the original 401, got {:?}", other),
    }
    assert_eq!(transport.paths(), vec![SAVED_PATH, REFRESH_PATH]);
    assert!(!client.session().is_authenticated());
    assert_eq!(client.session().refresh_token(), None);
    assert_eq!(client.session().display_name(), None);
    assert_eq!(logouts(&events), vec![LogoutReason::RefreshFailed]);
}

#[test]
fn test_refresh_without_token_clears_session() {
    let transport = ScriptedTransport::new();
    transport.reply(401, json!({"error": "Unauthorized"}));
    let (mut client, events) = logged_in_client(&transport, None);

    let err = client.job_recommendations(10, 40).unwrap_err();
    assert!(err.is_unauthorized());
    // no refresh request was attempted
    assert_eq!(transport.sent().len(), 1);
    assert!(!client.session().is_authenticated());
    assert_eq!(logouts(&events), vec![LogoutReason::RefreshFailed]);
}

#[test]
fn test_malformed_refresh_counts_as_failure() {
    let transport = ScriptedTransport::new();
    transport
        .reply(401, json!({}))
        .reply(200, json!({"success": true}));
    let (mut client, events) = logged_in_client(&transport, Some("refresh-1"));

    assert!(client.saved_jobs().unwrap_err().is_unauthorized());
    assert!(!client.session().is_authenticated());
    assert_eq!(logouts(&events), vec![LogoutReason::RefreshFailed]);
}

#[test]
fn test_second_401_is_not_refreshed_again() {
    let transport = ScriptedTransport::new();
    transport
        .reply(401, json!({}))
        .reply(200, json!({"access_token": "fresh-access"}))
        .reply(401, json!({"error": "still no"}));
    let (mut client, _events) = logged_in_client(&transport, Some("refresh-1"));

    match client.saved_jobs() {
        Err(Error::Unauthorized(msg)) => assert_eq!(msg, "still no"),
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(transport.paths(), vec![SAVED_PATH, REFRESH_PATH, SAVED_PATH]);
    assert_eq!(transport.pending(), 0);
}

#[test]
fn test_auth_endpoints_never_refresh() {
    let transport = ScriptedTransport::new();
    transport.reply(401, json!({"error": "Invalid email or password"}));
    let (mut client, events) = logged_in_client(&transport, Some("refresh-1"));

    match client.login("grace@example.com", "wrong-password") {
        Err(Error::Unauthorized(msg)) => assert_eq!(msg, "Invalid email or password"),
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(transport.paths(), vec![LOGIN_PATH]);
    // a failed login doesn't disturb an existing session
    assert!(client.session().is_authenticated());
    assert!(events.borrow().is_empty());
}

#[test]
fn test_non_401_errors_pass_through() {
    let transport = ScriptedTransport::new();
    transport
        .reply(403, json!({"error": "Admin access required"}))
        .reply(500, json!({"error": "database unavailable"}))
        .fail("connection refused");
    let (mut client, events) = logged_in_client(&transport, Some("refresh-1"));

    assert!(matches!(client.admin_stats(), Err(Error::Forbidden(_))));
    assert!(matches!(
        client.admin_users(),
        Err(Error::Server { status: 500, .. })
    ));
    assert!(matches!(client.saved_jobs(), Err(Error::Io(_))));
    assert_eq!(transport.sent().len(), 3);
    assert!(client.session().is_authenticated());
    assert!(events.borrow().is_empty());
}
