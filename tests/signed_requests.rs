//! Signed request verification, persistence and caller authentication.

mod common;

use serde_json::json;

use common::request;
use madrona::RpcFrontend;
use madrona::context::Actor;
use madrona::context::CERTS;
use madrona::context::RpcContext;
use madrona::jsonrpc;
use madrona::jsonrpc::ErrorCode;
use madrona::jsonrpc::Pack;
use madrona::signed_req::CLIENT_SIGNATURES;
use madrona::store::CommitOutcome;
use madrona::store::MemoryStore;
use madrona::store::Store;
use madrona::testing::cert_for;
use madrona::testing::sign_envelope;
use madrona::testing::signing_key;

fn authed_frontend(store: &std::sync::Arc<MemoryStore>) -> std::sync::Arc<RpcFrontend> {
    RpcFrontend::builder(store.clone())
        .certs(CERTS)
        .client_signatures(CLIENT_SIGNATURES)
        .build()
}

#[test]
fn accepted_signature_is_persisted_as_latest_signed_request() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    let cert = cert_for(&key);
    store.seed(&CERTS, &cert, &7).unwrap();
    let frontend = authed_frontend(&store);

    let inner = request(3, "MK_SIGN");
    let envelope = sign_envelope(&key, &inner);

    let mut tx = store.begin();
    let raw = jsonrpc::pack(&envelope, Pack::Text);
    let accepted = frontend
        .verify_client_signature(tx.as_mut(), &cert, 7, &envelope, &raw, false)
        .expect("valid signature must be accepted");
    assert_eq!(tx.commit(), CommitOutcome::Ok);

    assert_eq!(jsonrpc::from_msgpack(&accepted.req).unwrap(), inner);
    assert_eq!(accepted.raw_req, raw);

    let stored = frontend.get_signed_req(7).expect("record must be stored");
    assert_eq!(stored, accepted);
}

#[test]
fn rejected_signature_leaves_no_record() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    let cert = cert_for(&key);
    store.seed(&CERTS, &cert, &7).unwrap();
    let frontend = authed_frontend(&store);

    let mut envelope = sign_envelope(&key, &request(3, "MK_SIGN"));
    envelope["sig"] = json!(vec![0u8; 64]);

    let mut tx = store.begin();
    let raw = jsonrpc::pack(&envelope, Pack::Text);
    let accepted =
        frontend.verify_client_signature(tx.as_mut(), &cert, 7, &envelope, &raw, false);
    assert!(accepted.is_none());
    tx.commit();
    assert!(frontend.get_signed_req(7).is_none());
}

#[test]
fn verification_requires_a_client_signatures_map() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    let cert = cert_for(&key);
    store.seed(&CERTS, &cert, &7).unwrap();
    let frontend = RpcFrontend::builder(store.clone()).certs(CERTS).build();

    let envelope = sign_envelope(&key, &request(1, "m"));
    let mut tx = store.begin();
    let accepted =
        frontend.verify_client_signature(tx.as_mut(), &cert, 7, &envelope, b"raw", false);
    assert!(accepted.is_none());
}

#[test]
fn forwarded_requests_skip_verification_but_are_persisted() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    let cert = cert_for(&key);
    store.seed(&CERTS, &cert, &7).unwrap();
    let frontend = authed_frontend(&store);

    // A signature nobody could verify; the forwarding follower vouched.
    let envelope = json!({
        "sig": [1, 2, 3],
        "req": request(4, "m"),
    });
    let mut tx = store.begin();
    let accepted = frontend
        .verify_client_signature(tx.as_mut(), &cert, 7, &envelope, b"raw", true)
        .expect("forwarded requests are accepted unverified");
    assert_eq!(tx.commit(), CommitOutcome::Ok);
    assert_eq!(accepted.sig, vec![1, 2, 3]);
    assert_eq!(frontend.get_signed_req(7), Some(accepted));
}

#[test]
fn disabled_request_storing_clears_the_signed_content() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    let cert = cert_for(&key);
    store.seed(&CERTS, &cert, &7).unwrap();
    let frontend = authed_frontend(&store);
    frontend.disable_request_storing();

    let envelope = sign_envelope(&key, &request(5, "m"));
    let mut tx = store.begin();
    let raw = jsonrpc::pack(&envelope, Pack::Text);
    let accepted = frontend
        .verify_client_signature(tx.as_mut(), &cert, 7, &envelope, &raw, false)
        .expect("valid signature must be accepted");
    assert_eq!(tx.commit(), CommitOutcome::Ok);

    assert!(accepted.req.is_empty());
    assert!(!accepted.sig.is_empty());
    let stored = frontend.get_signed_req(7).unwrap();
    assert!(stored.req.is_empty());
}

#[test]
fn process_rejects_bad_signature_with_inner_request_id() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    let cert = cert_for(&key);
    store.seed(&CERTS, &cert, &7).unwrap();
    let frontend = authed_frontend(&store);

    let mut envelope = sign_envelope(&key, &request(11, "MK_SIGN"));
    envelope["sig"] = json!(vec![0u8; 64]);

    let mut ctx = RpcContext::new(1, cert, Actor::Users);
    let body = frontend.process(&mut ctx, &jsonrpc::pack(&envelope, Pack::Text));
    let reply = jsonrpc::unpack(&body, Pack::Text).unwrap();
    assert_eq!(
        common::error_code(&reply),
        ErrorCode::InvalidClientSignature.code()
    );
    assert_eq!(reply[jsonrpc::ID], 11);
    assert!(!ctx.is_pending);
    assert!(frontend.get_signed_req(7).is_none());
}

#[test]
fn process_accepts_good_signature_and_goes_pending() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    let cert = cert_for(&key);
    store.seed(&CERTS, &cert, &7).unwrap();
    let frontend = authed_frontend(&store);

    let envelope = sign_envelope(&key, &request(12, "MK_SIGN"));
    let mut ctx = RpcContext::new(1, cert, Actor::Users);
    let body = frontend.process(&mut ctx, &jsonrpc::pack(&envelope, Pack::Text));
    assert!(body.is_empty());
    assert!(ctx.is_pending);
}

#[test]
fn unknown_caller_certificate_is_rejected() {
    let store = MemoryStore::new();
    let key = signing_key(1);
    store.seed(&CERTS, &cert_for(&key), &7).unwrap();
    let frontend = authed_frontend(&store);

    let stranger = cert_for(&signing_key(2));
    let mut ctx = RpcContext::new(1, stranger, Actor::Users);
    let body = frontend.process(&mut ctx, &jsonrpc::pack(&request(1, "m"), Pack::Text));
    let reply = jsonrpc::unpack(&body, Pack::Text).unwrap();
    assert_eq!(common::error_code(&reply), ErrorCode::InvalidCallerId.code());
    assert_eq!(reply[jsonrpc::ID], 0);
}

#[test]
fn anonymous_caller_is_rejected_when_certs_are_configured() {
    let store = MemoryStore::new();
    let frontend = authed_frontend(&store);

    let mut ctx = RpcContext::new(1, Vec::new(), Actor::Users);
    let body = frontend.process(&mut ctx, &jsonrpc::pack(&request(1, "m"), Pack::Text));
    let reply = jsonrpc::unpack(&body, Pack::Text).unwrap();
    assert_eq!(common::error_code(&reply), ErrorCode::InvalidCallerId.code());
}

#[test]
fn without_certificate_map_every_caller_is_admitted() {
    let store = MemoryStore::new();
    let frontend = RpcFrontend::new(store.clone());

    let mut ctx = RpcContext::new(1, Vec::new(), Actor::Users);
    let body = frontend.process(&mut ctx, &jsonrpc::pack(&request(1, "m"), Pack::Text));
    assert!(body.is_empty());
    assert!(ctx.is_pending);
}
