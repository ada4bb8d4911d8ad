//! End-to-end issuance and verification tests.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, TimeZone, Utc};
use gatekey_token::{
    Identity, KeyProvider, KeyRing, MockClock, RsaKeyProvider, SigningKeyPair, TokenEngine,
    TokenError, TokenPolicy,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use std::sync::{Arc, OnceLock};

const ISSUER: &str = "http://academy.devdojo";

fn server_key() -> &'static SigningKeyPair {
    static KEY: OnceLock<SigningKeyPair> = OnceLock::new();
    KEY.get_or_init(|| RsaKeyProvider::default().generate_key_pair().unwrap())
}

fn other_key() -> &'static SigningKeyPair {
    static KEY: OnceLock<SigningKeyPair> = OnceLock::new();
    KEY.get_or_init(|| RsaKeyProvider::default().generate_key_pair().unwrap())
}

fn start_clock() -> Arc<MockClock> {
    Arc::new(MockClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
}

fn engine_with(ring: KeyRing, clock: Arc<MockClock>) -> TokenEngine {
    let policy = TokenPolicy::new(ISSUER, Duration::seconds(3600)).unwrap();
    TokenEngine::new(ring, policy).with_clock(clock)
}

fn engine(clock: Arc<MockClock>) -> TokenEngine {
    engine_with(KeyRing::new(server_key().clone()), clock)
}

fn alice() -> Identity {
    Identity::new("alice", vec!["ROLE_USER".to_string()])
}

fn segments(token: &str) -> (String, String, String) {
    let mut parts = token.split('.').map(str::to_string);
    (
        parts.next().unwrap(),
        parts.next().unwrap(),
        parts.next().unwrap(),
    )
}

fn encode_json(value: &serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
}

#[test]
fn test_verify_returns_issued_claims() {
    let engine = engine(start_clock());
    let identity = Identity::new(
        "bob",
        vec!["ROLE_USER".into(), "ROLE_USER".into(), "ROLE_AUDITOR".into()],
    );

    let token = engine.issue(&identity).unwrap();
    let claims = engine.verify(token.as_str()).unwrap();

    assert_eq!(&claims, token.claims());
    // Order and duplicates are preserved.
    assert_eq!(
        claims.authorities,
        vec!["ROLE_USER", "ROLE_USER", "ROLE_AUDITOR"]
    );
}

#[test]
fn test_empty_authorities_are_allowed() {
    let engine = engine(start_clock());
    let token = engine.issue(&Identity::new("carol", vec![])).unwrap();
    let claims = engine.verify(token.as_str()).unwrap();
    assert!(claims.authorities.is_empty());
}

#[test]
fn test_alice_scenario() {
    let engine = engine(start_clock());
    let token = engine.issue(&alice()).unwrap();

    let (_, payload, _) = segments(token.as_str());
    let json: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();

    assert_eq!(json["sub"], "alice");
    assert_eq!(json["authorities"], serde_json::json!(["ROLE_USER"]));
    assert_eq!(json["iss"], ISSUER);
    assert_eq!(
        json["exp"].as_i64().unwrap() - json["iat"].as_i64().unwrap(),
        3600
    );
}

#[test]
fn test_token_expires_with_simulated_time() {
    let clock = start_clock();
    let engine = engine(clock.clone());
    let token = engine.issue(&alice()).unwrap();

    clock.advance(Duration::seconds(3599));
    assert!(engine.verify(token.as_str()).is_ok());

    clock.advance(Duration::seconds(1));
    let err = engine.verify(token.as_str()).unwrap_err();
    assert!(matches!(err, TokenError::Expired { expired_at } if expired_at == token.claims().expires_at));

    clock.advance(Duration::days(30));
    assert!(matches!(
        engine.verify(token.as_str()),
        Err(TokenError::Expired { .. })
    ));
}

#[test]
fn test_leeway_extends_acceptance() {
    let clock = start_clock();
    let policy = TokenPolicy::new(ISSUER, Duration::seconds(60))
        .unwrap()
        .with_leeway(Duration::seconds(30));
    let engine =
        TokenEngine::new(KeyRing::new(server_key().clone()), policy).with_clock(clock.clone());
    let token = engine.issue(&alice()).unwrap();

    clock.advance(Duration::seconds(89));
    assert!(engine.verify(token.as_str()).is_ok());

    clock.advance(Duration::seconds(1));
    assert!(matches!(
        engine.verify(token.as_str()),
        Err(TokenError::Expired { .. })
    ));
}

#[test]
fn test_any_claims_byte_mutation_breaks_signature() {
    let engine = engine(start_clock());
    let token = engine.issue(&alice()).unwrap();
    let (header, payload, signature) = segments(token.as_str());

    for index in 0..payload.len() {
        let mut bytes = payload.clone().into_bytes();
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        let mutated = String::from_utf8(bytes).unwrap();

        let forged = format!("{header}.{mutated}.{signature}");
        let err = engine.verify(&forged).unwrap_err();
        assert!(
            matches!(err, TokenError::SignatureMismatch),
            "byte {index}: unexpected {err:?}"
        );
    }
}

#[test]
fn test_escalated_authorities_are_rejected() {
    let engine = engine(start_clock());
    let token = engine.issue(&alice()).unwrap();
    let (header, payload, signature) = segments(token.as_str());

    let mut claims: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
    claims["authorities"] = serde_json::json!(["ROLE_ADMIN"]);

    let forged = format!("{header}.{}.{signature}", encode_json(&claims));
    assert!(matches!(
        engine.verify(&forged),
        Err(TokenError::SignatureMismatch)
    ));
}

#[test]
fn test_empty_username_produces_no_token() {
    let engine = engine(start_clock());
    let err = engine.issue(&Identity::new("", vec!["ROLE_USER".into()])).unwrap_err();
    assert!(matches!(err, TokenError::ClaimBuild(_)));
}

#[test]
fn test_issues_at_different_times_differ() {
    let clock = start_clock();
    let engine = engine(clock.clone());

    let first = engine.issue(&alice()).unwrap();
    clock.advance(Duration::seconds(10));
    let second = engine.issue(&alice()).unwrap();

    assert_ne!(first.as_str(), second.as_str());
    assert_eq!(second.claims().issued_at - first.claims().issued_at, 10);
    assert_eq!(second.claims().expires_at - first.claims().expires_at, 10);

    assert!(engine.verify(first.as_str()).is_ok());
    assert!(engine.verify(second.as_str()).is_ok());
}

#[test]
fn test_token_from_foreign_key_is_unknown() {
    let clock = start_clock();
    let foreign = engine_with(KeyRing::new(other_key().clone()), clock.clone());
    let engine = engine(clock);

    let token = foreign.issue(&alice()).unwrap();
    let err = engine.verify(token.as_str()).unwrap_err();
    assert!(matches!(err, TokenError::UnknownKey { kid: Some(kid) } if kid == other_key().kid()));
}

#[test]
fn test_missing_kid_is_unknown_key() {
    let engine = engine(start_clock());
    let header = Header::new(Algorithm::RS256);
    let token = encode(&header, &alice_claims(), server_key().encoding_key()).unwrap();

    assert!(matches!(
        engine.verify(&token),
        Err(TokenError::UnknownKey { kid: None })
    ));
}

#[test]
fn test_symmetric_algorithm_is_rejected() {
    let engine = engine(start_clock());

    // HMAC keyed with the public key PEM: the classic algorithm-confusion forgery.
    let secret = server_key().public_key_pem().unwrap();
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(server_key().kid().to_string());
    let token = encode(
        &header,
        &alice_claims(),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    assert!(matches!(
        engine.verify(&token),
        Err(TokenError::MalformedToken(_))
    ));
}

#[test]
fn test_alg_none_is_rejected() {
    let engine = engine(start_clock());
    let header = encode_json(&serde_json::json!({"alg": "none", "typ": "JWT"}));
    let payload = encode_json(&serde_json::to_value(alice_claims()).unwrap());
    let token = format!("{header}.{payload}.c2ln");

    assert!(matches!(
        engine.verify(&token),
        Err(TokenError::MalformedToken(_))
    ));
}

#[test]
fn test_embedded_attacker_key_is_never_trusted() {
    let engine = engine(start_clock());
    let attacker = other_key();
    let attacker_jwk = serde_json::to_value(attacker.verification_key().jwk()).unwrap();

    // Attacker's own kid: not in the ring.
    let header: Header = serde_json::from_value(serde_json::json!({
        "alg": "RS256",
        "typ": "JWT",
        "kid": attacker.kid(),
        "jwk": attacker_jwk,
    }))
    .unwrap();
    let token = encode(&header, &alice_claims(), attacker.encoding_key()).unwrap();
    assert!(matches!(
        engine.verify(&token),
        Err(TokenError::UnknownKey { .. })
    ));

    // Server's kid with the attacker's embedded key: checked against the ring key.
    let header: Header = serde_json::from_value(serde_json::json!({
        "alg": "RS256",
        "typ": "JWT",
        "kid": server_key().kid(),
        "jwk": attacker_jwk,
    }))
    .unwrap();
    let token = encode(&header, &alice_claims(), attacker.encoding_key()).unwrap();
    assert!(matches!(
        engine.verify(&token),
        Err(TokenError::SignatureMismatch)
    ));
}

#[test]
fn test_foreign_issuer_is_rejected() {
    let clock = start_clock();
    let engine = engine(clock.clone());
    let policy = TokenPolicy::new("https://elsewhere.example", Duration::seconds(3600)).unwrap();
    let impostor =
        TokenEngine::new(KeyRing::new(server_key().clone()), policy).with_clock(clock);

    let token = impostor.issue(&alice()).unwrap();
    let err = engine.verify(token.as_str()).unwrap_err();
    assert!(matches!(err, TokenError::IssuerMismatch { found } if found == "https://elsewhere.example"));
}

#[test]
fn test_retired_key_verifies_after_rotation() {
    let clock = start_clock();
    let before = KeyRing::new(server_key().clone());
    let old_engine = engine_with(before.clone(), clock.clone());
    let old_token = old_engine.issue(&alice()).unwrap();

    let rotated = before.rotate(other_key().clone());
    assert_eq!(rotated.active().kid(), other_key().kid());
    assert_eq!(rotated.jwks().keys.len(), 2);
    assert_eq!(rotated.jwks().keys[0].kid, other_key().kid());

    let new_engine = engine_with(rotated, clock.clone());
    assert_eq!(
        new_engine.verify(old_token.as_str()).unwrap().subject,
        "alice"
    );

    let new_token = new_engine.issue(&alice()).unwrap();
    assert!(new_engine.verify(new_token.as_str()).is_ok());

    // A ring that never knew the old key refuses it.
    let fresh = engine_with(KeyRing::new(other_key().clone()), clock);
    assert!(matches!(
        fresh.verify(old_token.as_str()),
        Err(TokenError::UnknownKey { .. })
    ));
}

#[test]
fn test_verify_with_custom_resolver() {
    let engine = engine(start_clock());
    let token = engine.issue(&alice()).unwrap();

    let other_ring = KeyRing::new(other_key().clone());
    assert!(matches!(
        engine.verify_with(token.as_str(), &other_ring),
        Err(TokenError::UnknownKey { .. })
    ));

    let server_ring = KeyRing::new(server_key().clone());
    assert!(engine.verify_with(token.as_str(), &server_ring).is_ok());
}

#[test]
fn test_engine_is_shareable_across_threads() {
    let engine = Arc::new(engine(start_clock()));

    std::thread::scope(|scope| {
        for i in 0..4 {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                let identity = Identity::new(format!("user-{i}"), vec!["ROLE_USER".into()]);
                let token = engine.issue(&identity).unwrap();
                let claims = engine.verify(token.as_str()).unwrap();
                assert_eq!(claims.subject, format!("user-{i}"));
            });
        }
    });
}

fn alice_claims() -> gatekey_token::Claims {
    gatekey_token::Claims::build(
        &alice(),
        ISSUER,
        Duration::seconds(3600),
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    )
    .unwrap()
}
