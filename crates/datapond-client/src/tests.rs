// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Scenario tests for datapond-client.
//
// Each scenario drives a full client through a scripted transport and a
// flat test codec: requests go out, replies and transport events come back
// through poll().

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::client::DatapondClient;
use crate::config::ClientConfig;
use crate::dispatch::DispatchOutcome;
use crate::envelope::{EnvelopeCodec, Method, ReplyHeader, Request};
use crate::error::{DatapondError, Result};
use crate::handlers::{FailureReason, Handlers};
use crate::transport::{Transport, TransportEvent};
use crate::types::{ResponseCode, Token, TransactionKind};

// -----------------------------------------------------------------------
// Test fixtures
// -----------------------------------------------------------------------

/// Layout: token | code-or-method | mid hi | mid lo | "path?query" | 0 | payload
struct FlatCodec;

impl EnvelopeCodec for FlatCodec {
    fn encode(&self, request: &Request) -> Result<Vec<u8>> {
        let method = match request.method {
            Method::Get => 1,
            Method::Post => 2,
            Method::Put => 3,
            Method::Delete => 4,
        };
        let mut out = vec![request.token.as_u8(), method];
        out.extend_from_slice(&request.message_id.to_be_bytes());
        out.extend_from_slice(request.path.join("/").as_bytes());
        if !request.query.is_empty() {
            out.push(b'?');
            out.extend_from_slice(request.query.join("&").as_bytes());
        }
        out.push(0);
        out.extend_from_slice(&request.payload);
        Ok(out)
    }

    fn decode_header(&self, packet: &[u8]) -> Result<ReplyHeader> {
        if packet.len() < 2 {
            return Err(DatapondError::Codec(format!("{} byte packet", packet.len())));
        }
        let token = Token::new(packet[0]);
        Ok(ReplyHeader {
            token: (!token.is_unset()).then_some(token),
            code: ResponseCode::from_u8(packet[1]),
        })
    }

    fn payload_of<'a>(&self, packet: &'a [u8]) -> Option<&'a [u8]> {
        (packet.len() > 2).then(|| &packet[2..])
    }
}

fn reply(token: Token, code: ResponseCode, payload: &str) -> Vec<u8> {
    let mut out = vec![token.as_u8(), code.as_u8()];
    out.extend_from_slice(payload.as_bytes());
    out
}

/// URI of an encoded request ("path?query").
fn uri_of(packet: &[u8]) -> String {
    let body = &packet[4..];
    let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    String::from_utf8_lossy(&body[..end]).into_owned()
}

fn body_of(packet: &[u8]) -> &[u8] {
    let body = &packet[4..];
    let end = body.iter().position(|&b| b == 0).unwrap();
    &body[end + 1..]
}

#[derive(Default)]
struct ScriptedTransport {
    sent: Vec<Vec<u8>>,
    inbox: VecDeque<Vec<u8>>,
    events: Vec<TransportEvent>,
    refuse_sends: bool,
    cleared: usize,
}

impl Transport for ScriptedTransport {
    fn enqueue_outbound(&mut self, packet: Vec<u8>) -> Result<usize> {
        if self.refuse_sends {
            return Err(DatapondError::TransportFailure("TX queue full".into()));
        }
        self.sent.push(packet);
        Ok(self.sent.len() - 1)
    }

    fn poll_incoming(&mut self) -> Result<bool> {
        Ok(!self.inbox.is_empty())
    }

    fn receive(&mut self) -> Option<Vec<u8>> {
        self.inbox.pop_front()
    }

    fn advance(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.events)
    }

    fn clear_queues(&mut self) {
        self.inbox.clear();
        self.events.clear();
        self.cleared += 1;
    }
}

type Client = DatapondClient<ScriptedTransport, FlatCodec>;

fn client_with(handlers: Handlers) -> Client {
    let config = ClientConfig::default().with_credentials("dev@example.org", "s3cret");
    DatapondClient::new(config, ScriptedTransport::default(), FlatCodec, handlers).unwrap()
}

/// Token carried by the n-th request sent.
fn sent_token(client: &Client, n: usize) -> Token {
    Token::new(client.transport().sent[n][0])
}

#[derive(Default)]
struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    fn handlers(&self) -> Handlers {
        let (a, b, c, d, e, f) = (
            self.0.clone(),
            self.0.clone(),
            self.0.clone(),
            self.0.clone(),
            self.0.clone(),
            self.0.clone(),
        );
        Handlers::new()
            .on_login(move |_, ok| a.borrow_mut().push(format!("login {ok}")))
            .on_create_data_point(move |_, t, ok| b.borrow_mut().push(format!("create {t} {ok}")))
            .on_read_data_point(move |_, t, ok, p| c.borrow_mut().push(format!("read {t} {ok} {p}")))
            .on_create_stream(move |_, t, ok| d.borrow_mut().push(format!("create-stream {t} {ok}")))
            .on_read_stream(move |_, t, ok, p| e.borrow_mut().push(format!("stream {t} {ok} {p}")))
            .on_failure(move |_, t, k, why| f.borrow_mut().push(format!("failed {t} {k} {why}")))
    }

    fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

// -----------------------------------------------------------------------
// 1. Builders: request shape and side effects
// -----------------------------------------------------------------------
#[test]
fn test_login_request() {
    let mut client = client_with(Handlers::new());
    assert_eq!(client.login().unwrap(), 0);

    let packet = client.last_packet().to_vec();
    assert_eq!(packet, client.transport().sent[0]);
    assert_eq!(packet[0], 0x01);
    assert_eq!(packet[1], 2);
    assert_eq!(uri_of(&packet), "user/login");

    let body: serde_json::Value = serde_json::from_slice(body_of(&packet)).unwrap();
    assert_eq!(body["email"], "dev@example.org");
    assert_eq!(body["password"], "s3cret");

    let slot = client.pending().slot(0).unwrap();
    assert!(slot.in_use);
    assert_eq!(slot.kind, TransactionKind::Login);
}

#[test]
fn test_builders_without_session_omit_cookie() {
    let mut client = client_with(Handlers::new());
    client.create_data_point(12, 21.5).unwrap();
    client.last_data_point(12).unwrap();
    client.stats_today(12).unwrap();
    client.stats_range(12, "1700000000", "1700086400").unwrap();
    client.stream(12).unwrap();

    let uris: Vec<String> = client.transport().sent.iter().map(|p| uri_of(p)).collect();
    assert_eq!(
        uris,
        vec![
            "droplet?stream=12&value=21.5",
            "droplet/last?stream=12",
            "stream/stats/today/12",
            "stream/stats/range/12?from=1700000000&to=1700086400",
            "stream/12",
        ]
    );

    let kinds: Vec<TransactionKind> = client.pending().in_flight().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::CreateDataPoint,
            TransactionKind::ReadDataPoint,
            TransactionKind::ReadStream,
            TransactionKind::ReadStream,
            TransactionKind::ReadStream,
        ]
    );
}

#[test]
fn test_session_cookie_attached_after_login() {
    let mut client = client_with(Handlers::new());
    client.login().unwrap();
    let token = sent_token(&client, 0);
    client.transport_mut().inbox.push_back(reply(
        token,
        ResponseCode::CREATED,
        r#"{"id":3,"session":"Zm9vYmFy=","ttl":60}"#,
    ));
    client.poll();

    client.create_data_point(7, "on").unwrap();
    client.stats_today(7).unwrap();
    let sent = &client.transport().sent;
    assert_eq!(uri_of(&sent[1]), "droplet?stream=7&value=on&session=Zm9vYmFy=");
    assert_eq!(uri_of(&sent[2]), "stream/stats/today/7?session=Zm9vYmFy=");
}

#[test]
fn test_message_id_increments_and_wraps() {
    let config = ClientConfig {
        initial_message_id: u16::MAX,
        ..Default::default()
    };
    let mut client =
        DatapondClient::new(config, ScriptedTransport::default(), FlatCodec, Handlers::new())
            .unwrap();
    client.stream(1).unwrap();
    client.stream(1).unwrap();

    let mid = |p: &Vec<u8>| u16::from_be_bytes([p[2], p[3]]);
    assert_eq!(mid(&client.transport().sent[0]), u16::MAX);
    assert_eq!(mid(&client.transport().sent[1]), 0);
    assert_eq!(client.message_id(), 1);
}

#[test]
fn test_invalid_config_rejected() {
    let config = ClientConfig {
        max_pending: 0,
        ..Default::default()
    };
    let err = DatapondClient::new(config, ScriptedTransport::default(), FlatCodec, Handlers::new())
        .unwrap_err();
    assert!(matches!(err, DatapondError::Config(_)));
}

// -----------------------------------------------------------------------
// 2. Token allocation
// -----------------------------------------------------------------------
#[test]
fn test_unanswered_transactions_get_distinct_tokens() {
    let mut client = client_with(Handlers::new());
    for stream in 0..10 {
        client.last_data_point(stream).unwrap();
    }
    let mut tokens: Vec<u8> = client.transport().sent.iter().map(|p| p[0]).collect();
    tokens.sort_unstable();
    tokens.dedup();
    assert_eq!(tokens.len(), 10);
}

#[test]
fn test_tokens_wrap_past_ff() {
    let mut client = client_with(Handlers::new());
    for _ in 0..256 {
        client.stream(1).unwrap();
        let token = Token::new(client.last_packet()[0]);
        client
            .transport_mut()
            .inbox
            .push_back(reply(token, ResponseCode::CONTENT, "{}"));
        client.poll();
    }
    let tokens: Vec<u8> = client.transport().sent.iter().map(|p| p[0]).collect();
    assert_eq!(tokens[0], 0x01);
    assert_eq!(tokens[254], 0xFF);
    assert_eq!(tokens[255], 0x01);
    assert!(!tokens.contains(&0x00));
}

#[test]
fn test_leased_token_skipped_after_wrap() {
    let mut client = client_with(Handlers::new());
    // Token 0x01 stays in flight
    client.stream(1).unwrap();
    for _ in 0..254 {
        client.stream(2).unwrap();
        let token = Token::new(client.last_packet()[0]);
        client
            .transport_mut()
            .inbox
            .push_back(reply(token, ResponseCode::CONTENT, ""));
        client.poll();
    }
    assert_eq!(client.last_packet()[0], 0xFF);

    client.stream(3).unwrap();
    assert_eq!(client.last_packet()[0], 0x02);
    assert_eq!(client.pending().len(), 2);
}

// -----------------------------------------------------------------------
// 3. Dispatch
// -----------------------------------------------------------------------
#[test]
fn test_reply_delivered_once_and_slot_freed() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.last_data_point(4).unwrap();
    let token = sent_token(&client, 0);

    let packet = reply(token, ResponseCode::CONTENT, "23.4\0trailing");
    client.transport_mut().inbox.push_back(packet.clone());
    client.transport_mut().inbox.push_back(packet);
    let outcomes = client.poll();

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], DispatchOutcome::Delivered { ok: true, .. }));
    assert_eq!(outcomes[1], DispatchOutcome::Unroutable { token: Some(token) });
    assert_eq!(log.entries(), vec![format!("read {token} true 23.4")]);
    assert_eq!(client.payload(), "23.4");
    assert!(client.pending().is_empty());
}

#[test]
fn test_out_of_order_replies() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.create_data_point(1, 10).unwrap();
    client.stats_today(1).unwrap();
    let (create, stats) = (sent_token(&client, 0), sent_token(&client, 1));

    client
        .transport_mut()
        .inbox
        .push_back(reply(stats, ResponseCode::CONTENT, r#"{"avg":10}"#));
    client
        .transport_mut()
        .inbox
        .push_back(reply(create, ResponseCode::CREATED, ""));
    client.poll();

    assert_eq!(
        log.entries(),
        vec![
            format!(r#"stream {stats} true {{"avg":10}}"#),
            format!("create {create} true"),
        ]
    );
}

#[test]
fn test_unknown_token_ignored() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.stream(9).unwrap();

    client
        .transport_mut()
        .inbox
        .push_back(reply(Token::new(0x77), ResponseCode::CONTENT, "late"));
    let outcomes = client.poll();

    assert_eq!(
        outcomes,
        vec![DispatchOutcome::Unroutable {
            token: Some(Token::new(0x77))
        }]
    );
    assert!(log.entries().is_empty());
    assert_eq!(client.pending().len(), 1);
    assert_eq!(client.stats().unroutable, 1);
}

#[test]
fn test_error_code_reported_as_failure() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.create_data_point(5, -3).unwrap();
    let token = sent_token(&client, 0);
    client
        .transport_mut()
        .inbox
        .push_back(reply(token, ResponseCode::new(4, 3), "forbidden"));
    client.poll();

    assert_eq!(log.entries(), vec![format!("create {token} false")]);
    assert_eq!(client.pending().slot(0).unwrap().status, ResponseCode::new(4, 3));
}

#[test]
fn test_piggybacked_reply_via_send_succeeded() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.stream(2).unwrap();
    let token = sent_token(&client, 0);
    client
        .transport_mut()
        .events
        .push(TransportEvent::SendSucceeded(reply(token, ResponseCode::CONTENT, "s")));
    client.poll();
    assert_eq!(log.entries(), vec![format!("stream {token} true s")]);
}

#[test]
fn test_undecodable_packet_skipped() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.stream(2).unwrap();
    let token = sent_token(&client, 0);
    client.transport_mut().inbox.push_back(vec![0x01]);
    client
        .transport_mut()
        .inbox
        .push_back(reply(token, ResponseCode::CONTENT, "ok"));

    let outcomes = client.poll();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(log.entries().len(), 1);
}

// -----------------------------------------------------------------------
// 4. Login and session credential
// -----------------------------------------------------------------------
#[test]
fn test_login_success_sets_credential() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.login().unwrap();
    let token = sent_token(&client, 0);
    client.transport_mut().inbox.push_back(reply(
        token,
        ResponseCode::CREATED,
        r#"{"...n":"abc123=...","other":1}"#,
    ));
    client.poll();

    assert_eq!(log.entries(), vec!["login true".to_string()]);
    assert_eq!(client.credential().unwrap().as_str(), "session=abc123=");
}

#[test]
fn test_failed_login_keeps_previous_credential() {
    let log = Log::default();
    let mut client = client_with(log.handlers());

    client.login().unwrap();
    let first = sent_token(&client, 0);
    client
        .transport_mut()
        .inbox
        .push_back(reply(first, ResponseCode::CREATED, r#"{"session":"one="}"#));
    client.poll();

    client.login().unwrap();
    let second = sent_token(&client, 1);
    client
        .transport_mut()
        .inbox
        .push_back(reply(second, ResponseCode::new(4, 1), r#"{"session":"two="}"#));
    client.poll();

    client.login().unwrap();
    let third = sent_token(&client, 2);
    client
        .transport_mut()
        .inbox
        .push_back(reply(third, ResponseCode::CREATED, r#"{"session":"unterminated"}"#));
    client.poll();

    assert_eq!(
        log.entries(),
        vec!["login true", "login false", "login false"]
    );
    assert_eq!(client.credential().unwrap().as_str(), "session=one=");
}

// -----------------------------------------------------------------------
// 5. Capacity
// -----------------------------------------------------------------------
#[test]
fn test_capacity_plus_one_rejected() {
    let mut client = client_with(Handlers::new());
    for stream in 0..10 {
        client.stream(stream).unwrap();
    }
    let err = client.stream(10).unwrap_err();
    assert!(matches!(err, DatapondError::CapacityExceeded { capacity: 10 }));
    // Nothing sent, message id not consumed
    assert_eq!(client.transport().sent.len(), 10);
    assert_eq!(client.message_id(), 11);
    assert_eq!(client.stats().rejected, 1);
}

#[test]
fn test_refused_send_frees_slot() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.transport_mut().refuse_sends = true;
    let err = client.stats_today(3).unwrap_err();
    assert!(matches!(err, DatapondError::TransportFailure(_)));
    assert!(client.pending().is_empty());
    assert!(log.entries().is_empty());

    client.transport_mut().refuse_sends = false;
    assert!(client.stats_today(3).is_ok());
}

// -----------------------------------------------------------------------
// 6. Failure and timeout paths
// -----------------------------------------------------------------------
#[test]
fn test_timeout_releases_without_kind_handler() {
    let log = Log::default();
    let mut client = client_with(log.handlers());
    client.last_data_point(6).unwrap();
    let request = client.last_packet().to_vec();
    let token = Token::new(request[0]);

    client
        .transport_mut()
        .events
        .push(TransportEvent::ResponseTimedOut(request.clone()));
    let first = client.poll();
    client
        .transport_mut()
        .events
        .push(TransportEvent::ResponseTimedOut(request));
    let second = client.poll();

    assert_eq!(
        first,
        vec![DispatchOutcome::Released {
            token,
            kind: TransactionKind::ReadDataPoint,
            reason: FailureReason::TimedOut
        }]
    );
    assert_eq!(second, vec![DispatchOutcome::Unroutable { token: Some(token) }]);
    assert_eq!(
        log.entries(),
        vec![format!("failed {token} read-data-point timed out")]
    );
    assert!(client.pending().is_empty());
}

#[test]
fn test_send_failure_releases_slot() {
    let reads = Rc::new(RefCell::new(0));
    let r = reads.clone();
    let mut client = client_with(Handlers::new().on_read_stream(move |_, _, _, _| *r.borrow_mut() += 1));
    client.stream(1).unwrap();
    let request = client.last_packet().to_vec();

    let outcome = client
        .handle_event(TransportEvent::SendFailed(request))
        .unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Released {
            reason: FailureReason::SendFailed,
            ..
        }
    ));
    assert_eq!(*reads.borrow(), 0);
    assert_eq!(client.stats().send_failures, 1);
    assert!(client.pending().is_empty());
}

#[test]
fn test_clear_queues() {
    let mut client = client_with(Handlers::new());
    client.stream(1).unwrap();
    client.transport_mut().inbox.push_back(vec![0x01, 0x45]);
    client.clear_queues();
    assert!(client.poll().is_empty());
    assert_eq!(client.transport().cleared, 1);
    assert_eq!(client.pending().len(), 1);
}

// -----------------------------------------------------------------------
// 7. Reentrancy: handlers start follow-up transactions during dispatch
// -----------------------------------------------------------------------
#[test]
fn test_handler_issues_follow_up_into_freed_slot() {
    let config = ClientConfig {
        max_pending: 1,
        ..Default::default()
    };
    // (in flight when the handler ran, follow-up accepted)
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let mut client = DatapondClient::new(
        config,
        ScriptedTransport::default(),
        FlatCodec,
        Handlers::new().on_read_stream(move |client, _, ok, _| {
            let in_flight = client.pending().len();
            let follow_up = client.stream(2);
            s.borrow_mut().push((ok, in_flight, follow_up.is_ok()));
        }),
    )
    .unwrap();

    client.stream(1).unwrap();
    assert!(client.stream(2).is_err());

    let token = sent_token(&client, 0);
    client
        .transport_mut()
        .inbox
        .push_back(reply(token, ResponseCode::CONTENT, "x"));
    let outcomes = client.poll();

    assert_eq!(
        outcomes,
        vec![DispatchOutcome::Delivered {
            token,
            kind: TransactionKind::ReadStream,
            ok: true
        }]
    );
    // The single slot was free inside the handler and is now held by the follow-up
    assert_eq!(*seen.borrow(), vec![(true, 0, true)]);
    assert_eq!(client.transport().sent.len(), 2);
    assert_eq!(uri_of(&client.transport().sent[1]), "stream/2");

    let follow_up = sent_token(&client, 1);
    assert_ne!(follow_up, token);
    assert!(client.pending().is_leased(follow_up));
    assert_eq!(client.pending().len(), 1);
}

#[test]
fn test_follow_up_reply_reaches_handler() {
    let replies = Rc::new(RefCell::new(Vec::new()));
    let r = replies.clone();
    let mut client = client_with(Handlers::new().on_read_data_point(move |client, _, _, value| {
        r.borrow_mut().push(value.to_string());
        if value == "first" {
            client.last_data_point(8).unwrap();
        }
    }));

    client.last_data_point(8).unwrap();
    let first = sent_token(&client, 0);
    client
        .transport_mut()
        .inbox
        .push_back(reply(first, ResponseCode::CONTENT, "first"));
    client.poll();

    let second = sent_token(&client, 1);
    client
        .transport_mut()
        .inbox
        .push_back(reply(second, ResponseCode::CONTENT, "second"));
    client.poll();

    assert_eq!(*replies.borrow(), vec!["first", "second"]);
    assert!(client.pending().is_empty());
}

#[test]
fn test_login_handler_sends_authenticated_request() {
    let mut client = client_with(Handlers::new().on_login(|client, ok| {
        if ok {
            assert!(client.credential().is_some());
            client.create_data_point(5, &"up").unwrap();
        }
    }));

    client.login().unwrap();
    let token = sent_token(&client, 0);
    client
        .transport_mut()
        .inbox
        .push_back(reply(token, ResponseCode::CREATED, r#"{"session":"a1b2="}"#));
    client.poll();

    assert_eq!(client.transport().sent.len(), 2);
    assert_eq!(
        uri_of(&client.transport().sent[1]),
        "droplet?stream=5&value=up&session=a1b2="
    );
    assert_eq!(client.pending().len(), 1);
}

#[test]
fn test_failure_hook_retries_timed_out_request() {
    let mut client = client_with(Handlers::new().on_failure(|client, _, kind, reason| {
        if kind == TransactionKind::ReadStream && reason == FailureReason::TimedOut {
            client.stats_today(4).unwrap();
        }
    }));

    client.stats_today(4).unwrap();
    let request = client.last_packet().to_vec();
    client
        .transport_mut()
        .events
        .push(TransportEvent::ResponseTimedOut(request));
    client.poll();

    let sent = &client.transport().sent;
    assert_eq!(sent.len(), 2);
    assert_eq!(uri_of(&sent[0]), uri_of(&sent[1]));
    assert_ne!(sent[0][0], sent[1][0]);
    assert_eq!(client.pending().len(), 1);
    assert_eq!(client.stats().timeouts, 1);
}

// -----------------------------------------------------------------------
// 8. Configuration exposed to the transport
// -----------------------------------------------------------------------
#[test]
fn test_config_exposes_socket_settings() {
    let config = ClientConfig {
        server_addr: "10.1.2.3".into(),
        server_port: 5684,
        local_port: 40000,
        ..Default::default()
    };
    let client =
        DatapondClient::new(config, ScriptedTransport::default(), FlatCodec, Handlers::new())
            .unwrap();
    assert_eq!(client.config().server_addr, "10.1.2.3");
    assert_eq!(client.config().server_port, 5684);
    assert_eq!(client.config().local_port, 40000);
}
