#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests: boundary conditions of the wire format, address grammars,
//! response correlation and listener dispatch

use std::sync::Arc;
use std::time::Duration;

use openwebnet::core::frame::{self, ACK, BUSY_NACK, MAX_FRAME_LENGTH, NACK};
use openwebnet::error::OwnError;
use openwebnet::message::address::{CenTarget, LightAutomTarget, ThermoTarget, WhereThermo};
use openwebnet::message::who::WhereGrammar;
use openwebnet::message::{automation, lighting, thermo, OpenMessage, Where, Who};
use openwebnet::protocol::{GatewayEvent, GatewayListener, Notifier, Response};
use openwebnet::transport::FrameChannel;
use tokio::io::AsyncWriteExt;

// ============================================================================
// FRAME EDGE CASES
// ============================================================================

#[test]
fn test_frame_too_short() {
    for text in ["", "##", "*##", "*#*##", "*1##", "*#1##"] {
        assert!(
            matches!(OpenMessage::parse(text), Err(OwnError::MalformedFrame(_))),
            "{text:?} should be malformed"
        );
    }
}

#[test]
fn test_ack_literals_are_exact() {
    assert!(OpenMessage::parse(ACK).unwrap().is_ack());
    assert!(OpenMessage::parse(NACK).unwrap().is_nack());
    let busy = OpenMessage::parse(BUSY_NACK).unwrap();
    assert!(busy.is_busy_nack());
    assert!(busy.is_terminal());

    // Other one-digit acknowledgement codes are not literals
    assert!(!frame::is_ack_literal("*#*2##"));
}

#[test]
fn test_command_with_extra_section_rejected() {
    assert!(OpenMessage::parse("*1*1*12*3##").is_err());
}

#[test]
fn test_unknown_and_unsupported_who() {
    assert!(matches!(
        OpenMessage::parse("*77*1*12##"),
        Err(OwnError::MalformedFrame(_))
    ));
    assert!(matches!(
        OpenMessage::parse("*16*1*12##"),
        Err(OwnError::UnsupportedFrame(_))
    ));
}

#[test]
fn test_translated_what() {
    let msg = OpenMessage::parse("*1*1000#1*12##").unwrap();
    let what = msg.what().unwrap();
    assert!(what.translated);
    assert_eq!(what.value, lighting::WHAT_ON);
}

#[test]
fn test_dimension_write_values_kept_in_order() {
    let msg = OpenMessage::dimension_write(Who::Thermoregulation, "1", 14, &["0210", "3"]).unwrap();
    assert_eq!(msg.frame(), "*#4*1*#14*0210*3##");
    assert!(msg.dim().unwrap().writing);
    assert_eq!(msg.dim_values(), ["0210", "3"]);
}

// ============================================================================
// STREAM EDGE CASES
// ============================================================================

#[tokio::test]
async fn test_channel_skips_noise_between_frames() {
    let (client, mut server) = tokio::io::duplex(256);
    let mut channel = FrameChannel::new(client);

    server.write_all(b"\r\n*#*1##\r\n*1*1*12##").await.unwrap();
    assert_eq!(channel.read_frame().await.unwrap().as_deref(), Some(ACK));
    assert_eq!(channel.read_frame().await.unwrap().as_deref(), Some("*1*1*12##"));
}

#[tokio::test]
async fn test_channel_eof_inside_frame() {
    let (client, mut server) = tokio::io::duplex(256);
    let mut channel = FrameChannel::new(client);

    server.write_all(b"*1*1*12##*1*0*1").await.unwrap();
    drop(server);

    assert_eq!(channel.read_frame().await.unwrap().as_deref(), Some("*1*1*12##"));
    assert_eq!(channel.read_frame().await.unwrap(), None);
}

#[tokio::test]
async fn test_channel_rejects_runaway_frame() {
    let (client, mut server) = tokio::io::duplex(MAX_FRAME_LENGTH * 4);
    let mut channel = FrameChannel::new(client);

    server
        .write_all("*1".repeat(MAX_FRAME_LENGTH).as_bytes())
        .await
        .unwrap();
    assert!(matches!(
        channel.read_frame().await,
        Err(OwnError::MalformedFrame(_))
    ));
}

#[tokio::test]
async fn test_channel_read_timeout() {
    let (client, _server) = tokio::io::duplex(64);
    let mut channel = FrameChannel::new(client);

    let result = channel.read_frame_timeout(Duration::from_millis(20)).await;
    assert!(matches!(result, Err(OwnError::Timeout)));
}

// ============================================================================
// ADDRESS EDGE CASES
// ============================================================================

#[test]
fn test_light_address_bounds() {
    let parse = |raw| Where::parse(WhereGrammar::LightAutom, raw);

    assert!(parse("0311#4#15").is_ok());
    assert!(parse("0311#4#16").is_err());
    assert!(parse("#255").is_ok());
    assert!(parse("#256").is_err());
    assert!(parse("1015").is_ok());
    assert!(parse("1016").is_err());
    assert!(parse("1101").is_err());
    assert!(parse("123").is_err());

    match parse("00").unwrap() {
        Where::LightAutom(w) => assert_eq!(w.target, LightAutomTarget::Area(0)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_thermo_actuator_is_not_zigbee() {
    match Where::parse(WhereGrammar::Thermo, "12#9").unwrap() {
        Where::Thermo(w) => assert_eq!(
            w.target,
            ThermoTarget::Actuator {
                zone: 12,
                actuator: 9
            }
        ),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        Where::parse(WhereGrammar::Thermo, "765432101#9").unwrap(),
        Where::Zigbee(_)
    ));
}

#[test]
fn test_thermo_address_bounds() {
    assert_eq!(
        WhereThermo::parse("900").unwrap().target,
        ThermoTarget::ExternalProbe(9)
    );
    assert!(WhereThermo::parse("000").is_err());
    assert!(WhereThermo::parse("201").is_err());
    assert!(WhereThermo::parse("#100").is_err());
    assert!(WhereThermo::parse("5#0").is_err());
    assert!(WhereThermo::parse("#0").unwrap().is_central_unit());
    assert!(!WhereThermo::parse("#1").unwrap().is_central_unit());
}

#[test]
fn test_other_grammar_bounds() {
    assert!(Where::parse(WhereGrammar::Auxiliary, "10").is_err());
    assert!(Where::parse(WhereGrammar::Energy, "5255").is_ok());
    assert!(Where::parse(WhereGrammar::Energy, "5256").is_err());
    assert!(Where::parse(WhereGrammar::Energy, "712#0").is_ok());
    assert!(Where::parse(WhereGrammar::Energy, "712").is_err());
    assert!(Where::parse(WhereGrammar::Alarm, "#100").is_err());

    match Where::parse(WhereGrammar::CenPlus, "30").unwrap() {
        Where::Cen(w) => assert_eq!(w.target, CenTarget::DryContact(0)),
        other => panic!("unexpected {other:?}"),
    }
    assert!(Where::parse(WhereGrammar::CenPlus, "12").is_err());
}

#[test]
fn test_builders_reject_bad_addresses() {
    assert!(lighting::request_turn_on("1a").is_err());
    assert!(automation::request_move_up("#").is_err());
    assert!(thermo::request_status("150").is_err());
    assert!(lighting::request_dimmer_level("12", 1).is_err());
    assert!(lighting::request_dimmer_level("12", 2).is_ok());
}

// ============================================================================
// RESPONSE EDGE CASES
// ============================================================================

#[test]
fn test_response_rejects_frames_after_terminal() {
    let mut response = Response::new(lighting::request_turn_on("12").unwrap());
    response.add(OpenMessage::parse(ACK).unwrap()).unwrap();

    let late = OpenMessage::parse("*1*1*12##").unwrap();
    assert!(matches!(
        response.add(late),
        Err(OwnError::ProtocolViolation(_))
    ));
    assert_eq!(response.messages().len(), 1);
    assert!(response.is_success());
}

#[test]
fn test_busy_nack_is_complete_not_success() {
    let mut response = Response::new(lighting::request_turn_on("12").unwrap());
    assert!(!response.is_complete());
    assert!(!response.is_success());

    response.add(OpenMessage::parse(BUSY_NACK).unwrap()).unwrap();
    assert!(response.is_complete());
    assert!(response.has_busy_nack());
    assert!(!response.is_success());
}

// ============================================================================
// DISPATCH EDGE CASES
// ============================================================================

#[derive(Default)]
struct Counter {
    events: std::sync::atomic::AtomicUsize,
}

impl GatewayListener for Counter {
    fn on_event_message(&self, _msg: &OpenMessage) {
        self.events.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Counter {
    fn count(&self) -> usize {
        self.events.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_removed_listener_receives_nothing() {
    let notifier = Notifier::new(8);
    let kept = Arc::new(Counter::default());
    let removed = Arc::new(Counter::default());
    notifier.add_listener(&kept).unwrap();
    notifier.add_listener(&removed).unwrap();
    notifier.remove_listener(&removed).unwrap();
    assert_eq!(notifier.listener_count().unwrap(), 1);

    let msg = OpenMessage::parse("*1*1*12##").unwrap();
    notifier.notify(GatewayEvent::Message(msg)).await;

    for _ in 0..100 {
        if kept.count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(kept.count(), 1);
    assert_eq!(removed.count(), 0);
}

#[tokio::test]
async fn test_notify_without_listeners() {
    let notifier = Notifier::new(1);
    // The queue drains even when nobody listens
    for _ in 0..16 {
        notifier.notify(GatewayEvent::Connected).await;
    }
    assert_eq!(notifier.listener_count().unwrap(), 0);
}

#[tokio::test]
async fn test_dropped_listener_unregisters() {
    let notifier = Notifier::new(8);
    let listener = Arc::new(Counter::default());
    notifier.add_listener(&listener).unwrap();
    drop(listener);

    assert_eq!(notifier.listener_count().unwrap(), 0);
    notifier.notify(GatewayEvent::Reconnected).await;
}
