//! Integration tests for BUS and ZigBee device discovery

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use common::{eventually, fast_config, MockGateway, Recorder, StubGateway};
use openwebnet::core::frame::{ACK, NACK};
use openwebnet::discovery::DiscoveryEngine;
use openwebnet::error::OwnError;
use openwebnet::message::DeviceType;
use openwebnet::session::{BusSession, Gateway};
use openwebnet::utils::FirmwareQuirks;
use tokio::sync::Notify;

fn bus_installation(gateway: &StubGateway) {
    gateway.reply("*#1*0##", &["*1*1*12##", "*1*8*13##", ACK]);
    gateway.reply("*#2*0##", &["*2*0*21##", ACK]);
    gateway.reply("*#1018*0*7##", &["*#1018*51*7*1##", ACK]);
    gateway.reply(
        "*#1004*0*7##",
        &["*#1004*1*7*1##", "*#1004*0*7*1##", "*#1004*#0*7*1##", "*#1004*200*7*1##", ACK],
    );
    gateway.reply("*#25*30##", &[NACK]);
    gateway.reply("*#9*0##", &["*9*1*3##", ACK]);
    gateway.reply("*#5*0##", &["*5*3*##", "*5*11*#1##", "*5*8*##", ACK]);
}

// ============================================================================
// BUS DISCOVERY
// ============================================================================

#[tokio::test]
async fn test_bus_discovery_classifies_every_category() {
    let gateway = StubGateway::new();
    bus_installation(&gateway);
    let recorder = Recorder::new();
    gateway.notifier().add_listener(&recorder).unwrap();

    let devices = DiscoveryEngine::new().discover_bus(&gateway).await.unwrap();

    let found: Vec<(&str, DeviceType)> = devices
        .iter()
        .map(|d| (d.address.value(), d.device_type))
        .collect();
    assert_eq!(
        found,
        [
            ("12", DeviceType::ScsOnOffSwitch),
            ("13", DeviceType::ScsDimmerSwitch),
            ("21", DeviceType::ScsShutterControl),
            ("51", DeviceType::ScsEnergyMeter),
            ("#0", DeviceType::ScsThermoCentralUnit),
            ("1", DeviceType::ScsThermoZone),
            ("200", DeviceType::ScsThermoSensor),
            ("3", DeviceType::ScsAuxiliary),
            ("", DeviceType::ScsAlarmCentralUnit),
            ("#1", DeviceType::ScsAlarmZone),
        ]
    );

    eventually("completion", || recorder.count("completed") == 1).await;
    assert_eq!(recorder.count("new_device"), devices.len());
    assert_eq!(recorder.seen().last().map(String::as_str), Some("completed"));
    assert_eq!(
        gateway.sent(),
        [
            "*#1*0##",
            "*#2*0##",
            "*#1018*0*7##",
            "*#1004*0*7##",
            "*#25*30##",
            "*#9*0##",
            "*#5*0##",
        ]
    );
}

#[tokio::test]
async fn test_error_aborts_without_completion() {
    let gateway = StubGateway::new();
    bus_installation(&gateway);
    gateway.fail("*#1004*0*7##", OwnError::Timeout);
    let recorder = Recorder::new();
    gateway.notifier().add_listener(&recorder).unwrap();
    let engine = DiscoveryEngine::new();

    let result = engine.discover_bus(&gateway).await;
    assert!(matches!(result, Err(OwnError::Timeout)));
    assert!(!engine.is_running());
    assert!(!gateway.sent().iter().any(|f| f == "*#25*30##"));

    eventually("devices before the failure", || recorder.count("new_device") == 4).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(recorder.count("completed"), 0);
}

#[tokio::test]
async fn test_second_discovery_rejected_while_running() {
    let gate = Arc::new(Notify::new());
    let gateway = StubGateway::new().gated(Arc::clone(&gate));
    let engine = DiscoveryEngine::new();

    let first = engine.discover_bus(&gateway);
    let second = async {
        while !engine.is_running() {
            tokio::task::yield_now().await;
        }
        let rejected = engine.discover_bus(&gateway).await;
        for _ in 0..7 {
            gate.notify_one();
            tokio::task::yield_now().await;
        }
        rejected
    };

    let (first, second) = tokio::join!(first, second);
    assert!(matches!(second, Err(OwnError::DiscoveryInProgress)));
    assert!(first.unwrap().is_empty());
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_discovery_can_run_again() {
    let gateway = StubGateway::new();
    bus_installation(&gateway);
    let engine = DiscoveryEngine::new();

    let first = engine.discover_bus(&gateway).await.unwrap();
    let second = engine.discover_bus(&gateway).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_bus_discovery_over_session() {
    let gw = MockGateway::bus();
    gw.reply("*#1*0##", &["*1*1*12##", ACK]);
    gw.reply("*#2*0##", &["*2*0*21##", ACK]);
    let session = BusSession::new(gw.connector(), &fast_config());
    session.connect().await.unwrap();

    let devices = DiscoveryEngine::new().discover_bus(&session).await.unwrap();
    let kinds: Vec<DeviceType> = devices.iter().map(|d| d.device_type).collect();
    assert_eq!(kinds, [DeviceType::ScsOnOffSwitch, DeviceType::ScsShutterControl]);
}

// ============================================================================
// ZIGBEE DISCOVERY
// ============================================================================

fn zigbee_network(gateway: &StubGateway) {
    gateway.reply("*#13**66##", &["*#13**66*3##", ACK]);
    gateway.reply("*#13**67*0##", &["*#13**67*0*765432101*256*0*1##", ACK]);
    // Unknown product code
    gateway.reply("*#13**67*1##", &["*#13**67*1*765432201*7*0*1##", ACK]);
    gateway.reply("*#13**67*2##", &["*#13**67*2*765432301*258*0*1##", ACK]);
}

#[tokio::test]
async fn test_zigbee_scan_skips_unreadable_products() {
    let gateway = StubGateway::new();
    zigbee_network(&gateway);
    let recorder = Recorder::new();
    gateway.notifier().add_listener(&recorder).unwrap();

    let devices = DiscoveryEngine::new()
        .discover_zigbee(&gateway)
        .await
        .unwrap();

    let found: Vec<(&str, DeviceType)> = devices
        .iter()
        .map(|d| (d.address.value(), d.device_type))
        .collect();
    assert_eq!(
        found,
        [
            ("765432101#9", DeviceType::ZigbeeOnOffSwitch),
            ("765432301#9", DeviceType::from_zigbee_code(258).unwrap()),
        ]
    );
    eventually("completion", || recorder.count("completed") == 1).await;
    assert!(!gateway.sent().iter().any(|f| f == "*13*66*##"));
}

#[tokio::test]
async fn test_zigbee_count_from_event() {
    let gateway = StubGateway::new();
    zigbee_network(&gateway);
    gateway.reply("*#13**66##", &[ACK]);
    gateway.event_after("*#13**66##", &["*1*1*765432101#9##", "*#13**66*1##"]);

    let devices = DiscoveryEngine::new()
        .discover_zigbee(&gateway)
        .await
        .unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(gateway.sent().last().map(String::as_str), Some("*#13**67*0##"));
}

#[tokio::test]
async fn test_zigbee_old_firmware_refreshes_supervisor() {
    let quirks = FirmwareQuirks::for_version("1.2.0");
    let gateway = StubGateway::with_quirks(quirks);
    zigbee_network(&gateway);
    gateway.reply("*#13**66##", &[NACK]);
    gateway.event_after("*#13**66##", &["*#13**66*1##"]);

    let devices = DiscoveryEngine::new()
        .discover_zigbee(&gateway)
        .await
        .unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(gateway.sent()[..3], ["*#13**66##", "*13*66*##", "*#13**67*0##"]);
}

#[tokio::test]
async fn test_zigbee_scan_nack_rejected_on_current_firmware() {
    let gateway = StubGateway::new();
    gateway.reply("*#13**66##", &[NACK]);

    let result = DiscoveryEngine::new().discover_zigbee(&gateway).await;
    assert!(matches!(result, Err(OwnError::ProtocolViolation(_))));
}

#[tokio::test]
async fn test_zigbee_transport_error_aborts() {
    let gateway = StubGateway::new();
    zigbee_network(&gateway);
    gateway.fail("*#13**67*1##", OwnError::ConnectionClosed);

    let result = DiscoveryEngine::new().discover_zigbee(&gateway).await;
    assert!(matches!(result, Err(OwnError::ConnectionClosed)));
    assert!(!gateway.sent().iter().any(|f| f == "*#13**67*2##"));
}
