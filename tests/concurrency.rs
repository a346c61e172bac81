//! Concurrent use of one session and of many sessions against one gateway

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use common::{fast_config, MockGateway};
use openwebnet::core::frame::ACK;
use openwebnet::message::lighting;
use openwebnet::session::{BusSession, Gateway};
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_commands_keep_their_replies() {
    let gw = MockGateway::bus();
    let addresses: Vec<String> = (1..=9)
        .flat_map(|a| (1..=9).map(move |p| format!("{a}{p}")))
        .collect();
    for where_ in &addresses {
        let status = format!("*#1*{where_}##");
        let reply = format!("*1*1*{where_}##");
        gw.reply(&status, &[reply.as_str(), ACK]);
    }

    let session = Arc::new(BusSession::new(gw.connector(), &fast_config()));
    session.connect().await.unwrap();

    let mut tasks = JoinSet::new();
    for where_ in addresses.clone() {
        let session = Arc::clone(&session);
        tasks.spawn(async move {
            let response = session
                .send(&lighting::request_status(&where_).unwrap())
                .await
                .unwrap();
            let frames: Vec<String> = response
                .messages()
                .iter()
                .map(|m| m.frame().to_string())
                .collect();
            assert_eq!(frames, [format!("*1*1*{where_}##"), ACK.to_string()]);
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    assert_eq!(session.metrics().commands_total, addresses.len() as u64);
    assert_eq!(session.metrics().commands_failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_sessions_connect_independently() {
    let gw = MockGateway::bus();

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let connector = gw.connector();
        tasks.spawn(async move {
            let session = BusSession::new(connector, &fast_config());
            session.connect().await.unwrap();
            session
                .send(&lighting::request_turn_off("12").unwrap())
                .await
                .unwrap();
            session.close().await;
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    // One MON and one CMD channel per session
    assert_eq!(gw.connects(), 32);
}
