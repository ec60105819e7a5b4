//! Concurrency tests
//!
//! These tests verify:
//! - HTTP readers polling during ingestion only see complete cycles
//! - concurrent ingest requests are serialized by the actor
//! - concurrent user additions are all kept

use std::net::SocketAddr;

use futures::future::join_all;
use telemetry_bridge::{
    LinkStatus, TelemetrySnapshot,
    api::{ApiConfig, ApiState, spawn_api_server},
    users::{NewUser, UserDirectory, default_users},
};

use super::helpers::*;

/// All three sensor groups carry `value`, so a reading mixing two cycles
/// shows up as unequal fields.
fn generation_lines(value: u32) -> Vec<String> {
    vec![
        format!("MS5611 {value} {value} {value}"),
        format!("MPU6050 {value} {value} {value} {value} {value} {value}"),
        format!("TMP {value}"),
    ]
}

fn assert_consistent(snapshot: &TelemetrySnapshot) {
    let value = snapshot.ambient_temp;
    assert_eq!(snapshot.pressure.temp, value);
    assert_eq!(snapshot.pressure.pressure, value);
    assert_eq!(snapshot.pressure.altitude, value);
    assert_eq!(snapshot.imu.gx, value);
    assert_eq!(snapshot.imu.az, value);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_http_readers_see_complete_cycles() {
    let fixture = TelemFixture::new();
    let pipeline = spawn_pipeline(&fixture, false);
    let users = UserDirectory::new(fixture.dir.path().join("users.json"), default_users());

    let config = ApiConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        enable_cors: false,
        dashboard_dir: None,
    };
    let addr = spawn_api_server(config, ApiState::new(pipeline.store.clone(), users))
        .await
        .unwrap();
    let url = format!("http://{addr}/api/telemetry");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let url = url.clone();
            tokio::spawn(async move {
                let client = reqwest::Client::new();
                for _ in 0..25 {
                    let snapshot: TelemetrySnapshot =
                        client.get(&url).send().await.unwrap().json().await.unwrap();
                    assert_consistent(&snapshot);
                }
            })
        })
        .collect();

    for generation in 1..=25 {
        let lines = generation_lines(generation);
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        fixture.write_lines(&lines);
        let snapshot = pipeline.handle.ingest_now().await.unwrap();
        assert_eq!(snapshot.status, LinkStatus::Live);
        assert_consistent(&snapshot);
    }

    for reader in join_all(readers).await {
        reader.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingest_requests() {
    let fixture = TelemFixture::new();
    let lines = generation_lines(7);
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    fixture.write_lines(&lines);
    let pipeline = spawn_pipeline(&fixture, false);

    let requests = (0..10).map(|_| {
        let handle = pipeline.handle.clone();
        async move { handle.ingest_now().await }
    });

    for result in join_all(requests).await {
        let snapshot = result.unwrap();
        assert_eq!(snapshot.status, LinkStatus::Live);
        assert_eq!(snapshot.ambient_temp, 7.0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_user_additions_are_kept() {
    let fixture = TelemFixture::new();
    let path = fixture.dir.path().join("users.json");
    let users = UserDirectory::new(path.clone(), default_users());

    let additions = (0..8).map(|i| {
        let users = users.clone();
        async move {
            users
                .add_user(
                    "admin",
                    "groundstation",
                    NewUser {
                        id: format!("operator{i}"),
                        pw: "secret99".to_string(),
                        role: None,
                    },
                )
                .await
        }
    });

    for result in join_all(additions).await {
        result.unwrap();
    }

    assert_eq!(users.public_users().await.len(), 10);

    let reloaded = UserDirectory::load(path).await;
    assert_eq!(reloaded.public_users().await.len(), 10);
}
