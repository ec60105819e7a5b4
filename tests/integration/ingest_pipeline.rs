//! End-to-end ingestion tests over a real telemetry file
//!
//! These tests drive the ingest actor with `ingest_now` and verify:
//! - live / stale / no_file classification and recovery
//! - newest-line-per-sensor selection and partial merges
//! - the publish path (store, watch channel, local mirror)

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use telemetry_bridge::{
    HostMetrics, ImuReading, LinkStatus, PressureReading, TelemetrySnapshot,
    parser::STANDARD_PRESSURE_HPA,
};

use super::helpers::*;

#[tokio::test]
async fn test_live_cycle_populates_snapshot() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[PRESSURE_LINE, IMU_LINE, TEMP_LINE]);
    let pipeline = spawn_pipeline(&fixture, false);

    let snapshot = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(snapshot.status, LinkStatus::Live);
    assert!(snapshot.timestamp.is_some());
    assert_eq!(
        snapshot.pressure,
        PressureReading {
            temp: 22.5,
            pressure: 1001.3,
            altitude: 87.0
        }
    );
    assert_eq!(snapshot.imu.az, 9.7);
    assert_eq!(snapshot.ambient_temp, 19.5);
    assert_eq!(
        snapshot.host,
        HostMetrics {
            cpu_percent: 12.5,
            board_temp: 48.3
        }
    );

    assert_eq!(readings(&pipeline.store.read().await), readings(&snapshot));

    pipeline.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_file_reports_no_file() {
    let fixture = TelemFixture::new();
    let pipeline = spawn_pipeline(&fixture, false);

    let snapshot = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(snapshot.status, LinkStatus::NoFile);
    assert!(snapshot.timestamp.is_some());
    assert_eq!(snapshot.pressure, PressureReading::default());
    // host metrics are sampled regardless of the file
    assert_eq!(snapshot.host.cpu_percent, 12.5);
}

#[tokio::test]
async fn test_stale_file_freezes_sensors() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[PRESSURE_LINE]);
    let pipeline = spawn_pipeline(&fixture, false);

    let live = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(live.status, LinkStatus::Live);

    // newer values, but last modified well past the threshold
    fixture.write_aged_lines(&["MS5611 30.0 990.0 400.0"], Duration::from_secs(600));

    let stale = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(stale.status, LinkStatus::Stale);
    assert_eq!(stale.pressure, live.pressure);
    assert!(stale.timestamp >= live.timestamp);
}

#[tokio::test]
async fn test_status_transitions_and_recovery() {
    let fixture = TelemFixture::new();
    let pipeline = spawn_pipeline(&fixture, false);

    let first = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(first.status, LinkStatus::NoFile);

    fixture.write_lines(&[TEMP_LINE]);
    let second = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(second.status, LinkStatus::Live);
    assert_eq!(second.ambient_temp, 19.5);

    fixture.age_by(Duration::from_secs(121 + 5));
    let third = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(third.status, LinkStatus::Stale);

    fixture.remove();
    let fourth = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(fourth.status, LinkStatus::NoFile);
    // last-known sensor values survive the outage
    assert_eq!(fourth.ambient_temp, 19.5);

    fixture.write_lines(&["TMP 20.0"]);
    let fifth = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(fifth.status, LinkStatus::Live);
    assert_eq!(fifth.ambient_temp, 20.0);
}

#[tokio::test]
async fn test_stale_file_returns_to_live_when_touched() {
    let fixture = TelemFixture::new();
    fixture.write_aged_lines(&["TMP 15.0"], Duration::from_secs(300));
    let pipeline = spawn_pipeline(&fixture, false);

    let stale = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(stale.status, LinkStatus::Stale);
    // never parsed while stale
    assert_eq!(stale.ambient_temp, 0.0);

    fixture.append_line("TMP 16.5");

    let live = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(live.status, LinkStatus::Live);
    assert_eq!(live.ambient_temp, 16.5);
}

#[cfg(unix)]
#[tokio::test]
async fn test_read_failure_keeps_previous_snapshot() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[PRESSURE_LINE, TEMP_LINE]);
    let pipeline = spawn_pipeline_with_probe(&fixture, false, Box::new(CountingProbe::default()));

    let live = pipeline.handle.ingest_now().await.unwrap();
    assert_eq!(live.status, LinkStatus::Live);

    // swapped in one rename for a link to a directory: present and fresh,
    // but reading it fails
    let target = fixture.dir.path().join("not-a-log");
    std::fs::create_dir(&target).unwrap();
    let link = fixture.dir.path().join("telem.link");
    std::os::unix::fs::symlink(&target, &link).unwrap();
    std::fs::rename(&link, &fixture.telem_file).unwrap();

    let result = pipeline.handle.ingest_now().await;
    assert_matches!(result, Err(_));

    let after = pipeline.store.read().await;
    assert_eq!(after.status, LinkStatus::Live);
    assert_eq!(after.pressure, live.pressure);
    assert_eq!(after.ambient_temp, live.ambient_temp);
    assert!(after.host.cpu_percent > live.host.cpu_percent);
}

#[tokio::test]
async fn test_repeated_cycles_are_idempotent() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[PI_LINE]);
    let pipeline = spawn_pipeline(&fixture, false);

    let first = pipeline.handle.ingest_now().await.unwrap();
    let second = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.pressure, second.pressure);
    assert_eq!(first.imu, second.imu);
    assert_eq!(first.ambient_temp, second.ambient_temp);
    assert!(second.timestamp >= first.timestamp);
}

#[tokio::test]
async fn test_newest_line_per_sensor_wins() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[
        "MS5611 10.0 1000.0 10.0",
        "MPU6050 9 9 9 9 9 9",
        "TMP 10.0",
        "MS5611 11.0 1001.0 11.0",
        "garbage line without markers",
        "",
    ]);
    let pipeline = spawn_pipeline(&fixture, false);

    let snapshot = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(snapshot.pressure.pressure, 1001.0);
    assert_eq!(snapshot.imu.gx, 9.0);
    assert_eq!(snapshot.ambient_temp, 10.0);
}

#[tokio::test]
async fn test_partial_update_keeps_other_groups() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[PRESSURE_LINE, IMU_LINE, TEMP_LINE]);
    let pipeline = spawn_pipeline(&fixture, false);

    let before = pipeline.handle.ingest_now().await.unwrap();

    // only the temperature line is present now; the IMU line is malformed
    fixture.write_lines(&["MPU6050 1.0 2.0", "TMP 25.0"]);
    let after = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(after.status, LinkStatus::Live);
    assert_eq!(after.ambient_temp, 25.0);
    assert_eq!(after.pressure, before.pressure);
    assert_eq!(after.imu, before.imu);
}

#[tokio::test]
async fn test_pi_line_uses_pressure_fallback() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[PI_LINE]);
    let pipeline = spawn_pipeline(&fixture, false);

    let snapshot = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(
        snapshot.pressure,
        PressureReading {
            temp: 21.4,
            pressure: STANDARD_PRESSURE_HPA,
            altitude: 152.0
        }
    );
    assert_eq!(
        snapshot.imu,
        ImuReading {
            gx: 0.1,
            gy: 0.2,
            gz: 0.3,
            ax: 0.01,
            ay: 0.02,
            az: 9.81
        }
    );
    assert_eq!(snapshot.ambient_temp, 21.4);
}

#[tokio::test]
async fn test_appended_lines_are_picked_up() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[TEMP_LINE]);
    let pipeline = spawn_pipeline(&fixture, false);

    pipeline.handle.ingest_now().await.unwrap();
    fixture.append_line("TMP 23.25");
    let snapshot = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(snapshot.ambient_temp, 23.25);
}

#[tokio::test]
async fn test_invalid_utf8_is_tolerated() {
    let fixture = TelemFixture::new();
    let mut bytes = b"TMP 18.5\n".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
    std::fs::write(&fixture.telem_file, bytes).unwrap();
    let pipeline = spawn_pipeline(&fixture, false);

    let snapshot = pipeline.handle.ingest_now().await.unwrap();

    assert_eq!(snapshot.status, LinkStatus::Live);
    assert_eq!(snapshot.ambient_temp, 18.5);
}

#[tokio::test]
async fn test_cycle_is_published_to_watch_and_mirror() {
    let fixture = TelemFixture::new();
    fixture.write_lines(&[PRESSURE_LINE]);
    let mut pipeline = spawn_pipeline(&fixture, true);

    let snapshot = pipeline.handle.ingest_now().await.unwrap();

    let published = pipeline.snapshot_rx.borrow_and_update().clone();
    assert_eq!(readings(&published), readings(&snapshot));

    let mirrored = std::fs::read_to_string(fixture.mirror_path()).unwrap();
    let mirrored: TelemetrySnapshot = serde_json::from_str(&mirrored).unwrap();
    assert_eq!(readings(&mirrored), readings(&snapshot));
}

#[tokio::test]
async fn test_actor_stops_when_handles_dropped() {
    let fixture = TelemFixture::new();
    let Pipeline {
        handle,
        mut snapshot_rx,
        ..
    } = spawn_pipeline(&fixture, false);

    drop(handle);

    // the actor owns the sender; the channel closes once it has stopped
    let stopped = tokio::time::timeout(Duration::from_secs(1), async {
        while snapshot_rx.changed().await.is_ok() {}
    })
    .await;
    assert!(stopped.is_ok(), "ingest actor kept running without handles");
}

#[tokio::test]
async fn test_shutdown_stops_actor() {
    let fixture = TelemFixture::new();
    let pipeline = spawn_pipeline(&fixture, false);

    pipeline.handle.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_matches!(pipeline.handle.ingest_now().await, Err(_));
}
