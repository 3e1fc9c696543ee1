// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for capture filenames

use chrono::NaiveDate;
use kokoro_camera::naming::CaptureName;
use kokoro_camera::{ApertureValue, Config, Measurement, Session};

fn midnight() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn filename(session: &Session) -> String {
    CaptureName {
        taken_at: midnight(),
        room: session.room.as_deref(),
        who: session.participant.as_deref(),
        aperture: session.aperture,
        bpm: Some(session.heart_rate.bpm),
        shutter_secs: None,
    }
    .to_filename()
}

#[test]
fn test_measured_session_filename() {
    let mut session = Session::new(&Config::default());
    session.set_aperture(ApertureValue::new(8).unwrap());
    session.apply_measurement(&Measurement::from_samples(
        pulse_samples(72.0, 30.0, 15.0),
        15.0,
        60,
        (60, 100),
    ));

    assert_eq!(
        filename(&session),
        "cocoro_2024-01-01_00-00-00_room_anon_F8-0_BPM72.png"
    );
}

#[test]
fn test_skipped_measurement_filename() {
    let mut session = Session::new(&Config::default());
    session.set_aperture(ApertureValue::new(8).unwrap());
    session.participant = Some("  ".to_string());
    session.skip_measurement(Config::default().default_bpm);

    assert_eq!(
        filename(&session),
        "cocoro_2024-01-01_00-00-00_room_anon_F8-0_BPM60.png"
    );
}

#[test]
fn test_unknown_heart_rate_filename() {
    let name = CaptureName {
        taken_at: midnight(),
        room: Some("lab"),
        who: Some("ren"),
        aperture: ApertureValue::new(16).unwrap(),
        bpm: None,
        shutter_secs: Some(2.0),
    }
    .to_filename();
    assert_eq!(name, "cocoro_2024-01-01_00-00-00_lab_ren_F16-0_BPM--_SS2s.png");
}

fn pulse_samples(bpm: f64, rate_hz: f64, secs: f64) -> Vec<f64> {
    let count = (rate_hz * secs) as usize;
    (0..count)
        .map(|i| {
            let t = i as f64 / rate_hz;
            128.0 + 60.0 * (2.0 * std::f64::consts::PI * bpm / 60.0 * t).sin()
        })
        .collect()
}
