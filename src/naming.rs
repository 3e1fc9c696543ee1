// SPDX-License-Identifier: GPL-3.0-only

//! Filename conventions for captures and gallery exports
//!
//! Shutter captures are named
//! `cocoro_{YYYY}-{MM}-{DD}_{HH}-{mm}-{ss}_{room}_{who}_F{f}_BPM{bpm}.png`
//! with an optional `_SS{label}` before the extension. Gallery exports use
//! `kokoro_{timestamp}_f{f}_bpm{bpm}.png`.

use crate::constants::naming;
use crate::session::ApertureValue;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Inputs of a shutter filename
#[derive(Debug, Clone)]
pub struct CaptureName<'a> {
    /// Local wall-clock time of the shot
    pub taken_at: NaiveDateTime,
    pub room: Option<&'a str>,
    pub who: Option<&'a str>,
    pub aperture: ApertureValue,
    /// None renders as `--`
    pub bpm: Option<u32>,
    /// Adds the `_SS` suffix when set
    pub shutter_secs: Option<f64>,
}

impl CaptureName<'_> {
    pub fn to_filename(&self) -> String {
        let room = label_or(self.room, naming::DEFAULT_ROOM);
        let who = label_or(self.who, naming::DEFAULT_WHO);
        let aperture = format!("{:.1}", self.aperture.as_f64()).replace('.', "-");
        let bpm = self
            .bpm
            .map(|bpm| bpm.to_string())
            .unwrap_or_else(|| "--".to_string());
        let shutter = self
            .shutter_secs
            .map(|secs| format!("_SS{}", shutter_label(secs)))
            .unwrap_or_default();

        format!(
            "{}_{}_{}_{}_F{}_BPM{}{}.png",
            naming::CAPTURE_PREFIX,
            self.taken_at.format("%Y-%m-%d_%H-%M-%S"),
            room,
            who,
            aperture,
            bpm,
            shutter
        )
    }
}

fn label_or<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
}

/// `{seconds}s` at one second and above, `1-{n}` for 1/n below
pub fn shutter_label(seconds: f64) -> String {
    if !(seconds > 0.0) || !seconds.is_finite() {
        return "0s".to_string();
    }
    if seconds >= 1.0 {
        format!("{}s", seconds)
    } else {
        format!("1-{}", (1.0 / seconds).round())
    }
}

/// Download name for a stored photo
pub fn gallery_filename(
    created_at: DateTime<Utc>,
    aperture: Option<ApertureValue>,
    bpm: Option<u32>,
) -> String {
    let stamp = created_at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let aperture = aperture
        .map(|f| f.get().to_string())
        .unwrap_or_else(|| "x".to_string());
    let bpm = bpm
        .map(|bpm| bpm.to_string())
        .unwrap_or_else(|| "x".to_string());
    format!(
        "{}_{}_f{}_bpm{}.png",
        naming::GALLERY_PREFIX,
        stamp,
        aperture,
        bpm
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn new_year() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn f8() -> ApertureValue {
        ApertureValue::new(8).unwrap()
    }

    #[test]
    fn test_documented_filename() {
        let name = CaptureName {
            taken_at: new_year(),
            room: Some("room"),
            who: Some("anon"),
            aperture: f8(),
            bpm: Some(72),
            shutter_secs: None,
        };
        assert_eq!(
            name.to_filename(),
            "cocoro_2024-01-01_00-00-00_room_anon_F8-0_BPM72.png"
        );
    }

    #[test]
    fn test_blank_labels_and_missing_bpm() {
        let name = CaptureName {
            taken_at: new_year(),
            room: Some("  "),
            who: None,
            aperture: ApertureValue::NARROWEST,
            bpm: None,
            shutter_secs: None,
        };
        assert_eq!(
            name.to_filename(),
            "cocoro_2024-01-01_00-00-00_room_anon_F32-0_BPM--.png"
        );
    }

    #[test]
    fn test_shutter_suffix() {
        let name = CaptureName {
            taken_at: new_year(),
            room: Some("lab"),
            who: Some("kai"),
            aperture: f8(),
            bpm: Some(60),
            shutter_secs: Some(1.0 / 60.0),
        };
        assert_eq!(
            name.to_filename(),
            "cocoro_2024-01-01_00-00-00_lab_kai_F8-0_BPM60_SS1-60.png"
        );
    }

    #[test]
    fn test_shutter_labels() {
        assert_eq!(shutter_label(2.0), "2s");
        assert_eq!(shutter_label(1.5), "1.5s");
        assert_eq!(shutter_label(1.0), "1s");
        assert_eq!(shutter_label(1.0 / 72.0), "1-72");
        assert_eq!(shutter_label(0.0005), "1-2000");
    }

    #[test]
    fn test_gallery_filename() {
        let created = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            gallery_filename(created, Some(f8()), Some(72)),
            "kokoro_2024-03-05T14-07-09-000Z_f8_bpm72.png"
        );
        assert_eq!(
            gallery_filename(created, None, None),
            "kokoro_2024-03-05T14-07-09-000Z_fx_bpmx.png"
        );
    }
}
