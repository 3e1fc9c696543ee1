// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the shutter path: capture, export and storage

use image::RgbaImage;
use kokoro_camera::backends::camera::{Resolution, SyntheticPulseSource};
use kokoro_camera::export::{DownloadTarget, ExportOutcome, Exporter, ShareTarget};
use kokoro_camera::pipelines::photo::{CaptureOrchestrator, PhotoEncoder, StillEncoder};
use kokoro_camera::render::{NativeFilter, RenderPipeline};
use kokoro_camera::storage::{MemoryPhotoStore, PhotoStore};
use kokoro_camera::timing::{CancelFlag, VirtualClock};
use kokoro_camera::{
    ApertureValue, CameraFacing, Config, ExposureMapper, PhotoBooth, PhotoError, Session,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct RejectingShare(AtomicUsize);

impl ShareTarget for RejectingShare {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    fn share(&self, _bytes: &[u8], _filename: &str) -> Result<(), PhotoError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(PhotoError::ExportFailed("share sheet dismissed".to_string()))
    }
}

struct BrokenEncoder;

impl StillEncoder for BrokenEncoder {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn encode(&self, _image: &RgbaImage) -> Result<Vec<u8>, PhotoError> {
        Err(PhotoError::EncodingFailed("disk full".to_string()))
    }
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("kokoro-booth-{}", uuid::Uuid::new_v4()))
}

fn booth(
    clock: &VirtualClock,
    encoder: PhotoEncoder,
    share: Arc<RejectingShare>,
    downloads: &Path,
    store: Arc<MemoryPhotoStore>,
) -> PhotoBooth {
    let orchestrator = CaptureOrchestrator::new(
        RenderPipeline::new(Arc::new(NativeFilter)),
        encoder,
        Arc::new(clock.clone()),
        40,
        1600,
    );
    let exporter = Exporter::new(
        Some(share as Arc<dyn ShareTarget>),
        DownloadTarget::new(downloads),
    );
    PhotoBooth::new(orchestrator, exporter, store)
}

fn source(clock: &VirtualClock) -> SyntheticPulseSource {
    SyntheticPulseSource::new(
        72.0,
        Resolution::new(64, 48),
        CameraFacing::Environment,
        Arc::new(clock.clone()),
    )
}

#[tokio::test]
async fn test_rejected_share_downloads_and_stores() {
    let clock = VirtualClock::new();
    let downloads = temp_dir();
    let share = Arc::new(RejectingShare(AtomicUsize::new(0)));
    let store = Arc::new(MemoryPhotoStore::new());
    let booth = booth(&clock, PhotoEncoder::new(), share.clone(), &downloads, store.clone());

    let mut session = Session::new(&Config::default());
    session.set_aperture(ApertureValue::new(8).unwrap());
    session.skip_measurement(60);
    let recipe = session.recipe(&ExposureMapper::default());

    let report = booth
        .shoot(&source(&clock), &session, &recipe, &CancelFlag::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(share.0.load(Ordering::SeqCst), 1);
    assert!(report.filename.ends_with("_room_anon_F8-0_BPM60.png"));
    let ExportOutcome::Downloaded { path } = report.export.clone().unwrap() else {
        panic!("expected a download, got {:?}", report.export);
    };
    assert_eq!(path, downloads.join(&report.filename));
    assert_eq!(std::fs::read(&path).unwrap(), report.artifact.bytes());

    let id = report.stored.clone().unwrap();
    let photos = store.list().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].id, id);
    assert_eq!(photos[0].metadata.bpm, Some(60));
    assert_eq!(photos[0].metadata.aperture, ApertureValue::new(8));
    assert!(report.summary().contains("saved to"));

    let decoded = image::load_from_memory(report.artifact.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));

    let _ = std::fs::remove_dir_all(&downloads);
}

#[tokio::test]
async fn test_failed_encoding_exports_and_stores_nothing() {
    let clock = VirtualClock::new();
    let downloads = temp_dir();
    let share = Arc::new(RejectingShare(AtomicUsize::new(0)));
    let store = Arc::new(MemoryPhotoStore::new());
    let booth = booth(
        &clock,
        PhotoEncoder::with_backend(Arc::new(BrokenEncoder)),
        share.clone(),
        &downloads,
        store.clone(),
    );

    let session = Session::new(&Config::default());
    let recipe = session.recipe(&ExposureMapper::default());
    let result = booth
        .shoot(&source(&clock), &session, &recipe, &CancelFlag::new())
        .await;

    assert!(matches!(result, Err(PhotoError::EncodingFailed(_))));
    assert_eq!(share.0.load(Ordering::SeqCst), 0);
    assert!(store.list().unwrap().is_empty());
    assert!(!downloads.exists());
}

#[tokio::test]
async fn test_long_exposure_at_rest_heart_rate() {
    let clock = VirtualClock::new();
    let downloads = temp_dir();
    let store = Arc::new(MemoryPhotoStore::new());
    let booth = booth(
        &clock,
        PhotoEncoder::new(),
        Arc::new(RejectingShare(AtomicUsize::new(0))),
        &downloads,
        store.clone(),
    );

    let mut session = Session::new(&Config::default());
    session.participant = Some("yui".to_string());
    session.room = Some("studio".to_string());
    let recipe = session.recipe(&ExposureMapper::default());

    let report = booth
        .shoot(&source(&clock), &session, &recipe, &CancelFlag::new())
        .await
        .unwrap()
        .unwrap();

    let meta = report.artifact.metadata();
    // 1/60 s at 40 Hz is a single frame
    assert_eq!(meta.frame_count, 1);
    assert!(report.filename.ends_with("_studio_yui_F32-0_BPM60.png"));
    assert_eq!(store.usage().unwrap().photos, 1);

    let _ = std::fs::remove_dir_all(&downloads);
}

#[tokio::test]
async fn test_stored_shot_exports_without_overwriting() {
    let clock = VirtualClock::new();
    let downloads = temp_dir();
    let share = Arc::new(RejectingShare(AtomicUsize::new(0)));
    let store = Arc::new(MemoryPhotoStore::new());
    let booth = booth(&clock, PhotoEncoder::new(), share.clone(), &downloads, store.clone());

    let session = Session::new(&Config::default());
    let recipe = session.recipe(&ExposureMapper::default());
    let report = booth
        .shoot(&source(&clock), &session, &recipe, &CancelFlag::new())
        .await
        .unwrap()
        .unwrap();
    let record = store.get(&report.stored.unwrap()).unwrap().unwrap();

    let gallery = temp_dir();
    let exporter = Exporter::new(
        Some(share.clone() as Arc<dyn ShareTarget>),
        DownloadTarget::new(&gallery),
    );
    let first = exporter.export_record(&record).unwrap();
    let second = exporter.export_record(&record).unwrap();
    // Once for the shot, twice for the gallery
    assert_eq!(share.0.load(Ordering::SeqCst), 3);

    let (ExportOutcome::Downloaded { path: first }, ExportOutcome::Downloaded { path: second }) =
        (first, second)
    else {
        panic!("expected downloads");
    };
    assert_ne!(first, second);
    assert!(second.to_string_lossy().ends_with("_bpm60 (1).png"));
    assert_eq!(std::fs::read(&first).unwrap(), record.bytes);
    assert_eq!(std::fs::read(&second).unwrap(), record.bytes);

    let _ = std::fs::remove_dir_all(&downloads);
    let _ = std::fs::remove_dir_all(&gallery);
}
