// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the booth
//!
//! This module provides command-line functionality for:
//! - Printing exposure recipes
//! - Measuring a heart rate from a frame source
//! - Taking a photo
//! - Managing stored photos

use kokoro_camera::backends::camera::{
    CameraProvider, FileCameraProvider, FrameSource, MAIN_VIEW, MEASURE_VIEW, SourceSpec,
};
use kokoro_camera::export::{DownloadTarget, ExportOutcome, Exporter, SystemShare};
use kokoro_camera::exposure::display_shutter_label;
use kokoro_camera::naming::shutter_label;
use kokoro_camera::storage::{PhotoStore, open_photo_store};
use kokoro_camera::timing::{CancelFlag, Clock, TokioClock};
use kokoro_camera::{
    ApertureValue, CameraFacing, Config, ExposureMapper, HeartRate, HeartRateMeter, Measurement,
    PhotoBooth, PhotoError, Session, StorageError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn parse_aperture(value: u8) -> Result<ApertureValue, Box<dyn std::error::Error>> {
    ApertureValue::new(value).ok_or_else(|| {
        format!(
            "Aperture {} out of range ({}-{})",
            value,
            ApertureValue::WIDEST.get(),
            ApertureValue::NARROWEST.get()
        )
        .into()
    })
}

fn provider(
    config: &Config,
    rear: &str,
    front: Option<&str>,
    clock: Arc<dyn Clock>,
) -> Result<FileCameraProvider, Box<dyn std::error::Error>> {
    // Image sequences play back at the preview rate
    let sequence_fps = config.preview_fps.max(1) as f64;
    let rear: SourceSpec = rear.parse()?;
    let front = front.map(str::parse::<SourceSpec>).transpose()?;
    Ok(FileCameraProvider::new(rear, front, clock).with_sequence_fps(sequence_fps))
}

/// Cancel `cancel` when the user presses Ctrl+C
fn cancel_on_ctrl_c(cancel: &CancelFlag) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            println!("Stopping...");
            cancel.cancel();
        }
    });
}

/// Print the exposure recipe for an aperture and heart rate
pub fn print_recipe(config: &Config, aperture: u8, bpm: u32) -> Result<(), Box<dyn std::error::Error>> {
    let aperture = parse_aperture(aperture)?;
    if bpm == 0 {
        return Err("Heart rate must be positive".into());
    }

    let recipe = ExposureMapper::from_config(config).recipe(aperture, bpm);
    let frames = recipe.frame_count(config.synthetic_frame_rate);

    println!("Exposure recipe");
    println!("===============");
    println!("Aperture:    {}", aperture);
    println!("Heart rate:  {} BPM", bpm);
    println!("Shutter:     {}", display_shutter_label(bpm));
    println!();
    println!("Brightness:  {:.3}", recipe.brightness_gain);
    println!("Contrast:    {:.3}", recipe.contrast_gain);
    println!("Saturation:  {:.3}", recipe.saturation_gain);
    println!("Blur radius: {} px", recipe.blur_radius_px);
    println!(
        "Exposure:    {:.4} s ({}), {} frame(s) at {} Hz",
        recipe.exposure_duration_secs,
        shutter_label(recipe.exposure_duration_secs),
        frames,
        config.synthetic_frame_rate
    );
    println!("Trail fade:  {:.3}", recipe.trail_fade_alpha);

    Ok(())
}

/// Run a heart-rate measurement and print the result
pub fn measure(config: &Config, source: &str, secs: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let provider = provider(config, source, None, Arc::clone(&clock))?;
    let source = provider.open(CameraFacing::Environment, MEASURE_VIEW)?;

    let window = secs.unwrap_or(config.measurement_secs);
    if window == 0 {
        return Err("Measurement window must be at least one second".into());
    }
    let meter = HeartRateMeter::new(
        Duration::from_secs(window),
        config.default_bpm,
        config.bpm_band(),
    );

    println!("Measuring heart rate from: {}", source.name());
    println!("Keep still... (press Ctrl+C to stop early)");

    let rt = tokio::runtime::Runtime::new()?;
    let measurement = rt.block_on(async {
        let cancel = CancelFlag::new();
        cancel_on_ctrl_c(&cancel);
        meter
            .measure(source.as_ref(), clock.as_ref(), &cancel, |remaining| {
                println!("  {} s", remaining);
            })
            .await
    });

    let Some(measurement) = measurement else {
        println!("Measurement cancelled.");
        return Ok(());
    };

    print_measurement(&measurement);
    Ok(())
}

fn print_measurement(measurement: &Measurement) {
    match measurement.raw_estimate {
        Some(raw) if raw != measurement.bpm => println!(
            "Heart rate: {} BPM (measured {}, clamped)",
            measurement.bpm, raw
        ),
        Some(_) => println!("Heart rate: {} BPM", measurement.bpm),
        None => println!(
            "No pulse found in {} samples, using default {} BPM",
            measurement.samples.len(),
            measurement.bpm
        ),
    }
}

/// Options of the `capture` command
pub struct CaptureOptions {
    pub source: String,
    pub aperture: u8,
    pub bpm: Option<u32>,
    pub front: bool,
    pub share: bool,
    pub who: Option<String>,
    pub room: Option<String>,
}

/// Take one photo with the given settings
pub fn capture(config: &Config, options: CaptureOptions) -> Result<(), Box<dyn std::error::Error>> {
    let aperture = parse_aperture(options.aperture)?;
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let provider = provider(config, &options.source, None, Arc::clone(&clock))?;

    let mut session = Session::new(config);
    if options.front {
        session.switch_camera();
    }
    session.set_aperture(aperture);
    if options.who.is_some() {
        session.participant = options.who;
    }
    if options.room.is_some() {
        session.room = options.room;
    }

    if let Some(bpm) = options.bpm {
        if bpm == 0 {
            return Err("Heart rate must be positive".into());
        }
        session.heart_rate = HeartRate::measured(bpm);
    }

    let source = provider.open(session.facing, MAIN_VIEW)?;
    println!("Using source: {} ({} camera)", source.name(), session.facing.label());
    println!("Participant: {} in {}", session.who(), session.room_label());

    let booth = PhotoBooth::from_config(config, Arc::clone(&clock), options.share);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_capture(
        config,
        &provider,
        source,
        clock,
        &booth,
        session,
        options.bpm.is_none(),
    ))
}

async fn run_capture(
    config: &Config,
    provider: &FileCameraProvider,
    source: Arc<dyn FrameSource>,
    clock: Arc<dyn Clock>,
    booth: &PhotoBooth,
    mut session: Session,
    measure_first: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(&cancel);

    if measure_first {
        let measure_source = provider.open(session.facing, MEASURE_VIEW)?;
        println!("Measuring heart rate ({} s)...", config.measurement_secs);
        let measurement = HeartRateMeter::from_config(config)
            .measure(measure_source.as_ref(), clock.as_ref(), &cancel, |_| {})
            .await;
        let Some(measurement) = measurement else {
            println!("Measurement cancelled.");
            return Ok(());
        };
        print_measurement(&measurement);
        session.apply_measurement(&measurement);
    }

    let recipe = session.recipe(&ExposureMapper::from_config(config));
    println!(
        "Capturing at {}, {} BPM ({:.3} s exposure)...",
        session.aperture, session.heart_rate.bpm, recipe.exposure_duration_secs
    );

    // Give a live source a moment to produce its first frame
    wait_for_frame(source.as_ref(), clock.as_ref()).await;

    match booth.shoot(source.as_ref(), &session, &recipe, &cancel).await? {
        Some(report) => {
            println!("Photo taken: {}", report.summary());
            Ok(())
        }
        None => Err(PhotoError::NoFrameAvailable.into()),
    }
}

async fn wait_for_frame(source: &dyn FrameSource, clock: &dyn Clock) {
    for _ in 0..100 {
        if source.latest_frame().is_some() {
            return;
        }
        clock.sleep(Duration::from_millis(20)).await;
    }
}

/// Run the interactive terminal booth
pub fn run_booth(
    config: &Config,
    source: &str,
    front_source: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let provider = provider(config, source, front_source, Arc::clone(&clock))?;
    kokoro_camera::terminal::run(config, Arc::new(provider), clock)
}

fn store(config: &Config) -> Arc<dyn PhotoStore> {
    open_photo_store(config)
}

/// List stored photos
pub fn gallery_list(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = store(config);
    let photos = store.list()?;

    if photos.is_empty() {
        println!("No photos stored.");
        return Ok(());
    }

    println!("Stored photos ({}):", store.kind());
    println!();
    for photo in &photos {
        let meta = &photo.metadata;
        let aperture = meta
            .aperture
            .map(|f| f.to_string())
            .unwrap_or_else(|| "F?".to_string());
        let bpm = meta
            .bpm
            .map(|bpm| format!("{} BPM", bpm))
            .unwrap_or_else(|| "-- BPM".to_string());
        println!("  {}", photo.id);
        println!(
            "      {}  {}  {}  {}",
            photo.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
            aperture,
            bpm,
            format_size(photo.size_bytes)
        );
    }

    Ok(())
}

/// Write a stored photo into the downloads directory
pub fn gallery_export(
    config: &Config,
    id: &str,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = output.unwrap_or_else(|| config.download_directory());
    export_stored(config, id, Exporter::download_only(DownloadTarget::new(dir)))
}

/// Open a stored photo with the system viewer, downloading it if that fails
pub fn gallery_share(config: &Config, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let exporter = Exporter::new(
        Some(Arc::new(SystemShare::in_temp_dir())),
        DownloadTarget::new(config.download_directory()),
    );
    export_stored(config, id, exporter)
}

fn export_stored(
    config: &Config,
    id: &str,
    exporter: Exporter,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = store(config)
        .get(id)?
        .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

    match exporter.export_record(&record)? {
        ExportOutcome::Shared { target } => println!("Photo shared via {}", target),
        ExportOutcome::Downloaded { path } => println!("Photo saved: {}", path.display()),
    }
    Ok(())
}

/// Delete a stored photo
pub fn gallery_delete(config: &Config, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if store(config).delete(id)? {
        println!("Deleted {}", id);
        Ok(())
    } else {
        Err(StorageError::NotFound(id.to_string()).into())
    }
}

/// Delete every stored photo
pub fn gallery_clear(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let removed = store(config).clear()?;
    println!("Deleted {} photo(s)", removed);
    Ok(())
}

/// Show storage usage
pub fn gallery_usage(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = store(config);
    let usage = store.usage()?;
    println!(
        "{} photo(s), {} ({})",
        usage.photos,
        format_size(usage.bytes),
        store.kind()
    );
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let bytes_f = bytes as f64;
    if bytes_f >= KIB * KIB {
        format!("{:.1} MiB", bytes_f / (KIB * KIB))
    } else if bytes_f >= KIB {
        format!("{:.1} KiB", bytes_f / KIB)
    } else {
        format!("{} B", bytes)
    }
}
