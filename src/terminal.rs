// SPDX-License-Identifier: GPL-3.0-only

//! Terminal photo booth
//!
//! Renders the live preview to the terminal using Unicode half-block
//! characters for improved vertical resolution. Measurement and capture run
//! as tasks on a tokio runtime while the preview keeps ticking at the display
//! refresh rate.

use crate::backends::camera::{
    CameraProvider, FrameSource, MAIN_VIEW, MEASURE_VIEW, Resolution, reopen_or_keep,
};
use crate::config::Config;
use crate::constants::timing;
use crate::errors::PhotoError;
use crate::exposure::{ExposureMapper, display_shutter_label};
use crate::pipelines::photo::{PhotoBooth, ShotReport};
use crate::render::PreviewRenderer;
use crate::session::{ApertureValue, CameraFacing, HeartRateSource, Session};
use crate::signal::{HeartRateMeter, Measurement};
use crate::timing::{CancelFlag, Clock};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::channel::{mpsc, oneshot};
use image::RgbaImage;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the terminal booth
pub fn run(
    config: &Config,
    provider: Arc<dyn CameraProvider>,
    clock: Arc<dyn Clock>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let source = provider.open(CameraFacing::default(), MAIN_VIEW)?;
    let mut booth = BoothState::new(config, provider, clock, source);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the booth
    let result = run_app(&mut terminal, &runtime, &mut booth);
    booth.cancel_job();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Things a key press can ask the booth to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Narrower,
    Wider,
    Measure,
    SkipMeasurement,
    SwitchCamera,
    Shutter,
    Cancel,
    ToggleHelp,
    Quit,
}

fn action_for(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    // Ctrl+C to quit
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    match code {
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up | KeyCode::Right => {
            Some(Action::Narrower)
        }
        KeyCode::Char('-') | KeyCode::Char('_') | KeyCode::Down | KeyCode::Left => {
            Some(Action::Wider)
        }
        KeyCode::Char('m') => Some(Action::Measure),
        KeyCode::Char('k') => Some(Action::SkipMeasurement),
        KeyCode::Char('s') => Some(Action::SwitchCamera),
        KeyCode::Char('p') | KeyCode::Char(' ') | KeyCode::Enter => Some(Action::Shutter),
        KeyCode::Char('c') | KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Char('h') => Some(Action::ToggleHelp),
        KeyCode::Char('q') => Some(Action::Quit),
        _ => None,
    }
}

/// Background work started from the booth
enum Job {
    Measuring {
        cancel: CancelFlag,
        remaining: u64,
        progress: mpsc::UnboundedReceiver<u64>,
        result: oneshot::Receiver<Option<Measurement>>,
    },
    Capturing {
        cancel: CancelFlag,
        result: oneshot::Receiver<Result<Option<ShotReport>, PhotoError>>,
    },
}

struct BoothState {
    config: Config,
    provider: Arc<dyn CameraProvider>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn FrameSource>,
    source_size: Resolution,
    session: Session,
    mapper: ExposureMapper,
    photo_booth: PhotoBooth,
    preview: PreviewRenderer,
    job: Option<Job>,
    status_message: String,
    show_help: bool,
}

impl BoothState {
    fn new(
        config: &Config,
        provider: Arc<dyn CameraProvider>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn FrameSource>,
    ) -> Self {
        let photo_booth = PhotoBooth::from_config(config, Arc::clone(&clock), true);
        let preview = PreviewRenderer::new(
            photo_booth.orchestrator().pipeline().clone(),
            config.preview_fps,
        );
        info!(
            source = source.name(),
            compositor = preview.pipeline().compositor().name(),
            store = photo_booth.store().kind(),
            "Booth ready"
        );
        Self {
            config: config.clone(),
            provider,
            clock,
            source_size: source_size(source.as_ref()),
            source,
            session: Session::new(config),
            mapper: ExposureMapper::from_config(config),
            photo_booth,
            preview,
            job: None,
            status_message: build_status_message(),
            show_help: false,
        }
    }

    /// Render the preview if the rate limiter allows it
    fn tick(&mut self) -> bool {
        let recipe = self.session.recipe(&self.mapper);
        let size = self.source_size.fit_width(self.config.max_capture_width);
        self.preview.tick(
            self.clock.now(),
            self.source.as_ref(),
            &recipe,
            self.session.flip_horizontal(),
            size,
        )
    }

    fn handle(&mut self, action: Action, runtime: &tokio::runtime::Runtime) -> bool {
        if action != Action::ToggleHelp {
            self.show_help = false;
        }
        match action {
            Action::Quit => return false,
            Action::Narrower => self.set_aperture(self.session.aperture.narrower()),
            Action::Wider => self.set_aperture(self.session.aperture.wider()),
            Action::Measure => self.start_measurement(runtime),
            Action::SkipMeasurement => {
                if self.job.is_some() {
                    self.status_message = "Busy, press 'c' to cancel".to_string();
                } else {
                    self.session.skip_measurement(self.config.default_bpm);
                    self.preview.invalidate();
                    self.status_message =
                        format!("Measurement skipped, using {} BPM", self.config.default_bpm);
                }
            }
            Action::SwitchCamera => self.switch_camera(),
            Action::Shutter => self.start_capture(runtime),
            Action::Cancel => {
                if self.cancel_job() {
                    self.status_message = "Cancelling...".to_string();
                }
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                self.status_message = if self.show_help {
                    build_help_message()
                } else {
                    build_status_message()
                };
            }
        }
        true
    }

    fn set_aperture(&mut self, aperture: ApertureValue) {
        if aperture == self.session.aperture {
            return;
        }
        self.session.set_aperture(aperture);
        self.preview.invalidate();
    }

    fn switch_camera(&mut self) {
        if matches!(self.job, Some(Job::Capturing { .. })) {
            self.status_message = "Cannot switch camera during an exposure".to_string();
            return;
        }
        let facing = self.session.facing.toggled();
        let (source, failure) = reopen_or_keep(
            self.provider.as_ref(),
            Arc::clone(&self.source),
            facing,
            MAIN_VIEW,
        );
        match failure {
            Some(e) => {
                error!(error = %e, "Failed to switch camera");
                self.status_message = format!("Error: {}", e);
            }
            None => {
                self.session.switch_camera();
                self.source_size = source_size(source.as_ref());
                self.source = source;
                self.preview.invalidate();
                self.status_message = format!("Switched to {} camera", facing.label());
            }
        }
    }

    fn start_measurement(&mut self, runtime: &tokio::runtime::Runtime) {
        if self.job.is_some() {
            self.status_message = "Busy, press 'c' to cancel".to_string();
            return;
        }

        let source = match self.provider.open(self.session.facing, MEASURE_VIEW) {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "Measurement view unavailable, measuring from the preview source");
                Arc::clone(&self.source)
            }
        };
        let meter = HeartRateMeter::from_config(&self.config);
        let clock = Arc::clone(&self.clock);
        let cancel = CancelFlag::new();
        let task_cancel = cancel.clone();
        let (progress_tx, progress) = mpsc::unbounded();
        let (result_tx, result) = oneshot::channel();

        runtime.spawn(async move {
            let measurement = meter
                .measure(source.as_ref(), clock.as_ref(), &task_cancel, |remaining| {
                    let _ = progress_tx.unbounded_send(remaining);
                })
                .await;
            let _ = result_tx.send(measurement);
        });

        let remaining = self.config.measurement_secs;
        self.status_message = format!("Measuring... {} s (keep still)", remaining);
        self.job = Some(Job::Measuring {
            cancel,
            remaining,
            progress,
            result,
        });
    }

    fn start_capture(&mut self, runtime: &tokio::runtime::Runtime) {
        if self.job.is_some() {
            self.status_message = "Busy, press 'c' to cancel".to_string();
            return;
        }

        let photo_booth = self.photo_booth.clone();
        let source = Arc::clone(&self.source);
        let session = self.session.clone();
        let recipe = session.recipe(&self.mapper);
        let cancel = CancelFlag::new();
        let task_cancel = cancel.clone();
        let (result_tx, result) = oneshot::channel();

        self.status_message = format!(
            "Exposing {} ({} frames)...",
            display_shutter_label(session.heart_rate.bpm),
            recipe.frame_count(self.photo_booth.orchestrator().frame_rate())
        );

        runtime.spawn(async move {
            let shot = photo_booth
                .shoot(source.as_ref(), &session, &recipe, &task_cancel)
                .await;
            let _ = result_tx.send(shot);
        });

        self.job = Some(Job::Capturing { cancel, result });
    }

    /// Returns true when a job was running
    fn cancel_job(&mut self) -> bool {
        match &self.job {
            Some(Job::Measuring { cancel, .. }) | Some(Job::Capturing { cancel, .. }) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Pick up progress and results from the running job
    fn poll_job(&mut self) {
        let Some(job) = self.job.as_mut() else {
            return;
        };

        match job {
            Job::Measuring {
                remaining,
                progress,
                result,
                ..
            } => {
                while let Ok(secs) = progress.try_recv() {
                    *remaining = secs;
                    self.status_message = format!("Measuring... {} s (keep still)", secs);
                }
                match result.try_recv() {
                    Ok(None) => {}
                    Ok(Some(outcome)) => {
                        match outcome {
                            Some(measurement) => {
                                self.session.apply_measurement(&measurement);
                                self.status_message = measurement_message(&measurement);
                                self.preview.invalidate();
                            }
                            None => self.status_message = "Measurement cancelled".to_string(),
                        }
                        self.job = None;
                    }
                    Err(_) => {
                        self.status_message = "Measurement stopped".to_string();
                        self.job = None;
                    }
                }
            }
            Job::Capturing { result, .. } => match result.try_recv() {
                Ok(None) => {}
                Ok(Some(shot)) => {
                    self.status_message = match shot {
                        Ok(Some(report)) => format!("Saved: {}", report.summary()),
                        Ok(None) => "No camera frame yet, try again".to_string(),
                        Err(PhotoError::Cancelled) => "Capture cancelled".to_string(),
                        Err(e) => {
                            error!(error = %e, "Failed to take photo");
                            format!("Error: {}", e)
                        }
                    };
                    self.job = None;
                }
                Err(_) => {
                    self.status_message = "Capture stopped".to_string();
                    self.job = None;
                }
            },
        }
    }

    fn info_line(&self) -> String {
        info_line(&self.session, self.source.name(), self.job.as_ref())
    }
}

fn source_size(source: &dyn FrameSource) -> Resolution {
    source
        .latest_frame()
        .map(|frame| frame.resolution())
        .filter(|size| !size.is_empty())
        .unwrap_or(MAIN_VIEW)
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    runtime: &tokio::runtime::Runtime,
    booth: &mut BoothState,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        booth.poll_job();
        booth.tick();

        // Draw
        terminal.draw(|f| {
            let area = f.area();

            // Reserve the bottom two lines for the info and status bars
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(2),
            };

            let frame_widget = FrameWidget {
                frame: booth.preview.surface(),
            };
            f.render_widget(&frame_widget, camera_area);

            let info = booth.info_line();
            let info_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(2),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &info,
                    background: Color::Blue,
                },
                info_area,
            );

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &booth.status_message,
                    background: Color::DarkGray,
                },
                status_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if event::poll(timing::DISPLAY_REFRESH)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(action) = action_for(key.code, key.modifiers)
        {
            let keep_running = booth.handle(action, runtime);
            if !keep_running {
                break;
            }
        }
    }

    Ok(())
}

fn info_line(session: &Session, source_name: &str, job: Option<&Job>) -> String {
    let heart = match session.heart_rate.source {
        HeartRateSource::Measured => format!("{} BPM", session.heart_rate.bpm),
        HeartRateSource::Default => format!("{} BPM (default)", session.heart_rate.bpm),
    };
    let activity = match job {
        Some(Job::Measuring { remaining, .. }) => format!(" | measuring {} s", remaining),
        Some(Job::Capturing { .. }) => " | exposing".to_string(),
        None => String::new(),
    };
    format!(
        "{} | {} | {} | {} camera: {}{}",
        session.aperture,
        heart,
        display_shutter_label(session.heart_rate.bpm),
        session.facing.label(),
        source_name,
        activity
    )
}

fn measurement_message(measurement: &Measurement) -> String {
    match measurement.raw_estimate {
        Some(raw) if raw != measurement.bpm => {
            format!("Heart rate: {} BPM (measured {})", measurement.bpm, raw)
        }
        Some(_) => format!("Heart rate: {} BPM", measurement.bpm),
        None => format!("No pulse found, using {} BPM", measurement.bpm),
    }
}

fn build_status_message() -> String {
    "'p' shutter | 'm' measure | '+/-' aperture | 's' switch camera | 'h' help | 'q' quit"
        .to_string()
}

fn build_help_message() -> String {
    String::from(
        "p/Space: Shutter | m: Measure | k: Skip measure | +/-: Aperture | s: Switch camera | c/Esc: Cancel | q/Ctrl+C: Quit",
    )
}

/// Widget that renders the preview surface using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a RgbaImage>,
}

impl Widget for &FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.filter(|f| f.width() > 0 && f.height() > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Calculate display dimensions maintaining aspect ratio
        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width() as f64 / frame.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width() as f64 / display_width as f64;
        let y_scale = frame.height() as f64 / (display_height * 2) as f64;

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(frame: &RgbaImage, x: u32, y: u32) -> Color {
    let x = x.min(frame.width() - 1);
    let y = y.min(frame.height() - 1);
    let [r, g, b, _] = frame.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
    background: Color,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(self.background);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(self.background),
        );
    }
}
