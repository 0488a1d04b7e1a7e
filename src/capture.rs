//! Background capture thread.
//!
//! The worker owns the camera, the effect pipeline and the recorder. The UI
//! talks to it through [`Command`]s and reads back the newest processed frame
//! and a [`Status`] snapshot.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbImage;
use stylecam_vision::{Camera, Effects, FramePipeline, MaskMode};

use crate::recorder::{RecordSettings, Recorder};
use crate::snapshot;

/// Consecutive capture failures before the worker gives up on the camera.
const MAX_CAPTURE_FAILURES: u32 = 30;

pub trait FrameSource {
    fn frame(&mut self) -> Result<RgbImage>;
}

impl FrameSource for Camera {
    fn frame(&mut self) -> Result<RgbImage> {
        Camera::frame(self)
    }
}

pub trait FrameProcessor: Send {
    fn process(&mut self, frame: &RgbImage, effects: &Effects) -> Result<RgbImage>;
    fn change_style(&mut self, index: usize) -> Result<()>;
    /// Index and name of the selected style.
    fn style(&self) -> (usize, String);
}

impl FrameProcessor for FramePipeline {
    fn process(&mut self, frame: &RgbImage, effects: &Effects) -> Result<RgbImage> {
        FramePipeline::process(self, frame, effects)
    }

    fn change_style(&mut self, index: usize) -> Result<()> {
        Ok(self.style.change_style(index)?)
    }

    fn style(&self) -> (usize, String) {
        (self.style.current(), self.style.name().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SelectStyle(usize),
    EnableStyle,
    DisableStyle,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    /// Zoom centre picked on the displayed frame.
    Focus { x: u32, y: u32 },
    ToggleMask,
    ToggleMirror,
    Snapshot,
    ToggleRecording,
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub running: bool,
    pub recording: bool,
    pub stylize: bool,
    pub style: usize,
    pub style_name: String,
    pub mask_mode: MaskMode,
    pub frames: u64,
    pub last_snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub snapshot_dir: PathBuf,
    pub user_tag: String,
    pub record: RecordSettings,
    pub effects: Effects,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CaptureWorker {
    commands: Sender<Command>,
    frame: Arc<Mutex<Option<RgbImage>>>,
    status: Arc<Mutex<Status>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Start the worker. `open` runs on the worker thread; its error is
    /// returned here.
    pub fn spawn<S, F, P>(open: F, processor: P, settings: WorkerSettings) -> Result<Self>
    where
        S: FrameSource + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
        P: FrameProcessor + 'static,
    {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let frame = Arc::new(Mutex::new(None));
        let (style, style_name) = processor.style();
        let status = Arc::new(Mutex::new(Status {
            running: true,
            style,
            style_name,
            stylize: settings.effects.stylize,
            mask_mode: settings.effects.mask_mode,
            ..Status::default()
        }));

        let shared_frame = Arc::clone(&frame);
        let shared_status = Arc::clone(&status);
        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let source = match open() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let mut worker = Worker {
                    source,
                    processor,
                    settings,
                    commands: rx,
                    frame: shared_frame,
                    status: Arc::clone(&shared_status),
                    recorder: None,
                    want_recording: false,
                    want_snapshot: false,
                    last_size: None,
                };
                worker.run();
                lock(&shared_status).running = false;
            })
            .context("spawning capture thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e.context("opening frame source"));
            }
            Err(_) => {
                let _ = handle.join();
                anyhow::bail!("capture thread exited during startup");
            }
        }

        Ok(Self {
            commands,
            frame,
            status,
            handle: Some(handle),
        })
    }

    pub fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            log::debug!("capture worker gone, dropped {:?}", cmd);
        }
    }

    /// Newest processed frame since the last call, if any.
    pub fn take_frame(&self) -> Option<RgbImage> {
        lock(&self.frame).take()
    }

    pub fn status(&self) -> Status {
        lock(&self.status).clone()
    }

    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.send(Command::Shutdown);
            if handle.join().is_err() {
                log::error!("capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<S, P> {
    source: S,
    processor: P,
    settings: WorkerSettings,
    commands: Receiver<Command>,
    frame: Arc<Mutex<Option<RgbImage>>>,
    status: Arc<Mutex<Status>>,
    recorder: Option<Recorder>,
    want_recording: bool,
    want_snapshot: bool,
    last_size: Option<(u32, u32)>,
}

impl<S: FrameSource, P: FrameProcessor> Worker<S, P> {
    fn run(&mut self) {
        let mut failures = 0u32;
        loop {
            if !self.drain_commands() {
                break;
            }

            let raw = match self.source.frame() {
                Ok(frame) => {
                    failures = 0;
                    frame
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("capture failed ({}/{}): {:#}", failures, MAX_CAPTURE_FAILURES, e);
                    if failures >= MAX_CAPTURE_FAILURES {
                        log::error!("camera stopped delivering frames");
                        break;
                    }
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };
            self.last_size = Some(raw.dimensions());

            if self.want_snapshot {
                self.want_snapshot = false;
                match snapshot::save_snapshot(
                    &self.settings.snapshot_dir,
                    &raw,
                    &self.settings.user_tag,
                ) {
                    Ok(path) => lock(&self.status).last_snapshot = Some(path),
                    Err(e) => log::error!("snapshot failed: {:#}", e),
                }
            }

            self.record(&raw);

            let shown = match self.processor.process(&raw, &self.settings.effects) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("frame processing failed: {:#}", e);
                    raw
                }
            };
            *lock(&self.frame) = Some(shown);
            lock(&self.status).frames += 1;
        }
        self.stop_recording();
    }

    /// Apply queued commands. Returns false when the worker should stop.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                Ok(cmd) => self.apply(cmd),
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    fn apply(&mut self, cmd: Command) {
        let effects = &mut self.settings.effects;
        match cmd {
            Command::SelectStyle(i) => match self.processor.change_style(i) {
                Ok(()) => {
                    effects.stylize = true;
                    let (style, name) = self.processor.style();
                    let mut status = lock(&self.status);
                    status.style = style;
                    status.style_name = name;
                }
                Err(e) => log::warn!("cannot select style {}: {:#}", i, e),
            },
            Command::EnableStyle => effects.stylize = true,
            Command::DisableStyle => effects.stylize = false,
            Command::ZoomIn => effects.zoom.zoom_in(),
            Command::ZoomOut => effects.zoom.zoom_out(),
            Command::ZoomReset => effects.zoom.reset(),
            Command::Focus { x, y } => {
                if let Some((w, h)) = self.last_size {
                    effects.zoom.focus(x, y, w, h);
                    effects.zoom.zoom_in();
                }
            }
            Command::ToggleMask => effects.mask_mode = effects.mask_mode.toggle(),
            Command::ToggleMirror => effects.mirror = !effects.mirror,
            Command::Snapshot => self.want_snapshot = true,
            Command::ToggleRecording => self.want_recording = !self.want_recording,
            Command::Shutdown => {}
        }
        let mut status = lock(&self.status);
        status.stylize = self.settings.effects.stylize;
        status.mask_mode = self.settings.effects.mask_mode;
    }

    fn record(&mut self, raw: &RgbImage) {
        if !self.want_recording {
            self.stop_recording();
            return;
        }
        let now = Instant::now();
        if self.recorder.is_none() {
            match Recorder::start(self.settings.record.clone(), raw.dimensions(), now) {
                Ok(rec) => {
                    self.recorder = Some(rec);
                    lock(&self.status).recording = true;
                }
                Err(e) => {
                    log::error!("cannot start recording: {:#}", e);
                    self.want_recording = false;
                    return;
                }
            }
        }
        if let Some(rec) = self.recorder.as_mut() {
            if let Err(e) = rec.push(raw, now) {
                log::error!("recording failed: {:#}", e);
                self.want_recording = false;
                self.stop_recording();
            }
        }
    }

    fn stop_recording(&mut self) {
        if let Some(rec) = self.recorder.take() {
            if let Err(e) = rec.stop() {
                log::error!("closing recording: {:#}", e);
            }
        }
        lock(&self.status).recording = false;
    }
}
