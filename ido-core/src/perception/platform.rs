//! Capture-feature backends: xcap for monitors, frames, and windows; rdev
//! for global keyboard/mouse hooks.
//!
//! rdev's listener occupies a thread for the process lifetime and has no
//! unhook call; `stop` flips an atomic so a stopped driver goes quiet
//! instead of tearing the hook down.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use ido_model::{
    Bounds, KeyAction, KeyboardRecord, MonitorInfo, MouseAction, MouseButton,
    MouseRecord, RawRecord, WindowInfo,
};
use tracing::{debug, warn};

use crate::error::{IdoError, Result};

use super::screenshot::ScreenCaptureBackend;
use super::tracker::ActiveMonitorTracker;
use super::window::{ActiveWindowProvider, enrich_with_monitor};
use super::{LockSink, PerceptionDriver, RecordSink};

fn xcap_monitors() -> Result<Vec<xcap::Monitor>> {
    xcap::Monitor::all()
        .map_err(|e| IdoError::Internal(format!("monitor enumeration: {e}")))
}

fn monitor_info(index: usize, monitor: &xcap::Monitor) -> MonitorInfo {
    MonitorInfo {
        index,
        name: monitor.name().ok(),
        bounds: Bounds {
            x: monitor.x().unwrap_or(0),
            y: monitor.y().unwrap_or(0),
            width: monitor.width().unwrap_or(0),
            height: monitor.height().unwrap_or(0),
        },
        is_primary: monitor.is_primary().unwrap_or(false),
    }
}

/// Monitor enumeration + frame capture through xcap. Frames are encoded as
/// PNG; downstream compression re-encodes to JPEG anyway.
#[derive(Debug, Default)]
pub struct XcapBackend;

impl XcapBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenCaptureBackend for XcapBackend {
    fn monitors(&self) -> Result<Vec<MonitorInfo>> {
        Ok(xcap_monitors()?
            .iter()
            .enumerate()
            .map(|(i, m)| monitor_info(i + 1, m))
            .collect())
    }

    fn capture_monitor(&self, index: usize) -> Result<Vec<u8>> {
        let monitors = xcap_monitors()?;
        let monitor = monitors.get(index.saturating_sub(1)).ok_or_else(|| {
            IdoError::NotFound(format!("monitor index {index}"))
        })?;
        let frame = monitor.capture_image().map_err(|e| {
            IdoError::Internal(format!("monitor capture: {e}"))
        })?;

        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(frame)
            .write_to(&mut buffer, image::ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

/// Focused-window snapshots through xcap's window list.
pub struct XcapWindowProvider {
    tracker: Arc<ActiveMonitorTracker>,
}

impl XcapWindowProvider {
    pub fn new(tracker: Arc<ActiveMonitorTracker>) -> Self {
        Self { tracker }
    }
}

impl ActiveWindowProvider for XcapWindowProvider {
    fn snapshot(&self) -> Result<WindowInfo> {
        let windows = xcap::Window::all().map_err(|e| {
            IdoError::Internal(format!("window enumeration: {e}"))
        })?;

        let focused = windows
            .iter()
            .find(|w| w.is_focused().unwrap_or(false))
            .or_else(|| {
                windows.iter().find(|w| !w.is_minimized().unwrap_or(true))
            })
            .ok_or_else(|| {
                IdoError::NotFound("no focused window".to_string())
            })?;

        let window = WindowInfo {
            app_name: focused.app_name().unwrap_or_default(),
            app_bundle_id: None,
            app_process_id: focused.pid().unwrap_or(0),
            window_title: focused.title().unwrap_or_default(),
            window_id: focused.id().unwrap_or(0) as u64,
            window_bounds: Some(Bounds {
                x: focused.x().unwrap_or(0),
                y: focused.y().unwrap_or(0),
                width: focused.width().unwrap_or(0),
                height: focused.height().unwrap_or(0),
            }),
            monitor_index: None,
            monitor_relative_bounds: None,
            monitor: None,
        };

        Ok(enrich_with_monitor(window, &self.tracker.monitors()))
    }
}

fn key_name(key: rdev::Key) -> String {
    format!("{key:?}").to_lowercase()
}

fn button_of(button: rdev::Button) -> MouseButton {
    match button {
        rdev::Button::Left => MouseButton::Left,
        rdev::Button::Right => MouseButton::Right,
        rdev::Button::Middle => MouseButton::Middle,
        rdev::Button::Unknown(_) => MouseButton::Other,
    }
}

/// Global keyboard + mouse hook. One rdev listener serves both domains;
/// mouse moves only feed the active-monitor tracker.
pub struct InputHookDriver {
    sink: RecordSink,
    tracker: Arc<ActiveMonitorTracker>,
    active: Arc<AtomicBool>,
    started: bool,
}

impl InputHookDriver {
    pub fn new(sink: RecordSink, tracker: Arc<ActiveMonitorTracker>) -> Self {
        Self {
            sink,
            tracker,
            active: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }
}

impl PerceptionDriver for InputHookDriver {
    fn name(&self) -> &'static str {
        "input-hook"
    }

    fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.active.store(true, Ordering::SeqCst);

        let sink = Arc::clone(&self.sink);
        let tracker = Arc::clone(&self.tracker);
        let active = Arc::clone(&self.active);

        std::thread::Builder::new()
            .name("ido-input-hook".to_string())
            .spawn(move || {
                let mut last_position = (0i32, 0i32);
                let result = rdev::listen(move |event| {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    let timestamp = Utc::now();
                    match event.event_type {
                        rdev::EventType::KeyPress(key) => {
                            sink(RawRecord::Keyboard(KeyboardRecord {
                                timestamp,
                                key: key_name(key),
                                key_type: "key".to_string(),
                                action: KeyAction::Press,
                                modifiers: Vec::new(),
                            }));
                        }
                        rdev::EventType::KeyRelease(key) => {
                            sink(RawRecord::Keyboard(KeyboardRecord {
                                timestamp,
                                key: key_name(key),
                                key_type: "key".to_string(),
                                action: KeyAction::Release,
                                modifiers: Vec::new(),
                            }));
                        }
                        rdev::EventType::ButtonPress(button) => {
                            sink(RawRecord::Mouse(MouseRecord {
                                timestamp,
                                action: MouseAction::Press,
                                button: Some(button_of(button)),
                                position: last_position,
                                dx: None,
                                dy: None,
                            }));
                        }
                        rdev::EventType::ButtonRelease(button) => {
                            sink(RawRecord::Mouse(MouseRecord {
                                timestamp,
                                action: MouseAction::Release,
                                button: Some(button_of(button)),
                                position: last_position,
                                dx: None,
                                dy: None,
                            }));
                        }
                        rdev::EventType::MouseMove { x, y } => {
                            last_position = (x as i32, y as i32);
                            tracker
                                .update_from_mouse(x as i32, y as i32);
                        }
                        rdev::EventType::Wheel { delta_x, delta_y } => {
                            sink(RawRecord::Mouse(MouseRecord {
                                timestamp,
                                action: MouseAction::Scroll,
                                button: None,
                                position: last_position,
                                dx: Some(delta_x as f64),
                                dy: Some(delta_y as f64),
                            }));
                        }
                    }
                });
                if let Err(e) = result {
                    warn!("input hook listener exited: {e:?}");
                }
            })
            .map_err(IdoError::Io)?;

        debug!("input hook started");
        Ok(())
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Screen lock/unlock driver. No portable hook exists for every desktop
/// environment; platforms without one get a quiet driver and the
/// coordinator's pause/resume stays host-driven.
pub struct ScreenLockDriver {
    _lock_sink: LockSink,
    running: bool,
}

impl ScreenLockDriver {
    pub fn new(lock_sink: LockSink) -> Self {
        Self {
            _lock_sink: lock_sink,
            running: false,
        }
    }
}

impl PerceptionDriver for ScreenLockDriver {
    fn name(&self) -> &'static str {
        "screen-lock"
    }

    fn start(&mut self) -> Result<()> {
        self.running = true;
        warn!(
            platform = std::env::consts::OS,
            "screen-lock hook not available; pause/resume stays manual"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }
}
