//! Active-monitor tracking from mouse movement.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use ido_model::MonitorInfo;
use tracing::debug;

#[derive(Debug)]
struct TrackerState {
    monitors: Vec<MonitorInfo>,
    current_index: usize,
    last_activity: Instant,
    last_position: Option<(i32, i32)>,
}

/// Holds the monitor list and the last mouse position. The screenshot
/// capturer asks it which monitor to shoot; after the inactivity timeout
/// it captures all of them.
#[derive(Debug)]
pub struct ActiveMonitorTracker {
    state: Mutex<TrackerState>,
    inactive_timeout: Duration,
}

impl ActiveMonitorTracker {
    pub fn new(inactive_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                monitors: Vec::new(),
                current_index: 1,
                last_activity: Instant::now(),
                last_position: None,
            }),
            inactive_timeout,
        }
    }

    pub fn update_monitors(&self, monitors: Vec<MonitorInfo>) {
        let mut state = self.state.lock().expect("tracker lock");
        debug!(count = monitors.len(), "monitor list updated");
        state.monitors = monitors;
    }

    pub fn monitors(&self) -> Vec<MonitorInfo> {
        self.state.lock().expect("tracker lock").monitors.clone()
    }

    /// Feed a mouse position (absolute desktop coordinates).
    pub fn update_from_mouse(&self, x: i32, y: i32) {
        let mut state = self.state.lock().expect("tracker lock");

        let new_index = state
            .monitors
            .iter()
            .find(|m| m.bounds.contains(x, y))
            .map(|m| m.index)
            .unwrap_or_else(|| primary_index(&state.monitors));

        if new_index != state.current_index {
            debug!(
                from = state.current_index,
                to = new_index,
                "active monitor changed"
            );
            state.current_index = new_index;
        }

        state.last_activity = Instant::now();
        state.last_position = Some((x, y));
    }

    /// Monitor containing the last mouse position (1-based), defaulting to
    /// the primary.
    pub fn get_active_index(&self) -> usize {
        self.state.lock().expect("tracker lock").current_index
    }

    /// True when the mouse has been idle longer than the timeout.
    pub fn should_capture_all(&self) -> bool {
        let state = self.state.lock().expect("tracker lock");
        state.last_activity.elapsed() >= self.inactive_timeout
    }

    pub fn last_position(&self) -> Option<(i32, i32)> {
        self.state.lock().expect("tracker lock").last_position
    }
}

fn primary_index(monitors: &[MonitorInfo]) -> usize {
    monitors
        .iter()
        .find(|m| m.is_primary)
        .map(|m| m.index)
        .unwrap_or(1)
}
