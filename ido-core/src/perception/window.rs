//! Active-window snapshots and monitor-relative enrichment.

use ido_model::{Bounds, MonitorInfo, WindowInfo};

use crate::error::Result;

/// On-request provider of the currently focused window.
pub trait ActiveWindowProvider: Send + Sync {
    fn snapshot(&self) -> Result<WindowInfo>;
}

/// Fills `monitor_index`, `monitor_relative_bounds`, and `monitor` by
/// finding the monitor with maximum overlap against the window bounds.
pub fn enrich_with_monitor(
    mut window: WindowInfo,
    monitors: &[MonitorInfo],
) -> WindowInfo {
    let Some(bounds) = window.window_bounds else {
        return window;
    };

    let best = monitors
        .iter()
        .map(|monitor| (monitor, bounds.overlap_area(&monitor.bounds)))
        .max_by_key(|(_, area)| *area)
        .filter(|(_, area)| *area > 0)
        .map(|(monitor, _)| monitor);

    if let Some(monitor) = best {
        window.monitor_index = Some(monitor.index);
        window.monitor_relative_bounds = Some(Bounds {
            x: bounds.x - monitor.bounds.x,
            y: bounds.y - monitor.bounds.y,
            width: bounds.width,
            height: bounds.height,
        });
        window.monitor = Some(monitor.clone());
    }

    window
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_at(x: i32, y: i32) -> WindowInfo {
        WindowInfo {
            app_name: "editor".into(),
            app_bundle_id: None,
            app_process_id: 42,
            window_title: "main.rs".into(),
            window_id: 7,
            window_bounds: Some(Bounds { x, y, width: 800, height: 600 }),
            monitor_index: None,
            monitor_relative_bounds: None,
            monitor: None,
        }
    }

    fn monitors() -> Vec<MonitorInfo> {
        vec![
            MonitorInfo {
                index: 1,
                name: None,
                bounds: Bounds { x: 0, y: 0, width: 1920, height: 1080 },
                is_primary: true,
            },
            MonitorInfo {
                index: 2,
                name: None,
                bounds: Bounds { x: 1920, y: 0, width: 1920, height: 1080 },
                is_primary: false,
            },
        ]
    }

    #[test]
    fn picks_monitor_with_max_overlap() {
        // Straddles the boundary but sits mostly on the second monitor.
        let enriched = enrich_with_monitor(window_at(1600, 100), &monitors());
        assert_eq!(enriched.monitor_index, Some(2));
        let relative = enriched.monitor_relative_bounds.unwrap();
        assert_eq!(relative.x, 1600 - 1920);
        assert_eq!(relative.y, 100);
    }

    #[test]
    fn fully_contained_window_is_relative_to_its_monitor() {
        let enriched = enrich_with_monitor(window_at(100, 100), &monitors());
        assert_eq!(enriched.monitor_index, Some(1));
        assert_eq!(
            enriched.monitor_relative_bounds.unwrap(),
            Bounds { x: 100, y: 100, width: 800, height: 600 }
        );
    }

    #[test]
    fn offscreen_window_is_left_unenriched() {
        let enriched =
            enrich_with_monitor(window_at(-10_000, -10_000), &monitors());
        assert_eq!(enriched.monitor_index, None);
    }
}
