//! Active-window and monitor descriptions produced by the perception layer.

use serde::{Deserialize, Serialize};

/// A rectangle in desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Area of the intersection with `other`, in pixels.
    pub fn overlap_area(&self, other: &Bounds) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width as i32).min(other.x + other.width as i32);
        let bottom =
            (self.y + self.height as i32).min(other.y + other.height as i32);
        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) as u64 * (bottom - top) as u64
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// One physical monitor as reported by the capture backend. Indexes are
/// 1-based; the primary monitor is the fallback for unknown positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInfo {
    pub index: usize,
    pub name: Option<String>,
    pub bounds: Bounds,
    pub is_primary: bool,
}

/// Snapshot of the currently focused window. `monitor_index` and
/// `monitor_relative_bounds` are enriched by finding the monitor of maximum
/// overlap with the window bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub app_name: String,
    pub app_bundle_id: Option<String>,
    pub app_process_id: u32,
    pub window_title: String,
    pub window_id: u64,
    pub window_bounds: Option<Bounds>,
    pub monitor_index: Option<usize>,
    pub monitor_relative_bounds: Option<Bounds>,
    pub monitor: Option<MonitorInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_area_disjoint_is_zero() {
        let a = Bounds { x: 0, y: 0, width: 100, height: 100 };
        let b = Bounds { x: 200, y: 200, width: 50, height: 50 };
        assert_eq!(a.overlap_area(&b), 0);
    }

    #[test]
    fn overlap_area_partial() {
        let a = Bounds { x: 0, y: 0, width: 100, height: 100 };
        let b = Bounds { x: 50, y: 50, width: 100, height: 100 };
        assert_eq!(a.overlap_area(&b), 50 * 50);
        assert_eq!(b.overlap_area(&a), 50 * 50);
    }
}
