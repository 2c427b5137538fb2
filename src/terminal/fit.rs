//! Fit the emulator grid to its container.

use serde::{Deserialize, Serialize};

const MIN_COLS: u16 = 2;
const MIN_ROWS: u16 = 1;

/// Pixel size of one character cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellMetrics {
    pub width: f32,
    pub height: f32,
}

impl CellMetrics {
    /// Estimate for a monospace font of `font_size` px. Hosts that can
    /// measure the real glyph box should pass that instead.
    pub fn for_font_size(font_size: f32) -> Self {
        Self {
            width: font_size * 0.6,
            height: font_size * 1.2,
        }
    }
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self::for_font_size(14.0)
    }
}

/// Grid size in character cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Geometry {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(MIN_COLS),
            rows: rows.max(MIN_ROWS),
        }
    }

    /// How many whole cells fit in a `width` x `height` px container.
    pub fn fit(width: f32, height: f32, cell: CellMetrics) -> Self {
        let cols = cells_along(width, cell.width);
        let rows = cells_along(height, cell.height);
        Self::new(cols, rows)
    }
}

fn cells_along(length: f32, cell: f32) -> u16 {
    if !(length.is_finite() && cell.is_finite()) || length <= 0.0 || cell <= 0.0 {
        return 0;
    }
    (length / cell).floor().min(u16::MAX as f32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_floors_to_whole_cells() {
        let cell = CellMetrics { width: 10.0, height: 20.0 };
        assert_eq!(Geometry::fit(805.0, 419.0, cell), Geometry { cols: 80, rows: 20 });
    }

    #[test]
    fn test_fit_clamps_to_minimum() {
        let cell = CellMetrics::default();
        assert_eq!(Geometry::fit(0.0, 0.0, cell), Geometry { cols: 2, rows: 1 });
        assert_eq!(Geometry::fit(-5.0, f32::NAN, cell), Geometry { cols: 2, rows: 1 });
    }

    #[test]
    fn test_font_size_metrics() {
        let cell = CellMetrics::for_font_size(10.0);
        assert_eq!(Geometry::fit(603.0, 245.0, cell), Geometry { cols: 100, rows: 20 });
    }
}
