use crate::error::{MontageError, MontageResult};

/// 畫布單邊上限（JPEG 與 GIF 的尺寸欄位都是 16 位元）
pub const MAX_CANVAS_DIMENSION: u32 = u16::MAX as u32;

/// 網格規格（縮圖高度已確定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub columns: u32,
    pub rows: u32,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub padding: u32,
    pub margin: u32,
    pub header_height: u32,
}

/// 單一格子在畫布上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// 畫布尺寸與所有格子位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasGeometry {
    pub spec: GridSpec,
    pub width: u32,
    pub height: u32,
    /// 依列優先排列，索引為 `row * columns + col`
    pub cells: Vec<CellRect>,
}

impl CanvasGeometry {
    #[must_use]
    pub fn cell(&self, row: u32, col: u32) -> Option<&CellRect> {
        if row >= self.spec.rows || col >= self.spec.columns {
            return None;
        }
        self.cells.get((row * self.spec.columns + col) as usize)
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// 格子區域的第一列（標題區下方加上外邊距）
    #[must_use]
    pub const fn grid_top(&self) -> u32 {
        self.spec.header_height + self.spec.margin
    }
}

impl GridSpec {
    pub fn new(
        columns: u32,
        rows: u32,
        thumb_width: u32,
        thumb_height: u32,
        padding: u32,
        margin: u32,
        header_height: u32,
    ) -> MontageResult<Self> {
        if columns == 0 || rows == 0 {
            return Err(MontageError::Config(format!(
                "網格至少需要 1x1，目前為 {columns}x{rows}"
            )));
        }
        if thumb_width == 0 || thumb_height == 0 {
            return Err(MontageError::Config(format!(
                "縮圖尺寸無效: {thumb_width}x{thumb_height}"
            )));
        }

        let width = canvas_extent(0, margin, columns, thumb_width, padding);
        let height = canvas_extent(header_height, margin, rows, thumb_height, padding);
        match (width, height) {
            (Some(w), Some(h)) if w <= MAX_CANVAS_DIMENSION && h <= MAX_CANVAS_DIMENSION => {}
            _ => {
                return Err(MontageError::Config(format!(
                    "畫布過大（{columns}x{rows} 格、縮圖 {thumb_width}x{thumb_height}），\
                     單邊上限為 {MAX_CANVAS_DIMENSION}"
                )));
            }
        }

        Ok(Self {
            columns,
            rows,
            thumb_width,
            thumb_height,
            padding,
            margin,
            header_height,
        })
    }

    #[must_use]
    pub const fn canvas_width(&self) -> u32 {
        2 * self.margin + self.columns * self.thumb_width + (self.columns - 1) * self.padding
    }

    #[must_use]
    pub const fn canvas_height(&self) -> u32 {
        self.header_height
            + 2 * self.margin
            + self.rows * self.thumb_height
            + (self.rows - 1) * self.padding
    }

    /// 格子 (row, col) 的左上角座標
    #[must_use]
    pub const fn origin(&self, row: u32, col: u32) -> (u32, u32) {
        (
            self.margin + col * (self.thumb_width + self.padding),
            self.header_height + self.margin + row * (self.thumb_height + self.padding),
        )
    }

    #[must_use]
    pub fn geometry(&self) -> CanvasGeometry {
        let cells = (0..self.rows)
            .flat_map(|row| (0..self.columns).map(move |col| (row, col)))
            .map(|(row, col)| {
                let (x, y) = self.origin(row, col);
                CellRect {
                    row,
                    col,
                    x,
                    y,
                    width: self.thumb_width,
                    height: self.thumb_height,
                }
            })
            .collect();

        CanvasGeometry {
            spec: *self,
            width: self.canvas_width(),
            height: self.canvas_height(),
            cells,
        }
    }
}

/// `lead + 2*margin + count*cell + (count-1)*padding`，溢位時回傳 `None`
fn canvas_extent(lead: u32, margin: u32, count: u32, cell: u32, padding: u32) -> Option<u32> {
    let cells = count.checked_mul(cell)?;
    let gaps = (count - 1).checked_mul(padding)?;
    margin
        .checked_mul(2)?
        .checked_add(lead)?
        .checked_add(cells)?
        .checked_add(gaps)
}

/// 計算縮圖高度，-1（或任何非正值）代表依影片比例計算
pub fn resolve_thumb_height(
    thumb_width: u32,
    thumb_height: i32,
    source_width: u32,
    source_height: u32,
) -> MontageResult<u32> {
    if thumb_height > 0 {
        return Ok(thumb_height as u32);
    }
    if source_width == 0 || source_height == 0 {
        return Err(MontageError::Input(format!(
            "影片尺寸無效（{source_width}x{source_height}），無法自動計算縮圖高度"
        )));
    }

    let height = u64::from(thumb_width) * u64::from(source_height) / u64::from(source_width);
    Ok(u32::try_from(height).unwrap_or(u32::MAX).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(columns: u32, rows: u32) -> GridSpec {
        GridSpec::new(columns, rows, 320, 180, 5, 20, 120).unwrap()
    }

    #[test]
    fn test_canvas_size_formula() {
        for (columns, rows) in [(1, 1), (2, 2), (4, 5), (9, 6)] {
            let s = spec(columns, rows);
            let g = s.geometry();
            assert_eq!(g.width, 2 * 20 + columns * 320 + (columns - 1) * 5);
            assert_eq!(g.height, 120 + 2 * 20 + rows * 180 + (rows - 1) * 5);
            assert_eq!(g.cell_count(), (columns * rows) as usize);
        }
    }

    #[test]
    fn test_cell_origins() {
        let g = spec(3, 2).geometry();
        assert_eq!(g.cell(0, 0).map(|c| (c.x, c.y)), Some((20, 140)));
        assert_eq!(g.cell(0, 2).map(|c| (c.x, c.y)), Some((20 + 2 * 325, 140)));
        assert_eq!(g.cell(1, 1).map(|c| (c.x, c.y)), Some((20 + 325, 140 + 185)));
        assert!(g.cell(2, 0).is_none());
        assert!(g.cell(0, 3).is_none());
    }

    #[test]
    fn test_cells_are_disjoint_and_inside_canvas() {
        let g = spec(4, 5).geometry();
        for (i, a) in g.cells.iter().enumerate() {
            assert!(a.right() <= g.width - g.spec.margin);
            assert!(a.bottom() <= g.height - g.spec.margin);
            assert!(a.y >= g.spec.header_height);
            for b in &g.cells[i + 1..] {
                let overlap = a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom();
                assert!(!overlap, "{a:?} 與 {b:?} 重疊");
            }
        }
    }

    #[test]
    fn test_geometry_is_deterministic() {
        assert_eq!(spec(4, 5).geometry(), spec(4, 5).geometry());
    }

    #[test]
    fn test_zero_padding_and_margin() {
        let s = GridSpec::new(2, 2, 10, 10, 0, 0, 0).unwrap();
        let g = s.geometry();
        assert_eq!((g.width, g.height), (20, 20));
        assert_eq!(g.cell(1, 1).map(|c| (c.x, c.y)), Some((10, 10)));
    }

    #[test]
    fn test_invalid_grid() {
        assert!(GridSpec::new(0, 2, 10, 10, 0, 0, 0).is_err());
        assert!(GridSpec::new(2, 2, 10, 0, 0, 0, 0).is_err());
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        // 70000 * 70000 超出 u32，不可 panic
        assert!(matches!(
            GridSpec::new(70_000, 1, 70_000, 10, 0, 0, 0),
            Err(MontageError::Config(_))
        ));
        assert!(matches!(
            GridSpec::new(1, 1, 10, 10, 0, u32::MAX, 0),
            Err(MontageError::Config(_))
        ));
        // 超過單邊上限但未溢位
        assert!(GridSpec::new(10, 1, 7000, 10, 0, 0, 0).is_err());
        assert!(GridSpec::new(1, 1, 10, 10, 0, 0, u32::MAX - 5).is_err());
    }

    #[test]
    fn test_canvas_at_dimension_limit() {
        let s = GridSpec::new(1, 1, MAX_CANVAS_DIMENSION, 10, 0, 0, 0).unwrap();
        assert_eq!(s.geometry().width, MAX_CANVAS_DIMENSION);
        assert!(GridSpec::new(1, 1, MAX_CANVAS_DIMENSION - 1, 10, 0, 1, 0).is_err());
    }

    #[test]
    fn test_resolve_thumb_height() {
        assert_eq!(resolve_thumb_height(640, -1, 1920, 1080).unwrap(), 360);
        assert_eq!(resolve_thumb_height(640, 200, 1920, 1080).unwrap(), 200);
        // 截斷小數
        assert_eq!(resolve_thumb_height(100, -1, 3, 2).unwrap(), 66);
        assert_eq!(resolve_thumb_height(1, -1, 1000, 1).unwrap(), 1);
        assert!(resolve_thumb_height(640, -1, 0, 1080).is_err());
    }
}
