use crate::types::CellCoord;

/// Symbol of a solid wall cell.
pub const WALL: u8 = b'#';

/// Errors raised when building a grid from raw map data.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    Empty { width: i32, height: i32 },
    #[error("grid data has {len} cells but {width}x{height} needs {expected}")]
    DimensionMismatch {
        width: i32,
        height: i32,
        len: usize,
        expected: usize,
    },
    #[error("row {row} has {len} cells, expected {width}")]
    RaggedRow { row: usize, len: usize, width: usize },
}

/// The level map: a flat row-major array of cell symbols.
///
/// Immutable after load. Reads outside the map return [`WALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<u8>,
}

impl Grid {
    pub const WALL: u8 = WALL;

    /// Build a grid from `width * height` symbols.
    pub fn new(width: i32, height: i32, cells: Vec<u8>) -> Result<Self, GridError> {
        if width <= 0 || height <= 0 {
            return Err(GridError::Empty { width, height });
        }
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(GridError::DimensionMismatch {
                width,
                height,
                len: cells.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Build a grid from equal-length text rows.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut cells = Vec::with_capacity(width * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let bytes = line.as_ref().as_bytes();
            if bytes.len() != width {
                return Err(GridError::RaggedRow {
                    row,
                    len: bytes.len(),
                    width,
                });
            }
            cells.extend_from_slice(bytes);
        }
        Self::new(width as i32, rows.len() as i32, cells)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Flat index of `(x, y)`, or `None` outside the map.
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| (y * self.width + x) as usize)
    }

    /// Symbol at `(x, y)`; [`WALL`] when out of bounds.
    pub fn get(&self, x: i32, y: i32) -> u8 {
        self.index(x, y).map_or(WALL, |i| self.cells[i])
    }

    pub fn at(&self, c: CellCoord) -> u8 {
        self.get(c.x, c.y)
    }

    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == WALL
    }

    /// All cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, u8)> + '_ {
        let w = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &s)| (CellCoord::new(i as i32 % w, i as i32 / w), s))
    }

    /// Row-major positions of every cell holding `symbol`.
    pub fn find_all(&self, symbol: u8) -> Vec<CellCoord> {
        self.iter()
            .filter(|&(_, s)| s == symbol)
            .map(|(c, _)| c)
            .collect()
    }

    /// Render the grid back to text rows.
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width as usize)
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect()
    }
}
