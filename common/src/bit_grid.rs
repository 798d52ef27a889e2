use crate::grid::{Grid, MAX_DIMS};

const BITS_PER_WORD: usize = 64;

/// Packed binary mask with up to three axes.
///
/// Every row (fixed y and z) starts on a word boundary so that row scans can
/// work on whole `u64` words. Padding bits past the row width are always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitGrid {
    words: Vec<u64>,
    dims: [usize; MAX_DIMS],
    ndim: usize,
    words_per_row: usize,
}

impl BitGrid {
    /// Creates a mask with all bits cleared.
    pub fn new(dims: &[usize]) -> Self {
        assert!(
            (1..=MAX_DIMS).contains(&dims.len()),
            "mask must have 1 to {MAX_DIMS} dimensions"
        );
        let mut full = [1; MAX_DIMS];
        full[..dims.len()].copy_from_slice(dims);
        let words_per_row = full[0].div_ceil(BITS_PER_WORD);
        Self {
            words: vec![0; words_per_row * full[1] * full[2]],
            dims: full,
            ndim: dims.len(),
            words_per_row,
        }
    }

    /// Mask with the same geometry as `grid`, set where `predicate` holds.
    pub fn from_grid<T>(grid: &Grid<T>, predicate: impl Fn(&T) -> bool) -> Self {
        let mut mask = Self::new(&grid.dims()[..grid.ndim()]);
        let [w, h, d] = grid.dims();
        for z in 0..d {
            for y in 0..h {
                let row_start = mask.row_start(y, z);
                for x in 0..w {
                    if predicate(grid.get(x, y, z)) {
                        mask.words[row_start + x / BITS_PER_WORD] |= 1u64 << (x % BITS_PER_WORD);
                    }
                }
            }
        }
        mask
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    #[inline]
    pub fn dims(&self) -> [usize; MAX_DIMS] {
        self.dims
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.dims[1]
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.dims[2]
    }

    #[inline]
    pub fn words_per_row(&self) -> usize {
        self.words_per_row
    }

    /// Number of rows across all planes.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.dims[1] * self.dims[2]
    }

    #[inline]
    fn row_start(&self, y: usize, z: usize) -> usize {
        (z * self.dims[1] + y) * self.words_per_row
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> bool {
        debug_assert!(x < self.dims[0] && y < self.dims[1] && z < self.dims[2]);
        let word = self.words[self.row_start(y, z) + x / BITS_PER_WORD];
        (word >> (x % BITS_PER_WORD)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: bool) {
        debug_assert!(x < self.dims[0] && y < self.dims[1] && z < self.dims[2]);
        let idx = self.row_start(y, z) + x / BITS_PER_WORD;
        let bit = 1u64 << (x % BITS_PER_WORD);
        if value {
            self.words[idx] |= bit;
        } else {
            self.words[idx] &= !bit;
        }
    }

    /// Packed words of row `(y, z)` in LSB-first order.
    #[inline]
    pub fn row_words(&self, y: usize, z: usize) -> &[u64] {
        let start = self.row_start(y, z);
        &self.words[start..start + self.words_per_row]
    }

    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[inline]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Converts into a float grid holding 1.0 for set bits.
    pub fn to_grid(&self) -> Grid<f32> {
        let [w, h, d] = self.dims;
        let mut grid = Grid::new_default(&self.dims[..self.ndim]);
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    if self.get(x, y, z) {
                        *grid.get_mut(x, y, z) = 1.0;
                    }
                }
            }
        }
        grid
    }
}
