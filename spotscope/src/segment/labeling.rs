//! Connected component labeling using union-find over row runs.
//!
//! - Run-length encoding per row with word-level bit scanning
//! - Rows are extracted and labels written in parallel
//! - Runs are merged sequentially in raster order, so label numbering is
//!   deterministic for any thread count

use common::parallel::with_thread_budget;
use common::{BitGrid, Grid, Interval, MAX_DIMS};
use glam::DVec3;
use rayon::prelude::*;

use crate::config::Connectivity;
use crate::error::Result;

// ============================================================================
// Run-Length Encoding
// ============================================================================

/// A horizontal run of foreground pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: u32, // Starting x coordinate (inclusive)
    end: u32,   // Ending x coordinate (exclusive)
    label: u32, // Provisional label
}

impl Run {
    fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
            label: 0,
        }
    }
}

/// Extra reach along x when comparing runs from neighbouring rows.
#[inline]
fn slack(connectivity: Connectivity) -> u32 {
    match connectivity {
        Connectivity::Face => 0,
        Connectivity::Full => 1,
    }
}

/// Extracts runs from one packed row, skipping empty and full words whole.
fn extract_runs(words: &[u64], width: usize) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for (wi, &word) in words.iter().enumerate() {
        let base = wi * 64;
        if word == 0 {
            if let Some(start) = run_start.take() {
                runs.push(Run::new(start, base));
            }
            continue;
        }
        if word == !0 {
            run_start.get_or_insert(base);
            continue;
        }

        let mut bit = 0usize;
        while bit < 64 {
            match run_start {
                Some(start) => {
                    let zeros = !word >> bit;
                    if zeros == 0 {
                        break;
                    }
                    bit += zeros.trailing_zeros() as usize;
                    runs.push(Run::new(start, base + bit));
                    run_start = None;
                }
                None => {
                    let ones = word >> bit;
                    if ones == 0 {
                        break;
                    }
                    bit += ones.trailing_zeros() as usize;
                    run_start = Some(base + bit);
                }
            }
        }
    }

    if let Some(start) = run_start {
        runs.push(Run::new(start, width));
    }
    runs
}

// ============================================================================
// Union-Find
// ============================================================================

#[derive(Debug, Default)]
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    /// Labels start at 1; label `l` lives at `parent[l - 1]`.
    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32 + 1;
        self.parent.push(label);
        label
    }

    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[(root - 1) as usize] != root {
            root = self.parent[(root - 1) as usize];
        }
        let mut current = label;
        while current != root {
            let next = self.parent[(current - 1) as usize];
            self.parent[(current - 1) as usize] = root;
            current = next;
        }
        root
    }

    /// The smaller root wins, so each component's root is its first run.
    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[(larger - 1) as usize] = smaller;
        }
    }

    /// Maps every provisional label to a dense label in order of first
    /// appearance. Index 0 stays background.
    fn dense_labels(&mut self) -> (Vec<u32>, usize) {
        let len = self.parent.len();
        let mut map = vec![0u32; len + 1];
        let mut count = 0u32;
        for label in 1..=len as u32 {
            let root = self.find(label);
            if map[root as usize] == 0 {
                count += 1;
                map[root as usize] = count;
            }
            map[label as usize] = map[root as usize];
        }
        (map, count as usize)
    }
}

fn merge_rows(prev: &[Run], curr: &[Run], connectivity: Connectivity, uf: &mut UnionFind) {
    let slack = slack(connectivity);
    let mut j = 0;
    for c in curr {
        while j < prev.len() && prev[j].end + slack <= c.start {
            j += 1;
        }
        let mut k = j;
        while k < prev.len() && prev[k].start < c.end + slack {
            uf.union(prev[k].label, c.label);
            k += 1;
        }
    }
}

// ============================================================================
// Label map
// ============================================================================

/// Per-pixel component labels; 0 is background, components are `1..=n`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: Grid<u32>,
    num_labels: usize,
}

/// Summary of one label: bounding box, pixel count and coordinate sums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRegion {
    pub label: u32,
    pub min: [usize; MAX_DIMS],
    pub max: [usize; MAX_DIMS],
    pub count: usize,
    pub sum: [f64; MAX_DIMS],
}

impl LabelRegion {
    /// Mean pixel coordinate, zero-based within the labeled grid.
    pub fn centroid(&self) -> DVec3 {
        DVec3::from(self.sum) / self.count as f64
    }

    /// Bounding box as an interval of the labeled grid.
    pub fn bounds(&self, ndim: usize) -> Interval {
        Interval::new(&self.min[..ndim], &self.max[..ndim])
    }
}

/// Labels the connected foreground components of `mask`.
///
/// Components are numbered from 1 in raster order of their first pixel
/// (x fastest, then y, then z).
pub fn label_components(
    mask: &BitGrid,
    connectivity: Connectivity,
    num_threads: usize,
) -> Result<LabelMap> {
    let [w, h, d] = mask.dims();
    let ndim = mask.ndim();

    let map = with_thread_budget(num_threads, || {
        let mut rows: Vec<Vec<Run>> = (0..h * d)
            .into_par_iter()
            .map(|row| extract_runs(mask.row_words(row % h, row / h), w))
            .collect();

        let mut uf = UnionFind::default();
        for row in rows.iter_mut() {
            for run in row.iter_mut() {
                run.label = uf.make_set();
            }
        }

        for row in 0..h * d {
            let (y, z) = (row % h, row / h);
            for neighbor in neighbor_rows(y, z, h, connectivity) {
                let (before, after) = rows.split_at(row);
                merge_rows(&before[neighbor], &after[0], connectivity, &mut uf);
            }
        }

        let (dense, num_labels) = uf.dense_labels();

        let mut labels = Grid::new_default(&mask.dims()[..ndim]);
        labels
            .pixels_mut()
            .par_chunks_mut(w.max(1))
            .zip(rows.par_iter())
            .for_each(|(out, runs)| {
                for run in runs {
                    out[run.start as usize..run.end as usize].fill(dense[run.label as usize]);
                }
            });

        LabelMap { labels, num_labels }
    })?;

    Ok(map)
}

/// Earlier rows (in raster order) that can touch row `(y, z)`.
fn neighbor_rows(y: usize, z: usize, h: usize, connectivity: Connectivity) -> Vec<usize> {
    let index = |y: usize, z: usize| z * h + y;
    let mut out = Vec::with_capacity(4);
    if y > 0 {
        out.push(index(y - 1, z));
    }
    if z > 0 {
        match connectivity {
            Connectivity::Face => out.push(index(y, z - 1)),
            Connectivity::Full => {
                for ny in y.saturating_sub(1)..(y + 2).min(h) {
                    out.push(index(ny, z - 1));
                }
            }
        }
    }
    out
}

impl LabelMap {
    /// Treats each distinct positive integer value of `grid` as one region.
    ///
    /// Values are rounded; regions are renumbered densely in ascending value
    /// order. Regions need not be connected.
    pub fn from_label_grid(grid: &Grid<f32>) -> Self {
        let mut values: Vec<i64> = grid
            .iter()
            .map(|&v| v.round() as i64)
            .filter(|&v| v > 0)
            .collect();
        values.sort_unstable();
        values.dedup();

        let labels = grid.map(|&v| {
            let v = v.round() as i64;
            if v > 0 {
                values.binary_search(&v).map_or(0, |i| i as u32 + 1)
            } else {
                0
            }
        });

        Self {
            labels,
            num_labels: values.len(),
        }
    }

    #[inline]
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    #[inline]
    pub fn labels(&self) -> &Grid<u32> {
        &self.labels
    }

    /// Bounding boxes, counts and coordinate sums for labels `1..=n`.
    pub fn regions(&self) -> Vec<LabelRegion> {
        let mut regions: Vec<LabelRegion> = (1..=self.num_labels as u32)
            .map(|label| LabelRegion {
                label,
                min: [usize::MAX; MAX_DIMS],
                max: [0; MAX_DIMS],
                count: 0,
                sum: [0.0; MAX_DIMS],
            })
            .collect();

        for (idx, &label) in self.labels.iter().enumerate() {
            if label == 0 {
                continue;
            }
            let p = self.labels.coords(idx);
            let region = &mut regions[(label - 1) as usize];
            region.count += 1;
            for d in 0..MAX_DIMS {
                region.min[d] = region.min[d].min(p[d]);
                region.max[d] = region.max[d].max(p[d]);
                region.sum[d] += p[d] as f64;
            }
        }

        regions.retain(|r| r.count > 0);
        regions
    }

    /// Mask of `region` cropped to its bounding box.
    pub fn region_mask(&self, region: &LabelRegion) -> BitGrid {
        let ndim = self.labels.ndim();
        let crop = self.labels.crop(&region.bounds(ndim));
        BitGrid::from_grid(&crop, |&l| l == region.label)
    }
}
