//! Quadric-error edge-collapse decimation.
//!
//! Greedy variant: instead of a priority queue, every pass collapses all
//! edges whose error is below a threshold that grows with the pass number.
//! Vertex quadrics come from the planes of the original triangles, border
//! vertices are never moved off the border, and collapses that would fold a
//! neighbouring triangle over are skipped.

use std::ops::{Add, AddAssign};

use glam::DVec3;

use super::TriMesh;

/// Threshold growth used by the mesh pipelines.
pub const DEFAULT_AGGRESSIVENESS: f64 = 10.0;

const MAX_ITERATIONS: usize = 100;

/// Fraction of triangles to keep for a mesh of `num_triangles`, or `None`
/// when the mesh is too small to be worth decimating.
pub fn target_ratio(num_triangles: usize) -> Option<f64> {
    if num_triangles < 100 {
        None
    } else if num_triangles < 200 {
        Some(0.5)
    } else if num_triangles < 10_000 {
        Some(0.2)
    } else if num_triangles < 1_000_000 {
        Some(0.1)
    } else {
        Some(0.05)
    }
}

/// Collapses edges until at most `ratio * triangles` remain or the pass
/// budget runs out. Higher `aggressiveness` accepts larger errors sooner.
pub fn decimate(mesh: &TriMesh, ratio: f64, aggressiveness: f64) -> TriMesh {
    if mesh.is_empty() {
        return mesh.clone();
    }
    let target = (ratio.clamp(0.0, 1.0) * mesh.triangles.len() as f64) as usize;
    let mut decimator = Decimator::new(mesh);
    decimator.run(target, aggressiveness);
    decimator.into_mesh()
}

// ============================================================================
// Quadric
// ============================================================================

/// Upper triangle of the symmetric 4x4 plane quadric, row major.
#[derive(Debug, Clone, Copy, Default)]
struct Quadric([f64; 10]);

impl Quadric {
    fn plane(n: DVec3, d: f64) -> Self {
        Self([
            n.x * n.x,
            n.x * n.y,
            n.x * n.z,
            n.x * d,
            n.y * n.y,
            n.y * n.z,
            n.y * d,
            n.z * n.z,
            n.z * d,
            d * d,
        ])
    }

    /// Determinant of the 3x3 matrix picked out by the entry indices.
    #[allow(clippy::too_many_arguments)]
    fn det(
        &self,
        a11: usize,
        a12: usize,
        a13: usize,
        a21: usize,
        a22: usize,
        a23: usize,
        a31: usize,
        a32: usize,
        a33: usize,
    ) -> f64 {
        let m = &self.0;
        m[a11] * m[a22] * m[a33] + m[a13] * m[a21] * m[a32] + m[a12] * m[a23] * m[a31]
            - m[a13] * m[a22] * m[a31]
            - m[a11] * m[a23] * m[a32]
            - m[a12] * m[a21] * m[a33]
    }

    /// Sum of squared distances from `p` to the accumulated planes.
    fn error(&self, p: DVec3) -> f64 {
        let q = &self.0;
        let (x, y, z) = (p.x, p.y, p.z);
        q[0] * x * x
            + 2.0 * q[1] * x * y
            + 2.0 * q[2] * x * z
            + 2.0 * q[3] * x
            + q[4] * y * y
            + 2.0 * q[5] * y * z
            + 2.0 * q[6] * y
            + q[7] * z * z
            + 2.0 * q[8] * z
            + q[9]
    }
}

impl Add for Quadric {
    type Output = Quadric;

    fn add(mut self, rhs: Quadric) -> Quadric {
        self += rhs;
        self
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Quadric) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

// ============================================================================
// Decimator
// ============================================================================

#[derive(Debug, Clone)]
struct Vertex {
    p: DVec3,
    q: Quadric,
    tstart: usize,
    tcount: usize,
    border: bool,
}

#[derive(Debug, Clone)]
struct Triangle {
    v: [usize; 3],
    /// Per-edge collapse errors, then their minimum.
    err: [f64; 4],
    deleted: bool,
    dirty: bool,
    n: DVec3,
}

/// Triangle `tid` uses the vertex at corner `tvertex`.
#[derive(Debug, Clone, Copy)]
struct Ref {
    tid: usize,
    tvertex: usize,
}

struct Decimator {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
    refs: Vec<Ref>,
}

impl Decimator {
    fn new(mesh: &TriMesh) -> Self {
        let vertices = mesh
            .vertices
            .iter()
            .map(|&p| Vertex {
                p,
                q: Quadric::default(),
                tstart: 0,
                tcount: 0,
                border: false,
            })
            .collect();
        let triangles = mesh
            .triangles
            .iter()
            .map(|t| Triangle {
                v: t.map(|i| i as usize),
                err: [0.0; 4],
                deleted: false,
                dirty: false,
                n: DVec3::ZERO,
            })
            .collect();
        Self {
            vertices,
            triangles,
            refs: Vec::new(),
        }
    }

    fn run(&mut self, target: usize, aggressiveness: f64) {
        let mut triangle_count = self.triangles.len();
        let mut deleted = 0usize;

        for iteration in 0..MAX_ITERATIONS {
            if triangle_count - deleted <= target {
                break;
            }
            if iteration % 5 == 0 {
                self.update_mesh(iteration);
                triangle_count = self.triangles.len();
                deleted = 0;
            }
            for t in &mut self.triangles {
                t.dirty = false;
            }

            let threshold = 1e-9 * ((iteration + 3) as f64).powf(aggressiveness);

            for ti in 0..self.triangles.len() {
                {
                    let t = &self.triangles[ti];
                    if t.err[3] > threshold || t.deleted || t.dirty {
                        continue;
                    }
                }
                for j in 0..3 {
                    let t = &self.triangles[ti];
                    if t.err[j] >= threshold {
                        continue;
                    }
                    let i0 = t.v[j];
                    let i1 = t.v[(j + 1) % 3];
                    if self.vertices[i0].border != self.vertices[i1].border {
                        continue;
                    }

                    let (_, p) = self.collapse_error(i0, i1);
                    let mut deleted0 = vec![false; self.vertices[i0].tcount];
                    let mut deleted1 = vec![false; self.vertices[i1].tcount];
                    if self.flipped(p, i1, i0, &mut deleted0)
                        || self.flipped(p, i0, i1, &mut deleted1)
                    {
                        continue;
                    }

                    let q1 = self.vertices[i1].q;
                    let v0 = &mut self.vertices[i0];
                    v0.p = p;
                    v0.q += q1;

                    let tstart = self.refs.len();
                    deleted += self.update_triangles(i0, i0, &deleted0);
                    deleted += self.update_triangles(i0, i1, &deleted1);

                    let tcount = self.refs.len() - tstart;
                    let v0 = &mut self.vertices[i0];
                    if tcount <= v0.tcount {
                        // Reuse the old slot; the appended refs become garbage
                        // until the next rebuild.
                        self.refs.copy_within(tstart..tstart + tcount, v0.tstart);
                    } else {
                        v0.tstart = tstart;
                    }
                    v0.tcount = tcount;
                    break;
                }
                if triangle_count - deleted <= target {
                    break;
                }
            }
        }
    }

    /// Error of collapsing `i1` into `i0` and the position that minimizes it.
    fn collapse_error(&self, i0: usize, i1: usize) -> (f64, DVec3) {
        let (a, b) = (&self.vertices[i0], &self.vertices[i1]);
        let q = a.q + b.q;
        let border = a.border && b.border;
        let det = q.det(0, 1, 2, 1, 4, 5, 2, 5, 7);
        if det != 0.0 && !border {
            let p = DVec3::new(
                -1.0 / det * q.det(1, 2, 3, 4, 5, 6, 5, 7, 8),
                1.0 / det * q.det(0, 2, 3, 1, 5, 6, 2, 7, 8),
                -1.0 / det * q.det(0, 1, 3, 1, 4, 6, 2, 5, 8),
            );
            return (q.error(p), p);
        }

        let p1 = a.p;
        let p2 = b.p;
        let p3 = (p1 + p2) * 0.5;
        let (e1, e2, e3) = (q.error(p1), q.error(p2), q.error(p3));
        let e = e1.min(e2).min(e3);
        let p = if e3 == e {
            p3
        } else if e2 == e {
            p2
        } else {
            p1
        };
        (e, p)
    }

    /// Whether moving vertex `v` to `p` would flip or degenerate one of its
    /// triangles. Triangles that also contain `other` are marked for removal.
    fn flipped(&self, p: DVec3, other: usize, v: usize, deleted: &mut [bool]) -> bool {
        let vertex = &self.vertices[v];
        for k in 0..vertex.tcount {
            let r = self.refs[vertex.tstart + k];
            let t = &self.triangles[r.tid];
            if t.deleted {
                continue;
            }
            let id1 = t.v[(r.tvertex + 1) % 3];
            let id2 = t.v[(r.tvertex + 2) % 3];
            if id1 == other || id2 == other {
                deleted[k] = true;
                continue;
            }
            let d1 = (self.vertices[id1].p - p).normalize_or_zero();
            let d2 = (self.vertices[id2].p - p).normalize_or_zero();
            if d1.dot(d2).abs() > 0.999 {
                return true;
            }
            let n = d1.cross(d2).normalize_or_zero();
            deleted[k] = false;
            if n.dot(t.n) < 0.2 {
                return true;
            }
        }
        false
    }

    /// Re-points the triangles of `v` at `i0`, deletes the ones marked in
    /// `deleted` and appends refs for the survivors. Returns the number of
    /// triangles deleted.
    fn update_triangles(&mut self, i0: usize, v: usize, deleted: &[bool]) -> usize {
        let (tstart, tcount) = (self.vertices[v].tstart, self.vertices[v].tcount);
        let mut removed = 0;
        for k in 0..tcount {
            let r = self.refs[tstart + k];
            if self.triangles[r.tid].deleted {
                continue;
            }
            if deleted[k] {
                self.triangles[r.tid].deleted = true;
                removed += 1;
                continue;
            }
            self.triangles[r.tid].v[r.tvertex] = i0;
            self.triangles[r.tid].dirty = true;
            let corners = self.triangles[r.tid].v;
            self.triangles[r.tid].err = self.edge_errors(corners);
            self.refs.push(r);
        }
        removed
    }

    fn edge_errors(&self, v: [usize; 3]) -> [f64; 4] {
        let mut err = [0.0; 4];
        for j in 0..3 {
            err[j] = self.collapse_error(v[j], v[(j + 1) % 3]).0;
        }
        err[3] = err[0].min(err[1]).min(err[2]);
        err
    }

    /// Drops deleted triangles (after the first pass) and rebuilds the
    /// vertex-to-triangle refs. The first pass also seeds border flags,
    /// quadrics, normals and edge errors.
    fn update_mesh(&mut self, iteration: usize) {
        if iteration > 0 {
            self.triangles.retain(|t| !t.deleted);
        }

        for v in &mut self.vertices {
            v.tstart = 0;
            v.tcount = 0;
        }
        for t in &self.triangles {
            for &i in &t.v {
                self.vertices[i].tcount += 1;
            }
        }
        let mut tstart = 0;
        for v in &mut self.vertices {
            v.tstart = tstart;
            tstart += v.tcount;
            v.tcount = 0;
        }
        self.refs = vec![Ref { tid: 0, tvertex: 0 }; self.triangles.len() * 3];
        for (tid, t) in self.triangles.iter().enumerate() {
            for (tvertex, &i) in t.v.iter().enumerate() {
                let v = &mut self.vertices[i];
                self.refs[v.tstart + v.tcount] = Ref { tid, tvertex };
                v.tcount += 1;
            }
        }

        if iteration != 0 {
            return;
        }

        // A neighbour reached through exactly one triangle lies across an
        // open edge.
        for v in &mut self.vertices {
            v.border = false;
        }
        let mut neighbours: Vec<(usize, u32)> = Vec::new();
        for i in 0..self.vertices.len() {
            neighbours.clear();
            let (tstart, tcount) = (self.vertices[i].tstart, self.vertices[i].tcount);
            for r in &self.refs[tstart..tstart + tcount] {
                for &id in &self.triangles[r.tid].v {
                    match neighbours.iter_mut().find(|(n, _)| *n == id) {
                        Some((_, count)) => *count += 1,
                        None => neighbours.push((id, 1)),
                    }
                }
            }
            for &(id, count) in &neighbours {
                if count == 1 {
                    self.vertices[id].border = true;
                }
            }
        }

        for v in &mut self.vertices {
            v.q = Quadric::default();
        }
        for ti in 0..self.triangles.len() {
            let v = self.triangles[ti].v;
            let p = v.map(|i| self.vertices[i].p);
            let n = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();
            self.triangles[ti].n = n;
            let plane = Quadric::plane(n, -n.dot(p[0]));
            for &i in &v {
                self.vertices[i].q += plane;
            }
        }
        for ti in 0..self.triangles.len() {
            let v = self.triangles[ti].v;
            self.triangles[ti].err = self.edge_errors(v);
        }
    }

    fn into_mesh(self) -> TriMesh {
        let triangles: Vec<&Triangle> = self.triangles.iter().filter(|t| !t.deleted).collect();
        let mut used = vec![false; self.vertices.len()];
        for t in &triangles {
            for &i in &t.v {
                used[i] = true;
            }
        }
        let mut remap = vec![0u32; self.vertices.len()];
        let mut vertices = Vec::new();
        for (i, _) in used.iter().enumerate().filter(|(_, &u)| u) {
            remap[i] = vertices.len() as u32;
            vertices.push(self.vertices[i].p);
        }
        let triangles = triangles.iter().map(|t| t.v.map(|i| remap[i])).collect();
        TriMesh::new(vertices, triangles)
    }
}
