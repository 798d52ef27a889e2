//! Marching cubes over a scalar volume.
//!
//! The case table is derived once from the cube geometry instead of being
//! transcribed: on every cube face the sign changes along the face cycle are
//! paired so that inside corners stay separated on ambiguous faces, the
//! pairings are chained into closed loops of crossed edges, and each loop is
//! fanned into triangles. Both cubes sharing a face make the same pairing, so
//! the surface is watertight.

use std::sync::OnceLock;

use arrayvec::ArrayVec;
use common::Grid;
use glam::DVec3;
use hashbrown::HashMap;

use super::TriMesh;

/// Corner `i` sits at offset `(i & 1, i >> 1 & 1, i >> 2 & 1)`.
const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Corner cycles of the six faces, all wound the same way seen from outside.
const FACES: [[usize; 4]; 6] = [
    [0, 4, 6, 2],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
    [0, 2, 3, 1],
    [4, 5, 7, 6],
];

/// `FACE_EDGES[f][k]` joins `FACES[f][k]` and `FACES[f][k + 1]`.
const FACE_EDGES: [[u8; 4]; 6] = [
    [8, 6, 10, 4],
    [5, 11, 7, 9],
    [0, 9, 2, 8],
    [10, 3, 11, 1],
    [4, 1, 5, 0],
    [2, 7, 3, 6],
];

/// Bitmask of the two faces each edge lies on.
const EDGE_FACES: [u8; 12] = [20, 24, 36, 40, 17, 18, 33, 34, 5, 6, 9, 10];

const MAX_TRIANGLES: usize = 5;

type Case = ArrayVec<[u8; 3], MAX_TRIANGLES>;

static CASES: OnceLock<Vec<Case>> = OnceLock::new();

fn cases() -> &'static [Case] {
    CASES.get_or_init(|| (0..=255u8).map(triangulate).collect())
}

#[inline]
fn corner_offset(corner: usize) -> [usize; 3] {
    [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1]
}

/// Closed loops of crossed edges for one corner configuration.
fn crossing_loops(config: u8) -> ArrayVec<ArrayVec<u8, 12>, 4> {
    let inside = |corner: usize| (config >> corner) & 1 == 1;

    // next[e]: the crossing that follows e around the surface.
    let mut next = [u8::MAX; 12];
    for (face, edges) in FACES.iter().zip(&FACE_EDGES) {
        let mut crossings: ArrayVec<(u8, bool), 4> = ArrayVec::new();
        for k in 0..4 {
            let (a, b) = (face[k], face[(k + 1) % 4]);
            if inside(a) != inside(b) {
                crossings.push((edges[k], inside(a)));
            }
        }
        let n = crossings.len();
        for (k, &(edge, leaves)) in crossings.iter().enumerate() {
            if leaves {
                next[edge as usize] = crossings[(k + n - 1) % n].0;
            }
        }
    }

    let mut used = [false; 12];
    let mut loops = ArrayVec::new();
    for start in 0..12 {
        if next[start] == u8::MAX || used[start] {
            continue;
        }
        let mut edges = ArrayVec::new();
        let mut e = start;
        while !used[e] {
            used[e] = true;
            edges.push(e as u8);
            e = next[e] as usize;
        }
        debug_assert_eq!(e, start);
        loops.push(edges);
    }
    loops
}

/// Fans every loop from an apex whose chords never lie in a cube face, so
/// no triangle edge is shared with the neighbouring cube's fan.
fn triangulate(config: u8) -> Case {
    let mut triangles = Case::new();
    for edges in crossing_loops(config) {
        let n = edges.len();
        let is_chord = |k: usize, j: usize| j != k && j != (k + 1) % n && j != (k + n - 1) % n;
        let apex = (0..n)
            .find(|&k| {
                (0..n).all(|j| {
                    !is_chord(k, j)
                        || EDGE_FACES[edges[k] as usize] & EDGE_FACES[edges[j] as usize] == 0
                })
            })
            .unwrap_or(0);
        for i in 1..n - 1 {
            let a = edges[apex];
            let b = edges[(apex + i) % n];
            let c = edges[(apex + i + 1) % n];
            // Loops wind clockwise seen from outside.
            triangles.push([a, c, b]);
        }
    }
    triangles
}

/// Iso-surface of `volume` at `iso`, in voxel coordinates.
///
/// A voxel is inside when its value is strictly above `iso`. The volume is
/// treated as surrounded by one layer of outside voxels, so objects touching
/// the border still give closed surfaces. Crossing points are linearly
/// interpolated along cube edges and shared between neighbouring cubes.
pub fn marching_cubes(volume: &Grid<f32>, iso: f64) -> TriMesh {
    if volume.is_empty() {
        return TriMesh::default();
    }
    let [w, h, d] = volume.dims();
    let (lo, hi) = volume
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    // Outside for the iso test and mirrored around iso so border crossings
    // land where a symmetric falloff would put them.
    let pad = lo.min(2.0 * iso - hi);

    // Padded coordinates: voxel (x, y, z) lives at (x + 1, y + 1, z + 1).
    let value = |p: [usize; 3]| -> f64 {
        let [x, y, z] = p;
        if x == 0 || y == 0 || z == 0 || x > w || y > h || z > d {
            pad
        } else {
            *volume.get(x - 1, y - 1, z - 1) as f64
        }
    };

    let table = cases();
    let mut mesh = TriMesh::default();
    let mut vertex_of: HashMap<([usize; 3], u8), u32> = HashMap::new();

    for z in 0..=d {
        for y in 0..=h {
            for x in 0..=w {
                let mut corners = [[0usize; 3]; 8];
                let mut values = [0.0f64; 8];
                let mut config = 0u8;
                for (i, (corner, v)) in corners.iter_mut().zip(values.iter_mut()).enumerate() {
                    let [ox, oy, oz] = corner_offset(i);
                    *corner = [x + ox, y + oy, z + oz];
                    *v = value(*corner);
                    if *v > iso {
                        config |= 1 << i;
                    }
                }
                if config == 0 || config == u8::MAX {
                    continue;
                }

                for triangle in &table[config as usize] {
                    let ids = triangle.map(|edge| {
                        let (a, b) = EDGES[edge as usize];
                        let axis = (a ^ b).trailing_zeros() as u8;
                        let key = (corners[a], axis);
                        *vertex_of.entry(key).or_insert_with(|| {
                            let t = (iso - values[a]) / (values[b] - values[a]);
                            let mut p = DVec3::new(
                                corners[a][0] as f64,
                                corners[a][1] as f64,
                                corners[a][2] as f64,
                            );
                            p[axis as usize] += t;
                            mesh.vertices.push(p - DVec3::ONE);
                            (mesh.vertices.len() - 1) as u32
                        })
                    });
                    mesh.triangles.push(ids);
                }
            }
        }
    }
    mesh
}
