//! Triangle meshes: construction from volumes, cleanup, splitting and
//! measurements.

pub mod decimate;
pub mod marching_cubes;


use glam::DVec3;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

pub use decimate::{decimate, target_ratio};
pub use marching_cubes::marching_cubes;

/// Indexed triangle mesh. Closed meshes are oriented with normals pointing
/// out of the enclosed material, so solids have a positive signed volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriMesh {
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriMesh {
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    fn corners(&self, t: &[u32; 3]) -> [DVec3; 3] {
        t.map(|i| self.vertices[i as usize])
    }

    /// Sum of signed tetrahedron volumes against the origin. Enclosed
    /// cavities (inward-facing shells) count negative.
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.corners(t);
                a.dot(b.cross(c))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Volume-weighted centroid of the enclosed material. Falls back to the
    /// vertex mean for meshes that enclose nothing.
    pub fn centroid(&self) -> DVec3 {
        let mut weighted = DVec3::ZERO;
        let mut total = 0.0;
        for t in &self.triangles {
            let [a, b, c] = self.corners(t);
            let v = a.dot(b.cross(c)) / 6.0;
            weighted += (a + b + c) * (v / 4.0);
            total += v;
        }
        if total.abs() > f64::EPSILON {
            weighted / total
        } else if self.vertices.is_empty() {
            DVec3::ZERO
        } else {
            self.vertices.iter().copied().sum::<DVec3>() / self.vertices.len() as f64
        }
    }

    /// Axis-aligned bounds of the referenced vertices as `(min, max)`.
    pub fn bounding_box(&self) -> (DVec3, DVec3) {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for t in &self.triangles {
            for p in self.corners(t) {
                min = min.min(p);
                max = max.max(p);
            }
        }
        (min, max)
    }

    /// Maps every vertex `p` to `(p + offset) * scale`.
    pub fn translate_scale(&mut self, offset: DVec3, scale: DVec3) {
        for p in &mut self.vertices {
            *p = (*p + offset) * scale;
        }
    }

    /// Appends `other`, keeping the two vertex sets disjoint.
    pub fn merge(&mut self, other: &TriMesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles
            .extend(other.triangles.iter().map(|t| t.map(|i| i + base)));
    }

    /// Ray-parity inside test along +x.
    ///
    /// The ray is nudged off the query row by a tiny irrational-ish offset so
    /// it does not graze vertices or edges lying on voxel-aligned planes.
    pub fn contains_point(&self, p: DVec3) -> bool {
        let (y, z) = (p.y + 1.3e-7, p.z + 2.9e-7);
        let mut crossings = 0usize;
        for t in &self.triangles {
            let [a, b, c] = self.corners(t);
            // Barycentric test of (y, z) in the triangle projected onto yz.
            let d = (b.y - a.y) * (c.z - a.z) - (c.y - a.y) * (b.z - a.z);
            if d == 0.0 {
                continue;
            }
            let u = ((y - a.y) * (c.z - a.z) - (c.y - a.y) * (z - a.z)) / d;
            let v = ((b.y - a.y) * (z - a.z) - (y - a.y) * (b.z - a.z)) / d;
            if u < 0.0 || v < 0.0 || u + v > 1.0 {
                continue;
            }
            let x = a.x + u * (b.x - a.x) + v * (c.x - a.x);
            if x > p.x {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }
}

// ============================================================================
// Cleanup and splitting
// ============================================================================

/// Merges vertices whose coordinates agree to `decimals` decimal places and
/// drops triangles that collapse as a result.
///
/// Surviving vertices keep their first-seen position and order.
pub fn dedup_vertices(mesh: &TriMesh, decimals: i32) -> TriMesh {
    let factor = 10f64.powi(decimals);
    let key = |p: DVec3| {
        (
            (p.x * factor).round() as i64,
            (p.y * factor).round() as i64,
            (p.z * factor).round() as i64,
        )
    };

    let mut index: HashMap<(i64, i64, i64), u32> = HashMap::with_capacity(mesh.vertices.len());
    let mut vertices = Vec::with_capacity(mesh.vertices.len());
    let remap: Vec<u32> = mesh
        .vertices
        .iter()
        .map(|&p| {
            *index.entry(key(p)).or_insert_with(|| {
                vertices.push(p);
                (vertices.len() - 1) as u32
            })
        })
        .collect();

    let triangles = mesh
        .triangles
        .iter()
        .map(|t| t.map(|i| remap[i as usize]))
        .filter(|[a, b, c]| a != b && b != c && a != c)
        .collect();

    TriMesh::new(vertices, triangles)
}

fn find(parent: &mut [u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        parent[x as usize] = parent[parent[x as usize] as usize];
        x = parent[x as usize];
    }
    x
}

/// Splits a mesh into the groups of triangles connected through shared
/// vertices. Components come in order of their first triangle; vertices are
/// renumbered in order of first use.
pub fn connected_components(mesh: &TriMesh) -> Vec<TriMesh> {
    let mut parent: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    for &[a, b, c] in &mesh.triangles {
        for (u, v) in [(a, b), (b, c)] {
            let (ru, rv) = (find(&mut parent, u), find(&mut parent, v));
            if ru != rv {
                parent[ru.max(rv) as usize] = ru.min(rv);
            }
        }
    }

    let mut component_of: HashMap<u32, usize> = HashMap::new();
    let mut components: Vec<TriMesh> = Vec::new();
    let mut local: Vec<HashMap<u32, u32>> = Vec::new();

    for t in &mesh.triangles {
        let root = find(&mut parent, t[0]);
        let c = *component_of.entry(root).or_insert_with(|| {
            components.push(TriMesh::default());
            local.push(HashMap::new());
            components.len() - 1
        });
        let out = &mut components[c];
        let map = &mut local[c];
        let tri = t.map(|i| {
            *map.entry(i).or_insert_with(|| {
                out.vertices.push(mesh.vertices[i as usize]);
                (out.vertices.len() - 1) as u32
            })
        });
        out.triangles.push(tri);
    }
    components
}

#[inline]
fn box_contains(outer: &(DVec3, DVec3), inner: &(DVec3, DVec3)) -> bool {
    outer.0.cmple(inner.0).all() && inner.1.cmple(outer.1).all()
}

/// Folds every mesh whose bounding box lies inside another mesh's box into
/// that mesh. Each output mesh is a mesh contained in no other box, extended
/// by everything nested inside it, in input order.
///
/// Hollow objects come out of marching cubes as an outer shell plus an
/// inward-facing cavity shell; merging them makes the cavity subtract from
/// the volume. Equal boxes merge into the later mesh.
pub fn merge_contained(meshes: Vec<TriMesh>) -> Vec<TriMesh> {
    let boxes: Vec<(DVec3, DVec3)> = meshes.iter().map(TriMesh::bounding_box).collect();
    let encloses = |j: usize, i: usize| {
        j != i && box_contains(&boxes[j], &boxes[i]) && (boxes[j] != boxes[i] || j > i)
    };
    let parent: Vec<Option<usize>> = (0..meshes.len())
        .map(|i| (0..meshes.len()).find(|&j| encloses(j, i)))
        .collect();
    let root = |mut i: usize| {
        while let Some(j) = parent[i] {
            i = j;
        }
        i
    };

    let mut slot_of: Vec<Option<usize>> = vec![None; meshes.len()];
    let mut out: Vec<TriMesh> = Vec::new();
    for i in 0..meshes.len() {
        if parent[i].is_none() {
            slot_of[i] = Some(out.len());
            out.push(TriMesh::default());
        }
    }
    for (i, mesh) in meshes.iter().enumerate() {
        if let Some(slot) = slot_of[root(i)] {
            out[slot].merge(mesh);
        }
    }
    out
}
