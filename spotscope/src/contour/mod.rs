//! Outer outlines of 2D binary masks.
//!
//! Single raster pass over pixel rows. Every vertical pixel boundary that is
//! crossed by an open outline holds that outline in a slot; horizontal edges
//! between a selected and an unselected pixel extend, start, merge or close
//! outlines. Holes are closed on their top edge and discarded.
//!
//! Foreground is 8-connected and background 4-connected. At a saddle corner,
//! where two pixels touch only diagonally, the outline passes the corner on
//! both sides so the two pixels stay in one outline. A saddle with the
//! selected pair running top-left to bottom-right is resolved on the lower
//! edge left of it by parking an outline for the next pixel. The mirrored
//! saddle needs no bookkeeping: its upper edge simply connects to the
//! boundary coming down on its right.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use common::BitGrid;
use glam::IVec2;

type OutlineId = usize;

/// Horizontal boundary between a pixel and the one above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Edge {
    /// Selected pixel below an unselected one.
    Upper,
    /// Unselected pixel below a selected one.
    Lower,
}

/// What happens at one horizontal edge, decided by the outlines held on the
/// boundaries left and right of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Junction {
    /// No outline on either side: open a new one.
    Start,
    /// Lower edge left of a saddle with nothing on its left boundary: a new
    /// outline starts here and its right end is parked for the next pixel.
    CornerStart,
    /// Only the right boundary has an outline; it moves left.
    ExtendFromRight,
    /// Only the left boundary has an outline; it moves right. Right after a
    /// lower-right corner the parked outline also takes the left boundary.
    ExtendFromLeft { after_corner: bool },
    /// Both ends of one outline meet at a saddle on a lower edge; the
    /// outline continues to the right and its other end is parked for the
    /// next pixel.
    CornerContinue,
    /// Both ends of one outline meet: a hole on an upper edge (discarded),
    /// a finished outer outline on a lower edge.
    Close,
    /// Two outlines meet at a saddle on a lower edge and both continue.
    CornerHandOff,
    /// Two outlines meet and become one.
    Merge,
}

// ============================================================================
// Outline deque
// ============================================================================

/// Axis-parallel polyline that grows at both ends.
#[derive(Debug, Default)]
struct Outline {
    points: VecDeque<IVec2>,
}

#[inline]
fn collinear(a: IVec2, b: IVec2, c: IVec2) -> bool {
    (b.x - a.x) * (c.y - b.y) == (b.y - a.y) * (c.x - b.x)
}

impl Outline {
    /// Adds a point at the back; a straight continuation replaces the last
    /// point instead.
    fn append(&mut self, p: IVec2) {
        let n = self.points.len();
        if n >= 2 && collinear(self.points[n - 2], self.points[n - 1], p) {
            self.points[n - 1] = p;
        } else {
            self.points.push_back(p);
        }
    }

    fn prepend(&mut self, p: IVec2) {
        if self.points.len() >= 2 && collinear(self.points[1], self.points[0], p) {
            self.points[0] = p;
        } else {
            self.points.push_front(p);
        }
    }

    fn append_outline(&mut self, other: VecDeque<IVec2>) {
        self.points.extend(other);
    }

    fn prepend_outline(&mut self, mut other: VecDeque<IVec2>) {
        other.append(&mut self.points);
        self.points = other;
    }

    /// Closed polygon with every collinear vertex removed, including across
    /// the wraparound.
    fn into_polygon(self) -> Vec<IVec2> {
        let mut out: Vec<IVec2> = Vec::with_capacity(self.points.len());
        for p in self.points {
            while out.len() >= 2 && collinear(out[out.len() - 2], out[out.len() - 1], p) {
                out.pop();
            }
            out.push(p);
        }
        while out.len() > 2 && collinear(out[out.len() - 2], out[out.len() - 1], out[0]) {
            out.pop();
        }
        while out.len() > 2 && collinear(out[out.len() - 1], out[0], out[1]) {
            out.remove(0);
        }
        out
    }
}

// ============================================================================
// Tracer
// ============================================================================

/// Outline parked at a lower-right corner, waiting for the next pixel.
#[derive(Debug, Default, Clone, Copy)]
struct Corner {
    x: Option<usize>,
    outline: Option<OutlineId>,
}

impl Corner {
    #[inline]
    fn at(&self, x: usize) -> Option<OutlineId> {
        if self.x == Some(x) {
            self.outline
        } else {
            None
        }
    }
}

struct Tracer {
    outlines: Vec<Outline>,
    /// `slots[x]` is the outline crossing the vertical boundary left of
    /// pixel column `x`.
    slots: Vec<Option<OutlineId>>,
    polygons: Vec<Vec<IVec2>>,
}

/// Traces the outer boundary of every 8-connected foreground component of a
/// 1D or 2D mask.
///
/// Vertices lie on pixel corners: pixel `(x, y)` spans `[x, x + 1] x [y, y + 1]`.
/// The enclosed area of each polygon equals the pixel count of its component
/// plus any holes, which are not reported.
pub fn trace_outlines(mask: &BitGrid) -> Vec<Vec<IVec2>> {
    trace_with(mask, |_, _| {})
}

/// [`trace_outlines`] reporting every junction to `observe`.
pub(crate) fn trace_with(mask: &BitGrid, mut observe: impl FnMut(Edge, Junction)) -> Vec<Vec<IVec2>> {
    debug_assert!(mask.ndim() <= 2, "outline tracing needs a 1D or 2D mask");
    let [w, h, _] = mask.dims();
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let mut tracer = Tracer {
        outlines: Vec::new(),
        slots: vec![None; w + 1],
        polygons: Vec::new(),
    };
    // Index x + 1 holds pixel x; both ends are unselected padding.
    let mut prev = vec![false; w + 2];
    let mut this = vec![false; w + 2];

    for y in 0..=h {
        std::mem::swap(&mut prev, &mut this);
        let mut corner = Corner::default();
        this[1] = y < h && mask.get(0, y, 0);

        for x in 0..=w {
            if x + 1 < w {
                this[x + 2] = y < h && mask.get(x + 1, y, 0);
            }

            if this[x + 1] {
                if !prev[x + 1] {
                    let junction = tracer.classify(x, &corner, false);
                    observe(Edge::Upper, junction);
                    tracer.upper_edge(x, y, junction, &corner);
                }
                if !this[x] {
                    tracer.append_at(x, IVec2::new(x as i32, y as i32 + 1));
                }
            } else {
                if prev[x + 1] {
                    // Selected pixel to the lower right, unselected above it.
                    let saddle = x + 1 < w && y < h && this[x + 2] && !prev[x + 2];
                    let junction = tracer.classify(x, &corner, saddle);
                    observe(Edge::Lower, junction);
                    tracer.lower_edge(x, y, junction, &mut corner);
                }
                if this[x] {
                    tracer.prepend_at(x, IVec2::new(x as i32, y as i32 + 1));
                }
            }
        }
    }

    debug_assert!(tracer.slots.iter().all(Option::is_none));
    tracer.polygons
}

impl Tracer {
    /// `saddle` is only ever set on lower edges.
    fn classify(&self, x: usize, corner: &Corner, saddle: bool) -> Junction {
        match (self.slots[x], self.slots[x + 1]) {
            (None, None) => Junction::Start,
            (None, Some(_)) if saddle => Junction::CornerStart,
            (None, Some(_)) => Junction::ExtendFromRight,
            (Some(_), None) => Junction::ExtendFromLeft {
                after_corner: corner.x == Some(x),
            },
            (Some(left), Some(right)) if left == right => {
                if saddle {
                    Junction::CornerContinue
                } else {
                    Junction::Close
                }
            }
            (Some(_), Some(_)) => {
                if saddle {
                    Junction::CornerHandOff
                } else {
                    Junction::Merge
                }
            }
        }
    }

    fn new_outline(&mut self) -> OutlineId {
        self.outlines.push(Outline::default());
        self.outlines.len() - 1
    }

    fn append_at(&mut self, slot: usize, p: IVec2) {
        debug_assert!(self.slots[slot].is_some(), "no outline at boundary {slot}");
        if let Some(id) = self.slots[slot] {
            self.outlines[id].append(p);
        }
    }

    fn prepend_at(&mut self, slot: usize, p: IVec2) {
        debug_assert!(self.slots[slot].is_some(), "no outline at boundary {slot}");
        if let Some(id) = self.slots[slot] {
            self.outlines[id].prepend(p);
        }
    }

    fn upper_edge(&mut self, x: usize, y: usize, junction: Junction, corner: &Corner) {
        let at = |x: usize| IVec2::new(x as i32, y as i32);
        let (left, right) = (self.slots[x], self.slots[x + 1]);

        match junction {
            Junction::Start => {
                let id = self.new_outline();
                self.slots[x] = Some(id);
                self.slots[x + 1] = Some(id);
                self.outlines[id].append(at(x + 1));
                self.outlines[id].append(at(x));
            }
            Junction::ExtendFromRight => {
                self.slots[x] = right;
                self.slots[x + 1] = None;
                self.append_at(x, at(x));
            }
            Junction::ExtendFromLeft { after_corner } => {
                self.slots[x + 1] = left;
                if after_corner {
                    self.slots[x] = corner.outline;
                    self.append_at(x, at(x));
                } else {
                    self.slots[x] = None;
                }
                self.prepend_at(x + 1, at(x + 1));
            }
            Junction::Close => {
                self.slots[x + 1] = None;
                self.slots[x] = corner.at(x);
            }
            Junction::CornerStart | Junction::CornerContinue | Junction::CornerHandOff => {
                unreachable!("saddles are resolved on lower edges")
            }
            Junction::Merge => {
                if let (Some(keep), Some(absorb)) = (left, right) {
                    let points = std::mem::take(&mut self.outlines[absorb].points);
                    self.outlines[keep].prepend_outline(points);
                    self.relink(x, keep, absorb, corner);
                }
            }
        }
    }

    fn lower_edge(&mut self, x: usize, y: usize, junction: Junction, corner: &mut Corner) {
        let at = |x: usize| IVec2::new(x as i32, y as i32);
        let (left, right) = (self.slots[x], self.slots[x + 1]);

        match junction {
            Junction::Start => {
                let id = self.new_outline();
                self.slots[x] = Some(id);
                self.slots[x + 1] = Some(id);
                self.outlines[id].append(at(x));
                self.outlines[id].append(at(x + 1));
            }
            Junction::CornerStart => {
                let id = self.new_outline();
                self.slots[x] = Some(id);
                self.outlines[id].append(at(x));
                self.outlines[id].append(at(x + 1));
                *corner = Corner {
                    x: Some(x + 1),
                    outline: Some(id),
                };
            }
            Junction::ExtendFromRight => {
                self.slots[x] = right;
                self.slots[x + 1] = None;
                self.prepend_at(x, at(x));
            }
            Junction::ExtendFromLeft { after_corner } => {
                self.slots[x + 1] = left;
                if after_corner {
                    self.slots[x] = corner.outline;
                    self.prepend_at(x, at(x));
                } else {
                    self.slots[x] = None;
                }
                self.append_at(x + 1, at(x + 1));
            }
            Junction::CornerContinue => {
                self.slots[x] = None;
                self.append_at(x + 1, at(x + 1));
                *corner = Corner {
                    x: Some(x + 1),
                    outline: self.slots[x + 1],
                };
            }
            Junction::Close => {
                if let Some(id) = left {
                    let outline = std::mem::take(&mut self.outlines[id]);
                    self.polygons.push(outline.into_polygon());
                }
                self.slots[x + 1] = None;
                self.slots[x] = corner.at(x);
            }
            Junction::CornerHandOff => {
                if let (Some(l), Some(r)) = (left, right) {
                    self.outlines[l].append(at(x + 1));
                    self.outlines[r].prepend(at(x + 1));
                    *corner = Corner {
                        x: Some(x + 1),
                        outline: Some(l),
                    };
                }
                self.slots[x] = None;
            }
            Junction::Merge => {
                if let (Some(keep), Some(absorb)) = (left, right) {
                    let points = std::mem::take(&mut self.outlines[absorb].points);
                    self.outlines[keep].append_outline(points);
                    self.relink(x, keep, absorb, corner);
                }
            }
        }
    }

    /// Points the other boundary still holding `absorb` at `keep`, then
    /// releases the two boundaries around pixel `x`.
    fn relink(&mut self, x: usize, keep: OutlineId, absorb: OutlineId, corner: &Corner) {
        let other = (0..self.slots.len()).find(|&i| i != x + 1 && self.slots[i] == Some(absorb));
        debug_assert!(other.is_some(), "merged outline has no second end");
        if let Some(i) = other {
            self.slots[i] = Some(keep);
        }
        self.slots[x + 1] = None;
        self.slots[x] = corner.at(x);
    }
}

/// Signed shoelace area; the sign depends on the winding.
pub fn signed_area(polygon: &[IVec2]) -> i64 {
    let n = polygon.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    twice / 2
}
