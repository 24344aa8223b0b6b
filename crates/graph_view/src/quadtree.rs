//! Barnes-Hut quadtree for the charge force on large layouts.

const LEAF_CAPACITY: usize = 12;
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Bounds {
    cx: f64,
    cy: f64,
    half: f64,
}

impl Bounds {
    fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        let span = (max_x - min_x).max(max_y - min_y).max(1.0);
        Some(Self {
            cx: (min_x + max_x) / 2.0,
            cy: (min_y + max_y) / 2.0,
            half: span / 2.0 + 1.0,
        })
    }

    fn quadrant(&self, (x, y): (f64, f64)) -> usize {
        match (x >= self.cx, y >= self.cy) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    fn child(&self, quadrant: usize) -> Self {
        let q = self.half / 2.0;
        let (dx, dy) = match quadrant {
            0 => (-q, -q),
            1 => (q, -q),
            2 => (-q, q),
            _ => (q, q),
        };
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            half: q,
        }
    }
}

/// One cell: total mass (node count), centre of mass, and either member
/// indices (leaf) or children.
#[derive(Debug)]
pub(crate) struct QuadNode {
    bounds: Bounds,
    com_x: f64,
    com_y: f64,
    mass: f64,
    indices: Vec<usize>,
    children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    /// Build over `points`; `None` when a coordinate is not finite.
    pub(crate) fn build(points: &[(f64, f64)]) -> Option<Self> {
        let bounds = Bounds::from_points(points)?;
        Some(Self::build_node(bounds, (0..points.len()).collect(), points, 0))
    }

    fn build_node(
        bounds: Bounds,
        indices: Vec<usize>,
        points: &[(f64, f64)],
        depth: usize,
    ) -> Self {
        let mass = indices.len() as f64;
        let (sx, sy) = indices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &i| (sx + points[i].0, sy + points[i].1));
        let (com_x, com_y) = if mass > 0.0 { (sx / mass, sy / mass) } else { (0.0, 0.0) };

        let mut node = Self {
            bounds,
            com_x,
            com_y,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };
        if depth >= MAX_DEPTH || node.indices.len() <= LEAF_CAPACITY {
            return node;
        }

        let mut buckets: [Vec<usize>; 4] = std::array::from_fn(|_| Vec::new());
        for &i in &node.indices {
            buckets[bounds.quadrant(points[i])].push(i);
        }
        if buckets.iter().filter(|b| !b.is_empty()).count() <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if !bucket.is_empty() {
                node.children[quadrant] = Some(Box::new(Self::build_node(
                    bounds.child(quadrant),
                    bucket,
                    points,
                    depth + 1,
                )));
            }
        }
        node.indices.clear();
        node
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Velocity change on point `i` from every other point, scaled by
    /// `strength` (charge times alpha). Cells whose width over distance is
    /// below `theta` act as a single body.
    pub(crate) fn force_on(
        &self,
        i: usize,
        points: &[(f64, f64)],
        theta: f64,
        strength: f64,
    ) -> (f64, f64) {
        let (x, y) = points[i];
        if self.is_leaf() {
            let mut acc = (0.0, 0.0);
            for &j in &self.indices {
                if j == i {
                    continue;
                }
                let (dx, dy) = (points[j].0 - x, points[j].1 - y);
                let l = dx * dx + dy * dy;
                if l == 0.0 {
                    continue;
                }
                let w = strength / if l < 1.0 { l.sqrt() } else { l };
                acc.0 += dx * w;
                acc.1 += dy * w;
            }
            return acc;
        }

        let (dx, dy) = (self.com_x - x, self.com_y - y);
        let l = dx * dx + dy * dy;
        let width = self.bounds.half * 2.0;
        if l > 0.0 && width * width < theta * theta * l {
            let w = strength * self.mass / if l < 1.0 { l.sqrt() } else { l };
            return (dx * w, dy * w);
        }

        self.children
            .iter()
            .flatten()
            .map(|child| child.force_on(i, points, theta, strength))
            .fold((0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1))
    }
}
