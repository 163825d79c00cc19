//! Incremental Bowyer–Watson Delaunay triangulation over `f64` coordinates.
//!
//! The vertex adjacency of the triangulation is the edge-sharing relation of
//! the dual Voronoi cells, which is what the first-shell neighbour query
//! needs. Exact duplicate sites are skipped during insertion; callers alias
//! their neighbourhoods afterwards.

/// Triangulation of a point set. Triangle vertices index into the input slice.
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Triangles as counter-clockwise vertex index triples.
    pub triangles: Vec<[usize; 3]>,
    site_count: usize,
}

impl Triangulation {
    /// Symmetric vertex adjacency, each list sorted ascending.
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.site_count];
        for tri in &self.triangles {
            for (i, j) in [(0, 1), (1, 2), (2, 0)] {
                let (a, b) = (tri[i], tri[j]);
                if !adjacency[a].contains(&b) {
                    adjacency[a].push(b);
                }
                if !adjacency[b].contains(&a) {
                    adjacency[b].push(a);
                }
            }
        }
        for list in &mut adjacency {
            list.sort_unstable();
        }
        adjacency
    }
}

/// Triangulate a point set. Fewer than three distinct, non-collinear sites
/// produce an empty triangle list.
#[must_use]
pub fn triangulate(points: &[(f64, f64)]) -> Triangulation {
    let n = points.len();
    if n < 3 {
        return Triangulation {
            triangles: Vec::new(),
            site_count: n,
        };
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let cx = (min_x + max_x) / 2.0;
    let cy = (min_y + max_y) / 2.0;

    // Vertices n, n+1, n+2 form a triangle enclosing every site with margin.
    let mut verts: Vec<(f64, f64)> = points.to_vec();
    verts.push((cx - 20.0 * span, cy - 2.0 * span));
    verts.push((cx + 20.0 * span, cy - 2.0 * span));
    verts.push((cx, cy + 20.0 * span));

    let mut triangles: Vec<[usize; 3]> = vec![oriented(&verts, [n, n + 1, n + 2])];

    for p in 0..n {
        if points[..p].iter().any(|&q| q == points[p]) {
            continue;
        }

        let mut bad: Vec<usize> = Vec::new();
        for (ti, tri) in triangles.iter().enumerate() {
            if in_circumcircle(&verts, *tri, verts[p]) {
                bad.push(ti);
            }
        }

        // Cavity boundary: edges belonging to exactly one bad triangle.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &ti in &bad {
            let [a, b, c] = triangles[ti];
            for edge in [(a, b), (b, c), (c, a)] {
                let key = unordered(edge);
                match boundary.iter().position(|&e| unordered(e) == key) {
                    Some(pos) => {
                        boundary.swap_remove(pos);
                    }
                    None => boundary.push(edge),
                }
            }
        }

        for ti in bad.into_iter().rev() {
            triangles.swap_remove(ti);
        }
        for (a, b) in boundary {
            triangles.push(oriented(&verts, [a, b, p]));
        }
    }

    // Drop triangles touching the enclosing vertices, and any degenerate
    // slivers produced by collinear runs of sites.
    triangles.retain(|tri| {
        tri.iter().all(|&v| v < n) && signed_area(&verts, *tri).abs() > f64::EPSILON * span * span
    });
    Triangulation {
        triangles,
        site_count: n,
    }
}

fn unordered((a, b): (usize, usize)) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn signed_area(verts: &[(f64, f64)], [a, b, c]: [usize; 3]) -> f64 {
    let (ax, ay) = verts[a];
    let (bx, by) = verts[b];
    let (cx, cy) = verts[c];
    (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
}

fn oriented(verts: &[(f64, f64)], tri: [usize; 3]) -> [usize; 3] {
    if signed_area(verts, tri) < 0.0 {
        [tri[0], tri[2], tri[1]]
    } else {
        tri
    }
}

/// Strict containment of `p` in the circumcircle of the (counter-clockwise)
/// triangle, via the standard lifted determinant.
fn in_circumcircle(verts: &[(f64, f64)], tri: [usize; 3], p: (f64, f64)) -> bool {
    let (px, py) = p;
    let (ax, ay) = verts[tri[0]];
    let (bx, by) = verts[tri[1]];
    let (cx, cy) = verts[tri[2]];

    let adx = ax - px;
    let ady = ay - py;
    let bdx = bx - px;
    let bdy = by - py;
    let cdx = cx - px;
    let cdy = cy - py;

    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;

    let det = adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx)
        + ad * (bdx * cdy - bdy * cdx);
    det > 0.0
}
