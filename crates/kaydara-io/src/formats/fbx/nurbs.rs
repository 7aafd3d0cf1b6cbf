//! `NurbsCurve` geometries, sampled into polylines.

use glam::{Vec3, Vec4};
use kaydara_core::Node;
use log::warn;

use super::context::DecodeContext;
use crate::scene::{LineMesh, NurbsCurve};

/// Samples taken per control point.
const SAMPLES_PER_POINT: usize = 12;

impl NurbsCurve {
    /// Point at `t` in `[0, 1]` across the usable knot range.
    pub fn point(&self, t: f64) -> Vec3 {
        let (Some(&first), Some(&last)) = (self.knots.get(self.start_knot), self.knots.get(self.end_knot)) else {
            return Vec3::ZERO;
        };
        let u = first + t * (last - first);
        let h = bspline_point(self.degree, &self.knots, &self.control_points, u);
        if h.w != 1.0 && h.w != 0.0 {
            (h / h.w).truncate()
        } else {
            h.truncate()
        }
    }

    /// `divisions + 1` evenly spaced points.
    pub fn points(&self, divisions: usize) -> Vec<Vec3> {
        if divisions == 0 {
            return vec![self.point(0.0)];
        }
        (0..=divisions)
            .map(|d| self.point(d as f64 / divisions as f64))
            .collect()
    }
}

/// Knot span holding `u`.
fn find_span(degree: usize, u: f64, knots: &[f64]) -> usize {
    let n = knots.len().saturating_sub(degree + 1);
    if u >= knots[n] {
        return n.saturating_sub(1);
    }
    if u <= knots[degree] {
        return degree;
    }

    let mut low = degree;
    let mut high = n;
    let mut mid = (low + high) / 2;
    while (u < knots[mid] || u >= knots[mid + 1]) && high - low > 1 {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Non-zero basis functions at `u` for `span`.
fn basis_functions(span: usize, u: f64, degree: usize, knots: &[f64]) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;

        let mut saved = 0.0;
        for r in 0..j {
            let rv = right[r + 1];
            let lv = left[j - r];
            let denom = rv + lv;
            let temp = if denom != 0.0 { n[r] / denom } else { 0.0 };
            n[r] = saved + rv * temp;
            saved = lv * temp;
        }
        n[j] = saved;
    }
    n
}

/// Homogeneous curve point (x, y, z weighted, w the summed weight).
fn bspline_point(degree: usize, knots: &[f64], points: &[Vec4], u: f64) -> Vec4 {
    let needed = degree.checked_add(1).and_then(|d| d.checked_mul(2));
    if needed.map_or(true, |n| knots.len() < n) || points.is_empty() {
        return Vec4::ZERO;
    }
    let span = find_span(degree, u, knots);
    let basis = basis_functions(span, u, degree, knots);

    let mut c = Vec4::ZERO;
    for (j, nj) in basis.iter().enumerate() {
        let Some(p) = (span + j).checked_sub(degree).and_then(|i| points.get(i)) else {
            continue;
        };
        let nj = *nj as f32;
        let wnj = p.w * nj;
        c += Vec4::new(p.x * wnj, p.y * wnj, p.z * wnj, p.w * nj);
    }
    c
}

/// Read the curve definition of a `NurbsCurve` geometry.
///
/// Returns `None` when the order is missing or below 1.
pub(crate) fn curve_definition(node: &Node) -> Option<NurbsCurve> {
    let order = node.value_i64("Order").filter(|o| *o >= 1)?;
    let degree = (order - 1) as usize;

    let knots = node.array_f64("KnotVector").unwrap_or_default();
    let mut control_points: Vec<Vec4> = node
        .array_f64("Points")
        .unwrap_or_default()
        .chunks_exact(4)
        .map(|c| Vec4::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32))
        .collect();

    let mut start_knot = 0;
    let mut end_knot = knots.len().saturating_sub(1);

    match node.value_str("Form") {
        Some("Closed") => {
            if let Some(&first) = control_points.first() {
                control_points.push(first);
            }
        }
        Some("Periodic") => {
            start_knot = degree;
            end_knot = knots.len().saturating_sub(1 + degree);
            let wrap: Vec<Vec4> = control_points.iter().take(degree).copied().collect();
            control_points.extend(wrap);
        }
        _ => {}
    }

    Some(NurbsCurve {
        degree,
        control_points,
        knots,
        start_knot,
        end_knot,
    })
}

pub(crate) fn parse_nurbs_curve(ctx: &DecodeContext<'_>, node: &Node) -> LineMesh {
    let mut lines = LineMesh::new();
    lines.name = node.attr_name.clone().unwrap_or_default();

    let Some(curve) = curve_definition(node) else {
        warn!(
            "Invalid Order {:?} given for geometry {:?}",
            node.value_i64("Order"),
            node.numeric_id()
        );
        return lines;
    };
    if curve.knots.is_empty() || curve.control_points.is_empty() {
        ctx.warn_once("empty-nurbs", "NURBS curve without knots or control points");
        return lines;
    }

    let points = curve.points(curve.control_points.len() * SAMPLES_PER_POINT);
    lines.add_polyline(&points);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fbx::test_util::parse_doc;
    use crate::registry::ReadOptions;

    fn curve(body: &str) -> LineMesh {
        let doc = format!(
            "Objects:  {{\n\tGeometry: 4100, \"Geometry::Curve\", \"NurbsCurve\" {{\n{}\n\t}}\n}}\n",
            body
        );
        let tree = parse_doc(&doc);
        let options = ReadOptions::default();
        let ctx = DecodeContext::new(&tree, &options);
        let node = tree.object("Geometry", 4100).unwrap();
        parse_nurbs_curve(&ctx, node)
    }

    #[test]
    fn test_linear_curve() {
        let lines = curve(
            "Order: 2\nForm: \"Open\"\nPoints: *8 {\na: 0,0,0,1,2,0,0,1\n}\nKnotVector: *4 {\na: 0,0,1,1\n}",
        );
        assert_eq!(lines.name, "Curve");
        assert_eq!(lines.vertex_count(), 25);
        assert_eq!(lines.line_count(), 24);
        assert!(lines.positions[0].abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(lines.positions[12].abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
        assert!(lines.positions[24].abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_closed_curve_repeats_first_point() {
        let node_body =
            "Order: 2\nForm: \"Closed\"\nPoints: *12 {\na: 0,0,0,1,1,0,0,1,1,1,0,1\n}\nKnotVector: *6 {\na: 0,0,1,2,3,3\n}";
        let lines = curve(node_body);
        assert_eq!(lines.vertex_count(), 4 * SAMPLES_PER_POINT + 1);
        let last = *lines.positions.last().unwrap();
        assert!(last.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn test_rational_weights_are_divided_out() {
        let c = NurbsCurve {
            degree: 1,
            control_points: vec![Vec4::new(0.0, 0.0, 0.0, 2.0), Vec4::new(4.0, 0.0, 0.0, 2.0)],
            knots: vec![0.0, 0.0, 1.0, 1.0],
            start_knot: 0,
            end_knot: 3,
        };
        assert!(c.point(0.5).abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_invalid_order_gives_empty_lines() {
        let lines = curve("Order: 0\nKnotVector: *2 {\na: 0,1\n}");
        assert_eq!(lines.vertex_count(), 0);
        let lines = curve("KnotVector: *2 {\na: 0,1\n}");
        assert_eq!(lines.vertex_count(), 0);
        assert_eq!(bspline_point(usize::MAX, &[0.0, 1.0], &[Vec4::ONE], 0.5), Vec4::ZERO);
    }
}
