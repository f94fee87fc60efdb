//! Interval sweep behind [`Attr::xor`].

use crate::attr::{Attr, ValueAttr};
use crate::error::{AttrError, Result};
use crate::value::{FieldPath, Value};

struct Interval<'a> {
    attr: &'a ValueAttr,
    lo:   &'a Value,
    hi:   &'a Value,
}

impl Interval<'_> {
    fn covers(&self, lo: &Value, hi: &Value) -> bool { self.lo <= lo && hi <= self.hi }

    fn is_point(&self) -> bool { self.lo == self.hi }
}

/// A single-point range of `points` that a wider range of `ranges` covers.
/// Removing it would leave a punctured range, which bounds cannot express.
fn punctures<'a>(points: &'a [Interval<'a>], ranges: &[Interval<'_>]) -> Option<&'a Interval<'a>> {
    points
        .iter()
        .filter(|iv| iv.is_point())
        .find(|iv| ranges.iter().any(|r| !r.is_point() && r.covers(iv.lo, iv.hi)))
}

fn leaf_interval(attr: &Attr) -> Result<Interval<'_>> {
    match attr {
        Attr::Value(leaf) => match leaf.bounds() {
            Some((lo, hi)) => Ok(Interval { attr: leaf, lo, hi }),
            None => Err(AttrError::XorUnsupported(leaf.to_string())),
        },
        other => Err(AttrError::XorUnsupported(other.to_string())),
    }
}

fn intervals(attr: &Attr) -> Result<Vec<Interval<'_>>> {
    match attr {
        Attr::Or(or) => or.attrs().map(leaf_interval).collect(),
        other => leaf_interval(other).map(|iv| vec![iv]),
    }
}

fn unbounded_fields<'a>(attr: &'a ValueAttr, lo: &FieldPath, hi: &FieldPath) -> Vec<(&'a FieldPath, &'a Value)> {
    attr.fields()
        .iter()
        .filter(|(path, _)| *path != lo && *path != hi)
        .collect()
}

/// Same type, same bound fields, and equal on everything but the bounds.
fn compatible(template: &ValueAttr, other: &ValueAttr) -> bool {
    if template.ty() != other.ty() || template.bound_paths() != other.bound_paths() {
        return false;
    }
    match template.bound_paths() {
        Some((lo, hi)) => unbounded_fields(template, lo, hi) == unbounded_fields(other, lo, hi),
        None => false,
    }
}

/// Pieces covered by exactly one operand. The sweep visits every end point
/// and every gap between neighbouring end points; kept pieces that touch are
/// merged and each is emitted as a copy of the first operand leaf with new
/// bounds.
pub(crate) fn symmetric_difference(a: &Attr, b: &Attr) -> Result<Attr> {
    let left = intervals(a)?;
    let right = intervals(b)?;

    let Some(template) = left.first().or(right.first()).map(|iv| iv.attr) else {
        return Ok(Attr::empty());
    };
    if let Some(bad) = left.iter().chain(&right).find(|iv| !compatible(template, iv.attr)) {
        return Err(AttrError::XorUnsupported(format!("{template} and {}", bad.attr)));
    }
    if let Some(point) = punctures(&left, &right).or_else(|| punctures(&right, &left)) {
        return Err(AttrError::XorUnsupported(format!("{} lies inside a wider range", point.attr)));
    }

    let mut points: Vec<&Value> = left.iter().chain(&right).flat_map(|iv| [iv.lo, iv.hi]).collect();
    points.sort();
    points.dedup();

    let covered = |set: &[Interval<'_>], lo: &Value, hi: &Value| set.iter().any(|iv| iv.covers(lo, hi));
    let kept = |lo: &Value, hi: &Value| covered(&left, lo, hi) != covered(&right, lo, hi);

    let mut windows: Vec<(Value, Value)> = Vec::new();
    for (i, &point) in points.iter().enumerate() {
        let touching = matches!(windows.last(), Some(last) if last.1 == *point);
        if kept(point, point) && !touching {
            windows.push((point.clone(), point.clone()));
        }
        let Some(&next) = points.get(i + 1) else { break };
        if !kept(point, next) {
            continue;
        }
        match windows.last_mut() {
            Some(last) if last.1 == *point => last.1 = next.clone(),
            _ => windows.push((point.clone(), next.clone())),
        }
    }

    Ok(Attr::any(
        windows
            .into_iter()
            .map(|(lo, hi)| Attr::Value(template.rebound(lo, hi))),
    ))
}

#[cfg(test)]
mod tests {
    use crate::attr::{Attr, AttrType, ValueAttr};

    const SPAN: AttrType = AttrType::new("span");

    fn span(lo: f64, hi: f64) -> Attr {
        ValueAttr::typed(SPAN, [("span.min", lo), ("span.max", hi)])
            .exclusive()
            .with_bounds("span.min", "span.max")
            .into()
    }

    #[test]
    fn test_xor_splits_enclosing_window() {
        let one = span(0.0, 1000.0).xor(span(200.0, 400.0)).unwrap();
        assert_eq!(one, span(0.0, 200.0) | span(400.0, 1000.0));

        let two = one.xor(span(600.0, 800.0)).unwrap();
        assert_eq!(two, span(0.0, 200.0) | span(400.0, 600.0) | span(800.0, 1000.0));
    }

    #[test]
    fn test_xor_disjoint_is_union() {
        assert_eq!(span(0.0, 1.0).xor(span(2.0, 3.0)).unwrap(), span(0.0, 1.0) | span(2.0, 3.0));
    }

    #[test]
    fn test_xor_with_self_is_empty() {
        assert!(span(0.0, 1.0).xor(span(0.0, 1.0)).unwrap().is_empty());
    }

    #[test]
    fn test_xor_rejoins_touching_windows() {
        let split = span(0.0, 1000.0).xor(span(200.0, 400.0)).unwrap();
        assert_eq!(split.xor(span(200.0, 400.0)).unwrap(), span(0.0, 1000.0));
    }

    #[test]
    fn test_xor_keeps_single_points() {
        let points = span(1.0, 1.0).xor(span(2.0, 2.0)).unwrap();
        assert_eq!(points, span(1.0, 1.0) | span(2.0, 2.0));
        assert_eq!(points.xor(span(2.0, 2.0)).unwrap(), span(1.0, 1.0));

        let mixed = span(0.0, 10.0).xor(span(20.0, 20.0)).unwrap();
        assert_eq!(mixed, span(0.0, 10.0) | span(20.0, 20.0));
        assert_eq!(mixed.xor(span(20.0, 20.0)).unwrap(), span(0.0, 10.0));

        assert!(span(3.0, 3.0).xor(span(3.0, 3.0)).unwrap().is_empty());
    }

    #[test]
    fn test_xor_rejects_point_inside_range() {
        assert!(span(0.0, 10.0).xor(span(5.0, 5.0)).is_err());
        assert!(span(10.0, 10.0).xor(span(0.0, 10.0)).is_err());
    }

    #[test]
    fn test_xor_rejects_unbounded_and_mixed_types() {
        let plain: Attr = ValueAttr::new([("instrument", "eit")]).into();
        assert!(plain.xor(span(0.0, 1.0)).is_err());

        let other: Attr = ValueAttr::typed(AttrType::new("other"), [("span.min", 0.0), ("span.max", 1.0)])
            .with_bounds("span.min", "span.max")
            .into();
        assert!(span(0.0, 1.0).xor(other).is_err());

        let conj = span(0.0, 1.0).and(plain).unwrap();
        assert!(conj.xor(span(0.0, 1.0)).is_err());
    }
}
