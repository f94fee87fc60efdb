use helio_attr::{Attr, AttrError, AttrType, ValueAttr};
use proptest::prelude::*;

const INSTRUMENT: AttrType = AttrType::new("instrument");
const SOURCE: AttrType = AttrType::new("source");
const SPAN: AttrType = AttrType::new("span");

fn instrument(name: &str) -> Attr { ValueAttr::typed(INSTRUMENT, [("instrument", name)]).exclusive().into() }

fn source(name: &str) -> Attr { ValueAttr::typed(SOURCE, [("source", name)]).exclusive().into() }

fn span(lo: i64, hi: i64) -> Attr {
    ValueAttr::typed(SPAN, [("span.min", lo), ("span.max", hi)])
        .exclusive()
        .with_bounds("span.min", "span.max")
        .into()
}

fn leaf() -> impl Strategy<Value = Attr> {
    prop_oneof![
        prop::sample::select(vec!["eit", "mdi", "aia"]).prop_map(instrument),
        prop::sample::select(vec!["soho", "sdo"]).prop_map(source),
    ]
}

/// Trees built from OR-ed conjunctions of one or two leaves. Conjunctions
/// that would violate exclusivity are skipped.
fn tree() -> impl Strategy<Value = Attr> {
    prop::collection::vec((leaf(), leaf()), 1..4).prop_map(|pairs| {
        Attr::any(
            pairs
                .into_iter()
                .map(|(a, b)| a.and(&b).unwrap_or(a)),
        )
    })
}

fn is_normalised(attr: &Attr) -> bool {
    attr.disjuncts()
        .into_iter()
        .all(|d| !matches!(d, Attr::Or(_)))
}

/// `point` is a single-point range lying within the wider `range`.
fn point_inside(point: (i64, i64), range: (i64, i64)) -> bool {
    point.0 == point.1 && range.0 < range.1 && range.0 <= point.0 && point.0 <= range.1
}

fn interval() -> impl Strategy<Value = (i64, i64)> { (0i64..50, 0i64..50).prop_map(|(lo, len)| (lo, lo + len)) }

proptest! {
    #[test]
    fn or_is_commutative(a in tree(), b in tree()) {
        prop_assert_eq!(a.clone() | b.clone(), b | a);
    }

    #[test]
    fn or_is_associative(a in tree(), b in tree(), c in tree()) {
        prop_assert_eq!((a.clone() | b.clone()) | c.clone(), a | (b | c));
    }

    #[test]
    fn or_is_idempotent(a in tree()) {
        prop_assert_eq!(a.clone() | a.clone(), a);
    }

    #[test]
    fn and_is_commutative(a in tree(), b in tree()) {
        match (a.and(&b), b.and(&a)) {
            (Ok(ab), Ok(ba)) => prop_assert_eq!(ab, ba),
            (Err(_), Err(_)) => {}
            (ab, ba) => prop_assert!(false, "asymmetric results: {:?} vs {:?}", ab, ba),
        }
    }

    #[test]
    fn combinations_stay_normalised(a in tree(), b in tree()) {
        prop_assert!(is_normalised(&(a.clone() | b.clone())));
        if let Ok(ab) = a.and(&b) {
            prop_assert!(is_normalised(&ab));
        }
    }

    #[test]
    fn and_is_idempotent_on_leaves(a in leaf()) {
        prop_assert_eq!(a.and(&a).unwrap(), a);
    }

    #[test]
    fn and_is_associative(a in tree(), b in tree(), c in tree()) {
        let left = a.and(&b).and_then(|ab| ab.and(&c));
        let right = b.and(&c).and_then(|bc| a.and(bc));
        match (left, right) {
            (Ok(left), Ok(right)) => prop_assert_eq!(left, right),
            (Err(_), Err(_)) => {}
            (left, right) => prop_assert!(false, "grouping changed the outcome: {:?} vs {:?}", left, right),
        }
    }

    #[test]
    fn and_distributes_over_or(a in tree(), b in tree(), c in tree()) {
        let product = (a.clone() | b.clone()).and(&c);
        let spread = a.and(&c).and_then(|ac| Ok(ac | b.and(&c)?));
        match (product, spread) {
            (Ok(product), Ok(spread)) => prop_assert_eq!(product, spread),
            (Err(_), Err(_)) => {}
            (product, spread) => prop_assert!(false, "distribution changed the outcome: {:?} vs {:?}", product, spread),
        }
    }

    #[test]
    fn xor_twice_restores_the_operand((alo, ahi) in interval(), (blo, bhi) in interval()) {
        let a = span(alo, ahi);
        let b = span(blo, bhi);
        match a.xor(&b) {
            Ok(ab) => prop_assert_eq!(ab.xor(&b).unwrap(), a),
            Err(err) => {
                prop_assert!(matches!(err, AttrError::XorUnsupported(_)));
                prop_assert!(point_inside((alo, ahi), (blo, bhi)) || point_inside((blo, bhi), (alo, ahi)));
            }
        }
    }

    #[test]
    fn xor_is_commutative((alo, ahi) in interval(), (blo, bhi) in interval()) {
        let a = span(alo, ahi);
        let b = span(blo, bhi);
        match (a.xor(&b), b.xor(&a)) {
            (Ok(ab), Ok(ba)) => prop_assert_eq!(ab, ba),
            (Err(_), Err(_)) => {}
            (ab, ba) => prop_assert!(false, "asymmetric results: {:?} vs {:?}", ab, ba),
        }
    }

    #[test]
    fn xor_keeps_points_outside_the_range((lo, hi) in interval(), at in 0i64..120) {
        prop_assume!(at < lo || at > hi);
        let both = span(lo, hi).xor(span(at, at)).unwrap();
        prop_assert_eq!(both.clone(), span(lo, hi) | span(at, at));
        prop_assert_eq!(both.xor(span(lo, hi)).unwrap(), span(at, at));
    }
}

#[test]
fn test_conflict_inside_disjunction_is_reported() {
    let attr = instrument("foo") | source("foo");
    let err = attr.and(instrument("bar")).unwrap_err();
    assert!(matches!(err, AttrError::MutualExclusion { ty, .. } if ty == INSTRUMENT));
}

#[test]
fn test_distribution_over_two_disjunctions() {
    let left = instrument("eit") | instrument("mdi");
    let right = source("soho") | source("sdo");
    let product = left.and(&right).unwrap();
    assert_eq!(product.disjuncts().len(), 4);
    assert!(product.disjuncts().into_iter().all(|d| matches!(d, Attr::And(and) if and.len() == 2)));
}

#[test]
fn test_xor_of_three_windows() {
    let one = span(0, 1000).xor(span(200, 400)).unwrap();
    let two = one.xor(span(600, 800)).unwrap();
    assert_eq!(two, span(0, 200) | span(400, 600) | span(800, 1000));
}

#[test]
fn test_xor_of_single_points() {
    let a = span(1, 1);
    let b = span(2, 2);
    let ab = a.xor(&b).unwrap();
    assert_eq!(ab, span(1, 1) | span(2, 2));
    assert_eq!(ab.xor(&b).unwrap(), a);
    assert_eq!(span(0, 10).xor(span(20, 20)).unwrap(), span(0, 10) | span(20, 20));
}
