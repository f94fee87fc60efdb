//! Search predicates and the AND/OR/XOR algebra over them.
//!
//! Every tree produced by the combinators is kept in disjunctive normal form:
//! an [`AttrOr`] holds leaves or conjunctions, an [`AttrAnd`] holds leaves
//! only. Children are stored in ordered sets, so equality is structural and
//! independent of the order in which operands were combined.

use std::collections::{BTreeMap, BTreeSet};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitOr, BitOrAssign};

use crate::error::{AttrError, Result};
use crate::range;
use crate::value::{FieldPath, Value};

/// Logical attribute type.
///
/// Used as the applier key of the [`Walker`](crate::Walker) and, for exclusive
/// attributes, as the exclusivity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrType(&'static str);

impl AttrType {
    /// Untyped leaves built directly from a field map.
    pub const VALUE: AttrType = AttrType("value");

    pub const fn new(name: &'static str) -> Self { Self(name) }

    pub fn name(&self) -> &'static str { self.0 }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.0) }
}

/// Leaf predicate: a mapping from field paths to values.
///
/// Two leaves are equal iff their field maps are equal; the type tag,
/// exclusivity flag and range bounds do not take part in comparisons.
#[derive(Debug, Clone)]
pub struct ValueAttr {
    ty:        AttrType,
    exclusive: bool,
    fields:    BTreeMap<FieldPath, Value>,
    bounds:    Option<(FieldPath, FieldPath)>,
}

impl ValueAttr {
    /// An untyped, non-exclusive leaf.
    pub fn new<I, P, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<FieldPath>,
        V: Into<Value>,
    {
        Self::typed(AttrType::VALUE, fields)
    }

    pub fn typed<I, P, V>(ty: AttrType, fields: I) -> Self
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<FieldPath>,
        V: Into<Value>,
    {
        Self {
            ty,
            exclusive: false,
            fields: fields.into_iter().map(|(p, v)| (p.into(), v.into())).collect(),
            bounds: None,
        }
    }

    /// Mark the leaf as exclusive within its type: two unequal leaves of the
    /// same type cannot appear in one conjunction.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Declare the fields holding the low and high end of an interval. Only
    /// bounded leaves take part in XOR.
    #[must_use]
    pub fn with_bounds(mut self, lo: impl Into<FieldPath>, hi: impl Into<FieldPath>) -> Self {
        self.bounds = Some((lo.into(), hi.into()));
        self
    }

    pub fn ty(&self) -> AttrType { self.ty }

    pub fn is_exclusive(&self) -> bool { self.exclusive }

    pub fn fields(&self) -> &BTreeMap<FieldPath, Value> { &self.fields }

    pub fn get(&self, path: impl Into<FieldPath>) -> Option<&Value> { self.fields.get(&path.into()) }

    pub fn bound_paths(&self) -> Option<(&FieldPath, &FieldPath)> {
        self.bounds.as_ref().map(|(lo, hi)| (lo, hi))
    }

    /// Current `(low, high)` values of a bounded leaf, in ascending order.
    pub fn bounds(&self) -> Option<(&Value, &Value)> {
        let (lo, hi) = self.bounds.as_ref()?;
        let (lo, hi) = (self.fields.get(lo)?, self.fields.get(hi)?);
        Some(if hi < lo { (hi, lo) } else { (lo, hi) })
    }

    /// Copy of this leaf with its interval replaced.
    pub(crate) fn rebound(&self, lo: Value, hi: Value) -> ValueAttr {
        let mut attr = self.clone();
        if let Some((lo_path, hi_path)) = &self.bounds {
            attr.fields.insert(lo_path.clone(), lo);
            attr.fields.insert(hi_path.clone(), hi);
        }
        attr
    }
}

impl PartialEq for ValueAttr {
    fn eq(&self, other: &Self) -> bool { self.fields == other.fields }
}

impl Eq for ValueAttr {}

impl PartialOrd for ValueAttr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ValueAttr {
    fn cmp(&self, other: &Self) -> Ordering { self.fields.cmp(&other.fields) }
}

impl Hash for ValueAttr {
    fn hash<H: Hasher>(&self, state: &mut H) { self.fields.hash(state) }
}

impl fmt::Display for ValueAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ty)?;
        for (i, (path, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{path}={value}")?;
        }
        f.write_str(")")
    }
}

/// Conjunction of leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrAnd {
    attrs: BTreeSet<ValueAttr>,
}

impl AttrAnd {
    pub fn attrs(&self) -> impl Iterator<Item = &ValueAttr> { self.attrs.iter() }

    pub fn len(&self) -> usize { self.attrs.len() }

    pub fn is_empty(&self) -> bool { self.attrs.is_empty() }
}

/// Disjunction of leaves and conjunctions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrOr {
    attrs: BTreeSet<Attr>,
}

impl AttrOr {
    pub fn attrs(&self) -> impl Iterator<Item = &Attr> { self.attrs.iter() }

    pub fn len(&self) -> usize { self.attrs.len() }

    pub fn is_empty(&self) -> bool { self.attrs.is_empty() }
}

/// A search predicate tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attr {
    Value(ValueAttr),
    And(AttrAnd),
    Or(AttrOr),
}

impl Attr {
    /// The empty selection: a disjunction without alternatives.
    pub fn empty() -> Attr { Attr::Or(AttrOr::default()) }

    pub fn is_empty(&self) -> bool { matches!(self, Attr::Or(or) if or.is_empty()) }

    /// Conjoin two trees, distributing over disjunctions.
    ///
    /// Fails with [`AttrError::MutualExclusion`] as soon as any resulting
    /// conjunction would hold two unequal leaves of one exclusive type.
    pub fn and(&self, other: impl Into<Attr>) -> Result<Attr> { conjoin(self, &other.into()) }

    pub fn or(&self, other: impl Into<Attr>) -> Attr { disjoin(self.clone(), other.into()) }

    /// Symmetric difference of two range selections.
    pub fn xor(&self, other: impl Into<Attr>) -> Result<Attr> {
        range::symmetric_difference(self, &other.into())
    }

    /// AND over any number of trees. No operands select everything.
    pub fn all<I>(attrs: I) -> Result<Attr>
    where
        I: IntoIterator,
        I::Item: Into<Attr>,
    {
        attrs
            .into_iter()
            .try_fold(Attr::And(AttrAnd::default()), |acc, attr| acc.and(attr))
    }

    /// OR over any number of trees. No operands select nothing.
    pub fn any<I>(attrs: I) -> Attr
    where
        I: IntoIterator,
        I::Item: Into<Attr>,
    {
        attrs
            .into_iter()
            .fold(Attr::empty(), |acc, attr| disjoin(acc, attr.into()))
    }

    /// Top-level alternatives; each is a leaf or a conjunction.
    pub fn disjuncts(&self) -> Vec<&Attr> {
        match self {
            Attr::Or(or) => or.attrs().collect(),
            other => vec![other],
        }
    }

    fn leaves(&self) -> Vec<&ValueAttr> {
        match self {
            Attr::Value(leaf) => vec![leaf],
            Attr::And(and) => and.attrs().collect(),
            Attr::Or(or) => or.attrs().flat_map(Attr::leaves).collect(),
        }
    }
}

fn conjoin(a: &Attr, b: &Attr) -> Result<Attr> {
    match (a, b) {
        (Attr::Or(or), other) | (other, Attr::Or(or)) => {
            let mut out = BTreeSet::new();
            for child in or.attrs() {
                insert_disjunct(&mut out, conjoin(child, other)?);
            }
            Ok(collapse_or(out))
        }
        _ => {
            let leaves: BTreeSet<ValueAttr> = a.leaves().into_iter().chain(b.leaves()).cloned().collect();
            check_exclusive(&leaves)?;
            Ok(collapse_and(leaves))
        }
    }
}

fn disjoin(a: Attr, b: Attr) -> Attr {
    let mut out = BTreeSet::new();
    insert_disjunct(&mut out, a);
    insert_disjunct(&mut out, b);
    collapse_or(out)
}

fn insert_disjunct(out: &mut BTreeSet<Attr>, attr: Attr) {
    match attr {
        Attr::Or(or) => out.extend(or.attrs),
        other => {
            out.insert(other);
        }
    }
}

fn collapse_or(mut attrs: BTreeSet<Attr>) -> Attr {
    if attrs.len() == 1 {
        if let Some(only) = attrs.pop_first() {
            return only;
        }
    }
    Attr::Or(AttrOr { attrs })
}

fn collapse_and(mut attrs: BTreeSet<ValueAttr>) -> Attr {
    if attrs.len() == 1 {
        if let Some(only) = attrs.pop_first() {
            return Attr::Value(only);
        }
    }
    Attr::And(AttrAnd { attrs })
}

fn check_exclusive(leaves: &BTreeSet<ValueAttr>) -> Result<()> {
    let mut seen: BTreeMap<AttrType, &ValueAttr> = BTreeMap::new();
    for leaf in leaves.iter().filter(|leaf| leaf.exclusive) {
        if let Some(first) = seen.insert(leaf.ty, leaf) {
            return Err(AttrError::MutualExclusion {
                ty:    leaf.ty,
                left:  first.to_string(),
                right: leaf.to_string(),
            });
        }
    }
    Ok(())
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Value(leaf) => write!(f, "{leaf}"),
            Attr::And(and) => {
                let parts: Vec<String> = and.attrs().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" & "))
            }
            Attr::Or(or) if or.is_empty() => f.write_str("<empty>"),
            Attr::Or(or) => {
                let parts: Vec<String> = or.attrs().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" | "))
            }
        }
    }
}

impl From<ValueAttr> for Attr {
    fn from(leaf: ValueAttr) -> Self { Attr::Value(leaf) }
}

impl From<&Attr> for Attr {
    fn from(attr: &Attr) -> Self { attr.clone() }
}

impl<T: Into<Attr>> BitOr<T> for Attr {
    type Output = Attr;

    fn bitor(self, rhs: T) -> Attr { disjoin(self, rhs.into()) }
}

impl<T: Into<Attr>> BitOrAssign<T> for Attr {
    fn bitor_assign(&mut self, rhs: T) {
        let lhs = std::mem::replace(self, Attr::empty());
        *self = disjoin(lhs, rhs.into());
    }
}
