//! Composable search attributes.
//!
//! Attributes are leaf predicates over named fields. They combine with
//! [`Attr::and`], [`Attr::or`] (also `|`) and, for ranges, [`Attr::xor`]. Every
//! combination is normalised to disjunctive form, so a tree is always an OR of
//! ANDs of leaves. A [`Walker`] then turns a tree into request [`Block`]s, one
//! per alternative.
//!
//! ```
//! use helio_attr::{Attr, AttrType, ValueAttr};
//!
//! const INSTRUMENT: AttrType = AttrType::new("instrument");
//! let eit: Attr = ValueAttr::typed(INSTRUMENT, [("instrument", "eit")]).exclusive().into();
//! let mdi: Attr = ValueAttr::typed(INSTRUMENT, [("instrument", "mdi")]).exclusive().into();
//!
//! assert!(eit.and(&mdi).is_err());
//! assert_eq!((eit | mdi).disjuncts().len(), 2);
//! ```

mod attr;
mod block;
mod error;
mod range;
mod value;
mod walker;

pub use attr::{Attr, AttrAnd, AttrOr, AttrType, ValueAttr};
pub use block::Block;
pub use error::{AttrError, Op, Result, WalkError};
pub use value::{FieldPath, Value};
pub use walker::{Applier, Creator, NodeKind, Walker};
