//! Conversion of attribute trees into request blocks.
//!
//! A [`Walker`] holds two handler tables. *Creators* are keyed by the shape of
//! a node and turn it into zero or more blocks; *appliers* are keyed by the
//! [`AttrType`] of a leaf and write that leaf into a block. Handlers receive
//! the walker itself so they can recurse.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::attr::{Attr, AttrType, ValueAttr};
use crate::block::Block;
use crate::error::{Op, WalkError};

/// Shape of an attribute node, used to select a creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Value,
    And,
    Or,
}

impl NodeKind {
    pub fn of(attr: &Attr) -> Self {
        match attr {
            Attr::Value(_) => NodeKind::Value,
            Attr::And(_) => NodeKind::And,
            Attr::Or(_) => NodeKind::Or,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Value => f.write_str("AttrValue"),
            NodeKind::And => f.write_str("AttrAnd"),
            NodeKind::Or => f.write_str("AttrOr"),
        }
    }
}

pub type Creator<C> = Box<dyn Fn(&Walker<C>, &Attr, &C) -> Result<Vec<Block>, WalkError> + Send + Sync>;
pub type Applier<C> = Box<dyn Fn(&Walker<C>, &ValueAttr, &C, &mut Block) -> Result<(), WalkError> + Send + Sync>;

/// Registry-driven converter from attribute trees to blocks.
///
/// `C` is the context passed through every handler, typically the template
/// that fresh blocks are cloned from.
pub struct Walker<C> {
    creators: HashMap<NodeKind, Creator<C>>,
    appliers: HashMap<AttrType, Applier<C>>,
}

impl<C: 'static> Walker<C> {
    /// A walker with no handlers.
    pub fn new() -> Self {
        Self {
            creators: HashMap::new(),
            appliers: HashMap::new(),
        }
    }

    /// A walker with the standard creators for normalised trees: a leaf or a
    /// conjunction yields one fresh block with every leaf applied, and a
    /// disjunction concatenates the blocks of its alternatives. Appliers are
    /// left for the caller to register.
    pub fn dnf<F>(new_block: F) -> Self
    where
        F: Fn(&C) -> Block + Send + Sync + 'static,
    {
        let new_block = Arc::new(new_block);
        let mut walker = Self::new();

        let fresh = Arc::clone(&new_block);
        walker.add_creator(NodeKind::Value, move |walker, attr, ctx| {
            let mut block = fresh(ctx);
            if let Attr::Value(leaf) = attr {
                walker.apply(leaf, ctx, &mut block)?;
            }
            Ok(vec![block])
        });

        let fresh = Arc::clone(&new_block);
        walker.add_creator(NodeKind::And, move |walker, attr, ctx| {
            let mut block = fresh(ctx);
            if let Attr::And(and) = attr {
                for leaf in and.attrs() {
                    walker.apply(leaf, ctx, &mut block)?;
                }
            }
            Ok(vec![block])
        });

        walker.add_creator(NodeKind::Or, |walker, attr, ctx| {
            let mut blocks = Vec::new();
            if let Attr::Or(or) = attr {
                for child in or.attrs() {
                    blocks.extend(walker.create(child, ctx)?);
                }
            }
            Ok(blocks)
        });

        walker
    }

    pub fn add_creator<F>(&mut self, kind: NodeKind, creator: F) -> &mut Self
    where
        F: Fn(&Walker<C>, &Attr, &C) -> Result<Vec<Block>, WalkError> + Send + Sync + 'static,
    {
        self.creators.insert(kind, Box::new(creator));
        self
    }

    pub fn add_applier<F>(&mut self, ty: AttrType, applier: F) -> &mut Self
    where
        F: Fn(&Walker<C>, &ValueAttr, &C, &mut Block) -> Result<(), WalkError> + Send + Sync + 'static,
    {
        self.appliers.insert(ty, Box::new(applier));
        self
    }

    pub fn supports(&self, ty: AttrType) -> bool { self.appliers.contains_key(&ty) }

    /// Convert a tree into blocks using the creator for its node kind.
    pub fn create(&self, attr: &Attr, ctx: &C) -> Result<Vec<Block>, WalkError> {
        let kind = NodeKind::of(attr);
        let creator = self.creators.get(&kind).ok_or_else(|| WalkError::Unsupported {
            op: Op::Create,
            ty: kind.to_string(),
        })?;
        creator(self, attr, ctx)
    }

    /// Write one leaf into `block` using the applier for its type.
    pub fn apply(&self, leaf: &ValueAttr, ctx: &C, block: &mut Block) -> Result<(), WalkError> {
        let applier = self.appliers.get(&leaf.ty()).ok_or_else(|| WalkError::Unsupported {
            op: Op::Apply,
            ty: leaf.ty().to_string(),
        })?;
        applier(self, leaf, ctx, block)
    }
}

impl<C: 'static> Default for Walker<C> {
    fn default() -> Self { Self::new() }
}

impl<C> fmt::Debug for Walker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walker")
            .field("creators", &self.creators.keys().collect::<Vec<_>>())
            .field("appliers", &self.appliers.keys().collect::<Vec<_>>())
            .finish()
    }
}
