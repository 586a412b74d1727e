//! Heap transactions
//!
//! A `Transaction` stages ops against a read-only view of the committed
//! object table. Nothing reaches the pool file until the body passed to
//! [`Pool::transaction`](super::Pool::transaction) returns `Ok`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{EnvError, Result};

use super::object::HeapState;
use super::record::{HeapOp, ObjRef, ObjectKind, PoolRef};

/// Staged mutations of one pool
pub struct Transaction<'a> {
    path: &'a Path,
    state: &'a HeapState,
    ops: Vec<HeapOp>,
    /// Objects allocated by this transaction
    staged: HashMap<ObjRef, ObjectKind>,
    /// Committed or staged objects freed by this transaction
    freed: HashSet<ObjRef>,
    next_id: u64,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(path: &'a Path, state: &'a HeapState) -> Self {
        Self {
            path,
            state,
            ops: Vec::new(),
            staged: HashMap::new(),
            freed: HashSet::new(),
            next_id: state.next_id(),
        }
    }

    /// Allocate a new durable object
    pub fn allocate(&mut self, kind: ObjectKind) -> Result<ObjRef> {
        if kind == ObjectKind::Root && self.root().is_some() {
            return Err(self.invalid("pool already has a root descriptor"));
        }

        let obj = ObjRef(self.next_id);
        self.next_id += 1;
        self.staged.insert(obj, kind);
        self.ops.push(HeapOp::Alloc { obj, kind });
        Ok(obj)
    }

    /// Free a durable object. The root descriptor cannot be freed.
    pub fn free(&mut self, obj: ObjRef) -> Result<()> {
        match self.kind_of(obj) {
            None => return Err(self.invalid(format!("object {} does not exist", obj.id()))),
            Some(ObjectKind::Root) => return Err(self.invalid("root descriptor cannot be freed")),
            Some(_) => {}
        }
        if let Some(root) = self.root() {
            if self.child(root)? == Some(obj) {
                return Err(self.invalid(format!("object {} is still the root's child", obj.id())));
            }
        }

        self.staged.remove(&obj);
        self.freed.insert(obj);
        self.ops.push(HeapOp::Free { obj });
        Ok(())
    }

    /// Point a root descriptor at `child` (or at nothing)
    pub fn set_child(&mut self, root: ObjRef, child: Option<ObjRef>) -> Result<()> {
        self.expect_kind(root, ObjectKind::Root)?;
        if let Some(child) = child {
            match self.kind_of(child) {
                None => return Err(self.invalid(format!("child {} does not exist", child.id()))),
                Some(ObjectKind::Root) => return Err(self.invalid("a root cannot be a child")),
                Some(_) => {}
            }
        }

        self.ops.push(HeapOp::SetChild { root, child });
        Ok(())
    }

    /// Append bytes to a byte content object
    pub fn append(&mut self, obj: ObjRef, data: &[u8]) -> Result<()> {
        self.expect_kind(obj, ObjectKind::Bytes)?;
        if !data.is_empty() {
            self.ops.push(HeapOp::Append {
                obj,
                data: data.to_vec(),
            });
        }
        Ok(())
    }

    /// Append a reference to a reference set
    pub fn push_ref(&mut self, obj: ObjRef, entry: PoolRef) -> Result<()> {
        self.expect_kind(obj, ObjectKind::RefSet)?;
        self.ops.push(HeapOp::PushRef { obj, entry });
        Ok(())
    }

    /// Root descriptor, including one allocated by this transaction
    pub fn root(&self) -> Option<ObjRef> {
        self.state.root().or_else(|| {
            self.staged
                .iter()
                .find(|(_, kind)| **kind == ObjectKind::Root)
                .map(|(obj, _)| *obj)
        })
    }

    /// Current child of a root descriptor, as seen inside this transaction
    pub fn child(&self, root: ObjRef) -> Result<Option<ObjRef>> {
        self.expect_kind(root, ObjectKind::Root)?;

        let staged = self.ops.iter().rev().find_map(|op| match op {
            HeapOp::SetChild { root: r, child } if *r == root => Some(*child),
            _ => None,
        });
        match staged {
            Some(child) => Ok(child),
            None => Ok(self.state.child(root).flatten()),
        }
    }

    /// Whether anything has been staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<HeapOp> {
        self.ops
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn kind_of(&self, obj: ObjRef) -> Option<ObjectKind> {
        if self.freed.contains(&obj) {
            return None;
        }
        self.staged
            .get(&obj)
            .copied()
            .or_else(|| self.state.kind_of(obj))
    }

    fn expect_kind(&self, obj: ObjRef, kind: ObjectKind) -> Result<()> {
        match self.kind_of(obj) {
            Some(found) if found == kind => Ok(()),
            Some(found) => Err(self.invalid(format!(
                "object {} is {:?}, expected {:?}",
                obj.id(),
                found,
                kind
            ))),
            None => Err(self.invalid(format!("object {} does not exist", obj.id()))),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> EnvError {
        EnvError::InvalidReference {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
