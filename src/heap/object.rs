//! In-memory object table of an open pool
//!
//! Rebuilt on open by replaying every committed record, then kept current
//! by applying each newly committed transaction.

use std::collections::HashMap;

use super::record::{HeapOp, ObjRef, ObjectKind, PoolRef};

/// A live heap object
#[derive(Debug, Clone)]
pub(crate) enum HeapObject {
    Root { child: Option<ObjRef> },
    Bytes(Vec<u8>),
    RefSet(Vec<PoolRef>),
}

impl HeapObject {
    fn new(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Root => HeapObject::Root { child: None },
            ObjectKind::Bytes => HeapObject::Bytes(Vec::new()),
            ObjectKind::RefSet => HeapObject::RefSet(Vec::new()),
        }
    }

    fn kind(&self) -> ObjectKind {
        match self {
            HeapObject::Root { .. } => ObjectKind::Root,
            HeapObject::Bytes(_) => ObjectKind::Bytes,
            HeapObject::RefSet(_) => ObjectKind::RefSet,
        }
    }
}

/// Every live object of one pool
#[derive(Debug, Default)]
pub(crate) struct HeapState {
    root: Option<ObjRef>,
    next_id: u64,
    objects: HashMap<ObjRef, HeapObject>,
}

impl HeapState {
    /// Apply one committed op. Fails only if the op contradicts the table,
    /// which for a replayed record means the pool is corrupt.
    pub(crate) fn apply(&mut self, op: HeapOp) -> std::result::Result<(), String> {
        match op {
            HeapOp::Alloc { obj, kind } => {
                if self.objects.contains_key(&obj) {
                    return Err(format!("object {} allocated twice", obj.id()));
                }
                if kind == ObjectKind::Root {
                    if self.root.is_some() {
                        return Err("second root descriptor".to_string());
                    }
                    self.root = Some(obj);
                }
                self.objects.insert(obj, HeapObject::new(kind));
                self.next_id = self.next_id.max(obj.id() + 1);
            }
            HeapOp::Free { obj } => {
                if self.root == Some(obj) {
                    return Err("root descriptor cannot be freed".to_string());
                }
                if self.objects.remove(&obj).is_none() {
                    return Err(format!("free of unknown object {}", obj.id()));
                }
            }
            HeapOp::SetChild { root, child } => {
                if let Some(child) = child {
                    if !self.objects.contains_key(&child) {
                        return Err(format!("child {} does not exist", child.id()));
                    }
                }
                match self.objects.get_mut(&root) {
                    Some(HeapObject::Root { child: slot }) => *slot = child,
                    _ => return Err(format!("object {} is not a root", root.id())),
                }
            }
            HeapOp::Append { obj, data } => match self.objects.get_mut(&obj) {
                Some(HeapObject::Bytes(bytes)) => bytes.extend_from_slice(&data),
                _ => return Err(format!("object {} is not byte content", obj.id())),
            },
            HeapOp::PushRef { obj, entry } => match self.objects.get_mut(&obj) {
                Some(HeapObject::RefSet(refs)) => refs.push(entry),
                _ => return Err(format!("object {} is not a reference set", obj.id())),
            },
        }
        Ok(())
    }

    pub(crate) fn root(&self) -> Option<ObjRef> {
        self.root
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub(crate) fn kind_of(&self, obj: ObjRef) -> Option<ObjectKind> {
        self.objects.get(&obj).map(HeapObject::kind)
    }

    /// `None` if `root` is not a root descriptor
    pub(crate) fn child(&self, root: ObjRef) -> Option<Option<ObjRef>> {
        match self.objects.get(&root) {
            Some(HeapObject::Root { child }) => Some(*child),
            _ => None,
        }
    }

    pub(crate) fn bytes(&self, obj: ObjRef) -> Option<&[u8]> {
        match self.objects.get(&obj) {
            Some(HeapObject::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub(crate) fn refs(&self, obj: ObjRef) -> Option<&[PoolRef]> {
        match self.objects.get(&obj) {
            Some(HeapObject::RefSet(refs)) => Some(refs),
            _ => None,
        }
    }
}
