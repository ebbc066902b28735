// Copyright @yucwang 2021

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a volume object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn generate() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Names an object living in some process of the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle {
    pub process: usize,
    pub object: u64,
}

impl ObjectHandle {
    pub fn new(process: usize, object: u64) -> Self {
        Self { process, object }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.process, self.object)
    }
}

pub trait ComputationNode {
    /// Return the unique identifier for this computation node.
    fn id(&self) -> ObjectId;

    // Output string for a single computation node.
    fn to_string(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_unique() {
        let a = ObjectId::generate();
        let b = ObjectId::generate();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn object_handle_display() {
        assert_eq!(format!("{}", ObjectHandle::new(3, 17)), "3:17");
    }
}
