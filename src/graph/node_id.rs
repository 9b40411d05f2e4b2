use std::num::NonZero;

/// ID of a node in a [`Graph`](crate::graph::Graph).
///
/// Nodes live in an arena owned by the graph; functions and operator inputs
/// hold IDs rather than owning nodes, so a node referenced from several
/// places is stored exactly once.
#[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(NonZero<u32>);

impl NodeId {
    /// Return the underlying u32 value of the ID.
    pub fn as_u32(self) -> u32 {
        self.0.get() - 1
    }

    /// Return the underlying ID value as a usize, for slice indexing.
    pub fn as_usize(self) -> usize {
        self.as_u32() as usize
    }

    /// Construct a node ID from a u32 value.
    ///
    /// Panics if the value exceeds `u32::MAX - 1`.
    pub fn from_u32(value: u32) -> NodeId {
        // Valid IDs are stored as `value + 1` so that 0 remains available as
        // a niche, making `Option<NodeId>` the same size as `NodeId`.
        assert!(value < u32::MAX);
        NodeId(unsafe {
            // Safety: `value + 1` cannot be zero
            NonZero::new_unchecked(value + 1)
        })
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_u32().fmt(f)
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.as_u32())
    }
}
