//! Structural hashing of nodes via the attribute visitation protocol.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::graph::Node;
use crate::operator::AttributeVisitor;

/// Visitor that folds every attribute into a hasher.
struct HashVisitor<'a> {
    hasher: &'a mut FxHasher,
}

impl AttributeVisitor for HashVisitor<'_> {
    fn visit_int(&mut self, name: &str, value: i64) -> bool {
        name.hash(self.hasher);
        value.hash(self.hasher);
        true
    }

    fn visit_float(&mut self, name: &str, value: f64) -> bool {
        name.hash(self.hasher);
        value.to_bits().hash(self.hasher);
        true
    }

    fn visit_string(&mut self, name: &str, value: &str) -> bool {
        name.hash(self.hasher);
        value.hash(self.hasher);
        true
    }

    fn visit_int_list(&mut self, name: &str, values: &[i64]) -> bool {
        name.hash(self.hasher);
        values.hash(self.hasher);
        true
    }
}

/// Compute a structural fingerprint of a node's kind, inputs and attributes.
///
/// Two nodes with equal fingerprints have the same `(name, version)`
/// identity, consume the same upstream outputs in the same order, and carry
/// equal attributes. Returns `None` if the node's attributes cannot be
/// visited; callers must treat such a node as unequal to everything rather
/// than hashing a partial view of it.
pub fn node_fingerprint(node: &Node) -> Option<u64> {
    let mut hasher = FxHasher::default();
    let type_id = node.type_id();
    type_id.name.hash(&mut hasher);
    type_id.version.hash(&mut hasher);
    for input in node.input_refs() {
        input.node.as_u32().hash(&mut hasher);
        input.output.hash(&mut hasher);
    }

    if let Some(op_node) = node.as_operator() {
        let mut visitor = HashVisitor {
            hasher: &mut hasher,
        };
        if !op_node.operator().visit_attributes(&mut visitor) {
            return None;
        }
    }
    Some(hasher.finish())
}
