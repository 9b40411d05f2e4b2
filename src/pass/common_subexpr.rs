use rustc_hash::FxHashMap;

use crate::fingerprint::node_fingerprint;
use crate::graph::{Function, NodeId, OutputRef};
use crate::operator::AttributeVisitor;
use crate::pass::{Pass, PassError};

/// Recorded attribute value, used for exact structural comparison after a
/// fingerprint match.
#[derive(PartialEq)]
enum Attr {
    Int(i64),
    // Compared bitwise so that NaN-valued attributes still compare equal to
    // themselves.
    Float(u64),
    Str(String),
    IntList(Vec<i64>),
}

#[derive(Default)]
struct AttrRecorder {
    attrs: Vec<(String, Attr)>,
}

impl AttributeVisitor for AttrRecorder {
    fn visit_int(&mut self, name: &str, value: i64) -> bool {
        self.attrs.push((name.to_string(), Attr::Int(value)));
        true
    }

    fn visit_float(&mut self, name: &str, value: f64) -> bool {
        self.attrs.push((name.to_string(), Attr::Float(value.to_bits())));
        true
    }

    fn visit_string(&mut self, name: &str, value: &str) -> bool {
        self.attrs.push((name.to_string(), Attr::Str(value.to_string())));
        true
    }

    fn visit_int_list(&mut self, name: &str, values: &[i64]) -> bool {
        self.attrs.push((name.to_string(), Attr::IntList(values.to_vec())));
        true
    }
}

/// Merge operator nodes that compute the same value.
///
/// Two nodes are the same expression when they have the same operation
/// identity, the same input references and attribute-for-attribute equal
/// configurations. Nodes are bucketed by [`node_fingerprint`] and a match is
/// confirmed structurally, so a hash collision can never merge distinct
/// expressions. Nodes whose attributes cannot be visited have no
/// fingerprint and are never merged.
///
/// Nodes are visited in execution order and duplicates are rewired as soon
/// as they are found, which lets chains of duplicated subgraphs collapse in
/// a single run.
pub struct EliminateCommonSubexpr {}

impl EliminateCommonSubexpr {
    fn structurally_equal(function: &Function, a: NodeId, b: NodeId) -> bool {
        let graph = function.graph();
        let (Some(a), Some(b)) = (graph.get_node(a), graph.get_node(b)) else {
            return false;
        };
        if a.type_id() != b.type_id() || a.input_refs() != b.input_refs() {
            return false;
        }
        let (Some(a), Some(b)) = (a.as_operator(), b.as_operator()) else {
            return false;
        };
        let mut attrs_a = AttrRecorder::default();
        let mut attrs_b = AttrRecorder::default();
        a.operator().visit_attributes(&mut attrs_a)
            && b.operator().visit_attributes(&mut attrs_b)
            && attrs_a.attrs == attrs_b.attrs
    }
}

impl Pass for EliminateCommonSubexpr {
    fn name(&self) -> &str {
        "EliminateCommonSubexpr"
    }

    fn run(&self, function: &mut Function) -> Result<(), PassError> {
        let order = function
            .execution_order()
            .map_err(|err| PassError::new(self.name(), err.to_string()))?;

        // Fingerprint -> representative nodes seen with that fingerprint.
        let mut seen: FxHashMap<u64, Vec<NodeId>> = FxHashMap::default();

        for node_id in order {
            let node = function
                .graph()
                .get_node(node_id)
                .ok_or_else(|| PassError::new(self.name(), "stale execution order".to_string()))?;
            if node.as_operator().is_none() {
                continue;
            }
            // Fingerprints reflect already-rewired inputs because nodes are
            // visited producers-first.
            let Some(fingerprint) = node_fingerprint(node) else {
                continue;
            };
            let output_count = node.outputs().len();

            let bucket = seen.entry(fingerprint).or_default();
            let existing = bucket
                .iter()
                .copied()
                .find(|&rep| Self::structurally_equal(function, rep, node_id));
            match existing {
                Some(rep) => {
                    for output in 0..output_count {
                        function
                            .replace_uses(OutputRef::new(node_id, output), OutputRef::new(rep, output));
                    }
                }
                None => seen.entry(fingerprint).or_default().push(node_id),
            }
        }
        Ok(())
    }
}
