//! JSON rendering of graphs via the attribute visitation protocol.

use serde_json::{json, Map, Value};

use crate::descriptor::TensorDescriptor;
use crate::graph::{Function, Graph, Node, OutputRef};
use crate::operator::AttributeVisitor;

/// Visitor that collects every attribute into a JSON object.
struct JsonVisitor {
    attrs: Map<String, Value>,
}

impl AttributeVisitor for JsonVisitor {
    fn visit_int(&mut self, name: &str, value: i64) -> bool {
        self.attrs.insert(name.to_string(), json!(value));
        true
    }

    fn visit_float(&mut self, name: &str, value: f64) -> bool {
        self.attrs.insert(name.to_string(), json!(value));
        true
    }

    fn visit_string(&mut self, name: &str, value: &str) -> bool {
        self.attrs.insert(name.to_string(), json!(value));
        true
    }

    fn visit_int_list(&mut self, name: &str, values: &[i64]) -> bool {
        self.attrs.insert(name.to_string(), json!(values));
        true
    }
}

fn descriptor_to_json(desc: &TensorDescriptor) -> Value {
    json!({
        "dtype": desc.dtype().to_string(),
        "shape": desc.shape(),
    })
}

fn ref_to_json(output: OutputRef) -> Value {
    json!({
        "node": output.node.as_u32(),
        "output": output.output,
    })
}

/// Render one node as JSON.
///
/// Returns `None` if the node's attributes cannot be visited; a partial
/// rendering would deserialize into a different operation.
pub fn node_to_json(node: &Node) -> Option<Value> {
    let mut visitor = JsonVisitor { attrs: Map::new() };
    if let Some(op_node) = node.as_operator() {
        if !op_node.operator().visit_attributes(&mut visitor) {
            return None;
        }
    }

    let type_id = node.type_id();
    Some(json!({
        "name": node.name(),
        "type": { "name": type_id.name, "version": type_id.version },
        "inputs": node.input_refs().iter().map(|&r| ref_to_json(r)).collect::<Vec<_>>(),
        "outputs": node
            .outputs()
            .iter()
            .map(|info| descriptor_to_json(info.descriptor()))
            .collect::<Vec<_>>(),
        "attributes": Value::Object(visitor.attrs),
    }))
}

/// Render a function and its graph as JSON.
///
/// Nodes appear in arena order under their IDs, so references in `inputs`,
/// `parameters` and `results` resolve by index. Returns `None` if any
/// node's attributes cannot be visited.
pub fn function_to_json(function: &Function) -> Option<Value> {
    let graph: &Graph = function.graph();
    let mut nodes = Vec::new();
    for (node_id, node) in graph.iter() {
        let mut rendered = node_to_json(node)?;
        rendered["id"] = json!(node_id.as_u32());
        nodes.push(rendered);
    }

    Some(json!({
        "parameters": function
            .parameters()
            .iter()
            .map(|p| p.as_u32())
            .collect::<Vec<_>>(),
        "results": function
            .results()
            .iter()
            .map(|&r| ref_to_json(r))
            .collect::<Vec<_>>(),
        "nodes": nodes,
    }))
}
