//! Structured configuration trees.
//!
//! [`Element`] is the in-memory form of every structured payload: get
//! filters, edit-config bodies, action requests and the data trees handed
//! back by the transport. Rendering to XML text is deterministic so staged
//! payloads can be audited verbatim.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// XML namespaces used by Comware NETCONF schemas.
pub mod ns {
    /// NETCONF base namespace.
    pub const NETCONF_BASE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
    /// Vendor data namespace (get filters and replies).
    pub const DATA: &str = "http://www.hp.com/netconf/data:1.0";
    /// Vendor config namespace (edit-config bodies).
    pub const CONFIG: &str = "http://www.hp.com/netconf/config:1.0";
    /// Vendor action namespace.
    pub const ACTION: &str = "http://www.hp.com/netconf/action:1.0";
}

/// NETCONF `operation` attribute values for edit-config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOperation {
    Merge,
    Replace,
    Create,
    Delete,
    Remove,
}

impl EditOperation {
    /// Returns the attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EditOperation::Merge => "merge",
            EditOperation::Replace => "replace",
            EditOperation::Create => "create",
            EditOperation::Delete => "delete",
            EditOperation::Remove => "remove",
        }
    }
}

/// Attribute name carrying the edit operation.
pub const OPERATION_ATTR: &str = "xc:operation";

/// One node of a configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Element>,
}

impl Element {
    /// Creates an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a leaf element carrying `text`.
    pub fn leaf(name: impl Into<String>, text: impl ToString) -> Self {
        Self::new(name).with_text(text)
    }

    /// Creates a `<top>` element in the given namespace.
    ///
    /// The `xc` prefix used by [`OPERATION_ATTR`] is declared here, so a
    /// rendered tree is namespace-complete without the transport wrapper.
    pub fn top(namespace: &str) -> Self {
        Self::new("top")
            .with_attr("xmlns", namespace)
            .with_attr("xmlns:xc", ns::NETCONF_BASE)
    }

    /// Sets the text content.
    pub fn with_text(mut self, text: impl ToString) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Adds an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Marks this element with a NETCONF edit operation.
    pub fn with_operation(self, op: EditOperation) -> Self {
        self.with_attr(OPERATION_ATTR, op.as_str())
    }

    /// Appends a child.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Appends several children.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Appends a child in place.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    pub fn set_text(&mut self, text: impl ToString) {
        self.text = Some(text.to_string());
    }

    /// Removes an attribute, returning its value.
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Returns true if the element has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Returns an attribute value by name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name() == name)
    }

    /// Follows a `/` separated path of local names below this element.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, step| node.child(step))
    }

    /// Returns every element matching the path; the last step may repeat.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let steps: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut current = vec![self];
        for step in steps {
            current = current
                .into_iter()
                .flat_map(|node| node.children.iter().filter(move |c| c.local_name() == step))
                .collect();
        }
        current
    }

    /// Returns the text of the element at `path`.
    pub fn child_text(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(Element::text)
    }

    /// Searches the whole subtree (depth first) for an element by local name.
    pub fn descendant(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|c| {
            if c.local_name() == name {
                Some(c)
            } else {
                c.descendant(name)
            }
        })
    }

    /// Renders the tree as compact XML.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        if self.text.is_none() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape(text));
        }
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vlan_tree() -> Element {
        Element::top(ns::CONFIG).with_child(
            Element::new("VLAN").with_child(
                Element::new("VLANs").with_children([
                    Element::new("VLAN")
                        .with_child(Element::leaf("ID", 10))
                        .with_child(Element::leaf("Name", "users")),
                    Element::new("VLAN")
                        .with_child(Element::leaf("ID", 20))
                        .with_child(Element::leaf("Name", "voice")),
                ]),
            ),
        )
    }

    #[test]
    fn test_to_xml_nested() {
        let tree = Element::new("VLAN")
            .with_child(Element::leaf("ID", 10))
            .with_child(Element::new("Description"));
        assert_eq!(
            tree.to_xml(),
            "<VLAN><ID>10</ID><Description/></VLAN>"
        );
    }

    #[test]
    fn test_to_xml_attributes_and_escaping() {
        let tree = Element::new("VLAN")
            .with_operation(EditOperation::Delete)
            .with_child(Element::leaf("Name", "a<b & \"c\""));
        assert_eq!(
            tree.to_xml(),
            "<VLAN xc:operation=\"delete\"><Name>a&lt;b &amp; &quot;c&quot;</Name></VLAN>"
        );
        assert_eq!(tree.attr(OPERATION_ATTR), Some("delete"));
    }

    #[test]
    fn test_top_declares_operation_prefix() {
        let tree = Element::top(ns::CONFIG)
            .with_child(Element::new("VLAN").with_operation(EditOperation::Remove));
        assert_eq!(
            tree.to_xml(),
            format!(
                "<top xmlns=\"{}\" xmlns:xc=\"{}\"><VLAN xc:operation=\"remove\"/></top>",
                ns::CONFIG,
                ns::NETCONF_BASE
            )
        );
    }

    #[test]
    fn test_find_and_child_text() {
        let tree = vlan_tree();
        assert_eq!(tree.child_text("VLAN/VLANs/VLAN/ID"), Some("10"));
        assert!(tree.find("VLAN/Nope").is_none());
    }

    #[test]
    fn test_find_all_repeated_leaf() {
        let tree = vlan_tree();
        let ids: Vec<&str> = tree
            .find_all("VLAN/VLANs/VLAN")
            .into_iter()
            .filter_map(|v| v.child_text("ID"))
            .collect();
        assert_eq!(ids, vec!["10", "20"]);
    }

    #[test]
    fn test_local_name_strips_prefix() {
        let tree = Element::new("data").with_child(Element::leaf("nc:Execution", "ok"));
        assert_eq!(tree.child_text("Execution"), Some("ok"));
        assert_eq!(tree.descendant("Execution").map(Element::name), Some("nc:Execution"));
    }

    #[test]
    fn test_serde_json_shape() {
        let json = serde_json::to_value(Element::leaf("ID", 5)).unwrap();
        assert_eq!(json, serde_json::json!({"name": "ID", "text": "5"}));
    }
}
