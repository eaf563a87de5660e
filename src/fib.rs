//! Forwarding Information Base.
//!
//! A name-component trie mapping prefixes to sets of next-hop faces. Faces
//! are held weakly: a face that failed simply stops resolving and its slots
//! are pruned the next time a lookup walks past them. Children are kept in
//! component order so the JSON dump is deterministic.

use ndn_router_common::ndn::{Name, NameComponent};
use ndn_router_face::{Face, FaceId};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

#[derive(Debug, Default)]
struct FibNode {
    faces: BTreeMap<FaceId, Weak<Face>>,
    children: BTreeMap<NameComponent, FibNode>,
}

impl FibNode {
    fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.children.is_empty()
    }

    /// Ids of the registered faces that are still alive, dropping the slots
    /// of faces that are gone.
    fn live_faces(&mut self) -> Vec<Arc<Face>> {
        let mut live = Vec::new();
        self.faces.retain(|_, weak| match weak.upgrade() {
            Some(face) if !face.is_closed() => {
                live.push(face);
                true
            }
            _ => false,
        });
        live
    }

    fn contains_live(&self, face_id: FaceId) -> bool {
        self.faces
            .get(&face_id)
            .and_then(|weak| weak.upgrade())
            .map(|face| !face.is_closed())
            .unwrap_or(false)
    }

    fn to_json(&self, component: String) -> Value {
        let faces: Vec<FaceId> = self
            .faces
            .iter()
            .filter(|(_, weak)| {
                weak.upgrade()
                    .map(|face| !face.is_closed())
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();
        let children: Vec<Value> = self
            .children
            .iter()
            .map(|(comp, child)| child.to_json(comp.to_string()))
            .collect();
        json!({
            "component": component,
            "faces": faces,
            "children": children,
        })
    }
}

#[derive(Debug, Default)]
pub struct Fib {
    root: FibNode,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `face` as a next hop for `prefix`. Idempotent.
    pub fn insert(&mut self, face: &Arc<Face>, prefix: &Name) {
        let mut node = &mut self.root;
        for component in prefix.components() {
            node = node.children.entry(component.clone()).or_default();
        }
        node.faces.insert(face.id(), Arc::downgrade(face));
    }

    /// Unregisters `face` from `prefix`, pruning subtrees left empty.
    /// Returns true when the registration existed.
    pub fn remove(&mut self, face_id: FaceId, prefix: &Name) -> bool {
        let components: Vec<&NameComponent> = prefix.components().collect();
        Self::remove_at(&mut self.root, &components, face_id).0
    }

    fn remove_at(node: &mut FibNode, components: &[&NameComponent], face_id: FaceId) -> (bool, bool) {
        let Some((head, rest)) = components.split_first() else {
            let removed = node.faces.remove(&face_id).is_some();
            return (removed, node.is_empty());
        };
        let Some(child) = node.children.get_mut(*head) else {
            return (false, false);
        };
        let (removed, prune_child) = Self::remove_at(child, rest, face_id);
        if prune_child {
            node.children.remove(*head);
        }
        (removed, node.is_empty())
    }

    /// Longest-prefix lookup: the live face set of the deepest node along
    /// `name` that still has one. Empty when nothing matches.
    pub fn get(&mut self, name: &Name) -> Vec<Arc<Face>> {
        let mut node = &mut self.root;
        let mut best = node.live_faces();
        for component in name.components() {
            match node.children.get_mut(component) {
                Some(child) => node = child,
                None => break,
            }
            let live = node.live_faces();
            if !live.is_empty() {
                best = live;
            }
        }
        best
    }

    /// True iff some prefix registered for `face_id` is a prefix of `name`.
    pub fn is_prefix(&self, face_id: FaceId, name: &Name) -> bool {
        let mut node = &self.root;
        if node.contains_live(face_id) {
            return true;
        }
        for component in name.components() {
            match node.children.get(component) {
                Some(child) => node = child,
                None => return false,
            }
            if node.contains_live(face_id) {
                return true;
            }
        }
        false
    }

    /// Depth-first dump of the registration tree, children ordered by
    /// component bytes.
    pub fn to_json(&self) -> Value {
        self.root.to_json("/".to_string())
    }
}
