//! Insertion Order Module
//!
//! Tracks key insertion order for memory tier eviction.

use std::collections::HashMap;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    key: String,
    prev: usize,
    next: usize,
}

// == Insertion Order ==
/// Hash map plus doubly linked list over a slab of nodes.
///
/// - Head = most recently inserted
/// - Tail = least recently inserted
///
/// `touch`, `remove` and `evict_oldest` are all O(1).
#[derive(Debug)]
pub struct InsertionOrder {
    index: HashMap<String, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl Default for InsertionOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl InsertionOrder {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    // == Touch ==
    /// Marks a key as newest, inserting it if unknown.
    pub fn touch(&mut self, key: &str) {
        if let Some(&slot) = self.index.get(key) {
            self.unlink(slot);
            self.push_front(slot);
            return;
        }

        let node = Node {
            key: key.to_string(),
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.index.insert(key.to_string(), slot);
        self.push_front(slot);
    }

    // == Remove ==
    /// Stops tracking a key. Unknown keys are ignored.
    pub fn remove(&mut self, key: &str) {
        if let Some(slot) = self.index.remove(key) {
            self.unlink(slot);
            self.release(slot);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently inserted key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        if self.tail == NIL {
            return None;
        }
        let slot = self.tail;
        self.unlink(slot);
        let key = std::mem::take(&mut self.nodes[slot].key);
        self.index.remove(&key);
        self.free.push(slot);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently inserted key without removing it.
    pub fn peek_oldest(&self) -> Option<&str> {
        (self.tail != NIL).then(|| self.nodes[self.tail].key.as_str())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }

    fn unlink(&mut self, slot: usize) {
        let Node { prev, next, .. } = self.nodes[slot];
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = NIL;
    }

    fn release(&mut self, slot: usize) {
        self.nodes[slot].key.clear();
        self.free.push(slot);
    }
}
