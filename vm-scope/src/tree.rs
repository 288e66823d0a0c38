//! Folded-stack aggregation tree.
//!
//! A rooted prefix tree keyed on `;`-separated frame labels. Each insert
//! walks one stack label from the root, bumping the subtree weight
//! (`acc_cnt`) of every node on the path and the leaf count (`cnt`) of the
//! final node. Sibling lists are kept roughly sorted by subtree weight with a
//! single move-to-front payload swap per scan step, which biases hot paths
//! toward the front of the list and keeps lookups amortised cheap for the
//! skewed distributions sampling produces.
//!
//! Nodes live in a flat arena indexed by `u32`, so a tree of any depth is
//! dropped without recursion and the per-node overhead stays at one string,
//! two counters and two links.

use std::io::{self, Write};

const ROOT_NAME: &str = "root";
const DELIM: char = ';';

/// Arena index sentinel for "no node".
const NIL: u32 = u32::MAX;

#[derive(Debug)]
struct Node {
    name: String,
    /// Samples that terminated at this node.
    cnt: u64,
    /// Samples that terminated at or below this node.
    acc_cnt: u64,
    child: u32,
    sibling: u32,
}

impl Node {
    fn new(name: &str) -> Self {
        Node {
            name: name.to_string(),
            cnt: 0,
            acc_cnt: 0,
            child: NIL,
            sibling: NIL,
        }
    }
}

/// Prefix tree of folded call stacks weighted by sample count.
#[derive(Debug)]
pub struct StackTree {
    nodes: Vec<Node>,
}

impl Default for StackTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StackTree {
    pub fn new() -> Self {
        StackTree {
            nodes: vec![Node::new(ROOT_NAME)],
        }
    }

    /// Fold one stack label into the tree with weight 1.
    ///
    /// Example label: `MainThread;main.py:foo:1;main.py:bar:2`.
    pub fn insert(&mut self, stack: &str) {
        self.insert_weighted(stack, 1);
    }

    /// Fold one stack label into the tree with an explicit weight.
    ///
    /// Every node on the path gains `weight` in `acc_cnt`; the final
    /// component additionally gains `weight` in `cnt`. Empty labels are
    /// ignored.
    pub fn insert_weighted(&mut self, stack: &str, weight: u64) {
        if stack.is_empty() {
            return;
        }
        // A trailing delimiter carries no component.
        let stack = stack.strip_suffix(DELIM).unwrap_or(stack);
        let mut node = 0usize;
        for part in stack.split(DELIM) {
            self.nodes[node].acc_cnt += weight;
            node = self.find_or_insert_child(node, part);
        }
        self.nodes[node].cnt += weight;
        self.nodes[node].acc_cnt += weight;
    }

    /// Locate `name` in `parent`'s sibling list, appending it when absent.
    ///
    /// While scanning, adjacent payloads are swapped whenever the list order
    /// disagrees with `acc_cnt`, so frequently-hit children migrate toward
    /// the head one position per insert.
    fn find_or_insert_child(&mut self, parent: usize, name: &str) -> usize {
        if self.nodes[parent].child == NIL {
            let id = self.alloc(name);
            self.nodes[parent].child = id as u32;
            return id;
        }

        let mut prev = NIL;
        let mut cur = self.nodes[parent].child;
        while cur != NIL {
            if self.nodes[cur as usize].name == name {
                if prev != NIL
                    && self.nodes[prev as usize].acc_cnt < self.nodes[cur as usize].acc_cnt
                {
                    self.swap_payload(prev as usize, cur as usize);
                    return prev as usize;
                }
                return cur as usize;
            }
            if prev != NIL && self.nodes[prev as usize].acc_cnt < self.nodes[cur as usize].acc_cnt
            {
                self.swap_payload(prev as usize, cur as usize);
            }
            prev = cur;
            cur = self.nodes[cur as usize].sibling;
        }

        let id = self.alloc(name);
        // prev is valid here: the list had at least one entry.
        self.nodes[prev as usize].sibling = id as u32;
        id
    }

    /// Swap `{name, cnt, acc_cnt, child}` between two arena slots, leaving
    /// the sibling chain linkage untouched.
    fn swap_payload(&mut self, a: usize, b: usize) {
        self.nodes.swap(a, b);
        let tmp = self.nodes[a].sibling;
        self.nodes[a].sibling = self.nodes[b].sibling;
        self.nodes[b].sibling = tmp;
    }

    fn alloc(&mut self, name: &str) -> usize {
        self.nodes.push(Node::new(name));
        self.nodes.len() - 1
    }

    /// True if nothing has been folded in yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Write the folded-stack artifact: one `path count` record per node
    /// with a non-zero leaf count, newline-separated, no trailing newline.
    ///
    /// Traversal is depth-first in sibling-list order, children before their
    /// parent's own record, using an explicit work stack so arbitrarily deep
    /// trees cannot overflow the call stack.
    pub fn write_folded<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut path: Vec<u32> = Vec::new();
        let mut work: Vec<(u32, bool)> = Vec::new();
        let mut first = true;

        if self.nodes[0].child != NIL {
            work.push((self.nodes[0].child, false));
        }
        while let Some((idx, expanded)) = work.pop() {
            let node = &self.nodes[idx as usize];
            if !expanded {
                path.push(idx);
                work.push((idx, true));
                if node.child != NIL {
                    work.push((node.child, false));
                }
            } else {
                if node.cnt > 0 {
                    if !first {
                        out.write_all(b"\n")?;
                    }
                    first = false;
                    for (i, &p) in path.iter().enumerate() {
                        if i > 0 {
                            out.write_all(&[DELIM as u8])?;
                        }
                        out.write_all(self.nodes[p as usize].name.as_bytes())?;
                    }
                    write!(out, " {}", node.cnt)?;
                }
                path.pop();
                if node.sibling != NIL {
                    work.push((node.sibling, false));
                }
            }
        }
        Ok(())
    }

    /// The folded-stack artifact as an owned string.
    pub fn dumps(&self) -> String {
        let mut buf = Vec::new();
        self.write_folded(&mut buf)
            .expect("writing to a Vec cannot fail");
        String::from_utf8(buf).expect("stack labels are UTF-8")
    }
}
