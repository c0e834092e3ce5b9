//! Ordered map with ceiling queries, as a skip list.

use rand::Rng;
use rand_pcg::Pcg32;
use std::mem::replace;


// highest level a node may reach. a node's level is one less than its number of forward links.
const MAX_LEVEL: usize = 15;
// probability of a node reaching each successive level.
const PROBABILITY: f64 = 0.5;


// position in the list: None is the head sentinel, Some is an index into SkipList.nodes.
type Pos = Option<usize>;

struct Node<K, V> {
    key: K,
    value: V,
    // invariant: forward.len() == this node's level + 1
    forward: Vec<Pos>,
}

/// Ordered map supporting insert, remove and "smallest key ≥ x" lookups in expected O(log n).
///
/// Nodes live in an index arena with a free list, so the structure needs no unsafe code. Levels
/// are drawn from an owned, seedable RNG.
pub struct SkipList<K, V> {
    // forward links of the head sentinel
    head: [Pos; MAX_LEVEL + 1],
    // node arena. a slot is None iff its index is in `free`.
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    // current highest level of any node
    level: usize,
    len: usize,
    rng: Pcg32,
}

impl<K: Ord, V> SkipList<K, V> {
    /// Construct empty, seeding the level generator.
    pub fn new(rng: Pcg32) -> Self {
        SkipList {
            head: [None; MAX_LEVEL + 1],
            nodes: Vec::new(),
            free: Vec::new(),
            level: 0,
            len: 0,
            rng,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no entries.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        self.nodes[idx].as_ref().expect("SkipList link to vacant node (internal bug)")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        self.nodes[idx].as_mut().expect("SkipList link to vacant node (internal bug)")
    }

    // successor of pos at the given level.
    fn next(&self, pos: Pos, level: usize) -> Pos {
        match pos {
            None => self.head[level],
            Some(idx) => self.node(idx).forward[level],
        }
    }

    fn set_next(&mut self, pos: Pos, level: usize, to: Pos) {
        match pos {
            None => self.head[level] = to,
            Some(idx) => self.node_mut(idx).forward[level] = to,
        }
    }

    fn random_level(&mut self) -> usize {
        let mut level = 0;
        while level < MAX_LEVEL && self.rng.gen_bool(PROBABILITY) {
            level += 1;
        }
        level
    }

    // the forward-most position whose key is less than `key`. if `update` is given, it is filled
    // with the position visited at each level, which are the positions whose links must change
    // when inserting or removing at `key`.
    fn greatest_lesser(&self, key: &K, mut update: Option<&mut [Pos; MAX_LEVEL + 1]>) -> Pos {
        let mut pos = None;
        for level in (0..=self.level).rev() {
            while let Some(next) = self.next(pos, level) {
                if self.node(next).key >= *key {
                    break;
                }
                pos = Some(next);
            }
            if let Some(update) = update.as_deref_mut() {
                update[level] = pos;
            }
        }
        pos
    }

    /// Insert an entry, returning the previous value if the key was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let mut update = [None; MAX_LEVEL + 1];
        let pos = self.greatest_lesser(&key, Some(&mut update));

        // exact match, replace in place
        if let Some(idx) = self.next(pos, 0).filter(|&idx| self.node(idx).key == key) {
            return Some(replace(&mut self.node_mut(idx).value, value));
        }

        // levels above the current height are linked from the head, which update already holds
        let new_level = self.random_level();
        if new_level > self.level {
            self.level = new_level;
        }

        let forward = (0..=new_level).map(|level| self.next(update[level], level)).collect();
        let node = Node { key, value, forward };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        for level in 0..=new_level {
            self.set_next(update[level], level, Some(idx));
        }
        self.len += 1;
        None
    }

    /// Remove the entry with exactly this key, if present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let mut update = [None; MAX_LEVEL + 1];
        let pos = self.greatest_lesser(key, Some(&mut update));
        let idx = self.next(pos, 0).filter(|&idx| self.node(idx).key == *key)?;

        for level in 0..=self.level {
            if self.next(update[level], level) == Some(idx) {
                let to = self.node(idx).forward[level];
                self.set_next(update[level], level, to);
            }
        }
        while self.level > 0 && self.head[self.level].is_none() {
            self.level -= 1;
        }

        let node = self.nodes[idx].take()?;
        self.free.push(idx);
        self.len -= 1;
        Some(node.value)
    }

    /// The entry with the smallest key greater than or equal to `key`.
    #[cfg(test)]
    pub fn ceiling(&self, key: &K) -> Option<(&K, &V)> {
        let idx = self.next(self.greatest_lesser(key, None), 0)?;
        let node = self.node(idx);
        Some((&node.key, &node.value))
    }

    /// Mutable version of [`ceiling`](Self::ceiling).
    pub fn ceiling_mut(&mut self, key: &K) -> Option<(&K, &mut V)> {
        let idx = self.next(self.greatest_lesser(key, None), 0)?;
        let node = self.node_mut(idx);
        Some((&node.key, &mut node.value))
    }

    /// Look up the entry with exactly this key.
    #[cfg(test)]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.ceiling(key).filter(|&(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate entries in ascending key order.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item=(&K, &V)> {
        let mut pos = self.head[0];
        std::iter::from_fn(move || {
            let node = self.node(pos?);
            pos = node.forward[0];
            Some((&node.key, &node.value))
        })
    }
}
