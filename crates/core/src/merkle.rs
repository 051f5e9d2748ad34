//! Merkle commitment trees for transaction roots.
//!
//! Every node is hashed behind a domain tag: leaves as
//! `keccak256("LEAF" || item)` and internal nodes as
//! `keccak256("MERKLE" || left || right)`, where child digests enter the hash
//! in their `0x`-prefixed hex text form. The all-zero sentinel (empty tree,
//! empty sparse leaf) is rendered as 64 bare zeros.
//!
//! JSON items are key-sorted and numeric strings become JSON numbers, but only
//! where that is lossless: integers that fit in `u64`/`i64` and decimal
//! literals. Wider integer strings, such as 18-decimal base-unit amounts, stay
//! strings rather than collapsing to a rounded float, so their leaves differ
//! from encoders that coerce every numeric string to a float.

use crate::hash::{hash_tagged, keccak256, Hash, LEAF_TAG, NODE_TAG};
use serde_json::{Map, Number, Value};

/// Text form of a node digest as it enters a parent hash.
pub fn encode_node(hash: &Hash) -> String {
    if hash.is_zero() {
        hash.to_hex()
    } else {
        hash.to_string()
    }
}

/// Hash two sibling digests into their parent.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let text = format!("{}{}", encode_node(left), encode_node(right));
    hash_tagged(NODE_TAG, text.as_bytes())
}

/// Combine two Merkle roots into a single root.
pub fn combine_roots(left: &Hash, right: &Hash) -> Hash {
    hash_pair(left, right)
}

/// An item committed to by a Merkle leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum MerkleItem {
    /// An entity that already carries a canonical hash (e.g. a transaction).
    Hashed(Hash),
    /// Raw text, hashed as-is.
    Text(String),
    /// Structured data, key-sorted and JSON-encoded before hashing.
    Json(Value),
}

impl MerkleItem {
    /// The bytes that follow the `LEAF` tag.
    fn leaf_preimage(&self) -> String {
        match self {
            MerkleItem::Hashed(hash) => encode_node(hash),
            MerkleItem::Text(text) => text.clone(),
            MerkleItem::Json(value) => normalize(value).to_string(),
        }
    }
}

impl From<Hash> for MerkleItem {
    fn from(hash: Hash) -> Self {
        MerkleItem::Hashed(hash)
    }
}

impl From<&str> for MerkleItem {
    fn from(text: &str) -> Self {
        MerkleItem::Text(text.to_string())
    }
}

impl From<String> for MerkleItem {
    fn from(text: String) -> Self {
        MerkleItem::Text(text)
    }
}

impl From<Value> for MerkleItem {
    fn from(value: Value) -> Self {
        MerkleItem::Json(value)
    }
}

/// Recursively sort object keys and turn numeric strings into numbers.
fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, val) in entries {
                sorted.insert(key.clone(), normalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::String(s) => numeric_string(s).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn numeric_string(s: &str) -> Option<Value> {
    if let Ok(n) = s.parse::<u64>() {
        return Some(Value::Number(n.into()));
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    let looks_decimal = s.contains('.')
        && s.trim_start_matches('-')
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.');
    if looks_decimal {
        return s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number);
    }
    None
}

/// The domain-tagged leaf digest for `item`.
pub fn leaf_hash(item: &MerkleItem) -> Hash {
    hash_tagged(LEAF_TAG, item.leaf_preimage().as_bytes())
}

/// Direction of a sibling relative to the node being proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// One step of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Hash,
    pub direction: Direction,
}

/// Compute the Merkle root of a list of items.
///
/// Returns the zero sentinel if the list is empty.
pub fn merkle_root(items: &[MerkleItem]) -> Hash {
    MerkleTree::build(items).root()
}

/// A Merkle tree with every level retained for proofs.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes in the tree, level by level (leaves first).
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree over `items` in order.
    pub fn build(items: &[MerkleItem]) -> Self {
        let leaves: Vec<Hash> = items.iter().map(leaf_hash).collect();
        Self::from_leaves(leaves)
    }

    /// Build a tree from precomputed leaf digests.
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => hash_pair(left, right),
                    // Odd number of nodes: pair the last one with itself
                    [single] => hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Self { levels }
    }

    /// Get the root of the merkle tree (zero sentinel when empty).
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// Get the number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    /// Leaf digests in order.
    pub fn leaves(&self) -> &[Hash] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// All levels, leaves first.
    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    /// Number of levels including the leaves and the root.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Generate a proof for the leaf at the given index.
    ///
    /// When a node has no real sibling (last node of an odd level) its own
    /// digest is recorded, with the direction chosen by the node's position.
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut steps = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let is_right_node = idx % 2 == 1;
            let sibling_idx = if is_right_node { idx - 1 } else { idx + 1 };
            let sibling = level.get(sibling_idx).copied().unwrap_or(level[idx]);
            let direction = if is_right_node {
                Direction::Left
            } else {
                Direction::Right
            };
            steps.push(ProofStep { sibling, direction });
            idx /= 2;
        }

        Some(steps)
    }

    /// Verify a proof for `leaf` against this tree's root.
    pub fn verify(&self, leaf: &Hash, proof: &[ProofStep]) -> bool {
        verify_proof(leaf, proof, &self.root())
    }

    /// Check that `item` is the leaf stored at `index`.
    pub fn verify_leaf(&self, item: &MerkleItem, index: usize) -> bool {
        self.leaves()
            .get(index)
            .is_some_and(|leaf| *leaf == leaf_hash(item))
    }
}

/// Replay `proof` from `leaf` and compare the result with `expected_root`.
pub fn verify_proof(leaf: &Hash, proof: &[ProofStep], expected_root: &Hash) -> bool {
    let computed = proof.iter().fold(*leaf, |current, step| match step.direction {
        Direction::Left => hash_pair(&step.sibling, &current),
        Direction::Right => hash_pair(&current, &step.sibling),
    });
    computed == *expected_root
}

/// Maximum depth of a sparse tree: one level per bit of a 256-bit key hash.
pub const SPARSE_MAX_DEPTH: usize = 256;

/// A sparse Merkle tree over a key/value map.
///
/// Each key selects a leaf through the MSB-first bits of `keccak256(key)`;
/// unset subtrees take precomputed default digests.
#[derive(Debug, Clone)]
pub struct SparseMerkleTree {
    depth: usize,
    /// `defaults[d]` is the digest of an empty subtree rooted at depth `d`.
    defaults: Vec<Hash>,
    /// Leaf path bits mapped to the leaf digest, kept sorted by path.
    leaves: Vec<(Vec<bool>, Hash)>,
}

impl Default for SparseMerkleTree {
    fn default() -> Self {
        Self::new(SPARSE_MAX_DEPTH)
    }
}

impl SparseMerkleTree {
    /// Create an empty tree. `depth` is clamped to `1..=256`.
    pub fn new(depth: usize) -> Self {
        let depth = depth.clamp(1, SPARSE_MAX_DEPTH);
        Self {
            depth,
            defaults: default_hashes(depth),
            leaves: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Default digests per depth; index 0 is the empty root, index `depth`
    /// the empty leaf.
    pub fn default_hashes(&self) -> &[Hash] {
        &self.defaults
    }

    /// Number of populated leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    fn path(&self, key: &[u8]) -> Vec<bool> {
        let digest = keccak256(key);
        (0..self.depth)
            .map(|i| (digest.0[i / 8] >> (7 - (i % 8))) & 1 == 1)
            .collect()
    }

    /// Whether a value has been stored under `key`.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        let path = self.path(key);
        self.leaves.binary_search_by(|(p, _)| p.cmp(&path)).is_ok()
    }

    /// Store `value` under `key` and return the new root.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Hash {
        let path = self.path(key);
        let mut preimage = Vec::with_capacity(LEAF_TAG.len() + value.len());
        preimage.extend_from_slice(LEAF_TAG);
        preimage.extend_from_slice(value);
        let leaf = keccak256(&preimage);

        match self.leaves.binary_search_by(|(p, _)| p.cmp(&path)) {
            Ok(pos) => self.leaves[pos].1 = leaf,
            Err(pos) => self.leaves.insert(pos, (path, leaf)),
        }
        self.root()
    }

    /// Current root digest.
    pub fn root(&self) -> Hash {
        self.subtree_root(0, &self.leaves)
    }

    fn subtree_root(&self, depth: usize, leaves: &[(Vec<bool>, Hash)]) -> Hash {
        if leaves.is_empty() {
            return self.defaults[depth];
        }
        if depth == self.depth {
            return leaves[0].1;
        }
        // Leaves are sorted by path, so the left (0-bit) branch is a prefix.
        let split = leaves.partition_point(|(path, _)| !path[depth]);
        let left = self.subtree_root(depth + 1, &leaves[..split]);
        let right = self.subtree_root(depth + 1, &leaves[split..]);
        hash_pair(&left, &right)
    }
}

/// Empty-subtree digests for a sparse tree of `depth` levels.
pub fn default_hashes(depth: usize) -> Vec<Hash> {
    let mut defaults = vec![Hash::ZERO; depth + 1];
    for d in (0..depth).rev() {
        defaults[d] = hash_pair(&defaults[d + 1], &defaults[d + 1]);
    }
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_items(n: usize) -> Vec<MerkleItem> {
        (0..n).map(|i| MerkleItem::Text(format!("tx{i}"))).collect()
    }

    #[test]
    fn test_merkle_root_empty() {
        let tree = MerkleTree::build(&[]);
        assert_eq!(tree.root(), Hash::ZERO);
        assert_eq!(encode_node(&tree.root()), "0".repeat(64));
        assert!(tree.proof(0).is_none());
    }

    #[test]
    fn test_merkle_root_single() {
        let items = make_items(1);
        let root = merkle_root(&items);
        assert_eq!(root, keccak256(b"LEAFtx0"));
    }

    #[test]
    fn test_merkle_root_two() {
        let items = make_items(2);
        let root = merkle_root(&items);
        let left = keccak256(b"LEAFtx0");
        let right = keccak256(b"LEAFtx1");
        let expected = keccak256(format!("MERKLE{}{}", left, right).as_bytes());
        assert_eq!(root, expected);
    }

    #[test]
    fn test_hashed_items_use_prefixed_text() {
        let tx_hash = keccak256(b"some transaction");
        let leaf = leaf_hash(&MerkleItem::Hashed(tx_hash));
        assert_eq!(leaf, keccak256(format!("LEAF{}", tx_hash).as_bytes()));
    }

    #[test]
    fn test_json_items_are_key_sorted() {
        let a = MerkleItem::Json(json!({"to": "0xbob", "from": "0xalice", "amount": "10"}));
        let b = MerkleItem::Json(json!({"amount": 10, "from": "0xalice", "to": "0xbob"}));
        assert_eq!(leaf_hash(&a), leaf_hash(&b));
        assert_eq!(
            leaf_hash(&a),
            keccak256(br#"LEAF{"amount":10,"from":"0xalice","to":"0xbob"}"#)
        );
    }

    #[test]
    fn test_json_base_unit_amounts_stay_exact() {
        let wide = MerkleItem::Json(json!({"amount": "100000000000000000000", "nonce": "7"}));
        assert_eq!(
            leaf_hash(&wide),
            keccak256(br#"LEAF{"amount":"100000000000000000000","nonce":7}"#)
        );

        let neighbour = MerkleItem::Json(json!({"amount": "100000000000000000001", "nonce": "7"}));
        assert_ne!(leaf_hash(&wide), leaf_hash(&neighbour));
    }

    #[test]
    fn test_merkle_root_deterministic() {
        let items = make_items(10);
        let t1 = MerkleTree::build(&items);
        let t2 = MerkleTree::build(&items);
        assert_eq!(t1.root(), t2.root());
        for i in 0..items.len() {
            assert_eq!(t1.proof(i), t2.proof(i));
        }
    }

    #[test]
    fn test_merkle_root_order_matters() {
        let items = make_items(4);
        let mut reversed = items.clone();
        reversed.reverse();
        assert_ne!(merkle_root(&items), merkle_root(&reversed));
    }

    #[test]
    fn test_odd_level_duplicates_last_node() {
        let items = make_items(3);
        let tree = MerkleTree::build(&items);
        let leaves = tree.leaves();
        let left = hash_pair(&leaves[0], &leaves[1]);
        let right = hash_pair(&leaves[2], &leaves[2]);
        assert_eq!(tree.root(), hash_pair(&left, &right));
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_merkle_proof_valid() {
        let items = make_items(8);
        let tree = MerkleTree::build(&items);

        for (i, item) in items.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert_eq!(proof.len(), 3);
            assert!(verify_proof(&leaf_hash(item), &proof, &tree.root()));
            assert!(tree.verify(&leaf_hash(item), &proof));
        }
    }

    #[test]
    fn test_merkle_proof_odd_leaves() {
        for n in [3usize, 5, 7, 10] {
            let items = make_items(n);
            let tree = MerkleTree::build(&items);
            for (i, item) in items.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(verify_proof(&leaf_hash(item), &proof, &tree.root()), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_duplicated_sibling_step() {
        // Five leaves: leaf 4 has no sibling on levels 0 and 1.
        let items = make_items(5);
        let tree = MerkleTree::build(&items);
        let proof = tree.proof(4).unwrap();
        let leaves = tree.leaves();

        assert_eq!(proof[0].sibling, leaves[4]);
        assert_eq!(proof[0].direction, Direction::Right);
        assert_eq!(proof[1].sibling, tree.levels()[1][2]);
        assert_eq!(proof[1].direction, Direction::Right);
        assert_eq!(proof[2].sibling, tree.levels()[2][0]);
        assert_eq!(proof[2].direction, Direction::Left);
        assert!(verify_proof(&leaves[4], &proof, &tree.root()));
    }

    #[test]
    fn test_mutated_item_fails_proof() {
        let items = make_items(6);
        let tree = MerkleTree::build(&items);
        let proof = tree.proof(2).unwrap();
        let tampered = MerkleItem::Text("tx3".to_string());
        assert!(!verify_proof(&leaf_hash(&tampered), &proof, &tree.root()));
    }

    #[test]
    fn test_merkle_proof_invalid_index() {
        let tree = MerkleTree::build(&make_items(4));
        assert!(tree.proof(10).is_none());
    }

    #[test]
    fn test_merkle_proof_wrong_root() {
        let items = make_items(4);
        let tree = MerkleTree::build(&items);
        let proof = tree.proof(0).unwrap();
        let wrong_root = keccak256(b"wrong");
        assert!(!verify_proof(&leaf_hash(&items[0]), &proof, &wrong_root));
    }

    #[test]
    fn test_verify_leaf() {
        let items = make_items(3);
        let tree = MerkleTree::build(&items);
        assert!(tree.verify_leaf(&items[1], 1));
        assert!(!tree.verify_leaf(&items[1], 0));
        assert!(!tree.verify_leaf(&items[1], 9));
    }

    #[test]
    fn test_combine_roots() {
        let a = merkle_root(&make_items(2));
        let b = merkle_root(&make_items(3));
        assert_eq!(combine_roots(&a, &b), keccak256(format!("MERKLE{a}{b}").as_bytes()));
    }

    #[test]
    fn test_sparse_default_hashes() {
        let defaults = default_hashes(4);
        assert_eq!(defaults.len(), 5);
        assert_eq!(defaults[4], Hash::ZERO);
        let expected = keccak256(format!("MERKLE{}{}", "0".repeat(64), "0".repeat(64)).as_bytes());
        assert_eq!(defaults[3], expected);
        assert_eq!(defaults[2], hash_pair(&defaults[3], &defaults[3]));
    }

    #[test]
    fn test_sparse_empty_root_is_default() {
        let tree = SparseMerkleTree::new(16);
        assert_eq!(tree.root(), tree.default_hashes()[0]);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_sparse_insert_and_update() {
        let mut tree = SparseMerkleTree::default();
        let empty = tree.root();
        let r1 = tree.insert(b"alice", b"100");
        assert_ne!(r1, empty);
        assert!(tree.contains_key(b"alice"));
        assert!(!tree.contains_key(b"bob"));

        let r2 = tree.insert(b"bob", b"50");
        assert_ne!(r2, r1);
        assert_eq!(tree.len(), 2);

        // Point update replaces the leaf.
        let r3 = tree.insert(b"alice", b"90");
        assert_ne!(r3, r2);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.insert(b"alice", b"100"), r2);
    }

    #[test]
    fn test_sparse_root_independent_of_insert_order() {
        let mut a = SparseMerkleTree::new(32);
        a.insert(b"k1", b"v1");
        a.insert(b"k2", b"v2");
        a.insert(b"k3", b"v3");

        let mut b = SparseMerkleTree::new(32);
        b.insert(b"k3", b"v3");
        b.insert(b"k1", b"v1");
        b.insert(b"k2", b"v2");

        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_sparse_single_leaf_path() {
        let mut tree = SparseMerkleTree::new(8);
        let root = tree.insert(b"key", b"value");

        let bits = keccak256(b"key").0[0];
        let mut node = keccak256(b"LEAFvalue");
        let defaults = tree.default_hashes().to_vec();
        for depth in (0..8).rev() {
            let bit = (bits >> (7 - depth)) & 1;
            node = if bit == 0 {
                hash_pair(&node, &defaults[depth + 1])
            } else {
                hash_pair(&defaults[depth + 1], &node)
            };
        }
        assert_eq!(root, node);
    }
}
