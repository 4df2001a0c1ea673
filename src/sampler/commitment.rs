use serde::{Serialize, Deserialize};
use sha2::{Digest, Sha256};

use crate::state::{Amount, CommitmentRoot, Period};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Hash of a single `(period, balance)` observation
pub fn leaf_hash(period: Period, balance: Amount) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(period.to_be_bytes());
    hasher.update(balance.to_be_bytes());
    hasher.finalize().into()
}

/// Parent of two nodes, concatenated in sorted order
fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// Hash tree over balance observations.
///
/// Leaves are sorted before pairing and parents hash their children in sorted
/// order, so the root only depends on the set of observations. An unpaired
/// node at the end of a layer is promoted unchanged.
#[derive(Debug, Clone)]
pub struct CommitmentTree {
    layers: Vec<Vec<[u8; 32]>>,
}

impl CommitmentTree {
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (Period, Amount)>,
    {
        let mut leaves: Vec<[u8; 32]> = observations
            .into_iter()
            .map(|(period, balance)| leaf_hash(period, balance))
            .collect();
        leaves.sort_unstable();

        let mut layers = vec![leaves];
        while layers.last().map_or(false, |layer| layer.len() > 1) {
            let current = &layers[layers.len() - 1];
            let next: Vec<[u8; 32]> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    _ => pair[0],
                })
                .collect();
            layers.push(next);
        }

        Self { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Root of the tree; the zero root for an empty tree
    pub fn root(&self) -> CommitmentRoot {
        match self.layers.last().and_then(|layer| layer.first()) {
            Some(root) => CommitmentRoot::new(*root),
            None => CommitmentRoot::zero(),
        }
    }

    /// Inclusion proof for one observation, if it is part of the tree
    pub fn proof(&self, period: Period, balance: Amount) -> Option<InclusionProof> {
        let leaf = leaf_hash(period, balance);
        let mut index = self.layers.first()?.binary_search(&leaf).ok()?;

        let mut siblings = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = index ^ 1;
            if sibling < layer.len() {
                siblings.push(layer[sibling]);
            }
            index /= 2;
        }

        Some(InclusionProof {
            period,
            balance,
            siblings,
        })
    }
}

/// Proof that one observation is committed under a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub period: Period,
    pub balance: Amount,
    pub siblings: Vec<[u8; 32]>,
}

impl InclusionProof {
    pub fn verify(&self, root: &CommitmentRoot) -> bool {
        let computed = self
            .siblings
            .iter()
            .fold(leaf_hash(self.period, self.balance), |acc, sibling| hash_pair(&acc, sibling));
        computed == root.0
    }
}
