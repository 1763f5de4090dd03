//! Test fixtures: a proof-producing sparse Merkle memory, calldata
//! assembly, and an in-memory pre-image oracle.

use std::collections::HashMap;

use crate::{
    hash::hash_pair,
    memory::{PROOF_DEPTH, PROOF_STRIDE},
    state::State,
    ExecutionError, Interpreter, OracleError, PreimageOracle,
};

/// A sparse model of the 2^64-byte memory that can produce the Merkle
/// witnesses the interpreter consumes. Untouched subtrees hash to cached
/// all-zero nodes, so only the leaves a test writes are materialized.
#[derive(Clone)]
pub(crate) struct SparseMemory {
    /// Touched leaves, keyed by leaf index (`addr >> 5`).
    leaves: HashMap<u64, [u8; 32]>,
    /// `zero_nodes[level]` is the hash of an all-zero subtree of that height.
    zero_nodes: Vec<[u8; 32]>,
}

impl SparseMemory {
    pub(crate) fn new() -> Self {
        let mut zero_nodes = vec![[0u8; 32]];
        for level in 0..PROOF_DEPTH {
            let node = zero_nodes[level];
            zero_nodes.push(hash_pair(&node, &node));
        }
        Self { leaves: HashMap::new(), zero_nodes }
    }

    fn subtree_touched(&self, level: usize, index: u64) -> bool {
        self.leaves.keys().any(|&leaf| leaf >> level == index)
    }

    fn node(&self, level: usize, index: u64) -> [u8; 32] {
        if level == 0 {
            return self.leaves.get(&index).copied().unwrap_or([0u8; 32]);
        }
        if !self.subtree_touched(level, index) {
            return self.zero_nodes[level];
        }
        hash_pair(&self.node(level - 1, 2 * index), &self.node(level - 1, 2 * index + 1))
    }

    /// The Merkle root of the whole memory.
    pub(crate) fn root(&self) -> [u8; 32] {
        self.node(PROOF_DEPTH, 0)
    }

    /// A proof block for the leaf at `addr`, in the calldata slot format:
    /// leaf value, then siblings deepest first, zero-padded to the stride.
    pub(crate) fn proof(&self, addr: u64) -> Vec<u8> {
        assert_eq!(addr & 31, 0, "proofs are per 32-byte leaf");
        let path = addr >> 5;
        let mut out = Vec::with_capacity(PROOF_STRIDE);
        out.extend_from_slice(&self.node(0, path));
        for level in 0..PROOF_DEPTH {
            out.extend_from_slice(&self.node(level, (path >> level) ^ 1));
        }
        out.resize(PROOF_STRIDE, 0);
        out
    }

    pub(crate) fn set_bytes(&mut self, addr: u64, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            let a = addr.wrapping_add(i as u64);
            let leaf = self.leaves.entry(a >> 5).or_insert([0u8; 32]);
            leaf[(a & 31) as usize] = byte;
        }
    }

    pub(crate) fn set_u32(&mut self, addr: u64, value: u32) {
        self.set_bytes(addr, &value.to_le_bytes());
    }

    pub(crate) fn set_u64(&mut self, addr: u64, value: u64) {
        self.set_bytes(addr, &value.to_le_bytes());
    }
}

/// Assemble step calldata: a zero selector, the state record, then the
/// given proof blocks in slot order.
pub(crate) fn build_calldata(state: &State, proofs: &[Vec<u8>]) -> Vec<u8> {
    let mut calldata = vec![0u8; 4];
    calldata.extend_from_slice(state.as_bytes());
    for proof in proofs {
        assert_eq!(proof.len(), PROOF_STRIDE, "proof blocks are stride-sized");
        calldata.extend_from_slice(proof);
    }
    calldata
}

/// Run one step. Slot 0 proves the instruction fetch at the current pc;
/// each address in `slots` fills the next slot with a witness of its leaf,
/// taken from the current tree. On success the state is replaced with the
/// post-step state.
pub(crate) fn step_with(
    mem: &SparseMemory,
    state: &mut State,
    slots: &[u64],
    oracle: &dyn PreimageOracle,
) -> Result<[u8; 32], ExecutionError> {
    let mut proofs = vec![mem.proof(state.pc() & !31)];
    for &addr in slots {
        proofs.push(mem.proof(addr & !31));
    }
    let calldata = build_calldata(state, &proofs);
    let mut interpreter = Interpreter::new(&calldata, oracle)?;
    let hash = interpreter.step()?;
    *state = interpreter.state().clone();
    Ok(hash)
}

/// A `HashMap`-backed pre-image oracle.
#[derive(Default)]
pub(crate) struct MapOracle {
    preimages: HashMap<[u8; 32], Vec<u8>>,
}

impl MapOracle {
    pub(crate) fn insert(&mut self, key: [u8; 32], value: Vec<u8>) {
        self.preimages.insert(key, value);
    }
}

impl PreimageOracle for MapOracle {
    fn read(&self, key: &[u8; 32], offset: u64) -> Result<([u8; 32], u8), OracleError> {
        let data = self
            .preimages
            .get(key)
            .ok_or_else(|| OracleError(format!("unknown pre-image key {}", hex::encode(key))))?;
        let mut chunk = [0u8; 32];
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok((chunk, 0));
        }
        let length = (data.len() - offset).min(32);
        chunk[..length].copy_from_slice(&data[offset..offset + length]);
        Ok((chunk, length as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree_root_matches_zero_nodes() {
        let mem = SparseMemory::new();
        assert_eq!(mem.root(), mem.zero_nodes[PROOF_DEPTH]);
    }

    #[test]
    fn test_root_changes_with_writes() {
        let mut mem = SparseMemory::new();
        let empty = mem.root();
        mem.set_u64(0x1000, 1);
        let one = mem.root();
        assert_ne!(one, empty);
        mem.set_u64(0x1000, 0);
        // Writing zeros restores the all-zero leaf, and the root follows.
        assert_eq!(mem.root(), empty);
    }

    #[test]
    fn test_map_oracle_chunks() {
        let mut oracle = MapOracle::default();
        let key = [1u8; 32];
        oracle.insert(key, (0..40u8).collect());

        let (chunk, len) = oracle.read(&key, 0).unwrap();
        assert_eq!(len, 32);
        assert_eq!(chunk[..32], (0..32u8).collect::<Vec<_>>()[..]);

        let (chunk, len) = oracle.read(&key, 32).unwrap();
        assert_eq!(len, 8);
        assert_eq!(chunk[..8], (32..40u8).collect::<Vec<_>>()[..]);

        let (_, len) = oracle.read(&key, 40).unwrap();
        assert_eq!(len, 0);

        assert!(oracle.read(&[9u8; 32], 0).is_err());
    }
}
