//! Pre-image oracle glue: the data paths behind the pre-image file
//! descriptors.
//!
//! Writes to fd 6 assemble the oracle query key inside the state record;
//! reads from fd 5 stream the pre-image value into guest memory, 32 bytes
//! at a time.

use crate::{memory::PROOF_MEM_LEFT, ExecutionError, Interpreter};

impl Interpreter<'_> {
    /// Shift `count` bytes at `addr` into the pre-image key and reset the
    /// read offset. Returns the number of bytes actually consumed, clipped
    /// so that only the single leaf containing `addr` is touched.
    pub(crate) fn write_preimage_key(
        &mut self,
        addr: u64,
        count: u64,
    ) -> Result<u64, ExecutionError> {
        let alignment = addr & 31;
        let count = count.min(32 - alignment);

        let leaf = self.read_leaf(addr - alignment, PROOF_MEM_LEFT)?;
        let data = &leaf[alignment as usize..(alignment + count) as usize];

        // Append to the key by byte-shifting: drop the oldest bytes, pull the
        // new ones in at the low end.
        let key = self.state.preimage_key();
        let mut new_key = [0u8; 32];
        let shift = count as usize;
        new_key[..32 - shift].copy_from_slice(&key[shift..]);
        new_key[32 - shift..].copy_from_slice(data);

        tracing::debug!(key = %hex::encode(new_key), count, "pre-image key write");
        self.state.set_preimage_key(new_key);
        self.state.set_preimage_offset(0);
        Ok(count)
    }

    /// Read up to `count` bytes of the current pre-image value into memory
    /// at `addr`, advancing the read offset. Returns the number of bytes
    /// written; zero signals EOF.
    pub(crate) fn read_preimage_value(
        &mut self,
        addr: u64,
        count: u64,
    ) -> Result<u64, ExecutionError> {
        let key = self.state.preimage_key();
        let offset = self.state.preimage_offset();

        let (chunk, length) = self.oracle.read(&key, offset)?;
        if length == 0 {
            return Ok(0);
        }

        let alignment = addr & 31;
        let count = count.min(32 - alignment).min(u64::from(length));

        let mut leaf = self.read_leaf(addr - alignment, PROOF_MEM_LEFT)?;
        leaf[alignment as usize..(alignment + count) as usize]
            .copy_from_slice(&chunk[..count as usize]);

        tracing::debug!(offset, count, "pre-image value read");
        self.state.set_preimage_offset(offset + count);
        self.write_leaf(addr - alignment, leaf, PROOF_MEM_LEFT)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        fixtures::{build_calldata, MapOracle, SparseMemory},
        state::State,
        ExecutionError, Interpreter,
    };

    fn state_for(mem: &SparseMemory) -> State {
        let mut state = State::default();
        state.set_mem_root(mem.root());
        state
    }

    #[test]
    fn test_write_preimage_key_shifts_bytes_in() {
        let mut mem = SparseMemory::new();
        mem.set_bytes(0x100, &[0xAA, 0xBB, 0xCC, 0xDD]);
        let mut state = state_for(&mem);
        state.set_preimage_key([0x11; 32]);
        state.set_preimage_offset(99);
        // Slot 1 proves the leaf holding the key bytes.
        let calldata = build_calldata(&state, &[vec![0; 2048], mem.proof(0x100)]);
        let oracle = MapOracle::default();
        let mut it = Interpreter::new(&calldata, &oracle).unwrap();

        let consumed = it.write_preimage_key(0x100, 4).unwrap();
        assert_eq!(consumed, 4);

        let key = it.state().preimage_key();
        assert_eq!(key[..28], [0x11; 28]);
        assert_eq!(key[28..], [0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(it.state().preimage_offset(), 0);
    }

    #[test]
    fn test_write_preimage_key_clips_to_leaf() {
        let mut mem = SparseMemory::new();
        mem.set_bytes(0x1C, &[1, 2, 3, 4]);
        let mut state = state_for(&mem);
        state.set_preimage_key([0; 32]);
        let calldata = build_calldata(&state, &[vec![0; 2048], mem.proof(0)]);
        let oracle = MapOracle::default();
        let mut it = Interpreter::new(&calldata, &oracle).unwrap();

        // Only 4 bytes remain in the leaf at alignment 28.
        let consumed = it.write_preimage_key(0x1C, 32).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(it.state().preimage_key()[28..], [1, 2, 3, 4]);
    }

    #[test]
    fn test_read_preimage_value_blends_chunk() {
        let mem = SparseMemory::new();
        let mut state = state_for(&mem);
        let key = [0x42; 32];
        state.set_preimage_key(key);

        let mut oracle = MapOracle::default();
        oracle.insert(key, b"hello world".to_vec());

        let calldata = build_calldata(&state, &[vec![0; 2048], mem.proof(0x200)]);
        let mut it = Interpreter::new(&calldata, &oracle).unwrap();

        let n = it.read_preimage_value(0x204, 64).unwrap();
        assert_eq!(n, 11);
        assert_eq!(it.state().preimage_offset(), 11);

        let mut expected = mem.clone();
        expected.set_bytes(0x204, b"hello world");
        assert_eq!(it.state().mem_root(), expected.root());
    }

    #[test]
    fn test_read_preimage_value_respects_offset() {
        let mem = SparseMemory::new();
        let mut state = state_for(&mem);
        let key = [0x01; 32];
        state.set_preimage_key(key);
        state.set_preimage_offset(6);

        let mut oracle = MapOracle::default();
        oracle.insert(key, b"hello world".to_vec());

        let calldata = build_calldata(&state, &[vec![0; 2048], mem.proof(0x200)]);
        let mut it = Interpreter::new(&calldata, &oracle).unwrap();

        let n = it.read_preimage_value(0x200, 3).unwrap();
        assert_eq!(n, 3);
        assert_eq!(it.state().preimage_offset(), 9);

        let mut expected = mem.clone();
        expected.set_bytes(0x200, b"wor");
        assert_eq!(it.state().mem_root(), expected.root());
    }

    #[test]
    fn test_read_preimage_value_eof() {
        let mem = SparseMemory::new();
        let mut state = state_for(&mem);
        let key = [0x02; 32];
        state.set_preimage_key(key);
        state.set_preimage_offset(5);

        let mut oracle = MapOracle::default();
        oracle.insert(key, vec![9, 9, 9, 9, 9]);

        let calldata = build_calldata(&state, &[vec![0; 2048], mem.proof(0)]);
        let root = state.mem_root();
        let mut it = Interpreter::new(&calldata, &oracle).unwrap();

        assert_eq!(it.read_preimage_value(0, 8).unwrap(), 0);
        // EOF leaves memory and the offset untouched.
        assert_eq!(it.state().preimage_offset(), 5);
        assert_eq!(it.state().mem_root(), root);
    }

    #[test]
    fn test_read_preimage_unknown_key_reverts() {
        let mem = SparseMemory::new();
        let mut state = state_for(&mem);
        state.set_preimage_key([0x7F; 32]);
        let oracle = MapOracle::default();
        let calldata = build_calldata(&state, &[vec![0; 2048], mem.proof(0)]);
        let mut it = Interpreter::new(&calldata, &oracle).unwrap();

        let err = it.read_preimage_value(0, 8).unwrap_err();
        assert!(matches!(err, ExecutionError::Oracle(_)));
        assert_eq!(err.revert_code(), 0x0bad_f00d);
    }
}
