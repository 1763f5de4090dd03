//! The fixed-layout machine state record and its typed accessors.

use crate::{hash::keccak256, ExecutionError, Register};

/// Size of the Merkle root of memory.
pub const STATE_SIZE_MEM_ROOT: usize = 32;
/// Size of the pre-image key.
pub const STATE_SIZE_PREIMAGE_KEY: usize = 32;
/// Size of the pre-image offset.
pub const STATE_SIZE_PREIMAGE_OFFSET: usize = 8;
/// Size of the program counter.
pub const STATE_SIZE_PC: usize = 8;
/// Size of the exit code.
pub const STATE_SIZE_EXIT_CODE: usize = 1;
/// Size of the exited flag.
pub const STATE_SIZE_EXITED: usize = 1;
/// Size of the step counter.
pub const STATE_SIZE_STEP: usize = 8;
/// Size of the heap pointer.
pub const STATE_SIZE_HEAP: usize = 8;
/// Size of the load reservation.
pub const STATE_SIZE_LOAD_RESERVATION: usize = 8;
/// Size of the register file.
pub const STATE_SIZE_REGISTERS: usize = 8 * 32;

/// Offset of the Merkle root of memory.
pub const STATE_OFFSET_MEM_ROOT: usize = 0;
/// Offset of the pre-image key.
pub const STATE_OFFSET_PREIMAGE_KEY: usize = STATE_OFFSET_MEM_ROOT + STATE_SIZE_MEM_ROOT;
/// Offset of the pre-image offset.
pub const STATE_OFFSET_PREIMAGE_OFFSET: usize = STATE_OFFSET_PREIMAGE_KEY + STATE_SIZE_PREIMAGE_KEY;
/// Offset of the program counter.
pub const STATE_OFFSET_PC: usize = STATE_OFFSET_PREIMAGE_OFFSET + STATE_SIZE_PREIMAGE_OFFSET;
/// Offset of the exit code.
pub const STATE_OFFSET_EXIT_CODE: usize = STATE_OFFSET_PC + STATE_SIZE_PC;
/// Offset of the exited flag.
pub const STATE_OFFSET_EXITED: usize = STATE_OFFSET_EXIT_CODE + STATE_SIZE_EXIT_CODE;
/// Offset of the step counter.
pub const STATE_OFFSET_STEP: usize = STATE_OFFSET_EXITED + STATE_SIZE_EXITED;
/// Offset of the heap pointer.
pub const STATE_OFFSET_HEAP: usize = STATE_OFFSET_STEP + STATE_SIZE_STEP;
/// Offset of the load reservation.
pub const STATE_OFFSET_LOAD_RESERVATION: usize = STATE_OFFSET_HEAP + STATE_SIZE_HEAP;
/// Offset of the register file.
pub const STATE_OFFSET_REGISTERS: usize =
    STATE_OFFSET_LOAD_RESERVATION + STATE_SIZE_LOAD_RESERVATION;
/// Total size of the state record.
pub const STATE_SIZE: usize = STATE_OFFSET_REGISTERS + STATE_SIZE_REGISTERS;

/// The machine state record.
///
/// A contiguous 362-byte buffer with a fixed field layout; all multi-byte
/// integers are little-endian. The record is hashed as-is to produce the
/// state commitment, so every mutation goes through these accessors to keep
/// the byte layout canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    data: [u8; STATE_SIZE],
}

impl Default for State {
    fn default() -> Self {
        Self { data: [0u8; STATE_SIZE] }
    }
}

impl State {
    /// Create a state record from its serialized form.
    ///
    /// # Errors
    ///
    /// Fails if `bytes` is not exactly [`STATE_SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExecutionError> {
        let data = bytes
            .try_into()
            .map_err(|_| ExecutionError::MalformedCalldata("state record has wrong length".into()))?;
        Ok(Self { data })
    }

    /// The raw serialized record.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; STATE_SIZE] {
        &self.data
    }

    /// The state commitment: keccak256 of the serialized record.
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        keccak256(&self.data)
    }

    fn read_u64(&self, offset: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[offset..offset + 8]);
        u64::from_le_bytes(bytes)
    }

    fn write_u64(&mut self, offset: usize, value: u64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// The Merkle root of memory.
    #[must_use]
    pub fn mem_root(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.data[STATE_OFFSET_MEM_ROOT..STATE_OFFSET_MEM_ROOT + 32]);
        out
    }

    /// Replace the Merkle root of memory.
    pub fn set_mem_root(&mut self, root: [u8; 32]) {
        self.data[STATE_OFFSET_MEM_ROOT..STATE_OFFSET_MEM_ROOT + 32].copy_from_slice(&root);
    }

    /// The pre-image key currently being assembled or read.
    #[must_use]
    pub fn preimage_key(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.data[STATE_OFFSET_PREIMAGE_KEY..STATE_OFFSET_PREIMAGE_KEY + 32]);
        out
    }

    /// Replace the pre-image key.
    pub fn set_preimage_key(&mut self, key: [u8; 32]) {
        self.data[STATE_OFFSET_PREIMAGE_KEY..STATE_OFFSET_PREIMAGE_KEY + 32].copy_from_slice(&key);
    }

    /// The next byte offset to read from the pre-image value.
    #[must_use]
    pub fn preimage_offset(&self) -> u64 {
        self.read_u64(STATE_OFFSET_PREIMAGE_OFFSET)
    }

    /// Set the pre-image read offset.
    pub fn set_preimage_offset(&mut self, offset: u64) {
        self.write_u64(STATE_OFFSET_PREIMAGE_OFFSET, offset);
    }

    /// The program counter.
    #[must_use]
    pub fn pc(&self) -> u64 {
        self.read_u64(STATE_OFFSET_PC)
    }

    /// Set the program counter.
    pub fn set_pc(&mut self, pc: u64) {
        self.write_u64(STATE_OFFSET_PC, pc);
    }

    /// The guest exit status, meaningful once [`State::exited`] is set.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.data[STATE_OFFSET_EXIT_CODE]
    }

    /// Set the guest exit status.
    pub fn set_exit_code(&mut self, code: u8) {
        self.data[STATE_OFFSET_EXIT_CODE] = code;
    }

    /// Whether the guest has exited.
    #[must_use]
    pub const fn exited(&self) -> bool {
        self.data[STATE_OFFSET_EXITED] != 0
    }

    /// Mark the guest as exited. The flag transitions from 0 to 1 exactly once.
    pub fn set_exited(&mut self) {
        self.data[STATE_OFFSET_EXITED] = 1;
    }

    /// The monotonic step counter, maintained by the host.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.read_u64(STATE_OFFSET_STEP)
    }

    /// The next anonymous-mmap address to hand out.
    #[must_use]
    pub fn heap(&self) -> u64 {
        self.read_u64(STATE_OFFSET_HEAP)
    }

    /// Set the heap pointer.
    pub fn set_heap(&mut self, heap: u64) {
        self.write_u64(STATE_OFFSET_HEAP, heap);
    }

    /// The address reserved by the last LR, zero if none.
    #[must_use]
    pub fn load_reservation(&self) -> u64 {
        self.read_u64(STATE_OFFSET_LOAD_RESERVATION)
    }

    /// Set the load reservation address.
    pub fn set_load_reservation(&mut self, addr: u64) {
        self.write_u64(STATE_OFFSET_LOAD_RESERVATION, addr);
    }

    /// Read register `reg`. `x0` always reads zero.
    ///
    /// # Errors
    ///
    /// Reverts with [`ExecutionError::InvalidRegister`] if `reg > 31`.
    pub fn register(&self, reg: u64) -> Result<u64, ExecutionError> {
        let reg = Register::from_u64(reg)?;
        Ok(self.read_u64(STATE_OFFSET_REGISTERS + (reg as usize) * 8))
    }

    /// Write register `reg`. Writes to `x0` are discarded.
    ///
    /// # Errors
    ///
    /// Reverts with [`ExecutionError::InvalidRegister`] if `reg > 31`.
    pub fn set_register(&mut self, reg: u64, value: u64) -> Result<(), ExecutionError> {
        let reg = Register::from_u64(reg)?;
        if reg == Register::X0 {
            return Ok(());
        }
        self.write_u64(STATE_OFFSET_REGISTERS + (reg as usize) * 8, value);
        Ok(())
    }
}
