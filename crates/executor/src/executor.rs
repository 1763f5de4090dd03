//! The single-step interpreter: fetch, decode, execute, commit.

use std::num::Wrapping;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    decode::{
        csr_field, decode, imm_b, imm_i, imm_j, imm_s, imm_u, Decoded, OPCODE_AMO, OPCODE_AUIPC,
        OPCODE_BRANCH, OPCODE_JAL, OPCODE_JALR, OPCODE_LOAD, OPCODE_LOAD_FP, OPCODE_LUI,
        OPCODE_MISC_MEM, OPCODE_OP, OPCODE_OP_32, OPCODE_OP_FP, OPCODE_OP_IMM, OPCODE_OP_IMM_32,
        OPCODE_STORE, OPCODE_STORE_FP, OPCODE_SYSTEM,
    },
    memory::{NO_PROOF, PROOF_INSTRUCTION, PROOF_MEM_LEFT, PROOF_MEM_RIGHT, PROOF_MEM_RIGHT_POST},
    syscalls::{get_syscall, SyscallCode, SyscallContext},
    word::{self, mask32_signed},
    OracleError, PreimageOracle, Register, State, STATE_SIZE,
};

/// Bytes of the ABI selector preceding the state record in calldata.
pub const SELECTOR_SIZE: usize = 4;

/// Errors that terminate a step. Each is a fatal revert: no state hash is
/// produced and nothing is retried.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionError {
    /// A Merkle leaf access that is not 32-byte aligned.
    #[error("address {0:#x} is not aligned with 32 bytes")]
    UnalignedMemoryAccess(u64),

    /// The witness does not fold back up to the committed memory root.
    #[error(
        "reconstructed memory root {} does not match committed root {}",
        hex::encode(.computed),
        hex::encode(.expected)
    )]
    MemRootMismatch {
        /// The root computed from the witness.
        computed: [u8; 32],
        /// The root committed in the state record.
        expected: [u8; 32],
    },

    /// The pre-image oracle failed to resolve a query.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// A register index outside `x0..=x31`.
    #[error("invalid register index {0}")]
    InvalidRegister(u64),

    /// A CSR instruction with an unknown read-modify-write mode.
    #[error("unknown CSR mode {0}")]
    InvalidCsrMode(u64),

    /// An atomic memory operation narrower than 4 bytes.
    #[error("bad AMO size {0}")]
    InvalidAmoSize(u64),

    /// An atomic opcode with an unknown funct7 operation.
    #[error("unknown atomic operation {0:#x}")]
    UnknownAtomicOp(u64),

    /// An instruction with an opcode outside the supported set.
    #[error("unknown instruction opcode {0:#x}")]
    UnknownOpcode(u32),

    /// An ECALL with an unsupported syscall number in a7.
    #[error("unrecognized system call {0}")]
    UnknownSyscall(u64),

    /// A getrlimit lookup for a resource other than RLIMIT_NOFILE.
    #[error("unrecognized resource limit lookup {0}")]
    UnknownRlimit(u64),

    /// A memory load wider than a machine word.
    #[error("cannot load more than 8 bytes: {0}")]
    LoadTooWide(u64),

    /// A memory store wider than a leaf.
    #[error("cannot store more than 32 bytes: {0}")]
    StoreTooWide(u64),

    /// A referenced proof slot is not fully present in calldata.
    #[error("proof slot {0} is not present in calldata")]
    MissingProof(u8),

    /// A boundary-crossing access without a right-side witness.
    #[error("access at {0:#x} crosses a leaf boundary without a right-side proof")]
    MissingRightProof(u64),

    /// Calldata too short or otherwise unusable.
    #[error("malformed calldata: {0}")]
    MalformedCalldata(String),
}

impl ExecutionError {
    /// The 32-bit revert code carried by this fault. Faults outside the
    /// recognized table (calldata shape errors) revert with code zero.
    #[must_use]
    pub const fn revert_code(&self) -> u32 {
        match self {
            Self::UnalignedMemoryAccess(_) => 0xbad1_0ad0,
            Self::MemRootMismatch { .. } | Self::Oracle(_) => 0x0bad_f00d,
            Self::InvalidRegister(_) => 0x00ba_d4e9,
            Self::InvalidCsrMode(_) => 0xbadc_0de0,
            Self::InvalidAmoSize(_) => 0x00ba_da70,
            Self::UnknownAtomicOp(_) => 0x0f00_1a70,
            Self::UnknownOpcode(_) => 0xf001_c0de,
            Self::UnknownSyscall(_) => 0xf001_ca11,
            Self::UnknownRlimit(_) => 0x000f_0012,
            Self::LoadTooWide(_)
            | Self::StoreTooWide(_)
            | Self::MissingProof(_)
            | Self::MissingRightProof(_)
            | Self::MalformedCalldata(_) => 0,
        }
    }
}

/// Advance a serialized machine state by exactly one instruction and return
/// the commitment to the new state.
///
/// `calldata` carries the 4-byte selector (opaque here), the state record,
/// and the proof stream. When the state has already exited the step is a
/// no-op and the current state hash is returned.
///
/// # Errors
///
/// Any fault terminates the step with an [`ExecutionError`]; no state hash
/// is produced.
pub fn step(calldata: &[u8], oracle: &dyn PreimageOracle) -> Result<[u8; 32], ExecutionError> {
    Interpreter::new(calldata, oracle)?.step()
}

/// A single-step interpreter over a state record and its witness stream.
///
/// The same type backs both sides of the dispute game: the verifier calls
/// [`step`] and keeps only the hash, while the native emulator constructs an
/// [`Interpreter`] per step and inspects [`Interpreter::state`] to build the
/// next calldata.
pub struct Interpreter<'a> {
    pub(crate) state: State,
    pub(crate) proofs: &'a [u8],
    pub(crate) oracle: &'a dyn PreimageOracle,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter over `calldata`.
    ///
    /// # Errors
    ///
    /// Fails if `calldata` cannot hold the selector and the state record.
    pub fn new(calldata: &'a [u8], oracle: &'a dyn PreimageOracle) -> Result<Self, ExecutionError> {
        if calldata.len() < SELECTOR_SIZE + STATE_SIZE {
            return Err(ExecutionError::MalformedCalldata(
                "calldata shorter than state record".into(),
            ));
        }
        let state = State::from_bytes(&calldata[SELECTOR_SIZE..SELECTOR_SIZE + STATE_SIZE])?;
        Ok(Self { state, proofs: &calldata[SELECTOR_SIZE + STATE_SIZE..], oracle })
    }

    /// The machine state, reflecting the step once [`Interpreter::step`]
    /// has run.
    #[must_use]
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Execute one instruction and return the hash of the new state.
    ///
    /// # Errors
    ///
    /// Any fault surfaces as an [`ExecutionError`] and leaves no usable
    /// state hash.
    pub fn step(&mut self) -> Result<[u8; 32], ExecutionError> {
        if self.state.exited() {
            return Ok(self.state.hash());
        }
        self.execute_instruction()?;
        Ok(self.state.hash())
    }

    /// Fetch, decode and execute the instruction at pc.
    fn execute_instruction(&mut self) -> Result<(), ExecutionError> {
        let pc = self.state.pc();
        let instr = self.load_mem(pc, 4, false, PROOF_INSTRUCTION, NO_PROOF)? as u32;
        let dec = decode(instr);
        tracing::trace!("pc = {pc:#x} instr = {instr:#010x}");

        let mut next_pc = pc.wrapping_add(4);
        match dec.opcode {
            OPCODE_LOAD => self.execute_load(instr, &dec)?,
            OPCODE_STORE => self.execute_store(instr, &dec)?,
            OPCODE_BRANCH => next_pc = self.execute_branch(instr, &dec, pc)?,
            OPCODE_OP_IMM => {
                let b = self.state.register(dec.rs1)?;
                self.state.set_register(dec.rd, alu_op_imm(dec.funct3, imm_i(instr), b))?;
            }
            OPCODE_OP_IMM_32 => {
                let b = self.state.register(dec.rs1)?;
                self.state.set_register(dec.rd, alu_op_imm_32(dec.funct3, imm_i(instr), b))?;
            }
            OPCODE_OP => {
                let b = self.state.register(dec.rs1)?;
                let c = self.state.register(dec.rs2)?;
                self.state.set_register(dec.rd, alu_op(dec.funct3, dec.funct7, b, c))?;
            }
            OPCODE_OP_32 => {
                let b = self.state.register(dec.rs1)?;
                let c = self.state.register(dec.rs2)?;
                self.state.set_register(dec.rd, alu_op_32(dec.funct3, dec.funct7, b, c))?;
            }
            OPCODE_LUI => self.state.set_register(dec.rd, imm_u(instr))?,
            OPCODE_AUIPC => self.state.set_register(dec.rd, pc.wrapping_add(imm_u(instr)))?,
            OPCODE_JAL => {
                self.state.set_register(dec.rd, pc.wrapping_add(4))?;
                next_pc = pc.wrapping_add(imm_j(instr));
            }
            OPCODE_JALR => {
                // Read rs1 before the link write: rd may alias rs1.
                let target = self.state.register(dec.rs1)?.wrapping_add(imm_i(instr)) & !1;
                self.state.set_register(dec.rd, pc.wrapping_add(4))?;
                next_pc = target;
            }
            OPCODE_SYSTEM => self.execute_system(instr, &dec)?,
            OPCODE_AMO => self.execute_atomic(&dec)?,
            // Fence: no pipeline and no other harts, nothing to order.
            OPCODE_MISC_MEM => {}
            // Floating point: advancing pc is enough to satisfy the guest
            // language runtime's feature probing.
            OPCODE_LOAD_FP | OPCODE_STORE_FP | OPCODE_OP_FP => {}
            _ => return Err(ExecutionError::UnknownOpcode(dec.opcode)),
        }

        // An exit syscall freezes the state: no pc advance.
        if self.state.exited() {
            return Ok(());
        }
        self.state.set_pc(next_pc);
        Ok(())
    }

    /// Execute a memory load instruction.
    fn execute_load(&mut self, instr: u32, dec: &Decoded) -> Result<(), ExecutionError> {
        let signed = dec.funct3 & 4 == 0;
        let size = 1u64 << (dec.funct3 & 3);
        let addr = self.state.register(dec.rs1)?.wrapping_add(imm_i(instr));
        let value = self.load_mem(addr, size, signed, PROOF_MEM_LEFT, PROOF_MEM_RIGHT)?;
        self.state.set_register(dec.rd, value)
    }

    /// Execute a memory store instruction.
    fn execute_store(&mut self, instr: u32, dec: &Decoded) -> Result<(), ExecutionError> {
        let size = 1u64 << dec.funct3;
        let value = self.state.register(dec.rs2)?;
        let addr = self.state.register(dec.rs1)?.wrapping_add(imm_s(instr));
        self.store_mem(addr, size, value, PROOF_MEM_LEFT, PROOF_MEM_RIGHT)
    }

    /// Execute a branch instruction, returning the next pc.
    fn execute_branch(&mut self, instr: u32, dec: &Decoded, pc: u64) -> Result<u64, ExecutionError> {
        let b = self.state.register(dec.rs1)?;
        let c = self.state.register(dec.rs2)?;
        let taken = match dec.funct3 {
            0 => b == c,
            1 => b != c,
            4 => (b as i64) < (c as i64),
            5 => (b as i64) >= (c as i64),
            6 => b < c,
            7 => b >= c,
            _ => false,
        };
        Ok(if taken { pc.wrapping_add(imm_b(instr)) } else { pc.wrapping_add(4) })
    }

    /// Execute ECALL/EBREAK and the CSR instructions.
    fn execute_system(&mut self, instr: u32, dec: &Decoded) -> Result<(), ExecutionError> {
        if dec.funct3 == 0 {
            if instr >> 20 == 0 {
                self.execute_ecall()?;
            }
            // EBREAK: ignore the breakpoint.
            return Ok(());
        }
        let csr = csr_field(instr);
        // The immediate forms use the zero-extended rs1 field as the operand.
        let value = if dec.funct3 & 4 == 0 { self.state.register(dec.rs1)? } else { dec.rs1 };
        let old = self.update_csr(csr, value, dec.funct3 & 3)?;
        self.state.set_register(dec.rd, old)
    }

    /// Dispatch an ECALL on the syscall number in a7.
    fn execute_ecall(&mut self) -> Result<(), ExecutionError> {
        let number = self.state.register(Register::X17.into())?;
        let code = SyscallCode::from_u64(number)?;
        tracing::debug!(syscall = ?code, "ecall");

        let syscall = get_syscall(code);
        let mut ctx = SyscallContext::new(self);
        let ret = (syscall.handler)(&mut ctx, code)?;
        if let Some((a0, a1)) = ret {
            self.state.set_register(Register::X10.into(), a0)?;
            self.state.set_register(Register::X11.into(), a1)?;
        }
        Ok(())
    }

    /// Read-modify-write a CSR, returning the old value.
    ///
    /// The CSR file is a stub: reads see zero and writes are swallowed. The
    /// mode arithmetic still runs so unknown modes fault.
    fn update_csr(&mut self, csr: u64, value: u64, mode: u64) -> Result<u64, ExecutionError> {
        let old = self.read_csr(csr);
        let value = match mode {
            1 => value,        // CSRRW(I)
            2 => old | value,  // CSRRS(I)
            3 => old & !value, // CSRRC(I)
            _ => return Err(ExecutionError::InvalidCsrMode(mode)),
        };
        self.write_csr(csr, value);
        Ok(old)
    }

    const fn read_csr(&self, _csr: u64) -> u64 {
        0
    }

    fn write_csr(&mut self, _csr: u64, _value: u64) {}

    /// Execute an A-extension instruction.
    fn execute_atomic(&mut self, dec: &Decoded) -> Result<(), ExecutionError> {
        // funct3 0b010 selects the W variants, 0b011 the D variants. The
        // acquire/release bits in funct7 are meaningless with a single hart.
        let size = 1u64 << dec.funct3;
        if size < 4 {
            return Err(ExecutionError::InvalidAmoSize(size));
        }
        let addr = self.state.register(dec.rs1)?;
        let op = dec.funct7 >> 2;
        match op {
            // LR: load and reserve the address.
            0x02 => {
                let value = self.load_mem(addr, size, true, PROOF_MEM_LEFT, PROOF_MEM_RIGHT)?;
                self.state.set_register(dec.rd, value)?;
                self.state.set_load_reservation(addr);
            }
            // SC: store only if the reservation still covers the address.
            0x03 => {
                let mut rd_value = 1;
                if addr == self.state.load_reservation() {
                    let rs2_value = self.state.register(dec.rs2)?;
                    self.store_mem(addr, size, rs2_value, PROOF_MEM_LEFT, PROOF_MEM_RIGHT)?;
                    rd_value = 0;
                }
                self.state.set_register(dec.rd, rd_value)?;
                self.state.set_load_reservation(0);
            }
            _ => {
                let mut rs2_value = self.state.register(dec.rs2)?;
                if size == 4 {
                    rs2_value = mask32_signed(rs2_value);
                }
                let loaded = self.load_mem(addr, size, true, PROOF_MEM_LEFT, PROOF_MEM_RIGHT)?;
                let stored = match op {
                    0x00 => (Wrapping(loaded) + Wrapping(rs2_value)).0, // AMOADD
                    0x01 => rs2_value,                                  // AMOSWAP
                    0x04 => loaded ^ rs2_value,                         // AMOXOR
                    0x08 => loaded | rs2_value,                         // AMOOR
                    0x0C => loaded & rs2_value,                         // AMOAND
                    0x10 => (loaded as i64).min(rs2_value as i64) as u64, // AMOMIN
                    0x14 => (loaded as i64).max(rs2_value as i64) as u64, // AMOMAX
                    0x18 => loaded.min(rs2_value),                      // AMOMINU
                    0x1C => loaded.max(rs2_value),                      // AMOMAXU
                    _ => return Err(ExecutionError::UnknownAtomicOp(op)),
                };
                // The store rewrites the left leaf, which invalidates the
                // witness in the regular right slot; the post-write slot
                // carries one authored against the intermediate root.
                self.store_mem(addr, size, stored, PROOF_MEM_LEFT, PROOF_MEM_RIGHT_POST)?;
                self.state.set_register(dec.rd, loaded)?;
            }
        }
        Ok(())
    }
}

/// Register-register ALU semantics (opcode 0x33). `funct7 == 1` selects the
/// M extension. Undefined funct7 patterns write zero, they do not fault.
pub(crate) fn alu_op(funct3: u64, funct7: u64, b: u64, c: u64) -> u64 {
    if funct7 == 1 {
        match funct3 {
            0 => (Wrapping(b) * Wrapping(c)).0,
            1 => word::mulh(b, c),
            2 => word::mulhsu(b, c),
            3 => word::mulhu(b, c),
            4 => word::div(b, c),
            5 => word::divu(b, c),
            6 => word::rem(b, c),
            7 => word::remu(b, c),
            _ => unreachable!(),
        }
    } else {
        match funct3 {
            0 => match funct7 {
                0x00 => (Wrapping(b) + Wrapping(c)).0,
                0x20 => (Wrapping(b) - Wrapping(c)).0,
                _ => 0,
            },
            1 => b << (c & 0x3F),
            2 => u64::from((b as i64) < (c as i64)),
            3 => u64::from(b < c),
            4 => b ^ c,
            5 => match funct7 {
                0x00 => b >> (c & 0x3F),
                0x20 => ((b as i64) >> (c & 0x3F)) as u64,
                _ => 0,
            },
            6 => b | c,
            7 => b & c,
            _ => unreachable!(),
        }
    }
}

/// Immediate ALU semantics (opcode 0x13). The shift-right variant is picked
/// by the top six bits of the immediate.
pub(crate) fn alu_op_imm(funct3: u64, imm: u64, b: u64) -> u64 {
    match funct3 {
        0 => (Wrapping(b) + Wrapping(imm)).0,
        1 => b << (imm & 0x3F),
        2 => u64::from((b as i64) < (imm as i64)),
        3 => u64::from(b < imm),
        4 => b ^ imm,
        5 => match imm >> 6 {
            0x00 => b >> (imm & 0x3F),
            0x10 => ((b as i64) >> (imm & 0x3F)) as u64,
            _ => 0,
        },
        6 => b | imm,
        7 => b & imm,
        _ => unreachable!(),
    }
}

/// 32-bit immediate ALU semantics (opcode 0x1B); results sign-extended from
/// bit 31. Undefined funct3 patterns write zero.
pub(crate) fn alu_op_imm_32(funct3: u64, imm: u64, b: u64) -> u64 {
    match funct3 {
        0 => mask32_signed(b.wrapping_add(imm)),
        1 => mask32_signed(b << (imm & 0x1F)),
        5 => {
            let shamt = (imm & 0x1F) as u32;
            match imm >> 6 {
                0x00 => (((b as u32) >> shamt) as i32) as i64 as u64,
                0x10 => ((b as i32) >> shamt) as i64 as u64,
                _ => 0,
            }
        }
        _ => 0,
    }
}

/// 32-bit register ALU semantics (opcode 0x3B); results sign-extended from
/// bit 31. `funct7 == 1` selects the M extension.
pub(crate) fn alu_op_32(funct3: u64, funct7: u64, b: u64, c: u64) -> u64 {
    if funct7 == 1 {
        match funct3 {
            0 => (Wrapping(b as i32) * Wrapping(c as i32)).0 as i64 as u64,
            4 => word::divw(b, c),
            5 => word::divuw(b, c),
            6 => word::remw(b, c),
            7 => word::remuw(b, c),
            _ => 0,
        }
    } else {
        match funct3 {
            0 => match funct7 {
                0x00 => (Wrapping(b as i32) + Wrapping(c as i32)).0 as i64 as u64,
                0x20 => (Wrapping(b as i32) - Wrapping(c as i32)).0 as i64 as u64,
                _ => 0,
            },
            1 => mask32_signed(b << (c & 0x1F)),
            5 => {
                let shamt = (c & 0x1F) as u32;
                match funct7 {
                    0x00 => (((b as u32) >> shamt) as i32) as i64 as u64,
                    0x20 => ((b as i32) >> shamt) as i64 as u64,
                    _ => 0,
                }
            }
            _ => 0,
        }
    }
}
