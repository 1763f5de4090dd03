//! Argument and return plumbing between the executor and syscall handlers.

use crate::{ExecutionError, Interpreter, Register};

/// Argument registers of the Linux riscv64 syscall ABI, `a0..=a6`.
const ARG_REGISTERS: [Register; 7] = [
    Register::X10,
    Register::X11,
    Register::X12,
    Register::X13,
    Register::X14,
    Register::X15,
    Register::X16,
];

/// A runtime view handed to syscall handlers.
///
/// Handlers read their arguments through [`SyscallContext::arg`] and reach
/// memory and the oracle through `rt`; the executor writes the `a0`/`a1`
/// return pair afterwards.
pub struct SyscallContext<'a, 'b> {
    /// The interpreter executing the current step.
    pub rt: &'a mut Interpreter<'b>,
}

impl<'a, 'b> SyscallContext<'a, 'b> {
    /// Create a new [`SyscallContext`].
    pub fn new(rt: &'a mut Interpreter<'b>) -> Self {
        Self { rt }
    }

    /// Read syscall argument `index` (`a0` is index 0).
    ///
    /// # Errors
    ///
    /// Propagates register-file faults.
    pub fn arg(&self, index: usize) -> Result<u64, ExecutionError> {
        self.rt.state.register(ARG_REGISTERS[index].into())
    }
}
