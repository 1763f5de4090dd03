use super::{SyscallCode, SyscallContext, SyscallReturn};
use crate::ExecutionError;

/// exit / exit_group: record the exit status and freeze the machine.
///
/// There is no multi-thread support, so both numbers behave identically.
/// Registers and pc are left exactly as they were.
pub(crate) fn halt_syscall(
    ctx: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    let exit_code = ctx.arg(0)?;
    ctx.rt.state.set_exit_code(exit_code as u8);
    ctx.rt.state.set_exited();
    Ok(None)
}
