use super::{SyscallCode, SyscallContext, SyscallReturn};
use crate::ExecutionError;

/// Syscalls answered with plain success and no other effect:
/// sched_getaffinity, rt_sigaction, rt_sigprocmask, sigaltstack, gettid.
///
/// There are no signals, no scheduler and only one thread, so the guest
/// only needs to see `0/0` to keep going.
pub(crate) fn zero_syscall(
    _: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    Ok(Some((0, 0)))
}
