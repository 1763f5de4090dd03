use super::{SyscallCode, SyscallContext, SyscallReturn};
use crate::{
    memory::{PROOF_MEM_LEFT, PROOF_MEM_RIGHT},
    ExecutionError,
};

/// Fixed tv_sec reported by every clock.
const CLOCK_SECS: u64 = 1337;
/// Fixed tv_nsec; must be nonzero to pass the guest runtime's init-time
/// monotonic clock check.
const CLOCK_NANOS: u64 = 1_337_000_000_000;

const RLIMIT_NOFILE: u64 = 0x7;
/// Soft and hard open-file limit reported to the guest.
const NOFILE_LIMIT: u64 = 1024;

/// clock_gettime: write a fixed 16-byte timespec to the pointer in a1.
pub(crate) fn clock_gettime_syscall(
    ctx: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    let addr = ctx.arg(1)?;
    let mut timespec = [0u8; 16];
    timespec[..8].copy_from_slice(&CLOCK_SECS.to_le_bytes());
    timespec[8..].copy_from_slice(&CLOCK_NANOS.to_le_bytes());
    ctx.rt.store_mem_unaligned(addr, &timespec, PROOF_MEM_LEFT, PROOF_MEM_RIGHT)?;
    Ok(Some((0, 0)))
}

/// getrlimit: only RLIMIT_NOFILE is answered; the 16-byte soft/hard pair is
/// written to the pointer in a1 and the return registers are left alone.
pub(crate) fn getrlimit_syscall(
    ctx: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    let resource = ctx.arg(0)?;
    let addr = ctx.arg(1)?;
    if resource != RLIMIT_NOFILE {
        return Err(ExecutionError::UnknownRlimit(resource));
    }
    let mut rlimit = [0u8; 16];
    rlimit[..8].copy_from_slice(&NOFILE_LIMIT.to_le_bytes());
    rlimit[8..].copy_from_slice(&NOFILE_LIMIT.to_le_bytes());
    ctx.rt.store_mem_unaligned(addr, &rlimit, PROOF_MEM_LEFT, PROOF_MEM_RIGHT)?;
    Ok(None)
}
