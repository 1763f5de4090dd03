use super::{SyscallCode, SyscallContext, SyscallReturn};
use crate::ExecutionError;

/// Standard input; reads always return empty.
pub const FD_STDIN: u64 = 0;
/// Standard output; writes complete fully in a single step.
pub const FD_STDOUT: u64 = 1;
/// Standard error; writes complete fully in a single step.
pub const FD_STDERR: u64 = 2;
/// Hint acknowledgement reads; the host resolves hints ahead of time.
pub const FD_HINT_READ: u64 = 3;
/// Hint writes.
pub const FD_HINT_WRITE: u64 = 4;
/// Pre-image value reads.
pub const FD_PREIMAGE_READ: u64 = 5;
/// Pre-image key writes.
pub const FD_PREIMAGE_WRITE: u64 = 6;

/// EBADF, as the guest's errno table expects it.
pub(crate) const EBADF: u64 = 0x4D;
/// EINVAL.
pub(crate) const EINVAL: u64 = 0x16;
/// EACCES.
pub(crate) const EACCES: u64 = 0xD;

const F_GETFL: u64 = 3;
const O_RDONLY: u64 = 0;
const O_WRONLY: u64 = 1;

/// read: stdin is empty, hint reads are acknowledged in full, fd 5 streams
/// the pre-image value.
pub(crate) fn read_syscall(
    ctx: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    let fd = ctx.arg(0)?;
    let addr = ctx.arg(1)?;
    let count = ctx.arg(2)?;
    let ret = match fd {
        FD_STDIN => (0, 0),
        FD_HINT_READ => (count, 0),
        FD_PREIMAGE_READ => (ctx.rt.read_preimage_value(addr, count)?, 0),
        _ => (u64::MAX, EBADF),
    };
    Ok(Some(ret))
}

/// write: stdout/stderr and hint writes complete immediately, fd 6 feeds
/// the pre-image key.
pub(crate) fn write_syscall(
    ctx: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    let fd = ctx.arg(0)?;
    let addr = ctx.arg(1)?;
    let count = ctx.arg(2)?;
    let ret = match fd {
        FD_STDOUT | FD_STDERR | FD_HINT_WRITE => (count, 0),
        FD_PREIMAGE_WRITE => (ctx.rt.write_preimage_key(addr, count)?, 0),
        _ => (u64::MAX, EBADF),
    };
    Ok(Some(ret))
}

/// fcntl: F_GETFL reports the access mode of the well-known fds; no other
/// command is allowed, so descriptors cannot be duplicated or reconfigured.
pub(crate) fn fcntl_syscall(
    ctx: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    let fd = ctx.arg(0)?;
    let cmd = ctx.arg(1)?;
    if cmd != F_GETFL {
        return Ok(Some((u64::MAX, EINVAL)));
    }
    let ret = match fd {
        FD_STDIN | FD_HINT_READ | FD_PREIMAGE_READ => (O_RDONLY, 0),
        FD_STDOUT | FD_STDERR | FD_HINT_WRITE | FD_PREIMAGE_WRITE => (O_WRONLY, 0),
        _ => (u64::MAX, EBADF),
    };
    Ok(Some(ret))
}

/// openat: the guest runtime probes optional /sys/kernel files; deny all of
/// them.
pub(crate) fn openat_syscall(
    _: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    Ok(Some((u64::MAX, EACCES)))
}
