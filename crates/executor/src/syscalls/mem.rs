use super::{SyscallCode, SyscallContext, SyscallReturn};
use crate::ExecutionError;

/// Granularity of anonymous mappings.
pub(crate) const PAGE_SIZE: u64 = 4096;

/// The fixed program break reported to the guest. The guest runtime only
/// ever calls `brk(0)` to probe the break, so nothing tracks it.
pub(crate) const PROGRAM_BREAK: u64 = 1 << 30;

/// brk: report the fixed program break.
pub(crate) fn brk_syscall(
    _: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    Ok(Some((PROGRAM_BREAK, 0)))
}

/// mmap: hand out anonymous memory from the heap pointer.
///
/// prot, flags, fd and offset are ignored; only anonymous memory is
/// supported. A nonzero address hint is honored verbatim.
pub(crate) fn mmap_syscall(
    ctx: &mut SyscallContext<'_, '_>,
    _: SyscallCode,
) -> Result<SyscallReturn, ExecutionError> {
    let addr = ctx.arg(0)?;
    let mut length = ctx.arg(1)?;
    if addr != 0 {
        return Ok(Some((addr, 0)));
    }

    // Round the requested length up to the page size.
    let misalign = length & (PAGE_SIZE - 1);
    if misalign != 0 {
        length = length.wrapping_add(PAGE_SIZE - misalign);
    }
    let prev_heap = ctx.rt.state.heap();
    ctx.rt.state.set_heap(prev_heap.wrapping_add(length));
    Ok(Some((prev_heap, 0)))
}
