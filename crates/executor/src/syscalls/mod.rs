//! The thin Linux riscv64 syscall ABI exposed to the guest.

mod code;
mod context;
mod halt;
mod io;
mod mem;
mod stubs;
mod time;

use halt::halt_syscall;
use io::{fcntl_syscall, openat_syscall, read_syscall, write_syscall};
use mem::{brk_syscall, mmap_syscall};
use stubs::zero_syscall;
use time::{clock_gettime_syscall, getrlimit_syscall};

use crate::ExecutionError;

pub use code::SyscallCode;
pub use context::SyscallContext;
pub use io::{
    FD_HINT_READ, FD_HINT_WRITE, FD_PREIMAGE_READ, FD_PREIMAGE_WRITE, FD_STDERR, FD_STDIN,
    FD_STDOUT,
};

/// What a handler leaves in the return registers: `Some((a0, a1))` is
/// written back, `None` leaves the register file untouched (exit and
/// getrlimit).
pub(crate) type SyscallReturn = Option<(u64, u64)>;

/// A type alias for a syscall handler.
pub(crate) type SyscallHandler<'a, 'b> =
    fn(&mut SyscallContext<'a, 'b>, SyscallCode) -> Result<SyscallReturn, ExecutionError>;

/// A system call implementation.
pub(crate) struct Syscall<'a, 'b> {
    /// The handler for the syscall.
    pub handler: SyscallHandler<'a, 'b>,
}

impl<'a, 'b> Syscall<'a, 'b> {
    /// Create a new syscall.
    #[inline]
    pub(crate) const fn new(handler: SyscallHandler<'a, 'b>) -> Self {
        Self { handler }
    }
}

/// Maps syscall codes to their implementations.
pub(crate) fn get_syscall<'a, 'b>(code: SyscallCode) -> Syscall<'a, 'b> {
    match code {
        SyscallCode::EXIT | SyscallCode::EXIT_GROUP => Syscall::new(halt_syscall),
        SyscallCode::BRK => Syscall::new(brk_syscall),
        SyscallCode::MMAP => Syscall::new(mmap_syscall),
        SyscallCode::READ => Syscall::new(read_syscall),
        SyscallCode::WRITE => Syscall::new(write_syscall),
        SyscallCode::FCNTL => Syscall::new(fcntl_syscall),
        SyscallCode::OPENAT => Syscall::new(openat_syscall),
        SyscallCode::CLOCK_GETTIME => Syscall::new(clock_gettime_syscall),
        SyscallCode::GETRLIMIT => Syscall::new(getrlimit_syscall),
        SyscallCode::SCHED_GETAFFINITY
        | SyscallCode::RT_SIGACTION
        | SyscallCode::RT_SIGPROCMASK
        | SyscallCode::SIGALTSTACK
        | SyscallCode::GETTID => Syscall::new(zero_syscall),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixtures::{step_with, MapOracle, SparseMemory},
        state::State,
        Register,
    };

    /// The `ecall` instruction word.
    const ECALL: u32 = 0x0000_0073;

    fn ecall_setup(number: u64, args: &[u64]) -> (SparseMemory, State) {
        let mut mem = SparseMemory::new();
        mem.set_u32(0, ECALL);
        let mut state = State::default();
        state.set_register(Register::X17.into(), number).unwrap();
        for (i, &arg) in args.iter().enumerate() {
            state.set_register(Register::X10 as u64 + i as u64, arg).unwrap();
        }
        state.set_mem_root(mem.root());
        (mem, state)
    }

    fn a0_a1(state: &State) -> (u64, u64) {
        (
            state.register(Register::X10.into()).unwrap(),
            state.register(Register::X11.into()).unwrap(),
        )
    }

    #[test]
    fn test_exit_sets_status_and_freezes_pc() {
        for number in [SyscallCode::EXIT as u64, SyscallCode::EXIT_GROUP as u64] {
            let (mem, mut state) = ecall_setup(number, &[300]);
            step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();

            assert!(state.exited());
            assert_eq!(state.exit_code(), 44, "exit code is truncated to a byte");
            assert_eq!(state.pc(), 0);
            // Registers are untouched by exit.
            assert_eq!(a0_a1(&state), (300, 0));
        }
    }

    #[test]
    fn test_brk_reports_fixed_break() {
        let (mem, mut state) = ecall_setup(SyscallCode::BRK as u64, &[0]);
        step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();
        assert_eq!(a0_a1(&state), (1 << 30, 0));
        assert_eq!(state.pc(), 4);
    }

    #[test]
    fn test_mmap_rounds_length_up() {
        let (mem, mut state) = ecall_setup(SyscallCode::MMAP as u64, &[0, 0x1001]);
        state.set_heap(0x8000);
        step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();

        assert_eq!(a0_a1(&state), (0x8000, 0));
        assert_eq!(state.heap(), 0x8000 + 0x2000);
    }

    #[test]
    fn test_mmap_aligned_length() {
        let (mem, mut state) = ecall_setup(SyscallCode::MMAP as u64, &[0, 0x3000]);
        state.set_heap(0x10000);
        step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();

        assert_eq!(a0_a1(&state), (0x10000, 0));
        assert_eq!(state.heap(), 0x13000);
    }

    #[test]
    fn test_mmap_honors_hint() {
        let (mem, mut state) = ecall_setup(SyscallCode::MMAP as u64, &[0x7000_0000, 0x1000]);
        state.set_heap(0x8000);
        step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();

        assert_eq!(a0_a1(&state), (0x7000_0000, 0));
        assert_eq!(state.heap(), 0x8000);
    }

    #[test]
    fn test_read_fd_table() {
        for (fd, expected) in [
            (FD_STDIN, (0, 0)),
            (FD_HINT_READ, (55, 0)),
            (9, (u64::MAX, 0x4D)),
            (FD_PREIMAGE_WRITE, (u64::MAX, 0x4D)),
        ] {
            let (mem, mut state) = ecall_setup(SyscallCode::READ as u64, &[fd, 0x1000, 55]);
            step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();
            assert_eq!(a0_a1(&state), expected, "fd {fd}");
            assert_eq!(state.pc(), 4);
        }
    }

    #[test]
    fn test_write_fd_table() {
        for (fd, expected) in [
            (FD_STDOUT, (7, 0)),
            (FD_STDERR, (7, 0)),
            (FD_HINT_WRITE, (7, 0)),
            (FD_PREIMAGE_READ, (u64::MAX, 0x4D)),
            (11, (u64::MAX, 0x4D)),
        ] {
            let (mem, mut state) = ecall_setup(SyscallCode::WRITE as u64, &[fd, 0x1000, 7]);
            step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();
            assert_eq!(a0_a1(&state), expected, "fd {fd}");
        }
    }

    #[test]
    fn test_write_preimage_fd() {
        let (mut mem, mut state) = ecall_setup(
            SyscallCode::WRITE as u64,
            &[FD_PREIMAGE_WRITE, 0x2000, 8],
        );
        mem.set_u64(0x2000, u64::from_le_bytes(*b"abcdefgh"));
        state.set_mem_root(mem.root());
        step_with(&mem, &mut state, &[0x2000], &MapOracle::default()).unwrap();

        assert_eq!(a0_a1(&state), (8, 0));
        assert_eq!(&state.preimage_key()[24..], b"abcdefgh");
        assert_eq!(state.preimage_offset(), 0);
    }

    #[test]
    fn test_read_preimage_fd() {
        let (mem, mut state) =
            ecall_setup(SyscallCode::READ as u64, &[FD_PREIMAGE_READ, 0x3000, 32]);
        let key = [0x5A; 32];
        state.set_preimage_key(key);
        let mut oracle = MapOracle::default();
        oracle.insert(key, b"twelve bytes".to_vec());
        step_with(&mem, &mut state, &[0x3000], &oracle).unwrap();

        assert_eq!(a0_a1(&state), (12, 0));
        assert_eq!(state.preimage_offset(), 12);
    }

    #[test]
    fn test_fcntl_getfl() {
        for (fd, expected) in [
            (FD_STDIN, (0, 0)),
            (FD_STDOUT, (1, 0)),
            (FD_STDERR, (1, 0)),
            (FD_HINT_READ, (0, 0)),
            (FD_HINT_WRITE, (1, 0)),
            (FD_PREIMAGE_READ, (0, 0)),
            (FD_PREIMAGE_WRITE, (1, 0)),
            (7, (u64::MAX, 0x4D)),
        ] {
            let (mem, mut state) = ecall_setup(SyscallCode::FCNTL as u64, &[fd, 3]);
            step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();
            assert_eq!(a0_a1(&state), expected, "fd {fd}");
        }
    }

    #[test]
    fn test_fcntl_unknown_cmd() {
        // F_DUPFD and friends are not allowed.
        let (mem, mut state) = ecall_setup(SyscallCode::FCNTL as u64, &[FD_STDOUT, 0]);
        step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();
        assert_eq!(a0_a1(&state), (u64::MAX, 0x16));
    }

    #[test]
    fn test_openat_denied() {
        let (mem, mut state) = ecall_setup(SyscallCode::OPENAT as u64, &[0, 0x1000, 0]);
        step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();
        assert_eq!(a0_a1(&state), (u64::MAX, 0xD));
    }

    #[test]
    fn test_zero_stubs() {
        for number in [123u64, 134, 135, 132, 178] {
            let (mem, mut state) = ecall_setup(number, &[0xABCD, 0x1234]);
            step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap();
            assert_eq!(a0_a1(&state), (0, 0), "syscall {number}");
            assert_eq!(state.pc(), 4);
        }
    }

    #[test]
    fn test_clock_gettime_writes_fixed_timespec() {
        let (mem, mut state) = ecall_setup(SyscallCode::CLOCK_GETTIME as u64, &[0, 0x4000]);
        step_with(&mem, &mut state, &[0x4000], &MapOracle::default()).unwrap();

        assert_eq!(a0_a1(&state), (0, 0));
        let mut expected = mem.clone();
        expected.set_u64(0x4000, 1337);
        expected.set_u64(0x4008, 1_337_000_000_000);
        assert_eq!(state.mem_root(), expected.root());
    }

    #[test]
    fn test_getrlimit_nofile() {
        let (mem, mut state) = ecall_setup(SyscallCode::GETRLIMIT as u64, &[0x7, 0x5000]);
        step_with(&mem, &mut state, &[0x5000], &MapOracle::default()).unwrap();

        // a0/a1 keep their input values; only memory is written.
        assert_eq!(a0_a1(&state), (0x7, 0x5000));
        let mut expected = mem.clone();
        expected.set_u64(0x5000, 1024);
        expected.set_u64(0x5008, 1024);
        assert_eq!(state.mem_root(), expected.root());
    }

    #[test]
    fn test_getrlimit_unknown_resource_reverts() {
        let (mem, mut state) = ecall_setup(SyscallCode::GETRLIMIT as u64, &[0x3, 0x5000]);
        let err = step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap_err();
        assert_eq!(err.revert_code(), 0xf_0012);
    }

    #[test]
    fn test_unknown_syscall_reverts() {
        let (mem, mut state) = ecall_setup(220, &[0]);
        let err = step_with(&mem, &mut state, &[], &MapOracle::default()).unwrap_err();
        assert_eq!(err, crate::ExecutionError::UnknownSyscall(220));
        assert_eq!(err.revert_code(), 0xf001_ca11);
    }
}
