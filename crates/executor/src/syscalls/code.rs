//! Linux riscv64 syscall numbers understood by the interpreter.

use serde::{Deserialize, Serialize};

use crate::ExecutionError;

/// A system call, invoked by the `ecall` instruction with its number in a7.
///
/// The set mirrors what a guest compiled for `linux/riscv64` touches during
/// startup and steady-state I/O; everything else is a fatal revert.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u64)]
pub enum SyscallCode {
    /// Exit the calling thread.
    EXIT = 93,

    /// Exit all threads in the process.
    EXIT_GROUP = 94,

    /// Query or move the program break.
    BRK = 214,

    /// Map anonymous memory.
    MMAP = 222,

    /// Read from a file descriptor.
    READ = 63,

    /// Write to a file descriptor.
    WRITE = 64,

    /// File descriptor flag lookup.
    FCNTL = 25,

    /// Open a file relative to a directory fd.
    OPENAT = 56,

    /// Read a clock.
    CLOCK_GETTIME = 113,

    /// Resource limit lookup.
    GETRLIMIT = 163,

    /// CPU affinity lookup.
    SCHED_GETAFFINITY = 123,

    /// Signal handler installation.
    RT_SIGACTION = 134,

    /// Signal mask manipulation.
    RT_SIGPROCMASK = 135,

    /// Alternative signal stack registration.
    SIGALTSTACK = 132,

    /// Thread id lookup.
    GETTID = 178,
}

impl SyscallCode {
    /// Resolve a syscall number from a7.
    ///
    /// # Errors
    ///
    /// Reverts with [`ExecutionError::UnknownSyscall`] for any number
    /// outside the supported set.
    pub fn from_u64(value: u64) -> Result<Self, ExecutionError> {
        Ok(match value {
            93 => SyscallCode::EXIT,
            94 => SyscallCode::EXIT_GROUP,
            214 => SyscallCode::BRK,
            222 => SyscallCode::MMAP,
            63 => SyscallCode::READ,
            64 => SyscallCode::WRITE,
            25 => SyscallCode::FCNTL,
            56 => SyscallCode::OPENAT,
            113 => SyscallCode::CLOCK_GETTIME,
            163 => SyscallCode::GETRLIMIT,
            123 => SyscallCode::SCHED_GETAFFINITY,
            134 => SyscallCode::RT_SIGACTION,
            135 => SyscallCode::RT_SIGPROCMASK,
            132 => SyscallCode::SIGALTSTACK,
            178 => SyscallCode::GETTID,
            _ => return Err(ExecutionError::UnknownSyscall(value)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u64_roundtrip() {
        for code in [
            SyscallCode::EXIT,
            SyscallCode::EXIT_GROUP,
            SyscallCode::BRK,
            SyscallCode::MMAP,
            SyscallCode::READ,
            SyscallCode::WRITE,
            SyscallCode::FCNTL,
            SyscallCode::OPENAT,
            SyscallCode::CLOCK_GETTIME,
            SyscallCode::GETRLIMIT,
            SyscallCode::SCHED_GETAFFINITY,
            SyscallCode::RT_SIGACTION,
            SyscallCode::RT_SIGPROCMASK,
            SyscallCode::SIGALTSTACK,
            SyscallCode::GETTID,
        ] {
            assert_eq!(SyscallCode::from_u64(code as u64), Ok(code));
        }
    }

    #[test]
    fn test_unknown_number() {
        // clone is deliberately unsupported.
        let err = SyscallCode::from_u64(220).unwrap_err();
        assert_eq!(err, ExecutionError::UnknownSyscall(220));
        assert_eq!(err.revert_code(), 0xf001_ca11);
    }
}
