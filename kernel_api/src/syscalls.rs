//! Syscall numbers for the file-descriptor calls

pub const SYS_OPEN: usize = 45;
pub const SYS_DUP2: usize = 48;
pub const SYS_CLOSE: usize = 49;
pub const SYS_READ: usize = 50;
pub const SYS_WRITE: usize = 55;
pub const SYS_LSEEK: usize = 59;
pub const SYS_MELD: usize = 120;

/// Returns the name of a syscall number, for diagnostics
pub fn syscall_name(number: usize) -> Option<&'static str> {
    let name = match number {
        SYS_OPEN => "open",
        SYS_DUP2 => "dup2",
        SYS_CLOSE => "close",
        SYS_READ => "read",
        SYS_WRITE => "write",
        SYS_LSEEK => "lseek",
        SYS_MELD => "meld",
        _ => return None,
    };
    Some(name)
}
