// Process exit codes, following the BSD sysexits convention shared by all
// binaries in this workspace.

pub const OK: u8 = 0;
pub const USAGE: u8 = 64;
pub const DATAERR: u8 = 65;
pub const NOINPUT: u8 = 66;
pub const UNAVAILABLE: u8 = 69;
pub const OSERR: u8 = 71;
pub const IOERR: u8 = 74;
