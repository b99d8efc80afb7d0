#![allow(dead_code)]

use assert_cmd::Command;

pub const GETPID_FILE: &str = r"/*[clinic input]
os.getpid

Return the current process id.
[clinic start generated code]*/

{
    return PyLong_FromPid(getpid());
}
";

pub const BROKEN_FILE: &str = r"/*[clinic input]
os.broken
    path: nope
[clinic start generated code]*/
";

pub fn clinic_cmd() -> Command {
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_clinic"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}
