use crate::ClinicResult;
use crate::ConverterRegistry;
use crate::DslParser;
use crate::Function;

pub const GETPID_INPUT: &str = "os.getpid\n\nReturn the current process id.\n";

pub const GETPID_FILE: &str = r"#include <Python.h>

/*[clinic input]
os.getpid

Return the current process id.
[clinic start generated code]*/

{
    return PyLong_FromPid(getpid());
}
";

pub const ADDCH_INPUT: &str = r"curses.window.addch
    [
    y: int
        Y-coordinate.
    x: int
        X-coordinate.
    ]
    ch: object
        Character to add.
    [
    attr: long
        Attributes for the character.
    ]
    /

Paint the character.
";

pub const OPEN_INPUT: &str = r#"os.open -> int
    path: str
    flags: int = 0
    *
    mode: int = 438

Open a file for low level IO.
"#;

pub const ADD_INPUT: &str = r"mod.add
    a: int
    b: int = 0
    /

Add two numbers.
";

pub fn registry() -> ConverterRegistry {
	ConverterRegistry::builtin()
}

/// Parse a single block of input with the builtin converters.
pub fn parse_function(input: &str) -> ClinicResult<Function> {
	let registry = registry();
	DslParser::new(&registry).parse(input, 1)
}

/// Wrap `input` in C markers with no generated output.
pub fn c_block(input: &str) -> String {
	format!("/*[clinic input]\n{input}[clinic start generated code]*/\n")
}
