//! Construction and execution of the assembler and linker commands. Both go
//! through the `gcc` driver, which picks the platform's assembler and linker.

use std::{path::Path, process::Command};

use crate::{
    ext::{DiscardOk, TryDecode, VerifySuccess},
    prelude::*,
};

const DRIVER: &str = "gcc";

/// Build the command that assembles `input` into the object file `output`.
pub fn assemble_command<I: AsRef<Path>, O: AsRef<Path>>(input: I, output: O) -> Result<Command> {
    let mut command = Command::new(DRIVER);
    command.args(["-c", input.try_decode()?, "-o", output.try_decode()?]);
    Ok(command)
}

/// Build the command that links `objects` into the executable `output`,
/// linking against each of `libraries`.
pub fn link_command<P: AsRef<Path>, O: AsRef<Path>>(
    objects: &[P],
    output: O,
    libraries: &[&str],
) -> Result<Command> {
    let mut command = Command::new(DRIVER);
    for object in objects {
        command.arg(object.try_decode()?);
    }
    command.args(["-o", output.try_decode()?]);
    command.args(libraries.iter().map(|lib| format!("-l{lib}")));
    Ok(command)
}

/// Run a toolchain command to completion.
pub fn run(mut command: Command) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("running {:?}", command);
    command
        .output()
        .map_err(Into::into)
        .and_then(VerifySuccess::verify_success)
        .discard_ok()
        .with_context(|| format!("Running {} failed", program))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn assemble_produces_an_object() {
        let command = assemble_command("out/main.s", "out/main.o").unwrap();

        assert_eq!("gcc", command.get_program());
        assert_eq!(vec!["-c", "out/main.s", "-o", "out/main.o"], args(&command));
    }

    #[test]
    fn link_passes_objects_then_libraries() {
        let command = link_command(&["a.o", "b.o"], "prog", &["m"]).unwrap();

        assert_eq!(vec!["a.o", "b.o", "-o", "prog", "-lm"], args(&command));
    }

    #[test]
    fn failing_commands_are_reported() {
        let command = Command::new("a-program-that-does-not-exist");
        let err = run(command).unwrap_err();

        assert!(err.to_string().contains("a-program-that-does-not-exist"));
    }
}
