//! Small extension traits for running external programs.
use std::{path::Path, process::Output};

use crate::prelude::*;

pub trait TryDecode {
    fn try_decode(&self) -> Result<&str>;
}
impl<T: AsRef<Path>> TryDecode for T {
    fn try_decode(&self) -> Result<&str> {
        self.as_ref()
            .to_str()
            .ok_or_else(|| anyhow!("Path contains invalid unicode"))
    }
}

pub trait DiscardOk {
    type Res;
    fn discard_ok(self) -> Self::Res;
}
impl<T, E> DiscardOk for std::result::Result<T, E> {
    type Res = std::result::Result<(), E>;

    fn discard_ok(self) -> Self::Res {
        self.map(|_| ())
    }
}

pub trait VerifySuccess {
    /// Decode the captured output streams, failing if the process did not
    /// exit successfully.
    fn verify_success(self) -> Result<(String, String)>;
}
impl VerifySuccess for Output {
    fn verify_success(self) -> Result<(String, String)> {
        let stdout = String::from_utf8(self.stdout)?;
        let stderr = String::from_utf8(self.stderr)?;

        if self.status.success() {
            Ok((stdout, stderr))
        } else {
            error!("STDOUT:\n======\n{}", stdout);
            error!("STDERR:\n======\n{}", stderr);
            Err(anyhow!(
                "Command exited with {}: {}",
                self.status,
                stderr.trim()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn paths_decode_to_str() {
        let path = PathBuf::from("out/main.s");
        assert_eq!("out/main.s", path.try_decode().unwrap());
    }

    #[test]
    fn discard_ok_keeps_errors() {
        let ok: std::result::Result<u8, &str> = Ok(3);
        let err: std::result::Result<u8, &str> = Err("failed");

        assert_eq!(Ok(()), ok.discard_ok());
        assert_eq!(Err("failed"), err.discard_ok());
    }
}
