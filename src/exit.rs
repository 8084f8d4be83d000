use std::fmt;

/// Non-zero process status of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Bad flags, config or input files.
    InvalidArgs = 2,
    /// Reconciliation or scoring could not produce a result.
    AuditFailed = 10,
    /// An installer (winget/choco) failed or timed out.
    ExternalCommandFailed = 20,
}

/// An error tagged with the status `main` should exit with. The tag survives
/// `.context()` wrapping since anyhow downcasts through context layers.
#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

fn tagged(code: ExitCode, err: anyhow::Error) -> anyhow::Error {
    ExitError { code, err }.into()
}

/// Untagged errors count as a failed audit.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ExitError>()
        .map_or(ExitCode::AuditFailed, |e| e.code) as i32
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    tagged(ExitCode::InvalidArgs, anyhow::anyhow!(message.into()))
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    tagged(ExitCode::InvalidArgs, err)
}

pub fn external_cmd(message: impl Into<String>) -> anyhow::Error {
    tagged(ExitCode::ExternalCommandFailed, anyhow::anyhow!(message.into()))
}

pub fn audit_failed_err(err: anyhow::Error) -> anyhow::Error {
    tagged(ExitCode::AuditFailed, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_downcast() {
        assert_eq!(exit_code(&invalid_args("bad flag")), 2);
        assert_eq!(exit_code(&external_cmd("winget failed")), 20);
        assert_eq!(exit_code(&audit_failed_err(anyhow::anyhow!("x"))), 10);
        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 10);
    }

    #[test]
    fn context_keeps_exit_code() {
        use anyhow::Context;

        let err: anyhow::Result<()> = Err(invalid_args("bad value"));
        let err = err.context("while loading config").expect_err("err");
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn message_is_the_inner_error() {
        let err = invalid_args_err(anyhow::anyhow!("unknown field `verbose`"));
        assert_eq!(err.to_string(), "unknown field `verbose`");
    }
}
