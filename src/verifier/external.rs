//! Verifier backed by an external model checker process

use super::cex::{classify_output, CexError, CexReconstructor, ReplyKind};
use super::runner::{Invocation, ProcessRunner, RunOutcome, ToolRunner};
use super::settings::VerifierSettings;
use super::writer::{CfaWriter, NameMapping};
use super::{VerificationResult, Verifier, GENERAL_FAILURE_CODE};
use crate::automaton::{inline_calls, AutomataSystem};
use crate::error::{Error, Result};
use crate::types::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs the configured checker on the flattened main automaton
pub struct ExternalVerifier<R: ToolRunner = ProcessRunner> {
    settings: VerifierSettings,
    runner: R,
}

impl ExternalVerifier<ProcessRunner> {
    /// Verifier spawning real processes
    pub fn new(settings: VerifierSettings) -> Self {
        Self {
            settings,
            runner: ProcessRunner,
        }
    }
}

impl<R: ToolRunner> ExternalVerifier<R> {
    /// Verifier using a custom runner
    pub fn with_runner(settings: VerifierSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    /// Active settings
    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// The runner
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Consume the verifier, returning its runner
    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Resolve the command line checking `model`.
    ///
    /// With a launcher the tool is started as
    /// `<launcher> -Djava.library.path=<lib> -jar <tool> <options>`,
    /// otherwise the tool itself is executed.
    pub fn invocation(&self, model: &Path) -> Result<Invocation> {
        let settings = &self.settings;

        if !settings.tool_path.exists() {
            return Err(Error::ToolNotFound(format!(
                "checker was not found at '{}'",
                settings.tool_path.display()
            )));
        }
        if let Some(lib) = &settings.library_path {
            if !lib.exists() {
                return Err(Error::ToolNotFound(format!(
                    "native libraries were not found at '{}'",
                    lib.display()
                )));
            }
        }

        let model = model.to_string_lossy();
        let mut invocation = match &settings.launcher {
            Some(launcher) => {
                let program = which::which(launcher).map_err(|e| {
                    Error::ToolNotFound(format!("could not find {}: {}", launcher, e))
                })?;
                let mut invocation = Invocation::new(program);
                if let Some(lib) = &settings.library_path {
                    invocation = invocation.arg(format!("-Djava.library.path={}", lib.display()));
                }
                invocation.arg("-jar").arg(settings.tool_path.as_os_str())
            }
            None => Invocation::new(&settings.tool_path),
        };

        invocation = invocation
            .args(settings.tool_args(&model))
            .timeout(settings.timeout());
        if let Some(lib) = &settings.library_path {
            invocation = invocation.env(settings.library_path_env.as_str(), lib.as_os_str());
        }

        Ok(invocation)
    }

    fn interpret(
        &self,
        outcome: RunOutcome,
        ctx: &Arc<Context>,
        mapping: &NameMapping,
    ) -> VerificationResult {
        let stdout = match outcome {
            RunOutcome::TimedOut => return VerificationResult::Timeout,
            RunOutcome::Failed(msg) => {
                return VerificationResult::internal_error(format!("Tool execution failed. {}", msg))
            }
            RunOutcome::Completed {
                status: Some(0),
                stdout,
                ..
            } => stdout,
            RunOutcome::Completed { stderr, .. } => {
                return VerificationResult::internal_error(format!(
                    "Tool returned a non-zero exit code. {}",
                    stderr.trim()
                ))
            }
        };

        match classify_output(&stdout) {
            ReplyKind::Safe => VerificationResult::Success,
            ReplyKind::Unsafe(None) => {
                error!("checker returned no parseable counterexample");
                VerificationResult::fail(GENERAL_FAILURE_CODE)
            }
            ReplyKind::Unsafe(Some(cex)) => {
                if self.settings.print_raw_cex {
                    info!("{}", cex);
                }
                self.reconstruct(cex, ctx, mapping)
            }
            ReplyKind::Unrecognized => VerificationResult::Unknown,
        }
    }

    fn reconstruct(
        &self,
        cex: &str,
        ctx: &Arc<Context>,
        mapping: &NameMapping,
    ) -> VerificationResult {
        match CexReconstructor::new(ctx.clone(), mapping).reconstruct(cex) {
            Ok(rec) => VerificationResult::fail_with_trace(rec.error_code, rec.trace),
            Err(e @ CexError::MissingErrorField { .. }) => {
                error!(raw = %e.raw(), "{}", e);
                VerificationResult::internal_error(e.to_string())
            }
            Err(e @ CexError::NoActions { .. }) => {
                warn!(raw = %e.raw(), "{}", e);
                VerificationResult::fail(GENERAL_FAILURE_CODE)
            }
            Err(e) => {
                error!(raw = %e.raw(), "could not parse counterexample: {}", e);
                VerificationResult::fail(GENERAL_FAILURE_CODE)
            }
        }
    }

    fn run(&self, system: &AutomataSystem) -> Result<VerificationResult> {
        let mut flat = system.clone();
        let inline = inline_calls(&mut flat)?;

        let mut model = String::new();
        let mapping = CfaWriter::new(&flat, inline).write(&mut model)?;

        let mut model_file = tempfile::Builder::new()
            .prefix("cfa_model")
            .suffix(".theta")
            .tempfile()?;
        info!(path = %model_file.path().display(), "writing model");
        model_file.write_all(model.as_bytes())?;
        model_file.flush()?;

        let invocation = self.invocation(model_file.path())?;
        info!("running checker");
        let outcome = self.runner.run(&invocation);
        debug!(?outcome, "checker finished");

        let result = self.interpret(outcome, flat.context(), &mapping);

        if self.settings.keep_model {
            let (_, path) = model_file.keep().map_err(|e| Error::Io(e.to_string()))?;
            info!(path = %path.display(), "model kept");
        }

        Ok(result)
    }
}

impl<R: ToolRunner> Verifier for ExternalVerifier<R> {
    fn check(&self, system: &AutomataSystem) -> VerificationResult {
        info!("running verification backend");
        match self.run(system) {
            Ok(result) => result,
            Err(e) => {
                error!("{}", e);
                VerificationResult::internal_error(format!(
                    "Could not execute the checker. {}",
                    e
                ))
            }
        }
    }
}
