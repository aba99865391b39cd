//! The embedding API: register host functions, then load and run scripts.

use std::path::Path;

use crate::bytecode::{compile, CompiledCode};
use crate::diagnostics::{DiagnosticKind, Log};
use crate::frontend::lexer::LexerReader;
use crate::frontend::parser::parse;
use crate::lang::location::Location;
use crate::runtime::vm::{HostFunctions, State, Vm, VmConfig};

/// A script engine. Engines share nothing; each owns its host functions.
#[derive(Default)]
pub struct Fel {
    functions: HostFunctions,
    config: VmConfig,
}

impl Fel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            functions: HostFunctions::new(),
            config,
        }
    }

    /// Registers `callback` under `name`, replacing any earlier one.
    ///
    /// The callback returns how many values it pushed onto the state.
    pub fn set_function<F>(&mut self, name: &str, callback: F)
    where
        F: FnMut(&mut State<'_>) -> usize + 'static,
    {
        if self
            .functions
            .insert(name.to_string(), Box::new(callback))
            .is_some()
        {
            tracing::debug!(name, "replaced host function");
        }
    }

    /// Lexes, parses and compiles `source`. Returns `None` if anything was
    /// logged along the way.
    pub fn compile_string(
        &self,
        source: &str,
        filename: &str,
        log: &mut Log,
    ) -> Option<CompiledCode> {
        let before = log.len();
        let mut reader = LexerReader::new(source, filename);
        let program = parse(&mut reader, log)?;
        if log.len() != before {
            return None;
        }

        let code = compile(&program, log);
        if log.len() != before {
            return None;
        }
        Some(code)
    }

    pub fn run_compiled(&mut self, code: &CompiledCode, log: &mut Log) {
        Vm::new(code, &mut self.functions, self.config.clone(), log).run();
    }

    pub fn load_and_run_string(&mut self, source: &str, filename: &str, log: &mut Log) {
        if let Some(code) = self.compile_string(source, filename, log) {
            self.run_compiled(&code, log);
        }
    }

    pub fn load_and_run_file(&mut self, path: impl AsRef<Path>, log: &mut Log) {
        let path = path.as_ref();
        let filename = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(source) => self.load_and_run_string(&source, &filename, log),
            Err(e) => {
                tracing::debug!(%filename, error = %e, "failed to open script");
                log.add_error(
                    Location::unknown(&filename),
                    DiagnosticKind::FailedToOpenFile,
                    vec![filename.clone(), e.to_string()],
                );
            }
        }
    }
}
