//! Configuration for a single compilation run. A [`Config`] is built once by the
//! caller and passed by reference to every stage; nothing in the crate reads
//! process-wide settings.

use std::env;

use crate::prelude::*;

/// The default cap on optimisation iterations per function.
pub const DEFAULT_MAX_OPTIMISATION_PASSES: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    pub platform: Platform,
    pub features: Features,
    pub optimisations: Optimisations,
    /// Upper bound on the number of times the full pass sequence is repeated
    /// for a single function. Zero leaves every function as it is.
    pub max_optimisation_passes: usize,
    pub debug: DebugOptions,
}
impl Config {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            features: Features::default(),
            optimisations: Optimisations::all(),
            max_optimisation_passes: DEFAULT_MAX_OPTIMISATION_PASSES,
            debug: DebugOptions::default(),
        }
    }

    pub fn with_optimisations(mut self, optimisations: Optimisations) -> Self {
        self.optimisations = optimisations;
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_debug(mut self, debug: DebugOptions) -> Self {
        self.debug = debug;
        self
    }
}
impl Default for Config {
    fn default() -> Self {
        Self::new(Platform::Linux)
    }
}

/// The supported target platforms. Both use the System V AMD64 calling
/// convention and differ in symbol decoration and assembler directives.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Platform {
    Linux,
    MacOs,
}
impl Platform {
    /// Determine the platform of the machine running the compiler.
    pub fn host() -> Result<Self> {
        Ok(match env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            other => bail!("Target operating system '{}' not supported", other),
        })
    }

    /// Decorate a global symbol name as the platform's object format expects.
    pub fn symbol(&self, name: &str) -> String {
        match self {
            Platform::Linux => name.to_string(),
            Platform::MacOs => format!("_{name}"),
        }
    }

    /// Prefix for assembler-local labels, which never reach the symbol table.
    pub fn local_label_prefix(&self) -> &'static str {
        match self {
            Platform::Linux => ".L",
            Platform::MacOs => "L",
        }
    }
}

/// Language features that may be switched off. A construct that relies on a
/// disabled feature is reported as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub floating_point: bool,
}
impl Default for Features {
    fn default() -> Self {
        Self {
            floating_point: true,
        }
    }
}

/// Toggles for the individual optimisation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Optimisations {
    pub fold_constants: bool,
    pub eliminate_unreachable_code: bool,
    pub propagate_copies: bool,
    pub eliminate_dead_stores: bool,
}
impl Optimisations {
    pub fn all() -> Self {
        Self {
            fold_constants: true,
            eliminate_unreachable_code: true,
            propagate_copies: true,
            eliminate_dead_stores: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn any_enabled(&self) -> bool {
        self.fold_constants
            || self.eliminate_unreachable_code
            || self.propagate_copies
            || self.eliminate_dead_stores
    }
}

#[derive(Debug, Clone, Default)]
pub struct DebugOptions {
    /// Record the TAC listing after every optimisation pass.
    pub dump_tac: bool,
    /// Record the assembly of every function before and after register allocation.
    pub dump_assembly: bool,
    /// Record the interference graphs of every function in DOT format.
    pub dump_interference: bool,
    /// Only record dumps for the function with this name.
    pub function_filter: Option<String>,
}
impl DebugOptions {
    /// Returns `true` if dumps should be recorded for the given function.
    pub fn wants(&self, function: &str) -> bool {
        match &self.function_filter {
            Some(filter) => filter == function,
            None => true,
        }
    }
}

/// A debug dump produced during compilation. The caller decides where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump {
    pub function: String,
    pub stage: String,
    pub contents: String,
}
impl Dump {
    pub fn new<F: Into<String>, S: Into<String>>(function: F, stage: S, contents: String) -> Self {
        Self {
            function: function.into(),
            stage: stage.into(),
            contents,
        }
    }
}
