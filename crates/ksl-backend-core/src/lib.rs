#![warn(missing_docs)]
//! Backend trait and plugin architecture for KSL code generators.
//!
//! Defines the [`Backend`] trait that all source emitters implement,
//! along with supporting types ([`BackendOptions`], [`BackendOutput`],
//! [`BackendError`]), a [`BackendRegistry`] for CLI dispatch and the shared
//! statement emitter in [`emit`].

use std::fmt::{self, Debug};

use ksl_ir::{IrError, StageKind, ValidatedProgram};

pub mod emit;

pub use emit::{EmitContext, SourceWriter, StatementSyntax, emit_scope};

/// GLSL language version to target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlslVersion {
    /// `#version 330 core`.
    Core330,
    /// `#version 450 core`.
    #[default]
    Core450,
    /// `#version 300 es`.
    Es300,
    /// `#version 310 es`.
    Es310,
}

impl GlslVersion {
    /// Returns `true` for the OpenGL ES versions.
    pub fn is_es(self) -> bool {
        matches!(self, Self::Es300 | Self::Es310)
    }

    /// Whether compute shaders are available.
    pub fn supports_compute(self) -> bool {
        matches!(self, Self::Core450 | Self::Es310)
    }

    /// Whether vertex outputs and fragment inputs may carry `layout(location)`.
    pub fn supports_varying_locations(self) -> bool {
        !matches!(self, Self::Es300)
    }

    /// The text following `#version`.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Core330 => "330 core",
            Self::Core450 => "450 core",
            Self::Es300 => "300 es",
            Self::Es310 => "310 es",
        }
    }
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directive())
    }
}

impl std::str::FromStr for GlslVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "330" | "330 core" => Ok(Self::Core330),
            "450" | "450 core" => Ok(Self::Core450),
            "300es" | "300 es" => Ok(Self::Es300),
            "310es" | "310 es" => Ok(Self::Es310),
            other => Err(format!(
                "unknown GLSL version '{other}' (expected 330, 450, 300es or 310es)"
            )),
        }
    }
}

/// Default float precision declared by GLSL ES shaders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FloatPrecision {
    /// `lowp`.
    Low,
    /// `mediump`.
    Medium,
    /// `highp`.
    #[default]
    High,
}

impl fmt::Display for FloatPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "lowp",
            Self::Medium => "mediump",
            Self::High => "highp",
        })
    }
}

/// A backend that generates target source from a validated KSL program.
pub trait Backend: Debug + Send + Sync {
    /// Human-readable name (e.g. "GLSL").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for `--target` dispatch).
    fn targets(&self) -> &[&str];

    /// Generate source for every stage of `program`.
    ///
    /// Generation never modifies the program and produces the same output
    /// for the same program and options.
    fn compile(
        &self,
        program: &ValidatedProgram,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError>;
}

/// Options passed to a backend during generation.
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    /// GLSL version for the GLSL backends.
    pub glsl_version: GlslVersion,
    /// Default float precision for GLSL ES output.
    pub precision: FloatPrecision,
    /// Emit comments naming blocks and listing statement dependencies.
    pub annotate: bool,
}

impl fmt::Display for BackendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackendOptions {{ glsl_version: {}, precision: {}, annotate: {} }}",
            self.glsl_version, self.precision, self.annotate
        )
    }
}

/// Generated source files plus non-fatal diagnostics.
#[derive(Clone, Debug, Default)]
pub struct BackendOutput {
    /// Files in stage order.
    pub files: Vec<OutputFile>,
    /// Warnings raised while generating.
    pub diagnostics: Vec<Diagnostic>,
}

impl BackendOutput {
    /// Looks up an output file by name.
    pub fn file(&self, name: &str) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// The file holding `stage`, for targets that emit one file per stage.
    pub fn stage_file(&self, stage: StageKind) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.stage == Some(stage))
    }
}

/// One generated source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    /// Suggested filename (e.g. `lit.vert`, `lit.wgsl`).
    pub name: String,
    /// The stage this file contains, `None` when it holds the whole program.
    pub stage: Option<StageKind>,
    /// Generated source text.
    pub source: String,
}

impl OutputFile {
    /// A file containing a single stage.
    pub fn for_stage(name: impl Into<String>, stage: StageKind, source: String) -> Self {
        Self {
            name: name.into(),
            stage: Some(stage),
            source,
        }
    }

    /// A file containing every stage of the program.
    pub fn whole_program(name: impl Into<String>, source: String) -> Self {
        Self {
            name: name.into(),
            stage: None,
            source,
        }
    }
}

/// A non-fatal message from a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub level: DiagnosticLevel,
    /// The stage the message is about, if any.
    pub stage: Option<StageKind>,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// A warning about the whole program.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            stage: None,
            message: message.into(),
        }
    }

    /// A warning about one stage.
    pub fn stage_warning(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage: Some(stage),
            ..Self::warning(message)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{}: {stage} stage: {}", self.level, self.message),
            None => write!(f, "{}: {}", self.level, self.message),
        }
    }
}

/// Severity level for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Output was produced but may not behave as the program intends.
    Warning,
    /// Informational.
    Note,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Note => "note",
        })
    }
}

/// Errors that stop generation. No partial output is produced.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The program uses a feature this target cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Rendering an expression failed.
    #[error(transparent)]
    Ir(#[from] IrError),
    /// The program cannot be generated for another reason.
    #[error("{0}")]
    Other(String),
}

/// Backends by target identifier, used for `kslc --target`.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the pseudocode backend.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PseudoCodeBackend));
        registry
    }

    /// Adds a backend. Earlier registrations win on target conflicts.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        log::debug!("registered backend {} ({:?})", backend.name(), backend.targets());
        self.backends.push(backend);
    }

    /// The backend handling `target`.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Every registered target identifier, in registration order.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Dumps the program with [`ksl_ir::dump_program`]; targets `ksl` and `ir`.
#[derive(Debug)]
pub struct PseudoCodeBackend;

impl Backend for PseudoCodeBackend {
    fn name(&self) -> &str {
        "KSL pseudocode"
    }

    fn targets(&self) -> &[&str] {
        &["ksl", "ir"]
    }

    fn compile(
        &self,
        program: &ValidatedProgram,
        _opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        Ok(BackendOutput {
            files: vec![OutputFile::whole_program(
                format!("{}.ksl", program.name()),
                ksl_ir::dump_program(program),
            )],
            diagnostics: Vec::new(),
        })
    }
}
