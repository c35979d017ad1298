use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use ksl_backend_core::{BackendOptions, BackendRegistry, FloatPrecision, GlslVersion};
use ksl_backend_glsl::GlslBackend;
use ksl_backend_wgsl::WgslBackend;

mod samples;

/// kslc: build a bundled KSL program and print its shader source
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Sample program to build (see --list)
    #[arg(required_unless_present = "list")]
    sample: Option<String>,

    /// Target backend (default: ksl)
    #[arg(short, long, default_value = "ksl")]
    target: String,

    /// Output directory (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// GLSL version: 330, 450, 300es or 310es
    #[arg(long, default_value = "450")]
    glsl_version: GlslVersion,

    /// Default float precision for GLSL ES: low, medium or high
    #[arg(long, default_value = "high", value_parser = parse_precision)]
    precision: FloatPrecision,

    /// Emit comments naming blocks and listing statement dependencies
    #[arg(long)]
    annotate: bool,

    /// Dump the program to stderr before generation
    #[arg(long)]
    emit_ir: bool,

    /// Build and validate without producing output
    #[arg(long)]
    dry_run: bool,

    /// List the bundled samples and targets
    #[arg(long)]
    list: bool,
}

fn parse_precision(s: &str) -> Result<FloatPrecision, String> {
    match s {
        "low" | "lowp" => Ok(FloatPrecision::Low),
        "medium" | "mediump" => Ok(FloatPrecision::Medium),
        "high" | "highp" => Ok(FloatPrecision::High),
        _ => Err(format!(
            "invalid precision '{s}', expected low, medium, or high"
        )),
    }
}

fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(GlslBackend::desktop()));
    registry.register(Box::new(GlslBackend::es()));
    registry.register(Box::new(WgslBackend));
    registry
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let registry = registry();

    if cli.list {
        println!("samples:");
        for sample in samples::SAMPLES {
            println!("  {:<10} {}", sample.name, sample.summary);
        }
        println!("targets: {}", registry.list_targets().join(", "));
        return Ok(());
    }

    // 1. Build and validate the sample.
    let name = cli.sample.as_deref().unwrap_or_default();
    let sample = samples::find(name).ok_or_else(|| {
        let available: Vec<_> = samples::SAMPLES.iter().map(|s| s.name).collect();
        miette::miette!("unknown sample '{name}' (available: {})", available.join(", "))
    })?;
    let program = (sample.build)()
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to build sample '{name}'"))?
        .freeze()
        .into_diagnostic()
        .wrap_err("validation failed")?;

    // 2. Optionally dump the program to stderr.
    if cli.emit_ir {
        eprintln!("{}", ksl_ir::dump_program(&program));
    }

    // 3. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 4. Backend dispatch.
    let backend = registry.find(&cli.target).ok_or_else(|| {
        let available = registry.list_targets().join(", ");
        miette::miette!("unknown target '{}' (available: {})", cli.target, available)
    })?;

    let opts = BackendOptions {
        glsl_version: cli.glsl_version,
        precision: cli.precision,
        annotate: cli.annotate,
    };
    log::debug!("compiling '{name}' with {} ({opts})", backend.name());

    let output = backend
        .compile(&program, &opts)
        .into_diagnostic()
        .wrap_err("code generation failed")?;

    // 5. Print diagnostics.
    for diag in &output.diagnostics {
        eprintln!("{diag}");
    }

    // 6. Write output.
    match &cli.output {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
            for file in &output.files {
                let path = dir.join(&file.name);
                std::fs::write(&path, &file.source)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            }
        }
        None => {
            let several = output.files.len() > 1;
            for file in &output.files {
                if several {
                    println!("// {}", file.name);
                }
                print!("{}", file.source);
            }
        }
    }

    Ok(())
}
