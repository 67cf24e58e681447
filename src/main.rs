use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stackjit::jit::dump;
use stackjit::samples::{self, Sample};
use stackjit::{CompiledOrFallback, JitCompiler, JitConfig, JitMode, ProgramFile};

// Wrapper types for clap ValueEnum support
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum JitModeArg {
    Off,
    On,
    Auto,
}

impl From<JitModeArg> for JitMode {
    fn from(arg: JitModeArg) -> Self {
        match arg {
            JitModeArg::Off => JitMode::Off,
            JitModeArg::On => JitMode::On,
            JitModeArg::Auto => JitMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ReportFormatArg {
    #[default]
    Human,
    Json,
}

#[derive(Parser)]
#[command(name = "stackjit")]
#[command(about = "JIT-compile stack bytecode to x86-64 machine code", long_about = None)]
struct Cli {
    /// Log every pipeline stage (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that compiles.
#[derive(clap::Args, Debug, Clone)]
struct CompileArgs {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JIT compilation mode (off, on, auto); overrides the config file
    #[arg(long, value_enum)]
    jit: Option<JitModeArg>,

    /// Skip the peephole optimizer
    #[arg(long)]
    no_optimize: bool,

    /// Code buffer size in bytes (rounded up to whole pages)
    #[arg(long, value_name = "BYTES")]
    code_size: Option<usize>,

    /// Print the annotated machine code
    #[arg(long)]
    dump_code: bool,
}

impl CompileArgs {
    fn to_config(&self) -> Result<JitConfig, String> {
        let mut config = match &self.config {
            Some(path) => JitConfig::load(path).map_err(|e| e.to_string())?,
            None => JitConfig::default(),
        };
        if let Some(jit) = self.jit {
            config.jit_mode = jit.into();
        }
        if self.no_optimize {
            config.optimize = false;
        }
        if let Some(code_size) = self.code_size {
            config.code_size = code_size;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a program file
    Run {
        /// The program file (TOML)
        file: PathBuf,

        /// Integer arguments passed to the program
        #[arg(allow_negative_numbers = true)]
        args: Vec<i64>,

        #[command(flatten)]
        compile: CompileArgs,

        /// Dump decoded bytecode to stderr
        #[arg(long)]
        dump_bytecode: bool,

        /// Dump IR before and after optimization to stderr
        #[arg(long)]
        dump_ir: bool,

        /// Print the compile report (human or json format)
        #[arg(long, value_enum, require_equals = true, num_args = 0..=1, default_missing_value = "human")]
        report: Option<ReportFormatArg>,
    },
    /// Run the built-in sample programs natively and check them against the
    /// interpreter
    Demo {
        /// Only run the sample with this name
        name: Option<String>,

        /// Number of argument vectors per sample
        #[arg(long, default_value = "10")]
        tests: usize,

        #[command(flatten)]
        compile: CompileArgs,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,stackjit=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            args,
            compile,
            dump_bytecode,
            dump_ir,
            report,
        } => run_file(&file, &args, &compile, dump_bytecode, dump_ir, report),
        Commands::Demo {
            name,
            tests,
            compile,
        } => run_demo(name.as_deref(), tests, &compile),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_file(
    path: &Path,
    args: &[i64],
    options: &CompileArgs,
    dump_bytecode: bool,
    dump_ir: bool,
    report: Option<ReportFormatArg>,
) -> Result<bool, String> {
    let config = options.to_config()?;
    let program = ProgramFile::load(path).map_err(|e| e.to_string())?;

    if dump_bytecode {
        eprint!("{}", dump::format_bytecode(&program).map_err(|e| e.to_string())?);
    }

    let compiler = JitCompiler::new(config).map_err(|e| e.to_string())?;
    let prepared = compiler.prepare(&program).map_err(|e| e.to_string())?;

    match &prepared {
        CompiledOrFallback::Native(function) => {
            let compile_report = function.report();
            if dump_ir {
                eprintln!("== IR ==");
                eprint!("{}", dump::format_ir(&compile_report.ir));
                eprintln!("== Optimized IR ==");
                eprint!("{}", dump::format_ir(&compile_report.optimized));
            }
            if options.dump_code {
                eprintln!("== Native code ==");
                eprint!("{}", dump::listing(function));
            }
            match report {
                Some(ReportFormatArg::Human) => eprint!("{}", dump::format_report(compile_report)),
                Some(ReportFormatArg::Json) => {
                    let json = serde_json::to_string_pretty(compile_report).map_err(|e| e.to_string())?;
                    eprintln!("{}", json);
                }
                None => {}
            }
        }
        CompiledOrFallback::Interpreted { reason, .. } => {
            if dump_ir || options.dump_code || report.is_some() {
                match reason {
                    Some(reason) => eprintln!("note: running interpreted: {}", reason),
                    None => eprintln!("note: running interpreted: JIT is off"),
                }
            }
        }
    }

    let value = prepared.call(args).map_err(|e| e.to_string())?;
    println!("{}", value);
    Ok(true)
}

fn run_demo(name: Option<&str>, tests: usize, options: &CompileArgs) -> Result<bool, String> {
    let selected: Vec<Sample> = match name {
        Some(name) => vec![samples::find(name).ok_or_else(|| format!("no sample named '{}'", name))?],
        None => samples::all(),
    };

    let config = options.to_config()?;
    let compiler = JitCompiler::new(config).map_err(|e| e.to_string())?;

    let mut good = true;
    for sample in &selected {
        println!();
        println!("=== Function {} ===", sample.program.name);
        println!("{}", sample.source);
        println!();

        let prepared = compiler.prepare(&sample.program).map_err(|e| e.to_string())?;
        if let (true, Some(function)) = (options.dump_code, prepared.native()) {
            println!("Native code:");
            print!("{}", dump::listing(function));
            println!();
        }

        good &= check_sample(&compiler, sample, &prepared, tests)?;
    }

    if !good {
        println!();
        println!("One or more errors occurred.");
    }
    Ok(good)
}

fn check_sample(
    compiler: &JitCompiler,
    sample: &Sample,
    prepared: &CompiledOrFallback,
    tests: usize,
) -> Result<bool, String> {
    let interpreter = compiler.interpreter();
    let mut good = true;

    for args in samples::sweep(sample.program.arity, tests) {
        let expected = interpreter.run(&sample.program, &args).map_err(|e| e.to_string())?;
        let actual = prepared.call(&args).map_err(|e| e.to_string())?;
        let ok = expected == actual;
        good &= ok;

        let shown = args.iter().map(|d| format!("{:4}", d)).collect::<Vec<_>>().join(", ");
        println!(
            "  {:<4} {:<24} => {:>12}, expected {:>12}",
            if ok { "OK" } else { "FAIL" },
            format!("({})", shown),
            actual,
            expected
        );
    }
    Ok(good)
}
