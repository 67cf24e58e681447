use serde::Serialize;
use stackjit::samples::{self, Sample};
use stackjit::{Interpreter, JitCompiler, JitConfig, JitMode};
use std::hint::black_box;
use std::time::Instant;

const ITERATIONS: usize = 200_000;

#[derive(Serialize)]
struct BenchmarkResult {
    name: String,
    code_len: usize,
    compile_secs: f64,
    native_secs: f64,
    interpreted_secs: f64,
}

#[derive(Serialize)]
struct BenchmarkOutput {
    iterations: usize,
    results: Vec<BenchmarkResult>,
}

fn time<F>(f: F) -> f64
where
    F: FnOnce(),
{
    let start = Instant::now();
    f();
    start.elapsed().as_secs_f64()
}

fn run_benchmark(compiler: &JitCompiler, interpreter: &Interpreter, sample: &Sample) -> Option<BenchmarkResult> {
    let args = samples::sweep(sample.program.arity, 16);

    let start = Instant::now();
    let function = match compiler.compile(&sample.program) {
        Ok(function) => function,
        Err(e) => {
            eprintln!("Benchmark {} failed to compile: {}", sample.program.name, e);
            return None;
        }
    };
    let compile_secs = start.elapsed().as_secs_f64();

    let native = match function.native() {
        Ok(native) => native,
        Err(e) => {
            eprintln!("Benchmark {} failed to bind: {}", sample.program.name, e);
            return None;
        }
    };

    let native_secs = time(|| {
        for i in 0..ITERATIONS {
            let _ = black_box(native.call(black_box(&args[i % args.len()])));
        }
    });
    let interpreted_secs = time(|| {
        for i in 0..ITERATIONS {
            let _ = black_box(interpreter.run(&sample.program, black_box(&args[i % args.len()])));
        }
    });

    Some(BenchmarkResult {
        name: sample.program.name.clone(),
        code_len: function.code().len(),
        compile_secs,
        native_secs,
        interpreted_secs,
    })
}

fn main() {
    let config = JitConfig {
        jit_mode: JitMode::On,
        ..Default::default()
    };
    let compiler = match JitCompiler::new(config) {
        Ok(compiler) => compiler,
        Err(e) => {
            eprintln!("JIT unavailable: {}", e);
            std::process::exit(1);
        }
    };
    let interpreter = compiler.interpreter();

    let results = samples::all()
        .iter()
        .filter_map(|sample| run_benchmark(&compiler, &interpreter, sample))
        .collect();

    let output = BenchmarkOutput {
        iterations: ITERATIONS,
        results,
    };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to serialize results: {}", e),
    }
}
