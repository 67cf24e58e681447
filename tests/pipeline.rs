//! In-process tests of the whole compile pipeline.
//!
//! Native execution needs an x86-64 unix host; everything else runs
//! anywhere.

use stackjit::bytecode::{Encoding, Interpreter, Program, ProgramBuilder};
use stackjit::jit::{Inst, lower, optimize};
use stackjit::samples;
use stackjit::{JitError, Result};

fn lowered(program: &Program) -> Vec<Inst> {
    lower(program).collect::<Result<Vec<_>>>().unwrap()
}

#[test]
fn test_optimizer_is_idempotent_on_samples() {
    for sample in samples::all() {
        let once = optimize(lowered(&sample.program));
        let twice = optimize(once.ir.clone());
        assert_eq!(twice.ir, once.ir, "{}", sample.program.name);
        assert_eq!(twice.passes.len(), 1);
        assert_eq!(once.passes.last().map(|p| p.rewrites), Some(0));
    }
}

#[test]
fn test_optimizer_keeps_frame_balanced() {
    // Every push must still be matched by a pop, otherwise `ret` would jump
    // to a stack slot.
    for sample in samples::all() {
        let ir = optimize(lowered(&sample.program)).ir;
        let depth = ir.iter().fold(0i64, |depth, inst| match inst {
            Inst::Push(_) => depth + 1,
            Inst::Pop(_) => depth - 1,
            _ => depth,
        });
        assert_eq!(depth, 0, "{}", sample.program.name);
        assert_eq!(ir.last(), Some(&Inst::Ret));
    }
}

#[test]
fn test_unknown_operation_is_rejected() {
    // LOAD_FAST 0; LOAD_ATTR 1; RETURN_VALUE
    let program = Program::new("attr", vec![124, 0, 106, 1, 83, 0], vec![], 1, Encoding::Wordcode);
    let err = lower(&program).collect::<Result<Vec<_>>>().unwrap_err();
    assert!(matches!(err, JitError::UnsupportedOperation { ref name, offset: 2 } if name == "LOAD_ATTR"));

    let err = Interpreter::default().run(&program, &[1]).unwrap_err();
    assert!(matches!(err, JitError::UnsupportedOperation { .. }));
}

#[cfg(all(unix, target_arch = "x86_64"))]
mod native {
    use super::*;
    use stackjit::jit::{HostMemory, Protection};
    use stackjit::{JitCompiler, JitConfig, JitMode};

    fn compiler(optimize: bool) -> JitCompiler {
        JitCompiler::new(JitConfig {
            jit_mode: JitMode::On,
            optimize,
            ..JitConfig::default()
        })
        .unwrap()
    }

    fn run(program: &Program, args: &[i64]) -> i64 {
        compiler(true).compile(program).unwrap().call(args).unwrap()
    }

    #[test]
    fn test_identity() {
        let program = samples::find("example0").unwrap().program;
        assert_eq!(run(&program, &[7]), 7);
    }

    #[test]
    fn test_times_101() {
        let program = samples::find("example1").unwrap().program;
        let function = compiler(true).compile(&program).unwrap();
        for n in [-999, -1, 0, 1, 2, 999] {
            assert_eq!(function.call(&[n]).unwrap(), n * 101);
        }
    }

    #[test]
    fn test_sum_of_squares() {
        let program = samples::find("example2").unwrap().program;
        assert_eq!(run(&program, &[3, 4]), 25);
        assert_eq!(run(&program, &[-5, 0]), 25);
    }

    #[test]
    fn test_stored_local() {
        let program = samples::find("example3").unwrap().program;
        assert_eq!(run(&program, &[2]), 206);
        assert_eq!(run(&program, &[-3]), -3 * 101 - 3 + 2);
    }

    #[test]
    fn test_subtraction_order() {
        let program = samples::find("example6").unwrap().program;
        assert_eq!(run(&program, &[5, 2]), 21);
        assert_eq!(run(&program, &[2, 3]), -5);
    }

    #[test]
    fn test_unknown_operation_allocates_nothing() {
        let program = Program::new("attr", vec![124, 0, 106, 1, 83, 0], vec![], 1, Encoding::Wordcode);
        let err = compiler(true).compile(&program).unwrap_err();
        assert!(matches!(err, JitError::UnsupportedOperation { .. }));
        assert!(!err.is_fallback_safe());
    }

    #[test]
    fn test_samples_match_interpreter() {
        let interpreter = Interpreter::default();
        for optimize in [true, false] {
            let compiler = compiler(optimize);
            for sample in samples::all() {
                let function = compiler.compile(&sample.program).unwrap();
                for args in samples::sweep(sample.program.arity, 40) {
                    assert_eq!(
                        function.call(&args).unwrap(),
                        interpreter.run(&sample.program, &args).unwrap(),
                        "{} {:?} (optimize = {})",
                        sample.program.name,
                        args,
                        optimize
                    );
                }
            }
        }
    }

    #[test]
    fn test_wrapping_arithmetic_matches_interpreter() {
        let program = ProgramBuilder::new("wrap", 2)
            .load_fast(0)
            .load_fast(1)
            .multiply()
            .load_const(i64::MIN)
            .subtract()
            .negate()
            .ret()
            .build();
        let function = compiler(true).compile(&program).unwrap();
        let interpreter = Interpreter::default();

        for args in [[i64::MAX, 2], [i64::MIN, -1], [0, 0], [3_037_000_500, 3_037_000_500]] {
            assert_eq!(function.call(&args).unwrap(), interpreter.run(&program, &args).unwrap());
        }
    }

    #[test]
    fn test_unsigned_constant_keeps_bit_pattern() {
        let program = ProgramBuilder::new("ones", 0).load_const(u64::MAX).ret().build();
        assert_eq!(run(&program, &[]), -1);
    }

    #[test]
    fn test_encodings_agree() {
        let build = |encoding| {
            ProgramBuilder::new("poly", 3)
                .encoding(encoding)
                .load_fast(0)
                .load_fast(1)
                .subtract()
                .load_fast(2)
                .op(stackjit::bytecode::Opcode::InplaceAdd, 0)
                .ret()
                .build()
        };
        let wordcode = build(Encoding::Wordcode);
        let legacy = build(Encoding::Legacy);
        assert_ne!(wordcode.code, legacy.code);
        assert_eq!(lowered(&wordcode), lowered(&legacy));
        assert_eq!(run(&wordcode, &[10, 3, 4]), 11);
        assert_eq!(run(&legacy, &[10, 3, 4]), 11);
    }

    #[test]
    fn test_arity_boundary() {
        let mut builder = ProgramBuilder::new("four", 4).load_fast(0);
        for i in 1..4 {
            builder = builder.load_fast(i).add();
        }
        let four = builder.ret().build();
        assert_eq!(run(&four, &[1, 2, 3, 4]), 10);

        let five = ProgramBuilder::new("five", 5).load_fast(4).ret().build();
        let err = compiler(true).compile(&five).unwrap_err();
        assert!(matches!(err, JitError::UnsupportedArity { arity: 5, max: 4 }));
    }

    #[test]
    fn test_region_protection() {
        let host = HostMemory::query().unwrap();
        let writable = host.allocate(1).unwrap();
        assert_eq!(writable.protection(), Protection::ReadWrite);
        let sealed = writable.seal().unwrap();
        assert_eq!(sealed.protection(), Protection::ReadExecute);
    }

    /// Permissions of the mapping containing `address`, from /proc/self/maps.
    #[cfg(target_os = "linux")]
    fn mapping_permissions(address: usize) -> Option<String> {
        let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
        maps.lines().find_map(|line| {
            let mut fields = line.split_whitespace();
            let range = fields.next()?;
            let perms = fields.next()?;
            let (start, end) = range.split_once('-')?;
            let start = usize::from_str_radix(start, 16).ok()?;
            let end = usize::from_str_radix(end, 16).ok()?;
            (start <= address && address < end).then(|| perms.to_string())
        })
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_code_is_never_writable_and_executable() {
        let host = HostMemory::query().unwrap();
        let mut writable = host.allocate(1).unwrap();
        writable.write(0, &[0xC3]).unwrap();
        let address = writable.as_ptr() as usize;
        let perms = mapping_permissions(address).unwrap();
        assert!(perms.starts_with("rw-"), "{}", perms);

        let sealed = writable.seal().unwrap();
        let perms = mapping_permissions(address).unwrap();
        assert!(perms.starts_with("r-x"), "{}", perms);
        sealed.release().unwrap();

        let program = samples::find("example7").unwrap().program;
        let function = compiler(true).compile(&program).unwrap();
        let perms = mapping_permissions(function.address()).unwrap();
        assert!(perms.starts_with("r-x"), "{}", perms);
    }
}
