//! Built-in sample programs.
//!
//! Each sample is the bytecode a CPython compiler produces for a small
//! integer function. The `demo` subcommand, the benchmarks and the
//! integration tests all run these.

use crate::bytecode::{Encoding, Opcode, Program, ProgramBuilder};

/// A sample program and the source it was compiled from.
#[derive(Debug, Clone)]
pub struct Sample {
    pub program: Program,
    pub source: &'static str,
}

fn sample(source: &'static str, program: ProgramBuilder) -> Sample {
    Sample {
        program: program.build(),
        source,
    }
}

/// All samples, in the order the demo prints them.
pub fn all() -> Vec<Sample> {
    vec![
        sample("def example0(n): return n", ProgramBuilder::new("example0", 1).load_fast(0).ret()),
        sample(
            "def example1(n): return n*101",
            ProgramBuilder::new("example1", 1)
                .load_fast(0)
                .load_const(101)
                .multiply()
                .ret(),
        ),
        sample(
            "def example2(a, b): return a*a + b*b",
            ProgramBuilder::new("example2", 2)
                .load_fast(0)
                .load_fast(0)
                .multiply()
                .load_fast(1)
                .load_fast(1)
                .multiply()
                .add()
                .ret(),
        ),
        sample(
            "def example3(a): b = a*101; return b + a + 2",
            ProgramBuilder::new("example3", 1)
                .load_fast(0)
                .load_const(101)
                .multiply()
                .store_fast(1)
                .load_fast(1)
                .load_fast(0)
                .add()
                .load_const(2)
                .add()
                .ret(),
        ),
        sample(
            "def example4(a, b, c): return a*a + 2*a*b + c",
            ProgramBuilder::new("example4", 3)
                .load_fast(0)
                .load_fast(0)
                .multiply()
                .load_const(2)
                .load_fast(0)
                .multiply()
                .load_fast(1)
                .multiply()
                .add()
                .load_fast(2)
                .add()
                .ret(),
        ),
        sample(
            "def example5(n): n -= 10; return n",
            ProgramBuilder::new("example5", 1)
                .encoding(Encoding::Legacy)
                .load_fast(0)
                .load_const(10)
                .op(Opcode::InplaceSubtract, 0)
                .store_fast(0)
                .load_fast(0)
                .ret(),
        ),
        sample(
            "def example6(a, b): return a*a - b*b",
            ProgramBuilder::new("example6", 2)
                .load_fast(0)
                .load_fast(0)
                .multiply()
                .load_fast(1)
                .load_fast(1)
                .multiply()
                .subtract()
                .ret(),
        ),
        sample(
            "def example7(a, b, c): return (a+c)*b - a*a*(a-c-b) - b*2 + (c*(2+3*a*b-c*a) - 3*c)",
            ProgramBuilder::new("example7", 3)
                // (a+c)*b
                .load_fast(0)
                .load_fast(2)
                .add()
                .load_fast(1)
                .multiply()
                // a*a*(a-c-b)
                .load_fast(0)
                .load_fast(0)
                .multiply()
                .load_fast(0)
                .load_fast(2)
                .subtract()
                .load_fast(1)
                .subtract()
                .multiply()
                .subtract()
                // b*2
                .load_fast(1)
                .load_const(2)
                .multiply()
                .subtract()
                // c*(2+3*a*b-c*a) - 3*c
                .load_fast(2)
                .load_const(2)
                .load_const(3)
                .load_fast(0)
                .multiply()
                .load_fast(1)
                .multiply()
                .add()
                .load_fast(2)
                .load_fast(0)
                .multiply()
                .subtract()
                .multiply()
                .load_const(3)
                .load_fast(2)
                .multiply()
                .subtract()
                .add()
                .ret(),
        ),
        sample(
            "def negate_sum(a, b, c, d): return -(a + b + c + d)",
            ProgramBuilder::new("negate_sum", 4)
                .load_fast(0)
                .load_fast(1)
                .add()
                .load_fast(2)
                .add()
                .load_fast(3)
                .add()
                .negate()
                .ret(),
        ),
    ]
}

/// Look up a sample by program name.
pub fn find(name: &str) -> Option<Sample> {
    all().into_iter().find(|s| s.program.name == name)
}

const SWEEP_VALUES: [i64; 11] = [-999, -512, -101, -7, -1, 0, 1, 2, 13, 500, 999];

/// `count` deterministic argument vectors for a function of `arity`
/// arguments, drawn from the range -999..=999.
pub fn sweep(arity: usize, count: usize) -> Vec<Vec<i64>> {
    (0..count)
        .map(|i| {
            (0..arity)
                .map(|j| SWEEP_VALUES[(i * (2 * j + 1) + 3 * j) % SWEEP_VALUES.len()])
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Interpreter, Verifier};

    #[test]
    fn test_samples_verify() {
        let verifier = Verifier::default();
        for sample in all() {
            verifier.verify(&sample.program).unwrap();
        }
    }

    #[test]
    fn test_sample_values() {
        let interp = Interpreter::default();
        let run = |name: &str, args: &[i64]| interp.run(&find(name).unwrap().program, args).unwrap();

        assert_eq!(run("example0", &[7]), 7);
        assert_eq!(run("example1", &[2]), 202);
        assert_eq!(run("example2", &[3, 4]), 25);
        assert_eq!(run("example3", &[2]), 206);
        assert_eq!(run("example4", &[1, 2, 3]), 8);
        assert_eq!(run("example5", &[15]), 5);
        assert_eq!(run("example6", &[5, 2]), 21);
        assert_eq!(run("example6", &[2, 3]), -5);
        // (1+3)*2 - 1*1*(1-3-2) - 4 + (3*(2+6-3) - 9) = 8 + 4 - 4 + 6
        assert_eq!(run("example7", &[1, 2, 3]), 14);
        assert_eq!(run("negate_sum", &[1, 2, 3, 4]), -10);
    }

    #[test]
    fn test_sweep_is_deterministic() {
        let a = sweep(3, 10);
        assert_eq!(a, sweep(3, 10));
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|args| args.len() == 3));
        assert!(a.iter().flatten().all(|v| (-999..=999).contains(v)));
        assert!(sweep(0, 4).iter().all(|args| args.is_empty()));
    }
}
