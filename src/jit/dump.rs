//! Text dumps of each pipeline stage for `--dump-*` and `--report`.

use std::fmt::Write;

use super::compiler::{CompileReport, CompiledFunction};
use super::ir::Inst;
use crate::bytecode::Program;
use crate::error::Result;

/// Width of the hex column: the longest encoding (`mov r64, imm64`) is
/// ten bytes.
const HEX_WIDTH: usize = 10 * 3;

/// Format the decoded instructions of a program.
pub fn format_bytecode(program: &Program) -> Result<String> {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "== {} (arity {}, {:?}) ==",
        program.name, program.arity, program.encoding
    );
    for inst in program.decoder() {
        let _ = writeln!(output, "{}", inst?);
    }
    Ok(output)
}

/// Format an IR sequence, one instruction per line.
pub fn format_ir(ir: &[Inst]) -> String {
    let mut output = String::new();
    for inst in ir {
        let _ = writeln!(output, "  {}", inst);
    }
    output
}

/// Annotated machine code: address, bytes and instruction, stopping after
/// the first `ret`.
pub fn listing(function: &CompiledFunction) -> String {
    let mut output = String::new();
    let code = function.code();

    for span in function.spans() {
        let bytes = &code[span.offset..span.offset + span.len];
        let hex = bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            output,
            "0x{:x} {:<width$} {}",
            function.address() + span.offset,
            hex,
            span.inst,
            width = HEX_WIDTH
        );
        if span.inst == Inst::Ret {
            break;
        }
    }
    output
}

/// Human-readable compile report.
pub fn format_report(report: &CompileReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "program:     {}", report.name);
    let _ = writeln!(output, "arity:       {}", report.arity);
    let _ = writeln!(output, "max stack:   {}", report.max_stack);
    let _ = writeln!(
        output,
        "ir:          {} -> {} instructions",
        report.ir.len(),
        report.optimized.len()
    );
    for (i, pass) in report.passes.iter().enumerate() {
        let _ = writeln!(
            output,
            "  pass {}: {} rewrite(s), {} removed",
            i + 1,
            pass.rewrites,
            pass.removed
        );
    }
    let _ = writeln!(
        output,
        "code:        {} bytes in a {} byte region",
        report.code_len, report.region_size
    );
    output
}
