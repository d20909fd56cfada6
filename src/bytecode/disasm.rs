use std::fmt::Write;

use crate::bytecode::op::{lookup, read_operands};

// =============================================================================
// DISASM - Instruction stream disassembly
// =============================================================================

/// Render an instruction stream, one line per instruction:
///
/// ```text
/// 0000 Constant 1
/// 0003 Closure 2, 1
/// 0007 Pop
/// ```
///
/// Offsets are byte positions zero-padded to four digits. Undecodable
/// bytes are reported inline and skipped, so the output always covers the
/// whole stream.
pub fn disassemble(instructions: &[u8]) -> String {
    let mut output = String::new();
    let mut offset = 0;

    while offset < instructions.len() {
        let operation = match lookup(instructions[offset]) {
            Ok(operation) => operation,
            Err(err) => {
                let _ = writeln!(output, "{:04} ERROR: {}", offset, err);
                offset += 1;
                continue;
            }
        };

        let (operands, read) = read_operands(operation, &instructions[offset + 1..]);
        let _ = write!(output, "{:04} {}", offset, operation.name);
        if !operands.is_empty() {
            let operands: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
            let _ = write!(output, " {}", operands.join(", "));
        }
        output.push('\n');

        offset += 1 + read;
    }

    output
}
