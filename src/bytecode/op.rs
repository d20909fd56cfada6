use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

// =============================================================================
// OP - Opcodes and instruction encoding
// =============================================================================
//
// An instruction is a 1-byte opcode followed by zero or more big-endian
// operands whose widths are declared per opcode. Instruction streams are
// opaque byte sequences; the encoder and decoder below are pure functions
// over byte slices.

/// A compiled instruction stream.
pub type Instructions = Vec<u8>;

/// Operation codes understood by the virtual machine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Push `constants[operand]`.
    Constant = 0,
    /// Pop and discard the top of the stack.
    Pop,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Singleton literals
    True,
    False,
    Null,

    // Comparison
    Equal,
    NotEqual,
    GreaterThan,

    // Prefix operators
    Bang,
    Minus,

    // Control flow
    Jump,
    JumpNotTruthy,

    // Bindings
    SetGlobal,
    GetGlobal,
    SetLocal,
    GetLocal,
    GetBuiltin,
    GetFree,

    // Composite values
    Array,
    Hash,
    Index,

    // Calls
    Call,
    ReturnValue,
    Return,
    Closure,
}

impl Opcode {
    /// Decode a raw byte into an opcode.
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        match byte {
            0 => Some(Opcode::Constant),
            1 => Some(Opcode::Pop),
            2 => Some(Opcode::Add),
            3 => Some(Opcode::Sub),
            4 => Some(Opcode::Mul),
            5 => Some(Opcode::Div),
            6 => Some(Opcode::True),
            7 => Some(Opcode::False),
            8 => Some(Opcode::Null),
            9 => Some(Opcode::Equal),
            10 => Some(Opcode::NotEqual),
            11 => Some(Opcode::GreaterThan),
            12 => Some(Opcode::Bang),
            13 => Some(Opcode::Minus),
            14 => Some(Opcode::Jump),
            15 => Some(Opcode::JumpNotTruthy),
            16 => Some(Opcode::SetGlobal),
            17 => Some(Opcode::GetGlobal),
            18 => Some(Opcode::SetLocal),
            19 => Some(Opcode::GetLocal),
            20 => Some(Opcode::GetBuiltin),
            21 => Some(Opcode::GetFree),
            22 => Some(Opcode::Array),
            23 => Some(Opcode::Hash),
            24 => Some(Opcode::Index),
            25 => Some(Opcode::Call),
            26 => Some(Opcode::ReturnValue),
            27 => Some(Opcode::Return),
            28 => Some(Opcode::Closure),
            _ => None,
        }
    }

    /// The definition of this opcode: name and operand widths.
    pub fn operation(self) -> &'static Operation {
        &OPERATIONS[self as usize]
    }
}

/// The definition of an operation.
#[derive(Debug, PartialEq, Eq)]
pub struct Operation {
    /// Human-readable name, as printed by the disassembler.
    pub name: &'static str,
    /// Width in bytes of each operand.
    pub operand_widths: &'static [usize],
}

// Indexed by opcode value.
static OPERATIONS: [Operation; 29] = [
    Operation { name: "Constant", operand_widths: &[2] },
    Operation { name: "Pop", operand_widths: &[] },
    Operation { name: "Add", operand_widths: &[] },
    Operation { name: "Sub", operand_widths: &[] },
    Operation { name: "Mul", operand_widths: &[] },
    Operation { name: "Div", operand_widths: &[] },
    Operation { name: "True", operand_widths: &[] },
    Operation { name: "False", operand_widths: &[] },
    Operation { name: "Null", operand_widths: &[] },
    Operation { name: "Equal", operand_widths: &[] },
    Operation { name: "NotEqual", operand_widths: &[] },
    Operation { name: "GreaterThan", operand_widths: &[] },
    Operation { name: "Bang", operand_widths: &[] },
    Operation { name: "Minus", operand_widths: &[] },
    Operation { name: "Jump", operand_widths: &[2] },
    Operation { name: "JumpNotTruthy", operand_widths: &[2] },
    Operation { name: "SetGlobal", operand_widths: &[2] },
    Operation { name: "GetGlobal", operand_widths: &[2] },
    Operation { name: "SetLocal", operand_widths: &[1] },
    Operation { name: "GetLocal", operand_widths: &[1] },
    Operation { name: "GetBuiltin", operand_widths: &[1] },
    Operation { name: "GetFree", operand_widths: &[1] },
    Operation { name: "Array", operand_widths: &[2] },
    Operation { name: "Hash", operand_widths: &[2] },
    Operation { name: "Index", operand_widths: &[] },
    Operation { name: "Call", operand_widths: &[1] },
    Operation { name: "ReturnValue", operand_widths: &[] },
    Operation { name: "Return", operand_widths: &[] },
    Operation { name: "Closure", operand_widths: &[2, 1] },
];

/// Instruction encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("Undefined Opcode: {0}")]
    Undefined(u8),
    #[error("operation {operation} takes {want} operands, got {got}")]
    OperandCount {
        operation: &'static str,
        want: usize,
        got: usize,
    },
    #[error("operand {value} does not fit in {width} byte(s)")]
    OperandWidth { value: usize, width: usize },
}

/// Look up the operation definition for a raw opcode byte.
pub fn lookup(byte: u8) -> Result<&'static Operation, OperationError> {
    Opcode::from_byte(byte)
        .map(Opcode::operation)
        .ok_or(OperationError::Undefined(byte))
}

/// Encode a single instruction.
///
/// The operand count must match the opcode's definition and every operand
/// must fit its declared width. Multi-byte operands are big-endian.
pub fn make(op: Opcode, operands: &[usize]) -> Result<Instructions, OperationError> {
    let operation = op.operation();
    if operands.len() != operation.operand_widths.len() {
        return Err(OperationError::OperandCount {
            operation: operation.name,
            want: operation.operand_widths.len(),
            got: operands.len(),
        });
    }

    let length = 1 + operation.operand_widths.iter().sum::<usize>();
    let mut instruction = Vec::with_capacity(length);
    instruction.push(op as u8);

    for (operand, width) in operands.iter().zip(operation.operand_widths) {
        match width {
            2 => {
                if *operand > u16::MAX as usize {
                    return Err(OperationError::OperandWidth {
                        value: *operand,
                        width: 2,
                    });
                }
                let mut buf = [0u8; 2];
                BigEndian::write_u16(&mut buf, *operand as u16);
                instruction.extend_from_slice(&buf);
            }
            1 => {
                if *operand > u8::MAX as usize {
                    return Err(OperationError::OperandWidth {
                        value: *operand,
                        width: 1,
                    });
                }
                instruction.push(*operand as u8);
            }
            _ => unreachable!("operand widths are 1 or 2 bytes"),
        }
    }

    Ok(instruction)
}

/// Read a big-endian 2-byte operand.
pub fn read_u16(instructions: &[u8]) -> u16 {
    BigEndian::read_u16(instructions)
}

/// Read a 1-byte operand.
pub fn read_u8(instructions: &[u8]) -> u8 {
    instructions[0]
}

/// Decode the operands of one instruction; returns the operands and the
/// number of bytes read.
pub fn read_operands(operation: &Operation, instructions: &[u8]) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(operation.operand_widths.len());
    let mut offset = 0;

    for width in operation.operand_widths {
        match width {
            2 => operands.push(read_u16(&instructions[offset..]) as usize),
            1 => operands.push(read_u8(&instructions[offset..]) as usize),
            _ => unreachable!("operand widths are 1 or 2 bytes"),
        }
        offset += width;
    }

    (operands, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_two_byte_operand() {
        let instruction = make(Opcode::Constant, &[65534]).unwrap();
        assert_eq!(instruction, vec![Opcode::Constant as u8, 255, 254]);
    }

    #[test]
    fn test_make_one_byte_operand() {
        let instruction = make(Opcode::GetLocal, &[255]).unwrap();
        assert_eq!(instruction, vec![Opcode::GetLocal as u8, 255]);
    }

    #[test]
    fn test_make_without_operands() {
        let instruction = make(Opcode::Add, &[]).unwrap();
        assert_eq!(instruction, vec![Opcode::Add as u8]);
    }

    #[test]
    fn test_make_mixed_widths() {
        let instruction = make(Opcode::Closure, &[65534, 255]).unwrap();
        assert_eq!(instruction, vec![Opcode::Closure as u8, 255, 254, 255]);
    }

    #[test]
    fn test_make_rejects_wrong_operand_count() {
        let err = make(Opcode::Constant, &[]).unwrap_err();
        assert_eq!(
            err,
            OperationError::OperandCount {
                operation: "Constant",
                want: 1,
                got: 0,
            }
        );

        let err = make(Opcode::Add, &[1]).unwrap_err();
        assert!(err.to_string().contains("takes 0 operands"));
    }

    #[test]
    fn test_make_rejects_oversized_operands() {
        let err = make(Opcode::Constant, &[65536]).unwrap_err();
        assert_eq!(
            err,
            OperationError::OperandWidth {
                value: 65536,
                width: 2,
            }
        );

        let err = make(Opcode::GetLocal, &[256]).unwrap_err();
        assert_eq!(
            err,
            OperationError::OperandWidth {
                value: 256,
                width: 1,
            }
        );
    }

    #[test]
    fn test_lookup_known_opcodes() {
        assert_eq!(lookup(Opcode::Constant as u8).unwrap().name, "Constant");
        assert_eq!(lookup(Opcode::Closure as u8).unwrap().name, "Closure");
    }

    #[test]
    fn test_lookup_undefined_opcode() {
        let err = lookup(255).unwrap_err();
        assert_eq!(err.to_string(), "Undefined Opcode: 255");
    }

    #[test]
    fn test_every_opcode_round_trips_through_from_byte() {
        for byte in 0..OPERATIONS.len() as u8 {
            let opcode = Opcode::from_byte(byte).expect("opcode should decode");
            assert_eq!(opcode as u8, byte);
            assert_eq!(opcode.operation(), &OPERATIONS[byte as usize]);
        }
        assert_eq!(Opcode::from_byte(OPERATIONS.len() as u8), None);
    }

    #[test]
    fn test_read_operands_round_trip() {
        let cases: Vec<(Opcode, Vec<usize>)> = vec![
            (Opcode::Constant, vec![65535]),
            (Opcode::GetLocal, vec![255]),
            (Opcode::Closure, vec![65535, 255]),
            (Opcode::Add, vec![]),
        ];

        for (opcode, operands) in cases {
            let instruction = make(opcode, &operands).unwrap();
            let operation = lookup(instruction[0]).unwrap();
            let (read, bytes) = read_operands(operation, &instruction[1..]);

            assert_eq!(read, operands);
            assert_eq!(bytes, instruction.len() - 1);
        }
    }

    #[test]
    fn test_read_u8_round_trips_all_values() {
        for value in 0..=u8::MAX as usize {
            let instruction = make(Opcode::GetLocal, &[value]).unwrap();
            assert_eq!(read_u8(&instruction[1..]) as usize, value);
        }
    }

    #[test]
    fn test_read_u16_round_trips_boundary_values() {
        for value in [0usize, 1, 255, 256, 257, 32767, 32768, 65534, 65535] {
            let instruction = make(Opcode::Constant, &[value]).unwrap();
            assert_eq!(read_u16(&instruction[1..]) as usize, value);
        }
    }

    #[test]
    fn test_encoding_is_big_endian() {
        let instruction = make(Opcode::Jump, &[258]).unwrap();
        // 258 = 0x0102: high byte first
        assert_eq!(&instruction[1..], &[1, 2]);
    }
}
