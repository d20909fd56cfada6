use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::compile::Bytecode;
use crate::bytecode::op::{self, Opcode};
use crate::lang::builtins::{self, Builtin};
use crate::lang::value::{Closure, CompiledFunction, HashKey, Value};
use crate::runtime::frame::{Frame, Frames};
use crate::runtime::runtime_error::RuntimeError;
use crate::runtime::stack::Stack;

// =============================================================================
// VM - Stack-based bytecode interpreter
// =============================================================================

/// Globals array size; matches the 2-byte operand of Set/GetGlobal.
pub const GLOBALS_LIMIT: usize = 65536;
/// Value stack depth.
pub const STACK_LIMIT: usize = 2048;
/// Call depth.
pub const FRAME_LIMIT: usize = 1024;

// Shared singleton values; pushing one never allocates.
pub const TRUE: Value = Value::Boolean(true);
pub const FALSE: Value = Value::Boolean(false);
pub const NULL: Value = Value::Null;

/// Executes one [`Bytecode`] artifact.
///
/// The machine borrows the bytecode for its lifetime and owns its stack,
/// call frames, and globals exclusively. Execution is synchronous and
/// strictly sequential; any error aborts [`VM::run`] and leaves the
/// machine unusable.
pub struct VM<'a> {
    constants: &'a [Value],
    globals: Vec<Value>,
    stack: Stack,
    frames: Frames,
}

impl<'a> VM<'a> {
    /// Wrap the top-level instructions in a main frame and allocate the
    /// runtime arenas.
    pub fn new(bytecode: &'a Bytecode) -> Self {
        let main_fn = CompiledFunction {
            instructions: bytecode.instructions.clone(),
            local_count: 0,
            param_count: 0,
        };
        let main_closure = Rc::new(Closure {
            func: Rc::new(main_fn),
            free: Vec::new(),
        });

        VM {
            constants: &bytecode.constants,
            globals: vec![Value::Null; GLOBALS_LIMIT],
            stack: Stack::new(STACK_LIMIT),
            frames: Frames::new(Frame::new(main_closure, 0), FRAME_LIMIT),
        }
    }

    /// Adopt a globals array from an earlier run, so bindings persist
    /// across compile/run pairs (REPL sessions).
    pub fn new_with_globals(bytecode: &'a Bytecode, mut globals: Vec<Value>) -> Self {
        globals.resize(GLOBALS_LIMIT, Value::Null);
        let mut vm = Self::new(bytecode);
        vm.globals = globals;
        vm
    }

    /// Hand the globals array to the next run.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The value of the last expression the program evaluated: the slot
    /// most recently vacated by a Pop instruction.
    pub fn result(&self) -> Value {
        self.stack.popped()
    }

    /// Execute every instruction. Errors abort immediately.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.frames.current().ip
            < self.frames.current().instructions().len() as isize - 1
        {
            self.frames.current_mut().ip += 1;

            let ip = self.frames.current().ip as usize;
            let byte = self.frames.current().instructions()[ip];
            let op = Opcode::from_byte(byte).ok_or(RuntimeError::UndefinedOpcode(byte))?;

            match op {
                Opcode::Pop => {
                    self.stack.pop()?;
                }

                Opcode::Constant => {
                    let index = self.read_u16_operand(ip) as usize;
                    self.stack.push(self.constants[index].clone())?;
                }

                Opcode::True => self.stack.push(TRUE)?,
                Opcode::False => self.stack.push(FALSE)?,
                Opcode::Null => self.stack.push(NULL)?,

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_op(op)?;
                }

                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                Opcode::Bang => {
                    let operand = self.stack.pop()?;
                    self.stack.push(native_bool(!is_truthy(&operand)))?;
                }

                Opcode::Minus => {
                    let operand = self.stack.pop()?;
                    match operand {
                        Value::Integer(value) => self.stack.push(Value::Integer(-value))?,
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(other.type_name()))
                        }
                    }
                }

                Opcode::Jump => {
                    let target =
                        op::read_u16(&self.frames.current().instructions()[ip + 1..]) as isize;
                    // The loop increment lands exactly on the target.
                    self.frames.current_mut().ip = target - 1;
                }

                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand(ip) as isize;
                    let condition = self.stack.pop()?;
                    if !is_truthy(&condition) {
                        self.frames.current_mut().ip = target - 1;
                    }
                }

                Opcode::SetGlobal => {
                    let index = self.read_u16_operand(ip) as usize;
                    self.globals[index] = self.stack.pop()?;
                }

                Opcode::GetGlobal => {
                    let index = self.read_u16_operand(ip) as usize;
                    self.stack.push(self.globals[index].clone())?;
                }

                Opcode::SetLocal => {
                    let index = self.read_u8_operand(ip) as usize;
                    let frame_pointer = self.frames.current().frame_pointer;
                    let value = self.stack.pop()?;
                    self.stack.set(frame_pointer + index, value)?;
                }

                Opcode::GetLocal => {
                    let index = self.read_u8_operand(ip) as usize;
                    let frame_pointer = self.frames.current().frame_pointer;
                    let value = self.stack.get(frame_pointer + index)?;
                    self.stack.push(value)?;
                }

                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand(ip) as usize;
                    self.stack.push(Value::Builtin(&builtins::all()[index]))?;
                }

                Opcode::GetFree => {
                    let index = self.read_u8_operand(ip) as usize;
                    let value = self.frames.current().closure().free[index].clone();
                    self.stack.push(value)?;
                }

                Opcode::Array => {
                    let count = self.read_u16_operand(ip) as usize;
                    let pointer = self.stack.pointer();
                    let start = pointer
                        .checked_sub(count)
                        .ok_or(RuntimeError::StackUnderflow)?;

                    let array = Value::Array(self.stack.slice(start, pointer).to_vec());
                    self.stack.set_pointer(start)?;
                    self.stack.push(array)?;
                }

                Opcode::Hash => {
                    let count = self.read_u16_operand(ip) as usize;
                    let pointer = self.stack.pointer();
                    let start = pointer
                        .checked_sub(count)
                        .ok_or(RuntimeError::StackUnderflow)?;

                    let hash = self.build_hash(start, pointer)?;
                    self.stack.set_pointer(start)?;
                    self.stack.push(hash)?;
                }

                Opcode::Index => {
                    let index = self.stack.pop()?;
                    let left = self.stack.pop()?;
                    self.execute_index(left, index)?;
                }

                Opcode::Call => {
                    let argc = self.read_u8_operand(ip) as usize;
                    self.execute_call(argc)?;
                }

                Opcode::ReturnValue => {
                    let value = self.stack.pop()?;
                    let new_pointer = self
                        .frames
                        .current()
                        .frame_pointer
                        .checked_sub(1)
                        .ok_or(RuntimeError::StackUnderflow)?;

                    self.frames.pop();
                    // Drops the callee's locals and the callee itself.
                    self.stack.set_pointer(new_pointer)?;
                    self.stack.push(value)?;
                }

                Opcode::Return => {
                    let new_pointer = self
                        .frames
                        .current()
                        .frame_pointer
                        .checked_sub(1)
                        .ok_or(RuntimeError::StackUnderflow)?;

                    self.frames.pop();
                    self.stack.set_pointer(new_pointer)?;
                    self.stack.push(NULL)?;
                }

                Opcode::Closure => {
                    let const_index = {
                        let instructions = self.frames.current().instructions();
                        op::read_u16(&instructions[ip + 1..]) as usize
                    };
                    let free_count = {
                        let instructions = self.frames.current().instructions();
                        op::read_u8(&instructions[ip + 3..]) as usize
                    };
                    self.frames.current_mut().ip += 3;
                    self.push_closure(const_index, free_count)?;
                }
            }
        }
        Ok(())
    }

    // Operand reads advance the instruction pointer past what they consumed.

    fn read_u16_operand(&mut self, ip: usize) -> u16 {
        let value = op::read_u16(&self.frames.current().instructions()[ip + 1..]);
        self.frames.current_mut().ip += 2;
        value
    }

    fn read_u8_operand(&mut self, ip: usize) -> u8 {
        let value = op::read_u8(&self.frames.current().instructions()[ip + 1..]);
        self.frames.current_mut().ip += 1;
        value
    }

    fn execute_binary_op(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;

        match (&left, &right) {
            (Value::Integer(left), Value::Integer(right)) => {
                self.execute_integer_binary_op(op, *left, *right)
            }
            (Value::Str(left), Value::Str(right)) if op == Opcode::Add => {
                let mut value = String::with_capacity(left.len() + right.len());
                value.push_str(left);
                value.push_str(right);
                self.stack.push(Value::Str(value))
            }
            _ => Err(RuntimeError::UnsupportedBinaryTypes {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_integer_binary_op(
        &mut self,
        op: Opcode,
        left: i64,
        right: i64,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Opcode::Add => left + right,
            Opcode::Sub => left - right,
            Opcode::Mul => left * right,
            Opcode::Div => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                left / right
            }
            other => return Err(RuntimeError::UnknownIntegerOperator(other as u8)),
        };
        self.stack.push(Value::Integer(result))
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;

        if let (Value::Integer(left), Value::Integer(right)) = (&left, &right) {
            return self.execute_integer_comparison(op, *left, *right);
        }

        match op {
            Opcode::Equal => self.stack.push(native_bool(left == right)),
            Opcode::NotEqual => self.stack.push(native_bool(left != right)),
            other => Err(RuntimeError::UnknownOperator {
                op: other as u8,
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_integer_comparison(
        &mut self,
        op: Opcode,
        left: i64,
        right: i64,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Opcode::Equal => left == right,
            Opcode::NotEqual => left != right,
            Opcode::GreaterThan => left > right,
            other => return Err(RuntimeError::UnknownIntegerOperator(other as u8)),
        };
        self.stack.push(native_bool(result))
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<Value, RuntimeError> {
        let mut pairs = HashMap::with_capacity((end - start) / 2);

        let mut index = start;
        while index < end {
            let key = HashKey::try_from(&self.stack.get(index)?)?;
            let value = self.stack.get(index + 1)?;
            pairs.insert(key, value);
            index += 2;
        }

        Ok(Value::Hash(pairs))
    }

    fn execute_index(&mut self, left: Value, index: Value) -> Result<(), RuntimeError> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(index)) => {
                // Out of range reads produce null rather than failing.
                let value = if *index < 0 {
                    NULL
                } else {
                    elements.get(*index as usize).cloned().unwrap_or(NULL)
                };
                self.stack.push(value)
            }
            (Value::Hash(pairs), _) => {
                let key = HashKey::try_from(&index)?;
                self.stack.push(pairs.get(&key).cloned().unwrap_or(NULL))
            }
            _ => Err(RuntimeError::UnsupportedIndex(left.type_name())),
        }
    }

    /// The callable sits below its arguments: `stack[sp - argc - 1]`.
    fn execute_call(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee_index = self
            .stack
            .pointer()
            .checked_sub(argc + 1)
            .ok_or(RuntimeError::StackUnderflow)?;
        let callee = self.stack.get(callee_index)?;

        match callee {
            Value::Closure(closure) => self.call_closure(closure, argc),
            Value::Function(func) => self.call_closure(
                Rc::new(Closure {
                    func,
                    free: Vec::new(),
                }),
                argc,
            ),
            Value::Builtin(builtin) => self.call_builtin(builtin, argc),
            _ => Err(RuntimeError::CallingNonFunction),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> Result<(), RuntimeError> {
        if argc != closure.func.param_count {
            return Err(RuntimeError::WrongArity {
                expected: closure.func.param_count,
                got: argc,
            });
        }

        // Arguments already occupy the first param_count local slots.
        let frame_pointer = self.stack.pointer() - argc;
        let local_count = closure.func.local_count;

        self.frames.push(Frame::new(closure, frame_pointer))?;
        self.stack.set_pointer(frame_pointer + local_count)?;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, argc: usize) -> Result<(), RuntimeError> {
        let pointer = self.stack.pointer();
        let args = self.stack.slice(pointer - argc, pointer).to_vec();

        let result = (builtin.func)(&args)?;

        self.stack.set_pointer(pointer - argc - 1)?;
        self.stack.push(result.unwrap_or(NULL))
    }

    fn push_closure(&mut self, const_index: usize, free_count: usize) -> Result<(), RuntimeError> {
        let constant = self.constants[const_index].clone();
        let func = match constant {
            Value::Function(func) => func,
            other => return Err(RuntimeError::NotAFunction(other.type_name())),
        };

        // The compiler pushed the captures in declaration order.
        let pointer = self.stack.pointer();
        let start = pointer
            .checked_sub(free_count)
            .ok_or(RuntimeError::StackUnderflow)?;
        let free = self.stack.slice(start, pointer).to_vec();
        self.stack.set_pointer(start)?;

        self.stack
            .push(Value::Closure(Rc::new(Closure { func, free })))
    }
}

/// Everything is truthy except false and null.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(value) => *value,
        Value::Null => false,
        _ => true,
    }
}

fn native_bool(value: bool) -> Value {
    if value {
        TRUE
    } else {
        FALSE
    }
}
