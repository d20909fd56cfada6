use std::rc::Rc;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::op::{self, Instructions, Opcode, OperationError};
use crate::bytecode::symbols::{Symbol, SymbolScope, SymbolTable};
use crate::lang::builtins;
use crate::lang::node::{BlockStatement, Expression, Program, Statement};
use crate::lang::value::{CompiledFunction, Value};

// =============================================================================
// COMPILE - Single-pass AST to bytecode compiler
// =============================================================================

/// The constant pool is addressed by the 2-byte operand of `Constant`.
pub const CONSTANTS_LIMIT: usize = 65536;

/// Operand emitted for jumps whose target is not known yet; back-patched
/// once the target position is.
const JUMP_PLACEHOLDER: usize = 9999;

/// The output of one compile invocation: an instruction stream plus the
/// constant pool it references.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

/// An emitted instruction: its opcode and byte position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Emitted {
    opcode: Opcode,
    position: usize,
}

/// One compilation scope: the instructions under construction plus the
/// last two emissions, kept for O(1) rewrites and back-patching.
#[derive(Debug, Clone, Default)]
struct Scope {
    instructions: Instructions,
    emitted: Option<Emitted>,
    prev_emitted: Option<Emitted>,
}

/// Walks an AST and emits instructions and constants.
///
/// The program scope sits at the bottom of the scope stack; every function
/// literal pushes a fresh scope (and symbol table) and pops it once the
/// function body is compiled into a constant.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scopes: Vec<Scope>,
    current_scope: usize,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in builtins::all().iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }

        Compiler {
            constants: Vec::new(),
            symbols,
            scopes: vec![Scope::default()],
            current_scope: 0,
        }
    }

    /// Create a compiler that continues from an earlier invocation's
    /// symbols and constants, so a REPL can carry bindings across lines.
    pub fn new_with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        let mut compiler = Self::new();
        compiler.symbols = symbols;
        compiler.constants = constants;
        compiler
    }

    /// Hand the symbol table and constants to the next compiler.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbols, self.constants)
    }

    /// Compile a whole program into the current scope.
    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    /// Snapshot the compiled program.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                // Keep the stack empty between statements; the VM exposes
                // the popped slot as the program result.
                self.emit(Opcode::Pop, &[])?;
            }

            Statement::Let { name, value } => {
                // Define before compiling the value so the slot exists
                // while the initializer is compiled.
                let symbol = self.symbols.define(name);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index])?,
                    _ => self.emit(Opcode::SetLocal, &[symbol.index])?,
                };
            }

            Statement::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[])?;
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Integer(value) => {
                let index = self.add_constant(Value::Integer(*value))?;
                self.emit(Opcode::Constant, &[index])?;
            }

            Expression::Str(value) => {
                let index = self.add_constant(Value::Str(value.clone()))?;
                self.emit(Opcode::Constant, &[index])?;
            }

            Expression::Boolean(value) => {
                if *value {
                    self.emit(Opcode::True, &[])?;
                } else {
                    self.emit(Opcode::False, &[])?;
                }
            }

            Expression::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol)?;
            }

            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[])?,
                    "-" => self.emit(Opcode::Minus, &[])?,
                    _ => return Err(CompileError::UnknownOperator(operator.clone())),
                };
            }

            Expression::Infix {
                operator,
                left,
                right,
            } => {
                // There is no LessThan instruction: compile the operands
                // flipped and reuse GreaterThan.
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[])?;
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator.as_str() {
                    "+" => self.emit(Opcode::Add, &[])?,
                    "-" => self.emit(Opcode::Sub, &[])?,
                    "*" => self.emit(Opcode::Mul, &[])?,
                    "/" => self.emit(Opcode::Div, &[])?,
                    ">" => self.emit(Opcode::GreaterThan, &[])?,
                    "==" => self.emit(Opcode::Equal, &[])?,
                    "!=" => self.emit(Opcode::NotEqual, &[])?,
                    _ => return Err(CompileError::UnknownOperator(operator.clone())),
                };
            }

            Expression::If {
                condition,
                consequent,
                alternate,
            } => {
                self.compile_expression(condition)?;
                let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[JUMP_PLACEHOLDER])?;

                self.compile_block(consequent)?;
                // The branch value must stay on the stack.
                if self.last_emitted_is(Opcode::Pop) {
                    self.remove_last_pop();
                }

                let jump = self.emit(Opcode::Jump, &[JUMP_PLACEHOLDER])?;
                let after_consequent = self.current_instructions().len();
                self.change_operand(jump_not_truthy, after_consequent)?;

                match alternate {
                    None => {
                        self.emit(Opcode::Null, &[])?;
                    }
                    Some(alternate) => {
                        self.compile_block(alternate)?;
                        if self.last_emitted_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                }

                let after_alternate = self.current_instructions().len();
                self.change_operand(jump, after_alternate)?;
            }

            Expression::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()])?;
            }

            Expression::Hash(pairs) => {
                // Sort keys by their textual rendering so emission order
                // never depends on how the literal was assembled.
                let mut pairs: Vec<&(Expression, Expression)> = pairs.iter().collect();
                pairs.sort_by_cached_key(|pair| pair.0.to_string());

                for (key, value) in pairs.iter() {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2])?;
            }

            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[])?;
            }

            Expression::Function { parameters, body } => {
                self.enter_scope();
                for parameter in parameters {
                    self.symbols.define(parameter);
                }

                self.compile_block(body)?;

                // A trailing Pop means the body ended in an expression
                // statement; its value becomes the implicit return.
                if self.last_emitted_is(Opcode::Pop) {
                    self.replace_last_pop_with_return()?;
                }
                if !self.last_emitted_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[])?;
                }

                let free_symbols = self.symbols.free_symbols().to_vec();
                let local_count = self.symbols.definition_count();
                let instructions = self.leave_scope();

                // Push the current value of every captured variable; the
                // Closure instruction collects them.
                for symbol in &free_symbols {
                    self.load_symbol(symbol)?;
                }

                let function = CompiledFunction {
                    instructions,
                    local_count,
                    param_count: parameters.len(),
                };
                let index = self.add_constant(Value::Function(Rc::new(function)))?;
                self.emit(Opcode::Closure, &[index, free_symbols.len()])?;
            }

            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()])?;
            }
        }
        Ok(())
    }

    // Helpers

    fn add_constant(&mut self, value: Value) -> Result<usize, CompileError> {
        if self.constants.len() >= CONSTANTS_LIMIT {
            return Err(CompileError::TooManyConstants(self.constants.len()));
        }
        self.constants.push(value);
        Ok(self.constants.len() - 1)
    }

    /// Encode an instruction, append it to the current scope, and return
    /// its byte position.
    fn emit(&mut self, op: Opcode, operands: &[usize]) -> Result<usize, CompileError> {
        let instruction = op::make(op, operands)?;
        let position = self.add_instruction(&instruction);
        self.set_emitted(op, position);
        Ok(position)
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let instructions = &mut self.scopes[self.current_scope].instructions;
        let position = instructions.len();
        instructions.extend_from_slice(instruction);
        position
    }

    fn set_emitted(&mut self, opcode: Opcode, position: usize) {
        let scope = &mut self.scopes[self.current_scope];
        scope.prev_emitted = scope.emitted;
        scope.emitted = Some(Emitted { opcode, position });
    }

    fn last_emitted_is(&self, opcode: Opcode) -> bool {
        self.scopes[self.current_scope]
            .emitted
            .map_or(false, |emitted| emitted.opcode == opcode)
    }

    /// Drop the last emitted instruction and restore the bookkeeping to
    /// the one before it.
    fn remove_last_pop(&mut self) {
        let scope = &mut self.scopes[self.current_scope];
        if let Some(emitted) = scope.emitted {
            scope.instructions.truncate(emitted.position);
            scope.emitted = scope.prev_emitted;
        }
    }

    /// Rewrite the trailing Pop of a function body into ReturnValue,
    /// in place.
    fn replace_last_pop_with_return(&mut self) -> Result<(), CompileError> {
        let position = match self.scopes[self.current_scope].emitted {
            Some(emitted) => emitted.position,
            None => return Ok(()),
        };

        let instruction = op::make(Opcode::ReturnValue, &[])?;
        self.change_instruction(position, &instruction);
        if let Some(emitted) = &mut self.scopes[self.current_scope].emitted {
            emitted.opcode = Opcode::ReturnValue;
        }
        Ok(())
    }

    fn change_instruction(&mut self, position: usize, instruction: &[u8]) {
        let instructions = &mut self.scopes[self.current_scope].instructions;
        instructions[position..position + instruction.len()].copy_from_slice(instruction);
    }

    /// Re-encode the instruction at `position` with a new operand;
    /// the only mutation of already-emitted bytes.
    fn change_operand(&mut self, position: usize, operand: usize) -> Result<(), CompileError> {
        let byte = self.current_instructions()[position];
        let opcode = Opcode::from_byte(byte).ok_or(OperationError::Undefined(byte))?;
        let instruction = op::make(opcode, &[operand])?;
        self.change_instruction(position, &instruction);
        Ok(())
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes[self.current_scope].instructions
    }

    fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
        self.current_scope += 1;
        self.symbols.enter_scope();
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().unwrap_or_default();
        self.current_scope = self.current_scope.saturating_sub(1);
        self.symbols.leave_scope();
        scope.instructions
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> Result<(), CompileError> {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index])?,
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index])?,
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index])?,
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index])?,
        };
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
