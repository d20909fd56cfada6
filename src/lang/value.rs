use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::op::Instructions;
use crate::lang::builtins::Builtin;
use crate::runtime::runtime_error::RuntimeError;

/// Runtime value in the Ape language.
///
/// Values live on the VM stack, in the globals array, and in the constant
/// pool. Containers own their elements; function values share their
/// compiled code through `Rc` so closures stay cheap to copy.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),

    /// Boolean value.
    Boolean(bool),

    /// UTF-8 string value.
    Str(String),

    /// The absence of a value.
    Null,

    /// Ordered sequence of values: `[1, "two", true]`.
    Array(Vec<Value>),

    /// Mapping from hashable values to values: `{"a": 1}`.
    Hash(HashMap<HashKey, Value>),

    /// A compiled function produced by the compiler and stored in the
    /// constant pool.
    Function(Rc<CompiledFunction>),

    /// A compiled function paired with the values of its free variables
    /// at the moment of creation.
    Closure(Rc<Closure>),

    /// A host-provided builtin function.
    Builtin(&'static Builtin),
}

impl Value {
    /// Stable type tag used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Str(_) => "STRING",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
        }
    }
}

impl fmt::Display for Value {
    /// Format a value using Ape surface syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                let elements: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Value::Hash(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Value::Function(function) => {
                write!(f, "CompiledFunction[{} bytes]", function.instructions.len())
            }
            Value::Closure(closure) => {
                write!(f, "Closure[{} captured]", closure.free.len())
            }
            Value::Builtin(builtin) => write!(f, "builtin function {}", builtin.name),
        }
    }
}

/// The subset of values usable as hash keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    Str(String),
}

impl TryFrom<&Value> for HashKey {
    type Error = RuntimeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(value) => Ok(HashKey::Integer(*value)),
            Value::Boolean(value) => Ok(HashKey::Boolean(*value)),
            Value::Str(value) => Ok(HashKey::Str(value.clone())),
            other => Err(RuntimeError::UnusableHashKey(other.type_name())),
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Integer(value) => write!(f, "{}", value),
            HashKey::Boolean(value) => write!(f, "{}", value),
            HashKey::Str(value) => write!(f, "{}", value),
        }
    }
}

/// An instruction block together with the stack shape of one call.
///
/// `local_count` covers parameters plus let-bindings; the VM reserves that
/// many stack slots above the frame pointer on entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub local_count: usize,
    pub param_count: usize,
}

/// A compiled function plus the captured values of its free variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Integer(1).type_name(), "INTEGER");
        assert_eq!(Value::Boolean(true).type_name(), "BOOLEAN");
        assert_eq!(Value::Str("a".to_string()).type_name(), "STRING");
        assert_eq!(Value::Null.type_name(), "NULL");
        assert_eq!(Value::Array(vec![]).type_name(), "ARRAY");
        assert_eq!(Value::Hash(HashMap::new()).type_name(), "HASH");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(-7).to_string(), "-7");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::Str("two".to_string())]).to_string(),
            "[1, two]"
        );
    }

    #[test]
    fn test_hash_keys_with_equal_content_are_equal() {
        let first = HashKey::try_from(&Value::Str("name".to_string())).unwrap();
        let second = HashKey::try_from(&Value::Str("name".to_string())).unwrap();
        assert_eq!(first, second);

        let mut pairs = HashMap::new();
        pairs.insert(first, Value::Integer(1));
        assert_eq!(pairs.get(&second), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_unhashable_values_are_rejected() {
        let err = HashKey::try_from(&Value::Array(vec![])).unwrap_err();
        assert_eq!(err.to_string(), "unusable as hash key: ARRAY");

        let err = HashKey::try_from(&Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "unusable as hash key: NULL");
    }
}
