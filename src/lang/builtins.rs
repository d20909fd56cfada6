use crate::lang::value::Value;
use crate::runtime::runtime_error::RuntimeError;

/// Host function behind a `Builtin` value.
///
/// Takes the call arguments and returns an optional result; builtins that
/// produce nothing (like `puts`) leave the VM to push `null` in their place.
pub type BuiltinFn = fn(&[Value]) -> Result<Option<Value>, RuntimeError>;

/// A named host function.
#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// The builtin registry, in registration order.
///
/// The compiler defines these names at construction; their positions here
/// are the operands of `GetBuiltin`.
pub fn all() -> &'static [Builtin] {
    &BUILTINS
}

static BUILTINS: [Builtin; 6] = [
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

fn expect_arity(args: &[Value], want: usize) -> Result<(), RuntimeError> {
    if args.len() != want {
        return Err(RuntimeError::BuiltinArity {
            got: args.len(),
            want,
        });
    }
    Ok(())
}

fn builtin_len(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Str(value) => Ok(Some(Value::Integer(value.len() as i64))),
        Value::Array(elements) => Ok(Some(Value::Integer(elements.len() as i64))),
        other => Err(RuntimeError::BuiltinArgument {
            builtin: "len",
            got: other.type_name(),
        }),
    }
}

fn builtin_puts(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    for arg in args {
        println!("{}", arg);
    }
    Ok(None)
}

fn builtin_first(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(Some(elements.first().cloned().unwrap_or(Value::Null))),
        other => Err(RuntimeError::BuiltinArrayArgument {
            builtin: "first",
            got: other.type_name(),
        }),
    }
}

fn builtin_last(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(Some(elements.last().cloned().unwrap_or(Value::Null))),
        other => Err(RuntimeError::BuiltinArrayArgument {
            builtin: "last",
            got: other.type_name(),
        }),
    }
}

fn builtin_rest(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                Ok(Some(Value::Null))
            } else {
                Ok(Some(Value::Array(elements[1..].to_vec())))
            }
        }
        other => Err(RuntimeError::BuiltinArrayArgument {
            builtin: "rest",
            got: other.type_name(),
        }),
    }
}

fn builtin_push(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity(args, 2)?;
    match &args[0] {
        Value::Array(elements) => {
            let mut extended = elements.clone();
            extended.push(args[1].clone());
            Ok(Some(Value::Array(extended)))
        }
        other => Err(RuntimeError::BuiltinArrayArgument {
            builtin: "push",
            got: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
        let builtin = all()
            .iter()
            .find(|b| b.name == name)
            .expect("builtin should be registered");
        (builtin.func)(args)
    }

    #[test]
    fn test_registration_order_is_stable() {
        let names: Vec<&str> = all().iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["len", "puts", "first", "last", "rest", "push"]);
    }

    #[test]
    fn test_len() {
        assert_eq!(
            call("len", &[Value::Str("".to_string())]).unwrap(),
            Some(Value::Integer(0))
        );
        assert_eq!(
            call("len", &[Value::Str("four".to_string())]).unwrap(),
            Some(Value::Integer(4))
        );
        assert_eq!(
            call("len", &[Value::Array(vec![Value::Integer(1), Value::Integer(2)])]).unwrap(),
            Some(Value::Integer(2))
        );
    }

    #[test]
    fn test_len_rejects_unsupported_argument() {
        let err = call("len", &[Value::Integer(1)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument to `len` not supported, got INTEGER"
        );
    }

    #[test]
    fn test_wrong_argument_count() {
        let err = call("len", &[Value::Integer(1), Value::Integer(2)]).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments. got=2, want=1");

        let err = call("push", &[Value::Array(vec![])]).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments. got=1, want=2");
    }

    #[test]
    fn test_first_last_rest() {
        let array = Value::Array(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);

        assert_eq!(
            call("first", &[array.clone()]).unwrap(),
            Some(Value::Integer(1))
        );
        assert_eq!(
            call("last", &[array.clone()]).unwrap(),
            Some(Value::Integer(3))
        );
        assert_eq!(
            call("rest", &[array]).unwrap(),
            Some(Value::Array(vec![Value::Integer(2), Value::Integer(3)]))
        );
    }

    #[test]
    fn test_first_last_rest_on_empty_array() {
        let empty = Value::Array(vec![]);
        assert_eq!(call("first", &[empty.clone()]).unwrap(), Some(Value::Null));
        assert_eq!(call("last", &[empty.clone()]).unwrap(), Some(Value::Null));
        assert_eq!(call("rest", &[empty]).unwrap(), Some(Value::Null));
    }

    #[test]
    fn test_array_builtins_reject_non_arrays() {
        let err = call("first", &[Value::Integer(1)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument to `first` must be ARRAY, got INTEGER"
        );
    }

    #[test]
    fn test_push_does_not_mutate_its_argument() {
        let original = Value::Array(vec![Value::Integer(1)]);
        let pushed = call("push", &[original.clone(), Value::Integer(2)]).unwrap();

        assert_eq!(original, Value::Array(vec![Value::Integer(1)]));
        assert_eq!(
            pushed,
            Some(Value::Array(vec![Value::Integer(1), Value::Integer(2)]))
        );
    }

    #[test]
    fn test_puts_returns_nothing() {
        assert_eq!(call("puts", &[]).unwrap(), None);
    }
}
