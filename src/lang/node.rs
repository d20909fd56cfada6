use std::fmt;

/// Abstract Syntax Tree consumed by the bytecode compiler.
///
/// The parser produces these nodes; the compiler walks them and emits
/// instructions. Hash literal keys are ordered by their textual rendering
/// during compilation, so every expression carries a `Display` impl that
/// reproduces the source-level spelling.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Program { statements }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

/// A single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let <name> = <value>;`
    Let { name: String, value: Expression },

    /// `return <value>;`
    Return(Expression),

    /// An expression in statement position; its value is discarded.
    Expression(Expression),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {} = {};", name, value),
            Statement::Return(value) => write!(f, "return {};", value),
            Statement::Expression(value) => write!(f, "{}", value),
        }
    }
}

/// A braced sequence of statements (function body, if-branch).
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

impl BlockStatement {
    pub fn new(statements: Vec<Statement>) -> Self {
        BlockStatement { statements }
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

/// A single expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Integer literal: `5`
    Integer(i64),

    /// String literal: `"ape"`
    Str(String),

    /// Boolean literal: `true` / `false`
    Boolean(bool),

    /// A name to be resolved against the symbol table.
    Identifier(String),

    /// `<operator><right>`, e.g. `!ok`, `-1`
    Prefix {
        operator: String,
        right: Box<Expression>,
    },

    /// `<left> <operator> <right>`, e.g. `1 + 2`
    Infix {
        operator: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// `if (<condition>) { <consequent> } else { <alternate> }`
    If {
        condition: Box<Expression>,
        consequent: BlockStatement,
        alternate: Option<BlockStatement>,
    },

    /// `fn(<parameters>) { <body> }`
    Function {
        parameters: Vec<String>,
        body: BlockStatement,
    },

    /// `<function>(<arguments>)`
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },

    /// `[<elements>]`
    Array(Vec<Expression>),

    /// `{<key>: <value>, ...}`
    ///
    /// Pairs keep their source order here; the compiler sorts keys by
    /// textual rendering before emission.
    Hash(Vec<(Expression, Expression)>),

    /// `<left>[<index>]`
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

impl Expression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Str(value.into())
    }

    pub fn prefix(operator: impl Into<String>, right: Expression) -> Self {
        Expression::Prefix {
            operator: operator.into(),
            right: Box::new(right),
        }
    }

    pub fn infix(operator: impl Into<String>, left: Expression, right: Expression) -> Self {
        Expression::Infix {
            operator: operator.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn if_else(
        condition: Expression,
        consequent: BlockStatement,
        alternate: Option<BlockStatement>,
    ) -> Self {
        Expression::If {
            condition: Box::new(condition),
            consequent,
            alternate,
        }
    }

    pub fn call(function: Expression, arguments: Vec<Expression>) -> Self {
        Expression::Call {
            function: Box::new(function),
            arguments,
        }
    }

    pub fn index(left: Expression, index: Expression) -> Self {
        Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Integer(value) => write!(f, "{}", value),
            Expression::Str(value) => write!(f, "{}", value),
            Expression::Boolean(value) => write!(f, "{}", value),
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expression::Infix {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::If {
                condition,
                consequent,
                alternate,
            } => {
                write!(f, "if{} {}", condition, consequent)?;
                if let Some(alternate) = alternate {
                    write!(f, "else {}", alternate)?;
                }
                Ok(())
            }
            Expression::Function { parameters, body } => {
                write!(f, "fn({}) {}", parameters.join(", "), body)
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let arguments: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, arguments.join(", "))
            }
            Expression::Array(elements) => {
                let elements: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Expression::Hash(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, v))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_let_statement() {
        let statement = Statement::Let {
            name: "myVar".to_string(),
            value: Expression::identifier("anotherVar"),
        };
        assert_eq!(statement.to_string(), "let myVar = anotherVar;");
    }

    #[test]
    fn test_display_infix_parenthesizes() {
        let expression = Expression::infix(
            "+",
            Expression::Integer(1),
            Expression::infix("*", Expression::Integer(2), Expression::Integer(3)),
        );
        assert_eq!(expression.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(
            Expression::prefix("-", Expression::Integer(5)).to_string(),
            "(-5)"
        );
        assert_eq!(
            Expression::prefix("!", Expression::Boolean(true)).to_string(),
            "(!true)"
        );
    }

    #[test]
    fn test_display_index_and_call() {
        let expression = Expression::index(
            Expression::Array(vec![Expression::Integer(1), Expression::Integer(2)]),
            Expression::Integer(0),
        );
        assert_eq!(expression.to_string(), "([1, 2][0])");

        let call = Expression::call(
            Expression::identifier("add"),
            vec![Expression::Integer(1), Expression::Integer(2)],
        );
        assert_eq!(call.to_string(), "add(1, 2)");
    }

    #[test]
    fn test_display_keeps_hash_pairs_as_written() {
        let hash = Expression::Hash(vec![
            (Expression::string("b"), Expression::Integer(1)),
            (Expression::string("a"), Expression::Integer(2)),
        ]);
        assert_eq!(hash.to_string(), "{b:1, a:2}");
    }

    #[test]
    fn test_display_function_literal() {
        let function = Expression::Function {
            parameters: vec!["x".to_string(), "y".to_string()],
            body: BlockStatement::new(vec![Statement::Expression(Expression::infix(
                "+",
                Expression::identifier("x"),
                Expression::identifier("y"),
            ))]),
        };
        assert_eq!(function.to_string(), "fn(x, y) (x + y)");
    }
}
