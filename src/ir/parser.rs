//! Parser for the textual IR format.
//!
//! ```text
//! function main {
//! entry:
//!     %x = 5
//!     %y = add %x, 7
//!     jnz %y, @then, @else
//! then:
//!     stop
//! else:
//!     revert 0, 0
//! }
//! ```
//!
//! Lines starting with `;` or `//` are comments. Literals are decimal, `0x`
//! hexadecimal, or a negative decimal that denotes its two's complement word.
//! `%x = <operand>` is shorthand for `%x = assign <operand>`.

use std::str::FromStr;

use primitive_types::U256;

use crate::{
    ir::{Function, FunctionBuilder, Instruction, Module, Opcode, Operand, Variable},
    Error, Result,
};

/// Parses a single function.
///
/// # Errors
///
/// Returns [`Error::Parse`] on syntax errors, [`Error::UnknownOpcode`] on
/// unknown mnemonics, or any error from [`Function::verify`]. Input holding
/// zero or several functions is a parse error.
pub fn parse_function(source: &str) -> Result<Function> {
    let mut module = parse_module(source)?;
    if module.functions.len() != 1 {
        return Err(Error::Parse {
            line: 1,
            message: format!("expected one function, found {}", module.functions.len()),
        });
    }
    Ok(module.functions.remove(0))
}

/// Parses a sequence of functions.
///
/// # Errors
///
/// See [`parse_function`].
pub fn parse_module(source: &str) -> Result<Module> {
    let mut module = Module::new();
    let mut current: Option<FunctionBuilder> = None;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with("//") {
            continue;
        }

        if let Some(header) = line.strip_prefix("function ") {
            if current.is_some() {
                return Err(parse_error(line_no, "nested function definition"));
            }
            let name = header.trim_end_matches('{').trim();
            if name.is_empty() || !header.trim_end().ends_with('{') {
                return Err(parse_error(line_no, "expected `function <name> {`"));
            }
            current = Some(FunctionBuilder::new(name));
            continue;
        }

        if line == "}" {
            let Some(builder) = current.take() else {
                return Err(parse_error(line_no, "unmatched `}`"));
            };
            module.functions.push(builder.build()?);
            continue;
        }

        let Some(builder) = current.as_mut() else {
            return Err(parse_error(line_no, "instruction outside of a function"));
        };

        if let Some(label) = line.strip_suffix(':') {
            if !is_identifier(label) {
                return Err(parse_error(line_no, format!("invalid block label `{label}`")));
            }
            builder.block(label)?;
            continue;
        }

        builder.push(parse_instruction(line, line_no)?);
    }

    if current.is_some() {
        return Err(parse_error(source.lines().count(), "missing closing `}`"));
    }
    Ok(module)
}

fn parse_instruction(line: &str, line_no: usize) -> Result<Instruction> {
    let (output, body) = match line.split_once('=') {
        Some((lhs, rhs)) => {
            let lhs = lhs.trim();
            let Some(name) = lhs.strip_prefix('%').filter(|n| is_identifier(n)) else {
                return Err(parse_error(line_no, format!("invalid output `{lhs}`")));
            };
            (Some(Variable::new(name)), rhs.trim())
        }
        None => (None, line),
    };

    let (head, rest) = match body.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (body, ""),
    };

    // `%x = 5` and `%x = %y` are assignments
    let is_value = head.starts_with('%')
        || head.starts_with('-')
        || head.starts_with(|c: char| c.is_ascii_digit());
    if output.is_some() && is_value {
        if !rest.is_empty() {
            return Err(parse_error(line_no, "unexpected tokens after assigned value"));
        }
        let value = parse_operand(head, line_no)?;
        return Ok(Instruction::new(Opcode::Assign, vec![value], output));
    }

    let opcode = Opcode::from_str(head).map_err(|_| Error::UnknownOpcode(head.to_string()))?;
    let operands = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',')
            .map(|token| parse_operand(token.trim(), line_no))
            .collect::<Result<Vec<_>>>()?
    };

    if output.is_some() && !opcode.produces_output() {
        return Err(parse_error(line_no, format!("`{opcode}` does not produce a value")));
    }
    Ok(Instruction::new(opcode, operands, output))
}

fn parse_operand(token: &str, line_no: usize) -> Result<Operand> {
    if let Some(name) = token.strip_prefix('%') {
        if is_identifier(name) {
            return Ok(Operand::var(name));
        }
    } else if let Some(name) = token.strip_prefix('@') {
        if is_identifier(name) {
            return Ok(Operand::label(name));
        }
    } else if let Some(hex) = token.strip_prefix("0x") {
        if let Ok(value) = U256::from_str_radix(hex, 16) {
            return Ok(Operand::Literal(value));
        }
    } else if let Some(magnitude) = token.strip_prefix('-') {
        if let Ok(value) = U256::from_dec_str(magnitude) {
            // Two's complement of the magnitude
            return Ok(Operand::Literal((!value).overflowing_add(U256::one()).0));
        }
    } else if let Ok(value) = U256::from_dec_str(token) {
        return Ok(Operand::Literal(value));
    }
    Err(parse_error(line_no, format!("invalid operand `{token}`")))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCHY: &str = "
function main {
entry:
    %x = 5
    %y = add %x, 7
    jnz %y, @then, @else
then:
    mstore 0, %y
    stop
else:
    ; unreachable in practice
    revert 0, 0
}
";

    #[test]
    fn test_parse_and_print_round_trip() {
        let func = parse_function(BRANCHY).unwrap();
        assert_eq!(func.name(), "main");
        assert_eq!(func.block_count(), 3);
        let printed = func.to_string();
        let reparsed = parse_function(&printed).unwrap();
        assert_eq!(reparsed.to_string(), printed);
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_operand("0xff", 1).unwrap(), Operand::literal(255u64));
        assert_eq!(parse_operand("-1", 1).unwrap(), Operand::Literal(U256::MAX));
        assert!(parse_operand("12abc", 1).is_err());
    }

    #[test]
    fn test_parse_assign_forms() {
        let inst = parse_instruction("%a = %b", 1).unwrap();
        assert_eq!(inst.opcode(), Opcode::Assign);
        assert_eq!(inst.operands(), &[Operand::var("b")]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_function("function f {\nentry:\n    %x = frob 1\n    stop\n}"),
            Err(Error::UnknownOpcode(name)) if name == "frob"
        ));
        assert!(matches!(
            parse_function("function f {\nentry:\n    stop\n"),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            parse_function("function f {\nentry:\n    %x = mstore 0, 1\n    stop\n}"),
            Err(Error::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_parse_module() {
        let module = parse_module("function a {\nentry:\n    stop\n}\nfunction b {\nentry:\n    ret\n}").unwrap();
        assert_eq!(module.functions.len(), 2);
        assert!(module.function("b").is_some());
    }
}
