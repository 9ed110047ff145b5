//! Instruction operands: literals, SSA variables and block labels.

use std::{fmt, sync::Arc};

use primitive_types::U256;

/// An SSA variable name, printed as `%name`.
///
/// Names are reference counted so cloning a variable into analysis tables is cheap.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(Arc<str>);

impl Variable {
    /// Creates a variable; a leading `%` is stripped if present.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Variable(Arc::from(name.strip_prefix('%').unwrap_or(name)))
    }

    /// The name without the `%` sigil.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A reference to a basic block by name, printed as `@name`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(Arc<str>);

impl Label {
    /// Creates a label; a leading `@` is stripped if present.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Label(Arc::from(name.strip_prefix('@').unwrap_or(name)))
    }

    /// The name without the `@` sigil.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A single instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A 256-bit constant
    Literal(U256),
    /// An SSA variable
    Variable(Variable),
    /// A block reference
    Label(Label),
}

impl Operand {
    /// Shorthand for a literal operand.
    #[must_use]
    pub fn literal(value: impl Into<U256>) -> Self {
        Operand::Literal(value.into())
    }

    /// Shorthand for a variable operand.
    #[must_use]
    pub fn var(name: &str) -> Self {
        Operand::Variable(Variable::new(name))
    }

    /// Shorthand for a label operand.
    #[must_use]
    pub fn label(name: &str) -> Self {
        Operand::Label(Label::new(name))
    }

    /// Returns the literal value, if this is a literal.
    #[must_use]
    pub fn as_literal(&self) -> Option<U256> {
        match self {
            Operand::Literal(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the variable, if this is a variable.
    #[must_use]
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Operand::Variable(var) => Some(var),
            _ => None,
        }
    }

    /// Returns the label, if this is a label.
    #[must_use]
    pub fn as_label(&self) -> Option<&Label> {
        match self {
            Operand::Label(label) => Some(label),
            _ => None,
        }
    }
}

impl From<Variable> for Operand {
    fn from(var: Variable) -> Self {
        Operand::Variable(var)
    }
}

impl From<Label> for Operand {
    fn from(label: Label) -> Self {
        Operand::Label(label)
    }
}

impl From<U256> for Operand {
    fn from(value: U256) -> Self {
        Operand::Literal(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Small values read better in decimal; word-sized masks in hex
            Operand::Literal(value) if value.bits() <= 64 => write!(f, "{value}"),
            Operand::Literal(value) => write!(f, "{value:#x}"),
            Operand::Variable(var) => write!(f, "{var}"),
            Operand::Label(label) => write!(f, "{label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigils_are_stripped() {
        assert_eq!(Variable::new("%x"), Variable::new("x"));
        assert_eq!(Label::new("@entry").name(), "entry");
    }

    #[test]
    fn test_operand_display() {
        assert_eq!(Operand::literal(42u64).to_string(), "42");
        assert_eq!(Operand::Literal(U256::MAX).to_string(), format!("{:#x}", U256::MAX));
        assert_eq!(Operand::var("y").to_string(), "%y");
        assert_eq!(Operand::label("then").to_string(), "@then");
    }

    #[test]
    fn test_operand_accessors() {
        assert_eq!(Operand::literal(7u64).as_literal(), Some(U256::from(7)));
        assert!(Operand::var("a").as_literal().is_none());
        assert_eq!(Operand::var("a").as_variable(), Some(&Variable::new("a")));
        assert!(Operand::label("b").as_variable().is_none());
    }
}
