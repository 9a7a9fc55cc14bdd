//! Operation kind model.
//!
//! The closed set of dynamic operation categories a call site can perform,
//! together with the operators used by unary and binary operations. Every
//! component that branches on these types matches exhaustively.

use std::fmt;
use std::sync::Arc;

use crate::error::OperatorArityError;
use crate::signature::DelegateSignature;
use crate::value::{Name, Value, ValueKind};

// =============================================================================
// Operators
// =============================================================================

/// Operand count class of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// One operand.
    Unary,
    /// Two operands.
    Binary,
}

impl Arity {
    /// Number of operands.
    #[inline]
    pub const fn operand_count(self) -> usize {
        match self {
            Arity::Unary => 1,
            Arity::Binary => 2,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Unary => f.write_str("unary"),
            Arity::Binary => f.write_str("binary"),
        }
    }
}

/// Unary, binary and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Unary
    /// `not x`
    Not,
    /// `+x`
    Pos,
    /// `~x`
    Invert,
    /// `-x`
    Negate,

    // Binary
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b` (classic division: floors on integers)
    Divide,
    /// `a / b` (always produces a float)
    TrueDivide,
    /// `a % b`
    Modulo,
    /// `a & b`
    BitwiseAnd,
    /// `a | b`
    BitwiseOr,
    /// `a ^ b`
    BitwiseXor,
    /// `a << b`
    LeftShift,
    /// `a >> b`
    RightShift,
    /// `a ** b`
    Power,
    /// `a // b`
    FloorDivide,

    // Comparisons
    /// `a < b`
    LessThan,
    /// `a <= b`
    LessThanOrEqual,
    /// `a > b`
    GreaterThan,
    /// `a >= b`
    GreaterThanOrEqual,
    /// `a == b`
    Equal,
    /// `a != b`
    NotEqual,
    /// `a in b`
    In,
    /// `a not in b`
    NotIn,
    /// `a is b`
    Is,
    /// `a is not b`
    IsNot,
}

impl Operator {
    /// Every operator, unary first.
    pub const ALL: [Operator; 27] = [
        Operator::Not,
        Operator::Pos,
        Operator::Invert,
        Operator::Negate,
        Operator::Add,
        Operator::Subtract,
        Operator::Multiply,
        Operator::Divide,
        Operator::TrueDivide,
        Operator::Modulo,
        Operator::BitwiseAnd,
        Operator::BitwiseOr,
        Operator::BitwiseXor,
        Operator::LeftShift,
        Operator::RightShift,
        Operator::Power,
        Operator::FloorDivide,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::Equal,
        Operator::NotEqual,
        Operator::In,
        Operator::NotIn,
        Operator::Is,
        Operator::IsNot,
    ];

    /// The single arity class this operator belongs to.
    pub const fn arity(self) -> Arity {
        match self {
            Operator::Not | Operator::Pos | Operator::Invert | Operator::Negate => Arity::Unary,
            Operator::Add
            | Operator::Subtract
            | Operator::Multiply
            | Operator::Divide
            | Operator::TrueDivide
            | Operator::Modulo
            | Operator::BitwiseAnd
            | Operator::BitwiseOr
            | Operator::BitwiseXor
            | Operator::LeftShift
            | Operator::RightShift
            | Operator::Power
            | Operator::FloorDivide
            | Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::Equal
            | Operator::NotEqual
            | Operator::In
            | Operator::NotIn
            | Operator::Is
            | Operator::IsNot => Arity::Binary,
        }
    }

    /// Whether the operator is an ordering, equality, membership or identity test.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::LessThan
                | Operator::LessThanOrEqual
                | Operator::GreaterThan
                | Operator::GreaterThanOrEqual
                | Operator::Equal
                | Operator::NotEqual
                | Operator::In
                | Operator::NotIn
                | Operator::Is
                | Operator::IsNot
        )
    }

    /// Source-level spelling.
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Not => "not",
            Operator::Pos => "+",
            Operator::Invert => "~",
            Operator::Negate => "-",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::TrueDivide => "/",
            Operator::Modulo => "%",
            Operator::BitwiseAnd => "&",
            Operator::BitwiseOr => "|",
            Operator::BitwiseXor => "^",
            Operator::LeftShift => "<<",
            Operator::RightShift => ">>",
            Operator::Power => "**",
            Operator::FloorDivide => "//",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Is => "is",
            Operator::IsNot => "is not",
        }
    }

    /// Name of the method a script class defines to overload this operator.
    ///
    /// `not`, `not in`, `is` and `is not` can't be overloaded.
    pub const fn protocol_method(self) -> Option<&'static str> {
        match self {
            Operator::Not | Operator::NotIn | Operator::Is | Operator::IsNot => None,
            Operator::Pos => Some("__pos__"),
            Operator::Invert => Some("__invert__"),
            Operator::Negate => Some("__neg__"),
            Operator::Add => Some("__add__"),
            Operator::Subtract => Some("__sub__"),
            Operator::Multiply => Some("__mul__"),
            Operator::Divide => Some("__div__"),
            Operator::TrueDivide => Some("__truediv__"),
            Operator::Modulo => Some("__mod__"),
            Operator::BitwiseAnd => Some("__and__"),
            Operator::BitwiseOr => Some("__or__"),
            Operator::BitwiseXor => Some("__xor__"),
            Operator::LeftShift => Some("__lshift__"),
            Operator::RightShift => Some("__rshift__"),
            Operator::Power => Some("__pow__"),
            Operator::FloorDivide => Some("__floordiv__"),
            Operator::LessThan => Some("__lt__"),
            Operator::LessThanOrEqual => Some("__le__"),
            Operator::GreaterThan => Some("__gt__"),
            Operator::GreaterThanOrEqual => Some("__ge__"),
            Operator::Equal => Some("__eq__"),
            Operator::NotEqual => Some("__ne__"),
            Operator::In => Some("__contains__"),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// Conversion Targets
// =============================================================================

/// Target of a conversion operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConvertTarget {
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `str`
    Str,
    /// `list`
    List,
    /// `tuple`
    Tuple,
    /// A fixed-signature delegate for calling the value from static code.
    Delegate(DelegateSignature),
}

impl ConvertTarget {
    /// Whether `value` already satisfies the target without conversion.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ConvertTarget::Bool => value.kind() == ValueKind::Bool,
            ConvertTarget::Int => value.kind() == ValueKind::Int,
            ConvertTarget::Float => value.kind() == ValueKind::Float,
            ConvertTarget::Str => value.kind() == ValueKind::Str,
            ConvertTarget::List => value.kind() == ValueKind::List,
            ConvertTarget::Tuple => value.kind() == ValueKind::Tuple,
            ConvertTarget::Delegate(signature) => match value {
                Value::Function(function) => function.signature() == Some(signature),
                _ => false,
            },
        }
    }
}

impl fmt::Display for ConvertTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertTarget::Bool => f.write_str("bool"),
            ConvertTarget::Int => f.write_str("int"),
            ConvertTarget::Float => f.write_str("float"),
            ConvertTarget::Str => f.write_str("str"),
            ConvertTarget::List => f.write_str("list"),
            ConvertTarget::Tuple => f.write_str("tuple"),
            ConvertTarget::Delegate(signature) => write!(f, "delegate {}", signature),
        }
    }
}

// =============================================================================
// Legacy Named Operations
// =============================================================================

/// Operations still addressed by text name.
///
/// Known names redirect onto typed operation kinds; anything else is routed
/// to the language's generic operator protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LegacyOperation {
    /// `GetItem`: `[receiver, index...]`, redirected to [`OperationKind::GetIndex`].
    GetItem,
    /// `SetItem`: `[receiver, index..., value]`, redirected to [`OperationKind::SetIndex`].
    SetItem,
    /// Any other name.
    Other(Name),
}

impl LegacyOperation {
    /// Look up a legacy operation by name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "GetItem" => LegacyOperation::GetItem,
            "SetItem" => LegacyOperation::SetItem,
            other => LegacyOperation::Other(Arc::from(other)),
        }
    }

    /// Operation name.
    pub fn name(&self) -> &str {
        match self {
            LegacyOperation::GetItem => "GetItem",
            LegacyOperation::SetItem => "SetItem",
            LegacyOperation::Other(name) => name,
        }
    }

    /// The typed kind this operation redirects to for a site with `argc`
    /// arguments (receiver included).
    ///
    /// Returns `None` for unknown names and for argument lists too short to
    /// carry a receiver (and, for `SetItem`, a value).
    pub fn redirect(&self, argc: usize) -> Option<OperationKind> {
        match self {
            LegacyOperation::GetItem => argc
                .checked_sub(1)
                .map(|indexes| OperationKind::GetIndex { argc: indexes }),
            LegacyOperation::SetItem => argc
                .checked_sub(2)
                .map(|indexes| OperationKind::SetIndex { argc: indexes }),
            LegacyOperation::Other(_) => None,
        }
    }
}

// =============================================================================
// Operation Kinds
// =============================================================================

/// Fieldless tag of an [`OperationKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCategory {
    /// Member read.
    GetMember,
    /// Member write.
    SetMember,
    /// Member removal.
    DeleteMember,
    /// Call of the receiver.
    Invoke,
    /// Call of a member of the receiver.
    InvokeMember,
    /// Construction through the receiver.
    CreateInstance,
    /// Conversion.
    Convert,
    /// Unary operator.
    UnaryOperation,
    /// Binary operator.
    BinaryOperation,
    /// Index read.
    GetIndex,
    /// Index write.
    SetIndex,
    /// Legacy named operation.
    Named,
}

impl OperationCategory {
    /// Number of categories.
    pub const COUNT: usize = 12;

    /// Every category, in declaration order.
    pub const ALL: [OperationCategory; Self::COUNT] = [
        OperationCategory::GetMember,
        OperationCategory::SetMember,
        OperationCategory::DeleteMember,
        OperationCategory::Invoke,
        OperationCategory::InvokeMember,
        OperationCategory::CreateInstance,
        OperationCategory::Convert,
        OperationCategory::UnaryOperation,
        OperationCategory::BinaryOperation,
        OperationCategory::GetIndex,
        OperationCategory::SetIndex,
        OperationCategory::Named,
    ];

    /// Dense index, usable for per-category tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A dynamic operation performed by a call site.
///
/// Member kinds carry the member name and case-sensitivity flag, call kinds
/// the number of arguments after the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// `receiver.name`
    GetMember {
        /// Member name.
        name: Name,
        /// Case-insensitive lookup.
        ignore_case: bool,
    },
    /// `receiver.name = value`
    SetMember {
        /// Member name.
        name: Name,
        /// Case-insensitive lookup.
        ignore_case: bool,
    },
    /// `del receiver.name`
    DeleteMember {
        /// Member name.
        name: Name,
        /// Case-insensitive lookup.
        ignore_case: bool,
    },
    /// `receiver(args...)`
    Invoke {
        /// Argument count after the receiver.
        argc: usize,
    },
    /// `receiver.name(args...)`
    InvokeMember {
        /// Member name.
        name: Name,
        /// Case-insensitive lookup.
        ignore_case: bool,
        /// Argument count after the receiver.
        argc: usize,
    },
    /// `new receiver(args...)`
    CreateInstance {
        /// Argument count after the receiver.
        argc: usize,
    },
    /// Conversion of the receiver.
    Convert {
        /// Target type.
        target: ConvertTarget,
        /// Explicit cast (allows lossy conversions).
        explicit: bool,
    },
    /// Unary operator applied to the receiver.
    UnaryOperation(Operator),
    /// Binary operator applied to the receiver and one operand.
    BinaryOperation(Operator),
    /// `receiver[indexes...]`
    GetIndex {
        /// Index count.
        argc: usize,
    },
    /// `receiver[indexes...] = value`
    SetIndex {
        /// Index count.
        argc: usize,
    },
    /// Legacy text-named operation.
    Named(LegacyOperation),
}

impl OperationKind {
    /// Case-sensitive member read.
    pub fn get_member(name: &str) -> Self {
        OperationKind::GetMember {
            name: Arc::from(name),
            ignore_case: false,
        }
    }

    /// Case-sensitive member write.
    pub fn set_member(name: &str) -> Self {
        OperationKind::SetMember {
            name: Arc::from(name),
            ignore_case: false,
        }
    }

    /// Case-sensitive member removal.
    pub fn delete_member(name: &str) -> Self {
        OperationKind::DeleteMember {
            name: Arc::from(name),
            ignore_case: false,
        }
    }

    /// Call with `argc` arguments.
    pub fn invoke(argc: usize) -> Self {
        OperationKind::Invoke { argc }
    }

    /// Case-sensitive member call with `argc` arguments.
    pub fn invoke_member(name: &str, argc: usize) -> Self {
        OperationKind::InvokeMember {
            name: Arc::from(name),
            ignore_case: false,
            argc,
        }
    }

    /// Construction with `argc` arguments.
    pub fn create_instance(argc: usize) -> Self {
        OperationKind::CreateInstance { argc }
    }

    /// Conversion to `target`.
    pub fn convert(target: ConvertTarget, explicit: bool) -> Self {
        OperationKind::Convert { target, explicit }
    }

    /// Unary operation; rejects operators of another arity class.
    pub fn unary(operator: Operator) -> Result<Self, OperatorArityError> {
        match operator.arity() {
            Arity::Unary => Ok(OperationKind::UnaryOperation(operator)),
            Arity::Binary => Err(OperatorArityError {
                operator,
                expected: Arity::Unary,
            }),
        }
    }

    /// Binary operation; rejects operators of another arity class.
    pub fn binary(operator: Operator) -> Result<Self, OperatorArityError> {
        match operator.arity() {
            Arity::Binary => Ok(OperationKind::BinaryOperation(operator)),
            Arity::Unary => Err(OperatorArityError {
                operator,
                expected: Arity::Binary,
            }),
        }
    }

    /// Index read with `argc` indexes.
    pub fn get_index(argc: usize) -> Self {
        OperationKind::GetIndex { argc }
    }

    /// Index write with `argc` indexes.
    pub fn set_index(argc: usize) -> Self {
        OperationKind::SetIndex { argc }
    }

    /// Legacy named operation.
    pub fn named(name: &str) -> Self {
        OperationKind::Named(LegacyOperation::from_name(name))
    }

    /// Category tag.
    pub fn category(&self) -> OperationCategory {
        match self {
            OperationKind::GetMember { .. } => OperationCategory::GetMember,
            OperationKind::SetMember { .. } => OperationCategory::SetMember,
            OperationKind::DeleteMember { .. } => OperationCategory::DeleteMember,
            OperationKind::Invoke { .. } => OperationCategory::Invoke,
            OperationKind::InvokeMember { .. } => OperationCategory::InvokeMember,
            OperationKind::CreateInstance { .. } => OperationCategory::CreateInstance,
            OperationKind::Convert { .. } => OperationCategory::Convert,
            OperationKind::UnaryOperation(_) => OperationCategory::UnaryOperation,
            OperationKind::BinaryOperation(_) => OperationCategory::BinaryOperation,
            OperationKind::GetIndex { .. } => OperationCategory::GetIndex,
            OperationKind::SetIndex { .. } => OperationCategory::SetIndex,
            OperationKind::Named(_) => OperationCategory::Named,
        }
    }

    /// Number of site arguments, receiver included.
    ///
    /// Legacy named operations have no fixed arity.
    pub fn site_arity(&self) -> Option<usize> {
        match self {
            OperationKind::GetMember { .. }
            | OperationKind::DeleteMember { .. }
            | OperationKind::Convert { .. }
            | OperationKind::UnaryOperation(_) => Some(1),
            OperationKind::SetMember { .. } | OperationKind::BinaryOperation(_) => Some(2),
            OperationKind::Invoke { argc }
            | OperationKind::InvokeMember { argc, .. }
            | OperationKind::CreateInstance { argc }
            | OperationKind::GetIndex { argc } => Some(argc + 1),
            OperationKind::SetIndex { argc } => Some(argc + 2),
            OperationKind::Named(_) => None,
        }
    }

    /// Member name of member kinds.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            OperationKind::GetMember { name, .. }
            | OperationKind::SetMember { name, .. }
            | OperationKind::DeleteMember { name, .. }
            | OperationKind::InvokeMember { name, .. } => Some(name),
            OperationKind::Invoke { .. }
            | OperationKind::CreateInstance { .. }
            | OperationKind::Convert { .. }
            | OperationKind::UnaryOperation(_)
            | OperationKind::BinaryOperation(_)
            | OperationKind::GetIndex { .. }
            | OperationKind::SetIndex { .. }
            | OperationKind::Named(_) => None,
        }
    }

    /// Checks that operator kinds carry an operator of the matching arity.
    pub fn check_operator(&self) -> Result<(), OperatorArityError> {
        match self {
            OperationKind::UnaryOperation(operator) => Self::unary(*operator).map(drop),
            OperationKind::BinaryOperation(operator) => Self::binary(*operator).map(drop),
            OperationKind::GetMember { .. }
            | OperationKind::SetMember { .. }
            | OperationKind::DeleteMember { .. }
            | OperationKind::Invoke { .. }
            | OperationKind::InvokeMember { .. }
            | OperationKind::CreateInstance { .. }
            | OperationKind::Convert { .. }
            | OperationKind::GetIndex { .. }
            | OperationKind::SetIndex { .. }
            | OperationKind::Named(_) => Ok(()),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::GetMember { name, .. } => write!(f, "member read '{}'", name),
            OperationKind::SetMember { name, .. } => write!(f, "member assignment '{}'", name),
            OperationKind::DeleteMember { name, .. } => write!(f, "member deletion '{}'", name),
            OperationKind::Invoke { argc } => write!(f, "invocation with {} arguments", argc),
            OperationKind::InvokeMember { name, argc, .. } => {
                write!(f, "method call '{}' with {} arguments", name, argc)
            }
            OperationKind::CreateInstance { argc } => {
                write!(f, "instantiation with {} arguments", argc)
            }
            OperationKind::Convert { target, .. } => write!(f, "conversion to {}", target),
            OperationKind::UnaryOperation(operator) => write!(f, "unary '{}'", operator),
            OperationKind::BinaryOperation(operator) => write!(f, "operator '{}'", operator),
            OperationKind::GetIndex { .. } => f.write_str("indexing"),
            OperationKind::SetIndex { .. } => f.write_str("index assignment"),
            OperationKind::Named(operation) => write!(f, "operation '{}'", operation.name()),
        }
    }
}

/// Member name comparison honoring the case-sensitivity flag.
#[inline]
pub fn names_match(name: &str, candidate: &str, ignore_case: bool) -> bool {
    if ignore_case {
        name.eq_ignore_ascii_case(candidate)
    } else {
        name == candidate
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Shape;

    #[test]
    fn test_operator_arity_classes() {
        let unary: Vec<_> = Operator::ALL
            .iter()
            .filter(|op| op.arity() == Arity::Unary)
            .collect();
        assert_eq!(unary.len(), 4);
        assert_eq!(Operator::ALL.len() - unary.len(), 23);
        assert_eq!(Operator::Power.arity().operand_count(), 2);
    }

    #[test]
    fn test_unary_rejects_binary_operator() {
        assert!(OperationKind::unary(Operator::Negate).is_ok());
        let err = OperationKind::unary(Operator::Add).unwrap_err();
        assert_eq!(err.expected, Arity::Unary);
        assert!(OperationKind::binary(Operator::Not).is_err());
        assert!(OperationKind::BinaryOperation(Operator::Invert).check_operator().is_err());
    }

    #[test]
    fn test_every_operator_has_one_arity_constructor() {
        for op in Operator::ALL {
            let unary = OperationKind::unary(op).is_ok();
            let binary = OperationKind::binary(op).is_ok();
            assert!(unary ^ binary, "{:?}", op);
        }
    }

    #[test]
    fn test_site_arity() {
        assert_eq!(OperationKind::get_member("x").site_arity(), Some(1));
        assert_eq!(OperationKind::set_member("x").site_arity(), Some(2));
        assert_eq!(OperationKind::invoke(3).site_arity(), Some(4));
        assert_eq!(OperationKind::set_index(1).site_arity(), Some(3));
        assert_eq!(OperationKind::named("GetItem").site_arity(), None);
    }

    #[test]
    fn test_category_indexes_are_dense() {
        for (i, category) in OperationCategory::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_legacy_redirection_table() {
        assert_eq!(LegacyOperation::from_name("GetItem"), LegacyOperation::GetItem);
        assert_eq!(
            LegacyOperation::GetItem.redirect(2),
            Some(OperationKind::GetIndex { argc: 1 })
        );
        assert_eq!(
            LegacyOperation::SetItem.redirect(3),
            Some(OperationKind::SetIndex { argc: 1 })
        );
        assert_eq!(LegacyOperation::SetItem.redirect(1), None);
        assert_eq!(LegacyOperation::from_name("Length").redirect(1), None);
        assert_eq!(LegacyOperation::from_name("Length").name(), "Length");
    }

    #[test]
    fn test_member_kinds_compare_name_and_case_flag() {
        let a = OperationKind::get_member("x");
        let b = OperationKind::GetMember {
            name: Arc::from("x"),
            ignore_case: true,
        };
        assert_ne!(a, b);
        assert_eq!(a, OperationKind::get_member("x"));
        assert_ne!(a, OperationKind::get_member("X"));
    }

    #[test]
    fn test_convert_target_accepts() {
        assert!(ConvertTarget::Int.accepts(&Value::Int(3)));
        assert!(!ConvertTarget::Int.accepts(&Value::Bool(true)));
        let sig = DelegateSignature::new(Shape::Any, []);
        assert!(!ConvertTarget::Delegate(sig).accepts(&Value::Int(1)));
    }

    #[test]
    fn test_names_match() {
        assert!(names_match("Foo", "foo", true));
        assert!(!names_match("Foo", "foo", false));
    }

    #[test]
    fn test_protocol_methods() {
        assert_eq!(Operator::Add.protocol_method(), Some("__add__"));
        assert_eq!(Operator::In.protocol_method(), Some("__contains__"));
        assert_eq!(Operator::Is.protocol_method(), None);
    }
}
