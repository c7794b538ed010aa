use num_enum::TryFromPrimitive;
use std::fmt;

/// Type nibble of a tagged value.
///
/// The discriminants are the classical nibble values: 0 for a dotted pair,
/// 1 for the undefined marker, 8 and 9 for the two atom kinds, and 10..15
/// for the six callable kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Tag {
    /// Non-atomic S-expression, index into the list area
    Pair = 0,
    /// Value of a freshly interned atom, index of the atom itself
    Undef = 1,
    /// Ordinary atom, index into the atom table
    Atom = 8,
    /// Number atom, index into the number table
    Number = 9,
    /// Built-in function, index is the operator ordinal
    BuiltinFn = 10,
    /// Built-in special form, index is the operator ordinal
    BuiltinForm = 11,
    /// User-defined function seen through its naming atom
    UserFn = 12,
    /// User-defined special form seen through its naming atom
    UserForm = 13,
    /// Unnamed function, index of its `(params . body)` cell
    AnonFn = 14,
    /// Unnamed special form, index of its `(params . body)` cell
    AnonForm = 15,
}

impl Tag {
    /// An S-expression: a pair or either atom kind.
    #[must_use]
    pub fn is_sexp(self) -> bool {
        matches!(self, Tag::Pair | Tag::Atom | Tag::Number)
    }

    /// Anything applicable: tag above 9.
    #[must_use]
    pub fn is_callable(self) -> bool {
        self as u8 > 9
    }

    #[must_use]
    pub fn is_builtin(self) -> bool {
        matches!(self, Tag::BuiltinFn | Tag::BuiltinForm)
    }

    #[must_use]
    pub fn is_anon(self) -> bool {
        matches!(self, Tag::AnonFn | Tag::AnonForm)
    }

    /// A function as opposed to a special form: arguments get evaluated.
    #[must_use]
    pub fn is_fn(self) -> bool {
        matches!(self, Tag::BuiltinFn | Tag::UserFn | Tag::AnonFn)
    }

    /// A callable reached through a named atom (tags 10..13).
    #[must_use]
    pub fn is_named_callable(self) -> bool {
        matches!(
            self,
            Tag::BuiltinFn | Tag::BuiltinForm | Tag::UserFn | Tag::UserForm
        )
    }

    /// Tags whose index is a list-area cell; the set the collector traverses.
    /// Built-in tags carry atom-table indices and must stay out of this set.
    #[must_use]
    pub fn carries_cell(self) -> bool {
        matches!(
            self,
            Tag::Pair | Tag::UserFn | Tag::UserForm | Tag::AnonFn | Tag::AnonForm
        )
    }
}

/// A tagged value: a type nibble plus a table index.
///
/// Equality is slot identity — same tag, same index — which is what EQ
/// exposes at the language level.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Value {
    tag: Tag,
    index: u32,
}

impl Value {
    #[must_use]
    pub const fn new(tag: Tag, index: u32) -> Self {
        Self { tag, index }
    }

    #[inline]
    #[must_use]
    pub const fn tag(self) -> Tag {
        self.tag
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    #[must_use]
    pub const fn pair(index: u32) -> Self {
        Self::new(Tag::Pair, index)
    }

    #[must_use]
    pub const fn undef(index: u32) -> Self {
        Self::new(Tag::Undef, index)
    }

    #[must_use]
    pub const fn atom(index: u32) -> Self {
        Self::new(Tag::Atom, index)
    }

    #[must_use]
    pub const fn number(index: u32) -> Self {
        Self::new(Tag::Number, index)
    }

    /// Same index under a different tag.
    #[must_use]
    pub const fn retag(self, tag: Tag) -> Self {
        Self::new(tag, self.index)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.tag, self.index)
    }
}

#[test]
fn test_tag_predicates() {
    assert!(Tag::Pair.is_sexp());
    assert!(Tag::Atom.is_sexp());
    assert!(Tag::Number.is_sexp());
    assert!(!Tag::BuiltinFn.is_sexp());
    assert!(!Tag::Undef.is_sexp());

    for t in [Tag::BuiltinFn, Tag::BuiltinForm, Tag::UserFn, Tag::UserForm] {
        assert!(t.is_callable());
        assert!(t.is_named_callable());
        assert!(!t.is_anon());
    }
    for t in [Tag::AnonFn, Tag::AnonForm] {
        assert!(t.is_callable());
        assert!(t.is_anon());
        assert!(!t.is_named_callable());
    }

    assert!(Tag::BuiltinFn.is_fn());
    assert!(Tag::UserFn.is_fn());
    assert!(Tag::AnonFn.is_fn());
    assert!(!Tag::BuiltinForm.is_fn());
    assert!(!Tag::AnonForm.is_fn());
}

#[test]
fn test_cell_bearing_tags() {
    // the collector must treat builtin values as atom references, not cells
    assert!(Tag::Pair.carries_cell());
    assert!(Tag::UserFn.carries_cell());
    assert!(Tag::UserForm.carries_cell());
    assert!(Tag::AnonFn.carries_cell());
    assert!(Tag::AnonForm.carries_cell());
    assert!(!Tag::BuiltinFn.carries_cell());
    assert!(!Tag::BuiltinForm.carries_cell());
    assert!(!Tag::Atom.carries_cell());
    assert!(!Tag::Number.carries_cell());
}

#[test]
fn test_value_identity() {
    assert_eq!(Value::atom(7), Value::atom(7));
    assert_ne!(Value::atom(7), Value::atom(8));
    assert_ne!(Value::atom(7), Value::number(7));
    assert_eq!(Value::number(3).retag(Tag::Number), Value::number(3));
    assert_eq!(Value::pair(12).retag(Tag::AnonFn), Value::new(Tag::AnonFn, 12));
    assert_eq!(Tag::try_from(9u8), Ok(Tag::Number));
    assert!(Tag::try_from(2u8).is_err());
}
