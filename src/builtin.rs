use num_enum::TryFromPrimitive;

use crate::value::Tag;

/// The built-in operators, with the ordinals the atom table stores as the
/// index part of a `BuiltinFn`/`BuiltinForm` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Builtin {
    Car = 1,
    Cdr = 2,
    Cons = 3,
    Lambda = 4,
    Special = 5,
    Setq = 6,
    Atom = 7,
    Numberp = 8,
    Quote = 9,
    List = 10,
    Do = 11,
    Cond = 12,
    Plus = 13,
    Times = 14,
    Difference = 15,
    Quotient = 16,
    Power = 17,
    Floor = 18,
    Minus = 19,
    Lessp = 20,
    Greaterp = 21,
    Eval = 22,
    Eq = 23,
    And = 24,
    Or = 25,
    Sum = 26,
    Product = 27,
    Putplist = 28,
    Getplist = 29,
    Read = 30,
    Print = 31,
    Printcr = 32,
    Mkatom = 33,
    Body = 34,
    Rplaca = 35,
    Rplacd = 36,
    Tsetq = 37,
    Null = 38,
    Set = 39,
    Exit = 40,
}

impl Builtin {
    /// Installation order; index + 1 is the ordinal.
    pub const ALL: [Builtin; 40] = [
        Builtin::Car,
        Builtin::Cdr,
        Builtin::Cons,
        Builtin::Lambda,
        Builtin::Special,
        Builtin::Setq,
        Builtin::Atom,
        Builtin::Numberp,
        Builtin::Quote,
        Builtin::List,
        Builtin::Do,
        Builtin::Cond,
        Builtin::Plus,
        Builtin::Times,
        Builtin::Difference,
        Builtin::Quotient,
        Builtin::Power,
        Builtin::Floor,
        Builtin::Minus,
        Builtin::Lessp,
        Builtin::Greaterp,
        Builtin::Eval,
        Builtin::Eq,
        Builtin::And,
        Builtin::Or,
        Builtin::Sum,
        Builtin::Product,
        Builtin::Putplist,
        Builtin::Getplist,
        Builtin::Read,
        Builtin::Print,
        Builtin::Printcr,
        Builtin::Mkatom,
        Builtin::Body,
        Builtin::Rplaca,
        Builtin::Rplacd,
        Builtin::Tsetq,
        Builtin::Null,
        Builtin::Set,
        Builtin::Exit,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Car => "CAR",
            Builtin::Cdr => "CDR",
            Builtin::Cons => "CONS",
            Builtin::Lambda => "LAMBDA",
            Builtin::Special => "SPECIAL",
            Builtin::Setq => "SETQ",
            Builtin::Atom => "ATOM",
            Builtin::Numberp => "NUMBERP",
            Builtin::Quote => "QUOTE",
            Builtin::List => "LIST",
            Builtin::Do => "DO",
            Builtin::Cond => "COND",
            Builtin::Plus => "PLUS",
            Builtin::Times => "TIMES",
            Builtin::Difference => "DIFFERENCE",
            Builtin::Quotient => "QUOTIENT",
            Builtin::Power => "POWER",
            Builtin::Floor => "FLOOR",
            Builtin::Minus => "MINUS",
            Builtin::Lessp => "LESSP",
            Builtin::Greaterp => "GREATERP",
            Builtin::Eval => "EVAL",
            Builtin::Eq => "EQ",
            Builtin::And => "AND",
            Builtin::Or => "OR",
            Builtin::Sum => "SUM",
            Builtin::Product => "PRODUCT",
            Builtin::Putplist => "PUTPLIST",
            Builtin::Getplist => "GETPLIST",
            Builtin::Read => "READ",
            Builtin::Print => "PRINT",
            Builtin::Printcr => "PRINTCR",
            Builtin::Mkatom => "MKATOM",
            Builtin::Body => "BODY",
            Builtin::Rplaca => "RPLACA",
            Builtin::Rplacd => "RPLACD",
            Builtin::Tsetq => "TSETQ",
            Builtin::Null => "NULL",
            Builtin::Set => "SET",
            Builtin::Exit => "EXIT",
        }
    }

    /// Special forms receive their arguments unevaluated.
    #[must_use]
    pub fn is_special_form(self) -> bool {
        matches!(
            self,
            Builtin::Lambda
                | Builtin::Special
                | Builtin::Setq
                | Builtin::Quote
                | Builtin::Do
                | Builtin::Cond
                | Builtin::And
                | Builtin::Or
                | Builtin::Tsetq
                | Builtin::Set
        )
    }

    /// Tag installed as the operator atom's value.
    #[must_use]
    pub fn tag(self) -> Tag {
        if self.is_special_form() {
            Tag::BuiltinForm
        } else {
            Tag::BuiltinFn
        }
    }

    /// Exact argument count, or `None` for the variadic operators.
    #[must_use]
    pub fn arity(self) -> Option<u8> {
        match self {
            Builtin::Car
            | Builtin::Cdr
            | Builtin::Atom
            | Builtin::Numberp
            | Builtin::Quote
            | Builtin::Floor
            | Builtin::Minus
            | Builtin::Eval
            | Builtin::Getplist
            | Builtin::Body
            | Builtin::Null => Some(1),
            Builtin::Cons
            | Builtin::Lambda
            | Builtin::Special
            | Builtin::Setq
            | Builtin::Plus
            | Builtin::Times
            | Builtin::Difference
            | Builtin::Quotient
            | Builtin::Power
            | Builtin::Lessp
            | Builtin::Greaterp
            | Builtin::Eq
            | Builtin::Putplist
            | Builtin::Mkatom
            | Builtin::Rplaca
            | Builtin::Rplacd
            | Builtin::Tsetq
            | Builtin::Set => Some(2),
            Builtin::Read | Builtin::Exit => Some(0),
            Builtin::List
            | Builtin::Do
            | Builtin::Cond
            | Builtin::And
            | Builtin::Or
            | Builtin::Sum
            | Builtin::Product
            | Builtin::Print
            | Builtin::Printcr => None,
        }
    }
}

#[test]
fn test_ordinals_round_trip() {
    for (i, b) in Builtin::ALL.iter().enumerate() {
        assert_eq!(*b as usize, i + 1);
        assert_eq!(Builtin::try_from((i + 1) as u8), Ok(*b));
    }
    assert!(Builtin::try_from(0u8).is_err());
    assert!(Builtin::try_from(41u8).is_err());
}

#[test]
fn test_kinds() {
    assert_eq!(Builtin::Car.tag(), Tag::BuiltinFn);
    assert_eq!(Builtin::Lambda.tag(), Tag::BuiltinForm);
    assert_eq!(Builtin::Do.tag(), Tag::BuiltinForm);
    assert_eq!(Builtin::List.tag(), Tag::BuiltinFn);
    assert_eq!(Builtin::Sum.arity(), None);
    assert_eq!(Builtin::Cons.arity(), Some(2));
    assert_eq!(Builtin::Exit.arity(), Some(0));
    assert_eq!(Builtin::Mkatom.name(), "MKATOM");
}
