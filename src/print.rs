use std::fmt::Write;

use crate::heap::Heap;
use crate::value::{Tag, Value};

impl Heap {
    /// Render a value the way the top level prints it: proper lists spaced
    /// inside one pair of parentheses, improper tails after ` . `, numbers
    /// in the shortest round-trippable decimal form.
    #[must_use]
    pub fn swrite(&self, v: Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, v);
        out
    }

    fn write_value(&self, out: &mut String, v: Value) {
        match v.tag() {
            Tag::Pair => {
                let mut j = v;
                while self.cdr(j).tag() == Tag::Pair {
                    j = self.cdr(j);
                }
                out.push('(');
                if self.cdr(j) == self.nil {
                    let mut i = v;
                    loop {
                        self.write_value(out, self.car(i));
                        i = self.cdr(i);
                        if i == self.nil {
                            break;
                        }
                        out.push(' ');
                    }
                } else {
                    self.write_value(out, self.car(v));
                    out.push_str(" . ");
                    self.write_value(out, self.cdr(v));
                }
                out.push(')');
            }
            Tag::Atom => out.push_str(self.atom_name(v.index())),
            Tag::Number => {
                let _ = write!(out, "{}", self.num(v));
            }
            Tag::BuiltinFn => {
                let _ = write!(out, "{{builtin function: {}}}", self.atom_name(v.index()));
            }
            Tag::BuiltinForm => {
                let _ = write!(
                    out,
                    "{{builtin special form: {}}}",
                    self.atom_name(v.index())
                );
            }
            Tag::UserFn => {
                let _ = write!(
                    out,
                    "{{user defined function: {}}}",
                    self.atom_name(v.index())
                );
            }
            Tag::UserForm => {
                let _ = write!(
                    out,
                    "{{user defined special form: {}}}",
                    self.atom_name(v.index())
                );
            }
            Tag::AnonFn => out.push_str("{unnamed function}"),
            Tag::AnonForm => out.push_str("{unnamed special form}"),
            // an undefined value never survives evaluation
            Tag::Undef => {}
        }
    }
}

#[cfg(test)]
use crate::heap::HeapConfig;

#[test]
fn test_write_atoms_and_numbers() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let a = heap.intern("ABC").unwrap();
    assert_eq!(heap.swrite(a), "ABC");
    assert_eq!(heap.swrite(heap.nil), "NIL");
    let one = heap.number(1.0).unwrap();
    assert_eq!(heap.swrite(one), "1");
    let frac = heap.number(-0.5).unwrap();
    assert_eq!(heap.swrite(frac), "-0.5");
}

#[test]
fn test_write_lists() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let nil = heap.nil;
    let a = heap.intern("A").unwrap();
    let b = heap.intern("B").unwrap();
    let c = heap.intern("C").unwrap();
    let tail = heap.cons(c, nil).unwrap();
    let mid = heap.cons(b, tail).unwrap();
    let list = heap.cons(a, mid).unwrap();
    assert_eq!(heap.swrite(list), "(A B C)");

    let one = heap.number(1.0).unwrap();
    let two = heap.number(2.0).unwrap();
    let pair = heap.cons(one, two).unwrap();
    assert_eq!(heap.swrite(pair), "(1 . 2)");

    // a dotted tail prints as nested pairs
    let three = heap.number(3.0).unwrap();
    let inner = heap.cons(two, three).unwrap();
    let outer = heap.cons(one, inner).unwrap();
    assert_eq!(heap.swrite(outer), "(1 . (2 . 3))");
}

#[test]
fn test_write_callables() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let car = heap.intern("CAR").unwrap();
    let named = Value::new(Tag::BuiltinFn, car.index() as u32);
    assert_eq!(heap.swrite(named), "{builtin function: CAR}");
    let cond = heap.intern("COND").unwrap();
    let named = Value::new(Tag::BuiltinForm, cond.index() as u32);
    assert_eq!(heap.swrite(named), "{builtin special form: COND}");

    let nil = heap.nil;
    let body = heap.cons(nil, nil).unwrap();
    assert_eq!(heap.swrite(body.retag(Tag::AnonFn)), "{unnamed function}");
    assert_eq!(
        heap.swrite(body.retag(Tag::AnonForm)),
        "{unnamed special form}"
    );
}
