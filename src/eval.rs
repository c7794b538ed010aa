use crate::builtin::Builtin;
use crate::console::Console;
use crate::error::Error;
use crate::interp::Interp;
use crate::value::{Tag, Value};

impl<C: Console> Interp<C> {
    /// Evaluate one S-expression and return a tagged pointer to the result.
    pub fn seval(&mut self, p: Value) -> Result<Value, Error> {
        if self.tracing() {
            self.trace_depth += 1;
            let line = format!("{} eval: {}\n", self.trace_depth, self.heap.swrite(p));
            self.console.print(&line);
        }
        let v = self.eval_dispatch(p)?;
        if self.tracing() {
            let line = format!("{} result: {}\n", self.trace_depth, self.heap.swrite(v));
            self.console.print(&line);
            self.trace_depth -= 1;
        }
        Ok(v)
    }

    fn tracing(&self) -> bool {
        self.trace_switch > 0
    }

    fn eval_dispatch(&mut self, p: Value) -> Result<Value, Error> {
        if p.tag() == Tag::Pair {
            return self.apply(p);
        }
        if p.tag() != Tag::Atom {
            // numbers and function objects evaluate to themselves
            return Ok(p);
        }
        let j = p.index();
        if self.heap.atom_name(j).starts_with('!') {
            // trace pragma: !TRACE switches tracing on, any other !-name off,
            // then control returns to the prompt
            let on = self.heap.atom_name(j) == "!TRACE";
            self.trace_switch = i32::from(on);
            return Err(Error::TopLevel);
        }
        let value = self.heap.atom_value(j);
        match value.tag() {
            Tag::Undef => Err(Error::Undefined(self.heap.atom_name(j).to_owned())),
            // keep the binding name visible: the value of a named callable
            // is the callable tag over the atom's own index
            t if t.is_named_callable() => Ok(Value::new(t, j as u32)),
            _ => Ok(value),
        }
    }

    /// Apply `(f . args)`.
    fn apply(&mut self, p: Value) -> Result<Value, Error> {
        self.heap.push_current(p)?;

        self.trace_switch -= 1;
        let head = self.seval(self.heap.car(p));
        self.trace_switch += 1;
        let callable = head?;
        let ty = callable.tag();
        if !ty.is_callable() {
            return Err(Error::NotCallable);
        }

        // only the argument list needs protecting from here on
        let mut args = self.heap.cdr(p);
        self.heap.set_current_head(args);

        let anon = ty.is_anon();
        let target = if anon {
            // a fresh (params . body) cell is reachable from nowhere else;
            // pin it for the duration of the application
            self.heap.push_current(callable)?;
            callable.index()
        } else {
            self.heap.atom_value(callable.index()).index()
        };

        if ty.is_fn() {
            args = self.eval_args(args)?;
        }

        let result = if ty.is_builtin() {
            let b = Builtin::try_from(target as u8)
                .map_err(|_| Error::Internal("bad builtin case number"))?;
            self.apply_builtin(b, args)?
        } else {
            self.apply_user(Value::pair(target as u32), args)?
        };

        if ty.is_fn() {
            self.heap.pop_ea();
        }
        if anon {
            self.heap.pop_current();
        }
        self.heap.pop_current();
        Ok(result)
    }

    /// Evaluate an argument list left to right, tail-consing the values
    /// under a fresh `eaL` root.
    fn eval_args(&mut self, args: Value) -> Result<Value, Error> {
        let nil = self.heap.nil;
        self.heap.push_ea()?;
        let mut last: Option<Value> = None;
        let mut rest = args;
        while rest.tag() == Tag::Pair {
            let arg = self.seval(self.heap.car(rest))?;
            let cell = self.heap.cons(arg, nil)?;
            match last {
                None => self.heap.set_ea_head(cell),
                Some(l) => self.heap.rplacd(l, cell),
            }
            last = Some(cell);
            rest = self.heap.cdr(rest);
        }
        Ok(self.heap.ea_head())
    }

    /// Apply a user-defined function or special form: `body` is the
    /// `(params . body)` cell, `args` the (evaluated or literal) actuals.
    fn apply_user(&mut self, body: Value, args: Value) -> Result<Value, Error> {
        let nil = self.heap.nil;
        let formals = self.heap.car(body);

        // single-atom parameter: bind it to the whole argument list
        if formals.tag() == Tag::Atom && formals != nil {
            let j = formals.index();
            self.heap.shadow(j, args)?;
            let v = self.seval(self.heap.cdr(body))?;
            self.heap.unshadow(j);
            return Ok(v);
        }

        let mut bound = 0usize;
        let mut fa = formals;
        let mut rest = args;
        while rest.tag() == Tag::Pair && fa.tag() == Tag::Pair {
            let formal = self.heap.car(fa);
            if formal.tag() != Tag::Atom {
                return Err(Error::Argument("illegal formal parameter list"));
            }
            fa = self.heap.cdr(fa);
            let mut actual = self.heap.car(rest);
            if actual.tag().is_named_callable() {
                // shallow binding captures the callable, not its name
                actual = self.heap.atom_value(actual.index());
            }
            self.heap.shadow(formal.index(), actual)?;
            bound += 1;
            rest = self.heap.cdr(rest);
        }
        if rest != nil {
            return Err(Error::Argument("too many actual arguments"));
        }

        let v = self.seval(self.heap.cdr(body))?;

        let mut fa = formals;
        for _ in 0..bound {
            let formal = self.heap.car(fa);
            self.heap.unshadow(formal.index());
            fa = self.heap.cdr(fa);
        }
        Ok(v)
    }

    fn check_arity(&self, b: Builtin, args: Value) -> Result<(), Error> {
        let Some(want) = b.arity() else {
            return Ok(());
        };
        let mut want = want;
        let mut p = args;
        while want > 0 && p.tag() == Tag::Pair {
            want -= 1;
            p = self.heap.cdr(p);
        }
        if want == 0 && p == self.heap.nil {
            Ok(())
        } else {
            Err(Error::Arity {
                name: b.name(),
                excess: want == 0,
            })
        }
    }

    fn num_arg(&self, b: Builtin, v: Value) -> Result<f64, Error> {
        if v.tag() == Tag::Number {
            Ok(self.heap.num(v))
        } else {
            Err(Error::Type { name: b.name() })
        }
    }

    fn arith2(&mut self, b: Builtin, p: Value, op: fn(f64, f64) -> f64) -> Result<Value, Error> {
        let a = self.num_arg(b, self.heap.car(p))?;
        let second = self.heap.car(self.heap.cdr(p));
        let x = self.num_arg(b, second)?;
        self.heap.number(op(a, x))
    }

    fn compare2(&mut self, b: Builtin, p: Value, op: fn(f64, f64) -> bool) -> Result<Value, Error> {
        let a = self.num_arg(b, self.heap.car(p))?;
        let second = self.heap.car(self.heap.cdr(p));
        let x = self.num_arg(b, second)?;
        Ok(if op(a, x) { self.heap.t } else { self.heap.nil })
    }

    /// Assignment shared by SETQ, SET and TSETQ. `outermost` redirects the
    /// store to the deepest saved binding when one exists.
    fn assign(&mut self, j: usize, expr: Value, outermost: bool) -> Result<Value, Error> {
        let nil = self.heap.nil;
        let val = self.seval(expr)?;
        let stored = match val.tag() {
            t if t.is_named_callable() => self.heap.atom_value(val.index()),
            // naming an unnamed form promotes it to a user-defined one
            Tag::AnonFn => val.retag(Tag::UserFn),
            Tag::AnonForm => val.retag(Tag::UserForm),
            _ => val,
        };
        if outermost && self.heap.atom_bind(j) != nil {
            let mut cell = self.heap.atom_bind(j);
            loop {
                let next = self.heap.cdr(cell);
                if next == nil {
                    break;
                }
                cell = next;
            }
            self.heap.rplaca(cell, stored);
        } else {
            self.heap.set_atom_value(j, stored);
        }
        self.trace_switch -= 1;
        let v = self.seval(Value::atom(j as u32));
        self.trace_switch += 1;
        v
    }

    fn apply_builtin(&mut self, b: Builtin, p: Value) -> Result<Value, Error> {
        self.check_arity(b, p)?;
        let nil = self.heap.nil;
        let t = self.heap.t;
        match b {
            Builtin::Car => {
                let x = self.heap.car(p);
                if x.tag() != Tag::Pair {
                    return Err(Error::Argument("illegal CAR argument"));
                }
                Ok(self.heap.car(x))
            }
            Builtin::Cdr => {
                let x = self.heap.car(p);
                if x.tag() != Tag::Pair {
                    return Err(Error::Argument("illegal CDR argument"));
                }
                Ok(self.heap.cdr(x))
            }
            Builtin::Cons => {
                let x = self.heap.car(p);
                let y = self.heap.car(self.heap.cdr(p));
                if x.tag().is_sexp() && y.tag().is_sexp() {
                    self.heap.cons(x, y)
                } else {
                    Err(Error::Argument("illegal CONS arguments"))
                }
            }
            Builtin::Lambda | Builtin::Special => {
                let params = self.heap.car(p);
                let body = self.heap.car(self.heap.cdr(p));
                let cell = self.heap.cons(params, body)?;
                let tag = if b == Builtin::Lambda {
                    Tag::AnonFn
                } else {
                    Tag::AnonForm
                };
                Ok(cell.retag(tag))
            }
            Builtin::Setq => {
                let target = self.heap.car(p);
                if target.tag() != Tag::Atom {
                    return Err(Error::Argument("illegal assignment"));
                }
                let expr = self.heap.car(self.heap.cdr(p));
                self.assign(target.index(), expr, false)
            }
            Builtin::Tsetq => {
                let target = self.heap.car(p);
                if target.tag() != Tag::Atom {
                    return Err(Error::Argument(
                        "TSETQ application: first argument given is not an atom",
                    ));
                }
                let expr = self.heap.car(self.heap.cdr(p));
                self.assign(target.index(), expr, true)
            }
            Builtin::Set => {
                let target = self.seval(self.heap.car(p))?;
                if target.tag() != Tag::Atom {
                    return Err(Error::Argument(
                        "SET application: evaluated first argument is not an atom",
                    ));
                }
                let expr = self.heap.car(self.heap.cdr(p));
                self.assign(target.index(), expr, false)
            }
            Builtin::Atom => {
                let x = self.heap.car(p);
                Ok(if matches!(x.tag(), Tag::Atom | Tag::Number) {
                    t
                } else {
                    nil
                })
            }
            Builtin::Numberp => {
                let x = self.heap.car(p);
                Ok(if x.tag() == Tag::Number { t } else { nil })
            }
            Builtin::Quote => Ok(self.heap.car(p)),
            Builtin::List => Ok(p),
            Builtin::Do => {
                let mut v = nil;
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    v = self.seval(self.heap.car(rest))?;
                    rest = self.heap.cdr(rest);
                }
                Ok(v)
            }
            Builtin::Cond => {
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    let clause = self.heap.car(rest);
                    if clause.tag() != Tag::Pair {
                        return Err(Error::Argument("illegal COND clause"));
                    }
                    if self.seval(self.heap.car(clause))? != nil {
                        let conseq = self.heap.cdr(clause);
                        if conseq.tag() != Tag::Pair {
                            return Err(Error::Argument("illegal COND clause"));
                        }
                        return self.seval(self.heap.car(conseq));
                    }
                    rest = self.heap.cdr(rest);
                }
                Ok(nil)
            }
            Builtin::Plus => self.arith2(b, p, |a, x| a + x),
            Builtin::Times => self.arith2(b, p, |a, x| a * x),
            Builtin::Difference => self.arith2(b, p, |a, x| a - x),
            Builtin::Quotient => self.arith2(b, p, |a, x| a / x),
            Builtin::Power => self.arith2(b, p, f64::powf),
            Builtin::Floor => {
                let a = self.num_arg(b, self.heap.car(p))?;
                self.heap.number(a.floor())
            }
            Builtin::Minus => {
                let a = self.num_arg(b, self.heap.car(p))?;
                self.heap.number(-a)
            }
            Builtin::Lessp => self.compare2(b, p, |a, x| a < x),
            Builtin::Greaterp => self.compare2(b, p, |a, x| a > x),
            Builtin::Eval => {
                let x = self.heap.car(p);
                self.seval(x)
            }
            Builtin::Eq => {
                let x = self.heap.car(p);
                let y = self.heap.car(self.heap.cdr(p));
                Ok(if x == y { t } else { nil })
            }
            Builtin::And => {
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    if self.seval(self.heap.car(rest))? == nil {
                        return Ok(nil);
                    }
                    rest = self.heap.cdr(rest);
                }
                Ok(t)
            }
            Builtin::Or => {
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    if self.seval(self.heap.car(rest))? != nil {
                        return Ok(t);
                    }
                    rest = self.heap.cdr(rest);
                }
                Ok(nil)
            }
            Builtin::Sum => {
                let mut s = 0.0;
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    s += self.num_arg(b, self.heap.car(rest))?;
                    rest = self.heap.cdr(rest);
                }
                self.heap.number(s)
            }
            Builtin::Product => {
                let mut s = 1.0;
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    s *= self.num_arg(b, self.heap.car(rest))?;
                    rest = self.heap.cdr(rest);
                }
                self.heap.number(s)
            }
            Builtin::Putplist => {
                let a = self.heap.car(p);
                if a.tag() != Tag::Atom {
                    return Err(Error::Argument(
                        "PUTPLIST application: the first argument is not an atom",
                    ));
                }
                let plist = self.heap.car(self.heap.cdr(p));
                self.heap.set_plist(a.index(), plist);
                Ok(a)
            }
            Builtin::Getplist => {
                let a = self.heap.car(p);
                if a.tag() != Tag::Atom {
                    return Err(Error::Argument(
                        "GETPLIST application: the first argument is not an atom",
                    ));
                }
                Ok(self.heap.plist(a.index()))
            }
            Builtin::Read => {
                self.console.print("n>");
                self.reader.set_prompt(None);
                self.sread()
            }
            Builtin::Print => {
                if p == nil {
                    self.console.print(" ");
                }
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    self.print_value(self.heap.car(rest));
                    self.console.print(" ");
                    rest = self.heap.cdr(rest);
                }
                Ok(nil)
            }
            Builtin::Printcr => {
                if p == nil {
                    self.console.print("\n");
                }
                let mut rest = p;
                while rest.tag() == Tag::Pair {
                    self.print_value(self.heap.car(rest));
                    self.console.print("\n");
                    rest = self.heap.cdr(rest);
                }
                Ok(nil)
            }
            Builtin::Mkatom => {
                let x = self.heap.car(p);
                let y = self.heap.car(self.heap.cdr(p));
                if x.tag() != Tag::Atom || y.tag() != Tag::Atom {
                    return Err(Error::Argument("illegal MKATOM arguments"));
                }
                let name = format!(
                    "{}{}",
                    self.heap.atom_name(x.index()),
                    self.heap.atom_name(y.index())
                );
                self.heap.intern(&name)
            }
            Builtin::Body => {
                let x = self.heap.car(p);
                match x.tag() {
                    Tag::AnonFn | Tag::AnonForm => Ok(Value::pair(x.index() as u32)),
                    Tag::UserFn | Tag::UserForm => {
                        Ok(Value::pair(self.heap.atom_value(x.index()).index() as u32))
                    }
                    _ => Err(Error::Argument("BODY application: Illegal argument")),
                }
            }
            Builtin::Rplaca => {
                let x = self.heap.car(p);
                if x.tag() != Tag::Pair {
                    return Err(Error::Argument("illegal RPLACA argument"));
                }
                let y = self.heap.car(self.heap.cdr(p));
                self.heap.rplaca(x, y);
                Ok(x)
            }
            Builtin::Rplacd => {
                let x = self.heap.car(p);
                if x.tag() != Tag::Pair {
                    return Err(Error::Argument("illegal RPLACD argument"));
                }
                let y = self.heap.car(self.heap.cdr(p));
                self.heap.rplacd(x, y);
                Ok(x)
            }
            Builtin::Null => {
                let x = self.heap.car(p);
                Ok(if x == nil { t } else { nil })
            }
            Builtin::Exit => Err(Error::Exit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;

    /// Read and evaluate every expression in `script`, collecting the
    /// rendered results (errors render as their `::` line).
    fn results(script: &str) -> Vec<String> {
        let mut it = Interp::new(BufferConsole::new(script)).unwrap();
        let mut out = Vec::new();
        loop {
            it.reader.set_prompt(Some('*'));
            let expr = match it.sread() {
                Ok(e) => e,
                Err(_) => break,
            };
            match it.seval(expr) {
                Ok(v) => out.push(it.heap.swrite(v)),
                Err(Error::TopLevel) => it.recover(),
                Err(e) => {
                    it.recover();
                    out.push(format!("::{e}"));
                }
            }
        }
        assert!(it.heap.debug_bindings_clean());
        out
    }

    fn result1(script: &str) -> String {
        results(script).pop().unwrap()
    }

    #[test]
    fn test_cons_car_cdr() {
        assert_eq!(result1("(CONS 1 2)"), "(1 . 2)");
        assert_eq!(result1("(CAR (QUOTE (A B C)))"), "A");
        assert_eq!(result1("(CDR (QUOTE (A B C)))"), "(B C)");
        assert_eq!(result1("(CONS (QUOTE A) (QUOTE (B C)))"), "(A B C)");
    }

    #[test]
    fn test_setq_and_arithmetic() {
        assert_eq!(results("(SETQ X 5) (PLUS X 3)"), vec!["5", "8"]);
        assert_eq!(result1("(TIMES 6 7)"), "42");
        assert_eq!(result1("(DIFFERENCE 1 2)"), "-1");
        assert_eq!(result1("(QUOTIENT 7 2)"), "3.5");
        assert_eq!(result1("(POWER 2 10)"), "1024");
        assert_eq!(result1("(FLOOR 3.75)"), "3");
        assert_eq!(result1("(MINUS 4)"), "-4");
        assert_eq!(result1("(SUM 1 2 3 4)"), "10");
        assert_eq!(result1("(PRODUCT 2 3 4)"), "24");
        assert_eq!(result1("(SUM)"), "0");
        assert_eq!(result1("(PRODUCT)"), "1");
    }

    #[test]
    fn test_predicates() {
        assert_eq!(result1("(ATOM 3)"), "T");
        assert_eq!(result1("(ATOM (QUOTE A))"), "T");
        assert_eq!(result1("(ATOM (QUOTE (A)))"), "NIL");
        assert_eq!(result1("(NUMBERP 3)"), "T");
        assert_eq!(result1("(NUMBERP (QUOTE A))"), "NIL");
        assert_eq!(result1("(NULL ())"), "T");
        assert_eq!(result1("(NULL 1)"), "NIL");
        assert_eq!(result1("(LESSP 1 2)"), "T");
        assert_eq!(result1("(GREATERP 1 2)"), "NIL");
    }

    #[test]
    fn test_eq_is_slot_identity() {
        assert_eq!(result1("(EQ (QUOTE X) (QUOTE X))"), "T");
        assert_eq!(result1("(EQ 2 2)"), "T");
        assert_eq!(result1("(EQ 2 3)"), "NIL");
        // separately read lists are distinct cells
        assert_eq!(result1("(EQ (QUOTE (A)) (QUOTE (A)))"), "NIL");
    }

    #[test]
    fn test_lambda_application() {
        assert_eq!(result1("((LAMBDA (X Y) (TIMES X Y)) 6 7)"), "42");
        // list parameter binds the whole evaluated argument list
        assert_eq!(result1("((LAMBDA L L) 1 2 3)"), "(1 2 3)");
        assert_eq!(
            result1("((LAMBDA (X Y) (CONS Y X)) (QUOTE A) (QUOTE B))"),
            "(B . A)"
        );
        assert_eq!(
            result1("((LAMBDA (X) (TIMES X X)) 9)"),
            "81"
        );
    }

    #[test]
    fn test_special_form_gets_literals() {
        assert_eq!(
            results("(SETQ Q (SPECIAL (X) (CAR X))) (Q (A B))"),
            vec!["{user defined special form: Q}", "A"]
        );
    }

    #[test]
    fn test_cond() {
        assert_eq!(
            result1("(COND ((EQ 1 2) (QUOTE NO)) ((EQ 3 3) (QUOTE YES)))"),
            "YES"
        );
        assert_eq!(result1("(COND ((EQ 1 2) 1))"), "NIL");
        assert_eq!(result1("(COND (T 1) ((CAR 3) 2))"), "1");
    }

    #[test]
    fn test_and_or_short_circuit() {
        assert_eq!(result1("(AND)"), "T");
        assert_eq!(result1("(OR)"), "NIL");
        assert_eq!(result1("(AND 1 2 3)"), "T");
        assert_eq!(result1("(OR NIL 2)"), "T");
        // the failing test stops evaluation before the error
        assert_eq!(result1("(AND NIL (CAR 3))"), "NIL");
        assert_eq!(result1("(OR T (CAR 3))"), "T");
    }

    #[test]
    fn test_do_sequences() {
        assert_eq!(result1("(DO)"), "NIL");
        assert_eq!(result1("(DO 1 2 3)"), "3");
        assert_eq!(result1("(DO (SETQ X 1) (SETQ X (PLUS X 1)) X)"), "2");
    }

    #[test]
    fn test_recursion() {
        let out = results(
            "(SETQ F (LAMBDA (N) (COND ((LESSP N 2) N) \
             (T (PLUS (F (DIFFERENCE N 1)) (F (DIFFERENCE N 2))))))) (F 10)",
        );
        assert_eq!(out, vec!["{user defined function: F}", "55"]);
    }

    #[test]
    fn test_dynamic_scope_and_tsetq() {
        let out = results(
            "(SETQ X 1) \
             (SETQ F (LAMBDA (X) (DO (TSETQ X 9) X))) \
             (F 5) \
             X",
        );
        assert_eq!(out[2], "5");
        assert_eq!(out[3], "9");
    }

    #[test]
    fn test_set_evaluates_target() {
        assert_eq!(
            results("(SET (QUOTE Y) 4) Y"),
            vec!["4", "4"]
        );
    }

    #[test]
    fn test_plist() {
        assert_eq!(
            results(
                "(PUTPLIST (QUOTE P) (QUOTE (COLOR RED))) (GETPLIST (QUOTE P))"
            ),
            vec!["P", "(COLOR RED)"]
        );
    }

    #[test]
    fn test_mkatom_and_body() {
        assert_eq!(result1("(MKATOM (QUOTE AB) (QUOTE CD))"), "ABCD");
        assert_eq!(
            results("(SETQ F (LAMBDA (X) X)) (BODY F)")[1],
            "((X) . X)"
        );
    }

    #[test]
    fn test_rplac() {
        assert_eq!(
            results(
                "(SETQ L (QUOTE (A B))) (RPLACA L 1) (RPLACD L 2) L"
            ),
            vec!["(A B)", "(1 B)", "(1 . 2)", "(1 . 2)"]
        );
    }

    #[test]
    fn test_eval_builtin() {
        assert_eq!(result1("(EVAL (QUOTE (PLUS 1 2)))"), "3");
        assert_eq!(results("(SETQ X (QUOTE Y)) (SETQ Y 7) (EVAL X)")[2], "7");
    }

    #[test]
    fn test_named_callables_print_their_name() {
        assert_eq!(result1("CAR"), "{builtin function: CAR}");
        assert_eq!(result1("COND"), "{builtin special form: COND}");
        assert_eq!(result1("(LAMBDA (X) X)"), "{unnamed function}");
    }

    #[test]
    fn test_errors() {
        assert_eq!(result1("(CAR 3)"), "::illegal CAR argument");
        assert_eq!(result1("(CDR 3)"), "::illegal CDR argument");
        assert_eq!(result1("Z"), "::Z is undefined");
        assert_eq!(result1("(1 2)"), "::invalid function or special form");
        assert_eq!(result1("(CAR)"), "::CAR application: not enough arguments");
        assert_eq!(
            result1("(CAR 1 2)"),
            "::CAR application: too many arguments"
        );
        assert_eq!(
            result1("(PLUS 1 (QUOTE A))"),
            "::PLUS application: argument is not a number"
        );
        assert_eq!(
            result1("(SUM 1 (QUOTE A))"),
            "::SUM application: argument is not a number"
        );
        assert_eq!(result1("(SETQ 3 4)"), "::illegal assignment");
        assert_eq!(
            result1("((LAMBDA (X) X) 1 2)"),
            "::too many actual arguments"
        );
        assert_eq!(
            result1("(CONS CAR 1)"),
            "::illegal CONS arguments"
        );
    }

    #[test]
    fn test_error_recovery_restores_bindings() {
        let out = results(
            "(SETQ X 1) \
             (SETQ F (LAMBDA (X) (CAR X))) \
             (F 3) \
             X \
             (PLUS 1 2)",
        );
        // the failing call left a shadowed binding; recovery unwound it
        assert_eq!(out[2], "::illegal CAR argument");
        assert_eq!(out[3], "1");
        assert_eq!(out[4], "3");
    }

    #[test]
    fn test_print_builtins() {
        let mut it = Interp::new(BufferConsole::new("(PRINT (QUOTE A) 2) (PRINTCR 1)")).unwrap();
        let expr = it.sread().unwrap();
        let v = it.seval(expr).unwrap();
        assert_eq!(v, it.heap.nil);
        let expr = it.sread().unwrap();
        it.seval(expr).unwrap();
        assert!(it.console.output().contains("A 2 "));
        assert!(it.console.output().contains("1\n"));
    }

    #[test]
    fn test_read_builtin() {
        let out = results("(CONS (READ) 1)\n(A B)");
        assert_eq!(out[0], "((A B) . 1)");
    }

    #[test]
    fn test_exit_and_trace_pragma() {
        let mut it = Interp::new(BufferConsole::new("(EXIT)")).unwrap();
        let expr = it.sread().unwrap();
        assert!(matches!(it.seval(expr), Err(Error::Exit)));

        let mut it = Interp::new(BufferConsole::new("!TRACE (PLUS 1 2) !OFF")).unwrap();
        let expr = it.sread().unwrap();
        assert!(matches!(it.seval(expr), Err(Error::TopLevel)));
        it.recover();
        let expr = it.sread().unwrap();
        it.seval(expr).unwrap();
        let traced = it.console.output().to_string();
        assert!(traced.contains("1 eval: (PLUS 1 2)"));
        assert!(traced.contains("1 result: 3"));
        let expr = it.sread().unwrap();
        assert!(matches!(it.seval(expr), Err(Error::TopLevel)));
    }

    #[test]
    fn test_quote_atom_untouched() {
        // the reader names QUOTE in its expansion without evaluating it,
        // so the atom keeps its installed builtin value
        let mut it = Interp::new(BufferConsole::new("'X")).unwrap();
        let before = it.heap.atom_value(it.heap.quote.index());
        let expr = it.sread().unwrap();
        it.seval(expr).unwrap();
        assert_eq!(it.heap.atom_value(it.heap.quote.index()), before);
        assert_eq!(before.tag(), Tag::BuiltinForm);
    }
}
