use pretty_assertions::assert_eq;

use govol_lisp::{BufferConsole, HeapConfig, Interp};

/// Run a scripted session through the top level and return the transcript.
fn run(script: &str) -> String {
    let mut interp = Interp::new(BufferConsole::new(script)).unwrap();
    interp.repl();
    assert!(interp.heap().debug_bindings_clean());
    interp.into_console().into_output()
}

#[test]
fn test_cons_transcript() {
    assert_eq!(run("(CONS 1 2)"), "\n*(CONS 1 2)\n(1 . 2)\n*");
}

#[test]
fn test_car_cdr() {
    let out = run("(CAR (QUOTE (A B C)))\n(CDR (QUOTE (A B C)))");
    assert_eq!(
        out,
        "\n*(CAR (QUOTE (A B C)))\nA\n*(CDR (QUOTE (A B C)))\n(B C)\n*"
    );
}

#[test]
fn test_two_expressions_one_line() {
    assert_eq!(
        run("(SETQ X 5) (PLUS X 3)"),
        "\n*(SETQ X 5) (PLUS X 3)\n5\n8\n*"
    );
}

#[test]
fn test_lambda_and_cond() {
    let out = run(
        "((LAMBDA (X Y) (TIMES X Y)) 6 7)\n\
         (COND ((EQ 1 2) (QUOTE NO)) ((EQ 3 3) (QUOTE YES)))",
    );
    assert!(out.contains("6 7)\n42\n"));
    assert!(out.contains("YES)))\nYES\n"));
}

#[test]
fn test_fibonacci() {
    let out = run(
        "(SETQ F (LAMBDA (N) (COND ((LESSP N 2) N) \
         (T (PLUS (F (DIFFERENCE N 1)) (F (DIFFERENCE N 2)))))))\n(F 10)",
    );
    assert!(out.contains("{user defined function: F}"));
    assert!(out.contains("(F 10)\n55\n"));
}

#[test]
fn test_error_recovery() {
    assert_eq!(
        run("(CAR 3)\n(PLUS 1 2)"),
        "\n*(CAR 3)\n::illegal CAR argument\n\n*(PLUS 1 2)\n3\n*"
    );
}

#[test]
fn test_undefined_then_continue() {
    let out = run("UNBOUND\n(QUOTE OK)");
    assert!(out.contains("::UNBOUND is undefined\n"));
    assert!(out.contains("OK)\nOK\n"));
}

#[test]
fn test_exit_stops_the_loop() {
    let out = run("(EXIT) (QUOTE NEVER)");
    assert_eq!(out, "\n*(EXIT) (QUOTE NEVER)\n");
}

#[test]
fn test_read_builtin_prompt() {
    let out = run("(CONS (READ) 5)\n(A B)");
    assert!(out.contains("n>(A B)\n((A B) . 5)"));
}

#[test]
fn test_trace_transcript() {
    let out = run("!TRACE\n(PLUS 1 2)\n!NOTRACE\n(PLUS 1 2)");
    assert!(out.contains("1 eval: (PLUS 1 2)\n"));
    assert!(out.contains("1 result: 3\n"));
    // tracing off again: the second evaluation prints only its result
    let tail = out.rsplit("!NOTRACE").next().unwrap();
    assert!(!tail.contains("eval:"));
    assert!(tail.contains("(PLUS 1 2)\n3\n"));
}

#[test]
fn test_collection_under_pressure() {
    let script = "(SETQ G (LAMBDA (N) (COND ((LESSP N 1) 0) (T (G (DIFFERENCE N 1))))))\n"
        .to_string()
        + &"(G 12)\n".repeat(8);
    let mut interp = Interp::with_config(
        BufferConsole::new(&script),
        HeapConfig {
            atoms: 200,
            numbers: 64,
            cells: 256,
        },
    )
    .unwrap();
    interp.repl();
    assert!(interp.heap().debug_bindings_clean());
    assert_eq!(
        interp.heap().debug_free_chain_len(),
        interp.heap().debug_free_cells()
    );
    let out = interp.into_console().into_output();
    // far more cells are consed than exist; collection must keep up
    assert!(!out.contains("::"));
    assert!(out.contains("(G 12)\n0\n"));
}

#[test]
fn test_bootstrap_library() {
    let dir = tempfile::Builder::new()
        .prefix("govol")
        .tempdir()
        .unwrap();
    let path = dir.path().join("lispinit");
    std::fs::write(
        &path,
        "/ minimal bootstrap library\n\
         (SETQ NOT (LAMBDA (X) (COND (X NIL) (T T))))\n\
         (SETQ CADR (LAMBDA (X) (CAR (CDR X))))\n",
    )
    .unwrap();

    let mut interp =
        Interp::new(BufferConsole::new("(NOT NIL)\n(CADR (QUOTE (A B C)))")).unwrap();
    interp.boot(&path.display().to_string());
    interp.repl();
    let out = interp.into_console().into_output();
    assert!(out.contains("(NOT NIL)\nT\n"));
    assert!(out.contains("(CADR (QUOTE (A B C)))\nB\n"));
}

#[test]
fn test_eq_identity_of_reread_atoms() {
    let out = run("(EQ (QUOTE ALPHA) (QUOTE ALPHA))\n(EQ 3.5 3.5)");
    assert!(out.contains("ALPHA))\nT\n"));
    assert!(out.contains("3.5)\nT\n"));
}

#[test]
fn test_dotted_print_format() {
    let out = run("(CONS (QUOTE A) (CONS 1 2))");
    assert!(out.contains("\n(A . (1 . 2))\n"));
}
