//! Interpreter integration tests
//!
//! Tests the full pipeline: source → read → evaluate, with the host
//! functions bound to an environment.

use envlisp::interp::{HostContext, HostPolicy, Interpreter, Value, host};
use envlisp::{Environment, EvalError};

/// Helper to evaluate source and print the result
fn interpret(source: &str) -> Result<String, EvalError> {
    let mut env = Environment::new();
    interpret_in(&mut env, source)
}

fn interpret_in(env: &mut Environment, source: &str) -> Result<String, EvalError> {
    let mut interp = Interpreter::new();
    host::install(&mut interp);
    let program = interp
        .read(source)
        .unwrap_or_else(|e| panic!("Read failed for {:?}: {}", source, e));
    let mut ctx = HostContext::new(env, HostPolicy::default());
    let value = interp.eval(&program, &mut ctx)?;
    Ok(interp.print(&value))
}

/// Helper to check the printed result
fn assert_prints(source: &str, expected: &str) {
    match interpret(source) {
        Ok(printed) => assert_eq!(printed, expected, "for {}", source),
        Err(e) => panic!("Evaluation of {:?} failed: {}", source, e),
    }
}

/// Helper to check the result is an integer
fn assert_result_int(source: &str, expected: i64) {
    let mut env = Environment::new();
    let mut interp = Interpreter::new();
    host::install(&mut interp);
    let program = interp.read(source).unwrap();
    let mut ctx = HostContext::new(&mut env, HostPolicy::default());
    match interp.eval(&program, &mut ctx) {
        Ok(Value::Int(n)) => assert_eq!(n, expected, "Expected {}, got {}", expected, n),
        Ok(v) => panic!("Expected Int({}), got {:?}", expected, v),
        Err(e) => panic!("Evaluation failed: {}", e),
    }
}

/// Helper to check evaluation fails
fn assert_fails(source: &str) -> EvalError {
    match interpret(source) {
        Ok(printed) => panic!("Expected {:?} to fail, got {}", source, printed),
        Err(e) => e,
    }
}

// ==================== Arithmetic ====================

#[test]
fn test_interpret_addition() {
    assert_result_int("(+ 1 2)", 3);
    assert_result_int("(+)", 0);
    assert_result_int("(+ 1 2 3 4)", 10);
}

#[test]
fn test_interpret_nested_arithmetic() {
    assert_result_int("(- (* 4 5) (/ 9 3))", 17);
    assert_result_int("(- 5)", -5);
}

#[test]
fn test_interpret_mixed_arithmetic_is_real() {
    assert_prints("(+ 1 2.5)", "3.5");
    assert_prints("(* 2 0.5)", "1.0");
}

#[test]
fn test_interpret_inexact_division() {
    assert_prints("(/ 1 2)", "0.5");
    assert_prints("(/ 2)", "0.5");
    assert_result_int("(/ 12 4)", 3);
}

#[test]
fn test_interpret_division_by_zero() {
    assert_eq!(assert_fails("(/ 1 0)"), EvalError::DivisionByZero);
    assert_eq!(assert_fails("(modulo 1 0)"), EvalError::DivisionByZero);
    assert_prints("(/ 1.0 0)", "inf");
}

#[test]
fn test_interpret_overflow_widens() {
    assert_prints("(+ 9223372036854775807 1)", "9.223372036854776e18");
}

#[test]
fn test_interpret_comparisons() {
    assert_prints("(< 1 2 3)", "T");
    assert_prints("(< 1 3 2)", "()");
    assert_prints("(= 2 2.0)", "T");
    assert_prints("(>= 3 3 1)", "T");
}

#[test]
fn test_interpret_modulo_and_remainder() {
    assert_result_int("(modulo -7 2)", 1);
    assert_result_int("(remainder -7 2)", -1);
    assert_result_int("(modulo 7 -2)", -1);
}

#[test]
fn test_interpret_rounding() {
    assert_prints("(floor 2.5)", "2.0");
    assert_prints("(ceiling 2.1)", "3.0");
    assert_prints("(round 2.5)", "2.0");
    assert_prints("(round 3.5)", "4.0");
    assert_prints("(truncate -2.7)", "-2.0");
    assert_result_int("(floor 7)", 7);
}

#[test]
fn test_interpret_math_functions() {
    assert_result_int("(sqrt 16)", 4);
    assert_prints("(sqrt 2.25)", "1.5");
    assert_result_int("(expt 2 10)", 1024);
    assert_prints("(expt 2 -1)", "0.5");
    assert_result_int("(abs -4)", 4);
    assert_result_int("(min 3 1 2)", 1);
    assert_prints("(max 1 2.0)", "2.0");
    assert_prints("(exp 0)", "1.0");
    assert_prints("(log 8 2)", "3.0");
    assert_prints("(atan 0 1)", "0.0");
}

#[test]
fn test_interpret_numeric_predicates() {
    assert_prints("(number? 1.5)", "T");
    assert_prints("(number? 'a)", "()");
    assert_prints("(integer? 2.0)", "T");
    assert_prints("(integer? 2.5)", "()");
    assert_prints("(zero? 0.0)", "T");
}

// ==================== Special Forms ====================

#[test]
fn test_interpret_quote() {
    assert_prints("'(a b c)", "(A B C)");
    assert_prints("(quote x)", "X");
}

#[test]
fn test_interpret_if() {
    assert_result_int("(if (< 1 2) 10 20)", 10);
    assert_result_int("(if () 10 20)", 20);
    assert_prints("(if () 10)", "()");
}

#[test]
fn test_interpret_only_null_is_false() {
    assert_result_int("(if 0 1 2)", 1);
    assert_result_int(r#"(if "" 1 2)"#, 1);
    assert_result_int("(if #f 1 2)", 2);
    assert_result_int("(if nil 1 2)", 2);
}

#[test]
fn test_interpret_define_and_call() {
    assert_result_int("(define (square x) (* x x)) (square 7)", 49);
    assert_result_int("(define y 5) (+ y 1)", 6);
}

#[test]
fn test_interpret_recursion() {
    assert_result_int(
        "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 10)",
        3628800,
    );
}

#[test]
fn test_interpret_closures_capture() {
    let source = "
(define (make-adder n) (lambda (x) (+ x n)))
(define add5 (make-adder 5))
(add5 10)";
    assert_result_int(source, 15);
}

#[test]
fn test_interpret_closure_counter() {
    let source = "
(define (make-counter)
  (let ((count 0))
    (lambda () (set! count (+ count 1)) count)))
(define c (make-counter))
(c) (c) (c)";
    assert_result_int(source, 3);
}

#[test]
fn test_interpret_rest_parameters() {
    assert_prints("((lambda (a . rest) rest) 1 2 3)", "(2 3)");
    assert_prints("((lambda args args) 1 2)", "(1 2)");
    assert_prints("(define (f . xs) (length xs)) (f)", "0");
}

#[test]
fn test_interpret_let_forms() {
    assert_result_int("(let ((x 2) (y 3)) (* x y))", 6);
    assert_result_int("(let* ((x 2) (y (* x 10))) (+ x y))", 22);
    assert_result_int("(let ((x 1)) (let ((x 2) (y x)) y))", 1);
}

#[test]
fn test_interpret_named_let() {
    let source = "(let loop ((i 0) (acc 0)) (if (> i 100) acc (loop (+ i 1) (+ acc i))))";
    assert_result_int(source, 5050);
}

#[test]
fn test_interpret_deep_tail_recursion() {
    let source = "
(define (count-down n) (if (= n 0) 'done (count-down (- n 1))))
(count-down 100000)";
    assert_prints(source, "DONE");
}

#[test]
fn test_interpret_cond() {
    let source = "
(define (sign n) (cond ((< n 0) 'neg) ((= n 0) 'zero) (else 'pos)))
(list (sign -3) (sign 0) (sign 9))";
    assert_prints(source, "(NEG ZERO POS)");
    assert_prints("(cond (() 1))", "()");
    assert_result_int("(cond ((+ 1 1)))", 2);
}

#[test]
fn test_interpret_and_or() {
    assert_result_int("(and 1 2 3)", 3);
    assert_prints("(and 1 () 3)", "()");
    assert_prints("(and)", "T");
    assert_result_int("(or () 2 3)", 2);
    assert_prints("(or)", "()");
}

#[test]
fn test_interpret_when_unless() {
    assert_result_int("(when (> 2 1) 1 2)", 2);
    assert_prints("(when () 1)", "()");
    assert_result_int("(unless () 7)", 7);
}

#[test]
fn test_interpret_quasiquote() {
    assert_prints("(define x 5) `(a ,x)", "(A 5)");
    assert_prints("(define xs '(1 2)) `(0 ,@xs 3)", "(0 1 2 3)");
    assert_prints("`(1 . ,(+ 1 1))", "(1 . 2)");
    assert_prints("`#(1 ,(+ 1 1))", "#(1 2)");
}

// ==================== Lists ====================

#[test]
fn test_interpret_list_primitives() {
    assert_prints("(cons 1 2)", "(1 . 2)");
    assert_prints("(car '(1 2))", "1");
    assert_prints("(cdr '(1 2))", "(2)");
    assert_result_int("(length '(1 2 3))", 3);
    assert_prints("(append '(1) '(2 3) '(4))", "(1 2 3 4)");
    assert_prints("(append '(1) 2)", "(1 . 2)");
    assert_prints("(reverse '(1 2 3))", "(3 2 1)");
    assert_result_int("(list-ref '(5 6 7) 2)", 7);
}

#[test]
fn test_interpret_higher_order() {
    assert_prints("(map (lambda (x) (* x x)) '(1 2 3))", "(1 4 9)");
    assert_prints("(map + '(1 2) '(10 20 30))", "(11 22)");
    assert_result_int("(apply + 1 2 '(3 4))", 10);
}

#[test]
fn test_interpret_equality() {
    assert_prints("(eq? 'a 'a)", "T");
    assert_prints("(eq? '(1) '(1))", "()");
    assert_prints("(equal? '(1 (2)) '(1 (2)))", "T");
    assert_prints("(not ())", "T");
}

// ==================== Strings, Vectors, Tables ====================

#[test]
fn test_interpret_strings() {
    assert_prints(r#"(string-append "ab" "cd")"#, r#""abcd""#);
    assert_result_int(r#"(string-length "héllo")"#, 5);
    assert_prints("(symbol->string 'abc)", r#""ABC""#);
    assert_prints(r#"(string->symbol "xyz")"#, "XYZ");
    assert_prints("(number->string 2.5)", r#""2.5""#);
}

#[test]
fn test_interpret_vectors() {
    assert_prints("(make-vector 3 0)", "#(0 0 0)");
    assert_prints("(define v (vector 1 2 3)) (vector-set! v 0 9) v", "#(9 2 3)");
    assert_result_int("(vector-length (vector 1 2))", 2);
    assert_result_int("(vector-ref #(4 5) 1)", 5);
}

#[test]
fn test_interpret_self_referencing_containers() {
    let vector = "(define v (make-vector 2 1)) (vector-set! v 1 v)";
    assert_prints(&format!("{} v", vector), "#(1 #<cycle>)");
    assert_prints(&format!("{} (equal? v (vector 1 v))", vector), "T");
    assert_prints(&format!("{} (equal? v (vector 2 v))", vector), "()");

    let table = "(define t (make-table)) (table-set! t 'self t)";
    assert_prints(&format!("{} (eq? t (table-get t 'self))", table), "T");
}

#[test]
fn test_interpret_tables() {
    let source = r#"
(define t (make-table))
(table-set! t 'speed 3)
(table-set! t "mass" 2)
(list (table-get t 'speed) (table-get t 'mass) (table-get t 'none 0) (table-keys t))"#;
    assert_prints(source, "(3 2 0 (SPEED MASS))");
}

#[test]
fn test_interpret_type_predicates() {
    assert_prints("(procedure? car)", "T");
    assert_prints("(procedure? (lambda () 1))", "T");
    assert_prints("(symbol? 'a)", "T");
    assert_prints(r#"(string? "a")"#, "T");
    assert_prints(r"(char? #\a)", "T");
    assert_prints("(vector? #(1))", "T");
    assert_prints("(table? (make-table))", "T");
    assert_prints("(pair? '())", "()");
    assert_prints("(null? '())", "T");
}

#[test]
fn test_interpret_printed_procedures() {
    assert_prints("(define (sq x) (* x x)) sq", "<lambda SQ>");
    assert_prints("car", "<func CAR>");
}

// ==================== Host Functions ====================

#[test]
fn test_interpret_env_read_write() {
    let mut env = Environment::new();
    env.set("mass", 2.0);
    let printed = interpret_in(
        &mut env,
        r#"(set-env! "force" (* (get-env "mass") 9.5)) (get-env "force")"#,
    )
    .unwrap();
    assert_eq!(printed, "19.0");
    assert_eq!(env.get("force"), Some(19.0));
}

#[test]
fn test_interpret_has_env() {
    let mut env = Environment::new();
    env.set("a", 1.0);
    assert_eq!(interpret_in(&mut env, r#"(has-env? "a")"#).unwrap(), "T");
    assert_eq!(interpret_in(&mut env, r#"(has-env? "b")"#).unwrap(), "()");
    let guarded = r#"(if (has-env? "b") (get-env "b") -1)"#;
    assert_eq!(interpret_in(&mut env, guarded).unwrap(), "-1");
}

// ==================== Errors ====================

#[test]
fn test_interpret_unknown_variable() {
    let err = assert_fails("(+ 1 nope)");
    assert_eq!(
        err,
        EvalError::UnknownVar {
            name: "NOPE".to_string()
        }
    );
}

#[test]
fn test_interpret_calling_a_number() {
    let err = assert_fails("(1 2)");
    assert!(matches!(err, EvalError::BadOp { found: "int", .. }));
}

#[test]
fn test_interpret_bad_argument_type() {
    let err = assert_fails("(+ 1 'a)");
    assert!(matches!(err, EvalError::BadArg { found: "symbol", .. }));
    let err = assert_fails("(car 5)");
    assert!(matches!(err, EvalError::BadArg { found: "int", .. }));
}

#[test]
fn test_interpret_arity_mismatch() {
    let err = assert_fails("(car 1 2)");
    assert!(matches!(err, EvalError::ArityMismatch { found: 2, .. }));
    let err = assert_fails("(define (f x) x) (f)");
    assert!(matches!(err, EvalError::ArityMismatch { found: 0, .. }));
}

#[test]
fn test_interpret_out_of_bounds() {
    let err = assert_fails("(vector-ref (vector 1 2) 5)");
    assert!(matches!(err, EvalError::OutOfBounds { index: 5, len: 2, .. }));
}

#[test]
fn test_interpret_oversized_vector() {
    for len in ["4611686018427387903", "16777217"] {
        let err = assert_fails(&format!("(vector-length (make-vector {}))", len));
        assert!(
            matches!(err, EvalError::BadArg { ref func, .. } if func == "MAKE-VECTOR"),
            "for {}: {:?}",
            len,
            err
        );
    }
    assert!(matches!(
        assert_fails("(make-vector -1)"),
        EvalError::BadArg { .. }
    ));
}

#[test]
fn test_interpret_malformed_forms() {
    assert!(matches!(assert_fails("(if)"), EvalError::FormSyntax { form: "IF", .. }));
    assert!(matches!(assert_fails("(let ((x)) x)"), EvalError::FormSyntax { .. }));
    assert!(matches!(assert_fails(",x"), EvalError::FormSyntax { form: "UNQUOTE", .. }));
}

#[test]
fn test_interpret_deep_non_tail_recursion_is_bounded() {
    let err = assert_fails("(define (f n) (+ 1 (f (+ n 1)))) (f 0)");
    assert!(matches!(err, EvalError::DepthExceeded { limit: 256 }));
}
