//! Base library installed into every interpreter
//!
//! Integers stay exact while results are representable and widen to reals
//! otherwise. There is no system library: nothing here touches files,
//! processes or the clock.

use std::cmp::Ordering;

use super::eval::Interpreter;
use super::host::HostContext;
use super::value::{Arity, EvalResult, NativeFn, Value};
use crate::diagnostics::EvalError;

const BASE_LIBRARY: &[(&str, Arity, NativeFn)] = &[
    // Arithmetic
    ("+", Arity::AtLeast(0), add),
    ("-", Arity::AtLeast(1), sub),
    ("*", Arity::AtLeast(0), mul),
    ("/", Arity::AtLeast(1), div),
    ("=", Arity::AtLeast(1), num_eq),
    ("<", Arity::AtLeast(1), num_lt),
    (">", Arity::AtLeast(1), num_gt),
    ("<=", Arity::AtLeast(1), num_le),
    (">=", Arity::AtLeast(1), num_ge),
    ("MODULO", Arity::Exact(2), modulo),
    ("REMAINDER", Arity::Exact(2), remainder),
    ("ABS", Arity::Exact(1), abs),
    ("MIN", Arity::AtLeast(1), min),
    ("MAX", Arity::AtLeast(1), max),
    ("FLOOR", Arity::Exact(1), floor),
    ("CEILING", Arity::Exact(1), ceiling),
    ("ROUND", Arity::Exact(1), round),
    ("TRUNCATE", Arity::Exact(1), truncate),
    ("SQRT", Arity::Exact(1), sqrt),
    ("EXPT", Arity::Exact(2), expt),
    ("EXP", Arity::Exact(1), exp),
    ("LOG", Arity::Range(1, 2), log),
    ("SIN", Arity::Exact(1), sin),
    ("COS", Arity::Exact(1), cos),
    ("TAN", Arity::Exact(1), tan),
    ("ATAN", Arity::Range(1, 2), atan),
    ("NUMBER?", Arity::Exact(1), is_number),
    ("INTEGER?", Arity::Exact(1), is_integer),
    ("ZERO?", Arity::Exact(1), is_zero),
    // Lists
    ("CONS", Arity::Exact(2), cons),
    ("CAR", Arity::Exact(1), car),
    ("CDR", Arity::Exact(1), cdr),
    ("LIST", Arity::AtLeast(0), list),
    ("LENGTH", Arity::Exact(1), length),
    ("APPEND", Arity::AtLeast(0), append),
    ("REVERSE", Arity::Exact(1), reverse),
    ("LIST-REF", Arity::Exact(2), list_ref),
    ("NULL?", Arity::Exact(1), is_null),
    ("PAIR?", Arity::Exact(1), is_pair),
    ("EQ?", Arity::Exact(2), is_eq),
    ("EQUAL?", Arity::Exact(2), is_equal),
    ("NOT", Arity::Exact(1), not),
    ("APPLY", Arity::AtLeast(2), apply),
    ("MAP", Arity::AtLeast(2), map),
    // Symbols, strings, characters
    ("SYMBOL?", Arity::Exact(1), is_symbol),
    ("STRING?", Arity::Exact(1), is_string),
    ("CHAR?", Arity::Exact(1), is_char),
    ("PROCEDURE?", Arity::Exact(1), is_procedure),
    ("STRING-LENGTH", Arity::Exact(1), string_length),
    ("STRING-APPEND", Arity::AtLeast(0), string_append),
    ("SYMBOL->STRING", Arity::Exact(1), symbol_to_string),
    ("STRING->SYMBOL", Arity::Exact(1), string_to_symbol),
    ("NUMBER->STRING", Arity::Exact(1), number_to_string),
    // Vectors
    ("VECTOR", Arity::AtLeast(0), vector),
    ("MAKE-VECTOR", Arity::Range(1, 2), make_vector),
    ("VECTOR-REF", Arity::Exact(2), vector_ref),
    ("VECTOR-SET!", Arity::Exact(3), vector_set),
    ("VECTOR-LENGTH", Arity::Exact(1), vector_length),
    ("VECTOR?", Arity::Exact(1), is_vector),
    // Tables
    ("MAKE-TABLE", Arity::Exact(0), make_table),
    ("TABLE-GET", Arity::Range(2, 3), table_get),
    ("TABLE-SET!", Arity::Exact(3), table_set),
    ("TABLE-KEYS", Arity::Exact(1), table_keys),
    ("TABLE?", Arity::Exact(1), is_table),
];

/// Register the base library in the global scope
pub fn install(interp: &mut Interpreter) {
    for &(name, arity, func) in BASE_LIBRARY {
        interp.define_native(name, arity, func);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bad_arg(func: &str, expected: &'static str, found: &Value) -> EvalError {
    EvalError::BadArg {
        func: func.to_string(),
        expected,
        found: found.type_name(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Real(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Real(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Real(f) => Value::Real(f),
        }
    }
}

fn number(func: &str, value: &Value) -> Result<Num, EvalError> {
    match value {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Real(f) => Ok(Num::Real(*f)),
        other => Err(bad_arg(func, "a number", other)),
    }
}

fn real(func: &str, value: &Value) -> Result<f64, EvalError> {
    number(func, value).map(Num::to_f64)
}

fn integer(func: &str, value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(bad_arg(func, "an integer", other)),
    }
}

/// Checked index into a sequence of `len`
fn index(func: &str, value: &Value, len: usize) -> Result<usize, EvalError> {
    let i = integer(func, value)?;
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| EvalError::OutOfBounds {
            func: func.to_string(),
            index: i,
            len,
        })
}

fn proper_list(func: &str, value: &Value) -> Result<Vec<Value>, EvalError> {
    value.list_to_vec().ok_or_else(|| bad_arg(func, "a proper list", value))
}

/// Integer op when both sides are exact and it doesn't overflow, else real
fn arith(a: Num, b: Num, int_op: fn(i64, i64) -> Option<i64>, real_op: fn(f64, f64) -> f64) -> Num {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        if let Some(n) = int_op(x, y) {
            return Num::Int(n);
        }
    }
    Num::Real(real_op(a.to_f64(), b.to_f64()))
}

fn compare(a: Num, b: Num) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        _ => a.to_f64().partial_cmp(&b.to_f64()),
    }
}

fn compare_chain(
    interp: &Interpreter,
    func: &str,
    args: &[Value],
    holds: fn(Ordering) -> bool,
) -> EvalResult {
    let nums = args
        .iter()
        .map(|v| number(func, v))
        .collect::<Result<Vec<_>, _>>()?;
    let ok = nums
        .windows(2)
        .all(|w| compare(w[0], w[1]).is_some_and(holds));
    Ok(interp.boolean(ok))
}

fn round_num(func: &str, value: &Value, op: fn(f64) -> f64) -> EvalResult {
    match number(func, value)? {
        Num::Int(n) => Ok(Value::Int(n)),
        Num::Real(f) => Ok(Value::Real(op(f))),
    }
}

fn float_fn(func: &str, value: &Value, op: fn(f64) -> f64) -> EvalResult {
    Ok(Value::Real(op(real(func, value)?)))
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

fn add(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let mut acc = Num::Int(0);
    for arg in args {
        acc = arith(acc, number("+", arg)?, i64::checked_add, |a, b| a + b);
    }
    Ok(acc.into_value())
}

fn mul(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let mut acc = Num::Int(1);
    for arg in args {
        acc = arith(acc, number("*", arg)?, i64::checked_mul, |a, b| a * b);
    }
    Ok(acc.into_value())
}

fn sub(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let first = number("-", &args[0])?;
    if args.len() == 1 {
        return Ok(arith(Num::Int(0), first, i64::checked_sub, |a, b| a - b).into_value());
    }
    let mut acc = first;
    for arg in &args[1..] {
        acc = arith(acc, number("-", arg)?, i64::checked_sub, |a, b| a - b);
    }
    Ok(acc.into_value())
}

fn divide(a: Num, b: Num) -> Result<Num, EvalError> {
    match (a, b) {
        (Num::Int(_), Num::Int(0)) => Err(EvalError::DivisionByZero),
        (Num::Int(x), Num::Int(y)) => match (x.checked_rem(y), x.checked_div(y)) {
            (Some(0), Some(q)) => Ok(Num::Int(q)),
            _ => Ok(Num::Real(x as f64 / y as f64)),
        },
        _ => Ok(Num::Real(a.to_f64() / b.to_f64())),
    }
}

fn div(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let first = number("/", &args[0])?;
    if args.len() == 1 {
        return divide(Num::Int(1), first).map(Num::into_value);
    }
    let mut acc = first;
    for arg in &args[1..] {
        acc = divide(acc, number("/", arg)?)?;
    }
    Ok(acc.into_value())
}

fn num_eq(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    compare_chain(interp, "=", args, Ordering::is_eq)
}

fn num_lt(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    compare_chain(interp, "<", args, Ordering::is_lt)
}

fn num_gt(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    compare_chain(interp, ">", args, Ordering::is_gt)
}

fn num_le(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    compare_chain(interp, "<=", args, Ordering::is_le)
}

fn num_ge(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    compare_chain(interp, ">=", args, Ordering::is_ge)
}

/// Result takes the sign of the divisor
fn modulo(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    match (number("MODULO", &args[0])?, number("MODULO", &args[1])?) {
        (Num::Int(_), Num::Int(0)) => Err(EvalError::DivisionByZero),
        (Num::Int(x), Num::Int(y)) => {
            let r = x.checked_rem(y).unwrap_or(0);
            let adjusted = if r != 0 && (r < 0) != (y < 0) { r + y } else { r };
            Ok(Value::Int(adjusted))
        }
        (a, b) => {
            let (x, y) = (a.to_f64(), b.to_f64());
            let r = x % y;
            let adjusted = if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r };
            Ok(Value::Real(adjusted))
        }
    }
}

/// Result takes the sign of the dividend
fn remainder(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    match (number("REMAINDER", &args[0])?, number("REMAINDER", &args[1])?) {
        (Num::Int(_), Num::Int(0)) => Err(EvalError::DivisionByZero),
        (Num::Int(x), Num::Int(y)) => Ok(Value::Int(x.checked_rem(y).unwrap_or(0))),
        (a, b) => Ok(Value::Real(a.to_f64() % b.to_f64())),
    }
}

fn abs(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    match number("ABS", &args[0])? {
        Num::Int(n) => Ok(n
            .checked_abs()
            .map_or(Value::Real((n as f64).abs()), Value::Int)),
        Num::Real(f) => Ok(Value::Real(f.abs())),
    }
}

fn extremum(func: &str, args: &[Value], pick: Ordering) -> EvalResult {
    let nums = args
        .iter()
        .map(|v| number(func, v))
        .collect::<Result<Vec<_>, _>>()?;
    let any_real = nums.iter().any(|n| matches!(n, Num::Real(_)));
    let mut best = nums[0];
    for &n in &nums[1..] {
        if compare(n, best) == Some(pick) {
            best = n;
        }
    }
    if any_real {
        Ok(Value::Real(best.to_f64()))
    } else {
        Ok(best.into_value())
    }
}

fn min(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    extremum("MIN", args, Ordering::Less)
}

fn max(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    extremum("MAX", args, Ordering::Greater)
}

fn floor(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    round_num("FLOOR", &args[0], f64::floor)
}

fn ceiling(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    round_num("CEILING", &args[0], f64::ceil)
}

/// Halves round to even
fn round(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    round_num("ROUND", &args[0], f64::round_ties_even)
}

fn truncate(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    round_num("TRUNCATE", &args[0], f64::trunc)
}

/// Exact for perfect squares
fn sqrt(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    match number("SQRT", &args[0])? {
        Num::Int(n) if n >= 0 => {
            let root = (n as f64).sqrt().round() as i64;
            if root.checked_mul(root) == Some(n) {
                Ok(Value::Int(root))
            } else {
                Ok(Value::Real((n as f64).sqrt()))
            }
        }
        other => Ok(Value::Real(other.to_f64().sqrt())),
    }
}

fn expt(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let base = number("EXPT", &args[0])?;
    let power = number("EXPT", &args[1])?;
    if let (Num::Int(b), Num::Int(p)) = (base, power) {
        if let Some(n) = u32::try_from(p).ok().and_then(|p| b.checked_pow(p)) {
            return Ok(Value::Int(n));
        }
    }
    Ok(Value::Real(base.to_f64().powf(power.to_f64())))
}

fn exp(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    float_fn("EXP", &args[0], f64::exp)
}

/// Natural log, or log in the base given as second argument
fn log(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let x = real("LOG", &args[0])?;
    match args.get(1) {
        Some(base) => Ok(Value::Real(x.log(real("LOG", base)?))),
        None => Ok(Value::Real(x.ln())),
    }
}

fn sin(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    float_fn("SIN", &args[0], f64::sin)
}

fn cos(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    float_fn("COS", &args[0], f64::cos)
}

fn tan(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    float_fn("TAN", &args[0], f64::tan)
}

fn atan(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let y = real("ATAN", &args[0])?;
    match args.get(1) {
        Some(x) => Ok(Value::Real(y.atan2(real("ATAN", x)?))),
        None => Ok(Value::Real(y.atan())),
    }
}

fn is_number(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::Int(_) | Value::Real(_))))
}

fn is_integer(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let integral = match args[0] {
        Value::Int(_) => true,
        Value::Real(f) => f.is_finite() && f.fract() == 0.0,
        _ => false,
    };
    Ok(interp.boolean(integral))
}

fn is_zero(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let zero = real("ZERO?", &args[0])? == 0.0;
    Ok(interp.boolean(zero))
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

fn cons(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn car(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    args[0]
        .car()
        .cloned()
        .ok_or_else(|| bad_arg("CAR", "a pair", &args[0]))
}

fn cdr(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    args[0]
        .cdr()
        .cloned()
        .ok_or_else(|| bad_arg("CDR", "a pair", &args[0]))
}

fn list(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(Value::list(args.to_vec()))
}

fn length(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let items = proper_list("LENGTH", &args[0])?;
    Ok(Value::Int(items.len() as i64))
}

/// Every argument but the last must be a proper list; the last becomes the tail
fn append(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Null);
    };
    let mut items = Vec::new();
    for arg in init {
        items.extend(proper_list("APPEND", arg)?);
    }
    Ok(Value::list_with_tail(items, last.clone()))
}

fn reverse(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let mut items = proper_list("REVERSE", &args[0])?;
    items.reverse();
    Ok(Value::list(items))
}

fn list_ref(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let items = proper_list("LIST-REF", &args[0])?;
    let i = index("LIST-REF", &args[1], items.len())?;
    Ok(items[i].clone())
}

fn is_null(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(args[0].is_null()))
}

fn is_pair(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::Pair(_))))
}

// ---------------------------------------------------------------------------
// Equivalence and application
// ---------------------------------------------------------------------------

fn is_eq(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(args[0].eqv(&args[1])))
}

fn is_equal(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(args[0] == args[1]))
}

fn not(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(!args[0].is_truthy()))
}

/// `(apply f a b '(c d))` calls `(f a b c d)`
fn apply(interp: &mut Interpreter, host: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let (spread, init) = args[1..]
        .split_last()
        .ok_or_else(|| bad_arg("APPLY", "an argument list", &Value::Null))?;
    let mut call_args = init.to_vec();
    call_args.extend(proper_list("APPLY", spread)?);
    interp.apply(&args[0], call_args, host)
}

/// Maps over one or more lists, stopping at the shortest
fn map(interp: &mut Interpreter, host: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let lists = args[1..]
        .iter()
        .map(|l| proper_list("MAP", l))
        .collect::<Result<Vec<_>, _>>()?;
    let len = lists.iter().map(Vec::len).min().unwrap_or(0);

    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let call_args = lists.iter().map(|l| l[i].clone()).collect();
        out.push(interp.apply(&args[0], call_args, host)?);
    }
    Ok(Value::list(out))
}

// ---------------------------------------------------------------------------
// Symbols, strings, characters
// ---------------------------------------------------------------------------

fn is_symbol(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::Symbol(_))))
}

fn is_string(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::String(_))))
}

fn is_char(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::Char(_))))
}

fn is_procedure(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::Lambda(_) | Value::Func(_))))
}

fn string_length(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let s = args[0]
        .as_string()
        .ok_or_else(|| bad_arg("STRING-LENGTH", "a string", &args[0]))?;
    Ok(Value::Int(s.chars().count() as i64))
}

fn string_append(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let mut out = String::new();
    for arg in args {
        let s = arg
            .as_string()
            .ok_or_else(|| bad_arg("STRING-APPEND", "a string", arg))?;
        out.push_str(s);
    }
    Ok(Value::string(out))
}

fn symbol_to_string(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let symbol = args[0]
        .as_symbol()
        .ok_or_else(|| bad_arg("SYMBOL->STRING", "a symbol", &args[0]))?;
    Ok(Value::string(interp.symbols().name(symbol)))
}

fn string_to_symbol(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let name = args[0]
        .as_string()
        .ok_or_else(|| bad_arg("STRING->SYMBOL", "a string", &args[0]))?;
    Ok(Value::Symbol(interp.intern(name)))
}

fn number_to_string(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    number("NUMBER->STRING", &args[0])?;
    Ok(Value::string(interp.print(&args[0])))
}

// ---------------------------------------------------------------------------
// Vectors
// ---------------------------------------------------------------------------

fn vector(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(Value::vector(args.to_vec()))
}

/// Longest vector `MAKE-VECTOR` will allocate
const MAX_VECTOR_LEN: usize = 1 << 24;

fn make_vector(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let n = integer("MAKE-VECTOR", &args[0])?;
    let len = usize::try_from(n).map_err(|_| bad_arg("MAKE-VECTOR", "a non-negative length", &args[0]))?;
    let too_long = || bad_arg("MAKE-VECTOR", "a length of at most 16777216", &args[0]);
    if len > MAX_VECTOR_LEN {
        return Err(too_long());
    }
    let mut items = Vec::new();
    items.try_reserve_exact(len).map_err(|_| too_long())?;
    items.resize(len, args.get(1).cloned().unwrap_or(Value::Null));
    Ok(Value::vector(items))
}

fn vector_ref(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let Value::Vector(items) = &args[0] else {
        return Err(bad_arg("VECTOR-REF", "a vector", &args[0]));
    };
    let items = items.borrow();
    let i = index("VECTOR-REF", &args[1], items.len())?;
    Ok(items[i].clone())
}

fn vector_set(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let Value::Vector(items) = &args[0] else {
        return Err(bad_arg("VECTOR-SET!", "a vector", &args[0]));
    };
    {
        let mut items = items.borrow_mut();
        let i = index("VECTOR-SET!", &args[1], items.len())?;
        items[i] = args[2].clone();
    }
    interp.note_mutation(&args[0]);
    Ok(Value::Null)
}

fn vector_length(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let Value::Vector(items) = &args[0] else {
        return Err(bad_arg("VECTOR-LENGTH", "a vector", &args[0]));
    };
    Ok(Value::Int(items.borrow().len() as i64))
}

fn is_vector(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::Vector(_))))
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Table keys are symbols; strings are interned
fn table_key(interp: &mut Interpreter, func: &str, key: &Value) -> Result<super::symbols::Symbol, EvalError> {
    match key {
        Value::Symbol(s) => Ok(*s),
        Value::String(s) => Ok(interp.intern(s)),
        other => Err(bad_arg(func, "a symbol or string key", other)),
    }
}

fn make_table(_: &mut Interpreter, _: &mut HostContext<'_>, _: &[Value]) -> EvalResult {
    Ok(Value::table())
}

fn table_get(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let Value::Table(table) = &args[0] else {
        return Err(bad_arg("TABLE-GET", "a table", &args[0]));
    };
    let key = table_key(interp, "TABLE-GET", &args[1])?;
    let found = table.borrow().get(&key).cloned();
    Ok(found.or_else(|| args.get(2).cloned()).unwrap_or(Value::Null))
}

fn table_set(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let Value::Table(table) = &args[0] else {
        return Err(bad_arg("TABLE-SET!", "a table", &args[0]));
    };
    let key = table_key(interp, "TABLE-SET!", &args[1])?;
    table.borrow_mut().insert(key, args[2].clone());
    interp.note_mutation(&args[0]);
    Ok(Value::Null)
}

fn table_keys(_: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let Value::Table(table) = &args[0] else {
        return Err(bad_arg("TABLE-KEYS", "a table", &args[0]));
    };
    let keys: Vec<Value> = table.borrow().keys().map(|k| Value::Symbol(*k)).collect();
    Ok(Value::list(keys))
}

fn is_table(interp: &mut Interpreter, _: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    Ok(interp.boolean(matches!(args[0], Value::Table(_))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arith_widens_on_overflow() {
        let sum = arith(Num::Int(i64::MAX), Num::Int(1), i64::checked_add, |a, b| a + b);
        assert!(matches!(sum, Num::Real(_)));
        let exact = arith(Num::Int(2), Num::Int(3), i64::checked_mul, |a, b| a * b);
        assert!(matches!(exact, Num::Int(6)));
    }

    #[test]
    fn test_divide_exact_and_inexact() {
        assert!(matches!(divide(Num::Int(6), Num::Int(3)), Ok(Num::Int(2))));
        assert!(matches!(divide(Num::Int(1), Num::Int(2)), Ok(Num::Real(r)) if r == 0.5));
        assert!(matches!(
            divide(Num::Int(1), Num::Int(0)),
            Err(EvalError::DivisionByZero)
        ));
        assert!(matches!(divide(Num::Real(1.0), Num::Int(0)), Ok(Num::Real(r)) if r.is_infinite()));
    }

    #[test]
    fn test_base_library_names_are_unique() {
        let mut names: Vec<&str> = BASE_LIBRARY.iter().map(|(name, _, _)| *name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
