//! Runtime values for the interpreter

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet};

use super::eval::Interpreter;
use super::host::HostContext;
use super::scope::FrameId;
use super::symbols::{Symbol, SymbolTable};
use crate::diagnostics::EvalError;

/// Result of evaluating or applying anything
pub type EvalResult = Result<Value, EvalError>;

/// Signature of every native function, base library and host alike
pub type NativeFn = fn(&mut Interpreter, &mut HostContext<'_>, &[Value]) -> EvalResult;

/// Symbol-keyed table
pub type Table = IndexMap<Symbol, Value, FxBuildHasher>;

/// Runtime value
#[derive(Clone)]
pub enum Value {
    /// Empty list, also the only false value
    Null,
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Real(f64),
    Char(char),
    /// Cons cell
    Pair(Rc<Pair>),
    Symbol(Symbol),
    /// Immutable string
    String(Rc<str>),
    /// User-defined closure
    Lambda(Rc<Lambda>),
    /// Native function
    Func(Native),
    /// Mutable symbol-keyed table
    Table(Rc<RefCell<Table>>),
    /// Mutable vector
    Vector(Rc<RefCell<Vec<Value>>>),
}

#[derive(Clone)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

/// Unlinks owned cells into a worklist so long or deeply nested lists
/// drop without recursing once per cell.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_pair(&mut self.car, &mut pending);
        detach_pair(&mut self.cdr, &mut pending);
        while let Some(cell) = pending.pop() {
            // Shared cells only lose a reference.
            if let Ok(mut pair) = Rc::try_unwrap(cell) {
                detach_pair(&mut pair.car, &mut pending);
                detach_pair(&mut pair.cdr, &mut pending);
            }
        }
    }
}

fn detach_pair(slot: &mut Value, pending: &mut Vec<Rc<Pair>>) {
    if matches!(slot, Value::Pair(_)) {
        if let Value::Pair(cell) = std::mem::replace(slot, Value::Null) {
            pending.push(cell);
        }
    }
}

/// Closure over a frame of the owning interpreter
pub struct Lambda {
    pub name: Option<Symbol>,
    pub params: Vec<Symbol>,
    /// Collects remaining arguments as a list
    pub rest: Option<Symbol>,
    pub body: Vec<Value>,
    pub frame: FrameId,
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{}", k),
            Arity::AtLeast(k) => write!(f, "at least {}", k),
            Arity::Range(lo, hi) => write!(f, "{} to {}", lo, hi),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

/// Type tag of a value, used for result classification and messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Int,
    Real,
    Char,
    Pair,
    Symbol,
    String,
    Lambda,
    Func,
    Table,
    Vector,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Int => "int",
            ValueKind::Real => "real",
            ValueKind::Char => "char",
            ValueKind::Pair => "pair",
            ValueKind::Symbol => "symbol",
            ValueKind::String => "string",
            ValueKind::Lambda => "lambda",
            ValueKind::Func => "func",
            ValueKind::Table => "table",
            ValueKind::Vector => "vector",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Int(_) => ValueKind::Int,
            Value::Real(_) => ValueKind::Real,
            Value::Char(_) => ValueKind::Char,
            Value::Pair(_) => ValueKind::Pair,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::String(_) => ValueKind::String,
            Value::Lambda(_) => ValueKind::Lambda,
            Value::Func(_) => ValueKind::Func,
            Value::Table(_) => ValueKind::Table,
            Value::Vector(_) => ValueKind::Vector,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Everything except null is true
    pub fn is_truthy(&self) -> bool {
        !self.is_null()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(Pair { car, cdr }))
    }

    /// Build a proper list
    pub fn list(items: impl IntoIterator<Item = Value, IntoIter: DoubleEndedIterator>) -> Value {
        Self::list_with_tail(items, Value::Null)
    }

    /// Build a list ending in `tail` instead of null
    pub fn list_with_tail(
        items: impl IntoIterator<Item = Value, IntoIter: DoubleEndedIterator>,
        tail: Value,
    ) -> Value {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(Rc::new(RefCell::new(items)))
    }

    pub fn table() -> Value {
        Value::Table(Rc::new(RefCell::new(Table::default())))
    }

    pub fn car(&self) -> Option<&Value> {
        match self {
            Value::Pair(p) => Some(&p.car),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<&Value> {
        match self {
            Value::Pair(p) => Some(&p.cdr),
            _ => None,
        }
    }

    /// Collect a proper list into a vector; `None` for improper lists
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Value::Null => return Some(out),
                Value::Pair(p) => {
                    out.push(p.car.clone());
                    cur = &p.cdr;
                }
                _ => return None,
            }
        }
    }

    /// Try to get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as float; integers widen
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Identity comparison (`EQ?`): numbers, chars, symbols by value,
    /// heap objects by reference
    pub fn eqv(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => a.name == b.name,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Wrap in a printer that resolves symbol names
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> Printed<'a> {
        Printed {
            value: self,
            symbols,
        }
    }
}

/// Structural equality (`EQUAL?`)
///
/// Walks both values with an explicit worklist. A pair of vectors already
/// under comparison is assumed equal, so cyclic vectors terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        let mut seen: FxHashSet<(*const RefCell<Vec<Value>>, *const RefCell<Vec<Value>>)> =
            FxHashSet::default();

        while let Some((a, b)) = pending.pop() {
            match (&a, &b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    if !Rc::ptr_eq(x, y) {
                        pending.push((x.cdr.clone(), y.cdr.clone()));
                        pending.push((x.car.clone(), y.car.clone()));
                    }
                }
                (Value::String(x), Value::String(y)) => {
                    if x != y {
                        return false;
                    }
                }
                (Value::Vector(x), Value::Vector(y)) => {
                    if Rc::ptr_eq(x, y) || !seen.insert((Rc::as_ptr(x), Rc::as_ptr(y))) {
                        continue;
                    }
                    let (xs, ys) = (x.borrow(), y.borrow());
                    if xs.len() != ys.len() {
                        return false;
                    }
                    pending.extend(xs.iter().cloned().zip(ys.iter().cloned()));
                }
                _ => {
                    if !a.eqv(&b) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Nesting printed before the rest is elided as `...`
const PRINT_DEPTH: usize = 512;

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_at(f, 0)
    }
}

impl Value {
    fn debug_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth > PRINT_DEPTH {
            return f.write_str("...");
        }
        match self {
            Value::Null => write!(f, "Null"),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Real(n) => write!(f, "Real({:?})", n),
            Value::Char(c) => write!(f, "Char({:?})", c),
            Value::Pair(_) => {
                f.write_str("List[")?;
                let mut cur = self;
                let mut first = true;
                loop {
                    match cur {
                        Value::Pair(p) => {
                            if !first {
                                f.write_str(", ")?;
                            }
                            p.car.debug_at(f, depth + 1)?;
                            first = false;
                            cur = &p.cdr;
                        }
                        Value::Null => break,
                        tail => {
                            f.write_str("; ")?;
                            tail.debug_at(f, depth + 1)?;
                            break;
                        }
                    }
                }
                f.write_str("]")
            }
            Value::Symbol(s) => write!(f, "Symbol({:?})", s),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Lambda(_) => write!(f, "Lambda"),
            Value::Func(n) => write!(f, "Func({})", n.name),
            Value::Table(t) => write!(f, "Table(len={})", t.borrow().len()),
            Value::Vector(v) => {
                f.write_str("Vector[")?;
                for (i, item) in v.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.debug_at(f, depth + 1)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Value paired with the symbol table needed to print it
pub struct Printed<'a> {
    value: &'a Value,
    symbols: &'a SymbolTable,
}

impl fmt::Display for Printed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, self.value, 0, &mut Vec::new())
    }
}

impl Printed<'_> {
    /// `open` holds the vectors currently being printed; meeting one of
    /// them again prints `#<cycle>`.
    fn write(
        &self,
        f: &mut fmt::Formatter<'_>,
        value: &Value,
        depth: usize,
        open: &mut Vec<*const RefCell<Vec<Value>>>,
    ) -> fmt::Result {
        if depth > PRINT_DEPTH {
            return f.write_str("...");
        }
        match value {
            Value::Null => write!(f, "()"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(n) => write!(f, "{:?}", n),
            Value::Char(c) => match c {
                ' ' => write!(f, "#\\space"),
                '\n' => write!(f, "#\\newline"),
                '\t' => write!(f, "#\\tab"),
                c => write!(f, "#\\{}", c),
            },
            Value::Pair(_) => {
                write!(f, "(")?;
                let mut cur = value;
                let mut first = true;
                loop {
                    match cur {
                        Value::Pair(p) => {
                            if !first {
                                write!(f, " ")?;
                            }
                            self.write(f, &p.car, depth + 1, open)?;
                            first = false;
                            cur = &p.cdr;
                        }
                        Value::Null => break,
                        tail => {
                            write!(f, " . ")?;
                            self.write(f, tail, depth + 1, open)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Symbol(s) => write!(f, "{}", self.symbols.name(*s)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Lambda(l) => match l.name {
                Some(name) => write!(f, "<lambda {}>", self.symbols.name(name)),
                None => write!(f, "<lambda>"),
            },
            Value::Func(n) => write!(f, "<func {}>", n.name),
            Value::Table(t) => write!(f, "#<table {}>", t.borrow().len()),
            Value::Vector(v) => {
                let ptr = Rc::as_ptr(v);
                if open.contains(&ptr) {
                    return write!(f, "#<cycle>");
                }
                open.push(ptr);
                write!(f, "#(")?;
                for (i, item) in v.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    self.write(f, item, depth + 1, open)?;
                }
                open.pop();
                write!(f, ")")
            }
        }
    }
}

/// Weak handle to a vector or table that has been mutated in place.
///
/// Only `VECTOR-SET!` and `TABLE-SET!` can close a reference cycle, so the
/// interpreter records their targets and breaks any cycle through them
/// when it drops.
pub enum Mutated {
    Vector(Weak<RefCell<Vec<Value>>>),
    Table(Weak<RefCell<Table>>),
}

impl Mutated {
    pub fn of(value: &Value) -> Option<(usize, Mutated)> {
        match value {
            Value::Vector(v) => Some((Rc::as_ptr(v) as usize, Mutated::Vector(Rc::downgrade(v)))),
            Value::Table(t) => Some((Rc::as_ptr(t) as usize, Mutated::Table(Rc::downgrade(t)))),
            _ => None,
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Mutated::Vector(w) => w.strong_count() > 0,
            Mutated::Table(w) => w.strong_count() > 0,
        }
    }

    /// Empty the container if it can reach itself. Returns whether it did.
    pub fn break_cycle(&self) -> bool {
        match self {
            Mutated::Vector(w) => {
                let Some(v) = w.upgrade() else { return false };
                let children: Vec<Value> = v.borrow().clone();
                if !reaches(Rc::as_ptr(&v) as usize, children) {
                    return false;
                }
                let items = std::mem::take(&mut *v.borrow_mut());
                drop(items);
                true
            }
            Mutated::Table(w) => {
                let Some(t) = w.upgrade() else { return false };
                let children: Vec<Value> = t.borrow().values().cloned().collect();
                if !reaches(Rc::as_ptr(&t) as usize, children) {
                    return false;
                }
                let entries = std::mem::take(&mut *t.borrow_mut());
                drop(entries);
                true
            }
        }
    }
}

/// Whether `target` is reachable from `roots` through pairs, vectors and tables
fn reaches(target: usize, roots: Vec<Value>) -> bool {
    let mut pending = roots;
    let mut visited: FxHashSet<usize> = FxHashSet::default();
    while let Some(value) = pending.pop() {
        match &value {
            Value::Pair(p) => {
                if visited.insert(Rc::as_ptr(p) as usize) {
                    pending.push(p.car.clone());
                    pending.push(p.cdr.clone());
                }
            }
            Value::Vector(v) => {
                let ptr = Rc::as_ptr(v) as usize;
                if ptr == target {
                    return true;
                }
                if visited.insert(ptr) {
                    pending.extend(v.borrow().iter().cloned());
                }
            }
            Value::Table(t) => {
                let ptr = Rc::as_ptr(t) as usize;
                if ptr == target {
                    return true;
                }
                if visited.insert(ptr) {
                    pending.extend(t.borrow().values().cloned());
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_roundtrip_through_vec() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(
            list.list_to_vec(),
            Some(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_improper_list_has_no_vec() {
        let pair = Value::cons(Value::Int(1), Value::Int(2));
        assert_eq!(pair.list_to_vec(), None);
    }

    #[test]
    fn test_equal_vs_eqv() {
        let a = Value::string("abc");
        let b = Value::string("abc");
        assert!(a == b);
        assert!(!a.eqv(&b));
        assert!(a.eqv(&a.clone()));
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(Arity::Range(1, 2).accepts(2));
        assert!(!Arity::Range(1, 2).accepts(0));
    }

    #[test]
    fn test_print_dotted_and_nested() {
        let symbols = SymbolTable::new();
        let value = Value::list_with_tail(
            vec![Value::Int(1), Value::list(vec![Value::Real(2.5)])],
            Value::Int(3),
        );
        assert_eq!(value.display(&symbols).to_string(), "(1 (2.5) . 3)");
    }
    fn long_list(n: i64) -> Value {
        (0..n).fold(Value::Null, |acc, i| Value::cons(Value::Int(i), acc))
    }

    #[test]
    fn test_long_list_drops_and_compares() {
        let a = long_list(1_000_000);
        let b = long_list(1_000_000);
        assert!(a == b);
        assert!(a != long_list(999_999));
        drop(a);
        drop(b);
    }

    #[test]
    fn test_deep_car_nesting_drops() {
        let nested = (0..1_000_000).fold(Value::Null, |acc, _| Value::list(vec![acc]));
        drop(nested);
    }

    #[test]
    fn test_shared_tail_survives_drop() {
        let tail = long_list(3);
        let list = Value::cons(Value::Int(9), tail.clone());
        drop(list);
        assert_eq!(tail.list_to_vec().map(|v| v.len()), Some(3));
    }

    #[test]
    fn test_cyclic_vector_equality_and_printing() {
        let symbols = SymbolTable::new();
        let v = Value::vector(vec![Value::Null]);
        if let Value::Vector(items) = &v {
            items.borrow_mut()[0] = v.clone();
        }
        assert!(v == Value::vector(vec![v.clone()]));
        assert_eq!(v.display(&symbols).to_string(), "#(#<cycle>)");
        assert!(format!("{:?}", v).ends_with("...]]]"));

        let (_, handle) = Mutated::of(&v).unwrap();
        assert!(handle.break_cycle());
        assert_eq!(v.display(&symbols).to_string(), "#()");
        drop(v);
        assert!(!handle.is_alive());
    }

    #[test]
    fn test_acyclic_container_is_left_alone() {
        let inner = Value::vector(vec![Value::Int(1)]);
        let outer = Value::vector(vec![inner.clone(), inner]);
        let (_, handle) = Mutated::of(&outer).unwrap();
        assert!(!handle.break_cycle());
        assert_eq!(outer.display(&SymbolTable::new()).to_string(), "#(#(1) #(1))");
    }
}
