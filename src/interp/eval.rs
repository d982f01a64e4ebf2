//! Tree-walking evaluator for Lisp data
//!
//! Special forms are dispatched on pre-interned keywords. Tail positions
//! (`IF` branches, the last form of a body, lambda application) loop instead
//! of recursing, so iteration written as tail recursion runs in constant
//! native stack.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::builtins;
use super::host::HostContext;
use super::scope::{FrameId, Scopes};
use super::symbols::{Keywords, Symbol, SymbolTable};
use super::value::{Arity, EvalResult, Lambda, Mutated, Native, NativeFn, Value};
use crate::diagnostics::{EvalError, ReadError, SourceFile};
use crate::parser;

/// Resource bounds for one top-level evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting of non-tail evaluations
    pub max_depth: usize,
    /// Maximum evaluation steps; unbounded when `None`
    pub step_limit: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 256,
            step_limit: None,
        }
    }
}

/// What a special form or body asks the evaluation loop to do next
enum Step {
    Done(Value),
    Tail(Value, FrameId),
}

/// Tree-walking interpreter
pub struct Interpreter {
    /// Interned symbol names
    symbols: SymbolTable,
    /// Lexical frames, global frame included
    scopes: Scopes,
    limits: Limits,
    depth: usize,
    steps: u64,
    /// Containers written by `VECTOR-SET!`/`TABLE-SET!`, keyed by address
    mutated: FxHashMap<usize, Mutated>,
}

/// Dead entries in `mutated` are pruned once it grows past this
const MUTATED_PRUNE_AT: usize = 1024;

impl Interpreter {
    /// Create an interpreter with the base library installed
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        let mut interp = Interpreter {
            symbols: SymbolTable::new(),
            scopes: Scopes::new(),
            limits,
            depth: 0,
            steps: 0,
            mutated: FxHashMap::default(),
        };
        let t = interp.symbols.keywords().t;
        interp.define("T", Value::Symbol(t));
        interp.define("NIL", Value::Null);
        builtins::install(&mut interp);
        interp
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Steps taken by the most recent top-level evaluation
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Frames allocated so far; released frames are reused rather than counted again
    pub fn frame_count(&self) -> usize {
        self.scopes.frame_count()
    }

    /// Remember a vector or table written in place, so a reference cycle
    /// through it can be broken when the interpreter drops
    pub fn note_mutation(&mut self, container: &Value) {
        let Some((addr, handle)) = Mutated::of(container) else {
            return;
        };
        if self.mutated.len() >= MUTATED_PRUNE_AT && !self.mutated.contains_key(&addr) {
            self.mutated.retain(|_, m| m.is_alive());
        }
        // A dead entry at the same address belongs to a freed container
        match self.mutated.get(&addr) {
            Some(existing) if existing.is_alive() => {}
            _ => {
                self.mutated.insert(addr, handle);
            }
        }
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Bind `name` in the global scope
    pub fn define(&mut self, name: &str, value: Value) {
        let symbol = self.symbols.intern(name);
        let global = self.scopes.global();
        self.scopes.define(global, symbol, value);
    }

    /// Register a native function in the global scope
    pub fn define_native(&mut self, name: &'static str, arity: Arity, func: NativeFn) {
        self.define(name, Value::Func(Native { name, arity, func }));
    }

    /// Look up a global binding by name
    pub fn global(&mut self, name: &str) -> Option<Value> {
        let symbol = self.symbols.intern(name);
        self.scopes.lookup(self.scopes.global(), symbol).cloned()
    }

    /// Read an anonymous source string
    pub fn read(&mut self, source: &str) -> Result<Value, ReadError> {
        self.read_source(&SourceFile::anonymous(source))
    }

    pub fn read_source(&mut self, source: &SourceFile) -> Result<Value, ReadError> {
        parser::read(source, &mut self.symbols)
    }

    /// Evaluate `expr` in the global scope with fresh limits
    pub fn eval(&mut self, expr: &Value, host: &mut HostContext<'_>) -> EvalResult {
        self.depth = 0;
        self.steps = 0;
        let global = self.scopes.global();
        self.eval_in(expr, global, host)
    }

    /// Apply a function value to already evaluated arguments
    pub fn apply(&mut self, func: &Value, args: Vec<Value>, host: &mut HostContext<'_>) -> EvalResult {
        match func {
            Value::Func(native) => self.call_native(*native, &args, host),
            Value::Lambda(lambda) => {
                let frame = self.bind(lambda, args)?;
                let result = match self.eval_body(&lambda.body, frame, host) {
                    Ok(Step::Done(value)) => Ok(value),
                    Ok(Step::Tail(expr, next)) => self.eval_in(&expr, next, host),
                    Err(e) => Err(e),
                };
                self.scopes.release(frame);
                result
            }
            other => Err(self.bad_op(other)),
        }
    }

    /// Render a value the way the reader would accept it back
    pub fn print(&self, value: &Value) -> String {
        value.display(&self.symbols).to_string()
    }

    /// `T` for true, null for false
    pub fn boolean(&self, b: bool) -> Value {
        if b {
            Value::Symbol(self.symbols.keywords().t)
        } else {
            Value::Null
        }
    }

    // ==================== EVALUATION ====================

    fn tick(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        match self.limits.step_limit {
            Some(limit) if self.steps > limit => Err(EvalError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    fn eval_in(&mut self, expr: &Value, frame: FrameId, host: &mut HostContext<'_>) -> EvalResult {
        if self.depth >= self.limits.max_depth {
            return Err(EvalError::DepthExceeded {
                limit: self.limits.max_depth,
            });
        }
        self.depth += 1;
        let result = self.eval_loop(expr.clone(), frame, host);
        self.depth -= 1;
        result
    }

    /// Run the tail loop, then release the frames it allocated
    fn eval_loop(&mut self, expr: Value, frame: FrameId, host: &mut HostContext<'_>) -> EvalResult {
        let mut owned = Vec::new();
        let result = self.run_loop(expr, frame, &mut owned, host);
        for id in owned {
            self.scopes.release(id);
        }
        result
    }

    /// `owned` collects the frames entered by tail calls in this loop. Once
    /// control moves to a frame they do not enclose, nothing else refers to
    /// them unless a closure captured them.
    fn run_loop(
        &mut self,
        mut expr: Value,
        mut frame: FrameId,
        owned: &mut Vec<FrameId>,
        host: &mut HostContext<'_>,
    ) -> EvalResult {
        loop {
            self.tick()?;

            let (head, tail) = match &expr {
                Value::Symbol(symbol) => return self.lookup(*symbol, frame),
                Value::Pair(pair) => (pair.car.clone(), pair.cdr.clone()),
                other => return Ok(other.clone()),
            };

            let step = match head {
                Value::Symbol(symbol) => self.eval_special(symbol, &tail, frame, host)?,
                _ => None,
            };
            let step = match step {
                Some(step) => step,
                None => self.eval_application(&head, &tail, frame, host)?,
            };

            match step {
                Step::Done(value) => return Ok(value),
                Step::Tail(next, next_frame) => {
                    if next_frame != frame {
                        let scopes = &mut self.scopes;
                        owned.retain(|&id| {
                            if scopes.encloses(id, next_frame) {
                                return true;
                            }
                            scopes.release(id);
                            false
                        });
                        owned.push(next_frame);
                    }
                    expr = next;
                    frame = next_frame;
                }
            }
        }
    }

    fn eval_application(
        &mut self,
        head: &Value,
        tail: &Value,
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> Result<Step, EvalError> {
        let func = self.eval_in(head, frame, host)?;
        let arg_forms = tail.list_to_vec().ok_or_else(|| EvalError::FormSyntax {
            form: "application",
            reason: "argument list is not a proper list".to_string(),
        })?;

        let mut args = Vec::with_capacity(arg_forms.len());
        for form in &arg_forms {
            args.push(self.eval_in(form, frame, host)?);
        }

        match &func {
            Value::Func(native) => self.call_native(*native, &args, host).map(Step::Done),
            Value::Lambda(lambda) => {
                let frame = self.bind(lambda, args)?;
                self.eval_body(&lambda.body, frame, host)
            }
            other => Err(self.bad_op(other)),
        }
    }

    fn call_native(
        &mut self,
        native: Native,
        args: &[Value],
        host: &mut HostContext<'_>,
    ) -> EvalResult {
        if !native.arity.accepts(args.len()) {
            return Err(EvalError::ArityMismatch {
                func: native.name.to_string(),
                expected: native.arity.to_string(),
                found: args.len(),
            });
        }
        (native.func)(self, host, args)
    }

    /// Allocate the call frame for a lambda and bind its parameters
    fn bind(&mut self, lambda: &Lambda, args: Vec<Value>) -> Result<FrameId, EvalError> {
        let arity = match lambda.rest {
            Some(_) => Arity::AtLeast(lambda.params.len()),
            None => Arity::Exact(lambda.params.len()),
        };
        if !arity.accepts(args.len()) {
            let func = match lambda.name {
                Some(name) => self.symbols.name(name).to_string(),
                None => "LAMBDA".to_string(),
            };
            return Err(EvalError::ArityMismatch {
                func,
                expected: arity.to_string(),
                found: args.len(),
            });
        }

        let frame = self.scopes.push(lambda.frame);
        let mut args = args.into_iter();
        for param in &lambda.params {
            if let Some(arg) = args.next() {
                self.scopes.define(frame, *param, arg);
            }
        }
        if let Some(rest) = lambda.rest {
            let rest_list = Value::list(args.collect::<Vec<_>>());
            self.scopes.define(frame, rest, rest_list);
        }
        Ok(frame)
    }

    /// Evaluate all but the last form; hand the last back as a tail call
    fn eval_body(
        &mut self,
        body: &[Value],
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> Result<Step, EvalError> {
        let Some((last, init)) = body.split_last() else {
            return Ok(Step::Done(Value::Null));
        };
        for form in init {
            self.eval_in(form, frame, host)?;
        }
        Ok(Step::Tail(last.clone(), frame))
    }

    fn lookup(&self, symbol: Symbol, frame: FrameId) -> EvalResult {
        self.scopes
            .lookup(frame, symbol)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVar {
                name: self.symbols.name(symbol).to_string(),
            })
    }

    fn bad_op(&self, value: &Value) -> EvalError {
        EvalError::BadOp {
            found: value.type_name(),
            repr: self.print(value),
        }
    }

    // ==================== SPECIAL FORMS ====================

    /// Returns `None` when `head` does not name a special form
    fn eval_special(
        &mut self,
        head: Symbol,
        tail: &Value,
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> Result<Option<Step>, EvalError> {
        let kw: Keywords = *self.symbols.keywords();

        let step = if head == kw.quote {
            let args = form_args("QUOTE", tail, Arity::Exact(1))?;
            Step::Done(args[0].clone())
        } else if head == kw.quasiquote {
            let args = form_args("QUASIQUOTE", tail, Arity::Exact(1))?;
            Step::Done(self.quasi(&args[0], frame, host)?)
        } else if head == kw.unquote || head == kw.unquote_splicing {
            return Err(EvalError::FormSyntax {
                form: "UNQUOTE",
                reason: "used outside of a quasiquote".to_string(),
            });
        } else if head == kw.if_ {
            let args = form_args("IF", tail, Arity::Range(2, 3))?;
            let cond = self.eval_in(&args[0], frame, host)?;
            if cond.is_truthy() {
                Step::Tail(args[1].clone(), frame)
            } else if let Some(alt) = args.get(2) {
                Step::Tail(alt.clone(), frame)
            } else {
                Step::Done(Value::Null)
            }
        } else if head == kw.define {
            self.eval_define(tail, frame, host)?
        } else if head == kw.set {
            let args = form_args("SET!", tail, Arity::Exact(2))?;
            let name = args[0].as_symbol().ok_or_else(|| EvalError::FormSyntax {
                form: "SET!",
                reason: format!("cannot assign to a {}", args[0].type_name()),
            })?;
            let value = self.eval_in(&args[1], frame, host)?;
            if !self.scopes.assign(frame, name, value) {
                return Err(EvalError::UnknownVar {
                    name: self.symbols.name(name).to_string(),
                });
            }
            Step::Done(Value::Null)
        } else if head == kw.lambda {
            let args = form_args("LAMBDA", tail, Arity::AtLeast(2))?;
            let lambda = make_lambda(None, &args[0], &args[1..], frame)?;
            self.scopes.capture(frame);
            Step::Done(Value::Lambda(Rc::new(lambda)))
        } else if head == kw.begin {
            let args = form_args("BEGIN", tail, Arity::AtLeast(0))?;
            self.eval_body(&args, frame, host)?
        } else if head == kw.let_ {
            self.eval_let(tail, frame, host)?
        } else if head == kw.let_star {
            self.eval_let_star(tail, frame, host)?
        } else if head == kw.cond {
            self.eval_cond(tail, frame, host)?
        } else if head == kw.and {
            let args = form_args("AND", tail, Arity::AtLeast(0))?;
            let Some((last, init)) = args.split_last() else {
                return Ok(Some(Step::Done(self.boolean(true))));
            };
            for form in init {
                let value = self.eval_in(form, frame, host)?;
                if !value.is_truthy() {
                    return Ok(Some(Step::Done(value)));
                }
            }
            Step::Tail(last.clone(), frame)
        } else if head == kw.or {
            let args = form_args("OR", tail, Arity::AtLeast(0))?;
            let Some((last, init)) = args.split_last() else {
                return Ok(Some(Step::Done(Value::Null)));
            };
            for form in init {
                let value = self.eval_in(form, frame, host)?;
                if value.is_truthy() {
                    return Ok(Some(Step::Done(value)));
                }
            }
            Step::Tail(last.clone(), frame)
        } else if head == kw.when || head == kw.unless {
            let form = if head == kw.when { "WHEN" } else { "UNLESS" };
            let args = form_args(form, tail, Arity::AtLeast(1))?;
            let test = self.eval_in(&args[0], frame, host)?;
            if test.is_truthy() == (head == kw.when) {
                self.eval_body(&args[1..], frame, host)?
            } else {
                Step::Done(Value::Null)
            }
        } else {
            return Ok(None);
        };

        Ok(Some(step))
    }

    fn eval_define(
        &mut self,
        tail: &Value,
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> Result<Step, EvalError> {
        let args = form_args("DEFINE", tail, Arity::AtLeast(2))?;
        match &args[0] {
            Value::Symbol(name) => {
                if args.len() != 2 {
                    return Err(EvalError::FormSyntax {
                        form: "DEFINE",
                        reason: "expected a name and one value".to_string(),
                    });
                }
                let mut value = self.eval_in(&args[1], frame, host)?;
                if let Value::Lambda(lambda) = &mut value {
                    if let Some(lambda) = Rc::get_mut(lambda) {
                        lambda.name.get_or_insert(*name);
                    }
                }
                self.scopes.define(frame, *name, value);
            }
            // (define (name . params) body...)
            Value::Pair(signature) => {
                let name = signature.car.as_symbol().ok_or_else(|| EvalError::FormSyntax {
                    form: "DEFINE",
                    reason: "function name must be a symbol".to_string(),
                })?;
                let lambda = make_lambda(Some(name), &signature.cdr, &args[1..], frame)?;
                self.scopes.capture(frame);
                self.scopes
                    .define(frame, name, Value::Lambda(Rc::new(lambda)));
            }
            other => {
                return Err(EvalError::FormSyntax {
                    form: "DEFINE",
                    reason: format!("cannot define a {}", other.type_name()),
                });
            }
        }
        Ok(Step::Done(Value::Null))
    }

    fn eval_let(
        &mut self,
        tail: &Value,
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> Result<Step, EvalError> {
        let args = form_args("LET", tail, Arity::AtLeast(1))?;

        // Named let: (let loop ((var init)...) body...)
        if let Value::Symbol(name) = args[0] {
            if args.len() < 2 {
                return Err(EvalError::FormSyntax {
                    form: "LET",
                    reason: "named let needs a binding list".to_string(),
                });
            }
            let bindings = parse_bindings("LET", &args[1])?;
            let mut inits = Vec::with_capacity(bindings.len());
            for (_, init) in &bindings {
                inits.push(self.eval_in(init, frame, host)?);
            }

            let loop_frame = self.scopes.push(frame);
            self.scopes.capture(loop_frame);
            let lambda = Rc::new(Lambda {
                name: Some(name),
                params: bindings.iter().map(|(var, _)| *var).collect(),
                rest: None,
                body: args[2..].to_vec(),
                frame: loop_frame,
            });
            self.scopes
                .define(loop_frame, name, Value::Lambda(lambda.clone()));
            let call_frame = self.bind(&lambda, inits)?;
            return self.eval_body(&lambda.body, call_frame, host);
        }

        let bindings = parse_bindings("LET", &args[0])?;
        let mut values = Vec::with_capacity(bindings.len());
        for (var, init) in &bindings {
            values.push((*var, self.eval_in(init, frame, host)?));
        }
        let inner = self.scopes.push(frame);
        for (var, value) in values {
            self.scopes.define(inner, var, value);
        }
        self.eval_body(&args[1..], inner, host)
    }

    fn eval_let_star(
        &mut self,
        tail: &Value,
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> Result<Step, EvalError> {
        let args = form_args("LET*", tail, Arity::AtLeast(1))?;
        let bindings = parse_bindings("LET*", &args[0])?;
        let inner = self.scopes.push(frame);
        for (var, init) in &bindings {
            let value = self.eval_in(init, inner, host)?;
            self.scopes.define(inner, *var, value);
        }
        self.eval_body(&args[1..], inner, host)
    }

    fn eval_cond(
        &mut self,
        tail: &Value,
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> Result<Step, EvalError> {
        let else_ = self.symbols.keywords().else_;
        let clauses = form_args("COND", tail, Arity::AtLeast(0))?;

        for clause in &clauses {
            let parts = clause
                .list_to_vec()
                .filter(|parts| !parts.is_empty())
                .ok_or_else(|| EvalError::FormSyntax {
                    form: "COND",
                    reason: "each clause must be a non-empty list".to_string(),
                })?;

            if parts[0].as_symbol() == Some(else_) {
                return self.eval_body(&parts[1..], frame, host);
            }

            let test = self.eval_in(&parts[0], frame, host)?;
            if test.is_truthy() {
                if parts.len() == 1 {
                    return Ok(Step::Done(test));
                }
                return self.eval_body(&parts[1..], frame, host);
            }
        }

        Ok(Step::Done(Value::Null))
    }

    /// Expand a quasiquote template. Nesting counts toward the depth limit.
    fn quasi(&mut self, template: &Value, frame: FrameId, host: &mut HostContext<'_>) -> EvalResult {
        if self.depth >= self.limits.max_depth {
            return Err(EvalError::DepthExceeded {
                limit: self.limits.max_depth,
            });
        }
        self.depth += 1;
        let result = self.expand_quasi(template, frame, host);
        self.depth -= 1;
        result
    }

    fn expand_quasi(
        &mut self,
        template: &Value,
        frame: FrameId,
        host: &mut HostContext<'_>,
    ) -> EvalResult {
        let kw: Keywords = *self.symbols.keywords();

        match template {
            Value::Pair(pair) => {
                if pair.car.as_symbol() == Some(kw.unquote) {
                    let args = form_args("UNQUOTE", &pair.cdr, Arity::Exact(1))?;
                    return self.eval_in(&args[0], frame, host);
                }

                let mut items = Vec::new();
                let mut cur = template.clone();
                let tail = loop {
                    let Value::Pair(pair) = &cur else {
                        break cur.clone();
                    };
                    // `(a . ,b)` reads as `(a UNQUOTE b)`
                    if pair.car.as_symbol() == Some(kw.unquote) {
                        break self.quasi(&cur, frame, host)?;
                    }
                    match splice_target(&pair.car, kw.unquote_splicing) {
                        Some(form) => {
                            let spliced = self.eval_in(&form, frame, host)?;
                            let list = spliced.list_to_vec().ok_or_else(|| EvalError::BadArg {
                                func: "UNQUOTE-SPLICING".to_string(),
                                expected: "a list",
                                found: spliced.type_name(),
                            })?;
                            items.extend(list);
                        }
                        None => items.push(self.quasi(&pair.car, frame, host)?),
                    }
                    let next = pair.cdr.clone();
                    cur = next;
                };
                Ok(Value::list_with_tail(items, tail))
            }
            Value::Vector(items) => {
                let items = items.borrow().clone();
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(self.quasi(item, frame, host)?);
                }
                Ok(Value::vector(out))
            }
            other => Ok(other.clone()),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        let cycles = self
            .mutated
            .drain()
            .filter(|(_, container)| container.break_cycle())
            .count();
        tracing::debug!(
            frames = self.scopes.frame_count(),
            symbols = self.symbols.len(),
            cycles,
            "Interpreter shut down"
        );
    }
}

/// Operands of a special form, checked against `arity`
fn form_args(form: &'static str, tail: &Value, arity: Arity) -> Result<Vec<Value>, EvalError> {
    let args = tail.list_to_vec().ok_or_else(|| EvalError::FormSyntax {
        form,
        reason: "operands are not a proper list".to_string(),
    })?;
    if !arity.accepts(args.len()) {
        return Err(EvalError::FormSyntax {
            form,
            reason: format!("expected {} operand(s), got {}", arity, args.len()),
        });
    }
    Ok(args)
}

/// `((var init) ...)` → pairs of symbol and init form
fn parse_bindings(form: &'static str, bindings: &Value) -> Result<Vec<(Symbol, Value)>, EvalError> {
    let malformed = || EvalError::FormSyntax {
        form,
        reason: "bindings must look like ((name value) ...)".to_string(),
    };

    let list = bindings.list_to_vec().ok_or_else(malformed)?;
    list.iter()
        .map(|binding| {
            let parts = binding.list_to_vec().ok_or_else(malformed)?;
            match parts.as_slice() {
                [Value::Symbol(var), init] => Ok((*var, init.clone())),
                _ => Err(malformed()),
            }
        })
        .collect()
}

/// Build a closure from a parameter list: `(a b)`, `(a . rest)` or `args`
fn make_lambda(
    name: Option<Symbol>,
    params: &Value,
    body: &[Value],
    frame: FrameId,
) -> Result<Lambda, EvalError> {
    if body.is_empty() {
        return Err(EvalError::FormSyntax {
            form: "LAMBDA",
            reason: "body is empty".to_string(),
        });
    }

    let mut fixed = Vec::new();
    let mut cur = params;
    let rest = loop {
        match cur {
            Value::Null => break None,
            Value::Symbol(rest) => break Some(*rest),
            Value::Pair(pair) => {
                let param = pair.car.as_symbol().ok_or_else(|| EvalError::FormSyntax {
                    form: "LAMBDA",
                    reason: format!("parameter must be a symbol, found {}", pair.car.type_name()),
                })?;
                fixed.push(param);
                cur = &pair.cdr;
            }
            other => {
                return Err(EvalError::FormSyntax {
                    form: "LAMBDA",
                    reason: format!("malformed parameter list ending in {}", other.type_name()),
                });
            }
        }
    };

    Ok(Lambda {
        name,
        params: fixed,
        rest,
        body: body.to_vec(),
        frame,
    })
}

/// `,@form` inside a template → `form`
fn splice_target(item: &Value, unquote_splicing: Symbol) -> Option<Value> {
    let pair = match item {
        Value::Pair(pair) => pair,
        _ => return None,
    };
    if pair.car.as_symbol() != Some(unquote_splicing) {
        return None;
    }
    let args = pair.cdr.list_to_vec()?;
    match args.as_slice() {
        [form] => Some(form.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::interp::host::HostPolicy;

    fn eval_str(interp: &mut Interpreter, source: &str) -> EvalResult {
        let program = interp.read(source).unwrap();
        let mut env = Environment::new();
        let mut host = HostContext::new(&mut env, HostPolicy::default());
        interp.eval(&program, &mut host)
    }

    #[test]
    fn test_define_names_lambda() {
        let mut interp = Interpreter::new();
        eval_str(&mut interp, "(define sq (lambda (x) (* x x)))").unwrap();
        let sq = interp.global("sq").unwrap();
        assert_eq!(interp.print(&sq), "<lambda SQ>");
    }

    #[test]
    fn test_tail_loop_runs_past_depth_limit() {
        let mut interp = Interpreter::with_limits(Limits {
            max_depth: 32,
            step_limit: None,
        });
        let result = eval_str(
            &mut interp,
            "(let loop ((i 0)) (if (< i 10000) (loop (+ i 1)) i))",
        );
        assert_eq!(result, Ok(Value::Int(10000)));
    }

    #[test]
    fn test_deep_recursion_hits_depth_limit() {
        let mut interp = Interpreter::with_limits(Limits {
            max_depth: 32,
            step_limit: None,
        });
        let result = eval_str(
            &mut interp,
            "(define (down n) (if (= n 0) 0 (+ 1 (down (- n 1))))) (down 100)",
        );
        assert_eq!(result, Err(EvalError::DepthExceeded { limit: 32 }));
    }

    #[test]
    fn test_step_limit_stops_infinite_loop() {
        let mut interp = Interpreter::with_limits(Limits {
            max_depth: 256,
            step_limit: Some(500),
        });
        let result = eval_str(&mut interp, "(let forever () (forever))");
        assert_eq!(result, Err(EvalError::StepLimitExceeded { limit: 500 }));
    }

    #[test]
    fn test_tail_loop_reuses_frames() {
        let mut interp = Interpreter::new();
        let result = eval_str(
            &mut interp,
            "(let loop ((i 0) (acc ())) (if (< i 100000) (loop (+ i 1) (cons i acc)) (length acc)))",
        );
        assert_eq!(result, Ok(Value::Int(100000)));
        assert!(interp.frame_count() < 16, "{} frames", interp.frame_count());
    }

    #[test]
    fn test_non_tail_recursion_reuses_frames() {
        let mut interp = Interpreter::new();
        let source = "(define (fib n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))) (fib 15)";
        assert_eq!(eval_str(&mut interp, source), Ok(Value::Int(610)));
        assert!(interp.frame_count() < 64, "{} frames", interp.frame_count());
    }

    #[test]
    fn test_captured_frames_survive_recycling() {
        let mut interp = Interpreter::new();
        let source = "
(define (make-counter)
  (let ((n 0))
    (lambda () (set! n (+ n 1)) n)))
(define (adder n) (lambda (x) (+ x n)))
(define c (make-counter))
(define add5 (adder 5))
(let loop ((i 0)) (if (< i 1000) (begin (c) (loop (+ i 1))) (add5 (c))))";
        assert_eq!(eval_str(&mut interp, source), Ok(Value::Int(1006)));
    }

    #[test]
    fn test_deep_quasiquote_hits_depth_limit() {
        let mut interp = Interpreter::with_limits(Limits {
            max_depth: 32,
            step_limit: None,
        });
        let source = format!("`{}1{}", "(".repeat(100), ")".repeat(100));
        let result = eval_str(&mut interp, &source);
        assert_eq!(result, Err(EvalError::DepthExceeded { limit: 32 }));
    }

    #[test]
    fn test_drop_breaks_self_reference() {
        let mut interp = Interpreter::new();
        let v = eval_str(&mut interp, "(define v (make-vector 1)) (vector-set! v 0 v) v").unwrap();
        let t = eval_str(&mut interp, "(define t (make-table)) (table-set! t 'me t) t").unwrap();
        let (Value::Vector(items), Value::Table(table)) = (&v, &t) else {
            panic!("expected a vector and a table");
        };
        let (items, table) = (Rc::downgrade(items), Rc::downgrade(table));
        drop((v, t));
        drop(interp);
        assert!(items.upgrade().is_none());
        assert!(table.upgrade().is_none());
    }

    #[test]
    fn test_set_requires_existing_binding() {
        let mut interp = Interpreter::new();
        let result = eval_str(&mut interp, "(set! nope 1)");
        assert_eq!(
            result,
            Err(EvalError::UnknownVar {
                name: "NOPE".to_string()
            })
        );
    }
}
