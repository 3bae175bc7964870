use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use lasso::{Rodeo, Spur};

use crate::error::SonError;

// ── Interned names ────────────────────────────────────────────────

thread_local! {
    // Selectors, symbol names and binding names all land here. Symbols
    // compare by name, and dispatch compares selectors constantly, so
    // interning turns both into integer comparisons. An interpreter is
    // single-threaded; one interner per thread covers every image on it.
    static NAMES: RefCell<Rodeo> = RefCell::new(Rodeo::new());
}

/// Intern a selector, symbol or binding name.
pub fn intern(name: &str) -> Spur {
    NAMES.with_borrow_mut(|names| names.get_or_intern(name))
}

/// The name behind an interned key, as an owned string.
pub fn resolve(key: Spur) -> String {
    with_resolved(key, str::to_string)
}

/// Borrow the name behind an interned key without allocating.
pub fn with_resolved<R>(key: Spur, f: impl FnOnce(&str) -> R) -> R {
    NAMES.with_borrow(|names| f(names.resolve(&key)))
}

// ── Values ────────────────────────────────────────────────────────

/// A SON runtime value.
///
/// The AST and the value domain share this type: a program is a JSON tree
/// converted by [`crate::json::json_to_value`], and evaluation folds it into
/// further `Value`s. Selectors, symbol names and binding names are interned.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Spur),
    Array(Rc<Vec<Value>>),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Block(Rc<Block>),
    /// An environment as a first-class value: class tables, and `$env`.
    Env(Env),
    Bridge(Rc<Bridge>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(intern(name))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }

    pub fn object(map: BTreeMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Rc<Block>> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Block(_) => "block",
            Value::Env(_) => "environment",
            Value::Bridge(_) => "bridge",
        }
    }

    /// Object identity: by value for immediates, by heap pointer otherwise.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Env(a), Value::Env(b)) => a.ptr_eq(b),
            (Value::Bridge(a), Value::Bridge(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The developer-facing rendering used by `printString`.
    pub fn print_string(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", &**s),
            other => other.to_string(),
        }
    }
}

/// Structural equality: by value for primitives, element-wise for arrays
/// and objects, heap identity for blocks, environments and bridges.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Env(a), Value::Env(b)) => a.ptr_eq(b),
            (Value::Bridge(a), Value::Bridge(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::String(s) => write!(f, "{s}"),
            Value::Symbol(s) => write!(f, "#{}", resolve(*s)),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.print_string())?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {}", v.print_string())?;
                }
                write!(f, "}}")
            }
            Value::Block(block) => write!(f, "{block:?}"),
            Value::Env(env) => match env.name {
                Some(name) => write!(f, "{}", resolve(name)),
                None => write!(f, "an Environment"),
            },
            Value::Bridge(_) => write!(f, "a Bridge"),
        }
    }
}

// ── Blocks ────────────────────────────────────────────────────────

/// A block closure: parameters, a body AST, and the captured scope.
///
/// `home_context` is the nearest enclosing method activation at creation
/// time; it is the unwind target of any `^` the block performs.
#[derive(Clone)]
pub struct Block {
    pub params: Vec<Spur>,
    pub body: Value,
    pub lexical_scope: Env,
    pub home_context: Option<Env>,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a BlockClosure/{}", self.params.len())
    }
}

// ── Methods ───────────────────────────────────────────────────────

/// A method body written in SON.
#[derive(Debug, Clone)]
pub struct SonMethod {
    pub selector: Spur,
    pub params: Vec<Spur>,
    pub body: Value,
}

/// An entry in a class's method table.
#[derive(Debug, Clone)]
pub enum MethodImpl {
    Son(Rc<SonMethod>),
    Primitive(Primitive),
}

/// The closed set of host-implemented operations, routed by tag.
///
/// SON code cannot register new primitives; an unknown tag in an image
/// blob is an error at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    NumberAdd,
    NumberSubtract,
    NumberMultiply,
    NumberDivide,
    NumberLess,
    NumberGreater,
    NumberLessOrEqual,
    NumberGreaterOrEqual,
    NumberEquals,
    NumberToString,
    ObjectEquals,
    ObjectNotEquals,
    ObjectIdentical,
    ObjectNotIdentical,
    ObjectClass,
    ObjectPrintString,
    BooleanAnd,
    BooleanOr,
    BooleanNot,
    BooleanIfTrue,
    BooleanIfFalse,
    BooleanIfTrueIfFalse,
    StringConcat,
    StringLength,
    StringEquals,
    SymbolToString,
    SymbolEquals,
    NullIfNil,
    NullIfNotNil,
    NullIfNilIfNotNil,
    BlockWhileTrue,
}

impl Primitive {
    pub fn from_tag(tag: &str) -> Option<Primitive> {
        use Primitive::*;
        Some(match tag {
            "NumberAdd" => NumberAdd,
            "NumberSubtract" => NumberSubtract,
            "NumberMultiply" => NumberMultiply,
            "NumberDivide" => NumberDivide,
            "NumberLess" => NumberLess,
            "NumberGreater" => NumberGreater,
            "NumberLessOrEqual" => NumberLessOrEqual,
            "NumberGreaterOrEqual" => NumberGreaterOrEqual,
            "NumberEquals" => NumberEquals,
            "NumberToString" => NumberToString,
            "ObjectEquals" => ObjectEquals,
            "ObjectNotEquals" => ObjectNotEquals,
            "ObjectIdentical" => ObjectIdentical,
            "ObjectNotIdentical" => ObjectNotIdentical,
            "ObjectClass" => ObjectClass,
            "ObjectPrintString" => ObjectPrintString,
            "BooleanAnd" => BooleanAnd,
            "BooleanOr" => BooleanOr,
            "BooleanNot" => BooleanNot,
            "BooleanIfTrue" => BooleanIfTrue,
            "BooleanIfFalse" => BooleanIfFalse,
            "BooleanIfTrueIfFalse" => BooleanIfTrueIfFalse,
            "StringConcat" => StringConcat,
            "StringLength" => StringLength,
            "StringEquals" => StringEquals,
            "SymbolToString" => SymbolToString,
            "SymbolEquals" => SymbolEquals,
            "NullIfNil" => NullIfNil,
            "NullIfNotNil" => NullIfNotNil,
            "NullIfNilIfNotNil" => NullIfNilIfNotNil,
            "BlockWhileTrue" => BlockWhileTrue,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        use Primitive::*;
        match self {
            NumberAdd => "NumberAdd",
            NumberSubtract => "NumberSubtract",
            NumberMultiply => "NumberMultiply",
            NumberDivide => "NumberDivide",
            NumberLess => "NumberLess",
            NumberGreater => "NumberGreater",
            NumberLessOrEqual => "NumberLessOrEqual",
            NumberGreaterOrEqual => "NumberGreaterOrEqual",
            NumberEquals => "NumberEquals",
            NumberToString => "NumberToString",
            ObjectEquals => "ObjectEquals",
            ObjectNotEquals => "ObjectNotEquals",
            ObjectIdentical => "ObjectIdentical",
            ObjectNotIdentical => "ObjectNotIdentical",
            ObjectClass => "ObjectClass",
            ObjectPrintString => "ObjectPrintString",
            BooleanAnd => "BooleanAnd",
            BooleanOr => "BooleanOr",
            BooleanNot => "BooleanNot",
            BooleanIfTrue => "BooleanIfTrue",
            BooleanIfFalse => "BooleanIfFalse",
            BooleanIfTrueIfFalse => "BooleanIfTrueIfFalse",
            StringConcat => "StringConcat",
            StringLength => "StringLength",
            StringEquals => "StringEquals",
            SymbolToString => "SymbolToString",
            SymbolEquals => "SymbolEquals",
            NullIfNil => "NullIfNil",
            NullIfNotNil => "NullIfNotNil",
            NullIfNilIfNotNil => "NullIfNilIfNotNil",
            BlockWhileTrue => "BlockWhileTrue",
        }
    }
}

// ── Bridge ────────────────────────────────────────────────────────

/// A host callable installed on the bridge. Receives the bridge value
/// itself and the evaluated arguments.
pub type HostFn = Box<dyn Fn(&Value, &[Value]) -> Result<Value, SonError>>;

/// The distinguished object routing messages to host capabilities.
///
/// Selectors with an entry here dispatch to the host instead of any
/// class table; everything else falls through to ordinary lookup.
pub struct Bridge {
    entries: HashMap<Spur, HostFn>,
}

impl Bridge {
    pub fn new() -> Self {
        Bridge {
            entries: HashMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        selector: &str,
        f: impl Fn(&Value, &[Value]) -> Result<Value, SonError> + 'static,
    ) {
        self.entries.insert(intern(selector), Box::new(f));
    }

    pub fn get(&self, selector: Spur) -> Option<&HostFn> {
        self.entries.get(&selector)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<bridge ({} entries)>", self.entries.len())
    }
}

// ── Env ───────────────────────────────────────────────────────────

/// One node in the scope chain.
///
/// Clones alias: the binding and method tables are shared `Rc`s, so an
/// `Env` value is a handle, and identity is pointer identity of the
/// binding table. Class tables are parentless environments whose method
/// table is the dispatch map; method activations are children of the
/// sending scope with `self` pre-bound.
#[derive(Clone)]
pub struct Env {
    pub bindings: Rc<RefCell<HashMap<Spur, Value>>>,
    pub methods: Rc<RefCell<HashMap<Spur, MethodImpl>>>,
    pub parent: Option<Rc<Env>>,
    pub method_self: Option<Rc<Value>>,
    pub name: Option<Spur>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            bindings: Rc::new(RefCell::new(HashMap::new())),
            methods: Rc::new(RefCell::new(HashMap::new())),
            parent: None,
            method_self: None,
            name: None,
        }
    }

    /// A parentless environment used as a class table.
    pub fn class(name: &str) -> Self {
        Env {
            name: Some(intern(name)),
            ..Env::new()
        }
    }

    pub fn with_parent(parent: Rc<Env>) -> Self {
        Env {
            parent: Some(parent),
            ..Env::new()
        }
    }

    /// A method activation: child of the sending scope, `self` pre-bound.
    pub fn method_context(parent: Rc<Env>, receiver: Value) -> Self {
        let env = Env {
            parent: Some(parent),
            method_self: Some(Rc::new(receiver.clone())),
            ..Env::new()
        };
        env.set_str("self", receiver);
        env
    }

    /// Look a name up locally, then through the parent chain.
    pub fn get(&self, name: Spur) -> Option<Value> {
        if let Some(val) = self.bindings.borrow().get(&name) {
            Some(val.clone())
        } else if let Some(parent) = &self.parent {
            parent.get(name)
        } else {
            None
        }
    }

    pub fn get_str(&self, name: &str) -> Option<Value> {
        self.get(intern(name))
    }

    /// Bind locally. Assignment never walks the parent chain.
    pub fn set(&self, name: Spur, val: Value) {
        self.bindings.borrow_mut().insert(name, val);
    }

    pub fn set_str(&self, name: &str, val: Value) {
        self.set(intern(name), val);
    }

    /// Install or replace a method in the local method table.
    pub fn define_method(&self, selector: Spur, method: MethodImpl) {
        self.methods.borrow_mut().insert(selector, method);
    }

    pub fn lookup_method_locally(&self, selector: Spur) -> Option<MethodImpl> {
        self.methods.borrow().get(&selector).cloned()
    }

    pub fn is_method_context(&self) -> bool {
        self.method_self.is_some()
    }

    pub fn method_self(&self) -> Option<Value> {
        self.method_self.as_deref().cloned()
    }

    /// The innermost method activation reachable from here, if any —
    /// this environment included.
    pub fn nearest_method_context(&self) -> Option<Env> {
        if self.is_method_context() {
            return Some(self.clone());
        }
        let mut current = self.parent.clone();
        while let Some(env) = current {
            if env.is_method_context() {
                return Some((*env).clone());
            }
            current = env.parent.clone();
        }
        None
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.bindings, &other.bindings)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "<env {}>", resolve(name)),
            None => write!(f, "<env ({} bindings)>", self.bindings.borrow().len()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────
