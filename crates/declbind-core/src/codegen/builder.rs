//! A small C++ statement/expression model.
//!
//! Emitters build these trees and hand them to the printer instead of
//! splicing text templates.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// Verbatim expression text (macros, casts, literals).
    Raw(String),
    Ident(String),
    /// A C string literal; the printer escapes it.
    Str(String),
    Call(String, Vec<Expr>),
    AddrOf(Box<Expr>),
    Not(Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    /// `a && b` on one line.
    And(Vec<Expr>),
    /// Short-circuit chain with one operand per line.
    AndLines(Vec<Expr>),
    /// `cond ? then : else`.
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `new init` or, with a placement address, `new (place) init`.
    New { place: Option<String>, init: Box<Expr> },
}

impl Expr {
    pub fn raw(text: impl Into<String>) -> Self {
        Expr::Raw(text.into())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn str(text: impl Into<String>) -> Self {
        Expr::Str(text.into())
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(callee.into(), args)
    }

    pub fn addr_of(inner: Expr) -> Self {
        Expr::AddrOf(Box::new(inner))
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign(Box::new(target), Box::new(value))
    }

    pub fn cond(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Cond(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    pub fn new_in(place: Option<&str>, init: Expr) -> Self {
        Expr::New {
            place: place.map(str::to_string),
            init: Box::new(init),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    Decl {
        ty: String,
        name: String,
        init: Option<Expr>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    /// Ordered attempts: each runs in its own scope and `reset` runs between
    /// consecutive attempts. The first attempt that returns wins.
    FirstSuccess {
        attempts: Vec<Vec<Stmt>>,
        reset: Expr,
    },
    Using(String),
    Comment(String),
    Blank,
}

impl Stmt {
    pub fn decl(ty: impl Into<String>, name: impl Into<String>, init: Option<Expr>) -> Self {
        Stmt::Decl {
            ty: ty.into(),
            name: name.into(),
            init,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    pub fn ret(expr: Expr) -> Self {
        Stmt::Return(Some(expr))
    }

    pub fn if_then(cond: Expr, then: Vec<Stmt>) -> Self {
        Stmt::If { cond, then }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    /// Full signature line, e.g. `static PyObject* f(PyObject* self)`.
    pub signature: String,
    pub body: Vec<Stmt>,
}

impl Function {
    pub fn new(signature: impl Into<String>, body: Vec<Stmt>) -> Self {
        Self {
            signature: signature.into(),
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Function(Function),
    /// `decl =\n{\n    rows\n};`
    Initializer { decl: String, rows: Vec<String> },
    /// `struct name { fields };` with raw field lines.
    Struct { name: String, fields: Vec<String> },
    /// A class-template specialization holding static member functions.
    Specialization { header: Vec<String>, methods: Vec<Function> },
    Line(String),
    Blank,
}
