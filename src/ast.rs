//! AST node types (spec §3). One tagged enum per node class, doc-commented
//! variants, `Box`/`Vec` for recursive children -- the same shape the
//! teacher uses for `StringOp`/`RangeSpec`, applied to a template's tree
//! instead of a flat operation pipeline.

use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub body: Vec<Stmt>,
    pub blocks: Vec<Block>,
    pub extends: Option<Expr>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub body: Vec<Stmt>,
    pub scoped: bool,
}

/// A statement together with the source position of its leading token, so
/// render-time errors can report a real line/column instead of `0, 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub column: usize,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: usize, column: usize) -> Self {
        Stmt { kind, line, column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Text(String),
    /// `{% raw %}...{% endraw %}`, emitted verbatim.
    Raw(String),
    Output(Expr),
    If {
        branches: SmallVec<[(Expr, Vec<Stmt>); 2]>,
        else_body: Option<Vec<Stmt>>,
    },
    For {
        targets: Vec<String>,
        iter: Expr,
        body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
        filter: Option<Expr>,
    },
    Block(Block),
    Extends(Expr),
    Include {
        template: Expr,
        with_context: bool,
        ignore_missing: bool,
    },
    Import {
        template: Expr,
        alias: String,
        with_context: bool,
    },
    FromImport {
        template: Expr,
        names: Vec<(String, Option<String>)>,
        with_context: bool,
    },
    Set {
        target: String,
        value: SetValue,
    },
    Macro {
        name: String,
        params: Vec<(String, Option<Expr>)>,
        body: Vec<Stmt>,
    },
    CallBlock {
        call: Expr,
        call_params: Vec<String>,
        body: Vec<Stmt>,
    },
    Do(Expr),
    Filter {
        name: String,
        args: Vec<Expr>,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Const(Const),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Getattr(Box<Expr>, String),
    Getitem(Box<Expr>, Box<Expr>),
    Slice {
        obj: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        callee: Box<Expr>,
        args: SmallVec<[Expr; 4]>,
        kwargs: Vec<(String, Expr)>,
    },
    Filter {
        value: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Test {
        value: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        negated: bool,
    },
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CompareOp>,
        comparators: Vec<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_: Box<Expr>,
    },
    Concat(Vec<Expr>),
    /// `super()` / `self.blockname()` / `caller()` / `caller(args...)`.
    Super,
    SelfBlock(String),
    Caller(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}
