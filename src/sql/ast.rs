//! Parsed query shapes
//!
//! These types are what the planner consumes: an already-parsed SELECT with
//! its FROM-clause tree, predicates, and output expressions. Producing them
//! from SQL text is the parser's job, not this crate's.

use std::fmt;

use crate::catalog::ColumnName;
use crate::executor::Datum;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // String
    Like,
    NotLike,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// The comparison that holds after exchanging the operands
    /// (`a < b` iff `b > a`). `None` for non-comparisons.
    pub fn flipped(&self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Eq),
            BinaryOp::NotEq => Some(BinaryOp::NotEq),
            BinaryOp::Lt => Some(BinaryOp::Gt),
            BinaryOp::LtEq => Some(BinaryOp::GtEq),
            BinaryOp::Gt => Some(BinaryOp::Lt),
            BinaryOp::GtEq => Some(BinaryOp::LtEq),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Scalar expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Column reference (optionally qualified; a wildcard only inside COUNT(*))
    Column(ColumnName),
    /// Literal value
    Literal(Datum),
    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// N-ary conjunction
    And(Vec<Expr>),
    /// N-ary disjunction
    Or(Vec<Expr>),
    /// Unary operation
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
    /// Function call (scalar or aggregate)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },
    /// IN (list)
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// Uncorrelated subquery yielding one value
    Subquery(Box<SelectClause>),
    /// IN (subquery)
    InSubquery {
        expr: Box<Expr>,
        query: Box<SelectClause>,
        negated: bool,
    },
    /// EXISTS (subquery)
    Exists(Box<SelectClause>),
}

impl Expr {
    /// Unqualified column reference
    pub fn column(name: &str) -> Expr {
        Expr::Column(ColumnName::column(name))
    }

    /// Qualified column reference
    pub fn qualified(table: &str, name: &str) -> Expr {
        Expr::Column(ColumnName::qualified(table, name))
    }

    pub fn literal(value: impl Into<Datum>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::binary(left, BinaryOp::Eq, right)
    }

    /// Conjunction of `terms`; a single term is returned unwrapped
    pub fn and(mut terms: Vec<Expr>) -> Expr {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::And(terms)
        }
    }

    /// Disjunction of `terms`; a single term is returned unwrapped
    pub fn or(mut terms: Vec<Expr>) -> Expr {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Expr {
        Expr::UnaryOp {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Function {
            name: name.to_string(),
            args,
            distinct: false,
        }
    }

    pub fn distinct_function(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Function {
            name: name.to_string(),
            args,
            distinct: true,
        }
    }

    /// `COUNT(*)`
    pub fn count_star() -> Expr {
        Expr::function("COUNT", vec![Expr::Column(ColumnName::wildcard())])
    }

    pub fn is_null(expr: Expr) -> Expr {
        Expr::IsNull {
            expr: Box::new(expr),
            negated: false,
        }
    }

    pub fn subquery(query: SelectClause) -> Expr {
        Expr::Subquery(Box::new(query))
    }

    pub fn in_subquery(expr: Expr, query: SelectClause, negated: bool) -> Expr {
        Expr::InSubquery {
            expr: Box::new(expr),
            query: Box::new(query),
            negated,
        }
    }

    pub fn exists(query: SelectClause) -> Expr {
        Expr::Exists(Box::new(query))
    }

    /// Whether a subquery appears anywhere in this expression
    pub fn contains_subquery(&self) -> bool {
        match self {
            Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists(_) => true,
            _ => self.children().into_iter().any(Expr::contains_subquery),
        }
    }

    /// Every column referenced anywhere in this expression, first use first.
    ///
    /// Columns inside a nested query belong to that query and are skipped.
    pub fn symbols(&self) -> Vec<ColumnName> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<ColumnName>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Literal(_) => {}
            _ => {
                for child in self.children() {
                    child.collect_symbols(out);
                }
            }
        }
    }

    /// Direct subexpressions, left to right
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Subquery(_) | Expr::Exists(_) => vec![],
            Expr::BinaryOp { left, right, .. } => vec![&**left, &**right],
            Expr::And(terms) | Expr::Or(terms) => terms.iter().collect(),
            Expr::UnaryOp { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::InSubquery { expr, .. } => vec![&**expr],
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::InList { expr, list, .. } => {
                let mut v: Vec<&Expr> = vec![&**expr];
                v.extend(list.iter());
                v
            }
            Expr::Between {
                expr, low, high, ..
            } => vec![&**expr, &**low, &**high],
        }
    }

    /// Top-down rewrite. `f` returns `Some(replacement)` to substitute a
    /// subtree (which is then not visited further) or `None` to keep
    /// descending.
    pub fn try_rewrite<E>(
        &self,
        f: &mut dyn FnMut(&Expr) -> Result<Option<Expr>, E>,
    ) -> Result<Expr, E> {
        if let Some(replacement) = f(self)? {
            return Ok(replacement);
        }

        Ok(match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Subquery(_) | Expr::Exists(_) => {
                self.clone()
            }
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: boxed(left, &mut *f)?,
                op: *op,
                right: boxed(right, &mut *f)?,
            },
            Expr::And(terms) => Expr::And(
                terms
                    .iter()
                    .map(|t| t.try_rewrite(&mut *f))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Or(terms) => Expr::Or(
                terms
                    .iter()
                    .map(|t| t.try_rewrite(&mut *f))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op: *op,
                expr: boxed(expr, &mut *f)?,
            },
            Expr::Function {
                name,
                args,
                distinct,
            } => Expr::Function {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.try_rewrite(&mut *f))
                    .collect::<Result<_, _>>()?,
                distinct: *distinct,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: boxed(expr, &mut *f)?,
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: boxed(expr, &mut *f)?,
                list: list
                    .iter()
                    .map(|e| e.try_rewrite(&mut *f))
                    .collect::<Result<_, _>>()?,
                negated: *negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: boxed(expr, &mut *f)?,
                low: boxed(low, &mut *f)?,
                high: boxed(high, &mut *f)?,
                negated: *negated,
            },
            Expr::InSubquery {
                expr,
                query,
                negated,
            } => Expr::InSubquery {
                expr: boxed(expr, &mut *f)?,
                query: query.clone(),
                negated: *negated,
            },
        })
    }

    fn is_atomic(&self) -> bool {
        matches!(
            self,
            Expr::Column(_)
                | Expr::Literal(_)
                | Expr::Function { .. }
                | Expr::Subquery(_)
                | Expr::Exists(_)
        )
    }
}

fn boxed<E>(
    e: &Expr,
    f: &mut dyn FnMut(&Expr) -> Result<Option<Expr>, E>,
) -> Result<Box<Expr>, E> {
    e.try_rewrite(f).map(Box::new)
}

fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
    if e.is_atomic() {
        write!(f, "{}", e)
    } else {
        write!(f, "({})", e)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(Datum::String(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::Literal(d) => write!(f, "{}", d),
            Expr::BinaryOp { left, op, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
            Expr::And(terms) | Expr::Or(terms) => {
                let sep = if matches!(self, Expr::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sep)?;
                    }
                    write_operand(f, term)?;
                }
                Ok(())
            }
            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOp::Not => write!(f, "NOT ")?,
                    UnaryOp::Neg => write!(f, "-")?,
                }
                write_operand(f, expr)
            }
            Expr::Function {
                name,
                args,
                distinct,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::IsNull { expr, negated } => {
                write_operand(f, expr)?;
                write!(f, " IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write_operand(f, expr)?;
                write!(f, " {}IN (", if *negated { "NOT " } else { "" })?;
                write_list(f, list, ", ")?;
                write!(f, ")")
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                write_operand(f, expr)?;
                write!(f, " {}BETWEEN ", if *negated { "NOT " } else { "" })?;
                write_operand(f, low)?;
                write!(f, " AND ")?;
                write_operand(f, high)
            }
            Expr::Subquery(query) => write!(f, "({})", query),
            Expr::InSubquery {
                expr,
                query,
                negated,
            } => {
                write_operand(f, expr)?;
                write!(f, " {}IN ({})", if *negated { "NOT " } else { "" }, query)
            }
            Expr::Exists(query) => write!(f, "EXISTS ({})", query),
        }
    }
}

/// One item of a SELECT list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectValue {
    /// `*` or `table.*`
    Wildcard(ColumnName),
    /// Expression with optional alias
    Expr { expr: Expr, alias: Option<String> },
}

impl SelectValue {
    pub fn expr(expr: Expr) -> Self {
        SelectValue::Expr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: &str) -> Self {
        SelectValue::Expr {
            expr,
            alias: Some(alias.to_string()),
        }
    }

    pub fn wildcard() -> Self {
        SelectValue::Wildcard(ColumnName::wildcard())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, SelectValue::Wildcard(_))
    }
}

impl fmt::Display for SelectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectValue::Wildcard(name) => write!(f, "{}", name),
            SelectValue::Expr { expr, alias: None } => write!(f, "{}", expr),
            SelectValue::Expr {
                expr,
                alias: Some(a),
            } => write!(f, "{} AS {}", expr, a),
        }
    }
}

/// JOIN type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
    Semi,
    Anti,
}

impl JoinType {
    pub fn is_outer(&self) -> bool {
        matches!(
            self,
            JoinType::LeftOuter | JoinType::RightOuter | JoinType::FullOuter
        )
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "INNER",
            JoinType::LeftOuter => "LEFT OUTER",
            JoinType::RightOuter => "RIGHT OUTER",
            JoinType::FullOuter => "FULL OUTER",
            JoinType::Cross => "CROSS",
            JoinType::Semi => "SEMI",
            JoinType::Anti => "ANTI",
        };
        write!(f, "{}", s)
    }
}

/// Join condition of an explicit JOIN
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinCondition {
    On(Expr),
    None,
}

/// FROM-clause tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FromClause {
    /// Base table, optionally aliased
    BaseTable { table: String, alias: Option<String> },
    /// Subquery in FROM; the alias is mandatory
    Derived { query: Box<SelectClause>, alias: String },
    /// Explicit join of two FROM-clauses
    Join {
        left: Box<FromClause>,
        right: Box<FromClause>,
        join_type: JoinType,
        condition: JoinCondition,
    },
}

impl FromClause {
    pub fn table(name: &str) -> Self {
        FromClause::BaseTable {
            table: name.to_string(),
            alias: None,
        }
    }

    pub fn aliased_table(name: &str, alias: &str) -> Self {
        FromClause::BaseTable {
            table: name.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    pub fn derived(query: SelectClause, alias: &str) -> Self {
        FromClause::Derived {
            query: Box::new(query),
            alias: alias.to_string(),
        }
    }

    pub fn join(left: FromClause, right: FromClause, join_type: JoinType, on: Option<Expr>) -> Self {
        FromClause::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            condition: on.map_or(JoinCondition::None, JoinCondition::On),
        }
    }

    /// Base tables and derived tables are leaves of the join search, and
    /// so are outer joins, whose operands cannot be reordered.
    pub fn is_join_leaf(&self) -> bool {
        match self {
            FromClause::BaseTable { .. } | FromClause::Derived { .. } => true,
            FromClause::Join { join_type, .. } => join_type.is_outer(),
        }
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromClause::BaseTable { table, alias: None } => write!(f, "{}", table),
            FromClause::BaseTable {
                table,
                alias: Some(alias),
            } => write!(f, "{} AS {}", table, alias),
            FromClause::Derived { query, alias } => write!(f, "({}) AS {}", query, alias),
            FromClause::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                write!(f, "{} {} JOIN {}", left, join_type, right)?;
                match condition {
                    JoinCondition::On(expr) => write!(f, " ON {}", expr),
                    JoinCondition::None => Ok(()),
                }
            }
        }
    }
}

/// ORDER BY item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub ascending: bool,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: false,
        }
    }
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SelectClause {
    pub values: Vec<SelectValue>,
    pub from: Option<FromClause>,
    pub where_expr: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    /// 0 means no limit
    pub limit: u64,
    /// 0 means no offset
    pub offset: u64,
}

impl SelectClause {
    /// `SELECT *` with nothing else
    pub fn select_all() -> Self {
        Self {
            values: vec![SelectValue::wildcard()],
            ..Default::default()
        }
    }

    /// A single unqualified `*`
    pub fn is_trivial_project(&self) -> bool {
        matches!(self.values.as_slice(), [SelectValue::Wildcard(name)] if !name.is_table_specified())
    }
}

impl fmt::Display for SelectClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        if let Some(from) = &self.from {
            write!(f, " FROM {}", from)?;
        }
        if let Some(where_expr) = &self.where_expr {
            write!(f, " WHERE {}", where_expr)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY ")?;
            write_list(f, &self.group_by, ", ")?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        for (i, item) in self.order_by.iter().enumerate() {
            let direction = if item.ascending { "ASC" } else { "DESC" };
            let lead = if i == 0 { " ORDER BY " } else { ", " };
            write!(f, "{}{} {}", lead, item.expr, direction)?;
        }
        if self.limit > 0 {
            write!(f, " LIMIT {}", self.limit)?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_display() {
        let e = Expr::and(vec![
            Expr::eq(Expr::qualified("r", "a"), Expr::qualified("s", "a")),
            Expr::binary(Expr::column("b"), BinaryOp::Gt, Expr::literal(5)),
        ]);
        assert_eq!(e.to_string(), "(r.a = s.a) AND (b > 5)");
        assert_eq!(Expr::literal("it's").to_string(), "'it''s'");
        assert_eq!(Expr::count_star().to_string(), "COUNT(*)");
        assert_eq!(
            Expr::distinct_function("SUM", vec![Expr::column("x")]).to_string(),
            "SUM(DISTINCT x)"
        );
    }

    #[test]
    fn test_expr_symbols() {
        let e = Expr::and(vec![
            Expr::eq(Expr::qualified("r", "a"), Expr::qualified("s", "a")),
            Expr::is_null(Expr::qualified("r", "a")),
        ]);
        assert_eq!(
            e.symbols(),
            vec![ColumnName::qualified("r", "a"), ColumnName::qualified("s", "a")]
        );
    }

    #[test]
    fn test_expr_rewrite() {
        let e = Expr::binary(Expr::column("a"), BinaryOp::Add, Expr::column("b"));
        let rewritten = e
            .try_rewrite(&mut |e: &Expr| -> Result<Option<Expr>, ()> {
                Ok(match e {
                    Expr::Column(c) if c.column.as_deref() == Some("b") => Some(Expr::literal(1)),
                    _ => None,
                })
            })
            .unwrap();
        assert_eq!(rewritten.to_string(), "a + 1");
    }

    #[test]
    fn test_subquery_expressions() {
        let inner = SelectClause {
            values: vec![SelectValue::expr(Expr::column("a"))],
            from: Some(FromClause::table("s")),
            where_expr: Some(Expr::binary(Expr::column("a"), BinaryOp::Gt, Expr::literal(1))),
            ..Default::default()
        };
        let e = Expr::and(vec![
            Expr::in_subquery(Expr::qualified("r", "a"), inner.clone(), true),
            Expr::exists(inner.clone()),
        ]);
        assert_eq!(
            e.to_string(),
            "(r.a NOT IN (SELECT a FROM s WHERE a > 1)) AND EXISTS (SELECT a FROM s WHERE a > 1)"
        );
        assert!(e.contains_subquery());
        assert!(!Expr::column("a").contains_subquery());

        // the nested query's columns stay inside it
        assert_eq!(e.symbols(), vec![ColumnName::qualified("r", "a")]);
        let scalar = Expr::binary(Expr::column("b"), BinaryOp::Eq, Expr::subquery(inner));
        assert_eq!(scalar.symbols(), vec![ColumnName::column("b")]);
    }

    #[test]
    fn test_select_display() {
        let query = SelectClause {
            values: vec![
                SelectValue::Wildcard(ColumnName::table_wildcard("r")),
                SelectValue::aliased(Expr::count_star(), "n"),
            ],
            from: Some(FromClause::join(
                FromClause::aliased_table("r", "x"),
                FromClause::table("s"),
                JoinType::Inner,
                Some(Expr::eq(Expr::qualified("x", "a"), Expr::qualified("s", "a"))),
            )),
            group_by: vec![Expr::column("b")],
            order_by: vec![OrderByExpr::desc(Expr::column("n"))],
            limit: 3,
            ..Default::default()
        };
        assert_eq!(
            query.to_string(),
            "SELECT r.*, COUNT(*) AS n FROM r AS x INNER JOIN s ON x.a = s.a \
             GROUP BY b ORDER BY n DESC LIMIT 3"
        );
    }

    #[test]
    fn test_single_term_and() {
        let e = Expr::and(vec![Expr::column("a")]);
        assert_eq!(e, Expr::column("a"));
    }

    #[test]
    fn test_binary_op_flip() {
        assert_eq!(BinaryOp::Lt.flipped(), Some(BinaryOp::Gt));
        assert_eq!(BinaryOp::GtEq.flipped(), Some(BinaryOp::LtEq));
        assert_eq!(BinaryOp::Add.flipped(), None);
    }

    #[test]
    fn test_trivial_project() {
        assert!(SelectClause::select_all().is_trivial_project());
        let qualified = SelectClause {
            values: vec![SelectValue::Wildcard(ColumnName::table_wildcard("t"))],
            ..Default::default()
        };
        assert!(!qualified.is_trivial_project());
    }
}
