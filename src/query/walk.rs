//! Generic traversal of the AST.
//!
//! [`walk`] observes nodes top-down and lets the visitor prune subtrees.
//! [`rewrite`] transforms nodes bottom-up: children are replaced before their
//! parent is handed to the rewriter.

use crate::query::ast::{
    BinaryExpr, Call, Dimension, Expr, Field, Query, SelectStatement, Source, Statement,
};

/// A borrowed view of any node that a walk can reach.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Query(&'a Query),
    Statements(&'a [Statement]),
    Statement(&'a Statement),
    /// A select statement walked on its own, outside a [`Statement`].
    Select(&'a SelectStatement),
    Fields(&'a [Field]),
    Field(&'a Field),
    Dimensions(&'a [Dimension]),
    Dimension(&'a Dimension),
    Source(&'a Source),
    Expr(&'a Expr),
}

macro_rules! impl_node_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a $ty> for Node<'a> {
                fn from(node: &'a $ty) -> Self {
                    Node::$variant(node)
                }
            }
        )*
    };
}

impl_node_from! {
    Query => Query,
    [Statement] => Statements,
    Statement => Statement,
    SelectStatement => Select,
    [Field] => Fields,
    Field => Field,
    [Dimension] => Dimensions,
    Dimension => Dimension,
    Source => Source,
    Expr => Expr,
}

/// Called by [`walk`] once per node.
pub trait Visitor {
    /// Returns the visitor to use for the node's children, or `None` to skip
    /// them. Siblings of the node are still visited.
    fn visit(&mut self, node: Node<'_>) -> Option<&mut dyn Visitor>;
}

/// Traverses a node hierarchy in depth-first, pre-order.
pub fn walk<'a>(visitor: &mut dyn Visitor, node: impl Into<Node<'a>>) {
    let node = node.into();
    let Some(visitor) = visitor.visit(node) else {
        return;
    };

    match node {
        Node::Query(query) => walk(visitor, query.statements.as_slice()),
        Node::Statements(statements) => {
            for stmt in statements {
                walk(visitor, stmt);
            }
        }
        Node::Statement(stmt) => match stmt {
            Statement::Select(select) => walk_select(visitor, select),
            Statement::ShowSeries(show) => {
                if let Some(source) = &show.source {
                    walk(visitor, source);
                }
                if let Some(condition) = &show.condition {
                    walk(visitor, condition);
                }
            }
            _ => {}
        },
        Node::Select(select) => walk_select(visitor, select),
        Node::Fields(fields) => {
            for field in fields {
                walk(visitor, field);
            }
        }
        Node::Field(field) => walk(visitor, &field.expr),
        Node::Dimensions(dimensions) => {
            for dimension in dimensions {
                walk(visitor, dimension);
            }
        }
        Node::Dimension(dimension) => walk(visitor, &dimension.expr),
        Node::Source(_) => {}
        Node::Expr(expr) => match expr {
            Expr::Binary(binary) => {
                walk(visitor, &*binary.lhs);
                walk(visitor, &*binary.rhs);
            }
            Expr::Paren(inner) => walk(visitor, &**inner),
            Expr::Call(call) => {
                for arg in &call.args {
                    walk(visitor, arg);
                }
            }
            _ => {}
        },
    }
}

fn walk_select(visitor: &mut dyn Visitor, select: &SelectStatement) {
    walk(visitor, select.fields.as_slice());
    walk(visitor, select.dimensions.as_slice());
    walk(visitor, &select.source);
    if let Some(condition) = &select.condition {
        walk(visitor, condition);
    }
}

struct FnVisitor<F>(F);

impl<F: FnMut(Node<'_>)> Visitor for FnVisitor<F> {
    fn visit(&mut self, node: Node<'_>) -> Option<&mut dyn Visitor> {
        (self.0)(node);
        Some(self)
    }
}

/// Traverses a node hierarchy, calling `f` on every node.
pub fn walk_fn<'a, F>(node: impl Into<Node<'a>>, f: F)
where
    F: FnMut(Node<'_>),
{
    walk(&mut FnVisitor(f), node);
}

/// Replaces nodes during [`rewrite`].
///
/// There is one method per kind of slot, so a replacement always fits the
/// slot it goes into. Every method defaults to returning its input.
pub trait Rewriter {
    fn rewrite_query(&mut self, query: Query) -> Query {
        query
    }

    fn rewrite_statements(&mut self, statements: Vec<Statement>) -> Vec<Statement> {
        statements
    }

    fn rewrite_statement(&mut self, stmt: Statement) -> Statement {
        stmt
    }

    /// Only called for select statements rewritten on their own, outside a
    /// [`Statement`].
    fn rewrite_select(&mut self, select: SelectStatement) -> SelectStatement {
        select
    }

    fn rewrite_fields(&mut self, fields: Vec<Field>) -> Vec<Field> {
        fields
    }

    fn rewrite_field(&mut self, field: Field) -> Field {
        field
    }

    fn rewrite_dimensions(&mut self, dimensions: Vec<Dimension>) -> Vec<Dimension> {
        dimensions
    }

    fn rewrite_dimension(&mut self, dimension: Dimension) -> Dimension {
        dimension
    }

    fn rewrite_source(&mut self, source: Source) -> Source {
        source
    }

    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        expr
    }
}

/// Nodes that can be passed through [`rewrite`].
pub trait Rewrite: Sized {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self;
}

/// Rewrites a node hierarchy depth-first, from leaf to root.
pub fn rewrite<N: Rewrite, R: Rewriter + ?Sized>(rewriter: &mut R, node: N) -> N {
    node.rewrite_with(rewriter)
}

struct ExprRewriterFn<F>(F);

impl<F: FnMut(Expr) -> Expr> Rewriter for ExprRewriterFn<F> {
    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        (self.0)(expr)
    }
}

/// Rewrites every expression below `node` with `f`, leaves first.
pub fn rewrite_expr_fn<N, F>(node: N, f: F) -> N
where
    N: Rewrite,
    F: FnMut(Expr) -> Expr,
{
    rewrite(&mut ExprRewriterFn(f), node)
}

impl Rewrite for Query {
    fn rewrite_with<R: Rewriter + ?Sized>(mut self, rewriter: &mut R) -> Self {
        self.statements = self.statements.rewrite_with(rewriter);
        rewriter.rewrite_query(self)
    }
}

impl Rewrite for Vec<Statement> {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self {
        let mut statements = Vec::with_capacity(self.len());
        for stmt in self {
            statements.push(stmt.rewrite_with(rewriter));
        }
        rewriter.rewrite_statements(statements)
    }
}

impl Rewrite for Statement {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self {
        let stmt = match self {
            Statement::Select(select) => Statement::Select(rewrite_select_children(select, rewriter)),
            other => other,
        };
        rewriter.rewrite_statement(stmt)
    }
}

impl Rewrite for SelectStatement {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self {
        let select = rewrite_select_children(self, rewriter);
        rewriter.rewrite_select(select)
    }
}

fn rewrite_select_children<R: Rewriter + ?Sized>(
    mut select: SelectStatement,
    rewriter: &mut R,
) -> SelectStatement {
    select.fields = select.fields.rewrite_with(rewriter);
    select.dimensions = select.dimensions.rewrite_with(rewriter);
    select.source = select.source.rewrite_with(rewriter);
    select.condition = select
        .condition
        .map(|condition| condition.rewrite_with(rewriter));
    select
}

impl Rewrite for Vec<Field> {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self {
        let mut fields = Vec::with_capacity(self.len());
        for field in self {
            fields.push(field.rewrite_with(rewriter));
        }
        rewriter.rewrite_fields(fields)
    }
}

impl Rewrite for Field {
    fn rewrite_with<R: Rewriter + ?Sized>(mut self, rewriter: &mut R) -> Self {
        self.expr = self.expr.rewrite_with(rewriter);
        rewriter.rewrite_field(self)
    }
}

impl Rewrite for Vec<Dimension> {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self {
        let mut dimensions = Vec::with_capacity(self.len());
        for dimension in self {
            dimensions.push(dimension.rewrite_with(rewriter));
        }
        rewriter.rewrite_dimensions(dimensions)
    }
}

impl Rewrite for Dimension {
    fn rewrite_with<R: Rewriter + ?Sized>(mut self, rewriter: &mut R) -> Self {
        self.expr = self.expr.rewrite_with(rewriter);
        rewriter.rewrite_dimension(self)
    }
}

impl Rewrite for Source {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self {
        rewriter.rewrite_source(self)
    }
}

impl Rewrite for Expr {
    fn rewrite_with<R: Rewriter + ?Sized>(self, rewriter: &mut R) -> Self {
        let expr = match self {
            Expr::Binary(BinaryExpr { op, lhs, rhs }) => Expr::Binary(BinaryExpr {
                op,
                lhs: Box::new((*lhs).rewrite_with(rewriter)),
                rhs: Box::new((*rhs).rewrite_with(rewriter)),
            }),
            Expr::Paren(inner) => Expr::Paren(Box::new((*inner).rewrite_with(rewriter))),
            Expr::Call(Call { name, args }) => {
                let mut rewritten = Vec::with_capacity(args.len());
                for arg in args {
                    rewritten.push(arg.rewrite_with(rewriter));
                }
                Expr::Call(Call {
                    name,
                    args: rewritten,
                })
            }
            leaf => leaf,
        };
        rewriter.rewrite_expr(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::Token;

    fn create_test_statement() -> SelectStatement {
        SelectStatement::new(
            vec![Field::new(Expr::call("mean", vec![Expr::var_ref("value")]))],
            Source::measurement("cpu"),
        )
        .with_dimensions(vec![Dimension::new(Expr::var_ref("host"))])
        .with_condition(Expr::binary(
            Token::And,
            Expr::binary(Token::Eq, Expr::var_ref("region"), Expr::string("us-west")),
            Expr::paren(Expr::binary(
                Token::Gt,
                Expr::var_ref("value"),
                Expr::Number(10.0),
            )),
        ))
    }

    fn describe(node: Node<'_>) -> String {
        match node {
            Node::Query(_) => "query".to_string(),
            Node::Statements(_) => "statements".to_string(),
            Node::Statement(_) => "statement".to_string(),
            Node::Select(_) => "select".to_string(),
            Node::Fields(_) => "fields".to_string(),
            Node::Field(_) => "field".to_string(),
            Node::Dimensions(_) => "dimensions".to_string(),
            Node::Dimension(_) => "dimension".to_string(),
            Node::Source(source) => format!("source:{}", source),
            Node::Expr(expr) => format!("expr:{}", expr),
        }
    }

    #[test]
    fn test_walk_pre_order() {
        let stmt = create_test_statement();
        let mut seen = Vec::new();
        walk_fn(&stmt, |node| seen.push(describe(node)));

        assert_eq!(
            seen,
            vec![
                "select",
                "fields",
                "field",
                "expr:mean(value)",
                "expr:value",
                "dimensions",
                "dimension",
                "expr:host",
                "source:cpu",
                "expr:region = 'us-west' AND (value > 10.000)",
                "expr:region = 'us-west'",
                "expr:region",
                "expr:'us-west'",
                "expr:(value > 10.000)",
                "expr:value > 10.000",
                "expr:value",
                "expr:10.000",
            ]
        );
    }

    #[test]
    fn test_walk_query() {
        let query = Query {
            statements: vec![
                Statement::Select(create_test_statement()),
                Statement::ShowDatabases,
            ],
        };
        let mut count = 0;
        walk_fn(&query, |_| count += 1);
        // query, statements, two statements and 16 nodes below the select
        assert_eq!(count, 20);
    }

    struct PruneFirstBinary {
        pruned: bool,
        seen: Vec<String>,
    }

    impl Visitor for PruneFirstBinary {
        fn visit(&mut self, node: Node<'_>) -> Option<&mut dyn Visitor> {
            self.seen.push(describe(node));
            if let Node::Expr(Expr::Binary(_)) = node {
                if !self.pruned {
                    self.pruned = true;
                    return None;
                }
            }
            Some(self)
        }
    }

    #[test]
    fn test_walk_prune_only_skips_subtree() {
        let expr = Expr::binary(
            Token::Or,
            Expr::call(
                "f",
                vec![Expr::binary(Token::Add, Expr::var_ref("a"), Expr::var_ref("b"))],
            ),
            Expr::binary(Token::Eq, Expr::var_ref("c"), Expr::Number(1.0)),
        );

        // The root is the first binary expression: nothing below it is seen.
        let mut visitor = PruneFirstBinary {
            pruned: false,
            seen: Vec::new(),
        };
        walk(&mut visitor, &expr);
        assert_eq!(visitor.seen, vec!["expr:f(a + b) OR c = 1.000"]);

        // Starting from the call, `a + b` is pruned but its sibling call
        // arguments and unrelated subtrees keep being visited.
        let fields = vec![
            Field::new(Expr::call(
                "f",
                vec![
                    Expr::binary(Token::Add, Expr::var_ref("a"), Expr::var_ref("b")),
                    Expr::var_ref("z"),
                ],
            )),
            Field::new(Expr::binary(Token::Mul, Expr::var_ref("c"), Expr::Number(2.0))),
        ];
        let mut visitor = PruneFirstBinary {
            pruned: false,
            seen: Vec::new(),
        };
        walk(&mut visitor, fields.as_slice());
        assert_eq!(
            visitor.seen,
            vec![
                "fields",
                "field",
                "expr:f(a + b, z)",
                "expr:a + b",
                "expr:z",
                "field",
                "expr:c * 2.000",
                "expr:c",
                "expr:2.000",
            ]
        );
    }

    struct Counting<'v> {
        inner: &'v mut Vec<String>,
    }

    struct Switching<'v> {
        child: Counting<'v>,
    }

    impl Visitor for Counting<'_> {
        fn visit(&mut self, node: Node<'_>) -> Option<&mut dyn Visitor> {
            self.inner.push(describe(node));
            Some(self)
        }
    }

    impl Visitor for Switching<'_> {
        fn visit(&mut self, _node: Node<'_>) -> Option<&mut dyn Visitor> {
            Some(&mut self.child)
        }
    }

    #[test]
    fn test_walk_continues_with_returned_visitor() {
        let expr = Expr::binary(Token::Sub, Expr::var_ref("a"), Expr::var_ref("b"));
        let mut seen = Vec::new();
        let mut visitor = Switching {
            child: Counting { inner: &mut seen },
        };
        walk(&mut visitor, &expr);
        assert_eq!(seen, vec!["expr:a", "expr:b"]);
    }

    #[test]
    fn test_rewrite_children_before_parent() {
        let expr = Expr::binary(
            Token::Add,
            Expr::var_ref("a"),
            Expr::paren(Expr::binary(Token::Mul, Expr::var_ref("b"), Expr::var_ref("c"))),
        );

        let mut order = Vec::new();
        let rewritten = rewrite_expr_fn(expr, |e| {
            order.push(e.to_string());
            match e {
                Expr::VarRef(r) => Expr::var_ref(r.name.to_uppercase()),
                other => other,
            }
        });

        assert_eq!(rewritten.to_string(), "A + (B * C)");
        assert_eq!(order, vec!["a", "b", "c", "B * C", "(B * C)", "A + (B * C)"]);
    }

    struct DropCondition;

    impl Rewriter for DropCondition {
        fn rewrite_statement(&mut self, stmt: Statement) -> Statement {
            match stmt {
                Statement::Select(mut select) => {
                    select.condition = None;
                    Statement::Select(select)
                }
                other => other,
            }
        }

        fn rewrite_source(&mut self, source: Source) -> Source {
            match source {
                Source::Measurement(m) => Source::measurement(format!("{}_1h", m.name)),
                other => other,
            }
        }
    }

    #[test]
    fn test_rewrite_statement_slots() {
        let query = Query {
            statements: vec![Statement::Select(create_test_statement())],
        };
        let query = rewrite(&mut DropCondition, query);
        assert_eq!(
            query.to_string(),
            "SELECT mean(value) FROM cpu_1h GROUP BY host"
        );
    }

    #[test]
    fn test_rewrite_select_statement_directly() {
        let stmt = rewrite_expr_fn(create_test_statement(), |e| match e {
            Expr::Number(n) => Expr::Number(n * 2.0),
            other => other,
        });
        assert_eq!(
            stmt.to_string(),
            "SELECT mean(value) FROM cpu WHERE region = 'us-west' AND (value > 20.000) GROUP BY host"
        );
    }
}
