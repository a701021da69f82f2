//! Recursive-descent parser with precedence climbing (spec.md §4.2).
//!
//! Consumes the token slice produced by [`crate::lexer::Lexer`] and builds
//! the [`crate::ast::Node`] tree. Syntax errors are reported through an
//! [`ErrorSink`] and trigger panic-mode recovery rather than aborting the
//! parse outright; [`Parser::error_count`] is what actually gates
//! compilation (spec.md §4.2, §7).

use crate::{
    ast::{
        BinaryOperator, DeclKind, FilterComparator, FilterExpr, Literal, LogicalOperator, NamedArg, Node, NodeKind,
        UnaryOperator,
    },
    exception_private::ParseError,
    exception_public::{CodeLoc, ErrorSink, ScriptError},
    token::{Token, TokenKind},
};

/// Comparator symbols recognized inside a `property(op, value)` filter
/// clause or a plain binary-operator position.
const COMPARATORS: &[(&str, FilterComparator)] = &[
    ("==", FilterComparator::Eq),
    ("!=", FilterComparator::Neq),
    ("<=", FilterComparator::Lte),
    (">=", FilterComparator::Gte),
    ("<", FilterComparator::Lt),
    (">", FilterComparator::Gt),
];

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    sink: &'a mut dyn ErrorSink,
    error_count: usize,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(tokens: &'a [Token], sink: &'a mut dyn ErrorSink) -> Self {
        Self {
            tokens,
            pos: 0,
            sink,
            error_count: 0,
        }
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Parses every top-level statement up to `Eof`.
    pub fn parse_program(&mut self) -> Vec<Node> {
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.is_at_end() {
            stmts.push(self.parse_statement());
            self.skip_separators();
        }
        stmts
    }

    // --- token cursor -----------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_n(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn loc(&self) -> CodeLoc {
        let t = self.peek();
        CodeLoc::new(t.line, t.column)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.check(TokenKind::Keyword) && self.peek().lexeme == word
    }

    fn check_op(&self, sym: &str) -> bool {
        self.check(TokenKind::Operator) && self.peek().lexeme == sym
    }

    fn check_punct(&self, sym: &str) -> bool {
        self.check(TokenKind::Punctuation) && self.peek().lexeme == sym
    }

    fn at_statement_end(&self) -> bool {
        self.check(TokenKind::Newline)
            || self.check_punct(";")
            || self.check(TokenKind::Dedent)
            || self.check_punct("}")
            || self.is_at_end()
    }

    fn describe_current(&self) -> String {
        self.peek().to_string()
    }

    fn error(&mut self, err: ParseError) {
        self.error_count += 1;
        self.sink.report(ScriptError::new(err.loc(), err.to_string()));
    }

    /// Discards tokens until the next statement boundary (spec.md §4.2):
    /// a newline, a dedent, a semicolon, a closing brace, or EOF.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Newline | TokenKind::Dedent => {
                    self.advance();
                    return;
                }
                _ if self.check_punct(";") || self.check_punct("}") => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_separators(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    fn expect_identifier(&mut self) -> String {
        if self.check(TokenKind::Identifier) {
            self.advance().lexeme
        } else {
            let loc = self.loc();
            let found = self.describe_current();
            self.error(ParseError::UnexpectedToken { found, expected: "identifier", loc });
            String::new()
        }
    }

    fn expect_string_literal(&mut self) -> String {
        if self.check(TokenKind::String) {
            self.advance().lexeme
        } else {
            let loc = self.loc();
            let found = self.describe_current();
            self.error(ParseError::UnexpectedToken { found, expected: "string literal", loc });
            String::new()
        }
    }

    fn expect_op(&mut self, sym: &'static str) {
        if self.check_op(sym) {
            self.advance();
        } else {
            let loc = self.loc();
            let found = self.describe_current();
            self.error(ParseError::UnexpectedToken { found, expected: sym, loc });
        }
    }

    fn expect_punct(&mut self, sym: &'static str) {
        if self.check_punct(sym) {
            self.advance();
        } else {
            let loc = self.loc();
            let found = self.describe_current();
            self.error(ParseError::UnexpectedToken { found, expected: sym, loc });
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &'static str) {
        if self.check(kind) {
            self.advance();
        } else {
            let loc = self.loc();
            let found = self.describe_current();
            self.error(ParseError::UnexpectedToken { found, expected, loc });
        }
    }

    // --- statements ---------------------------------------------------

    fn finish_statement(&mut self) {
        if self.check(TokenKind::Newline) {
            self.advance();
            return;
        }
        if self.check_punct(";") {
            self.advance();
            return;
        }
        if self.check(TokenKind::Dedent) || self.check_punct("}") || self.is_at_end() {
            return;
        }
        let loc = self.loc();
        self.error(ParseError::MissingTerminator { loc });
        self.synchronize();
    }

    fn parse_statement(&mut self) -> Node {
        let loc = self.loc();
        if self.check_keyword("var") || self.check_keyword("let") {
            return self.parse_var_or_let(loc);
        }
        if self.check_keyword("if") {
            self.advance();
            return self.parse_if(loc);
        }
        if self.check_keyword("while") {
            self.advance();
            let condition = Box::new(self.parse_expression());
            let body = Box::new(self.parse_block());
            return Node::new(NodeKind::While { condition, body }, loc);
        }
        if self.check_keyword("for") {
            self.advance();
            return self.parse_for(loc);
        }
        if self.check_keyword("switch") {
            self.advance();
            return self.parse_switch(loc);
        }
        if self.check_keyword("import") {
            self.advance();
            let path = self.expect_string_literal();
            let node = Node::new(NodeKind::Import { path }, loc);
            self.finish_statement();
            return node;
        }
        if self.check_keyword("return") {
            self.advance();
            let value = if self.at_statement_end() { None } else { Some(Box::new(self.parse_expression())) };
            let node = Node::new(NodeKind::Return { value }, loc);
            self.finish_statement();
            return node;
        }
        if self.check(TokenKind::Identifier) && self.peek_n(1).kind == TokenKind::Operator && self.peek_n(1).lexeme == ":" {
            return self.parse_named_binding(loc);
        }
        let node = self.parse_assignment_or_expr();
        self.finish_statement();
        node
    }

    fn parse_var_or_let(&mut self, loc: CodeLoc) -> Node {
        let mutable = self.check_keyword("var");
        self.advance();
        let name = self.expect_identifier();
        self.expect_op(":");
        if self.check_keyword("function") {
            self.advance();
            let params = self.parse_param_list();
            let body = Box::new(self.parse_block());
            let func = Node::new(NodeKind::FunctionDef { name: name.clone(), params, body }, loc);
            return Node::new(
                NodeKind::VariableDecl {
                    name,
                    initializer: Some(Box::new(func)),
                    kind: if mutable { DeclKind::Var } else { DeclKind::Let },
                    mutable,
                },
                loc,
            );
        }
        let initializer = Some(Box::new(self.parse_expression()));
        let node = Node::new(
            NodeKind::VariableDecl { name, initializer, kind: if mutable { DeclKind::Var } else { DeclKind::Let }, mutable },
            loc,
        );
        self.finish_statement();
        node
    }

    /// A bare `name :` with no leading `var`/`let`: an implicit declaration,
    /// a naked iterator, or a function/event-binding definition (spec.md
    /// §4.2). Distinguishing the first two requires looking past the
    /// right-hand expression for a trailing block.
    fn parse_named_binding(&mut self, loc: CodeLoc) -> Node {
        let name = self.expect_identifier();
        self.expect_op(":");
        if self.check_keyword("function") {
            self.advance();
            return self.parse_function_or_event(name, loc);
        }
        let value = self.parse_expression();
        if self.looks_like_block_start() {
            let body = Box::new(self.parse_block());
            return Node::new(NodeKind::NakedIterator { var_name: name, iterable: Box::new(value), body }, loc);
        }
        let node = Node::new(
            NodeKind::VariableDecl { name, initializer: Some(Box::new(value)), kind: DeclKind::Implicit, mutable: true },
            loc,
        );
        self.finish_statement();
        node
    }

    /// `handler-name : function( params ) <- [ ... ]` (event binding) or a
    /// plain `name : function( params )` definition (spec.md §4.2/§4.5).
    fn parse_function_or_event(&mut self, name: String, loc: CodeLoc) -> Node {
        let params = self.parse_param_list();
        if self.check_op("<-") {
            self.advance();
            self.expect_punct("[");
            let event_name = self.expect_string_literal();
            let condition = self.parse_optional_condition();
            let filters = self.parse_filter_chain();
            self.expect_punct("]");
            let body = Box::new(self.parse_block());
            return Node::new(
                NodeKind::EventBinding { handler_name: name, params, event_name, condition, filters, body },
                loc,
            );
        }
        let body = Box::new(self.parse_block());
        Node::new(NodeKind::FunctionDef { name, params, body }, loc)
    }

    fn parse_if(&mut self, loc: CodeLoc) -> Node {
        let condition = Box::new(self.parse_expression());
        let body = Box::new(self.parse_block());
        let else_body = if self.check_keyword("else") {
            self.advance();
            if self.check_keyword("if") {
                let inner_loc = self.loc();
                self.advance();
                Some(Box::new(self.parse_if(inner_loc)))
            } else {
                Some(Box::new(self.parse_block()))
            }
        } else {
            None
        };
        Node::new(NodeKind::If { condition, body, else_body }, loc)
    }

    fn parse_for(&mut self, loc: CodeLoc) -> Node {
        self.expect_punct("(");
        let initializer = if self.check_punct(";") { None } else { Some(Box::new(self.parse_for_clause())) };
        self.expect_punct(";");
        let condition = if self.check_punct(";") { None } else { Some(Box::new(self.parse_expression())) };
        self.expect_punct(";");
        let increment = if self.check_punct(")") { None } else { Some(Box::new(self.parse_for_clause())) };
        self.expect_punct(")");
        let body = Box::new(self.parse_block());
        Node::new(NodeKind::For { initializer, condition, increment, body }, loc)
    }

    /// A `for(...)` clause: a declaration or an assignment/expression, with
    /// no statement terminator of its own (the surrounding `;`/`)` mark the
    /// boundary instead).
    fn parse_for_clause(&mut self) -> Node {
        let loc = self.loc();
        if self.check_keyword("var") || self.check_keyword("let") {
            let mutable = self.check_keyword("var");
            self.advance();
            let name = self.expect_identifier();
            self.expect_op(":");
            let initializer = Some(Box::new(self.parse_expression()));
            return Node::new(
                NodeKind::VariableDecl { name, initializer, kind: if mutable { DeclKind::Var } else { DeclKind::Let }, mutable },
                loc,
            );
        }
        if self.check(TokenKind::Identifier) && self.peek_n(1).kind == TokenKind::Operator && self.peek_n(1).lexeme == ":" {
            let name = self.expect_identifier();
            self.advance();
            let initializer = Some(Box::new(self.parse_expression()));
            return Node::new(NodeKind::VariableDecl { name, initializer, kind: DeclKind::Implicit, mutable: true }, loc);
        }
        self.parse_assignment_or_expr()
    }

    fn parse_switch(&mut self, loc: CodeLoc) -> Node {
        let discriminant = Box::new(self.parse_expression());
        if self.check(TokenKind::Newline) {
            self.advance();
        }
        let brace = self.check_punct("{");
        if brace {
            self.advance();
        } else {
            self.expect_kind(TokenKind::Indent, "indented switch body");
        }
        let mut cases = Vec::new();
        let mut default = None;
        self.skip_separators();
        loop {
            let closed = if brace { self.check_punct("}") } else { self.check(TokenKind::Dedent) };
            if closed || self.is_at_end() {
                break;
            }
            if self.check_keyword("case") {
                self.advance();
                let value = self.parse_expression();
                let body = self.parse_block();
                cases.push((value, body));
            } else if self.check_keyword("default") {
                self.advance();
                default = Some(Box::new(self.parse_block()));
            } else {
                let at = self.loc();
                let found = self.describe_current();
                self.error(ParseError::UnexpectedToken { found, expected: "case or default", loc: at });
                self.synchronize();
            }
            self.skip_separators();
        }
        if brace {
            self.expect_punct("}");
        } else {
            self.expect_kind(TokenKind::Dedent, "dedent");
        }
        Node::new(NodeKind::SwitchCase { discriminant, cases, default }, loc)
    }

    /// Parses an assignment target or a bare expression statement (a
    /// function/method call, or a `fire[...]` broadcast).
    fn parse_assignment_or_expr(&mut self) -> Node {
        let loc = self.loc();
        let target = self.parse_expression();
        if self.check_op("=") {
            self.advance();
            let value = Box::new(self.parse_expression());
            return match target.kind {
                NodeKind::Variable(name) => Node::new(NodeKind::Assignment { target: name, value }, loc),
                NodeKind::PropertyAccess { object, property } => {
                    Node::new(NodeKind::PropertyAssignment { object, property, value }, loc)
                }
                NodeKind::IndexAccess { array, index } => Node::new(NodeKind::IndexAssignment { array, index, value }, loc),
                _ => {
                    self.error(ParseError::UnexpectedToken { found: "=".to_owned(), expected: "assignable target", loc });
                    target
                }
            };
        }
        target
    }

    // --- blocks -------------------------------------------------------

    /// True if the upcoming tokens open a block, without consuming them.
    fn looks_like_block_start(&self) -> bool {
        self.check_punct("{") || (self.check(TokenKind::Newline) && self.peek_n(1).kind == TokenKind::Indent)
    }

    /// Parses a brace-delimited or indentation-delimited block, both
    /// accepted wherever a block is expected (spec.md §4.2).
    fn parse_block(&mut self) -> Node {
        let loc = self.loc();
        if self.check(TokenKind::Newline) {
            self.advance();
        }
        if self.check_punct("{") {
            self.advance();
            let mut stmts = Vec::new();
            self.skip_separators();
            while !self.check_punct("}") && !self.is_at_end() {
                stmts.push(self.parse_statement());
                self.skip_separators();
            }
            self.expect_punct("}");
            Node::new(NodeKind::Block(stmts), loc)
        } else if self.check(TokenKind::Indent) {
            self.advance();
            let mut stmts = Vec::new();
            self.skip_separators();
            while !self.check(TokenKind::Dedent) && !self.is_at_end() {
                stmts.push(self.parse_statement());
                self.skip_separators();
            }
            self.expect_kind(TokenKind::Dedent, "dedent");
            Node::new(NodeKind::Block(stmts), loc)
        } else {
            self.error(ParseError::MissingTerminator { loc });
            Node::new(NodeKind::Block(Vec::new()), loc)
        }
    }

    // --- event binding/broadcast grammar --------------------------------

    fn parse_optional_condition(&mut self) -> Option<Box<Node>> {
        if !self.check_punct("{") {
            return None;
        }
        self.advance();
        if self.check_punct("}") {
            self.advance();
            return None;
        }
        let expr = self.parse_expression();
        self.expect_punct("}");
        Some(Box::new(expr))
    }

    fn parse_filter_chain(&mut self) -> Vec<FilterExpr> {
        let mut filters = Vec::new();
        while self.check_op("|") {
            self.advance();
            filters.push(self.parse_filter_expr());
        }
        filters
    }

    fn parse_filter_expr(&mut self) -> FilterExpr {
        let loc = self.loc();
        let tag = if self.check(TokenKind::Identifier) || self.check(TokenKind::Keyword) {
            self.advance().lexeme
        } else {
            self.expect_identifier()
        };
        if !self.check_punct("(") {
            let value = Box::new(Node::new(NodeKind::Literal(Literal::Boolean(true)), loc));
            return FilterExpr { tag, comparator: FilterComparator::Eq, value, loc };
        }
        self.advance();
        let comparator = COMPARATORS
            .iter()
            .copied()
            .find(|(sym, _)| self.check_op(sym))
            .map(|(sym, cmp)| {
                self.expect_op(sym);
                cmp
            })
            .unwrap_or(FilterComparator::Eq);
        let value = Box::new(self.parse_unary());
        self.expect_punct(")");
        FilterExpr { tag, comparator, value, loc }
    }

    fn parse_named_args(&mut self) -> Vec<NamedArg> {
        self.expect_punct("(");
        let mut args = Vec::new();
        while !self.check_punct(")") && !self.is_at_end() {
            let name = self.expect_identifier();
            self.expect_op(":");
            let value = Box::new(self.parse_expression());
            args.push(NamedArg { name, value });
            if self.check_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct(")");
        args
    }

    fn parse_broadcast(&mut self) -> Node {
        let loc = self.loc();
        self.advance(); // 'fire'
        self.expect_punct("[");
        let event_name = self.expect_string_literal();
        let condition = self.parse_optional_condition();
        let filters = self.parse_filter_chain();
        self.expect_punct("]");
        let args = if self.check_punct("(") { self.parse_named_args() } else { Vec::new() };
        Node::new(NodeKind::EventBroadcast { event_name, condition, filters, args }, loc)
    }

    // --- expressions (precedence low to high, spec.md §4.2) -------------

    fn parse_expression(&mut self) -> Node {
        self.parse_range()
    }

    fn parse_range(&mut self) -> Node {
        let loc = self.loc();
        let start = self.parse_logical_or();
        if self.check_op("..") {
            self.advance();
            let end = self.parse_logical_or();
            return Node::new(NodeKind::Range { start: Box::new(start), end: Box::new(end) }, loc);
        }
        start
    }

    fn parse_logical_or(&mut self) -> Node {
        let mut left = self.parse_logical_and();
        while self.check_op("||") {
            let loc = self.loc();
            self.advance();
            let right = self.parse_logical_and();
            left = Node::new(NodeKind::LogicalOp { left: Box::new(left), right: Box::new(right), op: LogicalOperator::Or }, loc);
        }
        left
    }

    fn parse_logical_and(&mut self) -> Node {
        let mut left = self.parse_equality();
        while self.check_op("&&") {
            let loc = self.loc();
            self.advance();
            let right = self.parse_equality();
            left =
                Node::new(NodeKind::LogicalOp { left: Box::new(left), right: Box::new(right), op: LogicalOperator::And }, loc);
        }
        left
    }

    fn parse_equality(&mut self) -> Node {
        let mut left = self.parse_comparison();
        loop {
            let op = if self.check_op("==") {
                BinaryOperator::Eq
            } else if self.check_op("!=") {
                BinaryOperator::Neq
            } else {
                break;
            };
            let loc = self.loc();
            self.advance();
            let right = self.parse_comparison();
            left = Node::new(NodeKind::BinaryOp { left: Box::new(left), right: Box::new(right), op }, loc);
        }
        left
    }

    fn parse_comparison(&mut self) -> Node {
        let mut left = self.parse_additive();
        loop {
            let op = if self.check_op("<=") {
                BinaryOperator::Lte
            } else if self.check_op(">=") {
                BinaryOperator::Gte
            } else if self.check_op("<") {
                BinaryOperator::Lt
            } else if self.check_op(">") {
                BinaryOperator::Gt
            } else {
                break;
            };
            let loc = self.loc();
            self.advance();
            let right = self.parse_additive();
            left = Node::new(NodeKind::BinaryOp { left: Box::new(left), right: Box::new(right), op }, loc);
        }
        left
    }

    fn parse_additive(&mut self) -> Node {
        let mut left = self.parse_multiplicative();
        loop {
            let op = if self.check_op("+") {
                BinaryOperator::Add
            } else if self.check_op("-") {
                BinaryOperator::Sub
            } else {
                break;
            };
            let loc = self.loc();
            self.advance();
            let right = self.parse_multiplicative();
            left = Node::new(NodeKind::BinaryOp { left: Box::new(left), right: Box::new(right), op }, loc);
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Node {
        let mut left = self.parse_unary();
        loop {
            let op = if self.check_op("*") {
                BinaryOperator::Mul
            } else if self.check_op("/") {
                BinaryOperator::Div
            } else if self.check_op("%") {
                BinaryOperator::Mod
            } else {
                break;
            };
            let loc = self.loc();
            self.advance();
            let right = self.parse_unary();
            left = Node::new(NodeKind::BinaryOp { left: Box::new(left), right: Box::new(right), op }, loc);
        }
        left
    }

    /// Unary operators are right-associative: the recursive call lets
    /// `!!x`/`--x` stack.
    fn parse_unary(&mut self) -> Node {
        let loc = self.loc();
        if self.check_op("-") {
            self.advance();
            let operand = Box::new(self.parse_unary());
            return Node::new(NodeKind::UnaryOp { operand, op: UnaryOperator::Neg }, loc);
        }
        if self.check_op("!") {
            self.advance();
            let operand = Box::new(self.parse_unary());
            return Node::new(NodeKind::UnaryOp { operand, op: UnaryOperator::Not }, loc);
        }
        self.parse_call_chain()
    }

    /// A primary atom plus any trailing `(...)` call, `.prop`/`.method(...)`,
    /// or `[index]` postfixes.
    fn parse_call_chain(&mut self) -> Node {
        let atom = self.parse_primary();
        let mut node = if let NodeKind::Variable(name) = &atom.kind {
            if self.check_punct("(") {
                let args = self.parse_call_args();
                Node::new(NodeKind::FunctionCall { callee: name.clone(), args }, atom.loc)
            } else {
                atom
            }
        } else {
            atom
        };
        loop {
            let chain_loc = node.loc;
            if self.check_op(".") {
                self.advance();
                let property = self.expect_identifier();
                if self.check_punct("(") {
                    let args = self.parse_call_args();
                    node = Node::new(NodeKind::MethodCall { object: Box::new(node), method: property, args }, chain_loc);
                } else {
                    node = Node::new(NodeKind::PropertyAccess { object: Box::new(node), property }, chain_loc);
                }
            } else if self.check_punct("[") {
                self.advance();
                let index = self.parse_expression();
                self.expect_punct("]");
                node = Node::new(NodeKind::IndexAccess { array: Box::new(node), index: Box::new(index) }, chain_loc);
            } else {
                break;
            }
        }
        node
    }

    fn parse_call_args(&mut self) -> Vec<Node> {
        self.expect_punct("(");
        let mut args = Vec::new();
        while !self.check_punct(")") && !self.is_at_end() {
            args.push(self.parse_expression());
            if self.check_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct(")");
        args
    }

    fn parse_param_list(&mut self) -> Vec<String> {
        self.expect_punct("(");
        let mut params = Vec::new();
        while !self.check_punct(")") && !self.is_at_end() {
            params.push(self.expect_identifier());
            if self.check_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct(")");
        params
    }

    fn parse_primary(&mut self) -> Node {
        let loc = self.loc();
        if self.check(TokenKind::Number) {
            let text = self.advance().lexeme;
            let value = text.parse::<f64>().unwrap_or(0.0);
            return Node::new(NodeKind::Literal(Literal::Number(value)), loc);
        }
        if self.check(TokenKind::String) {
            let text = self.advance().lexeme;
            return Node::new(NodeKind::Literal(Literal::String(text)), loc);
        }
        if self.check(TokenKind::Boolean) {
            let text = self.advance().lexeme;
            return Node::new(NodeKind::Literal(Literal::Boolean(text == "true")), loc);
        }
        if self.check(TokenKind::Null) {
            self.advance();
            return Node::new(NodeKind::Literal(Literal::Null), loc);
        }
        if self.check(TokenKind::Identifier) {
            let name = self.advance().lexeme;
            return Node::new(NodeKind::Variable(name), loc);
        }
        if self.check_keyword("fire") {
            return self.parse_broadcast();
        }
        if self.check_punct("(") {
            self.advance();
            let inner = self.parse_expression();
            self.expect_punct(")");
            return inner;
        }
        if self.check_punct("[") {
            self.advance();
            let mut elements = Vec::new();
            while !self.check_punct("]") && !self.is_at_end() {
                elements.push(self.parse_expression());
                if self.check_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_punct("]");
            return Node::new(NodeKind::ArrayLiteral(elements), loc);
        }
        if self.check_punct("{") {
            return self.parse_object_literal(loc);
        }
        let found = self.describe_current();
        self.error(ParseError::UnexpectedToken { found, expected: "expression", loc });
        if !self.is_at_end() {
            self.advance();
        }
        Node::new(NodeKind::Literal(Literal::Null), loc)
    }

    /// `{ hp: 10, atk: 1 }` or, with bare names mixed in, `{ base, atk: 5 }`
    /// where `base` is a mixin source rather than a key/value pair.
    fn parse_object_literal(&mut self, loc: CodeLoc) -> Node {
        self.advance(); // '{'
        let mut entries = Vec::new();
        let mut mixins = Vec::new();
        self.skip_separators();
        while !self.check_punct("}") && !self.is_at_end() {
            let name = self.expect_identifier();
            if self.check_op(":") {
                self.advance();
                let value = self.parse_expression();
                entries.push((name, value));
            } else {
                mixins.push(name);
            }
            if self.check_punct(",") {
                self.advance();
                self.skip_separators();
            } else {
                break;
            }
        }
        self.skip_separators();
        self.expect_punct("}");
        Node::new(NodeKind::ObjectLiteral { entries, mixins }, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exception_public::CollectingSink, lexer::Lexer};

    fn parse(src: &str) -> (Vec<Node>, usize) {
        let (tokens, lex_errors) = Lexer::new(src).tokenize();
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        let mut sink = CollectingSink::default();
        let mut parser = Parser::new(&tokens, &mut sink);
        let program = parser.parse_program();
        (program, parser.error_count())
    }

    #[test]
    fn arithmetic_respects_precedence() {
        let (program, errs) = parse("x: 1 + 2 * 3\n");
        assert_eq!(errs, 0);
        match &program[0].kind {
            NodeKind::VariableDecl { initializer: Some(init), kind: DeclKind::Implicit, .. } => match &init.kind {
                NodeKind::BinaryOp { op: BinaryOperator::Add, right, .. } => {
                    assert!(matches!(right.kind, NodeKind::BinaryOp { op: BinaryOperator::Mul, .. }));
                }
                other => panic!("expected Add at the top, got {other:?}"),
            },
            other => panic!("expected implicit decl, got {other:?}"),
        }
    }

    #[test]
    fn if_else_with_indentation() {
        let src = "var x: 10\nif x > 5\n    print(\"big\")\nelse\n    print(\"small\")\n";
        let (program, errs) = parse(src);
        assert_eq!(errs, 0);
        assert!(matches!(program[1].kind, NodeKind::If { else_body: Some(_), .. }));
    }

    #[test]
    fn naked_iterator_over_range() {
        let (program, errs) = parse("i: 0..3\n    print(i)\n");
        assert_eq!(errs, 0);
        match &program[0].kind {
            NodeKind::NakedIterator { var_name, iterable, .. } => {
                assert_eq!(var_name, "i");
                assert!(matches!(iterable.kind, NodeKind::Range { .. }));
            }
            other => panic!("expected naked iterator, got {other:?}"),
        }
    }

    #[test]
    fn object_literal_with_mixin() {
        let (program, errs) = parse("hero: { base, atk: 5, name: \"A\" }\n");
        assert_eq!(errs, 0);
        match &program[0].kind {
            NodeKind::VariableDecl { initializer: Some(init), .. } => match &init.kind {
                NodeKind::ObjectLiteral { entries, mixins } => {
                    assert_eq!(mixins, &["base".to_owned()]);
                    assert_eq!(entries.len(), 2);
                }
                other => panic!("expected object literal, got {other:?}"),
            },
            other => panic!("expected decl, got {other:?}"),
        }
    }

    #[test]
    fn event_binding_and_broadcast() {
        let src = "onHit: function(dmg) <- [\"Damage\" | type(\"enemy\") | priority(high)]\n    print(dmg)\nfire[\"Damage\" {} ](damage: 7)\n";
        let (program, errs) = parse(src);
        assert_eq!(errs, 0);
        assert!(matches!(program[0].kind, NodeKind::EventBinding { .. }));
        assert!(matches!(program[1].kind, NodeKind::EventBroadcast { .. }));
        if let NodeKind::EventBinding { filters, .. } = &program[0].kind {
            assert_eq!(filters.len(), 2);
            assert_eq!(filters[0].tag, "type");
        }
    }

    #[test]
    fn let_rebinding_is_still_syntactically_valid() {
        // Immutability is enforced by the compiler, not the parser.
        let (program, errs) = parse("let k: 1\nk: 2\n");
        assert_eq!(errs, 0);
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn dangling_operator_reports_error_and_terminates() {
        let (_program, errs) = parse("x: 1 +\ny: 2\n");
        assert!(errs > 0);
    }

    #[test]
    fn recovers_to_next_statement_after_bad_token() {
        let (program, errs) = parse("x: )\ny: 2\n");
        assert!(errs > 0);
        assert_eq!(program.len(), 2);
        match &program[1].kind {
            NodeKind::VariableDecl { name, .. } => assert_eq!(name, "y"),
            other => panic!("expected decl for y, got {other:?}"),
        }
    }
}
