//! Integration tests for the Rill parser.
//!
//! Covers: statements, declarations, expression precedence and
//! associativity, call/member chains, `new`, assignment targets, loop
//! context checks, and error positions.

use rill_parser::parse;
use rill_types::ast::*;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

/// Parse source, panicking on errors.
fn parse_ok(source: &str) -> Program {
    match parse(source) {
        Ok(p) => p,
        Err(e) => panic!("unexpected parse error: {e}"),
    }
}

/// Parse source and return the error message.
fn parse_err(source: &str) -> String {
    match parse(source) {
        Ok(_) => panic!("expected a parse error"),
        Err(e) => e.message,
    }
}

/// The single expression of a one-statement program.
fn only_expr(source: &str) -> ExprRef {
    let prog = parse_ok(source);
    assert_eq!(prog.body.len(), 1, "expected exactly one statement");
    match &prog.body[0].kind {
        StmtKind::Expr(e) => e.clone(),
        other => panic!("expected an expression statement, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────

#[test]
fn var_declaration_list() {
    let prog = parse_ok("var a = 1, b, c = 'x';");
    match &prog.body[0].kind {
        StmtKind::Var(decls) => {
            assert_eq!(decls.len(), 3);
            assert_eq!(decls[0].name.name, "a");
            assert!(decls[0].init.is_some());
            assert_eq!(decls[1].name.name, "b");
            assert!(decls[1].init.is_none());
            assert_eq!(decls[2].name.name, "c");
        }
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn function_declaration_and_params() {
    let prog = parse_ok("function add(a, b) { return a + b; }");
    match &prog.body[0].kind {
        StmtKind::Function(name, func) => {
            assert_eq!(name.name, "add");
            assert_eq!(func.params.len(), 2);
            assert_eq!(func.params[1].name, "b");
            assert_eq!(func.body.len(), 1);
        }
        other => panic!("expected function declaration, got {other:?}"),
    }
}

#[test]
fn function_declaration_requires_name() {
    let msg = parse_err("function (a) { return a; }");
    assert!(msg.contains("function name"), "got: {msg}");
}

#[test]
fn if_else_chain() {
    let prog = parse_ok("if (a) b; else if (c) d; else e;");
    match &prog.body[0].kind {
        StmtKind::If { alt: Some(alt), .. } => {
            assert!(matches!(alt.kind, StmtKind::If { .. }));
        }
        other => panic!("expected if/else, got {other:?}"),
    }
}

#[test]
fn for_with_all_clauses() {
    let prog = parse_ok("for (var i = 0; i < 10; i++) { total += i; }");
    match &prog.body[0].kind {
        StmtKind::For {
            init: Some(ForInit::Var(decls)),
            cond: Some(_),
            update: Some(_),
            ..
        } => assert_eq!(decls[0].name.name, "i"),
        other => panic!("expected for, got {other:?}"),
    }
}

#[test]
fn for_with_empty_clauses() {
    let prog = parse_ok("for (;;) { break; }");
    match &prog.body[0].kind {
        StmtKind::For {
            init: None,
            cond: None,
            update: None,
            ..
        } => {}
        other => panic!("expected bare for, got {other:?}"),
    }
}

#[test]
fn break_outside_loop_is_an_error() {
    let msg = parse_err("break;");
    assert!(msg.contains("outside of a loop"), "got: {msg}");
}

#[test]
fn continue_inside_nested_function_does_not_see_outer_loop() {
    let msg = parse_err("while (true) { var f = function() { continue; }; }");
    assert!(msg.contains("outside of a loop"), "got: {msg}");
}

#[test]
fn try_catch_requires_param() {
    let prog = parse_ok("try { risky(); } catch (e) { handle(e); }");
    match &prog.body[0].kind {
        StmtKind::Try { param, .. } => assert_eq!(param.name, "e"),
        other => panic!("expected try, got {other:?}"),
    }
    parse_err("try { x(); } catch { y(); }");
}

#[test]
fn throw_statement() {
    let prog = parse_ok("throw 'boom';");
    assert!(matches!(&prog.body[0].kind, StmtKind::Throw(_)));
}

#[test]
fn semicolons_are_optional_before_close_brace() {
    let prog = parse_ok("function f() { return 1 }");
    assert!(matches!(&prog.body[0].kind, StmtKind::Function(_, _)));
}

#[test]
fn bare_return_takes_no_value() {
    let prog = parse_ok("return;\nreturn");
    assert!(matches!(&prog.body[0].kind, StmtKind::Return(None)));
    assert!(matches!(&prog.body[1].kind, StmtKind::Return(None)));
}

// ─────────────────────────────────────────────────────────────────────
// Expression precedence
// ─────────────────────────────────────────────────────────────────────

#[test]
fn multiplication_binds_tighter_than_addition() {
    let e = only_expr("1 + 2 * 3;");
    match &e.kind {
        ExprKind::Binary {
            op: BinOp::Add,
            right,
            ..
        } => assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinOp::Mul,
                ..
            }
        )),
        other => panic!("expected add at the root, got {other:?}"),
    }
}

#[test]
fn comparison_binds_tighter_than_logical_and() {
    let e = only_expr("a < b && c > d;");
    assert!(matches!(
        e.kind,
        ExprKind::Logical {
            op: LogicalOp::And,
            ..
        }
    ));
}

#[test]
fn logical_or_is_looser_than_and() {
    let e = only_expr("a || b && c;");
    match &e.kind {
        ExprKind::Logical {
            op: LogicalOp::Or,
            right,
            ..
        } => assert!(matches!(
            right.kind,
            ExprKind::Logical {
                op: LogicalOp::And,
                ..
            }
        )),
        other => panic!("expected or at the root, got {other:?}"),
    }
}

#[test]
fn assignment_is_right_associative() {
    let e = only_expr("a = b = 1;");
    match &e.kind {
        ExprKind::Assign { op: None, value, .. } => {
            assert!(matches!(value.kind, ExprKind::Assign { .. }));
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn compound_assignment_carries_its_operator() {
    let e = only_expr("x += 2;");
    assert!(matches!(
        e.kind,
        ExprKind::Assign {
            op: Some(BinOp::Add),
            ..
        }
    ));
    let e = only_expr("x >>>= 1;");
    assert!(matches!(
        e.kind,
        ExprKind::Assign {
            op: Some(BinOp::ShiftRightZeroFill),
            ..
        }
    ));
}

#[test]
fn assignment_target_must_be_a_reference() {
    let msg = parse_err("1 = 2;");
    assert!(msg.contains("assignment"), "got: {msg}");
}

#[test]
fn conditional_expression_nests_in_branches() {
    let e = only_expr("a ? b : c ? d : e;");
    match &e.kind {
        ExprKind::Conditional { alt, .. } => {
            assert!(matches!(alt.kind, ExprKind::Conditional { .. }));
        }
        other => panic!("expected conditional, got {other:?}"),
    }
}

#[test]
fn strict_and_loose_equality_are_distinct() {
    assert!(matches!(
        only_expr("a === b;").kind,
        ExprKind::Binary {
            op: BinOp::StrictEq,
            ..
        }
    ));
    assert!(matches!(
        only_expr("a == b;").kind,
        ExprKind::Binary {
            op: BinOp::LooseEq,
            ..
        }
    ));
}

#[test]
fn typeof_is_a_unary_operator() {
    assert!(matches!(
        only_expr("typeof x;").kind,
        ExprKind::Unary {
            op: UnaryOp::Typeof,
            ..
        }
    ));
}

#[test]
fn prefix_and_postfix_update() {
    assert!(matches!(
        only_expr("++i;").kind,
        ExprKind::Update { prefix: true, .. }
    ));
    assert!(matches!(
        only_expr("i--;").kind,
        ExprKind::Update {
            prefix: false,
            op: UpdateOp::Decrement,
            ..
        }
    ));
}

// ─────────────────────────────────────────────────────────────────────
// Calls, members, and `new`
// ─────────────────────────────────────────────────────────────────────

#[test]
fn member_chain_nests_left() {
    let e = only_expr("a.b.c;");
    match &e.kind {
        ExprKind::Member { object, property } => {
            assert_eq!(property, "c");
            assert!(matches!(&object.kind, ExprKind::Member { property, .. } if property == "b"));
        }
        other => panic!("expected member, got {other:?}"),
    }
}

#[test]
fn call_with_member_callee() {
    let e = only_expr("obj.greet(1, 2);");
    match &e.kind {
        ExprKind::Call { callee, args } => {
            assert_eq!(args.len(), 2);
            assert!(matches!(callee.kind, ExprKind::Member { .. }));
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn index_expression() {
    let e = only_expr("xs[i + 1];");
    match &e.kind {
        ExprKind::Index { index, .. } => {
            assert!(matches!(index.kind, ExprKind::Binary { .. }));
        }
        other => panic!("expected index, got {other:?}"),
    }
}

#[test]
fn new_with_member_path_and_args() {
    let e = only_expr("new ns.Point(1, 2);");
    match &e.kind {
        ExprKind::New { callee, args } => {
            assert_eq!(args.len(), 2);
            assert!(matches!(callee.kind, ExprKind::Member { .. }));
        }
        other => panic!("expected new, got {other:?}"),
    }
}

#[test]
fn new_without_argument_list() {
    let e = only_expr("new Point;");
    match &e.kind {
        ExprKind::New { args, .. } => assert!(args.is_empty()),
        other => panic!("expected new, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn array_literal_with_trailing_comma() {
    let e = only_expr("[1, 2, 3,];");
    match &e.kind {
        ExprKind::Array(items) => assert_eq!(items.len(), 3),
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn object_literal_key_forms() {
    let e = only_expr("({ a: 1, 'b c': 2, 3: 4 });");
    match &e.kind {
        ExprKind::Object(entries) => {
            assert_eq!(entries.len(), 3);
            assert_eq!(entries[0].key, "a");
            assert_eq!(entries[1].key, "b c");
            assert_eq!(entries[2].key, "3");
        }
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn function_expression_may_be_anonymous() {
    let e = only_expr("(function(x) { return x; });");
    match &e.kind {
        ExprKind::Function(f) => assert!(f.name.is_none()),
        other => panic!("expected function expression, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Error positions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn errors_carry_one_based_spans() {
    let err = parse(source_with_error()).unwrap_err();
    assert_eq!(err.span.start_line, 2);

    fn source_with_error() -> &'static str {
        "var ok = 1;\nvar = 2;"
    }
}

#[test]
fn unclosed_block_is_reported() {
    let msg = parse_err("function f() { return 1;");
    assert!(msg.contains("unclosed block"), "got: {msg}");
}
