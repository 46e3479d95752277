//! Integration tests: postfix token streams compiled and called as pipelines.

use cellflow_core::CellError;
use cellflow_formula::{
    compile_tokens, BinaryOperator, CompiledPipeline, FormulaError, FormulaValue, FunctionKind,
    GraphBuilder, NameEnvironment, NodeId, Token, UnaryOperator, NAME_REFERENCES,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn build(tokens: Vec<Token>) -> CompiledPipeline {
    compile_tokens(tokens, std::iter::empty::<(NodeId, FormulaValue)>())
        .expect("stream should compile")
}

fn cell(a1: &str) -> Token {
    Token::range(a1).unwrap()
}

fn input_names(pipeline: &CompiledPipeline) -> Vec<&str> {
    pipeline.inputs().iter().map(NodeId::as_str).collect()
}

#[test]
fn test_constant_formula_folds() {
    // =2+3
    let pipeline = build(vec![
        Token::literal(2.0),
        Token::literal(3.0),
        Token::binary(BinaryOperator::Add),
    ]);
    assert!(input_names(&pipeline).is_empty());
    assert_eq!(pipeline.call(&[]).unwrap(), FormulaValue::Number(5.0));
}

#[test]
fn test_cell_reference_is_required_input() {
    // =A1+10
    let pipeline = build(vec![
        cell("A1"),
        Token::literal(10.0),
        Token::binary(BinaryOperator::Add),
    ]);
    assert_eq!(input_names(&pipeline), vec!["A1"]);
    assert_eq!(pipeline.call(&[5.0.into()]).unwrap(), FormulaValue::Number(15.0));
}

#[test]
fn test_repeated_reference_is_one_input() {
    // =A1+A1
    let pipeline = build(vec![cell("A1"), cell("A1"), Token::binary(BinaryOperator::Add)]);
    assert_eq!(input_names(&pipeline), vec!["A1"]);
    assert_eq!(pipeline.call(&[4.0.into()]).unwrap(), FormulaValue::Number(8.0));
}

#[test]
fn test_sheet_qualified_references() {
    // ='Q1 Data'!B2 * Totals!$C$3
    let pipeline = build(vec![
        cell("'Q1 Data'!B2"),
        cell("Totals!$C$3"),
        Token::binary(BinaryOperator::Multiply),
    ]);
    assert_eq!(input_names(&pipeline), vec!["'Q1 Data'!B2", "Totals!C3"]);
    assert_eq!(
        pipeline
            .call_named([("Totals!C3", 3.0.into()), ("'Q1 Data'!B2", 7.0.into())])
            .unwrap(),
        FormulaValue::Number(21.0)
    );
}

#[test]
fn test_function_pipeline() {
    // =IF(A1>0, SUM(A1, B1, 1), "neg")
    let pipeline = build(vec![
        cell("A1"),
        Token::literal(0.0),
        Token::binary(BinaryOperator::GreaterThan),
        cell("A1"),
        cell("B1"),
        Token::literal(1.0),
        Token::function("SUM", 3),
        Token::literal("neg"),
        Token::function("IF", 3),
    ]);
    assert_eq!(pipeline.output().as_str(), "IF((A1 > 0), SUM(A1, B1, 1), \"neg\")");
    assert_eq!(input_names(&pipeline), vec!["A1", "B1"]);
    assert_eq!(
        pipeline.call(&[2.0.into(), 3.0.into()]).unwrap(),
        FormulaValue::Number(6.0)
    );
    assert_eq!(
        pipeline.call(&[(-2.0).into(), 3.0.into()]).unwrap(),
        FormulaValue::String("neg".into())
    );
}

#[test]
fn test_text_and_unary_operators() {
    // =UPPER("total: " & -A1%)
    let pipeline = build(vec![
        Token::literal("total: "),
        cell("A1"),
        Token::unary(UnaryOperator::Percent),
        Token::unary(UnaryOperator::Negate),
        Token::binary(BinaryOperator::Concat),
        Token::function("upper", 1),
    ]);
    assert_eq!(
        pipeline.call(&[50.0.into()]).unwrap(),
        FormulaValue::String("TOTAL: -0.5".into())
    );
}

#[test]
fn test_errors_propagate_as_values() {
    // =IFERROR(1/A1, -1) + 1/A1
    let pipeline = build(vec![
        Token::literal(1.0),
        cell("A1"),
        Token::binary(BinaryOperator::Divide),
        Token::literal(-1.0),
        Token::function("IFERROR", 2),
        Token::literal(1.0),
        cell("A1"),
        Token::binary(BinaryOperator::Divide),
        Token::binary(BinaryOperator::Add),
    ]);
    // 1/A1 is shared between both operands
    assert_eq!(
        pipeline
            .dispatcher()
            .function_nodes()
            .filter(|(_, f)| f.kind == FunctionKind::Passthrough)
            .count(),
        1
    );
    assert_eq!(pipeline.call(&[2.0.into()]).unwrap(), FormulaValue::Number(1.0));
    assert_eq!(
        pipeline.call(&[0.0.into()]).unwrap(),
        FormulaValue::Error(CellError::Div0)
    );
}

#[test]
fn test_defined_names() {
    // =Price * (1 + TaxRate) - Discount
    let mut builder = GraphBuilder::new();
    for token in [
        Token::name("Price").unwrap(),
        Token::literal(1.0),
        Token::name("TaxRate").unwrap(),
        Token::binary(BinaryOperator::Add),
        Token::binary(BinaryOperator::Multiply),
        Token::name("Discount").unwrap(),
        Token::binary(BinaryOperator::Subtract),
    ] {
        builder.append(token).unwrap();
    }
    builder.finish().unwrap();

    let batches = builder
        .dispatcher()
        .function_nodes()
        .filter(|(_, f)| f.kind == FunctionKind::References)
        .count();
    assert_eq!(batches, 1);
    assert_eq!(builder.references().len(), 3);

    let pipeline = builder.compile().unwrap();
    assert_eq!(input_names(&pipeline), vec![NAME_REFERENCES]);

    let names: NameEnvironment = [
        ("price", FormulaValue::Number(100.0)),
        ("taxrate", FormulaValue::Number(0.25)),
        ("discount", FormulaValue::Number(5.0)),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        pipeline.call(&[names.into()]).unwrap(),
        FormulaValue::Number(120.0)
    );

    let partial = NameEnvironment::builder().define("Price", 1.0).build();
    assert_eq!(
        pipeline.call(&[partial.into()]).unwrap(),
        FormulaValue::Error(CellError::Name)
    );
}

#[test]
fn test_names_folded_at_compile_time() {
    // =Rate * A1
    let mut builder = GraphBuilder::new();
    builder.append(Token::name("Rate").unwrap()).unwrap();
    builder.append(cell("A1")).unwrap();
    builder.append(Token::binary(BinaryOperator::Multiply)).unwrap();
    builder.finish().unwrap();

    let names = NameEnvironment::builder().define("rate", 3.0).build();
    let pipeline = builder
        .compile_with([(NAME_REFERENCES, FormulaValue::Names(names))])
        .unwrap();
    assert_eq!(input_names(&pipeline), vec!["A1"]);
    assert_eq!(pipeline.call(&[2.0.into()]).unwrap(), FormulaValue::Number(6.0));
}

#[test]
fn test_known_inputs_remove_leaves() {
    // =(A1 + B1) * C1
    let tokens = vec![
        cell("A1"),
        cell("B1"),
        Token::binary(BinaryOperator::Add),
        cell("C1"),
        Token::binary(BinaryOperator::Multiply),
    ];

    let pipeline = compile_tokens(
        tokens.clone(),
        [("A1", FormulaValue::Number(1.0)), ("B1", 2.0.into())],
    )
    .unwrap();
    assert_eq!(input_names(&pipeline), vec!["C1"]);
    assert_eq!(pipeline.call(&[10.0.into()]).unwrap(), FormulaValue::Number(30.0));

    let pipeline = compile_tokens(
        tokens,
        [
            ("A1", FormulaValue::Number(1.0)),
            ("B1", 2.0.into()),
            ("C1", 4.0.into()),
        ],
    )
    .unwrap();
    assert!(pipeline.is_constant());
    assert_eq!(pipeline.call(&[]).unwrap(), FormulaValue::Number(12.0));
}

#[test]
fn test_single_cell_array_result_is_scalar() {
    let array = FormulaValue::Array(vec![vec![FormulaValue::Boolean(true)]]);
    let pipeline = build(vec![Token::literal(array)]);
    assert_eq!(pipeline.call(&[]).unwrap(), FormulaValue::Boolean(true));

    // Inputs are normalized too when they are the result
    let pipeline = build(vec![cell("D4")]);
    let wrapped = FormulaValue::Array(vec![vec![FormulaValue::Number(2.0)]]);
    assert_eq!(pipeline.call(&[wrapped]).unwrap(), FormulaValue::Number(2.0));
}

#[test]
fn test_stream_errors() {
    let empty = compile_tokens(Vec::<Token>::new(), std::iter::empty::<(NodeId, FormulaValue)>());
    assert_eq!(empty.unwrap_err(), FormulaError::EmptyStream);

    let short = compile_tokens(
        vec![Token::literal(1.0), Token::binary(BinaryOperator::Add)],
        std::iter::empty::<(NodeId, FormulaValue)>(),
    );
    assert!(matches!(short, Err(FormulaError::Arity { expected: 2, available: 1, .. })));

    let unknown = compile_tokens(
        vec![Token::function("NOPE", 0)],
        std::iter::empty::<(NodeId, FormulaValue)>(),
    );
    assert_eq!(unknown.unwrap_err(), FormulaError::UnknownFunction("NOPE".into()));

    assert!(matches!(Token::range("A0"), Err(FormulaError::InvalidReference(_))));
    assert!(Token::name("B2").is_err());
}

#[test]
fn test_pipeline_is_shared_across_threads() {
    // =A1 * A1 + B1
    let pipeline = Arc::new(build(vec![
        cell("A1"),
        cell("A1"),
        Token::binary(BinaryOperator::Multiply),
        cell("B1"),
        Token::binary(BinaryOperator::Add),
    ]));

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pipeline = Arc::clone(&pipeline);
                scope.spawn(move || {
                    let x = i as f64;
                    (x, pipeline.call(&[x.into(), 1.0.into()]).unwrap())
                })
            })
            .collect();
        for handle in handles {
            let (x, result) = handle.join().unwrap();
            assert_eq!(result, FormulaValue::Number(x * x + 1.0));
        }
    });
}

#[test]
fn test_round_with_extreme_digits_folds() {
    // =ROUND(1, -1E10)
    let pipeline = build(vec![
        Token::literal(1.0),
        Token::literal(-1e10),
        Token::function("ROUND", 2),
    ]);
    assert!(pipeline.is_constant());
    assert_eq!(pipeline.call(&[]).unwrap(), FormulaValue::Number(0.0));
}
