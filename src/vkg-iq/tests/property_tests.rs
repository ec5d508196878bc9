//! Property tests for vkg-iq
//!
//! Random trees over a tiny in-memory database are evaluated with SQL
//! semantics. Derived properties must hold on the actual rows, and
//! normalization must not change the answers.

use std::collections::{BTreeMap, BTreeSet};

use common_config::IqSettings;
use proptest::prelude::*;
use vkg_core::{
    Constant, DbTermType, Expression, FunctionKind, RelationDefinition, RelationPredicate,
    Substitution, Term, Variable, VariableGenerator,
};
use vkg_iq::{IqFactory, IqNode, IqTree, LeftJoinNode};

// =========================================================================
// In-memory database
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Value {
    Null,
    Int(i64),
    Str(String),
}

impl Value {
    fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn to_term(&self) -> Term {
        match self {
            Value::Null => Term::null(),
            Value::Int(i) => Term::int(*i),
            Value::Str(s) => Term::string(s.clone()),
        }
    }
}

type Row = BTreeMap<Variable, Value>;

/// `r(a, b)` keyed by `a`, `s(a, b)` with duplicates, `t(a)` keyed by `a`.
fn relations() -> Vec<RelationPredicate> {
    vec![
        RelationDefinition::builder("r")
            .attribute("a", DbTermType::Integer, false)
            .attribute("b", DbTermType::Integer, true)
            .primary_key(&["a"])
            .build()
            .unwrap(),
        RelationDefinition::builder("s")
            .attribute("a", DbTermType::Integer, false)
            .attribute("b", DbTermType::Integer, false)
            .build()
            .unwrap(),
        RelationDefinition::builder("t")
            .attribute("a", DbTermType::Integer, false)
            .primary_key(&["a"])
            .build()
            .unwrap(),
    ]
}

fn table(name: &str) -> Vec<Vec<Value>> {
    use Value::{Int, Null};
    match name {
        "r" => vec![vec![Int(1), Int(1)], vec![Int(2), Int(1)], vec![Int(3), Null]],
        "s" => vec![vec![Int(1), Int(2)], vec![Int(1), Int(2)], vec![Int(2), Int(3)]],
        "t" => vec![vec![Int(1)], vec![Int(2)]],
        other => panic!("unknown relation {other}"),
    }
}

// =========================================================================
// Evaluation
// =========================================================================

fn eval_term(term: &Term, row: &Row) -> Value {
    match term {
        Term::Variable(v) => row
            .get(v)
            .cloned()
            .unwrap_or_else(|| panic!("{v} missing from {row:?}")),
        Term::Constant(Constant::Null) => Value::Null,
        Term::Constant(Constant::Integer(i)) => Value::Int(*i),
        Term::Constant(Constant::String(s)) => Value::Str(s.clone()),
        Term::Constant(Constant::Boolean(b)) => Value::Int(i64::from(*b)),
        Term::Constant(c) => panic!("unexpected constant {c:?}"),
        Term::Function(f) if f.symbol().is_boolean() => match eval_boolean(term, row) {
            None => Value::Null,
            Some(b) => Value::Int(i64::from(b)),
        },
        Term::Function(f) => {
            let args: Vec<Value> = f.args().iter().map(|a| eval_term(a, row)).collect();
            if args.iter().any(Value::is_null) {
                return Value::Null;
            }
            let ground = Term::function(
                f.symbol().clone(),
                args.iter().map(Value::to_term).collect(),
            );
            Value::Str(ground.to_string())
        }
    }
}

/// Three-valued evaluation: `None` stands for NULL.
fn eval_boolean(term: &Term, row: &Row) -> Option<bool> {
    let Term::Function(f) = term else {
        panic!("not a condition: {term}");
    };
    let args = f.args();
    match f.symbol().kind() {
        FunctionKind::Eq | FunctionKind::Neq => {
            let a = eval_term(&args[0], row);
            let b = eval_term(&args[1], row);
            if a.is_null() || b.is_null() {
                None
            } else {
                Some((a == b) == (f.symbol().kind() == &FunctionKind::Eq))
            }
        }
        kind @ (FunctionKind::Lt | FunctionKind::Lte | FunctionKind::Gt | FunctionKind::Gte) => {
            let a = eval_term(&args[0], row);
            let b = eval_term(&args[1], row);
            if a.is_null() || b.is_null() {
                return None;
            }
            Some(match kind {
                FunctionKind::Lt => a < b,
                FunctionKind::Lte => a <= b,
                FunctionKind::Gt => a > b,
                _ => a >= b,
            })
        }
        FunctionKind::IsNull => Some(eval_term(&args[0], row).is_null()),
        FunctionKind::IsNotNull => Some(!eval_term(&args[0], row).is_null()),
        FunctionKind::Not => eval_boolean(&args[0], row).map(|b| !b),
        FunctionKind::IsTrue => match &args[0] {
            Term::Function(_) => Some(eval_boolean(&args[0], row) == Some(true)),
            other => Some(eval_term(other, row) == Value::Int(1)),
        },
        FunctionKind::And => args.iter().fold(Some(true), |acc, a| {
            match (acc, eval_boolean(a, row)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }
        }),
        FunctionKind::Or => args.iter().fold(Some(false), |acc, a| {
            match (acc, eval_boolean(a, row)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }
        }),
        other => panic!("unexpected condition {other:?}"),
    }
}

fn holds(condition: &Expression, row: &Row) -> bool {
    eval_boolean(&Term::from(condition.clone()), row) == Some(true)
}

/// Merge two rows agreeing on their shared variables under SQL equality.
fn merge(left: &Row, right: &Row) -> Option<Row> {
    let mut merged = left.clone();
    for (v, value) in right {
        match left.get(v) {
            Some(existing) if existing.is_null() || value.is_null() || existing != value => {
                return None;
            }
            Some(_) => {}
            None => {
                merged.insert(v.clone(), value.clone());
            }
        }
    }
    Some(merged)
}

fn eval(tree: &IqTree) -> Vec<Row> {
    match tree.node() {
        IqNode::ExtensionalData(node) => table(node.relation().name())
            .into_iter()
            .filter_map(|values| {
                let mut row = Row::new();
                for (argument, value) in node.atom().arguments().iter().zip(values) {
                    match argument {
                        Term::Variable(v) => match row.get(v) {
                            Some(existing)
                                if existing.is_null() || value.is_null() || existing != &value =>
                            {
                                return None;
                            }
                            Some(_) => {}
                            None => {
                                row.insert(v.clone(), value);
                            }
                        },
                        constant => {
                            let expected = eval_term(constant, &Row::new());
                            if expected.is_null() || value.is_null() || expected != value {
                                return None;
                            }
                        }
                    }
                }
                Some(row)
            })
            .collect(),
        IqNode::Filter { node, child } => eval(child)
            .into_iter()
            .filter(|row| holds(node.condition(), row))
            .collect(),
        IqNode::InnerJoin { node, children } => {
            let mut rows = vec![Row::new()];
            for child in children {
                let child_rows = eval(child);
                rows = rows
                    .iter()
                    .flat_map(|l| child_rows.iter().filter_map(move |r| merge(l, r)))
                    .collect();
            }
            match node.condition() {
                Some(condition) => rows.into_iter().filter(|r| holds(condition, r)).collect(),
                None => rows,
            }
        }
        IqNode::LeftJoin { node, left, right } => {
            let right_rows = eval(right);
            let right_specific = LeftJoinNode::right_specific_variables(left, right);
            let mut rows = Vec::new();
            for l in eval(left) {
                let matches: Vec<Row> = right_rows
                    .iter()
                    .filter_map(|r| merge(&l, r))
                    .filter(|row| node.condition().map_or(true, |c| holds(c, row)))
                    .collect();
                if matches.is_empty() {
                    let mut padded = l.clone();
                    padded.extend(right_specific.iter().map(|v| (v.clone(), Value::Null)));
                    rows.push(padded);
                } else {
                    rows.extend(matches);
                }
            }
            rows
        }
        IqNode::Construction { node, child } => eval(child)
            .into_iter()
            .map(|row| {
                node.projected_variables()
                    .iter()
                    .map(|v| {
                        let value = match node.substitution().get(v) {
                            Some(t) => eval_term(t, &row),
                            None => row[v].clone(),
                        };
                        (v.clone(), value)
                    })
                    .collect()
            })
            .collect(),
        IqNode::Distinct { child, .. } => {
            let mut seen = BTreeSet::new();
            eval(child)
                .into_iter()
                .filter(|row| seen.insert(row.clone()))
                .collect()
        }
        IqNode::Union { children, .. } => children.iter().flat_map(eval).collect(),
        IqNode::Aggregation { node, child } => {
            let grouping = node.grouping_variables();
            let mut groups: BTreeMap<Vec<Value>, Vec<Row>> = BTreeMap::new();
            for row in eval(child) {
                let key = grouping.iter().map(|v| row[v].clone()).collect();
                groups.entry(key).or_default().push(row);
            }
            if groups.is_empty() && grouping.is_empty() {
                groups.insert(Vec::new(), Vec::new());
            }
            groups
                .into_iter()
                .map(|(key, rows)| {
                    let mut result: Row = grouping.iter().cloned().zip(key).collect();
                    for (v, t) in node.substitution().iter() {
                        result.insert(v.clone(), eval_aggregate(t, &rows));
                    }
                    result
                })
                .collect()
        }
        IqNode::Empty(_) => Vec::new(),
        IqNode::True => vec![Row::new()],
        other => panic!("no evaluation for {}", other.kind_name()),
    }
}

/// SQL aggregates ignore NULL arguments; `COUNT` without argument counts rows.
fn eval_aggregate(term: &Term, rows: &[Row]) -> Value {
    let Term::Function(f) = term else {
        panic!("not an aggregate: {term}");
    };
    let Some(argument) = f.args().first() else {
        return Value::Int(rows.len() as i64);
    };
    let values: Vec<Value> = rows
        .iter()
        .map(|row| eval_term(argument, row))
        .filter(|value| !value.is_null())
        .collect();
    match f.symbol().kind() {
        FunctionKind::Count => Value::Int(values.len() as i64),
        FunctionKind::Max => values.into_iter().max().unwrap_or(Value::Null),
        FunctionKind::Min => values.into_iter().min().unwrap_or(Value::Null),
        other => panic!("unexpected aggregate {other:?}"),
    }
}

fn sorted(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort();
    rows
}

// =========================================================================
// Random trees
// =========================================================================

const POOL: [&str; 4] = ["a", "b", "c", "d"];

#[derive(Debug, Clone)]
enum Shape {
    Binary(usize, usize, usize),
    Unary(usize),
    Filter(u8, usize, usize, Box<Shape>),
    Join(Box<Shape>, Box<Shape>),
    JoinOn(u8, usize, usize, Box<Shape>, Box<Shape>),
    LeftJoin(Box<Shape>, Box<Shape>),
    LeftJoinOn(u8, usize, usize, Box<Shape>, Box<Shape>),
    Union(Box<Shape>, Box<Shape>),
    Project(u8, usize, Box<Shape>),
    Aggregate(u8, usize, bool, Box<Shape>),
    Distinct(Box<Shape>),
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        (0..2usize, 0..4usize, 0..4usize).prop_map(|(r, a, b)| Shape::Binary(r, a, b)),
        (0..4usize).prop_map(Shape::Unary),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (0..4u8, 0..4usize, 0..4usize, inner.clone())
                .prop_map(|(k, a, b, c)| Shape::Filter(k, a, b, Box::new(c))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Shape::Join(Box::new(l), Box::new(r))),
            (0..4u8, 0..4usize, 0..4usize, inner.clone(), inner.clone())
                .prop_map(|(k, a, b, l, r)| Shape::JoinOn(k, a, b, Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Shape::LeftJoin(Box::new(l), Box::new(r))),
            (0..4u8, 0..4usize, 0..4usize, inner.clone(), inner.clone())
                .prop_map(|(k, a, b, l, r)| Shape::LeftJoinOn(k, a, b, Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Shape::Union(Box::new(l), Box::new(r))),
            (any::<u8>(), 0..4usize, inner.clone())
                .prop_map(|(m, b, c)| Shape::Project(m, b, Box::new(c))),
            (any::<u8>(), 0..4usize, any::<bool>(), inner.clone())
                .prop_map(|(m, a, max, c)| Shape::Aggregate(m, a, max, Box::new(c))),
            inner.prop_map(|c| Shape::Distinct(Box::new(c))),
        ]
    })
}

struct Builder {
    factory: IqFactory,
    relations: Vec<RelationPredicate>,
    counter: usize,
}

impl Builder {
    fn new() -> Self {
        Self {
            factory: IqFactory::new(IqSettings::testing()),
            relations: relations(),
            counter: 0,
        }
    }

    fn build(&mut self, shape: &Shape) -> IqTree {
        let f = self.factory;
        match shape {
            Shape::Binary(r, a, b) => f
                .create_extensional(
                    self.relations[*r].clone(),
                    vec![Term::var(POOL[*a]), Term::var(POOL[*b])],
                )
                .unwrap(),
            Shape::Unary(a) => f
                .create_extensional(self.relations[2].clone(), vec![Term::var(POOL[*a])])
                .unwrap(),
            Shape::Filter(kind, a, b, child) => {
                let child = self.build(child);
                let variables: Vec<Variable> = child.variables().iter().cloned().collect();
                match condition(*kind, *a, *b, &variables) {
                    Some(condition) => f.create_filter(condition, child).unwrap(),
                    None => child,
                }
            }
            Shape::Join(l, r) => {
                let children = vec![self.build(l), self.build(r)];
                f.create_inner_join(None, children).unwrap()
            }
            Shape::JoinOn(kind, a, b, l, r) => {
                let children = vec![self.build(l), self.build(r)];
                let variables: Vec<Variable> = children
                    .iter()
                    .flat_map(|c| c.variables().iter().cloned())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                f.create_inner_join(condition(*kind, *a, *b, &variables), children)
                    .unwrap()
            }
            Shape::LeftJoin(l, r) => {
                let left = self.build(l);
                let right = self.build(r);
                f.create_left_join(None, left, right).unwrap()
            }
            Shape::LeftJoinOn(kind, a, b, l, r) => {
                let left = self.build(l);
                let right = self.build(r);
                let variables: Vec<Variable> =
                    left.variables().union(right.variables()).cloned().collect();
                f.create_left_join(condition(*kind, *a, *b, &variables), left, right)
                    .unwrap()
            }
            Shape::Union(l, r) => {
                let left = self.build(l);
                let right = self.build(r);
                let common: BTreeSet<Variable> =
                    left.variables().intersection(right.variables()).cloned().collect();
                if common.is_empty() {
                    return left;
                }
                let children = [left, right]
                    .into_iter()
                    .map(|c| {
                        if c.variables() == &common {
                            c
                        } else {
                            f.create_projection(common.clone(), c).unwrap()
                        }
                    })
                    .collect();
                f.create_union(common, children).unwrap()
            }
            Shape::Aggregate(mask, a, max, child) => {
                let child = self.build(child);
                let variables: Vec<Variable> = child.variables().iter().cloned().collect();
                if variables.is_empty() {
                    return child;
                }
                let grouping: BTreeSet<Variable> = variables
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << (i % 8)) != 0)
                    .map(|(_, v)| v.clone())
                    .collect();
                let aggregated = Variable::new(format!("m{}", self.counter));
                self.counter += 1;
                let kind = if *max { FunctionKind::Max } else { FunctionKind::Count };
                let argument = Term::Variable(variables[a % variables.len()].clone());
                f.create_aggregation(
                    grouping,
                    Substitution::singleton(aggregated, Term::aggregate(kind, vec![argument])),
                    child,
                )
                .unwrap()
            }
            Shape::Project(mask, b, child) => {
                let child = self.build(child);
                let variables: Vec<Variable> = child.variables().iter().cloned().collect();
                let bound = Variable::new(format!("k{}", self.counter));
                self.counter += 1;
                let value = if variables.is_empty() {
                    Term::int(*b as i64)
                } else {
                    Term::db_function("f", vec![Term::Variable(variables[b % variables.len()].clone())])
                };
                let mut projected: BTreeSet<Variable> = variables
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << (i % 8)) != 0)
                    .map(|(_, v)| v.clone())
                    .collect();
                projected.insert(bound.clone());
                f.create_construction(projected, Substitution::singleton(bound, value), child)
                    .unwrap()
            }
            Shape::Distinct(child) => {
                let child = self.build(child);
                f.create_distinct(child).unwrap()
            }
        }
    }
}

/// A condition over `variables`, or `None` when there is no variable to test.
fn condition(kind: u8, a: usize, b: usize, variables: &[Variable]) -> Option<Expression> {
    if variables.is_empty() {
        return None;
    }
    let x = Term::Variable(variables[a % variables.len()].clone());
    let y = Term::Variable(variables[b % variables.len()].clone());
    Some(match kind {
        0 => Expression::eq(x, y),
        1 => Expression::eq(x, Term::int((b % 3) as i64)),
        2 => Expression::is_not_null(x),
        _ => Expression::comparison(FunctionKind::Lt, x, y),
    })
}

fn normalize(tree: &IqTree, factory: &IqFactory) -> IqTree {
    let mut generator = VariableGenerator::new(tree.known_variables());
    tree.normalize_for_optimization(factory, &mut generator)
        .unwrap()
}

// =========================================================================
// Properties
// =========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_non_nullable_variables_are_never_null(shape in arb_shape()) {
        let tree = Builder::new().build(&shape);
        let nullability = tree.variable_nullability();
        for row in eval(&tree) {
            for (v, value) in &row {
                if !nullability.is_possibly_nullable(v) {
                    prop_assert!(!value.is_null(), "{} is NULL in {:?}\n{}", v, row, tree);
                }
            }
            for group in nullability.nullable_groups() {
                let nulls = group.iter().filter(|v| row[*v].is_null()).count();
                prop_assert!(nulls == 0 || nulls == group.len(), "{:?} split in {:?}", group, row);
            }
        }
    }

    #[test]
    fn prop_unique_constraints_identify_rows(shape in arb_shape()) {
        let tree = Builder::new().build(&shape);
        let rows = eval(&tree);
        for constraint in tree.infer_unique_constraints() {
            let mut seen = BTreeSet::new();
            for row in &rows {
                let key: Vec<Value> = constraint.iter().map(|v| row[v].clone()).collect();
                prop_assert!(seen.insert(key), "{:?} is not unique\n{}", constraint, tree);
            }
        }
        if tree.is_distinct() {
            let distinct: BTreeSet<&Row> = rows.iter().collect();
            prop_assert_eq!(distinct.len(), rows.len());
        }
    }

    #[test]
    fn prop_normalization_preserves_answers(shape in arb_shape()) {
        let mut builder = Builder::new();
        let tree = builder.build(&shape);
        let normalized = normalize(&tree, &builder.factory);

        prop_assert_eq!(normalized.variables(), tree.variables());
        prop_assert!(normalized.validate().is_ok(), "invalid result\n{}", normalized);
        prop_assert_eq!(sorted(eval(&normalized)), sorted(eval(&tree)), "{}\n=>\n{}", tree, normalized);
    }

    #[test]
    fn prop_normalization_is_idempotent(shape in arb_shape()) {
        let mut builder = Builder::new();
        let tree = builder.build(&shape);
        let once = normalize(&tree, &builder.factory);
        let twice = normalize(&once, &builder.factory);
        prop_assert_eq!(once, twice);
    }
}
