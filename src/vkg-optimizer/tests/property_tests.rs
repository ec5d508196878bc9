//! Property tests for the optimizer driver over random self-joins.
//!
//! Queries are evaluated with SQL bag semantics over a tiny in-memory
//! database, before and after optimization.

use std::collections::{BTreeMap, BTreeSet};

use common_config::{IqSettings, OptimizationConfig};
use proptest::prelude::*;
use vkg_core::{
    Constant, DbTermType, FunctionKind, RelationDefinition, RelationPredicate, Term, Variable,
};
use vkg_iq::{Iq, IqFactory, IqNode, IqTree};
use vkg_optimizer::Optimizer;

const POOL: [&str; 4] = ["a", "b", "c", "d"];

/// `employee(id, dept)` keyed by `id`, `visit(who, place)` with duplicates.
fn relations() -> [RelationPredicate; 2] {
    [
        RelationDefinition::builder("employee")
            .attribute("id", DbTermType::Integer, false)
            .attribute("dept", DbTermType::Integer, true)
            .primary_key(&["id"])
            .build()
            .unwrap(),
        RelationDefinition::builder("visit")
            .attribute("who", DbTermType::Integer, true)
            .attribute("place", DbTermType::Integer, true)
            .build()
            .unwrap(),
    ]
}

fn factory() -> IqFactory {
    IqFactory::new(IqSettings::testing())
}

fn count_extensional(tree: &IqTree) -> usize {
    match tree.node() {
        IqNode::ExtensionalData(_) => 1,
        _ => tree.children().into_iter().map(count_extensional).sum(),
    }
}

/// A projection over a join of atoms `(relation, first, second)`, with optional DISTINCT.
fn build(atoms: &[(usize, usize, usize)], mask: u8, distinct: bool) -> Iq {
    let f = factory();
    let relations = relations();
    let children: Vec<IqTree> = atoms
        .iter()
        .map(|(r, first, second)| {
            f.create_extensional(
                relations[*r].clone(),
                vec![Term::var(POOL[*first]), Term::var(POOL[*second])],
            )
            .unwrap()
        })
        .collect();
    let join = f.create_inner_join(None, children).unwrap();

    // The first variable of the first atom is always projected.
    let first = Variable::new(POOL[atoms[0].1]);
    let projected: BTreeSet<Variable> = join
        .variables()
        .iter()
        .enumerate()
        .filter(|(i, v)| **v == first || mask & (1 << i) != 0)
        .map(|(_, v)| v.clone())
        .collect();
    let mut tree = f.create_projection(projected.clone(), join).unwrap();
    if distinct {
        tree = f.create_distinct(tree).unwrap();
    }
    Iq::new(projected.into_iter().collect(), tree).unwrap()
}

// ========== Evaluation ==========

type Row = BTreeMap<Variable, Option<i64>>;

fn table(name: &str) -> Vec<[Option<i64>; 2]> {
    match name {
        "employee" => vec![[Some(1), Some(10)], [Some(2), Some(10)], [Some(3), None]],
        "visit" => vec![
            [Some(1), Some(10)],
            [Some(1), Some(10)],
            [Some(2), None],
            [None, Some(3)],
        ],
        other => panic!("unknown relation {other}"),
    }
}

fn eval_term(term: &Term, row: &Row) -> Option<i64> {
    match term {
        Term::Variable(v) => row[v],
        Term::Constant(Constant::Integer(i)) => Some(*i),
        Term::Constant(Constant::Null) => None,
        other => panic!("unexpected term {other}"),
    }
}

fn holds(term: &Term, row: &Row) -> Option<bool> {
    let Term::Function(f) = term else {
        panic!("not a condition: {term}");
    };
    let args = f.args();
    match f.symbol().kind() {
        FunctionKind::Eq => match (eval_term(&args[0], row), eval_term(&args[1], row)) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        },
        FunctionKind::IsNotNull => Some(eval_term(&args[0], row).is_some()),
        FunctionKind::IsNull => Some(eval_term(&args[0], row).is_none()),
        FunctionKind::And => args.iter().fold(Some(true), |acc, a| match (acc, holds(a, row)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        }),
        other => panic!("unexpected condition {other:?}"),
    }
}

fn merge(left: &Row, right: &Row) -> Option<Row> {
    let mut merged = left.clone();
    for (v, value) in right {
        match left.get(v) {
            Some(existing) if existing.is_none() || value.is_none() || existing != value => {
                return None;
            }
            Some(_) => {}
            None => {
                merged.insert(v.clone(), *value);
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
                    let Term::Variable(v) = argument else {
                        panic!("unexpected argument {argument}");
                    };
                    let single = Row::from([(v.clone(), value)]);
                    row = merge(&row, &single)?;
                }
                Some(row)
            })
            .collect(),
        IqNode::Filter { node, child } => eval(child)
            .into_iter()
            .filter(|row| holds(&Term::from(node.condition().clone()), row) == Some(true))
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
                Some(condition) => {
                    let condition = Term::from(condition.clone());
                    rows.into_iter().filter(|r| holds(&condition, r) == Some(true)).collect()
                }
                None => rows,
            }
        }
        IqNode::Construction { node, child } => eval(child)
            .into_iter()
            .map(|row| {
                node.projected_variables()
                    .iter()
                    .map(|v| {
                        let value = match node.substitution().get(v) {
                            Some(t) => eval_term(t, &row),
                            None => row[v],
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
        IqNode::Empty(_) => Vec::new(),
        IqNode::True => vec![Row::new()],
        other => panic!("no evaluation for {}", other.kind_name()),
    }
}

fn answers(query: &Iq) -> Vec<Row> {
    let mut rows = eval(query.tree());
    rows.sort();
    rows
}

fn arb_atoms() -> impl Strategy<Value = Vec<(usize, usize, usize)>> {
    prop::collection::vec((0..2usize, 0..POOL.len(), 0..POOL.len()), 2..4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_optimization_reaches_a_fixpoint(
        atoms in prop::collection::vec((0..POOL.len(), 0..POOL.len()), 2..4),
        mask in any::<u8>(),
        distinct in any::<bool>(),
    ) {
        let atoms: Vec<(usize, usize, usize)> = atoms.into_iter().map(|(a, b)| (0, a, b)).collect();
        let query = build(&atoms, mask, distinct);
        let optimizer = Optimizer::standard(factory(), OptimizationConfig::default());

        let first = optimizer.optimize(query.clone()).unwrap();
        prop_assert!(first.iterations < OptimizationConfig::default().max_iterations);
        prop_assert_eq!(first.query.signature(), query.signature());
        first.query.tree().validate().unwrap();
        prop_assert!(count_extensional(first.query.tree()) <= atoms.len());

        let second = optimizer.optimize(first.query.clone()).unwrap();
        prop_assert_eq!(second.rules_applied, 0);
        prop_assert_eq!(second.query, first.query);
    }

    #[test]
    fn prop_optimization_preserves_answers(
        atoms in arb_atoms(),
        mask in any::<u8>(),
        distinct in any::<bool>(),
    ) {
        let query = build(&atoms, mask, distinct);
        let optimizer = Optimizer::standard(factory(), OptimizationConfig::default());

        let optimized = optimizer.optimize(query.clone()).unwrap().query;
        prop_assert_eq!(optimized.signature(), query.signature());
        prop_assert_eq!(
            answers(&optimized),
            answers(&query),
            "{}\n=>\n{}",
            query,
            optimized
        );
    }
}
