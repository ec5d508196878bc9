//! Most general unifiers.

use std::collections::VecDeque;

use super::Substitution;
use crate::term::Term;

/// Most general unifier of two terms.
pub fn unify_terms(left: &Term, right: &Term) -> Option<Substitution> {
    mgu([(left.clone(), right.clone())])
}

/// Most general unifier of two argument lists of the same length.
pub fn unify_sequences(left: &[Term], right: &[Term]) -> Option<Substitution> {
    if left.len() != right.len() {
        return None;
    }
    mgu(left.iter().cloned().zip(right.iter().cloned()))
}

/// Most general unifier of a set of term pairs; `None` if they do not unify.
///
/// When two variables meet, the variable on the left is bound to the one on
/// the right.
pub fn mgu(pairs: impl IntoIterator<Item = (Term, Term)>) -> Option<Substitution> {
    let mut pending: VecDeque<(Term, Term)> = pairs.into_iter().collect();
    let mut unifier = Substitution::empty();

    while let Some((left, right)) = pending.pop_front() {
        let left = unifier.apply_to_term(&left);
        let right = unifier.apply_to_term(&right);
        if left == right {
            continue;
        }
        match (left, right) {
            (Term::Variable(x), t) | (t, Term::Variable(x)) => {
                if t.contains_variable(&x) {
                    return None;
                }
                let binding = Substitution::singleton(x, t);
                unifier = binding.compose(&unifier);
            }
            (Term::Function(f), Term::Function(g)) => {
                if f.symbol() != g.symbol() || f.args().len() != g.args().len() {
                    return None;
                }
                pending.extend(f.args().iter().cloned().zip(g.args().iter().cloned()));
            }
            _ => return None,
        }
    }
    Some(unifier)
}
