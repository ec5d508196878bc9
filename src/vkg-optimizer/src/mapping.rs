//! DISTINCT insertion for mapping definitions.
//!
//! A mapping assertion is a query defining the triples of one predicate.
//! Duplicate triples are meaningless, so every definition can be made
//! distinct. When the normalized definition has the shape
//! `CONSTRUCTION -> DISTINCT -> UNION`, the DISTINCT is also pushed into the
//! union branches, so that branches are deduplicated before being merged.

use std::collections::BTreeMap;

use common_error::VkgResult;
use log::trace;
use vkg_iq::{Iq, IqFactory, IqNode};

/// Adds a DISTINCT on top of mapping definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingDistinctTransformer {
    factory: IqFactory,
}

impl MappingDistinctTransformer {
    pub fn new(factory: IqFactory) -> Self {
        Self { factory }
    }

    /// Apply [`add_distinct`](Self::add_distinct) to every definition of a mapping.
    pub fn add_distinct_to_mapping<K: Ord>(
        &self,
        mapping: BTreeMap<K, Iq>,
    ) -> VkgResult<BTreeMap<K, Iq>> {
        mapping
            .into_iter()
            .map(|(key, query)| Ok((key, self.add_distinct(&query)?)))
            .collect()
    }

    /// The definition with a DISTINCT on top, normalized.
    pub fn add_distinct(&self, query: &Iq) -> VkgResult<Iq> {
        let mut generator = query.variable_generator();
        let distinct_tree = self
            .factory
            .create_distinct(query.tree().clone())?
            .normalize_for_optimization(&self.factory, &mut generator)?;

        let IqNode::Construction { node, child } = distinct_tree.node() else {
            return query.with_tree(distinct_tree);
        };
        let IqNode::Distinct { child: union_tree, .. } = child.node() else {
            return query.with_tree(distinct_tree);
        };
        let IqNode::Union {
            node: union,
            children,
        } = union_tree.node()
        else {
            return query.with_tree(distinct_tree);
        };

        trace!("pushing DISTINCT into the {} branches of {union}", children.len());
        let tree = self
            .factory
            .create_construction(
                node.projected_variables().clone(),
                node.substitution().clone(),
                union.make_distinct(children, &self.factory)?,
            )?
            .normalize_for_optimization(&self.factory, &mut generator)?;
        query.with_tree(tree)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use common_config::IqSettings;
    use vkg_core::{DbTermType, RelationDefinition, Substitution, Term, Variable};
    use vkg_iq::IqTree;

    use super::*;

    fn factory() -> IqFactory {
        IqFactory::new(IqSettings::testing())
    }

    fn vars(names: &[&str]) -> BTreeSet<Variable> {
        names.iter().map(Variable::new).collect()
    }

    fn keyed(name: &str) -> IqTree {
        let relation = RelationDefinition::builder(name)
            .attribute("id", DbTermType::Integer, false)
            .primary_key(&["id"])
            .build()
            .unwrap();
        factory()
            .create_extensional(relation, vec![Term::var("x")])
            .unwrap()
    }

    fn visits() -> IqTree {
        let relation = RelationDefinition::builder("visit")
            .attribute("who", DbTermType::Integer, false)
            .attribute("place", DbTermType::Integer, false)
            .build()
            .unwrap();
        let atom = factory()
            .create_extensional(relation, vec![Term::var("x"), Term::var("p")])
            .unwrap();
        factory().create_projection(vars(&["x"]), atom).unwrap()
    }

    fn subjects(union: IqTree) -> Iq {
        let tree = factory()
            .create_construction(
                vars(&["s"]),
                [(
                    Variable::new("s"),
                    Term::template("http://example.org/{}", vec![Term::var("x")]),
                )]
                .into_iter()
                .collect::<Substitution>(),
                union,
            )
            .unwrap();
        Iq::new(vec![Variable::new("s")], tree).unwrap()
    }

    #[test]
    fn test_distinct_is_pushed_into_union_branches() {
        let union = factory()
            .create_union(vars(&["x"]), vec![keyed("employee"), visits()])
            .unwrap();

        let result = MappingDistinctTransformer::new(factory())
            .add_distinct(&subjects(union))
            .unwrap();

        let IqNode::Construction { child, .. } = result.tree().node() else {
            panic!("expected a construction, got {}", result.tree());
        };
        let IqNode::Distinct { child, .. } = child.node() else {
            panic!("expected a distinct, got {child}");
        };
        let IqNode::Union { children, .. } = child.node() else {
            panic!("expected a union, got {child}");
        };
        // The keyed branch is already distinct.
        assert!(children
            .iter()
            .any(|c| matches!(c.node(), IqNode::ExtensionalData(_))));
        assert!(children
            .iter()
            .any(|c| matches!(c.node(), IqNode::Distinct { .. })));
    }

    #[test]
    fn test_distinct_relation_needs_no_distinct() {
        let query = Iq::new(vec![Variable::new("x")], keyed("employee")).unwrap();

        let result = MappingDistinctTransformer::new(factory())
            .add_distinct(&query)
            .unwrap();

        assert_eq!(result, query);
    }

    #[test]
    fn test_whole_mapping() {
        let mapping = BTreeMap::from([
            ("employee", Iq::new(vec![Variable::new("x")], keyed("employee")).unwrap()),
            ("visitor", Iq::new(vec![Variable::new("x")], visits()).unwrap()),
        ]);

        let result = MappingDistinctTransformer::new(factory())
            .add_distinct_to_mapping(mapping)
            .unwrap();

        assert!(matches!(
            result["employee"].tree().node(),
            IqNode::ExtensionalData(_)
        ));
        assert!(matches!(
            result["visitor"].tree().node(),
            IqNode::Distinct { .. }
        ));
    }
}
