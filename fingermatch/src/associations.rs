use crate::types::MinutiaId;

/// One-to-one correspondences between query and template minutiae accepted while
/// growing an alignment.
#[derive(Debug, Clone, Default)]
pub(crate) struct MinutiaAssociations {
    query_by_template: Vec<Option<MinutiaId>>,
    template_by_query: Vec<Option<MinutiaId>>,
}

impl MinutiaAssociations {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forgets every association and resizes the table for the given fingerprints.
    pub(crate) fn reset(&mut self, query_len: usize, template_len: usize) {
        self.template_by_query.clear();
        self.template_by_query.resize(query_len, None);
        self.query_by_template.clear();
        self.query_by_template.resize(template_len, None);
    }

    #[inline]
    pub(crate) fn associate(&mut self, query: MinutiaId, template: MinutiaId) {
        self.query_by_template[template.as_usize()] = Some(query);
        self.template_by_query[query.as_usize()] = Some(template);
    }

    #[inline]
    pub(crate) fn get_status(&self, query: MinutiaId, template: MinutiaId) -> MinutiaRelation {
        let associated_template = self.template_by_query[query.as_usize()];
        let associated_query = self.query_by_template[template.as_usize()];
        match (associated_template, associated_query) {
            (None, None) => MinutiaRelation::Unassociated,
            (Some(t), Some(q)) if t == template && q == query => MinutiaRelation::MutuallyAssociated,
            _ => MinutiaRelation::AssociatedToOther,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum MinutiaRelation {
    Unassociated,
    MutuallyAssociated,
    AssociatedToOther,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: usize) -> MinutiaId {
        value.into()
    }

    #[test]
    fn associations_are_symmetric() {
        let mut table = MinutiaAssociations::new();
        table.reset(4, 6);
        assert_eq!(table.get_status(id(0), id(5)), MinutiaRelation::Unassociated);

        table.associate(id(0), id(5));
        assert_eq!(table.get_status(id(0), id(5)), MinutiaRelation::MutuallyAssociated);
        assert_eq!(table.get_status(id(0), id(4)), MinutiaRelation::AssociatedToOther);
        assert_eq!(table.get_status(id(3), id(5)), MinutiaRelation::AssociatedToOther);
        assert_eq!(table.get_status(id(3), id(4)), MinutiaRelation::Unassociated);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut table = MinutiaAssociations::new();
        table.reset(3, 3);
        table.associate(id(2), id(1));
        table.reset(5, 2);
        assert_eq!(table.get_status(id(2), id(1)), MinutiaRelation::Unassociated);
        assert_eq!(table.get_status(id(4), id(0)), MinutiaRelation::Unassociated);
    }
}
