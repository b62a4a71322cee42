//! Tally categorical facet fields across every facet record
//!
//! Independent of projects and sessions. A record missing a field simply
//! does not contribute to that field's tally.

use serde::Serialize;

use crate::model::{Counts, FacetRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetTally {
    pub total: usize,
    pub outcomes: Counts,
    pub session_types: Counts,
    pub friction_counts: Counts,
    pub satisfaction_counts: Counts,
    pub helpfulness_counts: Counts,
    pub goal_categories: Counts,
    pub primary_successes: Counts,
}

impl FacetTally {
    pub fn from_records(facets: &[FacetRecord]) -> Self {
        let mut tally = FacetTally {
            total: facets.len(),
            ..Default::default()
        };

        for facet in facets {
            let categories = [
                ("outcome", &mut tally.outcomes),
                ("session_type", &mut tally.session_types),
                ("claude_helpfulness", &mut tally.helpfulness_counts),
                ("primary_success", &mut tally.primary_successes),
            ];
            for (field, counts) in categories {
                if let Some(value) = facet.category(field) {
                    counts.increment(value);
                }
            }

            let histograms = [
                ("friction_counts", &mut tally.friction_counts),
                ("user_satisfaction_counts", &mut tally.satisfaction_counts),
                ("goal_categories", &mut tally.goal_categories),
            ];
            for (field, counts) in histograms {
                if let Some(histogram) = facet.histogram(field) {
                    counts.merge(&histogram);
                }
            }
        }

        tally
    }
}
