// ABOUTME: Router that decides between single-worker execution and multi-step orchestration.
// ABOUTME: Also holds the caller-owned routing statistics accumulator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{Complexity, Domain, OrchestrationResult, QueryClassification, RoutePath};

/// Whether a classification needs the planner + executor path.
///
/// Any one condition is sufficient, even when `complexity` says Simple.
pub fn should_orchestrate(classification: &QueryClassification) -> bool {
    classification.complexity == Complexity::Complex
        || classification.requires_workflow
        || classification.requires_multiple_tools
        || classification.estimated_steps > 1
}

/// First classified domain, or General.
pub fn primary_domain(classification: &QueryClassification) -> Domain {
    classification
        .domains
        .first()
        .copied()
        .unwrap_or(Domain::General)
}

/// Route a classified query.
pub fn route(classification: &QueryClassification) -> RoutePath {
    if should_orchestrate(classification) {
        RoutePath::Orchestrated
    } else {
        RoutePath::Simple {
            domain: primary_domain(classification),
        }
    }
}

// =============================================================================
// Routing Statistics
// =============================================================================

/// Advisory counters over top-level requests. Owned by the caller and passed
/// into `process_query`; nothing here affects routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoutingStats {
    pub total: u64,
    pub simple: u64,
    pub complex: u64,
    /// Running mean of executed steps per request.
    pub average_steps: f64,
    pub domains: BTreeMap<Domain, u64>,
}

impl RoutingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished request into the counters.
    pub fn record(&mut self, classification: &QueryClassification, result: &OrchestrationResult) {
        self.total += 1;
        match result.route {
            RoutePath::Simple { .. } => self.simple += 1,
            RoutePath::Orchestrated => self.complex += 1,
        }

        let steps = result.steps.len() as f64;
        self.average_steps += (steps - self.average_steps) / self.total as f64;

        for domain in &classification.domains {
            *self.domains.entry(*domain).or_insert(0) += 1;
        }
    }

    /// Merge another accumulator into this one.
    pub fn merge(&mut self, other: &RoutingStats) {
        let total = self.total + other.total;
        if total > 0 {
            self.average_steps = (self.average_steps * self.total as f64
                + other.average_steps * other.total as f64)
                / total as f64;
        }
        self.total = total;
        self.simple += other.simple;
        self.complex += other.complex;
        for (domain, count) in &other.domains {
            *self.domains.entry(*domain).or_insert(0) += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::StepResult;

    fn make_classification(
        complexity: Complexity,
        domains: Vec<Domain>,
        workflow: bool,
        multi_tool: bool,
        steps: u32,
    ) -> QueryClassification {
        QueryClassification {
            complexity,
            domains,
            requires_multiple_tools: multi_tool,
            requires_workflow: workflow,
            estimated_steps: steps,
            reasoning: String::new(),
        }
    }

    fn make_result(route: RoutePath, step_count: usize) -> OrchestrationResult {
        let steps = (0..step_count)
            .map(|i| StepResult {
                step_id: format!("step-{}", i + 1),
                success: true,
                output: Some("ok".to_string()),
                error: None,
                tools_called: vec![],
                latency_ms: 1,
            })
            .collect();
        OrchestrationResult {
            success: true,
            final_response: "ok".to_string(),
            steps,
            total_latency_ms: 1,
            tools_called: vec![],
            route,
        }
    }

    // =========================================================================
    // Routing Decision
    // =========================================================================

    #[test]
    fn simple_single_step_does_not_orchestrate() {
        let c = make_classification(Complexity::Simple, vec![Domain::General], false, false, 1);
        assert!(!should_orchestrate(&c));
        assert_eq!(
            route(&c),
            RoutePath::Simple {
                domain: Domain::General
            }
        );
    }

    #[test]
    fn each_signal_alone_forces_orchestration() {
        let complex = make_classification(Complexity::Complex, vec![Domain::Web], false, false, 1);
        let workflow = make_classification(Complexity::Simple, vec![Domain::Web], true, false, 1);
        let multi = make_classification(Complexity::Simple, vec![Domain::Web], false, true, 1);
        let steps = make_classification(Complexity::Simple, vec![Domain::Web], false, false, 2);

        for c in [complex, workflow, multi, steps] {
            assert!(should_orchestrate(&c), "expected orchestration for {:?}", c);
            assert_eq!(route(&c), RoutePath::Orchestrated);
        }
    }

    #[test]
    fn primary_domain_is_first_entry() {
        let c = make_classification(
            Complexity::Complex,
            vec![Domain::Media, Domain::Event],
            false,
            true,
            2,
        );
        assert_eq!(primary_domain(&c), Domain::Media);
    }

    #[test]
    fn primary_domain_defaults_to_general() {
        let c = make_classification(Complexity::Simple, vec![], false, false, 1);
        assert_eq!(primary_domain(&c), Domain::General);
    }

    // =========================================================================
    // Routing Statistics
    // =========================================================================

    #[test]
    fn stats_track_routes_domains_and_average_steps() {
        let mut stats = RoutingStats::new();

        let simple =
            make_classification(Complexity::Simple, vec![Domain::Document], false, false, 1);
        stats.record(
            &simple,
            &make_result(
                RoutePath::Simple {
                    domain: Domain::Document,
                },
                1,
            ),
        );

        let complex = make_classification(
            Complexity::Complex,
            vec![Domain::Document, Domain::Web],
            true,
            true,
            3,
        );
        stats.record(&complex, &make_result(RoutePath::Orchestrated, 3));

        assert_eq!(stats.total, 2);
        assert_eq!(stats.simple, 1);
        assert_eq!(stats.complex, 1);
        assert!((stats.average_steps - 2.0).abs() < f64::EPSILON);
        assert_eq!(stats.domains[&Domain::Document], 2);
        assert_eq!(stats.domains[&Domain::Web], 1);
    }

    #[test]
    fn merge_combines_weighted_averages() {
        let c = make_classification(Complexity::Simple, vec![Domain::Task], false, false, 1);

        let mut a = RoutingStats::new();
        a.record(&c, &make_result(RoutePath::Simple { domain: Domain::Task }, 1));

        let mut b = RoutingStats::new();
        b.record(&c, &make_result(RoutePath::Orchestrated, 4));
        b.record(&c, &make_result(RoutePath::Orchestrated, 4));

        a.merge(&b);
        assert_eq!(a.total, 3);
        assert_eq!(a.simple, 1);
        assert_eq!(a.complex, 2);
        assert!((a.average_steps - 3.0).abs() < 1e-9);
        assert_eq!(a.domains[&Domain::Task], 3);
    }

    #[test]
    fn stats_serialize_domain_keys_as_strings() {
        let mut stats = RoutingStats::new();
        let c = make_classification(Complexity::Simple, vec![Domain::Event], false, false, 1);
        stats.record(&c, &make_result(RoutePath::Simple { domain: Domain::Event }, 1));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["domains"]["event"], 1);
    }
}
