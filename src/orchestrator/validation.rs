// ABOUTME: Structural validation of execution plans before they are executed.
// ABOUTME: Reports duplicate ids, dangling dependencies and self-dependencies as readable errors.

use std::collections::HashSet;

use super::types::ExecutionPlan;

/// Check a plan for structural defects. An empty list means the plan is valid.
pub fn validate_plan(plan: &ExecutionPlan) -> Vec<String> {
    let mut errors = Vec::new();

    let mut seen: HashSet<&str> = HashSet::new();
    for step in &plan.steps {
        if !seen.insert(step.id.as_str()) {
            errors.push(format!("Duplicate step id: {}", step.id));
        }
    }

    for step in &plan.steps {
        for dep in &step.dependencies {
            if dep == &step.id {
                errors.push(format!("Step {} depends on itself", step.id));
            } else if !seen.contains(dep.as_str()) {
                errors.push(format!(
                    "Step {} depends on unknown step {}",
                    step.id, dep
                ));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::{Complexity, Domain, TaskStep};

    fn make_plan(steps: Vec<TaskStep>) -> ExecutionPlan {
        ExecutionPlan {
            estimated_steps: steps.len() as u32,
            steps,
            complexity: Complexity::Complex,
            requires_orchestration: true,
            reasoning: String::new(),
        }
    }

    fn step(id: &str) -> TaskStep {
        TaskStep::new(id, Domain::Document, "execute", format!("Do {}", id))
    }

    #[test]
    fn valid_chain_has_no_errors() {
        let plan = make_plan(vec![
            step("a"),
            step("b").depends_on(["a"]),
            step("c").depends_on(["a", "b"]),
        ]);
        assert!(validate_plan(&plan).is_empty());
    }

    #[test]
    fn forward_reference_is_valid() {
        // Order is resolved by the executor, not by list position
        let plan = make_plan(vec![step("a").depends_on(["b"]), step("b")]);
        assert!(validate_plan(&plan).is_empty());
    }

    #[test]
    fn reports_duplicate_ids() {
        let plan = make_plan(vec![step("a"), step("a")]);
        assert_eq!(validate_plan(&plan), vec!["Duplicate step id: a".to_string()]);
    }

    #[test]
    fn reports_dangling_dependency() {
        let plan = make_plan(vec![step("a"), step("b").depends_on(["missing"])]);
        let errors = validate_plan(&plan);
        assert_eq!(errors, vec!["Step b depends on unknown step missing".to_string()]);
    }

    #[test]
    fn reports_self_dependency() {
        let plan = make_plan(vec![step("a").depends_on(["a"])]);
        let errors = validate_plan(&plan);
        assert_eq!(errors, vec!["Step a depends on itself".to_string()]);
    }

    #[test]
    fn reports_every_defect() {
        let plan = make_plan(vec![
            step("a").depends_on(["a"]),
            step("a"),
            step("b").depends_on(["x", "y"]),
        ]);
        assert_eq!(validate_plan(&plan).len(), 4);
    }
}
