//! Step Registry
//!
//! Ordered set of steps for one run. Registration is keyed by step name:
//! registering a name that is already present is a no-op, so the same logical
//! step can never run twice in one sequence.

use crate::step::Step;
use std::sync::Arc;

/// Ordered, name-deduplicated step set
#[derive(Default)]
pub struct StepRegistry {
    steps: Vec<Arc<Step>>,
}

impl StepRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step unless one with the same name is already registered
    pub fn register(&mut self, step: Step) {
        if self.steps.iter().any(|s| s.name() == step.name()) {
            tracing::debug!(step = step.name(), "step already registered, skipping");
            return;
        }
        self.steps.push(Arc::new(step));
    }

    /// Steps in registration order
    pub fn steps(&self) -> &[Arc<Step>] {
        &self.steps
    }

    /// Number of registered steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProvisionContext;
    use crate::step::{StepBody, StepError};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl StepBody for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn create(&self, _cx: &mut ProvisionContext) -> Result<(), StepError> {
            Ok(())
        }

        async fn delete(&self, _cx: &mut ProvisionContext) -> Result<(), StepError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_deduplicates_by_name() {
        let mut registry = StepRegistry::new();
        registry.register(Step::new(Box::new(Named("a"))));
        registry.register(Step::new(Box::new(Named("b"))));
        registry.register(Step::new(Box::new(Named("a"))));

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
