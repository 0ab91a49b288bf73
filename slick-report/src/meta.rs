//! Per-test metadata descriptors supplied by framework adapters.
//!
//! The core never inspects framework-specific annotations or attributes.
//! The adapter layer that bridges a test framework to this crate builds a
//! [`TestDescription`] for every test it schedules; tests without a
//! [`TestMetadata`] attached are simply not reported.

use crate::model::Step;

/// One declared step of a test, paired with its expected outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMetadata {
    pub step: String,
    pub expectation: String,
}

impl StepMetadata {
    pub fn new(step: impl Into<String>, expectation: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            expectation: expectation.into(),
        }
    }
}

impl From<&StepMetadata> for Step {
    fn from(meta: &StepMetadata) -> Self {
        Step {
            name: meta.step.clone(),
            expected_result: Some(meta.expectation.clone()),
        }
    }
}

/// Reporting metadata for one test. Only the title is required.
#[derive(Debug, Clone, Default)]
pub struct TestMetadata {
    /// Human-readable test case title.
    pub title: String,
    /// Component name to reconcile the test case under.
    pub component: Option<String>,
    /// Feature name within the component.
    pub feature: Option<String>,
    /// Explicit correlation key. If unset, one is derived from the test's
    /// identity.
    pub automation_id: Option<String>,
    /// Secondary automation key.
    pub automation_key: Option<String>,
    /// Declared steps, possibly empty.
    pub steps: Vec<StepMetadata>,
}

impl TestMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn automation_id(mut self, automation_id: impl Into<String>) -> Self {
        self.automation_id = Some(automation_id.into());
        self
    }

    pub fn automation_key(mut self, automation_key: impl Into<String>) -> Self {
        self.automation_key = Some(automation_key.into());
        self
    }

    pub fn step(mut self, step: impl Into<String>, expectation: impl Into<String>) -> Self {
        self.steps.push(StepMetadata::new(step, expectation));
        self
    }
}

/// Identity of one executing test, as reported by the framework adapter.
#[derive(Debug, Clone, Default)]
pub struct TestDescription {
    /// Fully qualified name of the containing suite or type.
    pub class_name: String,
    /// Name of the test method or function.
    pub method_name: String,
    /// Reporting metadata, absent for tests that opted out.
    pub metadata: Option<TestMetadata>,
}

impl TestDescription {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TestMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Display name used in operator-facing log records.
    pub fn display_name(&self) -> String {
        format!("{}::{}", self.class_name, self.method_name)
    }
}

/// Treat empty metadata strings as absent, so `component: ""` behaves like
/// no component at all.
pub(crate) fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}
