// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fake tests and discovery providers for unit tests.

use crate::{
    errors::DiscoveryError,
    helpers::label_matches,
    outcome::{ErrorPayload, OutcomeKind, TestOutcome},
    test_list::{MethodFilter, TestCase, TestDiscovery, TestSuite},
};
use std::{cell::RefCell, rc::Rc};

/// Returns a representative outcome of the given kind.
pub(crate) fn outcome_for_kind(kind: OutcomeKind) -> TestOutcome {
    match kind {
        OutcomeKind::Success => TestOutcome::Success,
        OutcomeKind::Failure => TestOutcome::Failure(ErrorPayload::Empty),
        OutcomeKind::Error => TestOutcome::Error(ErrorPayload::Empty),
        OutcomeKind::Skip => TestOutcome::Skip {
            reason: "reason".to_owned(),
        },
        OutcomeKind::ExpectedFailure => TestOutcome::ExpectedFailure(ErrorPayload::Empty),
        OutcomeKind::UnexpectedSuccess => TestOutcome::UnexpectedSuccess,
    }
}

#[derive(Clone, Debug)]
pub(crate) struct FakeTest {
    id: String,
    description: Option<String>,
    behavior: FakeBehavior,
    run_log: Option<Rc<RefCell<Vec<String>>>>,
}

#[derive(Clone, Debug)]
enum FakeBehavior {
    Outcome(TestOutcome),
    Panic(&'static str),
}

impl FakeTest {
    pub(crate) fn new(id: impl Into<String>, outcome: TestOutcome) -> Self {
        Self {
            id: id.into(),
            description: None,
            behavior: FakeBehavior::Outcome(outcome),
            run_log: None,
        }
    }

    pub(crate) fn pass(id: impl Into<String>) -> Self {
        Self::new(id, TestOutcome::Success)
    }

    pub(crate) fn fail(id: impl Into<String>, message: &str) -> Self {
        Self::new(
            id,
            TestOutcome::Failure(ErrorPayload::structured("AssertionError", message)),
        )
    }

    pub(crate) fn error(id: impl Into<String>, message: &str) -> Self {
        Self::new(id, TestOutcome::Error(ErrorPayload::preformatted(message)))
    }

    pub(crate) fn panicking(id: impl Into<String>, message: &'static str) -> Self {
        Self {
            behavior: FakeBehavior::Panic(message),
            ..Self::pass(id)
        }
    }

    pub(crate) fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn boxed(self) -> Box<dyn TestCase> {
        Box::new(self)
    }
}

impl TestCase for FakeTest {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn run(&self) -> TestOutcome {
        if let Some(run_log) = &self.run_log {
            run_log.borrow_mut().push(self.id.clone());
        }
        match &self.behavior {
            FakeBehavior::Outcome(outcome) => outcome.clone(),
            FakeBehavior::Panic(message) => panic!("{message}"),
        }
    }
}

/// A discovery provider over a fixed list of fake tests.
///
/// Labels select tests the same way manifest discovery does. Every test run is logged, and every
/// set of labels passed to `discover` is recorded.
#[derive(Debug, Default)]
pub(crate) struct FakeDiscovery {
    tests: Vec<FakeTest>,
    pub(crate) run_log: Rc<RefCell<Vec<String>>>,
    pub(crate) discover_calls: RefCell<Vec<Vec<String>>>,
}

impl FakeDiscovery {
    pub(crate) fn new(tests: impl IntoIterator<Item = FakeTest>) -> Self {
        let run_log = Rc::new(RefCell::new(Vec::new()));
        let tests = tests
            .into_iter()
            .map(|test| FakeTest {
                run_log: Some(run_log.clone()),
                ..test
            })
            .collect();
        Self {
            tests,
            run_log,
            discover_calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn ran(&self) -> Vec<String> {
        self.run_log.borrow().clone()
    }
}

impl TestDiscovery for FakeDiscovery {
    fn discover(
        &self,
        labels: &[String],
        methods: Option<&MethodFilter>,
    ) -> Result<TestSuite, DiscoveryError> {
        self.discover_calls.borrow_mut().push(labels.to_vec());

        let mut selected = Vec::new();
        if labels.is_empty() {
            selected.extend(self.tests.iter().cloned());
        }
        for label in labels {
            let before = selected.len();
            selected.extend(
                self.tests
                    .iter()
                    .filter(|test| label_matches(label, &test.id))
                    .cloned(),
            );
            if selected.len() == before {
                return Err(DiscoveryError::UnknownLabel {
                    label: label.clone(),
                });
            }
        }

        Ok(TestSuite::new(
            selected
                .into_iter()
                .filter(|test| methods.is_none_or(|methods| methods.is_match(&test.id)))
                .map(FakeTest::boxed)
                .collect(),
        ))
    }
}
