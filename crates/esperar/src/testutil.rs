//! Shared test fixtures: a tiny subject model over an in-memory store, a
//! scriptable step, a recording binding, and a harness wiring them to a
//! mock clock and manual timer backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::binding::{ChangeSink, ScopeBinding};
use crate::builder::Chainable;
use crate::clock::{Clock, MockClock};
use crate::engine::Waiter;
use crate::execution::Execution;
use crate::outcome::{Outcome, Reason};
use crate::step::{Step, StepMeta};
use crate::subject::{Scope, Subject};
use crate::sync::lock;
use crate::timer::{ManualBackend, TimerBackend};
use crate::value::Value;

// ============================================================================
// Subject model
// ============================================================================

/// Scope of the test subject model: a document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DocId(pub(crate) u32);

impl Scope for DocId {}

/// A labeled node living in one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TestNode {
    doc: DocId,
    label: Arc<str>,
}

impl TestNode {
    pub(crate) fn new(doc: DocId, label: &str) -> Self {
        Self {
            doc,
            label: Arc::from(label),
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

impl Subject for TestNode {
    type Scope = DocId;

    fn scope(&self) -> DocId {
        self.doc
    }
}

/// Shorthand for [`TestNode::new`].
pub(crate) fn node(doc: u32, label: &str) -> TestNode {
    TestNode::new(DocId(doc), label)
}

// ============================================================================
// Store and lookup step
// ============================================================================

/// A mutable in-memory tree of nodes, keyed by document.
#[derive(Default)]
pub(crate) struct TestStore {
    docs: Mutex<HashMap<DocId, Vec<TestNode>>>,
}

impl TestStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, doc: u32, label: &str) {
        lock(&self.docs)
            .entry(DocId(doc))
            .or_default()
            .push(node(doc, label));
    }

    pub(crate) fn nodes(&self, doc: DocId) -> Vec<TestNode> {
        lock(&self.docs).get(&doc).cloned().unwrap_or_default()
    }
}

/// Queries the store for one document's nodes, like a tree query step: it
/// always succeeds with a list and asks for the default amount guard.
pub(crate) struct LookupStep {
    store: Arc<TestStore>,
    doc: DocId,
}

impl LookupStep {
    pub(crate) fn new(store: Arc<TestStore>, doc: u32) -> Self {
        Self {
            store,
            doc: DocId(doc),
        }
    }
}

impl Step<TestNode> for LookupStep {
    fn execute(&self, _current: &Value<TestNode>, _meta: &StepMeta) -> Outcome<TestNode> {
        Outcome::Success(Value::from(self.store.nodes(self.doc)))
    }

    fn describe(&self, _timeout: Duration) -> String {
        format!("finds nodes in {:?}", self.doc)
    }

    fn wants_default_amount_check(&self) -> bool {
        true
    }
}

impl fmt::Debug for LookupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupStep")
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Scriptable steps
// ============================================================================

struct Script {
    queue: VecDeque<Outcome<TestNode>>,
    /// `None` passes the current value through.
    fallback: Option<Outcome<TestNode>>,
}

/// A step returning queued outcomes, then a fallback, while counting how
/// often it ran.
pub(crate) struct ScriptedStep {
    name: &'static str,
    script: Mutex<Script>,
    executions: AtomicUsize,
    extra_deadlines: Vec<Duration>,
}

impl ScriptedStep {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            script: Mutex::new(Script {
                queue: VecDeque::new(),
                fallback: None,
            }),
            executions: AtomicUsize::new(0),
            extra_deadlines: Vec::new(),
        }
    }

    pub(crate) fn with_deadline(mut self, deadline: Duration) -> Self {
        self.extra_deadlines.push(deadline);
        self
    }

    /// Queue an outcome for the next execution.
    pub(crate) fn queue(&self, outcome: Outcome<TestNode>) {
        lock(&self.script).queue.push_back(outcome);
    }

    /// Outcome returned once the queue is exhausted.
    pub(crate) fn set_fallback(&self, outcome: Outcome<TestNode>) {
        lock(&self.script).fallback = Some(outcome);
    }

    pub(crate) fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl Step<TestNode> for ScriptedStep {
    fn execute(&self, current: &Value<TestNode>, _meta: &StepMeta) -> Outcome<TestNode> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let mut script = lock(&self.script);
        if let Some(next) = script.queue.pop_front() {
            return next;
        }
        match &script.fallback {
            Some(outcome) => outcome.clone(),
            None => Outcome::Success(current.clone()),
        }
    }

    fn describe(&self, _timeout: Duration) -> String {
        self.name.to_owned()
    }

    fn additional_deadlines(&self) -> Vec<Duration> {
        self.extra_deadlines.clone()
    }
}

impl fmt::Debug for ScriptedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedStep")
            .field("name", &self.name)
            .field("executions", &self.executions())
            .finish_non_exhaustive()
    }
}

/// A pass-through step with fixed injection flags.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlagStep {
    wants: bool,
    applies: bool,
}

impl FlagStep {
    pub(crate) fn new(wants: bool, applies: bool) -> Self {
        Self { wants, applies }
    }
}

impl Step<TestNode> for FlagStep {
    fn execute(&self, current: &Value<TestNode>, _meta: &StepMeta) -> Outcome<TestNode> {
        Outcome::Success(current.clone())
    }

    fn describe(&self, _timeout: Duration) -> String {
        String::new()
    }

    fn wants_default_amount_check(&self) -> bool {
        self.wants
    }

    fn applies_amount_check(&self) -> bool {
        self.applies
    }
}

// ============================================================================
// Recording binding
// ============================================================================

#[derive(Default)]
struct BindingState {
    sinks: HashMap<DocId, ChangeSink<TestNode>>,
    installs: Vec<DocId>,
    removals: Vec<DocId>,
    dead: HashSet<DocId>,
}

/// A binding that records install/remove calls and lets tests deliver
/// change signals through the captured sinks.
pub(crate) struct RecordingBinding {
    state: Mutex<BindingState>,
}

impl RecordingBinding {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(BindingState::default()),
        }
    }

    pub(crate) fn install_count(&self, scope: DocId) -> usize {
        lock(&self.state)
            .installs
            .iter()
            .filter(|installed| **installed == scope)
            .count()
    }

    pub(crate) fn removal_count(&self, scope: DocId) -> usize {
        lock(&self.state)
            .removals
            .iter()
            .filter(|removed| **removed == scope)
            .count()
    }

    pub(crate) fn has_sink(&self, scope: DocId) -> bool {
        lock(&self.state).sinks.contains_key(&scope)
    }

    /// Treat `scope` as unable to deliver changes.
    pub(crate) fn mark_dead(&self, scope: DocId) {
        lock(&self.state).dead.insert(scope);
    }

    /// Deliver an immediate change signal, as an installed listener would.
    pub(crate) fn signal(&self, scope: DocId) {
        let sink = lock(&self.state).sinks.get(&scope).cloned();
        if let Some(sink) = sink {
            sink.notify();
        }
    }

    /// Deliver a deferred change signal.
    pub(crate) fn signal_deferred(&self, scope: DocId) {
        let sink = lock(&self.state).sinks.get(&scope).cloned();
        if let Some(sink) = sink {
            sink.notify_deferred();
        }
    }
}

impl ScopeBinding<TestNode> for RecordingBinding {
    fn install(&self, scope: &DocId, sink: ChangeSink<TestNode>) {
        let mut state = lock(&self.state);
        state.installs.push(*scope);
        state.sinks.insert(*scope, sink);
    }

    fn remove(&self, scope: &DocId) {
        let mut state = lock(&self.state);
        state.removals.push(*scope);
        state.sinks.remove(scope);
    }

    fn is_alive(&self, scope: &DocId) -> bool {
        !lock(&self.state).dead.contains(scope)
    }
}

impl fmt::Debug for RecordingBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingBinding").finish_non_exhaustive()
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A waiter over the mock clock, manual timers, recording binding and
/// in-memory store.
pub(crate) struct TestHarness {
    pub(crate) clock: Arc<MockClock>,
    pub(crate) backend: Arc<ManualBackend>,
    pub(crate) binding: Arc<RecordingBinding>,
    pub(crate) store: Arc<TestStore>,
    pub(crate) waiter: Waiter<TestNode>,
}

impl TestHarness {
    /// A lookup step over this harness's store.
    pub(crate) fn lookup(&self, doc: u32) -> LookupStep {
        LookupStep::new(Arc::clone(&self.store), doc)
    }
}

pub(crate) fn harness() -> TestHarness {
    let clock = Arc::new(MockClock::new());
    let backend = Arc::new(ManualBackend::new());
    let binding = Arc::new(RecordingBinding::new());
    let store = Arc::new(TestStore::new());
    let waiter = Waiter::builder()
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .timer_backend(Arc::clone(&backend) as Arc<dyn TimerBackend>)
        .binding(Arc::clone(&binding) as Arc<dyn ScopeBinding<TestNode>>)
        .build();
    TestHarness {
        clock,
        backend,
        binding,
        store,
        waiter,
    }
}

/// A started execution blocked on a scripted step that stays pending, for
/// driving re-checks by hand.
pub(crate) fn running_probe(fixture: &TestHarness) -> (Arc<ScriptedStep>, Execution<TestNode>) {
    let step = Arc::new(ScriptedStep::new("probe"));
    step.set_fallback(Outcome::pending(Reason::new().text("the probe is not satisfied")));
    let chain = fixture
        .waiter
        .chain_node(Arc::clone(&step) as Arc<dyn Step<TestNode>>, None, None);
    let execution = chain.prepare();
    execution.start().unwrap();
    (step, execution)
}
