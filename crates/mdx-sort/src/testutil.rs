//! Unit-test fixtures: a hand-built hierarchy and a scriptable evaluator.
//!
//! `TestMember` models just enough of a dimensional model for the walk and
//! comparator tests: parents are owned `Arc` links, names are unique within
//! a fixture hierarchy, and the natural order is alphabetical by name.
//! `TestEvaluator` keeps one current member per hierarchy, restores context
//! through an undo log, and can be scripted to fail or cancel at a chosen
//! call, which is how the propagation tests drive the error paths.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use ordered_float::OrderedFloat;

use crate::error::{SortError, SortResult};
use crate::eval::{Evaluator, Expression};
use crate::model::{Member, OrderKey};
use crate::value::Scalar;

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct TestMember {
    hierarchy: &'static str,
    name: Arc<str>,
    depth: u32,
    parent: Option<Arc<TestMember>>,
    ordinal: i32,
    order_key: Option<OrderedFloat<f64>>,
    calculated: bool,
    high_cardinality: bool,
}

impl TestMember {
    pub fn new_root(hierarchy: &'static str, name: &str, ordinal: i32) -> Self {
        Self {
            hierarchy,
            name: Arc::from(name),
            depth: 0,
            parent: None,
            ordinal,
            order_key: None,
            calculated: false,
            high_cardinality: false,
        }
    }

    /// A member that claims a positive depth but has no parent; used to
    /// exercise the malformed-hierarchy paths.
    pub fn detached(hierarchy: &'static str, name: &str, depth: u32) -> Self {
        Self {
            depth,
            ..Self::new_root(hierarchy, name, -1)
        }
    }

    pub fn child(&self, name: &str, ordinal: i32) -> Self {
        Self {
            hierarchy: self.hierarchy,
            name: Arc::from(name),
            depth: self.depth + 1,
            parent: Some(Arc::new(self.clone())),
            ordinal,
            order_key: None,
            calculated: false,
            high_cardinality: self.high_cardinality,
        }
    }

    pub fn child_calc(&self, name: &str, ordinal: i32) -> Self {
        Self {
            calculated: true,
            ..self.child(name, ordinal)
        }
    }

    pub fn child_keyed(&self, name: &str, ordinal: i32, key: f64) -> Self {
        Self {
            order_key: Some(OrderedFloat(key)),
            ..self.child(name, ordinal)
        }
    }

    /// Marks the member (and every child derived from it) as belonging to a
    /// high-cardinality hierarchy.
    pub fn high_cardinality(mut self) -> Self {
        self.high_cardinality = true;
        self
    }
}

impl fmt::Debug for TestMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}].[{}]", self.hierarchy, self.name)
    }
}

impl PartialOrd for TestMember {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TestMember {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.hierarchy, &self.name).cmp(&(other.hierarchy, &other.name))
    }
}

impl Member for TestMember {
    type Hierarchy = &'static str;

    fn hierarchy(&self) -> &'static str {
        self.hierarchy
    }

    fn depth(&self) -> u32 {
        self.depth
    }

    fn parent(&self) -> Option<Self> {
        self.parent.as_deref().cloned()
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn order_key(&self) -> Option<Scalar<Self>> {
        self.order_key.map(Scalar::Number)
    }

    fn is_calculated_in_query(&self) -> bool {
        self.calculated
    }

    fn is_high_cardinality(&self) -> bool {
        self.high_cardinality
    }
}

pub(crate) fn member_names(members: &[TestMember]) -> Vec<String> {
    members.iter().map(|m| m.name.to_string()).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TestExpr {
    /// The measure value of the current member of one hierarchy.
    MeasureOf(&'static str),
    /// The sum of the measure values of the current members of several
    /// hierarchies; NULL when any of them has no current member.
    MeasureSum(Vec<&'static str>),
    /// A constant, independent of every hierarchy.
    Constant(f64),
    /// The explicit "order by member key" construct over one hierarchy.
    MemberKey(&'static str),
}

impl Expression<TestMember> for TestExpr {
    fn depends_on(&self, hierarchy: &&'static str) -> bool {
        match self {
            TestExpr::MeasureOf(h) | TestExpr::MemberKey(h) => h == hierarchy,
            TestExpr::MeasureSum(hs) => hs.contains(hierarchy),
            TestExpr::Constant(_) => false,
        }
    }

    fn is_member_order_key(&self) -> bool {
        matches!(self, TestExpr::MemberKey(_))
    }
}

pub(crate) struct TestEvaluator {
    /// Current member per hierarchy.
    context: AHashMap<&'static str, TestMember>,
    /// Stored measure value per member; members without an entry evaluate
    /// to NULL.
    values: AHashMap<TestMember, f64>,
    /// Undo log of (hierarchy, previous member); a savepoint is a log length.
    undo: Vec<(&'static str, Option<TestMember>)>,
    /// Total `evaluate` calls, including failed ones.
    pub eval_count: usize,
    fail_at: Option<(usize, SortError)>,
    cancel_after: Option<u64>,
}

impl TestEvaluator {
    pub fn new() -> Self {
        Self {
            context: AHashMap::new(),
            values: AHashMap::new(),
            undo: Vec::new(),
            eval_count: 0,
            fail_at: None,
            cancel_after: None,
        }
    }

    pub fn with_values(values: impl IntoIterator<Item = (TestMember, f64)>) -> Self {
        let mut evaluator = Self::new();
        evaluator.values = values.into_iter().collect();
        evaluator
    }

    /// Scripts the `n`-th `evaluate` call (1-based) to fail with `error`.
    pub fn fail_evaluation_at(&mut self, n: usize, error: SortError) {
        self.fail_at = Some((n, error));
    }

    /// Scripts every cancellation probe after the `n`-th to report
    /// cancellation.
    pub fn cancel_after(&mut self, n: u64) {
        self.cancel_after = Some(n);
    }

    /// The current member of `hierarchy`, if one is set.
    pub fn context_member(&self, hierarchy: &str) -> Option<&TestMember> {
        self.context.get(hierarchy)
    }

    fn measure_of(&self, hierarchy: &str) -> Scalar<TestMember> {
        match self
            .context
            .get(hierarchy)
            .and_then(|member| self.values.get(member))
        {
            Some(value) => Scalar::from(*value),
            None => Scalar::Null,
        }
    }
}

impl Evaluator for TestEvaluator {
    type Member = TestMember;
    type Expr = TestExpr;
    type Savepoint = usize;

    fn set_member_context(&mut self, member: &TestMember) {
        let previous = self.context.insert(member.hierarchy, member.clone());
        self.undo.push((member.hierarchy, previous));
    }

    fn set_tuple_context(&mut self, tuple: &[TestMember]) {
        for member in tuple {
            self.set_member_context(member);
        }
    }

    fn savepoint(&mut self) -> usize {
        self.undo.len()
    }

    fn restore(&mut self, savepoint: usize) {
        while self.undo.len() > savepoint {
            if let Some((hierarchy, previous)) = self.undo.pop() {
                match previous {
                    Some(member) => self.context.insert(hierarchy, member),
                    None => self.context.remove(hierarchy),
                };
            }
        }
    }

    fn evaluate(&mut self, expr: &TestExpr) -> SortResult<Scalar<TestMember>> {
        self.eval_count += 1;
        if let Some((at, error)) = &self.fail_at {
            if *at == self.eval_count {
                return Err(error.clone());
            }
        }
        match expr {
            TestExpr::Constant(value) => Ok(Scalar::from(*value)),
            TestExpr::MeasureOf(hierarchy) => Ok(self.measure_of(hierarchy)),
            TestExpr::MeasureSum(hierarchies) => {
                let mut sum = 0.0;
                for hierarchy in hierarchies {
                    match self.context.get(hierarchy) {
                        Some(member) => {
                            sum += self.values.get(member).copied().unwrap_or(0.0);
                        }
                        None => return Ok(Scalar::Null),
                    }
                }
                Ok(Scalar::from(sum))
            }
            TestExpr::MemberKey(hierarchy) => Ok(match self.context.get(hierarchy) {
                Some(member) => Scalar::Key(OrderKey(member.clone())),
                None => Scalar::Null,
            }),
        }
    }

    fn check_cancel_or_timeout(&mut self, iteration: u64) -> SortResult<()> {
        match self.cancel_after {
            Some(limit) if iteration > limit => Err(SortError::Cancelled),
            _ => Ok(()),
        }
    }
}
