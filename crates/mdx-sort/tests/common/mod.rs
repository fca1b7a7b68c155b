#![allow(dead_code)]

//! Shared fixture for the integration suites: a small FoodMart-style
//! dimensional model and a scriptable evaluator, built on nothing but the
//! crate's public collaborator traits.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mdx_sort::{Evaluator, Expression, Member, OrderKey, Scalar, SortError, SortResult};

pub const UNIT_SALES: &str = "Unit Sales";
pub const PROFIT: &str = "Profit";

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CubeMember {
    hierarchy: &'static str,
    name: Arc<str>,
    depth: u32,
    parent: Option<Arc<CubeMember>>,
    ordinal: i32,
    order_key: Option<i64>,
    calculated: bool,
    high_cardinality: bool,
}

impl CubeMember {
    pub fn root(hierarchy: &'static str, name: &str, ordinal: i32) -> Self {
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

    /// A query-calculated member, which collates after its stored siblings.
    pub fn calculated_child(&self, name: &str) -> Self {
        Self {
            calculated: true,
            ..self.child(name, -1)
        }
    }

    /// A member carrying an explicit order key.
    pub fn keyed_child(&self, name: &str, ordinal: i32, key: i64) -> Self {
        Self {
            order_key: Some(key),
            ..self.child(name, ordinal)
        }
    }

    /// A member that reports a positive depth without having a parent; only
    /// a malformed dimensional model produces these.
    pub fn detached(hierarchy: &'static str, name: &str, depth: u32) -> Self {
        Self {
            depth,
            ..Self::root(hierarchy, name, -1)
        }
    }

    pub fn with_high_cardinality(mut self) -> Self {
        self.high_cardinality = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CubeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent:?}.[{}]", self.name)
        } else {
            write!(f, "[{}].[{}]", self.hierarchy, self.name)
        }
    }
}

impl PartialOrd for CubeMember {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CubeMember {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.hierarchy, &self.name).cmp(&(other.hierarchy, &other.name))
    }
}

impl Member for CubeMember {
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
        self.order_key.map(|key| Scalar::from(key as f64))
    }

    fn is_calculated_in_query(&self) -> bool {
        self.calculated
    }

    fn is_high_cardinality(&self) -> bool {
        self.high_cardinality
    }
}

/// Sort-key expressions over the fixture cube.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CubeExpr {
    /// A named measure of the current member of one hierarchy; NULL for
    /// members without a stored value.
    Measure {
        name: &'static str,
        hierarchy: &'static str,
    },
    /// A named measure summed over the current members of several
    /// hierarchies; NULL when any of them has no current member.
    Combined {
        name: &'static str,
        hierarchies: Vec<&'static str>,
    },
    /// The explicit "order by member key" construct.
    MemberOrderKey(&'static str),
}

impl CubeExpr {
    pub fn measure(name: &'static str, hierarchy: &'static str) -> Self {
        CubeExpr::Measure { name, hierarchy }
    }

    pub fn combined(name: &'static str, hierarchies: &[&'static str]) -> Self {
        CubeExpr::Combined {
            name,
            hierarchies: hierarchies.to_vec(),
        }
    }

    pub fn by_order_key(hierarchy: &'static str) -> Self {
        CubeExpr::MemberOrderKey(hierarchy)
    }
}

impl Expression<CubeMember> for CubeExpr {
    fn depends_on(&self, hierarchy: &&'static str) -> bool {
        match self {
            CubeExpr::Measure { hierarchy: h, .. } => h == hierarchy,
            CubeExpr::Combined { hierarchies, .. } => hierarchies.contains(hierarchy),
            CubeExpr::MemberOrderKey(h) => h == hierarchy,
        }
    }

    fn is_member_order_key(&self) -> bool {
        matches!(self, CubeExpr::MemberOrderKey(_))
    }
}

/// One current member per hierarchy, measure values looked up from a stored
/// map, context restoration through an undo log. Evaluation failures and
/// cancellation can be scripted per call index.
pub struct CubeEvaluator {
    context: HashMap<&'static str, CubeMember>,
    values: HashMap<(&'static str, CubeMember), f64>,
    undo: Vec<(&'static str, Option<CubeMember>)>,
    pub eval_count: usize,
    fail_at: Option<(usize, SortError)>,
    cancel_after: Option<u64>,
}

impl CubeEvaluator {
    pub fn new() -> Self {
        Self {
            context: HashMap::new(),
            values: HashMap::new(),
            undo: Vec::new(),
            eval_count: 0,
            fail_at: None,
            cancel_after: None,
        }
    }

    pub fn with_measure(
        name: &'static str,
        values: impl IntoIterator<Item = (CubeMember, f64)>,
    ) -> Self {
        let mut evaluator = Self::new();
        evaluator.add_measure(name, values);
        evaluator
    }

    pub fn add_measure(
        &mut self,
        name: &'static str,
        values: impl IntoIterator<Item = (CubeMember, f64)>,
    ) {
        self.values
            .extend(values.into_iter().map(|(member, value)| ((name, member), value)));
    }

    pub fn set_value(&mut self, name: &'static str, member: &CubeMember, value: f64) {
        self.values.insert((name, member.clone()), value);
    }

    /// Scripts the `n`-th `evaluate` call (1-based) to fail with `error`.
    pub fn fail_nth_evaluation(&mut self, n: usize, error: SortError) {
        self.fail_at = Some((n, error));
    }

    /// Scripts every cancellation probe after the `n`-th to report
    /// cancellation.
    pub fn cancel_after(&mut self, n: u64) {
        self.cancel_after = Some(n);
    }

    pub fn context_member(&self, hierarchy: &str) -> Option<&CubeMember> {
        self.context.get(hierarchy)
    }

    /// True when no hierarchy has a current member; the facade must leave
    /// the evaluator in this state after every call, failed ones included.
    pub fn context_is_clean(&self) -> bool {
        self.context.is_empty() && self.undo.is_empty()
    }

    fn measure_of(&self, name: &'static str, member: &CubeMember) -> Option<f64> {
        self.values.get(&(name, member.clone())).copied()
    }
}

impl Evaluator for CubeEvaluator {
    type Member = CubeMember;
    type Expr = CubeExpr;
    type Savepoint = usize;

    fn set_member_context(&mut self, member: &CubeMember) {
        let previous = self.context.insert(member.hierarchy, member.clone());
        self.undo.push((member.hierarchy, previous));
    }

    fn set_tuple_context(&mut self, tuple: &[CubeMember]) {
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

    fn evaluate(&mut self, expr: &CubeExpr) -> SortResult<Scalar<CubeMember>> {
        self.eval_count += 1;
        if let Some((at, error)) = &self.fail_at {
            if *at == self.eval_count {
                return Err(error.clone());
            }
        }
        match expr {
            CubeExpr::Measure { name, hierarchy } => Ok(
                match self
                    .context
                    .get(hierarchy)
                    .and_then(|member| self.values.get(&(*name, member.clone())))
                {
                    Some(value) => Scalar::from(*value),
                    None => Scalar::Null,
                },
            ),
            CubeExpr::Combined { name, hierarchies } => {
                let mut sum = 0.0;
                for hierarchy in hierarchies {
                    match self.context.get(hierarchy) {
                        Some(member) => {
                            sum += self.measure_of(name, member).unwrap_or(0.0);
                        }
                        None => return Ok(Scalar::Null),
                    }
                }
                Ok(Scalar::from(sum))
            }
            CubeExpr::MemberOrderKey(hierarchy) => Ok(match self.context.get(hierarchy) {
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

impl Default for CubeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn names(members: &[CubeMember]) -> Vec<&str> {
    members.iter().map(CubeMember::name).collect()
}

pub fn tuple_names(tuples: &[Vec<CubeMember>]) -> Vec<Vec<&str>> {
    tuples.iter().map(|tuple| names(tuple)).collect()
}

/// The product hierarchy most suites sort:
///
/// ```text
/// [Product].[All]
///   [Drink]   (ordinal 0)
///     [Beer]  (0)   [Soda] (1)
///   [Food]    (ordinal 1)
///     [Bread] (0)   [Meat] (1)
/// ```
pub struct ProductCube {
    pub all: CubeMember,
    pub drink: CubeMember,
    pub food: CubeMember,
    pub beer: CubeMember,
    pub soda: CubeMember,
    pub bread: CubeMember,
    pub meat: CubeMember,
}

pub fn product_cube() -> ProductCube {
    let all = CubeMember::root("product", "All", 0);
    let drink = all.child("Drink", 0);
    let food = all.child("Food", 1);
    let beer = drink.child("Beer", 0);
    let soda = drink.child("Soda", 1);
    let bread = food.child("Bread", 0);
    let meat = food.child("Meat", 1);
    ProductCube {
        all,
        drink,
        food,
        beer,
        soda,
        bread,
        meat,
    }
}

/// Unit-sales values for the product cube: parents hold the sum of their
/// children, food outsells drink.
pub fn product_sales(cube: &ProductCube) -> Vec<(CubeMember, f64)> {
    vec![
        (cube.all.clone(), 100.0),
        (cube.drink.clone(), 30.0),
        (cube.food.clone(), 70.0),
        (cube.beer.clone(), 10.0),
        (cube.soda.clone(), 20.0),
        (cube.bread.clone(), 25.0),
        (cube.meat.clone(), 45.0),
    ]
}
