use std::{cmp::Ordering, collections::HashSet};

use chrono::{Days, NaiveDate};
use itertools::{Either, Itertools};
use log::debug;
use rust_decimal::Decimal;

use super::{
    error::{Error, Result},
    transaction::Transaction,
};

/// Label of the synthetic node all income flows through.
pub const HUB_LABEL: &str = "Total Income";

/// Inclusive range of calendar dates a transaction must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidWindow { start, end });
        }

        Ok(Self { start, end })
    }

    /// The `days` long window ending on `end`.
    pub fn trailing(end: NaiveDate, days: u64) -> Self {
        let start = end
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN);

        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    pub window: Option<DateWindow>,
    /// Top-level categories kept out of the diagram and summed separately.
    pub excluded: HashSet<String>,
    pub starting_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Income,
    Expense,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub value: Decimal,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowGraph {
    nodes: Vec<String>,
    edges: Vec<Edge>,
}

impl FlowGraph {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Index of the [`HUB_LABEL`] node, always the last one.
    pub fn hub(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn edges_of(&self, direction: Direction) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |edge| edge.direction == direction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub name: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub total_excluded: Decimal,
    /// Income plus the configured starting balance, if any.
    pub grand_total: Option<Decimal>,
    pub transactions_used: usize,
    pub transactions_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub graph: FlowGraph,
    pub categories: Vec<CategoryTotal>,
    pub summary: FlowSummary,
}

impl Flow {
    /// Builds the income/expense flow of `txns`.
    ///
    /// Transactions without a date or outside the window are skipped. Those
    /// in an excluded category only count towards
    /// [`FlowSummary::total_excluded`], even when the category nets to a
    /// positive amount. Every other category becomes a node in first-seen
    /// order; a positive total flows into the hub, a negative one out of it,
    /// and a total of exactly zero leaves the node without any edge.
    ///
    /// Fails only when a sum leaves the range of [`Decimal`].
    pub fn from_transactions(txns: &[Transaction], options: &FlowOptions) -> Result<Self> {
        let (in_window, skipped): (Vec<_>, Vec<_>) = txns.iter().partition(|tx| {
            tx.date.is_some_and(|date| {
                options
                    .window
                    .map_or(true, |window| window.contains(date))
            })
        });

        let (excluded, included): (Vec<Decimal>, Vec<(&str, Decimal)>) =
            in_window.iter().partition_map(|tx| {
                let name = tx.top_level_category();
                if options.excluded.contains(name) {
                    Either::Left(tx.amount.abs())
                } else {
                    Either::Right((name, tx.amount))
                }
            });

        let categories = group_in_order(&included)?;
        let graph = build_graph(&categories);

        let total_income = checked_sum(graph.edges_of(Direction::Income).map(|e| e.value))?;
        let total_expenses = checked_sum(graph.edges_of(Direction::Expense).map(|e| e.value))?;
        let total_excluded = checked_sum(excluded)?;
        let grand_total = options
            .starting_balance
            .map(|balance| total_income.checked_add(balance).ok_or(Error::Overflow))
            .transpose()?;

        debug!(
            "{} categories, {} edges, {} transactions skipped",
            categories.len(),
            graph.edges.len(),
            skipped.len()
        );

        Ok(Flow {
            summary: FlowSummary {
                total_income,
                total_expenses,
                total_excluded,
                grand_total,
                transactions_used: in_window.len(),
                transactions_skipped: skipped.len(),
            },
            graph,
            categories,
        })
    }
}

fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or(Error::Overflow)
}

fn group_in_order(amounts: &[(&str, Decimal)]) -> Result<Vec<CategoryTotal>> {
    // `None` marks a category whose running total overflowed.
    let sums = amounts
        .iter()
        .copied()
        .into_grouping_map()
        .fold(Some(Decimal::ZERO), |total, _, amount| {
            total.and_then(|total| total.checked_add(amount))
        });

    amounts
        .iter()
        .map(|(name, _)| *name)
        .unique()
        .map(|name| {
            Ok(CategoryTotal {
                name: name.to_owned(),
                total: sums[name].ok_or(Error::Overflow)?,
            })
        })
        .collect()
}

fn build_graph(categories: &[CategoryTotal]) -> FlowGraph {
    let hub = categories.len();

    let edges = categories
        .iter()
        .enumerate()
        .filter_map(|(index, category)| match category.total.cmp(&Decimal::ZERO) {
            Ordering::Greater => Some(Edge {
                source: index,
                target: hub,
                value: category.total,
                direction: Direction::Income,
            }),
            Ordering::Less => Some(Edge {
                source: hub,
                target: index,
                value: category.total.abs(),
                direction: Direction::Expense,
            }),
            Ordering::Equal => None,
        })
        .collect();

    let nodes = categories
        .iter()
        .map(|category| category.name.clone())
        .chain([HUB_LABEL.to_owned()])
        .collect();

    FlowGraph { nodes, edges }
}
