use std::{collections::BTreeSet, fmt::Display};

use serde::{Deserialize, Serialize};

/// The activities the card SDK can be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CardAction {
    Login,
    Checkout,
    Settings,
}

impl Display for CardAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardAction::Login => write!(f, "Login"),
            CardAction::Checkout => write!(f, "Checkout"),
            CardAction::Settings => write!(f, "Settings"),
        }
    }
}

/// Immutable mapping of an action to its prerequisites, in the order they must be satisfied.
#[derive(Debug)]
pub struct ActionDependencyGraph {
    edges: &'static [(CardAction, &'static [CardAction])],
}

pub static ACTION_DEPENDENCIES: ActionDependencyGraph = ActionDependencyGraph {
    edges: &[
        (CardAction::Login, &[]),
        (CardAction::Checkout, &[CardAction::Login]),
        (CardAction::Settings, &[CardAction::Login]),
    ],
};

impl ActionDependencyGraph {
    pub const fn new(edges: &'static [(CardAction, &'static [CardAction])]) -> Self {
        Self { edges }
    }

    pub fn prerequisites(&self, action: CardAction) -> &'static [CardAction] {
        self.edges.iter().find(|(a, _)| *a == action).map(|(_, deps)| *deps).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Launch this action next.
    Dispatch(CardAction),
    /// The target has already been completed. The SDK must not be invoked again.
    NothingToDo,
}

/// Picks the next action to run for a target, given the actions already completed in the session.
#[derive(Debug, Clone, Copy)]
pub struct ActionDependencyResolver {
    graph: &'static ActionDependencyGraph,
}

impl Default for ActionDependencyResolver {
    fn default() -> Self {
        Self::new(&ACTION_DEPENDENCIES)
    }
}

impl ActionDependencyResolver {
    pub fn new(graph: &'static ActionDependencyGraph) -> Self {
        Self { graph }
    }

    /// Returns the first unmet prerequisite of `target` (searched depth first, in declared order), or `target`
    /// itself when all prerequisites are done.
    pub fn next_action(&self, target: CardAction, done: &BTreeSet<CardAction>) -> NextAction {
        if done.contains(&target) {
            return NextAction::NothingToDo;
        }
        NextAction::Dispatch(self.first_unmet(target, done))
    }

    fn first_unmet(&self, action: CardAction, done: &BTreeSet<CardAction>) -> CardAction {
        self.graph
            .prerequisites(action)
            .iter()
            .find(|prereq| !done.contains(prereq))
            .map(|prereq| self.first_unmet(*prereq, done))
            .unwrap_or(action)
    }
}
