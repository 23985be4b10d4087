//! Scenario and run listings plus the run auto-select heuristic.
//!
//! The catalog never talks to the network; the view feeds it whatever
//! the REST client returned and asks it which run should be active.

use crate::{
    model::{Run, RunStage, Scenario},
    types::{RunId, ScenarioId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub run_id: RunId,
    /// Picked by the operator rather than the heuristic.
    pub manual: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunCatalog {
    scenarios: Vec<Scenario>,
    runs:      Vec<Run>,
    inspected: Option<ScenarioId>,
    selection: Option<Selection>,
}

impl RunCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn run(&self, id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.id == id)
    }

    pub fn inspected_scenario(&self) -> Option<&str> {
        self.inspected.as_deref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selected_run_id(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.run_id.as_str())
    }

    /// Runs of the inspected scenario, newest first.
    pub fn runs_for_inspected(&self) -> Vec<&Run> {
        let Some(scenario_id) = self.inspected.as_deref() else {
            return Vec::new();
        };
        let mut runs: Vec<&Run> = self
            .runs
            .iter()
            .filter(|r| r.scenario_id == scenario_id)
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }

    pub fn replace_scenarios(&mut self, scenarios: Vec<Scenario>) {
        self.scenarios = scenarios;
        let inspected_gone = self
            .inspected
            .as_deref()
            .is_some_and(|id| self.scenario(id).is_none());
        if inspected_gone {
            self.inspected = None;
            self.selection = None;
        }
        if self.inspected.is_none() {
            self.inspected = self.scenarios.first().map(|s| s.id.clone());
        }
    }

    /// A manual pick made before its run was listed decides the inspected
    /// scenario once the run shows up.
    pub fn replace_runs(&mut self, runs: Vec<Run>) {
        self.runs = runs;
        let owner = self
            .selection
            .as_ref()
            .filter(|s| s.manual)
            .and_then(|s| self.run(&s.run_id))
            .map(|r| r.scenario_id.clone());
        if owner.is_some() {
            self.inspected = owner;
        }
    }

    /// Insert or update one run (after a launch or a detail fetch).
    pub fn upsert_run(&mut self, run: Run) {
        match self.runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run,
            None => self.runs.push(run),
        }
    }

    pub fn add_scenario(&mut self, scenario: Scenario) {
        if self.scenario(&scenario.id).is_none() {
            self.scenarios.push(scenario);
        }
        if self.inspected.is_none() {
            self.inspected = self.scenarios.first().map(|s| s.id.clone());
        }
    }

    /// Change the inspected scenario. A manual run pick belongs to the old
    /// scenario, so it is released.
    pub fn inspect_scenario(&mut self, scenario_id: ScenarioId) -> bool {
        if self.inspected.as_deref() == Some(scenario_id.as_str()) {
            return false;
        }
        self.inspected = Some(scenario_id);
        self.selection = None;
        true
    }

    /// Operator picked a run. Also inspects that run's scenario.
    pub fn select_manually(&mut self, run_id: RunId) {
        if let Some(run) = self.run(&run_id) {
            self.inspected = Some(run.scenario_id.clone());
        }
        self.selection = Some(Selection { run_id, manual: true });
    }

    /// The heuristic's pick for the inspected scenario: a live run if any,
    /// otherwise the most recently created one.
    pub fn auto_pick(&self) -> Option<&Run> {
        let candidates = self.runs_for_inspected();
        candidates
            .iter()
            .find(|r| matches!(r.stage, RunStage::Running | RunStage::WarmingUp))
            .or_else(|| candidates.first())
            .copied()
    }

    /// Re-evaluate the selection after the run list or the inspected
    /// scenario changed. A manual pick stands while its run is still listed
    /// under the inspected scenario, or is not listed yet (just launched).
    pub fn reconcile(&mut self) -> SelectionChange {
        if let Some(current) = &self.selection {
            if current.manual {
                let keep = match self.run(&current.run_id) {
                    Some(run) => Some(run.scenario_id.as_str()) == self.inspected.as_deref(),
                    None => true,
                };
                if keep {
                    return SelectionChange::Unchanged;
                }
            }
        }

        let pick = self.auto_pick().map(|r| r.id.clone());
        let current = self.selection.as_ref().map(|s| s.run_id.clone());
        match (pick, current) {
            (Some(pick), Some(current)) if pick == current => SelectionChange::Unchanged,
            (Some(pick), _) => {
                self.selection = Some(Selection {
                    run_id: pick.clone(),
                    manual: false,
                });
                SelectionChange::Selected(pick)
            }
            (None, Some(_)) => {
                self.selection = None;
                SelectionChange::Cleared
            }
            (None, None) => SelectionChange::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Selected(RunId),
    Cleared,
}
