//! Tree, Gantt and Kanban projections of one project's milestones and tasks.
//!
//! All three are pure functions of their inputs: the same input always
//! produces an equal view, and none of them mutate shared state.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use super::aggregator::{cost_summary, CostSummary, MilestoneRollup, TasksByMilestone};
use crate::domain::{Milestone, MilestoneId, Task, TaskStatus};

/// Which milestones are expanded in the tree view. Milestones without an
/// explicit choice follow the default: only the first one is open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandState {
    overrides: HashMap<MilestoneId, bool>,
}

impl ExpandState {
    pub fn is_expanded(&self, id: &MilestoneId, position: usize) -> bool {
        self.overrides.get(id).copied().unwrap_or(position == 0)
    }

    pub fn set(&mut self, id: &MilestoneId, expanded: bool) {
        self.overrides.insert(id.clone(), expanded);
    }

    pub fn toggle(&mut self, id: &MilestoneId, position: usize) -> bool {
        let expanded = !self.is_expanded(id, position);
        self.set(id, expanded);
        expanded
    }

    pub fn set_all(&mut self, milestones: &[Milestone], expanded: bool) {
        for milestone in milestones {
            self.set(&milestone.id, expanded);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub milestone: Milestone,
    pub rollup: MilestoneRollup,
    pub expanded: bool,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeView {
    pub nodes: Vec<TreeNode>,
    pub unassigned: Vec<Task>,
    /// Tasks referencing a milestone that was not loaded.
    pub orphaned: Vec<Task>,
}

pub fn to_tree_view(
    milestones: &[Milestone],
    tasks: &TasksByMilestone,
    expand: &ExpandState,
) -> TreeView {
    let nodes = milestones
        .iter()
        .enumerate()
        .map(|(position, milestone)| {
            let children = tasks.get(Some(&milestone.id));
            TreeNode {
                milestone: milestone.clone(),
                rollup: MilestoneRollup::from_milestone(milestone, children),
                expanded: expand.is_expanded(&milestone.id, position),
                tasks: children.to_vec(),
            }
        })
        .collect();

    TreeView {
        nodes,
        unassigned: tasks.unassigned().to_vec(),
        orphaned: tasks.orphaned(milestones),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GanttRowKind {
    Milestone,
    Task,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttRow {
    pub id: String,
    pub kind: GanttRowKind,
    pub label: String,
    pub status: TaskStatus,
    /// Bar width in percent of the track, 0 to 100.
    pub progress_width: f64,
    pub color: &'static str,
    pub accent: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub stale: bool,
    pub children: Vec<GanttRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttView {
    pub rows: Vec<GanttRow>,
    pub cost_summary: CostSummary,
}

fn bar_width(percentage: f64) -> f64 {
    if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    }
}

fn task_row(task: &Task) -> GanttRow {
    GanttRow {
        id: task.id.0.clone(),
        kind: GanttRowKind::Task,
        label: task.title.clone(),
        status: task.status.clone(),
        progress_width: bar_width(task.progress_percentage),
        color: task.status.color(),
        accent: None,
        due_date: None,
        estimated_cost: task.estimated_cost,
        actual_cost: task.actual_cost,
        stale: false,
        children: Vec::new(),
    }
}

pub fn to_gantt_view(milestones: &[Milestone], tasks: &TasksByMilestone) -> GanttView {
    let rows = milestones
        .iter()
        .map(|milestone| {
            let children = tasks.get(Some(&milestone.id));
            let rollup = MilestoneRollup::from_milestone(milestone, children);
            GanttRow {
                id: milestone.id.0.clone(),
                kind: GanttRowKind::Milestone,
                label: milestone.name.clone(),
                status: milestone.status.clone(),
                progress_width: bar_width(rollup.completion_percentage),
                color: milestone.status.color(),
                accent: milestone.color.clone(),
                due_date: milestone.due_date,
                estimated_cost: rollup.estimated_cost,
                actual_cost: rollup.actual_cost,
                stale: rollup.stale,
                children: children.iter().map(task_row).collect(),
            }
        })
        .collect();

    GanttView {
        rows,
        cost_summary: cost_summary(milestones),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KanbanColumn {
    pub status: TaskStatus,
    pub title: &'static str,
    pub tasks: Vec<Task>,
}

/// Exactly three columns. Tasks whose status is not pending, in progress or
/// completed appear in none of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KanbanView {
    pub columns: [KanbanColumn; 3],
}

impl KanbanView {
    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }
}

pub fn to_kanban_view(tasks: &[Task]) -> KanbanView {
    let column = |status: TaskStatus, title: &'static str| KanbanColumn {
        tasks: tasks.iter().filter(|t| t.status == status).cloned().collect(),
        status,
        title,
    };

    KanbanView {
        columns: [
            column(TaskStatus::Pending, "To Do"),
            column(TaskStatus::InProgress, "In Progress"),
            column(TaskStatus::Completed, "Done"),
        ],
    }
}
