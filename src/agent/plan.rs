//! Task plan tracking.
//!
//! The plan is a value: every transition consumes the old plan and returns a
//! new one, so a step either applies completely or not at all.

use serde::{Deserialize, Serialize};

use crate::model::{Phase, ResponseEnvelope};

/// Sub-task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// One step of a model-declared plan. Ids start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: u32,
    pub name: String,
    pub status: TaskStatus,
}

/// Ordered sub-tasks plus the phase the model reports.
///
/// At most one sub-task is `InProgress`, and `current_task_id` always names
/// an existing sub-task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPlan {
    tasks: Vec<SubTask>,
    current_task_id: Option<u32>,
    phase: Phase,
}

impl TaskPlan {
    /// Fresh plan whose first task is in progress.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tasks: Vec<SubTask> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| SubTask {
                id: i as u32 + 1,
                name: name.into(),
                status: TaskStatus::Pending,
            })
            .collect();
        Self {
            tasks,
            current_task_id: None,
            phase: Phase::Plan,
        }
        .start(1)
    }

    pub fn tasks(&self) -> &[SubTask] {
        &self.tasks
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_task_id(&self) -> Option<u32> {
        self.current_task_id
    }

    pub fn current_task(&self) -> Option<&SubTask> {
        self.current_task_id.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: u32) -> Option<&SubTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn completed(&self) -> impl Iterator<Item = &SubTask> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Completed)
    }

    /// Sub-tasks not yet completed, in progress ones included.
    pub fn outstanding(&self) -> impl Iterator<Item = &SubTask> {
        self.tasks.iter().filter(|t| t.status != TaskStatus::Completed)
    }

    /// `(completed, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (self.completed().count(), self.tasks.len())
    }

    /// Apply whatever plan metadata a model reply carries.
    ///
    /// A `plan` phase with tasks replaces the plan. Unknown ids are ignored.
    pub fn apply(self, envelope: &ResponseEnvelope) -> Self {
        let mut plan = if envelope.phase == Some(Phase::Plan) && !envelope.tasks.is_empty() {
            Self::from_names(envelope.tasks.iter().cloned())
        } else {
            self
        };

        if let Some(phase) = envelope.phase {
            plan.phase = phase;
        }
        if let Some(id) = envelope.task_completed {
            plan = plan.complete(id);
        }
        if let Some(id) = envelope.current_task_id {
            plan = plan.start(id);
        }
        plan
    }

    /// Mark `id` completed.
    pub fn complete(mut self, id: u32) -> Self {
        for task in self.tasks.iter_mut().filter(|t| t.id == id) {
            task.status = TaskStatus::Completed;
        }
        if self.current_task_id == Some(id) {
            self.current_task_id = None;
        }
        self
    }

    /// Mark `id` in progress, returning any other in-progress task to pending.
    pub fn start(mut self, id: u32) -> Self {
        if self.get(id).is_none() {
            return self;
        }
        for task in &mut self.tasks {
            if task.id == id {
                task.status = TaskStatus::InProgress;
            } else if task.status == TaskStatus::InProgress {
                task.status = TaskStatus::Pending;
            }
        }
        self.current_task_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(raw: &str) -> ResponseEnvelope {
        ResponseEnvelope::parse(raw).unwrap()
    }

    fn in_progress(plan: &TaskPlan) -> Vec<u32> {
        plan.tasks()
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .map(|t| t.id)
            .collect()
    }

    #[test]
    fn test_plan_initializes_first_task() {
        let plan = TaskPlan::default().apply(&envelope(r#"{"phase": "plan", "tasks": ["a", "b", "c"]}"#));
        assert_eq!(plan.tasks().len(), 3);
        assert_eq!(plan.current_task_id(), Some(1));
        assert_eq!(in_progress(&plan), vec![1]);
        assert_eq!(plan.phase(), Phase::Plan);
        assert_eq!(plan.progress(), (0, 3));
    }

    #[test]
    fn test_complete_and_advance() {
        let plan = TaskPlan::from_names(["a", "b", "c"])
            .apply(&envelope(r#"{"phase": "execute", "task_completed": 1, "current_task_id": 2, "action": "Home"}"#));
        assert_eq!(plan.get(1).unwrap().status, TaskStatus::Completed);
        assert_eq!(in_progress(&plan), vec![2]);
        assert_eq!(plan.current_task().unwrap().name, "b");
        assert_eq!(plan.phase(), Phase::Execute);
        assert_eq!(plan.progress(), (1, 3));
    }

    #[test]
    fn test_single_in_progress() {
        let plan = TaskPlan::from_names(["a", "b", "c"]).start(3);
        assert_eq!(in_progress(&plan), vec![3]);
        assert_eq!(plan.get(1).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_completing_current_clears_pointer() {
        let plan = TaskPlan::from_names(["a"]).complete(1);
        assert_eq!(plan.current_task_id(), None);
        assert_eq!(plan.outstanding().count(), 0);
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let before = TaskPlan::from_names(["a", "b"]);
        let after = before
            .clone()
            .apply(&envelope(r#"{"task_completed": 9, "current_task_id": 7}"#));
        assert_eq!(before, after);
    }

    #[test]
    fn test_replan_replaces_tasks() {
        let plan = TaskPlan::from_names(["old"])
            .complete(1)
            .apply(&envelope(r#"{"phase": "plan", "tasks": ["x", "y"]}"#));
        assert_eq!(plan.tasks()[0].name, "x");
        assert_eq!(plan.progress(), (0, 2));
    }
}
