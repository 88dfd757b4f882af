//! The job record and its state machine.
//!
//! A job starts `running` and moves exactly once into one of the terminal
//! states. All mutation goes through [`Job::merge_component`] and
//! [`Job::finish`], which every store implementation applies under its own
//! per-job lock or row lock.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentKind, ComponentResult};
use crate::error::CoreError;
use crate::input::ComponentInput;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Job type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobType {
    PodcastAd,
}

const PODCAST_AD_COMPONENTS: &[ComponentKind] = &[ComponentKind::Music, ComponentKind::VoiceOver];

impl JobType {
    /// Components that must all be ready before the job can complete.
    pub fn required_components(self) -> &'static [ComponentKind] {
        match self {
            JobType::PodcastAd => PODCAST_AD_COMPONENTS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::PodcastAd => "podcastAd",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "podcastAd" => Ok(JobType::PodcastAd),
            other => Err(CoreError::Validation(format!("Unknown job type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// Only `running -> terminal` is a legal move.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self == JobStatus::Running && next.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(CoreError::Internal(format!("Unknown job status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition inputs and results
// ---------------------------------------------------------------------------

/// A terminal outcome requested for a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { output: String },
    Failed { reason: String },
    Canceled,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
            JobOutcome::Canceled => JobStatus::Canceled,
        }
    }
}

/// Result of merging one component result into a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The result was recorded. `satisfied` is true when every required
    /// component is now ready.
    Applied { satisfied: bool },
    /// The component already had a result; nothing changed.
    Duplicate { satisfied: bool },
    /// The job is terminal; nothing changed.
    Terminal(JobStatus),
    /// The job type does not use this component; nothing changed.
    NotRequired,
}

/// Result of asking a job to enter a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    AlreadyTerminal(JobStatus),
    /// Completion was requested before every component was ready.
    Unsatisfied,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A generation job and its per-component results.
///
/// On the wire, field names stay snake_case like every other API body.
/// Job types and component kinds are identifiers, not field names, and
/// keep their camelCase spelling (`podcastAd`, `voiceOver`) so they match
/// the callback route segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub components: BTreeMap<ComponentKind, ComponentResult>,
    pub input: BTreeMap<ComponentKind, ComponentInput>,
    pub output: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    /// Build a fresh `running` job with no component results.
    pub fn new(
        owner: impl Into<String>,
        job_type: JobType,
        input: BTreeMap<ComponentKind, ComponentInput>,
    ) -> Self {
        Self {
            id: JobId::generate(),
            owner: owner.into(),
            job_type,
            status: JobStatus::Running,
            components: BTreeMap::new(),
            input,
            output: None,
            failure_reason: None,
            created_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn required_components(&self) -> &'static [ComponentKind] {
        self.job_type.required_components()
    }

    pub fn requires(&self, component: ComponentKind) -> bool {
        self.required_components().contains(&component)
    }

    /// Required components without a ready result.
    pub fn missing_components(&self) -> Vec<ComponentKind> {
        self.required_components()
            .iter()
            .copied()
            .filter(|c| !self.components.get(c).is_some_and(ComponentResult::is_ready))
            .collect()
    }

    pub fn is_satisfied(&self) -> bool {
        self.missing_components().is_empty()
    }

    /// Record a component result if none is recorded yet.
    pub fn merge_component(
        &mut self,
        component: ComponentKind,
        result: ComponentResult,
    ) -> MergeOutcome {
        if self.is_terminal() {
            return MergeOutcome::Terminal(self.status);
        }
        if !self.requires(component) {
            return MergeOutcome::NotRequired;
        }
        if self.components.contains_key(&component) {
            return MergeOutcome::Duplicate {
                satisfied: self.is_satisfied(),
            };
        }

        self.components.insert(component, result);
        MergeOutcome::Applied {
            satisfied: self.is_satisfied(),
        }
    }

    /// Move a running job into a terminal state.
    pub fn finish(&mut self, outcome: JobOutcome, at: Timestamp) -> Transition {
        if !self.status.can_transition_to(outcome.status()) {
            return Transition::AlreadyTerminal(self.status);
        }
        if matches!(outcome, JobOutcome::Completed { .. }) && !self.is_satisfied() {
            return Transition::Unsatisfied;
        }

        self.status = outcome.status();
        self.finished_at = Some(at);
        match outcome {
            JobOutcome::Completed { output } => self.output = Some(output),
            JobOutcome::Failed { reason } => self.failure_reason = Some(reason),
            JobOutcome::Canceled => {}
        }
        Transition::Applied
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::input::fixtures::podcast_ad_input;

    fn new_job() -> Job {
        Job::new("user-1", JobType::PodcastAd, podcast_ad_input())
    }

    fn complete(job: &mut Job) -> Transition {
        job.finish(
            JobOutcome::Completed {
                output: "mix".into(),
            },
            chrono::Utc::now(),
        )
    }

    #[test]
    fn new_job_is_running_and_empty() {
        let job = new_job();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.components.is_empty());
        assert!(job.output.is_none());
        assert_eq!(
            job.missing_components(),
            vec![ComponentKind::Music, ComponentKind::VoiceOver]
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_job().id, new_job().id);
    }

    #[test]
    fn merging_every_component_satisfies_in_either_order() {
        for order in [
            [ComponentKind::Music, ComponentKind::VoiceOver],
            [ComponentKind::VoiceOver, ComponentKind::Music],
        ] {
            let mut job = new_job();
            assert_eq!(
                job.merge_component(order[0], ComponentResult::ready("a")),
                MergeOutcome::Applied { satisfied: false }
            );
            assert_eq!(
                job.merge_component(order[1], ComponentResult::ready("b")),
                MergeOutcome::Applied { satisfied: true }
            );
        }
    }

    #[test]
    fn duplicate_merge_leaves_job_unchanged() {
        let mut job = new_job();
        job.merge_component(ComponentKind::Music, ComponentResult::ready("first"));
        let before = job.clone();

        let outcome = job.merge_component(ComponentKind::Music, ComponentResult::ready("second"));

        assert_eq!(outcome, MergeOutcome::Duplicate { satisfied: false });
        assert_eq!(job, before);
    }

    #[test]
    fn merge_on_terminal_job_is_rejected() {
        for outcome in [
            JobOutcome::Failed {
                reason: "timeout".into(),
            },
            JobOutcome::Canceled,
        ] {
            let mut job = new_job();
            job.finish(outcome, chrono::Utc::now());
            let before = job.clone();
            assert_matches!(
                job.merge_component(ComponentKind::Music, ComponentResult::ready("late")),
                MergeOutcome::Terminal(_)
            );
            assert_eq!(job, before);
        }
    }

    #[test]
    fn merge_on_completed_job_is_rejected() {
        let mut job = new_job();
        job.merge_component(ComponentKind::Music, ComponentResult::ready("a"));
        job.merge_component(ComponentKind::VoiceOver, ComponentResult::ready("b"));
        assert_eq!(complete(&mut job), Transition::Applied);
        let before = job.clone();

        assert_eq!(
            job.merge_component(ComponentKind::VoiceOver, ComponentResult::failed("late")),
            MergeOutcome::Terminal(JobStatus::Completed)
        );
        assert_eq!(job, before);
    }

    #[test]
    fn completion_requires_every_component() {
        let mut job = new_job();
        job.merge_component(ComponentKind::Music, ComponentResult::ready("a"));
        assert_eq!(complete(&mut job), Transition::Unsatisfied);
        assert_eq!(job.status, JobStatus::Running);

        job.merge_component(ComponentKind::VoiceOver, ComponentResult::ready("b"));
        assert_eq!(complete(&mut job), Transition::Applied);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output.as_deref(), Some("mix"));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn failed_component_never_satisfies() {
        let mut job = new_job();
        job.merge_component(ComponentKind::Music, ComponentResult::failed("provider down"));
        let outcome = job.merge_component(ComponentKind::VoiceOver, ComponentResult::ready("b"));
        assert_eq!(outcome, MergeOutcome::Applied { satisfied: false });
        assert_eq!(job.missing_components(), vec![ComponentKind::Music]);
    }

    #[test]
    fn terminal_states_never_move() {
        let mut job = new_job();
        job.merge_component(ComponentKind::Music, ComponentResult::ready("a"));
        job.merge_component(ComponentKind::VoiceOver, ComponentResult::ready("b"));
        assert_eq!(complete(&mut job), Transition::Applied);

        let transition = job.finish(
            JobOutcome::Failed {
                reason: "late failure".into(),
            },
            chrono::Utc::now(),
        );

        assert_eq!(transition, Transition::AlreadyTerminal(JobStatus::Completed));
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.failure_reason.is_none());
    }

    #[test]
    fn status_transition_table() {
        use JobStatus::*;
        for next in [Completed, Failed, Canceled] {
            assert!(Running.can_transition_to(next));
            for terminal in [Completed, Failed, Canceled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn job_serializes_with_type_and_camel_case_component_keys() {
        let mut job = new_job();
        job.merge_component(ComponentKind::VoiceOver, ComponentResult::ready("b"));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "podcastAd");
        assert_eq!(json["status"], "running");
        assert_eq!(json["components"]["voiceOver"]["state"], "ready");
        assert_eq!(json["components"]["voiceOver"]["url"], "b");

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn job_field_names_are_snake_case() {
        let mut job = new_job();
        job.finish(
            JobOutcome::Failed {
                reason: "timeout".into(),
            },
            chrono::Utc::now(),
        );
        let json = serde_json::to_value(&job).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "id",
            "owner",
            "type",
            "status",
            "components",
            "input",
            "output",
            "failure_reason",
            "created_at",
            "finished_at",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert!(!keys.contains(&"failureReason"));
        assert_eq!(json["input"]["voiceOver"]["offset_ms"], 1500);
    }
}
