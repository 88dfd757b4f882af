//! In-process job store.
//!
//! Each job lives behind its own mutex. The outer map lock is held only
//! long enough to look up or insert an entry, so work on one job never
//! blocks another.

use std::collections::HashMap;
use std::sync::Arc;

use adgen_core::component::{ComponentKind, ComponentResult};
use adgen_core::job::{Job, JobOutcome, MergeOutcome, Transition};
use adgen_core::types::JobId;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::store::{JobListQuery, JobStore, StoreError};

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn entry(&self, id: &JobId) -> Result<Arc<Mutex<Job>>, StoreError> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        jobs.insert(job.id.clone(), Arc::new(Mutex::new(job.clone())));
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Job, StoreError> {
        let entry = self.entry(id).await?;
        let job = entry.lock().await;
        Ok(job.clone())
    }

    async fn merge_component(
        &self,
        id: &JobId,
        component: ComponentKind,
        result: ComponentResult,
    ) -> Result<MergeOutcome, StoreError> {
        let entry = self.entry(id).await?;
        let mut job = entry.lock().await;
        Ok(job.merge_component(component, result))
    }

    async fn finish(&self, id: &JobId, outcome: JobOutcome) -> Result<Transition, StoreError> {
        let entry = self.entry(id).await?;
        let mut job = entry.lock().await;
        Ok(job.finish(outcome, chrono::Utc::now()))
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        query: &JobListQuery,
    ) -> Result<Vec<Job>, StoreError> {
        let entries: Vec<_> = self.jobs.read().await.values().cloned().collect();

        let mut owned = Vec::new();
        for entry in entries {
            let job = entry.lock().await;
            if job.owner == owner {
                owned.push(job.clone());
            }
        }
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(owned
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use adgen_core::input::{ComponentInput, MusicPrompt, Prompt, VoicePrompt};
    use adgen_core::job::{JobStatus, JobType};
    use assert_matches::assert_matches;

    use super::*;

    fn podcast_ad(owner: &str) -> Job {
        let input = BTreeMap::from([
            (
                ComponentKind::Music,
                ComponentInput {
                    prompt: Prompt::Music(MusicPrompt {
                        genres: "ambient".into(),
                        moods: String::new(),
                        themes: String::new(),
                    }),
                    duration_secs: 20,
                    volume: 0.3,
                    offset_ms: 0,
                },
            ),
            (
                ComponentKind::VoiceOver,
                ComponentInput {
                    prompt: Prompt::Voice(VoicePrompt {
                        voice: "echo".into(),
                        text: "Try it today.".into(),
                    }),
                    duration_secs: 15,
                    volume: 1.0,
                    offset_ms: 500,
                },
            ),
        ]);
        Job::new(owner, JobType::PodcastAd, input)
    }

    #[tokio::test]
    async fn create_then_get_returns_running_job() {
        let store = InMemoryJobStore::new();
        let job = podcast_ad("user-1");
        store.create(&job).await.unwrap();

        let fetched = store.get(&job.id).await.unwrap();
        assert_eq!(fetched.status, JobStatus::Running);
        assert!(fetched.components.is_empty());
        assert_eq!(fetched, job);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = InMemoryJobStore::new();
        let job = podcast_ad("user-1");
        store.create(&job).await.unwrap();

        assert_matches!(store.create(&job).await, Err(StoreError::AlreadyExists(id)) if id == job.id);
    }

    #[tokio::test]
    async fn get_unknown_job_is_not_found() {
        let store = InMemoryJobStore::new();
        assert_matches!(
            store.get(&JobId::from("ghost")).await,
            Err(StoreError::NotFound(_))
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_merges_of_different_components_keep_both() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = podcast_ad("user-1");
        store.create(&job).await.unwrap();

        let merges = [ComponentKind::Music, ComponentKind::VoiceOver].map(|component| {
            let store = Arc::clone(&store);
            let id = job.id.clone();
            tokio::spawn(async move {
                store
                    .merge_component(&id, component, ComponentResult::ready(component.as_str()))
                    .await
            })
        });
        let outcomes: Vec<MergeOutcome> = futures::future::join_all(merges)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        // Exactly one of the two merges observes the job becoming satisfied.
        let satisfied = outcomes
            .iter()
            .filter(|o| matches!(o, MergeOutcome::Applied { satisfied: true }))
            .count();
        assert_eq!(satisfied, 1);

        let fetched = store.get(&job.id).await.unwrap();
        assert_eq!(fetched.components.len(), 2);
        assert!(fetched.is_satisfied());
    }

    #[tokio::test]
    async fn concurrent_duplicates_apply_once() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = podcast_ad("user-1");
        store.create(&job).await.unwrap();

        let merges = (0..8).map(|i| {
            let store = Arc::clone(&store);
            let id = job.id.clone();
            tokio::spawn(async move {
                store
                    .merge_component(
                        &id,
                        ComponentKind::Music,
                        ComponentResult::ready(format!("take-{i}")),
                    )
                    .await
            })
        });
        let applied = futures::future::join_all(merges)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(MergeOutcome::Applied { .. }))))
            .count();

        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn finish_is_compare_and_set() {
        let store = InMemoryJobStore::new();
        let job = podcast_ad("user-1");
        store.create(&job).await.unwrap();

        assert_eq!(
            store.finish(&job.id, JobOutcome::Canceled).await.unwrap(),
            Transition::Applied
        );
        assert_eq!(
            store
                .finish(
                    &job.id,
                    JobOutcome::Failed {
                        reason: "timeout".into()
                    }
                )
                .await
                .unwrap(),
            Transition::AlreadyTerminal(JobStatus::Canceled)
        );
        assert_eq!(store.get(&job.id).await.unwrap().status, JobStatus::Canceled);
    }

    #[tokio::test]
    async fn list_by_owner_scopes_and_pages() {
        let store = InMemoryJobStore::new();
        for _ in 0..3 {
            store.create(&podcast_ad("alice")).await.unwrap();
        }
        store.create(&podcast_ad("bob")).await.unwrap();

        let all = store
            .list_by_owner("alice", &JobListQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|j| j.owner == "alice"));
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let page = store
            .list_by_owner(
                "alice",
                &JobListQuery {
                    limit: Some(2),
                    offset: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }
}
