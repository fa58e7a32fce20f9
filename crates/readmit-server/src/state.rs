//! Shared handler state

use chrono::{DateTime, Utc};
use readmit_etl::Pipeline;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::care_plan::{CarePlan, Language};
use crate::patient::PatientSummary;
use crate::services::Services;

/// State cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// The same pipeline the batch CLI runs, bound to the warehouse
    pub pipeline: Arc<Pipeline>,
    pub services: Services,
    pub care_plans: CarePlanStore,
}

impl AppState {
    pub fn new(db: PgPool, pipeline: Arc<Pipeline>, services: Services) -> Self {
        Self {
            db,
            pipeline,
            services,
            care_plans: CarePlanStore::default(),
        }
    }
}

/// A generated plan as kept for one caller and one patient
#[derive(Debug, Clone, Serialize)]
pub struct StoredCarePlan {
    pub patient: PatientSummary,
    pub language: Language,
    pub plan: CarePlan,
    pub generated_at: DateTime<Utc>,
    /// Set when the narrative service failed for this plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<String>,
}

/// Care plans keyed by (user id, subject id)
///
/// Plans live for the lifetime of the process; each caller only sees their
/// own.
#[derive(Clone, Default)]
pub struct CarePlanStore {
    inner: Arc<RwLock<HashMap<(String, i64), StoredCarePlan>>>,
}

impl CarePlanStore {
    pub async fn get(&self, user: &str, subject_id: i64) -> Option<StoredCarePlan> {
        self.inner
            .read()
            .await
            .get(&(user.to_string(), subject_id))
            .cloned()
    }

    /// Store a plan, returning the one it replaced
    pub async fn put(
        &self,
        user: &str,
        subject_id: i64,
        plan: StoredCarePlan,
    ) -> Option<StoredCarePlan> {
        self.inner
            .write()
            .await
            .insert((user.to_string(), subject_id), plan)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::patient::RiskCategory;

    fn stored(tip: &str) -> StoredCarePlan {
        StoredCarePlan {
            patient: PatientSummary {
                subject_id: Some(5),
                age: Some(70),
                diagnosis: None,
                risk_category: RiskCategory::Low,
            },
            language: Language::French,
            plan: CarePlan {
                tips: vec![tip.to_string()],
                ..CarePlan::default()
            },
            generated_at: Utc::now(),
            generation_error: None,
        }
    }

    #[tokio::test]
    async fn test_plans_are_scoped_per_user() {
        let store = CarePlanStore::default();
        assert!(store.is_empty().await);

        store.put("alice", 5, stored("walk")).await;
        store.put("bob", 5, stored("rest")).await;

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("alice", 5).await.unwrap().plan.tips, vec!["walk"]);
        assert_eq!(store.get("bob", 5).await.unwrap().plan.tips, vec!["rest"]);
        assert!(store.get("alice", 6).await.is_none());
    }

    #[tokio::test]
    async fn test_put_returns_previous_plan() {
        let store = CarePlanStore::default();
        assert!(store.put("alice", 5, stored("walk")).await.is_none());

        let previous = store.put("alice", 5, stored("rest")).await.unwrap();
        assert_eq!(previous.plan.tips, vec!["walk"]);
    }
}
