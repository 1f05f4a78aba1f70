use serde::Serialize;

use crate::clients::{SubscriptionData, SubscriptionLister};
use crate::error::UpstreamError;

/// Placeholder for a state or tenant the provider did not report
pub const UNKNOWN: &str = "Unknown";

/// One subscription as shown on the page and returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub subscription_id: String,
    pub display_name: String,
    pub state: String,
    pub tenant_id: String,
}

impl From<SubscriptionData> for SubscriptionRecord {
    // Only state and tenant fall back to "Unknown"; id and name stay empty
    fn from(data: SubscriptionData) -> Self {
        Self {
            subscription_id: data.subscription_id.unwrap_or_default(),
            display_name: data.display_name.unwrap_or_default(),
            state: data
                .state
                .map(|state| state.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            tenant_id: data.tenant_id.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// Lists the subscriptions visible to the shared credential.
///
/// Built per request over a borrowed client. Holds no state between calls;
/// every call enumerates from the first page.
pub struct SubscriptionService<'a> {
    lister: &'a dyn SubscriptionLister,
}

impl<'a> SubscriptionService<'a> {
    pub fn new(lister: &'a dyn SubscriptionLister) -> Self {
        Self { lister }
    }

    /// Drain every page into records, in provider order.
    ///
    /// The first failing page aborts the whole call; nothing collected so
    /// far is returned.
    pub async fn get_subscriptions(&self) -> Result<Vec<SubscriptionRecord>, UpstreamError> {
        let mut pages = self.lister.list_subscriptions();
        let mut records = Vec::new();

        loop {
            match pages.next_page().await {
                Ok(Some(page)) => records.extend(page.into_iter().map(SubscriptionRecord::from)),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        discarded = records.len(),
                        "Subscription enumeration failed"
                    );
                    return Err(e);
                }
            }
        }

        tracing::debug!(count = records.len(), "Subscriptions enumerated");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{Pager, SubscriptionState};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Step {
        Page(Vec<SubscriptionData>),
        Fail,
    }

    /// Lister replaying the same scripted pages on every enumeration
    struct ScriptedLister {
        steps: Vec<Step>,
        opened: AtomicUsize,
    }

    impl ScriptedLister {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps,
                opened: AtomicUsize::new(0),
            }
        }
    }

    struct ScriptedPager {
        steps: std::vec::IntoIter<Step>,
    }

    #[async_trait]
    impl Pager for ScriptedPager {
        type Item = SubscriptionData;

        async fn next_page(&mut self) -> Result<Option<Vec<SubscriptionData>>, UpstreamError> {
            match self.steps.next() {
                Some(Step::Page(items)) => Ok(Some(items)),
                Some(Step::Fail) => {
                    self.steps = Vec::new().into_iter();
                    Err(UpstreamError::Status {
                        url: "https://management.azure.com/subscriptions".to_string(),
                        status: 503,
                        code: "ServiceUnavailable".to_string(),
                        message: "try later".to_string(),
                    })
                }
                None => Ok(None),
            }
        }
    }

    impl SubscriptionLister for ScriptedLister {
        fn list_subscriptions(&self) -> Box<dyn Pager<Item = SubscriptionData> + '_> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Box::new(ScriptedPager {
                steps: self.steps.clone().into_iter(),
            })
        }
    }

    fn sub(
        id: &str,
        name: &str,
        state: Option<SubscriptionState>,
        tenant: Option<&str>,
    ) -> SubscriptionData {
        SubscriptionData {
            id: Some(format!("/subscriptions/{}", id)),
            subscription_id: Some(id.to_string()),
            display_name: Some(name.to_string()),
            state,
            tenant_id: tenant.map(str::to_string),
        }
    }

    fn ids(records: &[SubscriptionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.subscription_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_record_copied_verbatim() {
        let lister = ScriptedLister::new(vec![Step::Page(vec![sub(
            "sub-1",
            "Prod",
            Some(SubscriptionState::Enabled),
            Some("tenant-a"),
        )])]);

        let records = SubscriptionService::new(&lister).get_subscriptions().await.unwrap();
        assert_eq!(
            records,
            vec![SubscriptionRecord {
                subscription_id: "sub-1".to_string(),
                display_name: "Prod".to_string(),
                state: "Enabled".to_string(),
                tenant_id: "tenant-a".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_state_and_tenant_become_unknown() {
        let lister = ScriptedLister::new(vec![Step::Page(vec![sub("sub-2", "Test", None, None)])]);

        let records = SubscriptionService::new(&lister).get_subscriptions().await.unwrap();
        assert_eq!(records[0].subscription_id, "sub-2");
        assert_eq!(records[0].display_name, "Test");
        assert_eq!(records[0].state, UNKNOWN);
        assert_eq!(records[0].tenant_id, UNKNOWN);
    }

    #[tokio::test]
    async fn test_missing_id_and_name_stay_empty() {
        let lister = ScriptedLister::new(vec![Step::Page(vec![SubscriptionData::default()])]);

        let records = SubscriptionService::new(&lister).get_subscriptions().await.unwrap();
        assert_eq!(records[0].subscription_id, "");
        assert_eq!(records[0].display_name, "");
        assert_eq!(records[0].state, UNKNOWN);
    }

    #[tokio::test]
    async fn test_unrecognized_state_kept_verbatim() {
        let lister = ScriptedLister::new(vec![Step::Page(vec![sub(
            "sub-3",
            "Odd",
            Some(SubscriptionState::Other("Frozen".to_string())),
            Some("tenant-a"),
        )])]);

        let records = SubscriptionService::new(&lister).get_subscriptions().await.unwrap();
        assert_eq!(records[0].state, "Frozen");
    }

    #[tokio::test]
    async fn test_no_subscriptions_is_empty_not_error() {
        let lister = ScriptedLister::new(vec![Step::Page(Vec::new())]);
        let records = SubscriptionService::new(&lister).get_subscriptions().await.unwrap();
        assert!(records.is_empty());

        let lister = ScriptedLister::new(Vec::new());
        let records = SubscriptionService::new(&lister).get_subscriptions().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_order_preserved_across_pages() {
        let state = Some(SubscriptionState::Enabled);
        let lister = ScriptedLister::new(vec![
            Step::Page(vec![
                sub("a", "A", state.clone(), Some("t")),
                sub("b", "B", state.clone(), Some("t")),
            ]),
            Step::Page(vec![sub("c", "C", state.clone(), Some("t"))]),
            Step::Page(vec![
                sub("d", "D", state.clone(), Some("t")),
                sub("e", "E", state, Some("t")),
            ]),
        ]);

        let records = SubscriptionService::new(&lister).get_subscriptions().await.unwrap();
        assert_eq!(ids(&records), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_failure_after_first_page_returns_no_partial_result() {
        let lister = ScriptedLister::new(vec![
            Step::Page(vec![
                sub("a", "A", None, None),
                sub("b", "B", None, None),
            ]),
            Step::Fail,
        ]);

        let result = SubscriptionService::new(&lister).get_subscriptions().await;
        match result {
            Err(UpstreamError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_calls_restart_and_agree() {
        let lister = ScriptedLister::new(vec![
            Step::Page(vec![sub("a", "A", Some(SubscriptionState::Enabled), Some("t"))]),
            Step::Page(vec![sub("b", "B", Some(SubscriptionState::Disabled), Some("t"))]),
        ]);
        let service = SubscriptionService::new(&lister);

        let first = service.get_subscriptions().await.unwrap();
        let second = service.get_subscriptions().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(lister.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = SubscriptionRecord {
            subscription_id: "sub-1".to_string(),
            display_name: "Prod".to_string(),
            state: "Enabled".to_string(),
            tenant_id: "tenant-a".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["subscriptionId"], "sub-1");
        assert_eq!(value["displayName"], "Prod");
        assert_eq!(value["tenantId"], "tenant-a");
    }
}
