//! Validate → fetch with retries → record, for one city or many at once.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::{
    HistoryStore, RetryPolicy, WeatherError, WeatherFetcher, WeatherRecord, validate::validate_city,
};

#[derive(Debug, Clone)]
pub struct WeatherService {
    fetcher: Arc<dyn WeatherFetcher>,
    history: Arc<HistoryStore>,
    policy: RetryPolicy,
}

/// How one city of a fan-out ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CityOutcome {
    Success(WeatherRecord),
    Invalid,
    Failed,
}

impl CityOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            CityOutcome::Success(_) => "success",
            CityOutcome::Invalid => "invalid",
            CityOutcome::Failed => "failed",
        }
    }

    pub fn record(&self) -> Option<&WeatherRecord> {
        match self {
            CityOutcome::Success(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityReport {
    pub city: String,
    pub outcome: CityOutcome,
}

impl WeatherService {
    pub fn new(
        fetcher: Arc<dyn WeatherFetcher>,
        history: Arc<HistoryStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            history,
            policy,
        }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch and record one city. Invalid names are rejected before any request is made.
    pub async fn check_city(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        let city = validate_city(city)?;

        let fetcher = &self.fetcher;
        let record = self
            .policy
            .retry_async(|| fetcher.fetch_weather(&city))
            .await?;

        self.history.record(record.clone());
        Ok(record)
    }

    /// Fetch many cities concurrently, one task per city.
    ///
    /// A city that fails only marks its own report as failed. A task that
    /// panics or is cancelled fails the whole group.
    pub async fn check_many<S: AsRef<str>>(
        &self,
        cities: &[S],
    ) -> Result<Vec<CityReport>, WeatherError> {
        let mut tasks = JoinSet::new();

        for (idx, city) in cities.iter().enumerate() {
            let city = city.as_ref().trim().to_string();
            let service = self.clone();
            tasks.spawn(async move {
                let outcome = service.fan_out_one(&city).await;
                (idx, CityReport { city, outcome })
            });
        }

        let mut reports: Vec<Option<CityReport>> = vec![None; cities.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, report)) => reports[idx] = Some(report),
                Err(err) => {
                    error!(error = %err, "Fan-out task failed");
                    tasks.abort_all();
                    return Err(WeatherError::Scheduling(err.to_string()));
                }
            }
        }

        Ok(reports.into_iter().flatten().collect())
    }

    async fn fan_out_one(&self, city: &str) -> CityOutcome {
        match self.check_city(city).await {
            Ok(record) => CityOutcome::Success(record),
            Err(WeatherError::InvalidCity(_)) => {
                warn!(city, "Invalid city");
                CityOutcome::Invalid
            }
            Err(err) => {
                info!(city, error = %err, "Fetch failed");
                CityOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::{collections::HashMap, time::Duration};

    /// Scripted fetcher: per city, a queue of outcomes; the last one repeats.
    #[derive(Debug, Default)]
    struct ScriptedFetcher {
        script: Mutex<HashMap<String, Vec<Result<f64, &'static str>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn with(entries: Vec<(&str, Vec<Result<f64, &'static str>>)>) -> Arc<Self> {
            let script = entries
                .into_iter()
                .map(|(city, outcomes)| (city.to_string(), outcomes))
                .collect();
            Arc::new(Self {
                script: Mutex::new(script),
                calls: Mutex::default(),
            })
        }

        fn calls_for(&self, city: &str) -> usize {
            self.calls.lock().iter().filter(|c| *c == city).count()
        }
    }

    #[async_trait]
    impl WeatherFetcher for ScriptedFetcher {
        async fn fetch_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
            self.calls.lock().push(city.to_string());
            tokio::task::yield_now().await;

            let next = {
                let mut script = self.script.lock();
                let queue = script.get_mut(city).ok_or(WeatherError::IncompleteData {
                    city: city.to_string(),
                    reason: "city not found".into(),
                })?;
                if queue.len() > 1 { queue.remove(0) } else { queue[0] }
            };

            match next {
                Ok(temp) => Ok(WeatherRecord::new(city, temp, 40, "clear sky")),
                Err(reason) => {
                    if reason == "panic" {
                        panic!("fetcher blew up");
                    }
                    Err(WeatherError::IncompleteData {
                        city: city.to_string(),
                        reason: reason.to_string(),
                    })
                }
            }
        }
    }

    fn service(fetcher: Arc<ScriptedFetcher>) -> WeatherService {
        WeatherService::new(
            fetcher,
            Arc::new(HistoryStore::new()),
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn invalid_city_never_reaches_fetcher() {
        let fetcher = ScriptedFetcher::with(vec![]);
        let svc = service(fetcher.clone());

        let err = svc.check_city("Cairo3").await.unwrap_err();

        assert!(matches!(err, WeatherError::InvalidCity(_)));
        assert!(fetcher.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn check_city_retries_then_records() {
        let fetcher = ScriptedFetcher::with(vec![("Cairo", vec![Err("flaky"), Ok(25.0)])]);
        let svc = service(fetcher.clone());

        let record = svc.check_city(" Cairo ").await.unwrap();

        assert_eq!(record.city(), "Cairo");
        assert_eq!(fetcher.calls_for("Cairo"), 2);
        assert_eq!(svc.history().list_all(), vec![record]);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let fetcher = ScriptedFetcher::with(vec![(
            "Cairo",
            vec![Err("first"), Err("second"), Err("third")],
        )]);
        let svc = service(fetcher.clone());

        let err = svc.check_city("Cairo").await.unwrap_err();

        assert!(matches!(err, WeatherError::RetryExhausted { attempts: 3, .. }));
        assert!(matches!(
            err.root(),
            WeatherError::IncompleteData { reason, .. } if reason == "third"
        ));
        assert_eq!(fetcher.calls_for("Cairo"), 3);
        assert!(svc.history().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fan_out_dedups_same_city() {
        let fetcher = ScriptedFetcher::with(vec![
            ("Cairo", vec![Ok(25.0)]),
            ("Tokyo", vec![Ok(12.0)]),
        ]);
        let svc = service(fetcher);

        let reports = svc.check_many(&["Cairo", "Cairo", "Tokyo"]).await.unwrap();

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| matches!(r.outcome, CityOutcome::Success(_))));

        let mut cities: Vec<_> = svc
            .history()
            .list_all()
            .iter()
            .map(|r| r.city().to_string())
            .collect();
        cities.sort();
        assert_eq!(cities, ["Cairo", "Tokyo"]);
    }

    #[tokio::test]
    async fn fan_out_isolates_failures() {
        let fetcher = ScriptedFetcher::with(vec![
            ("Cairo", vec![Ok(25.0)]),
            ("Lima", vec![Err("down")]),
        ]);
        let svc = service(fetcher);

        let reports = svc.check_many(&["Cairo", "Lima", "Oslo1", ""]).await.unwrap();

        let outcomes: Vec<_> = reports.iter().map(|r| (r.city.as_str(), &r.outcome)).collect();
        assert!(matches!(outcomes[0], ("Cairo", CityOutcome::Success(_))));
        assert_eq!(outcomes[1], ("Lima", &CityOutcome::Failed));
        assert_eq!(outcomes[2], ("Oslo1", &CityOutcome::Invalid));
        assert_eq!(outcomes[3], ("", &CityOutcome::Invalid));
        assert_eq!(svc.history().len(), 1);
    }

    #[tokio::test]
    async fn panicking_task_fails_the_group() {
        let fetcher = ScriptedFetcher::with(vec![
            ("Cairo", vec![Ok(25.0)]),
            ("Lima", vec![Err("panic")]),
        ]);
        let svc = service(fetcher);

        let err = svc.check_many(&["Cairo", "Lima"]).await.unwrap_err();

        assert!(matches!(err, WeatherError::Scheduling(_)));
    }

    #[test]
    fn outcome_status_labels() {
        let ok = CityOutcome::Success(WeatherRecord::new("Cairo", 1.0, 2, "fog"));

        assert_eq!(ok.status(), "success");
        assert_eq!(ok.record().map(WeatherRecord::city), Some("Cairo"));
        assert_eq!(CityOutcome::Invalid.status(), "invalid");
        assert_eq!(CityOutcome::Failed.record(), None);
    }
}
