//! Integration tests for the research pipeline

#[cfg(test)]
mod tests {
    use crate::{
        AggregationMethod, CategoryStatus, Coordination, PipelineConfig, PipelineError,
        ResearchPipeline, RunState, Stage, StageMode,
    };
    use async_trait::async_trait;
    use hcp_domain::{Category, Confidence, RetryPolicy, SearchHit, SearchProvider, NO_DATA};
    use hcp_llm::{LlmError, MockProvider};
    use hcp_sources::{SourceError, StaticScraper, StaticSearch};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    const ENTITY: &str = "Rashid Hospital";

    fn links(site: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://{}.ae/{}", site, i)).collect()
    }

    fn hits(urls: &[String]) -> Vec<SearchHit> {
        urls.iter()
            .map(|u| SearchHit::new(format!("Result for {}", u), u.clone(), "snippet"))
            .collect()
    }

    fn chunk_response(value: &str, urls: &[String]) -> String {
        let results: Vec<_> = urls
            .iter()
            .map(|u| json!({"value": value, "source_url": u}))
            .collect();
        json!({ "chunk_results": results }).to_string()
    }

    fn config(categories: Vec<Category>) -> PipelineConfig {
        PipelineConfig {
            categories,
            coordination: StageMode::Deterministic,
            ..PipelineConfig::default()
        }
    }

    fn pipeline(
        search: StaticSearch,
        scraper: StaticScraper,
        llm: MockProvider,
        config: PipelineConfig,
    ) -> ResearchPipeline<StaticSearch, StaticScraper, MockProvider> {
        ResearchPipeline::new(search, scraper, llm, config).unwrap()
    }

    fn scraper_for(urls: &[String], text: &str) -> StaticScraper {
        urls.iter()
            .fold(StaticScraper::new(), |s, u| s.with_page(u.clone(), text))
    }

    /// CEO seen 4 times, phone twice, website once
    fn tiered_fixture() -> (StaticSearch, StaticScraper, MockProvider) {
        let ceo = links("ceo", 4);
        let phone = links("phone", 2);
        let web = links("web", 1);

        let search = StaticSearch::new()
            .with_hits("CEO director", hits(&ceo))
            .with_hits("contact phone", hits(&phone))
            .with_hits("official website", hits(&web));

        let mut scraper = StaticScraper::new();
        for url in ceo.iter().chain(&phone).chain(&web) {
            scraper = scraper.with_page(url.clone(), format!("Hospital page at {}", url));
        }

        let llm = MockProvider::default();
        llm.respond_when(
            "Extract ALL CEO information",
            chunk_response("Dr. Younis Kazim", &ceo),
        );
        llm.respond_when(
            "Extract ALL phone numbers",
            chunk_response("+971 4 219 2000", &phone),
        );
        llm.respond_when("Extract ALL website URLs", chunk_response("dha.gov.ae", &web));

        (search, scraper, llm)
    }

    #[tokio::test]
    async fn test_confidence_tiers_end_to_end() {
        let (search, scraper, llm) = tiered_fixture();
        let pipeline = pipeline(
            search,
            scraper,
            llm.clone(),
            config(vec![Category::Ceo, Category::Phone, Category::Website]),
        );

        let report = pipeline
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.model, "mock");
        let record = report.record().unwrap();
        let ceo = record.get(Category::Ceo).unwrap();
        assert_eq!(ceo.value, "Dr. Younis Kazim");
        assert_eq!(ceo.confidence, Confidence::High);
        assert_eq!(ceo.source_urls.len(), 4);
        assert_eq!(record.get(Category::Phone).unwrap().confidence, Confidence::Medium);
        assert_eq!(record.get(Category::Website).unwrap().confidence, Confidence::Low);

        // One chunk per category, no aggregation or coordination calls
        assert_eq!(llm.call_count(), 3);
        for (_, category) in &report.categories {
            assert!(category.status.is_completed());
            assert_eq!(category.chunk_count, 1);
            assert_eq!(category.aggregated_by, AggregationMethod::Deterministic);
        }
    }

    #[tokio::test]
    async fn test_report_keeps_configured_category_order() {
        let (search, scraper, llm) = tiered_fixture();
        let categories = vec![Category::Website, Category::Ceo, Category::Phone];
        let report = pipeline(search, scraper, llm, config(categories.clone()))
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        let order: Vec<Category> = report.categories.keys().copied().collect();
        assert_eq!(order, categories);
        let fields: Vec<&str> = report.record().unwrap().iter().map(|(k, _)| k).collect();
        assert_eq!(fields, vec!["WEBSITE", "CEO", "PHONE"]);
    }

    #[tokio::test]
    async fn test_partial_scrape_failure_is_isolated() {
        let urls = links("ceo", 5);
        let search = StaticSearch::new().with_hits("CEO director", hits(&urls));
        let scraper = scraper_for(&urls[..4], "Dr. Younis Kazim leads the hospital")
            .with_error(urls[4].clone(), SourceError::Timeout(urls[4].clone()));
        let llm = MockProvider::default();
        llm.respond_when(
            "Extract ALL CEO information",
            chunk_response("Dr. Younis Kazim", &urls[..4]),
        );

        let report = pipeline(search, scraper.clone(), llm, config(vec![Category::Ceo]))
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(scraper.fetched().len(), 5);
        let ceo = &report.categories[&Category::Ceo];
        assert_eq!(ceo.evidence_count, 4);
        assert!(ceo.status.is_completed());
        assert_eq!(report.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_empty_corpus_makes_no_llm_calls() {
        let llm = MockProvider::default();
        let report = pipeline(
            StaticSearch::new(),
            StaticScraper::new(),
            llm.clone(),
            config(Category::ALL.to_vec()),
        )
        .research(ENTITY, &CancellationToken::new())
        .await
        .unwrap();

        assert_eq!(llm.call_count(), 0);
        for (_, category) in &report.categories {
            assert_eq!(category.chunk_count, 0);
            assert_eq!(category.aggregated_by, AggregationMethod::Sentinel);
            assert_eq!(
                serde_json::to_value(&category.aggregated).unwrap(),
                json!({
                    "most_common": {"value": "No data available", "count": 0, "source_urls": []},
                    "all_values": []
                })
            );
        }
        let record = report.record().unwrap();
        assert!(record.is_complete());
        assert!(record.iter().all(|(_, field)| field.value == NO_DATA));
    }

    #[tokio::test]
    async fn test_fenced_extraction_output_matches_bare() {
        let urls = links("ceo", 2);
        let bare = chunk_response("Dr. Younis Kazim", &urls);

        let mut records = Vec::new();
        for response in [bare.clone(), format!("Sure! Here's the data: ```json {} ```", bare)] {
            let llm = MockProvider::default();
            llm.respond_when("Extract ALL CEO information", response);
            let report = pipeline(
                StaticSearch::new().with_hits("CEO director", hits(&urls)),
                scraper_for(&urls, "Leadership"),
                llm,
                config(vec![Category::Ceo]),
            )
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();
            records.push(report.record().cloned().unwrap());
        }

        assert_eq!(records[0], records[1]);
        assert_eq!(
            records[0].get(Category::Ceo).unwrap().confidence,
            Confidence::Medium
        );
    }

    /// Three one-page chunks: two say Blue Cross, one says BCBS
    fn insurance_fixture() -> (StaticSearch, StaticScraper, Vec<String>) {
        let urls = links("ins", 3);
        let search = StaticSearch::new().with_hits("insurance accepted", hits(&urls));
        let scraper = StaticScraper::new()
            .with_page(urls[0].clone(), "Plans: Blue Cross via portal one")
            .with_page(urls[1].clone(), "Plans: Blue Cross via portal two")
            .with_page(urls[2].clone(), "We work with BCBS");
        (search, scraper, urls)
    }

    fn insurance_llm(urls: &[String], aggregation_response: &str) -> MockProvider {
        let llm = MockProvider::default();
        llm.respond_when("Aggregate these", aggregation_response);
        llm.respond_when("portal one", chunk_response("Blue Cross", &urls[..1]));
        llm.respond_when("portal two", chunk_response("Blue Cross", &urls[1..2]));
        llm.respond_when("work with BCBS", chunk_response("BCBS", &urls[2..]));
        llm
    }

    fn small_chunks(categories: Vec<Category>) -> PipelineConfig {
        PipelineConfig {
            max_tokens: 20,
            ..config(categories)
        }
    }

    #[tokio::test]
    async fn test_llm_aggregation_merges_spellings() {
        let (search, scraper, urls) = insurance_fixture();
        let aggregation = json!({
            "most_common": {"value": "Blue Cross", "count": 3, "source_urls": urls},
            "all_values": [
                {"value": "Blue Cross", "source_url": urls[0]},
                {"value": "Blue Cross", "source_url": urls[1]},
                {"value": "BCBS", "source_url": urls[2]}
            ]
        })
        .to_string();
        let llm = insurance_llm(&urls, &aggregation);

        let report = pipeline(search, scraper, llm.clone(), small_chunks(vec![Category::Insurance]))
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        let insurance = &report.categories[&Category::Insurance];
        assert_eq!(insurance.chunk_count, 3);
        assert_eq!(insurance.candidate_count, 3);
        assert_eq!(insurance.aggregated_by, AggregationMethod::Llm);
        assert!(insurance.status.is_completed());
        assert_eq!(llm.calls_containing("Aggregate these"), 1);

        let field = report.record().unwrap().get(Category::Insurance).unwrap().clone();
        assert_eq!(field.value, "Blue Cross");
        assert_eq!(field.confidence, Confidence::High);
        assert_eq!(field.alternatives[0].value, "BCBS");
    }

    #[tokio::test]
    async fn test_rejected_aggregation_falls_back() {
        let (search, scraper, urls) = insurance_fixture();
        let llm = insurance_llm(
            &urls,
            r#"{"most_common": {"value": "Blue Cross", "count": 7, "source_urls": []}}"#,
        );

        let report = pipeline(search, scraper, llm, small_chunks(vec![Category::Insurance]))
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        let insurance = &report.categories[&Category::Insurance];
        assert_eq!(insurance.aggregated_by, AggregationMethod::Deterministic);
        assert_eq!(insurance.aggregated.most_common.value, "Blue Cross");
        assert_eq!(insurance.aggregated.most_common.count, 2);
        assert!(matches!(
            insurance.status,
            CategoryStatus::Failed {
                stage: Stage::Aggregating,
                ..
            }
        ));
        // A degraded category still reaches the record
        let field = report.record().unwrap().get(Category::Insurance).unwrap().clone();
        assert_eq!(field.confidence, Confidence::Medium);
        assert_eq!(report.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_failed_chunk_degrades_category_only() {
        let urls = links("phone", 2);
        let search = StaticSearch::new().with_hits("contact phone", hits(&urls));
        let scraper = StaticScraper::new()
            .with_page(urls[0].clone(), "Call 800 1111 main line")
            .with_page(urls[1].clone(), "BROKEN-PAGE marker text here");
        let llm = MockProvider::default();
        llm.fail_when("BROKEN-PAGE");
        llm.respond_when("Extract ALL phone numbers", chunk_response("800 1111", &urls[..1]));

        let config = PipelineConfig {
            aggregation: StageMode::Deterministic,
            ..small_chunks(vec![Category::Phone])
        };
        let report = pipeline(search, scraper, llm, config)
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        let phone = &report.categories[&Category::Phone];
        assert_eq!(phone.chunk_count, 2);
        assert_eq!(phone.candidate_count, 1);
        assert!(matches!(
            phone.status,
            CategoryStatus::Failed {
                stage: Stage::Extracting,
                ..
            }
        ));
        assert_eq!(
            report.record().unwrap().get(Category::Phone).unwrap().value,
            "800 1111"
        );
    }

    #[tokio::test]
    async fn test_unparseable_coordination_keeps_raw_results() {
        let (search, scraper, llm) = tiered_fixture();
        let config = PipelineConfig {
            coordination: StageMode::Llm,
            ..config(vec![Category::Ceo, Category::Phone])
        };

        let report = pipeline(search, scraper, llm, config)
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Done);
        assert!(report.record().is_none());
        match &report.coordination {
            Coordination::Unparsed {
                raw_results,
                error,
                raw_response,
            } => {
                assert_eq!(raw_results["CEO"].most_common.count, 4);
                assert_eq!(raw_results["PHONE"].most_common.count, 2);
                assert!(error.contains("Could not parse"));
                assert_eq!(raw_response.as_deref(), Some("Default mock response"));
            }
            other => panic!("expected unparsed coordination, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_llm_coordination_renders_record() {
        let (search, scraper, llm) = tiered_fixture();
        llm.respond_when(
            "Integrate these",
            json!({
                "CEO": {"value": "Dr. Younis Kazim (CEO)", "source_urls": ["https://ceo.ae/1"], "confidence": "Low"},
                "PHONE": {"value": "+971 4 219 2000", "source_urls": [], "alternatives": []}
            })
            .to_string(),
        );
        let config = PipelineConfig {
            coordination: StageMode::Llm,
            ..config(vec![Category::Ceo, Category::Phone])
        };

        let report = pipeline(search, scraper, llm, config)
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        let ceo = report.record().unwrap().get(Category::Ceo).unwrap().clone();
        assert_eq!(ceo.value, "Dr. Younis Kazim (CEO)");
        assert_eq!(ceo.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_fatal_search_error_aborts_run() {
        let search = StaticSearch::new().with_error("UAE", SourceError::MissingApiKey);
        let llm = MockProvider::default();
        let err = pipeline(search, StaticScraper::new(), llm.clone(), config(Category::ALL.to_vec()))
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Fatal {
                stage: Stage::Collecting,
                ..
            }
        ));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fatal_llm_error_aborts_run() {
        let (search, scraper, llm) = tiered_fixture();
        llm.error_when("Extract ALL", LlmError::Unauthorized("invalid key".into()));
        let config = config(vec![Category::Doctors, Category::Ceo]);
        let search = search.with_hits("number of doctors", hits(&links("ceo", 1)));

        // CEO chunks match their own rule first; doctors chunks hit the fatal one
        let err = pipeline(search, scraper, llm, config)
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Fatal {
                stage: Stage::Extracting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancellation_stops_run_promptly() {
        let urls = links("ceo", 3);
        let search = StaticSearch::new().with_hits("CEO director", hits(&urls));
        let scraper = scraper_for(&urls, "Leadership").with_delay(Duration::from_secs(30));
        let pipeline = pipeline(search, scraper, MockProvider::default(), config(vec![Category::Ceo]));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = pipeline.research(ENTITY, &cancel).await.unwrap_err();
        assert_eq!(err, PipelineError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_blank_entity_rejected() {
        let err = pipeline(
            StaticSearch::new(),
            StaticScraper::new(),
            MockProvider::default(),
            config(vec![Category::Ceo]),
        )
        .research("   ", &CancellationToken::new())
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ResearchPipeline::new(
            StaticSearch::new(),
            StaticScraper::new(),
            MockProvider::default(),
            PipelineConfig {
                max_workers: 0,
                ..PipelineConfig::default()
            },
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let pipeline = pipeline(
            StaticSearch::new(),
            StaticScraper::new(),
            MockProvider::default(),
            config(vec![Category::Ceo]),
        );

        let outcomes = pipeline
            .research_batch(
                ["Rashid Hospital", "  ", "Latifa Hospital"],
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_researched());
        assert!(!outcomes[1].is_researched());
        assert!(outcomes[2].is_researched());
        assert_eq!(outcomes[2].name(), "Latifa Hospital");

        let row = serde_json::to_value(&outcomes[1]).unwrap();
        assert_eq!(row["STATUS"], "Error");
        assert!(row["ERROR_MESSAGE"].as_str().unwrap().contains("Invalid input"));
    }

    #[tokio::test]
    async fn test_cancelled_batch_stops() {
        let pipeline = pipeline(
            StaticSearch::new(),
            StaticScraper::new(),
            MockProvider::default(),
            config(vec![Category::Ceo]),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcomes = pipeline
            .research_batch(vec!["Rashid Hospital".to_string()], &cancel)
            .await;
        assert!(outcomes.is_empty());
    }

    /// Search provider that panics for one category
    struct PanickingSearch {
        inner: StaticSearch,
        poison: &'static str,
    }

    #[async_trait]
    impl SearchProvider for PanickingSearch {
        type Error = SourceError;

        async fn search(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<Vec<SearchHit>, Self::Error> {
            if query.contains(self.poison) {
                panic!("search provider bug");
            }
            self.inner.search(query, max_results).await
        }
    }

    #[tokio::test]
    async fn test_panicking_category_does_not_crash_siblings() {
        let (search, scraper, llm) = tiered_fixture();
        let search = PanickingSearch {
            inner: search,
            poison: "CEO director",
        };
        let pipeline = ResearchPipeline::new(
            search,
            scraper,
            llm,
            config(vec![Category::Ceo, Category::Phone]),
        )
        .unwrap();

        let report = pipeline
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        match &report.categories[&Category::Ceo].status {
            CategoryStatus::Failed { stage, reason } => {
                assert_eq!(*stage, Stage::Collecting);
                assert!(reason.contains("search provider bug"));
            }
            other => panic!("expected failed category, got {:?}", other),
        }
        let record = report.record().unwrap();
        assert_eq!(record.get(Category::Ceo).unwrap().value, NO_DATA);
        assert_eq!(record.get(Category::Phone).unwrap().confidence, Confidence::Medium);
    }

    /// Search client with a 30s request timeout whose first request hangs
    struct StallingSearch {
        inner: StaticSearch,
        retry: RetryPolicy,
        requests: AtomicU32,
    }

    impl StallingSearch {
        const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

        async fn request(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<Vec<SearchHit>, SourceError> {
            let first = self.requests.fetch_add(1, Ordering::SeqCst) == 0;
            let response = async {
                if first {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                }
                self.inner.search(query, max_results).await
            };
            tokio::time::timeout(Self::REQUEST_TIMEOUT, response)
                .await
                .unwrap_or_else(|_| Err(SourceError::Timeout(query.to_string())))
        }
    }

    #[async_trait]
    impl SearchProvider for StallingSearch {
        type Error = SourceError;

        async fn search(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<Vec<SearchHit>, Self::Error> {
            self.retry
                .retry("search", || self.request(query, max_results))
                .await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_search_is_retried_within_stage_deadline() {
        let (search, scraper, llm) = tiered_fixture();
        let retry = RetryPolicy::new(3);
        let config = config(vec![Category::Phone]);
        assert!(config.search_timeout() >= retry.budget(StallingSearch::REQUEST_TIMEOUT));

        let search = StallingSearch {
            inner: search,
            retry,
            requests: AtomicU32::new(0),
        };
        let report = ResearchPipeline::new(search, scraper, llm, config)
            .unwrap()
            .research(ENTITY, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.categories[&Category::Phone].status.is_completed());
        let phone = report.record().unwrap().get(Category::Phone).unwrap();
        assert_eq!(phone.value, "+971 4 219 2000");
        assert_eq!(phone.confidence, Confidence::Medium);
    }
}
