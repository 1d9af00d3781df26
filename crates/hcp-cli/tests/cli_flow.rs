//! End-to-end flows through the CLI library with in-memory collaborators.

use hcp_cli::commands::{self, write_json};
use hcp_cli::config::{Config, LlmBackendKind, OutputFormat};
use hcp_cli::input::read_names;
use hcp_cli::{CliError, Formatter};
use hcp_domain::{Category, Confidence, SearchHit};
use hcp_extractor::{BatchOutcome, PipelineConfig, ResearchPipeline, StageMode};
use hcp_llm::MockProvider;
use hcp_sources::{StaticScraper, StaticSearch};
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[test]
fn test_config_init_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    // Missing file yields defaults
    assert_eq!(Config::load(Some(path.as_path())).unwrap(), Config::default());

    commands::config::init(&path, false).unwrap();
    assert!(path.exists());
    assert_eq!(Config::load(Some(path.as_path())).unwrap(), Config::default());

    let again = commands::config::init(&path, false);
    assert!(matches!(again, Err(CliError::InvalidInput(_))));
    assert!(commands::config::init(&path, true).is_ok());
}

#[test]
fn test_edited_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[pipeline]
max_tokens = 4000
categories = ["ceo", "phone"]
coordination = "deterministic"

[llm]
provider = "ollama"
model = "qwen2.5"
endpoint = "http://gpu-box:11434"

[settings]
format = "json"
color = false
"#,
    )
    .unwrap();

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.pipeline.max_tokens, 4000);
    assert_eq!(config.pipeline.categories, vec![Category::Ceo, Category::Phone]);
    assert_eq!(config.pipeline.coordination, StageMode::Deterministic);
    assert_eq!(config.llm.provider, LlmBackendKind::Ollama);
    assert_eq!(config.llm.endpoint.as_deref(), Some("http://gpu-box:11434"));
    assert_eq!(config.settings.format, OutputFormat::Json);
    assert!(!config.settings.color);
    assert_eq!(config.search.max_retries, 3);
}

#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[pipeline\nmax_tokens = ").unwrap();
    assert!(matches!(Config::load(Some(path.as_path())), Err(CliError::Toml(_))));
}

#[test]
fn test_write_json_creates_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("report.json");
    write_json(&path, &json!({"HCP NAME": "Rashid Hospital"})).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["HCP NAME"], "Rashid Hospital");
}

#[tokio::test]
async fn test_csv_batch_to_table_and_json() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("hospitals.csv");
    fs::write(
        &csv_path,
        "Emirate,HCP Name\nDubai,Rashid Hospital\nDubai,\nSharjah,Al Qassimi Hospital\n",
    )
    .unwrap();

    let names = read_names(&csv_path).unwrap();
    assert_eq!(names, vec!["Rashid Hospital", "Al Qassimi Hospital"]);

    let urls = ["https://dha.gov.ae/rashid", "https://rashid.ae/contact"];
    let search = StaticSearch::new().with_hits(
        "Rashid Hospital contact phone",
        urls.iter()
            .map(|u| SearchHit::new("Rashid Hospital", *u, "Contact us"))
            .collect(),
    );
    let scraper = urls.iter().fold(StaticScraper::new(), |s, u| {
        s.with_page(*u, "Call Rashid Hospital on +971 4 219 2000")
    });
    let llm = MockProvider::default();
    llm.respond_when(
        "Extract ALL phone numbers for Rashid Hospital",
        json!({"chunk_results": [
            {"value": "+971 4 219 2000", "source_url": urls[0]},
            {"value": "+971 4 219 2000", "source_url": urls[1]}
        ]})
        .to_string(),
    );

    let config = PipelineConfig {
        categories: vec![Category::Phone, Category::Ceo],
        coordination: StageMode::Deterministic,
        ..PipelineConfig::default()
    };
    let pipeline = ResearchPipeline::new(search, scraper, llm, config).unwrap();
    let outcomes = pipeline
        .research_batch(&names, &CancellationToken::new())
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(BatchOutcome::is_researched));
    let BatchOutcome::Researched(rashid) = &outcomes[0] else {
        panic!("expected a report for Rashid Hospital");
    };
    let phone = rashid.record().unwrap().get(Category::Phone).unwrap();
    assert_eq!(phone.confidence, Confidence::Medium);

    let table = Formatter::new(OutputFormat::Table, false)
        .format_batch(&outcomes)
        .unwrap();
    assert!(table.contains("+971 4 219 2000"));
    assert!(table.contains("Al Qassimi Hospital"));
    assert!(table.contains("No data available"));
    assert!(table.contains("2 of 2 entities researched"));

    let out = dir.path().join("results.json");
    write_json(&out, &outcomes).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written[0]["entity"], "Rashid Hospital");
    assert_eq!(written[0]["coordination"]["PHONE"]["value"], "+971 4 219 2000");
    assert_eq!(written[1]["coordination"]["CEO"]["value"], "No data available");
}
