//! Test fixtures and data factories

use batch_enrich::config::EnrichConfig;
use batch_enrich::storage::Table;
use serde_json::{Value, json};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Factory for candidate tables
pub struct TableFactory;

impl TableFactory {
    /// `n` rows with ids `r0..r{n-1}` and one private column
    pub fn candidates(n: usize) -> Table {
        let columns = vec![
            "id".to_string(),
            "Email".to_string(),
            "Role".to_string(),
            "Path to impact".to_string(),
        ];
        let rows = (0..n)
            .map(|i| {
                vec![
                    json!(format!("r{}", i)),
                    json!(format!("person{}@example.com", i)),
                    json!("Engineer"),
                    if i % 4 == 0 { Value::Null } else { json!("Policy work") },
                ]
            })
            .collect();
        Table::from_rows(columns, rows)
    }

    /// Same rows as `candidates`, as CSV text
    pub fn candidates_csv(n: usize) -> String {
        let mut out = String::from("id,Email,Role,Path to impact\n");
        for i in 0..n {
            let impact = if i % 4 == 0 { "" } else { "Policy work" };
            out.push_str(&format!("r{},person{}@example.com,Engineer,{}\n", i, i, impact));
        }
        out
    }
}

/// Temporary directory holding one run's artifacts
pub struct TestWorkspace {
    pub dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("llm_results.csv")
    }

    pub fn usage_log(&self) -> PathBuf {
        self.dir.path().join("token_log.csv")
    }

    /// Write `content` to `name` inside the workspace
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    /// Valid configuration writing into this workspace
    pub fn config(&self, batch_size: usize, concurrency: usize) -> EnrichConfig {
        let mut config = EnrichConfig {
            batch_size,
            concurrency,
            retry_delay_ms: 1,
            ..EnrichConfig::default()
        };
        config.provider.api_key = "test-key".to_string();
        config.output.path = self.output();
        config.output.usage_log = self.usage_log();
        config
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
