//! End-to-end validation harness with filesystem rollback.
//!
//! Mirrors the connector's operational checklist: environment, configuration,
//! connection, functionality, and error handling. Every step is logged into a
//! JSON report; files touched during validation are backed up first and can
//! be restored with [`ValidationState::rollback`].

use std::io;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::{client::Client, config::GeminiConfig, errors::Result, types::ChatMessage};

const PLACEHOLDER_KEY: &str = "your_gemini_api_key_here";

/// One logged validation step.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationEntry {
    pub timestamp: String,
    pub step: String,
    pub success: bool,
    pub message: String,
    pub status: String,
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    timestamp: String,
    validation_steps: &'a [ValidationEntry],
    summary: ReportSummary,
}

#[derive(Serialize)]
struct ReportSummary {
    total_steps: usize,
    passed: usize,
    failed: usize,
}

/// Tracks validation side effects for rollback and reporting.
pub struct ValidationState {
    root: PathBuf,
    backup_dir: PathBuf,
    entries: Vec<ValidationEntry>,
    created_files: Vec<PathBuf>,
    modified_files: Vec<(PathBuf, PathBuf)>,
}

impl ValidationState {
    pub fn new() -> Self {
        Self::new_in(".")
    }

    /// Root all bookkeeping paths under the given directory.
    pub fn new_in(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let backup_dir = root.join("backups").join(format!("backup_{}", file_stamp()));
        Self {
            root,
            backup_dir,
            entries: Vec::new(),
            created_files: Vec::new(),
            modified_files: Vec::new(),
        }
    }

    /// Copy a file into the backup directory before it gets modified.
    /// Missing files are skipped.
    pub fn backup_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.backup_dir)?;
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let backup_path = self.backup_dir.join(file_name);
        std::fs::copy(path, &backup_path)?;
        self.modified_files.push((path.to_path_buf(), backup_path));
        Ok(())
    }

    /// Register a file created during validation so rollback removes it.
    pub fn track_created(&mut self, path: impl Into<PathBuf>) {
        self.created_files.push(path.into());
    }

    /// Log one step result and print it.
    pub fn record(&mut self, step: &str, success: bool, message: &str) {
        let status = if success { "PASS" } else { "FAIL" };
        if message.is_empty() {
            println!("{status}: {step}");
        } else {
            println!("{status}: {step} - {message}");
        }
        self.entries.push(ValidationEntry {
            timestamp: rfc3339_now(),
            step: step.to_string(),
            success,
            message: message.to_string(),
            status: status.to_string(),
        });
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    pub fn passed(&self) -> usize {
        self.entries.iter().filter(|entry| entry.success).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.passed()
    }

    /// Restore modified files from their backups, delete created files, and
    /// remove the backup directory.
    pub fn rollback(&mut self) -> io::Result<()> {
        println!("Rolling back changes...");

        for (original, backup) in self.modified_files.drain(..) {
            if backup.exists() {
                std::fs::copy(&backup, &original)?;
                println!("   Restored: {}", original.display());
            }
        }

        for path in self.created_files.drain(..) {
            if path.exists() {
                std::fs::remove_file(&path)?;
                println!("   Removed: {}", path.display());
            }
        }

        if self.backup_dir.exists() {
            std::fs::remove_dir_all(&self.backup_dir)?;
        }

        println!("Rollback completed successfully");
        Ok(())
    }

    /// Write the step log and summary to `logs/validation_report_<ts>.json`.
    pub fn save_report(&self) -> io::Result<PathBuf> {
        let logs_dir = self.root.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        let report_path = logs_dir.join(format!("validation_report_{}.json", file_stamp()));

        let report = ValidationReport {
            timestamp: rfc3339_now(),
            validation_steps: &self.entries,
            summary: ReportSummary {
                total_steps: self.entries.len(),
                passed: self.passed(),
                failed: self.failed(),
            },
        };
        let payload = serde_json::to_string_pretty(&report)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        std::fs::write(&report_path, payload)?;

        println!("Validation report saved to: {}", report_path.display());
        Ok(report_path)
    }
}

impl Default for ValidationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequences the validation suites against a project root.
pub struct Validator {
    state: ValidationState,
    root: PathBuf,
}

impl Validator {
    pub fn new() -> Self {
        Self::new_in(".")
    }

    pub fn new_in(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            state: ValidationState::new_in(&root),
            root,
        }
    }

    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    pub fn rollback(&mut self) -> io::Result<()> {
        self.state.rollback()
    }

    pub fn save_report(&self) -> io::Result<PathBuf> {
        self.state.save_report()
    }

    /// Check the project layout the connector expects.
    pub fn validate_environment(&mut self) -> bool {
        println!("\nValidating Environment...");
        let mut ok = true;

        for file in ["Cargo.toml", "src/lib.rs"] {
            if self.root.join(file).exists() {
                self.state.record(&format!("File {file}"), true, "");
            } else {
                self.state.record(&format!("File {file}"), false, "Missing");
                ok = false;
            }
        }

        for dir in ["src", "config", "logs"] {
            if self.root.join(dir).is_dir() {
                self.state.record(&format!("Directory {dir}"), true, "");
            } else {
                self.state.record(&format!("Directory {dir}"), false, "Missing");
            }
        }

        ok
    }

    /// Check the API key variable and load configuration from the
    /// environment.
    pub fn validate_configuration(&mut self) -> Option<GeminiConfig> {
        println!("\nValidating Configuration...");

        let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        if !api_key.is_empty() && api_key != PLACEHOLDER_KEY && !api_key.starts_with("***") {
            self.state.record("API Key Environment Variable", true, "");
        } else {
            self.state.record(
                "API Key Environment Variable",
                false,
                "Not set or placeholder",
            );
            return None;
        }

        match GeminiConfig::from_env() {
            Ok(config) => {
                self.state.record("Configuration Loading", true, "");
                Some(config)
            }
            Err(err) => {
                self.state
                    .record("Configuration Loading", false, &err.to_string());
                None
            }
        }
    }

    /// Probe the live API: health check plus model introspection.
    pub async fn validate_connection_checks(&mut self, client: &Client) -> bool {
        println!("\nValidating API Connection...");

        if client.validate_connection().await {
            self.state.record("Basic API Connection", true, "");
        } else {
            self.state.record("Basic API Connection", false, "");
            return false;
        }

        let report = client.model_info().await;
        match &report {
            crate::types::ModelInfoReport::Found(_) => {
                self.state.record("Model Information Retrieval", true, "");
            }
            crate::types::ModelInfoReport::Error { error } => {
                self.state.record("Model Information Retrieval", false, error);
            }
        }

        true
    }

    /// Exercise generation, streaming, and chat end to end.
    pub async fn validate_functionality(&mut self, client: &Client) -> bool {
        println!("\nValidating Core Functionality...");

        match client
            .generate_text("Hello, this is a test. Please respond with 'Test successful'.")
            .await
        {
            Ok(result) if !result.text.is_empty() => {
                self.state.record("Basic Text Generation", true, "");
            }
            Ok(_) => {
                self.state
                    .record("Basic Text Generation", false, "No response text");
            }
            Err(err) => {
                self.state
                    .record("Basic Text Generation", false, &err.to_string());
            }
        }

        match self.collect_stream(client, "Count from 1 to 3").await {
            Ok(chunks) if !chunks.is_empty() => {
                self.state.record("Streaming Text Generation", true, "");
            }
            Ok(_) => {
                self.state
                    .record("Streaming Text Generation", false, "No chunks received");
            }
            Err(err) => {
                self.state
                    .record("Streaming Text Generation", false, &err.to_string());
            }
        }

        let messages = [ChatMessage::user("Hello")];
        match client.chat_conversation(&messages).await {
            Ok(result) if !result.text.is_empty() => {
                self.state.record("Chat Conversation", true, "");
            }
            Ok(_) => {
                self.state
                    .record("Chat Conversation", false, "No chat response");
            }
            Err(err) => {
                self.state
                    .record("Chat Conversation", false, &err.to_string());
            }
        }

        true
    }

    /// Confirm failures degrade gracefully instead of crashing.
    pub async fn validate_error_handling(&mut self, client: &Client) -> bool {
        println!("\nValidating Error Handling...");

        match Client::new(GeminiConfig::new("invalid_key_test_123")) {
            Ok(invalid_client) => {
                if invalid_client.validate_connection().await {
                    self.state
                        .record("Invalid API Key Handling", false, "Should have failed");
                } else {
                    self.state
                        .record("Invalid API Key Handling", true, "Graceful failure");
                }
            }
            Err(err) => {
                self.state
                    .record("Invalid API Key Handling", true, &err.to_string());
            }
        }

        match client.generate_text("").await {
            Ok(_) => {
                self.state
                    .record("Empty Prompt Handling", true, "Handled gracefully");
            }
            Err(err) => {
                self.state.record(
                    "Empty Prompt Handling",
                    true,
                    &format!("Returned error: {err}"),
                );
            }
        }

        true
    }

    /// Run every suite in order, skipping network checks in offline mode.
    /// The report is always saved.
    pub async fn run_full(&mut self, offline: bool) -> bool {
        println!("Starting Full Validation Suite...");
        println!("{}", "=".repeat(50));

        let mut success = self.validate_environment();
        let config = self.validate_configuration();
        if config.is_none() {
            success = false;
        }

        if offline {
            println!("\nSkipping API tests (offline mode)");
        } else if let Some(config) = config {
            match Client::new(config) {
                Ok(client) => {
                    if !self.validate_connection_checks(&client).await {
                        success = false;
                    }
                    if !self.validate_functionality(&client).await {
                        success = false;
                    }
                    if !self.validate_error_handling(&client).await {
                        success = false;
                    }
                }
                Err(err) => {
                    self.state
                        .record("API Connection Setup", false, &err.to_string());
                    success = false;
                }
            }
        }

        println!("\n{}", "=".repeat(50));
        if success {
            println!("All Validations Passed!");
        } else {
            println!("Some Validations Failed!");
        }

        if let Err(err) = self.save_report() {
            eprintln!("Failed to save validation report: {err}");
        }
        success
    }

    async fn collect_stream(&self, client: &Client, prompt: &str) -> Result<Vec<String>> {
        let mut stream = client.generate_text_stream(prompt).await?;
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk?);
        }
        Ok(chunks)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::new())
}

fn file_stamp() -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| "00000000_000000".to_string())
}
