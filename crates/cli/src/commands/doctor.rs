use std::path::PathBuf;

use delicia_core::config::{AppConfig, EmbeddingProvider};
use delicia_retrieval::{EmbeddingService, HashingEmbedder, VectorIndex};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] =
    ["llm_api_key_readiness", "notion_credentials_readiness", "knowledge_index_presence"];

pub fn run(config_path: Option<PathBuf>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config_path: Option<PathBuf>) -> DoctorReport {
    let mut checks = Vec::new();

    match load_config(config_path) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_api_key(&config));
            checks.push(check_notion_credentials(&config));
            checks.push(check_knowledge_index(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in DEPENDENT_CHECKS {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_api_key(config: &AppConfig) -> DoctorCheck {
    match config.require_llm_api_key() {
        Ok(_) => DoctorCheck {
            name: "llm_api_key_readiness",
            status: CheckStatus::Pass,
            details: format!("api key present for model `{}`", config.llm.model),
        },
        Err(error) => DoctorCheck {
            name: "llm_api_key_readiness",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_notion_credentials(config: &AppConfig) -> DoctorCheck {
    let has_key = config
        .notion
        .api_key
        .as_ref()
        .map(|key| !key.expose_secret().trim().is_empty())
        .unwrap_or(false);
    let has_database =
        config.notion.database_id.as_deref().map(|id| !id.trim().is_empty()).unwrap_or(false);

    if has_key && has_database {
        return DoctorCheck {
            name: "notion_credentials_readiness",
            status: CheckStatus::Pass,
            details: "notion api key and database id present".to_string(),
        };
    }

    let missing = match (has_key, has_database) {
        (false, false) => "NOTION_API_KEY and NOTION_DATABASE_ID",
        (false, true) => "NOTION_API_KEY",
        _ => "NOTION_DATABASE_ID",
    };
    DoctorCheck {
        name: "notion_credentials_readiness",
        status: CheckStatus::Fail,
        details: format!("{missing} not set; session reports cannot be saved"),
    }
}

fn check_knowledge_index(config: &AppConfig) -> DoctorCheck {
    let dir = &config.knowledge.index_dir;
    let path = VectorIndex::index_path(dir);
    let expected_model = configured_embedding_model(config);

    match VectorIndex::load(dir) {
        Ok(Some(index)) if index.embedding_model() == expected_model => DoctorCheck {
            name: "knowledge_index_presence",
            status: CheckStatus::Pass,
            details: format!("{} chunks at `{}`", index.len(), path.display()),
        },
        Ok(Some(index)) => DoctorCheck {
            name: "knowledge_index_presence",
            status: CheckStatus::Fail,
            details: format!(
                "index at `{}` was built with `{}` but `{expected_model}` is configured; run `delicia index --rebuild`",
                path.display(),
                index.embedding_model()
            ),
        },
        Ok(None) => DoctorCheck {
            name: "knowledge_index_presence",
            status: CheckStatus::Skipped,
            details: format!(
                "no index at `{}` yet; `delicia index` or the first chat builds it",
                path.display()
            ),
        },
        Err(error) => DoctorCheck {
            name: "knowledge_index_presence",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn configured_embedding_model(config: &AppConfig) -> String {
    match config.embedding.provider {
        EmbeddingProvider::Hashing => {
            HashingEmbedder::new(config.embedding.dimensions).model().to_string()
        }
        EmbeddingProvider::Gemini => config.embedding.model.clone(),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
