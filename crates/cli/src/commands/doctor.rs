use grocer_agent::gateway::GatewayFile;
use grocer_agent::prompts::PromptLibrary;
use grocer_core::config::{AppConfig, LoadOptions};
use grocer_db::connect;
use serde::Serialize;

use crate::commands::CommandResult;

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

const CHECKS_AFTER_CONFIG: [&str; 3] = ["gateway_config", "prompts", "database_connectivity"];

/// Exit code 1 when any check fails. A missing gateway file is reported as
/// skipped: the assistant runs without gateway tools in that case.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = u8::from(report.overall_status == CheckStatus::Fail);

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

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(runtime.block_on(check_gateway_config(&config)));
                    checks.push(runtime.block_on(check_prompts(&config)));
                    checks.push(runtime.block_on(check_database_connectivity(&config)));
                }
                Err(error) => {
                    let details = format!("failed to initialize async runtime: {error}");
                    checks.extend(CHECKS_AFTER_CONFIG.into_iter().map(|name| DoctorCheck {
                        name,
                        status: CheckStatus::Fail,
                        details: details.clone(),
                    }));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(CHECKS_AFTER_CONFIG.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

async fn check_gateway_config(config: &AppConfig) -> DoctorCheck {
    let path = &config.gateway.config_path;
    match GatewayFile::load(path).await {
        Ok(file) => DoctorCheck {
            name: "gateway_config",
            status: CheckStatus::Pass,
            details: format!("gateway `{}` at {} ({})", file.gateway_id, file.gateway_url, file.region),
        },
        Err(error) if error.is_not_configured() => DoctorCheck {
            name: "gateway_config",
            status: CheckStatus::Skipped,
            details: format!("{error}; specialists will run without gateway tools"),
        },
        Err(error) => {
            DoctorCheck { name: "gateway_config", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

async fn check_prompts(config: &AppConfig) -> DoctorCheck {
    let source = match &config.agent.prompts_dir {
        Some(dir) => format!("overrides from `{}`", dir.display()),
        None => "embedded defaults".to_string(),
    };
    match PromptLibrary::load(config.agent.prompts_dir.as_deref()).await {
        Ok(_) => DoctorCheck { name: "prompts", status: CheckStatus::Pass, details: source },
        Err(error) => {
            DoctorCheck { name: "prompts", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

async fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let result = async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    }
    .await;

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
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
