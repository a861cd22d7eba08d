//! Semantic validation turning raw configuration into typed tasks.
//!
//! Every problem in the document is collected before failing, so one run of
//! the loader reports all of them.

use super::pipeline::{PipelineConfig, RawPipelineConfig};
use super::schema::TableSchema;
use super::task::{ExtractionSpec, RawTask, SourceFormat, TaskBody, TaskConfig, TransformationSpec};
use crate::core::{ExecutionKind, OutputSet, Stage};
use crate::errors::{codes, ConfigError};
use std::collections::HashSet;
use tracing::warn;

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidationIssue {
    /// Error code from [`crate::errors::codes`].
    pub code: &'static str,
    /// Stage of the offending task.
    pub stage: Option<Stage>,
    /// Name (or position) of the offending task.
    pub task: Option<String>,
    /// What is wrong.
    pub message: String,
}

impl ValidationIssue {
    fn app(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            stage: None,
            task: None,
            message: message.into(),
        }
    }

    fn task(code: &'static str, stage: Stage, task: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            stage: Some(stage),
            task: Some(task.to_string()),
            message: message.into(),
        }
    }

    fn describe(&self) -> String {
        match (&self.stage, &self.task) {
            (Some(stage), Some(task)) => format!("{stage}.{task}: {}", self.message),
            _ => self.message.clone(),
        }
    }
}

/// Converts a list of issues into a single configuration error.
///
/// A single issue keeps its code and location; several are aggregated.
#[must_use]
pub(crate) fn issues_to_error(issues: Vec<ValidationIssue>) -> ConfigError {
    if issues.len() == 1 {
        let issue = &issues[0];
        let mut err = ConfigError::with_code(issue.code, issue.describe());
        if let Some(stage) = issue.stage {
            err = err.with_stage(stage.as_str());
        }
        if let Some(ref task) = issue.task {
            err = err.with_task(task.clone());
        }
        return err;
    }
    ConfigError::aggregate(issues.iter().map(ValidationIssue::describe).collect())
}

fn is_valid_identifier(value: &str) -> bool {
    !value.trim().is_empty()
        && !value.contains(['/', '\\'])
        && value != "."
        && value != ".."
}

/// Validates one raw task in its stage.
fn validate_task(stage: Stage, index: usize, raw: RawTask, issues: &mut Vec<ValidationIssue>) -> Option<TaskConfig> {
    let label = raw
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("#{index}"));
    let before = issues.len();

    let name = match raw.name {
        Some(ref name) if !name.trim().is_empty() => name.clone(),
        _ => {
            issues.push(ValidationIssue::task(codes::NAME, stage, &label, "task name is missing"));
            String::new()
        }
    };

    let target = match raw.target {
        Some(ref target) if is_valid_identifier(target) => target.clone(),
        Some(ref target) => {
            issues.push(ValidationIssue::task(
                codes::NAME,
                stage,
                &label,
                format!("invalid target '{target}'"),
            ));
            String::new()
        }
        None => {
            issues.push(ValidationIssue::task(codes::NAME, stage, &label, "target is missing"));
            String::new()
        }
    };

    let kind = match raw.kind.as_deref() {
        None => ExecutionKind::Batch,
        Some(token) => ExecutionKind::parse(token).unwrap_or_else(|| {
            issues.push(ValidationIssue::task(
                codes::EXECUTION_KIND,
                stage,
                &label,
                format!("invalid execution type '{token}'"),
            ));
            ExecutionKind::Batch
        }),
    };

    let tokens = raw.output.clone().map(super::task::OneOrMany::into_vec).unwrap_or_default();
    let (outputs, ignored) = OutputSet::from_tokens(&tokens);
    if !ignored.is_empty() {
        warn!(stage = %stage, task = %label, ?ignored, "Ignoring unrecognized output kinds");
    }
    if outputs.is_empty() {
        issues.push(ValidationIssue::task(
            codes::OUTPUT,
            stage,
            &label,
            format!("no recognized output kind in {tokens:?}"),
        ));
    }

    let body = match (raw.has_extraction_fields(), raw.has_transformation_fields()) {
        (true, true) => {
            issues.push(ValidationIssue::task(
                codes::TASK_BODY,
                stage,
                &label,
                "declares both extraction fields and sql",
            ));
            None
        }
        (false, false) => {
            issues.push(ValidationIssue::task(
                codes::TASK_BODY,
                stage,
                &label,
                "declares neither extraction fields nor sql",
            ));
            None
        }
        (true, false) => validate_extraction(stage, &label, &raw, issues).map(TaskBody::Extraction),
        (false, true) => validate_transformation(stage, &label, raw.sql, issues).map(TaskBody::Transformation),
    };

    if let Some(ref body) = body {
        let expects_extraction = stage == Stage::Staging;
        if body.is_extraction() != expects_extraction {
            let expected = if expects_extraction { "an extraction" } else { "a sql transformation" };
            issues.push(ValidationIssue::task(
                codes::STAGE_BODY,
                stage,
                &label,
                format!("{stage} tasks must be {expected}"),
            ));
        }
    }

    if issues.len() > before {
        return None;
    }
    body.map(|body| TaskConfig {
        name,
        kind,
        outputs,
        target,
        body,
    })
}

fn validate_extraction(
    stage: Stage,
    label: &str,
    raw: &RawTask,
    issues: &mut Vec<ValidationIssue>,
) -> Option<ExtractionSpec> {
    let format = match raw.format.as_deref() {
        Some(token) => SourceFormat::parse(token).or_else(|| {
            issues.push(ValidationIssue::task(
                codes::TASK_BODY,
                stage,
                label,
                format!("unsupported source format '{token}'"),
            ));
            None
        }),
        None => {
            issues.push(ValidationIssue::task(codes::TASK_BODY, stage, label, "format is missing"));
            None
        }
    };

    let location = match raw.location {
        Some(ref location) if !location.trim().is_empty() => Some(location.clone()),
        _ => {
            issues.push(ValidationIssue::task(codes::TASK_BODY, stage, label, "location is missing"));
            None
        }
    };

    let schema = match raw.schema {
        Some(ref value) => TableSchema::from_json_value(value)
            .map_err(|message| {
                issues.push(ValidationIssue::task(codes::SCHEMA, stage, label, message));
            })
            .ok(),
        None => {
            issues.push(ValidationIssue::task(codes::SCHEMA, stage, label, "schema is missing"));
            None
        }
    };

    Some(ExtractionSpec {
        format: format?,
        location: location?,
        schema: schema?,
    })
}

fn validate_transformation(
    stage: Stage,
    label: &str,
    sql: Option<super::task::OneOrMany>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<TransformationSpec> {
    let statements = sql.map(super::task::OneOrMany::into_vec).unwrap_or_default();
    if statements.iter().all(|statement| statement.trim().is_empty()) {
        issues.push(ValidationIssue::task(codes::TASK_BODY, stage, label, "sql is empty"));
        return None;
    }
    Some(TransformationSpec { statements })
}

fn validate_stage(
    stage: Stage,
    raw: Option<Vec<RawTask>>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Vec<TaskConfig>> {
    let raw = raw?;
    let mut names = HashSet::new();
    let mut tasks = Vec::with_capacity(raw.len());
    for (index, raw_task) in raw.into_iter().enumerate() {
        if let Some(ref name) = raw_task.name {
            if !name.trim().is_empty() && !names.insert(name.clone()) {
                issues.push(ValidationIssue::task(
                    codes::NAME,
                    stage,
                    name,
                    "duplicate task name in stage",
                ));
            }
        }
        if let Some(task) = validate_task(stage, index, raw_task, issues) {
            tasks.push(task);
        }
    }
    Some(tasks)
}

/// Validates a raw configuration document.
///
/// # Errors
///
/// Returns a [`ConfigError`] describing every problem found.
pub(crate) fn validate_config(raw: RawPipelineConfig) -> Result<PipelineConfig, ConfigError> {
    let mut issues = Vec::new();

    let name = match raw.name {
        Some(ref name) if is_valid_identifier(name) => name.clone(),
        Some(ref name) => {
            issues.push(ValidationIssue::app(
                codes::NAME,
                format!("invalid application name '{name}'"),
            ));
            String::new()
        }
        None => {
            issues.push(ValidationIssue::app(codes::NAME, "application name is missing"));
            String::new()
        }
    };

    let staging = validate_stage(Stage::Staging, raw.staging, &mut issues);
    let standard = validate_stage(Stage::Standard, raw.standard, &mut issues);
    let serving = validate_stage(Stage::Serving, raw.serving, &mut issues);

    if !issues.is_empty() {
        return Err(issues_to_error(issues));
    }

    Ok(PipelineConfig {
        name,
        staging,
        standard,
        serving,
    })
}
