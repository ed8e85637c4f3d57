//! Admits trigger requests and starts runs in the background.

use std::path::{Component, Path};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::WorkflowConfig;
use crate::task::{TaskStore, WorkflowParameters};

use super::runner::WorkflowRunner;
use super::types::{DispatchError, TriggerReceipt, ValidationError};

/// Validates trigger parameters, creates the task and spawns its run.
pub struct Dispatcher {
    runner: Arc<WorkflowRunner>,
    defaults: WorkflowParameters,
}

impl Dispatcher {
    pub fn new(runner: Arc<WorkflowRunner>, config: &WorkflowConfig) -> Self {
        Self {
            runner,
            defaults: WorkflowParameters {
                page_numbers: config.default_page_numbers.clone(),
                download_folder: config.default_download_folder.clone(),
                save_results: true,
            },
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        self.runner.store()
    }

    pub fn runner(&self) -> &Arc<WorkflowRunner> {
        &self.runner
    }

    /// Parameters used for fields the request leaves out.
    pub fn defaults(&self) -> &WorkflowParameters {
        &self.defaults
    }

    /// Validate `raw` and start exactly one background run for it.
    ///
    /// Returns as soon as the task exists; the run's progress is only
    /// observable through the store. Must be called within a Tokio runtime.
    pub fn trigger(&self, raw: &Value) -> Result<TriggerReceipt, DispatchError> {
        let parameters = self.validate(raw)?;
        let task = self.store().create(parameters)?;

        info!(
            task_id = %task.id,
            pages = ?task.parameters.page_numbers,
            "Workflow triggered"
        );

        let runner = Arc::clone(&self.runner);
        let task_id = task.id.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(&task_id).await {
                error!(task_id = %task_id, error = %e, "Workflow run could not complete");
            }
        });

        Ok(TriggerReceipt::from(&task))
    }

    /// Turn a raw request body into parameters, filling in defaults.
    ///
    /// `null` (an empty body) means "all defaults".
    pub fn validate(&self, raw: &Value) -> Result<WorkflowParameters, ValidationError> {
        let empty = Map::new();
        let fields = match raw {
            Value::Null => &empty,
            Value::Object(fields) => fields,
            _ => return Err(ValidationError::new("Request body must be a JSON object")),
        };

        let page_numbers = match fields.get("page_numbers") {
            None | Some(Value::Null) => self.defaults.page_numbers.clone(),
            Some(value) => parse_page_numbers(value)?,
        };

        let download_folder = match fields.get("download_folder") {
            None | Some(Value::Null) => self.defaults.download_folder.clone(),
            Some(Value::String(folder)) => parse_download_folder(folder)?,
            Some(_) => return Err(ValidationError::new("download_folder must be a string")),
        };

        let save_results = match fields.get("save_results") {
            None | Some(Value::Null) => self.defaults.save_results,
            Some(Value::Bool(save)) => *save,
            Some(_) => return Err(ValidationError::new("save_results must be a boolean")),
        };

        Ok(WorkflowParameters {
            page_numbers,
            download_folder,
            save_results,
        })
    }
}

fn parse_page_numbers(value: &Value) -> Result<Vec<u32>, ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::new("page_numbers must be a list of integers"))?;

    items
        .iter()
        .map(|item| {
            if let Some(n) = item.as_u64() {
                match u32::try_from(n) {
                    Ok(0) => Err(ValidationError::new(
                        "page_numbers must contain only positive integers",
                    )),
                    Ok(n) => Ok(n),
                    Err(_) => Err(ValidationError::new(format!(
                        "page number {} is out of range",
                        n
                    ))),
                }
            } else if item.as_i64().is_some() {
                Err(ValidationError::new(
                    "page_numbers must contain only positive integers",
                ))
            } else {
                Err(ValidationError::new("page_numbers must be a list of integers"))
            }
        })
        .collect()
}

fn parse_download_folder(folder: &str) -> Result<String, ValidationError> {
    let trimmed = folder.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("download_folder cannot be empty"));
    }

    let path = Path::new(trimmed);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ValidationError::new(
            "download_folder must be a relative path without '..'",
        ));
    }

    Ok(trimmed.to_string())
}
