//! Journey runner: drives a [`UiSession`] through a journey's steps

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uisim_core::{GridTarget, Transport, UiSession};

use crate::error::{JourneyError, JourneyResult};
use crate::spec::{label_kind, JourneySpec, JourneyStep, PageDirection};

/// Result of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of one user running one journey
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyReport {
    pub name: String,
    pub user: usize,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl JourneyReport {
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }

    /// Turn a failed report into an error naming the failing step
    pub fn into_result(self) -> JourneyResult<Self> {
        if self.success {
            return Ok(self);
        }
        let (step, reason) = match self.failed_step() {
            Some(step) => (
                step.step_name.clone(),
                step.error.clone().unwrap_or_default(),
            ),
            None => ("open".to_string(), self.error.clone().unwrap_or_default()),
        };
        Err(JourneyError::StepFailed { step, reason })
    }
}

/// Result of many users running the same journey
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub name: String,
    pub users: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub reports: Vec<JourneyReport>,
}

/// Run one step against a session
pub async fn execute_step(session: &mut UiSession, step: &JourneyStep) -> uisim_core::Result<()> {
    match step {
        JourneyStep::FillTextField {
            label,
            value,
            index,
            by_test_label,
        } => {
            if *by_test_label {
                session.fill_text_field_by_test_label(label, value, *index).await
            } else {
                session.fill_text_field(label, value, *index).await
            }
        }
        JourneyStep::FillFieldByIndex {
            component_type,
            index,
            value,
        } => session.fill_field_by_index(component_type, *index, value).await,
        JourneyStep::FillPickerField { label, value } => session.fill_picker_field(label, value).await,
        JourneyStep::FillParagraphField { label, value, index } => {
            session.fill_paragraph_field(label, value, *index).await
        }
        JourneyStep::FillExpressionEditor { expression } => {
            session.fill_expression_editor(expression).await
        }
        JourneyStep::Click {
            label,
            index,
            by_test_label,
        } => session.click(label, label_kind(*by_test_label), *index).await,
        JourneyStep::ClickCardLayout { index } => session.click_card_layout_by_index(*index).await,
        JourneyStep::ClickRecordSearchButton { index } => {
            session.click_record_search_button_by_index(*index).await
        }
        JourneyStep::RefreshAfterRecordAction { label, by_test_label } => {
            session
                .refresh_after_record_action(label, label_kind(*by_test_label))
                .await
        }
        JourneyStep::SelectDropdownItem {
            label,
            choice,
            by_test_label,
        } => {
            session
                .select_dropdown_item(label, choice, label_kind(*by_test_label))
                .await
        }
        JourneyStep::SelectDropdownItemByIndex { index, choice } => {
            session.select_dropdown_item_by_index(*index, choice).await
        }
        JourneyStep::SelectMultiDropdownItem {
            label,
            choices,
            by_test_label,
        } => {
            let choices: Vec<&str> = choices.iter().map(String::as_str).collect();
            session
                .select_multi_dropdown_item(label, &choices, label_kind(*by_test_label))
                .await
        }
        JourneyStep::CheckCheckbox {
            label,
            indices,
            by_test_label,
        } => {
            if *by_test_label {
                session.check_checkbox_by_test_label(label, indices).await
            } else {
                session.check_checkbox_by_label(label, indices).await
            }
        }
        JourneyStep::SelectRadioButton {
            label,
            index,
            by_test_label,
        } => {
            if *by_test_label {
                session.select_radio_button_by_test_label(label, *index).await
            } else {
                session.select_radio_button_by_label(label, *index).await
            }
        }
        JourneyStep::ClickTab { label, tab_group } => session.click_tab_by_label(label, tab_group).await,
        JourneyStep::SelectCardChoice { label, index } => {
            session.select_card_choice_field_by_label(label, *index).await
        }
        JourneyStep::FillDateField { label, date, index } => {
            session.fill_date_field(label, *date, *index).await
        }
        JourneyStep::FillDatetimeField {
            label,
            datetime,
            index,
        } => session.fill_datetime_field(label, *datetime, *index).await,
        JourneyStep::SelectDateRange { label, start, end } => {
            session.select_date_range_user_filter(label, *start, *end).await
        }
        JourneyStep::UploadDocuments {
            label,
            documents,
            index,
        } => {
            session
                .upload_documents_to_multiple_file_upload_field(label, documents.clone(), *index)
                .await
        }
        JourneyStep::SelectGridRows { grid, rows, append } => {
            session
                .select_rows_in_grid(GridTarget::from(grid), rows, *append)
                .await
        }
        JourneyStep::PageGrid { grid, direction } => {
            let target = GridTarget::from(grid);
            match direction {
                PageDirection::First => session.move_to_beginning_of_paging_grid(target).await,
                PageDirection::Last => session.move_to_end_of_paging_grid(target).await,
                PageDirection::Left => session.move_to_left_in_paging_grid(target).await,
                PageDirection::Right => session.move_to_right_in_paging_grid(target).await,
            }
        }
        JourneyStep::SortGrid {
            grid,
            field,
            ascending,
        } => {
            session
                .sort_paging_grid(GridTarget::from(grid), field, *ascending)
                .await
        }
        JourneyStep::ClickGridLink {
            grid,
            column,
            row,
            rich_text,
        } => {
            let target = GridTarget::from(grid);
            if *rich_text {
                session.click_grid_rich_text_link(target, column, *row).await
            } else {
                session.click_grid_plaintext_link(target, column, *row).await
            }
        }
        JourneyStep::AssertNoValidations => session.assert_no_validations_present(),
        JourneyStep::Log { message } => {
            info!("[{}] {}", session.config().breadcrumb, message);
            Ok(())
        }
    }
}

/// Run a journey's steps in order on an open session, stopping at the first failure
pub async fn run_steps(session: &mut UiSession, spec: &JourneySpec) -> Vec<StepResult> {
    let mut results = Vec::with_capacity(spec.steps.len());

    for step in &spec.steps {
        let step_name = step.describe();
        let start = Instant::now();
        let outcome = execute_step(session, step).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                debug!("{}: {} ok ({} ms)", spec.name, step_name, duration_ms);
                results.push(StepResult {
                    step_name,
                    success: true,
                    duration_ms,
                    error: None,
                });
            }
            Err(e) => {
                error!("{}: {} failed - {}", spec.name, step_name, e);
                results.push(StepResult {
                    step_name,
                    success: false,
                    duration_ms,
                    error: Some(e.to_string()),
                });
                break;
            }
        }
    }

    results
}

/// Open the journey's entry form and run every step as `user`
pub async fn run_journey(
    transport: Arc<dyn Transport>,
    spec: &JourneySpec,
    user: usize,
) -> JourneyResult<JourneyReport> {
    let start = Instant::now();
    debug!("User {} starting journey {}", user, spec.name);

    let mut session = UiSession::open(transport, &spec.entry_uri, spec.session.clone()).await?;
    let steps = run_steps(&mut session, spec).await;

    let error = steps.iter().find(|s| !s.success).and_then(|s| s.error.clone());
    Ok(JourneyReport {
        name: spec.name.clone(),
        user,
        success: error.is_none(),
        duration_ms: start.elapsed().as_millis() as u64,
        steps,
        error,
    })
}

/// Run the same journey for `users` independent users at once.
///
/// `transport_for` hands each user its own transport so that cookies and
/// server sessions are never shared.
pub async fn run_users<F>(spec: Arc<JourneySpec>, users: usize, transport_for: F) -> JourneyResult<LoadReport>
where
    F: Fn(usize) -> Arc<dyn Transport>,
{
    let start = Instant::now();
    info!("Running journey {} for {} user(s)...", spec.name, users);

    let handles: Vec<_> = (0..users)
        .map(|user| {
            let transport = transport_for(user);
            let spec = Arc::clone(&spec);
            tokio::spawn(async move {
                match run_journey(transport, &spec, user).await {
                    Ok(report) => report,
                    Err(e) => JourneyReport {
                        name: spec.name.clone(),
                        user,
                        success: false,
                        duration_ms: 0,
                        steps: vec![],
                        error: Some(e.to_string()),
                    },
                }
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(users);
    for joined in join_all(handles).await {
        reports.push(joined?);
    }
    reports.sort_by_key(|r| r.user);

    let passed = reports.iter().filter(|r| r.success).count();
    let failed = reports.len() - passed;
    let duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Journey {}: {} passed, {} failed ({} ms)",
        spec.name, passed, failed, duration_ms
    );

    Ok(LoadReport {
        name: spec.name.clone(),
        users,
        passed,
        failed,
        duration_ms,
        reports,
    })
}
