//! UI session
//!
//! A [`UiSession`] owns one form's snapshot together with the server-issued
//! context and uuid. Every verb locates its target in the snapshot, builds a
//! save request, posts it through the [`Transport`] and reconciles the reply.
//!
//! A session belongs to one simulated user. Run one per user; never share one
//! between tasks.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::builder::SaveRequestBuilder;
use crate::cache::{DatatypeCache, DATATYPE_HEADER};
use crate::component::{Component, ComponentKind};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::grid::{self, GridController, GridOp};
use crate::reconciler::reconcile;
use crate::search::{
    count_matches, extract_all_by_label, find_component, try_find_component, ComponentQuery,
};
use crate::transport::{Transport, UiRequest};
use crate::value::{TypedValue, UploadedDocument};

const KEY_CONTEXT: &str = "context";
const KEY_UUID: &str = "uuid";
const RECORD_ACTION_TRIGGER: &str = "sail:record-action-trigger";

/// Which attribute a label refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelKind {
    #[default]
    Label,
    TestLabel,
}

impl LabelKind {
    pub fn attribute(self) -> &'static str {
        match self {
            LabelKind::Label => "label",
            LabelKind::TestLabel => "testLabel",
        }
    }
}

/// How to pick a grid on the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridTarget {
    Label(String),
    /// 0-based, over every grid in document order
    Index(usize),
}

impl From<&str> for GridTarget {
    fn from(label: &str) -> Self {
        GridTarget::Label(label.to_string())
    }
}

impl From<usize> for GridTarget {
    fn from(index: usize) -> Self {
        GridTarget::Index(index)
    }
}

/// One user's view of a server-rendered form
pub struct UiSession {
    transport: Arc<dyn Transport>,
    state: Value,
    form_url: String,
    context: Option<Value>,
    uuid: Option<String>,
    identifier: Option<Value>,
    datatypes: DatatypeCache,
    grids: GridController,
    config: SessionConfig,
}

impl std::fmt::Debug for UiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiSession")
            .field("breadcrumb", &self.config.breadcrumb)
            .field("form_url", &self.form_url)
            .field("uuid", &self.uuid)
            .finish()
    }
}

impl UiSession {
    /// Start a session from a form already fetched
    pub fn new(transport: Arc<dyn Transport>, state: Value, config: SessionConfig) -> Self {
        let mut session = Self {
            transport,
            state: Value::Null,
            form_url: String::new(),
            context: None,
            uuid: None,
            identifier: None,
            datatypes: DatatypeCache::new(),
            grids: GridController::new(config.clamp_last_page),
            config,
        };
        session.adopt_state(state);
        session
    }

    /// Fetch the form at `uri` and start a session on it
    pub async fn open(transport: Arc<dyn Transport>, uri: &str, config: SessionConfig) -> Result<Self> {
        let label = format!("{}.Open", config.breadcrumb);
        let state = transport.get(uri, &label).await?;
        let mut session = Self::new(transport, state, config);
        if session.form_url.is_empty() {
            session.form_url = uri.to_string();
        }
        info!("Opened form {} for {}", uri, session.config.breadcrumb);
        Ok(session)
    }

    /// Share a datatype cache with other sessions
    pub fn with_datatype_cache(mut self, cache: DatatypeCache) -> Self {
        cache.cache(&self.state);
        self.datatypes = cache;
        self
    }

    /// Scope dropdown updates to a record-list instance
    pub fn with_record_list_identifier(mut self, identifier: Option<Value>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Owned copy of the current snapshot
    pub fn latest_state(&self) -> Value {
        self.state.clone()
    }

    pub fn form_url(&self) -> &str {
        &self.form_url
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn datatype_cache(&self) -> &DatatypeCache {
        &self.datatypes
    }

    // ---- text fields ----

    /// Fill the index'th field whose `label` matches
    pub async fn fill_text_field(&mut self, label: &str, value: &str, index: i64) -> Result<()> {
        self.fill_field_by_attribute(LabelKind::Label.attribute(), label, value, index)
            .await
    }

    pub async fn fill_text_field_by_test_label(&mut self, test_label: &str, value: &str, index: i64) -> Result<()> {
        self.fill_field_by_attribute(LabelKind::TestLabel.attribute(), test_label, value, index)
            .await
    }

    /// Fill the index'th field whose `attribute` equals `attribute_value`
    pub async fn fill_field_by_attribute(
        &mut self,
        attribute: &str,
        attribute_value: &str,
        value: &str,
        index: i64,
    ) -> Result<()> {
        let component = self.locate(
            &ComponentQuery::new()
                .with_attribute(attribute, attribute_value)
                .at_index(index),
        )?;
        let label = self.label("FillTextFieldByAttribute", &format!("{}.{}", attribute, attribute_value));
        self.save(&component, TypedValue::Text(value.to_string()).to_json(), label)
            .await
    }

    /// Fill the index'th component of `component_type`
    pub async fn fill_field_by_index(&mut self, component_type: &str, index: i64, value: &str) -> Result<()> {
        let component = self.locate(&ComponentQuery::new().of_type(component_type).at_index(index))?;
        let label = self.label("FillTextFieldByIndex", &format!("{}.{}", component_type, index));
        self.save(&component, TypedValue::Text(value.to_string()).to_json(), label)
            .await
    }

    /// Type into a picker, then select one of its suggestions at random
    pub async fn fill_picker_field(&mut self, label: &str, value: &str) -> Result<()> {
        let test_label = format!("test-{}", label);
        let query = ComponentQuery::new()
            .of_type("PickerWidget")
            .with_attribute("testLabel", &test_label);

        let picker = self.locate(&query)?;
        let request_label = self.label("FillPickerField", label);
        self.save(&picker, TypedValue::PickerText(value.to_string()).to_json(), request_label)
            .await?;

        let picker = self.locate(&query)?;
        let selection = choose_picker_suggestion(&picker, value)?;
        let request_label = self.label("SelectPickerSuggestion", label);
        self.save(&picker, TypedValue::PickerSelection(vec![selection]).to_json(), request_label)
            .await
    }

    pub async fn fill_paragraph_field(&mut self, label: &str, value: &str, index: i64) -> Result<()> {
        self.fill_text_field(label, value, index).await
    }

    /// Replace the contents of the form's expression editor
    pub async fn fill_expression_editor(&mut self, expression: &str) -> Result<()> {
        let editor = self.locate(&ComponentQuery::new().with_attribute("testLabel", "expression-editor"))?;
        let label = self.label("ExpressionEditor", "update");
        self.save(&editor, TypedValue::Expression(expression.to_string()).to_json(), label)
            .await
    }

    // ---- clicks ----

    /// Click the index'th button or link with this label
    pub async fn click(&mut self, label: &str, kind: LabelKind, index: i64) -> Result<()> {
        let component = self.locate(
            &ComponentQuery::new()
                .with_attribute(kind.attribute(), label)
                .at_index(index),
        )?;
        let request_label = self.label("Click", label);
        self.dispatch_click(component, request_label).await
    }

    pub async fn click_button(&mut self, label: &str, index: i64) -> Result<()> {
        self.click(label, LabelKind::Label, index).await
    }

    pub async fn click_link(&mut self, label: &str, index: i64) -> Result<()> {
        self.click(label, LabelKind::Label, index).await
    }

    /// Click the link held by the index'th card layout
    pub async fn click_card_layout_by_index(&mut self, index: i64) -> Result<()> {
        let card = self.locate(&ComponentQuery::new().of_type("CardLayout").at_index(index))?;
        let link = card
            .get("link")
            .filter(|l| l.is_object())
            .cloned()
            .ok_or_else(|| {
                Error::InvalidComponent(format!(
                    "CardLayout found at index: {} does not have a link on it",
                    index
                ))
            })?;
        let request_label = self.label("ClickCardLayout.Index", &index.to_string());
        self.dispatch_click(link, request_label).await
    }

    /// Press the search button of the index'th record search box
    pub async fn click_record_search_button_by_index(&mut self, index: i64) -> Result<()> {
        let search_box = self.locate(&ComponentQuery::new().of_type("SearchBoxWidget").at_index(index))?;
        let cid = Component::new(&search_box)?.cid().unwrap_or_default().to_string();

        let action = match try_find_component(
            &search_box,
            &ComponentQuery::new().with_attribute("_actionName", "onSearch"),
        )? {
            Some(action) => action,
            None => try_find_component(
                &search_box,
                &ComponentQuery::new().with_attribute("testLabel", "Applications-searchLink"),
            )?
            .ok_or_else(|| {
                Error::ComponentNotFound(
                    "Could not find component by either _actionName onSearch or testLabel Applications-searchLink in the provided component"
                        .to_string(),
                )
            })?,
        };
        let save_into = action.get("saveInto").cloned().unwrap_or(Value::Null);

        let button = json!({
            "_cId": format!("{}_buttonWidget", cid),
            "value": null,
            "saveInto": save_into,
            "saveType": "PRIMARY",
            "#t": "ButtonWidget",
        });
        let label = self.label("ClickRecordSearchButtonByIndex", &index.to_string());
        let payload = self.request_for(&button).build()?;
        self.post(payload, label, &[]).await
    }

    /// Re-submit a finished record action together with the form's record-action trigger
    pub async fn refresh_after_record_action(&mut self, label: &str, kind: LabelKind) -> Result<()> {
        let mut action = self.locate(&ComponentQuery::new().with_attribute(kind.attribute(), label))?;
        if kind == LabelKind::TestLabel {
            // the test label sits one level above the action itself
            action = action.get("recordAction").cloned().ok_or_else(|| {
                Error::InvalidComponent(format!(
                    "component with testLabel '{}' has no recordAction",
                    label
                ))
            })?;
        }
        let trigger = self.locate(&ComponentQuery::new().with_attribute("_actionName", RECORD_ACTION_TRIGGER))?;

        let payload = SaveRequestBuilder::build_many(&[
            self.request_for(&action).value(json!({})),
            self.request_for(&trigger).value(json!({})),
        ])?;
        let request_label = self.label("RefreshAfterRecordAction", label);
        self.post(payload, request_label, &[]).await
    }

    // ---- choices ----

    /// Declared choices of the dropdown with this label
    pub fn get_dropdown_items(&self, label: &str, kind: LabelKind) -> Result<Vec<String>> {
        let component = find_component(
            &self.state,
            &ComponentQuery::new().with_attribute(kind.attribute(), label),
        )?;
        Component::new(component)?
            .choices()
            .map(|choices| choices.into_iter().map(str::to_string).collect())
            .ok_or_else(|| {
                Error::InvalidComponent(format!(
                    "No choices found for component {}, is the component a Dropdown?",
                    label
                ))
            })
    }

    pub async fn select_dropdown_item(&mut self, label: &str, choice: &str, kind: LabelKind) -> Result<()> {
        let dropdown = self.locate(&ComponentQuery::new().with_attribute(kind.attribute(), label))?;
        let request_label = self.label("Dropdown.SelectByLabel", label);
        self.send_dropdown(&dropdown, choice, request_label).await
    }

    /// Select in the index'th dropdown on the form
    pub async fn select_dropdown_item_by_index(&mut self, index: i64, choice: &str) -> Result<()> {
        let dropdown = self.locate(&ComponentQuery::new().of_type("DropdownField").at_index(index))?;
        let request_label = self.label("Dropdown.SelectByIndex", &index.to_string());
        self.send_dropdown(&dropdown, choice, request_label).await
    }

    pub async fn select_multi_dropdown_item(&mut self, label: &str, choices: &[&str], kind: LabelKind) -> Result<()> {
        let dropdown = self.locate(&ComponentQuery::new().with_attribute(kind.attribute(), label))?;
        let request_label = self.label("MultipleDropdown.SelectByLabel", label);
        self.send_multi_dropdown(&dropdown, choices, request_label).await
    }

    pub async fn select_multi_dropdown_item_by_index(&mut self, index: i64, choices: &[&str]) -> Result<()> {
        let dropdown = self.locate(
            &ComponentQuery::new()
                .of_type("MultipleDropdownField")
                .at_index(index),
        )?;
        let request_label = self.label("MultipleDropdown.SelectByIndex", &index.to_string());
        self.send_multi_dropdown(&dropdown, choices, request_label).await
    }

    /// Check the boxes at the given 1-based positions; an empty list clears them
    pub async fn check_checkbox_by_label(&mut self, label: &str, indices: &[i64]) -> Result<()> {
        self.check_checkbox(LabelKind::Label, label, indices).await
    }

    pub async fn check_checkbox_by_test_label(&mut self, test_label: &str, indices: &[i64]) -> Result<()> {
        self.check_checkbox(LabelKind::TestLabel, test_label, indices).await
    }

    async fn check_checkbox(&mut self, kind: LabelKind, label: &str, indices: &[i64]) -> Result<()> {
        if label.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "No {} provided to select a checkbox",
                kind.attribute()
            )));
        }
        let checkbox = self.locate(&ComponentQuery::new().with_attribute(kind.attribute(), label))?;
        let request_label = self.label("CheckCheckboxByAttribute", kind.attribute());
        self.save(&checkbox, TypedValue::IntegerList(indices.to_vec()).to_json(), request_label)
            .await
    }

    /// Select the 1-based `index`'th button of a radio group
    pub async fn select_radio_button_by_label(&mut self, label: &str, index: i64) -> Result<()> {
        let radio = self.locate(&ComponentQuery::new().with_attribute("label", label))?;
        let request_label = self.label("RadioButton.SelectByLabel", label);
        self.save(&radio, TypedValue::Integer(index).to_json(), request_label).await
    }

    pub async fn select_radio_button_by_test_label(&mut self, test_label: &str, index: i64) -> Result<()> {
        let radio = self.locate(&ComponentQuery::new().with_attribute("testLabel", test_label))?;
        let request_label = self.label("RadioButton.SelectByTestLabel", test_label);
        self.save(&radio, TypedValue::Integer(index).to_json(), request_label).await
    }

    /// Select a button of the `field_index`'th radio group on the form
    pub async fn select_radio_button_by_index(&mut self, field_index: i64, index: i64) -> Result<()> {
        let radio = self.locate(
            &ComponentQuery::new()
                .of_type("RadioButtonField")
                .at_index(field_index),
        )?;
        let request_label = self.label("RadioButton.SelectByIndex", &index.to_string());
        self.save(&radio, TypedValue::Integer(index).to_json(), request_label).await
    }

    /// Select the tab labelled `tab_label` inside a tab group
    pub async fn click_tab_by_label(&mut self, tab_label: &str, tab_group_test_label: &str) -> Result<()> {
        let group = self.locate(&ComponentQuery::new().with_attribute("testLabel", tab_group_test_label))?;
        let tabs = group
            .get("tabs")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let position = tabs
            .iter()
            .position(|tab| {
                matches!(
                    try_find_component(tab, &ComponentQuery::new().with_attribute("label", tab_label)),
                    Ok(Some(_))
                )
            })
            .ok_or_else(|| {
                Error::ComponentNotFound(format!(
                    "Cannot click a tab with label: '{}' inside the TabButtonGroup component",
                    tab_label
                ))
            })?;
        let request_label = self.label("ClickTab", tab_label);
        self.save(&group, TypedValue::Integer(position as i64 + 1).to_json(), request_label)
            .await
    }

    /// Pick the index'th (1-based) card of a card choice field
    pub async fn select_card_choice_field_by_label(&mut self, label: &str, index: i64) -> Result<()> {
        let test_label = format!("cardChoiceField-{}", label);
        let field = self.locate(&ComponentQuery::new().with_attribute("testLabel", &test_label))?;
        let identifier = usize::try_from(index - 1)
            .ok()
            .and_then(|i| field.get("identifiers")?.get(i))
            .cloned()
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "card choice field '{}' has no card at index {}",
                    label, index
                ))
            })?;
        let request_label = self.label("CardChoice.SelectByLabel", label);
        self.save(&field, TypedValue::VariantList(vec![identifier]).to_json(), request_label)
            .await
    }

    // ---- dates ----

    pub async fn fill_date_field(&mut self, label: &str, date: NaiveDate, index: i64) -> Result<()> {
        let field = self.locate(
            &ComponentQuery::new()
                .of_type("DatePickerField")
                .with_attribute("label", label)
                .at_index(index),
        )?;
        let request_label = self.label("FillDateField", label);
        self.save(&field, TypedValue::Date(date).to_json(), request_label).await
    }

    pub async fn fill_datetime_field(&mut self, label: &str, datetime: NaiveDateTime, index: i64) -> Result<()> {
        let field = self.locate(
            &ComponentQuery::new()
                .of_type("DateTimePickerField")
                .with_attribute("label", label)
                .at_index(index),
        )?;
        let request_label = self.label("FillDateTimeField", label);
        self.save(&field, TypedValue::DateTime(datetime).to_json(), request_label)
            .await
    }

    /// Apply a start/end date user filter, located by test label
    pub async fn select_date_range_user_filter(
        &mut self,
        filter_label: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<()> {
        let value = TypedValue::date_range(start, end)?;
        let filter = self.locate(&ComponentQuery::new().with_attribute("testLabel", filter_label))?;
        let request_label = self.label("SelectDateUserFilter", filter_label);
        self.save(&filter, value.to_json(), request_label).await
    }

    // ---- uploads ----

    /// Attach an already uploaded document to a file upload field
    pub async fn upload_document_to_upload_field(
        &mut self,
        label: &str,
        document: UploadedDocument,
        index: i64,
    ) -> Result<()> {
        let field = self.locate_upload_field(label, index, "FileUploadWidget")?;
        match Component::new(&field)?.kind() {
            ComponentKind::FileUploadWidget => {
                let request_label = self.label("FileUpload", label);
                self.upload(&field, TypedValue::Document(document), request_label).await
            }
            ComponentKind::MultipleFileUploadWidget => {
                debug!("Upload field '{}' takes multiple files, sending a list", label);
                let request_label = self.label("MultiFileUpload", label);
                self.upload(&field, TypedValue::Documents(vec![document]), request_label)
                    .await
            }
            other => Err(Error::InvalidComponent(format!(
                "Provided component was not a FileUploadWidget, was instead of type '{}'",
                other
            ))),
        }
    }

    /// Attach already uploaded documents to a multiple file upload field
    pub async fn upload_documents_to_multiple_file_upload_field(
        &mut self,
        label: &str,
        documents: Vec<UploadedDocument>,
        index: i64,
    ) -> Result<()> {
        let field = self.locate_upload_field(label, index, "MultipleFileUploadWidget")?;
        match Component::new(&field)?.kind() {
            ComponentKind::MultipleFileUploadWidget => {
                let request_label = self.label("MultiFileUpload", label);
                self.upload(&field, TypedValue::Documents(documents), request_label).await
            }
            ComponentKind::FileUploadWidget => {
                debug!("Upload field '{}' takes a single file, sending the first", label);
                let document = documents.into_iter().next().ok_or_else(|| {
                    Error::InvalidArgument(format!("no documents given for field '{}'", label))
                })?;
                let request_label = self.label("FileUpload", label);
                self.upload(&field, TypedValue::Document(document), request_label).await
            }
            other => Err(Error::InvalidComponent(format!(
                "Provided component was not a MultipleFileUploadWidget, was instead of type '{}'",
                other
            ))),
        }
    }

    fn locate_upload_field(&self, label: &str, index: i64, widget_type: &str) -> Result<Value> {
        let typed = try_find_component(
            &self.state,
            &ComponentQuery::new()
                .of_type(widget_type)
                .with_attribute("label", label)
                .at_index(index),
        )?;
        let field = match typed {
            Some(field) => field.clone(),
            None => self.locate(&ComponentQuery::new().with_attribute("label", label))?,
        };
        // labelled wrappers hold the widget in `contents`
        if field.get("#t").and_then(Value::as_str) != Some(widget_type) {
            if let Some(inner) = field.get("contents").filter(|c| c.is_object()) {
                return Ok(inner.clone());
            }
        }
        Ok(field)
    }

    async fn upload(&mut self, field: &Value, value: TypedValue, label: String) -> Result<()> {
        let payload = self.request_for(field).value(value.to_json()).build()?;
        self.post(payload, label, &[("X-Client-Mode", "DESIGN")]).await
    }

    // ---- grids ----

    pub async fn select_rows_in_grid(&mut self, target: GridTarget, rows: &[usize], append: bool) -> Result<()> {
        self.update_grid(
            target,
            GridOp::SelectRows {
                rows: rows.to_vec(),
                append,
            },
            "SelectRows",
        )
        .await
    }

    pub async fn move_to_beginning_of_paging_grid(&mut self, target: GridTarget) -> Result<()> {
        self.update_grid(target, GridOp::FirstPage, "MoveToBeginning").await
    }

    pub async fn move_to_end_of_paging_grid(&mut self, target: GridTarget) -> Result<()> {
        self.update_grid(target, GridOp::LastPage, "MoveToEnd").await
    }

    pub async fn move_to_left_in_paging_grid(&mut self, target: GridTarget) -> Result<()> {
        self.update_grid(target, GridOp::PageLeft, "MoveLeft").await
    }

    pub async fn move_to_right_in_paging_grid(&mut self, target: GridTarget) -> Result<()> {
        self.update_grid(target, GridOp::PageRight, "MoveRight").await
    }

    /// Sort by a field name, or by part of a column label
    pub async fn sort_paging_grid(&mut self, target: GridTarget, field: &str, ascending: bool) -> Result<()> {
        if field.is_empty() {
            return Err(Error::InvalidArgument(
                "Field to sort cannot be blank when sorting a grid".to_string(),
            ));
        }
        let op = GridOp::Sort {
            field: field.to_string(),
            ascending,
        };
        self.update_grid(target, op, "Sort").await
    }

    /// Click the link in a plaintext grid column
    pub async fn click_grid_plaintext_link(&mut self, target: GridTarget, column: &str, row: usize) -> Result<()> {
        let grid = self.find_grid(&target)?;
        let link = grid::plaintext_link(&grid, column, row).cloned();
        self.click_grid_link(&grid, link, column, row).await
    }

    /// Click the first link inside a rich-text grid cell
    pub async fn click_grid_rich_text_link(&mut self, target: GridTarget, column: &str, row: usize) -> Result<()> {
        let grid = self.find_grid(&target)?;
        let link = grid::rich_text_link(&grid, column, row).cloned();
        self.click_grid_link(&grid, link, column, row).await
    }

    async fn click_grid_link(&mut self, grid: &Value, link: Option<Value>, column: &str, row: usize) -> Result<()> {
        let grid_label = Component::new(grid)?.display_label();
        let link = link.ok_or_else(|| {
            Error::ComponentNotFound(format!(
                "Column with name {} not found in grid with identifier {}",
                column, grid_label
            ))
        })?;
        let request_label = self.label("Grid.Click", &format!("{}.{}.{}", grid_label, column, row));
        self.dispatch_click(link, request_label).await
    }

    fn find_grid(&self, target: &GridTarget) -> Result<Value> {
        let grid = match target {
            GridTarget::Label(label) => grid::find_grid_by_label(&self.state, label)?,
            GridTarget::Index(index) => grid::find_grid_by_index(&self.state, *index)?,
        };
        Ok(grid.clone())
    }

    async fn update_grid(&mut self, target: GridTarget, op: GridOp, verb: &str) -> Result<()> {
        let grid = self.find_grid(&target)?;
        let grid_label = Component::new(&grid)?.display_label();
        let save_value = self.grids.apply(&grid, &op)?;
        let request_label = self.label(&format!("Grid.{}", verb), &grid_label);
        self.save(&grid, save_value, request_label).await
    }

    // ---- checks ----

    /// Fail if any component of the form currently shows a validation message
    pub fn assert_no_validations_present(&self) -> Result<()> {
        let found: Vec<&Value> = extract_all_by_label(&self.state, "validations")
            .into_iter()
            .filter(|v| !is_empty_validation(v))
            .collect();
        if found.is_empty() {
            return Ok(());
        }
        for validation in &found {
            error!(
                "Validations were found in the form {}, validation: {}",
                self.config.breadcrumb, validation
            );
        }
        Err(Error::ServerValidation {
            form: self.config.breadcrumb.clone(),
            validations: Value::Array(found.into_iter().cloned().collect()).to_string(),
        })
    }

    // ---- plumbing ----

    fn label(&self, verb: &str, target: &str) -> String {
        self.config.request_label(verb, target)
    }

    fn locate(&self, query: &ComponentQuery<'_>) -> Result<Value> {
        let found = find_component(&self.state, query)?;
        if self.config.warn_on_ambiguous {
            let matches = count_matches(&self.state, query);
            if matches > 1 {
                warn!(
                    "{} components matched a lookup on form {}, using match {}",
                    matches,
                    self.config.breadcrumb,
                    query.index()
                );
            }
        }
        Ok(found.clone())
    }

    fn request_for(&self, component: &Value) -> SaveRequestBuilder {
        let mut builder = SaveRequestBuilder::new().component(component);
        if let Some(context) = &self.context {
            builder = builder.context(context);
        }
        if let Some(uuid) = &self.uuid {
            builder = builder.uuid(uuid.clone());
        }
        builder
    }

    async fn send_dropdown(&mut self, dropdown: &Value, choice: &str, label: String) -> Result<()> {
        let index = Component::new(dropdown)?.choice_index(choice)?;
        let payload = self
            .request_for(dropdown)
            .value(TypedValue::Integer(index).to_json())
            .identifier(self.identifier.clone())
            .build()?;
        self.post(payload, label, &[]).await
    }

    async fn send_multi_dropdown(&mut self, dropdown: &Value, choices: &[&str], label: String) -> Result<()> {
        let component = Component::new(dropdown)?;
        let indices = choices
            .iter()
            .map(|choice| component.choice_index(choice))
            .collect::<Result<Vec<_>>>()?;
        let payload = self
            .request_for(dropdown)
            .value(json!({"#t": "Integer?list", "#v": indices}))
            .identifier(self.identifier.clone())
            .build()?;
        self.post(payload, label, &[]).await
    }

    async fn dispatch_click(&mut self, component: Value, label: String) -> Result<()> {
        let mut target = component;
        if let Some(link) = target.get("link").filter(|l| l.is_object()).cloned() {
            // the wrapper's label names the link
            let wrapper_label = target.get("label").cloned();
            target = link;
            if let (Some(wrapper_label), Value::Object(map)) = (wrapper_label, &mut target) {
                map.insert("label".to_string(), wrapper_label);
            }
        }

        let kind = Component::new(&target)?.kind();
        if kind.is_navigation_link() {
            return Err(Error::InvalidComponent(format!(
                "{} opens a new form through site navigation and cannot be clicked in place",
                kind
            )));
        }
        let payload = self.request_for(&target).build()?;
        self.post(payload, label, &[]).await
    }

    async fn save(&mut self, component: &Value, value: Value, label: String) -> Result<()> {
        let payload = self.request_for(component).value(value).build()?;
        self.post(payload, label, &[]).await
    }

    async fn post(&mut self, payload: Value, label: String, headers: &[(&str, &str)]) -> Result<()> {
        let mut request = UiRequest::new(self.form_url.clone(), payload, label);
        if !self.datatypes.is_empty() {
            request = request.header(DATATYPE_HEADER, self.datatypes.header_value());
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        debug!("POST {} ({})", request.uri, request.label);
        let response = self.transport.post(request).await?;
        self.adopt_state(response);
        Ok(())
    }

    fn adopt_state(&mut self, response: Value) {
        self.datatypes.cache(&response);
        let previous = std::mem::take(&mut self.state);
        self.state = reconcile(previous, response);

        if let Some(url) = update_url(&self.state) {
            self.form_url = url;
        }
        if let Some(uuid) = self.state.get(KEY_UUID).and_then(Value::as_str).filter(|u| !u.is_empty()) {
            self.uuid = Some(uuid.to_string());
        }
        if let Some(context) = self.state.get(KEY_CONTEXT).filter(|c| is_present(c)) {
            self.context = Some(context.clone());
        }
    }
}

/// Path of the `rel == "update"` entry in the snapshot's `links`
pub fn update_url(state: &Value) -> Option<String> {
    let href = state
        .get("links")?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some("update"))?
        .get("href")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match Url::parse(href) {
        Ok(url) => Some(url.path().to_string()),
        Err(_) => Url::parse("http://localhost/")
            .and_then(|base| base.join(href))
            .map(|url| url.path().to_string())
            .ok(),
    }
}

fn choose_picker_suggestion(picker: &Value, typed: &str) -> Result<Value> {
    let suggestions = extract_all_by_label(picker, "suggestions");
    if suggestions.iter().all(|s| !is_present(s)) {
        return Err(Error::ComponentNotFound(format!(
            "No suggestions returned when '{}' was entered in the picker field.",
            typed
        )));
    }
    let identifiers: Vec<&Value> = suggestions
        .iter()
        .flat_map(|s| extract_all_by_label(s, "identifier"))
        .filter(|id| is_present(id))
        .collect();
    if identifiers.is_empty() {
        return Err(Error::ComponentNotFound(format!(
            "No identifiers found when '{}' was entered in the picker field.",
            typed
        )));
    }
    identifiers
        .choose(&mut rand::thread_rng())
        .map(|id| (*id).clone())
        .ok_or_else(|| Error::ComponentNotFound("no picker suggestion to select".to_string()))
}

fn is_empty_validation(value: &Value) -> bool {
    !is_present(value)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_url_takes_path() {
        let state = json!({"links": [
            {"rel": "self", "href": "https://h/suite/self"},
            {"rel": "update", "href": "https://h/suite/rest/a/task/latest/abc/form"}
        ]});
        assert_eq!(update_url(&state).as_deref(), Some("/suite/rest/a/task/latest/abc/form"));

        let relative = json!({"links": [{"rel": "update", "href": "/suite/form?x=1"}]});
        assert_eq!(update_url(&relative).as_deref(), Some("/suite/form"));

        assert!(update_url(&json!({"links": []})).is_none());
        assert!(update_url(&json!({})).is_none());
    }

    #[test]
    fn test_picker_suggestion_comes_from_identifiers() {
        let picker = json!({
            "#t": "PickerWidget",
            "suggestions": [
                {"identifier": {"id": 5, "#t": "User"}},
                {"identifier": {"id": 6, "#t": "User"}}
            ]
        });
        let chosen = choose_picker_suggestion(&picker, "a").unwrap();
        assert!(chosen == json!({"id": 5, "#t": "User"}) || chosen == json!({"id": 6, "#t": "User"}));

        let empty = json!({"#t": "PickerWidget", "suggestions": []});
        assert!(choose_picker_suggestion(&empty, "a").is_err());
    }

    #[test]
    fn test_label_kind_attribute() {
        assert_eq!(LabelKind::Label.attribute(), "label");
        assert_eq!(LabelKind::TestLabel.attribute(), "testLabel");
    }
}
