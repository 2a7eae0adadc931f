//! Journey specification format (YAML-based)

use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uisim_core::{GridTarget, LabelKind, SessionConfig, UploadedDocument};

use crate::error::{JourneyError, JourneyResult};

/// A single user journey through one form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneySpec {
    /// Journey name
    pub name: String,

    /// Description of what the journey exercises
    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Form the journey starts on
    pub entry_uri: String,

    /// Session behavior for every user running this journey
    #[serde(default)]
    pub session: SessionConfig,

    /// Steps to execute
    pub steps: Vec<JourneyStep>,
}

/// Grid reference: a number picks by position, text by label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridRef {
    Index(usize),
    Label(String),
}

impl From<&GridRef> for GridTarget {
    fn from(grid: &GridRef) -> Self {
        match grid {
            GridRef::Index(index) => GridTarget::Index(*index),
            GridRef::Label(label) => GridTarget::Label(label.clone()),
        }
    }
}

impl fmt::Display for GridRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridRef::Index(index) => write!(f, "#{}", index),
            GridRef::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageDirection {
    First,
    Last,
    Left,
    Right,
}

/// Journey step action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum JourneyStep {
    FillTextField {
        label: String,
        value: String,
        #[serde(default = "default_index")]
        index: i64,
        #[serde(default)]
        by_test_label: bool,
    },

    FillFieldByIndex {
        component_type: String,
        index: i64,
        value: String,
    },

    FillPickerField {
        label: String,
        value: String,
    },

    FillParagraphField {
        label: String,
        value: String,
        #[serde(default = "default_index")]
        index: i64,
    },

    FillExpressionEditor {
        expression: String,
    },

    /// Click a button or link
    Click {
        label: String,
        #[serde(default = "default_index")]
        index: i64,
        #[serde(default)]
        by_test_label: bool,
    },

    ClickCardLayout {
        index: i64,
    },

    ClickRecordSearchButton {
        #[serde(default = "default_index")]
        index: i64,
    },

    RefreshAfterRecordAction {
        label: String,
        #[serde(default)]
        by_test_label: bool,
    },

    SelectDropdownItem {
        label: String,
        choice: String,
        #[serde(default)]
        by_test_label: bool,
    },

    SelectDropdownItemByIndex {
        index: i64,
        choice: String,
    },

    SelectMultiDropdownItem {
        label: String,
        choices: Vec<String>,
        #[serde(default)]
        by_test_label: bool,
    },

    /// Check boxes by their 1-based positions
    CheckCheckbox {
        label: String,
        indices: Vec<i64>,
        #[serde(default)]
        by_test_label: bool,
    },

    SelectRadioButton {
        label: String,
        index: i64,
        #[serde(default)]
        by_test_label: bool,
    },

    ClickTab {
        label: String,
        tab_group: String,
    },

    SelectCardChoice {
        label: String,
        index: i64,
    },

    FillDateField {
        label: String,
        date: NaiveDate,
        #[serde(default = "default_index")]
        index: i64,
    },

    FillDatetimeField {
        label: String,
        datetime: NaiveDateTime,
        #[serde(default = "default_index")]
        index: i64,
    },

    SelectDateRange {
        label: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    UploadDocuments {
        label: String,
        documents: Vec<UploadedDocument>,
        #[serde(default = "default_index")]
        index: i64,
    },

    /// Select rows by 0-based position on the current page
    SelectGridRows {
        grid: GridRef,
        rows: Vec<usize>,
        #[serde(default)]
        append: bool,
    },

    PageGrid {
        grid: GridRef,
        direction: PageDirection,
    },

    SortGrid {
        grid: GridRef,
        field: String,
        #[serde(default)]
        ascending: bool,
    },

    ClickGridLink {
        grid: GridRef,
        column: String,
        row: usize,
        #[serde(default)]
        rich_text: bool,
    },

    AssertNoValidations,

    /// Log a message
    Log {
        message: String,
    },
}

fn default_index() -> i64 {
    1
}

pub(crate) fn label_kind(by_test_label: bool) -> LabelKind {
    if by_test_label {
        LabelKind::TestLabel
    } else {
        LabelKind::Label
    }
}

impl JourneyStep {
    /// Short name used in reports, e.g. `select_dropdown_item Color`
    pub fn describe(&self) -> String {
        match self {
            JourneyStep::FillTextField { label, .. } => format!("fill_text_field {}", label),
            JourneyStep::FillFieldByIndex {
                component_type,
                index,
                ..
            } => format!("fill_field_by_index {}[{}]", component_type, index),
            JourneyStep::FillPickerField { label, .. } => format!("fill_picker_field {}", label),
            JourneyStep::FillParagraphField { label, .. } => format!("fill_paragraph_field {}", label),
            JourneyStep::FillExpressionEditor { .. } => "fill_expression_editor".to_string(),
            JourneyStep::Click { label, .. } => format!("click {}", label),
            JourneyStep::ClickCardLayout { index } => format!("click_card_layout {}", index),
            JourneyStep::ClickRecordSearchButton { index } => {
                format!("click_record_search_button {}", index)
            }
            JourneyStep::RefreshAfterRecordAction { label, .. } => {
                format!("refresh_after_record_action {}", label)
            }
            JourneyStep::SelectDropdownItem { label, .. } => format!("select_dropdown_item {}", label),
            JourneyStep::SelectDropdownItemByIndex { index, .. } => {
                format!("select_dropdown_item_by_index {}", index)
            }
            JourneyStep::SelectMultiDropdownItem { label, .. } => {
                format!("select_multi_dropdown_item {}", label)
            }
            JourneyStep::CheckCheckbox { label, .. } => format!("check_checkbox {}", label),
            JourneyStep::SelectRadioButton { label, .. } => format!("select_radio_button {}", label),
            JourneyStep::ClickTab { label, .. } => format!("click_tab {}", label),
            JourneyStep::SelectCardChoice { label, .. } => format!("select_card_choice {}", label),
            JourneyStep::FillDateField { label, .. } => format!("fill_date_field {}", label),
            JourneyStep::FillDatetimeField { label, .. } => format!("fill_datetime_field {}", label),
            JourneyStep::SelectDateRange { label, .. } => format!("select_date_range {}", label),
            JourneyStep::UploadDocuments { label, .. } => format!("upload_documents {}", label),
            JourneyStep::SelectGridRows { grid, .. } => format!("select_grid_rows {}", grid),
            JourneyStep::PageGrid { grid, direction } => {
                format!("page_grid {} {:?}", grid, direction)
            }
            JourneyStep::SortGrid { grid, field, .. } => format!("sort_grid {} {}", grid, field),
            JourneyStep::ClickGridLink { grid, column, row, .. } => {
                format!("click_grid_link {} {}[{}]", grid, column, row)
            }
            JourneyStep::AssertNoValidations => "assert_no_validations".to_string(),
            JourneyStep::Log { .. } => "log".to_string(),
        }
    }
}

impl JourneySpec {
    /// Parse a journey spec from YAML
    pub fn from_yaml(yaml: &str) -> JourneyResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        if spec.steps.is_empty() {
            return Err(JourneyError::SpecParse(format!(
                "journey '{}' has no steps",
                spec.name
            )));
        }
        Ok(spec)
    }

    /// Load a journey spec from a file
    pub fn from_file(path: &Path) -> JourneyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all journey specs under a directory, sorted by path
    pub fn load_all(dir: &Path) -> JourneyResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Find a spec by name
    pub fn find<'a>(specs: &'a [Self], name: &str) -> JourneyResult<&'a Self> {
        specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| JourneyError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_journey() {
        let yaml = r#"
name: create-order
description: Fill in and submit a new order
tags:
  - orders
  - smoke
entry_uri: /suite/rest/a/sites/latest/orders/page/new
session:
  breadcrumb: NewOrder
steps:
  - action: fill_text_field
    label: Customer
    value: ACME
  - action: select_dropdown_item
    label: Color
    choice: Blue
  - action: page_grid
    grid: Orders
    direction: right
  - action: select_grid_rows
    grid: 0
    rows: [0, 2]
  - action: fill_date_field
    label: Due
    date: 2024-03-01
  - action: assert_no_validations
  - action: click
    label: Submit
"#;
        let spec = JourneySpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "create-order");
        assert_eq!(spec.steps.len(), 7);
        assert_eq!(spec.session.breadcrumb, "NewOrder");
        assert!(spec.session.clamp_last_page);

        match &spec.steps[0] {
            JourneyStep::FillTextField {
                index,
                by_test_label,
                ..
            } => {
                assert_eq!(*index, 1);
                assert!(!by_test_label);
            }
            other => panic!("unexpected step {:?}", other),
        }
        match &spec.steps[2] {
            JourneyStep::PageGrid { grid, direction } => {
                assert_eq!(grid, &GridRef::Label("Orders".into()));
                assert_eq!(*direction, PageDirection::Right);
            }
            other => panic!("unexpected step {:?}", other),
        }
        match &spec.steps[3] {
            JourneyStep::SelectGridRows { grid, rows, append } => {
                assert_eq!(grid, &GridRef::Index(0));
                assert_eq!(rows, &vec![0, 2]);
                assert!(!append);
            }
            other => panic!("unexpected step {:?}", other),
        }
        match &spec.steps[4] {
            JourneyStep::FillDateField { date, .. } => {
                assert_eq!(*date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = r#"
name: bad
entry_uri: /x
steps:
  - action: teleport
"#;
        assert!(matches!(
            JourneySpec::from_yaml(yaml),
            Err(JourneyError::Yaml(_))
        ));
    }

    #[test]
    fn test_empty_steps_rejected() {
        let yaml = "name: empty\nentry_uri: /x\nsteps: []\n";
        let err = JourneySpec::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("has no steps"));
    }

    #[test]
    fn test_describe() {
        let step = JourneyStep::ClickGridLink {
            grid: GridRef::Label("Orders".into()),
            column: "Id".into(),
            row: 3,
            rich_text: false,
        };
        assert_eq!(step.describe(), "click_grid_link Orders Id[3]");
        assert_eq!(JourneyStep::AssertNoValidations.describe(), "assert_no_validations");
    }

    #[test]
    fn test_grid_ref_into_target() {
        assert_eq!(GridTarget::from(&GridRef::Index(2)), GridTarget::Index(2));
        assert_eq!(
            GridTarget::from(&GridRef::Label("Orders".into())),
            GridTarget::Label("Orders".into())
        );
    }
}
