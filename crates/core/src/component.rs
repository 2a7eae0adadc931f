//! Typed view over a component node
//!
//! Nodes stay as `serde_json::Value` so unknown component types keep flowing
//! through search and reconciliation untouched. [`Component`] borrows a node
//! and exposes the fields the engine actually reads.

use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};

/// Component types the engine manipulates directly
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    TextField,
    ParagraphField,
    EncryptedTextField,
    IntegerField,
    DecimalField,
    PickerField,
    PickerWidget,
    DropdownField,
    MultipleDropdownField,
    CheckboxField,
    RadioButtonField,
    DatePickerField,
    DateTimePickerField,
    ButtonWidget,
    DynamicLink,
    CardLayout,
    CardChoiceField,
    TabButtonGroup,
    FileUploadWidget,
    MultipleFileUploadWidget,
    ExpressionEditorWidget,
    GridField,
    PagingGridLayout,
    RecordLink,
    StartProcessLink,
    ProcessTaskLink,
    SearchBoxWidget,
    UiComponentsDelta,
    /// Anything the engine does not model
    Other(String),
}

impl ComponentKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "TextField" => ComponentKind::TextField,
            "ParagraphField" => ComponentKind::ParagraphField,
            "EncryptedTextField" => ComponentKind::EncryptedTextField,
            "IntegerField" => ComponentKind::IntegerField,
            "DecimalField" => ComponentKind::DecimalField,
            "PickerField" => ComponentKind::PickerField,
            "PickerWidget" => ComponentKind::PickerWidget,
            "DropdownField" => ComponentKind::DropdownField,
            "MultipleDropdownField" => ComponentKind::MultipleDropdownField,
            "CheckboxField" => ComponentKind::CheckboxField,
            "RadioButtonField" => ComponentKind::RadioButtonField,
            "DatePickerField" => ComponentKind::DatePickerField,
            "DateTimePickerField" => ComponentKind::DateTimePickerField,
            "ButtonWidget" => ComponentKind::ButtonWidget,
            "DynamicLink" => ComponentKind::DynamicLink,
            "CardLayout" => ComponentKind::CardLayout,
            "CardChoiceField" => ComponentKind::CardChoiceField,
            "TabButtonGroup" => ComponentKind::TabButtonGroup,
            "FileUploadWidget" => ComponentKind::FileUploadWidget,
            "MultipleFileUploadWidget" => ComponentKind::MultipleFileUploadWidget,
            "ExpressionEditorWidget" => ComponentKind::ExpressionEditorWidget,
            "GridField" => ComponentKind::GridField,
            "PagingGridLayout" => ComponentKind::PagingGridLayout,
            "RecordLink" => ComponentKind::RecordLink,
            "StartProcessLink" => ComponentKind::StartProcessLink,
            "ProcessTaskLink" => ComponentKind::ProcessTaskLink,
            "SearchBoxWidget" => ComponentKind::SearchBoxWidget,
            "UiComponentsDelta" => ComponentKind::UiComponentsDelta,
            other => ComponentKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::TextField => "TextField",
            ComponentKind::ParagraphField => "ParagraphField",
            ComponentKind::EncryptedTextField => "EncryptedTextField",
            ComponentKind::IntegerField => "IntegerField",
            ComponentKind::DecimalField => "DecimalField",
            ComponentKind::PickerField => "PickerField",
            ComponentKind::PickerWidget => "PickerWidget",
            ComponentKind::DropdownField => "DropdownField",
            ComponentKind::MultipleDropdownField => "MultipleDropdownField",
            ComponentKind::CheckboxField => "CheckboxField",
            ComponentKind::RadioButtonField => "RadioButtonField",
            ComponentKind::DatePickerField => "DatePickerField",
            ComponentKind::DateTimePickerField => "DateTimePickerField",
            ComponentKind::ButtonWidget => "ButtonWidget",
            ComponentKind::DynamicLink => "DynamicLink",
            ComponentKind::CardLayout => "CardLayout",
            ComponentKind::CardChoiceField => "CardChoiceField",
            ComponentKind::TabButtonGroup => "TabButtonGroup",
            ComponentKind::FileUploadWidget => "FileUploadWidget",
            ComponentKind::MultipleFileUploadWidget => "MultipleFileUploadWidget",
            ComponentKind::ExpressionEditorWidget => "ExpressionEditorWidget",
            ComponentKind::GridField => "GridField",
            ComponentKind::PagingGridLayout => "PagingGridLayout",
            ComponentKind::RecordLink => "RecordLink",
            ComponentKind::StartProcessLink => "StartProcessLink",
            ComponentKind::ProcessTaskLink => "ProcessTaskLink",
            ComponentKind::SearchBoxWidget => "SearchBoxWidget",
            ComponentKind::UiComponentsDelta => "UiComponentsDelta",
            ComponentKind::Other(tag) => tag,
        }
    }

    /// Links that navigate to another form rather than saving into this one
    pub fn is_navigation_link(&self) -> bool {
        matches!(
            self,
            ComponentKind::RecordLink | ComponentKind::StartProcessLink | ComponentKind::ProcessTaskLink
        )
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of one component node
#[derive(Debug, Clone, Copy)]
pub struct Component<'a> {
    node: &'a Value,
}

impl<'a> Component<'a> {
    /// Wraps `node`, which must be an object
    pub fn new(node: &'a Value) -> Result<Self> {
        if !node.is_object() {
            return Err(Error::InvalidComponent(format!(
                "expected a component object, got {}",
                node
            )));
        }
        Ok(Self { node })
    }

    pub fn raw(&self) -> &'a Value {
        self.node
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.node.get(key)
    }

    fn str_field(&self, key: &str) -> Option<&'a str> {
        self.node.get(key).and_then(Value::as_str)
    }

    pub fn kind(&self) -> ComponentKind {
        ComponentKind::from_type_tag(self.type_tag().unwrap_or_default())
    }

    pub fn type_tag(&self) -> Option<&'a str> {
        self.str_field("#t")
    }

    pub fn cid(&self) -> Option<&'a str> {
        self.str_field("_cId")
    }

    pub fn label(&self) -> Option<&'a str> {
        self.str_field("label")
    }

    pub fn test_label(&self) -> Option<&'a str> {
        self.str_field("testLabel")
    }

    pub fn value(&self) -> Option<&'a Value> {
        self.node.get("value")
    }

    pub fn identifiers(&self) -> Option<&'a Value> {
        self.node.get("identifiers")
    }

    /// Embedded link, for components that wrap one
    pub fn link(&self) -> Option<Component<'a>> {
        self.node
            .get("link")
            .filter(|l| l.is_object())
            .map(|node| Component { node })
    }

    /// Declared choice labels, in order
    pub fn choices(&self) -> Option<Vec<&'a str>> {
        self.node
            .get("choices")
            .and_then(Value::as_array)
            .map(|choices| choices.iter().filter_map(Value::as_str).collect())
    }

    /// Where the server applies a new value: `saveInto`, then
    /// `onSubmitSaveInto`, then `contents.saveInto`
    pub fn save_into(&self) -> Option<&'a Value> {
        self.node
            .get("saveInto")
            .or_else(|| self.node.get("onSubmitSaveInto"))
            .or_else(|| self.node.get("contents").and_then(|c| c.get("saveInto")))
    }

    /// Name used in request labels: the label, else the first 15 chars of `_cId`
    pub fn display_label(&self) -> String {
        match self.label().filter(|l| !l.is_empty()) {
            Some(label) => label.to_string(),
            None => self.cid().unwrap_or_default().chars().take(15).collect(),
        }
    }

    /// 1-based position of `choice` in `choices`
    pub fn choice_index(&self, choice: &str) -> Result<i64> {
        let choices = self.choices().ok_or_else(|| {
            Error::InvalidComponent(format!(
                "component '{}' has no choices",
                self.display_label()
            ))
        })?;
        choices
            .iter()
            .position(|c| *c == choice)
            .map(|p| p as i64 + 1)
            .ok_or_else(|| Error::InvalidChoice {
                choice: choice.to_string(),
                component: self.display_label(),
                valid: choices.iter().map(|c| c.to_string()).collect(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_falls_back_to_other() {
        let node = json!({"#t": "FancyNewWidget"});
        let c = Component::new(&node).unwrap();
        assert_eq!(c.kind(), ComponentKind::Other("FancyNewWidget".into()));
        assert_eq!(c.kind().to_string(), "FancyNewWidget");
        assert_eq!(ComponentKind::from_type_tag("DropdownField"), ComponentKind::DropdownField);
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(Component::new(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_save_into_priority() {
        let node = json!({
            "saveInto": ["primary"],
            "onSubmitSaveInto": ["secondary"],
            "contents": {"saveInto": ["nested"]}
        });
        let c = Component::new(&node).unwrap();
        assert_eq!(c.save_into(), Some(&json!(["primary"])));

        let node = json!({"contents": {"saveInto": ["nested"]}});
        assert_eq!(Component::new(&node).unwrap().save_into(), Some(&json!(["nested"])));
    }

    #[test]
    fn test_display_label_truncates_cid() {
        let node = json!({"_cId": "0123456789abcdefghij"});
        assert_eq!(Component::new(&node).unwrap().display_label(), "0123456789abcde");
    }

    #[test]
    fn test_choice_index_lists_valid_choices() {
        let node = json!({"#t": "DropdownField", "label": "Color", "choices": ["Red", "Green", "Blue"]});
        let c = Component::new(&node).unwrap();
        assert_eq!(c.choice_index("Green").unwrap(), 2);
        match c.choice_index("Pink").unwrap_err() {
            Error::InvalidChoice { valid, .. } => assert_eq!(valid, vec!["Red", "Green", "Blue"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
