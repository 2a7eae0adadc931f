//! Grid paging, sorting and selection
//!
//! Grids come in two wire flavors. Legacy grids keep `startIndex`, `batchSize`
//! and `sort` directly under `value` and save back a `PagingInfo`. Nested grids
//! keep them under `value.pagingInfo`, with a sibling `selected` list, and save
//! back a `GridSelection`. A grid is always written in the flavor it was read.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::search::{extract_all_by_label, extract_values_multiple, try_find_component, ComponentQuery};

pub const PAGING_GRID: &str = "PagingGridLayout";
pub const GRID_FIELD: &str = "GridField";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFlavor {
    /// Paging fields directly under `value`
    Legacy,
    /// Paging fields under `value.pagingInfo`
    Nested,
}

/// Paging, sort and selection state read from a grid component
#[derive(Debug, Clone, PartialEq)]
pub struct GridState {
    pub flavor: GridFlavor,
    pub total_count: i64,
    pub start_index: i64,
    pub batch_size: i64,
    pub sort: Option<Value>,
    pub selected: Vec<Value>,
}

/// A requested change to a grid
#[derive(Debug, Clone, PartialEq)]
pub enum GridOp {
    /// Row indices are 0-based positions in the grid's `identifiers`
    SelectRows { rows: Vec<usize>, append: bool },
    FirstPage,
    LastPage,
    PageRight,
    PageLeft,
    Sort { field: String, ascending: bool },
}

impl GridState {
    pub fn read(grid: &Value) -> Result<Self> {
        let value = grid
            .get("value")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Grid("grid has no value".to_string()))?;

        // the key alone decides the flavor; fields fall back to `value` when it is not an object
        let flavor = if value.contains_key("pagingInfo") {
            GridFlavor::Nested
        } else {
            GridFlavor::Legacy
        };
        let paging = value
            .get("pagingInfo")
            .and_then(Value::as_object)
            .unwrap_or(value);

        let total_count = int_field(grid.get("totalCount"), "totalCount")?;
        let start_index = int_field(paging.get("startIndex"), "startIndex")?;
        let batch_size = int_field(paging.get("batchSize"), "batchSize")?;
        let sort = paging.get("sort").filter(|s| !s.is_null()).cloned();
        let selected = value
            .get("selected")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            flavor,
            total_count,
            start_index,
            batch_size,
            sort,
            selected,
        })
    }

    /// Save value in the flavor the grid was read in
    pub fn to_save_value(&self) -> Value {
        let sort = self.sort.as_ref().filter(|s| is_present(s));
        match self.flavor {
            GridFlavor::Legacy => {
                let mut data = Map::new();
                data.insert("startIndex".into(), json!(self.start_index));
                data.insert("batchSize".into(), json!(self.batch_size));
                data.insert("#t".into(), json!("PagingInfo"));
                if let Some(sort) = sort {
                    data.insert("sort".into(), sort.clone());
                }
                Value::Object(data)
            }
            GridFlavor::Nested => {
                let mut paging = Map::new();
                paging.insert("startIndex".into(), json!(self.start_index));
                paging.insert("batchSize".into(), json!(self.batch_size));
                if let Some(sort) = sort {
                    paging.insert("sort".into(), sort.clone());
                }
                let mut data = Map::new();
                data.insert("#t".into(), json!("GridSelection"));
                data.insert("pagingInfo".into(), Value::Object(paging));
                if !self.selected.is_empty() {
                    data.insert("selected".into(), Value::Array(self.selected.clone()));
                }
                Value::Object(data)
            }
        }
    }

    pub fn first_page(mut self) -> Self {
        self.start_index = 1;
        self
    }

    /// Jump so the last `batch_size` rows are shown
    ///
    /// With fewer rows than one batch the arithmetic goes below 1; `clamp`
    /// pins it to 1.
    pub fn last_page(mut self, clamp: bool) -> Self {
        let start = 1 + self.total_count - self.batch_size;
        if start < 1 && clamp {
            warn!(
                "Last page start index {} is below 1 (total {}, batch {}), using 1",
                start, self.total_count, self.batch_size
            );
            self.start_index = 1;
        } else {
            self.start_index = start;
        }
        self
    }

    /// Refused, leaving the state unchanged, when it would pass the last row
    pub fn page_right(mut self) -> Self {
        let candidate = self.start_index + self.batch_size;
        if candidate > self.total_count {
            warn!(
                "Cannot move to the right, index to move to {} is higher than total count {}",
                candidate, self.total_count
            );
        } else {
            self.start_index = candidate;
        }
        self
    }

    /// Refused, leaving the state unchanged, when it would go before the first row
    pub fn page_left(mut self) -> Self {
        let candidate = self.start_index - self.batch_size;
        if candidate <= 0 {
            warn!(
                "Cannot move to the left, index to move to {} is less than or equal to 0",
                candidate
            );
        } else {
            self.start_index = candidate;
        }
        self
    }

    pub fn select_rows(mut self, grid: &Value, rows: &[usize], append: bool) -> Result<Self> {
        let identifiers = grid
            .get("identifiers")
            .and_then(Value::as_array)
            .filter(|ids| !ids.is_empty())
            .ok_or_else(|| Error::Grid("No identifiers found in grid.".to_string()))?;

        let chosen = rows
            .iter()
            .map(|&row| {
                identifiers.get(row).cloned().ok_or_else(|| {
                    Error::Grid(format!(
                        "Row {} out of range, grid has {} identifiers",
                        row,
                        identifiers.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if append {
            self.selected.extend(chosen);
        } else {
            self.selected = chosen;
        }
        Ok(self)
    }

    pub fn sort(mut self, grid: &Value, field: &str, ascending: bool) -> Result<Self> {
        let field = resolve_sort_field(grid, field)?;
        self.sort = Some(json!([{"field": field, "ascending": ascending}]));
        Ok(self)
    }
}

/// Applies grid operations to grid components
#[derive(Debug, Clone, Copy)]
pub struct GridController {
    clamp_last_page: bool,
}

impl Default for GridController {
    fn default() -> Self {
        Self {
            clamp_last_page: true,
        }
    }
}

impl GridController {
    pub fn new(clamp_last_page: bool) -> Self {
        Self { clamp_last_page }
    }

    /// Reads `grid`, applies `op` and returns the save value
    pub fn apply(&self, grid: &Value, op: &GridOp) -> Result<Value> {
        let state = GridState::read(grid)?;
        debug!(
            "Grid {:?} at start {} of {} (batch {}), applying {:?}",
            state.flavor, state.start_index, state.total_count, state.batch_size, op
        );
        let next = match op {
            GridOp::SelectRows { rows, append } => state.select_rows(grid, rows, *append)?,
            GridOp::FirstPage => state.first_page(),
            GridOp::LastPage => state.last_page(self.clamp_last_page),
            GridOp::PageRight => state.page_right(),
            GridOp::PageLeft => state.page_left(),
            GridOp::Sort { field, ascending } => state.sort(grid, field, *ascending)?,
        };
        Ok(next.to_save_value())
    }
}

/// Column `field` names, in column order
pub fn sort_fields(grid: &Value) -> Vec<String> {
    columns(grid)
        .iter()
        .filter_map(|c| c.get("field").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Maps a field name or part of a column label to a sortable field
///
/// Record-backed grids expose field names that cannot be guessed, so a name
/// that is not a field is looked up among the column labels.
pub fn resolve_sort_field(grid: &Value, name: &str) -> Result<String> {
    let fields = sort_fields(grid);
    if fields.iter().any(|f| f == name) {
        return Ok(name.to_string());
    }

    let by_label = columns(grid).iter().find_map(|column| {
        let label = column.get("label").and_then(Value::as_str)?;
        if label.contains(name) {
            column.get("field").and_then(Value::as_str)
        } else {
            None
        }
    });
    match by_label {
        Some(field) if fields.iter().any(|f| f == field) => Ok(field.to_string()),
        _ => Err(Error::Grid(format!(
            "Cannot sort, field '{}' not found, fields were {:?}",
            by_label.unwrap_or(name),
            fields
        ))),
    }
}

fn columns(grid: &Value) -> &[Value] {
    grid.get("columns")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// A record-backed `PagingGridLayout` labelled `label`, else a `GridField` with that label
pub fn find_grid_by_label<'a>(form: &'a Value, label: &str) -> Result<&'a Value> {
    let test_label = format!("PagingGrid-{}", label);
    let paging = try_find_component(
        form,
        &ComponentQuery::new()
            .of_type(PAGING_GRID)
            .with_attribute("testLabel", &test_label),
    )?;
    let grid = match paging {
        Some(grid) => Some(grid),
        None => try_find_component(
            form,
            &ComponentQuery::new().of_type(GRID_FIELD).with_attribute("label", label),
        )?,
    };
    grid.ok_or_else(|| Error::ComponentNotFound(format!("Grid with label '{}' not found in form", label)))
}

/// The index'th grid of the form, 0-based, in document order
pub fn find_grid_by_index(form: &Value, index: usize) -> Result<&Value> {
    let grids = extract_values_multiple(form, "#t", &[json!(PAGING_GRID), json!(GRID_FIELD)]);
    if grids.is_empty() {
        return Err(Error::ComponentNotFound("No grids found in form".to_string()));
    }
    grids.get(index).copied().ok_or_else(|| {
        Error::ComponentNotFound(format!(
            "Index {} out of range, only found {} grid(s) in form",
            index,
            grids.len()
        ))
    })
}

/// First `link` inside a rich-text cell
pub fn rich_text_link<'a>(grid: &'a Value, column_name: &str, row: usize) -> Option<&'a Value> {
    let column = column_by_label(grid, column_name)?;
    let cell = column.get("data")?.get(row)?;
    extract_all_by_label(cell, "link").into_iter().next()
}

/// Link for `row` from a plaintext column's parallel `links` array
pub fn plaintext_link<'a>(grid: &'a Value, column_name: &str, row: usize) -> Option<&'a Value> {
    column_by_label(grid, column_name)?.get("links")?.get(row)
}

fn column_by_label<'a>(grid: &'a Value, column_name: &str) -> Option<&'a Value> {
    columns(grid)
        .iter()
        .find(|c| c.get("label").and_then(Value::as_str) == Some(column_name))
}

fn int_field(value: Option<&Value>, name: &str) -> Result<i64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Grid(format!("grid field '{}' missing or not an integer", name)))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn legacy_grid(total: i64, start: i64, batch: i64) -> Value {
        json!({
            "#t": "GridField",
            "label": "Orders",
            "_cId": "grid-1",
            "totalCount": total,
            "identifiers": ["id3", "id9"],
            "columns": [
                {"label": "Order Id", "field": "orderId"},
                {"label": "Total Amount", "field": "totalAmt"}
            ],
            "value": {"#t": "PagingInfo", "startIndex": start, "batchSize": batch},
            "saveInto": ["grid-si"]
        })
    }

    fn nested_grid(selected: Value) -> Value {
        json!({
            "#t": "PagingGridLayout",
            "testLabel": "PagingGrid-Employees",
            "_cId": "grid-2",
            "totalCount": "25",
            "identifiers": ["id3", "id9"],
            "columns": [{"label": "Name", "field": "name"}],
            "value": {
                "#t": "GridSelection",
                "pagingInfo": {"startIndex": 1, "batchSize": 10, "sort": [{"field": "name", "ascending": true}]},
                "selected": selected
            }
        })
    }

    #[test]
    fn test_flavor_detection() {
        assert_eq!(GridState::read(&legacy_grid(10, 1, 5)).unwrap().flavor, GridFlavor::Legacy);
        let nested = GridState::read(&nested_grid(json!([]))).unwrap();
        assert_eq!(nested.flavor, GridFlavor::Nested);
        assert_eq!(nested.total_count, 25);
    }

    #[test]
    fn test_null_paging_info_still_writes_nested() {
        let grid = json!({
            "#t": "PagingGridLayout",
            "_cId": "grid-3",
            "totalCount": 30,
            "value": {"pagingInfo": null, "startIndex": 1, "batchSize": 10},
            "saveInto": ["grid-si"]
        });
        assert_eq!(GridState::read(&grid).unwrap().flavor, GridFlavor::Nested);

        let out = GridController::default().apply(&grid, &GridOp::PageRight).unwrap();
        assert_eq!(
            out,
            json!({"#t": "GridSelection", "pagingInfo": {"startIndex": 11, "batchSize": 10}})
        );
    }

    #[test]
    fn test_legacy_first_page_keeps_flat_shape() {
        let out = GridController::default()
            .apply(&legacy_grid(50, 11, 10), &GridOp::FirstPage)
            .unwrap();
        assert_eq!(out, json!({"#t": "PagingInfo", "startIndex": 1, "batchSize": 10}));
    }

    #[test]
    fn test_page_right_refused_at_end() {
        let out = GridController::default()
            .apply(&legacy_grid(10, 1, 10), &GridOp::PageRight)
            .unwrap();
        assert_eq!(out["startIndex"], 1);
    }

    #[test_case(50, 1, 10, GridOp::PageRight, 11; "right moves one batch")]
    #[test_case(50, 21, 10, GridOp::PageLeft, 11; "left moves one batch")]
    #[test_case(50, 1, 10, GridOp::PageLeft, 1; "left refused at start")]
    #[test_case(50, 11, 10, GridOp::PageLeft, 1; "left to first row")]
    #[test_case(50, 1, 10, GridOp::LastPage, 41; "last page")]
    #[test_case(5, 1, 10, GridOp::LastPage, 1; "last page clamped")]
    #[test_case(50, 41, 10, GridOp::PageRight, 41; "right refused past total")]
    fn test_paging_moves(total: i64, start: i64, batch: i64, op: GridOp, expected: i64) {
        let out = GridController::default().apply(&legacy_grid(total, start, batch), &op).unwrap();
        assert_eq!(out["startIndex"], expected);
    }

    #[test]
    fn test_last_page_unclamped() {
        let out = GridController::new(false)
            .apply(&legacy_grid(5, 1, 10), &GridOp::LastPage)
            .unwrap();
        assert_eq!(out["startIndex"], -4);
    }

    #[test]
    fn test_nested_select_appends() {
        let grid = nested_grid(json!(["id7"]));
        let out = GridController::default()
            .apply(&grid, &GridOp::SelectRows { rows: vec![0], append: true })
            .unwrap();
        assert_eq!(out["#t"], "GridSelection");
        assert_eq!(out["selected"], json!(["id7", "id3"]));
        assert_eq!(out["pagingInfo"]["sort"][0]["field"], "name");
    }

    #[test]
    fn test_select_replaces_without_append() {
        let grid = nested_grid(json!(["id7"]));
        let out = GridController::default()
            .apply(&grid, &GridOp::SelectRows { rows: vec![1], append: false })
            .unwrap();
        assert_eq!(out["selected"], json!(["id9"]));
    }

    #[test]
    fn test_select_without_identifiers_fails() {
        let mut grid = nested_grid(json!([]));
        grid["identifiers"] = json!(null);
        let err = GridController::default()
            .apply(&grid, &GridOp::SelectRows { rows: vec![0], append: false })
            .unwrap_err();
        assert_eq!(err.to_string(), "Grid error: No identifiers found in grid.");
    }

    #[test]
    fn test_sort_by_label_resolves_field() {
        let out = GridController::default()
            .apply(
                &legacy_grid(50, 1, 10),
                &GridOp::Sort { field: "Total Amount".into(), ascending: false },
            )
            .unwrap();
        assert_eq!(out["sort"], json!([{"field": "totalAmt", "ascending": false}]));
    }

    #[test]
    fn test_sort_unknown_field_lists_fields() {
        let err = GridController::default()
            .apply(
                &legacy_grid(50, 1, 10),
                &GridOp::Sort { field: "Nope".into(), ascending: true },
            )
            .unwrap_err();
        assert!(err.to_string().contains("fields were [\"orderId\", \"totalAmt\"]"));
    }

    #[test]
    fn test_locators() {
        let form = json!({"ui": {"contents": [legacy_grid(1, 1, 1), nested_grid(json!([]))]}});
        assert_eq!(find_grid_by_label(&form, "Employees").unwrap()["_cId"], "grid-2");
        assert_eq!(find_grid_by_label(&form, "Orders").unwrap()["_cId"], "grid-1");
        assert!(find_grid_by_label(&form, "Missing").is_err());
        assert_eq!(find_grid_by_index(&form, 1).unwrap()["_cId"], "grid-2");
        assert!(find_grid_by_index(&form, 2).is_err());
    }

    #[test]
    fn test_cell_links() {
        let grid = json!({
            "columns": [
                {"label": "Name", "links": [{"#t": "RecordLink", "label": "Ada"}]},
                {"label": "Doc", "data": [{"#t": "RichTextDisplayField", "value": {"values": [
                    {"#t": "TextItem", "link": {"#t": "DynamicLink", "_cId": "l1"}}
                ]}}]}
            ]
        });
        assert_eq!(plaintext_link(&grid, "Name", 0).unwrap()["label"], "Ada");
        assert_eq!(rich_text_link(&grid, "Doc", 0).unwrap()["_cId"], "l1");
        assert!(plaintext_link(&grid, "Name", 3).is_none());
    }
}
