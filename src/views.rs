//! Projections from a master-sheet snapshot into the caller-facing views:
//! the assessment listing, the per-assessment dashboard, and the distinct
//! assessment count. Row-level coercion failures are swallowed here so that
//! dirty spreadsheet data degrades single rows, never whole responses.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult, CoercionError};
use crate::smartsheet::{Row, Sheet};

/// Column titles the listing projection reads.
pub const ASSESSMENT_COLUMNS: [&str; 6] = [
    "Customer Name",
    "Created Date",
    "Assessment ID",
    "Industry",
    "Submitter",
    "Maturity Score",
];

/// Column titles the dashboard projection reads.
pub const DASHBOARD_COLUMNS: [&str; 21] = [
    "Assessment ID",
    "Customer Name",
    "Created Date",
    "Executive Summary",
    "Maturity Score",
    "Strengths & Key Findings Formatted",
    "D&I Summary",
    "D&I Dimensional Performance",
    "D&I Average Score",
    "WS&P Average Score",
    "WE Average Score",
    "W&PR Average Score",
    "PP Average Score",
    "SP Average Score",
    "D&I Score",
    "WS&P Score",
    "WE Score",
    "W&PR Score",
    "PP Score",
    "SP Score",
    "D&I - People Score",
];

/// Column titles the count projection reads.
pub const COUNT_COLUMNS: [&str; 2] = ["Submitter", "Assessment ID"];

/// Title to column-id mapping for one snapshot. Exact, case-sensitive title
/// match; when the sheet carries duplicate titles the first column wins.
#[derive(Debug)]
pub struct ColumnMap {
    ids: HashMap<String, i64>,
}

impl ColumnMap {
    /// Fails with a schema error naming the first absent required title.
    /// A missing column is a deployment mismatch, not a per-row condition.
    pub fn resolve(sheet: &Sheet, required: &[&str]) -> AppResult<ColumnMap> {
        let mut ids: HashMap<String, i64> = HashMap::new();
        for column in &sheet.columns {
            ids.entry(column.title.clone()).or_insert(column.id);
        }
        for title in required {
            if !ids.contains_key(*title) {
                return Err(AppError::schema(
                    "missing_column",
                    format!("Sheet is missing required column '{title}'."),
                ));
            }
        }
        Ok(ColumnMap { ids })
    }

    // Caller must have listed `title` in the required set passed to resolve.
    fn id(&self, title: &str) -> i64 {
        self.ids[title]
    }
}

/// Cell accessor: the non-empty display string if present, else the raw
/// typed value. A missing cell and a valueless cell both read as `None`.
pub fn cell_value(row: &Row, column_id: i64) -> Option<Value> {
    let cell = row.cells.iter().find(|cell| cell.column_id == column_id)?;
    match &cell.display_value {
        Some(display) if !display.is_empty() => Some(Value::String(display.clone())),
        _ => cell.value.clone(),
    }
}

/// Canonical de-duplication key shared by all three projections: numeric
/// coercion, integer truncation, decimal formatting. `"42"`, `"42.0"` and
/// `42.9` all map to `"42"`.
pub fn canonical_assessment_id(value: &Value) -> Result<String, CoercionError> {
    let parsed = value_as_f64(value)?;
    if !parsed.is_finite() {
        return Err(CoercionError);
    }
    Ok(format!("{}", parsed.trunc() as i64))
}

fn value_as_f64(value: &Value) -> Result<f64, CoercionError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or(CoercionError),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| CoercionError),
        _ => Err(CoercionError),
    }
}

// Integer coercion is stricter on strings than on numbers: "4.5" fails,
// the number 4.5 truncates.
fn value_as_i64(value: &Value) -> Result<i64, CoercionError> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => n.as_f64().map(|f| f.trunc() as i64).ok_or(CoercionError),
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| CoercionError),
        _ => Err(CoercionError),
    }
}

// Empty-ish values (null, "", 0, false, empty containers) trigger fallbacks.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// The cell value itself when non-empty, else the given fallback string.
fn text_or(value: Option<Value>, fallback: &str) -> Value {
    match value {
        Some(v) if is_truthy(&v) => v,
        _ => Value::String(fallback.to_string()),
    }
}

/// Case-insensitive match against the requester's already-lowercased email.
/// Non-string submitter cells never match.
fn submitter_matches(value: Option<&Value>, user_email: &str) -> bool {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.to_lowercase() == user_email,
        _ => false,
    }
}

/// Renders a `YYYY-MM-DD` string as `Mon DD, YYYY`. Other strings pass
/// through unchanged; empty or non-string values become "N/A".
pub fn format_display_date(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "N/A".to_string();
    };
    if !is_truthy(value) {
        return "N/A".to_string();
    }
    let Value::String(raw) = value else {
        return "N/A".to_string();
    };
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format("%b %d, %Y").to_string(),
        Err(_) => raw.clone(),
    }
}

/// De-duplicated listing of the requesting submitter's assessments: one
/// record per canonical Assessment ID, first matching row wins, later
/// duplicates are dropped without merging.
pub fn project_assessments(sheet: &Sheet, user_email: &str) -> AppResult<Vec<Value>> {
    let columns = ColumnMap::resolve(sheet, &ASSESSMENT_COLUMNS)?;
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for row in &sheet.rows {
        let submitter = cell_value(row, columns.id("Submitter"));
        if !submitter_matches(submitter.as_ref(), user_email) {
            continue;
        }
        let Some(id_value) = cell_value(row, columns.id("Assessment ID")) else {
            continue;
        };
        let Ok(assessment_id) = canonical_assessment_id(&id_value) else {
            continue;
        };
        if !seen.insert(assessment_id.clone()) {
            continue;
        }
        records.push(json!({
            "name": cell_value(row, columns.id("Customer Name")),
            "date": cell_value(row, columns.id("Created Date")),
            "sheetId": assessment_id,
            "industry": cell_value(row, columns.id("Industry")),
            "maturityScore": cell_value(row, columns.id("Maturity Score")),
        }));
    }
    Ok(records)
}

/// Dashboard payload for one assessment: built from the first row whose
/// canonical ID equals the target, plus a heatmap sample drawn from every
/// row with both scores coercible.
pub fn project_dashboard(sheet: &Sheet, assessment_id: &str) -> AppResult<Value> {
    let columns = ColumnMap::resolve(sheet, &DASHBOARD_COLUMNS)?;
    let mut heatmap = Vec::new();
    let mut dashboard: Option<Value> = None;
    for row in &sheet.rows {
        let Some(id_value) = cell_value(row, columns.id("Assessment ID")) else {
            continue;
        };
        let Ok(row_id) = canonical_assessment_id(&id_value) else {
            continue;
        };

        let maturity = cell_value(row, columns.id("Maturity Score"));
        let di_people = cell_value(row, columns.id("D&I - People Score"));
        if let (Some(maturity), Some(di_people)) = (&maturity, &di_people) {
            if let (Ok(score), Ok(people)) = (value_as_f64(maturity), value_as_i64(di_people)) {
                heatmap.push(json!({
                    "Maturity Score": score,
                    "D&I - People Score": people,
                }));
            }
        }

        if dashboard.is_none() && row_id == assessment_id {
            dashboard = Some(build_dashboard_row(row, &columns, maturity, di_people));
        }
    }
    let Some(mut dashboard) = dashboard else {
        return Err(AppError::not_found(
            "assessment_not_found",
            format!("Assessment with ID '{assessment_id}' not found."),
        ));
    };
    if let Some(record) = dashboard.as_object_mut() {
        record.insert("assessmentData".to_string(), Value::Array(heatmap));
    }
    Ok(dashboard)
}

fn build_dashboard_row(
    row: &Row,
    columns: &ColumnMap,
    maturity: Option<Value>,
    di_people: Option<Value>,
) -> Value {
    // The two numeric fields coerce independently: one bad score nulls
    // itself, never the textual payload and never the other score.
    let maturity_score = maturity.as_ref().and_then(|v| value_as_f64(v).ok());
    let di_people_score = di_people.as_ref().and_then(|v| value_as_i64(v).ok());
    json!({
        "customerName": text_or(cell_value(row, columns.id("Customer Name")), "N/A"),
        "createdDate": format_display_date(cell_value(row, columns.id("Created Date")).as_ref()),
        "executiveSummary": text_or(
            cell_value(row, columns.id("Executive Summary")),
            "No summary available.",
        ),
        "maturityScore": maturity_score,
        "highlightMaturityScore": maturity_score,
        "highlightDiPeopleScore": di_people_score,
        "strengthsAndKeyFindings": text_or(
            cell_value(row, columns.id("Strengths & Key Findings Formatted")),
            "No data available.",
        ),
        "diSummary": text_or(cell_value(row, columns.id("D&I Summary")), "No summary available."),
        "diDimensionalPerformance": text_or(
            cell_value(row, columns.id("D&I Dimensional Performance")),
            "No dimensional performance data available.",
        ),
        "radarChartData": {
            "diAverage": cell_value(row, columns.id("D&I Average Score")),
            "wspAverage": cell_value(row, columns.id("WS&P Average Score")),
            "weAverage": cell_value(row, columns.id("WE Average Score")),
            "wprAverage": cell_value(row, columns.id("W&PR Average Score")),
            "ppAverage": cell_value(row, columns.id("PP Average Score")),
            "spAverage": cell_value(row, columns.id("SP Average Score")),
            "diScore": cell_value(row, columns.id("D&I Score")),
            "wspScore": cell_value(row, columns.id("WS&P Score")),
            "weScore": cell_value(row, columns.id("WE Score")),
            "wprScore": cell_value(row, columns.id("W&PR Score")),
            "ppScore": cell_value(row, columns.id("PP Score")),
            "spScore": cell_value(row, columns.id("SP Score")),
        },
    })
}

/// Count of distinct canonical Assessment IDs for the submitter. Duplicate
/// rows collapse exactly as in the listing.
pub fn count_assessments(sheet: &Sheet, user_email: &str) -> AppResult<usize> {
    let columns = ColumnMap::resolve(sheet, &COUNT_COLUMNS)?;
    let mut seen = HashSet::new();
    for row in &sheet.rows {
        let submitter = cell_value(row, columns.id("Submitter"));
        if !submitter_matches(submitter.as_ref(), user_email) {
            continue;
        }
        let Some(id_value) = cell_value(row, columns.id("Assessment ID")) else {
            continue;
        };
        if let Ok(assessment_id) = canonical_assessment_id(&id_value) {
            seen.insert(assessment_id);
        }
    }
    Ok(seen.len())
}
