//! Sheet sources: where form-submission rows are fetched from.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::row::SheetRow;
use crate::config::SheetEndpoint;
use crate::error::SheetError;

const VALUES_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Anything that can produce the current full set of sheet rows.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Short label for logs and status output.
    fn describe(&self) -> String;

    /// Fetch every data row currently in the sheet, in sheet order.
    async fn fetch_rows(&self) -> Result<Vec<SheetRow>, SheetError>;
}

/// HTTP-backed source for both the Apps Script web app and the values API.
pub struct HttpSheetSource {
    client: reqwest::Client,
    endpoint: SheetEndpoint,
}

impl HttpSheetSource {
    pub fn new(endpoint: SheetEndpoint) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn get_text(&self, request: reqwest::RequestBuilder) -> Result<String, SheetError> {
        let response = request
            .send()
            .await
            .map_err(|e| SheetError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SheetError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(SheetError::Http {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    fn describe(&self) -> String {
        match &self.endpoint {
            SheetEndpoint::WebApp { .. } => "google_sheets_web_app".to_string(),
            SheetEndpoint::ValuesApi { spreadsheet_id, range, .. } => {
                format!("google_sheets:{spreadsheet_id}/{range}")
            }
        }
    }

    async fn fetch_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
        let rows = match &self.endpoint {
            SheetEndpoint::WebApp { url } => {
                let body = self.get_text(self.client.get(url)).await?;
                parse_web_app(&body)?
            }
            SheetEndpoint::ValuesApi {
                spreadsheet_id,
                range,
                api_key,
            } => {
                let url = format!(
                    "{VALUES_API_BASE}/{spreadsheet_id}/values/{}",
                    range.replace(' ', "%20")
                );
                let request = self.client.get(&url).query(&[("key", api_key.as_str())]);
                let body = self.get_text(request).await?;
                parse_values_api(&body)?
            }
        };

        debug!(source = %self.describe(), rows = rows.len(), "Fetched sheet rows");
        Ok(rows)
    }
}

// ── Payload parsing ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WebAppPayload {
    success: bool,
    #[serde(default)]
    rows: Vec<WebAppRow>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebAppRow {
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    email: Option<Value>,
    #[serde(default)]
    company: Option<Value>,
    #[serde(default)]
    role: Option<Value>,
    #[serde(default)]
    phone: Option<Value>,
    #[serde(default)]
    source: Option<Value>,
}

/// Parse the Apps Script web app payload: `{"success", "rows", "error"?}`.
pub fn parse_web_app(body: &str) -> Result<Vec<SheetRow>, SheetError> {
    let payload: WebAppPayload =
        serde_json::from_str(body).map_err(|e| SheetError::Parse(e.to_string()))?;

    if !payload.success {
        return Err(SheetError::Remote(
            payload
                .error
                .unwrap_or_else(|| "web app returned success=false".to_string()),
        ));
    }

    Ok(payload
        .rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| SheetRow {
            row_number: i + 1,
            timestamp: cell_text(row.timestamp.as_ref()),
            name: cell_text(row.name.as_ref()),
            email: cell_text(row.email.as_ref()),
            company: cell_text(row.company.as_ref()),
            role: cell_text(row.role.as_ref()),
            phone: cell_text(row.phone.as_ref()),
            source: cell_text(row.source.as_ref()),
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ValuesPayload {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Column positions resolved from the header row.
#[derive(Debug, Default, PartialEq)]
struct ColumnMap {
    timestamp: Option<usize>,
    name: Option<usize>,
    email: Option<usize>,
    company: Option<usize>,
    role: Option<usize>,
    phone: Option<usize>,
    source: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[Value]) -> Self {
        let mut map = Self::default();
        for (i, cell) in header.iter().enumerate() {
            let Some(label) = cell_text(Some(cell)) else {
                continue;
            };
            let label = label.to_lowercase();
            let slot = if label.contains("email") {
                &mut map.email
            } else if label.contains("timestamp") || label == "time" || label == "date" {
                &mut map.timestamp
            } else if label.contains("company") || label.contains("organization") {
                &mut map.company
            } else if label.contains("role") || label.contains("title") {
                &mut map.role
            } else if label.contains("phone") {
                &mut map.phone
            } else if label.contains("source") {
                &mut map.source
            } else if label.contains("name") {
                &mut map.name
            } else {
                continue;
            };
            slot.get_or_insert(i);
        }
        map
    }

    /// Form-response layout: A = timestamp, B = email.
    fn form_default() -> Self {
        Self {
            timestamp: Some(0),
            email: Some(1),
            ..Self::default()
        }
    }
}

/// Parse a values API payload. The first row is treated as the header.
pub fn parse_values_api(body: &str) -> Result<Vec<SheetRow>, SheetError> {
    let payload: ValuesPayload =
        serde_json::from_str(body).map_err(|e| SheetError::Parse(e.to_string()))?;

    let mut values = payload.values.into_iter();
    let Some(header) = values.next() else {
        return Ok(Vec::new());
    };

    let mapped = ColumnMap::from_header(&header);
    let columns = if mapped.email.is_some() {
        mapped
    } else {
        ColumnMap::form_default()
    };

    let rows = values
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| cell_text(Some(c)).is_some()))
        .map(|(i, cells)| {
            let at = |idx: Option<usize>| idx.and_then(|col| cell_text(cells.get(col)));
            let email = at(columns.email);
            let name = at(columns.name).or_else(|| email.as_deref().and_then(name_from_email));
            SheetRow {
                row_number: i + 1,
                timestamp: at(columns.timestamp),
                name,
                email,
                company: at(columns.company),
                role: at(columns.role),
                phone: at(columns.phone),
                source: at(columns.source),
            }
        })
        .collect();

    Ok(rows)
}

/// Stringify a cell, treating blanks as absent.
fn cell_text(cell: Option<&Value>) -> Option<String> {
    let text = match cell? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Capitalised local part of an address, for forms that only collect email.
fn name_from_email(email: &str) -> Option<String> {
    let local = email.split('@').next()?.trim();
    let mut chars = local.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_app_rows_are_parsed_in_order() {
        let body = r#"{
            "success": true,
            "rows": [
                {"name": "Ada", "email": "ada@example.com", "company": "", "timestamp": "2026-03-01T10:00:00Z", "source": "website_form"},
                {"name": "Grace", "email": "grace@example.com", "phone": 5551234}
            ],
            "total": 2
        }"#;
        let rows = parse_web_app(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[0].company, None);
        assert_eq!(rows[0].source.as_deref(), Some("website_form"));
        assert_eq!(rows[1].phone.as_deref(), Some("5551234"));
        assert_eq!(rows[1].timestamp, None);
    }

    #[test]
    fn web_app_failure_is_remote_error() {
        let body = r#"{"success": false, "error": "Sheet not found"}"#;
        let err = parse_web_app(body).unwrap_err();
        assert!(matches!(err, SheetError::Remote(msg) if msg == "Sheet not found"));
    }

    #[test]
    fn malformed_payload_is_parse_error() {
        assert!(matches!(parse_web_app("<html>"), Err(SheetError::Parse(_))));
        assert!(matches!(parse_values_api("not json"), Err(SheetError::Parse(_))));
    }

    #[test]
    fn values_api_maps_columns_by_header() {
        let body = r#"{"values": [
            ["Timestamp", "Full Name", "Email Address", "Company", "Job Title", "Phone"],
            ["3/1/2026 10:00:00", "Ada Lovelace", "ada@example.com", "Acme", "CTO"],
            [],
            ["3/1/2026 11:00:00", "Grace Hopper", "grace@example.com", "", "", "555"]
        ]}"#;
        let rows = parse_values_api(body).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(rows[0].role.as_deref(), Some("CTO"));
        assert_eq!(rows[0].phone, None);
        assert_eq!(rows[0].row_number, 1);

        assert_eq!(rows[1].company, None);
        assert_eq!(rows[1].phone.as_deref(), Some("555"));
        assert_eq!(rows[1].row_number, 3);
    }

    #[test]
    fn values_api_falls_back_to_form_layout() {
        let body = r#"{"values": [
            ["When", "Contact"],
            ["3/1/2026 10:00:00", "ada@example.com"]
        ]}"#;
        let rows = parse_values_api(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp.as_deref(), Some("3/1/2026 10:00:00"));
        assert_eq!(rows[0].email.as_deref(), Some("ada@example.com"));
        assert_eq!(rows[0].name.as_deref(), Some("Ada"));
    }

    #[test]
    fn values_api_empty_sheet() {
        assert!(parse_values_api("{}").unwrap().is_empty());
        assert!(parse_values_api(r#"{"values": [["Email"]]}"#).unwrap().is_empty());
    }

    #[test]
    fn describe_names_the_endpoint() {
        let source = HttpSheetSource::new(SheetEndpoint::ValuesApi {
            spreadsheet_id: "abc".into(),
            range: "Sheet1!A:G".into(),
            api_key: "k".into(),
        });
        assert_eq!(source.describe(), "google_sheets:abc/Sheet1!A:G");
    }
}
