//! CSV, Excel and printable exports of farmer and engagement lists.
//!
//! "Excel" is the CSV body served under an `.xls` name, which spreadsheet
//! applications open directly. The printable form is a standalone HTML page
//! that opens the print dialog on load so it can be saved as PDF.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use agrodesk_core::{
    Area, AreaFilter, AreaId, Engagement, Farmer, FarmerFilter, FarmerId, Product, ProductFilter,
    ProductId, Village, VillageFilter, VillageId, Zone, ZoneFilter, ZoneId,
};
use chrono::{Local, NaiveDate};
use thiserror::Error;

use crate::client::Client;
use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data to export")]
    NoData,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
    PrintableHtml,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "xls",
            Self::PrintableHtml => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv;charset=utf-8",
            Self::Excel => "application/vnd.ms-excel",
            Self::PrintableHtml => "text/html;charset=utf-8",
        }
    }
}

/// A rendered export, ready to hand to the user or write to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

impl ExportArtifact {
    /// Write into `dir`, creating it if needed. Returns the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.body).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), bytes = self.body.len(), "export written");
        Ok(path)
    }
}

/// Id to display-name lookup for the references an export row carries.
/// Unknown ids render as empty cells.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub zones: HashMap<ZoneId, String>,
    pub areas: HashMap<AreaId, String>,
    pub villages: HashMap<VillageId, String>,
    pub farmers: HashMap<FarmerId, String>,
    pub products: HashMap<ProductId, String>,
}

impl Directory {
    /// Load every name, active or not; exports of old records still need them.
    pub fn load(client: &Client) -> Result<Self, EngineError> {
        let zones: Vec<Zone> = client.get_all(&ZoneFilter::default())?;
        let areas: Vec<Area> = client.get_all(&AreaFilter::default())?;
        let villages: Vec<Village> = client.get_all(&VillageFilter::default())?;
        let farmers: Vec<Farmer> = client.get_all(&FarmerFilter::default())?;
        let products: Vec<Product> = client.get_all(&ProductFilter::default())?;
        Ok(Self {
            zones: zones.into_iter().map(|z| (z.id, z.name)).collect(),
            areas: areas.into_iter().map(|a| (a.id, a.name)).collect(),
            villages: villages.into_iter().map(|v| (v.id, v.name)).collect(),
            farmers: farmers.into_iter().map(|f| (f.id, f.name)).collect(),
            products: products.into_iter().map(|p| (p.id, p.name)).collect(),
        })
    }

    fn name<K: std::hash::Hash + Eq>(map: &HashMap<K, String>, id: Option<K>) -> String {
        id.and_then(|id| map.get(&id).cloned()).unwrap_or_default()
    }
}

/// Headers plus stringified rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render with today's date in the file name.
    pub fn export(&self, format: ExportFormat) -> Result<ExportArtifact, ExportError> {
        self.export_dated(format, Local::now().date_naive())
    }

    pub fn export_dated(
        &self,
        format: ExportFormat,
        date: NaiveDate,
    ) -> Result<ExportArtifact, ExportError> {
        if self.is_empty() {
            tracing::debug!(title = %self.title, "nothing to export");
            return Err(ExportError::NoData);
        }
        let body = match format {
            ExportFormat::Csv | ExportFormat::Excel => render_csv(&self.headers, &self.rows),
            ExportFormat::PrintableHtml => render_printable(&self.title, date, &self.headers, &self.rows),
        };
        Ok(ExportArtifact {
            file_name: format!(
                "{}_{}.{}",
                slug(&self.title),
                date.format("%Y-%m-%d"),
                format.extension()
            ),
            content_type: format.content_type(),
            body,
        })
    }
}

pub const FARMER_HEADERS: [&str; 11] = [
    "Name",
    "Father Name",
    "Phone",
    "Village",
    "Area",
    "Zone",
    "Land (acres)",
    "Crops",
    "Lead Score",
    "Lead Quality",
    "Customer",
];

pub const ENGAGEMENT_HEADERS: [&str; 8] = [
    "Farmer",
    "Product",
    "Season",
    "Source",
    "Stage",
    "Active",
    "Total Purchases",
    "Closure Reason",
];

pub fn farmer_table(farmers: &[Farmer], directory: &Directory) -> Table {
    let rows = farmers
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                f.father_name.clone().unwrap_or_default(),
                f.phone.clone(),
                Directory::name(&directory.villages, f.village_id),
                Directory::name(&directory.areas, f.area_id),
                Directory::name(&directory.zones, f.zone_id),
                f.land_acres.map(|a| a.to_string()).unwrap_or_default(),
                f.primary_crops.clone().unwrap_or_default(),
                f.lead_score.to_string(),
                f.lead_quality.map(|q| q.to_string()).unwrap_or_default(),
                yes_no(f.is_customer),
            ]
        })
        .collect();
    Table {
        title: "Farmers".to_string(),
        headers: FARMER_HEADERS.to_vec(),
        rows,
    }
}

pub fn engagement_table(engagements: &[Engagement], directory: &Directory) -> Table {
    let rows = engagements
        .iter()
        .map(|e| {
            vec![
                Directory::name(&directory.farmers, Some(e.farmer_id)),
                Directory::name(&directory.products, Some(e.product_id)),
                e.season.clone(),
                e.data_source.to_string(),
                e.lead_stage.label().to_string(),
                yes_no(e.is_active),
                e.total_purchases.map(|t| t.to_string()).unwrap_or_default(),
                e.closure_reason.clone().unwrap_or_default(),
            ]
        })
        .collect();
    Table {
        title: "Engagements".to_string(),
        headers: ENGAGEMENT_HEADERS.to_vec(),
        rows,
    }
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "Yes" } else { "No" };
    label.to_string()
}

fn slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Quote a field when it contains a comma, quote, CR or LF.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| csv_field(h)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

pub fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn render_printable(
    title: &str,
    date: NaiveDate,
    headers: &[&str],
    rows: &[Vec<String>],
) -> String {
    let title = html_escape(title);
    let mut table = String::from("<table>\n<thead><tr>");
    for h in headers {
        table.push_str(&format!("<th>{}</th>", html_escape(h)));
    }
    table.push_str("</tr></thead>\n<tbody>\n");
    for row in rows {
        table.push_str("<tr>");
        for cell in row {
            table.push_str(&format!("<td>{}</td>", html_escape(cell)));
        }
        table.push_str("</tr>\n");
    }
    table.push_str("</tbody>\n</table>");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 24px; }}
table {{ border-collapse: collapse; width: 100%; font-size: 12px; }}
th, td {{ border: 1px solid #999; padding: 4px 6px; text-align: left; }}
th {{ background: #eee; }}
</style>
</head>
<body onload="window.print()">
<h1>{title}</h1>
<p>Generated on {date}</p>
{table}
</body>
</html>
"#,
        date = date.format("%d %b %Y"),
    )
}

#[cfg(test)]
mod tests {
    use agrodesk_core::FarmerDraft;

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Doe, John"), "\"Doe, John\"");
        assert_eq!(csv_field("5\" pipe"), "\"5\"\" pipe\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn empty_table_is_no_data() {
        let table = farmer_table(&[], &Directory::default());
        let err = table.export_dated(ExportFormat::Csv, date()).unwrap_err();
        assert!(matches!(err, ExportError::NoData));
        assert_eq!(err.to_string(), "No data to export");
    }

    #[test]
    fn excel_reuses_csv_body() {
        let client = Client::open_in_memory().unwrap();
        let farmer: Farmer = client.create(FarmerDraft::new("Ravi", "9000000001")).unwrap();
        let table = farmer_table(&[farmer], &Directory::default());

        let csv = table.export_dated(ExportFormat::Csv, date()).unwrap();
        let xls = table.export_dated(ExportFormat::Excel, date()).unwrap();
        assert_eq!(csv.body, xls.body);
        assert_eq!(csv.file_name, "farmers_2026-03-14.csv");
        assert_eq!(xls.file_name, "farmers_2026-03-14.xls");
        assert_eq!(xls.content_type, "application/vnd.ms-excel");
    }

    #[test]
    fn printable_escapes_cells() {
        let html = render_printable(
            "Farmers",
            date(),
            &["Name"],
            &[vec!["<b>Ravi & Sons</b>".to_string()]],
        );
        assert!(html.contains("<td>&lt;b&gt;Ravi &amp; Sons&lt;/b&gt;</td>"));
        assert!(html.contains("window.print()"));
        assert!(html.contains("Generated on 14 Mar 2026"));
    }

    #[test]
    fn unknown_references_render_empty() {
        let mut farmer = Client::open_in_memory()
            .unwrap()
            .create::<Farmer>(FarmerDraft::new("Ravi", "9000000001"))
            .unwrap();
        farmer.zone_id = Some(ZoneId::new());
        let table = farmer_table(&[farmer], &Directory::default());
        assert_eq!(table.rows[0][5], "");
    }

    #[test]
    fn write_to_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ExportArtifact {
            file_name: "farmers_2026-03-14.csv".to_string(),
            content_type: ExportFormat::Csv.content_type(),
            body: "Name\nRavi\n".to_string(),
        };
        let path = artifact.write_to(&dir.path().join("out")).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Name\nRavi\n");
    }
}
