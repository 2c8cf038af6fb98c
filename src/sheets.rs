#![cfg(not(tarpaulin_include))]

use chrono::FixedOffset;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::response::Response;

/// Worksheet title inside the mirrored workbook.
pub const SHEET_NAME: &str = "回應資料";

/// Header row of the mirrored workbook, one column per exported field.
pub const HEADERS: [&str; 16] = [
    "提交時間",
    "身份",
    "電子郵件",
    "商家名稱",
    "個資同意",
    "合作意向",
    "聯絡人姓名",
    "聯絡電話",
    "統一編號",
    "資訊來源",
    "推薦意願",
    "不考慮原因",
    "合作時間",
    "新顧客數量",
    "滿意度評分",
    "推薦評分",
];

/// Mirrors submissions into a spreadsheet workbook.
///
/// This is the stand-in for the external spreadsheet service: the same
/// find-or-create/append contract, but writing a local `.xlsx` file. Since
/// xlsx files can only be written whole, the accumulated rows live in a
/// JSON sidecar next to the workbook and the workbook is regenerated on
/// every append.
pub struct SheetMirror {
    workbook_path: PathBuf,
    rows_path: PathBuf,
    /// Serializes appends; two submissions must not interleave a
    /// read-modify-write of the sidecar.
    lock: Mutex<()>,
}

impl SheetMirror {
    pub fn new(workbook_path: impl Into<PathBuf>) -> Self {
        let workbook_path = workbook_path.into();
        let rows_path = workbook_path.with_extension("rows.json");
        SheetMirror {
            workbook_path,
            rows_path,
            lock: Mutex::new(()),
        }
    }

    pub fn workbook_path(&self) -> &Path {
        &self.workbook_path
    }

    /// Append one submission to the workbook.
    ///
    /// Find-or-create semantics: a missing workbook (or sidecar) starts a
    /// fresh sheet with just the header row. The caller is expected to run
    /// this off the request path and only log failures.
    pub fn append_response(&self, response: &Response) -> Result<(), Box<dyn Error>> {
        let _guard = self.lock.lock().unwrap();

        let mut rows = self.load_rows()?;
        rows.push(format_row(response));

        std::fs::write(&self.rows_path, serde_json::to_string(&rows)?)?;
        self.write_workbook(&rows)?;

        Ok(())
    }

    /// Rows currently mirrored, header excluded. Empty when the workbook
    /// has not been created yet.
    pub fn load_rows(&self) -> Result<Vec<Vec<String>>, Box<dyn Error>> {
        if !self.rows_path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.rows_path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the full workbook: formatted header row plus all data rows.
    fn write_workbook(&self, rows: &[Vec<String>]) -> Result<(), Box<dyn Error>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        // Header row: white bold 11pt on black, centered.
        let header_format = Format::new()
            .set_bold()
            .set_font_size(11)
            .set_font_color(Color::White)
            .set_background_color(Color::Black)
            .set_align(FormatAlign::Center);

        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_with_format(0, col as u16, *header, &header_format)?;
        }

        for (row_idx, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                worksheet.write((row_idx + 1) as u32, col as u16, value.as_str())?;
            }
        }

        worksheet.autofit();
        workbook.save(&self.workbook_path)?;

        Ok(())
    }
}

/// Format one submission as a spreadsheet row, columns as in [`HEADERS`].
pub fn format_row(response: &Response) -> Vec<String> {
    vec![
        format_timestamp(response),
        response.identity.label_zh().to_string(),
        response.email.clone(),
        response.business_name.clone(),
        if response.privacy_consent == "yes" {
            "同意".to_string()
        } else {
            "不同意".to_string()
        },
        response
            .intention
            .map(|i| i.label_zh().to_string())
            .unwrap_or_default(),
        response.contact_name.clone(),
        response.contact_phone.clone(),
        response.tax_id.clone(),
        response.info_source.join(", "),
        response.referral.clone().unwrap_or_default(),
        not_interested_column(response),
        response
            .cooperation_duration
            .map(|d| d.label_zh().to_string())
            .unwrap_or_default(),
        response
            .new_customer_count
            .map(|n| n.to_string())
            .unwrap_or_default(),
        response
            .satisfaction_rating
            .map(|r| r.to_string())
            .unwrap_or_default(),
        response
            .recommend_rating
            .map(|r| r.to_string())
            .unwrap_or_default(),
    ]
}

fn not_interested_column(response: &Response) -> String {
    let mut parts: Vec<String> = response.not_interested_reasons.clone();
    if !response.not_interested_other.is_empty() {
        parts.push(format!("其他: {}", response.not_interested_other));
    }
    parts.join(", ")
}

/// Submission time in Taipei local time, `YYYY/MM/DD HH:MM:SS`.
fn format_timestamp(response: &Response) -> String {
    let taipei = FixedOffset::east_opt(8 * 3600).expect("fixed offset in range");
    response
        .submitted_at
        .with_timezone(&taipei)
        .format("%Y/%m/%d %H:%M:%S")
        .to_string()
}
