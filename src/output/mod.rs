//! CSV rendering and destinations.

use crate::models::{COLUMNS, ChainRow};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Header line plus one line per row, `\n` terminated. Fields are written
/// as-is: no quoting, no escaping.
pub fn encode(rows: &[ChainRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(COLUMNS)?;
    for row in rows {
        writer
            .write_record(row.to_record())
            .with_context(|| format!("encode row {} ({})", row.row, row.contract))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flush CSV buffer: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Where the finished document goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    pub fn write(&self, document: &str) -> Result<()> {
        match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(document.as_bytes())?;
                out.flush()?;
            }
            Self::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Could not create dir {:?}", parent))?;
                }
                std::fs::write(path, document)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                info!("Wrote {:?}", path);
            }
        }
        Ok(())
    }
}

/// `<root>-ivol-<YYYYMMDD>.csv`
pub fn export_file_name(root: &str, trade_date: NaiveDate) -> String {
    format!("{}-ivol-{}.csv", root, trade_date.format("%Y%m%d"))
}

pub fn export_path(dir: &Path, root: &str, trade_date: NaiveDate) -> PathBuf {
    dir.join(export_file_name(root, trade_date))
}
