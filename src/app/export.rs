use time::OffsetDateTime;

use crate::app::lifecycle::format_ts;
use crate::domain::blacklist::BlacklistEntry;

/// Plain-text export: one header line, then one pipe-delimited line per
/// entry.
pub fn export_txt(community_id: &str, entries: &[BlacklistEntry]) -> String {
    let mut out = format!(
        "blacklist export | community {} | {} entries | generated {}\n",
        community_id,
        entries.len(),
        format_ts(OffsetDateTime::now_utc())
    );
    for entry in entries {
        out.push_str(&format!(
            "{} | {} | {} | {} | {} | {}",
            entry.case_id,
            entry.user_id,
            entry.category,
            entry.reason,
            entry.accepted_by,
            format_ts(entry.created_at)
        ));
        if let Some(expires_at) = entry.expires_at {
            out.push_str(&format!(" | {}", format_ts(expires_at)));
        }
        out.push('\n');
    }
    out
}

/// CSV export with every field quoted and embedded quotes doubled.
pub fn export_csv(entries: &[BlacklistEntry]) -> String {
    let mut out = String::from(
        "\"Case ID\",\"User ID\",\"Category\",\"Reason\",\"Accepted By\",\"Created At\",\"Expires At\"\n",
    );
    for entry in entries {
        let fields = [
            entry.case_id.clone(),
            entry.user_id.clone(),
            entry.category.clone(),
            entry.reason.clone(),
            entry.accepted_by.clone(),
            format_ts(entry.created_at),
            entry.expires_at.map(format_ts).unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| quote_csv(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn quote_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
