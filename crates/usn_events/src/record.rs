use crate::block::Block;
use crate::error::DecodeError;
use crate::reason::{format_reason_flags, ReasonFlag};
use crate::sink::SinkRecord;

/// Header keys as fsutil prints them, one per line.
pub const HEADER_KEYS: [&str; 6] = [
    "USN Journal ID",
    "First USN",
    "Next USN",
    "Start USN",
    "Min major version",
    "Max major version",
];

/// Change-record keys of the v3.0 schema.
pub const RECORD_KEYS_V3: [&str; 13] = [
    "Usn",
    "File name",
    "File name length",
    "Reason",
    "Time stamp",
    "File attributes",
    "File ID",
    "Parent file ID",
    "Source info",
    "Security ID",
    "Major version",
    "Minor version",
    "Record length",
];

/// Literal error text the capture tool emits in place of a header when it
/// lacks the privilege to open the journal.
pub const ACCESS_DENIED_TEXT: &str = "Access is denied.";

/// Journal metadata from the first block of a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalHeader {
    pub journal_id: u64,
    pub first_usn: u64,
    pub next_usn: u64,
    pub start_usn: u64,
    pub min_major_version: u32,
    pub max_major_version: u32,
}

/// One decoded change record, with its session header attached by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub header: JournalHeader,
    pub usn: u64,
    pub file_name: String,
    pub file_name_length: u32,
    pub reason_mask: u32,
    pub timestamp: String,
    pub file_attributes: u32,
    pub file_attributes_raw: String,
    pub file_id: String,
    pub parent_file_id: String,
    pub source_info: u32,
    pub source_info_raw: String,
    pub security_id: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub record_length: u32,
    /// Lines whose key is not part of the v3.0 schema, kept verbatim so a
    /// newer record version never fails the decode.
    pub extra: Vec<(String, String)>,
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(key, value)| (key.trim(), value.trim()))
}

fn parse_u64(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Extracts the leading mask from values like `0x00000100: File create`.
fn leading_mask(value: &str) -> Option<u32> {
    let token = match value.split_once(':') {
        Some((token, _)) => token,
        None => value,
    };
    parse_u32(token)
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn block_pairs(block: &Block) -> Vec<(String, String)> {
    block
        .lines
        .iter()
        .filter_map(|line| split_key_value(line))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Decodes the header block of a capture session.
///
/// All six header keys must be present and numeric (decimal or `0x` hex).
/// A block carrying the tool's access-denied error text is reclassified as
/// [`DecodeError::PermissionDenied`]: the capture source itself failed, and
/// retrying without elevated privileges cannot succeed.
pub fn decode_header(block: &Block) -> Result<JournalHeader, DecodeError> {
    if let Some(line) = block
        .lines
        .iter()
        .find(|line| line.contains(ACCESS_DENIED_TEXT))
    {
        return Err(DecodeError::PermissionDenied {
            detail: line.trim().to_string(),
        });
    }

    let pairs = block_pairs(block);
    let malformed = |reason: String| DecodeError::MalformedHeader {
        reason,
        block: block.lines.clone(),
    };
    for key in HEADER_KEYS {
        if lookup(&pairs, key).is_none() {
            return Err(malformed(format!("missing `{key}`")));
        }
    }
    let field_u64 = |key: &str| -> Result<u64, DecodeError> {
        let value = lookup(&pairs, key).ok_or_else(|| malformed(format!("missing `{key}`")))?;
        parse_u64(value).ok_or_else(|| malformed(format!("invalid `{key}` value `{value}`")))
    };
    let field_u32 = |key: &str| -> Result<u32, DecodeError> {
        let value = lookup(&pairs, key).ok_or_else(|| malformed(format!("missing `{key}`")))?;
        parse_u32(value).ok_or_else(|| malformed(format!("invalid `{key}` value `{value}`")))
    };

    Ok(JournalHeader {
        journal_id: field_u64("USN Journal ID")?,
        first_usn: field_u64("First USN")?,
        next_usn: field_u64("Next USN")?,
        start_usn: field_u64("Start USN")?,
        min_major_version: field_u32("Min major version")?,
        max_major_version: field_u32("Max major version")?,
    })
}

/// Decodes one change-record block under `header`.
///
/// `Usn` and `Reason` are required; a record missing either (or carrying a
/// zero reason mask, which would decode to nothing) is a
/// [`DecodeError::MalformedRecord`] and gets skipped by the caller. Every
/// other field defaults benignly, so corruption of one field never drops an
/// otherwise-decodable record. Keys outside the v3.0 schema are collected
/// into `extra` instead of failing the decode.
pub fn decode_record(block: &Block, header: &JournalHeader) -> Result<ChangeRecord, DecodeError> {
    let pairs = block_pairs(block);
    let malformed = |field: &'static str| DecodeError::MalformedRecord {
        field,
        block: block.lines.clone(),
    };

    let usn = lookup(&pairs, "Usn")
        .and_then(parse_u64)
        .ok_or_else(|| malformed("Usn"))?;
    let reason_raw = lookup(&pairs, "Reason").ok_or_else(|| malformed("Reason"))?;
    let reason_mask = leading_mask(reason_raw).ok_or_else(|| malformed("Reason"))?;
    if reason_mask == 0 {
        return Err(malformed("Reason"));
    }

    let text = |key: &str| lookup(&pairs, key).unwrap_or_default().to_string();
    let number = |key: &str| lookup(&pairs, key).and_then(parse_u32).unwrap_or_default();
    let masked = |key: &str| lookup(&pairs, key).and_then(leading_mask).unwrap_or_default();

    let extra = pairs
        .iter()
        .filter(|(key, _)| !RECORD_KEYS_V3.contains(&key.as_str()))
        .cloned()
        .collect();

    Ok(ChangeRecord {
        header: header.clone(),
        usn,
        file_name: text("File name"),
        file_name_length: number("File name length"),
        reason_mask,
        timestamp: text("Time stamp"),
        file_attributes: masked("File attributes"),
        file_attributes_raw: text("File attributes"),
        file_id: text("File ID"),
        parent_file_id: text("Parent file ID"),
        source_info: masked("Source info"),
        source_info_raw: text("Source info"),
        security_id: number("Security ID"),
        major_version: number("Major version"),
        minor_version: number("Minor version"),
        record_length: number("Record length"),
        extra,
    })
}

impl ChangeRecord {
    /// Flattens the record, its header context, and the decoded reasons
    /// into the field-name to string-value mapping delivered to the sink.
    pub fn into_sink_fields(self, reasons: &[ReasonFlag]) -> SinkRecord {
        let mut rec = SinkRecord::default();
        rec.insert("Usn", self.usn.to_string());
        rec.insert("File name", self.file_name);
        rec.insert("File name length", self.file_name_length.to_string());
        rec.insert(
            "Reason",
            format!("0x{:08x}: {}", self.reason_mask, format_reason_flags(reasons)),
        );
        rec.insert("Time stamp", self.timestamp);
        rec.insert("File attributes", self.file_attributes_raw);
        rec.insert("File ID", self.file_id);
        rec.insert("Parent file ID", self.parent_file_id);
        rec.insert("Source info", self.source_info_raw);
        rec.insert("Security ID", self.security_id.to_string());
        rec.insert("Major version", self.major_version.to_string());
        rec.insert("Minor version", self.minor_version.to_string());
        rec.insert("Record length", self.record_length.to_string());

        rec.insert("USN Journal ID", format!("0x{:016x}", self.header.journal_id));
        rec.insert("First USN", self.header.first_usn.to_string());
        rec.insert("Next USN", self.header.next_usn.to_string());
        rec.insert("Start USN", self.header.start_usn.to_string());
        rec.insert(
            "Min major version",
            self.header.min_major_version.to_string(),
        );
        rec.insert(
            "Max major version",
            self.header.max_major_version.to_string(),
        );

        for (key, value) in self.extra {
            rec.insert(key, value);
        }
        rec
    }
}
