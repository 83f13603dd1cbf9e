use std::fmt;

/// USN reason flags with fsutil's display strings.
///
/// Declaration order is significant: decoded flags are reported in this
/// order, not in bit-value order, and `Close` is deliberately last.
pub const REASON_FLAGS: [(u32, &str); 22] = [
    (0x0000_0001, "Data overwrite"),
    (0x0000_0002, "Data extend"),
    (0x0000_0004, "Data truncation"),
    (0x0000_0010, "Named data overwrite"),
    (0x0000_0020, "Named data extend"),
    (0x0000_0040, "Named data truncation"),
    (0x0000_0100, "File create"),
    (0x0000_0200, "File delete"),
    (0x0000_0400, "EA change"),
    (0x0000_0800, "Security change"),
    (0x0000_1000, "Rename: old name"),
    (0x0000_2000, "Rename: new name"),
    (0x0000_4000, "Indexable change"),
    (0x0000_8000, "Basic info change"),
    (0x0001_0000, "Hard link change"),
    (0x0002_0000, "Compression change"),
    (0x0004_0000, "Encryption change"),
    (0x0008_0000, "Object ID change"),
    (0x0010_0000, "Reparse point change"),
    (0x0020_0000, "Stream change"),
    (0x0040_0000, "Transacted change"),
    (0x8000_0000, "Close"),
];

/// One decoded reason. `Residual` carries the bits the table does not know
/// about so they are surfaced instead of silently discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonFlag {
    Known(&'static str),
    Residual(u32),
}

impl fmt::Display for ReasonFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonFlag::Known(description) => f.write_str(description),
            ReasonFlag::Residual(bits) => write!(f, "0x{bits:08x}"),
        }
    }
}

/// Decodes a reason bitmask into the ordered set of flags it encodes.
///
/// Each table entry whose bit is set contributes one flag, in declaration
/// order; any bits left over after the scan are appended as a single
/// `Residual` entry. `decode_reason_mask(0)` is empty.
pub fn decode_reason_mask(mask: u32) -> Vec<ReasonFlag> {
    let mut flags = Vec::new();
    let mut residual = mask;
    for (bit, description) in REASON_FLAGS {
        if mask & bit != 0 {
            flags.push(ReasonFlag::Known(description));
            residual &= !bit;
        }
    }
    if residual != 0 {
        flags.push(ReasonFlag::Residual(residual));
    }
    flags
}

/// Joins decoded flags for display, `", "`-separated.
pub fn format_reason_flags(flags: &[ReasonFlag]) -> String {
    let mut out = String::new();
    for (idx, flag) in flags.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        out.push_str(&flag.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mask_decodes_to_nothing() {
        assert!(decode_reason_mask(0).is_empty());
    }

    #[test]
    fn single_bits_map_to_their_descriptions() {
        assert_eq!(
            decode_reason_mask(0x0000_0100),
            vec![ReasonFlag::Known("File create")]
        );
        assert_eq!(
            decode_reason_mask(0x8000_0000),
            vec![ReasonFlag::Known("Close")]
        );
    }

    #[test]
    fn flags_follow_declaration_order_not_bit_order() {
        // Close (0x80000000) is declared after File create (0x100).
        let flags = decode_reason_mask(0x8000_0100);
        assert_eq!(
            flags,
            vec![ReasonFlag::Known("File create"), ReasonFlag::Known("Close")]
        );
    }

    #[test]
    fn unknown_bits_become_a_residual_entry() {
        // 0x01000000 is not in the table.
        let flags = decode_reason_mask(0x0100_0102);
        assert_eq!(
            flags,
            vec![
                ReasonFlag::Known("Data extend"),
                ReasonFlag::Known("File create"),
                ReasonFlag::Residual(0x0100_0000),
            ]
        );
    }

    #[test]
    fn residual_only_mask_still_surfaces() {
        assert_eq!(
            decode_reason_mask(0x0100_0000),
            vec![ReasonFlag::Residual(0x0100_0000)]
        );
    }

    #[test]
    fn every_table_bit_decodes_and_accounts_for_the_full_mask() {
        let mut all = 0u32;
        for (bit, _) in REASON_FLAGS {
            all |= bit;
        }
        let flags = decode_reason_mask(all);
        assert_eq!(flags.len(), REASON_FLAGS.len());
        assert!(!flags.iter().any(|f| matches!(f, ReasonFlag::Residual(_))));
    }

    #[test]
    fn display_joins_with_commas_and_renders_residual_as_hex() {
        let rendered = format_reason_flags(&decode_reason_mask(0x0100_0102));
        assert_eq!(rendered, "Data extend, File create, 0x01000000");
    }
}
