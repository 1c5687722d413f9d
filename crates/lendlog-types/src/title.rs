/// Entities produced by the spreadsheet/HTML tooling that has historically
/// touched catalog and ledger text.
const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#039;", "'"),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

/// Canonical form of free text used as a join key (book titles, borrowers).
///
/// Trims surrounding whitespace and decodes the basic HTML entities. The
/// same function runs on the catalog load path, the ledger append path and
/// the ledger read path, so `"Tom &amp; Jerry"` in an old export joins
/// with `"Tom & Jerry"` typed into the form. Case is preserved: matching
/// stays case-sensitive.
pub fn normalize_title(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains('&') {
        return trimmed.to_string();
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut rest = trimmed;
    'scan: while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        for (entity, decoded) in ENTITIES {
            if let Some(tail) = rest.strip_prefix(entity) {
                out.push_str(decoded);
                rest = tail;
                continue 'scan;
            }
        }
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}
