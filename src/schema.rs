/// Quote a SQL identifier for direct interpolation into DDL.
pub fn quote_ident(value: &str) -> String {
    let escaped = value.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Derive the conventional table name from a camel-case type name
/// (`PurchaseOrder` -> `purchase_order`). Table names are explicit
/// configuration; this helper exists for callers who want the conventional
/// mapping without spelling it out.
pub fn derived_table_name(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len() + 4);
    let mut prev_lower = false;
    for ch in type_name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        } else {
            prev_lower = false;
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}
