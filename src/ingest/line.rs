use std::mem::take;

const BOM: char = '\u{FEFF}';

/// Split one CSV line into fields. Quoted commas stay inside their field and
/// `""` inside quotes becomes a literal `"`. Never fails: ragged or unbalanced
/// input gives back whatever fields were found.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => fields.push(take(&mut field)),
            _ => field.push(ch),
        }
    }

    fields.push(field);
    fields
}

/// Drop a stray leading `"` that does not open a real quoted field, i.e. the
/// first comma comes before the next quote.
pub fn fix_malformed_leading_quote(line: &str) -> &str {
    let Some(rest) = line.strip_prefix('"') else {
        return line;
    };

    match (line.find(','), rest.find('"').map(|i| i + 1)) {
        (Some(comma), Some(next_quote)) if comma < next_quote => rest,
        _ => line,
    }
}

pub fn strip_bom(line: &str) -> &str {
    line.strip_prefix(BOM).unwrap_or(line)
}
