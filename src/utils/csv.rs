/// A parsed CSV document: one header row plus data rows. Quoting follows
/// the usual rules (fields wrapped in double quotes, `""` escapes a quote).
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Index of a header, matched case-insensitively after trimming.
    pub fn header_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name))
    }
}

/// Parse CSV text into a table. Returns `None` when there is no header
/// row. Blank lines are skipped; short rows read as empty fields.
pub fn parse(text: &str) -> Option<CsvTable> {
    let mut lines = text.lines();
    let header_line = loop {
        let line = lines.next()?;
        if !line.trim().is_empty() {
            break line;
        }
    };

    let headers = parse_line(header_line);
    let rows = lines
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect();

    Some(CsvTable { headers, rows })
}

fn parse_line(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote.
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == ',' {
            result.push(current.clone());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    result.push(current);
    result
}
