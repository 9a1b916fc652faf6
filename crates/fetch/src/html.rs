use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// A table lifted out of a parsed document: trimmed header texts plus the
/// per-cell line groups of every data row.
#[derive(Clone, Debug)]
pub struct TableData {
    pub headers: Vec<String>,
    /// Each row is a vector of cells; each cell is its non-empty text lines.
    pub rows: Vec<Vec<Vec<String>>>,
}

impl TableData {
    /// Flattened single-line text of a cell (lines joined by a space).
    pub fn cell_text(&self, row: usize, col: usize) -> Option<String> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|lines| lines.join(" "))
    }

    /// Multiline text of a cell (lines joined by newline), as scraped.
    pub fn cell_lines(&self, row: usize, col: usize) -> Option<String> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|lines| lines.join("\n"))
    }
}

fn sel(css: &str) -> Selector {
    // Selectors are compile-time literals throughout this module.
    Selector::parse(css).unwrap_or_else(|_| panic!("invalid selector: {css}"))
}

/// All non-empty trimmed text lines under an element, in document order.
pub fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .flat_map(|t| t.lines())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Full text of an element with original line structure preserved.
pub fn element_text(element: ElementRef<'_>) -> String {
    text_lines(element).join("\n")
}

/// Header texts of a table: the cells of its first row.
pub fn table_headers(table: ElementRef<'_>) -> Vec<String> {
    let row_sel = sel("tr");
    let cell_sel = sel("th, td");
    let Some(first_row) = table.select(&row_sel).next() else {
        return Vec::new();
    };
    first_row
        .select(&cell_sel)
        .map(|c| c.text().collect::<String>().trim().to_string())
        .collect()
}

/// Lift a table element into rows of per-cell line groups, skipping the
/// header row.
pub fn table_data(table: ElementRef<'_>) -> TableData {
    let row_sel = sel("tr");
    let cell_sel = sel("th, td");

    let headers = table_headers(table);
    let rows = table
        .select(&row_sel)
        .skip(1)
        .map(|row| row.select(&cell_sel).map(text_lines).collect())
        .collect();

    TableData { headers, rows }
}

/// First table under `root` whose header row satisfies the predicate.
/// Column positions are discovered by header name, never fixed offsets.
pub fn find_table_by_headers<'a, F>(root: ElementRef<'a>, predicate: F) -> Option<ElementRef<'a>>
where
    F: Fn(&[String]) -> bool,
{
    let table_sel = sel("table");
    root.select(&table_sel)
        .find(|table| predicate(&table_headers(*table)))
}

/// Index of the first header matching `needle` (case-insensitive contains).
pub fn column_index(headers: &[String], needle: &str) -> Option<usize> {
    let needle = needle.to_lowercase();
    headers
        .iter()
        .position(|h| h.to_lowercase().contains(&needle))
}

/// Index of the header exactly equal to `needle` (case-insensitive).
pub fn column_index_exact(headers: &[String], needle: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(needle))
}

/// Locate a section by element id, falling back to the first heading whose
/// text satisfies the predicate. The returned element scopes subsequent
/// searches; for a heading match that is its parent subtree.
pub fn find_section<'a, F>(
    document: &'a Html,
    id: &str,
    heading_predicate: F,
) -> Option<ElementRef<'a>>
where
    F: Fn(&str) -> bool,
{
    let id_sel = Selector::parse(&format!("[id=\"{id}\"]")).ok()?;
    if let Some(found) = document.select(&id_sel).next() {
        // Scope to the surrounding container so the section's table is in
        // reach even when the id sits on the heading itself.
        return found.parent().and_then(ElementRef::wrap).or(Some(found));
    }

    let heading_sel = sel("h1, h2, h3, h4");
    for heading in document.select(&heading_sel) {
        let text = heading.text().collect::<String>();
        if heading_predicate(text.trim()) {
            return heading.parent().and_then(ElementRef::wrap);
        }
    }
    None
}

/// Split a modality line like "Audio, video, and text" into its tokens.
pub fn split_modality_line(line: &str) -> Vec<String> {
    let splitter = Regex::new(r"(?i)[,&]|\band\b").expect("modality splitter");
    let mut tokens = Vec::new();
    for part in splitter.split(line) {
        let part = part.trim().trim_end_matches('.').trim();
        if !part.is_empty() && !tokens.iter().any(|t: &String| t.eq_ignore_ascii_case(part)) {
            tokens.push(part.to_string());
        }
    }
    tokens
}

/// Parse a "Supported data types" block: any text containing both an
/// "Inputs" and an "Output" label, in either `Label\nvalue` or
/// `Label: value` form. Returns ordered (inputs, outputs) token lists.
pub fn parse_supported_data_types(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let inputs = extract_labeled_line(text, "inputs")?;
    let outputs = extract_labeled_line(text, "output")?;
    Some((split_modality_line(&inputs), split_modality_line(&outputs)))
}

fn extract_labeled_line(text: &str, label: &str) -> Option<String> {
    // "Inputs\nAudio, video, text": label alone on its line, value on the
    // next. The label line must carry no content of its own, or a bare
    // colon-form label would swallow the following label's line.
    let next_line = Regex::new(&format!(r"(?i){label}[s]?\s*:?\s*\n\s*([^\n]+)")).ok()?;
    if let Some(captures) = next_line.captures(text) {
        return Some(captures[1].trim().to_string());
    }

    // "Inputs: Audio, video, text": value on the same line.
    let same_line = Regex::new(&format!(r"(?i){label}[s]?\s*[:\s]\s*([^\n\r]+)")).ok()?;
    same_line
        .captures(text)
        .map(|captures| captures[1].trim().to_string())
}

/// Find the first cell in a table whose text carries both "inputs" and
/// "output" labels, and parse it.
pub fn parse_data_types_table(table: ElementRef<'_>) -> Option<(Vec<String>, Vec<String>)> {
    let cell_sel = sel("td, th");
    for cell in table.select(&cell_sel) {
        let text = element_text(cell);
        let lowered = text.to_lowercase();
        if lowered.contains("inputs") && lowered.contains("output") {
            if let Some(parsed) = parse_supported_data_types(&text) {
                return Some(parsed);
            }
        }
    }
    None
}

/// Per-model documentation panels published as `devsite-expandable`
/// elements, keyed by their id attribute.
pub fn expandable_panels<'a>(document: &'a Html, id_prefix: &str) -> Vec<(String, ElementRef<'a>)> {
    let panel_sel = sel("devsite-expandable[id]");
    document
        .select(&panel_sel)
        .filter_map(|el| {
            let id = el.value().attr("id")?;
            id.starts_with(id_prefix)
                .then(|| (id.to_string(), el))
        })
        .collect()
}

/// Per-model panels published as `devsite-selector` elements, keyed by
/// their active attribute.
pub fn selector_panels<'a>(
    document: &'a Html,
    active_prefix: &str,
) -> Vec<(String, ElementRef<'a>)> {
    let panel_sel = sel("devsite-selector[active]");
    document
        .select(&panel_sel)
        .filter_map(|el| {
            let active = el.value().attr("active")?;
            active
                .starts_with(active_prefix)
                .then(|| (active.to_string(), el))
        })
        .collect()
}

/// Selectors nested directly inside an expandable panel, with their active
/// values. Nested panels carry model variants of their own.
pub fn nested_selectors<'a>(panel: ElementRef<'a>) -> Vec<(String, ElementRef<'a>)> {
    let selector_sel = sel("devsite-selector[active]");
    panel
        .select(&selector_sel)
        .filter_map(|el| {
            el.value()
                .attr("active")
                .map(|active| (active.to_string(), el))
        })
        .collect()
}

/// Strip trailing versioning qualifiers (`-latest`, `-preview`, or a 1–3
/// digit numeric suffix), repeatedly, until a fixed point.
pub fn strip_version_qualifiers(model_id: &str) -> String {
    let qualifier = Regex::new(r"(?i)-(latest|preview|\d{1,3})$").expect("qualifier pattern");
    let mut current = model_id.to_string();
    loop {
        let stripped = qualifier.replace(&current, "").to_string();
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Parse a full HTML document.
pub fn parse_document(html: &str) -> Html {
    Html::parse_document(html)
}
