//! Aligned console tables for dictionaries and sample previews.

use std::{borrow::Cow, fmt::Write as _};

use crate::dictionary::{
    DECLARED_TYPE_COLUMN, Dictionary, FIELD_COLUMN, SAMPLE_TYPE_COLUMN,
};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(1))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(sanitize_cell(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &separator_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// One row per field: name, sample type, declared type.
pub fn dictionary_table(dictionary: &Dictionary) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = [FIELD_COLUMN, SAMPLE_TYPE_COLUMN, DECLARED_TYPE_COLUMN]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = dictionary
        .entries
        .iter()
        .map(|entry| {
            vec![
                entry.name.clone(),
                entry.sample_type.clone(),
                entry.declared_type.to_string(),
            ]
        })
        .collect();
    (headers, rows)
}

pub fn print_dictionary(dictionary: &Dictionary) {
    let (headers, rows) = dictionary_table(dictionary);
    print_table(&headers, &rows);
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dictionary::FieldEntry, inference::DeclaredType};

    #[test]
    fn columns_are_padded_to_widest_cell() {
        let headers = vec!["campo".to_string(), "tipo".to_string()];
        let rows = vec![
            vec!["COD_ID".to_string(), "TEXT".to_string()],
            vec!["FIC_01".to_string(), "INTEGER".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "campo   tipo");
        assert_eq!(lines[1], "------  -------");
        assert_eq!(lines[2], "COD_ID  TEXT");
        assert_eq!(lines[3], "FIC_01  INTEGER");
    }

    #[test]
    fn dictionary_rows_use_declared_tokens() {
        let dictionary = Dictionary::new(vec![FieldEntry {
            name: "DEM_01".to_string(),
            sample_type: "float64".to_string(),
            declared_type: DeclaredType::Real,
        }])
        .unwrap();
        let (headers, rows) = dictionary_table(&dictionary);
        assert_eq!(headers, ["campo", "pandas_dtype", "tipo_aneel"]);
        assert_eq!(rows, vec![vec!["DEM_01", "float64", "REAL"]]);
    }

    #[test]
    fn embedded_newlines_are_flattened() {
        let rendered = render_table(&["a".to_string()], &[vec!["x\ny".to_string()]]);
        assert!(rendered.ends_with("x y\n"));
    }
}
