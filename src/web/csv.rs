//! CSV assembly for the export endpoints. Fields containing a comma,
//! double quote, CR, or LF are quoted; embedded quotes are doubled.

use salvo::http::StatusCode;
use salvo::http::header;
use salvo::prelude::*;

pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn to_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(
        &headers
            .iter()
            .map(|h| escape_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in rows {
        out.push_str(
            &row.iter()
                .map(|field| escape_field(field))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

/// Send a CSV document as an attachment download.
pub fn send(res: &mut Response, filename: &str, data: String) {
    res.status_code(StatusCode::OK);
    let _ = res.add_header(header::CONTENT_TYPE, "text/csv; charset=utf-8", true);
    let _ = res.add_header(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\""),
        true,
    );
    let _ = res.write_body(data);
}

pub fn opt(value: Option<&str>) -> String {
    value.unwrap_or("").to_string()
}

pub fn opt_num(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn flag(value: bool) -> String {
    if value { "1".to_string() } else { "0".to_string() }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("plain", "plain" ; "plain field untouched")]
    #[test_case("with,comma", "\"with,comma\"" ; "comma quoted")]
    #[test_case("say \"hi\"", "\"say \"\"hi\"\"\"" ; "quotes doubled")]
    #[test_case("line\nbreak", "\"line\nbreak\"" ; "newline quoted")]
    #[test_case("", "" ; "empty stays empty")]
    fn field_escaping(input: &str, expected: &str) {
        assert_eq!(escape_field(input), expected);
    }

    #[test]
    fn document_assembly() {
        let csv = to_csv(
            &["site_id", "site_name"],
            &[
                vec!["101".to_string(), "Harbor, Mill".to_string()],
                vec!["102".to_string(), String::new()],
            ],
        );
        assert_eq!(csv, "site_id,site_name\n101,\"Harbor, Mill\"\n102,\n");
    }
}
