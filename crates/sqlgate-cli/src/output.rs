//! Table rendering for command output

use comfy_table::{ContentArrangement, Table};
use sqlgate_core::{Capability, DriverRegistry, QueryResult, StatementClassification};

fn table(header: Vec<String>) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn classifications(sql: &str, classifications: &[StatementClassification]) -> Table {
    let mut out = table(vec!["#".into(), "kind".into(), "class".into(), "statement".into()]);
    for (idx, c) in classifications.iter().enumerate() {
        let text = sql.get(c.span.clone()).unwrap_or_default().trim();
        out.add_row(vec![
            (idx + 1).to_string(),
            c.kind.to_string(),
            c.class_name.clone(),
            text.to_string(),
        ]);
    }
    out
}

pub fn query_result(result: &QueryResult) -> Table {
    let mut out = table(
        result
            .columns
            .iter()
            .map(|c| format!("{} ({})", c.name, c.semantic_type))
            .collect(),
    );
    for row in &result.rows {
        out.add_row(row.values.iter().map(|v| v.to_string()).collect::<Vec<_>>());
    }
    out
}

pub fn drivers(registry: &DriverRegistry) -> Table {
    let mut header = vec!["driver".to_string(), "name".to_string(), "parent".to_string()];
    header.extend(Capability::ALL.iter().map(|c| c.to_string()));
    let mut out = table(header);
    for id in registry.list() {
        let Some(driver) = registry.get(id) else {
            continue;
        };
        let mut row = vec![
            id.to_string(),
            driver.display_name().to_string(),
            driver.parent().map(|p| p.id().to_string()).unwrap_or_default(),
        ];
        row.extend(Capability::ALL.iter().map(|c| {
            let enabled = if driver.capability(*c) { "yes" } else { "no" };
            enabled.to_string()
        }));
        out.add_row(row);
    }
    out
}
