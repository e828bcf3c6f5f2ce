use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nosh_core::models::ConversationTurn;
use nosh_core::service::NoshService;

pub(crate) fn cmd_history(service: &NoshService, limit: i64, json: bool) -> Result<()> {
    let turns = service.history(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    if turns.is_empty() {
        eprintln!("No conversation history yet");
        return Ok(());
    }

    print_history_table(&turns);
    Ok(())
}

fn print_history_table(turns: &[ConversationTurn]) {
    #[derive(Tabled)]
    struct TurnRow {
        #[tabled(rename = "Role")]
        role: String,
        #[tabled(rename = "Text")]
        text: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "When")]
        when: String,
    }

    let rows: Vec<TurnRow> = turns
        .iter()
        .map(|t| TurnRow {
            role: t.role.clone(),
            text: truncate(&t.text, 50),
            weight: t.weight_g.map_or(String::new(), |w| format!("{w}g")),
            calories: t.calories.map_or(String::new(), |c| format!("{c:.1}")),
            when: format_timestamp(&t.created_at),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Render an RFC 3339 timestamp as local "YYYY-MM-DD HH:MM"; unparseable
/// values pass through untouched.
fn format_timestamp(rfc3339: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(rfc3339).map_or_else(
        |_| rfc3339.to_string(),
        |dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        },
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
