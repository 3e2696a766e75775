use comfy_table::{Cell, Color, ContentArrangement, Row, Table, presets::UTF8_FULL};
use tessera_postfx::Effect;

pub fn execute() {
    println!("{}", effect_table());
}

fn effect_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(Row::from(vec![
            Cell::new("Effect").fg(Color::Cyan),
            Cell::new("Inputs").fg(Color::Cyan),
            Cell::new("Parameters").fg(Color::Cyan),
            Cell::new("Description").fg(Color::Cyan),
        ]));

    for effect in Effect::all() {
        let parameters = effect.parameters();
        table.add_row(Row::from(vec![
            Cell::new(effect.as_str()),
            Cell::new(effect.source_count().to_string()),
            Cell::new(if parameters.is_empty() {
                "-".to_owned()
            } else {
                parameters.join(", ")
            }),
            Cell::new(effect.description()),
        ]));
    }
    table
}
