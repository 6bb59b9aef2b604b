//! Tables for generators and definitions

use prettytable::format::{Alignment, consts::FORMAT_NO_LINESEP_WITH_TITLE};
use prettytable::{Cell, Row, Table};
use ptcgen::{GeneratorDef, ParticleSystem};

use super::format::{format_limit, format_trigger, format_trigger_def};

/// A column title and how its cells line up
struct Column(&'static str, Alignment);

const GENERATOR_COLUMNS: [Column; 6] = [
    Column("ID", Alignment::LEFT),
    Column("Definition", Alignment::LEFT),
    Column("Trigger", Alignment::LEFT),
    Column("Age", Alignment::RIGHT),
    Column("Live", Alignment::RIGHT),
    Column("Capacity", Alignment::RIGHT),
];

const DEFINITION_COLUMNS: [Column; 7] = [
    Column("Name", Alignment::LEFT),
    Column("Trigger", Alignment::LEFT),
    Column("Particles", Alignment::RIGHT),
    Column("Stages", Alignment::RIGHT),
    Column("Rate", Alignment::RIGHT),
    Column("Spawn age", Alignment::RIGHT),
    Column("Max age", Alignment::RIGHT),
];

fn titled(columns: &[Column]) -> Table {
    let mut table = Table::new();
    table.set_format(*FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(
        columns
            .iter()
            .map(|Column(title, _)| Cell::new(title).style_spec("b"))
            .collect(),
    ));
    table
}

fn push_row(table: &mut Table, columns: &[Column], values: impl IntoIterator<Item = String>) {
    let cells = columns
        .iter()
        .zip(values)
        .map(|(Column(_, align), value)| Cell::new_align(&value, *align))
        .collect();
    table.add_row(Row::new(cells));
}

/// One row per live generator, in pool order
pub fn generator_table(system: &ParticleSystem) -> Table {
    let mut table = titled(&GENERATOR_COLUMNS);
    system.iterate(|id, generator| {
        push_row(
            &mut table,
            &GENERATOR_COLUMNS,
            [
                id.to_string(),
                generator.def().name.clone(),
                format_trigger(generator.trigger()),
                generator.age().to_string(),
                generator.live_count().to_string(),
                generator.particles().capacity().to_string(),
            ],
        );
        true
    });
    table
}

/// One row per definition, in file order
pub fn definition_table(defs: &[GeneratorDef]) -> Table {
    let mut table = titled(&DEFINITION_COLUMNS);
    for def in defs {
        push_row(
            &mut table,
            &DEFINITION_COLUMNS,
            [
                def.name.clone(),
                format_trigger_def(&def.trigger),
                def.particles.to_string(),
                def.stage_count().to_string(),
                format!("{:.2}", def.spawn_rate),
                format_limit(def.spawn_age),
                format_limit(def.max_age),
            ],
        );
    }
    table
}
