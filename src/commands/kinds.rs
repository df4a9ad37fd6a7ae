use anyhow::Result;
use colored::Colorize;
use opnsense::ResourceKind;
use opnsense::schema::{Encoding, KindSchema};

use crate::ui;

pub fn run(kind: Option<&str>) -> Result<()> {
    match kind {
        None => {
            list();
            Ok(())
        }
        Some(raw) => {
            let kind: ResourceKind = raw.parse()?;
            show(kind.schema());
            Ok(())
        }
    }
}

fn endpoint_pattern(schema: &KindSchema) -> String {
    format!(
        "/api/{}/{}/{{add,get,set,del}}_{}",
        schema.module, schema.controller, schema.item
    )
}

fn list() {
    ui::header("Supported resource kinds");
    for kind in ResourceKind::all() {
        println!(
            "  {:<18} {}",
            kind.name().bold(),
            endpoint_pattern(kind.schema()).dimmed()
        );
    }
    println!();
    ui::dim("Run `opnsync kinds <kind>` for the attribute table");
}

fn show(schema: &KindSchema) {
    ui::header(schema.kind.name());
    ui::kv("envelope", schema.envelope);
    ui::kv("endpoints", &endpoint_pattern(schema));
    ui::kv("activation", schema.activation);

    ui::section("Attributes");
    for field in schema.fields {
        let mut notes = Vec::new();
        if let Some(default) = field.default {
            notes.push(format!("default {default:?}"));
        }
        match field.encoding {
            Encoding::Plain => {}
            Encoding::Inverted => notes.push("inverted".to_string()),
            Encoding::FlagWhenTrue => notes.push("sent only when true".to_string()),
            Encoding::KeaOptionData => notes.push("kea option data".to_string()),
        }
        if field.deprecated {
            notes.push("deprecated".to_string());
        }
        if field.sensitive {
            notes.push("sensitive".to_string());
        }

        println!(
            "  {:<16} {:<7} {:<20} {} {}",
            field.name,
            field.ty.name(),
            field.presence.label(),
            format!("wire: {}", field.wire).dimmed(),
            notes.join(", ").yellow()
        );
    }
}
