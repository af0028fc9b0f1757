use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::env;
use std::path::Path;

use threat_props::extensions::residual_risk::SCHEMA_NAME;
use threat_props::{
    list_model_ids, list_revisions, load_latest_model, save_model, setup_database, EntityKind,
    EstimatorParameter, Model, PropertiesHost, ResidualRiskEstimatorConfig, SaveOutcome,
    SchemaOptions, Scope, ValueKind, DEFAULT_NAMESPACE, VERSION,
};

const DEFAULT_DB: &str = "threat-props.db";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("demo") => run_demo(args.get(2).map(String::as_str).unwrap_or(DEFAULT_DB))?,
        Some("show") => match args.get(2) {
            Some(path) => run_show(path)?,
            None => bail!("usage: threat-props show DB_PATH"),
        },
        _ => print_usage(),
    }

    Ok(())
}

fn print_usage() {
    println!("threat-props {}", VERSION);
    println!();
    println!("USAGE:");
    println!("    threat-props demo [DB_PATH]   build a sample model and save it");
    println!("    threat-props show DB_PATH     print the latest revision of every model");
}

fn run_demo(db_path: &str) -> Result<()> {
    println!("🧩 Building sample threat model");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut model = Model::new("Online Payments");

    // 1. Hosting schema auto-applied to every entity
    let hosting = model.get_or_create_schema(
        "Hosting",
        DEFAULT_NAMESPACE,
        SchemaOptions::default()
            .with_scope(Scope::Entity)
            .with_auto_apply(true)
            .with_description("Where each element runs"),
    );
    hosting.add_property_type("Zone", ValueKind::SingleLineString)?;

    let web = model.add_entity("Web Server", EntityKind::Process).id();
    model.add_entity("Ledger", EntityKind::DataStore);
    model.add_entity("Customer", EntityKind::ExternalInteractor);
    println!("✓ Created {} entities", model.entities().len());

    if let (Some(entity), Some(zone)) = (model.get_entity(web), hosting.get_property_type("Zone")) {
        entity.properties_container().set_string_value(&zone, Some("DMZ"))?;
    }

    // 2. Residual risk estimator configuration
    let config = ResidualRiskEstimatorConfig::new(&model);
    config.set_selected_estimator_id(Some("EST-1"))?;
    config.set_parameters(Some(&[EstimatorParameter::new("Weight", 0.5)][..]))?;
    config.set_infinite_cap(Decimal::new(100, 0))?;
    println!(
        "✓ Estimator: {} (cap {})",
        config.selected_estimator_id().unwrap_or_default(),
        config.infinite_cap()
    );

    // 3. Evolve the schema: enrolled entities pick up the new type
    hosting.add_property_type("Owner", ValueKind::SingleLineString)?;
    println!("✓ Added 'Owner' to schema '{}'", hosting.name());

    // 4. Persist
    let conn = Connection::open(Path::new(db_path))
        .with_context(|| format!("Failed to open database {}", db_path))?;
    setup_database(&conn)?;

    match save_model(&conn, &model)? {
        SaveOutcome::Saved { revision_id } => println!("✓ Saved revision {}", revision_id),
        SaveOutcome::Unchanged => println!("✓ No changes to save"),
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_model(&model);

    Ok(())
}

fn run_show(db_path: &str) -> Result<()> {
    if !Path::new(db_path).exists() {
        eprintln!("❌ Database not found: {}", db_path);
        eprintln!("   Run: threat-props demo {}", db_path);
        std::process::exit(1);
    }

    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;

    for model_id in list_model_ids(&conn)? {
        let revisions = list_revisions(&conn, model_id)?;
        if let Some(model) = load_latest_model(&conn, model_id)? {
            println!("📄 {} revision(s)", revisions.len());
            print_model(&model);
            println!();
        }
    }

    Ok(())
}

fn print_model(model: &Model) {
    println!("Model: {} ({})", model.name(), model.id());

    for schema in model.registry().schemas() {
        let types: Vec<String> = schema
            .property_types()
            .iter()
            .map(|pt| format!("{}:{}", pt.name(), pt.value_kind()))
            .collect();
        println!("  schema '{}' [{}]", schema.name(), types.join(", "));
    }

    // only read the estimator config when present; the facade would create it
    if model.get_schema(SCHEMA_NAME, DEFAULT_NAMESPACE).is_some() {
        let config = ResidualRiskEstimatorConfig::new(model);
        if let Some(id) = config.selected_estimator_id() {
            println!("  estimator {} cap {}", id, config.infinite_cap());
        }
    }

    for entity in model.entities() {
        println!("  {} ({})", entity.name(), entity.kind().as_str());
        for property in entity.properties() {
            let name = model
                .registry()
                .find_property_type(property.property_type_id())
                .map(|pt| pt.name().to_string())
                .unwrap_or_else(|| property.property_type_id().to_string());
            println!(
                "    {} = {}",
                name,
                property.string_value().unwrap_or_else(|| "-".to_string())
            );
        }
    }
}
