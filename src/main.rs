//! db-orm-codegen: generates data-access types from a schema description.

use db_orm_layer::codegen::{CodeGenerator, SchemaFile};
use db_orm_layer::config::Config;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let schema = SchemaFile::load(&config.schema)?;
    info!(
        schema = %config.schema.display(),
        tables = schema.tables.len(),
        "Loaded schema"
    );

    let generator = CodeGenerator::new(&config.out_dir).with_options(config.codegen_options());

    if config.dry_run {
        for (module, source) in generator.render(&schema.tables)? {
            println!(
                "{} ({} lines)",
                generator.out_dir().join(format!("{}.rs", module)).display(),
                source.lines().count()
            );
        }
        return Ok(());
    }

    for path in generator.generate(&schema.tables)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn main() {
    let config = Config::parse_args();
    init_tracing(&config);

    info!("Starting db-orm-codegen v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config) {
        error!(error = %e, "Code generation failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
