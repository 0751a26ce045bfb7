use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use futures::future::join_all;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_console::{
    catalog::CatalogQuery,
    config::Config,
    models::{FacilityStatus, ResourceRef},
    services::capacity::DisplayAvailability,
    BookingContext,
};

#[derive(Parser)]
#[command(name = "booking-console")]
#[command(about = "Events and facilities with their current availability")]
struct Cli {
    /// Что показать.
    #[arg(value_enum, default_value_t = View::All)]
    view: View,
    /// Дата для слотов площадок (YYYY-MM-DD), по умолчанию сегодня.
    #[arg(value_parser = parse_date)]
    date: Option<NaiveDate>,
    /// Не выходить: держать кеш каталога прогретым до Ctrl+C.
    #[arg(long, default_value_t = false)]
    watch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    All,
    Events,
    Facilities,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", raw, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking console ({})", config.app.environment);

    let context = BookingContext::new(config).context("failed to initialise API clients")?;
    let date = cli.date.unwrap_or_else(|| context.capacity.clock().today());

    if matches!(cli.view, View::All | View::Events) {
        print_events(&context).await?;
    }
    if matches!(cli.view, View::All | View::Facilities) {
        print_facilities(&context, date).await?;
    }

    if cli.watch {
        let _refresh = context.start_background();
        info!("Watching catalog, press Ctrl+C to stop");
        tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
        info!("Shutting down");
    }

    Ok(())
}

async fn print_events(context: &BookingContext) -> anyhow::Result<()> {
    let page = context.catalog.events(&CatalogQuery::default()).await?;
    println!("События ({} из {}):", page.items.len(), page.total);

    let availability = join_all(
        page.items
            .iter()
            .map(|event| context.catalog.availability(ResourceRef::Event(event.id), None)),
    )
    .await;

    for (event, availability) in page.items.iter().zip(availability) {
        match availability {
            Ok(DisplayAvailability::Event(a)) => {
                println!("  [{}] {} {}: свободно {} из {}", event.id, event.date, event.name, a.available, a.total)
            }
            Ok(_) => {}
            Err(e) => error!("Availability of event {} failed: {}", event.id, e),
        }
    }
    Ok(())
}

async fn print_facilities(context: &BookingContext, date: NaiveDate) -> anyhow::Result<()> {
    let query = CatalogQuery { status: Some(FacilityStatus::Active), ..CatalogQuery::default() };
    let page = context.catalog.facilities(&query).await?;
    println!("Площадки на {} ({} из {}):", date, page.items.len(), page.total);

    let availability = join_all(
        page.items
            .iter()
            .map(|facility| context.catalog.availability(ResourceRef::Facility(facility.id), Some(date))),
    )
    .await;

    let clock = *context.capacity.clock();
    for (facility, availability) in page.items.iter().zip(availability) {
        match availability {
            Ok(DisplayAvailability::Facility(a)) => {
                println!("  [{}] {} (до {} мин):", facility.id, facility.name, a.max_duration_minutes);
                if a.slots.is_empty() {
                    println!("      свободных слотов нет");
                }
                for slot in &a.slots {
                    println!("      {}", clock.format_range(slot));
                }
            }
            Ok(_) => {}
            Err(e) => error!("Availability of facility {} failed: {}", facility.id, e),
        }
    }
    Ok(())
}
