use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use arboard::Clipboard;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use ratatui::DefaultTerminal;
use tracing::{error, info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod booking;
mod controller;
mod domain;
mod format;
mod inputter;
mod markup;
mod model;
mod search;
mod storage;
mod table;
mod ui;

use api::{ApiClient, COMPANY_CUSTOM_TABLE, COMPANY_TABLE, CompanyEndpoint};
use booking::{BookingPage, FORM_INVALID, NO_FLIGHT_SELECTED, PassengerForm, PaymentForm, progress};
use controller::Controller;
use domain::{FTConfig, FTError};
use model::{Model, Status, TableInstance, tables_page};
use search::{
    FlightSearch, NO_SEARCH_DATA, ResultFilters, SearchResults, SortBy, TimeOfDay, TripType,
    airport_options, default_dates, flight_line, select_flight, stored_search,
};
use storage::{FLIGHT_SEARCH, FileStorage, Storage};
use table::{CustomGrid, NativeTable, RenderTarget, RowSource, StaticSeed, TableEngine};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Base url of the booking site backend
    #[arg(long, env = "FT_API_URL", default_value = "http://127.0.0.1:5001")]
    api_url: String,

    /// Directory for durable storage, the log file and written pages
    #[arg(long, default_value = "~/.ft")]
    storage_dir: String,

    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse the company table and the custom grid (default)
    Tables {
        /// Use the built-in sample rows instead of the backend
        #[arg(long)]
        seed: bool,
        /// Event poll time in ms
        #[arg(long, default_value_t = 100)]
        poll: u64,
        #[arg(long, default_value_t = 40)]
        max_column_width: usize,
    },
    /// Write the markup of both tables
    Render {
        #[arg(long)]
        seed: bool,
        /// Output file, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the airport options of the search form
    Airports {
        /// Show the arrival options for this departure airport
        #[arg(long)]
        origin: Option<String>,
    },
    /// Search flights. Without origin and destination the stored search is reused.
    Search {
        origin: Option<String>,
        destination: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        return_date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = TripType::Roundtrip)]
        trip: TripType,
        #[arg(long, default_value_t = 1)]
        passengers: u32,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        airline: Vec<String>,
        #[arg(long)]
        stops: Vec<u32>,
        #[arg(long, value_enum)]
        departure: Vec<TimeOfDay>,
        #[arg(long)]
        route_type: Vec<String>,
        #[arg(long, value_enum, default_value_t = SortBy::Price)]
        sort: SortBy,
        /// Maximum number of flights, defaults to the configured limit
        #[arg(long)]
        limit: Option<usize>,
        /// Print the result cards as markup
        #[arg(long)]
        markup: bool,
    },
    /// Pick a flight of the stored search for booking
    Select { flight_id: String },
    /// Book the selected flight
    Book {
        #[arg(long, default_value = "economy_basic")]
        seat: String,
        #[arg(long)]
        priority_boarding: bool,
        #[arg(long)]
        checked_bag: bool,
        /// Passenger field as name=value, e.g. --field firstName=Ada
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        #[arg(long, default_value = "")]
        card_name: String,
        #[arg(long, default_value = "")]
        card_number: String,
        #[arg(long, default_value = "")]
        expiry: String,
        #[arg(long, default_value = "")]
        cvv: String,
        #[arg(long)]
        accept_terms: bool,
        /// Do not ask before booking
        #[arg(long)]
        yes: bool,
        #[arg(long, default_value_t = 3)]
        redirect_delay: u64,
        /// Print the price summary as markup
        #[arg(long)]
        markup: bool,
    },
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got \"{s}\""))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let storage_dir = expand(&args.storage_dir);
    let mut config = FTConfig::default()
        .api_url(args.api_url.clone())
        .log_file(storage_dir.join("ft.log"))
        .page_file(storage_dir.join("tables.html"))
        .storage_dir(storage_dir);
    if let Some(log_file) = &args.log_file {
        config = config.log_file(expand(log_file));
    }

    if let Err(e) = init_tracing(&config.log_file) {
        eprintln!("Cannot write log file {}: {e}", config.log_file.display());
    }

    match run(args.command, config) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            if let FTError::Network(_, trace) = &e {
                eprintln!("{trace}");
            }
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_tracing(log_file: &Path) -> Result<(), FTError> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_ansi(false);
    let filter = EnvFilter::try_from_env("FT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(command: Option<Command>, config: FTConfig) -> Result<(), FTError> {
    let client = ApiClient::new(&config.api_url);
    match command.unwrap_or(Command::Tables {
        seed: false,
        poll: 100,
        max_column_width: 40,
    }) {
        Command::Tables {
            seed,
            poll,
            max_column_width,
        } => {
            let config = config
                .event_poll_time(poll)
                .max_column_width(max_column_width)
                .use_seed(seed);
            run_tables(&config, table_instances(&client, config.use_seed))
        }
        Command::Render { seed, output } => {
            let config = config.use_seed(seed);
            let mut engines = Vec::new();
            for instance in table_instances(&client, config.use_seed) {
                let (target, source) = instance;
                let mut engine = TableEngine::new(target);
                if let Err(e) = engine.load(source.as_ref()) {
                    eprintln!("Failed to load {}: {e}", engine.name());
                }
                engines.push(engine);
            }
            let html = tables_page(engines.iter());
            match output {
                Some(path) => {
                    fs::write(&path, html)?;
                    info!("Wrote {}", path.display());
                }
                None => println!("{html}"),
            }
            Ok(())
        }
        Command::Airports { origin } => {
            let airports = client.airports()?;
            for option in airport_options(&airports, origin.as_deref()) {
                let marker = if option.disabled { " (unavailable)" } else { "" };
                println!("{:<4} {}{marker}", option.value, option.label);
            }
            Ok(())
        }
        Command::Search {
            origin,
            destination,
            date,
            return_date,
            trip,
            passengers,
            min_price,
            max_price,
            airline,
            stops,
            departure,
            route_type,
            sort,
            limit,
            markup,
        } => {
            let mut session = FileStorage::session()?;
            let search = match (origin, destination) {
                (Some(origin), Some(destination)) => {
                    let today = Local::now().date_naive();
                    let (tomorrow, next_week) = default_dates(today);
                    let search = FlightSearch::new(
                        &origin,
                        &destination,
                        date.unwrap_or(tomorrow),
                        return_date.or(Some(next_week)),
                        trip,
                        passengers,
                        today,
                    )?;
                    session.set_json(FLIGHT_SEARCH, &search)?;
                    search
                }
                _ => stored_search(&session).inspect_err(|_| eprintln!("{NO_SEARCH_DATA}"))?,
            };
            let filters = ResultFilters {
                min_price,
                max_price,
                airlines: airline,
                stops,
                departure_times: departure,
                route_types: route_type,
            };
            let limit = limit.unwrap_or(config.flight_limit);
            let mut results = SearchResults::load(&client, &search, limit)?;
            if !filters.is_empty() || sort != SortBy::default() {
                results.apply_filters(&client, &search, &filters, sort, limit);
            }

            if markup {
                println!("{}", results.markup().render());
                return Ok(());
            }
            println!("{}", search.summary());
            println!("{}\n", results.count_text());
            if results.shown.is_empty() {
                println!("No flights found");
                println!("Try adjusting your search criteria or filters.");
            }
            for flight in &results.shown {
                println!("{}", flight_line(flight));
            }
            Ok(())
        }
        Command::Select { flight_id } => {
            let mut session = FileStorage::session()?;
            let search = stored_search(&session).inspect_err(|_| eprintln!("{NO_SEARCH_DATA}"))?;
            let results = SearchResults::load(&client, &search, config.flight_limit)?;
            let flight = results
                .find(&flight_id)
                .ok_or_else(|| FTError::InvalidInput(format!("no flight {flight_id} in the results")))?;
            select_flight(&mut session, flight)?;
            println!("Selected {}", flight_line(flight));
            Ok(())
        }
        Command::Book {
            seat,
            priority_boarding,
            checked_bag,
            fields,
            card_name,
            card_number,
            expiry,
            cvv,
            accept_terms,
            yes,
            redirect_delay,
            markup,
        } => {
            let session = FileStorage::session()?;
            let mut durable = FileStorage::durable(&config.storage_dir)?;
            let config = config.redirect_delay(redirect_delay);
            let mut page = match BookingPage::load(&session, Duration::from_secs(config.redirect_delay)) {
                Ok(page) => page,
                Err((e, redirect)) => {
                    eprintln!("{NO_FLIGHT_SELECTED}");
                    eprintln!("Returning to {} in {}s ...", redirect.to, redirect.after.as_secs());
                    std::thread::sleep(redirect.after);
                    return Err(e);
                }
            };

            let mut passenger = PassengerForm::restore(&durable);
            for (name, value) in &fields {
                passenger.input(&mut durable, name, value)?;
            }
            page.select_seat(&seat);
            page.set_upgrades(priority_boarding, checked_bag);

            print_progress(1);
            for (label, value) in page.flight_summary() {
                println!("{label:<10}{value}");
            }
            println!();
            if markup {
                println!("{}", page.price_summary().markup().render());
            } else {
                print!("{}", page.price_summary().to_text());
            }
            println!();

            let payment = PaymentForm::new(&card_name, &card_number, &expiry, &cvv);
            let result = page.submit(&passenger, &payment, accept_terms, || {
                yes || confirm("Are you sure you want to proceed with the booking?")
            });
            match result {
                Ok(notifications) => {
                    for n in &notifications {
                        println!("[{}] {}", n.label(), n.message);
                    }
                    if !notifications.is_empty() {
                        print_progress(3);
                    }
                    Ok(())
                }
                Err(FTError::Validation(errors)) => {
                    eprintln!("{FORM_INVALID}");
                    for e in &errors {
                        eprintln!("  {}: {}", e.field, e.message);
                    }
                    Err(FTError::Validation(errors))
                }
                Err(e) => Err(e),
            }
        }
    }
}

type Instance = (Box<dyn RenderTarget>, Box<dyn RowSource>);

fn table_instances(client: &ApiClient, seed: bool) -> Vec<Instance> {
    let source = |path: &'static str| -> Box<dyn RowSource> {
        if seed {
            Box::new(StaticSeed)
        } else {
            Box::new(CompanyEndpoint::new(client.clone(), path))
        }
    };
    vec![
        (Box::new(NativeTable) as Box<dyn RenderTarget>, source(COMPANY_TABLE)),
        (Box::new(CustomGrid) as Box<dyn RenderTarget>, source(COMPANY_CUSTOM_TABLE)),
    ]
}

fn print_progress(step: usize) {
    let steps = progress(step)
        .into_iter()
        .map(|(name, active)| if active { format!("[{name}]") } else { name.to_string() })
        .collect::<Vec<String>>();
    println!("{}\n", steps.join(" > "));
}

fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    io::stdin().read_line(&mut answer).is_ok() && matches!(answer.trim(), "y" | "Y" | "yes")
}

fn run_tables(config: &FTConfig, instances: Vec<Instance>) -> Result<(), FTError> {
    info!("Starting ft tables against {}", config.api_url);
    let tables = instances
        .into_iter()
        .map(|(target, source)| TableInstance::new(target, source))
        .collect();
    let clipboard = match Clipboard::new() {
        Ok(clipboard) => Some(clipboard),
        Err(e) => {
            warn!("Clipboard not available: {e}");
            None
        }
    };

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, config, tables, clipboard);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    config: &FTConfig,
    tables: Vec<TableInstance>,
    clipboard: Option<Clipboard>,
) -> Result<(), FTError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, tables, clipboard, size.width as usize, size.height as usize)?;
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);
    model.load_tables();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    info!("Quitting ft tables");
    Ok(())
}
