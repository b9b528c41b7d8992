use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use geosnap::config::Config;
use geosnap::db::{Database, Location};
use geosnap::geo::{FixedLocation, NoLocation, NominatimGeocoder, ReverseGeocoder};
use geosnap::{logging, FileArchive, Gallery};

enum Command {
    Save {
        file: PathBuf,
        latitude: Option<f64>,
        longitude: Option<f64>,
        address: Option<String>,
        geocode: bool,
    },
    List,
    Files,
    Delete {
        id: i64,
        remove_file: bool,
    },
    Audit,
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn next_value(args: &[String], i: &mut usize, flag: &str) -> String {
    *i += 1;
    match args.get(*i) {
        Some(value) => value.clone(),
        None => usage_error(&format!("{} requires a value", flag)),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> T {
    value
        .parse()
        .unwrap_or_else(|_| usage_error(&format!("invalid value for {}: {}", flag, value)))
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut latitude = None;
    let mut longitude = None;
    let mut address = None;
    let mut geocode = false;
    let mut remove_file = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("geosnap {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(next_value(&args, &mut i, "--config")));
            }
            "--lat" => latitude = Some(parse_number(&next_value(&args, &mut i, "--lat"), "--lat")),
            "--lng" => longitude = Some(parse_number(&next_value(&args, &mut i, "--lng"), "--lng")),
            "--address" => address = Some(next_value(&args, &mut i, "--address")),
            "--geocode" => geocode = true,
            "--remove-file" => remove_file = true,
            other if other.starts_with('-') => usage_error(&format!("unknown argument: {}", other)),
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = match positional.first().map(String::as_str) {
        Some("save") => match positional.get(1) {
            Some(file) => Command::Save {
                file: PathBuf::from(file),
                latitude,
                longitude,
                address,
                geocode,
            },
            None => usage_error("save requires a file path"),
        },
        Some("list") => Command::List,
        Some("files") => Command::Files,
        Some("delete") => match positional.get(1) {
            Some(id) => Command::Delete {
                id: parse_number(id, "delete"),
                remove_file,
            },
            None => usage_error("delete requires an image id"),
        },
        Some("audit") => Command::Audit,
        Some(other) => usage_error(&format!("unknown command: {}", other)),
        None => usage_error("no command given"),
    };

    Args {
        config_path,
        command,
    }
}

fn print_help() {
    println!(
        r#"geosnap - store geotagged photo captures

USAGE:
    geosnap [OPTIONS] <COMMAND>

COMMANDS:
    save <FILE>         Move a captured image into the gallery and record it
        --lat N --lng N     Location of the capture
        --address TEXT      Address label (skips reverse geocoding)
        --geocode           Look up the address for --lat/--lng
    list                List saved images
    files               List files in the archive directory
    delete <ID>         Delete an image record
        --remove-file       Also delete its archived file
    audit               Report archived files and records that disagree

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    GEOSNAP_CONFIG      Path to config file (overrides default location)
    GEOSNAP_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/geosnap/config.toml"#
    );
}

fn format_location(location: Option<&Location>) -> String {
    match location {
        Some(l) => format!("{:.6}, {:.6}", l.latitude, l.longitude),
        None => "-".to_string(),
    }
}

fn run(config: &Config, gallery: &Gallery, command: Command) -> Result<()> {
    match command {
        Command::Save {
            file,
            latitude,
            longitude,
            address,
            geocode,
        } => {
            let saved = match (latitude, longitude) {
                (Some(lat), Some(lng)) if address.is_some() || !geocode => gallery
                    .save_with_metadata(&file, Some(Location::new(lat, lng)), address)?,
                (Some(lat), Some(lng)) => {
                    let source = FixedLocation::new(Location::new(lat, lng));
                    let nominatim = NominatimGeocoder::from_config(&config.geocoder);
                    let geocoder: Option<&dyn ReverseGeocoder> =
                        config.geocoder.enabled.then_some(&nominatim as &dyn ReverseGeocoder);
                    gallery.save_capture(&file, &source, geocoder)?
                }
                (None, None) => gallery.save_capture(&file, &NoLocation, None)?,
                _ => bail!("--lat and --lng must be given together"),
            };
            println!("{}\t{}", saved.id, saved.uri.display());
        }
        Command::List => {
            for item in gallery.items()? {
                let record = &item.record;
                println!(
                    "{}\t{}\t{}\t{}{}",
                    record.id,
                    record.uri,
                    format_location(record.location.as_ref()),
                    record.address.as_deref().unwrap_or("-"),
                    if item.file_present { "" } else { "\t(missing)" }
                );
            }
        }
        Command::Files => {
            for file in gallery.archive().list_files()? {
                println!("{}", file.display());
            }
        }
        Command::Delete { id, remove_file } => {
            let removed = gallery.delete(id, remove_file)?;
            println!("{} record(s) removed", removed);
        }
        Command::Audit => {
            let report = gallery.audit()?;
            for file in &report.orphaned_files {
                println!("orphaned file\t{}", file.display());
            }
            for record in &report.dangling_records {
                println!("dangling record\t{}\t{}", record.id, record.uri);
            }
            if report.is_consistent() {
                println!("archive and records agree");
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    // A broken log setup should not stop captures from being saved
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let db = Database::open(&config.database.path)
        .with_context(|| format!("Failed to open database at {}", config.database.path.display()))?;
    db.initialize().context("Failed to initialize database")?;

    let gallery = Gallery::new(db, FileArchive::new(config.archive.clone()));
    info!("Gallery ready, archive at {:?}", gallery.archive().path());

    run(&config, &gallery, args.command)
}
