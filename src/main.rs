use center_finder::assemble::{Filters, StatusFilter, SurfaceConfig};
use center_finder::availability::OvernightPolicy;
use center_finder::config::{FinderConfig, LocationMode, DEFAULT_API_BASE, DEFAULT_RADIUS_KM};
use center_finder::finder::PassResult;
use center_finder::geo::GeoPoint;
use center_finder::geocode::{GeocodeCache, DEFAULT_NOMINATIM_URL};
use center_finder::location::DEFAULT_IP_LOOKUP_URL;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Center Finder: nearby EV service centers, ranked and checked for "open now".
///
/// Examples:
///   centers list --lat 10.7769 --lng 106.7009 --radius-km 15
///   centers list --auto --status active --json
///   centers list --surface booking --search "district 7"
///   centers serve --port 3000
#[derive(Parser)]
#[command(name = "centers", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct BackendArgs {
    /// Service-center backend base URL.
    #[arg(long, global = true, env = "CENTER_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// IANA timezone used for "open now" (e.g. Asia/Ho_Chi_Minh).
    #[arg(long, global = true, env = "CENTER_TZ", default_value = "UTC", value_parser = parse_tz)]
    tz: Tz,

    /// How windows with close < open are read: "closed" or "wraparound".
    #[arg(long, global = true, env = "CENTER_OVERNIGHT", default_value = "closed")]
    overnight: OvernightPolicy,

    /// Geocoding endpoint (Nominatim-compatible).
    #[arg(long, global = true, env = "GEOCODE_URL", default_value = DEFAULT_NOMINATIM_URL)]
    geocode_url: String,

    /// Restrict geocoding to these ISO country codes (comma-separated).
    #[arg(long, global = true, env = "GEOCODE_COUNTRY")]
    country: Option<String>,

    /// Disable address geocoding entirely.
    #[arg(long, global = true)]
    no_geocode: bool,

    /// Geocode cache file. Defaults to ~/.center-finder/geocode.json.
    #[arg(long, global = true, env = "GEOCODE_CACHE")]
    cache: Option<PathBuf>,

    /// Keep the geocode cache in memory only.
    #[arg(long, global = true)]
    no_cache: bool,

    /// Maximum geocode lookups in flight per pass.
    #[arg(long, global = true, env = "GEOCODE_CONCURRENCY", default_value_t = 5)]
    geocode_concurrency: usize,

    /// Minimum milliseconds between geocoder requests (0 for self-hosted).
    #[arg(long, global = true, env = "GEOCODE_INTERVAL_MS", default_value_t = 1000)]
    geocode_interval_ms: u64,

    /// HTTP timeout in seconds.
    #[arg(long, global = true, env = "CENTER_HTTP_TIMEOUT", default_value_t = 10)]
    timeout: u64,

    /// IP geolocation endpoint used by --auto.
    #[arg(long, global = true, env = "IP_LOOKUP_URL", default_value = DEFAULT_IP_LOOKUP_URL)]
    ip_lookup_url: String,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve, filter and print one page of centers.
    List(ListArgs),
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, short = 'p', default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Args)]
struct ListArgs {
    /// Latitude (-90 to 90).
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    lat: Option<f64>,

    /// Longitude (-180 to 180).
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lng: Option<f64>,

    /// Auto-detect location via IP geolocation.
    #[arg(long, short = 'a', conflicts_with = "lat")]
    auto: bool,

    #[arg(long, default_value_t = DEFAULT_RADIUS_KM)]
    radius_km: f64,

    /// Case-insensitive match on name or address.
    #[arg(long, short = 's', default_value = "")]
    search: String,

    /// all, active or inactive.
    #[arg(long, default_value = "all")]
    status: StatusFilter,

    /// Zero-based page index.
    #[arg(long, default_value_t = 0)]
    page: usize,

    /// Overrides the surface's page size.
    #[arg(long)]
    page_size: Option<usize>,

    /// directory, booking or admin.
    #[arg(long, default_value = "directory", value_parser = parse_surface)]
    surface: SurfaceConfig,

    /// Print only JSON to stdout.
    #[arg(long)]
    json: bool,
}

fn parse_tz(s: &str) -> Result<Tz, String> {
    s.parse()
        .map_err(|_| format!("Unknown timezone '{}'. Use IANA format (e.g. Asia/Ho_Chi_Minh).", s))
}

fn parse_surface(s: &str) -> Result<SurfaceConfig, String> {
    SurfaceConfig::by_name(s).ok_or_else(|| format!("Unknown surface '{}'. Use 'directory', 'booking' or 'admin'.", s))
}

impl BackendArgs {
    fn config(&self) -> FinderConfig {
        let cache_path = if self.no_cache {
            None
        } else {
            Some(self.cache.clone().unwrap_or_else(GeocodeCache::default_path))
        };
        FinderConfig {
            api_base: self.api_base.clone(),
            ip_lookup_url: self.ip_lookup_url.clone(),
            nominatim_url: self.geocode_url.clone(),
            country_codes: self.country.clone(),
            http_timeout: Duration::from_secs(self.timeout),
            geocode_concurrency: self.geocode_concurrency,
            geocode_min_interval: Duration::from_millis(self.geocode_interval_ms),
            geocode_cache_path: cache_path,
            geocoding: !self.no_geocode,
            tz: self.tz,
            overnight: self.overnight,
            ..FinderConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("center_finder=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.backend.config();

    match cli.command {
        Command::List(args) => list(&config, args).await,
        Command::Serve { host, port } => {
            if let Err(e) = center_finder::server::start(&config, &host, port).await {
                eprintln!("Error: Cannot serve on {}:{}: {}", host, port, e);
                std::process::exit(1);
            }
        }
    }
}

async fn list(config: &FinderConfig, args: ListArgs) {
    // Priority: --lat/--lng > --auto > no location
    let mode = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => {
            let Some(point) = GeoPoint::checked(lat, lng) else {
                eprintln!("Error: Invalid coordinates. Lat: -90..90, Lng: -180..180");
                std::process::exit(1);
            };
            LocationMode::Manual(point)
        }
        _ if args.auto => LocationMode::IpLookup,
        _ => LocationMode::Disabled,
    };

    let user = config.location_provider(mode).get_user_location().await;
    let filters = Filters {
        radius_km: args.radius_km.max(0.0),
        search_text: args.search.clone(),
        status: args.status,
        page_size: args.page_size.unwrap_or(args.surface.page_size),
        page_index: args.page,
    };

    let finder = config.build_finder();
    let result = finder.run_pass(user, &filters, &args.surface).await.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if !args.json {
        eprint!("{}", render_table(&result, &filters, config));
    }

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn render_table(result: &PassResult, filters: &Filters, config: &FinderConfig) -> String {
    let mut out = String::new();
    match result.user_location {
        Some(p) if result.page.radius_applied => {
            out.push_str(&format!("  \u{1F4CD} {}  (within {} km)\n", p, filters.radius_km))
        }
        Some(p) => out.push_str(&format!("  \u{1F4CD} {}  (no distances known, radius ignored)\n", p)),
        None => out.push_str("  \u{1F4CD} location unknown, showing the full directory\n"),
    }
    out.push_str(&format!(
        "  {} center(s), page {}/{}  [{} · {}]\n\n",
        result.page.total,
        result.page.page_index + 1,
        result.page.page_count.max(1),
        result.tier,
        config.tz,
    ));

    for c in &result.page.items {
        let distance = match c.resolved_distance_km {
            Some(km) => format!("{:>7.2} km", km),
            None => format!("{:>10}", "?"),
        };
        let status = if c.is_open_now { "OPEN  " } else { "closed" };
        let window = c
            .today_window
            .as_ref()
            .map(|w| format!("{}-{}", w.open, w.close))
            .unwrap_or_else(|| "--".into());
        let marker = if c.center.is_active { ' ' } else { '*' };
        out.push_str(&format!(
            "  {}{} {} {:<11} {}  {}\n",
            marker, distance, status, window, c.center.name, c.center.address
        ));
    }
    if result.page.items.iter().any(|c| !c.center.is_active) {
        out.push_str("\n  * inactive\n");
    }
    out
}
